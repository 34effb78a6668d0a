use crate::config::Config;
use dissector::Dissector;
use log::info;

fn main() {
    let config = match Config::from_file() {
        Ok(value) => value,
        Err(err) => {
            let mut message = format!("Config initialization failed. Error: {err}.");
            if let Some(additional_info) = err.additional_info() {
                message.push_str(&format!(" Additional_info: {additional_info}"));
            }
            eprintln!("{}", message);
            std::process::exit(1);
        },
    };

    let log_level = config.log_level().unwrap_or_else(|err| {
        eprintln!("{}", err);
        std::process::exit(1);
    });
    logging::setup(&config, log_level).unwrap_or_else(|err| {
        let mut message = format!("Logger initialization failed. Error: {err}.");
        if let Some(additional_info) = err.additional_info() {
            message.push_str(&format!(" Additional_info: {additional_info}"));
        }
        eprintln!("{}", message);
        std::process::exit(1);
    });

    let path = match std::env::args().nth(1) {
        Some(value) => value,
        None => {
            eprintln!("Usage: inspector <capture.pcap | capture.pcapng>");
            std::process::exit(2);
        },
    };

    let mut dissected = 0;
    let context = Dissector::new(config.dissector.clone())
        .with_progress(|frames| {
            dissected += frames.len();
            info!("{} frames dissected.", dissected);
        })
        .parse_file(&path)
        .unwrap_or_else(|err| {
            let mut message = format!("Unable to open capture {path}. Error: {err}");
            if let Some(additional_info) = err.additional_info() {
                message.push_str(&format!(" Additional_info: {additional_info}"));
            }
            eprintln!("{}", message);
            std::process::exit(1);
        });

    match report::to_json(&report::Report::new(&context), config.pretty) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            eprintln!("Report serialization failed. Error: {err}.");
            std::process::exit(1);
        },
    }
}

mod config;
mod logging;
mod report;
