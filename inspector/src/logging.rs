use crate::config::Config;
use common::logging::LogError;
use log::LevelFilter;

// Logs go to stderr, stdout carries the JSON report.
pub fn setup(config: &Config, log_level: LevelFilter) -> Result<(), LogError> {
    if log_level.eq(&LevelFilter::Off) {
        return Ok(());
    }

    let log_format = config.log_format.clone();
    let mut dispatch = fern::Dispatch::new()
        .level(log_level)
        .format(move |out, message, record| {
            let formatted = common::logging::parse_format(&log_format, message, record);

            out.finish(format_args!("{}", formatted))
        })
        .chain(std::io::stderr());

    if config.log_to_file {
        let file_name = common::logging::generate_file_name("inspector");
        let file = fern::log_file(file_name).map_err(LogError::IOError)?;
        dispatch = dispatch.chain(file);
    }

    dispatch.apply().map_err(LogError::SetLoggerError)
}
