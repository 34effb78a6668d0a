use chrono::{DateTime, Datelike, Local, Timelike};
use log::Record;
use std::fmt::Arguments;
use thiserror::Error;

pub const DEFAULT_FORMAT: &str = "[$Y-$m-$D $H:$M:$S $LEVEL $TARGET] $MESSAGE";

#[derive(Error, Debug)]
pub enum LogError {
    #[error("IO Error.")]
    IOError(#[from] std::io::Error),

    #[error("Logger initialization error.")]
    SetLoggerError(log::SetLoggerError),
}

impl LogError {
    pub fn additional_info(&self) -> Option<String> {
        match self {
            LogError::IOError(err) => Some(err.to_string()),
            LogError::SetLoggerError(err) => Some(err.to_string()),
        }
    }
}

#[derive(Clone, Copy)]
enum Token {
    Message,
    Target,
    Level,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

// Longer names first, "$M" must not shadow "$MESSAGE".
const TOKENS: [(&str, Token); 9] = [
    ("$MESSAGE", Token::Message),
    ("$TARGET", Token::Target),
    ("$LEVEL", Token::Level),
    ("$Y", Token::Year),
    ("$m", Token::Month),
    ("$D", Token::Day),
    ("$H", Token::Hour),
    ("$M", Token::Minute),
    ("$S", Token::Second),
];

pub fn generate_file_name(title: &str) -> String {
    let now = Local::now();
    let date = format!(
        "{year:04}-{month:02}-{day:02}",
        year = now.year(),
        month = now.month(),
        day = now.day(),
    );

    let title_formatted = title.trim().replace(" ", "-");
    format!("{title_formatted}_{date}.log")
}

/// Expands the `$` tokens of `format` in one pass. Text coming from the
/// message or the target is never expanded again.
pub fn parse_format(format: &str, message: &Arguments, record: &Record) -> String {
    render(format, message, record, Local::now())
}

fn render(format: &str, message: &Arguments, record: &Record, time: DateTime<Local>) -> String {
    let mut log = String::with_capacity(format.len() + 64);
    let mut rest = format.trim();

    while let Some(index) = rest.find('$') {
        let (text, tail) = rest.split_at(index);
        log.push_str(text);

        match TOKENS.iter().find(|(name, _)| tail.starts_with(name)) {
            Some((name, token)) => {
                let value = match token {
                    Token::Message => message.to_string(),
                    Token::Target => record.target().to_string(),
                    Token::Level => record.level().to_string(),
                    Token::Year => format!("{:04}", time.year()),
                    Token::Month => format!("{:02}", time.month()),
                    Token::Day => format!("{:02}", time.day()),
                    Token::Hour => format!("{:02}", time.hour()),
                    Token::Minute => format!("{:02}", time.minute()),
                    Token::Second => format!("{:02}", time.second()),
                };
                log.push_str(&value);
                rest = tail.get(name.len()..).unwrap_or_default();
            },
            None => {
                log.push('$');
                rest = tail.get(1..).unwrap_or_default();
            },
        }
    }
    log.push_str(rest);

    log
}
