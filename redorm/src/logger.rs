use chrono::Local;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    #[default]
    Info = 1,
    Warn = 2,
    Error = 3,
    Off = 4,
}

impl LogLevel {
    fn label(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Off => "OFF",
        }
    }

    fn from_u8(level: u8) -> LogLevel {
        match level {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            3 => LogLevel::Error,
            _ => LogLevel::Off,
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

pub fn set_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn level() -> LogLevel {
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

pub fn enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level >= self::level()
}

fn log(level: LogLevel, args: fmt::Arguments) {
    if !enabled(level) {
        return;
    }
    let now = Local::now();
    match level {
        LogLevel::Warn | LogLevel::Error => eprintln!("[{}] {} {}", now.format("%Y-%m-%d %H:%M:%S"), level.label(), args),
        _ => println!("[{}] {} {}", now.format("%Y-%m-%d %H:%M:%S"), level.label(), args),
    }
}

pub fn debug(args: fmt::Arguments) {
    log(LogLevel::Debug, args)
}

pub fn info(args: fmt::Arguments) {
    log(LogLevel::Info, args)
}

pub fn warn(args: fmt::Arguments) {
    log(LogLevel::Warn, args)
}

pub fn error(args: fmt::Arguments) {
    log(LogLevel::Error, args)
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::logger::debug(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logger::info(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logger::warn(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logger::error(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_from_debug_to_off() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Off);
        for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error, LogLevel::Off] {
            assert_eq!(LogLevel::from_u8(level as u8), level);
        }
    }

    #[test]
    fn level_names_deserialize_lowercase() {
        let level: LogLevel = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(level, LogLevel::Warn);
        assert!(serde_json::from_str::<LogLevel>("\"loud\"").is_err());
    }
}
