mod bridge;
mod formatters;
mod logger;
mod sinks;

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Local};
use serde_json::{Map, Value};

pub use bridge::LogBridge;
pub use formatters::{Config, DefaultFormatter};
pub use logger::{Builder, Logger, StreamErrorHook};
pub use sinks::DatabaseSink;

/// Target used by the library's own diagnostics. The bridge never forwards these.
pub const INTERNAL_TARGET: &str = "sinklog::logger";

/// Structured payload attached to an event.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Error = 2,
}

impl Level {
    /// Numeric code stored in the `type` column.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Error => "ERROR",
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" | "0" => Ok(Level::Debug),
            "INFO" | "1" => Ok(Level::Info),
            "ERROR" | "2" => Ok(Level::Error),
            _ => Err(eyre::eyre!("unknown log level {:?}", s)),
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error | log::Level::Warn => Level::Error,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }
}

/// One emitted event, as seen by a formatter.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub message: &'a str,
    pub fields: Option<&'a Fields>,
}

pub trait LogFormatter: Sync + Send {
    fn format(&self, event: &Event<'_>) -> String;
}
