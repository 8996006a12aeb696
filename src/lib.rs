//! Multi-sink application logger.
//!
//! A [`Logger`] fans every event out to registered database tables first and
//! then writes one formatted line to every stream sink (files it opened itself
//! and caller supplied writers).

pub mod config;
pub mod db;
pub mod error;
pub mod logging;

pub use error::{LogError, WriteStage};
pub use logging::{Builder, DatabaseSink, Fields, Level, LogBridge, Logger};
