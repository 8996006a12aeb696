use std::{
    fs,
    io::{self, Write},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Local};
use serde_json::json;
use sinklog::{Builder, DatabaseSink, Fields, Level, LogError, Logger, WriteStage};
use tempfile::tempdir;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct DownDatabase;

impl DatabaseSink for DownDatabase {
    fn write(
        &self,
        _table: &str,
        _level: Level,
        _message: &str,
        _fields: Option<&Fields>,
        _timestamp: DateTime<Local>,
    ) -> Result<(), LogError> {
        Err(LogError::DatabaseWrite {
            stage: WriteStage::Acquire,
            source: "connection refused".into(),
        })
    }
}

fn assert_line_shape(line: &str, level: &str, rest: &str) {
    // "YYYY-MM-DD HH:MM:SS  LEVEL\t..."
    assert_eq!(&line[4..5], "-");
    assert_eq!(&line[10..11], " ");
    assert_eq!(&line[19..21], "  ");
    assert_eq!(&line[21..], format!("{}\t{}", level, rest));
}

#[test]
fn file_holds_exactly_the_lines_written_before_close() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("x.log");

    let logger = Logger::new();
    logger.add_file(&path).unwrap();
    logger.info("first", None);
    logger.error("second", Some(json!({"code": 7}).as_object().unwrap()));
    logger.close();
    logger.info("after close", None);

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();

    assert!(contents.ends_with('\n'));
    assert_eq!(lines.len(), 2);
    assert_line_shape(lines[0], "INFO", "first ");
    assert_line_shape(lines[1], "ERROR", "second {\"code\":7}");
}

#[test]
fn file_and_stream_receive_the_same_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("both.log");
    let buffer = SharedBuffer::default();

    let logger = Builder::new()
        .with_file_sink(&path)
        .with_stream(buffer.clone())
        .build()
        .unwrap();

    logger.print(Level::Info, "m", None);
    logger.close();

    assert_eq!(fs::read_to_string(&path).unwrap(), buffer.contents());
    assert_eq!(buffer.contents().lines().count(), 1);
}

#[test]
fn reopening_appends_instead_of_truncating() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("append.log");

    for message in ["one", "two"] {
        let logger = Logger::new();
        logger.add_file(&path).unwrap();
        logger.info(message, None);
    }

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 2);
}

#[test]
fn unopenable_file_returns_the_io_error() {
    let dir = tempdir().unwrap();
    let logger = Logger::new();

    let err = logger.add_file(dir.path()).unwrap_err();

    assert!(matches!(err, LogError::FileOpen(_)));
}

#[test]
fn database_failure_is_logged_to_the_file_before_the_event() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db.log");

    let logger = Logger::new();
    logger.add_file(&path).unwrap();
    logger
        .add_database_sink(Some(Arc::new(DownDatabase)), "logs")
        .unwrap();
    logger
        .add_database_sink(Some(Arc::new(DownDatabase)), "logs")
        .unwrap();

    logger.info("payload", None);
    logger.close();

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_line_shape(
        lines[0],
        "ERROR",
        "logger: database dispatch failed: database write failed during connection acquire: connection refused ",
    );
    assert_line_shape(lines[1], "INFO", "payload ");
}

#[test]
fn suppressed_debug_touches_no_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quiet.log");

    let logger = Logger::new();
    logger.add_file(&path).unwrap();
    logger.debug("hidden", None);
    logger.close();

    assert_eq!(fs::read_to_string(&path).unwrap(), "");
}
