use std::{
    cell::Cell,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::Local;

use super::{
    formatters::{Config, DefaultFormatter},
    sinks::{DatabaseRegistration, DatabaseSink, StreamSink},
    Event, Fields, Level, LogFormatter, INTERNAL_TARGET,
};
use crate::error::LogError;

thread_local! {
    static PRINTING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside [`Logger::print`]. Sinks may log through
/// the `log` facade while the state lock is held; a bridged logger would then
/// re-enter `print` on the same thread and block on its own lock.
struct PrintGuard;

impl PrintGuard {
    fn enter() -> Option<Self> {
        if PRINTING.with(|printing| printing.replace(true)) {
            return None;
        }
        Some(PrintGuard)
    }
}

impl Drop for PrintGuard {
    fn drop(&mut self) {
        PRINTING.with(|printing| printing.set(false));
    }
}

/// Called with the sink description and the error whenever a stream write fails.
pub type StreamErrorHook = Box<dyn Fn(&str, &io::Error) + Send + Sync>;

#[derive(Default)]
struct State {
    debug_mode: bool,
    closed: bool,
    databases: Vec<DatabaseRegistration>,
    streams: Vec<StreamSink>,
    on_stream_error: Option<StreamErrorHook>,
}

impl State {
    /// Every sink is attempted; only the first failure is kept.
    fn print_into_databases(
        &self,
        level: Level,
        message: &str,
        fields: Option<&Fields>,
    ) -> Result<(), LogError> {
        let mut first_error = None;

        for registration in &self.databases {
            let result = registration.sink.write(
                &registration.table,
                level,
                message,
                fields,
                Local::now(),
            );

            if let Err(err) = result {
                log::debug!(target: INTERNAL_TARGET, "database sink for table {} failed: {}", registration.table, err);
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn print_into_streams(&mut self, line: &str) {
        let bytes = line.as_bytes();

        for stream in self.streams.iter_mut() {
            if let Err(err) = stream.write_line(bytes) {
                if let Some(hook) = &self.on_stream_error {
                    hook(&stream.describe(), &err);
                }
            }
        }
    }
}

/// Fans each event out to database sinks, then to every stream sink.
///
/// All state sits behind one mutex, so a `Logger` can be shared between threads.
/// Emission never reports failures to the caller: database errors become an
/// extra ERROR line on the streams, and stream errors are dropped unless a hook
/// is installed with [`Logger::set_stream_error_hook`].
pub struct Logger {
    state: Mutex<State>,
    formatter: Box<dyn LogFormatter>,
}

impl Logger {
    pub fn new() -> Self {
        Self::with_formatter(Box::new(DefaultFormatter::new(Config::new())))
    }

    pub fn with_formatter(formatter: Box<dyn LogFormatter>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            formatter,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn debug_mode(&self) -> bool {
        self.lock().debug_mode
    }

    pub fn set_debug_mode(&self, enabled: bool) {
        self.lock().debug_mode = enabled;
    }

    pub fn set_stream_error_hook(&self, hook: Option<StreamErrorHook>) {
        self.lock().on_stream_error = hook;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn add_database_sink(
        &self,
        sink: Option<Arc<dyn DatabaseSink>>,
        table: impl Into<String>,
    ) -> Result<(), LogError> {
        let table = table.into();
        let mut state = self.lock();

        if state.closed {
            return Err(LogError::Closed);
        }

        let sink = sink.ok_or(LogError::NilSink)?;

        if state.databases.iter().any(|r| r.matches(&sink, &table)) {
            return Err(LogError::DuplicateSink { table });
        }

        state.databases.push(DatabaseRegistration { sink, table });
        Ok(())
    }

    /// Opens `path` for appending, creating it if needed. The logger owns the
    /// handle and closes it in [`Logger::close`].
    pub fn add_file(&self, path: impl AsRef<Path>) -> Result<(), LogError> {
        let mut state = self.lock();

        if state.closed {
            return Err(LogError::Closed);
        }

        let sink = StreamSink::open(path)?;
        state.streams.push(sink);
        Ok(())
    }

    pub fn add_stream(&self, writer: Option<Box<dyn Write + Send>>) -> Result<(), LogError> {
        let mut state = self.lock();

        if state.closed {
            return Err(LogError::Closed);
        }

        let writer = writer.ok_or(LogError::NilWriter)?;
        state.streams.push(StreamSink::External(writer));
        Ok(())
    }

    /// Events emitted from inside a sink on the same thread are dropped.
    pub fn print(&self, level: Level, message: &str, fields: Option<&Fields>) {
        let Some(_printing) = PrintGuard::enter() else {
            return;
        };
        let mut state = self.lock();

        if state.closed {
            return;
        }

        if level == Level::Debug && !state.debug_mode {
            return;
        }

        if let Err(err) = state.print_into_databases(level, message, fields) {
            let diagnostic = format!("logger: database dispatch failed: {}", err);
            let line = self.format(Level::Error, &diagnostic, None);
            state.print_into_streams(&line);
        }

        let line = self.format(level, message, fields);
        state.print_into_streams(&line);
    }

    pub fn debug(&self, message: &str, fields: Option<&Fields>) {
        self.print(Level::Debug, message, fields)
    }

    pub fn info(&self, message: &str, fields: Option<&Fields>) {
        self.print(Level::Info, message, fields)
    }

    pub fn error(&self, message: &str, fields: Option<&Fields>) {
        self.print(Level::Error, message, fields)
    }

    fn format(&self, level: Level, message: &str, fields: Option<&Fields>) -> String {
        self.formatter.format(&Event {
            timestamp: Local::now(),
            level,
            message,
            fields,
        })
    }

    /// Closes every file the logger opened, ignoring close errors. The logger
    /// rejects registrations and drops events afterwards.
    pub fn close(&self) {
        let mut state = self.lock();

        if state.closed {
            return;
        }
        state.closed = true;
        state.databases.clear();

        // External writers stay referenced until the logger itself is dropped.
        let (owned, external): (Vec<_>, Vec<_>) =
            state.streams.drain(..).partition(StreamSink::is_owned);
        state.streams = external;

        for stream in owned {
            let name = stream.describe();
            if let Some(Err(err)) = stream.close() {
                log::debug!(target: INTERNAL_TARGET, "failed closing {}: {}", name, err);
            }
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.close();
    }
}

type Registration = Box<dyn FnOnce(&Logger) -> Result<(), LogError>>;

pub struct Builder {
    debug_mode: bool,
    formatter_builder: Box<dyn Fn(Config) -> Box<dyn LogFormatter + 'static>>,
    config: Config,
    registrations: Vec<Registration>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            debug_mode: false,
            formatter_builder: Box::new(|config| Box::new(DefaultFormatter::new(config))),
            config: Config::new(),
            registrations: Vec::new(),
        }
    }

    pub fn with_debug(self, debug_mode: bool) -> Self {
        Self { debug_mode, ..self }
    }

    pub fn with_datetime_format(self, format: impl Into<String>) -> Self {
        Self {
            config: Config {
                datetime_format: format.into(),
            },
            ..self
        }
    }

    pub fn with_formatter(
        self,
        formatter_builder: impl Fn(Config) -> Box<dyn LogFormatter + 'static> + 'static,
    ) -> Self {
        Self {
            formatter_builder: Box::new(formatter_builder),
            ..self
        }
    }

    pub fn with_file_sink(mut self, path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        self.registrations
            .push(Box::new(move |logger: &Logger| logger.add_file(&path)));
        self
    }

    pub fn with_stream(mut self, writer: impl Write + Send + 'static) -> Self {
        self.registrations
            .push(Box::new(move |logger: &Logger| logger.add_stream(Some(Box::new(writer)))));
        self
    }

    pub fn with_stderr_sink(self) -> Self {
        self.with_stream(io::stderr())
    }

    pub fn with_database_sink(
        mut self,
        sink: Arc<dyn DatabaseSink>,
        table: impl Into<String>,
    ) -> Self {
        let table = table.into();
        self.registrations
            .push(Box::new(move |logger: &Logger| logger.add_database_sink(Some(sink), table)));
        self
    }

    /// Applies registrations in the order they were added. Files opened before
    /// a failing registration are closed when the partial logger is dropped.
    pub fn build(self) -> Result<Logger, LogError> {
        let logger = Logger::with_formatter((self.formatter_builder)(self.config.clone()));
        logger.set_debug_mode(self.debug_mode);

        for register in self.registrations {
            register(&logger)?;
        }

        Ok(logger)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
