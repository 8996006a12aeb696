use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Local};

use super::{Fields, Level};
use crate::error::LogError;

/// Anything that can durably store a log row.
pub trait DatabaseSink: Send + Sync {
    fn write(
        &self,
        table: &str,
        level: Level,
        message: &str,
        fields: Option<&Fields>,
        timestamp: DateTime<Local>,
    ) -> Result<(), LogError>;
}

pub(crate) struct DatabaseRegistration {
    pub(crate) sink: Arc<dyn DatabaseSink>,
    pub(crate) table: String,
}

impl DatabaseRegistration {
    /// Same sink instance and same table.
    pub(crate) fn matches(&self, sink: &Arc<dyn DatabaseSink>, table: &str) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.sink), Arc::as_ptr(sink)) && self.table == table
    }
}

pub(crate) enum StreamSink {
    /// A file the logger opened and must close.
    Owned { file: File, path: PathBuf },
    /// A writer supplied by the caller.
    External(Box<dyn Write + Send>),
}

impl StreamSink {
    pub(crate) fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref();
        let mut options = OpenOptions::new();
        options.create(true).append(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o666);
        }

        let file = options.open(path)?;

        Ok(StreamSink::Owned {
            file,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn is_owned(&self) -> bool {
        matches!(self, StreamSink::Owned { .. })
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            StreamSink::Owned { path, .. } => path.display().to_string(),
            StreamSink::External(_) => "writer".to_string(),
        }
    }

    pub(crate) fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        match self {
            StreamSink::Owned { file, .. } => file.write_all(line),
            StreamSink::External(writer) => {
                writer.write_all(line)?;
                writer.flush()
            }
        }
    }

    /// Releases an owned file. External writers are left untouched.
    pub(crate) fn close(self) -> Option<io::Result<()>> {
        match self {
            StreamSink::Owned { file, .. } => {
                let result = file.sync_all();
                drop(file);
                Some(result)
            }
            StreamSink::External(_) => None,
        }
    }
}
