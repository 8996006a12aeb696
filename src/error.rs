use std::fmt::Display;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where a database write gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Acquire,
    Execute,
}

impl Display for WriteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStage::Acquire => write!(f, "connection acquire"),
            WriteStage::Execute => write!(f, "statement execution"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LogError {
    #[error("database sink already registered for table {table:?}")]
    DuplicateSink { table: String },

    #[error("database sink is nil")]
    NilSink,

    #[error("writer is nil")]
    NilWriter,

    #[error("failed marshaling fields to JSON: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("database write failed during {stage}: {source}")]
    DatabaseWrite {
        stage: WriteStage,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    FileOpen(#[from] std::io::Error),

    #[error("logger is closed")]
    Closed,
}

impl LogError {
    pub(crate) fn database(stage: WriteStage, source: impl Into<BoxError>) -> Self {
        LogError::DatabaseWrite {
            stage,
            source: source.into(),
        }
    }
}
