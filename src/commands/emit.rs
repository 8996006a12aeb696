use std::{io, path::PathBuf, sync::Arc};

use clap::Args;
use eyre::Context;
use serde_json::Value;

use sinklog::{
    config::{ConfigManager, DbConfig},
    db::{Postgres, Sqlite},
    DatabaseSink, Fields, Level, Logger,
};

#[derive(Args, Debug)]
pub struct Cmd {
    #[arg(index = 1, value_parser = parse_level, help = "DEBUG, INFO or ERROR.")]
    pub level: Level,

    #[arg(index = 2, default_value = "")]
    pub message: String,

    #[arg(
        short = 'f',
        long = "field",
        value_name = "KEY=VALUE",
        value_parser = parse_field,
        help = "Structured field. Values that parse as JSON are kept as JSON, anything else is a string."
    )]
    pub fields: Vec<(String, Value)>,

    #[arg(long = "file", value_name = "PATH", help = "Append the line to this file.")]
    pub files: Vec<PathBuf>,

    #[arg(long, help = "Write the line to stdout.")]
    pub stdout: bool,

    #[arg(long, value_name = "PATH", help = "Insert a row into this SQLite database.")]
    pub sqlite: Option<PathBuf>,

    #[arg(
        long,
        value_name = "CONFIG",
        help = "Insert a row into the Postgres database described by this JSON file."
    )]
    pub postgres: Option<PathBuf>,

    #[arg(long, default_value = "logs")]
    pub table: String,

    #[arg(long, requires = "sqlite", help = "Create the SQLite log table if it's missing.")]
    pub create_table: bool,

    #[arg(long, help = "Emit DEBUG events instead of dropping them.")]
    pub debug: bool,
}

impl Cmd {
    pub fn run(&self, config: &impl ConfigManager) -> eyre::Result<()> {
        let logger = Logger::new();
        logger.set_debug_mode(self.debug);

        if let Some(path) = &self.sqlite {
            let db = Sqlite::open(path)?;
            if self.create_table {
                db.create_table(&self.table)?;
            }
            let sink: Arc<dyn DatabaseSink> = Arc::new(db);
            logger.add_database_sink(Some(sink), self.table.as_str())?;
        }

        if let Some(path) = &self.postgres {
            let db = Postgres::open(DbConfig::load(path)?)?;
            let sink: Arc<dyn DatabaseSink> = Arc::new(db);
            logger.add_database_sink(Some(sink), self.table.as_str())?;
        }

        for path in &self.files {
            logger
                .add_file(path)
                .with_context(|| format!("Failed opening log file {}", path.display()))?;
        }

        if self.stdout {
            logger.add_stream(Some(Box::new(io::stdout())))?;
        }

        if !self.has_sinks() {
            let path = PathBuf::from(config.get_log_path()?);
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            log::debug!(target: "sinklog", "no sink given, writing to {}", path.display());
            logger
                .add_file(&path)
                .with_context(|| format!("Failed opening default log file {}", path.display()))?;
        }

        let fields: Fields = self.fields.iter().cloned().collect();
        let fields = (!fields.is_empty()).then_some(&fields);

        logger.print(self.level, &self.message, fields);
        logger.close();

        Ok(())
    }

    fn has_sinks(&self) -> bool {
        self.stdout || !self.files.is_empty() || self.sqlite.is_some() || self.postgres.is_some()
    }
}

fn parse_level(level: &str) -> Result<Level, String> {
    level.parse().map_err(|e: eyre::Report| e.to_string())
}

fn parse_field(field: &str) -> Result<(String, Value), String> {
    let (key, value) = field
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", field))?;

    if key.is_empty() {
        return Err(format!("empty field name in {:?}", field));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
