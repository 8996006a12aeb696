use std::{fs, path::Path, time::Duration};

use chrono::{DateTime, Local, Utc};
use eyre::Context;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    PgPool, SqlitePool,
};
use tokio::runtime::Runtime;

use crate::{
    config::{DbConfig, DEFAULT_TIMEOUT},
    error::{BoxError, LogError, WriteStage},
    logging::{DatabaseSink, Fields, Level, INTERNAL_TARGET},
};

/// Quotes `name` as an SQL identifier. Input is cut at the first NUL.
pub fn quote_identifier(name: &str) -> String {
    let end = name.find('\0').unwrap_or(name.len());
    format!("\"{}\"", name[..end].replace('"', "\"\""))
}

fn qualified(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| quote_identifier(part))
        .collect::<Vec<_>>()
        .join(".")
}

pub fn postgres_insert(database: &str, schema: &str, table: &str) -> String {
    format!(
        "INSERT INTO {} (time, type, msg, vars) VALUES ($1, $2, $3, $4::jsonb)",
        qualified(&[database, schema, table])
    )
}

pub fn sqlite_insert(schema: &str, table: &str) -> String {
    format!(
        "INSERT INTO {} (time, type, msg, vars) VALUES (?1, ?2, ?3, ?4)",
        qualified(&[schema, table])
    )
}

fn encode_fields(fields: Option<&Fields>) -> Result<String, LogError> {
    serde_json::to_string(&fields).map_err(LogError::Serialization)
}

fn current_thread_runtime() -> eyre::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed building database runtime")
}

/// Maps the outcome of a timed write to the stage that was running when it stopped.
fn staged<E>(
    stage: WriteStage,
    result: Result<Result<(), E>, tokio::time::error::Elapsed>,
) -> Result<(), LogError>
where
    E: Into<BoxError>,
{
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(LogError::database(stage, err)),
        Err(elapsed) => Err(LogError::database(stage, elapsed)),
    }
}

/// Postgres log table writer.
///
/// Owns a current-thread runtime and blocks on every write, so it must not be
/// called from inside another tokio runtime.
pub struct Postgres {
    pool: PgPool,
    config: DbConfig,
    timeout: Duration,
    runtime: Runtime,
}

impl Postgres {
    pub fn open(config: DbConfig) -> eyre::Result<Self> {
        let config = config.validated()?;
        let timeout = config.timeout()?;
        let runtime = current_thread_runtime()?;

        let opts = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port()?)
            .username(&config.login)
            .password(&config.password)
            .database(&config.database)
            .ssl_mode(PgSslMode::Disable);

        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .acquire_timeout(timeout)
                    .connect_with(opts),
            )
            .with_context(|| {
                format!(
                    "Failed connecting to postgres at {}:{}",
                    config.host, config.port
                )
            })?;

        log::debug!(target: INTERNAL_TARGET, "connected to postgres database {}", config.database);

        Ok(Self {
            pool,
            config,
            timeout,
            runtime,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }
}

impl DatabaseSink for Postgres {
    fn write(
        &self,
        table: &str,
        level: Level,
        message: &str,
        fields: Option<&Fields>,
        timestamp: DateTime<Local>,
    ) -> Result<(), LogError> {
        let vars = encode_fields(fields)?;
        let sql = postgres_insert(&self.config.database, &self.config.schema, table);

        // One deadline covers acquire and execute. The connection must be
        // released inside the runtime, so it never leaves the async block.
        let mut stage = WriteStage::Acquire;
        let result = self.runtime.block_on(async {
            tokio::time::timeout(self.timeout, async {
                let mut conn = self.pool.acquire().await?;
                stage = WriteStage::Execute;

                sqlx::query(&sql)
                    .bind(timestamp.with_timezone(&Utc))
                    .bind(i16::from(level.code()))
                    .bind(message)
                    .bind(vars.as_str())
                    .execute(&mut *conn)
                    .await?;

                Ok::<_, sqlx::Error>(())
            })
            .await
        });

        staged(stage, result)
    }
}

/// SQLite log table writer, for local use.
pub struct Sqlite {
    pool: SqlitePool,
    schema: String,
    timeout: Duration,
    runtime: Runtime,
}

impl Sqlite {
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
        }

        let runtime = current_thread_runtime()?;

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = runtime
            .block_on(
                SqlitePoolOptions::new()
                    .acquire_timeout(DEFAULT_TIMEOUT)
                    .connect_with(opts),
            )
            .with_context(|| format!("Failed opening sqlite database {}", path.display()))?;

        Ok(Self {
            pool,
            schema: "main".to_string(),
            timeout: DEFAULT_TIMEOUT,
            runtime,
        })
    }

    pub fn with_schema(self, schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..self
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn sqlite_version(&self) -> eyre::Result<String> {
        let result: String = self
            .runtime
            .block_on(sqlx::query_scalar("SELECT sqlite_version()").fetch_one(&self.pool))?;

        Ok(result)
    }

    pub fn create_table(&self, table: &str) -> eyre::Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                time TEXT NOT NULL,
                type INTEGER NOT NULL,
                msg  TEXT NOT NULL,
                vars TEXT
            )",
            qualified(&[self.schema.as_str(), table])
        );

        self.runtime
            .block_on(sqlx::query(&sql).execute(&self.pool))
            .with_context(|| format!("Failed creating log table {}", table))?;

        Ok(())
    }
}

impl DatabaseSink for Sqlite {
    fn write(
        &self,
        table: &str,
        level: Level,
        message: &str,
        fields: Option<&Fields>,
        timestamp: DateTime<Local>,
    ) -> Result<(), LogError> {
        let vars = encode_fields(fields)?;
        let sql = sqlite_insert(&self.schema, table);

        // One deadline covers acquire and execute. The connection must be
        // released inside the runtime, so it never leaves the async block.
        let mut stage = WriteStage::Acquire;
        let result = self.runtime.block_on(async {
            tokio::time::timeout(self.timeout, async {
                let mut conn = self.pool.acquire().await?;
                stage = WriteStage::Execute;

                sqlx::query(&sql)
                    .bind(timestamp.with_timezone(&Utc))
                    .bind(i16::from(level.code()))
                    .bind(message)
                    .bind(vars.as_str())
                    .execute(&mut *conn)
                    .await?;

                Ok::<_, sqlx::Error>(())
            })
            .await
        });

        staged(stage, result)
    }
}
