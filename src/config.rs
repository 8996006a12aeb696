use std::{fs, path::Path, path::PathBuf, time::Duration};

use eyre::Context;
use serde::Deserialize;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub trait ConfigManager: Sized + Clone + Send + Sync {
    fn get_log_path(&self) -> eyre::Result<String>;
}

#[derive(Default, Clone, Debug)]
pub struct LocalConfigManager {}

impl LocalConfigManager {
    pub fn new() -> Self {
        Self {}
    }
}

// NOTE: Requires HOME to be set when XDG_DATA_HOME isn't.
#[cfg(not(target_os = "windows"))]
pub fn home_dir() -> eyre::Result<PathBuf> {
    let home = std::env::var("HOME").context("$HOME not found")?;
    Ok(PathBuf::from(home))
}

#[cfg(target_os = "windows")]
pub fn home_dir() -> eyre::Result<PathBuf> {
    let home = std::env::var("USERPROFILE").context("%userprofile% not found")?;
    Ok(PathBuf::from(home))
}

pub fn data_dir() -> eyre::Result<PathBuf> {
    let data_dir = match std::env::var("XDG_DATA_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => home_dir()?.join(".local").join("share"),
    };

    Ok(data_dir.join("sinklog"))
}

impl ConfigManager for LocalConfigManager {
    fn get_log_path(&self) -> eyre::Result<String> {
        let mut path = data_dir()?;
        path.push("sinklog.log");

        match path.to_str() {
            Some(data) => Ok(data.to_string()),
            None => Err(eyre::eyre!("Can't construct log path in data dir!")),
        }
    }
}

/// Connection settings for a Postgres log table.
#[derive(Deserialize, Default, Clone, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct DbConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "Scheme")]
    pub schema: String,
    /// Humantime duration, e.g. `"30s"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

impl DbConfig {
    pub fn from_json(contents: &str) -> eyre::Result<Self> {
        let config: DbConfig =
            serde_json::from_str(contents).context("Failed parsing database config")?;
        config.validated()
    }

    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed reading database config {}", path.display()))?;
        Self::from_json(&contents)
    }

    /// Checks required settings and fills in defaults.
    pub fn validated(mut self) -> eyre::Result<Self> {
        if self.login.is_empty() {
            return Err(eyre::eyre!("parameter Login is empty"));
        }
        if self.password.is_empty() {
            return Err(eyre::eyre!("parameter Password is empty"));
        }
        if self.database.is_empty() {
            return Err(eyre::eyre!("parameter Database is empty"));
        }
        if self.host.is_empty() {
            self.host = "localhost".to_string();
        }
        if self.port.is_empty() {
            self.port = "5432".to_string();
        }
        if self.schema.is_empty() {
            self.schema = "public".to_string();
        }
        self.timeout()?;

        Ok(self)
    }

    pub fn port(&self) -> eyre::Result<u16> {
        self.port
            .parse()
            .with_context(|| format!("Invalid port {:?}", self.port))
    }

    pub fn timeout(&self) -> eyre::Result<Duration> {
        match &self.timeout {
            Some(timeout) => humantime::parse_duration(timeout)
                .with_context(|| format!("Invalid timeout {:?}", timeout)),
            None => Ok(DEFAULT_TIMEOUT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_defaults() {
        let config = DbConfig::from_json(
            r#"{"Database": "app", "Login": "svc", "Password": "secret"}"#,
        )
        .unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port().unwrap(), 5432);
        assert_eq!(config.schema, "public");
        assert_eq!(config.timeout().unwrap(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn accepts_legacy_scheme_key_and_timeout() {
        let config = DbConfig::from_json(
            r#"{"Host": "db", "Port": "6543", "Database": "app", "Login": "svc",
                "Password": "secret", "Scheme": "audit", "Timeout": "5s"}"#,
        )
        .unwrap();

        assert_eq!(config.host, "db");
        assert_eq!(config.port().unwrap(), 6543);
        assert_eq!(config.schema, "audit");
        assert_eq!(config.timeout().unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_missing_credentials() {
        let err = DbConfig::from_json(r#"{"Database": "app", "Login": "svc"}"#).unwrap_err();
        assert!(err.to_string().contains("Password"));

        let err = DbConfig::from_json(r#"{"Login": "svc", "Password": "x"}"#).unwrap_err();
        assert!(err.to_string().contains("Database"));
    }

    #[test]
    fn rejects_bad_timeout() {
        let result = DbConfig::from_json(
            r#"{"Database": "app", "Login": "svc", "Password": "x", "Timeout": "soon"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, r#"{"Database": "app", "Login": "svc", "Password": "x"}"#).unwrap();

        let config = DbConfig::load(&path).unwrap();

        assert_eq!(config.database, "app");
    }

    #[test]
    fn log_path_lives_in_data_dir() {
        let path = LocalConfigManager::new().get_log_path();
        if let Ok(path) = path {
            assert!(path.ends_with("sinklog.log"));
        }
    }
}
