//! Server configuration.
//!
//! # Responsibility
//! - Parse the JSON configuration file consumed by `ResourceApiServer::from_config`.
//! - Report configuration and startup wiring failures as one error type.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid configuration.

use crate::db::DbError;
use crate::logging::default_log_level;
use crate::names::DEFAULT_MAX_ATTEMPTS;
use crate::server::registry::RegistryError;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    pub name_generation: NameGenerationConfig,
    pub logging: LoggingConfig,
}

/// Backend holding every registered collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    #[default]
    Memory,
    /// `path` may be `:memory:` for a private in-memory database.
    Sqlite { path: PathBuf },
}

impl StorageConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite { .. } => "sqlite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NameGenerationConfig {
    pub max_attempts: u32,
}

impl Default for NameGenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
    Db(DbError),
    Store(StoreError),
    Registry(RegistryError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
            Self::Db(err) => write!(f, "storage bootstrap failed: {err}"),
            Self::Store(err) => write!(f, "store bootstrap failed: {err}"),
            Self::Registry(err) => write!(f, "resource registration failed: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
            Self::Db(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Registry(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<DbError> for ConfigError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<StoreError> for ConfigError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<RegistryError> for ConfigError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl ServerConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name_generation.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "nameGeneration.maxAttempts must be at least 1".to_string(),
            ));
        }
        if let StorageConfig::Sqlite { path } = &self.storage {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "storage.path must not be empty".to_string(),
                ));
            }
        }
        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ServerConfig, StorageConfig};
    use crate::names::DEFAULT_MAX_ATTEMPTS;
    use std::path::PathBuf;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ServerConfig::from_json_str("{}").unwrap();
        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.name_generation.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn parses_sqlite_storage_and_overrides() {
        let config = ServerConfig::from_json_str(
            r#"{
                "storage": { "type": "sqlite", "path": "/var/lib/apistore/store.db" },
                "nameGeneration": { "maxAttempts": 3 },
                "logging": { "level": "warn", "dir": "/var/log/apistore" }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.storage,
            StorageConfig::Sqlite {
                path: PathBuf::from("/var/lib/apistore/store.db")
            }
        );
        assert_eq!(config.name_generation.max_attempts, 3);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn rejects_zero_attempts_and_relative_log_dir() {
        let err =
            ServerConfig::from_json_str(r#"{ "nameGeneration": { "maxAttempts": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("maxAttempts")));

        let err = ServerConfig::from_json_str(r#"{ "logging": { "dir": "logs" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("absolute")));
    }

    #[test]
    fn rejects_unknown_storage_type() {
        let err = ServerConfig::from_json_str(r#"{ "storage": { "type": "etcd" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
