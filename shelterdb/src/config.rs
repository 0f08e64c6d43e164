//! Runtime configuration.
//!
//! Values come from an optional TOML file, then `SHELTERDB_*` environment variables override
//! individual keys:
//!
//! | Variable                      | Key                 |
//! |-------------------------------|---------------------|
//! | `SHELTERDB_BACKEND`           | `backend.kind`      |
//! | `SHELTERDB_MONGODB_DSN`       | `backend.dsn`       |
//! | `SHELTERDB_MONGODB_DATABASE`  | `backend.database`  |
//! | `SHELTERDB_LOG_LEVEL`         | `log_level`         |
//! | `SHELTERDB_DEFAULT_PAGE_SIZE` | `default_page_size` |
//! | `SHELTERDB_MAX_PAGE_SIZE`     | `max_page_size`     |
//! | `SHELTERDB_WEEK_START`        | `week_start`        |
//! | `SHELTERDB_DEADLINE_MS`       | `deadline_ms`       |
//!
//! ```toml
//! log_level = "info,shelterdb=debug"
//! week_start = "Mon"
//! deadline_ms = 5000
//!
//! [backend]
//! kind = "mongodb"
//! dsn = "mongodb://localhost:27017"
//! database = "shelter"
//! ```

use std::{path::Path, str::FromStr, time::Duration};

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shelterdb_core::{
    error::StoreResult,
    page::PagePolicy,
    store::{DocumentStore, DynDocumentStore, StoreOptions},
};

use shelterdb_memory::InMemoryStore;

pub const ENV_PREFIX: &str = "SHELTERDB_";

const DEFAULT_DSN: &str = "mongodb://localhost:27017";
const DEFAULT_DATABASE: &str = "shelter";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {key}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Which storage backend to connect to.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    #[default]
    Memory,
    Mongodb { dsn: String, database: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ShelterConfig {
    pub backend: BackendConfig,
    /// A `tracing` filter directive, `RUST_LOG` syntax.
    pub log_level: String,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// First day of the `this_week` statistics window.
    pub week_start: Weekday,
    /// Per-operation deadline in milliseconds. Unbounded when absent.
    pub deadline_ms: Option<u64>,
}

impl Default for ShelterConfig {
    fn default() -> Self {
        let paging = PagePolicy::default();

        Self {
            backend: BackendConfig::default(),
            log_level: "info".to_string(),
            default_page_size: paging.default_limit,
            max_page_size: paging.max_limit,
            week_start: Weekday::Sun,
            deadline_ms: None,
        }
    }
}

fn parse_env<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key: key.to_string(), value })
}

type EnvOverride = fn(&mut ShelterConfig, &str, String) -> Result<(), ConfigError>;

/// Applied in order: the backend kind before its connection settings.
const ENV_OVERRIDES: &[(&str, EnvOverride)] = &[
    ("BACKEND", |config, key, value| {
        config.backend = match value.trim().to_ascii_lowercase().as_str() {
            "memory" => BackendConfig::Memory,
            "mongodb" => match &config.backend {
                BackendConfig::Mongodb { .. } => return Ok(()),
                BackendConfig::Memory => BackendConfig::Mongodb {
                    dsn: DEFAULT_DSN.to_string(),
                    database: DEFAULT_DATABASE.to_string(),
                },
            },
            _ => return Err(ConfigError::InvalidEnv { key: key.to_string(), value }),
        };
        Ok(())
    }),
    ("MONGODB_DSN", |config, _, value| {
        if let BackendConfig::Mongodb { dsn, .. } = &mut config.backend {
            *dsn = value;
        }
        Ok(())
    }),
    ("MONGODB_DATABASE", |config, _, value| {
        if let BackendConfig::Mongodb { database, .. } = &mut config.backend {
            *database = value;
        }
        Ok(())
    }),
    ("LOG_LEVEL", |config, _, value| {
        config.log_level = value;
        Ok(())
    }),
    ("DEFAULT_PAGE_SIZE", |config, key, value| {
        config.default_page_size = parse_env(key, value)?;
        Ok(())
    }),
    ("MAX_PAGE_SIZE", |config, key, value| {
        config.max_page_size = parse_env(key, value)?;
        Ok(())
    }),
    ("WEEK_START", |config, key, value| {
        config.week_start = parse_env(key, value)?;
        Ok(())
    }),
    ("DEADLINE_MS", |config, key, value| {
        config.deadline_ms = Some(parse_env(key, value)?);
        Ok(())
    }),
];

impl ShelterConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads `path` if given, applies the process environment and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };

        let config = config.apply_env(|key| std::env::var(key).ok())?;
        config.validate().map_err(ConfigError::Invalid)?;

        Ok(config)
    }

    /// Overrides keys from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, apply) in ENV_OVERRIDES {
            let key = format!("{ENV_PREFIX}{name}");
            if let Some(value) = lookup(&key) {
                apply(&mut self, &key, value)?;
            }
        }

        Ok(self)
    }

    /// Validates the configuration and returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if self.deadline_ms == Some(0) {
            errors.push("Deadline cannot be 0".to_string());
        }

        if EnvFilter::try_new(&self.log_level).is_err() {
            errors.push(format!("Log level {:?} is not a valid filter", self.log_level));
        }

        if let BackendConfig::Mongodb { dsn, database } = &self.backend {
            if !(dsn.starts_with("mongodb://") || dsn.starts_with("mongodb+srv://")) {
                errors.push("MongoDB DSN must start with mongodb:// or mongodb+srv://".to_string());
            }
            if database.trim().is_empty() {
                errors.push("MongoDB database name cannot be empty".to_string());
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            paging: PagePolicy {
                default_limit: self.default_page_size,
                max_limit: self.max_page_size,
            },
            week_start: self.week_start,
            deadline: self.deadline_ms.map(Duration::from_millis),
        }
    }

    /// Builds the configured backend and wraps it in a store.
    ///
    /// # Errors
    ///
    /// [`StoreError::Initialization`](shelterdb_core::error::StoreError::Initialization) when the MongoDB backend is configured but the crate was
    /// built without the `mongodb` feature, or when the backend fails to start.
    pub async fn connect(&self) -> StoreResult<DynDocumentStore> {
        let options = self.store_options();

        match &self.backend {
            BackendConfig::Memory => {
                info!("using in-memory backend");
                Ok(DocumentStore::new(InMemoryStore::new())
                    .with_options(options)
                    .into_dyn())
            }
            #[cfg(feature = "mongodb")]
            BackendConfig::Mongodb { dsn, database } => {
                use shelterdb_core::backend::StoreBackendBuilder;

                let backend = shelterdb_mongodb::MongoDbStoreBuilder::new(dsn, database)
                    .build()
                    .await?;

                Ok(DocumentStore::new(backend).with_options(options).into_dyn())
            }
            #[cfg(not(feature = "mongodb"))]
            BackendConfig::Mongodb { .. } => Err(shelterdb_core::error::StoreError::Initialization(
                "the mongodb backend requires the `mongodb` feature".to_string(),
            )),
        }
    }

    /// A configuration suitable for tests: in-memory, debug logging, small pages.
    pub fn for_testing() -> Self {
        Self {
            backend: BackendConfig::Memory,
            log_level: "debug".to_string(),
            default_page_size: 10,
            max_page_size: 100,
            week_start: Weekday::Sun,
            deadline_ms: Some(5_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ShelterConfig::default();

        assert_eq!(config.backend, BackendConfig::Memory);
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_with_mongodb_backend() {
        let config = ShelterConfig::from_toml(
            r#"
            week_start = "Mon"
            deadline_ms = 2500

            [backend]
            kind = "mongodb"
            dsn = "mongodb://db:27017"
            database = "rescue"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.backend,
            BackendConfig::Mongodb { dsn: "mongodb://db:27017".into(), database: "rescue".into() }
        );
        assert_eq!(config.week_start, Weekday::Mon);
        assert_eq!(config.store_options().deadline, Some(Duration::from_millis(2500)));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_env_overrides_file_values() {
        let config = ShelterConfig::default()
            .apply_env(env(&[
                ("SHELTERDB_BACKEND", "mongodb"),
                ("SHELTERDB_MONGODB_DATABASE", "staging"),
                ("SHELTERDB_MAX_PAGE_SIZE", "50"),
                ("SHELTERDB_WEEK_START", "monday"),
            ]))
            .unwrap();

        assert_eq!(
            config.backend,
            BackendConfig::Mongodb { dsn: DEFAULT_DSN.into(), database: "staging".into() }
        );
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.week_start, Weekday::Mon);
    }

    #[test]
    fn test_malformed_env_value_is_rejected() {
        let result = ShelterConfig::default().apply_env(env(&[("SHELTERDB_DEFAULT_PAGE_SIZE", "lots")]));

        assert!(matches!(result, Err(ConfigError::InvalidEnv { key, .. }) if key == "SHELTERDB_DEFAULT_PAGE_SIZE"));
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let config = ShelterConfig {
            backend: BackendConfig::Mongodb { dsn: "localhost".into(), database: " ".into() },
            default_page_size: 0,
            deadline_ms: Some(0),
            ..ShelterConfig::default()
        };

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_env_backend_keeps_file_connection_and_ignores_stray_keys() {
        let file = ShelterConfig {
            backend: BackendConfig::Mongodb { dsn: "mongodb://db:27017".into(), database: "rescue".into() },
            ..ShelterConfig::default()
        };

        let kept = file
            .clone()
            .apply_env(env(&[("SHELTERDB_BACKEND", "MongoDB"), ("SHELTERDB_DEADLINE_MS", "750")]))
            .unwrap();
        assert_eq!(kept.backend, file.backend);
        assert_eq!(kept.deadline_ms, Some(750));

        let memory = file
            .apply_env(env(&[("SHELTERDB_BACKEND", "memory"), ("SHELTERDB_MONGODB_DSN", "mongodb://other")]))
            .unwrap();
        assert_eq!(memory.backend, BackendConfig::Memory);

        let error = ShelterConfig::default()
            .apply_env(env(&[("SHELTERDB_BACKEND", "postgres")]))
            .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidEnv { key, .. } if key == "SHELTERDB_BACKEND"));
    }

    #[test]
    fn test_default_page_size_above_max_is_invalid() {
        let config = ShelterConfig { default_page_size: 200, ..ShelterConfig::default() };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_memory_backend_connects() {
        let store = ShelterConfig::for_testing().connect().await.unwrap();

        assert_eq!(store.options().paging.default_limit, 10);
        assert!(store.list_collections().await.unwrap().is_empty());
    }
}
