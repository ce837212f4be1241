// settings.rs - Layered Configuration

//! Runtime settings loaded with the `config` crate.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. `PEER_TRUST__<SECTION>__<KEY>` environment variables
//!
//! ```toml
//! [storage]
//! backend = "sled"
//! path = "/var/lib/peer-trust"
//! timeout_ms = 2000
//!
//! [chain]
//! max_path_length = 3
//! trust_decay = 0.8
//! marginal_threshold = 0.6
//!
//! [profile]
//! name = "alice"
//! ```

use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::observability::{MetricsConfig, TracingConfig};
use crate::persistence::StorageConfig;
use crate::trust::{ChainPolicy, ManagerConfig, Profile};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PEER_TRUST";

/// Separator between prefix, section and key in environment variables
pub const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// All runtime settings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageConfig,

    pub chain: ChainPolicy,

    /// Profile seed used when a new identity is generated
    pub profile: Profile,

    pub logging: TracingConfig,

    pub metrics: MetricsConfig,
}

impl Settings {
    /// Load defaults, then `path` (if given and present), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings: Settings = builder
            .add_source(env.separator(ENV_SEPARATOR).try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), SettingsError> {
        let chain = &self.chain;
        if chain.max_path_length < 2 {
            return Err(SettingsError::Invalid {
                field: "chain.max_path_length",
                reason: format!("must be at least 2, got {}", chain.max_path_length),
            });
        }
        if !(chain.trust_decay > 0.0 && chain.trust_decay <= 1.0) {
            return Err(SettingsError::Invalid {
                field: "chain.trust_decay",
                reason: format!("must be in (0, 1], got {}", chain.trust_decay),
            });
        }
        if !(0.0..=1.0).contains(&chain.marginal_threshold) {
            return Err(SettingsError::Invalid {
                field: "chain.marginal_threshold",
                reason: format!("must be in [0, 1], got {}", chain.marginal_threshold),
            });
        }
        if let Err(e) = self.logging.env_filter() {
            return Err(SettingsError::Invalid {
                field: "logging.filter",
                reason: e.to_string(),
            });
        }
        if self.storage.timeout_ms == 0 {
            return Err(SettingsError::Invalid {
                field: "storage.timeout_ms",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Manager configuration derived from these settings
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            chain: self.chain.clone(),
            storage_timeout: self.storage.timeout(),
        }
    }
}
