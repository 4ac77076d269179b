//! Process configuration.
//!
//! Read once at startup from environment variables. Settings for the native
//! AdmissionReview endpoint are loaded and validated here so that a broken
//! policy file stops the process instead of rejecting every Pod.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::policy::{PolicyConfiguration, PolicySettings, SettingsError};

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;
/// Default health server port
pub const HEALTH_PORT: u16 = 8080;

const ENV_WEBHOOK_PORT: &str = "WEBHOOK_PORT";
const ENV_HEALTH_PORT: &str = "HEALTH_PORT";
const ENV_WEBHOOK_CERT_PATH: &str = "WEBHOOK_CERT_PATH";
const ENV_WEBHOOK_KEY_PATH: &str = "WEBHOOK_KEY_PATH";
const ENV_POLICY_SETTINGS_PATH: &str = "POLICY_SETTINGS_PATH";

/// Configuration errors. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}: expected a port number")]
    InvalidPort { name: &'static str, value: String },

    #[error("cannot read policy settings from {path}: {source}")]
    ReadSettings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid policy settings in {path}: {source}")]
    InvalidSettings {
        path: PathBuf,
        #[source]
        source: SettingsError,
    },
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub webhook_port: u16,
    pub health_port: u16,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Policy applied by the native AdmissionReview endpoint
    pub settings: PolicySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_port: WEBHOOK_PORT,
            health_port: HEALTH_PORT,
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            settings: PolicySettings::default(),
        }
    }
}

impl Config {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let webhook_port = parse_port(ENV_WEBHOOK_PORT, lookup(ENV_WEBHOOK_PORT))?
            .unwrap_or(defaults.webhook_port);
        let health_port = parse_port(ENV_HEALTH_PORT, lookup(ENV_HEALTH_PORT))?
            .unwrap_or(defaults.health_port);
        let cert_path = lookup(ENV_WEBHOOK_CERT_PATH)
            .map(PathBuf::from)
            .unwrap_or(defaults.cert_path);
        let key_path = lookup(ENV_WEBHOOK_KEY_PATH)
            .map(PathBuf::from)
            .unwrap_or(defaults.key_path);

        let settings = match lookup(ENV_POLICY_SETTINGS_PATH) {
            Some(path) => load_settings(Path::new(&path))?,
            None => {
                warn!(
                    "{} not set, native admission endpoint uses an empty policy",
                    ENV_POLICY_SETTINGS_PATH
                );
                PolicySettings::default()
            }
        };

        Ok(Self {
            webhook_port,
            health_port,
            cert_path,
            key_path,
            settings,
        })
    }

    /// Whether both TLS files exist
    pub fn tls_available(&self) -> bool {
        self.cert_path.exists() && self.key_path.exists()
    }

    /// Compile the configured settings
    pub fn policy(&self) -> Result<PolicyConfiguration, SettingsError> {
        self.settings.compile()
    }
}

fn parse_port(name: &'static str, value: Option<String>) -> Result<Option<u16>, ConfigError> {
    match value {
        None => Ok(None),
        Some(value) => match value.trim().parse::<u16>() {
            Ok(port) if port != 0 => Ok(Some(port)),
            _ => Err(ConfigError::InvalidPort { name, value }),
        },
    }
}

/// Read, decode and validate a settings file
pub fn load_settings(path: &Path) -> Result<PolicySettings, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadSettings {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |source| ConfigError::InvalidSettings {
        path: path.to_path_buf(),
        source,
    };
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(SettingsError::from)
        .map_err(invalid)?;
    let settings = PolicySettings::from_value(value).map_err(invalid)?;
    settings.validate().map_err(invalid)?;

    info!(
        path = %path.display(),
        denied = settings.denied_labels.len(),
        constrained = settings.constrained_labels.len(),
        "Loaded policy settings"
    );
    Ok(settings)
}
