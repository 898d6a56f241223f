//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! across all UAP applications, plus the provisioning-flow configuration.
//!
//! # Usage
//!
//! ```rust,no_run
//! use uap_common::config::{ConfigLoader, ProvisionConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = ProvisionConfig::load(Path::new("provision.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::PAIRING_KEY_LEN;
use crate::slot::PairingKeySlot;
use crate::transport::{PairingCredentials, PairingPublicKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Error type for configuration loading operations.
///
/// This enum represents all possible errors that can occur when loading
/// configuration files.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Represents the verbosity level of logging output.
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across all UAP applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "uap-provision-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `service_name` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// This trait provides a default implementation that works with any type
/// implementing `serde::de::DeserializeOwned`.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Provisioning flow ──────────────────────────────────────────────

/// Credentials used to open the provisioning session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Slot to authenticate as.
    #[serde(default = "default_session_slot")]
    pub slot: PairingKeySlot,
    /// Hex-encoded private half (64 hex chars).
    pub private_key: String,
    /// Hex-encoded public half (64 hex chars).
    pub public_key: String,
}

fn default_session_slot() -> PairingKeySlot {
    PairingKeySlot::ADMIN
}

impl SessionConfig {
    /// Decode the configured keypair.
    pub fn credentials(&self) -> Result<PairingCredentials, ConfigError> {
        Ok(PairingCredentials::new(
            decode_key("session.private_key", &self.private_key)?,
            decode_key("session.public_key", &self.public_key)?,
        ))
    }
}

/// A pairing public key to provision into a slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingKeyEntry {
    pub slot: PairingKeySlot,
    /// Hex-encoded public key (64 hex chars).
    pub public_key: String,
}

impl PairingKeyEntry {
    pub fn key(&self) -> Result<PairingPublicKey, ConfigError> {
        decode_key(&format!("pairing_keys[{}].public_key", self.slot), &self.public_key)
    }
}

/// What to do with the R-config during provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Write the reference profile and verify it.
    #[serde(default)]
    pub apply: bool,
    /// Erase R-config before anything else.
    #[serde(default = "default_true")]
    pub erase_first: bool,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            apply: false,
            erase_first: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Simulator transport settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Persist chip state here between runs.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

/// Full provisioning-tool configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "uap-provision"
///
/// [session]
/// slot = 0
/// private_key = "..."
/// public_key = "..."
///
/// [[pairing_keys]]
/// slot = 2
/// public_key = "..."
///
/// [profile]
/// apply = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    pub shared: SharedConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub pairing_keys: Vec<PairingKeyEntry>,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl ProvisionConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `shared` is invalid
    /// - any key is not 32 hex-encoded bytes
    /// - two `pairing_keys` entries target the same slot
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.session.credentials()?;

        let mut seen = HashSet::new();
        for entry in &self.pairing_keys {
            entry.key()?;
            if !seen.insert(entry.slot) {
                return Err(ConfigError::ValidationError(format!(
                    "pairing key slot {} listed more than once",
                    entry.slot
                )));
            }
        }
        Ok(())
    }
}

fn decode_key(what: &str, text: &str) -> Result<[u8; PAIRING_KEY_LEN], ConfigError> {
    let bytes = hex::decode(text.trim())
        .map_err(|e| ConfigError::ValidationError(format!("{what}: {e}")))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        ConfigError::ValidationError(format!(
            "{what}: expected {PAIRING_KEY_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}
