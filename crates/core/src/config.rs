//! Configuration management for Trustgate.
//!
//! Trust policy is decided once at startup from a TOML file plus a small set
//! of environment overrides. Anything that cannot be mapped onto a known
//! network environment is a [`CoreError::Configuration`] and stops the
//! process; there is no fallback environment.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Environment variable selecting the network environment.
pub const ENV_NETWORK: &str = "TRUSTGATE_NETWORK";
/// Environment variable for the "ignore privileged messages" switch.
pub const ENV_IGNORE_DEV_MSG: &str = "TRUSTGATE_IGNORE_DEV_MSG";
/// Environment variable for the "use development privilege keys" switch.
pub const ENV_USE_DEV_PRIVILEGE_KEYS: &str = "TRUSTGATE_USE_DEV_PRIVILEGE_KEYS";

/// Network environment the node participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NetworkEnvironment {
    /// Local regtest-style network
    Local,
    /// Public test network
    Stagenet,
    /// Production network
    Mainnet,
}

impl NetworkEnvironment {
    /// All known environments, in declaration order.
    pub const ALL: [NetworkEnvironment; 3] = [
        NetworkEnvironment::Local,
        NetworkEnvironment::Stagenet,
        NetworkEnvironment::Mainnet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkEnvironment::Local => "local",
            NetworkEnvironment::Stagenet => "stagenet",
            NetworkEnvironment::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for NetworkEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkEnvironment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        // Accept the base-currency style names used by node launch scripts.
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "xmr_local" => Ok(NetworkEnvironment::Local),
            "stagenet" | "xmr_stagenet" => Ok(NetworkEnvironment::Stagenet),
            "mainnet" | "xmr_mainnet" => Ok(NetworkEnvironment::Mainnet),
            other => Err(CoreError::Configuration(format!(
                "unhandled network environment: {other:?}"
            ))),
        }
    }
}

impl TryFrom<String> for NetworkEnvironment {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<NetworkEnvironment> for String {
    fn from(value: NetworkEnvironment) -> Self {
        value.as_str().to_string()
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Process-wide trust configuration, immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustConfig {
    pub network: NetworkEnvironment,
    /// Do not subscribe to privileged facts from the network at all.
    #[serde(default)]
    pub ignore_privileged_messages: bool,
    /// Replace every trusted key list with the single developer key.
    #[serde(default)]
    pub use_dev_privilege_keys: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TrustConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CoreError::Configuration(e.to_string()))
    }

    /// Apply `TRUSTGATE_*` overrides from the process environment.
    pub fn apply_env_overrides(self) -> Result<Self> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = lookup(ENV_NETWORK) {
            self.network = network.parse()?;
            tracing::info!(network = %self.network, "Network overridden from {}", ENV_NETWORK);
        }
        if let Some(value) = lookup(ENV_IGNORE_DEV_MSG) {
            self.ignore_privileged_messages = parse_flag(ENV_IGNORE_DEV_MSG, &value)?;
        }
        if let Some(value) = lookup(ENV_USE_DEV_PRIVILEGE_KEYS) {
            self.use_dev_privilege_keys = parse_flag(ENV_USE_DEV_PRIVILEGE_KEYS, &value)?;
        }
        Ok(self)
    }

    pub fn default_config() -> Self {
        Self {
            network: NetworkEnvironment::Mainnet,
            ignore_privileged_messages: false,
            use_dev_privilege_keys: false,
            logging: LoggingConfig::default(),
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CoreError::Configuration(format!(
            "{name} must be a boolean, got {other:?}"
        ))),
    }
}
