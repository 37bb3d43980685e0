use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Largest remaining length an MQTT 3.1.1 fixed header can encode
pub const MQTT_MAX_PACKET_SIZE: usize = 268_435_455;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub broker: String,
    pub port: u16,
    pub topic: String,
    pub user: String,
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    pub icon: Option<String>,
    pub app_name: String,
    pub tls: bool,
    pub insecure: bool,
    /// Largest MQTT packet accepted from the broker, in bytes
    pub max_packet_size: usize,
    pub credential: CredentialConfig,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Value of the `service` attribute on the stored secret
    pub service: String,
    pub poll_interval_secs: u64,
    /// None polls until a secret appears or the process is stopped
    pub max_attempts: Option<u32>,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            service: "mqtt".to_string(),
            poll_interval_secs: 5,
            max_attempts: None,
        }
    }
}

impl CredentialConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_secs: 1,
            max_backoff_secs: 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            broker: String::new(),
            port: 8883,
            topic: String::new(),
            user: String::new(),
            client_id: None,
            keep_alive_secs: 60,
            icon: None,
            app_name: "Home Assistant".to_string(),
            tls: true,
            insecure: false,
            max_packet_size: MQTT_MAX_PACKET_SIZE,
            credential: CredentialConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain, then validate it
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let config = Self::discover(config_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file without validating it
    ///
    /// The first candidate that exists must load; a broken file is an error,
    /// never a silent fall back to defaults.
    pub fn discover(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }
        Self::discover_from(&Self::candidates())
    }

    /// ~/.config/<project>/<project>.yml, then ./<project>.yml
    fn candidates() -> Vec<PathBuf> {
        let project_name = env!("CARGO_PKG_NAME");
        let file_name = format!("{}.yml", project_name);

        let mut candidates = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join(project_name).join(&file_name));
        }
        candidates.push(PathBuf::from(file_name));
        candidates
    }

    fn discover_from(candidates: &[PathBuf]) -> Result<Self> {
        match candidates.iter().find(|path| path.exists()) {
            Some(path) => Self::load_from_file(path),
            None => {
                log::info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| BridgeError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        log::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Reject configurations the bridge cannot start with
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("broker", &self.broker), ("topic", &self.topic), ("user", &self.user)] {
            if value.trim().is_empty() {
                return Err(BridgeError::Config(format!("'{}' is required", name)));
            }
        }
        if self.port == 0 {
            return Err(BridgeError::Config("'port' must be non-zero".to_string()));
        }
        if self.max_packet_size == 0 {
            return Err(BridgeError::Config("'max_packet_size' must be non-zero".to_string()));
        }
        if self.credential.poll_interval_secs == 0 {
            return Err(BridgeError::Config(
                "'credential.poll_interval_secs' must be at least 1".to_string(),
            ));
        }
        if self.reconnect.initial_backoff_secs == 0 {
            return Err(BridgeError::Config(
                "'reconnect.initial_backoff_secs' must be at least 1".to_string(),
            ));
        }
        if self.reconnect.max_backoff_secs < self.reconnect.initial_backoff_secs {
            return Err(BridgeError::Config(
                "'reconnect.max_backoff_secs' must not be below 'reconnect.initial_backoff_secs'".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured client id, or one derived from the process id
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", env!("CARGO_PKG_NAME"), std::process::id()))
    }
}
