use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::monitor::ForecastConfig;
use crate::error::SysfeedError;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the subscriber registry binds to
    pub host: String,
    pub port: u16,
    /// Delay between the end of one publish and the next sampling cycle
    pub interval_ms: u64,
    /// Window CPU usage is averaged over on each tick
    pub cpu_sample_ms: u64,
    /// Upper bound for each external GPU probe command
    pub probe_timeout_ms: u64,
    /// Frames a slow observer may lag before skipping
    pub channel_capacity: usize,
    pub forecast: ForecastConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            interval_ms: 1000,
            cpu_sample_ms: 1000,
            probe_timeout_ms: 1500,
            channel_capacity: crate::server::DEFAULT_CHANNEL_CAPACITY,
            forecast: ForecastConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when the
    /// file is missing, empty or unreadable as JSON.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let data = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        if data.trim().is_empty() {
            return Ok(Config::default());
        }

        Ok(serde_json::from_str(&data).unwrap_or_else(|e| {
            // Can happen when the config format changes between versions
            log::warn!(
                "Ignoring unreadable config file {:?}: {}",
                config_path,
                e
            );
            Config::default()
        }))
    }

    /// Load an explicitly requested config file; any problem is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_json::from_str(&data).with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, data).with_context(|| format!("Failed to write config file: {:?}", path))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("sysfeed").join("config.json"))
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.host.trim().is_empty() {
            return Err(SysfeedError::config("host must not be empty"));
        }
        if self.interval_ms == 0 {
            return Err(SysfeedError::config("interval_ms must be > 0"));
        }
        if self.probe_timeout_ms == 0 {
            return Err(SysfeedError::config("probe_timeout_ms must be > 0"));
        }
        if self.channel_capacity == 0 {
            return Err(SysfeedError::config("channel_capacity must be > 0"));
        }
        self.forecast.validate()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn cpu_sample(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}
