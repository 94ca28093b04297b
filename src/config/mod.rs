use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::mask_secret;
use crate::FetchError;

pub const API_KEY_VAR: &str = "RAPIDAPI_KEY";
pub const API_HOST_VAR: &str = "RAPIDAPI_HOST";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transcript provider settings
    pub provider: ProviderConfig,

    /// Metadata scraping settings
    pub metadata: MetadataConfig,

    /// Speech generation settings
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key sent as `x-rapidapi-key`
    pub api_key: Option<String>,

    /// API host, also sent as `x-rapidapi-host`
    pub api_host: Option<String>,

    /// Timeout for the transcript request
    pub transcript_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Timeout for each metadata request
    pub timeout_secs: u64,

    /// User-Agent sent when fetching the watch page
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speech synthesis executable
    pub command: String,

    pub default_voice: String,

    pub default_rate: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_host: None,
            transcript_timeout_secs: 30,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            command: "edge-tts".to_string(),
            default_voice: "vi-VN-HoaiMyNeural".to_string(),
            default_rate: "+0%".to_string(),
        }
    }
}

/// Credentials required before any transcript request
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCredentials {
    pub api_key: String,
    pub api_host: String,
}

impl Config {
    /// Load configuration from file, or fall back to defaults
    pub fn load() -> Result<Self> {
        match Self::existing_config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!("Loading config from {}", path.display());

        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the user config path
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::user_config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Find a config file: current directory first, then the user config dir
    fn existing_config_path() -> Option<PathBuf> {
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        Self::user_config_path().ok().filter(|path| path.exists())
    }

    fn user_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("vidaux").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.provider.transcript_timeout_secs == 0 {
            anyhow::bail!("provider.transcript_timeout_secs must be greater than zero");
        }

        if self.metadata.timeout_secs == 0 {
            anyhow::bail!("metadata.timeout_secs must be greater than zero");
        }

        if self.speech.command.trim().is_empty() {
            anyhow::bail!("speech.command must not be empty");
        }

        Ok(())
    }

    /// Apply command-line / environment values over the file values
    pub fn with_provider_overrides(mut self, api_key: Option<String>, api_host: Option<String>) -> Self {
        if api_key.is_some() {
            self.provider.api_key = api_key;
        }
        if api_host.is_some() {
            self.provider.api_host = api_host;
        }
        self
    }

    /// Resolve the provider credentials, failing before any network call
    pub fn provider_credentials(&self) -> std::result::Result<ProviderCredentials, FetchError> {
        let api_key = non_blank(self.provider.api_key.as_deref())
            .ok_or(FetchError::ConfigurationMissing(API_KEY_VAR))?;
        let api_host = non_blank(self.provider.api_host.as_deref())
            .ok_or(FetchError::ConfigurationMissing(API_HOST_VAR))?;

        Ok(ProviderCredentials {
            api_key: api_key.to_string(),
            api_host: api_host.to_string(),
        })
    }

    pub fn transcript_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.transcript_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata.timeout_secs)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!(
            "  API Key: {}",
            self.provider
                .api_key
                .as_deref()
                .map(mask_secret)
                .unwrap_or_else(|| "(not set)".to_string())
        );
        println!(
            "  API Host: {}",
            self.provider.api_host.as_deref().unwrap_or("(not set)")
        );
        println!("  Transcript Timeout: {}s", self.provider.transcript_timeout_secs);
        println!("  Metadata Timeout: {}s", self.metadata.timeout_secs);
        println!("  Speech Command: {}", self.speech.command);
        println!("  Default Voice: {}", self.speech.default_voice);
        println!("  Default Rate: {}", self.speech.default_rate);
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
