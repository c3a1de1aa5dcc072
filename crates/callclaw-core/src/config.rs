//! CallClaw configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallClawConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub telephony: TelephonyConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
}

impl Default for CallClawConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            telephony: TelephonyConfig::default(),
            billing: BillingConfig::default(),
            compliance: ComplianceConfig::default(),
        }
    }
}

impl CallClawConfig {
    /// Load config from the default path (~/.callclaw/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::CallClawError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::CallClawError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::CallClawError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".callclaw")
            .join("config.toml")
    }

    /// Get the CallClaw home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".callclaw")
    }
}

/// Execution engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scheduler sweep interval in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Default batch size when a campaign does not specify one.
    #[serde(default = "default_batch_size")]
    pub default_batch_size: u32,
    /// Default cap on simultaneous outbound calls per campaign.
    #[serde(default = "default_max_concurrent")]
    pub default_max_concurrent_calls: u32,
    /// Default retry budget per contact.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,
    /// Retry backoff schedule in minutes (attempt 1, 2, 3, ...).
    #[serde(default = "default_backoff_minutes")]
    pub backoff_minutes: Vec<u32>,
    /// Database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_tick_secs() -> u64 { 60 }
fn default_batch_size() -> u32 { 25 }
fn default_max_concurrent() -> u32 { 5 }
fn default_max_attempts() -> u32 { 3 }
fn default_backoff_minutes() -> Vec<u32> { vec![5, 30, 120] }
fn default_db_path() -> String { "~/.callclaw/campaigns.db".into() }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            default_batch_size: default_batch_size(),
            default_max_concurrent_calls: default_max_concurrent(),
            default_max_attempts: default_max_attempts(),
            backoff_minutes: default_backoff_minutes(),
            db_path: default_db_path(),
        }
    }
}

/// Telephony provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// How long to poll a placed call before classifying it as timed out.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_api_base() -> String { "https://api.voice-provider.example.com/v1".into() }
fn default_request_timeout() -> u64 { 30 }
fn default_poll_timeout() -> u64 { 300 }
fn default_poll_interval() -> u64 { 5 }

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout(),
            poll_timeout_secs: default_poll_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Billing / usage gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_billing_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_billing_base() -> String { "http://localhost:9200".into() }

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            api_base: default_billing_base(),
            api_key: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Compliance defaults applied when a campaign omits a calling window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceConfig {
    #[serde(default = "default_start_hour")]
    pub default_start_hour: u8,
    #[serde(default = "default_end_hour")]
    pub default_end_hour: u8,
    #[serde(default = "bool_true")]
    pub default_skip_weekends: bool,
    #[serde(default = "bool_true")]
    pub default_skip_holidays: bool,
}

fn default_start_hour() -> u8 { 9 }
fn default_end_hour() -> u8 { 17 }
fn bool_true() -> bool { true }

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            default_start_hour: default_start_hour(),
            default_end_hour: default_end_hour(),
            default_skip_weekends: true,
            default_skip_holidays: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CallClawConfig::default();
        assert_eq!(config.engine.tick_secs, 60);
        assert_eq!(config.engine.default_max_attempts, 3);
        assert_eq!(config.engine.backoff_minutes, vec![5, 30, 120]);
        assert_eq!(config.compliance.default_start_hour, 9);
        assert_eq!(config.compliance.default_end_hour, 17);
    }

    #[test]
    fn test_partial_toml() {
        let toml_str = r#"
            [engine]
            tick_secs = 30

            [telephony]
            api_key = "vk-test"
        "#;
        let config: CallClawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.tick_secs, 30);
        // Omitted fields fall back to defaults
        assert_eq!(config.engine.default_batch_size, 25);
        assert_eq!(config.telephony.api_key, "vk-test");
        assert_eq!(config.telephony.request_timeout_secs, 30);
    }

    #[test]
    fn test_roundtrip() {
        let config = CallClawConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: CallClawConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.engine.default_batch_size, config.engine.default_batch_size);
    }
}
