//! Unified error types for CallClaw.

use thiserror::Error;

/// Result type alias using CallClawError.
pub type Result<T> = std::result::Result<T, CallClawError>;

#[derive(Error, Debug)]
pub enum CallClawError {
    // Campaign lifecycle errors
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(String),

    // Compliance errors
    #[error("Compliance violation: {0}")]
    Compliance(String),

    // Billing errors
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Billing error: {0}")]
    Billing(String),

    // Telephony provider errors
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider timeout: {0}")]
    ProviderTimeout(String),

    // Persistence errors
    #[error("Store error: {0}")]
    Store(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl CallClawError {
    pub fn transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn billing(msg: impl Into<String>) -> Self {
        Self::Billing(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
