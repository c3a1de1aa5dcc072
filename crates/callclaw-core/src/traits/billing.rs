//! Billing / usage-gate seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Answer from the billing service for a minutes-limit check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageDecision {
    pub allowed: bool,
    /// Populated when `allowed` is false, e.g. "plan minutes exhausted".
    pub reason: Option<String>,
}

impl UsageDecision {
    pub fn allow() -> Self {
        Self { allowed: true, reason: None }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self { allowed: false, reason: Some(reason.into()) }
    }
}

/// Gates call dispatch on the organization's remaining plan minutes.
#[async_trait]
pub trait UsageGate: Send + Sync {
    /// Check whether the organization may place another call.
    async fn check_minutes_limit(&self, org_id: &str) -> Result<UsageDecision>;

    /// Record consumed minutes after a call ends.
    async fn record_call_usage(
        &self,
        org_id: &str,
        duration_seconds: u32,
        call_id: &str,
    ) -> Result<()>;
}
