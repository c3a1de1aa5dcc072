//! # CallClaw Billing
//!
//! `UsageGate` implementations. The engine checks remaining plan minutes
//! before every dispatch and records consumed minutes after every call.
//!
//! - `HttpUsageGate` — billing service REST client (production)
//! - `PlanUsageGate` — in-process minute budget with atomic accounting,
//!   used by tests and single-node dev runs

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use callclaw_core::config::BillingConfig;
use callclaw_core::error::{CallClawError, Result};
use callclaw_core::traits::{UsageDecision, UsageGate};

/// Usage gate backed by the billing service.
pub struct HttpUsageGate {
    config: BillingConfig,
    client: reqwest::Client,
}

impl HttpUsageGate {
    pub fn new(config: BillingConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl UsageGate for HttpUsageGate {
    async fn check_minutes_limit(&self, org_id: &str) -> Result<UsageDecision> {
        let url = format!("{}/orgs/{}/minutes-limit", self.config.api_base, org_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(std::time::Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .map_err(|e| CallClawError::Billing(format!("Limit check failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(CallClawError::Billing(format!("Billing API error {status}")));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CallClawError::Billing(format!("Limit check parse: {e}")))?;
        Ok(UsageDecision {
            allowed: payload["allowed"].as_bool().unwrap_or(false),
            reason: payload["reason"].as_str().map(String::from),
        })
    }

    async fn record_call_usage(
        &self,
        org_id: &str,
        duration_seconds: u32,
        call_id: &str,
    ) -> Result<()> {
        let url = format!("{}/orgs/{}/usage", self.config.api_base, org_id);
        let body = serde_json::json!({
            "call_id": call_id,
            "duration_seconds": duration_seconds,
        });
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .map_err(|e| CallClawError::Billing(format!("Usage record failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(CallClawError::Billing(format!("Billing API error {status}")));
        }
        tracing::debug!("💾 Usage recorded: {}s for org {}", duration_seconds, org_id);
        Ok(())
    }
}

/// In-process plan gate — per-org remaining seconds.
pub struct PlanUsageGate {
    budgets: Mutex<HashMap<String, i64>>,
    /// Budget granted to orgs not explicitly configured.
    default_budget_seconds: i64,
}

impl PlanUsageGate {
    pub fn new(default_budget_seconds: i64) -> Self {
        Self {
            budgets: Mutex::new(HashMap::new()),
            default_budget_seconds,
        }
    }

    /// Set an explicit budget for one organization.
    pub fn set_budget(&self, org_id: &str, seconds: i64) {
        let mut budgets = self.budgets.lock().unwrap_or_else(|e| e.into_inner());
        budgets.insert(org_id.to_string(), seconds);
    }

    /// Remaining seconds for an organization.
    pub fn remaining(&self, org_id: &str) -> i64 {
        let budgets = self.budgets.lock().unwrap_or_else(|e| e.into_inner());
        budgets
            .get(org_id)
            .copied()
            .unwrap_or(self.default_budget_seconds)
    }
}

#[async_trait]
impl UsageGate for PlanUsageGate {
    async fn check_minutes_limit(&self, org_id: &str) -> Result<UsageDecision> {
        if self.remaining(org_id) > 0 {
            Ok(UsageDecision::allow())
        } else {
            Ok(UsageDecision::deny("plan minutes exhausted"))
        }
    }

    async fn record_call_usage(
        &self,
        org_id: &str,
        duration_seconds: u32,
        _call_id: &str,
    ) -> Result<()> {
        let mut budgets = self.budgets.lock().unwrap_or_else(|e| e.into_inner());
        let budget = budgets
            .entry(org_id.to_string())
            .or_insert(self.default_budget_seconds);
        *budget -= duration_seconds as i64;
        Ok(())
    }
}
