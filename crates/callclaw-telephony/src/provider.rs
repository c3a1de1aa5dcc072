//! Voice-provider client — places a call and waits for its outcome.

use async_trait::async_trait;
use chrono::Utc;

use callclaw_core::config::TelephonyConfig;
use callclaw_core::error::{CallClawError, Result};
use callclaw_core::traits::CallDispatcher;
use callclaw_core::types::{CallOutcome, CallReport};

/// Dispatcher backed by the provider's REST API.
pub struct HttpCallDispatcher {
    config: TelephonyConfig,
    client: reqwest::Client,
}

impl HttpCallDispatcher {
    pub fn new(config: TelephonyConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Map a provider status string to a call outcome.
    /// Unknown terminal-ish strings classify as retryable network errors.
    fn outcome_from_status(status: &str) -> Option<CallOutcome> {
        match status {
            "completed" | "ended" => Some(CallOutcome::Completed),
            "no-answer" | "no_answer" => Some(CallOutcome::NoAnswer),
            "busy" => Some(CallOutcome::Busy),
            "dnc-requested" | "dnc_requested" => Some(CallOutcome::DncRequested),
            "rejected" | "blocked" | "invalid-number" => Some(CallOutcome::Rejected),
            "failed" | "error" => Some(CallOutcome::NetworkError),
            // queued, ringing, in-progress: keep polling
            _ => None,
        }
    }

    async fn place(&self, agent_id: &str, phone: &str, metadata: &serde_json::Value) -> Result<String> {
        let url = format!("{}/calls", self.config.api_base);
        let body = serde_json::json!({
            "assistant_id": agent_id,
            "customer": { "number": phone },
            "metadata": metadata,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .map_err(|e| CallClawError::Provider(format!("Create call failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CallClawError::Provider(format!(
                "Provider API error {status}: {body}"
            )));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CallClawError::Provider(format!("Create call parse: {e}")))?;
        payload["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| CallClawError::Provider("Create call: no id in response".into()))
    }

    async fn poll_status(&self, call_id: &str) -> Result<(String, u32)> {
        let url = format!("{}/calls/{}", self.config.api_base, call_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(std::time::Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .map_err(|e| CallClawError::Provider(format!("Poll call failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(CallClawError::Provider(format!("Poll API error {status}")));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CallClawError::Provider(format!("Poll call parse: {e}")))?;
        let status = payload["status"].as_str().unwrap_or("").to_string();
        let duration = payload["duration_seconds"].as_u64().unwrap_or(0) as u32;
        Ok((status, duration))
    }
}

#[async_trait]
impl CallDispatcher for HttpCallDispatcher {
    fn name(&self) -> &str {
        "voice-provider"
    }

    async fn create_call(
        &self,
        agent_id: &str,
        phone: &str,
        metadata: serde_json::Value,
    ) -> Result<CallReport> {
        let started_at = Utc::now();
        let call_id = self.place(agent_id, phone, &metadata).await?;
        tracing::info!("📞 Call placed: {} → {}", call_id, phone);

        // Poll until the provider reports a terminal status
        let deadline = std::time::Instant::now()
            + std::time::Duration::from_secs(self.config.poll_timeout_secs);
        let interval = std::time::Duration::from_secs(self.config.poll_interval_secs.max(1));

        loop {
            tokio::time::sleep(interval).await;

            let (status, duration) = self.poll_status(&call_id).await?;
            if let Some(outcome) = Self::outcome_from_status(&status) {
                tracing::info!("📴 Call {} ended: {} ({}s)", call_id, outcome, duration);
                return Ok(CallReport {
                    call_id,
                    outcome,
                    started_at,
                    ended_at: Utc::now(),
                    duration_seconds: duration,
                });
            }

            if std::time::Instant::now() >= deadline {
                tracing::warn!("⚠️ Call {} never reached a terminal status", call_id);
                return Ok(CallReport {
                    call_id,
                    outcome: CallOutcome::ProviderTimeout,
                    started_at,
                    ended_at: Utc::now(),
                    duration_seconds: 0,
                });
            }
        }
    }
}
