//! Call attempt records and dispatch outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a dispatched call ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// Answered and ran to completion.
    Completed,
    NoAnswer,
    Busy,
    /// Provider accepted the call but never reported a terminal status.
    ProviderTimeout,
    /// Provider unreachable or transport failure.
    NetworkError,
    /// Contact asked to never be called again, mid-call.
    DncRequested,
    /// Permanent provider rejection (invalid number, blocked route).
    Rejected,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NoAnswer => "no_answer",
            Self::Busy => "busy",
            Self::ProviderTimeout => "provider_timeout",
            Self::NetworkError => "network_error",
            Self::DncRequested => "dnc_requested",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "no_answer" => Some(Self::NoAnswer),
            "busy" => Some(Self::Busy),
            "provider_timeout" => Some(Self::ProviderTimeout),
            "network_error" => Some(Self::NetworkError),
            "dnc_requested" => Some(Self::DncRequested),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the dispatcher reports back for one placed call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallReport {
    /// Provider-side call ID.
    pub call_id: String,
    pub outcome: CallOutcome,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: u32,
}

/// One row in the append-only call attempt log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAttempt {
    /// Unique attempt ID.
    pub id: String,
    pub contact_id: String,
    pub campaign_id: String,
    pub outcome: CallOutcome,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: u32,
    /// Whether this outcome was classified as retryable at record time.
    pub retryable: bool,
}

impl CallAttempt {
    /// Build an attempt row from a dispatcher report.
    pub fn from_report(
        contact_id: &str,
        campaign_id: &str,
        report: &CallReport,
        retryable: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            contact_id: contact_id.to_string(),
            campaign_id: campaign_id.to_string(),
            outcome: report.outcome,
            started_at: report.started_at,
            ended_at: report.ended_at,
            duration_seconds: report.duration_seconds,
            retryable,
        }
    }
}
