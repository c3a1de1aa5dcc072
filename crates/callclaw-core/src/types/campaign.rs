//! Campaign definitions — lifecycle states and calling-window config.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Campaign lifecycle state.
///
/// `Stopped` and `Completed` are terminal; `Stopped` is reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Running,
    Paused,
    Stopped,
    Completed,
}

impl CampaignStatus {
    /// Whether no further automatic transition occurs from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed)
    }

    /// Validate a requested transition against the lifecycle table.
    /// Requesting the current state again is allowed (idempotent no-op).
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        if *self == next {
            return true;
        }
        // Stop is reachable from any non-terminal state
        if next == Self::Stopped {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Self::Draft, Self::Scheduled)
                | (Self::Draft, Self::Running)
                | (Self::Scheduled, Self::Running)
                | (Self::Running, Self::Paused)
                | (Self::Paused, Self::Running)
                | (Self::Running, Self::Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "scheduled" => Some(Self::Scheduled),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "stopped" => Some(Self::Stopped),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legal calling-window configuration, contact-local time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CallingWindow {
    /// First hour (inclusive) calls may be placed, 0-23.
    #[serde(default = "default_start_hour")]
    pub start_hour: u8,
    /// Hour (exclusive) after which calls may not be placed, 0-23.
    #[serde(default = "default_end_hour")]
    pub end_hour: u8,
    #[serde(default = "bool_true")]
    pub skip_weekends: bool,
    #[serde(default = "bool_true")]
    pub skip_holidays: bool,
}

fn default_start_hour() -> u8 { 9 }
fn default_end_hour() -> u8 { 17 }
fn bool_true() -> bool { true }

impl Default for CallingWindow {
    fn default() -> Self {
        Self {
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
            skip_weekends: true,
            skip_holidays: true,
        }
    }
}

/// An outbound calling campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique campaign ID.
    pub id: String,
    /// Owning organization.
    pub org_id: String,
    /// Voice agent used when dispatching calls.
    pub agent_id: String,
    /// Current lifecycle state.
    pub status: CampaignStatus,
    /// When a scheduled campaign becomes due (None = manual start only).
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Legal calling window applied to every contact.
    pub calling_window: CallingWindow,
    /// Max contacts pulled per executor pass.
    pub batch_size: u32,
    /// Cap on simultaneous outbound calls.
    pub max_concurrent_calls: u32,
    /// Retry budget per contact.
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Create a new draft campaign with engine defaults.
    pub fn new(id: &str, org_id: &str, agent_id: &str) -> Self {
        Self {
            id: id.to_string(),
            org_id: org_id.to_string(),
            agent_id: agent_id.to_string(),
            status: CampaignStatus::Draft,
            scheduled_at: None,
            calling_window: CallingWindow::default(),
            batch_size: 25,
            max_concurrent_calls: 5,
            max_attempts: 3,
            created_at: Utc::now(),
        }
    }

    /// Whether a scheduled campaign is due to start.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == CampaignStatus::Scheduled
            && self.scheduled_at.is_some_and(|at| at <= now)
    }
}
