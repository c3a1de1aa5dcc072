//! Contact records — the unit of work a campaign dials through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consent state for outbound marketing calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    Granted,
    Missing,
    Revoked,
}

impl ConsentStatus {
    pub fn allows_outbound(&self) -> bool {
        matches!(self, Self::Granted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Missing => "missing",
            Self::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "granted" => Some(Self::Granted),
            "missing" => Some(Self::Missing),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// Contact dialing status.
///
/// Moves only forward: `Pending → Queued → Dispatched → {Completed, Failed}`.
/// `DncBlocked` and `SkippedCompliance` are terminal before any call is
/// placed. `Failed` loops back to `Queued` only while retry budget remains.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    Pending,
    Queued,
    Dispatched,
    Completed,
    Failed,
    DncBlocked,
    SkippedCompliance,
}

impl ContactStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::DncBlocked | Self::SkippedCompliance
        )
    }

    /// Whether a contact in this status can be selected into a batch.
    pub fn is_selectable(&self) -> bool {
        matches!(self, Self::Pending | Self::Queued)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::DncBlocked => "dnc_blocked",
            Self::SkippedCompliance => "skipped_compliance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "queued" => Some(Self::Queued),
            "dispatched" => Some(Self::Dispatched),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "dnc_blocked" => Some(Self::DncBlocked),
            "skipped_compliance" => Some(Self::SkippedCompliance),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contact imported into a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Unique contact ID.
    pub id: String,
    pub campaign_id: String,
    /// E.164-ish phone number, e.g. "+14155550123".
    pub phone: String,
    pub consent: ConsentStatus,
    /// Derived from the organization DNC list at load time.
    pub dnc_listed: bool,
    pub status: ContactStatus,
    /// Number of call attempts placed so far.
    pub call_attempts: u32,
    /// Earliest time this contact may be selected again (backoff).
    pub next_eligible_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(id: &str, campaign_id: &str, phone: &str, consent: ConsentStatus) -> Self {
        Self {
            id: id.to_string(),
            campaign_id: campaign_id.to_string(),
            phone: phone.to_string(),
            consent,
            dnc_listed: false,
            status: ContactStatus::Pending,
            call_attempts: 0,
            next_eligible_at: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this contact can be selected into a batch at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        if !self.status.is_selectable() {
            return false;
        }
        match self.next_eligible_at {
            Some(at) => at <= now,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_terminal_statuses() {
        use ContactStatus::*;
        for status in [Completed, Failed, DncBlocked, SkippedCompliance] {
            assert!(status.is_terminal());
            assert!(!status.is_selectable());
        }
        for status in [Pending, Queued] {
            assert!(!status.is_terminal());
            assert!(status.is_selectable());
        }
        assert!(!Dispatched.is_terminal());
        assert!(!Dispatched.is_selectable());
    }

    #[test]
    fn test_eligibility_respects_backoff() {
        let now = Utc::now();
        let mut contact = Contact::new("ct1", "c1", "+14155550123", ConsentStatus::Granted);
        assert!(contact.is_eligible(now));

        contact.status = ContactStatus::Queued;
        contact.next_eligible_at = Some(now + Duration::minutes(10));
        assert!(!contact.is_eligible(now));
        assert!(contact.is_eligible(now + Duration::minutes(10)));
    }

    #[test]
    fn test_consent() {
        assert!(ConsentStatus::Granted.allows_outbound());
        assert!(!ConsentStatus::Missing.allows_outbound());
        assert!(!ConsentStatus::Revoked.allows_outbound());
    }
}
