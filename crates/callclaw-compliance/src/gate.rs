//! The compliance gate — pure pre-dispatch decision function.
//!
//! Checks run in fixed order, first failure wins:
//! DNC → consent → calling hours → weekend → holiday.
//! When the contact's timezone cannot be resolved, the hour/day checks
//! deny rather than allow: never fail open on legal calling restrictions.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use callclaw_core::types::{CallingWindow, Contact, ContactStatus};

use crate::timezone;
use crate::holidays;

/// Why a contact was denied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    DncBlocked,
    NoConsent,
    OutsideHours,
    WeekendSkip,
    HolidaySkip,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DncBlocked => "dnc_blocked",
            Self::NoConsent => "no_consent",
            Self::OutsideHours => "outside_hours",
            Self::WeekendSkip => "weekend_skip",
            Self::HolidaySkip => "holiday_skip",
        }
    }

    /// The terminal contact status this denial maps to.
    pub fn contact_status(&self) -> ContactStatus {
        match self {
            Self::DncBlocked => ContactStatus::DncBlocked,
            _ => ContactStatus::SkippedCompliance,
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate verdict for one contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceDecision {
    Allow,
    Deny(DenyReason),
}

impl ComplianceDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Pre-dispatch compliance checks.
pub struct ComplianceGate;

impl ComplianceGate {
    /// Evaluate whether `contact` may be called at `now` under `window`.
    pub fn evaluate(
        contact: &Contact,
        window: &CallingWindow,
        now: DateTime<Utc>,
    ) -> ComplianceDecision {
        // 1. Organization DNC list membership
        if contact.dnc_listed {
            return ComplianceDecision::Deny(DenyReason::DncBlocked);
        }

        // 2. Consent for outbound marketing calls
        if !contact.consent.allows_outbound() {
            return ComplianceDecision::Deny(DenyReason::NoConsent);
        }

        // 3-5. Calling-hour checks need the contact's local clock.
        // Unresolvable timezone denies: calling hours are unverifiable.
        let Some(local) = timezone::local_time(&contact.phone, now) else {
            tracing::debug!(
                "🚫 No timezone for {} (area code unrecognized) — failing closed",
                contact.phone
            );
            return ComplianceDecision::Deny(DenyReason::OutsideHours);
        };

        // 3. Local time within [start_hour, end_hour)
        let hour = local.hour() as u8;
        if hour < window.start_hour || hour >= window.end_hour {
            return ComplianceDecision::Deny(DenyReason::OutsideHours);
        }

        // 4. Weekend skip
        if window.skip_weekends
            && matches!(local.weekday(), Weekday::Sat | Weekday::Sun)
        {
            return ComplianceDecision::Deny(DenyReason::WeekendSkip);
        }

        // 5. Holiday skip
        if window.skip_holidays && holidays::is_us_holiday(local.date_naive()) {
            return ComplianceDecision::Deny(DenyReason::HolidaySkip);
        }

        ComplianceDecision::Allow
    }
}
