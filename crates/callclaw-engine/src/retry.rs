//! Retry policy — classifies call outcomes and computes backoff.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use callclaw_core::types::CallOutcome;

/// What to do with a contact after a call outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retryable,
    Terminal,
}

/// Backoff schedule and outcome classification.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before retry N (1-based); the last entry repeats.
    backoff: Vec<Duration>,
    /// Random extra delay added to spread retries across sweeps.
    jitter_secs: i64,
}

impl RetryPolicy {
    pub fn new(backoff_minutes: &[u32]) -> Self {
        let backoff = if backoff_minutes.is_empty() {
            vec![Duration::minutes(5)]
        } else {
            backoff_minutes
                .iter()
                .map(|m| Duration::minutes(*m as i64))
                .collect()
        };
        Self {
            backoff,
            jitter_secs: 30,
        }
    }

    /// Retry-or-terminal classification for a call outcome.
    pub fn classify(outcome: CallOutcome) -> Disposition {
        match outcome {
            CallOutcome::NoAnswer
            | CallOutcome::Busy
            | CallOutcome::ProviderTimeout
            | CallOutcome::NetworkError => Disposition::Retryable,
            CallOutcome::Completed | CallOutcome::DncRequested | CallOutcome::Rejected => {
                Disposition::Terminal
            }
        }
    }

    /// Base delay before retrying after `attempt` calls have been placed.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let idx = (attempt.max(1) as usize - 1).min(self.backoff.len() - 1);
        self.backoff[idx]
    }

    /// Next time the contact becomes eligible, with jitter.
    pub fn next_eligible(&self, attempt: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let jitter = if self.jitter_secs > 0 {
            Duration::seconds(rand::thread_rng().gen_range(0..=self.jitter_secs))
        } else {
            Duration::zero()
        };
        now + self.backoff_delay(attempt) + jitter
    }
}

impl Default for RetryPolicy {
    /// 5 min, 30 min, 2 h — the schedule used when config omits one.
    fn default() -> Self {
        Self::new(&[5, 30, 120])
    }
}
