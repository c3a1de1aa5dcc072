//! Campaign state registry — lifecycle states plus the execution lock.
//!
//! One slot per campaign: the cached lifecycle state and an `executing`
//! flag. `try_acquire_execution` is the mutual-exclusion primitive that
//! prevents two overlapping batches for the same campaign: under any
//! interleaving of concurrent acquires, exactly one caller observes
//! `true` until the matching release.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use callclaw_core::error::{CallClawError, Result};
use callclaw_core::types::CampaignStatus;

struct CampaignSlot {
    state: CampaignStatus,
    executing: bool,
    last_tick_at: Option<DateTime<Utc>>,
}

/// Process-wide, concurrency-safe campaign state registry.
#[derive(Default)]
pub struct CampaignStateStore {
    slots: Mutex<HashMap<String, CampaignSlot>>,
}

impl CampaignStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, CampaignSlot>> {
        // A poisoned lock only means another thread panicked mid-access;
        // the map itself stays consistent (every mutation is a single write).
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current cached state; `None` for never-started campaigns.
    pub fn get_state(&self, id: &str) -> Option<CampaignStatus> {
        self.slots().get(id).map(|slot| slot.state)
    }

    /// Register a campaign with its persisted state, if not already known.
    pub fn seed(&self, id: &str, state: CampaignStatus) {
        self.slots().entry(id.to_string()).or_insert(CampaignSlot {
            state,
            executing: false,
            last_tick_at: None,
        });
    }

    /// Validated lifecycle transition. Requesting the current state again
    /// is an idempotent no-op (two racing resumes produce one write).
    pub fn set_state(&self, id: &str, new_state: CampaignStatus) -> Result<CampaignStatus> {
        let mut slots = self.slots();
        let slot = slots
            .get_mut(id)
            .ok_or_else(|| CallClawError::CampaignNotFound(id.to_string()))?;
        if !slot.state.can_transition_to(new_state) {
            return Err(CallClawError::InvalidTransition(format!(
                "{} → {} for campaign {}",
                slot.state, new_state, id
            )));
        }
        slot.state = new_state;
        Ok(new_state)
    }

    /// Atomically claim execution: succeeds only when the campaign is
    /// `Running` and not already executing. On success the flag flips in
    /// the same critical section.
    pub fn try_acquire_execution(&self, id: &str) -> bool {
        let mut slots = self.slots();
        match slots.get_mut(id) {
            Some(slot) if slot.state == CampaignStatus::Running && !slot.executing => {
                slot.executing = true;
                slot.last_tick_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Release the execution lock. Idempotent.
    pub fn release_execution(&self, id: &str) {
        if let Some(slot) = self.slots().get_mut(id) {
            slot.executing = false;
        }
    }

    /// Whether a batch currently holds the campaign's execution lock.
    pub fn is_executing(&self, id: &str) -> bool {
        self.slots().get(id).is_some_and(|slot| slot.executing)
    }

    /// When the campaign was last picked up by a sweep.
    pub fn last_tick_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.slots().get(id).and_then(|slot| slot.last_tick_at)
    }
}
