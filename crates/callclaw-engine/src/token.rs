//! Cooperative cancellation for in-flight batches.
//!
//! Pause/stop flips the campaign's lifecycle state; the executor checks
//! the token between contacts. An in-flight call is allowed to finish,
//! but nothing further dispatches once the state leaves `Running`.

use std::sync::Arc;

use callclaw_core::types::CampaignStatus;

use crate::state::CampaignStateStore;

/// Campaign-scoped cancellation token handed to the batch executor.
#[derive(Clone)]
pub struct RunToken {
    states: Arc<CampaignStateStore>,
    campaign_id: String,
}

impl RunToken {
    pub fn new(states: Arc<CampaignStateStore>, campaign_id: &str) -> Self {
        Self {
            states,
            campaign_id: campaign_id.to_string(),
        }
    }

    /// True once the campaign is no longer `Running` (paused, stopped,
    /// or completed elsewhere).
    pub fn is_cancelled(&self) -> bool {
        self.states.get_state(&self.campaign_id) != Some(CampaignStatus::Running)
    }
}
