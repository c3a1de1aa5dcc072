//! Public control surface — campaign lifecycle commands.
//!
//! All commands validate against the lifecycle table and are idempotent:
//! requesting a state the campaign is already in is a no-op. The registry
//! and the persisted row move together.

use std::sync::Arc;

use chrono::Utc;

use callclaw_core::config::EngineConfig;
use callclaw_core::error::{CallClawError, Result};
use callclaw_core::traits::{CallDispatcher, UsageGate};
use callclaw_core::types::{Campaign, CampaignStatus};
use callclaw_db::CampaignStore;

use crate::executor::BatchExecutor;
use crate::retry::RetryPolicy;
use crate::state::CampaignStateStore;

/// Facade wiring the state registry, executor, and collaborators.
pub struct CampaignEngine {
    pub(crate) store: Arc<dyn CampaignStore>,
    pub(crate) states: Arc<CampaignStateStore>,
    pub(crate) executor: BatchExecutor,
}

impl CampaignEngine {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        dispatcher: Arc<dyn CallDispatcher>,
        usage: Arc<dyn UsageGate>,
        config: &EngineConfig,
    ) -> Self {
        let states = Arc::new(CampaignStateStore::new());
        let executor = BatchExecutor::new(
            Arc::clone(&store),
            dispatcher,
            usage,
            Arc::clone(&states),
            RetryPolicy::new(&config.backoff_minutes),
        );
        Self {
            store,
            states,
            executor,
        }
    }

    /// The in-process state registry (execution locks live here).
    pub fn state_store(&self) -> &Arc<CampaignStateStore> {
        &self.states
    }

    /// Load the persisted campaign and make sure the registry knows it.
    fn hydrate(&self, id: &str) -> Result<Campaign> {
        let campaign = self
            .store
            .get_campaign(id)?
            .ok_or_else(|| CallClawError::CampaignNotFound(id.to_string()))?;
        self.states.seed(id, campaign.status);
        Ok(campaign)
    }

    /// Validated transition applied to registry and store together.
    fn transition(&self, id: &str, target: CampaignStatus) -> Result<()> {
        self.hydrate(id)?;
        self.states.set_state(id, target)?;
        self.store.set_campaign_status(id, target)?;
        Ok(())
    }

    /// Start a campaign. A future `scheduled_at` parks it at `Scheduled`
    /// for the sweep to promote; otherwise it goes straight to `Running`.
    pub fn start_campaign(&self, id: &str) -> Result<()> {
        let campaign = self.hydrate(id)?;
        let target = match campaign.scheduled_at {
            Some(at) if at > Utc::now() => CampaignStatus::Scheduled,
            _ => CampaignStatus::Running,
        };
        self.states.set_state(id, target)?;
        self.store.set_campaign_status(id, target)?;
        tracing::info!("▶️ Campaign {} → {}", id, target);
        Ok(())
    }

    /// Pause a running campaign. The in-flight batch finishes its current
    /// call and stops; contacts stay where they are.
    pub fn pause_campaign(&self, id: &str) -> Result<()> {
        self.transition(id, CampaignStatus::Paused)?;
        tracing::info!("⏸️ Campaign {} paused", id);
        Ok(())
    }

    /// Resume a paused campaign. Racing resumes collapse to one write.
    pub fn resume_campaign(&self, id: &str) -> Result<()> {
        self.transition(id, CampaignStatus::Running)?;
        tracing::info!("▶️ Campaign {} resumed", id);
        Ok(())
    }

    /// Stop a campaign for good. Terminal; reachable from any
    /// non-terminal state.
    pub fn stop_campaign(&self, id: &str) -> Result<()> {
        self.transition(id, CampaignStatus::Stopped)?;
        tracing::info!("⏹️ Campaign {} stopped", id);
        Ok(())
    }

    /// Cached lifecycle state; `None` for campaigns this process has
    /// never started or touched.
    pub fn get_campaign_state(&self, id: &str) -> Option<CampaignStatus> {
        self.states.get_state(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callclaw_billing::PlanUsageGate;
    use callclaw_core::types::CallOutcome;
    use callclaw_db::MemoryStore;
    use callclaw_telephony::MockDispatcher;
    use chrono::Duration;

    fn engine() -> (CampaignEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = CampaignEngine::new(
            store.clone(),
            Arc::new(MockDispatcher::new(CallOutcome::Completed)),
            Arc::new(PlanUsageGate::new(100_000)),
            &EngineConfig::default(),
        );
        (engine, store)
    }

    fn draft(store: &MemoryStore, id: &str) -> Campaign {
        let campaign = Campaign::new(id, "org1", "agent1");
        store.save_campaign(&campaign).unwrap();
        campaign
    }

    #[test]
    fn test_never_started_state_is_none() {
        let (engine, _store) = engine();
        assert_eq!(engine.get_campaign_state("ghost"), None);
    }

    #[test]
    fn test_start_pause_resume_stop() {
        let (engine, store) = engine();
        draft(&store, "c1");

        engine.start_campaign("c1").unwrap();
        assert_eq!(engine.get_campaign_state("c1"), Some(CampaignStatus::Running));

        engine.pause_campaign("c1").unwrap();
        assert_eq!(engine.get_campaign_state("c1"), Some(CampaignStatus::Paused));
        assert_eq!(
            store.get_campaign("c1").unwrap().unwrap().status,
            CampaignStatus::Paused
        );

        engine.resume_campaign("c1").unwrap();
        assert_eq!(engine.get_campaign_state("c1"), Some(CampaignStatus::Running));

        engine.stop_campaign("c1").unwrap();
        assert_eq!(engine.get_campaign_state("c1"), Some(CampaignStatus::Stopped));
        assert_eq!(
            store.get_campaign("c1").unwrap().unwrap().status,
            CampaignStatus::Stopped
        );
    }

    #[test]
    fn test_double_resume_is_one_write() {
        let (engine, store) = engine();
        draft(&store, "c1");
        engine.start_campaign("c1").unwrap();
        engine.pause_campaign("c1").unwrap();

        engine.resume_campaign("c1").unwrap();
        // The loser of the race observes already-running state: no-op
        engine.resume_campaign("c1").unwrap();
        assert_eq!(engine.get_campaign_state("c1"), Some(CampaignStatus::Running));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let (engine, store) = engine();
        draft(&store, "c1");

        // Draft cannot pause
        let err = engine.pause_campaign("c1").unwrap_err();
        assert!(matches!(err, CallClawError::InvalidTransition(_)));
        assert_eq!(engine.get_campaign_state("c1"), Some(CampaignStatus::Draft));

        // Stopped is terminal
        engine.start_campaign("c1").unwrap();
        engine.stop_campaign("c1").unwrap();
        let err = engine.resume_campaign("c1").unwrap_err();
        assert!(matches!(err, CallClawError::InvalidTransition(_)));
    }

    #[test]
    fn test_unknown_campaign_errors() {
        let (engine, _store) = engine();
        let err = engine.start_campaign("ghost").unwrap_err();
        assert!(matches!(err, CallClawError::CampaignNotFound(_)));
    }

    #[test]
    fn test_future_schedule_parks_at_scheduled() {
        let (engine, store) = engine();
        let mut campaign = draft(&store, "c1");
        campaign.scheduled_at = Some(Utc::now() + Duration::hours(2));
        store.save_campaign(&campaign).unwrap();

        engine.start_campaign("c1").unwrap();
        assert_eq!(
            engine.get_campaign_state("c1"),
            Some(CampaignStatus::Scheduled)
        );

        // A past schedule starts immediately
        let mut past = draft(&store, "c2");
        past.scheduled_at = Some(Utc::now() - Duration::hours(2));
        store.save_campaign(&past).unwrap();
        engine.start_campaign("c2").unwrap();
        assert_eq!(engine.get_campaign_state("c2"), Some(CampaignStatus::Running));
    }
}
