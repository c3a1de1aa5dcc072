//! Scheduler sweep — externally triggered, short, bounded unit of work.
//!
//! Each sweep promotes due scheduled campaigns to running, then hands
//! every running campaign to the executor at most once. A campaign whose
//! execution lock is held skips silently: two ticks firing close together
//! (or two pollers over the same campaign set) never double-execute.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use callclaw_core::error::CallClawError;
use callclaw_core::types::{Campaign, CampaignStatus};

use crate::control::CampaignEngine;
use crate::token::RunToken;

impl CampaignEngine {
    /// One sweep over the campaign set. An empty due list is a no-op.
    pub async fn process_scheduled_campaigns(&self) {
        let now = Utc::now();

        // Promote due scheduled campaigns; they join the running sweep below
        match self.store.list_due_scheduled(now) {
            Ok(due) => {
                for campaign in due {
                    self.states.seed(&campaign.id, campaign.status);
                    if let Err(e) = self.states.set_state(&campaign.id, CampaignStatus::Running) {
                        tracing::debug!("Skipping promotion of {}: {}", campaign.id, e);
                        continue;
                    }
                    if let Err(e) = self
                        .store
                        .set_campaign_status(&campaign.id, CampaignStatus::Running)
                    {
                        tracing::warn!("⚠️ Failed to persist start of {}: {}", campaign.id, e);
                        continue;
                    }
                    tracing::info!("⏰ Campaign {} is due — now running", campaign.id);
                }
            }
            Err(e) => tracing::warn!("⚠️ Scheduler: due-campaign listing failed: {}", e),
        }

        // One executor pass per running campaign, campaigns concurrent
        let running = match self.store.list_running() {
            Ok(running) => running,
            Err(e) => {
                tracing::warn!("⚠️ Scheduler: running-campaign listing failed: {}", e);
                return;
            }
        };
        if running.is_empty() {
            return;
        }

        let passes: Vec<_> = running
            .into_iter()
            .filter_map(|campaign| {
                self.states.seed(&campaign.id, CampaignStatus::Running);
                if !self.states.try_acquire_execution(&campaign.id) {
                    // Already executing, or not actually running anymore
                    tracing::debug!("⏭️ Campaign {} busy — skipping this tick", campaign.id);
                    return None;
                }
                Some(self.run_one(campaign, now))
            })
            .collect();
        join_all(passes).await;
    }

    /// One executor pass; the executor releases the lock on every path.
    async fn run_one(&self, campaign: Campaign, now: DateTime<Utc>) {
        let token = RunToken::new(Arc::clone(&self.states), &campaign.id);
        match self.executor.run(&campaign, &token, now).await {
            Ok(report) => {
                if report.dispatched > 0 || report.skipped > 0 {
                    tracing::info!(
                        "📊 Campaign {}: dispatched {}, skipped {}, completed {}, failed {}",
                        campaign.id,
                        report.dispatched,
                        report.skipped,
                        report.completed,
                        report.failed
                    );
                }
            }
            // Quota exhaustion leaves the campaign running: it is retried
            // every sweep until minutes are restored or someone stops it
            Err(CallClawError::QuotaExceeded(reason)) => {
                tracing::warn!("💳 Campaign {} waiting on quota: {}", campaign.id, reason);
            }
            Err(e) => {
                tracing::error!("❌ Campaign {} batch failed: {}", campaign.id, e);
            }
        }
    }
}

/// Drive sweeps from a fixed interval. Spawn as a background tokio task.
pub async fn spawn_scheduler(engine: Arc<CampaignEngine>, tick_secs: u64) {
    tracing::info!("⏰ Campaign scheduler started (sweep every {}s)", tick_secs);
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_secs.max(1)));
    loop {
        interval.tick().await;
        engine.process_scheduled_campaigns().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callclaw_billing::PlanUsageGate;
    use callclaw_core::config::EngineConfig;
    use callclaw_core::types::{CallOutcome, CallingWindow, ConsentStatus, Contact, ContactStatus};
    use callclaw_db::{CampaignStore, MemoryStore};
    use callclaw_telephony::MockDispatcher;
    use chrono::Duration;

    /// A window that admits any sweep time, so tests are clock-independent.
    fn open_window() -> CallingWindow {
        CallingWindow {
            start_hour: 0,
            end_hour: 24,
            skip_weekends: false,
            skip_holidays: false,
        }
    }

    fn engine_with(dispatcher: MockDispatcher) -> (Arc<CampaignEngine>, Arc<MemoryStore>, Arc<MockDispatcher>) {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(dispatcher);
        let engine = Arc::new(CampaignEngine::new(
            store.clone(),
            dispatcher.clone(),
            Arc::new(PlanUsageGate::new(100_000)),
            &EngineConfig::default(),
        ));
        (engine, store, dispatcher)
    }

    fn seeded_campaign(store: &MemoryStore, id: &str, status: CampaignStatus) -> Campaign {
        let mut campaign = Campaign::new(id, "org1", "agent1");
        campaign.status = status;
        campaign.calling_window = open_window();
        store.save_campaign(&campaign).unwrap();
        campaign
    }

    #[tokio::test]
    async fn test_empty_sweep_is_noop() {
        let (engine, _store, dispatcher) = engine_with(MockDispatcher::new(CallOutcome::Completed));
        engine.process_scheduled_campaigns().await;
        assert_eq!(dispatcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_due_campaign_promoted_and_executed() {
        let (engine, store, dispatcher) = engine_with(MockDispatcher::new(CallOutcome::Completed));
        let mut campaign = seeded_campaign(&store, "c1", CampaignStatus::Scheduled);
        campaign.scheduled_at = Some(Utc::now() - Duration::minutes(5));
        store.save_campaign(&campaign).unwrap();
        store
            .insert_contact(&Contact::new("ct1", "c1", "+14155550001", ConsentStatus::Granted))
            .unwrap();

        engine.process_scheduled_campaigns().await;

        assert_eq!(engine.get_campaign_state("c1"), Some(CampaignStatus::Running));
        assert_eq!(dispatcher.call_count(), 1);
        let contact = store.get_contact("ct1").unwrap().unwrap();
        assert_eq!(contact.status, ContactStatus::Completed);
        // Lock free again after the pass
        assert!(!engine.state_store().is_executing("c1"));
    }

    #[tokio::test]
    async fn test_future_campaign_not_promoted() {
        let (engine, store, dispatcher) = engine_with(MockDispatcher::new(CallOutcome::Completed));
        let mut campaign = seeded_campaign(&store, "c1", CampaignStatus::Scheduled);
        campaign.scheduled_at = Some(Utc::now() + Duration::hours(1));
        store.save_campaign(&campaign).unwrap();

        engine.process_scheduled_campaigns().await;
        assert_eq!(
            store.get_campaign("c1").unwrap().unwrap().status,
            CampaignStatus::Scheduled
        );
        assert_eq!(dispatcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_ticks_never_double_execute() {
        // c2 scenario: tick 1 is mid-batch when tick 2 fires; tick 2's
        // sweep performs zero dispatches for the campaign.
        let (engine, store, dispatcher) =
            engine_with(MockDispatcher::new(CallOutcome::Completed).with_delay_ms(200));
        seeded_campaign(&store, "c2", CampaignStatus::Running);
        store
            .insert_contact(&Contact::new("ct1", "c2", "+14155550001", ConsentStatus::Granted))
            .unwrap();

        let tick1 = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.process_scheduled_campaigns().await })
        };
        // Let tick 1 acquire the lock and start its (slow) call
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        engine.process_scheduled_campaigns().await;
        // Tick 2 observed the held lock: still just one dispatch in flight
        assert!(dispatcher.call_count() <= 1);

        tick1.await.unwrap();
        assert_eq!(dispatcher.call_count(), 1);
        let contact = store.get_contact("ct1").unwrap().unwrap();
        assert_eq!(contact.status, ContactStatus::Completed);
    }

    #[tokio::test]
    async fn test_quota_blocked_campaign_stays_running() {
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(MockDispatcher::new(CallOutcome::Completed));
        let usage = Arc::new(PlanUsageGate::new(0)); // no minutes anywhere
        let engine = Arc::new(CampaignEngine::new(
            store.clone(),
            dispatcher.clone(),
            usage.clone(),
            &EngineConfig::default(),
        ));
        seeded_campaign(&store, "c1", CampaignStatus::Running);
        store
            .insert_contact(&Contact::new("ct1", "c1", "+14155550001", ConsentStatus::Granted))
            .unwrap();

        engine.process_scheduled_campaigns().await;
        // No dispatch, no abandonment: still running, retried next sweep
        assert_eq!(dispatcher.call_count(), 0);
        assert_eq!(engine.get_campaign_state("c1"), Some(CampaignStatus::Running));
        assert_eq!(
            store.get_campaign("c1").unwrap().unwrap().status,
            CampaignStatus::Running
        );

        // Minutes restored: the next sweep makes progress
        usage.set_budget("org1", 600);
        engine.process_scheduled_campaigns().await;
        assert_eq!(dispatcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_paused_campaign_not_swept() {
        let (engine, store, dispatcher) = engine_with(MockDispatcher::new(CallOutcome::Completed));
        seeded_campaign(&store, "c1", CampaignStatus::Running);
        store
            .insert_contact(&Contact::new("ct1", "c1", "+14155550001", ConsentStatus::Granted))
            .unwrap();

        // Pause through the control surface; the store row follows
        engine.pause_campaign("c1").unwrap();

        engine.process_scheduled_campaigns().await;
        assert_eq!(dispatcher.call_count(), 0);
    }
}
