//! Batch executor — one bounded pass over a campaign's pending contacts.
//!
//! Per pass: load a FIFO slice, gate every contact (compliance, then plan
//! minutes), dispatch through a semaphore-bounded worker pool, record each
//! outcome and apply the retry policy. All store writes happen on the
//! executor task; spawned tasks only talk to the telephony provider.
//! The execution lock is released in every exit path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use callclaw_compliance::{ComplianceDecision, ComplianceGate};
use callclaw_core::error::{CallClawError, Result};
use callclaw_core::traits::{CallDispatcher, UsageGate};
use callclaw_core::types::{
    CallAttempt, CallOutcome, CallReport, Campaign, CampaignStatus, Contact, ContactStatus,
};
use callclaw_db::CampaignStore;

use crate::retry::{Disposition, RetryPolicy};
use crate::state::CampaignStateStore;
use crate::token::RunToken;

/// What one executor pass did.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct BatchReport {
    /// Calls handed to the dispatcher.
    pub dispatched: u32,
    /// Contacts denied by the compliance gate.
    pub skipped: u32,
    /// Contacts that reached `completed` this pass.
    pub completed: u32,
    /// Contacts that reached `failed` this pass.
    pub failed: u32,
    /// Non-fatal dispatch errors (call-level, classified retryable).
    pub errors: Vec<String>,
}

/// Executes one batch for one campaign while the execution lock is held.
pub struct BatchExecutor {
    store: Arc<dyn CampaignStore>,
    dispatcher: Arc<dyn CallDispatcher>,
    usage: Arc<dyn UsageGate>,
    states: Arc<CampaignStateStore>,
    retry: RetryPolicy,
}

impl BatchExecutor {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        dispatcher: Arc<dyn CallDispatcher>,
        usage: Arc<dyn UsageGate>,
        states: Arc<CampaignStateStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            dispatcher,
            usage,
            states,
            retry,
        }
    }

    /// Run one batch. The caller must hold the campaign's execution lock;
    /// it is released here on every path, success or error.
    pub async fn run(
        &self,
        campaign: &Campaign,
        token: &RunToken,
        now: DateTime<Utc>,
    ) -> Result<BatchReport> {
        let result = self.run_inner(campaign, token, now).await;
        self.states.release_execution(&campaign.id);
        result
    }

    async fn run_inner(
        &self,
        campaign: &Campaign,
        token: &RunToken,
        now: DateTime<Utc>,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        let batch =
            self.store
                .load_batch(&campaign.id, &campaign.org_id, campaign.batch_size, now)?;

        if batch.is_empty() {
            // Nothing selectable. If nothing non-terminal remains either,
            // the campaign has run its course.
            if self.store.count_non_terminal(&campaign.id)? == 0 {
                self.states
                    .set_state(&campaign.id, CampaignStatus::Completed)?;
                self.store
                    .set_campaign_status(&campaign.id, CampaignStatus::Completed)?;
                tracing::info!("🏁 Campaign {} completed", campaign.id);
            }
            return Ok(report);
        }

        tracing::info!(
            "📋 Campaign {}: executing batch of {} contacts",
            campaign.id,
            batch.len()
        );

        let semaphore = Arc::new(Semaphore::new(campaign.max_concurrent_calls.max(1) as usize));
        let mut in_flight: JoinSet<(Contact, Result<CallReport>)> = JoinSet::new();
        let mut quota_hit: Option<String> = None;

        for mut contact in batch {
            // Cooperative cancellation between contacts; in-flight calls finish
            if token.is_cancelled() {
                tracing::info!(
                    "⏸️ Campaign {} left running state — stopping batch",
                    campaign.id
                );
                break;
            }

            // Compliance gate: deny skips the contact, no call attempt exists
            if let ComplianceDecision::Deny(reason) =
                ComplianceGate::evaluate(&contact, &campaign.calling_window, now)
            {
                tracing::info!("🚫 Contact {} skipped: {}", contact.id, reason);
                contact.status = reason.contact_status();
                self.store.update_contact(&contact)?;
                report.skipped += 1;
                continue;
            }

            // Plan-minutes gate: exhaustion aborts the remainder of the batch
            let decision = self.usage.check_minutes_limit(&campaign.org_id).await?;
            if !decision.allowed {
                quota_hit =
                    Some(decision.reason.unwrap_or_else(|| "minutes limit reached".into()));
                break;
            }

            contact.status = ContactStatus::Dispatched;
            self.store.update_contact(&contact)?;
            report.dispatched += 1;

            let dispatcher = Arc::clone(&self.dispatcher);
            let semaphore = Arc::clone(&semaphore);
            let agent_id = campaign.agent_id.clone();
            let metadata = serde_json::json!({
                "campaign_id": campaign.id,
                "contact_id": contact.id,
            });
            in_flight.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return (
                            contact,
                            Err(CallClawError::Other(format!("worker pool closed: {e}"))),
                        );
                    }
                };
                let result = dispatcher
                    .create_call(&agent_id, &contact.phone, metadata)
                    .await;
                (contact, result)
            });
        }

        // Settle outcomes as calls finish; all store writes stay on this task
        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok((contact, result)) => {
                    self.settle_call(campaign, contact, result, now, &mut report)
                        .await?;
                }
                Err(e) => report.errors.push(format!("call task failed: {e}")),
            }
        }

        if let Some(reason) = quota_hit {
            tracing::warn!(
                "💳 Campaign {}: minutes quota exhausted mid-batch — {}",
                campaign.id,
                reason
            );
            return Err(CallClawError::QuotaExceeded(reason));
        }

        Ok(report)
    }

    /// Record one finished call: attempt log, contact status, retry policy,
    /// usage minutes.
    async fn settle_call(
        &self,
        campaign: &Campaign,
        mut contact: Contact,
        result: Result<CallReport>,
        now: DateTime<Utc>,
        report: &mut BatchReport,
    ) -> Result<()> {
        let call = match result {
            Ok(call) => call,
            Err(e) => {
                // Provider unreachable or timed out: retryable outcome,
                // never aborts the rest of the batch
                tracing::warn!("⚠️ Dispatch failed for contact {}: {}", contact.id, e);
                report.errors.push(format!("{}: {e}", contact.id));
                CallReport {
                    call_id: format!("unplaced-{}", contact.id),
                    outcome: CallOutcome::NetworkError,
                    started_at: now,
                    ended_at: now,
                    duration_seconds: 0,
                }
            }
        };

        contact.call_attempts += 1;

        // An in-call DNC request short-circuits any remaining retry budget:
        // block the contact and append the number to the org DNC list.
        if call.outcome == CallOutcome::DncRequested {
            tracing::info!("🚫 Contact {} requested DNC during call", contact.id);
            contact.status = ContactStatus::DncBlocked;
            contact.next_eligible_at = None;
            self.store.add_dnc(&campaign.org_id, &contact.phone)?;
            self.store.update_contact(&contact)?;
            self.record_usage(campaign, &call).await;
            return Ok(());
        }

        let disposition = RetryPolicy::classify(call.outcome);
        match disposition {
            Disposition::Terminal => {
                contact.next_eligible_at = None;
                if call.outcome == CallOutcome::Completed {
                    contact.status = ContactStatus::Completed;
                    report.completed += 1;
                } else {
                    contact.status = ContactStatus::Failed;
                    report.failed += 1;
                }
            }
            Disposition::Retryable => {
                if contact.call_attempts < campaign.max_attempts {
                    contact.status = ContactStatus::Queued;
                    contact.next_eligible_at =
                        Some(self.retry.next_eligible(contact.call_attempts, now));
                    tracing::debug!(
                        "🔁 Contact {} requeued after {} (attempt {}/{})",
                        contact.id,
                        call.outcome,
                        contact.call_attempts,
                        campaign.max_attempts
                    );
                } else {
                    contact.status = ContactStatus::Failed;
                    contact.next_eligible_at = None;
                    report.failed += 1;
                }
            }
        }

        let attempt = CallAttempt::from_report(
            &contact.id,
            &campaign.id,
            &call,
            disposition == Disposition::Retryable,
        );
        self.store.record_attempt(&contact, &attempt)?;
        self.record_usage(campaign, &call).await;
        Ok(())
    }

    /// Bill consumed minutes. A billing hiccup is logged, not fatal.
    async fn record_usage(&self, campaign: &Campaign, call: &CallReport) {
        if call.duration_seconds == 0 {
            return;
        }
        if let Err(e) = self
            .usage
            .record_call_usage(&campaign.org_id, call.duration_seconds, &call.call_id)
            .await
        {
            tracing::warn!("⚠️ Usage record failed for call {}: {}", call.call_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callclaw_billing::PlanUsageGate;
    use callclaw_core::traits::UsageDecision;
    use callclaw_core::types::ConsentStatus;
    use callclaw_db::MemoryStore;
    use callclaw_telephony::MockDispatcher;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicU32, Ordering};

    // Tuesday 2026-03-10 18:00 UTC = 10:00 local for +1415 numbers
    fn tuesday_business_hours() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 18, 0, 0).unwrap()
    }

    struct Harness {
        store: Arc<MemoryStore>,
        states: Arc<CampaignStateStore>,
        dispatcher: Arc<MockDispatcher>,
        usage: Arc<PlanUsageGate>,
        executor: BatchExecutor,
    }

    fn harness(dispatcher: MockDispatcher) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let states = Arc::new(CampaignStateStore::new());
        let dispatcher = Arc::new(dispatcher);
        let usage = Arc::new(PlanUsageGate::new(100_000));
        let executor = BatchExecutor::new(
            store.clone(),
            dispatcher.clone(),
            usage.clone(),
            states.clone(),
            RetryPolicy::default(),
        );
        Harness {
            store,
            states,
            dispatcher,
            usage,
            executor,
        }
    }

    fn running_campaign(h: &Harness, id: &str) -> Campaign {
        let mut campaign = Campaign::new(id, "org1", "agent1");
        campaign.status = CampaignStatus::Running;
        h.store.save_campaign(&campaign).unwrap();
        h.states.seed(id, CampaignStatus::Running);
        assert!(h.states.try_acquire_execution(id));
        campaign
    }

    fn contact(h: &Harness, id: &str, campaign_id: &str, phone: &str) -> Contact {
        let contact = Contact::new(id, campaign_id, phone, ConsentStatus::Granted);
        h.store.insert_contact(&contact).unwrap();
        contact
    }

    #[tokio::test]
    async fn test_zero_contacts_completes_campaign() {
        let h = harness(MockDispatcher::new(CallOutcome::Completed));
        let campaign = running_campaign(&h, "c1");
        let token = RunToken::new(h.states.clone(), "c1");

        let report = h
            .executor
            .run(&campaign, &token, tuesday_business_hours())
            .await
            .unwrap();
        assert_eq!(report.dispatched, 0);
        assert_eq!(h.states.get_state("c1"), Some(CampaignStatus::Completed));
        assert_eq!(
            h.store.get_campaign("c1").unwrap().unwrap().status,
            CampaignStatus::Completed
        );
        assert!(!h.states.is_executing("c1"));
    }

    #[tokio::test]
    async fn test_valid_and_dnc_contacts() {
        // Campaign c1: A valid, B on the org DNC list; window 9-17, local 10:00.
        // A dispatches with one attempt; B blocks with zero attempts.
        let h = harness(MockDispatcher::new(CallOutcome::Completed));
        let campaign = running_campaign(&h, "c1");
        contact(&h, "a", "c1", "+14155550001");
        contact(&h, "b", "c1", "+14155550002");
        h.store.add_dnc("org1", "+14155550002").unwrap();

        let token = RunToken::new(h.states.clone(), "c1");
        let report = h
            .executor
            .run(&campaign, &token, tuesday_business_hours())
            .await
            .unwrap();

        assert_eq!(report.dispatched, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.completed, 1);

        let a = h.store.get_contact("a").unwrap().unwrap();
        assert_eq!(a.status, ContactStatus::Completed);
        assert_eq!(h.store.list_attempts("a").unwrap().len(), 1);

        let b = h.store.get_contact("b").unwrap().unwrap();
        assert_eq!(b.status, ContactStatus::DncBlocked);
        assert!(h.store.list_attempts("b").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compliance_denial_leaves_no_attempt() {
        let h = harness(MockDispatcher::new(CallOutcome::Completed));
        let campaign = running_campaign(&h, "c1");
        let mut no_consent = Contact::new("nc", "c1", "+14155550001", ConsentStatus::Revoked);
        no_consent.created_at = tuesday_business_hours() - Duration::minutes(1);
        h.store.insert_contact(&no_consent).unwrap();

        let token = RunToken::new(h.states.clone(), "c1");
        let report = h
            .executor
            .run(&campaign, &token, tuesday_business_hours())
            .await
            .unwrap();

        assert_eq!(report.dispatched, 0);
        assert_eq!(report.skipped, 1);
        let loaded = h.store.get_contact("nc").unwrap().unwrap();
        assert_eq!(loaded.status, ContactStatus::SkippedCompliance);
        assert!(h.store.list_attempts("nc").unwrap().is_empty());
        assert_eq!(h.dispatcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_answer_retries_then_fails() {
        let dispatcher = MockDispatcher::new(CallOutcome::NoAnswer);
        let h = harness(dispatcher);
        let campaign = running_campaign(&h, "c1");
        contact(&h, "ct1", "c1", "+14155550001");
        let token = RunToken::new(h.states.clone(), "c1");

        let t0 = tuesday_business_hours();
        // Attempt 1: requeued with ~5 min backoff
        h.executor.run(&campaign, &token, t0).await.unwrap();
        let after1 = h.store.get_contact("ct1").unwrap().unwrap();
        assert_eq!(after1.status, ContactStatus::Queued);
        assert_eq!(after1.call_attempts, 1);
        let eligible = after1.next_eligible_at.unwrap();
        assert!(eligible > t0 + Duration::minutes(4));
        assert!(eligible <= t0 + Duration::minutes(6));

        // Batch before the backoff expires selects nothing
        assert!(h.states.try_acquire_execution("c1"));
        let idle = h
            .executor
            .run(&campaign, &token, t0 + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(idle.dispatched, 0);

        // Attempt 2 after backoff, attempt 3 exhausts the budget
        assert!(h.states.try_acquire_execution("c1"));
        h.executor
            .run(&campaign, &token, t0 + Duration::minutes(10))
            .await
            .unwrap();
        assert!(h.states.try_acquire_execution("c1"));
        h.executor
            .run(&campaign, &token, t0 + Duration::minutes(50))
            .await
            .unwrap();

        let done = h.store.get_contact("ct1").unwrap().unwrap();
        assert_eq!(done.status, ContactStatus::Failed);
        assert_eq!(done.call_attempts, 3);
        assert_eq!(h.store.list_attempts("ct1").unwrap().len(), 3);

        // One more sweep detects completion (all contacts terminal)
        assert!(h.states.try_acquire_execution("c1"));
        h.executor
            .run(&campaign, &token, t0 + Duration::minutes(60))
            .await
            .unwrap();
        assert_eq!(h.states.get_state("c1"), Some(CampaignStatus::Completed));
    }

    #[tokio::test]
    async fn test_dnc_request_mid_call_short_circuits_retries() {
        let h = harness(MockDispatcher::new(CallOutcome::DncRequested));
        let campaign = running_campaign(&h, "c1");
        contact(&h, "ct1", "c1", "+14155550001");
        let token = RunToken::new(h.states.clone(), "c1");

        h.executor
            .run(&campaign, &token, tuesday_business_hours())
            .await
            .unwrap();

        let blocked = h.store.get_contact("ct1").unwrap().unwrap();
        assert_eq!(blocked.status, ContactStatus::DncBlocked);
        // Retry budget remained, but DNC wins regardless
        assert!(blocked.call_attempts < campaign.max_attempts);
        // Number appended to the org DNC list
        assert!(h.store.is_dnc_listed("org1", "+14155550001").unwrap());
        // Invariant: no attempt row for a dnc_blocked contact
        assert!(h.store.list_attempts("ct1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_error_is_retryable_and_batch_continues() {
        let dispatcher = MockDispatcher::new(CallOutcome::Completed);
        dispatcher.fail_phone("+14155550001");
        let h = harness(dispatcher);
        let campaign = running_campaign(&h, "c1");
        let mut bad = Contact::new("bad", "c1", "+14155550001", ConsentStatus::Granted);
        bad.created_at = tuesday_business_hours() - Duration::minutes(2);
        h.store.insert_contact(&bad).unwrap();
        let mut good = Contact::new("good", "c1", "+14155550002", ConsentStatus::Granted);
        good.created_at = tuesday_business_hours() - Duration::minutes(1);
        h.store.insert_contact(&good).unwrap();

        let token = RunToken::new(h.states.clone(), "c1");
        let report = h
            .executor
            .run(&campaign, &token, tuesday_business_hours())
            .await
            .unwrap();

        // One bad call must not abort the others
        assert_eq!(report.dispatched, 2);
        assert_eq!(report.completed, 1);
        assert_eq!(report.errors.len(), 1);

        let bad = h.store.get_contact("bad").unwrap().unwrap();
        assert_eq!(bad.status, ContactStatus::Queued);
        let attempts = h.store.list_attempts("bad").unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].outcome, CallOutcome::NetworkError);
        assert!(attempts[0].retryable);
    }

    #[tokio::test]
    async fn test_quota_exhausted_aborts_batch() {
        let h = harness(MockDispatcher::new(CallOutcome::Completed));
        let campaign = running_campaign(&h, "c1");
        contact(&h, "ct1", "c1", "+14155550001");
        h.usage.set_budget("org1", 0);

        let token = RunToken::new(h.states.clone(), "c1");
        let err = h
            .executor
            .run(&campaign, &token, tuesday_business_hours())
            .await
            .unwrap_err();
        assert!(matches!(err, CallClawError::QuotaExceeded(_)));

        // Nothing dispatched, contact untouched, lock released
        assert_eq!(h.dispatcher.call_count(), 0);
        let untouched = h.store.get_contact("ct1").unwrap().unwrap();
        assert_eq!(untouched.status, ContactStatus::Pending);
        assert!(h.states.try_acquire_execution("c1"));
    }

    /// Allows the first N limit checks, then denies.
    struct AllowN {
        remaining: AtomicU32,
    }

    #[async_trait::async_trait]
    impl UsageGate for AllowN {
        async fn check_minutes_limit(
            &self,
            _org_id: &str,
        ) -> callclaw_core::error::Result<UsageDecision> {
            let prev = self.remaining.fetch_update(
                Ordering::SeqCst,
                Ordering::SeqCst,
                |v| if v > 0 { Some(v - 1) } else { None },
            );
            Ok(if prev.is_ok() {
                UsageDecision::allow()
            } else {
                UsageDecision::deny("plan minutes exhausted")
            })
        }

        async fn record_call_usage(
            &self,
            _org_id: &str,
            _duration_seconds: u32,
            _call_id: &str,
        ) -> callclaw_core::error::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_quota_mid_batch_settles_in_flight_calls() {
        let store = Arc::new(MemoryStore::new());
        let states = Arc::new(CampaignStateStore::new());
        let dispatcher = Arc::new(MockDispatcher::new(CallOutcome::Completed));
        let usage = Arc::new(AllowN {
            remaining: AtomicU32::new(1),
        });
        let executor = BatchExecutor::new(
            store.clone(),
            dispatcher.clone(),
            usage,
            states.clone(),
            RetryPolicy::default(),
        );

        let mut campaign = Campaign::new("c1", "org1", "agent1");
        campaign.status = CampaignStatus::Running;
        store.save_campaign(&campaign).unwrap();
        states.seed("c1", CampaignStatus::Running);
        assert!(states.try_acquire_execution("c1"));

        let now = tuesday_business_hours();
        let mut first = Contact::new("first", "c1", "+14155550001", ConsentStatus::Granted);
        first.created_at = now - Duration::minutes(2);
        store.insert_contact(&first).unwrap();
        let mut second = Contact::new("second", "c1", "+14155550002", ConsentStatus::Granted);
        second.created_at = now - Duration::minutes(1);
        store.insert_contact(&second).unwrap();

        let token = RunToken::new(states.clone(), "c1");
        let err = executor.run(&campaign, &token, now).await.unwrap_err();
        assert!(matches!(err, CallClawError::QuotaExceeded(_)));

        // First contact was dispatched and settled; second never advanced
        let first = store.get_contact("first").unwrap().unwrap();
        assert_eq!(first.status, ContactStatus::Completed);
        assert_eq!(store.list_attempts("first").unwrap().len(), 1);
        let second = store.get_contact("second").unwrap().unwrap();
        assert_eq!(second.status, ContactStatus::Pending);
        assert_eq!(dispatcher.call_count(), 1);
        // Campaign stays eligible for the next sweep
        assert!(states.try_acquire_execution("c1"));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_batch() {
        let h = harness(MockDispatcher::new(CallOutcome::Completed));
        let campaign = running_campaign(&h, "c1");
        contact(&h, "ct1", "c1", "+14155550001");

        // Pause lands after the lock was acquired but before the pass runs:
        // the batch must observe it and dispatch nothing
        h.states
            .set_state("c1", CampaignStatus::Paused)
            .unwrap();
        let token = RunToken::new(h.states.clone(), "c1");
        let report = h
            .executor
            .run(&campaign, &token, tuesday_business_hours())
            .await
            .unwrap();

        assert_eq!(report.dispatched, 0);
        assert_eq!(h.dispatcher.call_count(), 0);
        let untouched = h.store.get_contact("ct1").unwrap().unwrap();
        assert_eq!(untouched.status, ContactStatus::Pending);
        assert!(!h.states.is_executing("c1"));
    }

    #[tokio::test]
    async fn test_usage_minutes_recorded_for_completed_calls() {
        let dispatcher = MockDispatcher::new(CallOutcome::Completed).with_call_duration(60);
        let h = harness(dispatcher);
        let campaign = running_campaign(&h, "c1");
        contact(&h, "ct1", "c1", "+14155550001");
        h.usage.set_budget("org1", 100);

        let token = RunToken::new(h.states.clone(), "c1");
        h.executor
            .run(&campaign, &token, tuesday_business_hours())
            .await
            .unwrap();

        assert_eq!(h.usage.remaining("org1"), 40);
    }
}
