//! Scripted dispatcher for tests and dry runs — no provider traffic.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use callclaw_core::error::{CallClawError, Result};
use callclaw_core::traits::CallDispatcher;
use callclaw_core::types::{CallOutcome, CallReport};

/// Dispatcher that answers from a script instead of a provider.
///
/// Per-phone outcome queues pop in order; once a queue is empty (or was
/// never scripted) the default outcome applies. Phones marked via
/// `fail_phone` return a transport error instead of a report.
pub struct MockDispatcher {
    default_outcome: CallOutcome,
    /// Seconds reported for completed calls.
    call_duration_secs: u32,
    /// Artificial latency per call, for concurrency tests.
    delay_ms: u64,
    script: Mutex<HashMap<String, VecDeque<CallOutcome>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockDispatcher {
    pub fn new(default_outcome: CallOutcome) -> Self {
        Self {
            default_outcome,
            call_duration_secs: 30,
            delay_ms: 0,
            script: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_call_duration(mut self, seconds: u32) -> Self {
        self.call_duration_secs = seconds;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Queue outcomes for one phone number, consumed in order.
    pub fn script_phone(&self, phone: &str, outcomes: Vec<CallOutcome>) {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.insert(phone.to_string(), outcomes.into());
    }

    /// Make calls to this phone fail at the transport level.
    pub fn fail_phone(&self, phone: &str) {
        let mut failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
        failing.insert(phone.to_string());
    }

    /// Phones called so far, in dispatch order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn next_outcome(&self, phone: &str) -> CallOutcome {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script
            .get_mut(phone)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(self.default_outcome)
    }
}

#[async_trait]
impl CallDispatcher for MockDispatcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_call(
        &self,
        _agent_id: &str,
        phone: &str,
        _metadata: serde_json::Value,
    ) -> Result<CallReport> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }

        {
            let failing = self.failing.lock().unwrap_or_else(|e| e.into_inner());
            if failing.contains(phone) {
                return Err(CallClawError::Provider(format!(
                    "mock transport failure for {phone}"
                )));
            }
        }

        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(phone.to_string());

        let outcome = self.next_outcome(phone);
        let now = Utc::now();
        Ok(CallReport {
            call_id: format!("mock-{}", self.call_count()),
            outcome,
            started_at: now,
            ended_at: now,
            duration_seconds: if outcome == CallOutcome::Completed {
                self.call_duration_secs
            } else {
                0
            },
        })
    }
}
