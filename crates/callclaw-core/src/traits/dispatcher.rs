//! Telephony call-placement seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::CallReport;

/// Places one outbound call and reports how it ended.
///
/// Implementations own the full provider interaction (create, poll,
/// classify); the engine only sees the final `CallReport`. Transport
/// failures surface as `Err` and are classified retryable by the engine.
#[async_trait]
pub trait CallDispatcher: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Place a call from `agent_id` to `phone` and wait for its outcome.
    async fn create_call(
        &self,
        agent_id: &str,
        phone: &str,
        metadata: serde_json::Value,
    ) -> Result<CallReport>;
}
