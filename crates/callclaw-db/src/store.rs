//! The `CampaignStore` seam — everything the engine persists through.

use chrono::{DateTime, Utc};

use callclaw_core::error::Result;
use callclaw_core::types::{CallAttempt, Campaign, CampaignStatus, Contact};

/// Storage operations required by the execution engine.
///
/// All methods are synchronous and short: the engine performs store calls
/// only from the executor task (single writer per campaign, guaranteed by
/// the execution lock), so implementations may guard a single connection
/// with a mutex.
pub trait CampaignStore: Send + Sync {
    // ── Campaigns ─────────────────────────────────────────

    /// Insert or replace a campaign.
    fn save_campaign(&self, campaign: &Campaign) -> Result<()>;

    fn get_campaign(&self, id: &str) -> Result<Option<Campaign>>;

    /// Persist a lifecycle state change.
    fn set_campaign_status(&self, id: &str, status: CampaignStatus) -> Result<()>;

    /// Scheduled campaigns whose `scheduled_at` has passed.
    fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>>;

    /// Campaigns currently in `Running`.
    fn list_running(&self) -> Result<Vec<Campaign>>;

    // ── Contacts ──────────────────────────────────────────

    fn insert_contact(&self, contact: &Contact) -> Result<()>;

    fn get_contact(&self, id: &str) -> Result<Option<Contact>>;

    /// Up to `limit` selectable contacts (`pending`/`queued`, eligibility
    /// cutoff passed), ordered by creation time. The `dnc_listed` flag is
    /// derived from the organization DNC list at load time.
    fn load_batch(
        &self,
        campaign_id: &str,
        org_id: &str,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Contact>>;

    /// Contacts of the campaign not yet in a terminal status.
    fn count_non_terminal(&self, campaign_id: &str) -> Result<u32>;

    /// Persist contact mutations (status, attempts, eligibility).
    fn update_contact(&self, contact: &Contact) -> Result<()>;

    // ── Call attempts ─────────────────────────────────────

    /// Atomically persist the contact update together with its attempt row.
    fn record_attempt(&self, contact: &Contact, attempt: &CallAttempt) -> Result<()>;

    fn list_attempts(&self, contact_id: &str) -> Result<Vec<CallAttempt>>;

    // ── DNC list ──────────────────────────────────────────

    fn is_dnc_listed(&self, org_id: &str, phone: &str) -> Result<bool>;

    /// Append a number to the organization DNC list (idempotent).
    fn add_dnc(&self, org_id: &str, phone: &str) -> Result<()>;
}
