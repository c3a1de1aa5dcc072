//! In-memory campaign store — same surface as the durable store.
//! Used by tests and dry runs; nothing survives process exit.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use callclaw_core::error::{CallClawError, Result};
use callclaw_core::types::{CallAttempt, Campaign, CampaignStatus, Contact};

use crate::store::CampaignStore;

#[derive(Default)]
struct Inner {
    campaigns: HashMap<String, Campaign>,
    contacts: HashMap<String, Contact>,
    attempts: Vec<CallAttempt>,
    dnc: HashSet<(String, String)>,
}

/// Process-local campaign store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| CallClawError::Store("memory store mutex poisoned".into()))
    }
}

impl CampaignStore for MemoryStore {
    fn save_campaign(&self, campaign: &Campaign) -> Result<()> {
        self.lock()?
            .campaigns
            .insert(campaign.id.clone(), campaign.clone());
        Ok(())
    }

    fn get_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        Ok(self.lock()?.campaigns.get(id).cloned())
    }

    fn set_campaign_status(&self, id: &str, status: CampaignStatus) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(campaign) = inner.campaigns.get_mut(id) {
            campaign.status = status;
        }
        Ok(())
    }

    fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let inner = self.lock()?;
        let mut due: Vec<Campaign> = inner
            .campaigns
            .values()
            .filter(|c| c.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|c| c.scheduled_at);
        Ok(due)
    }

    fn list_running(&self) -> Result<Vec<Campaign>> {
        let inner = self.lock()?;
        let mut running: Vec<Campaign> = inner
            .campaigns
            .values()
            .filter(|c| c.status == CampaignStatus::Running)
            .cloned()
            .collect();
        running.sort_by_key(|c| c.created_at);
        Ok(running)
    }

    fn insert_contact(&self, contact: &Contact) -> Result<()> {
        self.lock()?
            .contacts
            .insert(contact.id.clone(), contact.clone());
        Ok(())
    }

    fn get_contact(&self, id: &str) -> Result<Option<Contact>> {
        Ok(self.lock()?.contacts.get(id).cloned())
    }

    fn load_batch(
        &self,
        campaign_id: &str,
        org_id: &str,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Contact>> {
        let inner = self.lock()?;
        let mut batch: Vec<Contact> = inner
            .contacts
            .values()
            .filter(|c| c.campaign_id == campaign_id && c.is_eligible(now))
            .cloned()
            .collect();
        batch.sort_by_key(|c| c.created_at);
        batch.truncate(limit as usize);
        for contact in batch.iter_mut() {
            contact.dnc_listed = inner
                .dnc
                .contains(&(org_id.to_string(), contact.phone.clone()));
        }
        Ok(batch)
    }

    fn count_non_terminal(&self, campaign_id: &str) -> Result<u32> {
        let inner = self.lock()?;
        Ok(inner
            .contacts
            .values()
            .filter(|c| c.campaign_id == campaign_id && !c.status.is_terminal())
            .count() as u32)
    }

    fn update_contact(&self, contact: &Contact) -> Result<()> {
        self.insert_contact(contact)
    }

    fn record_attempt(&self, contact: &Contact, attempt: &CallAttempt) -> Result<()> {
        let mut inner = self.lock()?;
        inner.contacts.insert(contact.id.clone(), contact.clone());
        inner.attempts.push(attempt.clone());
        Ok(())
    }

    fn list_attempts(&self, contact_id: &str) -> Result<Vec<CallAttempt>> {
        let inner = self.lock()?;
        let mut attempts: Vec<CallAttempt> = inner
            .attempts
            .iter()
            .filter(|a| a.contact_id == contact_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.started_at);
        Ok(attempts)
    }

    fn is_dnc_listed(&self, org_id: &str, phone: &str) -> Result<bool> {
        Ok(self
            .lock()?
            .dnc
            .contains(&(org_id.to_string(), phone.to_string())))
    }

    fn add_dnc(&self, org_id: &str, phone: &str) -> Result<()> {
        self.lock()?
            .dnc
            .insert((org_id.to_string(), phone.to_string()));
        Ok(())
    }
}
