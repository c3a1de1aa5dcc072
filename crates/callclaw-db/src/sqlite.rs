//! SQLite-backed campaign store.
//! WAL mode allows concurrent readers while the executor writes.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use callclaw_core::error::{CallClawError, Result};
use callclaw_core::types::{
    CallAttempt, CallOutcome, CallingWindow, Campaign, CampaignStatus, ConsentStatus, Contact,
    ContactStatus,
};

use crate::store::CampaignStore;

/// Durable campaign store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Shared SELECT column list for campaign queries — single source of truth.
const CAMPAIGN_SELECT: &str = "SELECT id,org_id,agent_id,status,scheduled_at,start_hour,end_hour,\
     skip_weekends,skip_holidays,batch_size,max_concurrent_calls,max_attempts,created_at \
     FROM campaigns";

const CONTACT_SELECT: &str = "SELECT id,campaign_id,phone,consent,status,call_attempts,\
     next_eligible_at,created_at FROM contacts";

/// Map a database row to a Campaign struct.
fn row_to_campaign(row: &rusqlite::Row) -> rusqlite::Result<Campaign> {
    let status: String = row.get(3)?;
    let scheduled_at: Option<String> = row.get(4)?;
    let created_at: String = row.get(12)?;
    Ok(Campaign {
        id: row.get(0)?,
        org_id: row.get(1)?,
        agent_id: row.get(2)?,
        status: CampaignStatus::parse(&status).unwrap_or(CampaignStatus::Draft),
        scheduled_at: scheduled_at.and_then(|s| parse_ts(&s)),
        calling_window: CallingWindow {
            start_hour: row.get(5)?,
            end_hour: row.get(6)?,
            skip_weekends: row.get(7)?,
            skip_holidays: row.get(8)?,
        },
        batch_size: row.get(9)?,
        max_concurrent_calls: row.get(10)?,
        max_attempts: row.get(11)?,
        created_at: parse_ts(&created_at).unwrap_or_else(Utc::now),
    })
}

/// Map a database row to a Contact struct. `dnc_listed` is filled by the
/// caller from the DNC list.
fn row_to_contact(row: &rusqlite::Row) -> rusqlite::Result<Contact> {
    let consent: String = row.get(3)?;
    let status: String = row.get(4)?;
    let next_eligible_at: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    Ok(Contact {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        phone: row.get(2)?,
        consent: ConsentStatus::parse(&consent).unwrap_or(ConsentStatus::Missing),
        dnc_listed: false,
        status: ContactStatus::parse(&status).unwrap_or(ContactStatus::Pending),
        call_attempts: row.get(5)?,
        next_eligible_at: next_eligible_at.and_then(|s| parse_ts(&s)),
        created_at: parse_ts(&created_at).unwrap_or_else(Utc::now),
    })
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn db_err(context: &str, e: impl std::fmt::Display) -> CallClawError {
    CallClawError::Store(format!("{context}: {e}"))
}

impl SqliteStore {
    /// Open or create the campaign database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn =
            Connection::open(path).map_err(|e| db_err("DB open", e))?;

        // WAL mode prevents "database is locked" under concurrent sweeps
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| db_err("DB pragma", e))?;

        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CallClawError::Store("connection mutex poisoned".into()))
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                scheduled_at TEXT,
                start_hour INTEGER NOT NULL DEFAULT 9,
                end_hour INTEGER NOT NULL DEFAULT 17,
                skip_weekends INTEGER NOT NULL DEFAULT 1,
                skip_holidays INTEGER NOT NULL DEFAULT 1,
                batch_size INTEGER NOT NULL DEFAULT 25,
                max_concurrent_calls INTEGER NOT NULL DEFAULT 5,
                max_attempts INTEGER NOT NULL DEFAULT 3,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS contacts (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                phone TEXT NOT NULL,
                consent TEXT NOT NULL DEFAULT 'missing',
                status TEXT NOT NULL DEFAULT 'pending',
                call_attempts INTEGER NOT NULL DEFAULT 0,
                next_eligible_at TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (campaign_id) REFERENCES campaigns(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_contacts_campaign_status
                ON contacts(campaign_id, status);

            -- Append-only: one row per dispatch attempt
            CREATE TABLE IF NOT EXISTS call_attempts (
                id TEXT PRIMARY KEY,
                contact_id TEXT NOT NULL,
                campaign_id TEXT NOT NULL,
                outcome TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL DEFAULT 0,
                retryable INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_attempts_contact
                ON call_attempts(contact_id);

            CREATE TABLE IF NOT EXISTS dnc_list (
                org_id TEXT NOT NULL,
                phone TEXT NOT NULL,
                added_at TEXT NOT NULL,
                PRIMARY KEY (org_id, phone)
            );
         ",
            )
            .map_err(|e| db_err("Migration", e))?;
        Ok(())
    }
}

impl CampaignStore for SqliteStore {
    fn save_campaign(&self, campaign: &Campaign) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO campaigns
                 (id, org_id, agent_id, status, scheduled_at, start_hour, end_hour,
                  skip_weekends, skip_holidays, batch_size, max_concurrent_calls,
                  max_attempts, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    campaign.id,
                    campaign.org_id,
                    campaign.agent_id,
                    campaign.status.as_str(),
                    campaign.scheduled_at.map(|t| t.to_rfc3339()),
                    campaign.calling_window.start_hour,
                    campaign.calling_window.end_hour,
                    campaign.calling_window.skip_weekends,
                    campaign.calling_window.skip_holidays,
                    campaign.batch_size,
                    campaign.max_concurrent_calls,
                    campaign.max_attempts,
                    campaign.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| db_err("Save campaign", e))?;
        Ok(())
    }

    fn get_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        let conn = self.conn()?;
        let query = format!("{CAMPAIGN_SELECT} WHERE id = ?1");
        match conn.query_row(&query, params![id], row_to_campaign) {
            Ok(campaign) => Ok(Some(campaign)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(db_err("Get campaign", e)),
        }
    }

    fn set_campaign_status(&self, id: &str, status: CampaignStatus) -> Result<()> {
        self.conn()?
            .execute(
                "UPDATE campaigns SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )
            .map_err(|e| db_err("Set campaign status", e))?;
        Ok(())
    }

    fn list_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let conn = self.conn()?;
        let query = format!(
            "{CAMPAIGN_SELECT} WHERE status = 'scheduled' AND scheduled_at IS NOT NULL \
             AND scheduled_at <= ?1 ORDER BY scheduled_at ASC"
        );
        let mut stmt = conn.prepare(&query).map_err(|e| db_err("List due", e))?;
        let rows = stmt
            .query_map(params![now.to_rfc3339()], row_to_campaign)
            .map_err(|e| db_err("List due", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| db_err("List due", e))
    }

    fn list_running(&self) -> Result<Vec<Campaign>> {
        let conn = self.conn()?;
        let query = format!("{CAMPAIGN_SELECT} WHERE status = 'running' ORDER BY created_at ASC");
        let mut stmt = conn.prepare(&query).map_err(|e| db_err("List running", e))?;
        let rows = stmt
            .query_map([], row_to_campaign)
            .map_err(|e| db_err("List running", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| db_err("List running", e))
    }

    fn insert_contact(&self, contact: &Contact) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO contacts
                 (id, campaign_id, phone, consent, status, call_attempts,
                  next_eligible_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    contact.id,
                    contact.campaign_id,
                    contact.phone,
                    contact.consent.as_str(),
                    contact.status.as_str(),
                    contact.call_attempts,
                    contact.next_eligible_at.map(|t| t.to_rfc3339()),
                    contact.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| db_err("Insert contact", e))?;
        Ok(())
    }

    fn get_contact(&self, id: &str) -> Result<Option<Contact>> {
        let conn = self.conn()?;
        let query = format!("{CONTACT_SELECT} WHERE id = ?1");
        match conn.query_row(&query, params![id], row_to_contact) {
            Ok(contact) => Ok(Some(contact)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(db_err("Get contact", e)),
        }
    }

    fn load_batch(
        &self,
        campaign_id: &str,
        org_id: &str,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Contact>> {
        let conn = self.conn()?;
        let query = format!(
            "{CONTACT_SELECT} WHERE campaign_id = ?1 \
             AND status IN ('pending', 'queued') \
             AND (next_eligible_at IS NULL OR next_eligible_at <= ?2) \
             ORDER BY created_at ASC LIMIT ?3"
        );
        let mut stmt = conn.prepare(&query).map_err(|e| db_err("Load batch", e))?;
        let rows = stmt
            .query_map(params![campaign_id, now.to_rfc3339(), limit], row_to_contact)
            .map_err(|e| db_err("Load batch", e))?;
        let mut contacts = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| db_err("Load batch", e))?;

        // Derive the DNC flag from org list membership at load time
        for contact in contacts.iter_mut() {
            let listed: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM dnc_list WHERE org_id = ?1 AND phone = ?2)",
                    params![org_id, contact.phone],
                    |r| r.get(0),
                )
                .map_err(|e| db_err("DNC lookup", e))?;
            contact.dnc_listed = listed;
        }
        Ok(contacts)
    }

    fn count_non_terminal(&self, campaign_id: &str) -> Result<u32> {
        self.conn()?
            .query_row(
                "SELECT COUNT(*) FROM contacts WHERE campaign_id = ?1 \
                 AND status NOT IN ('completed', 'failed', 'dnc_blocked', 'skipped_compliance')",
                params![campaign_id],
                |r| r.get(0),
            )
            .map_err(|e| db_err("Count non-terminal", e))
    }

    fn update_contact(&self, contact: &Contact) -> Result<()> {
        self.conn()?
            .execute(
                "UPDATE contacts SET status = ?1, call_attempts = ?2, next_eligible_at = ?3 \
                 WHERE id = ?4",
                params![
                    contact.status.as_str(),
                    contact.call_attempts,
                    contact.next_eligible_at.map(|t| t.to_rfc3339()),
                    contact.id,
                ],
            )
            .map_err(|e| db_err("Update contact", e))?;
        Ok(())
    }

    fn record_attempt(&self, contact: &Contact, attempt: &CallAttempt) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| db_err("Record attempt", e))?;
        tx.execute(
            "UPDATE contacts SET status = ?1, call_attempts = ?2, next_eligible_at = ?3 \
             WHERE id = ?4",
            params![
                contact.status.as_str(),
                contact.call_attempts,
                contact.next_eligible_at.map(|t| t.to_rfc3339()),
                contact.id,
            ],
        )
        .map_err(|e| db_err("Record attempt", e))?;
        tx.execute(
            "INSERT INTO call_attempts
             (id, contact_id, campaign_id, outcome, started_at, ended_at,
              duration_seconds, retryable)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                attempt.id,
                attempt.contact_id,
                attempt.campaign_id,
                attempt.outcome.as_str(),
                attempt.started_at.to_rfc3339(),
                attempt.ended_at.to_rfc3339(),
                attempt.duration_seconds,
                attempt.retryable,
            ],
        )
        .map_err(|e| db_err("Record attempt", e))?;
        tx.commit().map_err(|e| db_err("Record attempt", e))?;
        Ok(())
    }

    fn list_attempts(&self, contact_id: &str) -> Result<Vec<CallAttempt>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, contact_id, campaign_id, outcome, started_at, ended_at, \
                 duration_seconds, retryable FROM call_attempts \
                 WHERE contact_id = ?1 ORDER BY started_at ASC",
            )
            .map_err(|e| db_err("List attempts", e))?;
        let rows = stmt
            .query_map(params![contact_id], |row| {
                let outcome: String = row.get(3)?;
                let started_at: String = row.get(4)?;
                let ended_at: String = row.get(5)?;
                Ok(CallAttempt {
                    id: row.get(0)?,
                    contact_id: row.get(1)?,
                    campaign_id: row.get(2)?,
                    outcome: CallOutcome::parse(&outcome).unwrap_or(CallOutcome::NetworkError),
                    started_at: parse_ts(&started_at).unwrap_or_else(Utc::now),
                    ended_at: parse_ts(&ended_at).unwrap_or_else(Utc::now),
                    duration_seconds: row.get(6)?,
                    retryable: row.get(7)?,
                })
            })
            .map_err(|e| db_err("List attempts", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| db_err("List attempts", e))
    }

    fn is_dnc_listed(&self, org_id: &str, phone: &str) -> Result<bool> {
        self.conn()?
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM dnc_list WHERE org_id = ?1 AND phone = ?2)",
                params![org_id, phone],
                |r| r.get(0),
            )
            .map_err(|e| db_err("DNC lookup", e))
    }

    fn add_dnc(&self, org_id: &str, phone: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR IGNORE INTO dnc_list (org_id, phone, added_at) VALUES (?1, ?2, ?3)",
                params![org_id, phone, Utc::now().to_rfc3339()],
            )
            .map_err(|e| db_err("Add DNC", e))?;
        tracing::info!("🚫 DNC list append: {} (org {})", phone, org_id);
        Ok(())
    }
}
