//! # CallClaw Engine
//!
//! The campaign execution engine: turns a list of contacts into a stream of
//! compliant, rate-limited, retried outbound calls.
//!
//! ## Architecture
//! ```text
//! external trigger (cron / queue consumer)
//!   → CampaignEngine.process_scheduled_campaigns()
//!     → promote due Scheduled campaigns to Running
//!     → for each Running campaign:
//!       → CampaignStateStore.try_acquire_execution(id)   (skip if held)
//!       → BatchExecutor.run(campaign)
//!         → ComplianceGate → UsageGate → CallDispatcher
//!         → CallAttempt log + RetryPolicy
//!       → release_execution(id)                          (guaranteed)
//! ```
//!
//! Campaigns run concurrently with each other; execution *within* one
//! campaign is strictly single-writer, enforced by the execution lock.

pub mod control;
pub mod executor;
pub mod retry;
pub mod scheduler;
pub mod state;
pub mod token;

pub use control::CampaignEngine;
pub use executor::{BatchExecutor, BatchReport};
pub use retry::{Disposition, RetryPolicy};
pub use scheduler::spawn_scheduler;
pub use state::CampaignStateStore;
pub use token::RunToken;
