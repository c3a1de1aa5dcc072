//! Domain types for the campaign execution engine.

pub mod call;
pub mod campaign;
pub mod contact;

pub use call::{CallAttempt, CallOutcome, CallReport};
pub use campaign::{CallingWindow, Campaign, CampaignStatus};
pub use contact::{ConsentStatus, Contact, ContactStatus};
