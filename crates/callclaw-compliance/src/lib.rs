//! # CallClaw Compliance
//!
//! Pre-dispatch checks enforcing consent, DNC, and legal calling-hour rules.
//! The gate is a pure decision function: given a contact, a calling-window
//! config, and the current timestamp, it returns allow/deny plus a reason.
//! Calling-hour checks run against the contact's local time, resolved from
//! the phone number's area code; an unresolvable timezone fails closed.

pub mod gate;
pub mod holidays;
pub mod timezone;

pub use gate::{ComplianceDecision, ComplianceGate, DenyReason};
