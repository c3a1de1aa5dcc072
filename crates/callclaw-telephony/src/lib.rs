//! # CallClaw Telephony
//!
//! `CallDispatcher` against the voice-provider HTTP API.
//! Create-then-poll lifecycle: POST places the call, GET polls until the
//! provider reports a terminal status or the poll budget runs out.

pub mod mock;
pub mod provider;

pub use mock::MockDispatcher;
pub use provider::HttpCallDispatcher;
