//! Reminder scheduling over the host alarm facility.
//!
//! # Responsibility
//! - Define the alarm-service seam and its key derivation.
//! - Drive the per-note reminder state machine.
//!
//! # Invariants
//! - At most one live alarm registration per note identity.
//! - Registration and cancellation derive the key the same way.
//! - Scheduling degradation (exact denied, backend failure) is logged,
//!   never surfaced to the write path that triggered it.

pub mod alarm;
pub mod scheduler;
