//! Domain model for notes and their reminder metadata.
//!
//! # Responsibility
//! - Define the canonical note record shared by persistence and scheduling.
//! - Keep validation rules next to the data they protect.
//!
//! # Invariants
//! - Every persisted note is identified by a store-assigned `NoteId`.
//! - A note without a reminder timestamp owns no alarm registration.

pub mod note;
