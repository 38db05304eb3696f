//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for notes.
//! - Isolate SQLite query details from store/scheduler orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Note::validate()` before persistence.
//! - Repository APIs return semantic results (`Option` on lookups, row-count
//!   booleans on deletes) in addition to DB transport errors.

pub mod note_repo;
