//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record persisted by the store.
//! - Provide validation invoked by every repository write path.
//!
//! # Invariants
//! - `id == 0` means "identity not assigned yet"; the store assigns one on
//!   first insert and it is never reused.
//! - `title` is non-empty after trimming.
//! - `reminder_at` is epoch milliseconds; `None` means no reminder.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier assigned by the store on first insert.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type NoteId = i64;

/// Sentinel identity for a note that has not been inserted yet.
pub const UNASSIGNED_NOTE_ID: NoteId = 0;

/// Canonical note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Store-assigned identity; `0` until first insert.
    pub id: NoteId,
    /// Required title; must be non-empty after trim.
    pub title: String,
    /// Free-form body text; required column but may be empty.
    pub body: String,
    /// Optional reminder time in epoch milliseconds.
    pub reminder_at: Option<i64>,
}

/// Validation failure for note write paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    /// Title is empty or whitespace-only.
    EmptyTitle,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "note title must not be empty or blank"),
        }
    }
}

impl Error for NoteValidationError {}

impl Note {
    /// Creates a not-yet-persisted note with unassigned identity.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: UNASSIGNED_NOTE_ID,
            title: title.into(),
            body: body.into(),
            reminder_at: None,
        }
    }

    /// Creates a note with an already-assigned identity.
    ///
    /// Used by edit paths where the row exists and the save replaces it
    /// in place under the same identity.
    pub fn with_id(id: NoteId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            reminder_at: None,
        }
    }

    /// Attaches a reminder time, builder-style.
    pub fn with_reminder(mut self, reminder_at_ms: i64) -> Self {
        self.reminder_at = Some(reminder_at_ms);
        self
    }

    /// Returns whether the store has assigned an identity yet.
    pub fn is_persisted(&self) -> bool {
        self.id != UNASSIGNED_NOTE_ID
    }

    /// Checks write invariants. Must pass before any SQL mutation.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.title.trim().is_empty() {
            return Err(NoteValidationError::EmptyTitle);
        }
        Ok(())
    }
}
