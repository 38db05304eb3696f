//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over the canonical `notes` table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths must call `Note::validate()` before SQL mutations.
//! - `upsert_note` replaces by identity; identity 0 assigns a new one.
//! - `list_notes` is always ordered newest-first (identity descending).

use crate::db::DbError;
use crate::model::note::{Note, NoteId, NoteValidationError, UNASSIGNED_NOTE_ID};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    body,
    reminder_at
FROM notes";

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for note persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(NoteValidationError),
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for note CRUD operations.
pub trait NoteRepository {
    /// Inserts or replaces one note by identity and returns the effective
    /// identity. Identity 0 assigns a fresh one.
    fn upsert_note(&self, note: &Note) -> RepoResult<NoteId>;
    /// Gets one note by identity.
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
    /// Deletes one note by identity. Returns `false` when no row existed.
    fn delete_note(&self, id: NoteId) -> RepoResult<bool>;
    /// Lists all notes ordered newest-first.
    fn list_notes(&self) -> RepoResult<Vec<Note>>;
    /// Lists notes carrying a reminder timestamp, for restart rescheduling.
    fn list_notes_with_reminders(&self) -> RepoResult<Vec<Note>>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn upsert_note(&self, note: &Note) -> RepoResult<NoteId> {
        note.validate()?;

        // NULLIF maps the unassigned sentinel to NULL so the INTEGER PRIMARY
        // KEY auto-assigns; a concrete identity replaces the existing row.
        self.conn.execute(
            "INSERT OR REPLACE INTO notes (id, title, body, reminder_at)
             VALUES (NULLIF(?1, 0), ?2, ?3, ?4);",
            params![
                note.id,
                note.title.as_str(),
                note.body.as_str(),
                note.reminder_at,
            ],
        )?;

        if note.id == UNASSIGNED_NOTE_ID {
            Ok(self.conn.last_insert_rowid())
        } else {
            Ok(note.id)
        }
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(row)?));
        }

        Ok(None)
    }

    fn delete_note(&self, id: NoteId) -> RepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn list_notes(&self) -> RepoResult<Vec<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} ORDER BY id DESC;"))?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();

        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }

        Ok(notes)
    }

    fn list_notes_with_reminders(&self) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL} WHERE reminder_at IS NOT NULL ORDER BY reminder_at ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();

        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }

        Ok(notes)
    }
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id: NoteId = row.get("id")?;
    if id <= 0 {
        return Err(RepoError::InvalidData(format!(
            "invalid identity `{id}` in notes.id"
        )));
    }

    let note = Note {
        id,
        title: row.get("title")?,
        body: row.get("body")?,
        reminder_at: row.get("reminder_at")?,
    };
    note.validate()
        .map_err(|err| RepoError::InvalidData(format!("{err} (notes.id={id})")))?;
    Ok(note)
}
