//! Presentation/state layer over the persisted note store.
//!
//! # Responsibility
//! - Serialize all database access onto one worker thread owning the
//!   connection.
//! - Expose fire-and-forget writes, the awaited identity-returning insert,
//!   awaited fetch-by-identity, and the shared all-notes feed.
//! - Drive the reminder scheduler and the "added" notification from the
//!   write path.
//!
//! # Invariants
//! - Callers never touch the connection; commands execute in arrival order.
//! - The only cross-operation ordering guarantee is that `create` completes
//!   (identity assigned) before its caller can schedule a reminder.
//! - Blank titles are rejected before a command is ever dispatched.

mod feed;

pub use feed::{FeedSubscription, NotesFeed, DEFAULT_FEED_GRACE};

use crate::model::note::{Note, NoteId, NoteValidationError};
use crate::notify::{NoteChannel, NotificationSink};
use crate::reminder::alarm::now_epoch_ms;
use crate::reminder::scheduler::ReminderScheduler;
use crate::repo::note_repo::{NoteRepository, RepoError, SqliteNoteRepository};
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const ADDED_BODY: &str = "Note added";

pub type StoreResult<T> = Result<T, StoreError>;

/// Error surface for awaited store operations.
#[derive(Debug)]
pub enum StoreError {
    Validation(NoteValidationError),
    Repo(RepoError),
    /// The worker is gone; the process is shutting down.
    Closed,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Closed => write!(f, "note store is closed"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Closed => None,
        }
    }
}

impl From<NoteValidationError> for StoreError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

pub(crate) enum StoreCommand {
    /// Awaited upsert returning the effective identity.
    Create {
        note: Note,
        reply: oneshot::Sender<StoreResult<NoteId>>,
    },
    /// Fire-and-forget upsert.
    Save { note: Note },
    /// Fire-and-forget delete.
    Delete { id: NoteId },
    /// Awaited fetch-by-identity.
    Get {
        id: NoteId,
        reply: oneshot::Sender<StoreResult<Option<Note>>>,
    },
    /// Re-run the all-notes query and publish a fresh snapshot.
    RefreshFeed,
}

/// Handle to the note store worker.
///
/// Cheap to clone pieces are handed out through [`NoteStore::subscribe`];
/// the handle itself owns the command channel and the feed.
pub struct NoteStore {
    cmd_tx: mpsc::UnboundedSender<StoreCommand>,
    feed: NotesFeed,
}

impl NoteStore {
    /// Opens the store over a migrated connection.
    ///
    /// Spawns the worker thread that owns `conn` for the store's lifetime.
    /// `feed_grace` is the idle-unsubscribe window after which the feed's
    /// snapshot refresh is torn down.
    pub fn open(
        conn: Connection,
        scheduler: Arc<ReminderScheduler>,
        notifier: Arc<dyn NotificationSink>,
        feed_grace: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let feed = NotesFeed::new(cmd_tx.clone(), feed_grace);
        let worker_feed = feed.clone();

        std::thread::Builder::new()
            .name("tacknote-store".to_string())
            .spawn(move || run_worker(conn, scheduler, notifier, worker_feed, cmd_rx))
            .expect("store worker thread spawn must succeed");

        Self { cmd_tx, feed }
    }

    /// Inserts or replaces a note and returns the effective identity.
    ///
    /// This is the one awaited write: a reminder cannot be registered
    /// against an identity that does not exist yet, so callers saving a new
    /// note with a reminder wait here first.
    pub async fn create(&self, note: Note) -> StoreResult<NoteId> {
        note.validate()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(StoreCommand::Create {
                note,
                reply: reply_tx,
            })
            .map_err(|_| StoreError::Closed)?;
        reply_rx.await.map_err(|_| StoreError::Closed)?
    }

    /// Dispatches an insert-or-update without waiting for completion.
    ///
    /// Validation still happens here, before any mutation is enqueued.
    pub fn save(&self, note: Note) -> Result<(), NoteValidationError> {
        note.validate()?;
        let _ = self.cmd_tx.send(StoreCommand::Save { note });
        Ok(())
    }

    /// Dispatches a delete without waiting for completion.
    pub fn delete(&self, id: NoteId) {
        let _ = self.cmd_tx.send(StoreCommand::Delete { id });
    }

    /// Fetches one note by identity.
    ///
    /// `Ok(None)` is the non-fatal "not available" case, e.g. the record
    /// was deleted between navigation and load.
    pub async fn get(&self, id: NoteId) -> StoreResult<Option<Note>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(StoreCommand::Get { id, reply: reply_tx })
            .map_err(|_| StoreError::Closed)?;
        reply_rx.await.map_err(|_| StoreError::Closed)?
    }

    /// Subscribes to the shared all-notes feed.
    pub fn subscribe(&self) -> FeedSubscription {
        self.feed.subscribe()
    }
}

fn run_worker(
    conn: Connection,
    scheduler: Arc<ReminderScheduler>,
    notifier: Arc<dyn NotificationSink>,
    feed: NotesFeed,
    mut cmd_rx: mpsc::UnboundedReceiver<StoreCommand>,
) {
    let repo = SqliteNoteRepository::new(&conn);
    info!("event=store_start module=store status=ok");

    while let Some(command) = cmd_rx.blocking_recv() {
        match command {
            StoreCommand::Create { note, reply } => {
                let result = apply_upsert(&repo, &scheduler, notifier.as_ref(), note);
                refresh_feed_if_live(&repo, &feed);
                let _ = reply.send(result);
            }
            StoreCommand::Save { note } => {
                if let Err(err) = apply_upsert(&repo, &scheduler, notifier.as_ref(), note) {
                    error!("event=note_save module=store status=error error={err}");
                }
                refresh_feed_if_live(&repo, &feed);
            }
            StoreCommand::Delete { id } => {
                match repo.delete_note(id) {
                    Ok(existed) => {
                        scheduler.on_deleted(id);
                        info!(
                            "event=note_delete module=store status=ok note_id={id} existed={existed}"
                        );
                    }
                    Err(err) => {
                        error!(
                            "event=note_delete module=store status=error note_id={id} error={err}"
                        );
                    }
                }
                refresh_feed_if_live(&repo, &feed);
            }
            StoreCommand::Get { id, reply } => {
                let _ = reply.send(repo.get_note(id).map_err(StoreError::from));
            }
            StoreCommand::RefreshFeed => {
                publish_snapshot(&repo, &feed);
            }
        }
    }

    info!("event=store_stop module=store status=ok");
}

fn apply_upsert(
    repo: &SqliteNoteRepository<'_>,
    scheduler: &ReminderScheduler,
    notifier: &dyn NotificationSink,
    note: Note,
) -> StoreResult<NoteId> {
    let is_new = !note.is_persisted();
    let id = repo.upsert_note(&note)?;
    let saved = Note { id, ..note };

    scheduler.sync_note(&saved, now_epoch_ms());
    if is_new {
        notifier.post(NoteChannel::Added, id, &saved.title, ADDED_BODY, None);
    }

    info!("event=note_save module=store status=ok note_id={id} new={is_new}");
    Ok(id)
}

fn refresh_feed_if_live(repo: &SqliteNoteRepository<'_>, feed: &NotesFeed) {
    if feed.refresh_is_live() {
        publish_snapshot(repo, feed);
    }
}

fn publish_snapshot(repo: &SqliteNoteRepository<'_>, feed: &NotesFeed) {
    match repo.list_notes() {
        Ok(notes) => feed.publish(notes),
        Err(err) => error!("event=feed_refresh module=store status=error error={err}"),
    }
}
