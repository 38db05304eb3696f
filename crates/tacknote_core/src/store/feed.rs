//! Shared all-notes read stream.
//!
//! # Responsibility
//! - Fan one continuously-updated note-list snapshot out to any number of
//!   observers over a single underlying query.
//! - Keep the underlying query refresh alive across brief observer gaps
//!   (the idle-unsubscribe grace period), tearing it down only after all
//!   observers have been gone for the whole window.
//!
//! # Invariants
//! - All observers share one snapshot channel; subscribing never re-runs
//!   the query while the refresh is live.
//! - The first subscription after a teardown restarts the query.

use crate::model::note::Note;
use crate::store::StoreCommand;
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Default idle-unsubscribe window before the feed refresh is torn down.
///
/// Long enough to survive an observer reconnecting right away (e.g. a view
/// being rebuilt), short enough not to keep refreshing for nobody.
pub const DEFAULT_FEED_GRACE: Duration = Duration::from_millis(5000);

struct FeedState {
    observers: usize,
    /// Set when the last observer leaves; cleared on resubscribe.
    idle_since: Option<Instant>,
    /// Whether the worker currently publishes snapshots on mutations.
    refresh_live: bool,
}

struct FeedShared {
    snapshot_tx: watch::Sender<Vec<Note>>,
    cmd_tx: mpsc::UnboundedSender<StoreCommand>,
    state: Mutex<FeedState>,
    grace: Duration,
}

/// Shared handle to the all-notes stream.
#[derive(Clone)]
pub struct NotesFeed {
    shared: Arc<FeedShared>,
}

impl NotesFeed {
    pub(crate) fn new(cmd_tx: mpsc::UnboundedSender<StoreCommand>, grace: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Self {
            shared: Arc::new(FeedShared {
                snapshot_tx,
                cmd_tx,
                state: Mutex::new(FeedState {
                    observers: 0,
                    idle_since: None,
                    refresh_live: false,
                }),
                grace,
            }),
        }
    }

    /// Registers one observer.
    ///
    /// Restarts the underlying query when the refresh was torn down; a
    /// resubscribe within the grace window reuses the live refresh and the
    /// current snapshot as-is.
    pub fn subscribe(&self) -> FeedSubscription {
        let mut state = self.shared.lock_state();
        state.observers += 1;
        state.idle_since = None;
        if !state.refresh_live {
            state.refresh_live = true;
            let _ = self.shared.cmd_tx.send(StoreCommand::RefreshFeed);
            info!("event=feed_start module=store status=ok");
        }
        drop(state);

        FeedSubscription {
            rx: self.shared.snapshot_tx.subscribe(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether mutation-driven snapshot refresh is currently wanted.
    ///
    /// Evaluated by the worker before each publish; this is also where an
    /// expired grace period takes effect.
    pub(crate) fn refresh_is_live(&self) -> bool {
        let mut state = self.shared.lock_state();
        if !state.refresh_live {
            return false;
        }
        if state.observers == 0 {
            if let Some(idle_since) = state.idle_since {
                if idle_since.elapsed() >= self.shared.grace {
                    state.refresh_live = false;
                    state.idle_since = None;
                    info!("event=feed_teardown module=store status=ok");
                    return false;
                }
            }
        }
        true
    }

    pub(crate) fn publish(&self, notes: Vec<Note>) {
        debug!(
            "event=feed_publish module=store status=ok count={}",
            notes.len()
        );
        self.shared.snapshot_tx.send_replace(notes);
    }
}

impl FeedShared {
    fn lock_state(&self) -> MutexGuard<'_, FeedState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// One observer's view of the shared stream.
///
/// Dropping the subscription releases the observer slot; the underlying
/// query survives for the grace period in case the observer comes back.
pub struct FeedSubscription {
    rx: watch::Receiver<Vec<Note>>,
    shared: Arc<FeedShared>,
}

impl FeedSubscription {
    /// Returns the current snapshot, newest note first.
    pub fn snapshot(&self) -> Vec<Note> {
        self.rx.borrow().clone()
    }

    /// Waits for the next published snapshot.
    ///
    /// Returns `false` when the store has shut down and no further
    /// snapshots will arrive.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        let mut state = self.shared.lock_state();
        state.observers = state.observers.saturating_sub(1);
        if state.observers == 0 {
            state.idle_since = Some(Instant::now());
            debug!("event=feed_idle module=store status=ok");
        }
    }
}
