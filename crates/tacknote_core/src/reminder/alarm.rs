//! Alarm-service seam and the in-process timer implementation.
//!
//! # Responsibility
//! - Define the registration contract against the host alarm facility.
//! - Provide `TimerAlarmService`, a tokio-timer backend that delivers fired
//!   payloads over a channel to the app's receiver task.
//!
//! # Invariants
//! - Keys are derived as `ALARM_KEY_BASE + note identity`, identically for
//!   registration and cancellation.
//! - Registering an already-registered key replaces the prior registration.
//! - Cancelling an unknown or already-fired key is a no-op.
//! - A fired registration removes itself; it never fires twice.

use crate::model::note::NoteId;
use log::{debug, info};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Derived registration key type.
pub type AlarmKey = i64;

/// Fixed base offset added to the note identity to form the key.
pub const ALARM_KEY_BASE: AlarmKey = 910_000;

/// Windowed registrations are coalesced to the next multiple of this.
const COALESCE_WINDOW_MS: i64 = 60_000;

/// Derives the registration key for one note identity.
pub fn alarm_key(id: NoteId) -> AlarmKey {
    ALARM_KEY_BASE + id
}

/// Payload carried by a registration and delivered verbatim on fire.
///
/// The fired-event receiver operates on this alone; it must not assume any
/// in-memory note state survived until the fire time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmPayload {
    pub note_id: NoteId,
    pub title: String,
}

/// Requested timing quality for a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPrecision {
    /// Fire at the target time, wake-capable.
    Exact,
    /// Fire within a coalescing window after the target time.
    Windowed,
}

/// Registration failure reported by an alarm service.
#[derive(Debug)]
pub enum AlarmError {
    /// The host denies exact-timing capability; retry windowed.
    ExactUnavailable,
    /// Backend-specific failure.
    Backend(String),
}

impl Display for AlarmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExactUnavailable => write!(f, "exact alarm capability unavailable"),
            Self::Backend(message) => write!(f, "alarm backend failure: {message}"),
        }
    }
}

impl Error for AlarmError {}

/// Host alarm facility seam.
pub trait AlarmService: Send + Sync {
    /// Registers a one-shot alarm for `fire_at_ms` (epoch milliseconds),
    /// replacing any live registration under the same key.
    fn register(
        &self,
        key: AlarmKey,
        fire_at_ms: i64,
        payload: AlarmPayload,
        precision: AlarmPrecision,
    ) -> Result<(), AlarmError>;

    /// Cancels the live registration under `key`, if any.
    fn cancel(&self, key: AlarmKey);
}

/// In-process alarm service backed by tokio timers.
///
/// Fired payloads are emitted on the channel returned by [`Self::new`]; the
/// app wires that receiver to the reminder scheduler's fired handler.
pub struct TimerAlarmService {
    fired_tx: mpsc::UnboundedSender<AlarmPayload>,
    tasks: Arc<Mutex<HashMap<AlarmKey, JoinHandle<()>>>>,
    runtime: tokio::runtime::Handle,
    allow_exact: bool,
}

impl TimerAlarmService {
    /// Creates the service and the fired-payload receiver.
    ///
    /// Must be called from within a tokio runtime; the captured handle lets
    /// registrations arrive from non-runtime threads (the store worker).
    /// `allow_exact` mirrors the host's exact-timing permission; when false,
    /// exact registrations are refused and callers fall back to windowed.
    pub fn new(allow_exact: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<AlarmPayload>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let service = Arc::new(Self {
            fired_tx,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            runtime: tokio::runtime::Handle::current(),
            allow_exact,
        });
        (service, fired_rx)
    }

    /// Number of live registrations. Diagnostic only.
    pub fn live_registrations(&self) -> usize {
        lock_tasks(&self.tasks).len()
    }
}

impl AlarmService for TimerAlarmService {
    fn register(
        &self,
        key: AlarmKey,
        fire_at_ms: i64,
        payload: AlarmPayload,
        precision: AlarmPrecision,
    ) -> Result<(), AlarmError> {
        if precision == AlarmPrecision::Exact && !self.allow_exact {
            return Err(AlarmError::ExactUnavailable);
        }

        let deadline_ms = match precision {
            AlarmPrecision::Exact => fire_at_ms,
            AlarmPrecision::Windowed => coalesce_deadline(fire_at_ms),
        };
        let delay = Duration::from_millis(deadline_ms.saturating_sub(now_epoch_ms()).max(0) as u64);

        let fired_tx = self.fired_tx.clone();
        let tasks_for_fire = Arc::clone(&self.tasks);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // Remove first so a racing cancel after this point is a no-op.
            lock_tasks(&tasks_for_fire).remove(&key);
            let _ = fired_tx.send(payload);
        });

        let replaced = lock_tasks(&self.tasks).insert(key, task);
        if let Some(previous) = replaced {
            previous.abort();
            debug!("event=alarm_register module=alarm status=replaced key={key}");
        }
        info!(
            "event=alarm_register module=alarm status=ok key={key} fire_at_ms={deadline_ms} precision={precision:?}"
        );
        Ok(())
    }

    fn cancel(&self, key: AlarmKey) {
        match lock_tasks(&self.tasks).remove(&key) {
            Some(task) => {
                task.abort();
                info!("event=alarm_cancel module=alarm status=ok key={key}");
            }
            None => {
                debug!("event=alarm_cancel module=alarm status=noop key={key}");
            }
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

fn coalesce_deadline(fire_at_ms: i64) -> i64 {
    match fire_at_ms % COALESCE_WINDOW_MS {
        0 => fire_at_ms,
        remainder => fire_at_ms - remainder + COALESCE_WINDOW_MS,
    }
}

fn lock_tasks(
    tasks: &Mutex<HashMap<AlarmKey, JoinHandle<()>>>,
) -> std::sync::MutexGuard<'_, HashMap<AlarmKey, JoinHandle<()>>> {
    match tasks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
