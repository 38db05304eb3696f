//! Per-note reminder state machine.
//!
//! # Responsibility
//! - Translate saved reminder timestamps into alarm registrations.
//! - Keep registrations and visible notifications consistent with the
//!   persisted note state across saves, clears, deletes, and fires.
//!
//! # Invariants
//! - States per identity: absent (no reminder), `Scheduled`, `Fired`.
//! - A save always tears down the previous registration and any visible
//!   reminder notification before possibly re-registering.
//! - A reminder time at or before "now" is rolled forward by one calendar
//!   day from the chosen wall-clock time before registration.
//! - Scheduling failures degrade (exact -> windowed) or drop with a log
//!   line; they never propagate to the caller.

use crate::deeplink::note_uri;
use crate::model::note::{Note, NoteId};
use crate::notify::{NoteChannel, NotificationSink};
use crate::reminder::alarm::{alarm_key, AlarmError, AlarmPayload, AlarmPrecision, AlarmService};
use chrono::{Days, Local, TimeZone};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const REMINDER_BODY: &str = "Note reminder";
const FALLBACK_DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Reminder lifecycle state for one note identity.
///
/// An identity absent from the scheduler map has no reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    /// A live alarm registration exists for the given fire time.
    Scheduled { fire_at_ms: i64 },
    /// The alarm fired; a reminder notification may still be visible.
    Fired,
}

/// Scheduler driving alarm registrations and reminder notifications.
pub struct ReminderScheduler {
    alarms: Arc<dyn AlarmService>,
    notifier: Arc<dyn NotificationSink>,
    states: Mutex<HashMap<NoteId, ReminderState>>,
}

impl ReminderScheduler {
    pub fn new(alarms: Arc<dyn AlarmService>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            alarms,
            notifier,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Synchronizes scheduling state with a just-saved note.
    ///
    /// Tears down any previous registration and visible notification for
    /// the identity, then registers for the note's reminder time when one
    /// is set. The teardown-then-register sequence runs under one lock so
    /// two registrations never coexist for the same identity.
    pub fn sync_note(&self, note: &Note, now_ms: i64) {
        let mut states = self.lock_states();
        self.teardown_locked(&mut states, note.id);

        let Some(requested_ms) = note.reminder_at else {
            return;
        };

        let effective_ms = effective_fire_time(requested_ms, now_ms);
        if effective_ms != requested_ms {
            info!(
                "event=reminder_rolled_forward module=scheduler status=ok note_id={} requested_ms={requested_ms} effective_ms={effective_ms}",
                note.id
            );
        }

        let payload = AlarmPayload {
            note_id: note.id,
            title: note.title.clone(),
        };
        if self.register_with_fallback(note.id, effective_ms, payload) {
            states.insert(
                note.id,
                ReminderState::Scheduled {
                    fire_at_ms: effective_ms,
                },
            );
        }
    }

    /// Clears all scheduling state for a deleted note.
    pub fn on_deleted(&self, id: NoteId) {
        let mut states = self.lock_states();
        self.teardown_locked(&mut states, id);
        info!("event=reminder_cleared module=scheduler status=ok note_id={id} cause=delete");
    }

    /// Handles a fired alarm payload.
    ///
    /// Runs with no assumption about in-memory note state; everything the
    /// notification needs travels in the payload.
    pub fn on_fired(&self, payload: &AlarmPayload) {
        {
            let mut states = self.lock_states();
            states.insert(payload.note_id, ReminderState::Fired);
        }

        let uri = note_uri(payload.note_id);
        self.notifier.post(
            NoteChannel::Reminder,
            payload.note_id,
            &payload.title,
            REMINDER_BODY,
            Some(&uri),
        );
        info!(
            "event=reminder_fired module=scheduler status=ok note_id={}",
            payload.note_id
        );
    }

    /// Re-registers persisted reminders after a process restart.
    ///
    /// Future reminders are registered as-is; reminders whose time elapsed
    /// while the process was down are logged and skipped.
    pub fn reschedule_all(&self, notes: &[Note], now_ms: i64) {
        let mut registered = 0usize;
        let mut skipped = 0usize;

        for note in notes {
            let Some(requested_ms) = note.reminder_at else {
                continue;
            };
            if requested_ms <= now_ms {
                warn!(
                    "event=reminder_reschedule module=scheduler status=skipped note_id={} requested_ms={requested_ms} reason=elapsed_while_down",
                    note.id
                );
                skipped += 1;
                continue;
            }
            self.sync_note(note, now_ms);
            registered += 1;
        }

        info!(
            "event=reminder_reschedule module=scheduler status=ok registered={registered} skipped={skipped}"
        );
    }

    /// Returns the scheduling state for one identity. `None` = no reminder.
    pub fn state_of(&self, id: NoteId) -> Option<ReminderState> {
        self.lock_states().get(&id).copied()
    }

    fn register_with_fallback(&self, id: NoteId, fire_at_ms: i64, payload: AlarmPayload) -> bool {
        let key = alarm_key(id);
        match self
            .alarms
            .register(key, fire_at_ms, payload.clone(), AlarmPrecision::Exact)
        {
            Ok(()) => true,
            Err(AlarmError::ExactUnavailable) => {
                // Degradation is silent to the caller: reminders become
                // best-effort instead of precise.
                warn!(
                    "event=alarm_register module=scheduler status=degraded note_id={id} precision=windowed"
                );
                match self
                    .alarms
                    .register(key, fire_at_ms, payload, AlarmPrecision::Windowed)
                {
                    Ok(()) => true,
                    Err(err) => {
                        error!(
                            "event=alarm_register module=scheduler status=error note_id={id} error={err}"
                        );
                        false
                    }
                }
            }
            Err(err) => {
                error!(
                    "event=alarm_register module=scheduler status=error note_id={id} error={err}"
                );
                false
            }
        }
    }

    // Cancel and dismiss unconditionally: both are no-ops when nothing is
    // registered or visible, which also covers identities that fired (or
    // were scheduled) before a restart emptied the in-memory map.
    fn teardown_locked(&self, states: &mut HashMap<NoteId, ReminderState>, id: NoteId) {
        states.remove(&id);
        self.alarms.cancel(alarm_key(id));
        self.notifier.dismiss(id);
    }

    fn lock_states(&self) -> std::sync::MutexGuard<'_, HashMap<NoteId, ReminderState>> {
        match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Resolves the effective fire time for a requested reminder.
///
/// A time strictly in the future is used as-is. A time at or before `now`
/// is rolled forward by one calendar day from the chosen wall-clock time,
/// matching what a picker that just ticked past the chosen minute intended.
pub fn effective_fire_time(requested_ms: i64, now_ms: i64) -> i64 {
    if requested_ms > now_ms {
        return requested_ms;
    }

    Local
        .timestamp_millis_opt(requested_ms)
        .single()
        .and_then(|chosen| chosen.checked_add_days(Days::new(1)))
        .map(|next_day| next_day.timestamp_millis())
        .unwrap_or(requested_ms + FALLBACK_DAY_MS)
}
