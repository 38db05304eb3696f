//! Core domain logic for tacknote.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod deeplink;
pub mod logging;
pub mod model;
pub mod notify;
pub mod reminder;
pub mod repo;
pub mod store;

pub use deeplink::{classify_launch, note_uri, parse_note_uri, LaunchTarget};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{Note, NoteId, NoteValidationError, UNASSIGNED_NOTE_ID};
pub use notify::{DesktopSink, NoteChannel, NotificationSink};
pub use reminder::alarm::{
    alarm_key, now_epoch_ms, AlarmError, AlarmKey, AlarmPayload, AlarmPrecision, AlarmService,
    TimerAlarmService, ALARM_KEY_BASE,
};
pub use reminder::scheduler::{effective_fire_time, ReminderScheduler, ReminderState};
pub use repo::note_repo::{NoteRepository, RepoError, RepoResult, SqliteNoteRepository};
pub use store::{FeedSubscription, NoteStore, StoreError, StoreResult, DEFAULT_FEED_GRACE};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
