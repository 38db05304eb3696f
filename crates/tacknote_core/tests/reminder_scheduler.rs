use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tacknote_core::{
    alarm_key, parse_note_uri, AlarmError, AlarmKey, AlarmPayload, AlarmPrecision, AlarmService,
    Note, NoteChannel, NoteId, NotificationSink, ReminderScheduler, ReminderState,
};

const NOW_MS: i64 = 1_700_000_000_000;
const HOUR_MS: i64 = 3_600_000;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Registration {
    fire_at_ms: i64,
    payload: AlarmPayload,
    precision: AlarmPrecision,
}

/// Alarm facility double recording live registrations by key.
struct FakeAlarmService {
    allow_exact: bool,
    live: Mutex<HashMap<AlarmKey, Registration>>,
}

impl FakeAlarmService {
    fn new(allow_exact: bool) -> Arc<Self> {
        Arc::new(Self {
            allow_exact,
            live: Mutex::new(HashMap::new()),
        })
    }

    fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    fn registration(&self, key: AlarmKey) -> Option<Registration> {
        self.live.lock().unwrap().get(&key).cloned()
    }
}

impl AlarmService for FakeAlarmService {
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
        self.live.lock().unwrap().insert(
            key,
            Registration {
                fire_at_ms,
                payload,
                precision,
            },
        );
        Ok(())
    }

    fn cancel(&self, key: AlarmKey) {
        self.live.lock().unwrap().remove(&key);
    }
}

#[derive(Debug, Clone)]
struct Posted {
    channel: NoteChannel,
    note_id: NoteId,
    summary: String,
    open_uri: Option<String>,
}

/// Notification sink double tracking posts and current visibility.
#[derive(Default)]
struct RecordingSink {
    posts: Mutex<Vec<Posted>>,
    visible: Mutex<Vec<NoteId>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn posts(&self) -> Vec<Posted> {
        self.posts.lock().unwrap().clone()
    }

    fn visible(&self) -> Vec<NoteId> {
        self.visible.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn post(
        &self,
        channel: NoteChannel,
        note_id: NoteId,
        summary: &str,
        _body: &str,
        open_uri: Option<&str>,
    ) {
        self.posts.lock().unwrap().push(Posted {
            channel,
            note_id,
            summary: summary.to_string(),
            open_uri: open_uri.map(str::to_string),
        });
        let mut visible = self.visible.lock().unwrap();
        if !visible.contains(&note_id) {
            visible.push(note_id);
        }
    }

    fn dismiss(&self, note_id: NoteId) {
        self.visible.lock().unwrap().retain(|id| *id != note_id);
    }
}

fn scheduler_with(
    alarms: &Arc<FakeAlarmService>,
    sink: &Arc<RecordingSink>,
) -> ReminderScheduler {
    ReminderScheduler::new(
        Arc::clone(alarms) as Arc<dyn AlarmService>,
        Arc::clone(sink) as Arc<dyn NotificationSink>,
    )
}

fn note_with_reminder(id: NoteId, title: &str, fire_at_ms: i64) -> Note {
    Note::with_id(id, title, "body").with_reminder(fire_at_ms)
}

#[test]
fn save_with_reminder_registers_exactly_one_alarm() {
    let alarms = FakeAlarmService::new(true);
    let sink = RecordingSink::new();
    let scheduler = scheduler_with(&alarms, &sink);

    let note = note_with_reminder(7, "Dentist", NOW_MS + HOUR_MS);
    scheduler.sync_note(&note, NOW_MS);

    assert_eq!(alarms.live_count(), 1);
    let registration = alarms.registration(alarm_key(7)).unwrap();
    assert_eq!(registration.fire_at_ms, NOW_MS + HOUR_MS);
    assert_eq!(registration.payload.note_id, 7);
    assert_eq!(registration.payload.title, "Dentist");
    assert_eq!(registration.precision, AlarmPrecision::Exact);
    assert_eq!(
        scheduler.state_of(7),
        Some(ReminderState::Scheduled {
            fire_at_ms: NOW_MS + HOUR_MS
        })
    );
}

#[test]
fn changing_reminder_time_replaces_registration() {
    let alarms = FakeAlarmService::new(true);
    let sink = RecordingSink::new();
    let scheduler = scheduler_with(&alarms, &sink);

    scheduler.sync_note(&note_with_reminder(3, "Call", NOW_MS + HOUR_MS), NOW_MS);
    scheduler.sync_note(
        &note_with_reminder(3, "Call", NOW_MS + 2 * HOUR_MS),
        NOW_MS,
    );

    assert_eq!(alarms.live_count(), 1);
    let registration = alarms.registration(alarm_key(3)).unwrap();
    assert_eq!(registration.fire_at_ms, NOW_MS + 2 * HOUR_MS);
}

#[test]
fn clearing_reminder_cancels_registration() {
    let alarms = FakeAlarmService::new(true);
    let sink = RecordingSink::new();
    let scheduler = scheduler_with(&alarms, &sink);

    scheduler.sync_note(&note_with_reminder(4, "Water plants", NOW_MS + HOUR_MS), NOW_MS);
    assert_eq!(alarms.live_count(), 1);

    let cleared = Note::with_id(4, "Water plants", "body");
    scheduler.sync_note(&cleared, NOW_MS);

    assert_eq!(alarms.live_count(), 0);
    assert_eq!(scheduler.state_of(4), None);
}

#[test]
fn delete_cancels_registration_and_dismisses_notification() {
    let alarms = FakeAlarmService::new(true);
    let sink = RecordingSink::new();
    let scheduler = scheduler_with(&alarms, &sink);

    scheduler.sync_note(&note_with_reminder(9, "Meeting", NOW_MS + HOUR_MS), NOW_MS);
    scheduler.on_fired(&AlarmPayload {
        note_id: 9,
        title: "Meeting".to_string(),
    });
    assert_eq!(sink.visible(), vec![9]);

    scheduler.on_deleted(9);

    assert_eq!(alarms.live_count(), 0);
    assert!(sink.visible().is_empty());
    assert_eq!(scheduler.state_of(9), None);
}

#[test]
fn fired_alarm_posts_reminder_notification_with_deep_link() {
    let alarms = FakeAlarmService::new(true);
    let sink = RecordingSink::new();
    let scheduler = scheduler_with(&alarms, &sink);

    scheduler.on_fired(&AlarmPayload {
        note_id: 12,
        title: "Stand-up".to_string(),
    });

    let posts = sink.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].channel, NoteChannel::Reminder);
    assert_eq!(posts[0].note_id, 12);
    assert_eq!(posts[0].summary, "Stand-up");
    let uri = posts[0].open_uri.as_deref().unwrap();
    assert_eq!(parse_note_uri(uri), Some(12));
    assert_eq!(scheduler.state_of(12), Some(ReminderState::Fired));
}

#[test]
fn save_after_fire_dismisses_visible_notification() {
    let alarms = FakeAlarmService::new(true);
    let sink = RecordingSink::new();
    let scheduler = scheduler_with(&alarms, &sink);

    scheduler.on_fired(&AlarmPayload {
        note_id: 5,
        title: "Laundry".to_string(),
    });
    assert_eq!(sink.visible(), vec![5]);

    scheduler.sync_note(&Note::with_id(5, "Laundry", "done"), NOW_MS);

    assert!(sink.visible().is_empty());
    assert_eq!(scheduler.state_of(5), None);
}

#[test]
fn exact_denied_degrades_to_windowed_registration() {
    let alarms = FakeAlarmService::new(false);
    let sink = RecordingSink::new();
    let scheduler = scheduler_with(&alarms, &sink);

    scheduler.sync_note(&note_with_reminder(2, "Backup", NOW_MS + HOUR_MS), NOW_MS);

    let registration = alarms.registration(alarm_key(2)).unwrap();
    assert_eq!(registration.precision, AlarmPrecision::Windowed);
    assert_eq!(
        scheduler.state_of(2),
        Some(ReminderState::Scheduled {
            fire_at_ms: NOW_MS + HOUR_MS
        })
    );
}

#[test]
fn just_passed_reminder_time_is_rolled_forward() {
    let alarms = FakeAlarmService::new(true);
    let sink = RecordingSink::new();
    let scheduler = scheduler_with(&alarms, &sink);

    let requested = NOW_MS - 60_000;
    scheduler.sync_note(&note_with_reminder(8, "Gym", requested), NOW_MS);

    let registration = alarms.registration(alarm_key(8)).unwrap();
    assert!(registration.fire_at_ms > NOW_MS);
    assert_ne!(registration.fire_at_ms, requested);
}

#[test]
fn clearing_without_prior_registration_is_a_noop() {
    let alarms = FakeAlarmService::new(true);
    let sink = RecordingSink::new();
    let scheduler = scheduler_with(&alarms, &sink);

    scheduler.sync_note(&Note::with_id(6, "Plain", "no reminder"), NOW_MS);
    scheduler.on_deleted(6);

    assert_eq!(alarms.live_count(), 0);
    assert!(sink.posts().is_empty());
}

#[test]
fn reschedule_all_registers_future_and_skips_elapsed() {
    let alarms = FakeAlarmService::new(true);
    let sink = RecordingSink::new();
    let scheduler = scheduler_with(&alarms, &sink);

    let notes = vec![
        note_with_reminder(1, "future", NOW_MS + HOUR_MS),
        note_with_reminder(2, "elapsed while down", NOW_MS - HOUR_MS),
        Note::with_id(3, "no reminder", ""),
    ];
    scheduler.reschedule_all(&notes, NOW_MS);

    assert_eq!(alarms.live_count(), 1);
    assert!(alarms.registration(alarm_key(1)).is_some());
    assert_eq!(scheduler.state_of(2), None);
    assert_eq!(scheduler.state_of(3), None);
}
