//! User-visible notification surface.
//!
//! # Responsibility
//! - Define the two notification categories and their delivery contract.
//! - Post and dismiss desktop notifications keyed by note identity.
//!
//! # Invariants
//! - Category properties are fixed once at process start.
//! - Post failures are logged and swallowed, never surfaced to write paths.
//! - Dismissing an identity with no visible notification is a no-op.

use crate::model::note::NoteId;
use log::{debug, info, warn};
use notify_rust::{Notification, NotificationHandle, Urgency};
use std::collections::HashMap;
use std::sync::Mutex;

const APP_NAME: &str = "tacknote";

/// Notification category, one per user-facing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteChannel {
    /// Posted synchronously when a new note is saved; opens the list view.
    Added,
    /// Posted when a reminder alarm fires; opens the detail view.
    Reminder,
}

impl NoteChannel {
    /// Stable channel name used in log events.
    pub fn name(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Reminder => "reminder",
        }
    }

    fn urgency(self) -> Urgency {
        match self {
            Self::Added => Urgency::Normal,
            Self::Reminder => Urgency::Critical,
        }
    }

    fn icon(self) -> &'static str {
        match self {
            Self::Added => "note",
            Self::Reminder => "alarm-clock",
        }
    }
}

/// Delivery seam for user-visible notifications.
///
/// Implementations must not propagate delivery failures; the write paths
/// that trigger posting treat the surface as best-effort.
pub trait NotificationSink: Send + Sync {
    /// Posts one notification keyed by note identity. A later post with the
    /// same identity replaces the visible one.
    fn post(
        &self,
        channel: NoteChannel,
        note_id: NoteId,
        summary: &str,
        body: &str,
        open_uri: Option<&str>,
    );

    /// Dismisses the visible notification for one identity, if any.
    fn dismiss(&self, note_id: NoteId);
}

/// Desktop notification sink backed by the host notification daemon.
pub struct DesktopSink {
    handles: Mutex<HashMap<NoteId, NotificationHandle>>,
}

impl DesktopSink {
    /// Creates the sink and announces the fixed category set.
    ///
    /// Called once at process start; the two categories and their urgency
    /// levels never change afterwards.
    pub fn new() -> Self {
        for channel in [NoteChannel::Added, NoteChannel::Reminder] {
            info!(
                "event=notify_channel module=notify status=ok channel={} urgency={:?}",
                channel.name(),
                channel.urgency()
            );
        }
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for DesktopSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for DesktopSink {
    fn post(
        &self,
        channel: NoteChannel,
        note_id: NoteId,
        summary: &str,
        body: &str,
        open_uri: Option<&str>,
    ) {
        let mut notification = Notification::new();
        notification
            .appname(APP_NAME)
            .summary(summary)
            .body(body)
            .icon(channel.icon())
            .urgency(channel.urgency());
        if let Some(uri) = open_uri {
            // The daemon relays the default action back to the app shell,
            // which re-enters through launch classification.
            notification.action("default", uri);
        }

        match notification.show() {
            Ok(handle) => {
                let mut handles = match self.handles.lock() {
                    Ok(handles) => handles,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Some(previous) = handles.insert(note_id, handle) {
                    previous.close();
                }
                debug!(
                    "event=notify_post module=notify status=ok channel={} note_id={}",
                    channel.name(),
                    note_id
                );
            }
            Err(err) => {
                // Best-effort surface: a denied or absent notification
                // daemon must not fail the write that triggered the post.
                warn!(
                    "event=notify_post module=notify status=skipped channel={} note_id={} error={}",
                    channel.name(),
                    note_id,
                    err
                );
            }
        }
    }

    fn dismiss(&self, note_id: NoteId) {
        let handle = {
            let mut handles = match self.handles.lock() {
                Ok(handles) => handles,
                Err(poisoned) => poisoned.into_inner(),
            };
            handles.remove(&note_id)
        };

        match handle {
            Some(handle) => {
                handle.close();
                debug!(
                    "event=notify_dismiss module=notify status=ok note_id={}",
                    note_id
                );
            }
            None => {
                debug!(
                    "event=notify_dismiss module=notify status=noop note_id={}",
                    note_id
                );
            }
        }
    }
}
