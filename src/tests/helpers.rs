//! Shared helpers for unit tests.

use std::sync::{Arc, Mutex};

use crate::notify::{Notification, NotificationSink};

/// Notification sink that records every notice it receives.
///
/// Used where tests assert on notice content or ordering; trivial
/// expectation checks use `MockNotificationSink` instead.
#[derive(Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of everything notified so far.
    pub fn notices(&self) -> Vec<Notification> {
        self.notices.lock().expect("sink lock").clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.message).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notices.lock().expect("sink lock").push(notification);
    }
}
