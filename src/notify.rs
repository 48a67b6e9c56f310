//! Notification sink abstraction.
//!
//! The controller surfaces human-readable error summaries through a
//! [`NotificationSink`] supplied by the host application (typically backed
//! by a toast/snackbar widget). The core never renders anything itself.

use std::time::Duration;

use crate::error::ErrorSeverity;

/// Display urgency of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational notice.
    Info,
    /// Something degraded but the flow can continue.
    Warning,
    /// The operation failed.
    Error,
}

/// A single user-facing notice.
///
/// `duration` is a UI hint for how long the notice should stay visible;
/// sinks are free to ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub message: String,
    pub duration: Duration,
}

impl Notification {
    /// Notice display duration when no severity scaling applies.
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(4);

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            duration: Self::DEFAULT_DURATION,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            duration: Self::DEFAULT_DURATION,
        }
    }

    /// Build a severity-scaled notice.
    ///
    /// Critical and high severities use longer, more insistent display
    /// windows than medium and low: 10s / 8s / 6s / 4s.
    pub fn for_severity(severity: ErrorSeverity, message: impl Into<String>) -> Self {
        let (level, duration) = match severity {
            ErrorSeverity::Critical => (NoticeLevel::Error, Duration::from_secs(10)),
            ErrorSeverity::High => (NoticeLevel::Error, Duration::from_secs(8)),
            ErrorSeverity::Medium => (NoticeLevel::Warning, Duration::from_secs(6)),
            ErrorSeverity::Low => (NoticeLevel::Info, Duration::from_secs(4)),
        };
        Self {
            level,
            message: message.into(),
            duration,
        }
    }

    /// Override the display duration.
    #[must_use]
    pub fn lasting(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Destination for user-facing notices emitted by the error handler.
///
/// Implement this against your toast component, CLI printer, or test
/// recorder. Implementations must be cheap and non-blocking; the handler
/// calls `notify` inline.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}
