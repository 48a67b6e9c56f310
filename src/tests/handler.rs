// Unit Tests for the Resilient Execution Controller
//
// UNIT UNDER TEST: ErrorHandler (concrete implementation)
//
// BUSINESS RESPONSIBILITY:
//   - Converts every raw failure into a classified error at the boundary
//   - Tracks retry state and enforces the per-instance retry budget
//   - Schedules at most one pending auto-retry timer per instance
//   - Emits severity-scaled notices and lifecycle callbacks
//   - Never lets an exception escape from its retry entry points
//
// TEST COVERAGE:
//   - State transitions: Idle -> Failed -> Retrying -> Idle/Failed
//   - Retry budget enforcement and onMaxRetriesReached semantics
//   - Non-retryable refusal and notice wording
//   - Auto-retry delay, timer supersession, and teardown cancellation
//   - Notification gating and severity-scaled display durations

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{BoxError, ClassifiedError, ErrorCode};
use crate::handler::{ErrorHandler, ErrorHandlerOptions};
use crate::notify::{MockNotificationSink, NoticeLevel};
use crate::tests::helpers::RecordingSink;

fn raw(message: &str) -> BoxError {
    message.to_string().into()
}

/// retry_fn that always rejects.
fn always_fails() -> impl std::future::Future<Output = Result<(), BoxError>> {
    async { Err(raw("still broken")) }
}

#[cfg(test)]
mod state_transition_tests {
    use super::*;

    #[tokio::test]
    async fn test_raw_errors_default_to_unknown_code() {
        // Failures handed in without a code must still classify cleanly

        let handler = ErrorHandler::new(ErrorHandlerOptions::new().log_errors(false));

        handler.handle_error(raw("boom"), None, None);

        let error = handler.current_error().expect("error recorded");
        assert_eq!(error.code, ErrorCode::UnknownError);
        assert_eq!(error.message, "boom");
        assert!(handler.has_error());
        assert!(!handler.is_retrying());
    }

    #[tokio::test]
    async fn test_handle_error_invokes_on_error_with_classified_error() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let handler = ErrorHandler::new(
            ErrorHandlerOptions::new()
                .log_errors(false)
                .on_error(move |error| seen_clone.lock().unwrap().push(error.code)),
        );

        handler.handle_error(raw("socket closed"), Some(ErrorCode::NetworkError), None);

        assert_eq!(*seen.lock().unwrap(), vec![ErrorCode::NetworkError]);
    }

    #[tokio::test]
    async fn test_clear_error_always_yields_idle_state() {
        // Clearing must reset everything regardless of prior state

        let handler = ErrorHandler::new(ErrorHandlerOptions::new().log_errors(false));
        handler.handle_error(raw("transient"), Some(ErrorCode::NetworkError), None);
        handler.retry_error(always_fails).await;
        assert_eq!(handler.retry_count(), 1);

        handler.clear_error();

        let state = handler.state();
        assert!(state.error.is_none());
        assert!(!state.is_retrying);
        assert_eq!(state.retry_count, 0);
    }

    #[tokio::test]
    async fn test_successful_retry_resets_to_idle() {
        // Scenario: operation succeeds on the 2nd retry attempt

        let attempts = Arc::new(AtomicU32::new(0));
        let retry_counts = Arc::new(Mutex::new(Vec::new()));
        let retry_counts_clone = Arc::clone(&retry_counts);

        let handler = ErrorHandler::new(
            ErrorHandlerOptions::new()
                .log_errors(false)
                .on_retry(move |_, count| retry_counts_clone.lock().unwrap().push(count)),
        );
        handler.handle_error(raw("flaky network"), Some(ErrorCode::NetworkError), None);

        for _ in 0..2 {
            let attempts = Arc::clone(&attempts);
            handler
                .retry_error(move || async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(raw("first retry still failing"))
                    } else {
                        Ok(())
                    }
                })
                .await;
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(*retry_counts.lock().unwrap(), vec![1, 2]);
        assert!(!handler.has_error(), "success returns the handler to idle");
        assert_eq!(handler.retry_count(), 0, "retry count resets on success");
        assert!(!handler.is_retrying());
    }

    #[tokio::test]
    async fn test_failed_retry_preserves_code_and_records_attempt() {
        // Re-classification must keep the original code and stamp which
        // attempt produced the new failure

        let handler = ErrorHandler::new(ErrorHandlerOptions::new().log_errors(false));
        handler.handle_error(raw("timeout"), Some(ErrorCode::ConnectionTimeout), None);

        handler.retry_error(always_fails).await;

        let error = handler.current_error().expect("still failed");
        assert_eq!(error.code, ErrorCode::ConnectionTimeout);
        assert_eq!(error.message, "still broken");
        let context = error.context.as_ref().expect("context recorded");
        assert_eq!(
            context.get("retry_attempt"),
            Some(&serde_json::Value::from(1u32))
        );
        assert!(!handler.is_retrying());
    }

    #[tokio::test]
    async fn test_retry_without_error_is_a_no_op() {
        let handler = ErrorHandler::new(ErrorHandlerOptions::new().log_errors(false));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        handler
            .retry_error(move || async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(handler.retry_count(), 0);
    }
}

#[cfg(test)]
mod retry_budget_tests {
    use super::*;

    #[tokio::test]
    async fn test_retry_budget_is_enforced_exactly() {
        // Scenario: max_retries = 2, retry_fn always rejects. The 3rd retry
        // request must not run the operation and must report exhaustion.

        let invocations = Arc::new(AtomicU32::new(0));
        let exhausted = Arc::new(AtomicU32::new(0));
        let exhausted_clone = Arc::clone(&exhausted);

        let handler = ErrorHandler::new(
            ErrorHandlerOptions::new()
                .max_retries(2)
                .log_errors(false)
                .on_max_retries_reached(move |_| {
                    exhausted_clone.fetch_add(1, Ordering::SeqCst);
                }),
        );
        handler.handle_error(raw("down"), Some(ErrorCode::ServiceUnavailable), None);

        for _ in 0..3 {
            let invocations = Arc::clone(&invocations);
            handler
                .retry_error(move || async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Err::<(), BoxError>(raw("still down"))
                })
                .await;
        }

        assert_eq!(
            invocations.load(Ordering::SeqCst),
            2,
            "operation runs only while budget remains"
        );
        assert_eq!(handler.retry_count(), 2, "count stops at the budget");
        assert_eq!(
            exhausted.load(Ordering::SeqCst),
            1,
            "exhaustion fires on the rejected request"
        );
        assert!(!handler.can_retry());

        // Each further request reports exhaustion exactly once
        handler.retry_error(always_fails).await;
        assert_eq!(exhausted.load(Ordering::SeqCst), 2);
        assert_eq!(handler.retry_count(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_errors_are_refused() {
        let handler = ErrorHandler::new(ErrorHandlerOptions::new().log_errors(false));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        handler.handle_error(raw("bad token"), Some(ErrorCode::InvalidCredentials), None);
        handler
            .retry_error(move || async move {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0, "terminal errors never retry");
        assert_eq!(handler.retry_count(), 0);
        assert!(!handler.can_retry());
    }

    #[tokio::test]
    async fn test_can_retry_reflects_error_policy_and_budget() {
        let handler =
            ErrorHandler::new(ErrorHandlerOptions::new().max_retries(1).log_errors(false));
        assert!(!handler.can_retry(), "no error, nothing to retry");

        handler.handle_error(raw("slow"), Some(ErrorCode::ConnectionTimeout), None);
        assert!(handler.can_retry());

        handler.retry_error(always_fails).await;
        assert!(!handler.can_retry(), "budget spent");
    }
}

#[cfg(test)]
mod notification_tests {
    use super::*;

    #[tokio::test]
    async fn test_notices_scale_with_severity() {
        // Display durations: critical 10s, high 8s, medium 6s, low 4s

        let cases = [
            (ErrorCode::InvalidCredentials, NoticeLevel::Error, 10),
            (ErrorCode::QuotaExceeded, NoticeLevel::Error, 8),
            (ErrorCode::RateLimitExceeded, NoticeLevel::Warning, 6),
            (ErrorCode::NetworkError, NoticeLevel::Info, 4),
        ];

        for (code, level, seconds) in cases {
            let sink = RecordingSink::new();
            let handler = ErrorHandler::new(
                ErrorHandlerOptions::new()
                    .log_errors(false)
                    .notifier(sink.clone()),
            );

            handler.handle_classified(ClassifiedError::new(code));

            let notices = sink.notices();
            assert_eq!(notices.len(), 1, "one notice per failure for {code}");
            assert_eq!(notices[0].level, level, "level for {code}");
            assert_eq!(
                notices[0].duration,
                Duration::from_secs(seconds),
                "duration for {code}"
            );
        }
    }

    #[tokio::test]
    async fn test_notice_message_combines_title_and_user_message() {
        let mut mock = MockNotificationSink::new();
        mock.expect_notify()
            .withf(|notification| {
                notification.message.starts_with("Warning: ")
                    && notification.message.contains("Rate limit exceeded")
            })
            .times(1)
            .returning(|_| ());

        let handler = ErrorHandler::new(
            ErrorHandlerOptions::new()
                .log_errors(false)
                .notifier(Arc::new(mock)),
        );

        handler.handle_classified(ClassifiedError::new(ErrorCode::RateLimitExceeded));
    }

    #[tokio::test]
    async fn test_notifications_can_be_disabled() {
        let mut mock = MockNotificationSink::new();
        mock.expect_notify().never();

        let handler = ErrorHandler::new(
            ErrorHandlerOptions::new()
                .log_errors(false)
                .show_notifications(false)
                .notifier(Arc::new(mock)),
        );

        handler.handle_classified(ClassifiedError::new(ErrorCode::InvalidCredentials));
        handler.retry_error(always_fails).await;
    }

    #[tokio::test]
    async fn test_exhaustion_and_refusal_notices_use_fixed_wording() {
        let sink = RecordingSink::new();
        let handler = ErrorHandler::new(
            ErrorHandlerOptions::new()
                .max_retries(0)
                .log_errors(false)
                .notifier(sink.clone()),
        );

        handler.handle_classified(ClassifiedError::new(ErrorCode::NetworkError));
        handler.retry_error(always_fails).await;
        assert!(sink
            .messages()
            .iter()
            .any(|m| m == "Maximum retry attempts reached. Please try again later."));

        // Budget is checked first, so the refusal notice needs budget left
        let refusing = ErrorHandler::new(
            ErrorHandlerOptions::new()
                .log_errors(false)
                .notifier(sink.clone()),
        );
        refusing.handle_classified(ClassifiedError::new(ErrorCode::InvalidConfig));
        refusing.retry_error(always_fails).await;
        assert!(sink
            .messages()
            .iter()
            .any(|m| m == "This error cannot be retried automatically."));
    }
}

#[cfg(test)]
mod auto_retry_tests {
    use super::*;

    async fn let_timers_run(duration: Duration) {
        // Paused-clock runtimes auto-advance; the trailing yields give the
        // spawned timer task a chance to finish its retry.
        tokio::time::sleep(duration).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_retry_fires_after_the_policy_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let handler = ErrorHandler::new(ErrorHandlerOptions::new().log_errors(false));
        handler.handle_error(raw("timeout"), Some(ErrorCode::ConnectionTimeout), None);

        handler.auto_retry_error(move || async move {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<(), BoxError>(())
        });

        // ConnectionTimeout backs off 5 seconds
        let_timers_run(Duration::from_secs(4)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0, "not before the delay");

        let_timers_run(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "fires after the delay");
        assert!(!handler.has_error(), "successful retry clears the error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_supersedes_the_pending_timer() {
        // Only one auto-retry timer may exist per instance: the second
        // schedule cancels the first, so exactly one retry fires

        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let first_clone = Arc::clone(&first);
        let second_clone = Arc::clone(&second);

        let handler = ErrorHandler::new(ErrorHandlerOptions::new().log_errors(false));
        handler.handle_error(raw("timeout"), Some(ErrorCode::ConnectionTimeout), None);

        handler.auto_retry_error(move || async move {
            first_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<(), BoxError>(())
        });
        handler.auto_retry_error(move || async move {
            second_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<(), BoxError>(())
        });

        let_timers_run(Duration::from_secs(20)).await;

        assert_eq!(first.load(Ordering::SeqCst), 0, "superseded timer never fires");
        assert_eq!(second.load(Ordering::SeqCst), 1, "replacement fires once");
        assert_eq!(handler.retry_count(), 0, "the one retry succeeded and reset");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_handler_cancels_the_pending_timer() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let handler = ErrorHandler::new(ErrorHandlerOptions::new().log_errors(false));
        handler.handle_error(raw("timeout"), Some(ErrorCode::ConnectionTimeout), None);
        handler.auto_retry_error(move || async move {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<(), BoxError>(())
        });

        drop(handler);
        let_timers_run(Duration::from_secs(20)).await;

        assert_eq!(
            calls.load(Ordering::SeqCst),
            0,
            "no retry may fire after teardown"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_retry_refuses_non_retryable_errors() {
        let sink = RecordingSink::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let handler = ErrorHandler::new(
            ErrorHandlerOptions::new()
                .log_errors(false)
                .notifier(sink.clone()),
        );
        handler.handle_classified(ClassifiedError::new(ErrorCode::InvalidCredentials));
        let notices_after_failure = sink.notices().len();

        handler.auto_retry_error(move || async move {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<(), BoxError>(())
        });

        let_timers_run(Duration::from_secs(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            sink.notices().len(),
            notices_after_failure,
            "no timer, no scheduling notice"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_notice_lasts_the_delay_window() {
        let sink = RecordingSink::new();
        let handler = ErrorHandler::new(
            ErrorHandlerOptions::new()
                .log_errors(false)
                .notifier(sink.clone()),
        );
        handler.handle_classified(ClassifiedError::new(ErrorCode::RateLimitExceeded));

        handler.auto_retry_error(|| async { Ok::<(), BoxError>(()) });

        let notices = sink.notices();
        let schedule_notice = notices
            .iter()
            .find(|n| n.message == "Retrying in 60 seconds...")
            .expect("schedule notice emitted");
        assert_eq!(schedule_notice.level, NoticeLevel::Info);
        assert_eq!(schedule_notice.duration, Duration::from_secs(60));
    }
}
