//! Resilient execution controller.
//!
//! [`ErrorHandler`] wraps caller-supplied async operations with
//! classify → notify → (optionally) schedule-retry semantics and exposes
//! observable state for the host application to react to.
//!
//! Per instance the state machine is: Idle (no error) → Failed (error set)
//! → Retrying (`is_retrying`) → back to Idle on success or explicit clear,
//! or back to Failed if the retry attempt itself fails. Once `retry_count`
//! reaches `max_retries`, further retry requests fire
//! `on_max_retries_reached` instead of running the operation.
//!
//! Instances are fully independent. Within one instance the caller is
//! expected to serialize calls (one in-flight operation at a time); the
//! only cross-task interaction is the auto-retry timer, of which at most
//! one may be pending per instance.
//!
//! # Example
//!
//! ```rust,no_run
//! use whatsapp_resilience::{ErrorCode, ErrorHandler, ErrorHandlerOptions};
//!
//! # async fn example() {
//! let handler = ErrorHandler::new(
//!     ErrorHandlerOptions::new()
//!         .max_retries(3)
//!         .on_error(|error| eprintln!("send failed: {error}")),
//! );
//!
//! if let Err(e) = send_campaign_message().await {
//!     handler.handle_error(e, Some(ErrorCode::DeliveryFailed), None);
//!     handler.retry_error(|| send_campaign_message()).await;
//! }
//! # }
//! # async fn send_campaign_message() -> Result<(), whatsapp_resilience::BoxError> { Ok(()) }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::{BoxError, ClassifiedError, ErrorCode, ErrorContext, ErrorSeverity};
use crate::logging::{log_error, log_info, log_warn};
use crate::notify::{Notification, NotificationSink};
use crate::policy;

const MAX_RETRIES_NOTICE: &str = "Maximum retry attempts reached. Please try again later.";
const NOT_RETRYABLE_NOTICE: &str = "This error cannot be retried automatically.";

/// Callback invoked with the classified error.
pub type ErrorCallback = Box<dyn Fn(&ClassifiedError) + Send + Sync>;
/// Callback invoked with the classified error and the new retry count.
pub type RetryCallback = Box<dyn Fn(&ClassifiedError, u32) + Send + Sync>;

/// Configuration for an [`ErrorHandler`] instance, fixed at construction.
pub struct ErrorHandlerOptions {
    max_retries: u32,
    show_notifications: bool,
    log_errors: bool,
    notifier: Option<Arc<dyn NotificationSink>>,
    on_error: Option<ErrorCallback>,
    on_retry: Option<RetryCallback>,
    on_max_retries_reached: Option<ErrorCallback>,
}

impl Default for ErrorHandlerOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            show_notifications: true,
            log_errors: true,
            notifier: None,
            on_error: None,
            on_retry: None,
            on_max_retries_reached: None,
        }
    }
}

impl ErrorHandlerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of retry attempts before terminal failure (default 3).
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Whether to emit user-facing notices (default true).
    #[must_use]
    pub fn show_notifications(mut self, enabled: bool) -> Self {
        self.show_notifications = enabled;
        self
    }

    /// Whether to log classified errors (default true).
    #[must_use]
    pub fn log_errors(mut self, enabled: bool) -> Self {
        self.log_errors = enabled;
        self
    }

    /// Sink that receives user-facing notices.
    ///
    /// Without a sink, notifications are dropped regardless of
    /// `show_notifications`.
    #[must_use]
    pub fn notifier(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(sink);
        self
    }

    /// Invoked every time a failure is classified and recorded.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&ClassifiedError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Invoked when a retry attempt starts, with the new retry count.
    #[must_use]
    pub fn on_retry(
        mut self,
        callback: impl Fn(&ClassifiedError, u32) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Box::new(callback));
        self
    }

    /// Invoked when a retry is requested after the retry budget is spent.
    #[must_use]
    pub fn on_max_retries_reached(
        mut self,
        callback: impl Fn(&ClassifiedError) + Send + Sync + 'static,
    ) -> Self {
        self.on_max_retries_reached = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for ErrorHandlerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlerOptions")
            .field("max_retries", &self.max_retries)
            .field("show_notifications", &self.show_notifications)
            .field("log_errors", &self.log_errors)
            .field("has_notifier", &self.notifier.is_some())
            .field("has_on_error", &self.on_error.is_some())
            .field("has_on_retry", &self.on_retry.is_some())
            .field(
                "has_on_max_retries_reached",
                &self.on_max_retries_reached.is_some(),
            )
            .finish()
    }
}

/// Observable controller state, scoped to one logical operation or UI flow.
#[derive(Debug, Clone)]
pub struct ErrorState {
    /// The current classified error, if any.
    pub error: Option<ClassifiedError>,
    /// Whether a retry attempt is in flight.
    pub is_retrying: bool,
    /// Retry attempts consumed so far.
    pub retry_count: u32,
    /// The instance's retry budget.
    pub max_retries: u32,
}

struct Inner {
    state: Mutex<ErrorState>,
    options: ErrorHandlerOptions,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, ErrorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notification: Notification) {
        if !self.options.show_notifications {
            return;
        }
        if let Some(sink) = &self.options.notifier {
            sink.notify(notification);
        }
    }

    fn log(&self, error: &ClassifiedError) {
        if !self.options.log_errors {
            return;
        }
        match error.severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_error!(
                code = %error.code,
                category = %error.category,
                severity = %error.severity,
                context = ?error.context,
                original = ?error.original(),
                "WhatsApp operation failed"
            ),
            ErrorSeverity::Medium => log_warn!(
                code = %error.code,
                category = %error.category,
                severity = %error.severity,
                context = ?error.context,
                original = ?error.original(),
                "WhatsApp operation failed"
            ),
            ErrorSeverity::Low => log_info!(
                code = %error.code,
                category = %error.category,
                severity = %error.severity,
                context = ?error.context,
                original = ?error.original(),
                "WhatsApp operation failed"
            ),
        }
    }

    /// Record a classified failure: log, transition to Failed, notify,
    /// invoke `on_error`. Never panics or returns an error.
    fn handle_classified(&self, error: ClassifiedError) {
        self.log(&error);

        {
            let mut state = self.state();
            state.error = Some(error.clone());
            state.is_retrying = false;
        }

        let summary = policy::summarize(&error);
        self.notify(Notification::for_severity(
            error.severity,
            format!("{}: {}", summary.title, summary.message),
        ));

        if let Some(callback) = &self.options.on_error {
            callback(&error);
        }
    }

    /// Shared retry routine behind both `retry_error` and the auto-retry
    /// timer. Every failure of `retry_fn` is folded back into Failed state;
    /// nothing escapes to the caller.
    async fn run_retry<F, Fut, T>(&self, retry_fn: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let (error, attempt) = {
            let mut state = self.state();
            let Some(error) = state.error.clone() else {
                return;
            };
            if state.retry_count >= state.max_retries {
                drop(state);
                if let Some(callback) = &self.options.on_max_retries_reached {
                    callback(&error);
                }
                self.notify(Notification::error(MAX_RETRIES_NOTICE));
                return;
            }
            if !policy::is_retryable(&error) {
                drop(state);
                self.notify(Notification::error(NOT_RETRYABLE_NOTICE));
                return;
            }
            state.is_retrying = true;
            state.retry_count += 1;
            let attempt = state.retry_count;
            (error, attempt)
        };

        if let Some(callback) = &self.options.on_retry {
            callback(&error, attempt);
        }

        match retry_fn().await {
            Ok(_) => self.clear(),
            Err(source) => {
                // Keep the original code; record which attempt this was.
                let mut context = error.context.clone().unwrap_or_default();
                context.insert("retry_attempt".to_string(), attempt.into());
                let reclassified = ClassifiedError::new(error.code)
                    .with_source(source)
                    .with_context(context);
                self.handle_classified(reclassified);
            }
        }
    }

    fn clear(&self) {
        let mut state = self.state();
        state.error = None;
        state.is_retrying = false;
        state.retry_count = 0;
    }
}

/// Wraps asynchronous WhatsApp operations with classification, notification,
/// and retry orchestration.
///
/// All failure paths are absorbed: [`handle_error`](Self::handle_error) never
/// panics and [`retry_error`](Self::retry_error)/
/// [`auto_retry_error`](Self::auto_retry_error) never let the wrapped
/// operation's error escape. Dropping the handler cancels any pending
/// auto-retry timer.
pub struct ErrorHandler {
    inner: Arc<Inner>,
    retry_timer: Mutex<Option<JoinHandle<()>>>,
}

impl ErrorHandler {
    /// Create a handler with the given options. State starts Idle.
    pub fn new(options: ErrorHandlerOptions) -> Self {
        let max_retries = options.max_retries;
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ErrorState {
                    error: None,
                    is_retrying: false,
                    retry_count: 0,
                    max_retries,
                }),
                options,
            }),
            retry_timer: Mutex::new(None),
        }
    }

    /// Record an already-classified error.
    pub fn handle_classified(&self, error: ClassifiedError) {
        self.inner.handle_classified(error);
    }

    /// Classify and record a raw failure.
    ///
    /// `code` defaults to [`ErrorCode::UnknownError`] when not supplied.
    pub fn handle_error(
        &self,
        source: impl Into<BoxError>,
        code: Option<ErrorCode>,
        context: Option<ErrorContext>,
    ) {
        let mut error =
            ClassifiedError::new(code.unwrap_or(ErrorCode::UnknownError)).with_source(source);
        if let Some(context) = context {
            error = error.with_context(context);
        }
        self.inner.handle_classified(error);
    }

    /// Retry the failed operation once.
    ///
    /// No-op when there is no current error. When the retry budget is spent,
    /// fires `on_max_retries_reached` (and a notice) without invoking
    /// `retry_fn`. Non-retryable errors only produce a notice. Otherwise the
    /// retry count is incremented, `on_retry` fires, and `retry_fn` runs:
    /// success resets to Idle, failure is re-classified (same code, context
    /// extended with the attempt number) back into Failed state.
    pub async fn retry_error<F, Fut, T>(&self, retry_fn: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        self.inner.run_retry(retry_fn).await;
    }

    /// Schedule a delayed retry of the failed operation.
    ///
    /// Does nothing unless the current error is retryable. The delay comes
    /// from the error's recovery policy. At most one timer is pending per
    /// instance: scheduling again supersedes the previous timer. A
    /// "Retrying in N seconds..." notice is shown for the delay window.
    pub fn auto_retry_error<F, Fut, T>(&self, retry_fn: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
        T: 'static,
    {
        let delay = {
            let state = self.inner.state();
            match &state.error {
                Some(error) if policy::is_retryable(error) => policy::retry_delay(error),
                _ => return,
            }
        };

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.run_retry(retry_fn).await;
        });

        let mut timer = self
            .retry_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timer.replace(handle) {
            previous.abort();
        }
        drop(timer);

        self.inner.notify(
            Notification::info(format!("Retrying in {} seconds...", delay.as_secs()))
                .lasting(delay),
        );
    }

    /// Reset to Idle: no error, not retrying, retry count zero.
    ///
    /// Deliberately does not cancel a pending auto-retry timer; dropping the
    /// handler does.
    pub fn clear_error(&self) {
        self.inner.clear();
    }

    /// Whether an error is currently recorded.
    pub fn has_error(&self) -> bool {
        self.inner.state().error.is_some()
    }

    /// Whether a retry could be attempted right now: an error is present,
    /// its policy allows retrying, and the retry budget is not spent.
    pub fn can_retry(&self) -> bool {
        let state = self.inner.state();
        match &state.error {
            Some(error) => policy::is_retryable(error) && state.retry_count < state.max_retries,
            None => false,
        }
    }

    /// Whether a retry attempt is in flight.
    pub fn is_retrying(&self) -> bool {
        self.inner.state().is_retrying
    }

    /// Retry attempts consumed so far.
    pub fn retry_count(&self) -> u32 {
        self.inner.state().retry_count
    }

    /// The instance's retry budget.
    pub fn max_retries(&self) -> u32 {
        self.inner.state().max_retries
    }

    /// The current classified error, if any.
    pub fn current_error(&self) -> Option<ClassifiedError> {
        self.inner.state().error.clone()
    }

    /// Snapshot of the full controller state.
    pub fn state(&self) -> ErrorState {
        self.inner.state().clone()
    }

    /// Suggested backoff for the current error, if it is retryable.
    pub fn retry_delay(&self) -> Option<Duration> {
        let state = self.inner.state();
        state
            .error
            .as_ref()
            .filter(|error| policy::is_retryable(error))
            .map(policy::retry_delay)
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("state", &self.inner.state().clone())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Drop for ErrorHandler {
    fn drop(&mut self) {
        // A retry must not fire after the handler is gone.
        let mut timer = self
            .retry_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = timer.take() {
            handle.abort();
        }
    }
}
