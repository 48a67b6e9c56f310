//! # whatsapp-resilience
//!
//! Error classification, recovery policies, and retry orchestration for
//! WhatsApp messaging integrations.
//!
//! ## Key Features
//!
//! - **Error Taxonomy**: Closed set of failure codes with fixed category
//!   and severity metadata
//! - **Classification**: Pure, total mapping from raw failures or HTTP
//!   statuses to structured [`ClassifiedError`] values
//! - **Recovery Policies**: Static, auditable per-code table of user
//!   messages, retryability, and backoff delays
//! - **Resilience**: [`ErrorHandler`] wraps async operations with
//!   classify → notify → retry semantics, including delayed auto-retry
//!
//! ## Example
//!
//! ```rust,no_run
//! use whatsapp_resilience::{ErrorCode, ErrorHandler, ErrorHandlerOptions};
//!
//! # async fn example() {
//! let handler = ErrorHandler::new(ErrorHandlerOptions::new().max_retries(3));
//!
//! match send_message().await {
//!     Ok(()) => {}
//!     Err(e) => {
//!         let code = ErrorCode::from_http_status(429, None);
//!         handler.handle_error(e, Some(code), None);
//!         // Schedules a retry after the policy's backoff (60s for rate limits)
//!         handler.auto_retry_error(|| send_message());
//!     }
//! }
//! # }
//! # async fn send_message() -> Result<(), whatsapp_resilience::BoxError> { Ok(()) }
//! ```

// Logging utilities (re-exports tracing with log_* naming) - internal only
pub(crate) mod logging;

pub mod error;
pub mod handler;
pub mod notify;
pub mod policy;

#[cfg(test)]
pub mod tests;

// Re-export main types
pub use error::{
    BoxError, ClassifiedError, ErrorCategory, ErrorCode, ErrorContext, ErrorSeverity, Recovery,
};
pub use handler::{ErrorHandler, ErrorHandlerOptions, ErrorState};
pub use notify::{Notification, NotificationSink, NoticeLevel};
pub use policy::{
    is_retryable, retry_delay, summarize, ErrorSummary, RecoveryPolicy, DEFAULT_RETRY_DELAY,
};
