//! Error taxonomy and classifier for WhatsApp operations.
//!
//! This module provides structured error handling for WhatsApp messaging
//! integrations, including categorization, severity levels, and retry guidance.
//!
//! # Error Types
//!
//! The central value type is [`ClassifiedError`], produced by classifying a
//! failure code (and optionally the raw error behind it):
//! - Authentication failures (bad credentials, expired tokens)
//! - Validation failures (phone numbers, message formats, missing fields)
//! - Network issues (timeouts, unreachable service)
//! - Rate limiting and quota exhaustion
//! - Template, delivery, webhook, and configuration problems
//!
//! # Classification Example
//!
//! ```rust
//! use whatsapp_resilience::{ClassifiedError, ErrorCategory, ErrorCode, ErrorSeverity};
//!
//! let error = ClassifiedError::new(ErrorCode::RateLimitExceeded);
//!
//! assert_eq!(error.category, ErrorCategory::RateLimit);
//! assert_eq!(error.severity, ErrorSeverity::Medium);
//! assert!(error.recovery.retryable);
//!
//! // Get user-friendly message
//! println!("Tell user: {}", error.user_message);
//! ```
//!
//! Classification is a pure function of the code plus the static policy
//! table in [`crate::policy`]: it performs no I/O and cannot fail. The same
//! code always yields the same category, severity, and recovery metadata.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::policy::RecoveryPolicy;

/// Boxed error type accepted at the classification boundary.
///
/// Raw failures from caller-supplied operations arrive as this type and are
/// always converted to [`ClassifiedError`] before anything upstream sees them.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Caller-supplied diagnostic payload attached to a classified error
/// (e.g. which phone number or template was involved).
pub type ErrorContext = HashMap<String, serde_json::Value>;

// ============================================================================
// Error taxonomy
// ============================================================================

/// Fine-grained failure identifiers for WhatsApp operations.
///
/// This is a closed set: every code carries a fixed [`ErrorCategory`] and
/// [`ErrorSeverity`], and has exactly one entry in the static recovery-policy
/// table. Serialized spellings match the provider-facing wire format
/// (`INVALID_CREDENTIALS`, `RATE_LIMIT_EXCEEDED`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication
    /// Account SID / auth token pair rejected by the provider.
    InvalidCredentials,
    /// Authentication token has expired and must be refreshed.
    ExpiredToken,
    /// Credentials are valid but lack permission for the operation.
    Unauthorized,

    // Validation
    /// Phone number is not in E.164 format.
    InvalidPhoneNumber,
    /// Message content violates format requirements.
    InvalidMessageFormat,
    /// A required field was not supplied.
    MissingRequiredField,

    // Network
    /// Connection to the messaging service timed out.
    ConnectionTimeout,
    /// Generic network-level failure.
    NetworkError,
    /// Messaging service returned a server error or is down.
    ServiceUnavailable,

    // Rate limiting
    /// Per-interval message rate limit hit.
    RateLimitExceeded,
    /// Account-level message quota exhausted.
    QuotaExceeded,

    // Templates
    /// Referenced message template does not exist.
    TemplateNotFound,
    /// Template exists but has not been approved for sending.
    TemplateNotApproved,
    /// Supplied parameters do not match the template definition.
    TemplateParamMismatch,

    // Message delivery
    /// Message body exceeds the allowed length.
    MessageTooLong,
    /// Recipient has opted out of WhatsApp messages.
    RecipientBlocked,
    /// Provider accepted the message but delivery failed.
    DeliveryFailed,

    // Webhooks
    /// Inbound webhook failed signature/token validation.
    WebhookValidationFailed,
    /// Webhook endpoint did not respond in time.
    WebhookTimeout,

    // Configuration
    /// Required integration configuration is absent.
    MissingConfig,
    /// Integration configuration is present but invalid.
    InvalidConfig,

    // Generic
    /// Anything that does not map to a more specific code.
    UnknownError,
}

impl ErrorCode {
    /// Every enumerated code, in declaration order.
    ///
    /// Used to verify totality of code-indexed tables.
    pub const ALL: [ErrorCode; 22] = [
        Self::InvalidCredentials,
        Self::ExpiredToken,
        Self::Unauthorized,
        Self::InvalidPhoneNumber,
        Self::InvalidMessageFormat,
        Self::MissingRequiredField,
        Self::ConnectionTimeout,
        Self::NetworkError,
        Self::ServiceUnavailable,
        Self::RateLimitExceeded,
        Self::QuotaExceeded,
        Self::TemplateNotFound,
        Self::TemplateNotApproved,
        Self::TemplateParamMismatch,
        Self::MessageTooLong,
        Self::RecipientBlocked,
        Self::DeliveryFailed,
        Self::WebhookValidationFailed,
        Self::WebhookTimeout,
        Self::MissingConfig,
        Self::InvalidConfig,
        Self::UnknownError,
    ];

    /// Wire-format spelling of this code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::ExpiredToken => "EXPIRED_TOKEN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidPhoneNumber => "INVALID_PHONE_NUMBER",
            Self::InvalidMessageFormat => "INVALID_MESSAGE_FORMAT",
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::ConnectionTimeout => "CONNECTION_TIMEOUT",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            Self::TemplateNotApproved => "TEMPLATE_NOT_APPROVED",
            Self::TemplateParamMismatch => "TEMPLATE_PARAM_MISMATCH",
            Self::MessageTooLong => "MESSAGE_TOO_LONG",
            Self::RecipientBlocked => "RECIPIENT_BLOCKED",
            Self::DeliveryFailed => "DELIVERY_FAILED",
            Self::WebhookValidationFailed => "WEBHOOK_VALIDATION_FAILED",
            Self::WebhookTimeout => "WEBHOOK_TIMEOUT",
            Self::MissingConfig => "MISSING_CONFIG",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Get the coarse category this code belongs to.
    ///
    /// Category is static metadata on the code, not a string heuristic:
    /// domain-specific codes win over generic ones (a template parameter
    /// mismatch is a validation problem, a webhook timeout stays a webhook
    /// problem), and credential-related codes are authentication rather
    /// than validation.
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::InvalidCredentials | Self::ExpiredToken | Self::Unauthorized => {
                ErrorCategory::Authentication
            }
            Self::InvalidPhoneNumber
            | Self::InvalidMessageFormat
            | Self::MissingRequiredField
            | Self::TemplateParamMismatch => ErrorCategory::Validation,
            Self::ConnectionTimeout | Self::NetworkError | Self::ServiceUnavailable => {
                ErrorCategory::Network
            }
            Self::RateLimitExceeded | Self::QuotaExceeded => ErrorCategory::RateLimit,
            Self::TemplateNotFound | Self::TemplateNotApproved => ErrorCategory::Template,
            Self::MessageTooLong | Self::RecipientBlocked | Self::DeliveryFailed => {
                ErrorCategory::Message
            }
            Self::WebhookValidationFailed | Self::WebhookTimeout => ErrorCategory::Webhook,
            Self::MissingConfig | Self::InvalidConfig => ErrorCategory::Configuration,
            Self::UnknownError => ErrorCategory::Unknown,
        }
    }

    /// Get the severity for this code.
    ///
    /// Rules are evaluated in priority order:
    /// 1. Codes representing total loss of capability are critical.
    /// 2. Remaining authentication codes, quota exhaustion, and unapproved
    ///    templates are high.
    /// 3. Rate limiting, template lookup failures, and delivery failures
    ///    are medium.
    /// 4. Everything else is low.
    pub fn severity(self) -> ErrorSeverity {
        match self {
            Self::InvalidCredentials | Self::MissingConfig | Self::Unauthorized => {
                ErrorSeverity::Critical
            }
            Self::ExpiredToken | Self::QuotaExceeded | Self::TemplateNotApproved => {
                ErrorSeverity::High
            }
            Self::RateLimitExceeded | Self::TemplateNotFound | Self::DeliveryFailed => {
                ErrorSeverity::Medium
            }
            _ => ErrorSeverity::Low,
        }
    }

    /// Map an HTTP status code from the messaging provider to an error code.
    ///
    /// For 400 responses the response body (when available) is inspected for
    /// keyword hints to pick a more specific code. This function is total:
    /// an unmapped status degrades to [`ErrorCode::UnknownError`] rather
    /// than failing classification.
    ///
    /// # Example
    ///
    /// ```rust
    /// use whatsapp_resilience::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::from_http_status(429, None), ErrorCode::RateLimitExceeded);
    /// assert_eq!(ErrorCode::from_http_status(503, None), ErrorCode::ServiceUnavailable);
    /// assert_eq!(
    ///     ErrorCode::from_http_status(400, Some("invalid phone number")),
    ///     ErrorCode::InvalidPhoneNumber,
    /// );
    /// ```
    pub fn from_http_status(status: u16, message: Option<&str>) -> Self {
        match status {
            400 => {
                let body = message.unwrap_or_default();
                if body.contains("phone") {
                    Self::InvalidPhoneNumber
                } else if body.contains("template") {
                    Self::TemplateNotFound
                } else if body.contains("message") {
                    Self::InvalidMessageFormat
                } else {
                    Self::InvalidConfig
                }
            }
            401 => Self::InvalidCredentials,
            403 => Self::Unauthorized,
            404 => Self::TemplateNotFound,
            408 => Self::ConnectionTimeout,
            429 => Self::RateLimitExceeded,
            500 | 502 | 503 | 504 => Self::ServiceUnavailable,
            _ => Self::UnknownError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse grouping of error codes for routing and handling decisions.
///
/// Derived deterministically from an [`ErrorCode`] via
/// [`ErrorCode::category()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Credential and permission problems. Never retryable.
    Authentication,
    /// Caller-supplied input was rejected. Fix the input, then retry.
    Validation,
    /// Connectivity problems between this process and the provider.
    Network,
    /// Provider-side throttling or quota exhaustion.
    RateLimit,
    /// Message-template lookup or approval problems.
    Template,
    /// Message content or delivery problems.
    Message,
    /// Inbound webhook handling problems.
    Webhook,
    /// Integration configuration problems.
    Configuration,
    /// Anything not covered above.
    Unknown,
}

impl ErrorCategory {
    /// Wire-format spelling of this category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Validation => "validation",
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::Template => "template",
            Self::Message => "message",
            Self::Webhook => "webhook",
            Self::Configuration => "configuration",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity level for logging, alerting, and notification scaling.
///
/// Ordered from least to most urgent, so `severity >= ErrorSeverity::High`
/// works as expected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Recoverable, expected failure. Logged at info level.
    Low,
    /// Affects a specific feature. Logged at warn level.
    Medium,
    /// Significantly impacts functionality. Logged at error level.
    High,
    /// Messaging capability is lost until an operator intervenes.
    Critical,
}

impl ErrorSeverity {
    /// Wire-format spelling of this severity.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Classified error
// ============================================================================

/// Recovery metadata attached to a classified error.
///
/// Always consistent with the code's entry in the static policy table:
/// a given code yields the same recovery fields regardless of call site.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Recovery {
    /// What the operator/user should do about this error.
    pub suggestion: String,
    /// Optional short call-to-action label (e.g. "Check Twilio Console").
    pub action: Option<String>,
    /// Whether an automatic retry may succeed without intervention.
    pub retryable: bool,
    /// Suggested backoff before retrying, in seconds.
    pub retry_after_seconds: Option<u64>,
}

impl From<&RecoveryPolicy> for Recovery {
    fn from(policy: &RecoveryPolicy) -> Self {
        Self {
            suggestion: policy.suggestion.to_string(),
            action: policy.action.map(str::to_string),
            retryable: policy.retryable,
            retry_after_seconds: policy.retry_after_seconds,
        }
    }
}

/// A raw failure mapped to category, severity, user message, and recovery
/// policy.
///
/// Immutable once constructed. The original error (if any) is retained for
/// logging but is never part of the user-facing message.
///
/// # Creating Classified Errors
///
/// ```rust
/// use whatsapp_resilience::{ClassifiedError, ErrorCode};
///
/// // From a code alone (non-exception domain failure)
/// let error = ClassifiedError::new(ErrorCode::TemplateNotFound);
/// assert_eq!(error.message, error.user_message);
///
/// // From a raw error, with diagnostic context
/// let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
/// let error = ClassifiedError::new(ErrorCode::ConnectionTimeout)
///     .with_source(io_err)
///     .with_context([("phone".to_string(), "+15550100".into())].into());
/// assert_eq!(error.message, "connect timed out");
/// ```
///
/// # Code → Category / Severity / Retryable
///
/// | Code | Category | Severity | Retryable |
/// |------|----------|----------|-----------|
/// | `InvalidCredentials` | Authentication | Critical | No |
/// | `ExpiredToken` | Authentication | High | No |
/// | `Unauthorized` | Authentication | Critical | No |
/// | `InvalidPhoneNumber` | Validation | Low | No |
/// | `InvalidMessageFormat` | Validation | Low | No |
/// | `MissingRequiredField` | Validation | Low | No |
/// | `ConnectionTimeout` | Network | Low | Yes (5s) |
/// | `NetworkError` | Network | Low | Yes (3s) |
/// | `ServiceUnavailable` | Network | Low | Yes (30s) |
/// | `RateLimitExceeded` | RateLimit | Medium | Yes (60s) |
/// | `QuotaExceeded` | RateLimit | High | Yes (3600s) |
/// | `TemplateNotFound` | Template | Medium | No |
/// | `TemplateNotApproved` | Template | High | No |
/// | `TemplateParamMismatch` | Validation | Low | No |
/// | `MessageTooLong` | Message | Low | No |
/// | `RecipientBlocked` | Message | Low | No |
/// | `DeliveryFailed` | Message | Medium | Yes (10s) |
/// | `WebhookValidationFailed` | Webhook | Low | No |
/// | `WebhookTimeout` | Webhook | Low | Yes (15s) |
/// | `MissingConfig` | Configuration | Critical | No |
/// | `InvalidConfig` | Configuration | Low | No |
/// | `UnknownError` | Unknown | Low | Yes (5s) |
#[derive(Error, Debug, Clone, serde::Serialize)]
#[error("[{category}] {code}: {message}")]
pub struct ClassifiedError {
    /// Coarse grouping, derived from `code`.
    pub category: ErrorCategory,
    /// The fine-grained failure identifier.
    pub code: ErrorCode,
    /// Technical message: the original error's text when available,
    /// otherwise the policy's default user message.
    pub message: String,
    /// Human-readable, non-technical explanation safe to display.
    pub user_message: String,
    /// Urgency, derived from `code`.
    pub severity: ErrorSeverity,
    /// Classification time (not occurrence time).
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied diagnostic payload.
    pub context: Option<ErrorContext>,
    /// Recovery metadata from the static policy table.
    pub recovery: Recovery,
    #[serde(skip)]
    original: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ClassifiedError {
    /// Classify a failure code into a full error value.
    ///
    /// Pure and total: looks up the static policy entry for `code`, derives
    /// category and severity, and stamps the classification time. Succeeds
    /// even without an underlying error.
    pub fn new(code: ErrorCode) -> Self {
        let policy = RecoveryPolicy::for_code(code);
        Self {
            category: code.category(),
            code,
            message: policy.user_message.to_string(),
            user_message: policy.user_message.to_string(),
            severity: code.severity(),
            timestamp: Utc::now(),
            context: None,
            recovery: Recovery::from(policy),
            original: None,
        }
    }

    /// Attach the raw error behind this failure.
    ///
    /// Replaces `message` with the original error's text; the error itself
    /// is retained for logging and never shown to the end user.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        let source: BoxError = source.into();
        self.message = source.to_string();
        self.original = Some(Arc::from(source));
        self
    }

    /// Attach caller-supplied diagnostic context.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// The retained original error, if any. Logging only.
    pub fn original(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.original.as_deref()
    }
}
