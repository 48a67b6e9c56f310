//! Static recovery policies for every error code.
//!
//! This table is the single source of truth for whether a given failure is
//! retryable, how long to wait before retrying, and what to tell the user.
//! Keeping it separate from the classifier keeps the retry/backoff contract
//! auditable by table inspection alone, independent of any control flow.
//!
//! The table is total: every [`ErrorCode`] has exactly one entry, so
//! classification can never fall through to an undefined policy
//! (verified in the test suite).

use std::collections::HashMap;
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::error::{ClassifiedError, ErrorCode, ErrorSeverity};

/// Fallback backoff when a retryable code has no explicit delay.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Per-code recovery metadata.
///
/// `user_message` doubles as the default technical message when a failure
/// is classified without an underlying error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Human-readable, non-technical explanation of the failure.
    pub user_message: &'static str,
    /// What the operator/user should do about it.
    pub suggestion: &'static str,
    /// Optional short call-to-action label for UI buttons.
    pub action: Option<&'static str>,
    /// Whether an automatic retry may succeed without intervention.
    pub retryable: bool,
    /// Suggested backoff before retrying, in seconds.
    pub retry_after_seconds: Option<u64>,
}

static POLICIES: Lazy<HashMap<ErrorCode, RecoveryPolicy>> = Lazy::new(|| {
    use ErrorCode::*;

    HashMap::from([
        // Authentication
        (
            InvalidCredentials,
            RecoveryPolicy {
                user_message:
                    "Invalid Twilio credentials. Please check your Account SID and Auth Token.",
                suggestion:
                    "Verify your credentials in the Twilio Console and update them in the settings.",
                action: Some("Check Twilio Console"),
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        (
            ExpiredToken,
            RecoveryPolicy {
                user_message:
                    "Your authentication token has expired. Please refresh your credentials.",
                suggestion: "Update your Auth Token in the WhatsApp settings.",
                action: Some("Update Credentials"),
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        (
            Unauthorized,
            RecoveryPolicy {
                user_message: "Access denied. Please check your permissions.",
                suggestion: "Contact your administrator to verify your access rights.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        // Validation
        (
            InvalidPhoneNumber,
            RecoveryPolicy {
                user_message: "Invalid phone number format. Please use the format +1234567890.",
                suggestion:
                    "Ensure phone numbers include country code and are properly formatted.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        (
            InvalidMessageFormat,
            RecoveryPolicy {
                user_message: "Message format is invalid. Please check your message content.",
                suggestion:
                    "Review the message template requirements and ensure all parameters are correct.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        (
            MissingRequiredField,
            RecoveryPolicy {
                user_message:
                    "Required information is missing. Please fill in all required fields.",
                suggestion: "Check the form for any missing required fields and try again.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        // Network
        (
            ConnectionTimeout,
            RecoveryPolicy {
                user_message: "Connection timed out. Please check your internet connection.",
                suggestion: "Verify your internet connection and try again.",
                action: None,
                retryable: true,
                retry_after_seconds: Some(5),
            },
        ),
        (
            NetworkError,
            RecoveryPolicy {
                user_message: "Network error occurred. Please try again.",
                suggestion: "Check your internet connection and try again.",
                action: None,
                retryable: true,
                retry_after_seconds: Some(3),
            },
        ),
        (
            ServiceUnavailable,
            RecoveryPolicy {
                user_message:
                    "WhatsApp service is temporarily unavailable. Please try again later.",
                suggestion:
                    "The service may be under maintenance. Please try again in a few minutes.",
                action: None,
                retryable: true,
                retry_after_seconds: Some(30),
            },
        ),
        // Rate limiting
        (
            RateLimitExceeded,
            RecoveryPolicy {
                user_message: "Rate limit exceeded. Please wait before sending more messages.",
                suggestion: "Wait for the rate limit to reset before sending more messages.",
                action: None,
                retryable: true,
                retry_after_seconds: Some(60),
            },
        ),
        (
            QuotaExceeded,
            RecoveryPolicy {
                user_message:
                    "Message quota exceeded. Please upgrade your plan or wait for quota reset.",
                suggestion:
                    "Consider upgrading your WhatsApp Business API plan or wait for the monthly quota to reset.",
                action: Some("Upgrade Plan"),
                retryable: true,
                retry_after_seconds: Some(3600),
            },
        ),
        // Templates
        (
            TemplateNotFound,
            RecoveryPolicy {
                user_message: "Message template not found. Please check your template name.",
                suggestion: "Verify the template exists in your WhatsApp Business account.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        (
            TemplateNotApproved,
            RecoveryPolicy {
                user_message: "Message template is not approved. Please use an approved template.",
                suggestion: "Wait for template approval or use a different approved template.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        (
            TemplateParamMismatch,
            RecoveryPolicy {
                user_message:
                    "Template parameters do not match. Please check your template parameters.",
                suggestion:
                    "Ensure all required template parameters are provided and correctly formatted.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        // Message delivery
        (
            MessageTooLong,
            RecoveryPolicy {
                user_message: "Message is too long. Please shorten your message.",
                suggestion:
                    "WhatsApp messages have a character limit. Please shorten your message.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        (
            RecipientBlocked,
            RecoveryPolicy {
                user_message:
                    "Recipient has blocked WhatsApp messages. Message cannot be sent.",
                suggestion: "The recipient has opted out of receiving WhatsApp messages.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        (
            DeliveryFailed,
            RecoveryPolicy {
                user_message: "Message delivery failed. Please try again.",
                suggestion: "Check the recipient's phone number and try again.",
                action: None,
                retryable: true,
                retry_after_seconds: Some(10),
            },
        ),
        // Webhooks
        (
            WebhookValidationFailed,
            RecoveryPolicy {
                user_message:
                    "Webhook validation failed. Please check your webhook configuration.",
                suggestion: "Verify your webhook URL and token configuration.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        (
            WebhookTimeout,
            RecoveryPolicy {
                user_message: "Webhook request timed out. Please check your webhook endpoint.",
                suggestion:
                    "Ensure your webhook endpoint responds within the timeout period.",
                action: None,
                retryable: true,
                retry_after_seconds: Some(15),
            },
        ),
        // Configuration
        (
            MissingConfig,
            RecoveryPolicy {
                user_message: "Required configuration is missing. Please complete the setup.",
                suggestion:
                    "Fill in all required configuration fields in the WhatsApp settings.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        (
            InvalidConfig,
            RecoveryPolicy {
                user_message: "Invalid configuration. Please check your settings.",
                suggestion:
                    "Review your WhatsApp configuration and ensure all values are correct.",
                action: None,
                retryable: false,
                retry_after_seconds: None,
            },
        ),
        // Generic
        (
            UnknownError,
            RecoveryPolicy {
                user_message: "An unexpected error occurred. Please try again.",
                suggestion: "If the problem persists, please contact support.",
                action: None,
                retryable: true,
                retry_after_seconds: Some(5),
            },
        ),
    ])
});

impl RecoveryPolicy {
    /// Look up the policy entry for a code.
    ///
    /// The table is total over [`ErrorCode::ALL`]; the unknown-error entry
    /// is the fallback should the two ever drift.
    pub fn for_code(code: ErrorCode) -> &'static RecoveryPolicy {
        POLICIES.get(&code).unwrap_or(&FALLBACK_POLICY)
    }
}

// Fallback if the map and the enum ever drift.
static FALLBACK_POLICY: RecoveryPolicy = RecoveryPolicy {
    user_message: "An unexpected error occurred. Please try again.",
    suggestion: "If the problem persists, please contact support.",
    action: None,
    retryable: true,
    retry_after_seconds: Some(5),
};

/// Whether an automatic retry of this error may succeed.
pub fn is_retryable(error: &ClassifiedError) -> bool {
    error.recovery.retryable
}

/// Backoff to wait before retrying this error.
///
/// Falls back to [`DEFAULT_RETRY_DELAY`] when the policy has no explicit
/// delay.
pub fn retry_delay(error: &ClassifiedError) -> Duration {
    error
        .recovery
        .retry_after_seconds
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_DELAY)
}

/// Presentation-ready error summary.
///
/// Used only for display; control flow goes through [`is_retryable`] and
/// [`retry_delay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSummary {
    /// Severity-derived headline: Notice, Warning, Error, or Critical Error.
    pub title: &'static str,
    /// The user-facing message.
    pub message: String,
    /// What to do about it.
    pub suggestion: String,
    /// Optional call-to-action label.
    pub action: Option<String>,
    /// Whether offering a retry button makes sense.
    pub can_retry: bool,
    /// Backoff to advertise next to the retry affordance.
    pub retry_delay: Duration,
}

/// Build a user-facing summary of a classified error.
pub fn summarize(error: &ClassifiedError) -> ErrorSummary {
    let title = match error.severity {
        ErrorSeverity::Low => "Notice",
        ErrorSeverity::Medium => "Warning",
        ErrorSeverity::High => "Error",
        ErrorSeverity::Critical => "Critical Error",
    };

    ErrorSummary {
        title,
        message: error.user_message.clone(),
        suggestion: error.recovery.suggestion.clone(),
        action: error.recovery.action.clone(),
        can_retry: is_retryable(error),
        retry_delay: retry_delay(error),
    }
}
