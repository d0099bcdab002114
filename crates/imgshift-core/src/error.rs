//! Error types module
//!
//! This module provides the core error types used throughout imgshift. Every failure
//! that can reach a client is expressed as an `AppError` variant; lower layers
//! (storage, transcoding, payment collaborators) keep their own error enums and are
//! translated into `AppError` at their call boundary.

use std::io;

/// Level at which a failed request is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Client mistakes: bad format, missing fields, unpaid batches
    Debug,
    /// Inputs the transcoder could not handle
    Warn,
    /// Server-side faults: scratch storage, payment provider, bugs
    Error,
}

/// How an error presents itself to HTTP clients and to the logs.
///
/// Kept free of any web framework type so every crate can depend on it.
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;

    /// Stable code such as `"INVALID_FORMAT"`.
    fn error_code(&self) -> &'static str;

    /// Retrying the identical request might succeed.
    fn is_recoverable(&self) -> bool;

    fn suggested_action(&self) -> Option<&'static str>;

    /// Message safe to show a client; `Display` may carry internal detail.
    fn client_message(&self) -> String;

    /// Never expose `details` for this error, in any environment.
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

/// Which call to the payment provider failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOperation {
    CreateSession,
    LookupSession,
}

impl std::fmt::Display for PaymentOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentOperation::CreateSession => f.write_str("session creation"),
            PaymentOperation::LookupSession => f.write_str("session lookup"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unsupported format: {format}. Supported formats: {}", allowed.join(", "))]
    InvalidFormat {
        format: String,
        allowed: Vec<&'static str>,
    },

    #[error("File too large: {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Invalid batch size: {count}")]
    InvalidBatchSize { count: i64 },

    #[error("Payment {operation} failed: {reason}")]
    Payment {
        operation: PaymentOperation,
        reason: String,
    },

    #[error("Payment not verified for session {session_id}: {reason}")]
    PaymentNotVerified { session_id: String, reason: String },

    #[error("Payment required for a batch of {count} images")]
    PaymentRequired { count: i64 },

    #[error("Missing parameters: {0}")]
    MissingParameters(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Storage(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::MalformedRequest(format!("Validation error: {}", err))
    }
}

/// `(status, code, recoverable, suggested_action, sensitive, log_level)` per variant.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidFormat { .. } => (
            400,
            "INVALID_FORMAT",
            false,
            Some("Choose one of the supported output formats"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileTooLarge { .. } => (
            413,
            "FILE_TOO_LARGE",
            false,
            Some("Reduce the file size and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::ConversionFailed(_) => (
            400,
            "CONVERSION_FAILED",
            false,
            Some("Check the image is valid and try a different file"),
            false,
            LogLevel::Warn,
        ),
        AppError::InvalidBatchSize { .. } => (
            400,
            "INVALID_PARAMETERS",
            false,
            Some("Submit between 2 and 100 images for a paid batch"),
            false,
            LogLevel::Debug,
        ),
        AppError::Payment { .. } => (
            500,
            "PAYMENT_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::PaymentNotVerified { .. } => (
            402,
            "PAYMENT_NOT_VERIFIED",
            false,
            Some("Complete checkout before converting the batch"),
            false,
            LogLevel::Warn,
        ),
        AppError::PaymentRequired { .. } => (
            402,
            "PAYMENT_REQUIRED",
            false,
            Some("Create a checkout session for this batch"),
            false,
            LogLevel::Debug,
        ),
        AppError::MissingParameters(_) => (
            400,
            "MISSING_PARAMETERS",
            false,
            None,
            false,
            LogLevel::Debug,
        ),
        AppError::MalformedRequest(_) => (
            400,
            "INVALID_REQUEST",
            false,
            None,
            false,
            LogLevel::Debug,
        ),
        AppError::MethodNotAllowed => (
            405,
            "METHOD_NOT_ALLOWED",
            false,
            Some("Use POST for this endpoint"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Variant name, shown as `error_type` outside production.
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidFormat { .. } => "InvalidFormat",
            AppError::FileTooLarge { .. } => "FileTooLarge",
            AppError::Storage(_) => "Storage",
            AppError::ConversionFailed(_) => "ConversionFailed",
            AppError::InvalidBatchSize { .. } => "InvalidBatchSize",
            AppError::Payment { .. } => "Payment",
            AppError::PaymentNotVerified { .. } => "PaymentNotVerified",
            AppError::PaymentRequired { .. } => "PaymentRequired",
            AppError::MissingParameters(_) => "MissingParameters",
            AppError::MalformedRequest(_) => "MalformedRequest",
            AppError::MethodNotAllowed => "MethodNotAllowed",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// `Display` plus up to five levels of `source()`.
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidFormat { .. } => self.to_string(),
            AppError::FileTooLarge { max, .. } => format!(
                "File size exceeds maximum allowed size of {}MB",
                max / 1024 / 1024
            ),
            AppError::Storage(_) => "Failed to store uploaded file".to_string(),
            AppError::ConversionFailed(_) => "Failed to convert image".to_string(),
            AppError::InvalidBatchSize { count } if *count > 1 => {
                format!("Too many files: {} (maximum is 100)", count)
            }
            AppError::InvalidBatchSize { count } => {
                format!("Invalid number of files: {} (a paid batch needs at least 2)", count)
            }
            AppError::Payment { operation, .. } => match operation {
                PaymentOperation::CreateSession => "Payment session creation failed".to_string(),
                PaymentOperation::LookupSession => "Payment session lookup failed".to_string(),
            },
            AppError::PaymentNotVerified { .. } => "Payment has not been completed".to_string(),
            AppError::PaymentRequired { count } => {
                format!("Payment is required to convert a batch of {} images", count)
            }
            AppError::MissingParameters(ref msg) => msg.clone(),
            AppError::MalformedRequest(ref msg) => msg.clone(),
            AppError::MethodNotAllowed => "Method not allowed".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}
