//! Payment collaborator abstraction.
//!
//! The collaborator owns prices and payment state. This side only asks it to open
//! a checkout session and later asks whether a session has been paid.

pub mod stripe;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub use stripe::StripeClient;

/// Metadata keys attached to every checkout session.
pub const METADATA_FILES: &str = "files";
pub const METADATA_FORMAT: &str = "format";

/// Payment collaborator errors
#[derive(Debug, Error)]
pub enum PaymentProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Everything needed to open a one-line-item checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub amount_minor_units: i64,
    pub currency: String,
    pub product_name: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// The collaborator's view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub id: String,
    pub payment_status: String,
    pub metadata: BTreeMap<String, String>,
}

impl SessionStatus {
    /// Only an explicit "paid" counts.
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentProviderError>;

    async fn retrieve_session(&self, session_id: &str)
        -> Result<SessionStatus, PaymentProviderError>;
}

/// Session ids are opaque, but they end up in a URL path, so only a conservative
/// alphabet is accepted.
pub fn validate_session_id(session_id: &str) -> Result<(), PaymentProviderError> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 255
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PaymentProviderError::InvalidSessionId(
            session_id.chars().take(64).collect(),
        ))
    }
}
