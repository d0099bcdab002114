//! Entitlement gate.
//!
//! Decides whether a conversion may run. One image goes straight through. A batch
//! of 2..=100 needs a checkout session that the payment collaborator reports as
//! paid, issued for the same image count and output format. Larger batches are
//! refused before the collaborator is contacted. Nothing is retried.

use crate::payment::{
    CheckoutRequest, CheckoutSession, PaymentProvider, PaymentProviderError, SessionStatus,
    METADATA_FILES, METADATA_FORMAT,
};
use imgshift_core::{
    validate_format, AppError, PaymentOperation, PriceDecision, PriceTier, PricingPolicy,
    TargetFormat,
};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const PRODUCT_NAME: &str = "Image Conversion";

/// Where a request sits in the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unpriced,
    FreePath,
    Priced,
    AwaitingPayment,
    Verified,
    Transcoding,
    Rejected,
    Unverified,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GateState::Unpriced => "unpriced",
            GateState::FreePath => "free_path",
            GateState::Priced => "priced",
            GateState::AwaitingPayment => "awaiting_payment",
            GateState::Verified => "verified",
            GateState::Transcoding => "transcoding",
            GateState::Rejected => "rejected",
            GateState::Unverified => "unverified",
        };
        f.write_str(name)
    }
}

fn transition(count: i64, from: GateState, to: GateState) {
    tracing::debug!(batch_size = count, from = %from, to = %to, "Entitlement gate transition");
}

/// Pricing outcome for a batch size that is allowed at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assessment {
    Free,
    Priced(PriceTier),
}

/// Permission to transcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entitlement {
    Free,
    Paid { session_id: String, tier: PriceTier },
}

/// A freshly opened checkout, handed back to the client.
#[derive(Debug, Clone)]
pub struct CheckoutOffer {
    pub session: CheckoutSession,
    pub tier: PriceTier,
    pub currency: String,
}

/// A session the collaborator confirmed as paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    pub session_id: String,
    pub files: Option<i64>,
    pub format: Option<String>,
}

impl VerifiedPayment {
    fn from_status(status: SessionStatus) -> Self {
        Self {
            files: status
                .metadata
                .get(METADATA_FILES)
                .and_then(|v| v.parse::<i64>().ok()),
            format: status.metadata.get(METADATA_FORMAT).cloned(),
            session_id: status.id,
        }
    }
}

pub struct EntitlementGate {
    pricing: Arc<PricingPolicy>,
    provider: Arc<dyn PaymentProvider>,
    currency: String,
    timeout: Duration,
}

impl EntitlementGate {
    pub fn new(
        pricing: Arc<PricingPolicy>,
        provider: Arc<dyn PaymentProvider>,
        currency: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            pricing,
            provider,
            currency: currency.into(),
            timeout,
        }
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    /// Price a batch. Batches over the maximum are an `InvalidBatchSize` error.
    pub fn assess(&self, count: i64) -> Result<Assessment, AppError> {
        match self.pricing.price_for(count) {
            PriceDecision::Free => {
                transition(count, GateState::Unpriced, GateState::FreePath);
                Ok(Assessment::Free)
            }
            PriceDecision::Tier(tier) => {
                transition(count, GateState::Unpriced, GateState::Priced);
                Ok(Assessment::Priced(tier.clone()))
            }
            PriceDecision::Rejected => {
                transition(count, GateState::Unpriced, GateState::Rejected);
                Err(AppError::InvalidBatchSize { count })
            }
        }
    }

    /// Open a checkout session for a paid batch.
    ///
    /// `origin` is the site the client should return to after checkout.
    #[tracing::instrument(skip(self), fields(format = %target))]
    pub async fn open_checkout(
        &self,
        count: i64,
        target: &TargetFormat,
        origin: &str,
    ) -> Result<CheckoutOffer, AppError> {
        let tier = match self.assess(count)? {
            Assessment::Priced(tier) => tier,
            // A single image never needs a session.
            Assessment::Free => return Err(AppError::InvalidBatchSize { count }),
        };

        let origin = origin.trim_end_matches('/');
        let mut metadata = BTreeMap::new();
        metadata.insert(METADATA_FILES.to_string(), count.to_string());
        metadata.insert(METADATA_FORMAT.to_string(), target.token.clone());

        let request = CheckoutRequest {
            amount_minor_units: tier.price_minor_units,
            currency: self.currency.clone(),
            product_name: PRODUCT_NAME.to_string(),
            description: format!("Convert {} images to {} format", count, target.token),
            success_url: format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", origin),
            cancel_url: format!("{}/", origin),
            metadata,
        };

        let session = self
            .call_provider(self.provider.create_checkout_session(&request))
            .await
            .map_err(|e| match e {
                GateCallError::Provider(e) => AppError::Payment {
                    operation: PaymentOperation::CreateSession,
                    reason: e.to_string(),
                },
                GateCallError::TimedOut => AppError::Payment {
                    operation: PaymentOperation::CreateSession,
                    reason: format!("timed out after {:?}", self.timeout),
                },
            })?;
        transition(count, GateState::Priced, GateState::AwaitingPayment);

        tracing::info!(
            session_id = %session.id,
            tier = %tier.name,
            amount = tier.price_minor_units,
            "Checkout opened"
        );

        Ok(CheckoutOffer {
            session,
            tier,
            currency: self.currency.clone(),
        })
    }

    /// Ask the collaborator whether `session_id` has been paid.
    #[tracing::instrument(skip(self))]
    pub async fn verify(&self, session_id: &str) -> Result<VerifiedPayment, AppError> {
        if session_id.trim().is_empty() {
            return Err(AppError::MissingParameters(
                "Missing session_id".to_string(),
            ));
        }

        let status = match self
            .call_provider(self.provider.retrieve_session(session_id))
            .await
        {
            Ok(status) => status,
            Err(GateCallError::Provider(PaymentProviderError::InvalidSessionId(_))) => {
                return Err(AppError::PaymentNotVerified {
                    session_id: session_id.to_string(),
                    reason: "malformed session id".to_string(),
                });
            }
            Err(GateCallError::Provider(e)) => {
                return Err(AppError::Payment {
                    operation: PaymentOperation::LookupSession,
                    reason: e.to_string(),
                });
            }
            Err(GateCallError::TimedOut) => {
                return Err(AppError::Payment {
                    operation: PaymentOperation::LookupSession,
                    reason: format!("timed out after {:?}", self.timeout),
                });
            }
        };

        if !status.is_paid() {
            tracing::info!(
                session_id = %session_id,
                payment_status = %status.payment_status,
                "Checkout session not paid"
            );
            return Err(AppError::PaymentNotVerified {
                session_id: session_id.to_string(),
                reason: format!("payment status is {}", status.payment_status),
            });
        }

        Ok(VerifiedPayment::from_status(status))
    }

    /// Decide whether a conversion of one image from a batch of `count` may run.
    #[tracing::instrument(skip(self, session_id), fields(format = %target))]
    pub async fn authorize(
        &self,
        count: i64,
        target: &TargetFormat,
        session_id: Option<&str>,
    ) -> Result<Entitlement, AppError> {
        let tier = match self.assess(count)? {
            Assessment::Free => {
                transition(count, GateState::FreePath, GateState::Transcoding);
                return Ok(Entitlement::Free);
            }
            Assessment::Priced(tier) => tier,
        };

        let session_id = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id,
            None => return Err(AppError::PaymentRequired { count }),
        };
        transition(count, GateState::Priced, GateState::AwaitingPayment);

        let payment = match self.verify(session_id).await {
            Ok(payment) => payment,
            Err(e) => {
                transition(count, GateState::AwaitingPayment, GateState::Unverified);
                return Err(e);
            }
        };

        if let Err(reason) = Self::check_batch_matches(&payment, count, target) {
            transition(count, GateState::AwaitingPayment, GateState::Unverified);
            return Err(AppError::PaymentNotVerified {
                session_id: session_id.to_string(),
                reason,
            });
        }

        transition(count, GateState::AwaitingPayment, GateState::Verified);
        transition(count, GateState::Verified, GateState::Transcoding);

        Ok(Entitlement::Paid {
            session_id: payment.session_id,
            tier,
        })
    }

    fn check_batch_matches(
        payment: &VerifiedPayment,
        count: i64,
        target: &TargetFormat,
    ) -> Result<(), String> {
        let paid_format = payment
            .format
            .as_deref()
            .and_then(|f| validate_format(f).ok())
            .map(|f| f.format);

        match (payment.files, paid_format) {
            (Some(files), Some(format)) if files == count && format == target.format => Ok(()),
            (Some(files), Some(format)) => Err(format!(
                "session was issued for {} images in {}, request is {} images in {}",
                files, format, count, target.format
            )),
            _ => Err("session carries no batch details".to_string()),
        }
    }

    async fn call_provider<T, F>(&self, call: F) -> Result<T, GateCallError>
    where
        F: Future<Output = Result<T, PaymentProviderError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(GateCallError::Provider(e)),
            Err(_) => Err(GateCallError::TimedOut),
        }
    }
}

enum GateCallError {
    Provider(PaymentProviderError),
    TimedOut,
}
