//! imgshift Services
//!
//! Payment collaborator integration and the entitlement gate that decides whether a
//! conversion needs (and has) a paid checkout session.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use imgshift_services::{EntitlementGate, StripeClient};
//!
//! let provider = Arc::new(StripeClient::new(key, base, timeout)?);
//! let gate = EntitlementGate::new(Arc::new(PricingPolicy::standard()), provider, "usd", timeout);
//! let entitlement = gate.authorize(batch_size, &target, session_id).await?;
//! ```

pub mod entitlement;
pub mod payment;

pub use entitlement::{
    Assessment, CheckoutOffer, Entitlement, EntitlementGate, GateState, VerifiedPayment,
};
pub use payment::{
    CheckoutRequest, CheckoutSession, PaymentProvider, PaymentProviderError, SessionStatus,
    StripeClient,
};
