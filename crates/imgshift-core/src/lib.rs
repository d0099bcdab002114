//! imgshift Core Library
//!
//! This crate provides the error taxonomy, configuration, output-format whitelist and
//! batch pricing shared across all imgshift components.

pub mod config;
pub mod error;
pub mod format;
pub mod pricing;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel, PaymentOperation};
pub use format::{validate_format, OutputFormat, TargetFormat, SUPPORTED_FORMATS};
pub use pricing::{PriceDecision, PriceTier, PricingError, PricingPolicy, MAX_BATCH, MIN_PAID_BATCH};
