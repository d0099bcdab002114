//! Service construction

use crate::state::AppState;
use anyhow::{Context, Result};
use imgshift_core::{Config, PricingPolicy};
use imgshift_processing::{ImageTranscoder, Transcoder};
use imgshift_services::{EntitlementGate, PaymentProvider, StripeClient};
use imgshift_storage::ScratchStore;
use std::sync::Arc;

/// Build application state with the production collaborators.
pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let provider = StripeClient::new(
        config.stripe_secret_key(),
        config.stripe_api_base(),
        config.payment_timeout(),
    )
    .context("Failed to initialize Stripe client")?;

    build_state(
        config,
        Arc::new(provider),
        Arc::new(ImageTranscoder::new()),
    )
    .await
}

/// Build application state around the given payment provider and transcoder.
pub async fn build_state(
    config: &Config,
    provider: Arc<dyn PaymentProvider>,
    transcoder: Arc<dyn Transcoder>,
) -> Result<Arc<AppState>> {
    let scratch = ScratchStore::new(config.scratch_dir(), config.max_file_size_bytes())
        .await
        .context("Failed to initialize scratch storage")?;

    let pricing = Arc::new(PricingPolicy::standard());
    for tier in pricing.tiers() {
        tracing::debug!(
            tier = %tier.name,
            min_count = tier.min_count,
            max_count = tier.max_count,
            price = tier.price_minor_units,
            "Price tier loaded"
        );
    }

    let gate = Arc::new(EntitlementGate::new(
        pricing,
        provider,
        config.payment_currency(),
        config.payment_timeout(),
    ));

    tracing::info!(
        scratch_dir = %scratch.dir().display(),
        max_file_size_bytes = scratch.max_file_size(),
        currency = %config.payment_currency(),
        "Services initialized"
    );

    Ok(Arc::new(AppState::new(
        config.clone(),
        scratch,
        transcoder,
        gate,
    )))
}
