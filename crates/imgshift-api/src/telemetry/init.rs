use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_FILTER: &str = "imgshift=debug,tower_http=debug";

/// Initialize tracing.
///
/// Development gets a compact console format; production emits one JSON object per
/// event so fields survive log shipping. `RUST_LOG` overrides the default filter.
/// Calling this twice (tests building several apps) keeps the first subscriber.
pub fn init_telemetry(production: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let result = if production {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
    } else {
        let console_fmt = tracing_subscriber::fmt::layer().event_format(
            Format::default()
                .compact()
                .with_target(false)
                .without_time(),
        );
        tracing_subscriber::registry()
            .with(filter)
            .with(console_fmt)
            .try_init()
    };

    match result {
        Ok(()) => tracing::info!(production, "Tracing initialized"),
        Err(e) => tracing::debug!(error = %e, "Tracing subscriber already set"),
    }
}
