//! Route configuration and setup

mod health;

use crate::error::HttpAppError;
use crate::handlers;
use crate::state::AppState;
use crate::utils::upload::MULTIPART_OVERHEAD_BYTES;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use health::{health_check, liveness_check};
use imgshift_core::{AppError, Config};
use std::sync::Arc;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Checkout and verification bodies are a few dozen bytes of JSON.
const JSON_BODY_LIMIT_BYTES: usize = 16 * 1024;

/// The upload route's hard backstop, as a multiple of the file cap. Below it the
/// scratch store's own cap decides, so oversized uploads get the JSON 413.
const UPLOAD_BACKSTOP_FACTOR: u64 = 4;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let upload_backstop = upload_backstop_bytes(config.max_file_size_bytes());
    let http_concurrency_limit = config.http_concurrency_limit().max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        max_file_size_bytes = config.max_file_size_bytes(),
        upload_backstop_bytes = upload_backstop,
        "HTTP limits configured"
    );

    let app = upload_routes(upload_backstop)
        .merge(json_routes())
        .merge(public_routes(state.clone()))
        .method_not_allowed_fallback(method_not_allowed)
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"));

    let app = limit_concurrency(app, http_concurrency_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn upload_backstop_bytes(max_file_size: u64) -> usize {
    let bytes = max_file_size
        .saturating_mul(UPLOAD_BACKSTOP_FACTOR)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

/// One semaphore shared by every route, so the limit is server-wide.
fn limit_concurrency<S>(router: Router<S>, limit: usize) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(GlobalConcurrencyLimitLayer::new(limit))
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}

async fn method_not_allowed() -> HttpAppError {
    HttpAppError(AppError::MethodNotAllowed)
}

/// The multipart conversion endpoint
fn upload_routes(upload_backstop: usize) -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/convert",
        post(handlers::convert::convert_image).layer(DefaultBodyLimit::max(upload_backstop)),
    )
}

/// Checkout and payment verification
fn json_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/create-checkout-session",
            post(handlers::checkout::create_checkout_session),
        )
        .route(
            "/api/verify-payment",
            get(handlers::payment::verify_payment),
        )
        .layer(RequestBodyLimitLayer::new(JSON_BODY_LIMIT_BYTES))
}

/// Health probes and API documentation
fn public_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/health",
            get({
                let state = state.clone();
                move || {
                    let state = state.clone();
                    async { health_check(state).await }
                }
            }),
        )
        .route("/live", get(liveness_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
}
