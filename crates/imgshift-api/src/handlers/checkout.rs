use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use imgshift_core::{validate_format, PriceTier};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutSessionRequest {
    /// Number of images in the batch
    pub files: i64,
    /// Target format for every image in the batch
    #[validate(length(min = 1, max = 16))]
    pub format: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    /// Hosted checkout page, when the provider returns one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub tier: PriceTier,
    /// Price in minor currency units
    pub amount: i64,
    pub currency: String,
}

/// Open a checkout session for a batch conversion
///
/// Prices the batch from the fixed tier table and asks the payment provider for a
/// session. The returned `sessionId` is sent with every conversion of the batch.
#[utoipa::path(
    post,
    path = "/api/create-checkout-session",
    tag = "payment",
    request_body = CheckoutSessionRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutSessionResponse),
        (status = 400, description = "Invalid batch size or format", body = ErrorResponse),
        (status = 500, description = "Payment session creation failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, headers, request), fields(operation = "create_checkout_session"))]
pub async fn create_checkout_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<CheckoutSessionRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    tracing::debug!(files = request.files, format = %request.format, "Checkout requested");
    let target = validate_format(&request.format)?;

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|o| o.starts_with("http://") || o.starts_with("https://"))
        .unwrap_or_else(|| state.config.public_base_url());

    let offer = state
        .gate
        .open_checkout(request.files, &target, origin)
        .await?;

    Ok(Json(CheckoutSessionResponse {
        session_id: offer.session.id,
        url: offer.session.url,
        amount: offer.tier.price_minor_units,
        tier: offer.tier,
        currency: offer.currency,
    }))
}
