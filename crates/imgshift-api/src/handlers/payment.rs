use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use imgshift_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct VerifyPaymentQuery {
    /// Checkout session identifier returned by the checkout endpoint
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub verified: bool,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Payment verification callback
///
/// Only a session the provider reports as "paid" verifies.
#[utoipa::path(
    get,
    path = "/api/verify-payment",
    tag = "payment",
    params(VerifyPaymentQuery),
    responses(
        (status = 200, description = "Session is paid", body = VerifyPaymentResponse),
        (status = 400, description = "Missing session_id", body = ErrorResponse),
        (status = 402, description = "Session is not paid", body = ErrorResponse),
        (status = 500, description = "Session lookup failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(operation = "verify_payment"))]
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyPaymentQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let session_id = query
        .session_id
        .ok_or_else(|| AppError::MissingParameters("Missing session_id".to_string()))?;

    let payment = state.gate.verify(&session_id).await?;

    tracing::info!(session_id = %payment.session_id, "Payment verified");

    Ok(Json(VerifyPaymentResponse {
        verified: true,
        session_id: payment.session_id,
        files: payment.files,
        format: payment.format,
    }))
}
