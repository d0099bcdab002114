use super::{
    validate_session_id, CheckoutRequest, CheckoutSession, PaymentProvider, PaymentProviderError,
    SessionStatus,
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

/// Stripe Checkout Sessions API client.
#[derive(Clone)]
pub struct StripeClient {
    http_client: Client,
    secret_key: String,
    api_base: String,
}

impl Debug for StripeClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl StripeClient {
    pub fn new(
        secret_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PaymentProviderError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentProviderError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn form_params(request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut params = vec![
            ("payment_method_types[0]".to_string(), "card".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.clone(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.product_name.clone(),
            ),
            (
                "line_items[0][price_data][product_data][description]".to_string(),
                request.description.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                request.amount_minor_units.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
        ];
        for (key, value) in &request.metadata {
            params.push((format!("metadata[{}]", key), value.clone()));
        }
        params
    }

    async fn parse_session(response: Response) -> Result<SessionResponse, PaymentProviderError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .ok()
                .map(|envelope| {
                    let message = envelope.error.message.unwrap_or_default();
                    match envelope.error.kind {
                        Some(kind) => format!("{} ({})", message, kind),
                        None => message,
                    }
                })
                .unwrap_or(error_text);
            return Err(PaymentProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<SessionResponse>()
            .await
            .map_err(|e| PaymentProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentProviderError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&Self::form_params(request))
            .send()
            .await
            .map_err(|e| PaymentProviderError::Http(e.to_string()))?;

        let session = Self::parse_session(response).await?;

        tracing::info!(
            session_id = %session.id,
            amount = request.amount_minor_units,
            currency = %request.currency,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Checkout session created"
        );

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
    ) -> Result<SessionStatus, PaymentProviderError> {
        validate_session_id(session_id)?;
        let url = format!("{}/v1/checkout/sessions/{}", self.api_base, session_id);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| PaymentProviderError::Http(e.to_string()))?;

        let session = Self::parse_session(response).await?;
        let payment_status = session.payment_status.ok_or_else(|| {
            PaymentProviderError::InvalidResponse("missing payment_status".to_string())
        })?;

        tracing::debug!(
            session_id = %session.id,
            payment_status = %payment_status,
            "Checkout session retrieved"
        );

        Ok(SessionStatus {
            id: session.id,
            payment_status,
            metadata: session.metadata,
        })
    }
}
