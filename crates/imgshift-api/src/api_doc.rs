//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "imgshift API",
        version = "0.1.0",
        description = "Image format conversion with paid batch checkout"
    ),
    paths(
        handlers::convert::convert_image,
        handlers::checkout::create_checkout_session,
        handlers::payment::verify_payment,
    ),
    components(schemas(
        error::ErrorResponse,
        handlers::checkout::CheckoutSessionRequest,
        handlers::checkout::CheckoutSessionResponse,
        handlers::payment::VerifyPaymentResponse,
        imgshift_core::PriceTier,
    )),
    tags(
        (name = "conversion", description = "Image conversion"),
        (name = "payment", description = "Batch checkout and payment verification")
    )
)]
struct ApiDoc;
