use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use crate::utils::upload::{
    check_content_length, is_size_limit, multipart_error, parse_batch_size, read_text_field,
    sanitize_filename, upload_too_large,
};
use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use futures::StreamExt;
use imgshift_core::{validate_format, AppError, TargetFormat};
use imgshift_processing::{run_transcode, Transcoded};
use imgshift_services::Entitlement;
use imgshift_storage::{ScratchScope, StorageError, UploadedAsset};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

const CACHE_CONTROL_VALUE: &str = "public, max-age=31536000";

/// Fields collected from the multipart body.
#[derive(Default)]
struct ConvertForm {
    target: Option<TargetFormat>,
    upload: Option<UploadedAsset>,
    batch_size: Option<String>,
    session_id: Option<String>,
}

/// Convert an uploaded image into another format
///
/// Accepts one image and a target format. Batches of more than one image need a
/// paid checkout session (`session_id`) issued for the same `batch_size` and format.
///
/// # Errors
/// - `INVALID_FORMAT` for an unsupported target format
/// - `FILE_TOO_LARGE` once the upload passes the size limit
/// - `MISSING_PARAMETERS` without a `file` or `format` field
/// - `PAYMENT_REQUIRED` / `PAYMENT_NOT_VERIFIED` for unpaid batches
/// - `CONVERSION_FAILED` when the image cannot be decoded or encoded
#[utoipa::path(
    post,
    path = "/api/convert",
    tag = "conversion",
    request_body(content = inline(Object), content_type = "multipart/form-data", description = "Fields: file, format, batch_size (optional), session_id (required when batch_size > 1)"),
    responses(
        (status = 200, description = "Converted image", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid format, parameters or undecodable image", body = ErrorResponse),
        (status = 402, description = "Batch requires a verified payment", body = ErrorResponse),
        (status = 405, description = "Method not allowed", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Storage or payment collaborator failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, headers, multipart), fields(operation = "convert_image"))]
pub async fn convert_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let start = Instant::now();
    check_content_length(&headers, state.scratch.max_file_size())?;

    // The scope owns every scratch file of this request. If the request future is
    // dropped before `close`, its Drop impl removes them instead.
    let mut scope = ScratchScope::new(state.scratch.clone());
    let result = run_conversion(&state, &mut scope, multipart).await;

    let report = scope.close().await;
    if !report.is_clean() {
        tracing::warn!(
            released = report.released,
            failures = report.failures.len(),
            "Scratch files left behind after conversion"
        );
    }

    let (target, transcoded) = result?;

    tracing::info!(
        format = %target,
        width = transcoded.width,
        height = transcoded.height,
        output_bytes = transcoded.data.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Conversion completed"
    );

    let headers = [
        (header::CONTENT_TYPE, target.format.mime_type().to_string()),
        (header::CONTENT_DISPOSITION, target.content_disposition()),
        (header::CONTENT_LENGTH, transcoded.data.len().to_string()),
        (header::CACHE_CONTROL, CACHE_CONTROL_VALUE.to_string()),
    ];

    Ok((StatusCode::OK, headers, transcoded.data))
}

async fn run_conversion(
    state: &AppState,
    scope: &mut ScratchScope,
    multipart: Multipart,
) -> Result<(TargetFormat, Transcoded), HttpAppError> {
    let form = read_form(state, scope, multipart).await?;

    let target = form
        .target
        .ok_or_else(|| AppError::MissingParameters("Missing format field".to_string()))?;
    let asset = form
        .upload
        .ok_or_else(|| AppError::MissingParameters("Missing file field".to_string()))?;
    let batch_size = parse_batch_size(form.batch_size.as_deref())?;

    let entitlement = state
        .gate
        .authorize(batch_size, &target, form.session_id.as_deref())
        .await?;
    match &entitlement {
        Entitlement::Free => tracing::debug!("Conversion on the free path"),
        Entitlement::Paid { session_id, tier } => tracing::debug!(
            session_id = %session_id,
            tier = %tier.name,
            batch_size,
            "Conversion covered by paid session"
        ),
    }

    let staged = scope.stage(&asset).await?;
    let source = scope.read(&staged).await?;

    let transcoded = run_transcode(
        state.transcoder.clone(),
        source,
        target.format,
        state.config.transcode_timeout(),
    )
    .await?;

    Ok((target, transcoded))
}

/// Walk the multipart fields. The upload is spooled into the scope as soon as it
/// arrives; a `format` field that precedes it is validated first so a bad format
/// never costs a spool.
async fn read_form(
    state: &AppState,
    scope: &mut ScratchScope,
    mut multipart: Multipart,
) -> Result<ConvertForm, HttpAppError> {
    let max_file_size = state.scratch.max_file_size();
    let mut form = ConvertForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size))?
    {
        let field_name = field.name().map(str::to_string).unwrap_or_default();

        match field_name.as_str() {
            "file" => {
                if form.upload.is_some() {
                    return Err(AppError::MalformedRequest(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    )
                    .into());
                }
                let original_name = sanitize_filename(field.file_name().unwrap_or_default());

                // A body limit can cut the file stream short; that is still an oversized upload.
                let limit_hit = AtomicBool::new(false);
                let chunks = field.map(|chunk| {
                    chunk.inspect_err(|e| {
                        if is_size_limit(e) {
                            limit_hit.store(true, Ordering::Relaxed);
                        }
                    })
                });
                let asset = match scope.receive(&original_name, chunks).await {
                    Ok(asset) => asset,
                    Err(StorageError::SourceFailed(_)) if limit_hit.load(Ordering::Relaxed) => {
                        return Err(upload_too_large(max_file_size).into());
                    }
                    Err(e) => return Err(e.into()),
                };
                form.upload = Some(asset);
            }
            "format" => {
                let raw = read_text_field(field, "format").await?;
                form.target = Some(validate_format(&raw)?);
            }
            "batch_size" => {
                form.batch_size = Some(read_text_field(field, "batch_size").await?);
            }
            "session_id" => {
                form.session_id = Some(read_text_field(field, "session_id").await?);
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(form)
}
