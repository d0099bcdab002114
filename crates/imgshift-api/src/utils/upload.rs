//! Common utilities for the multipart conversion handler

use axum::extract::multipart::{Field, MultipartError};
use axum::http::{header, HeaderMap, StatusCode};
use imgshift_core::AppError;

/// Text fields (`format`, `batch_size`, `session_id`) are tiny; anything longer is refused.
pub const MAX_TEXT_FIELD_BYTES: usize = 256;

/// Room for multipart boundaries, part headers and the small text fields.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// The size error for an upload whose exact length is unknown; `size` is a lower bound.
pub fn upload_too_large(max_file_size: u64) -> AppError {
    AppError::FileTooLarge {
        size: max_file_size.saturating_add(1),
        max: max_file_size,
    }
}

/// Refuse a request whose declared `Content-Length` cannot hold a file under the cap.
/// A missing or unparsable header is left to the streaming checks.
pub fn check_content_length(headers: &HeaderMap, max_file_size: u64) -> Result<(), AppError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    match declared {
        Some(size) if size > max_file_size.saturating_add(MULTIPART_OVERHEAD_BYTES) => {
            Err(AppError::FileTooLarge {
                size,
                max: max_file_size,
            })
        }
        _ => Ok(()),
    }
}

/// A multipart error caused by a body size limit rather than a malformed body.
pub fn is_size_limit(err: &MultipartError) -> bool {
    err.status() == StatusCode::PAYLOAD_TOO_LARGE
}

/// Read a small text field, refusing it once it exceeds [`MAX_TEXT_FIELD_BYTES`].
pub async fn read_text_field(mut field: Field<'_>, name: &str) -> Result<String, AppError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::MalformedRequest(format!("Failed to read field '{}': {}", name, e)))?
    {
        if buf.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(AppError::MalformedRequest(format!(
                "Field '{}' exceeds {} bytes",
                name, MAX_TEXT_FIELD_BYTES
            )));
        }
        buf.extend_from_slice(&chunk);
    }

    String::from_utf8(buf)
        .map_err(|_| AppError::MalformedRequest(format!("Field '{}' is not valid UTF-8", name)))
}

/// Map a multipart parser failure. A body cut off by the size limit is reported as
/// `FileTooLarge`.
pub fn multipart_error(err: MultipartError, max_file_size: u64) -> AppError {
    if is_size_limit(&err) {
        return upload_too_large(max_file_size);
    }
    AppError::MalformedRequest(format!("Failed to read multipart: {}", err))
}

/// Parse the optional `batch_size` field. Absent means a single image.
pub fn parse_batch_size(raw: Option<&str>) -> Result<i64, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(1);
    };
    let count = raw.parse::<i64>().map_err(|_| {
        AppError::MalformedRequest(format!("batch_size must be an integer, got '{}'", raw))
    })?;
    if count < 1 {
        return Err(AppError::InvalidBatchSize { count });
    }
    Ok(count)
}

/// Sanitize a client-supplied filename for logging.
///
/// Keeps the final path component and replaces anything outside
/// `[A-Za-z0-9._-]`. The name never reaches the filesystem; scratch files use
/// random names.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let sanitized: String = base
        .chars()
        .take(255)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = sanitized.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}
