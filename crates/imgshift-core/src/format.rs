//! Output format whitelist.
//!
//! The requested format is validated before anything touches disk. Matching is
//! case-insensitive; the accepted spelling is kept so the download name echoes
//! what the client asked for (`jpg` stays `jpg`).

use crate::error::AppError;
use serde::Serialize;
use std::fmt;

/// Output formats accepted by the conversion endpoint, in the order they are reported.
pub const SUPPORTED_FORMATS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Gif => "image/gif",
        }
    }

    /// Canonical file extension for the format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Gif => "gif",
        }
    }

    /// Palette-based formats are the only ones that get colour reduction.
    pub fn is_palette_based(self) -> bool {
        matches!(self, OutputFormat::Gif)
    }

    pub fn is_lossy(self) -> bool {
        matches!(self, OutputFormat::Jpeg | OutputFormat::WebP)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A validated target format together with the spelling the client used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFormat {
    pub format: OutputFormat,
    pub token: String,
}

impl TargetFormat {
    /// `attachment; filename="converted.<token>"`
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"converted.{}\"", self.token)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

/// Check a requested output format against [`SUPPORTED_FORMATS`].
pub fn validate_format(requested: &str) -> Result<TargetFormat, AppError> {
    let token = requested.trim().to_ascii_lowercase();
    let format = match token.as_str() {
        "png" => OutputFormat::Png,
        "jpg" | "jpeg" => OutputFormat::Jpeg,
        "webp" => OutputFormat::WebP,
        "gif" => OutputFormat::Gif,
        _ => {
            return Err(AppError::InvalidFormat {
                format: requested.to_string(),
                allowed: SUPPORTED_FORMATS.to_vec(),
            })
        }
    };

    Ok(TargetFormat { format, token })
}
