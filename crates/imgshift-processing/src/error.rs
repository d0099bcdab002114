use imgshift_core::OutputFormat;
use thiserror::Error;

/// Transcoding errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Input is not a recognized image format")]
    UnrecognizedInput,

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Image dimensions {width}x{height} exceed the {max} pixel limit for {format}")]
    DimensionsTooLarge {
        width: u32,
        height: u32,
        max: u32,
        format: OutputFormat,
    },

    #[error("Failed to encode {format}: {reason}")]
    Encode { format: OutputFormat, reason: String },

    #[error("Transcoding timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("Transcoding task aborted: {0}")]
    Aborted(String),
}
