//! Image transcoding.
//!
//! Decodes untrusted image bytes, normalizes EXIF orientation, caps the width and
//! re-encodes into the requested output format.

pub mod encode;
pub mod error;
pub mod orientation;
pub mod runner;
pub mod transcoder;

pub use error::TranscodeError;
pub use runner::run_transcode;
pub use transcoder::{ImageTranscoder, Transcoded, Transcoder, MAX_OUTPUT_WIDTH};
