use crate::error::TranscodeError;
use crate::transcoder::{Transcoded, Transcoder};
use bytes::Bytes;
use imgshift_core::OutputFormat;
use std::sync::Arc;
use std::time::Duration;

/// Run a transcode on the blocking pool, bounded by `timeout`.
///
/// On timeout the blocking task is detached and its result discarded; the caller
/// gets `TimedOut` immediately. A panicking encoder surfaces as `Aborted`.
pub async fn run_transcode(
    transcoder: Arc<dyn Transcoder>,
    source: Bytes,
    format: OutputFormat,
    timeout: Duration,
) -> Result<Transcoded, TranscodeError> {
    let task = tokio::task::spawn_blocking(move || transcoder.transcode(&source, format));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            tracing::error!(error = %join_err, format = %format, "Transcode task failed");
            Err(TranscodeError::Aborted(join_err.to_string()))
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, format = %format, "Transcode timed out");
            Err(TranscodeError::TimedOut(timeout))
        }
    }
}
