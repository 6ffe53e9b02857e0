//! Live playback capture boundary
//!
//! Last-resort audio source: play the track through an active playback
//! session and record a short window. The device is exclusively owned by one
//! scan at a time and must be released exactly once when the scan ends,
//! however it ends.

use async_trait::async_trait;
use thiserror::Error;

/// Capture slightly more than the classifier window (the model needs 5 s)
pub const CAPTURE_DURATION_MS: u64 = 6_000;

/// Capture device errors
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture device init failed: {0}")]
    Init(String),

    #[error("Capture failed: {0}")]
    Capture(String),
}

/// Live-capture collaborator boundary.
///
/// `capture_window` returns `Ok(None)` when playback could not be captured
/// for this track; the caller treats that as "no audio source", not an error.
#[async_trait]
pub trait PlaybackCapture: Send + Sync {
    async fn initialize(&mut self) -> Result<(), CaptureError>;

    fn is_ready(&self) -> bool;

    /// Capture `duration_ms` of mono 44.1 kHz audio from an active playback
    /// of `track_uri`.
    async fn capture_window(
        &mut self,
        track_uri: &str,
        duration_ms: u64,
    ) -> Result<Option<Vec<f32>>, CaptureError>;

    /// Tear down the playback session. Idempotent.
    async fn release(&mut self);
}
