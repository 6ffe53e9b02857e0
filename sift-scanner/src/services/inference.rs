//! Serialized inference queue for the AI-music classifier
//!
//! The underlying classifier session is not safe for concurrent invocation,
//! so every `predict` call runs under a fair async mutex: call *n+1* begins
//! only after call *n* finishes, success or failure, regardless of caller
//! concurrency. Session initialization is lazy and single-flight; callers
//! arriving before the first init completes all await the same attempt.
//!
//! The classifier operates on a fixed 5-second window at 44.1 kHz. Shorter
//! input is zero-padded symmetrically; longer input is center-cropped. This
//! windowing is deterministic and must not change: an off-center crop
//! changes scores.

use crate::error::TrackError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};

/// Classifier input sample rate in Hz
pub const SAMPLE_RATE: u32 = 44_100;
/// Classifier window length in seconds
pub const WINDOW_SECONDS: usize = 5;
/// Fixed classifier window length in samples (220,500)
pub const WINDOW_LEN: usize = SAMPLE_RATE as usize * WINDOW_SECONDS;

/// Inference errors
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Classifier session init failed: {0}")]
    Session(String),

    #[error("Classifier run failed: {0}")]
    Run(String),
}

impl From<InferenceError> for TrackError {
    fn from(err: InferenceError) -> Self {
        TrackError::InferenceFailed(err.to_string())
    }
}

/// Classifier runtime boundary.
///
/// Implementations load a model session in `prepare` and score one
/// fixed-length mono window per `run` call. `run` is never invoked
/// concurrently and never before a successful `prepare`.
#[async_trait]
pub trait ClassifierRuntime: Send + Sync {
    async fn prepare(&self) -> Result<(), InferenceError>;

    /// Score one window; returns the probability in [0, 1] that the audio is
    /// AI-generated.
    async fn run(&self, window: &[f32]) -> Result<f32, InferenceError>;
}

/// FIFO-serialized prediction queue over a [`ClassifierRuntime`]
pub struct InferenceQueue {
    runtime: Arc<dyn ClassifierRuntime>,
    session: OnceCell<()>,
    // tokio's Mutex is fair: waiters acquire in request order
    serial: Mutex<()>,
}

impl InferenceQueue {
    pub fn new(runtime: Arc<dyn ClassifierRuntime>) -> Self {
        InferenceQueue {
            runtime,
            session: OnceCell::new(),
            serial: Mutex::new(()),
        }
    }

    async fn ensure_session(&self) -> Result<(), InferenceError> {
        self.session
            .get_or_try_init(|| async {
                tracing::info!("Initializing classifier session");
                self.runtime.prepare().await
            })
            .await
            .map(|_| ())
    }

    /// Preload the classifier session without running inference.
    pub async fn warmup(&self) -> Result<(), InferenceError> {
        self.ensure_session().await
    }

    /// Whether the classifier session has been initialized.
    pub fn is_ready(&self) -> bool {
        self.session.initialized()
    }

    /// Run inference on a raw mono waveform at 44.1 kHz.
    ///
    /// Extracts the fixed middle window and returns the AI probability.
    pub async fn predict(&self, waveform: &[f32]) -> Result<f32, InferenceError> {
        let _guard = self.serial.lock().await;

        self.ensure_session().await?;
        let window = extract_window(waveform, WINDOW_LEN);
        self.runtime.run(&window).await
    }
}

/// Extract the middle chunk of a waveform at exactly `target_len` samples.
///
/// Shorter input is zero-padded with the input centered: the left pad is
/// `(target_len - len) / 2` rounded down, so an odd surplus lands on the
/// right. Longer input is cropped starting at `(len - target_len) / 2`.
pub fn extract_window(waveform: &[f32], target_len: usize) -> Vec<f32> {
    if waveform.len() <= target_len {
        let mut padded = vec![0.0f32; target_len];
        let offset = (target_len - waveform.len()) / 2;
        padded[offset..offset + waveform.len()].copy_from_slice(waveform);
        return padded;
    }

    let start = (waveform.len() - target_len) / 2;
    waveform[start..start + target_len].to_vec()
}
