//! Audio source resolver
//!
//! Ordered cascade, short-circuiting on first success:
//! 1. native preview URL carried on the track
//! 2. fallback preview lookup (ISRC exact, then free-text)
//! 3. live-playback capture, when the capture device is ready
//! 4. nothing
//!
//! Capture itself is performed by the orchestrator; it needs an active
//! playback session rather than a URL fetch, so the resolver only marks the
//! track for it.

use crate::services::deezer::DeezerClient;
use sift_common::model::{AudioSource, Track};
use std::sync::Arc;

/// Where to obtain the audio from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Fetchable URL, always dereferenced through the preview proxy
    Url(String),
    /// Requires an active playback session; handled by the orchestrator
    LiveCapture,
    Unavailable,
}

/// Resolver outcome
#[derive(Debug, Clone)]
pub struct ResolvedAudio {
    pub source: AudioSource,
    pub locator: Locator,
}

/// Cascading audio-source resolver
pub struct PreviewResolver {
    /// Fallback lookup client; `None` when the fallback is disabled
    deezer: Option<Arc<DeezerClient>>,
}

impl PreviewResolver {
    pub fn new(deezer: Option<Arc<DeezerClient>>) -> Self {
        PreviewResolver { deezer }
    }

    /// Resolve the best available audio source for a track.
    pub async fn resolve(&self, track: &Track, capture_ready: bool) -> ResolvedAudio {
        if let Some(url) = &track.preview_url {
            return ResolvedAudio {
                source: AudioSource::NativePreview,
                locator: Locator::Url(url.clone()),
            };
        }

        if let Some(deezer) = &self.deezer {
            let preview = deezer
                .find_preview(
                    track.isrc.as_deref(),
                    &track.name,
                    track.primary_artist().unwrap_or(""),
                )
                .await;
            if let Some(url) = preview {
                tracing::debug!(track_id = %track.id, "Resolved fallback preview");
                return ResolvedAudio {
                    source: AudioSource::FallbackPreview,
                    locator: Locator::Url(url),
                };
            }
        }

        if capture_ready {
            return ResolvedAudio {
                source: AudioSource::LiveCapture,
                locator: Locator::LiveCapture,
            };
        }

        ResolvedAudio {
            source: AudioSource::None,
            locator: Locator::Unavailable,
        }
    }
}
