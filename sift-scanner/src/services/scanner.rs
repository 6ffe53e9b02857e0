//! Scan orchestrator
//!
//! Two-phase detection state machine over one playlist:
//! `loading_tracks → scanning(blocklist) → scanning(audio) → complete`,
//! with `error` on any list-level failure and a terminal `cancelled` variant
//! reachable from either scanning phase.
//!
//! The audio phase is deliberately sequential: the inference queue permits
//! one prediction at a time, and parallel preview fetches would defeat the
//! inter-track rate-limit delays. Per-track failures are caught at the track
//! boundary and downgrade that track to unscored; they never abort the scan.
//!
//! One orchestrator is constructed per scan session and exclusively owns its
//! live-capture device, which is released exactly once on every exit path.

use crate::error::{ScanError, TrackError};
use crate::services::blocklist::BlocklistMatcher;
use crate::services::capture::{PlaybackCapture, CAPTURE_DURATION_MS};
use crate::services::decoder::AudioDecoder;
use crate::services::deezer::DeezerClient;
use crate::services::inference::InferenceQueue;
use crate::services::proxy::PreviewProxy;
use crate::services::resolver::{Locator, PreviewResolver};
use crate::services::spotify::SpotifyClient;
use chrono::Utc;
use sift_common::events::{EventBus, ScanEvent};
use sift_common::model::{
    AudioSource, ScanOptions, ScanPhase, ScanProgress, ScanResult, ScanState, ScanStats,
    ScanStatus, Track,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Delay between audio-phase tracks, a proactive rate-limit measure
const ANALYSIS_DELAY: Duration = Duration::from_millis(200);

/// Scan state shared with the status API; mutated only by the orchestrator
pub type SharedScanState = Arc<RwLock<ScanState>>;

/// Per-session scan orchestrator
pub struct ScanOrchestrator {
    spotify: Arc<SpotifyClient>,
    resolver: PreviewResolver,
    proxy: Arc<PreviewProxy>,
    decoder: Arc<dyn AudioDecoder>,
    inference: Arc<InferenceQueue>,
    blocklist: BlocklistMatcher,
    capture: Option<Box<dyn PlaybackCapture>>,
    event_bus: EventBus,
    options: ScanOptions,
}

impl ScanOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spotify: Arc<SpotifyClient>,
        deezer: Option<Arc<DeezerClient>>,
        proxy: Arc<PreviewProxy>,
        decoder: Arc<dyn AudioDecoder>,
        inference: Arc<InferenceQueue>,
        capture: Option<Box<dyn PlaybackCapture>>,
        event_bus: EventBus,
        options: ScanOptions,
    ) -> Self {
        ScanOrchestrator {
            spotify,
            resolver: PreviewResolver::new(if options.enable_fallback_preview {
                deezer
            } else {
                None
            }),
            proxy,
            decoder,
            inference,
            blocklist: BlocklistMatcher::default(),
            capture: if options.enable_live_capture {
                capture
            } else {
                None
            },
            event_bus,
            options,
        }
    }

    /// Replace the default blocklist (used by tests and curation tooling).
    pub fn with_blocklist(mut self, blocklist: BlocklistMatcher) -> Self {
        self.blocklist = blocklist;
        self
    }

    /// Run the scan to a terminal state. Never panics out; list-level errors
    /// land in `state.error`, per-track errors are logged and swallowed.
    pub async fn run(mut self, state: SharedScanState, cancel: CancellationToken) {
        let (scan_id, playlist_id) = {
            let st = state.read().await;
            (st.scan_id, st.playlist_id.clone())
        };

        tracing::info!(scan_id = %scan_id, playlist_id = %playlist_id, "Starting scan");
        self.event_bus.emit_lossy(ScanEvent::ScanStarted {
            scan_id,
            playlist_id,
            timestamp: Utc::now(),
        });

        let outcome = self.execute(&state, &cancel).await;

        // Release the capture device exactly once, on every exit path
        if let Some(mut capture) = self.capture.take() {
            capture.release().await;
        }

        match outcome {
            Ok(()) => {
                let cancelled = cancel.is_cancelled();
                let stats = {
                    let mut st = state.write().await;
                    st.progress.phase = ScanPhase::Complete;
                    st.progress.current_track = None;
                    st.transition_to(if cancelled {
                        ScanStatus::Cancelled
                    } else {
                        ScanStatus::Complete
                    });
                    ScanStats::from_results(&st.results)
                };
                self.emit_progress(&state).await;
                self.event_bus.emit_lossy(ScanEvent::ScanCompleted {
                    scan_id,
                    stats,
                    cancelled,
                    timestamp: Utc::now(),
                });
                tracing::info!(scan_id = %scan_id, cancelled, "Scan finished");
            }
            Err(err) => {
                let message = err.to_string();
                state.write().await.fail(message.clone());
                self.event_bus.emit_lossy(ScanEvent::ScanFailed {
                    scan_id,
                    error: message.clone(),
                    timestamp: Utc::now(),
                });
                tracing::error!(scan_id = %scan_id, error = %message, "Scan failed");
            }
        }
    }

    async fn execute(
        &mut self,
        state: &SharedScanState,
        cancel: &CancellationToken,
    ) -> Result<(), ScanError> {
        let playlist_id = {
            let mut st = state.write().await;
            st.transition_to(ScanStatus::LoadingTracks);
            st.playlist_id.clone()
        };

        // A list-fetch failure aborts before any result is produced
        let tracks = self.spotify.get_all_playlist_tracks(&playlist_id).await?;
        if cancel.is_cancelled() {
            return Ok(());
        }

        {
            let mut st = state.write().await;
            st.transition_to(ScanStatus::Scanning);
            st.progress = ScanProgress::new(tracks.len());
        }
        self.emit_progress(state).await;

        self.blocklist_phase(state, cancel, tracks).await;
        self.emit_progress(state).await;

        if !self.options.enable_audio_analysis || cancel.is_cancelled() {
            return Ok(());
        }

        self.audio_phase(state, cancel).await;
        Ok(())
    }

    /// Synchronous pass producing the full result array. Matched tracks are
    /// flagged and emitted immediately.
    async fn blocklist_phase(
        &self,
        state: &SharedScanState,
        cancel: &CancellationToken,
        tracks: Vec<Track>,
    ) {
        for track in tracks {
            if cancel.is_cancelled() {
                break;
            }

            let matched = self.blocklist.check(&track.artists);
            let result = ScanResult::from_blocklist(track, matched.matched_names);

            let (scan_id, emit) = {
                let mut st = state.write().await;
                st.progress.processed_tracks += 1;
                if result.blocklist_match {
                    st.progress.flagged_count += 1;
                }
                st.results.push(result.clone());
                (st.scan_id, result.blocklist_match)
            };

            if emit {
                self.event_bus.emit_lossy(ScanEvent::TrackScanned {
                    scan_id,
                    result,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    /// Sequential audio analysis over the blocklist-phase results, in
    /// playlist order, one track at a time.
    async fn audio_phase(&mut self, state: &SharedScanState, cancel: &CancellationToken) {
        {
            let mut st = state.write().await;
            st.progress.phase = ScanPhase::Audio;
            st.progress.processed_tracks = 0;
            st.progress.total_tracks = st.results.len();
        }
        self.emit_progress(state).await;

        if let Some(capture) = self.capture.as_mut() {
            if let Err(err) = capture.initialize().await {
                tracing::warn!(error = %err, "Live-capture init failed; continuing without capture");
                self.capture = None;
            }
        }

        let total = { state.read().await.results.len() };

        for index in 0..total {
            // Cooperative cancellation: the in-flight track finished, further
            // tracks are not scheduled. Already-emitted results stay.
            if cancel.is_cancelled() {
                tracing::info!("Scan cancelled; stopping audio analysis");
                break;
            }

            let (scan_id, track, label) = {
                let mut st = state.write().await;
                let track = st.results[index].track.clone();
                let label = track.label();
                st.progress.current_track = Some(label.clone());
                (st.scan_id, track, label)
            };
            self.emit_progress(state).await;

            match self.analyze_track(&track).await {
                Ok(Some((score, source))) => {
                    let mut st = state.write().await;
                    let result = &mut st.results[index];
                    let was_flagged = result.blocklist_match || result.risk_level.is_flagged();
                    result.apply_score(score, source);
                    // Count each result once, when it first turns flagged
                    if !was_flagged && result.risk_level.is_flagged() {
                        st.progress.flagged_count += 1;
                    }
                }
                Ok(None) => {
                    tracing::debug!(track = %label, "No audio source; leaving track unscored");
                }
                Err(err) => {
                    tracing::warn!(
                        track = %label,
                        error = %err,
                        "Track analysis failed; keeping blocklist classification"
                    );
                }
            }

            let result = {
                let mut st = state.write().await;
                st.progress.processed_tracks += 1;
                st.results[index].clone()
            };
            self.event_bus.emit_lossy(ScanEvent::TrackScanned {
                scan_id,
                result,
                timestamp: Utc::now(),
            });
            self.emit_progress(state).await;

            if index + 1 < total {
                tokio::time::sleep(ANALYSIS_DELAY).await;
            }
        }
    }

    /// Resolve, fetch/capture, decode, and score one track.
    ///
    /// `Ok(None)` means no audio could be obtained and the track stays at its
    /// blocklist classification without being an error.
    async fn analyze_track(
        &mut self,
        track: &Track,
    ) -> Result<Option<(f32, AudioSource)>, TrackError> {
        let capture_ready = self.capture.as_ref().map(|c| c.is_ready()).unwrap_or(false);
        let resolved = self.resolver.resolve(track, capture_ready).await;

        let (waveform, source) = match resolved.locator {
            Locator::Url(url) => {
                let bytes = match self.proxy.fetch(&url).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        tracing::warn!(track_id = %track.id, error = %err, "Preview fetch failed");
                        return Err(TrackError::AudioUnavailable);
                    }
                };
                let samples = self.decoder.decode(&bytes)?;
                (samples, resolved.source)
            }
            Locator::LiveCapture => {
                let capture = self.capture.as_mut().ok_or(TrackError::AudioUnavailable)?;
                match capture.capture_window(&track.uri, CAPTURE_DURATION_MS).await {
                    Ok(Some(samples)) => (samples, AudioSource::LiveCapture),
                    Ok(None) => return Ok(None),
                    Err(err) => {
                        tracing::warn!(track_id = %track.id, error = %err, "Live capture failed");
                        return Err(TrackError::AudioUnavailable);
                    }
                }
            }
            Locator::Unavailable => return Ok(None),
        };

        let score = self.inference.predict(&waveform).await?;
        Ok(Some((score, source)))
    }

    async fn emit_progress(&self, state: &SharedScanState) {
        let (scan_id, progress) = {
            let st = state.read().await;
            (st.scan_id, st.progress.clone())
        };
        self.event_bus.emit_lossy(ScanEvent::ScanProgressUpdate {
            scan_id,
            progress,
            timestamp: Utc::now(),
        });
    }
}
