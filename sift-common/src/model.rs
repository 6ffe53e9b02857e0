//! Scan domain model
//!
//! Types flowing between the scanner service, the event bus, and API
//! consumers. A scan progresses through two detection phases (blocklist,
//! audio) and produces exactly one [`ScanResult`] per playlist track.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audio score at or above this is classified high risk
pub const HIGH_THRESHOLD: f32 = 0.75;
/// Audio score at or above this (but below high) is classified medium risk
pub const MEDIUM_THRESHOLD: f32 = 0.40;

/// Artist reference as carried on a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

/// A playlist track, immutable once fetched from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artists: Vec<ArtistRef>,
    /// Album name, when the provider supplies one
    pub album: Option<String>,
    pub duration_ms: u64,
    /// Native 30-second preview URL, absent for many catalog tracks
    pub preview_url: Option<String>,
    /// ISRC code for cross-platform matching (fallback preview lookup)
    pub isrc: Option<String>,
    /// Canonical provider URI (used for removal and live capture)
    pub uri: String,
}

impl Track {
    /// Name of the first credited artist, if any
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(|a| a.name.as_str())
    }

    /// Display label used in progress reporting
    pub fn label(&self) -> String {
        match self.primary_artist() {
            Some(artist) => format!("{} – {}", artist, self.name),
            None => self.name.clone(),
        }
    }
}

/// Which mechanism(s) produced the classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Blocklist,
    AudioAnalysis,
    Both,
}

impl DetectionMethod {
    /// Derive the detection method from the two detection signals.
    ///
    /// Idempotent: re-deriving from an already-derived result is a no-op.
    pub fn derive(audio_score: Option<f32>, blocklist_match: bool) -> Self {
        match (blocklist_match, audio_score) {
            (true, Some(_)) => DetectionMethod::Both,
            (true, None) => DetectionMethod::Blocklist,
            (false, _) => DetectionMethod::AudioAnalysis,
        }
    }
}

/// Classification bucket derived from blocklist match + audio score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    Unknown,
}

impl RiskLevel {
    /// Derive the risk level. A blocklist match always forces `High`;
    /// a later audio score can never downgrade it.
    pub fn derive(audio_score: Option<f32>, blocklist_match: bool) -> Self {
        if blocklist_match {
            return RiskLevel::High;
        }
        match audio_score {
            None => RiskLevel::Unknown,
            Some(s) if s >= HIGH_THRESHOLD => RiskLevel::High,
            Some(s) if s >= MEDIUM_THRESHOLD => RiskLevel::Medium,
            Some(_) => RiskLevel::Low,
        }
    }

    /// Whether this level counts toward the flagged total
    pub fn is_flagged(self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Medium)
    }
}

/// Where the analyzed audio came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSource {
    NativePreview,
    FallbackPreview,
    LiveCapture,
    None,
}

/// Per-track scan outcome. At most one per track id in a result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub track: Track,
    /// AI probability from the classifier (0–1), absent when no audio was scored
    pub audio_score: Option<f32>,
    pub blocklist_match: bool,
    /// Blocklist entries that matched, in artist order
    pub matched_artists: Vec<String>,
    pub detection_method: DetectionMethod,
    pub risk_level: RiskLevel,
    pub audio_source: AudioSource,
    /// User selection for removal; mutated only by the consuming UI
    pub selected: bool,
}

impl ScanResult {
    /// Blocklist-phase result: no audio score yet.
    pub fn from_blocklist(track: Track, matched_artists: Vec<String>) -> Self {
        let matched = !matched_artists.is_empty();
        ScanResult {
            track,
            audio_score: None,
            blocklist_match: matched,
            matched_artists,
            detection_method: DetectionMethod::derive(None, matched),
            risk_level: RiskLevel::derive(None, matched),
            audio_source: AudioSource::None,
            selected: false,
        }
    }

    /// Record an audio score and re-derive the classification.
    pub fn apply_score(&mut self, score: f32, source: AudioSource) {
        self.audio_score = Some(score);
        self.audio_source = source;
        self.rederive();
    }

    /// Recompute `risk_level` and `detection_method` from the current
    /// signals. Safe to call repeatedly.
    pub fn rederive(&mut self) {
        self.risk_level = RiskLevel::derive(self.audio_score, self.blocklist_match);
        self.detection_method = DetectionMethod::derive(self.audio_score, self.blocklist_match);
    }
}

/// Scan phase within the scanning lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Blocklist,
    Audio,
    Complete,
}

/// Progress counters for the currently running phase.
///
/// Counters are monotonically non-decreasing within a phase; they reset only
/// at the blocklist → audio transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    pub total_tracks: usize,
    pub processed_tracks: usize,
    pub flagged_count: usize,
    /// Label of the track currently being analyzed
    pub current_track: Option<String>,
}

impl ScanProgress {
    pub fn new(total_tracks: usize) -> Self {
        ScanProgress {
            phase: ScanPhase::Blocklist,
            total_tracks,
            processed_tracks: 0,
            flagged_count: 0,
            current_track: None,
        }
    }
}

/// Scan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Idle,
    LoadingTracks,
    Scanning,
    Complete,
    /// Terminal "stopped" variant of complete, reached via cancellation
    Cancelled,
    Error,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanStatus::Complete | ScanStatus::Cancelled | ScanStatus::Error
        )
    }
}

/// Options controlling a scan run
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScanOptions {
    #[serde(default = "default_true")]
    pub enable_audio_analysis: bool,
    #[serde(default = "default_true")]
    pub enable_fallback_preview: bool,
    #[serde(default)]
    pub enable_live_capture: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            enable_audio_analysis: true,
            enable_fallback_preview: true,
            enable_live_capture: false,
        }
    }
}

/// Aggregate state of one scan session.
///
/// Created when a scan starts, mutated only by the orchestrator, discarded
/// when a new scan starts. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanState {
    pub scan_id: Uuid,
    pub playlist_id: String,
    pub status: ScanStatus,
    pub progress: ScanProgress,
    pub results: Vec<ScanResult>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ScanState {
    pub fn new(scan_id: Uuid, playlist_id: String) -> Self {
        ScanState {
            scan_id,
            playlist_id,
            status: ScanStatus::Idle,
            progress: ScanProgress::new(0),
            results: Vec::new(),
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to a new lifecycle status, stamping `ended_at` on terminal states.
    pub fn transition_to(&mut self, status: ScanStatus) {
        tracing::debug!(scan_id = %self.scan_id, old = ?self.status, new = ?status, "Scan state transition");
        self.status = status;
        if status.is_terminal() && self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }

    /// Terminal error transition with a user-facing message.
    pub fn fail(&mut self, message: String) {
        self.error = Some(message);
        self.transition_to(ScanStatus::Error);
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Aggregate statistics over a result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStats {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
    pub blocklist_matches: usize,
    /// Tracks with no audio to analyze and no blocklist match
    pub no_preview: usize,
    pub fallback_previews: usize,
    pub live_captures: usize,
    /// high + medium
    pub flagged: usize,
}

impl ScanStats {
    pub fn from_results(results: &[ScanResult]) -> Self {
        let count = |level: RiskLevel| results.iter().filter(|r| r.risk_level == level).count();
        let high = count(RiskLevel::High);
        let medium = count(RiskLevel::Medium);
        ScanStats {
            total: results.len(),
            high,
            medium,
            low: count(RiskLevel::Low),
            unknown: count(RiskLevel::Unknown),
            blocklist_matches: results.iter().filter(|r| r.blocklist_match).count(),
            no_preview: results
                .iter()
                .filter(|r| r.audio_source == AudioSource::None && !r.blocklist_match)
                .count(),
            fallback_previews: results
                .iter()
                .filter(|r| r.audio_source == AudioSource::FallbackPreview)
                .count(),
            live_captures: results
                .iter()
                .filter(|r| r.audio_source == AudioSource::LiveCapture)
                .count(),
            flagged: high + medium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Track {id}"),
            artists: vec![ArtistRef {
                id: format!("artist-{id}"),
                name: "Some Artist".to_string(),
            }],
            album: Some("Some Album".to_string()),
            duration_ms: 210_000,
            preview_url: None,
            isrc: None,
            uri: format!("spotify:track:{id}"),
        }
    }

    #[test]
    fn risk_thresholds() {
        assert_eq!(RiskLevel::derive(Some(0.75), false), RiskLevel::High);
        assert_eq!(RiskLevel::derive(Some(0.99), false), RiskLevel::High);
        assert_eq!(RiskLevel::derive(Some(0.74), false), RiskLevel::Medium);
        assert_eq!(RiskLevel::derive(Some(0.40), false), RiskLevel::Medium);
        assert_eq!(RiskLevel::derive(Some(0.39), false), RiskLevel::Low);
        assert_eq!(RiskLevel::derive(Some(0.0), false), RiskLevel::Low);
        assert_eq!(RiskLevel::derive(None, false), RiskLevel::Unknown);
    }

    #[test]
    fn blocklist_match_forces_high() {
        // No audio outcome may downgrade a blocklisted track
        assert_eq!(RiskLevel::derive(None, true), RiskLevel::High);
        assert_eq!(RiskLevel::derive(Some(0.01), true), RiskLevel::High);
        assert_eq!(RiskLevel::derive(Some(0.5), true), RiskLevel::High);
    }

    #[test]
    fn detection_method_derivation() {
        assert_eq!(
            DetectionMethod::derive(None, true),
            DetectionMethod::Blocklist
        );
        assert_eq!(DetectionMethod::derive(Some(0.2), true), DetectionMethod::Both);
        assert_eq!(
            DetectionMethod::derive(Some(0.9), false),
            DetectionMethod::AudioAnalysis
        );
        assert_eq!(
            DetectionMethod::derive(None, false),
            DetectionMethod::AudioAnalysis
        );
    }

    #[test]
    fn rederive_is_idempotent() {
        let mut result = ScanResult::from_blocklist(track("1"), vec!["Some Artist".into()]);
        result.apply_score(0.5, AudioSource::NativePreview);

        let before = (result.risk_level, result.detection_method);
        result.rederive();
        result.rederive();
        assert_eq!((result.risk_level, result.detection_method), before);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(result.detection_method, DetectionMethod::Both);
    }

    #[test]
    fn blocklist_phase_result_shape() {
        let clean = ScanResult::from_blocklist(track("1"), vec![]);
        assert!(!clean.blocklist_match);
        assert_eq!(clean.risk_level, RiskLevel::Unknown);
        assert_eq!(clean.detection_method, DetectionMethod::AudioAnalysis);
        assert!(clean.audio_score.is_none());

        let matched = ScanResult::from_blocklist(track("2"), vec!["Some Artist".into()]);
        assert!(matched.blocklist_match);
        assert_eq!(matched.risk_level, RiskLevel::High);
        assert_eq!(matched.detection_method, DetectionMethod::Blocklist);
    }

    #[test]
    fn stats_counting() {
        let mut a = ScanResult::from_blocklist(track("a"), vec!["Some Artist".into()]);
        a.apply_score(0.9, AudioSource::NativePreview);
        let mut b = ScanResult::from_blocklist(track("b"), vec![]);
        b.apply_score(0.55, AudioSource::FallbackPreview);
        let mut c = ScanResult::from_blocklist(track("c"), vec![]);
        c.apply_score(0.1, AudioSource::LiveCapture);
        let d = ScanResult::from_blocklist(track("d"), vec![]);

        let stats = ScanStats::from_results(&[a, b, c, d]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.high, 1);
        assert_eq!(stats.medium, 1);
        assert_eq!(stats.low, 1);
        assert_eq!(stats.unknown, 1);
        assert_eq!(stats.blocklist_matches, 1);
        assert_eq!(stats.no_preview, 1);
        assert_eq!(stats.fallback_previews, 1);
        assert_eq!(stats.live_captures, 1);
        assert_eq!(stats.flagged, 2);
    }

    #[test]
    fn scan_state_terminal_transitions() {
        let mut state = ScanState::new(Uuid::new_v4(), "playlist".into());
        assert_eq!(state.status, ScanStatus::Idle);
        assert!(state.ended_at.is_none());

        state.transition_to(ScanStatus::LoadingTracks);
        state.transition_to(ScanStatus::Scanning);
        assert!(!state.is_terminal());

        state.transition_to(ScanStatus::Complete);
        assert!(state.is_terminal());
        assert!(state.ended_at.is_some());
    }

    #[test]
    fn scan_state_fail_records_message() {
        let mut state = ScanState::new(Uuid::new_v4(), "playlist".into());
        state.transition_to(ScanStatus::LoadingTracks);
        state.fail("rate limited".into());
        assert_eq!(state.status, ScanStatus::Error);
        assert_eq!(state.error.as_deref(), Some("rate limited"));
        assert!(state.is_terminal());
    }

    #[test]
    fn track_label_uses_primary_artist() {
        let t = track("1");
        assert_eq!(t.label(), "Some Artist – Track 1");
    }
}
