//! Service modules for the scan pipeline

pub mod auth;
pub mod blocklist;
pub mod capture;
pub mod classifier;
pub mod decoder;
pub mod deezer;
pub mod inference;
pub mod proxy;
pub mod resolver;
pub mod scanner;
pub mod spotify;

pub use auth::{Credentials, RefreshError, SpotifyAuthRefresher, TokenManager, TokenRefresher};
pub use blocklist::{BlocklistMatch, BlocklistMatcher};
pub use capture::{CaptureError, PlaybackCapture, CAPTURE_DURATION_MS};
pub use classifier::ExternalClassifier;
pub use decoder::{AudioDecoder, DecodeError, SymphoniaDecoder};
pub use deezer::{DeezerClient, DeezerError};
pub use inference::{ClassifierRuntime, InferenceError, InferenceQueue, SAMPLE_RATE, WINDOW_LEN};
pub use proxy::{PreviewProxy, ProxyError};
pub use resolver::{Locator, PreviewResolver, ResolvedAudio};
pub use scanner::{ScanOrchestrator, SharedScanState};
pub use spotify::{SpotifyClient, PAGE_LIMIT, REMOVE_BATCH_SIZE};
