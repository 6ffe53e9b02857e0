//! # sift Common Library
//!
//! Shared code for the sift scanner service:
//! - Domain model (Track, ScanResult, ScanProgress, ScanState)
//! - Event types (ScanEvent enum) and EventBus
//! - Common error types
//! - Human-readable time formatting

pub mod error;
pub mod events;
pub mod human_time;
pub mod model;

pub use error::{Error, Result};
