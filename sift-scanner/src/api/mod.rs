//! HTTP API handlers for sift-scanner

pub mod health;
pub mod preview;
pub mod scan;
pub mod sse;

pub use health::health_routes;
pub use preview::preview_routes;
pub use scan::scan_routes;
pub use sse::event_stream;
