//! HTTP API handlers for repack-scan
//!
//! JSON endpoints forward operator intents to the repack service; `/events`
//! streams every state change over SSE.

pub mod convert;
pub mod health;
pub mod results;
pub mod scan;
pub mod sse;

pub use convert::convert_routes;
pub use health::health_routes;
pub use results::result_routes;
pub use scan::scan_routes;
pub use sse::{event_stream, heartbeat_stream};
