//! # Comic Repack Common Library
//!
//! Shared code for the repack workspace:
//! - Archive and scan-result models exchanged with the engines and the UI
//! - Event types (RepackEvent) and the broadcast EventBus
//! - Configuration loading (TOML file + root folder resolution)
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;

pub use error::{Error, Result};
pub use models::{ArchiveInfo, ItemStatus, ScanResult, SessionStatus};
