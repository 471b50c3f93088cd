//! Test Helper Utilities
//!
//! Scripted engines and setup shared by the repack-scan integration tests

pub mod fakes;

pub use fakes::{FakeConverter, ScriptedScanEngine};

use repack_common::events::{EventBus, RepackEvent};
use repack_common::{ArchiveInfo, ScanResult};
use repack_scan::services::{RepackHandle, RepackService, ServiceSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Running service wired to scripted engines
pub struct TestService {
    pub handle: RepackHandle,
    pub scan: Arc<ScriptedScanEngine>,
    pub converter: Arc<FakeConverter>,
    pub event_bus: EventBus,
}

pub fn start_service(settings: ServiceSettings, converter: FakeConverter) -> TestService {
    let scan = Arc::new(ScriptedScanEngine::new());
    let converter = Arc::new(converter);
    let event_bus = EventBus::new(256);
    let handle = RepackService::spawn(
        settings,
        scan.clone(),
        converter.clone(),
        event_bus.clone(),
    );
    TestService {
        handle,
        scan,
        converter,
        event_bus,
    }
}

pub fn start_default_service() -> TestService {
    start_service(ServiceSettings::default(), FakeConverter::new())
}

/// Result the engine would report for a readable archive
pub fn supported(path: &str) -> ScanResult {
    ScanResult::from_analysis(
        path,
        Ok(ArchiveInfo {
            file_type: "zip".to_string(),
            is_solid: false,
            is_encrypted: false,
            image_count: 20,
            unsupported_reason: None,
        }),
    )
}

/// Result the engine would report for a RAR5 archive
pub fn unsupported(path: &str) -> ScanResult {
    ScanResult::from_analysis(
        path,
        Ok(ArchiveInfo {
            file_type: "Rar5".to_string(),
            is_solid: true,
            is_encrypted: false,
            image_count: 32,
            unsupported_reason: Some("RAR5 format".to_string()),
        }),
    )
}

/// Wait for the first event matching `predicate`
pub async fn wait_for_event(
    rx: &mut broadcast::Receiver<RepackEvent>,
    predicate: impl Fn(&RepackEvent) -> bool,
) -> RepackEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
