//! Core services: scan state machine, conversion bookkeeping, result views
//! and the task that owns them

pub mod conversion_coordinator;
pub mod folder_selector;
pub mod repack_service;
pub mod result_view;
pub mod scan_orchestrator;

pub use conversion_coordinator::ConversionCoordinator;
pub use folder_selector::{FolderSelector, SelectionResult};
pub use repack_service::{
    PendingBatch, PendingConversion, RepackHandle, RepackService, RepackSnapshot, ResultsPage, ServiceSettings,
};
pub use result_view::ResultView;
pub use scan_orchestrator::ScanOrchestrator;
