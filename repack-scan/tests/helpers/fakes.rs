//! Scripted scan engine and fake converter

use async_trait::async_trait;
use repack_common::ScanResult;
use repack_scan::engine::{ConversionEngine, EngineError, ScanEngine, ScanEvent, ScanEventSender};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Scan engine whose events are pushed by the test
#[derive(Default)]
pub struct ScriptedScanEngine {
    sender: Mutex<Option<ScanEventSender>>,
    fail_next_start: Mutex<Option<String>>,
    roots: Mutex<Vec<PathBuf>>,
    cancel_requests: AtomicUsize,
}

impl ScriptedScanEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `start` fail synchronously
    pub fn fail_next_start(&self, message: &str) {
        *self.fail_next_start.lock().unwrap() = Some(message.to_string());
    }

    /// Push one event into the current session's channel
    pub fn emit(&self, event: ScanEvent) -> bool {
        match self.sender.lock().unwrap().as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    pub fn progress(&self, count: u64) {
        self.emit(ScanEvent::Progress(count));
    }

    pub fn result(&self, result: ScanResult) {
        self.emit(ScanEvent::Result(result));
    }

    pub fn complete(&self) {
        self.emit(ScanEvent::Complete);
    }

    pub fn cancelled(&self) {
        self.emit(ScanEvent::Cancelled);
    }

    /// Sender of the current session, kept alive past the session's end
    pub fn sender(&self) -> Option<ScanEventSender> {
        self.sender.lock().unwrap().clone()
    }

    /// Drop the channel without a terminal event
    pub fn disconnect(&self) {
        self.sender.lock().unwrap().take();
    }

    pub fn cancel_requests(&self) -> usize {
        self.cancel_requests.load(Ordering::SeqCst)
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots.lock().unwrap().clone()
    }
}

impl ScanEngine for ScriptedScanEngine {
    fn start(&self, root: &Path, events: ScanEventSender) -> Result<(), EngineError> {
        if let Some(message) = self.fail_next_start.lock().unwrap().take() {
            return Err(EngineError::Failed(message));
        }
        self.roots.lock().unwrap().push(root.to_path_buf());
        *self.sender.lock().unwrap() = Some(events);
        Ok(())
    }

    fn request_cancel(&self) {
        self.cancel_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Conversion engine with scripted failures and concurrency tracking
pub struct FakeConverter {
    failures: Mutex<HashMap<String, String>>,
    delay: Duration,
    /// When set, each conversion waits for one permit
    gate: Option<Arc<Semaphore>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeConverter {
    pub fn new() -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            gate: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Conversions block until [`release`](Self::release) is called
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn fail(self, path: &str, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(path.to_string(), message.to_string());
        self
    }

    pub fn release(&self, conversions: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(conversions);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversionEngine for FakeConverter {
    async fn convert(&self, path: &str) -> Result<String, EngineError> {
        self.calls.lock().unwrap().push(path.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let failure = self.failures.lock().unwrap().get(path).cloned();
        match failure {
            Some(message) => Err(EngineError::Failed(message)),
            None => Ok(format!("{}.cbz", path.trim_end_matches(".rar5"))),
        }
    }
}
