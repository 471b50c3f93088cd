//! Repack service task
//!
//! One task owns the scan orchestrator, the conversion coordinator and the
//! operator settings. It drains four inputs with a biased `select!`:
//!
//! 1. scan events from the current session's engine channel
//! 2. conversion resolutions from spawned engine calls
//! 3. the cancel deadline, armed while a cancel awaits confirmation
//! 4. commands from [`RepackHandle`]s
//!
//! Every state change is published on the [`EventBus`]. Convert-all batches
//! run on a task the service spawns itself, so a caller that stops waiting
//! does not leave the batch open.

use crate::engine::{scan_event_channel, ConversionEngine, ScanEngine, ScanEvent, ScanEventReceiver};
use crate::error::RepackError;
use crate::models::{BatchPlan, BatchReport, ConversionOutcome, ConversionTicket, SessionOutcome, SessionSummary};
use crate::services::{ConversionCoordinator, ResultView, ScanOrchestrator};
use chrono::Utc;
use repack_common::events::{EventBus, RepackEvent};
use repack_common::{ItemStatus, ScanResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runtime knobs for the service task
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// How long a cancel may go unconfirmed before the session is abandoned
    pub cancel_timeout: Duration,
    /// Conversions allowed to run at once
    pub conversion_workers: usize,
    /// Command channel capacity
    pub command_buffer: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cancel_timeout: Duration::from_secs(30),
            conversion_workers: 2,
            command_buffer: 64,
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, RepackError>>;

enum Command {
    SelectFolder {
        path: PathBuf,
        reply: Reply<Uuid>,
    },
    StartScan {
        path: Option<String>,
        reply: Reply<Uuid>,
    },
    CancelScan {
        reply: oneshot::Sender<bool>,
    },
    Convert {
        path: String,
        reply: Reply<ConversionTicket>,
        done: oneshot::Sender<ConversionOutcome>,
    },
    BeginBatch {
        reply: Reply<BatchPlan>,
        report: oneshot::Sender<BatchReport>,
    },
    FinishBatch {
        report: BatchReport,
    },
    SetFilter {
        show_only_actionable: bool,
    },
    Snapshot {
        reply: oneshot::Sender<RepackSnapshot>,
    },
    Results {
        show_only_actionable: Option<bool>,
        reply: oneshot::Sender<ResultsPage>,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::SelectFolder { .. } => "SelectFolder",
            Command::StartScan { .. } => "StartScan",
            Command::CancelScan { .. } => "CancelScan",
            Command::Convert { .. } => "Convert",
            Command::BeginBatch { .. } => "BeginBatch",
            Command::FinishBatch { .. } => "FinishBatch",
            Command::SetFilter { .. } => "SetFilter",
            Command::Snapshot { .. } => "Snapshot",
            Command::Results { .. } => "Results",
        };
        f.write_str(name)
    }
}

/// Engine outcome for one ticket, routed back to the service task
struct Resolution {
    ticket: ConversionTicket,
    result: Result<String, String>,
    done: oneshot::Sender<ConversionOutcome>,
}

enum ScanFeed {
    Event(ScanEvent),
    Closed,
}

/// Point-in-time view of the service state
#[derive(Debug, Clone, Serialize)]
pub struct RepackSnapshot {
    pub session: SessionSummary,
    pub selected_folder: Option<PathBuf>,
    pub show_only_actionable: bool,
    pub active_batch: Option<Uuid>,
    pub conversions_in_flight: usize,
}

/// Filtered result log with its counters
#[derive(Debug, Clone, Serialize)]
pub struct ResultsPage {
    pub show_only_actionable: bool,
    pub scanned_count: u64,
    pub unsupported_count: usize,
    pub total: usize,
    pub results: Vec<ScanResult>,
}

pub struct RepackService {
    settings: ServiceSettings,
    scan_engine: Arc<dyn ScanEngine>,
    conversion_engine: Arc<dyn ConversionEngine>,
    event_bus: EventBus,

    orchestrator: ScanOrchestrator,
    coordinator: ConversionCoordinator,
    selected_folder: Option<PathBuf>,
    show_only_actionable: bool,
    active_batch: Option<Uuid>,

    /// Handed to batch runners; weak so the task still stops with its handles
    commands: mpsc::WeakSender<Command>,

    /// Current session's engine channel; dropped when the session ends
    scan_events: Option<ScanEventReceiver>,
    cancel_deadline: Option<Instant>,

    permits: Arc<Semaphore>,
    resolved_tx: mpsc::UnboundedSender<Resolution>,
    resolved_rx: mpsc::UnboundedReceiver<Resolution>,
}

impl RepackService {
    /// Start the service task and return a handle to it
    ///
    /// The task stops once every handle has been dropped.
    pub fn spawn(
        settings: ServiceSettings,
        scan_engine: Arc<dyn ScanEngine>,
        conversion_engine: Arc<dyn ConversionEngine>,
        event_bus: EventBus,
    ) -> RepackHandle {
        let (commands_tx, commands_rx) = mpsc::channel(settings.command_buffer.max(1));
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();

        let service = Self {
            permits: Arc::new(Semaphore::new(settings.conversion_workers.max(1))),
            settings,
            scan_engine,
            conversion_engine,
            event_bus,
            orchestrator: ScanOrchestrator::new(),
            coordinator: ConversionCoordinator::new(),
            selected_folder: None,
            show_only_actionable: false,
            active_batch: None,
            commands: commands_tx.downgrade(),
            scan_events: None,
            cancel_deadline: None,
            resolved_tx,
            resolved_rx,
        };

        tokio::spawn(service.run(commands_rx));
        RepackHandle {
            commands: commands_tx,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(
            workers = self.settings.conversion_workers,
            cancel_timeout_secs = self.settings.cancel_timeout.as_secs(),
            "Repack service started"
        );

        loop {
            tokio::select! {
                biased;

                feed = next_scan_event(&mut self.scan_events) => self.on_scan_feed(feed),

                Some(resolution) = self.resolved_rx.recv() => self.on_resolution(resolution),

                _ = deadline(self.cancel_deadline) => self.on_cancel_timeout(),

                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }

        info!("Repack service stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::SelectFolder { path, reply } => {
                let _ = reply.send(self.select_folder(path));
            }
            Command::StartScan { path, reply } => {
                let _ = reply.send(self.start_scan(path));
            }
            Command::CancelScan { reply } => {
                let _ = reply.send(self.cancel_scan());
            }
            Command::Convert { path, reply, done } => {
                let _ = reply.send(self.convert(&path, done));
            }
            Command::BeginBatch { reply, report } => {
                let _ = reply.send(self.begin_batch(report));
            }
            Command::FinishBatch { report } => self.finish_batch(report),
            Command::SetFilter {
                show_only_actionable,
            } => {
                self.show_only_actionable = show_only_actionable;
                self.event_bus.emit_lossy(RepackEvent::FilterChanged {
                    show_only_actionable,
                });
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Results {
                show_only_actionable,
                reply,
            } => {
                let _ = reply.send(self.results(show_only_actionable));
            }
        }
    }

    // ---- commands ----

    fn select_folder(&mut self, path: PathBuf) -> Result<Uuid, RepackError> {
        let session_id = self.orchestrator.reset()?;
        self.coordinator.reset();
        info!(folder = %path.display(), "Folder selected, results cleared");

        self.event_bus.emit_lossy(RepackEvent::FolderSelected {
            path: path.clone(),
            timestamp: Utc::now(),
        });
        self.selected_folder = Some(path);
        Ok(session_id)
    }

    fn start_scan(&mut self, path: Option<String>) -> Result<Uuid, RepackError> {
        let root = path
            .filter(|p| !p.trim().is_empty())
            .or_else(|| {
                self.selected_folder
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .unwrap_or_default();

        let session_id = self.orchestrator.start(&root)?;
        self.coordinator.reset();

        let (events_tx, events_rx) = scan_event_channel();
        if let Err(e) = self.scan_engine.start(Path::new(&root), events_tx) {
            let message = e.to_string();
            self.orchestrator.abort_start(&message);
            self.event_bus.emit_lossy(RepackEvent::ScanFailed {
                session_id: Some(session_id),
                error: message.clone(),
                timestamp: Utc::now(),
            });
            return Err(RepackError::EngineFailure(message));
        }

        self.scan_events = Some(events_rx);
        self.cancel_deadline = None;
        self.selected_folder = Some(PathBuf::from(&root));
        self.event_bus.emit_lossy(RepackEvent::ScanStarted {
            session_id,
            root_folder: root,
            timestamp: Utc::now(),
        });
        Ok(session_id)
    }

    fn cancel_scan(&mut self) -> bool {
        if !self.orchestrator.cancel() {
            return false;
        }
        self.scan_engine.request_cancel();
        self.cancel_deadline = Some(Instant::now() + self.settings.cancel_timeout);
        self.event_bus.emit_lossy(RepackEvent::ScanCancelRequested {
            session_id: self.orchestrator.session().session_id,
            timestamp: Utc::now(),
        });
        true
    }

    fn convert(
        &mut self,
        path: &str,
        done: oneshot::Sender<ConversionOutcome>,
    ) -> Result<ConversionTicket, RepackError> {
        let session_id = self.orchestrator.session().session_id;
        let ticket = self
            .coordinator
            .begin(self.orchestrator.log_mut(), path, session_id)?;

        self.event_bus.emit_lossy(RepackEvent::ConversionStarted {
            path: path.to_string(),
            timestamp: Utc::now(),
        });

        let engine = Arc::clone(&self.conversion_engine);
        let permits = Arc::clone(&self.permits);
        let resolved = self.resolved_tx.clone();
        let task_ticket = ticket.clone();
        tokio::spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(permit) => {
                    let result = engine
                        .convert(&task_ticket.path)
                        .await
                        .map_err(|e| e.to_string());
                    drop(permit);
                    result
                }
                Err(_) => Err("Conversion workers shut down".to_string()),
            };
            let _ = resolved.send(Resolution {
                ticket: task_ticket,
                result,
                done,
            });
        });

        Ok(ticket)
    }

    fn begin_batch(
        &mut self,
        report: oneshot::Sender<BatchReport>,
    ) -> Result<BatchPlan, RepackError> {
        if let Some(batch_id) = self.active_batch {
            return Err(RepackError::InvalidState(format!(
                "Batch {} is still running",
                batch_id
            )));
        }
        let runner = RepackHandle {
            commands: self.commands.upgrade().ok_or(RepackError::ServiceStopped)?,
        };

        let plan = BatchPlan {
            batch_id: Uuid::new_v4(),
            paths: self.coordinator.snapshot_unsupported(self.orchestrator.log()),
        };
        self.active_batch = Some(plan.batch_id);

        info!(batch_id = %plan.batch_id, total = plan.paths.len(), "Convert-all batch started");
        self.event_bus.emit_lossy(RepackEvent::BatchStarted {
            batch_id: plan.batch_id,
            total: plan.paths.len(),
            timestamp: Utc::now(),
        });

        let task_plan = plan.clone();
        tokio::spawn(async move {
            let finished = runner.run_batch(task_plan).await;
            let _ = report.send(finished);
        });
        Ok(plan)
    }

    fn finish_batch(&mut self, report: BatchReport) {
        if self.active_batch == Some(report.batch_id) {
            self.active_batch = None;
        }
        info!(
            batch_id = %report.batch_id,
            converted = report.converted,
            failed = report.failed,
            skipped = report.skipped,
            "Convert-all batch finished"
        );
        self.event_bus.emit_lossy(RepackEvent::BatchFinished {
            batch_id: report.batch_id,
            converted: report.converted,
            failed: report.failed,
            skipped: report.skipped,
            timestamp: Utc::now(),
        });
    }

    fn snapshot(&self) -> RepackSnapshot {
        RepackSnapshot {
            session: self.orchestrator.session().summary(),
            selected_folder: self.selected_folder.clone(),
            show_only_actionable: self.show_only_actionable,
            active_batch: self.active_batch,
            conversions_in_flight: self.coordinator.in_flight_count(),
        }
    }

    fn results(&self, show_only_actionable: Option<bool>) -> ResultsPage {
        let show_only_actionable = show_only_actionable.unwrap_or(self.show_only_actionable);
        let view = ResultView::new(
            self.orchestrator.log(),
            self.orchestrator.session().scanned_count,
        );
        ResultsPage {
            show_only_actionable,
            scanned_count: view.scanned_count(),
            unsupported_count: view.unsupported_count(),
            total: self.orchestrator.log().len(),
            results: view
                .filtered_results(show_only_actionable)
                .into_iter()
                .cloned()
                .collect(),
        }
    }

    // ---- engine inputs ----

    fn on_scan_feed(&mut self, feed: ScanFeed) {
        let session_id = self.orchestrator.session().session_id;
        match feed {
            ScanFeed::Event(ScanEvent::Progress(count)) => {
                if self.orchestrator.on_progress(count) {
                    self.event_bus.emit_lossy(RepackEvent::ScanProgress {
                        session_id,
                        scanned_count: self.orchestrator.session().scanned_count,
                    });
                }
            }
            ScanFeed::Event(ScanEvent::Result(item)) => {
                let result = item.clone();
                if let Some(appended) = self.orchestrator.on_result(item) {
                    self.event_bus.emit_lossy(RepackEvent::ScanResultAdded {
                        session_id,
                        index: appended.index,
                        result,
                    });
                }
            }
            ScanFeed::Event(ScanEvent::Complete) => {
                if self.orchestrator.on_complete() {
                    let event = self.session_end_event(false);
                    self.event_bus.emit_lossy(event);
                }
                self.close_session_channel();
            }
            ScanFeed::Event(ScanEvent::Cancelled) => {
                if self.orchestrator.on_cancelled() {
                    let event = self.session_end_event(true);
                    self.event_bus.emit_lossy(event);
                }
                self.close_session_channel();
            }
            ScanFeed::Closed => {
                self.close_session_channel();
                self.fail_session(
                    SessionOutcome::Failed,
                    "Scan engine stopped without completing".to_string(),
                );
            }
        }
    }

    fn on_cancel_timeout(&mut self) {
        self.close_session_channel();
        let message = format!(
            "Scan engine did not confirm cancel within {}s",
            self.settings.cancel_timeout.as_secs()
        );
        self.fail_session(SessionOutcome::TimedOut, message);
    }

    fn on_resolution(&mut self, resolution: Resolution) {
        let Resolution {
            ticket,
            result,
            done,
        } = resolution;

        let outcome = self
            .coordinator
            .resolve(self.orchestrator.log_mut(), &ticket, result);

        match &outcome {
            ConversionOutcome::Converted { path, output_path } => {
                self.event_bus.emit_lossy(RepackEvent::ConversionFinished {
                    path: path.clone(),
                    status: ItemStatus::Converted,
                    output_path: Some(output_path.clone()),
                    error: None,
                    timestamp: Utc::now(),
                });
            }
            ConversionOutcome::Failed { path, error } => {
                self.event_bus.emit_lossy(RepackEvent::ConversionFinished {
                    path: path.clone(),
                    status: ItemStatus::Error,
                    output_path: None,
                    error: Some(error.clone()),
                    timestamp: Utc::now(),
                });
            }
            ConversionOutcome::Discarded { path } => {
                debug!(path = %path, "Conversion finished for a previous session");
            }
        }

        let _ = done.send(outcome);
    }

    fn fail_session(&mut self, outcome: SessionOutcome, message: String) {
        let session_id = self.orchestrator.session().session_id;
        let error = RepackError::EngineFailure(message.clone()).to_string();
        if self.orchestrator.force_idle(outcome, &error) {
            warn!(session_id = %session_id, "{}", message);
            self.event_bus.emit_lossy(RepackEvent::ScanFailed {
                session_id: Some(session_id),
                error,
                timestamp: Utc::now(),
            });
        }
    }

    /// Drop the engine channel so late events from this session are discarded
    fn close_session_channel(&mut self) {
        self.scan_events = None;
        self.cancel_deadline = None;
    }

    fn session_end_event(&self, cancelled: bool) -> RepackEvent {
        let session = self.orchestrator.session();
        let session_id = session.session_id;
        let scanned_count = session.scanned_count;
        let result_count = session.log().len();
        let unsupported_count = session.log().count_status(ItemStatus::Unsupported);
        let timestamp = Utc::now();

        if cancelled {
            RepackEvent::ScanCancelled {
                session_id,
                scanned_count,
                result_count,
                unsupported_count,
                timestamp,
            }
        } else {
            RepackEvent::ScanCompleted {
                session_id,
                scanned_count,
                result_count,
                unsupported_count,
                timestamp,
            }
        }
    }
}

async fn next_scan_event(events: &mut Option<ScanEventReceiver>) -> ScanFeed {
    match events {
        Some(rx) => match rx.recv().await {
            Some(event) => ScanFeed::Event(event),
            None => ScanFeed::Closed,
        },
        None => std::future::pending().await,
    }
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Accepted convert-all batch
///
/// Dropping it does not stop the batch; the report still reaches the
/// event stream as `BatchFinished`.
#[derive(Debug)]
pub struct PendingBatch {
    plan: BatchPlan,
    report: oneshot::Receiver<BatchReport>,
}

impl PendingBatch {
    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    pub async fn wait(self) -> Result<BatchReport, RepackError> {
        self.report.await.map_err(|_| RepackError::ServiceStopped)
    }
}

/// Cloneable client of the service task
#[derive(Debug, Clone)]
pub struct RepackHandle {
    commands: mpsc::Sender<Command>,
}

/// Accepted conversion awaiting its engine result
#[derive(Debug)]
pub struct PendingConversion {
    ticket: ConversionTicket,
    done: oneshot::Receiver<ConversionOutcome>,
}

impl PendingConversion {
    pub fn ticket(&self) -> &ConversionTicket {
        &self.ticket
    }

    /// Wait for the resolution
    ///
    /// If the service stops first the conversion counts as discarded.
    pub async fn wait(self) -> ConversionOutcome {
        let path = self.ticket.path;
        self.done
            .await
            .unwrap_or(ConversionOutcome::Discarded { path })
    }
}

impl RepackHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RepackError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| RepackError::ServiceStopped)?;
        reply_rx.await.map_err(|_| RepackError::ServiceStopped)
    }

    /// Use `path` (already validated) as the scan root and clear the results
    pub async fn select_folder(&self, path: PathBuf) -> Result<Uuid, RepackError> {
        self.request(|reply| Command::SelectFolder { path, reply })
            .await?
    }

    /// Start scanning `path`, or the selected folder when `None`
    pub async fn start_scan(&self, path: Option<String>) -> Result<Uuid, RepackError> {
        self.request(|reply| Command::StartScan { path, reply })
            .await?
    }

    /// Request cancellation; `false` when no scan was running
    pub async fn cancel_scan(&self) -> Result<bool, RepackError> {
        self.request(|reply| Command::CancelScan { reply }).await
    }

    /// Start converting `path` without waiting for the engine
    pub async fn submit_conversion(&self, path: &str) -> Result<PendingConversion, RepackError> {
        let (done_tx, done_rx) = oneshot::channel();
        let ticket = self
            .request(|reply| Command::Convert {
                path: path.to_string(),
                reply,
                done: done_tx,
            })
            .await??;
        Ok(PendingConversion {
            ticket,
            done: done_rx,
        })
    }

    /// Convert `path` and wait for the outcome
    pub async fn convert(&self, path: &str) -> Result<ConversionOutcome, RepackError> {
        let pending = self.submit_conversion(path).await?;
        Ok(pending.wait().await)
    }

    /// Snapshot the Unsupported paths into a new batch and start converting
    pub async fn begin_batch(&self) -> Result<PendingBatch, RepackError> {
        let (report_tx, report_rx) = oneshot::channel();
        let plan = self
            .request(|reply| Command::BeginBatch {
                reply,
                report: report_tx,
            })
            .await??;
        Ok(PendingBatch {
            plan,
            report: report_rx,
        })
    }

    /// Convert every path of `plan`, one at a time
    ///
    /// A path that is no longer convertible when its turn comes, or whose
    /// result was discarded by a reset, counts as skipped.
    async fn run_batch(&self, plan: BatchPlan) -> BatchReport {
        let mut report = BatchReport::new(&plan);

        for (position, path) in plan.paths.iter().enumerate() {
            match self.convert(path).await {
                Ok(ConversionOutcome::Converted { .. }) => report.converted += 1,
                Ok(ConversionOutcome::Failed { .. }) => report.failed += 1,
                Ok(ConversionOutcome::Discarded { .. }) => report.skipped += 1,
                Err(RepackError::ServiceStopped) => {
                    report.skipped += plan.paths.len() - position;
                    warn!(batch_id = %plan.batch_id, "Service stopped during batch");
                    return report;
                }
                Err(e) => {
                    debug!(batch_id = %plan.batch_id, path = %path, "Skipping batch item: {}", e);
                    report.skipped += 1;
                }
            }
        }

        let _ = self
            .commands
            .send(Command::FinishBatch {
                report: report.clone(),
            })
            .await;
        report
    }

    /// Snapshot and convert every Unsupported path
    pub async fn convert_all(&self) -> Result<BatchReport, RepackError> {
        self.begin_batch().await?.wait().await
    }

    pub async fn set_filter(&self, show_only_actionable: bool) -> Result<(), RepackError> {
        self.commands
            .send(Command::SetFilter {
                show_only_actionable,
            })
            .await
            .map_err(|_| RepackError::ServiceStopped)
    }

    pub async fn snapshot(&self) -> Result<RepackSnapshot, RepackError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Filtered results; `None` uses the stored filter toggle
    pub async fn results(&self, show_only_actionable: Option<bool>) -> Result<ResultsPage, RepackError> {
        self.request(|reply| Command::Results {
            show_only_actionable,
            reply,
        })
        .await
    }
}
