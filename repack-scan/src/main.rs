//! Comic repack service (repack-scan) - Main entry point
//!
//! Scans a comic library for archives readers cannot open (RAR5, solid) and
//! repacks them as `.cbz`, driven over HTTP with live progress on SSE.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use repack_common::events::EventBus;
use repack_scan::config::{env_filter_or, load_service_config, CliOverrides};
use repack_scan::engine::{
    ArchiveAnalyzer, DirectorySelector, PresetDirectory, SevenZip, SevenZipConverter,
    WalkdirScanEngine,
};
use repack_scan::services::{FolderSelector, RepackService};
use repack_scan::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for repack-scan
#[derive(Parser, Debug)]
#[command(name = "repack-scan")]
#[command(about = "Comic archive scan and repack service")]
#[command(version)]
struct Args {
    /// Comic library folder to preselect
    #[arg(short, long)]
    root_folder: Option<String>,

    /// Address to bind
    #[arg(long)]
    bind_address: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// 7-Zip command line binary
    #[arg(long)]
    seven_zip: Option<PathBuf>,

    /// Seconds to wait for a scan to confirm cancellation
    #[arg(long)]
    cancel_timeout_secs: Option<u64>,

    /// Conversions allowed to run at once
    #[arg(long)]
    conversion_workers: Option<usize>,

    /// Write converted archives here instead of next to the source
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Config file (default: platform config dir)
    #[arg(short, long, env = "REPACK_CONFIG")]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            root_folder: self.root_folder.clone(),
            bind_address: self.bind_address.clone(),
            port: self.port,
            seven_zip_path: self.seven_zip.clone(),
            cancel_timeout_secs: self.cancel_timeout_secs,
            conversion_workers: self.conversion_workers,
            output_dir: self.output_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_service_config(&args.overrides(), args.config.as_deref())
        .context("Invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(env_filter_or(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting repack-scan v{}", env!("CARGO_PKG_VERSION"));
    info!("7-Zip binary: {}", config.seven_zip_path.display());

    let seven_zip = SevenZip::new(config.seven_zip_path.clone());
    let analyzer: Arc<dyn ArchiveAnalyzer> = Arc::new(seven_zip.clone());
    let scan_engine = Arc::new(WalkdirScanEngine::new(analyzer, &config.archive_extensions));
    let converter = Arc::new(SevenZipConverter::new(
        seven_zip,
        config.temp_dir.clone(),
        config.output_dir.clone(),
    ));

    let event_bus = EventBus::new(config.event_capacity);
    let handle = RepackService::spawn(
        config.service_settings(),
        scan_engine,
        converter,
        event_bus.clone(),
    );
    let state = AppState::new(handle.clone(), event_bus);

    // Preselect the configured folder, if any
    if let Some(folder) = PresetDirectory::new(config.root_folder.clone()).pick() {
        match FolderSelector::validate(&folder) {
            Ok(folder) => {
                handle
                    .select_folder(folder.clone())
                    .await
                    .context("Failed to select startup folder")?;
                info!("Root folder: {}", folder.display());
            }
            Err(e) => {
                warn!("Ignoring configured root folder: {}", e);
                state.record_error(e.to_string()).await;
            }
        }
    }

    let app = build_router(state);

    let addr = config.listen_address();
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
