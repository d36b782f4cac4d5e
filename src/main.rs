//! bin-atlas - ingestion and mosaic rendering for sample bin collections.
//!
//! This binary wires the catalog, the fileset source, and the dashboard
//! service behind two subcommands: `sync` and `mosaic`.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bin_atlas::{
    accession::{CancellationToken, Control, SyncOptions},
    config::{Cli, Command, MosaicConfig, SyncConfig},
    mosaic::PageShape,
    service::{Dashboard, DashboardConfig},
    source::{FilesetSource, ScanSpec},
    store::{DataDirectory, MemoryKvStore, SqliteStore, Store},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Sync(config) => run_sync(config).await,
        Command::Mosaic(config) => run_mosaic(config).await,
    }
}

// =============================================================================
// Sync Command
// =============================================================================

async fn run_sync(config: SyncConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let store: Arc<dyn Store> = match SqliteStore::open(&config.db) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open catalog {}: {}", config.db.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = register_directories(store.as_ref(), &config) {
        error!("Failed to register directories: {}", e);
        return ExitCode::FAILURE;
    }
    let directories = match store.directories(&config.dataset) {
        Ok(dirs) => dirs,
        Err(e) => {
            error!("Failed to list data directories: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if directories.is_empty() {
        error!(
            "Dataset {} has no data directories; pass at least one --dir",
            config.dataset
        );
        return ExitCode::FAILURE;
    }
    info!(
        dataset = %config.dataset,
        directories = directories.len(),
        "starting sync"
    );

    let roots: Vec<ScanSpec> = directories.iter().map(|d| d.scan_spec()).collect();
    let dashboard = Dashboard::new(
        store,
        Arc::new(MemoryKvStore::new()),
        FilesetSource::new(roots),
    );

    // ctrl-c flips the token; the sync stops at the next batch boundary
    let cancel = CancellationToken::new();
    let ctrlc_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing the current batch");
            ctrlc_token.cancel();
        }
    });

    let options = SyncOptions {
        batch_size: config.batch_size,
        newest_only: config.newest_only,
        latitude: config.latitude,
        longitude: config.longitude,
        depth: config.depth,
    };
    let dataset = config.dataset.clone();
    let result = tokio::task::spawn_blocking(move || {
        dashboard.sync(
            &dataset,
            options,
            &mut |summary| {
                info!(
                    total = summary.total,
                    added = summary.added,
                    existing = summary.existing,
                    bad = summary.bad,
                    last = summary.last_pid.as_deref().unwrap_or("-"),
                    "batch committed"
                );
                Control::Continue
            },
            &cancel,
        )
    })
    .await;

    let summary = match result {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            error!("Sync failed: {}", e);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("Sync task lost: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        total = summary.total,
        added = summary.added,
        existing = summary.existing,
        bad = summary.bad,
        errors = summary.errors.len(),
        "sync summary"
    );
    for (pid, message) in &summary.errors {
        warn!(%pid, %message, "sample rejected");
    }
    ExitCode::SUCCESS
}

fn register_directories(
    store: &dyn Store,
    config: &SyncConfig,
) -> Result<(), bin_atlas::error::StoreError> {
    store.create_dataset(&config.dataset, &config.dataset)?;
    let known = store.directories(&config.dataset)?;
    for (i, path) in config.directories.iter().enumerate() {
        if known.iter().any(|d| &d.path == path) {
            continue;
        }
        let mut directory = DataDirectory::raw(path.clone());
        directory.priority = known.len() as i32 + i as i32 + 1;
        store.add_directory(&config.dataset, &directory)?;
        info!(path = %path.display(), "registered data directory");
    }
    Ok(())
}

// =============================================================================
// Mosaic Command
// =============================================================================

async fn run_mosaic(config: MosaicConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let store: Arc<dyn Store> = match SqliteStore::open(&config.db) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open catalog {}: {}", config.db.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let roots = match store.directories(&config.dataset) {
        Ok(dirs) => dirs.iter().map(|d| d.scan_spec()).collect(),
        Err(e) => {
            error!("Failed to list data directories: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let dashboard = Dashboard::with_config(
        store,
        Arc::new(MemoryKvStore::new()),
        FilesetSource::new(roots),
        DashboardConfig {
            page_shape: PageShape::new(config.width, config.height),
            scale: config.scale,
            bg_color: config.bg_color,
            max_pages: config.max_pages,
            ..DashboardConfig::default()
        },
    );

    let shape = PageShape::new(config.width, config.height);
    let canvas = match dashboard
        .render_mosaic_page(&config.pid, config.page, shape, config.scale, config.bg_color)
        .await
    {
        Ok(canvas) => canvas,
        Err(e) => {
            error!("Failed to render mosaic: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = canvas.save(&config.out) {
        error!("Failed to write {}: {}", config.out.display(), e);
        return ExitCode::FAILURE;
    }
    info!(
        pid = %config.pid,
        page = config.page,
        out = %config.out.display(),
        "mosaic page written"
    );
    ExitCode::SUCCESS
}

// =============================================================================
// Logging
// =============================================================================

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "bin_atlas=debug"
    } else {
        "bin_atlas=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
