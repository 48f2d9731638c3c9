//! Prometheus exporter for countergate counters.
//!
//! The standalone binary only serves the exporter's own delivery statistics.
//! Application counters reach the endpoints when an aggregation engine embeds
//! the library and hands its buffer over as a
//! [`CounterStore`](countergate_common::CounterStore).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use countergate_common::{MemoryCounterStore, SharedCounterStore};
use countergate_exporter::{
    DeliveryStats, ExporterConfig, HttpServer, PullDelivery, PushSink, PushTask,
};

/// How often the exporter records its own delivery statistics.
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Prometheus exporter for countergate counters.
#[derive(Parser, Debug)]
#[command(name = "countergate-exporter")]
#[command(about = "Expose countergate counters to Prometheus by scrape or Pushgateway")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides config.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    if let Some(listen) = args.listen {
        config.http.listen = listen;
        config.validate()?;
    }

    // Initialize logging
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    countergate_common::init_tracing(&config.logging)?;

    info!("Starting countergate Prometheus exporter");

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Holds the self-instrumentation counters only.
    let memory = Arc::new(MemoryCounterStore::new());
    let store: SharedCounterStore = memory.clone();
    let stats = Arc::new(DeliveryStats::new());

    // Publish exporter statistics into the store
    let stats_store = memory.clone();
    let stats_source = stats.clone();
    let mut stats_shutdown = shutdown_rx.clone();
    let stats_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    stats_source.publish(&stats_store);
                }
                changed = stats_shutdown.changed() => {
                    if changed.is_err() || *stats_shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });

    // Start HTTP server
    let http_task = if config.http.enabled {
        let listen_addr = config
            .http
            .listen
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;
        let delivery = PullDelivery::new(
            Some(store.clone()),
            config.source.clone(),
            config.instance.clone(),
        )
        .with_stats(stats.clone());
        let http_server = HttpServer::new(delivery, listen_addr, config.http.clone());
        let http_shutdown = shutdown_rx.clone();

        Some(tokio::spawn(async move {
            if let Err(e) = http_server.run(http_shutdown).await {
                error!("HTTP server error: {}", e);
            }
        }))
    } else {
        info!("Scrape endpoints disabled");
        None
    };

    // Start push task
    let push_task = if config.push.enabled {
        let sink = PushSink::new(
            config.push.clone(),
            config.source.clone(),
            config.instance.clone(),
        )
        .with_stats(stats.clone());
        let task = PushTask::new(sink, store.clone(), config.push.interval());
        Some(tokio::spawn(task.run(shutdown_rx.clone())))
    } else {
        info!("Pushgateway delivery disabled");
        None
    };

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        error!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for tasks to complete
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        if let Some(task) = http_task {
            let _ = task.await;
        }
        if let Some(task) = push_task {
            let _ = task.await;
        }
        let _ = stats_task.await;
    })
    .await;

    // Print final stats
    let stats = stats.snapshot();
    info!(
        scrapes = stats.scrapes,
        resets = stats.resets,
        pushes_sent = stats.pushes_sent,
        pushes_failed = stats.pushes_failed,
        pushes_skipped = stats.pushes_skipped,
        counters = memory.len(),
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}
