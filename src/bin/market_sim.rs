//! Havven Market Simulator
//!
//! Runs independent replicas of the agent-based market simulation in
//! parallel and reports on every market.
//!
//! Usage: `market_sim [config.json]`. Log verbosity follows `RUST_LOG`.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use havven_orderbook::{
    metrics::{exporters::install_prometheus, MetricsReporter},
    orderbook::BookSnapshot,
    OrderBookMetrics, Simulation, SimulationConfig, SimulationReport,
};

type BoxError = Box<dyn Error + Send + Sync>;

/// What one replica leaves behind
struct ReplicaOutcome {
    report: SimulationReport,
    snapshots: Vec<BookSnapshot>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading configuration from {}", path);
            SimulationConfig::from_file(&path)?
        }
        None => SimulationConfig::default(),
    };

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!(
        "Starting market simulation {} at {}: {} replicas x {} ticks, seed {}",
        run_id, started_at, config.replicas, config.ticks, config.seed
    );

    if let Some(listen) = config.metrics.prometheus_listen {
        install_prometheus(listen)?;
    }

    let metrics = Arc::new(OrderBookMetrics::new());
    let reporter = MetricsReporter::new(
        Arc::clone(&metrics),
        Duration::from_secs(config.metrics.report_interval_secs),
    );
    let reporter_task = tokio::spawn(async move {
        reporter.run().await;
    });

    let outcomes = tokio::task::spawn_blocking({
        let config = config.clone();
        let metrics = Arc::clone(&metrics);
        move || run_replicas(&config, &metrics)
    })
    .await?
    .map_err(|e| e as Box<dyn Error>)?;

    reporter_task.abort();
    MetricsReporter::new(Arc::clone(&metrics), Duration::ZERO).report();

    for outcome in &outcomes {
        log_report(run_id, started_at, &outcome.report);
    }

    if let (Some(path), Some(first)) = (&config.snapshot_path, outcomes.first()) {
        if let Err(e) = write_snapshots(path, &first.snapshots) {
            error!("Failed to write snapshots to {}: {}", path.display(), e);
            return Err(e);
        }
        info!("Wrote {} book snapshots to {}", first.snapshots.len(), path.display());
    }

    info!(
        "Simulation {} finished in {} ms",
        run_id,
        (Utc::now() - started_at).num_milliseconds()
    );
    Ok(())
}

/// Run every replica on the rayon pool, replica `i` seeded `seed + i`
fn run_replicas(
    config: &SimulationConfig,
    metrics: &Arc<OrderBookMetrics>,
) -> Result<Vec<ReplicaOutcome>, BoxError> {
    (0..config.replicas)
        .into_par_iter()
        .map(|replica| -> Result<ReplicaOutcome, BoxError> {
            let mut replica_config = config.clone();
            replica_config.seed = config.seed.wrapping_add(replica as u64);

            let mut simulation = Simulation::with_metrics(replica_config, Arc::clone(metrics))?;
            let report = simulation.run()?;
            let snapshots = simulation.exchange().snapshots();

            Ok(ReplicaOutcome { report, snapshots })
        })
        .collect()
}

fn log_report(run_id: Uuid, started_at: DateTime<Utc>, report: &SimulationReport) {
    info!(
        "[{} @ {}] seed {} | ticks {} | agents {} | submitted {} amended {} cancelled {} rejected {} missed {} | fills {}",
        run_id,
        started_at.format("%H:%M:%S"),
        report.seed,
        report.ticks,
        report.agents,
        report.stats.submitted,
        report.stats.amended,
        report.stats.cancelled,
        report.stats.rejected,
        report.stats.missed,
        report.stats.fills
    );

    for market in &report.markets {
        info!(
            "  {} | price {} | last {:?} | bid {:?} | ask {:?} | resting {} | volume {}",
            market.pair,
            market.rolling_price,
            market.last_trade_price,
            market.best_bid,
            market.best_ask,
            market.resting_orders,
            market.volume
        );
    }
}

fn write_snapshots(path: &Path, snapshots: &[BookSnapshot]) -> Result<(), Box<dyn Error>> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, snapshots)?;
    Ok(())
}
