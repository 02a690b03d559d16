//! Vehicle transit - zone-to-zone traffic counting
//!
//! Reads per-frame detection batches (JSON lines), counts which zone each
//! vehicle entered from and which zone it left through, and publishes the
//! results to an MQTT topic.
//!
//! Module structure:
//! - `domain/` - Zone catalog, upstream detections, display snapshots
//! - `services/` - Transit aggregator, crossing matrix, frame ingest
//! - `io/` - Telemetry publisher, topic bootstrap, batch reader
//! - `infra/` - Config, delivery metrics, embedded broker

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use vehicle_transit::infra::Config;
use vehicle_transit::io::{BatchSource, LogEventHandler, TelemetryEmitter, TelemetryPublisher};
use vehicle_transit::services::{ingest_batch, ZoneTransitAggregator};

/// Vehicle transit - entry/exit zone counting with MQTT telemetry
#[derive(Parser, Debug)]
#[command(name = "vehicle-transit", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,

    /// Detection batches as JSON lines ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    input: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: INFO, use RUST_LOG=debug for per-frame snapshots
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = %env!("CARGO_PKG_VERSION"), git_hash = %env!("GIT_HASH"), "vehicle_transit_starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        endpoint = %config.broker_endpoint(),
        topic = %config.broker_topic(),
        zones = ?config.zone_catalog().labels(),
        policy = ?config.crossing_policy(),
        matrix_interval_secs = %config.matrix_interval_secs(),
        "config_loaded"
    );

    if config.embedded_broker_enabled() {
        vehicle_transit::infra::broker::start_embedded_broker(
            config.embedded_broker_bind_address(),
            config.embedded_broker_port(),
        )?;
        // Give the listener time to bind before connecting to it
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let publisher = TelemetryPublisher::open_with(config.publisher_config(), LogEventHandler)
        .await
        .with_context(|| format!("failed to open publisher on {}", config.broker_endpoint()))?;
    info!(
        endpoint = %publisher.endpoint(),
        topic = %publisher.topic(),
        bootstrap = %publisher.bootstrap_outcome().as_str(),
        "publisher_opened"
    );
    let emitter = TelemetryEmitter::new(publisher.sender());

    let mut source = BatchSource::open(&args.input)
        .await
        .with_context(|| format!("failed to open input {}", args.input.display()))?;

    // Create shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let mut aggregator = ZoneTransitAggregator::with_policy(config.zone_catalog().clone(), config.crossing_policy());
    let matrix_period = match config.matrix_interval_secs() {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let mut matrix_tick = tokio::time::interval(matrix_period.unwrap_or(Duration::from_secs(3600)));
    matrix_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick fires immediately
    matrix_tick.tick().await;

    let mut batches: u64 = 0;
    let mut skipped: usize = 0;

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = matrix_tick.tick(), if matrix_period.is_some() => {
                emitter.send_matrix(&aggregator.snapshot(), aggregator.tracked_objects());
            }
            next = source.next_batch() => {
                let batch = match next {
                    Ok(Some(batch)) => batch,
                    Ok(None) => {
                        info!(batches = %batches, "input_exhausted");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "input_read_failed");
                        break;
                    }
                };

                batches += 1;
                let report = ingest_batch(&mut aggregator, &batch);
                skipped += report.skipped;

                for snapshot in &report.snapshots {
                    debug!(
                        frame = %snapshot.frame_num,
                        source = %snapshot.source_id,
                        vehicles = %snapshot.vehicle_count,
                        regions = %snapshot.region_line,
                        overlay = ?snapshot.overlay_lines(),
                        "frame_snapshot"
                    );
                }

                if config.publish_transits() {
                    for transit in &report.transits {
                        emitter.send_transit(transit);
                    }
                }
            }
        }
    }

    let view = aggregator.snapshot();
    if !emitter.send_matrix(&view, aggregator.tracked_objects()) {
        warn!("final_matrix_not_published");
    }
    if config.print_matrix() {
        println!("{}", view);
    }

    publisher.close().await;
    let stats = emitter.stats();

    info!(
        batches = %batches,
        malformed = %source.malformed(),
        skipped = %skipped,
        transits = %view.total(),
        tracked = %aggregator.tracked_objects(),
        enqueued = %stats.enqueued,
        enqueue_failed = %stats.enqueue_failed,
        delivered = %stats.delivered,
        "vehicle_transit_shutdown_complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_precedence() {
        // Single test so no other test races on CONFIG_FILE
        std::env::set_var("CONFIG_FILE", "config/site.toml");
        let args = Args::try_parse_from(["vehicle-transit"]).unwrap();
        assert_eq!(args.config, "config/site.toml");

        let args = Args::try_parse_from(["vehicle-transit", "--config", "other.toml"]).unwrap();
        assert_eq!(args.config, "other.toml");

        std::env::remove_var("CONFIG_FILE");
        let args = Args::try_parse_from(["vehicle-transit"]).unwrap();
        assert_eq!(args.config, "config/dev.toml");
        assert_eq!(args.input, PathBuf::from("-"));
    }
}
