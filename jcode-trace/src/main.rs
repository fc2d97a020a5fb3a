use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use jcode_trace::configuration::Configuration;
use jcode_trace::event_processing::{process_queue, Collector, EventConsumer};
use jcode_trace::{Args, LogSender, Metrics};
use log::{info, warn};
use tokio::{signal, time};

/// Multiple of the poll timeout after which the poll thread counts as stalled.
const STALE_HEARTBEAT_FACTOR: u32 = 20;

// The consumer future is not `Send`, so everything runs on one thread and the
// event loop is driven in place rather than spawned.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut builder = Configuration::builder();
    if let Some(path) = &args.config {
        builder = builder.from_config_file(path)?;
    }
    let config = builder.from_environment()?.from_args(&args).build()?;

    let default_filter = if config.is_verbose() { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let metrics = Arc::new(Metrics::new());
    let (sink, rx) = process_queue(config.collector.queue_capacity, metrics.clone());
    let sender = LogSender::from_config(&config.sender, metrics.clone())?;
    let mut collector = Collector::start(&config.collector, sink)?;
    info!("Forwarding events to {}", config.sender.base_url);

    let consumer = EventConsumer::new(rx, sender, metrics.clone()).run();
    tokio::pin!(consumer);

    let run_limit = async {
        match config.duration() {
            Some(duration) => time::sleep(duration).await,
            None => pending::<()>().await,
        }
    };
    tokio::pin!(run_limit);

    let mut metrics_tick = time::interval(config.output.metrics_interval());
    metrics_tick.tick().await;
    let stale_after = config.collector.poll_timeout() * STALE_HEARTBEAT_FACTOR;

    loop {
        tokio::select! {
            processed = &mut consumer => {
                warn!("Event loop ended unexpectedly after {} records", processed);
                collector.stop();
                log_metrics(&metrics);
                return Ok(());
            }
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl-C, shutting down");
                break;
            }
            _ = &mut run_limit => {
                info!("Run duration elapsed, shutting down");
                break;
            }
            _ = metrics_tick.tick() => {
                if !collector.is_running() {
                    warn!("Collector poll thread is not running");
                }
                check_poll_heartbeat(&metrics, stale_after);
                log_metrics(&metrics);
            }
        }
    }

    collector.stop();
    let drain_timeout = config.runtime.drain_timeout();
    match time::timeout(drain_timeout, &mut consumer).await {
        Ok(processed) => info!("Drained event queue ({} records total)", processed),
        Err(_) => warn!("Event queue not drained within {:?}", drain_timeout),
    }
    log_metrics(&metrics);

    Ok(())
}

fn log_metrics(metrics: &Metrics) {
    match serde_json::to_string(&metrics.snapshot()) {
        Ok(snapshot) => info!("metrics {}", snapshot),
        Err(e) => warn!("failed to serialize metrics: {}", e),
    }
}

fn check_poll_heartbeat(metrics: &Metrics, stale_after: Duration) {
    if let Some(age) = metrics.poll_heartbeat.age() {
        if age > stale_after {
            warn!("Poll thread heartbeat is stale ({:?} old)", age);
        }
    }
}
