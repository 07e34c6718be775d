use log::{error, info, warn};
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};

use rust_telemetry_node::assembler::assemble;
use rust_telemetry_node::clock::{Clock, SystemClock};
use rust_telemetry_node::config::NodeConfig;
use rust_telemetry_node::delivery::{
    Backoff, DeliveryBuffer, HttpsTransport, Outcome, Transport, Uploader,
};
use rust_telemetry_node::models::DeviceIdentity;
use rust_telemetry_node::sensors::{SensorCache, SensorSource, SysfsSensors};
use rust_telemetry_node::utils::{format_reading, format_timestamp};

/// Sampler ticks between raw-reading log lines
const RAW_LOG_EVERY_TICKS: u32 = 10;

/// State shared by the periodic tasks
struct Node {
    cache: SensorCache,
    buffer: DeliveryBuffer,
    identity: DeviceIdentity,
    clock: Box<dyn Clock>,
    source: Box<dyn SensorSource>,
    transport: Box<dyn Transport>,
    uploader: Uploader,
}

/// Keep sensor values fresh
async fn sampler_task(node: Arc<Node>, config: Arc<NodeConfig>) {
    let mut ticker = interval(config.sample_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut log_ctr = 0;

    loop {
        ticker.tick().await;
        node.cache.tick(node.source.as_ref());

        log_ctr += 1;
        if log_ctr >= RAW_LOG_EVERY_TICKS {
            info!("Raw: {}", format_reading(&node.cache.latest()));
            log_ctr = 0;
        }
    }
}

/// Build one sample per period and buffer it
async fn publisher_task(node: Arc<Node>, config: Arc<NodeConfig>) {
    let mut ticker = interval(config.publish_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; give the sampler a period to fill the cache
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let sample = assemble(&node.cache, node.clock.as_ref(), &node.identity);

        info!(
            "[{}] Temp={:.2}C Lux={:.1} Motion={} {}/{}",
            format_timestamp(&sample.local_time),
            sample.temperature_c,
            sample.illuminance_lux,
            sample.motion,
            sample.device_building,
            sample.device_number
        );
        if !sample.local_time.is_synced() {
            warn!("Clock not synchronized - sample marked UNSYNCED");
        }

        // The buffer logs and counts the drop itself
        node.buffer.append(sample);
    }
}

/// Push buffered samples to the collector
async fn sender_task(node: Arc<Node>, config: Arc<NodeConfig>) {
    let mut ticker = interval(config.upload_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut backoff = Backoff::new(config.max_backoff_cycles());
    let mut dropped_reported = 0;

    loop {
        ticker.tick().await;

        if !backoff.ready() {
            info!(
                "Backing off after {} failed upload(s), {} sample(s) buffered",
                backoff.consecutive_failures(),
                node.buffer.len()
            );
            continue;
        }

        let outcome = node
            .uploader
            .send_cycle(&node.buffer, node.transport.as_ref())
            .await;

        let dropped_total = node.buffer.dropped();
        let dropped_now = dropped_total - dropped_reported;
        dropped_reported = dropped_total;
        let sent = match &outcome {
            Outcome::Sent(n) => *n,
            Outcome::Empty | Outcome::Failed(_) => 0,
        };

        if !matches!(outcome, Outcome::Empty) || dropped_now > 0 {
            info!(
                "Upload cycle: sent={} dropped={} buffered={}/{}",
                sent,
                dropped_now,
                node.buffer.len(),
                node.buffer.capacity()
            );
        }

        backoff.record(&outcome);
    }
}

async fn main_loop(config: NodeConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting telemetry node {}/{}", config.identity.building(), config.identity.number());

    let transport = HttpsTransport::new(
        config.request_timeout,
        config.ca_cert_path.as_deref(),
        config.require_https,
    )?;
    let clock = SystemClock::new(config.tz_rule.clone());
    let now = time::OffsetDateTime::now_utc();
    info!(
        "Timezone set to {} (UTC{})",
        clock.tz().name_at(now),
        clock.tz().offset_at(now)
    );
    if !clock.is_synchronized() {
        warn!("System clock not synchronized yet - samples will be marked UNSYNCED");
    }

    let node = Arc::new(Node {
        cache: SensorCache::new(),
        buffer: DeliveryBuffer::new(config.buffer_capacity),
        identity: config.identity.clone(),
        clock: Box::new(clock),
        source: Box::new(SysfsSensors::new(
            config.temperature_path.clone(),
            config.illuminance_path.clone(),
            config.motion_path.clone(),
        )),
        transport: Box::new(transport),
        uploader: Uploader::new(config.collector_url.clone(), config.request_timeout)
            .with_payload_logging(config.log_payload),
    });
    info!(
        "Uploading to {} every {:?}, buffer capacity {}",
        node.uploader.endpoint(),
        config.upload_interval,
        node.buffer.capacity()
    );

    let config = Arc::new(config);
    let sampler = tokio::spawn(sampler_task(Arc::clone(&node), Arc::clone(&config)));
    let publisher = tokio::spawn(publisher_task(Arc::clone(&node), Arc::clone(&config)));
    let sender = tokio::spawn(sender_task(Arc::clone(&node), Arc::clone(&config)));

    // The loops never return; a join result here means a task panicked
    tokio::select! {
        r = sampler => r?,
        r = publisher => r?,
        r = sender => r?,
    }

    let stats = node.cache.stats();
    error!(
        "Pipeline task stopped (temperature failures={}, illuminance failures={})",
        stats.temperature_failures, stats.illuminance_failures
    );
    Err("pipeline task stopped".into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match NodeConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                // Keep the sender alive so the node is not mistaken for shut down
                std::future::pending::<()>().await;
                drop(tx);
            }
        }
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(config) => {
            match result {
                Ok(_) => info!("Telemetry node stopped"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
