use std::time::Duration;

use anyhow::Result;
use dsmr_logger::{
    clock::SystemClock,
    config::AppConfig,
    network::TcpProbeLink,
    observability,
    publishers::DisplayPublisher,
    sources::{FileTelegramSource, P1Decoder, TelegramIngest},
    store::{self, DirStorage, RingSet},
    LoggerState, Scheduler,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;
    tracing::info!(host = %cfg.hostname, data_dir = %cfg.data_dir.display(), "starting");

    // Start metrics server if configured
    #[cfg(feature = "prometheus")]
    if let Some(metrics_cfg) = &cfg.metrics {
        dsmr_logger::metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let mut storage = DirStorage::open(&cfg.data_dir)?;
    let reboots = store::record_boot(&mut storage).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "boot counter not updated");
        0
    });
    tracing::info!(reboots, "boot recorded");

    let mut state = LoggerState::new(RingSet::new(storage), reboots);
    state.hydrate();

    let ingest = TelegramIngest::new(
        Box::new(FileTelegramSource::new(&cfg.telegram.source_path)),
        Box::new(P1Decoder::new(cfg.telegram.require_crc)),
    );
    let clock = SystemClock::new(cfg.fallback_offset()?);

    let mut scheduler = Scheduler::new(Box::new(clock), ingest, state, &cfg.timers)
        .with_display(Box::new(DisplayPublisher::new(cfg.hostname.clone())));

    #[cfg(feature = "json-export")]
    if let Some(export) = &cfg.export {
        scheduler = scheduler.with_publisher(Box::new(
            dsmr_logger::publishers::JsonExportPublisher::new(cfg.hostname.clone(), &export.path),
        ));
    }

    #[cfg(feature = "prometheus")]
    if cfg.metrics.is_some() {
        scheduler = scheduler.with_publisher(Box::new(dsmr_logger::publishers::MetricsPublisher));
    }

    if let Some(net) = &cfg.network {
        scheduler = scheduler.with_network(
            Box::new(TcpProbeLink::new(net.probe_addr.clone())),
            Duration::from_secs(net.connect_timeout_secs),
        );
    }

    // A fatal error exits non-zero; the supervisor restarts us and the rings
    // are reloaded from disk.
    scheduler.run().await?;

    Ok(())
}
