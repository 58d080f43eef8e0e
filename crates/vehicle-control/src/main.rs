//! Vehicle Control - Main Entry Point

use anyhow::Context;
use companion_link::CompanionLink;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::{error, info};
use vehicle_control::{init_logging, run, VehicleConfig, DEFAULT_CONFIG_PATH};
use vehicle_link::SerialLink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = VehicleConfig::load(&path).with_context(|| format!("loading {}", path))?;

    init_logging(config.level()?)?;

    info!("=== Vehicle Control v{} ===", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing the Prometheus exporter")?;
        info!("Metrics exported on {}", addr);
    }

    let receiver_link = SerialLink::open(&config.receiver.serial())?;
    let vesc_link = SerialLink::open(&config.vesc.serial())?;
    let (companion, companion_events) = CompanionLink::start(&config.companion);

    let result = run(
        &config,
        receiver_link,
        vesc_link,
        Arc::new(companion.clone()),
        companion_events,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Unable to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        },
    )
    .await;

    companion.disconnect().await;
    result
}
