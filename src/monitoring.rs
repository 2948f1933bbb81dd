use crate::error::DriftwireError;
use anyhow::Result;
use metrics::{Counter, Gauge, counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, sync::LazyLock};
use tracing::{error, info};

// Global metrics
pub static ENVELOPES_RECEIVED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("driftwire_envelopes_received_total"));
pub static MESSAGES_RECEIVED_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("driftwire_messages_received_total"));
pub static COMMANDS_SENT_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("driftwire_commands_sent_total"));
pub static DROPPED_FRAMES_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("driftwire_dropped_frames_total"));
pub static RECONNECT_COUNTER: LazyLock<Counter> =
    LazyLock::new(|| counter!("driftwire_reconnects_total"));
pub static PUSH_CONNECTED_GAUGE: LazyLock<Gauge> =
    LazyLock::new(|| gauge!("driftwire_push_connected"));
pub static DUPLEX_CONNECTED_GAUGE: LazyLock<Gauge> =
    LazyLock::new(|| gauge!("driftwire_duplex_connected"));

pub async fn setup_metrics(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", "driftwire")
        .add_global_label("version", env!("CARGO_PKG_VERSION"));

    match builder.install() {
        Ok(_handle) => {
            info!(
                "Prometheus metrics server started on http://{}/metrics",
                addr
            );

            // Initialize metrics with default values
            ENVELOPES_RECEIVED_COUNTER.absolute(0);
            MESSAGES_RECEIVED_COUNTER.absolute(0);
            COMMANDS_SENT_COUNTER.absolute(0);
            DROPPED_FRAMES_COUNTER.absolute(0);
            RECONNECT_COUNTER.absolute(0);
            PUSH_CONNECTED_GAUGE.set(0.0);
            DUPLEX_CONNECTED_GAUGE.set(0.0);

            Ok(())
        }
        Err(e) => {
            error!("Failed to start metrics server: {}", e);
            Err(DriftwireError::MetricsError(e.to_string()).into())
        }
    }
}
