use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::wrappers::UnboundedReceiverStream;

use radiosub_coordinator::{MonitorId, MonitorSubscribe};
use radiosub_proto::{link::UdpLink, NodeId};
use radiosubd::{
    config::DaemonConfig,
    relay_log::{relay_log_process, RelayLog},
    stats::report_stats,
    RadiosubdResult,
};
use tracing_appender::rolling;
use tracing_subscriber::FmtSubscriber;

use tracing_log::LogTracer;

const RELAY_MONITOR_ID: MonitorId = 0;

#[actix::main]
async fn main() -> RadiosubdResult<()> {
    let config = DaemonConfig::load()?;

    LogTracer::init()?;

    let log = rolling::daily(&config.log_dir, "radiosubd");
    let (nb, _guard) = tracing_appender::non_blocking(log);

    let sub = FmtSubscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(nb)
        .finish();

    tracing::subscriber::set_global_default(sub)?;
    log::info!("Starting radiosubd with {config:?}");

    let link = UdpLink::bind(NodeId::COORDINATOR, config.base_port).await?;
    let handle = radiosub_coordinator::coordinator(config.coordinator_config(), Arc::new(link))
        .map_err(|e| {
            log::error!("Error creating coordinator & handle {e:}");
            e
        })?;

    if let Some(path) = &config.relay_log {
        let relay_log = RelayLog::open(path)?;
        let (frames_tx, frames_rx) = unbounded_channel();
        handle
            .addr()
            .send(MonitorSubscribe {
                id: RELAY_MONITOR_ID,
                frames: frames_tx,
            })
            .await
            .map_err(|e| {
                log::error!("Error sending relay monitor subscribe request {e:}");
                e
            })??;
        tokio::spawn(relay_log_process(
            UnboundedReceiverStream::new(frames_rx),
            relay_log,
        ));
    }

    if let Some(every) = config.stats_interval() {
        tokio::spawn(report_stats(handle.addr(), every));
    }

    tokio::select! {
        res = handle.run() => {
            res.map_err(|e| {
                log::error!("Coordinator exited with error {e:}");
                e
            })?;
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutting down radiosubd");
        }
    }

    Ok(())
}
