use std::sync::Arc;

use radiosub_coordinator::{CoordinatorConfig, GetStats, MonitorSubscribe};
use radiosub_proto::{link::UdpLink, NodeId};

const DEFAULT_BASE_PORT: u16 = 47000;

#[actix::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let base_port = std::env::var("RADIOSUB_BASE_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_BASE_PORT);

    log::info!("Initializing coordinator on base port {base_port}");

    let link = UdpLink::bind(NodeId::COORDINATOR, base_port).await?;
    let handle = radiosub_coordinator::coordinator(CoordinatorConfig::default(), Arc::new(link))
        .map_err(|e| {
            log::error!("Error creating coordinator & handle {e:}");
            e
        })?;

    let (frames_tx, mut frames_rx) = tokio::sync::mpsc::unbounded_channel();

    handle
        .addr()
        .send(MonitorSubscribe {
            id: 0,
            frames: frames_tx,
        })
        .await
        .map_err(|e| {
            log::error!("Error sending monitor subscribe request {e:}");
            e
        })??;

    // Start clients separately, e.g. RADIOSUB_NODE_ID=3 radiosub-client
    tokio::spawn(async move {
        while let Some(relayed) = frames_rx.recv().await {
            log::info!("Relayed from node {}: {:?}", relayed.src, relayed.message);
        }
    });

    let addr = handle.addr();
    tokio::select! {
        res = handle.run() => res?,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Dispatch stats {:?}", addr.send(GetStats).await?);
        }
    }

    Ok(())
}
