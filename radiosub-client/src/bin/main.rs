use futures::StreamExt;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use radiosub_client::{ClientConfig, ClientNode, ClientSession, Reading};
use radiosub_proto::link::UdpLink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ClientConfig::from_env().map_err(|e| {
        log::error!("Invalid client configuration: {e:}");
        e
    })?;
    log::info!("Starting client {:?}", config);

    let link = UdpLink::bind(config.node_id, config.base_port).await?;
    let session = ClientSession::new(
        config.node_id,
        config.topics,
        config.schedule,
        StdRng::from_entropy(),
    );
    let node = ClientNode::new(session, Arc::new(link), config.publish_interval)?;

    let (readings_tx, readings_rx) = tokio::sync::mpsc::unbounded_channel::<Reading>();
    let mut readings = UnboundedReceiverStream::new(readings_rx);
    let printer = tokio::spawn(async move {
        while let Some(reading) = readings.next().await {
            log::info!(
                "Node {} reports {}: {}",
                reading.from,
                reading.topic,
                reading.value
            );
        }
    });

    tokio::select! {
        res = node.run(readings_tx) => res?,
        _ = tokio::signal::ctrl_c() => log::info!("Shutting down client {}", config.node_id),
    }

    printer.abort();
    Ok(())
}
