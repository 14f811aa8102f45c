use std::time::Duration;

use radiosub_client::Schedule;
use radiosub_coordinator::{CoordinatorConfig, GetStats, Members};
use radiosub_proto::{NodeId, Topic, TopicSet};
use radiosub_tests::{ClientSpec, SimNetwork};

// Simulated run length in seconds, overridable with RADIOSUB_SIM_SECS
const DEFAULT_SIM_SECS: u64 = 10;

#[actix::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let sim_secs = std::env::var("RADIOSUB_SIM_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SIM_SECS);

    // Each client listens to one topic and publishes all of them in turn
    let clients: Vec<ClientSpec> = NodeId::clients()
        .enumerate()
        .map(|(i, id)| ClientSpec {
            id,
            topics: Topic::from_index(i % Topic::ALL.len())
                .map(TopicSet::of)
                .unwrap_or_else(TopicSet::all),
            schedule: Schedule::RoundRobin,
        })
        .collect();

    log::info!("Initializing simulated mesh with {} clients", clients.len());

    let mut net = SimNetwork::start(
        CoordinatorConfig::default(),
        &clients,
        Duration::from_millis(250),
        0,
    )
    .map_err(|e| {
        log::error!("Error starting simulated mesh {e:}");
        e
    })?;

    tokio::time::sleep(Duration::from_secs(sim_secs)).await;

    for client in &clients {
        if let Some(readings) = net.readings(client.id) {
            let mut received = 0;
            while readings.try_recv().is_ok() {
                received += 1;
            }
            log::info!(
                "Node {} ({:?}) received {received} readings",
                client.id,
                client.topics
            );
        }
    }

    let addr = net.coordinator();
    for topic in Topic::ALL {
        let members = addr.send(Members(topic)).await?;
        log::info!("{topic} subscribers {members:?}");
    }
    log::info!("Dispatch stats {:?}", addr.send(GetStats).await?);

    Ok(())
}
