//! Simulated radiosub network: a coordinator and any number of client
//! nodes sharing one in-process [`MemoryMedium`]

use actix::Addr;
use rand::{rngs::StdRng, SeedableRng};
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver},
    task::JoinHandle,
};

use radiosub_client::{ClientError, ClientNode, ClientSession, Reading, Schedule};
use radiosub_coordinator::{Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorHandle};
use radiosub_proto::{link::MemoryMedium, NodeId, TopicSet};

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Coordinator Error: {0}")]
    Coordinator(#[from] CoordinatorError),
    #[error("Client Error: {0}")]
    Client(#[from] ClientError),
}

#[derive(Debug, Clone, Copy)]
pub struct ClientSpec {
    pub id: NodeId,
    pub topics: TopicSet,
    pub schedule: Schedule,
}

pub struct SimNetwork {
    medium: MemoryMedium,
    coordinator: CoordinatorHandle,
    clients: Vec<JoinHandle<Result<(), ClientError>>>,
    readings: HashMap<NodeId, UnboundedReceiver<Reading>>,
}

impl SimNetwork {
    /// Start the coordinator and one task per client. Must be called from
    /// within a running actix system. Client rngs are seeded from `seed`
    /// and the client id, so runs are repeatable.
    pub fn start(
        config: CoordinatorConfig,
        clients: &[ClientSpec],
        publish_interval: Duration,
        seed: u64,
    ) -> Result<Self, SimError> {
        let medium = MemoryMedium::new();
        let coordinator = radiosub_coordinator::coordinator(
            config,
            Arc::new(medium.attach(NodeId::COORDINATOR)),
        )?;

        let mut tasks = Vec::with_capacity(clients.len());
        let mut readings = HashMap::new();
        for client in clients {
            let session = ClientSession::new(
                client.id,
                client.topics,
                client.schedule,
                StdRng::seed_from_u64(seed.wrapping_add(client.id.get() as u64)),
            );
            let node = ClientNode::new(session, Arc::new(medium.attach(client.id)), publish_interval)?;

            let (tx, rx) = unbounded_channel();
            readings.insert(client.id, rx);
            tasks.push(tokio::spawn(node.run(tx)));
            log::debug!("Started simulated client {}", client.id);
        }

        Ok(Self {
            medium,
            coordinator,
            clients: tasks,
            readings,
        })
    }

    pub fn coordinator(&self) -> Addr<Coordinator> {
        self.coordinator.addr()
    }

    pub fn medium(&self) -> &MemoryMedium {
        &self.medium
    }

    /// Readings forwarded to client `id`
    pub fn readings(&mut self, id: NodeId) -> Option<&mut UnboundedReceiver<Reading>> {
        self.readings.get_mut(&id)
    }
}

impl Drop for SimNetwork {
    fn drop(&mut self) {
        for client in &self.clients {
            client.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radiosub_coordinator::{GetNodeState, GetStats, Members, NodeState};
    use radiosub_proto::Topic;
    use tokio::{sync::mpsc::error::TryRecvError, time::timeout};

    #[actix::test]
    async fn reading_reaches_other_subscriber_only() {
        let mut net = SimNetwork::start(
            CoordinatorConfig::default(),
            &[
                ClientSpec {
                    id: NodeId(2),
                    topics: TopicSet::from_flags(&[1, 0, 0]),
                    schedule: Schedule::Fixed(Topic::Temperature),
                },
                ClientSpec {
                    id: NodeId(3),
                    topics: TopicSet::from_flags(&[1, 1, 0]),
                    schedule: Schedule::Fixed(Topic::Luminosity),
                },
            ],
            Duration::from_millis(20),
            42,
        )
        .expect("network");

        let reading = timeout(
            Duration::from_secs(2),
            net.readings(NodeId(3)).expect("client 3").recv(),
        )
        .await
        .expect("client 3 hears client 2")
        .expect("channel open");
        assert_eq!(reading.from, NodeId(2));
        assert_eq!(reading.topic, Topic::Temperature);
        assert!(reading.value <= Topic::Temperature.max_sample());

        // only client 2 publishes temperature, and never to itself
        assert!(net
            .readings(NodeId(2))
            .expect("client 2")
            .try_recv()
            .is_err());

        let addr = net.coordinator();
        assert_eq!(
            addr.send(Members(Topic::Humidity)).await.expect("mailbox"),
            vec![NodeId(3)]
        );
        // subscription order between the two tasks is not fixed
        let mut temperature = addr.send(Members(Topic::Temperature)).await.expect("mailbox");
        temperature.sort();
        assert_eq!(temperature, vec![NodeId(2), NodeId(3)]);
        assert!(matches!(
            addr.send(GetNodeState(NodeId(2))).await.expect("mailbox"),
            NodeState::Connected { .. }
        ));

        let stats = addr.send(GetStats).await.expect("mailbox");
        assert_eq!(stats.connects, 2);
        assert_eq!(stats.subscribes, 2);
        assert_eq!(stats.decode_errors(), 0);
    }

    #[actix::test]
    async fn detached_client_misses_readings() {
        let mut net = SimNetwork::start(
            CoordinatorConfig::default(),
            &[
                ClientSpec {
                    id: NodeId(4),
                    topics: TopicSet::empty(),
                    schedule: Schedule::Fixed(Topic::Humidity),
                },
                ClientSpec {
                    id: NodeId(5),
                    topics: TopicSet::HUMIDITY,
                    schedule: Schedule::Fixed(Topic::Temperature),
                },
            ],
            Duration::from_millis(20),
            7,
        )
        .expect("network");

        timeout(
            Duration::from_secs(2),
            net.readings(NodeId(5)).expect("client 5").recv(),
        )
        .await
        .expect("client 5 hears client 4")
        .expect("channel open");

        // the client stops once its link closes; frames already queued for
        // it may still surface as readings
        net.medium().detach(NodeId(5));
        let readings = net.readings(NodeId(5)).expect("client 5");
        timeout(Duration::from_secs(2), async {
            while readings.recv().await.is_some() {}
        })
        .await
        .expect("client 5 stops after detaching");

        let before = net.coordinator().send(GetStats).await.expect("mailbox");
        tokio::time::sleep(Duration::from_millis(100)).await;
        let after = net.coordinator().send(GetStats).await.expect("mailbox");

        // the coordinator keeps addressing client 5, which hears none of it
        assert!(after.publishes > before.publishes);
        assert!(after.deliveries > before.deliveries);
        assert!(matches!(
            net.readings(NodeId(5)).expect("client 5").try_recv(),
            Err(TryRecvError::Disconnected)
        ));
    }
}
