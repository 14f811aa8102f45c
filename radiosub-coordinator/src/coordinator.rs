use actix::prelude::*;
use std::{collections::HashMap, sync::Arc, time::Instant};
use thiserror::Error;
use tokio::{sync::mpsc::UnboundedSender, time::Duration};

use radiosub_proto::{
    decode_frame, encode_frame,
    link::{Link, LinkError},
    Channel, Destination, EncodedFrame, FrameError, Message, NodeId, Topic,
};

use crate::{
    DispatchError, DispatchStats, Dispatcher, LinkRouter, MonitorId, NodeState, RelayedFrame,
    DEFAULT_SWEEP_INTERVAL, DEFAULT_TIMEOUT,
};

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Frame Error: {0}")]
    Frame(#[from] FrameError),
    #[error("Dispatch Error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Link Error: {0}")]
    Link(#[from] LinkError),
    #[error("Actix mailbox Error")]
    MailError(#[from] MailboxError),
    #[error("Link pump task Error")]
    Join(#[from] tokio::task::JoinError),
    #[error("Link belongs to node {0}, not the coordinator")]
    NotCoordinator(NodeId),
}

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Silence after which a client's subscriptions are dropped, zero
    /// to keep them forever
    pub node_timeout: Duration,
    /// How often to look for silent clients, zero to never look
    pub sweep_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            node_timeout: Duration::from_secs(DEFAULT_TIMEOUT),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL),
        }
    }
}

/// A frame to put on the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outgoing {
    pub dst: Destination,
    pub frame: EncodedFrame,
}

impl Outgoing {
    fn to(node: NodeId, message: &Message) -> Self {
        let dst = Destination::Node(node);
        Self {
            dst,
            frame: encode_frame(Channel::Radio, NodeId::COORDINATOR, dst, message),
        }
    }
}

/// [`Coordinator`] wraps the [`Dispatcher`] in an [`actix::Actor`]: the
/// mailbox serializes every table mutation and every snapshot read, so
/// callers on any task or thread see consistent subscription state.
///
/// Besides dispatching radio frames, the actor:
/// 1. Periodically evicts clients that have gone silent
/// 2. Relays every accepted frame verbatim, under the serial
///    discriminator, to host monitors registered with [`MonitorSubscribe`]
pub struct Coordinator {
    dispatcher: Dispatcher,
    monitors: HashMap<MonitorId, UnboundedSender<RelayedFrame>>,
    sweep_interval: Duration,
}

/// Public API for starting a coordinator on `link`. Must be called from
/// within a running actix system. Returns a [`CoordinatorHandle`] whose
/// actor address accepts the query and monitor messages in this module.
pub fn coordinator(
    config: CoordinatorConfig,
    link: Arc<dyn Link>,
) -> Result<CoordinatorHandle, CoordinatorError> {
    let id = link.local_id();
    if !id.is_coordinator() {
        log::error!("Refusing to start coordinator on link for node {id:}");
        return Err(CoordinatorError::NotCoordinator(id));
    }

    let addr = Coordinator::new(config).start();
    let router = LinkRouter::new(link, addr.clone());

    Ok(CoordinatorHandle { addr, router })
}

pub struct CoordinatorHandle {
    addr: Addr<Coordinator>,
    router: LinkRouter,
}

impl CoordinatorHandle {
    pub fn addr(&self) -> Addr<Coordinator> {
        self.addr.clone()
    }

    /// Run until the link closes
    pub async fn run(mut self) -> Result<(), CoordinatorError> {
        self.router.exec_pump().await
    }
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(config.node_timeout),
            monitors: HashMap::new(),
            // nothing can expire without a timeout
            sweep_interval: if config.node_timeout.is_zero() {
                Duration::ZERO
            } else {
                config.sweep_interval
            },
        }
    }

    /// Handle one raw link frame, returning the frames to send in reply.
    /// Frames for other protocols or other nodes yield nothing.
    pub fn process_frame(
        &mut self,
        raw: &[u8],
        now: Instant,
    ) -> Result<Vec<Outgoing>, CoordinatorError> {
        let frame = decode_frame(raw).map_err(|e| {
            self.dispatcher.record_foreign_frame();
            log::debug!("Dropping frame without header: {e:}");
            e
        })?;

        if frame.header.channel() != Some(Channel::Radio) {
            self.dispatcher.record_foreign_frame();
            log::trace!(
                "Ignoring frame with discriminator {}",
                frame.header.am_type
            );
            return Ok(Vec::new());
        }

        if !frame.header.dst.accepts(NodeId::COORDINATOR) {
            log::trace!("Ignoring frame addressed to {:?}", frame.header.dst);
            return Ok(Vec::new());
        }

        let message = self.dispatcher.decode(frame.payload)?;
        let outcome = self.dispatcher.handle_message(message, now)?;
        self.relay(raw, frame.header.src, message);

        Ok(outcome
            .deliveries()
            .iter()
            .map(|d| Outgoing::to(d.to, &d.message))
            .collect())
    }

    fn relay(&mut self, raw: &[u8], src: NodeId, message: Message) {
        if self.monitors.is_empty() {
            return;
        }

        let relayed = RelayedFrame::new(raw, src, message);
        self.monitors.retain(|id, sender| {
            sender
                .send(relayed.clone())
                .map_err(|e| {
                    log::error!("Failure to relay frame to monitor ID {id:}: {e:}, removing");
                })
                .is_ok()
        });
    }

    fn sweep(&mut self, now: Instant) -> Vec<NodeId> {
        let expired = self.dispatcher.sweep_stale(now);
        if !expired.is_empty() {
            log::info!("Evicted stale nodes {:?}", expired);
        }
        expired.to_vec()
    }
}

impl Actor for Coordinator {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        if self.sweep_interval.is_zero() {
            log::info!("Coordinator started, stale node sweep disabled");
            return;
        }

        log::info!(
            "Coordinator started, sweeping stale nodes every {:?}",
            self.sweep_interval
        );
        ctx.run_interval(self.sweep_interval, |act, _ctx| {
            act.sweep(Instant::now());
        });
    }
}

/// Raw frame received from the link
#[derive(Message)]
#[rtype(result = "InboundResponse")]
pub struct Inbound(pub Vec<u8>);
type InboundResponse = Result<Vec<Outgoing>, CoordinatorError>;

impl Handler<Inbound> for Coordinator {
    type Result = InboundResponse;

    fn handle(&mut self, msg: Inbound, _ctx: &mut Self::Context) -> Self::Result {
        self.process_frame(&msg.0, Instant::now())
    }
}

/// Snapshot of the subscribers of one topic
#[derive(Message)]
#[rtype(result = "Vec<NodeId>")]
pub struct Members(pub Topic);

impl Handler<Members> for Coordinator {
    type Result = MessageResult<Members>;

    fn handle(&mut self, msg: Members, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.dispatcher.members(msg.0).to_vec())
    }
}

#[derive(Message)]
#[rtype(result = "DispatchStats")]
pub struct GetStats;

impl Handler<GetStats> for Coordinator {
    type Result = MessageResult<GetStats>;

    fn handle(&mut self, _msg: GetStats, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(*self.dispatcher.stats())
    }
}

#[derive(Message)]
#[rtype(result = "NodeState")]
pub struct GetNodeState(pub NodeId);

impl Handler<GetNodeState> for Coordinator {
    type Result = MessageResult<GetNodeState>;

    fn handle(&mut self, msg: GetNodeState, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.dispatcher.node_state(msg.0))
    }
}

/// Evict silent nodes as of the given instant, returning who was evicted
#[derive(Message)]
#[rtype(result = "Vec<NodeId>")]
pub struct Sweep(pub Instant);

impl Handler<Sweep> for Coordinator {
    type Result = MessageResult<Sweep>;

    fn handle(&mut self, msg: Sweep, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.sweep(msg.0))
    }
}

/// Register a host monitor to receive every accepted frame. The id must
/// be unique per monitor; reusing one replaces the earlier sender.
#[derive(Message)]
#[rtype(result = "MonitorSubscribeResponse")]
pub struct MonitorSubscribe {
    pub id: MonitorId,
    pub frames: UnboundedSender<RelayedFrame>,
}
type MonitorSubscribeResponse = Result<(), CoordinatorError>;

impl Handler<MonitorSubscribe> for Coordinator {
    type Result = MonitorSubscribeResponse;

    fn handle(&mut self, msg: MonitorSubscribe, _ctx: &mut Self::Context) -> Self::Result {
        if self.monitors.insert(msg.id, msg.frames).is_some() {
            log::warn!("Replaced existing monitor ID {}", msg.id);
        } else {
            log::debug!("Subscribed monitor ID {}", msg.id);
        }
        Ok(())
    }
}

#[derive(Message)]
#[rtype(result = "bool")]
pub struct MonitorUnsubscribe {
    pub id: MonitorId,
}

impl Handler<MonitorUnsubscribe> for Coordinator {
    type Result = MessageResult<MonitorUnsubscribe>;

    fn handle(&mut self, msg: MonitorUnsubscribe, _ctx: &mut Self::Context) -> Self::Result {
        let removed = self.monitors.remove(&msg.id).is_some();
        if removed {
            log::debug!("Unsubscribed monitor ID {}", msg.id);
        } else {
            log::warn!("Removing non-existent monitor ID {}", msg.id);
        }
        MessageResult(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radiosub_proto::{link::MemoryMedium, TopicSet, AM_SERIAL_PUB_SUB_MSG};
    use tokio::{sync::mpsc::unbounded_channel, time::timeout};

    fn radio_frame(msg: Message) -> EncodedFrame {
        encode_frame(
            Channel::Radio,
            msg.sender(),
            NodeId::COORDINATOR.into(),
            &msg,
        )
    }

    #[test]
    fn unrelated_traffic_is_ignored() {
        let now = Instant::now();
        let mut coordinator = Coordinator::new(CoordinatorConfig::default());
        let connect = Message::Connect { sender: NodeId(2) };

        let foreign = [0x42, 2, 1, 0, 2];
        assert!(coordinator
            .process_frame(&foreign, now)
            .expect("ignored")
            .is_empty());

        let serial = encode_frame(Channel::Serial, NodeId(2), NodeId(1).into(), &connect);
        assert_eq!(serial[0], AM_SERIAL_PUB_SUB_MSG);
        assert!(coordinator
            .process_frame(&serial, now)
            .expect("ignored")
            .is_empty());

        assert!(matches!(
            coordinator.process_frame(&[10], now),
            Err(CoordinatorError::Frame(FrameError::Truncated(1)))
        ));

        let elsewhere = encode_frame(Channel::Radio, NodeId(2), NodeId(5).into(), &connect);
        assert!(coordinator
            .process_frame(&elsewhere, now)
            .expect("ignored")
            .is_empty());

        assert_eq!(coordinator.dispatcher.stats().foreign_frames, 3);
        assert_eq!(coordinator.dispatcher.stats().connects, 0);
        assert_eq!(coordinator.dispatcher.node_state(NodeId(2)), NodeState::Unknown);
    }

    #[test]
    fn accepted_frames_are_relayed() {
        let now = Instant::now();
        let mut coordinator = Coordinator::new(CoordinatorConfig::default());
        let (tx, mut rx) = unbounded_channel();
        coordinator.monitors.insert(7, tx);

        let sub = Message::Subscribe {
            sender: NodeId(3),
            topics: TopicSet::HUMIDITY,
        };
        coordinator
            .process_frame(&radio_frame(sub), now)
            .expect("dispatched");

        // undecodable messages are not relayed
        assert!(coordinator
            .process_frame(&[10, 3, 1, 9, 3], now)
            .is_err());

        let relayed = rx.try_recv().expect("relayed frame");
        assert_eq!(relayed.src, NodeId(3));
        assert_eq!(relayed.message, sub);
        assert_eq!(relayed.frame[0], AM_SERIAL_PUB_SUB_MSG);
        assert_eq!(&relayed.frame[1..], &radio_frame(sub)[1..]);
        assert!(rx.try_recv().is_err());

        drop(rx);
        coordinator
            .process_frame(&radio_frame(Message::Connect { sender: NodeId(3) }), now)
            .expect("dispatched");
        assert!(coordinator.monitors.is_empty());
    }

    #[test]
    fn publish_frames_are_addressed_per_subscriber() {
        let now = Instant::now();
        let mut coordinator = Coordinator::new(CoordinatorConfig::default());
        for id in [4, 5, 6] {
            let sub = Message::Subscribe {
                sender: NodeId(id),
                topics: TopicSet::LUMINOSITY,
            };
            coordinator
                .process_frame(&radio_frame(sub), now)
                .expect("dispatched");
        }

        let publish = Message::Publish {
            sender: NodeId(5),
            topic: Topic::Luminosity,
            payload: 44,
        };
        let outgoing = coordinator
            .process_frame(&radio_frame(publish), now)
            .expect("dispatched");

        let dsts: Vec<_> = outgoing.iter().map(|o| o.dst).collect();
        assert_eq!(
            dsts,
            vec![Destination::Node(NodeId(4)), Destination::Node(NodeId(6))]
        );
        for out in &outgoing {
            let frame = decode_frame(&out.frame).expect("valid frame");
            assert_eq!(frame.header.src, NodeId::COORDINATOR);
            assert_eq!(frame.header.dst, out.dst);
            assert_eq!(Message::decode(frame.payload), Ok(publish));
        }
    }

    #[test]
    fn default_config_never_evicts() {
        let start = Instant::now();
        let mut coordinator = Coordinator::new(CoordinatorConfig::default());
        assert!(coordinator.sweep_interval.is_zero());

        let sub = Message::Subscribe {
            sender: NodeId(3),
            topics: TopicSet::TEMPERATURE,
        };
        coordinator
            .process_frame(&radio_frame(sub), start)
            .expect("dispatched");

        // a client quiet for far longer than any sweep period keeps its topics
        let later = start + Duration::from_secs(100_000);
        assert!(coordinator.sweep(later).is_empty());

        let publish = Message::Publish {
            sender: NodeId(2),
            topic: Topic::Temperature,
            payload: 3,
        };
        let outgoing = coordinator
            .process_frame(&radio_frame(publish), later)
            .expect("dispatched");
        assert_eq!(
            outgoing.iter().map(|o| o.dst).collect::<Vec<_>>(),
            vec![Destination::Node(NodeId(3))]
        );
        assert_eq!(coordinator.dispatcher.stats().evictions, 0);
    }

    #[test]
    fn evicted_client_returns_without_topics() {
        let start = Instant::now();
        let mut coordinator = Coordinator::new(CoordinatorConfig {
            node_timeout: Duration::from_secs(100),
            sweep_interval: Duration::from_secs(15),
        });
        let sub = Message::Subscribe {
            sender: NodeId(3),
            topics: TopicSet::TEMPERATURE,
        };
        coordinator
            .process_frame(&radio_frame(sub), start)
            .expect("dispatched");
        assert_eq!(coordinator.sweep(start + Duration::from_secs(105)), vec![NodeId(3)]);

        // publishing reconnects the node, but its declaration is gone
        let own = Message::Publish {
            sender: NodeId(3),
            topic: Topic::Humidity,
            payload: 1,
        };
        coordinator
            .process_frame(&radio_frame(own), start + Duration::from_secs(120))
            .expect("dispatched");
        assert!(matches!(
            coordinator.dispatcher.node_state(NodeId(3)),
            NodeState::Connected { .. }
        ));
        assert!(coordinator.dispatcher.members(Topic::Temperature).is_empty());
    }

    #[test]
    fn rejects_client_link() {
        let medium = MemoryMedium::new();
        let link = Arc::new(medium.attach(NodeId(4)));
        assert!(matches!(
            coordinator(CoordinatorConfig::default(), link),
            Err(CoordinatorError::NotCoordinator(NodeId(4)))
        ));
    }

    #[actix::test]
    async fn two_clients_over_memory_medium() {
        let medium = MemoryMedium::new();
        let handle = coordinator(
            CoordinatorConfig::default(),
            Arc::new(medium.attach(NodeId::COORDINATOR)),
        )
        .expect("coordinator");
        let client_2 = medium.attach(NodeId(2));
        let client_3 = medium.attach(NodeId(3));

        let script = [
            (&client_2, Message::Connect { sender: NodeId(2) }),
            (
                &client_2,
                Message::Subscribe {
                    sender: NodeId(2),
                    topics: TopicSet::from_flags(&[1, 0, 0]),
                },
            ),
            (&client_3, Message::Connect { sender: NodeId(3) }),
            (
                &client_3,
                Message::Subscribe {
                    sender: NodeId(3),
                    topics: TopicSet::from_flags(&[1, 1, 0]),
                },
            ),
        ];
        for (link, msg) in script {
            link.send(NodeId::COORDINATOR.into(), &radio_frame(msg))
                .await
                .expect("send");
        }

        let publish = Message::Publish {
            sender: NodeId(2),
            topic: Topic::Temperature,
            payload: 17,
        };
        client_2
            .send(NodeId::COORDINATOR.into(), &radio_frame(publish))
            .await
            .expect("send");

        let got = timeout(Duration::from_secs(2), client_3.recv())
            .await
            .expect("client 3 receives the reading")
            .expect("link open");
        let frame = decode_frame(&got).expect("valid frame");
        assert_eq!(frame.header.src, NodeId::COORDINATOR);
        assert_eq!(Message::decode(frame.payload), Ok(publish));

        assert!(timeout(Duration::from_millis(200), client_2.recv())
            .await
            .is_err());

        let addr = handle.addr();
        assert_eq!(
            addr.send(Members(Topic::Humidity)).await.expect("mailbox"),
            vec![NodeId(3)]
        );
        let stats = addr.send(GetStats).await.expect("mailbox");
        assert_eq!(stats.publishes, 1);
        assert_eq!(stats.deliveries, 1);
        assert_eq!(stats.connects, 2);
    }

    #[actix::test]
    async fn sweep_and_monitor_messages() {
        let addr = Coordinator::new(CoordinatorConfig {
            node_timeout: Duration::from_secs(5),
            sweep_interval: Duration::ZERO,
        })
        .start();

        let (tx, mut rx) = unbounded_channel();
        addr.send(MonitorSubscribe { id: 1, frames: tx })
            .await
            .expect("mailbox")
            .expect("subscribed");

        let sub = Message::Subscribe {
            sender: NodeId(6),
            topics: TopicSet::all(),
        };
        addr.send(Inbound(radio_frame(sub).to_vec()))
            .await
            .expect("mailbox")
            .expect("dispatched");
        assert_eq!(rx.recv().await.map(|f| f.message), Some(sub));
        assert!(matches!(
            addr.send(GetNodeState(NodeId(6))).await.expect("mailbox"),
            NodeState::Connected { .. }
        ));

        let evicted = addr
            .send(Sweep(Instant::now() + Duration::from_secs(6)))
            .await
            .expect("mailbox");
        assert_eq!(evicted, vec![NodeId(6)]);
        for topic in Topic::ALL {
            assert!(addr.send(Members(topic)).await.expect("mailbox").is_empty());
        }

        assert!(addr
            .send(MonitorUnsubscribe { id: 1 })
            .await
            .expect("mailbox"));
        assert!(!addr
            .send(MonitorUnsubscribe { id: 1 })
            .await
            .expect("mailbox"));
    }
}
