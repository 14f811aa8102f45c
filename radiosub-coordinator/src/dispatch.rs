//! Coordinator dispatch engine. Consumes decoded messages, keeps the
//! per-topic subscription tables current and decides which clients
//! receive each publication.
//!
//! The engine is synchronous and owns all of its state; each message is
//! processed to completion before the next one. The
//! [`Coordinator`](crate::Coordinator) actor provides the serialization
//! when the engine runs inside an async host.

use std::time::{Duration, Instant};

use radiosub_proto::{DecodeError, Message, NodeId, Topic, TopicSet, N_CLIENTS, N_TOPICS};
use serde::Serialize;
use thiserror::Error;

use crate::{NodeRegistry, NodeState, TopicTable};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Decode Error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Node {0} is not a client node")]
    InvalidSender(NodeId),
}

/// One forwarded publication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub to: NodeId,
    pub message: Message,
}

pub type Deliveries = heapless::Vec<Delivery, N_CLIENTS>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `fresh` is false for a re-announcement from a connected node
    Connected { node: NodeId, fresh: bool },
    /// `rejected` holds topics the node asked for but could not get a
    /// slot in
    Subscribed {
        node: NodeId,
        accepted: TopicSet,
        rejected: TopicSet,
    },
    /// Empty `deliveries` means the topic had no other subscribers
    Published { topic: Topic, deliveries: Deliveries },
}

impl Outcome {
    pub fn deliveries(&self) -> &[Delivery] {
        match self {
            Outcome::Published { deliveries, .. } => deliveries,
            _ => &[],
        }
    }
}

/// Diagnostic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub connects: u64,
    pub subscribes: u64,
    pub publishes: u64,
    pub deliveries: u64,
    /// publications with no one to deliver to
    pub absorbed: u64,
    pub truncated: u64,
    pub unknown_type: u64,
    pub unknown_topic: u64,
    pub invalid_sender: u64,
    pub capacity_rejections: u64,
    pub evictions: u64,
    /// frames with another protocol's discriminator, or no valid header
    pub foreign_frames: u64,
}

impl DispatchStats {
    pub fn decode_errors(&self) -> u64 {
        self.truncated + self.unknown_type + self.unknown_topic
    }
}

pub struct Dispatcher {
    tables: [TopicTable; N_TOPICS],
    nodes: NodeRegistry,
    stats: DispatchStats,
}

impl Dispatcher {
    /// `node_timeout` bounds how long a client may stay silent before
    /// [`Dispatcher::sweep_stale`] drops its subscriptions. Zero disables
    /// eviction.
    pub fn new(node_timeout: Duration) -> Self {
        Self {
            tables: Topic::ALL.map(TopicTable::new),
            nodes: NodeRegistry::new(node_timeout),
            stats: DispatchStats::default(),
        }
    }

    /// Decode and dispatch one message payload
    pub fn handle_bytes(&mut self, payload: &[u8], now: Instant) -> Result<Outcome, DispatchError> {
        let message = self.decode(payload)?;
        self.handle_message(message, now)
    }

    /// Decode a message payload, counting failures
    pub fn decode(&mut self, payload: &[u8]) -> Result<Message, DispatchError> {
        Message::decode(payload).map_err(|e| {
            match e {
                DecodeError::Truncated { .. } => self.stats.truncated += 1,
                DecodeError::UnknownType(_) => self.stats.unknown_type += 1,
                DecodeError::UnknownTopic(_) => self.stats.unknown_topic += 1,
            }
            log::warn!("Dropping undecodable message {payload:02x?}: {e:}");
            DispatchError::from(e)
        })
    }

    pub fn handle_message(&mut self, message: Message, now: Instant) -> Result<Outcome, DispatchError> {
        let sender = message.sender();
        if !sender.is_client() {
            self.stats.invalid_sender += 1;
            log::warn!("Dropping {message:?}: sender {sender:} is not a client node");
            return Err(DispatchError::InvalidSender(sender));
        }

        // Any traffic counts as presence; a SUB or PUB from an unknown
        // node is an implicit CONNECT
        let fresh = self.nodes.touch(sender, now);
        if fresh {
            log::info!("Node {sender:} connected");
        }

        let outcome = match message {
            Message::Connect { .. } => {
                self.stats.connects += 1;
                if !fresh {
                    log::debug!("Node {sender:} re-announced, keeping subscriptions");
                }
                Outcome::Connected { node: sender, fresh }
            }
            Message::Subscribe { topics, .. } => self.subscribe(sender, topics),
            Message::Publish { topic, .. } => self.publish(message, topic),
        };

        Ok(outcome)
    }

    /// Apply an absolute topic declaration: every topic in `topics` is
    /// subscribed, every other topic unsubscribed.
    fn subscribe(&mut self, node: NodeId, topics: TopicSet) -> Outcome {
        self.stats.subscribes += 1;
        let mut accepted = TopicSet::empty();
        let mut rejected = TopicSet::empty();

        for table in self.tables.iter_mut() {
            let topic = table.topic();
            if !topics.has(topic) {
                table.unsubscribe(node);
                continue;
            }

            match table.subscribe(node) {
                Ok(_) => accepted |= TopicSet::of(topic),
                Err(e) => {
                    self.stats.capacity_rejections += 1;
                    log::warn!("{e:}");
                    rejected |= TopicSet::of(topic);
                }
            }
        }

        log::debug!("Node {node:} subscriptions now {accepted:?}");
        Outcome::Subscribed {
            node,
            accepted,
            rejected,
        }
    }

    fn publish(&mut self, message: Message, topic: Topic) -> Outcome {
        self.stats.publishes += 1;
        let sender = message.sender();

        // members never exceed N_CLIENTS, so the collect cannot overflow
        let deliveries: Deliveries = self.tables[topic.index()]
            .members()
            .iter()
            .filter(|member| **member != sender)
            .map(|&to| Delivery { to, message })
            .collect();

        if deliveries.is_empty() {
            self.stats.absorbed += 1;
            log::trace!("No subscribers for {topic} publication from node {sender:}");
        } else {
            self.stats.deliveries += deliveries.len() as u64;
            log::trace!(
                "Forwarding {topic} publication from node {sender:} to {} node(s)",
                deliveries.len()
            );
        }

        Outcome::Published { topic, deliveries }
    }

    /// Evict nodes that have been silent past the node timeout, removing
    /// them from every table
    pub fn sweep_stale(&mut self, now: Instant) -> heapless::Vec<NodeId, N_CLIENTS> {
        let expired = self.nodes.expire(now);
        for &node in expired.iter() {
            for table in self.tables.iter_mut() {
                table.unsubscribe(node);
            }
            self.stats.evictions += 1;
            log::warn!("Node {node:} timed out, dropping its subscriptions");
        }
        expired
    }

    pub fn record_foreign_frame(&mut self) {
        self.stats.foreign_frames += 1;
    }

    pub fn table(&self, topic: Topic) -> &TopicTable {
        &self.tables[topic.index()]
    }

    pub fn members(&self, topic: Topic) -> &[NodeId] {
        self.table(topic).members()
    }

    pub fn node_state(&self, node: NodeId) -> NodeState {
        self.nodes.state(node)
    }

    pub fn connected(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.connected()
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}
