use rand::Rng;
use serde::Serialize;

use radiosub_proto::{Message, NodeId, Topic, TopicSet};

/// Where a session is in its lifetime. The state names the last message
/// emitted: `Connecting` after the Connect, `Subscribing` after the
/// Subscribe, `Publishing` once readings flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Subscribing,
    Publishing,
}

/// Topic selection for successive publications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Cycle through every topic in wire order
    #[default]
    RoundRobin,
    /// Always publish the same topic
    Fixed(Topic),
}

/// A reading forwarded to this node by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub from: NodeId,
    pub topic: Topic,
    pub value: u16,
}

/// Client side of the protocol, independent of any transport or timer.
/// Iterating yields the message to send on each trigger; the sequence is
/// infinite.
#[derive(Debug)]
pub struct ClientSession<R> {
    id: NodeId,
    topics: TopicSet,
    schedule: Schedule,
    state: SessionState,
    next_topic: Topic,
    rng: R,
}

impl<R: Rng> ClientSession<R> {
    pub fn new(id: NodeId, topics: TopicSet, schedule: Schedule, rng: R) -> Self {
        Self {
            id,
            topics,
            schedule,
            state: SessionState::Idle,
            next_topic: Topic::Temperature,
            rng,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn topics(&self) -> TopicSet {
        self.topics
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn pick_topic(&mut self) -> Topic {
        match self.schedule {
            Schedule::Fixed(topic) => topic,
            Schedule::RoundRobin => {
                let topic = self.next_topic;
                self.next_topic = topic.next();
                topic
            }
        }
    }

    fn sample(&mut self) -> Message {
        let topic = self.pick_topic();
        Message::Publish {
            sender: self.id,
            topic,
            payload: self.rng.gen_range(0..=topic.max_sample()),
        }
    }

    /// Interpret a message the coordinator delivered to this node.
    /// Returns a reading for publications on subscribed topics from other
    /// nodes; everything else is ignored.
    pub fn on_delivery(&self, message: &Message) -> Option<Reading> {
        match *message {
            Message::Publish {
                sender,
                topic,
                payload,
            } => {
                if sender == self.id {
                    log::warn!("Node {}: own {topic} publication delivered back", self.id);
                    None
                } else if !self.topics.has(topic) {
                    log::debug!("Node {}: ignoring unsubscribed {topic} reading", self.id);
                    None
                } else {
                    Some(Reading {
                        from: sender,
                        topic,
                        value: payload,
                    })
                }
            }
            other => {
                log::debug!("Node {}: ignoring delivered {other:?}", self.id);
                None
            }
        }
    }
}

impl<R: Rng> Iterator for ClientSession<R> {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        let message = match self.state {
            SessionState::Idle => {
                self.state = SessionState::Connecting;
                Message::Connect { sender: self.id }
            }
            SessionState::Connecting => {
                self.state = SessionState::Subscribing;
                Message::Subscribe {
                    sender: self.id,
                    topics: self.topics,
                }
            }
            SessionState::Subscribing | SessionState::Publishing => {
                self.state = SessionState::Publishing;
                self.sample()
            }
        };
        Some(message)
    }
}
