use serde::Serialize;

use crate::{FixedBuf, NodeId, Topic, TopicSet, N_TOPICS};

/// Message type tags
pub const CONNECT: u8 = 0;
pub const SUB: u8 = 1;
pub const PUB: u8 = 2;

/// Fixed wire length of each message type, tag included
pub const CONNECT_LEN: usize = 2;
pub const SUB_LEN: usize = 2 + N_TOPICS;
pub const PUB_LEN: usize = 5;

pub const MAX_MESSAGE_LEN: usize = 5;

pub type Encoded = FixedBuf<MAX_MESSAGE_LEN>;

#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[cfg_attr(
        feature = "std",
        error("Truncated message: expected {expected} bytes, got {actual}")
    )]
    Truncated { expected: usize, actual: usize },
    #[cfg_attr(feature = "std", error("Unknown message type {0}"))]
    UnknownType(u8),
    #[cfg_attr(feature = "std", error("Unknown topic {0}"))]
    UnknownTopic(u8),
}

/// The three protocol messages. Each has a fixed wire length selected by
/// its leading type tag; multi-byte fields are big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Message {
    /// Client announces itself to the coordinator
    Connect { sender: NodeId },
    /// Client declares its complete topic interest, replacing any
    /// previous declaration
    Subscribe { sender: NodeId, topics: TopicSet },
    /// One reading for one topic
    Publish {
        sender: NodeId,
        topic: Topic,
        payload: u16,
    },
}

impl Message {
    pub const fn tag(&self) -> u8 {
        match self {
            Message::Connect { .. } => CONNECT,
            Message::Subscribe { .. } => SUB,
            Message::Publish { .. } => PUB,
        }
    }

    pub const fn sender(&self) -> NodeId {
        match self {
            Message::Connect { sender }
            | Message::Subscribe { sender, .. }
            | Message::Publish { sender, .. } => *sender,
        }
    }

    /// Wire length for a type tag, `None` if the tag is unknown
    pub const fn fixed_len(tag: u8) -> Option<usize> {
        match tag {
            CONNECT => Some(CONNECT_LEN),
            SUB => Some(SUB_LEN),
            PUB => Some(PUB_LEN),
            _ => None,
        }
    }

    pub fn encode(&self) -> Encoded {
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        buf[0] = self.tag();
        buf[1] = self.sender().get();

        let len = match *self {
            Message::Connect { .. } => CONNECT_LEN,
            Message::Subscribe { topics, .. } => {
                buf[2..SUB_LEN].copy_from_slice(&topics.to_flags());
                SUB_LEN
            }
            Message::Publish { topic, payload, .. } => {
                buf[2] = topic as u8;
                buf[3..PUB_LEN].copy_from_slice(&payload.to_be_bytes());
                PUB_LEN
            }
        };

        Encoded::new(buf, len)
    }

    /// Decode one message from the front of `buf`. Bytes past the fixed
    /// length of the message type are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let tag = *buf.first().ok_or(DecodeError::Truncated {
            expected: 1,
            actual: 0,
        })?;

        let expected = Self::fixed_len(tag).ok_or(DecodeError::UnknownType(tag))?;
        if buf.len() < expected {
            return Err(DecodeError::Truncated {
                expected,
                actual: buf.len(),
            });
        }

        let sender = NodeId(buf[1]);
        match tag {
            CONNECT => Ok(Message::Connect { sender }),
            SUB => {
                let mut flags = [0u8; N_TOPICS];
                flags.copy_from_slice(&buf[2..SUB_LEN]);
                Ok(Message::Subscribe {
                    sender,
                    topics: TopicSet::from_flags(&flags),
                })
            }
            PUB => Ok(Message::Publish {
                sender,
                topic: Topic::try_from(buf[2])?,
                payload: u16::from_be_bytes([buf[3], buf[4]]),
            }),
            _ => Err(DecodeError::UnknownType(tag)),
        }
    }
}
