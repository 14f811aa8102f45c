//! Wire definitions for the radiosub publish/subscribe protocol, shared by
//! the coordinator (PAN coordinator, node id 1) and every client node on
//! the radio channel.
//!
//! The crate is split in two layers:
//!
//! 1. `no_std` message definitions: [`Message`] and its fixed-size,
//!    big-endian codec, the [`Topic`] / [`TopicSet`] types, and the link
//!    framing ([`encode_frame`] / [`decode_frame`]) which prefixes each
//!    message with a protocol discriminator ([`Channel`]) and addressing.
//! 2. With the `std` feature, the [`link`] module: an async [`link::Link`]
//!    trait for the send / receive primitive that nodes consume, plus a
//!    UDP-backed radio emulation and an in-memory medium used by tests and
//!    simulations.
//!
//! All messages have a length fixed by their type tag:
//!
//! | Tag | Name | Layout after tag | Total |
//! |---|---|---|---|
//! | 0 | CONNECT | sender | 2 |
//! | 1 | SUB | sender, topics\[0..3\] | 5 |
//! | 2 | PUB | sender, topic, payload (u16 BE) | 5 |
#![cfg_attr(not(feature = "std"), no_std)]

mod buf;
mod frame;
mod message;
mod topic;

#[cfg(feature = "std")]
pub mod link;

pub use buf::FixedBuf;
pub use frame::{
    decode_frame, encode_frame, Channel, Destination, EncodedFrame, Frame, FrameError,
    FrameHeader, AM_PUB_SUB_MSG, AM_SERIAL_PUB_SUB_MSG, BROADCAST, FRAME_HEADER_LEN,
    MAX_FRAME_LEN,
};
pub use message::{
    DecodeError, Encoded, Message, CONNECT, CONNECT_LEN, MAX_MESSAGE_LEN, PUB, PUB_LEN, SUB,
    SUB_LEN,
};
pub use topic::{Topic, TopicSet};

use serde::{Deserialize, Serialize};

/// Node id of the PAN coordinator
pub const PAN_COORD: u8 = 1;

/// Number of client nodes the coordinator can track
pub const N_CLIENTS: usize = 8;

/// Number of topics
pub const N_TOPICS: usize = 3;

/// Upper bound on synthetic readings, per topic
pub const MAX_TEMP: u16 = 30;
pub const MAX_HUM: u16 = 10;
pub const MAX_LUM: u16 = 50;

/// [`NodeId`] identifies a node on the radio channel. Id 1 is reserved
/// for the coordinator, ids `2..=N_CLIENTS + 1` are client nodes. The
/// codec carries any byte; range checks belong to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u8);

impl NodeId {
    pub const COORDINATOR: NodeId = NodeId(PAN_COORD);

    /// Highest valid node id
    pub const MAX: NodeId = NodeId(N_CLIENTS as u8 + 1);

    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn is_coordinator(self) -> bool {
        self.0 == PAN_COORD
    }

    pub const fn is_client(self) -> bool {
        self.0 > PAN_COORD && self.0 <= Self::MAX.0
    }

    /// Zero-based slot of a client node, `None` for the coordinator or
    /// out of range ids
    pub const fn client_index(self) -> Option<usize> {
        if self.is_client() {
            Some((self.0 - PAN_COORD - 1) as usize)
        } else {
            None
        }
    }

    /// All client node ids, in ascending order
    pub fn clients() -> impl Iterator<Item = NodeId> {
        (PAN_COORD + 1..=Self::MAX.0).map(NodeId)
    }

    /// Every node id on the channel, coordinator included
    pub fn all() -> impl Iterator<Item = NodeId> {
        (PAN_COORD..=Self::MAX.0).map(NodeId)
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for NodeId {
    fn from(id: u8) -> Self {
        NodeId(id)
    }
}
