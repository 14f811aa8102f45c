//! Link-level framing. Every frame on the shared medium carries a
//! protocol discriminator so this protocol's traffic can be told apart
//! from anything else on the channel:
//!
//! `[discriminator][src][dst][message...]`
//!
//! `dst` is a node id, or [`BROADCAST`].

use serde::{Deserialize, Serialize};

use crate::{FixedBuf, Message, NodeId, MAX_MESSAGE_LEN};

/// Discriminator for frames exchanged over the radio
pub const AM_PUB_SUB_MSG: u8 = 10;

/// Discriminator for frames relayed verbatim to a host serial/log channel
pub const AM_SERIAL_PUB_SUB_MSG: u8 = 137;

pub const BROADCAST: u8 = 0xff;

pub const FRAME_HEADER_LEN: usize = 3;
pub const MAX_FRAME_LEN: usize = FRAME_HEADER_LEN + MAX_MESSAGE_LEN;

pub type EncodedFrame = FixedBuf<MAX_FRAME_LEN>;

/// Transport a frame travels on. Selects the discriminator only, never
/// the meaning of the message inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Radio,
    Serial,
}

impl Channel {
    pub const fn am_type(self) -> u8 {
        match self {
            Channel::Radio => AM_PUB_SUB_MSG,
            Channel::Serial => AM_SERIAL_PUB_SUB_MSG,
        }
    }

    pub const fn from_am_type(am_type: u8) -> Option<Channel> {
        match am_type {
            AM_PUB_SUB_MSG => Some(Channel::Radio),
            AM_SERIAL_PUB_SUB_MSG => Some(Channel::Serial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Node(NodeId),
    Broadcast,
}

impl Destination {
    pub const fn to_byte(self) -> u8 {
        match self {
            Destination::Node(id) => id.get(),
            Destination::Broadcast => BROADCAST,
        }
    }

    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            BROADCAST => Destination::Broadcast,
            id => Destination::Node(NodeId(id)),
        }
    }

    /// Whether a node with id `id` should accept a frame sent here
    pub fn accepts(self, id: NodeId) -> bool {
        match self {
            Destination::Node(dst) => dst == id,
            Destination::Broadcast => true,
        }
    }
}

impl From<NodeId> for Destination {
    fn from(id: NodeId) -> Self {
        Destination::Node(id)
    }
}

#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[cfg_attr(feature = "std", error("Truncated frame header: got {0} bytes"))]
    Truncated(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub am_type: u8,
    pub src: NodeId,
    pub dst: Destination,
}

impl FrameHeader {
    /// `None` when the discriminator belongs to unrelated traffic
    pub const fn channel(&self) -> Option<Channel> {
        Channel::from_am_type(self.am_type)
    }
}

/// A decoded frame header plus the undecoded message bytes that follow it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub header: FrameHeader,
    pub payload: &'a [u8],
}

pub fn encode_frame(
    channel: Channel,
    src: NodeId,
    dst: Destination,
    message: &Message,
) -> EncodedFrame {
    let mut buf = [0u8; MAX_FRAME_LEN];
    buf[0] = channel.am_type();
    buf[1] = src.get();
    buf[2] = dst.to_byte();

    let encoded = message.encode();
    let len = FRAME_HEADER_LEN + encoded.len();
    buf[FRAME_HEADER_LEN..len].copy_from_slice(&encoded);

    EncodedFrame::new(buf, len)
}

pub fn decode_frame(buf: &[u8]) -> Result<Frame<'_>, FrameError> {
    if buf.len() < FRAME_HEADER_LEN {
        return Err(FrameError::Truncated(buf.len()));
    }

    Ok(Frame {
        header: FrameHeader {
            am_type: buf[0],
            src: NodeId(buf[1]),
            dst: Destination::from_byte(buf[2]),
        },
        payload: &buf[FRAME_HEADER_LEN..],
    })
}
