//! Send / receive primitive consumed by coordinator and client nodes.
//! Frames are opaque byte buffers (see [`crate::encode_frame`]) addressed
//! by node id or broadcast. Retransmission and acknowledgement are the
//! link's business; nothing above this trait retries.

mod memory;
mod udp;

pub use memory::{MemoryLink, MemoryMedium};
pub use udp::UdpLink;

use thiserror::Error;

use crate::{Destination, NodeId};

/// Receive buffer size used by link implementations
pub const RECV_BUFFER_SIZE: usize = 512;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("I/O Error")]
    Io(#[from] std::io::Error),
    #[error("Link closed for node {0}")]
    Closed(NodeId),
    #[error("No port available for node {0} above base port {1}")]
    PortRange(NodeId, u16),
}

#[async_trait::async_trait]
pub trait Link: Send + Sync {
    /// Node id this link sends from
    fn local_id(&self) -> NodeId;

    async fn send(&self, dst: Destination, frame: &[u8]) -> Result<(), LinkError>;

    /// Wait for the next frame addressed to this node
    async fn recv(&self) -> Result<Vec<u8>, LinkError>;
}
