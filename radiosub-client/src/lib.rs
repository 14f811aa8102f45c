//! Client node for the radiosub publish/subscribe protocol. A client
//! announces itself to the coordinator, declares its topic interest once,
//! and then publishes one sensor sample per timer tick while receiving
//! readings the coordinator forwards from other clients.
//!
//! [`ClientSession`] holds the protocol state machine and is usable on its
//! own; [`ClientNode`] drives a session over a
//! [`Link`](radiosub_proto::link::Link) with a tokio interval.

mod config;
mod node;
mod session;

pub use config::{ClientConfig, INTERVAL_VAR, NODE_ID_VAR, TOPICS_VAR};
pub use node::ClientNode;
pub use session::{ClientSession, Reading, Schedule, SessionState};

use radiosub_proto::{link::LinkError, NodeId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Link Error: {0}")]
    Link(#[from] LinkError),
    #[error("Node {0} is not a client node id")]
    InvalidNodeId(NodeId),
    #[error("Invalid value {value:?} for {var}")]
    Config { var: &'static str, value: String },
    #[error("Session for node {session} bound to link for node {link}")]
    LinkMismatch { session: NodeId, link: NodeId },
    #[error("Reading receiver dropped")]
    ReadingsClosed,
}
