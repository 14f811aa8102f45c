//! The `radiosub-coordinator` crate is the PAN coordinator side of the
//! radiosub publish/subscribe protocol. Client nodes announce themselves,
//! declare the sensor topics they care about, and publish readings; the
//! coordinator keeps one subscription table per topic and forwards each
//! reading to every other subscriber of that topic.
//!
//! The crate is layered so the protocol logic can be exercised without a
//! runtime:
//! 1. [`TopicTable`] and [`NodeRegistry`] are bounded, allocation-free
//!    records of who subscribes to what and who has been heard recently
//! 2. [`Dispatcher`] is the synchronous engine: one decoded message in,
//!    one [`Outcome`] out, with diagnostic counters in [`DispatchStats`]
//! 3. [`Coordinator`] is an [`actix::Actor`] wrapping the dispatcher. Its
//!    mailbox serializes all table access, it evicts silent nodes on a
//!    timer, and it relays accepted frames to host monitors as
//!    [`RelayedFrame`]s
//! 4. [`coordinator`] wires the actor to a
//!    [`Link`](radiosub_proto::link::Link) with a pump task owned by the
//!    returned [`CoordinatorHandle`]
//!
//! # Examples
//! ```rust,no_run
//! use std::sync::Arc;
//! use radiosub_proto::{link::UdpLink, NodeId};
//!
//! #[actix::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let link = UdpLink::bind(NodeId::COORDINATOR, 47000).await?;
//!     let handle = radiosub_coordinator::coordinator(
//!         radiosub_coordinator::CoordinatorConfig::default(),
//!         Arc::new(link),
//!     )?;
//!
//!     let (frames_tx, _frames_rx) = tokio::sync::mpsc::unbounded_channel();
//!     // The provided monitor ID must be unique for each monitor
//!     handle
//!         .addr()
//!         .send(radiosub_coordinator::MonitorSubscribe {
//!             id: 0,
//!             frames: frames_tx,
//!         })
//!         .await??;
//!
//!     handle.run().await?;
//!     Ok(())
//! }
//! ```

mod coordinator;
mod dispatch;
mod node;
mod relay;
mod router;
mod table;

pub(crate) use router::LinkRouter;
pub use router::MAX_RECV_ERRORS;

pub use coordinator::{
    coordinator, Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorHandle, GetNodeState,
    GetStats, Inbound, Members, MonitorSubscribe, MonitorUnsubscribe, Outgoing, Sweep,
};
pub use dispatch::{Deliveries, Delivery, DispatchError, DispatchStats, Dispatcher, Outcome};
pub use node::{NodeRegistry, NodeState};
pub use relay::RelayedFrame;
pub use table::{TableError, TopicTable};

/// [`MonitorId`] identifies a host monitor subscribed to relayed frames
pub type MonitorId = u32;

/// Seconds of silence before a client's subscriptions are dropped. Zero
/// keeps them forever, which is the default: a client declares its
/// topics once, so an evicted client that later publishes again comes
/// back as a fresh node with no subscriptions and stays deaf until it
/// restarts. A nonzero timeout frees table slots held by dead nodes at
/// that cost, and should be well above the slowest client's publish
/// interval.
pub const DEFAULT_TIMEOUT: u64 = 0;

// Seconds between stale node sweeps
pub const DEFAULT_SWEEP_INTERVAL: u64 = 15;
