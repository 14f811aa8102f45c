use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::{Link, LinkError};
use crate::{Destination, NodeId};

/// In-process shared medium. Frames sent to a node that is not attached
/// are lost, as they would be over the air.
#[derive(Clone, Default)]
pub struct MemoryMedium {
    nodes: Arc<Mutex<HashMap<NodeId, UnboundedSender<Vec<u8>>>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach node `id`, replacing any previous attachment with that id
    pub fn attach(&self, id: NodeId) -> MemoryLink {
        let (sender, receiver) = unbounded_channel();
        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sender);

        MemoryLink {
            id,
            medium: self.clone(),
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    pub fn detach(&self, id: NodeId) {
        self.nodes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Returns the number of nodes the frame was handed to
    fn deliver(&self, src: NodeId, dst: Destination, frame: &[u8]) -> usize {
        let mut nodes = self.nodes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;

        nodes.retain(|id, sender| {
            if *id == src || !dst.accepts(*id) {
                return true;
            }
            match sender.send(frame.to_vec()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    log::debug!("Node {id:} dropped its link, detaching");
                    false
                }
            }
        });

        delivered
    }
}

pub struct MemoryLink {
    id: NodeId,
    medium: MemoryMedium,
    receiver: tokio::sync::Mutex<UnboundedReceiver<Vec<u8>>>,
}

#[async_trait::async_trait]
impl Link for MemoryLink {
    fn local_id(&self) -> NodeId {
        self.id
    }

    async fn send(&self, dst: Destination, frame: &[u8]) -> Result<(), LinkError> {
        if self.medium.deliver(self.id, dst, frame) == 0 {
            log::trace!("Frame from node {} to {dst:?} reached nobody", self.id);
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, LinkError> {
        self.receiver
            .lock()
            .await
            .recv()
            .await
            .ok_or(LinkError::Closed(self.id))
    }
}
