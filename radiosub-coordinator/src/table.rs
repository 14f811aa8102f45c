use heapless::Vec;
use radiosub_proto::{NodeId, Topic, N_CLIENTS};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    #[error("Topic {topic} is full ({capacity} subscribers), rejecting node {node}")]
    CapacityExceeded {
        topic: Topic,
        node: NodeId,
        capacity: usize,
    },
}

/// Subscribers of one topic. Bounded to [`N_CLIENTS`] entries and kept
/// densely packed: `members()` never has gaps, and relative order is
/// preserved across removals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTable {
    topic: Topic,
    members: Vec<NodeId, N_CLIENTS>,
}

impl TopicTable {
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            members: Vec::new(),
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Add `node` to the table. Subscribing twice is a no-op, returning
    /// `Ok(false)`. A full table is left unchanged.
    pub fn subscribe(&mut self, node: NodeId) -> Result<bool, TableError> {
        if self.contains(node) {
            return Ok(false);
        }

        self.members
            .push(node)
            .map_err(|node| TableError::CapacityExceeded {
                topic: self.topic,
                node,
                capacity: N_CLIENTS,
            })?;
        Ok(true)
    }

    /// Remove `node`, shifting later entries left. Returns false if the
    /// node was not subscribed.
    pub fn unsubscribe(&mut self, node: NodeId) -> bool {
        if let Some(pos) = self.members.iter().position(|m| *m == node) {
            self.members.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.members.contains(&node)
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Owned copy of the current members, unaffected by later mutation
    pub fn snapshot(&self) -> Vec<NodeId, N_CLIENTS> {
        self.members.clone()
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
