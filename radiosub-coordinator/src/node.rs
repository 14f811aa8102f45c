use std::time::{Duration, Instant};

use radiosub_proto::{NodeId, N_CLIENTS};

/// Coordinator-side view of a client node. Nodes start `Unknown`, become
/// `Connected` on the first message heard from them, and fall back to
/// `Unknown` when they stay silent past the node timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unknown,
    Connected { since: Instant, last_seen: Instant },
}

/// Liveness record for every client slot
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    slots: [NodeState; N_CLIENTS],
    timeout: Duration,
}

impl NodeRegistry {
    /// A zero `timeout` keeps nodes connected forever
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: [NodeState::Unknown; N_CLIENTS],
            timeout,
        }
    }

    pub fn state(&self, node: NodeId) -> NodeState {
        node.client_index()
            .map(|i| self.slots[i])
            .unwrap_or(NodeState::Unknown)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        matches!(self.state(node), NodeState::Connected { .. })
    }

    /// Record that `node` was heard at `now`. Returns true if the node
    /// was not connected before.
    pub fn touch(&mut self, node: NodeId, now: Instant) -> bool {
        let Some(i) = node.client_index() else {
            return false;
        };

        let slot = &mut self.slots[i];
        match slot {
            NodeState::Connected { last_seen, .. } => {
                *last_seen = now;
                false
            }
            NodeState::Unknown => {
                *slot = NodeState::Connected {
                    since: now,
                    last_seen: now,
                };
                true
            }
        }
    }

    pub fn connected(&self) -> impl Iterator<Item = NodeId> + '_ {
        NodeId::clients().filter(|n| self.is_connected(*n))
    }

    /// Drop every node silent for longer than the timeout, returning the
    /// evicted ids
    pub fn expire(&mut self, now: Instant) -> heapless::Vec<NodeId, N_CLIENTS> {
        let mut expired = heapless::Vec::new();
        if self.timeout.is_zero() {
            return expired;
        }

        for (node, slot) in NodeId::clients().zip(self.slots.iter_mut()) {
            if let NodeState::Connected { last_seen, .. } = *slot {
                if now.saturating_duration_since(last_seen) > self.timeout {
                    *slot = NodeState::Unknown;
                    // at most N_CLIENTS slots, cannot overflow
                    expired.push(node).ok();
                }
            }
        }

        expired
    }
}
