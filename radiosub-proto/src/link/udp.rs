use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::net::UdpSocket;

use super::{Link, LinkError, RECV_BUFFER_SIZE};
use crate::{Destination, NodeId};

/// Radio emulation over loopback UDP: node `id` listens on
/// `base_port + id`, broadcast fans out to every other node id.
pub struct UdpLink {
    id: NodeId,
    base_port: u16,
    socket: UdpSocket,
}

impl UdpLink {
    pub async fn bind(id: NodeId, base_port: u16) -> Result<Self, LinkError> {
        let addr = Self::node_addr(base_port, id)?;
        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            log::error!("Unable to bind to socket at addr {addr:}");
            e
        })?;
        log::info!("Node {id:} bound radio link on {addr:}");

        Ok(Self {
            id,
            base_port,
            socket,
        })
    }

    pub fn node_addr(base_port: u16, id: NodeId) -> Result<SocketAddr, LinkError> {
        let port = base_port
            .checked_add(id.get() as u16)
            .ok_or(LinkError::PortRange(id, base_port))?;
        Ok(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)))
    }

    async fn send_to_node(&self, id: NodeId, frame: &[u8]) -> Result<(), LinkError> {
        let addr = Self::node_addr(self.base_port, id)?;
        self.socket.send_to(frame, addr).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Link for UdpLink {
    fn local_id(&self) -> NodeId {
        self.id
    }

    async fn send(&self, dst: Destination, frame: &[u8]) -> Result<(), LinkError> {
        match dst {
            Destination::Node(id) => self.send_to_node(id, frame).await,
            Destination::Broadcast => {
                for id in NodeId::all().filter(|id| *id != self.id) {
                    // A missing listener must not stop the rest of the fan out
                    self.send_to_node(id, frame)
                        .await
                        .map_err(|e| log::warn!("Broadcast to node {id:} failed: {e:}"))
                        .ok();
                }
                Ok(())
            }
        }
    }

    async fn recv(&self) -> Result<Vec<u8>, LinkError> {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let (len, from) = self.socket.recv_from(&mut buffer).await.map_err(|e| {
            log::error!("Error receiving from socket: {e:}");
            e
        })?;
        log::trace!("Node {} got {len:} bytes from {from:}", self.id);
        Ok(buffer[..len].to_vec())
    }
}
