use rand::Rng;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::UnboundedSender;

use radiosub_proto::{
    decode_frame, encode_frame,
    link::{Link, LinkError},
    Channel, Message, NodeId,
};

use crate::{ClientError, ClientSession, Reading};

/// A client session bound to a link and a publish timer
pub struct ClientNode<R> {
    session: ClientSession<R>,
    link: Arc<dyn Link>,
    interval: Duration,
}

impl<R: Rng> ClientNode<R> {
    pub fn new(
        session: ClientSession<R>,
        link: Arc<dyn Link>,
        interval: Duration,
    ) -> Result<Self, ClientError> {
        if link.local_id() != session.id() {
            return Err(ClientError::LinkMismatch {
                session: session.id(),
                link: link.local_id(),
            });
        }

        Ok(Self {
            session,
            link,
            interval,
        })
    }

    /// Announce, subscribe, then publish one reading per interval while
    /// forwarding readings delivered by the coordinator to `readings`.
    /// Returns once the link closes.
    pub async fn run(self, readings: UnboundedSender<Reading>) -> Result<(), ClientError> {
        let Self {
            mut session,
            link,
            interval,
        } = self;
        let id = session.id();

        // Connect then Subscribe, without waiting on the timer
        for message in session.by_ref().take(2) {
            send(link.as_ref(), &message).await?;
        }
        log::info!("Node {id:} announced, subscribed to {:?}", session.topics());

        let mut ticker = tokio::time::interval(interval);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(message) = session.next() {
                        if let Err(e) = send(link.as_ref(), &message).await {
                            log::error!("Node {id:}: failure to publish {message:?}: {e:}");
                        }
                    }
                }
                frame = link.recv() => match frame {
                    Ok(raw) => {
                        if let Some(reading) = receive(&session, &raw) {
                            readings.send(reading).map_err(|e| {
                                log::error!("Node {id:}: reading receiver dropped {e:}");
                                ClientError::ReadingsClosed
                            })?;
                        }
                    }
                    Err(LinkError::Closed(_)) => {
                        log::warn!("Node {id:}: link closed");
                        return Ok(());
                    }
                    Err(e) => log::error!("Node {id:}: error receiving frame {e:}"),
                }
            }
        }
    }
}

async fn send(link: &dyn Link, message: &Message) -> Result<(), LinkError> {
    let frame = encode_frame(
        Channel::Radio,
        message.sender(),
        NodeId::COORDINATOR.into(),
        message,
    );
    link.send(NodeId::COORDINATOR.into(), &frame).await
}

fn receive<R: Rng>(session: &ClientSession<R>, raw: &[u8]) -> Option<Reading> {
    let frame = decode_frame(raw)
        .map_err(|e| log::debug!("Node {}: dropping frame {e:}", session.id()))
        .ok()?;

    if frame.header.channel() != Some(Channel::Radio)
        || !frame.header.dst.accepts(session.id())
    {
        return None;
    }

    let message = Message::decode(frame.payload)
        .map_err(|e| log::warn!("Node {}: undecodable delivery {e:}", session.id()))
        .ok()?;
    session.on_delivery(&message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Schedule;
    use radiosub_proto::{link::MemoryMedium, Topic, TopicSet};
    use rand::{rngs::StdRng, SeedableRng};
    use tokio::{sync::mpsc::unbounded_channel, time::timeout};

    async fn recv_message(link: &dyn Link) -> Message {
        let raw = timeout(Duration::from_secs(2), link.recv())
            .await
            .expect("frame before timeout")
            .expect("link open");
        let frame = decode_frame(&raw).expect("valid frame");
        assert_eq!(frame.header.channel(), Some(Channel::Radio));
        Message::decode(frame.payload).expect("valid message")
    }

    #[tokio::test]
    async fn announces_publishes_and_receives() {
        let medium = MemoryMedium::new();
        let coordinator = medium.attach(NodeId::COORDINATOR);
        let session = ClientSession::new(
            NodeId(3),
            TopicSet::HUMIDITY,
            Schedule::Fixed(Topic::Temperature),
            StdRng::seed_from_u64(1),
        );
        let node = ClientNode::new(
            session,
            Arc::new(medium.attach(NodeId(3))),
            Duration::from_millis(20),
        )
        .expect("matching link");

        let (tx, mut rx) = unbounded_channel();
        let task = tokio::spawn(node.run(tx));

        assert_eq!(
            recv_message(&coordinator).await,
            Message::Connect { sender: NodeId(3) }
        );
        assert_eq!(
            recv_message(&coordinator).await,
            Message::Subscribe {
                sender: NodeId(3),
                topics: TopicSet::HUMIDITY
            }
        );
        assert!(matches!(
            recv_message(&coordinator).await,
            Message::Publish {
                sender: NodeId(3),
                topic: Topic::Temperature,
                ..
            }
        ));

        let forwarded = Message::Publish {
            sender: NodeId(6),
            topic: Topic::Humidity,
            payload: 9,
        };
        let frame = encode_frame(Channel::Radio, NodeId::COORDINATOR, NodeId(3).into(), &forwarded);
        coordinator
            .send(NodeId(3).into(), &frame)
            .await
            .expect("send");

        let reading = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("reading before timeout");
        assert_eq!(
            reading,
            Some(Reading {
                from: NodeId(6),
                topic: Topic::Humidity,
                value: 9
            })
        );

        task.abort();
    }

    #[test]
    fn link_must_match_session() {
        let medium = MemoryMedium::new();
        let session = ClientSession::new(
            NodeId(3),
            TopicSet::empty(),
            Schedule::RoundRobin,
            StdRng::seed_from_u64(1),
        );
        assert!(matches!(
            ClientNode::new(session, Arc::new(medium.attach(NodeId(4))), Duration::from_secs(1)),
            Err(ClientError::LinkMismatch { .. })
        ));
    }
}
