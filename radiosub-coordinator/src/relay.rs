use chrono::Local;
use radiosub_proto::{Channel, Message, NodeId};
use serde::Serialize;

/// A radio frame the coordinator accepted, relayed verbatim with the
/// serial discriminator for host-side inspection
#[derive(Debug, Clone, Serialize)]
pub struct RelayedFrame {
    /// Milliseconds since the unix epoch, local clock
    pub ts: i64,
    pub src: NodeId,
    /// Serial-channel frame bytes
    pub frame: Vec<u8>,
    pub message: Message,
}

impl RelayedFrame {
    /// `raw` is the frame as received; only its discriminator byte is
    /// replaced
    pub fn new(raw: &[u8], src: NodeId, message: Message) -> Self {
        let mut frame = raw.to_vec();
        if let Some(am_type) = frame.first_mut() {
            *am_type = Channel::Serial.am_type();
        }

        Self {
            ts: Local::now().timestamp_millis(),
            src,
            frame,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radiosub_proto::{
        decode_frame, Destination, TopicSet, AM_PUB_SUB_MSG, AM_SERIAL_PUB_SUB_MSG, SUB,
    };

    #[test]
    fn relayed_frames_keep_received_bytes() {
        // non-canonical flag byte and a unicast destination survive the relay
        let raw = [AM_PUB_SUB_MSG, 5, 1, SUB, 5, 9, 0, 1];
        let message = Message::Subscribe {
            sender: NodeId(5),
            topics: TopicSet::TEMPERATURE | TopicSet::LUMINOSITY,
        };
        let relayed = RelayedFrame::new(&raw, NodeId(5), message);

        assert_eq!(relayed.frame[0], AM_SERIAL_PUB_SUB_MSG);
        assert_eq!(&relayed.frame[1..], &raw[1..]);

        let frame = decode_frame(&relayed.frame).expect("valid frame");
        assert_eq!(frame.header.channel(), Some(Channel::Serial));
        assert_eq!(frame.header.dst, Destination::Node(NodeId::COORDINATOR));
        assert_eq!(Message::decode(frame.payload), Ok(message));
    }
}
