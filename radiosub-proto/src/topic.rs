use serde::{Deserialize, Serialize};

use crate::{DecodeError, MAX_HUM, MAX_LUM, MAX_TEMP, N_TOPICS};

/// Fixed set of topics readings are published under. The discriminant
/// is the wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Topic {
    Temperature = 0,
    Humidity = 1,
    Luminosity = 2,
}

impl Topic {
    pub const ALL: [Topic; N_TOPICS] = [Topic::Temperature, Topic::Humidity, Topic::Luminosity];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Largest synthetic sample a client generates for this topic. Not
    /// enforced at dispatch.
    pub const fn max_sample(self) -> u16 {
        match self {
            Topic::Temperature => MAX_TEMP,
            Topic::Humidity => MAX_HUM,
            Topic::Luminosity => MAX_LUM,
        }
    }

    pub const fn from_index(index: usize) -> Option<Topic> {
        match index {
            0 => Some(Topic::Temperature),
            1 => Some(Topic::Humidity),
            2 => Some(Topic::Luminosity),
            _ => None,
        }
    }

    /// Next topic in round-robin order
    pub const fn next(self) -> Topic {
        match self {
            Topic::Temperature => Topic::Humidity,
            Topic::Humidity => Topic::Luminosity,
            Topic::Luminosity => Topic::Temperature,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Topic::Temperature => "TEMPERATURE",
            Topic::Humidity => "HUMIDITY",
            Topic::Luminosity => "LUMINOSITY",
        }
    }
}

impl TryFrom<u8> for Topic {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Topic::from_index(value as usize).ok_or(DecodeError::UnknownTopic(value))
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

bitflags::bitflags! {
    /// Set of topics a client declares interest in. Carried on the wire
    /// as one 0/1 byte per topic, see [`TopicSet::to_flags`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TopicSet: u8 {
        const TEMPERATURE = 1 << 0;
        const HUMIDITY = 1 << 1;
        const LUMINOSITY = 1 << 2;
    }
}

impl TopicSet {
    pub const fn of(topic: Topic) -> Self {
        Self::from_bits_retain(1 << topic.index())
    }

    pub const fn has(&self, topic: Topic) -> bool {
        self.contains(Self::of(topic))
    }

    /// Topics in the set, in wire order
    pub fn topics(self) -> impl Iterator<Item = Topic> {
        Topic::ALL.into_iter().filter(move |t| self.has(*t))
    }

    /// Any nonzero flag byte counts as subscribed
    pub fn from_flags(flags: &[u8; N_TOPICS]) -> Self {
        Topic::ALL
            .into_iter()
            .filter(|t| flags[t.index()] != 0)
            .fold(TopicSet::empty(), |set, t| set | TopicSet::of(t))
    }

    pub fn to_flags(self) -> [u8; N_TOPICS] {
        let mut flags = [0u8; N_TOPICS];
        for topic in self.topics() {
            flags[topic.index()] = 1;
        }
        flags
    }
}

impl From<Topic> for TopicSet {
    fn from(topic: Topic) -> Self {
        TopicSet::of(topic)
    }
}
