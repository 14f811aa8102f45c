use std::time::Duration;

use radiosub_proto::{NodeId, TopicSet};

use crate::{ClientError, Schedule};

// Build-time defaults, overridden by the `[radiosub-client]` section of
// cfg.toml
#[toml_cfg::toml_config]
pub struct Config {
    #[default(2)]
    node_id: u8,
    #[default(1)]
    topics: u8,
    #[default(5000)]
    publish_interval_ms: u64,
    #[default(47000)]
    base_port: u16,
}

pub const NODE_ID_VAR: &str = "RADIOSUB_NODE_ID";
pub const TOPICS_VAR: &str = "RADIOSUB_TOPICS";
pub const INTERVAL_VAR: &str = "RADIOSUB_INTERVAL_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    pub node_id: NodeId,
    pub topics: TopicSet,
    pub publish_interval: Duration,
    pub base_port: u16,
    pub schedule: Schedule,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_id: NodeId(CONFIG.node_id),
            topics: TopicSet::from_bits_retain(CONFIG.topics),
            publish_interval: Duration::from_millis(CONFIG.publish_interval_ms),
            base_port: CONFIG.base_port,
            schedule: Schedule::default(),
        }
    }
}

impl ClientConfig {
    /// Build-time defaults with `RADIOSUB_*` environment overrides applied
    pub fn from_env() -> Result<Self, ClientError> {
        Self::default()
            .with_overrides(|var| std::env::var(var).ok())?
            .validate()
    }

    fn with_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ClientError> {
        if let Some(value) = lookup(NODE_ID_VAR) {
            self.node_id = NodeId(parse(NODE_ID_VAR, &value)?);
        }
        if let Some(value) = lookup(TOPICS_VAR) {
            self.topics =
                TopicSet::from_bits(parse(TOPICS_VAR, &value)?).ok_or(ClientError::Config {
                    var: TOPICS_VAR,
                    value,
                })?;
        }
        if let Some(value) = lookup(INTERVAL_VAR) {
            self.publish_interval = Duration::from_millis(parse(INTERVAL_VAR, &value)?);
        }
        Ok(self)
    }

    pub fn validate(self) -> Result<Self, ClientError> {
        if !self.node_id.is_client() {
            return Err(ClientError::InvalidNodeId(self.node_id));
        }
        if !TopicSet::all().contains(self.topics) {
            return Err(ClientError::Config {
                var: TOPICS_VAR,
                value: self.topics.bits().to_string(),
            });
        }
        if self.publish_interval.is_zero() {
            return Err(ClientError::Config {
                var: INTERVAL_VAR,
                value: "0".to_string(),
            });
        }
        Ok(self)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ClientError> {
    value.trim().parse().map_err(|_| ClientError::Config {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let vars: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_are_a_valid_client() {
        let config = ClientConfig::default().validate().expect("valid defaults");
        assert!(config.node_id.is_client());
        assert!(!config.publish_interval.is_zero());
    }

    #[test]
    fn env_overrides_apply() {
        let config = ClientConfig::default()
            .with_overrides(overrides(&[
                (NODE_ID_VAR, "5"),
                (TOPICS_VAR, "6"),
                (INTERVAL_VAR, " 250 "),
            ]))
            .expect("overrides parse");

        assert_eq!(config.node_id, NodeId(5));
        assert_eq!(config.topics, TopicSet::HUMIDITY | TopicSet::LUMINOSITY);
        assert_eq!(config.publish_interval, Duration::from_millis(250));
    }

    #[test]
    fn bad_overrides_are_rejected() {
        assert!(matches!(
            ClientConfig::default().with_overrides(overrides(&[(NODE_ID_VAR, "two")])),
            Err(ClientError::Config { var: NODE_ID_VAR, .. })
        ));

        let coordinator = ClientConfig::default()
            .with_overrides(overrides(&[(NODE_ID_VAR, "1")]))
            .expect("parses");
        assert!(matches!(
            coordinator.validate(),
            Err(ClientError::InvalidNodeId(NodeId(1)))
        ));

        let stalled = ClientConfig::default()
            .with_overrides(overrides(&[(INTERVAL_VAR, "0")]))
            .expect("parses");
        assert!(stalled.validate().is_err());
    }

    #[test]
    fn unknown_topic_bits_are_rejected() {
        for bits in ["8", "9", "255"] {
            assert!(matches!(
                ClientConfig::default().with_overrides(overrides(&[(TOPICS_VAR, bits)])),
                Err(ClientError::Config { var: TOPICS_VAR, value }) if value == bits
            ));
        }

        // a build-time value with stray bits fails validation instead
        let stray = ClientConfig {
            topics: TopicSet::from_bits_retain(0b1001),
            ..Default::default()
        };
        assert!(matches!(
            stray.validate(),
            Err(ClientError::Config { var: TOPICS_VAR, .. })
        ));

        let all = ClientConfig::default()
            .with_overrides(overrides(&[(TOPICS_VAR, "7")]))
            .expect("every topic");
        assert_eq!(all.validate().expect("valid").topics, TopicSet::all());
    }
}
