use std::collections::HashSet;
use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use udcn_core::Name;
use udcn_forwarder::{ConfigError, ForwarderConfig};

/// Scenario description: topology, static routes and applications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Settings shared by every node's forwarder
    #[serde(default)]
    pub forwarder: ForwarderConfig,
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub consumers: Vec<ConsumerConfig>,
    #[serde(default)]
    pub producers: Vec<ProducerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    /// Link-layer address of the node's link faces
    #[serde(default)]
    pub address: Option<String>,
}

/// Bidirectional point-to-point link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub a: String,
    pub b: String,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

/// Static FIB entry on `node` pointing at the link towards `next_hop`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub node: String,
    pub prefix: String,
    pub next_hop: String,
    #[serde(default)]
    pub cost: u32,
    /// Address put on Interests sent along this route
    #[serde(default)]
    pub target_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    pub node: String,
    pub prefix: String,
    /// Interests per second
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    #[serde(default = "default_lifetime_ms")]
    pub lifetime_ms: u64,
    #[serde(default)]
    pub must_be_fresh: bool,
    #[serde(default)]
    pub start_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub node: String,
    pub prefix: String,
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,
    pub freshness_ms: Option<u64>,
}

fn default_duration_ms() -> u64 {
    10_000
}

fn default_delay_ms() -> u64 {
    10
}

fn default_frequency() -> f64 {
    10.0
}

fn default_lifetime_ms() -> u64 {
    2000
}

fn default_payload_size() -> usize {
    1024
}

impl SimConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.forwarder.validate()?;

        let mut names = HashSet::new();
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                return Err(invalid(format!("duplicate node {:?}", node.name)));
            }
        }
        let known = |node: &str| -> Result<(), ConfigError> {
            if names.contains(node) {
                Ok(())
            } else {
                Err(invalid(format!("unknown node {:?}", node)))
            }
        };

        let mut neighbours = HashSet::new();
        for link in &self.links {
            known(&link.a)?;
            known(&link.b)?;
            if link.a == link.b {
                return Err(invalid(format!("link from {:?} to itself", link.a)));
            }
            neighbours.insert((link.a.as_str(), link.b.as_str()));
            neighbours.insert((link.b.as_str(), link.a.as_str()));
        }

        for route in &self.routes {
            known(&route.node)?;
            parse_prefix(&route.prefix)?;
            if !neighbours.contains(&(route.node.as_str(), route.next_hop.as_str())) {
                return Err(invalid(format!(
                    "route {} on {:?}: {:?} is not a neighbour",
                    route.prefix, route.node, route.next_hop
                )));
            }
        }

        for consumer in &self.consumers {
            known(&consumer.node)?;
            parse_prefix(&consumer.prefix)?;
            if !(consumer.frequency > 0.0 && consumer.frequency <= 1_000_000.0) {
                return Err(invalid(format!(
                    "consumer on {:?}: frequency must be in (0, 1000000]",
                    consumer.node
                )));
            }
        }

        for producer in &self.producers {
            known(&producer.node)?;
            parse_prefix(&producer.prefix)?;
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl ConsumerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency)
    }
}

pub fn parse_prefix(prefix: &str) -> Result<Name, ConfigError> {
    Name::from_str(prefix).map_err(|e| invalid(format!("prefix {:?}: {}", prefix, e)))
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}
