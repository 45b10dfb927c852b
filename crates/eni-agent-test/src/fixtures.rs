//! Test fixtures for node snapshots
//!
//! Provides builders for the node snapshots the agent diffs on every update

use eni_types::{Eni, EniSpec, EniSubnet, NodeSnapshot};
use std::collections::BTreeMap;

/// Builder for a single interface record
#[derive(Debug, Clone)]
pub struct EniBuilder {
    eni: Eni,
}

impl EniBuilder {
    /// Create a record with the given MAC, primary IP and subnet
    pub fn new(mac: &str, ip: &str, cidr: &str) -> Self {
        Self {
            eni: Eni {
                id: format!("eni-{}", mac.replace(':', "")),
                mac: mac.parse().expect("valid MAC address"),
                ip: ip.to_string(),
                number: 0,
                subnet: EniSubnet {
                    id: "subnet-0".to_string(),
                    cidr: cidr.to_string(),
                },
                tags: BTreeMap::new(),
                addresses: vec![ip.to_string()],
            },
        }
    }

    /// Set the device index on the instance
    pub fn number(mut self, number: u32) -> Self {
        self.eni.number = number;
        self
    }

    /// Add a provider tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.eni.tags.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Eni {
        self.eni
    }
}

/// Builder for a node snapshot
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    node: NodeSnapshot,
}

impl NodeBuilder {
    /// Create an empty node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            node: NodeSnapshot {
                name: name.into(),
                spec: EniSpec::default(),
                status: Default::default(),
            },
        }
    }

    /// Add an interface record under `name`
    pub fn eni(mut self, name: impl Into<String>, eni: Eni) -> Self {
        self.node.status.enis.insert(name.into(), eni);
        self
    }

    /// Add an interface record built from MAC, IP and subnet
    pub fn with_eni(self, name: &str, mac: &str, ip: &str, cidr: &str) -> Self {
        self.eni(name, EniBuilder::new(mac, ip, cidr).build())
    }

    /// Set the per-node primary address override
    pub fn use_primary_address(mut self, enabled: bool) -> Self {
        self.node.spec.use_primary_address = Some(enabled);
        self
    }

    /// Exclude interfaces below this device index
    pub fn first_interface_index(mut self, index: u32) -> Self {
        self.node.spec.first_interface_index = Some(index);
        self
    }

    /// Exclude interfaces carrying this tag
    pub fn exclude_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.node
            .spec
            .exclude_interface_tags
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> NodeSnapshot {
        self.node
    }
}

/// Common interface fixtures, one per subnet
pub mod eni_fixtures {
    use super::*;

    pub const ETH1_MAC: &str = "0a:00:00:00:00:01";
    pub const ETH2_MAC: &str = "0a:00:00:00:00:02";
    pub const ETH3_MAC: &str = "0a:00:00:00:00:03";

    /// Node with eth1 in 10.0.1.0/24
    pub fn node_with_eth1() -> NodeSnapshot {
        NodeBuilder::new("node-a")
            .with_eni("eth1", ETH1_MAC, "10.0.1.5", "10.0.1.0/24")
            .build()
    }

    /// Node with eth1 and eth2 in separate subnets
    pub fn node_with_eth1_eth2() -> NodeSnapshot {
        NodeBuilder::new("node-a")
            .with_eni("eth1", ETH1_MAC, "10.0.1.5", "10.0.1.0/24")
            .with_eni("eth2", ETH2_MAC, "10.0.2.5", "10.0.2.0/24")
            .build()
    }
}
