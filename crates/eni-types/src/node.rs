//! Node snapshot model.
//!
//! These types mirror the ENI portion of the node resource delivered by the
//! resource watch layer. Address fields stay as strings: a malformed value
//! must only disqualify its own interface, never the whole snapshot.

use crate::MacAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ENI-related node specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EniSpec {
    /// Interfaces with a device number below this index are left alone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_interface_index: Option<u32>,

    /// Interfaces carrying any of these tags are left alone
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exclude_interface_tags: BTreeMap<String, String>,

    /// Overrides the agent default for using the primary address directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_primary_address: Option<bool>,
}

impl EniSpec {
    /// Resolves the primary-address policy against the agent default.
    pub fn use_primary_address_or(&self, default: bool) -> bool {
        self.use_primary_address.unwrap_or(default)
    }
}

/// Subnet an interface is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EniSubnet {
    #[serde(default)]
    pub id: String,

    /// Subnet in CIDR notation, unparsed
    #[serde(default)]
    pub cidr: String,
}

/// One cloud-attached interface as reported in node status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eni {
    #[serde(default)]
    pub id: String,

    pub mac: MacAddress,

    /// Primary IP address, unparsed
    #[serde(default)]
    pub ip: String,

    /// Device index of the attachment
    #[serde(default)]
    pub number: u32,

    #[serde(default)]
    pub subnet: EniSubnet,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Secondary addresses allocated on the interface
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl Eni {
    /// Returns true if the node specification excludes this interface from
    /// agent management.
    pub fn is_excluded_by_spec(&self, spec: &EniSpec) -> bool {
        if let Some(first) = spec.first_interface_index {
            if self.number < first {
                return true;
            }
        }

        spec.exclude_interface_tags
            .iter()
            .any(|(key, value)| self.tags.get(key) == Some(value))
    }
}

/// ENI status of a node, keyed by interface name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EniStatus {
    #[serde(default)]
    pub enis: BTreeMap<String, Eni>,
}

/// A point-in-time view of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub spec: EniSpec,

    #[serde(default)]
    pub status: EniStatus,
}

impl NodeSnapshot {
    /// Returns true if an interface with this name is recorded in status.
    pub fn has_eni(&self, name: &str) -> bool {
        self.status.enis.contains_key(name)
    }
}
