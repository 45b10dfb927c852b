//! Common types for the ENI device agent.
//!
//! This crate provides type-safe representations of the values exchanged
//! between the node resource layer and the node-local device pipeline:
//!
//! - [`MacAddress`]: 48-bit hardware address, the join key between cloud
//!   metadata and kernel links
//! - [`IpPrefix`]: subnet in CIDR notation with host bits cleared
//! - [`NodeSnapshot`]: a point-in-time view of a node's ENI spec and status

mod mac;
mod node;
mod prefix;

pub use mac::MacAddress;
pub use node::{Eni, EniSpec, EniStatus, EniSubnet, NodeSnapshot};
pub use prefix::IpPrefix;

/// A value from node metadata or the kernel could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed MAC address {0:?}")]
    InvalidMacAddress(String),

    #[error("malformed IP address {0:?}")]
    InvalidIpAddress(String),

    #[error("malformed CIDR {0:?}")]
    InvalidIpPrefix(String),
}
