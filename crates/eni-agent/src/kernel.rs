//! Kernel link capability interface.
//!
//! The reconciliation pipeline only talks to the kernel through [`LinkOps`].
//! [`crate::netlink::RtNetlinkOps`] implements it over rtnetlink; tests use
//! a fake that simulates delayed attachment and errno outcomes.

use async_trait::async_trait;
use eni_types::{IpPrefix, MacAddress};
use std::fmt;
use std::net::IpAddr;

pub use crate::error::KernelError;

/// Main routing table id (RT_TABLE_MAIN).
pub const RT_TABLE_MAIN: u32 = 254;

/// Snapshot of one kernel link, valid for the duration of a single
/// configuration call. The kernel owns the device; this is only a reference
/// by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Interface index
    pub index: u32,
    /// Interface name
    pub name: String,
    /// Hardware address, absent for links without a 6-byte address
    pub mac: Option<MacAddress>,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (index {})", self.name, self.index)
    }
}

/// A link-scoped route identified by destination, preferred source and table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteSpec {
    pub destination: IpPrefix,
    pub source: IpAddr,
    pub table: u32,
}

impl RouteSpec {
    /// The subnet route the kernel installs when `source` is assigned within
    /// `destination`.
    pub fn subnet_route(destination: IpPrefix, source: IpAddr) -> Self {
        Self {
            destination,
            source,
            table: RT_TABLE_MAIN,
        }
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} src {} table {} scope link",
            self.destination, self.source, self.table
        )
    }
}

/// Narrow set of kernel link operations used by the device pipeline.
///
/// Implementations report errno through [`KernelError`] so callers can treat
/// EEXIST on address assignment and ESRCH on route deletion as success.
#[async_trait]
pub trait LinkOps: Send + Sync {
    /// Enumerates all kernel links.
    async fn list_links(&self) -> Result<Vec<Link>, KernelError>;

    /// Sets the link MTU.
    async fn set_mtu(&self, link: &Link, mtu: u32) -> Result<(), KernelError>;

    /// Sets the link administratively up.
    async fn set_up(&self, link: &Link) -> Result<(), KernelError>;

    /// Assigns `address/prefix_len` to the link.
    async fn add_address(
        &self,
        link: &Link,
        address: IpAddr,
        prefix_len: u8,
    ) -> Result<(), KernelError>;

    /// Deletes a link-scoped route.
    async fn delete_route(&self, route: &RouteSpec) -> Result<(), KernelError>;
}
