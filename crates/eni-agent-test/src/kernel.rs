//! In-memory fake kernel.
//!
//! Links can be scheduled to appear after a number of enumerations to
//! simulate asynchronous attachment. Address assignment installs the subnet
//! route the real kernel would add, and repeated assignment or deletion
//! returns EEXIST/ESRCH, so idempotency handling is exercised without
//! scripting. Explicit failures can be injected per operation and device.

use async_trait::async_trait;
use eni_agent::{EniError, KernelError, Link, LinkOps, RouteSpec, Sysctl, RT_TABLE_MAIN};
use eni_types::{IpPrefix, MacAddress};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::net::IpAddr;

/// Kernel operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelOp {
    SetMtu,
    SetUp,
    AddAddress,
    DeleteRoute,
    Sysctl,
}

/// A recorded call against the fake kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelCall {
    ListLinks,
    SetMtu { device: String, mtu: u32 },
    SetUp { device: String },
    AddAddress { device: String, address: IpAddr, prefix_len: u8 },
    DeleteRoute { route: RouteSpec },
    SysctlWrite { path: String, value: String },
}

impl KernelCall {
    /// Device the call applies to, if any. Route deletions are matched by
    /// the device holding the route's source address.
    pub fn device(&self) -> Option<&str> {
        match self {
            KernelCall::SetMtu { device, .. }
            | KernelCall::SetUp { device }
            | KernelCall::AddAddress { device, .. } => Some(device),
            KernelCall::SysctlWrite { path, .. } => path.split('.').nth(3),
            KernelCall::ListLinks | KernelCall::DeleteRoute { .. } => None,
        }
    }
}

/// Observable state of one fake link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeLinkState {
    pub mtu: u32,
    pub up: bool,
    pub addresses: Vec<(IpAddr, u8)>,
}

#[derive(Debug)]
struct FakeLink {
    link: Link,
    state: FakeLinkState,
    /// Number of enumerations before the link becomes visible
    appears_after: u32,
}

#[derive(Debug, Default)]
struct State {
    links: Vec<FakeLink>,
    routes: HashSet<RouteSpec>,
    sysctls: BTreeMap<String, String>,
    calls: Vec<KernelCall>,
    list_count: u32,
    list_failures: u32,
    failures: HashMap<(KernelOp, String), i32>,
}

impl State {
    fn visible_mut(&mut self, index: u32) -> Option<&mut FakeLink> {
        let count = self.list_count;
        self.links
            .iter_mut()
            .find(|l| l.link.index == index && l.appears_after <= count)
    }

    fn injected(&self, op: KernelOp, device: &str) -> Option<i32> {
        self.failures.get(&(op, device.to_string())).copied()
    }
}

/// Fake kernel shared by the agent under test and the test body.
#[derive(Debug, Default)]
pub struct FakeKernel {
    state: Mutex<State>,
}

impl FakeKernel {
    /// Creates a kernel with only a loopback link.
    pub fn new() -> Self {
        let kernel = Self::default();
        kernel.add_link(1, "lo", Some(MacAddress::ZERO), 0);
        kernel
    }

    /// Adds a link that is visible immediately.
    pub fn with_link(self, index: u32, name: &str, mac: &str) -> Self {
        self.add_link(index, name, Some(parse_mac(mac)), 0);
        self
    }

    /// Adds a link that becomes visible after `lists` enumerations.
    pub fn with_late_link(self, index: u32, name: &str, mac: &str, lists: u32) -> Self {
        self.add_link(index, name, Some(parse_mac(mac)), lists);
        self
    }

    /// Makes the next `count` enumerations fail with EBUSY.
    pub fn with_list_failures(self, count: u32) -> Self {
        self.state.lock().list_failures = count;
        self
    }

    /// Makes `op` on `device` fail with `errno` until cleared.
    pub fn with_failure(self, op: KernelOp, device: &str, errno: i32) -> Self {
        self.state
            .lock()
            .failures
            .insert((op, device.to_string()), errno);
        self
    }

    /// Pre-creates a kernel parameter file.
    pub fn with_sysctl(self, path: &str, value: &str) -> Self {
        self.state
            .lock()
            .sysctls
            .insert(path.to_string(), value.to_string());
        self
    }

    fn add_link(&self, index: u32, name: &str, mac: Option<MacAddress>, appears_after: u32) {
        self.state.lock().links.push(FakeLink {
            link: Link {
                index,
                name: name.to_string(),
                mac,
            },
            state: FakeLinkState {
                mtu: 1500,
                ..Default::default()
            },
            appears_after,
        });
    }

    /// Removes an injected failure.
    pub fn clear_failure(&self, op: KernelOp, device: &str) {
        self.state.lock().failures.remove(&(op, device.to_string()));
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<KernelCall> {
        self.state.lock().calls.clone()
    }

    /// Calls other than link enumeration, in order.
    pub fn mutations(&self) -> Vec<KernelCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, KernelCall::ListLinks))
            .collect()
    }

    /// Number of link enumerations performed.
    pub fn list_count(&self) -> u32 {
        self.state.lock().list_count
    }

    /// Current state of the named link.
    pub fn link_state(&self, name: &str) -> Option<FakeLinkState> {
        self.state
            .lock()
            .links
            .iter()
            .find(|l| l.link.name == name)
            .map(|l| l.state.clone())
    }

    /// Returns true if a route with this destination and source exists in
    /// the main table.
    pub fn has_route(&self, destination: &str, source: &str) -> bool {
        let route = RouteSpec {
            destination: destination.parse().expect("valid prefix"),
            source: source.parse().expect("valid address"),
            table: RT_TABLE_MAIN,
        };
        self.state.lock().routes.contains(&route)
    }

    /// Current value of a kernel parameter, by dotted name.
    pub fn sysctl_value(&self, path: &str) -> Option<String> {
        self.state.lock().sysctls.get(path).cloned()
    }
}

fn parse_mac(mac: &str) -> MacAddress {
    mac.parse().expect("valid MAC address")
}

#[async_trait]
impl LinkOps for FakeKernel {
    async fn list_links(&self) -> Result<Vec<Link>, KernelError> {
        let mut state = self.state.lock();
        state.calls.push(KernelCall::ListLinks);
        if state.list_failures > 0 {
            state.list_failures -= 1;
            return Err(KernelError::from_errno("link list", libc::EBUSY));
        }

        state.list_count += 1;
        let count = state.list_count;
        Ok(state
            .links
            .iter()
            .filter(|l| l.appears_after < count)
            .map(|l| l.link.clone())
            .collect())
    }

    async fn set_mtu(&self, link: &Link, mtu: u32) -> Result<(), KernelError> {
        let mut state = self.state.lock();
        state.calls.push(KernelCall::SetMtu {
            device: link.name.clone(),
            mtu,
        });
        if let Some(errno) = state.injected(KernelOp::SetMtu, &link.name) {
            return Err(KernelError::from_errno("link set mtu", errno));
        }
        let fake = state
            .visible_mut(link.index)
            .ok_or_else(|| KernelError::from_errno("link set mtu", libc::ENODEV))?;
        fake.state.mtu = mtu;
        Ok(())
    }

    async fn set_up(&self, link: &Link) -> Result<(), KernelError> {
        let mut state = self.state.lock();
        state.calls.push(KernelCall::SetUp {
            device: link.name.clone(),
        });
        if let Some(errno) = state.injected(KernelOp::SetUp, &link.name) {
            return Err(KernelError::from_errno("link set up", errno));
        }
        let fake = state
            .visible_mut(link.index)
            .ok_or_else(|| KernelError::from_errno("link set up", libc::ENODEV))?;
        fake.state.up = true;
        Ok(())
    }

    async fn add_address(
        &self,
        link: &Link,
        address: IpAddr,
        prefix_len: u8,
    ) -> Result<(), KernelError> {
        let mut state = self.state.lock();
        state.calls.push(KernelCall::AddAddress {
            device: link.name.clone(),
            address,
            prefix_len,
        });
        if let Some(errno) = state.injected(KernelOp::AddAddress, &link.name) {
            return Err(KernelError::from_errno("address add", errno));
        }
        let fake = state
            .visible_mut(link.index)
            .ok_or_else(|| KernelError::from_errno("address add", libc::ENODEV))?;
        if fake.state.addresses.contains(&(address, prefix_len)) {
            return Err(KernelError::from_errno("address add", libc::EEXIST));
        }
        fake.state.addresses.push((address, prefix_len));

        let subnet = IpPrefix::new(address, prefix_len)
            .map_err(|e| KernelError::new("address add", Some(libc::EINVAL), e.to_string()))?;
        state.routes.insert(RouteSpec::subnet_route(subnet, address));
        Ok(())
    }

    async fn delete_route(&self, route: &RouteSpec) -> Result<(), KernelError> {
        let mut state = self.state.lock();
        state.calls.push(KernelCall::DeleteRoute { route: *route });

        let owner = state
            .links
            .iter()
            .find(|l| l.state.addresses.iter().any(|(a, _)| *a == route.source))
            .map(|l| l.link.name.clone());
        if let Some(errno) = owner
            .as_deref()
            .and_then(|device| state.injected(KernelOp::DeleteRoute, device))
        {
            return Err(KernelError::from_errno("route del", errno));
        }

        if state.routes.remove(route) {
            Ok(())
        } else {
            Err(KernelError::from_errno("route del", libc::ESRCH))
        }
    }
}

impl Sysctl for FakeKernel {
    fn write(&self, path: &[String], value: &str) -> eni_agent::Result<()> {
        let name = path.join(".");
        let mut state = self.state.lock();
        state.calls.push(KernelCall::SysctlWrite {
            path: name.clone(),
            value: value.to_string(),
        });

        let device = path.get(3).map(String::as_str).unwrap_or_default();
        if let Some(errno) = state.injected(KernelOp::Sysctl, device) {
            return Err(EniError::Sysctl {
                path: name,
                source: io::Error::from_raw_os_error(errno),
            });
        }
        state.sysctls.insert(name, value.to_string());
        Ok(())
    }

    fn read(&self, path: &[String]) -> eni_agent::Result<String> {
        let name = path.join(".");
        self.state
            .lock()
            .sysctls
            .get(&name)
            .cloned()
            .ok_or_else(|| EniError::Sysctl {
                path: name,
                source: io::Error::from(io::ErrorKind::NotFound),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(index: u32, name: &str) -> Link {
        Link {
            index,
            name: name.to_string(),
            mac: None,
        }
    }

    #[tokio::test]
    async fn test_late_link_appears_after_lists() {
        let kernel = FakeKernel::new().with_late_link(3, "eth1", "0a:00:00:00:00:01", 2);

        assert_eq!(kernel.list_links().await.unwrap().len(), 1);
        assert_eq!(kernel.list_links().await.unwrap().len(), 1);
        assert_eq!(kernel.list_links().await.unwrap().len(), 2);
        assert_eq!(kernel.list_count(), 3);
    }

    #[tokio::test]
    async fn test_list_failures() {
        let kernel = FakeKernel::new().with_list_failures(1);
        assert!(kernel.list_links().await.is_err());
        assert!(kernel.list_links().await.is_ok());
    }

    #[tokio::test]
    async fn test_address_and_route_idempotency() {
        let kernel = FakeKernel::new().with_link(3, "eth1", "0a:00:00:00:00:01");
        let eth1 = link(3, "eth1");
        let ip: IpAddr = "10.0.1.5".parse().unwrap();

        kernel.add_address(&eth1, ip, 24).await.unwrap();
        assert!(kernel.has_route("10.0.1.0/24", "10.0.1.5"));
        let again = kernel.add_address(&eth1, ip, 24).await.unwrap_err();
        assert!(again.is_already_exists());

        let route = RouteSpec::subnet_route("10.0.1.0/24".parse().unwrap(), ip);
        kernel.delete_route(&route).await.unwrap();
        let again = kernel.delete_route(&route).await.unwrap_err();
        assert!(again.is_no_such_entry());
    }

    #[tokio::test]
    async fn test_invisible_link_is_enodev() {
        let kernel = FakeKernel::new().with_late_link(3, "eth1", "0a:00:00:00:00:01", 5);
        let err = kernel.set_mtu(&link(3, "eth1"), 9001).await.unwrap_err();
        assert_eq!(err.errno, Some(libc::ENODEV));
    }

    #[test]
    fn test_sysctl_round_trip() {
        let kernel = FakeKernel::new();
        let path: Vec<String> = ["net", "ipv4", "conf", "eth1", "rp_filter"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        kernel.disable(&path).unwrap();
        assert_eq!(kernel.read(&path).unwrap(), "0");
        assert_eq!(kernel.calls()[0].device(), Some("eth1"));
    }
}
