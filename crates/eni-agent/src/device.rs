//! Per-device configuration derived from node status.

use crate::error::{EniError, Result};
use eni_types::{Eni, IpPrefix, MacAddress, ParseError};
use std::collections::HashMap;
use std::net::IpAddr;

/// Configuration applied to one newly attached device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Interface name as recorded in node status
    pub name: String,
    /// Primary IP address
    pub ip: IpAddr,
    /// Subnet the interface is attached to
    pub cidr: IpPrefix,
    /// Target MTU
    pub mtu: u32,
    /// When true the primary address is already usable and only MTU and
    /// link state are configured
    pub use_primary_ip: bool,
}

/// Devices awaiting configuration in one reconciliation, keyed by MAC.
pub type PendingSet = HashMap<MacAddress, DeviceConfig>;

/// Builds the device configuration for one interface record.
pub fn parse_device_config(
    name: &str,
    eni: &Eni,
    mtu: u32,
    use_primary_ip: bool,
) -> Result<DeviceConfig> {
    let ip: IpAddr = eni
        .ip
        .parse()
        .map_err(|_| EniError::InvalidDeviceConfig {
            name: name.to_string(),
            field: "primary ip",
            value: eni.ip.clone(),
            source: ParseError::InvalidIpAddress(eni.ip.clone()),
        })?;

    let cidr: IpPrefix = eni
        .subnet
        .cidr
        .parse()
        .map_err(|source| EniError::InvalidDeviceConfig {
            name: name.to_string(),
            field: "subnet cidr",
            value: eni.subnet.cidr.clone(),
            source,
        })?;

    Ok(DeviceConfig {
        name: name.to_string(),
        ip,
        cidr,
        mtu,
        use_primary_ip,
    })
}
