//! CIDR network prefixes.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IP network such as `10.0.1.0/24` or `2001:db8::/64`.
///
/// The stored address is always the network address: host bits are cleared
/// on construction, so `10.0.1.7/24` and `10.0.1.0/24` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    network: IpAddr,
    prefix_len: u8,
}

impl IpPrefix {
    /// Builds the prefix of length `prefix_len` containing `address`.
    pub fn new(address: IpAddr, prefix_len: u8) -> Result<Self, ParseError> {
        let width = match address {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > width {
            return Err(ParseError::InvalidIpPrefix(format!(
                "{address}/{prefix_len}: length exceeds {width} bits"
            )));
        }

        Ok(Self {
            network: truncate(address, prefix_len),
            prefix_len,
        })
    }

    pub const fn network(&self) -> IpAddr {
        self.network
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns true if `addr` is inside this network.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                truncate(addr, self.prefix_len) == self.network
            }
            _ => false,
        }
    }
}

/// Clears every bit of `addr` past the first `len`.
fn truncate(addr: IpAddr, len: u8) -> IpAddr {
    let len = u32::from(len);
    match addr {
        IpAddr::V4(v4) => {
            let keep = u32::MAX.checked_shl(32 - len).unwrap_or(0);
            Ipv4Addr::from(u32::from(v4) & keep).into()
        }
        IpAddr::V6(v6) => {
            let keep = u128::MAX.checked_shl(128 - len).unwrap_or(0);
            Ipv6Addr::from(u128::from(v6) & keep).into()
        }
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((addr, len)) = s.split_once('/') else {
            return Err(ParseError::InvalidIpPrefix(s.to_string()));
        };

        let address = addr
            .parse::<IpAddr>()
            .map_err(|_| ParseError::InvalidIpAddress(addr.to_string()))?;

        // u8::from_str would accept a leading '+'
        if len.is_empty() || len.len() > 3 || !len.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidIpPrefix(s.to_string()));
        }
        let len = len
            .parse::<u8>()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        Self::new(address, len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> Self {
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_subnet_cidr() {
        let subnet = prefix("10.0.1.0/24");
        assert_eq!(subnet.network(), IpAddr::V4(Ipv4Addr::new(10, 0, 1, 0)));
        assert_eq!(subnet.prefix_len(), 24);
        assert_eq!(subnet.to_string(), "10.0.1.0/24");
    }

    #[test]
    fn test_host_bits_cleared() {
        assert_eq!(prefix("10.0.1.7/24"), prefix("10.0.1.0/24"));
        assert_eq!(prefix("172.31.77.200/20").to_string(), "172.31.64.0/20");
        assert_eq!(prefix("2001:db8::17/64").to_string(), "2001:db8::/64");
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(prefix("192.168.4.4/0").to_string(), "0.0.0.0/0");
        assert_eq!(prefix("192.168.4.4/32").to_string(), "192.168.4.4/32");
        assert_eq!(prefix("::1/128").to_string(), "::1/128");
    }

    #[test]
    fn test_contains() {
        let subnet = prefix("10.0.1.0/24");
        assert!(subnet.contains("10.0.1.5".parse().unwrap()));
        assert!(!subnet.contains("10.0.2.5".parse().unwrap()));
        assert!(!subnet.contains("::a00:105".parse().unwrap()));
        assert!(prefix("0.0.0.0/0").contains("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn test_serde_as_string() {
        let subnet: IpPrefix = serde_json::from_str("\"10.0.1.9/24\"").unwrap();
        assert_eq!(serde_json::to_string(&subnet).unwrap(), "\"10.0.1.0/24\"");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "10.0.1.0/33",
            "2001:db8::/129",
            "10.0.1.0",
            "10.0.1/24",
            "10.0.1.0/",
            "10.0.1.0/+8",
            "10.0.1.0/0024",
            "10.0.1.0/24/8",
            "subnet-0",
        ] {
            assert!(bad.parse::<IpPrefix>().is_err(), "{bad:?} parsed");
        }
    }
}
