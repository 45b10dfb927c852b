//! Hardware address type with safe parsing and formatting.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hardware address of an interface.
///
/// The cloud provider assigns it once per interface and the kernel reports
/// the same value for the attached link, so it is the stable key used to
/// match node metadata against kernel-visible devices.
///
/// # Examples
///
/// ```
/// use eni_types::MacAddress;
///
/// let mac: MacAddress = "0a:1b:2c:3d:4e:5f".parse().unwrap();
/// assert_eq!(mac.to_string(), "0a:1b:2c:3d:4e:5f");
///
/// // Cloud metadata sometimes reports upper case with hyphens
/// let same: MacAddress = "0A-1B-2C-3D-4E-5F".parse().unwrap();
/// assert_eq!(mac, same);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; MAC_LEN]);

const MAC_LEN: usize = 6;

impl MacAddress {
    /// 00:00:00:00:00:00, reported by loopback.
    pub const ZERO: MacAddress = MacAddress([0; MAC_LEN]);

    /// Creates an address from its six octets.
    pub const fn new(octets: [u8; MAC_LEN]) -> Self {
        MacAddress(octets)
    }

    /// The six address octets.
    pub const fn octets(&self) -> [u8; MAC_LEN] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, octet) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{octet:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    /// Accepts six groups of one or two hex digits separated consistently by
    /// `:` or `-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMacAddress(s.to_string());

        let sep = match (s.contains(':'), s.contains('-')) {
            (true, false) => ':',
            (false, true) => '-',
            _ => return Err(invalid()),
        };

        let mut octets = [0u8; MAC_LEN];
        let mut groups = s.split(sep);
        for octet in octets.iter_mut() {
            let group = groups.next().ok_or_else(invalid)?;
            if !(1..=2).contains(&group.len()) || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
        }
        if groups.next().is_some() {
            return Err(invalid());
        }

        Ok(MacAddress(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Converts a raw hardware address as reported by the kernel.
///
/// Links whose hardware address is not six bytes long (tunnels, some
/// virtual devices) are rejected.
impl TryFrom<&[u8]> for MacAddress {
    type Error = ParseError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        <[u8; MAC_LEN]>::try_from(raw)
            .map(MacAddress)
            .map_err(|_| {
                ParseError::InvalidMacAddress(format!("{} byte hardware address", raw.len()))
            })
    }
}

impl From<[u8; MAC_LEN]> for MacAddress {
    fn from(octets: [u8; MAC_LEN]) -> Self {
        MacAddress::new(octets)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_separators() {
        let expected = MacAddress::new([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
        for input in ["02:11:22:33:44:55", "02-11-22-33-44-55", "2:11:22:33:44:55"] {
            assert_eq!(input.parse::<MacAddress>().unwrap(), expected);
        }
    }

    #[test]
    fn test_new_keeps_octet_order() {
        let mac = MacAddress::new([0x0a, 0, 0, 0, 0, 0x07]);
        assert_eq!(mac.octets(), [0x0a, 0, 0, 0, 0, 0x07]);
        assert_eq!(mac, MacAddress::from([0x0a, 0, 0, 0, 0, 0x07]));
        assert_eq!(mac.to_string(), "0a:00:00:00:00:07");
    }

    #[test]
    fn test_display_is_lowercase() {
        let mac: MacAddress = "0A:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(mac.to_string(), "0a:bb:cc:dd:ee:ff");
        assert_eq!(MacAddress::ZERO.to_string(), "00:00:00:00:00:00");
    }

    #[test]
    fn test_from_kernel_bytes() {
        let raw = vec![0x0a, 0x00, 0x00, 0x00, 0x00, 0x01];
        let mac = MacAddress::try_from(raw.as_slice()).unwrap();
        assert_eq!(mac, MacAddress::from([0x0a, 0, 0, 0, 0, 1]));

        // IPv4 tunnels report 4 bytes, infiniband 20
        assert!(MacAddress::try_from([0u8; 4].as_slice()).is_err());
        assert!(MacAddress::try_from([0u8; 20].as_slice()).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let mac: MacAddress = serde_json::from_str("\"0a:1b:2c:3d:4e:5f\"").unwrap();
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"0a:1b:2c:3d:4e:5f\"");
        assert!(serde_json::from_str::<MacAddress>("\"not-a-mac\"").is_err());
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "0a1b2c3d4e5f",
            "0a:1b:2c:3d:4e",
            "0a:1b:2c:3d:4e:5f:60",
            "0a:1b-2c:3d:4e:5f",
            "0a:1b:2c:3d:4e:zz",
            "0a:1b:2c:3d:4e:+f",
            "0a:1b:2c:3d::5f",
            "00a:1b:2c:3d:4e:5f",
        ] {
            assert!(bad.parse::<MacAddress>().is_err(), "{bad:?} parsed");
        }
    }
}
