//! Detection of newly attached interfaces between two node snapshots.

use crate::device::{PendingSet, parse_device_config};
use crate::mtu::MtuConfiguration;
use eni_types::NodeSnapshot;
use tracing::{error, warn};

/// Computes the set of devices needing configuration.
///
/// An interface from `current` is selected when it is not excluded by the
/// current node spec and no interface with the same name exists in `prior`.
/// A record with a malformed address or subnet is logged and skipped without
/// affecting the others. The function has no side effects beyond logging.
pub fn detect_new_devices(
    prior: Option<&NodeSnapshot>,
    current: &NodeSnapshot,
    mtu: &dyn MtuConfiguration,
    default_use_primary: bool,
) -> PendingSet {
    let use_primary = current.spec.use_primary_address_or(default_use_primary);
    let device_mtu = mtu.device_mtu();
    let mut pending = PendingSet::new();

    for (name, eni) in &current.status.enis {
        if eni.is_excluded_by_spec(&current.spec) {
            continue;
        }

        if prior.is_some_and(|node| node.has_eni(name)) {
            continue;
        }

        let cfg = match parse_device_config(name, eni, device_mtu, use_primary) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!(error = %e, device = %name, "Skipping invalid ENI device config");
                continue;
            }
        };

        if let Some(previous) = pending.insert(eni.mac, cfg) {
            warn!(
                mac = %eni.mac,
                device = %name,
                replaced = %previous.name,
                "Multiple ENIs share a MAC address"
            );
        }
    }

    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtu::{MockMtuConfiguration, StaticMtu};
    use eni_types::{Eni, EniSubnet, MacAddress};
    use pretty_assertions::assert_eq;

    fn eni(mac: &str, ip: &str, cidr: &str, number: u32) -> Eni {
        Eni {
            id: format!("eni-{number}"),
            mac: mac.parse().unwrap(),
            ip: ip.to_string(),
            number,
            subnet: EniSubnet {
                id: "subnet-1".to_string(),
                cidr: cidr.to_string(),
            },
            tags: Default::default(),
            addresses: Vec::new(),
        }
    }

    fn node(enis: Vec<(&str, Eni)>) -> NodeSnapshot {
        let mut node = NodeSnapshot {
            name: "node-a".to_string(),
            ..Default::default()
        };
        for (name, eni) in enis {
            node.status.enis.insert(name.to_string(), eni);
        }
        node
    }

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_first_observation_selects_all() {
        let current = node(vec![(
            "eth1",
            eni("0a:00:00:00:00:01", "10.0.1.5", "10.0.1.0/24", 1),
        )]);

        let pending = detect_new_devices(None, &current, &StaticMtu(9001), false);

        assert_eq!(pending.len(), 1);
        let cfg = &pending[&mac("0a:00:00:00:00:01")];
        assert_eq!(cfg.name, "eth1");
        assert_eq!(cfg.ip.to_string(), "10.0.1.5");
        assert_eq!(cfg.cidr.to_string(), "10.0.1.0/24");
        assert_eq!(cfg.mtu, 9001);
        assert!(!cfg.use_primary_ip);
    }

    #[test]
    fn test_known_name_is_skipped() {
        let record = eni("0a:00:00:00:00:01", "10.0.1.5", "10.0.1.0/24", 1);
        let prior = node(vec![("eth1", record.clone())]);
        let current = node(vec![("eth1", record)]);

        let pending = detect_new_devices(Some(&prior), &current, &StaticMtu(9001), false);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_only_new_names_are_selected() {
        let prior = node(vec![(
            "eth1",
            eni("0a:00:00:00:00:01", "10.0.1.5", "10.0.1.0/24", 1),
        )]);
        let current = node(vec![
            ("eth1", eni("0a:00:00:00:00:01", "10.0.1.5", "10.0.1.0/24", 1)),
            ("eth2", eni("0a:00:00:00:00:02", "10.0.2.5", "10.0.2.0/24", 2)),
        ]);

        let pending = detect_new_devices(Some(&prior), &current, &StaticMtu(9001), false);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[&mac("0a:00:00:00:00:02")].name, "eth2");
    }

    #[test]
    fn test_malformed_record_is_isolated() {
        let current = node(vec![
            ("eth1", eni("0a:00:00:00:00:01", "10.0.1.5", "10.0.1.0/24", 1)),
            ("eth2", eni("0a:00:00:00:00:02", "10.0.2.5", "10.0.2.0/99", 2)),
            ("eth3", eni("0a:00:00:00:00:03", "not-an-ip", "10.0.3.0/24", 3)),
        ]);

        let pending = detect_new_devices(None, &current, &StaticMtu(9001), false);
        assert_eq!(pending.len(), 1);
        assert!(pending.contains_key(&mac("0a:00:00:00:00:01")));
    }

    #[test]
    fn test_excluded_record_never_selected() {
        let mut current = node(vec![
            ("eth0", eni("0a:00:00:00:00:00", "10.0.0.5", "10.0.0.0/24", 0)),
            ("eth1", eni("0a:00:00:00:00:01", "10.0.1.5", "10.0.1.0/24", 1)),
        ]);
        current.spec.first_interface_index = Some(1);

        let pending = detect_new_devices(None, &current, &StaticMtu(9001), false);
        assert_eq!(pending.len(), 1);
        assert!(!pending.contains_key(&mac("0a:00:00:00:00:00")));
    }

    #[test]
    fn test_spec_overrides_primary_address_default() {
        let mut current = node(vec![(
            "eth1",
            eni("0a:00:00:00:00:01", "10.0.1.5", "10.0.1.0/24", 1),
        )]);

        let pending = detect_new_devices(None, &current, &StaticMtu(9001), true);
        assert!(pending[&mac("0a:00:00:00:00:01")].use_primary_ip);

        current.spec.use_primary_address = Some(false);
        let pending = detect_new_devices(None, &current, &StaticMtu(9001), true);
        assert!(!pending[&mac("0a:00:00:00:00:01")].use_primary_ip);
    }

    #[test]
    fn test_repeated_calls_are_stable() {
        let current = node(vec![
            ("eth1", eni("0a:00:00:00:00:01", "10.0.1.5", "10.0.1.0/24", 1)),
            ("eth2", eni("0a:00:00:00:00:02", "10.0.2.5", "10.0.2.0/24", 2)),
        ]);

        let first = detect_new_devices(None, &current, &StaticMtu(9001), false);
        let second = detect_new_devices(None, &current, &StaticMtu(9001), false);
        assert_eq!(first, second);
    }

    #[test]
    fn test_mtu_is_read_once_per_call() {
        let mut mtu = MockMtuConfiguration::new();
        mtu.expect_device_mtu().times(1).return_const(1500u32);

        let current = node(vec![
            ("eth1", eni("0a:00:00:00:00:01", "10.0.1.5", "10.0.1.0/24", 1)),
            ("eth2", eni("0a:00:00:00:00:02", "10.0.2.5", "10.0.2.0/24", 2)),
        ]);

        let pending = detect_new_devices(None, &current, &mtu, false);
        assert!(pending.values().all(|cfg| cfg.mtu == 1500));
    }
}
