//! Units shipped with the crate.
//!
//! | Unit | Platform | Area |
//! |------|----------|------|
//! | `cer_rpd` | Casa CER | `cable rpd <name>` remote PHY devices |
//! | `cer_ptp` | Casa CER | `ptp domain <n>` with its keyed `port` list |
//! | `ios_interface` | Cisco IOS | `interface <name>` basics |

use super::TemplateUnit;
use crate::error::Result;

const CER_RPD: &str = include_str!("cer_rpd.yaml");
const CER_PTP: &str = include_str!("cer_ptp.yaml");
const IOS_INTERFACE: &str = include_str!("ios_interface.yaml");

/// Compile every built-in unit.
pub fn units() -> Result<Vec<TemplateUnit>> {
    [CER_RPD, CER_PTP, IOS_INTERFACE]
        .into_iter()
        .map(TemplateUnit::from_yaml)
        .collect()
}

/// The `cable rpd` unit.
pub fn cer_rpd() -> Result<TemplateUnit> {
    TemplateUnit::from_yaml(CER_RPD)
}

/// The `ptp domain` unit.
pub fn cer_ptp() -> Result<TemplateUnit> {
    TemplateUnit::from_yaml(CER_PTP)
}

/// The IOS `interface` unit.
pub fn ios_interface() -> Result<TemplateUnit> {
    TemplateUnit::from_yaml(IOS_INTERFACE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfigNode, KeyedList};
    use crate::planner::Operation;
    use crate::units::TranslationUnit;
    use pretty_assertions::assert_eq;

    fn rpd() -> ConfigNode {
        ConfigNode::new()
            .with("name", "node1")
            .with("rpdIndex", 12)
            .with("ucam", 2)
            .with("dcam", 11)
            .with("macAddress", "a870.5d28.b3c8")
            .with("adpEnable", true)
            .with("enable", true)
    }

    #[test]
    fn test_rpd_create_body() {
        let unit = cer_rpd().unwrap();
        let plan = unit.plan(None, Some(&rpd())).unwrap();
        assert_eq!(plan.operation(), Operation::Create);
        assert_eq!(
            plan.render(unit.templates()).unwrap(),
            "rpd-index 12\nucam 2 dcam 11\nmac-address a870.5d28.b3c8\nadp enable\nno shutdown\n"
        );
    }

    #[test]
    fn test_rpd_create_wrapped() {
        let unit = cer_rpd().unwrap();
        let commands = unit.render(None, Some(&rpd())).unwrap();
        assert_eq!(commands.commands().first().map(String::as_str), Some("cable rpd node1"));
        assert_eq!(commands.commands().last().map(String::as_str), Some("exit"));
        assert_eq!(commands.len(), 7);
    }

    #[test]
    fn test_rpd_update_body() {
        let unit = cer_rpd().unwrap();
        let after = rpd()
            .with("rpdIndex", 11)
            .with("ucam", 3)
            .with("dcam", 12)
            .without("macAddress")
            .without("adpEnable")
            .with("ssdEnable", true);
        let plan = unit.plan(Some(&rpd()), Some(&after)).unwrap();
        assert_eq!(
            plan.render(unit.templates()).unwrap(),
            "rpd-index 11\nucam 3 dcam 12\nno mac-address\nno adp enable\nssd enable\n"
        );
    }

    #[test]
    fn test_rpd_delete_is_one_line() {
        let unit = cer_rpd().unwrap();
        let commands = unit.render(Some(&rpd()), None).unwrap();
        assert_eq!(commands.to_text(), "no cable rpd node1\n");
    }

    #[test]
    fn test_rpd_camera_pair_precondition() {
        let unit = cer_rpd().unwrap();
        let after = rpd().without("ucam");
        let err = unit.plan(None, Some(&after)).unwrap_err();
        assert!(matches!(err, crate::error::Error::Precondition { .. }));
    }

    fn ptp(ports: &[(i64, i64, &str)]) -> ConfigNode {
        let mut list = KeyedList::new("index");
        for (index, priority, role) in ports {
            list = list
                .with_entry(
                    ConfigNode::new()
                        .with("index", *index)
                        .with("priority", *priority)
                        .with("role", *role),
                )
                .unwrap();
        }
        ConfigNode::new()
            .with("domain", 0)
            .with("priority1", 128)
            .with("ports", list)
    }

    #[test]
    fn test_ptp_port_removal_precedes_addition() {
        let unit = cer_ptp().unwrap();
        let before = ptp(&[(1, 5, "master"), (2, 5, "slave")]);
        let after = ptp(&[(2, 5, "slave"), (3, 7, "slave")]);
        let commands = unit.render(Some(&before), Some(&after)).unwrap();
        assert_eq!(
            commands.to_text(),
            "ptp domain 0\nno port 1\nport 3\n priority 7\n role slave\nexit\nexit\n"
        );
    }

    #[test]
    fn test_ptp_changed_port_is_recreated() {
        let unit = cer_ptp().unwrap();
        let before = ptp(&[(1, 5, "master")]);
        let after = ptp(&[(1, 6, "master")]);
        let commands = unit.render(Some(&before), Some(&after)).unwrap();
        assert_eq!(
            commands.to_text(),
            "ptp domain 0\nno port 1\nport 1\n priority 6\n role master\nexit\nexit\n"
        );
    }

    #[test]
    fn test_interface_per_field_delete() {
        let unit = ios_interface().unwrap();
        let before = ConfigNode::new()
            .with("name", "Gi0/1")
            .with("description", "uplink")
            .with("mtu", 9000);
        let commands = unit.render(Some(&before), None).unwrap();
        assert_eq!(
            commands.to_text(),
            "interface Gi0/1\nno description\nno mtu\nexit\n"
        );
    }

    #[test]
    fn test_interface_parse_defaults_enabled() {
        let unit = ios_interface().unwrap();
        let output = "interface Gi0/1\n description uplink to core\n ip address 10.0.0.1 255.255.255.252\n ipv6 enable\n!\n";
        let id = ConfigNode::new().with("name", "Gi0/1");
        let node = unit.parse(&id, output).unwrap().unwrap();
        assert_eq!(
            node,
            ConfigNode::new()
                .with("name", "Gi0/1")
                .with("description", "uplink to core")
                .with("address", "10.0.0.1")
                .with("mask", "255.255.255.252")
                .with("ipv6", true)
                .with("enabled", true)
        );
        let other = ConfigNode::new().with("name", "Gi0/2");
        assert!(unit.parse(&other, output).unwrap().is_none());
    }
}
