//! Shared test utilities and fixtures for the cliconf test suite.
//!
//! This module provides:
//! - Configuration fixtures for the built-in units
//! - Simulated devices wired into sessions and device facades
//! - Captured show output samples
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use cliconf::device::Device;
use cliconf::model::{ConfigNode, KeyedList};
use cliconf::session::{Platform, Session, SimulatedDevice, SimulatedHandle};
use cliconf::units::UnitRegistry;

// ============================================================================
// Captured Output
// ============================================================================

/// `show running-config` of a CER with two RPDs and a PTP domain.
pub const CER_RUNNING: &str = "\
cable rpd node1
 rpd-index 12
 ucam 2 dcam 11
 mac-address a870.5d28.b3c8
 adp enable
 no shutdown
cable rpd node2
 rpd-index 13
 ucam 3 dcam 12
 shutdown
ptp domain 0
 priority1 128
 port 1
  priority 5
  role master
 port 2
  priority 5
  role slave
";

/// `show running-config` excerpt of an IOS switch, with `!` separators and
/// CRLF line endings.
pub const IOS_RUNNING: &str = "interface GigabitEthernet0/1\r\n description uplink to core\r\n mtu 9000\r\n ip address 10.0.0.1 255.255.255.252\r\n!\r\ninterface GigabitEthernet0/2\r\n shutdown\r\n!\r\n";

/// `show ip interface brief` style table.
pub const IOS_BRIEF: &str = "\
Interface              IP-Address      OK? Method Status                Protocol
GigabitEthernet0/1     10.0.0.1        YES manual up                    up
GigabitEthernet0/2     unassigned      YES unset  administratively down down
Loopback0              192.0.2.1       YES manual up                    up
";

// ============================================================================
// Configuration Fixtures
// ============================================================================

/// The RPD created in the canonical scenario.
pub fn rpd() -> ConfigNode {
    ConfigNode::new()
        .with("name", "node1")
        .with("rpdIndex", 12)
        .with("ucam", 2)
        .with("dcam", 11)
        .with("macAddress", "a870.5d28.b3c8")
        .with("adpEnable", true)
        .with("enable", true)
}

/// The canonical RPD after its update: index and cameras changed, MAC and
/// ADP removed, SSD added.
pub fn rpd_updated() -> ConfigNode {
    rpd()
        .with("rpdIndex", 11)
        .with("ucam", 3)
        .with("dcam", 12)
        .without("macAddress")
        .without("adpEnable")
        .with("ssdEnable", true)
}

/// A keyed port list for `cer_ptp`.
pub fn ports(entries: &[(i64, i64, &str)]) -> KeyedList {
    KeyedList::from_entries(
        "index",
        entries
            .iter()
            .map(|(index, priority, role)| {
                ConfigNode::new()
                    .with("index", *index)
                    .with("priority", *priority)
                    .with("role", *role)
            })
            .collect(),
    )
    .expect("fixture ports have unique keys")
}

/// A PTP domain with the given ports.
pub fn ptp(entries: &[(i64, i64, &str)]) -> ConfigNode {
    ConfigNode::new()
        .with("domain", 0)
        .with("priority1", 128)
        .with("ports", ports(entries))
}

/// A fully populated IOS interface.
pub fn interface(name: &str) -> ConfigNode {
    ConfigNode::new()
        .with("name", name)
        .with("description", "uplink to core")
        .with("mtu", 9000)
        .with("address", "10.0.0.1")
        .with("mask", "255.255.255.252")
        .with("ipv6", true)
        .with("enabled", true)
}

/// Identity node with a single field.
pub fn id(field: &str, value: impl Into<cliconf::model::Value>) -> ConfigNode {
    ConfigNode::new().with(field, value)
}

// ============================================================================
// Devices
// ============================================================================

/// A session over a fresh simulated device.
pub fn simulated_session(platform: Platform) -> (Session, SimulatedHandle) {
    let device = SimulatedDevice::new("sim", platform);
    let handle = device.handle();
    (Session::new(device, platform), handle)
}

/// A device facade over a fresh simulated device with the built-in units.
pub fn simulated_device(platform: Platform) -> (Device, SimulatedHandle) {
    let (session, handle) = simulated_session(platform);
    let registry = UnitRegistry::with_builtins().expect("built-in units compile");
    (Device::new(session, registry), handle)
}

/// Built-in registry.
pub fn registry() -> UnitRegistry {
    UnitRegistry::with_builtins().expect("built-in units compile")
}
