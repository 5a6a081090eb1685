//! Structured records handed over by the config-parsing collaborator.
//!
//! Every field is optional at the serde level so that a missing required
//! field surfaces as a [`crate::error::BuildError::Schema`] from the builder,
//! with the record named, instead of an opaque deserialization error.

use serde::{Deserialize, Serialize};

/// Complete builder input: devices first, then links
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyInput {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

/// One parsed router configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_gateway: Option<String>,
}

impl DeviceRecord {
    /// Device with plain named interfaces and nothing else configured
    pub fn with_interfaces(id: &str, interfaces: &[&str]) -> Self {
        Self {
            id: Some(id.to_string()),
            interfaces: interfaces.iter().map(|name| InterfaceRecord::named(name)).collect(),
            ..Default::default()
        }
    }
}

/// One interface block of a router configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub name: Option<String>,
    /// IPv4 address, optionally with a CIDR suffix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Netmask, `/len` or bare prefix length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    /// Declared bandwidth in bits per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_up: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl InterfaceRecord {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

/// A `{device, interface}` reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub device: Option<String>,
    pub interface: Option<String>,
}

impl EndpointRecord {
    pub fn new(device: &str, interface: &str) -> Self {
        Self {
            device: Some(device.to_string()),
            interface: Some(interface.to_string()),
        }
    }
}

/// Declared operational state of a link record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkStatusRecord {
    Up,
    Down,
    Degraded,
}

/// One physical link between two interfaces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub endpoint_a: Option<EndpointRecord>,
    pub endpoint_b: Option<EndpointRecord>,
    /// Declared capacity in bits per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_capacity: Option<u64>,
    /// Current utilization as a fraction of capacity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
    /// Current load in bits per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_bps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LinkStatusRecord>,
}

impl LinkRecord {
    /// Link between two endpoints with a declared capacity
    pub fn between(a: EndpointRecord, b: EndpointRecord, capacity: Option<u64>) -> Self {
        Self {
            endpoint_a: Some(a),
            endpoint_b: Some(b),
            declared_capacity: capacity,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_input_parsing() {
        let yaml = r#"
devices:
  - id: R1
    role: core
    interfaces:
      - name: Gi0/0
        ip: 10.0.0.1
        subnet: 255.255.255.252
        capacity: 1000000000
  - id: R2
    interfaces:
      - name: Gi0/0
        ip: 10.0.0.2/30
links:
  - endpoint_a: { device: R1, interface: Gi0/0 }
    endpoint_b: { device: R2, interface: Gi0/0 }
    declared_capacity: 1000000000
    status: degraded
"#;
        let input: TopologyInput = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(input.devices.len(), 2);
        assert_eq!(input.devices[0].role.as_deref(), Some("core"));
        assert_eq!(input.devices[1].interfaces[0].subnet, None);
        assert_eq!(input.links[0].status, Some(LinkStatusRecord::Degraded));
        assert_eq!(input.links[0].utilization, None);
    }

    #[test]
    fn test_missing_fields_still_deserialize() {
        let json = r#"{"devices":[{"interfaces":[{}]}],"links":[{}]}"#;
        let input: TopologyInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.devices[0].id, None);
        assert_eq!(input.devices[0].interfaces[0].name, None);
        assert_eq!(input.links[0].endpoint_a, None);
    }
}
