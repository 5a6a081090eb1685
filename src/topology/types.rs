//! Topology model type definitions.
//!
//! Devices are nodes, links are edges between two device interfaces. Both
//! collections are keyed by id in ordered maps so that every traversal of the
//! model is deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::ModelInvariantViolation;
use crate::utils::Subnet;

/// Device identifier (hostname)
pub type DeviceId = String;

/// Link identifier
pub type LinkId = String;

/// A configured interface on a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub ip: Option<Ipv4Addr>,
    pub prefix_len: Option<u8>,
    /// Declared bandwidth in bits per second
    pub capacity_bps: Option<u64>,
    pub admin_up: bool,
    pub mtu: Option<u32>,
    pub vlan: Option<u16>,
    pub description: Option<String>,
}

impl Interface {
    /// Subnet of this interface when both address and prefix are known
    pub fn subnet(&self) -> Option<Subnet> {
        Some(Subnet::new(self.ip?, self.prefix_len?))
    }
}

/// A network node built from one router configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub interfaces: BTreeMap<String, Interface>,
    pub role: Option<String>,
    pub default_gateway: Option<Ipv4Addr>,
}

impl Device {
    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }
}

/// One side of a link
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub device: DeviceId,
    pub interface: String,
}

impl Endpoint {
    pub fn new(device: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            interface: interface.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.interface)
    }
}

/// Operational status of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkStatus {
    Up,
    Down,
    Degraded,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Up => write!(f, "up"),
            LinkStatus::Down => write!(f, "down"),
            LinkStatus::Degraded => write!(f, "degraded"),
        }
    }
}

/// Whether both endpoints of a link were found during build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum Resolution {
    Resolved,
    Unresolved { reasons: Vec<String> },
}

/// An edge between two device interfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub a: Endpoint,
    pub b: Endpoint,
    /// Capacity in bits per second
    pub capacity_bps: u64,
    /// Capacity came from the link record rather than its endpoints
    #[serde(default)]
    pub capacity_declared: bool,
    /// Current load in bits per second, if known
    pub load_bps: Option<u64>,
    pub status: LinkStatus,
    pub resolution: Resolution,
}

impl Link {
    pub fn is_resolved(&self) -> bool {
        matches!(self.resolution, Resolution::Resolved)
    }

    /// Resolved and not down
    pub fn is_traversable(&self) -> bool {
        self.is_resolved() && self.status != LinkStatus::Down
    }

    /// Capacity available for routing; degraded links carry half
    pub fn effective_capacity_bps(&self) -> u64 {
        match self.status {
            LinkStatus::Up => self.capacity_bps,
            LinkStatus::Degraded => self.capacity_bps / 2,
            LinkStatus::Down => 0,
        }
    }

    /// Load as a fraction of declared capacity
    pub fn utilization(&self) -> Option<f64> {
        let load = self.load_bps?;
        if self.capacity_bps == 0 {
            return None;
        }
        Some(load as f64 / self.capacity_bps as f64)
    }

    pub fn touches(&self, device: &str) -> bool {
        self.a.device == device || self.b.device == device
    }

    /// The endpoint opposite to `device`
    pub fn peer_of(&self, device: &str) -> Option<&Endpoint> {
        if self.a.device == device {
            Some(&self.b)
        } else if self.b.device == device {
            Some(&self.a)
        } else {
            None
        }
    }

    /// Endpoints in ascending order, for undirected comparisons
    pub fn endpoint_pair(&self) -> (&Endpoint, &Endpoint) {
        if self.a <= self.b {
            (&self.a, &self.b)
        } else {
            (&self.b, &self.a)
        }
    }

    /// Device ids of both ends, ascending and deduplicated
    pub fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids = vec![self.a.device.clone(), self.b.device.clone()];
        ids.sort();
        ids.dedup();
        ids
    }
}

/// The device and link graph for one analysis run.
///
/// Built once by [`crate::topology::build_topology`] and read-only afterwards;
/// mutation is restricted to this crate and only ever applied to clones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TopologyData")]
pub struct Topology {
    devices: BTreeMap<DeviceId, Device>,
    links: BTreeMap<LinkId, Link>,
}

/// Serialized form of a topology; only becomes a [`Topology`] once its
/// invariants hold
#[derive(Deserialize)]
struct TopologyData {
    devices: BTreeMap<DeviceId, Device>,
    links: BTreeMap<LinkId, Link>,
}

impl TryFrom<TopologyData> for Topology {
    type Error = ModelInvariantViolation;

    fn try_from(data: TopologyData) -> Result<Self, Self::Error> {
        let topology = Topology {
            devices: data.devices,
            links: data.links,
        };
        topology.check_invariants()?;
        Ok(topology)
    }
}

impl Topology {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Devices in ascending id order
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Links in ascending id order
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn link(&self, id: &str) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn device_ids(&self) -> Vec<&str> {
        self.devices.keys().map(String::as_str).collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn interface(&self, endpoint: &Endpoint) -> Option<&Interface> {
        self.devices.get(&endpoint.device)?.interface(&endpoint.interface)
    }

    /// Resolved links attached to a device, any status
    pub fn resolved_links_of<'a>(&'a self, device: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links
            .values()
            .filter(move |link| link.is_resolved() && link.touches(device))
    }

    /// Number of traversable links attached to a device
    pub fn degree(&self, device: &str) -> usize {
        self.resolved_links_of(device)
            .filter(|link| link.is_traversable())
            .count()
    }

    pub(crate) fn insert_device(&mut self, device: Device) {
        self.devices.insert(device.id.clone(), device);
    }

    pub(crate) fn insert_link(&mut self, link: Link) {
        self.links.insert(link.id.clone(), link);
    }

    pub(crate) fn contains_link(&self, id: &str) -> bool {
        self.links.contains_key(id)
    }

    pub(crate) fn link_mut(&mut self, id: &str) -> Option<&mut Link> {
        self.links.get_mut(id)
    }

    pub(crate) fn interface_mut(&mut self, endpoint: &Endpoint) -> Option<&mut Interface> {
        self.devices
            .get_mut(&endpoint.device)?
            .interfaces
            .get_mut(&endpoint.interface)
    }

    /// Re-derive the capacity of undeclared links ending at `endpoint` from
    /// the slower of their endpoint interfaces
    pub(crate) fn refresh_link_capacity(&mut self, endpoint: &Endpoint) {
        let affected: Vec<LinkId> = self
            .links
            .values()
            .filter(|link| !link.capacity_declared && (&link.a == endpoint || &link.b == endpoint))
            .map(|link| link.id.clone())
            .collect();

        for id in affected {
            let derived = self.links.get(&id).and_then(|link| {
                [&link.a, &link.b]
                    .iter()
                    .filter_map(|end| self.interface(end)?.capacity_bps)
                    .min()
            });
            if let (Some(capacity), Some(link)) = (derived, self.links.get_mut(&id)) {
                link.capacity_bps = capacity;
            }
        }
    }

    /// Every IPv4 address configured anywhere in the topology
    pub fn used_addresses(&self) -> BTreeSet<Ipv4Addr> {
        self.devices
            .values()
            .flat_map(|device| device.interfaces.values())
            .filter_map(|iface| iface.ip)
            .collect()
    }

    /// Verify the structural invariants of the model
    pub fn check_invariants(&self) -> Result<(), ModelInvariantViolation> {
        for (key, device) in &self.devices {
            if key != &device.id {
                return Err(ModelInvariantViolation::new(format!(
                    "device stored under '{}' has id '{}'",
                    key, device.id
                )));
            }
        }

        let mut pairs: BTreeSet<(&Endpoint, &Endpoint)> = BTreeSet::new();
        for (key, link) in &self.links {
            if key != &link.id {
                return Err(ModelInvariantViolation::new(format!(
                    "link stored under '{}' has id '{}'",
                    key, link.id
                )));
            }
            if link.capacity_bps == 0 {
                return Err(ModelInvariantViolation::new(format!(
                    "link '{}' has zero capacity",
                    link.id
                )));
            }
            match &link.resolution {
                Resolution::Resolved => {
                    for endpoint in [&link.a, &link.b] {
                        if self.interface(endpoint).is_none() {
                            return Err(ModelInvariantViolation::new(format!(
                                "resolved link '{}' references missing endpoint {}",
                                link.id, endpoint
                            )));
                        }
                    }
                }
                Resolution::Unresolved { reasons } if reasons.is_empty() => {
                    return Err(ModelInvariantViolation::new(format!(
                        "unresolved link '{}' carries no reason",
                        link.id
                    )));
                }
                Resolution::Unresolved { .. } => {}
            }
            if !pairs.insert(link.endpoint_pair()) {
                return Err(ModelInvariantViolation::new(format!(
                    "link '{}' duplicates the endpoint pair {} - {}",
                    link.id, link.a, link.b
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{DeviceRecord, EndpointRecord, LinkRecord, TopologyInput};
    use crate::topology::{build_topology, BuildOptions};

    fn pair() -> Topology {
        let input = TopologyInput {
            devices: vec![
                DeviceRecord::with_interfaces("R1", &["e0"]),
                DeviceRecord::with_interfaces("R2", &["e0"]),
            ],
            links: vec![LinkRecord {
                id: Some("L".to_string()),
                ..LinkRecord::between(EndpointRecord::new("R1", "e0"), EndpointRecord::new("R2", "e0"), None)
            }],
        };
        build_topology(&input, &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_deserialize_checks_invariants() {
        let topology = pair();
        let json = serde_json::to_string(&topology).unwrap();
        let restored: Topology = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, topology);

        let mut value = serde_json::to_value(&topology).unwrap();
        value["links"]["L"]["capacity_bps"] = serde_json::json!(0);
        let err = serde_json::from_value::<Topology>(value).unwrap_err();
        assert!(err.to_string().contains("zero capacity"));

        let mut value = serde_json::to_value(&topology).unwrap();
        value["links"]["L"]["b"]["interface"] = serde_json::json!("e9");
        assert!(serde_json::from_value::<Topology>(value).is_err());
    }

    #[test]
    fn test_refresh_link_capacity_follows_slower_end() {
        let mut topology = pair();
        let a = Endpoint::new("R1", "e0");
        let b = Endpoint::new("R2", "e0");
        topology.interface_mut(&a).unwrap().capacity_bps = Some(10_000_000);
        topology.interface_mut(&b).unwrap().capacity_bps = Some(40_000_000);
        topology.refresh_link_capacity(&a);
        assert_eq!(topology.link("L").unwrap().capacity_bps, 10_000_000);
    }
}
