//! Topology construction from parsed records.
//!
//! Schema problems and duplicate devices abort the build. Links whose
//! endpoints cannot be resolved are kept and flagged so that the validator can
//! report them; a partial topology is still worth analyzing.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};

use super::types::*;
use crate::config::AnalysisConfig;
use crate::error::BuildError;
use crate::records::{DeviceRecord, EndpointRecord, InterfaceRecord, LinkRecord, LinkStatusRecord, TopologyInput};
use crate::utils::{parse_ip_with_prefix, parse_prefix};

/// Options consulted while building
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Capacity used when neither the link record nor an endpoint declares one
    pub default_capacity_bps: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            default_capacity_bps: AnalysisConfig::default().default_capacity_bps,
        }
    }
}

impl From<&AnalysisConfig> for BuildOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            default_capacity_bps: config.default_capacity_bps,
        }
    }
}

/// Build a topology from device and link records.
///
/// Records are processed in order; the function keeps no state between calls.
pub fn build_topology(input: &TopologyInput, options: &BuildOptions) -> Result<Topology, BuildError> {
    let mut topology = Topology::new();

    for (index, record) in input.devices.iter().enumerate() {
        let device = build_device(index, record)?;
        if topology.device(&device.id).is_some() {
            return Err(BuildError::DuplicateDevice { id: device.id });
        }
        debug!("Added device {} ({} interfaces)", device.id, device.interfaces.len());
        topology.insert_device(device);
    }

    let mut seen_pairs: BTreeSet<(Endpoint, Endpoint)> = BTreeSet::new();
    let mut unresolved = 0usize;

    for (index, record) in input.links.iter().enumerate() {
        let link = build_link(index, record, &topology, options)?;

        if topology.contains_link(&link.id) {
            return Err(BuildError::DuplicateLink { id: link.id });
        }
        let (first, second) = link.endpoint_pair();
        if !seen_pairs.insert((first.clone(), second.clone())) {
            return Err(BuildError::DuplicateLink { id: link.id });
        }

        if let Resolution::Unresolved { reasons } = &link.resolution {
            warn!("Link {} is unresolved: {}", link.id, reasons.join("; "));
            unresolved += 1;
        } else {
            debug!("Added link {} ({} <-> {}, {} bps)", link.id, link.a, link.b, link.capacity_bps);
        }
        topology.insert_link(link);
    }

    topology.check_invariants()?;

    info!(
        "Built topology: {} devices, {} links ({} unresolved)",
        topology.device_count(),
        topology.link_count(),
        unresolved
    );
    Ok(topology)
}

fn build_device(index: usize, record: &DeviceRecord) -> Result<Device, BuildError> {
    let id = required(record.id.as_deref(), &format!("device #{}", index + 1), "id")?;
    let record_name = format!("device '{}'", id);

    let mut interfaces = BTreeMap::new();
    for iface_record in &record.interfaces {
        let iface = build_interface(&record_name, iface_record)?;
        if interfaces.contains_key(&iface.name) {
            return Err(BuildError::schema(
                &record_name,
                "interfaces",
                format!("declares interface '{}' twice", iface.name),
            ));
        }
        interfaces.insert(iface.name.clone(), iface);
    }

    let default_gateway = match record.default_gateway.as_deref() {
        Some(raw) => Some(
            raw.trim()
                .parse()
                .map_err(|_| BuildError::schema(&record_name, "default_gateway", format!("'{}' is not an IPv4 address", raw)))?,
        ),
        None => None,
    };

    Ok(Device {
        id,
        interfaces,
        role: record.role.clone(),
        default_gateway,
    })
}

fn build_interface(device: &str, record: &InterfaceRecord) -> Result<Interface, BuildError> {
    let name = normalize_interface(&required(record.name.as_deref(), device, "interfaces.name")?);
    let record_name = format!("{} interface '{}'", device, name);

    let (ip, cidr_prefix) = match record.ip.as_deref() {
        Some(raw) => {
            let (ip, prefix) = parse_ip_with_prefix(raw).map_err(|e| BuildError::schema(&record_name, "ip", e))?;
            (Some(ip), prefix)
        }
        None => (None, None),
    };

    let declared_prefix = match record.subnet.as_deref() {
        Some(raw) => Some(parse_prefix(raw).map_err(|e| BuildError::schema(&record_name, "subnet", e))?),
        None => None,
    };

    let prefix_len = match (cidr_prefix, declared_prefix) {
        (Some(a), Some(b)) if a != b => {
            return Err(BuildError::schema(
                &record_name,
                "subnet",
                format!("/{} disagrees with the /{} suffix of the address", b, a),
            ));
        }
        (a, b) => a.or(b),
    };

    if record.capacity == Some(0) {
        return Err(BuildError::schema(&record_name, "capacity", "must be greater than zero"));
    }

    Ok(Interface {
        name,
        ip,
        prefix_len,
        capacity_bps: record.capacity,
        admin_up: record.admin_up.unwrap_or(true),
        mtu: record.mtu,
        vlan: record.vlan,
        description: record.description.clone(),
    })
}

fn build_link(
    index: usize,
    record: &LinkRecord,
    topology: &Topology,
    options: &BuildOptions,
) -> Result<Link, BuildError> {
    let record_name = match record.id.as_deref() {
        Some(id) => format!("link '{}'", id),
        None => format!("link #{}", index + 1),
    };

    let a = endpoint(&record_name, "endpoint_a", record.endpoint_a.as_ref())?;
    let b = endpoint(&record_name, "endpoint_b", record.endpoint_b.as_ref())?;
    if a == b {
        return Err(BuildError::schema(&record_name, "endpoint_b", format!("connects {} to itself", a)));
    }

    if record.declared_capacity == Some(0) {
        return Err(BuildError::schema(&record_name, "declared_capacity", "must be greater than zero"));
    }
    if record.utilization.is_some() && record.load_bps.is_some() {
        return Err(BuildError::schema(&record_name, "utilization", "cannot be combined with load_bps"));
    }
    if let Some(ratio) = record.utilization {
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(BuildError::schema(&record_name, "utilization", format!("must be a non-negative number, got {}", ratio)));
        }
    }

    let mut reasons = Vec::new();
    for endpoint in [&a, &b] {
        match topology.device(&endpoint.device) {
            None => reasons.push(format!("device '{}' not found", endpoint.device)),
            Some(device) if device.interface(&endpoint.interface).is_none() => reasons.push(format!(
                "interface '{}' not found on device '{}'",
                endpoint.interface, endpoint.device
            )),
            Some(_) => {}
        }
    }

    let capacity_bps = record.declared_capacity.unwrap_or_else(|| {
        [&a, &b]
            .iter()
            .filter_map(|endpoint| topology.interface(endpoint)?.capacity_bps)
            .min()
            .unwrap_or(options.default_capacity_bps)
    });

    let load_bps = match (record.load_bps, record.utilization) {
        (Some(load), _) => Some(load),
        (None, Some(ratio)) => Some((ratio * capacity_bps as f64).round() as u64),
        (None, None) => None,
    };

    let status = match record.status.unwrap_or(LinkStatusRecord::Up) {
        LinkStatusRecord::Up => LinkStatus::Up,
        LinkStatusRecord::Down => LinkStatus::Down,
        LinkStatusRecord::Degraded => LinkStatus::Degraded,
    };

    let id = match record.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("{}--{}", a, b),
    };

    let resolution = if reasons.is_empty() {
        Resolution::Resolved
    } else {
        Resolution::Unresolved { reasons }
    };

    Ok(Link {
        id,
        a,
        b,
        capacity_bps,
        capacity_declared: record.declared_capacity.is_some(),
        load_bps,
        status,
        resolution,
    })
}

fn endpoint(record: &str, field: &str, endpoint: Option<&EndpointRecord>) -> Result<Endpoint, BuildError> {
    let endpoint = endpoint.ok_or_else(|| BuildError::schema(record, field, "is missing"))?;
    let device = required(endpoint.device.as_deref(), record, &format!("{}.device", field))?;
    let interface = required(endpoint.interface.as_deref(), record, &format!("{}.interface", field))?;
    Ok(Endpoint::new(device, normalize_interface(&interface)))
}

fn required(value: Option<&str>, record: &str, field: &str) -> Result<String, BuildError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        Some(_) => Err(BuildError::schema(record, field, "is empty")),
        None => Err(BuildError::schema(record, field, "is missing")),
    }
}

/// Interface names compare case-insensitively
pub fn normalize_interface(name: &str) -> String {
    name.trim().to_lowercase()
}
