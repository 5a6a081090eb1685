//! Patch proposals for fixable findings.
//!
//! Only three finding kinds are repaired automatically: speed mismatches,
//! duplicate addresses and asymmetric subnets. Every other finding becomes a
//! manual-review entry. Edits are applied to a clone of the topology for
//! preview; the topology passed in is never modified.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::ModelInvariantViolation;
use crate::finding::{sort_findings, Finding, FindingKind};
use crate::topology::{Endpoint, Topology};
use crate::utils::Subnet;
use crate::validator::validate_topology;

/// A single attribute change on one interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "kebab-case")]
pub enum Edit {
    Capacity {
        endpoint: Endpoint,
        from: Option<u64>,
        to: u64,
    },
    Address {
        endpoint: Endpoint,
        from: Option<Ipv4Addr>,
        to: Ipv4Addr,
        prefix_len: u8,
    },
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edit::Capacity { endpoint, from, to } => match from {
                Some(from) => write!(f, "set {} capacity {} -> {} bps", endpoint, from, to),
                None => write!(f, "set {} capacity to {} bps", endpoint, to),
            },
            Edit::Address { endpoint, from, to, prefix_len } => match from {
                Some(from) => write!(f, "set {} address {} -> {}/{}", endpoint, from, to, prefix_len),
                None => write!(f, "set {} address to {}/{}", endpoint, to, prefix_len),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum PatchAction {
    Apply { edit: Edit },
    ManualReviewRequired { reason: String },
}

/// One proposed change, tied to the finding it addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub finding: FindingKind,
    pub devices: Vec<String>,
    pub links: Vec<String>,
    pub action: PatchAction,
}

impl PatchEntry {
    pub fn is_manual(&self) -> bool {
        matches!(self.action, PatchAction::ManualReviewRequired { .. })
    }
}

impl fmt::Display for PatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            PatchAction::Apply { edit } => write!(f, "[{}] {}", self.finding, edit),
            PatchAction::ManualReviewRequired { reason } => {
                write!(f, "[{}] manual review required: {}", self.finding, reason)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub entries: Vec<PatchEntry>,
}

impl Patch {
    pub fn edits(&self) -> impl Iterator<Item = &Edit> {
        self.entries.iter().filter_map(|entry| match &entry.action {
            PatchAction::Apply { edit } => Some(edit),
            PatchAction::ManualReviewRequired { .. } => None,
        })
    }

    pub fn manual_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_manual()).count()
    }
}

/// A patch plus the topology it would produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoFixProposal {
    pub patch: Patch,
    /// Working copy with every applicable edit already made
    pub preview: Topology,
    /// Validator findings on the preview
    pub remaining_findings: Vec<Finding>,
}

/// Propose fixes for `findings` against `topology`.
///
/// Fails only if the patched working copy breaks a model invariant, which
/// indicates a defect in a fix rule.
pub fn propose_fixes(topology: &Topology, findings: &[Finding]) -> Result<AutoFixProposal, ModelInvariantViolation> {
    let mut ordered = findings.to_vec();
    sort_findings(&mut ordered);

    let mut preview = topology.clone();
    let mut used = topology.used_addresses();
    let mut handled_ips: BTreeSet<Ipv4Addr> = BTreeSet::new();
    let mut entries = Vec::new();

    for finding in &ordered {
        let actions = match finding.kind {
            FindingKind::SpeedMismatch => vec![fix_speed_mismatch(&preview, finding)],
            FindingKind::DuplicateIp => fix_duplicate_ip(&preview, finding, &mut used, &mut handled_ips),
            FindingKind::AsymmetricSubnet => vec![fix_asymmetric_subnet(&preview, finding, &mut used)],
            kind => vec![manual(manual_hint(kind))],
        };

        for action in actions {
            if let PatchAction::Apply { edit } = &action {
                apply_edit(&mut preview, edit)?;
                debug!("Applied {}", edit);
            }
            entries.push(PatchEntry {
                finding: finding.kind,
                devices: finding.devices.clone(),
                links: finding.links.clone(),
                action,
            });
        }
    }

    preview.check_invariants()?;
    let remaining_findings = validate_topology(&preview);
    let patch = Patch { entries };
    info!(
        "Proposed {} edit(s), {} entr(ies) need manual review, {} finding(s) remain",
        patch.edits().count(),
        patch.manual_count(),
        remaining_findings.len()
    );

    Ok(AutoFixProposal {
        patch,
        preview,
        remaining_findings,
    })
}

fn manual(reason: impl Into<String>) -> PatchAction {
    PatchAction::ManualReviewRequired { reason: reason.into() }
}

fn manual_hint(kind: FindingKind) -> &'static str {
    match kind {
        FindingKind::OrphanLink => "fix the link record or add the missing device/interface",
        FindingKind::MtuMismatch => "configure the same MTU on both interfaces",
        FindingKind::NetworkLoop => "enable spanning tree or remove a redundant link",
        FindingKind::IsolatedDevice => "connect the device or remove it from the inventory",
        FindingKind::GatewayOutsideSubnet => "point the default gateway at a directly connected address",
        FindingKind::InterfaceReuse => "move all but one link to a free interface",
        FindingKind::AdminDownEndpoint => "bring the interface up or mark the link down",
        FindingKind::CapacityExceeded | FindingKind::HighUtilization => "upgrade the link or shift traffic",
        FindingKind::CriticalLink => "add a redundant path",
        _ => "no automatic fix for this finding",
    }
}

fn apply_edit(topology: &mut Topology, edit: &Edit) -> Result<(), ModelInvariantViolation> {
    let endpoint = match edit {
        Edit::Capacity { endpoint, .. } | Edit::Address { endpoint, .. } => endpoint,
    };
    let iface = topology
        .interface_mut(endpoint)
        .ok_or_else(|| ModelInvariantViolation::new(format!("patch targets unknown interface {}", endpoint)))?;
    match edit {
        Edit::Capacity { to, .. } => {
            iface.capacity_bps = Some(*to);
            topology.refresh_link_capacity(endpoint);
        }
        Edit::Address { to, prefix_len, .. } => {
            iface.ip = Some(*to);
            iface.prefix_len = Some(*prefix_len);
        }
    }
    Ok(())
}

/// Raise the lower declared interface speed to the higher one
fn fix_speed_mismatch(topology: &Topology, finding: &Finding) -> PatchAction {
    let Some(link) = finding.links.first().and_then(|id| topology.link(id)) else {
        return manual("link no longer present");
    };
    let speed_a = topology.interface(&link.a).and_then(|iface| iface.capacity_bps);
    let speed_b = topology.interface(&link.b).and_then(|iface| iface.capacity_bps);
    let (Some(speed_a), Some(speed_b)) = (speed_a, speed_b) else {
        return manual("an endpoint does not declare a speed");
    };

    let (endpoint, from, to) = match speed_a.cmp(&speed_b) {
        std::cmp::Ordering::Less => (&link.a, speed_a, speed_b),
        std::cmp::Ordering::Greater => (&link.b, speed_b, speed_a),
        std::cmp::Ordering::Equal => return manual("speeds already match"),
    };
    PatchAction::Apply {
        edit: Edit::Capacity {
            endpoint: endpoint.clone(),
            from: Some(from),
            to,
        },
    }
}

/// The first holder keeps the address, every other holder moves to the
/// lowest free host of its own subnet.
fn fix_duplicate_ip(
    topology: &Topology,
    finding: &Finding,
    used: &mut BTreeSet<Ipv4Addr>,
    handled: &mut BTreeSet<Ipv4Addr>,
) -> Vec<PatchAction> {
    let mut holders: BTreeMap<Ipv4Addr, Vec<(Endpoint, Option<u8>)>> = BTreeMap::new();
    for device in topology.devices() {
        for iface in device.interfaces.values() {
            if let Some(ip) = iface.ip {
                holders
                    .entry(ip)
                    .or_default()
                    .push((Endpoint::new(device.id.clone(), iface.name.clone()), iface.prefix_len));
            }
        }
    }

    let group = holders.into_iter().find(|(ip, group)| {
        if group.len() < 2 || handled.contains(ip) {
            return false;
        }
        let mut devices: Vec<&str> = group.iter().map(|(e, _)| e.device.as_str()).collect();
        devices.dedup();
        devices == finding.devices.iter().map(String::as_str).collect::<Vec<_>>()
    });
    let Some((ip, group)) = group else {
        return vec![manual("duplicate address no longer present")];
    };
    handled.insert(ip);

    group
        .into_iter()
        .skip(1)
        .map(|(endpoint, prefix_len)| {
            let Some(prefix_len) = prefix_len else {
                return manual(format!("{} has no prefix length to pick a free address from", endpoint));
            };
            let subnet = Subnet::new(ip, prefix_len);
            match subnet.first_free_host(used) {
                Some(free) => {
                    used.insert(free);
                    PatchAction::Apply {
                        edit: Edit::Address {
                            endpoint,
                            from: Some(ip),
                            to: free,
                            prefix_len,
                        },
                    }
                }
                None => manual(format!("no free address left in {} for {}", subnet, endpoint)),
            }
        })
        .collect()
}

/// Move the endpoint with the lower network address into its peer's subnet
fn fix_asymmetric_subnet(topology: &Topology, finding: &Finding, used: &mut BTreeSet<Ipv4Addr>) -> PatchAction {
    let Some(link) = finding.links.first().and_then(|id| topology.link(id)) else {
        return manual("link no longer present");
    };
    let current_a = topology.interface(&link.a).and_then(|iface| iface.ip);
    let current_b = topology.interface(&link.b).and_then(|iface| iface.ip);
    let subnet_a = topology.interface(&link.a).and_then(|iface| iface.subnet());
    let subnet_b = topology.interface(&link.b).and_then(|iface| iface.subnet());
    let (Some(subnet_a), Some(subnet_b)) = (subnet_a, subnet_b) else {
        return manual("an endpoint has no subnet");
    };

    let (endpoint, from, target) = match u32::from(subnet_a.network).cmp(&u32::from(subnet_b.network)) {
        std::cmp::Ordering::Less => (&link.a, current_a, subnet_b),
        std::cmp::Ordering::Greater => (&link.b, current_b, subnet_a),
        std::cmp::Ordering::Equal => return manual("both subnets share a network address; pick one by hand"),
    };

    match target.first_free_host(used) {
        Some(free) => {
            used.insert(free);
            PatchAction::Apply {
                edit: Edit::Address {
                    endpoint: endpoint.clone(),
                    from,
                    to: free,
                    prefix_len: target.prefix_len,
                },
            }
        }
        None => manual(format!("no free address left in {}", target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TopologyInput;
    use crate::topology::{build_topology, BuildOptions};

    fn build(yaml: &str) -> Topology {
        let input: TopologyInput = serde_yaml::from_str(yaml).unwrap();
        build_topology(&input, &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_speed_mismatch_raises_lower_side() {
        let topology = build(
            r#"
devices:
  - id: R1
    interfaces: [{name: e0, capacity: 100000000}]
  - id: R2
    interfaces: [{name: e0, capacity: 1000000000}]
links:
  - endpoint_a: {device: R1, interface: e0}
    endpoint_b: {device: R2, interface: e0}
"#,
        );
        let findings = validate_topology(&topology);
        let proposal = propose_fixes(&topology, &findings).unwrap();

        let edits: Vec<&Edit> = proposal.patch.edits().collect();
        assert_eq!(
            edits,
            vec![&Edit::Capacity {
                endpoint: Endpoint::new("R1", "e0"),
                from: Some(100_000_000),
                to: 1_000_000_000,
            }]
        );
        assert!(proposal
            .remaining_findings
            .iter()
            .all(|f| f.kind != FindingKind::SpeedMismatch));
        // Canonical model untouched
        assert_eq!(
            topology.interface(&Endpoint::new("R1", "e0")).unwrap().capacity_bps,
            Some(100_000_000)
        );
    }

    #[test]
    fn test_speed_fix_rederives_link_capacity() {
        let topology = build(
            r#"
devices:
  - id: R1
    interfaces: [{name: e0, capacity: 100000000}, {name: e1, capacity: 100000000}]
  - id: R2
    interfaces: [{name: e0, capacity: 1000000000}, {name: e1, capacity: 1000000000}]
links:
  - id: L
    endpoint_a: {device: R1, interface: e0}
    endpoint_b: {device: R2, interface: e0}
  - id: M
    endpoint_a: {device: R1, interface: e1}
    endpoint_b: {device: R2, interface: e1}
    declared_capacity: 50000000
"#,
        );
        assert_eq!(topology.link("L").unwrap().capacity_bps, 100_000_000);

        let findings = validate_topology(&topology);
        let proposal = propose_fixes(&topology, &findings).unwrap();

        assert_eq!(proposal.preview.link("L").unwrap().capacity_bps, 1_000_000_000);
        // A capacity taken from the link record stays as declared
        assert_eq!(proposal.preview.link("M").unwrap().capacity_bps, 50_000_000);
        assert_eq!(topology.link("L").unwrap().capacity_bps, 100_000_000);
    }

    #[test]
    fn test_duplicate_ip_moves_second_holder() {
        let topology = build(
            r#"
devices:
  - id: R1
    interfaces: [{name: e0, ip: 10.0.0.1, subnet: 255.255.255.0}]
  - id: R2
    interfaces: [{name: e0, ip: 10.0.0.1, subnet: 255.255.255.0}]
links:
  - endpoint_a: {device: R1, interface: e0}
    endpoint_b: {device: R2, interface: e0}
"#,
        );
        let before = topology.clone();
        let findings = validate_topology(&topology);
        let proposal = propose_fixes(&topology, &findings).unwrap();

        let edits: Vec<&Edit> = proposal.patch.edits().collect();
        assert_eq!(
            edits,
            vec![&Edit::Address {
                endpoint: Endpoint::new("R2", "e0"),
                from: Some("10.0.0.1".parse().unwrap()),
                to: "10.0.0.2".parse().unwrap(),
                prefix_len: 24,
            }]
        );
        assert!(proposal.remaining_findings.iter().all(|f| f.kind != FindingKind::DuplicateIp));
        assert_eq!(topology, before);
        assert_ne!(proposal.preview, before);
    }

    #[test]
    fn test_duplicate_ip_without_prefix_needs_review() {
        let topology = build(
            r#"
devices:
  - id: R1
    interfaces: [{name: e0, ip: 10.0.0.1}]
  - id: R2
    interfaces: [{name: e0, ip: 10.0.0.1}]
"#,
        );
        let findings = validate_topology(&topology);
        let proposal = propose_fixes(&topology, &findings).unwrap();
        assert_eq!(proposal.patch.edits().count(), 0);
        let dup = proposal
            .patch
            .entries
            .iter()
            .find(|e| e.finding == FindingKind::DuplicateIp)
            .unwrap();
        assert!(dup.is_manual());
    }

    #[test]
    fn test_asymmetric_subnet_moves_lower_network() {
        let topology = build(
            r#"
devices:
  - id: R1
    interfaces: [{name: e0, ip: 10.0.1.1/30}]
  - id: R2
    interfaces: [{name: e0, ip: 10.0.2.1/30}]
links:
  - endpoint_a: {device: R1, interface: e0}
    endpoint_b: {device: R2, interface: e0}
"#,
        );
        let findings = validate_topology(&topology);
        let proposal = propose_fixes(&topology, &findings).unwrap();

        let edits: Vec<&Edit> = proposal.patch.edits().collect();
        assert_eq!(
            edits,
            vec![&Edit::Address {
                endpoint: Endpoint::new("R1", "e0"),
                from: Some("10.0.1.1".parse().unwrap()),
                to: "10.0.2.2".parse().unwrap(),
                prefix_len: 30,
            }]
        );
        assert!(proposal
            .remaining_findings
            .iter()
            .all(|f| f.kind != FindingKind::AsymmetricSubnet));
    }

    #[test]
    fn test_other_kinds_are_manual() {
        let topology = build(
            r#"
devices:
  - id: R1
    interfaces: [{name: e0, mtu: 1500}]
  - id: R2
    interfaces: [{name: e0, mtu: 9000}]
links:
  - endpoint_a: {device: R1, interface: e0}
    endpoint_b: {device: R2, interface: e0}
"#,
        );
        let findings = validate_topology(&topology);
        let proposal = propose_fixes(&topology, &findings).unwrap();
        assert!(!proposal.patch.entries.is_empty());
        assert!(proposal.patch.entries.iter().all(PatchEntry::is_manual));
        assert_eq!(proposal.preview, topology);
    }
}
