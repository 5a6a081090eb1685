//! Topology consistency validation.
//!
//! Every check runs on every invocation and contributes its findings; nothing
//! short-circuits. The validator only reads the topology, so it can be called
//! repeatedly and from several threads at once.

use std::collections::{BTreeMap, VecDeque};
use std::net::Ipv4Addr;

use log::info;

use crate::config::PathMetric;
use crate::finding::{sort_findings, Finding, FindingKind, Severity};
use crate::topology::{Endpoint, LinkStatus, Resolution, RoutingGraph, Topology};

/// Run the full validation battery and return findings in report order
pub fn validate_topology(topology: &Topology) -> Vec<Finding> {
    let mut findings = Vec::new();

    check_unresolved_links(topology, &mut findings);
    check_duplicate_ips(topology, &mut findings);
    check_speed_mismatch(topology, &mut findings);
    check_subnet_asymmetry(topology, &mut findings);
    check_isolated_devices(topology, &mut findings);
    check_capacity_exceeded(topology, &mut findings);
    check_mtu_mismatch(topology, &mut findings);
    check_gateways(topology, &mut findings);
    check_interface_reuse(topology, &mut findings);
    check_admin_down_endpoints(topology, &mut findings);
    check_loops(topology, &mut findings);

    sort_findings(&mut findings);
    info!("Validation complete, {} findings", findings.len());
    findings
}

fn check_unresolved_links(topology: &Topology, findings: &mut Vec<Finding>) {
    for link in topology.links() {
        if let Resolution::Unresolved { reasons } = &link.resolution {
            findings.push(Finding::new(
                FindingKind::OrphanLink,
                Severity::Error,
                link.device_ids(),
                vec![link.id.clone()],
                format!("Link {} cannot be resolved: {}", link.id, reasons.join("; ")),
            ));
        }
    }
}

fn check_duplicate_ips(topology: &Topology, findings: &mut Vec<Finding>) {
    let mut holders: BTreeMap<Ipv4Addr, Vec<Endpoint>> = BTreeMap::new();
    for device in topology.devices() {
        for iface in device.interfaces.values() {
            if let Some(ip) = iface.ip {
                holders
                    .entry(ip)
                    .or_default()
                    .push(Endpoint::new(device.id.clone(), iface.name.clone()));
            }
        }
    }

    for (ip, endpoints) in holders {
        if endpoints.len() < 2 {
            continue;
        }
        let listed: Vec<String> = endpoints.iter().map(Endpoint::to_string).collect();
        findings.push(Finding::new(
            FindingKind::DuplicateIp,
            Severity::Error,
            endpoints.iter().map(|e| e.device.clone()).collect(),
            vec![],
            format!("Duplicate IP {} on {}", ip, listed.join(", ")),
        ));
    }
}

fn check_speed_mismatch(topology: &Topology, findings: &mut Vec<Finding>) {
    for link in topology.links().filter(|link| link.is_resolved()) {
        let (Some(a), Some(b)) = (topology.interface(&link.a), topology.interface(&link.b)) else {
            continue;
        };
        if let (Some(speed_a), Some(speed_b)) = (a.capacity_bps, b.capacity_bps) {
            if speed_a != speed_b {
                findings.push(Finding::new(
                    FindingKind::SpeedMismatch,
                    Severity::Warning,
                    link.device_ids(),
                    vec![link.id.clone()],
                    format!(
                        "Speed mismatch on {}: {} declares {} bps, {} declares {} bps",
                        link.id, link.a, speed_a, link.b, speed_b
                    ),
                ));
            }
        }
    }
}

fn check_subnet_asymmetry(topology: &Topology, findings: &mut Vec<Finding>) {
    for link in topology.links().filter(|link| link.is_resolved()) {
        let subnet_a = topology.interface(&link.a).and_then(|iface| iface.subnet());
        let subnet_b = topology.interface(&link.b).and_then(|iface| iface.subnet());
        if let (Some(subnet_a), Some(subnet_b)) = (subnet_a, subnet_b) {
            if !subnet_a.overlaps(&subnet_b) {
                findings.push(Finding::new(
                    FindingKind::AsymmetricSubnet,
                    Severity::Warning,
                    link.device_ids(),
                    vec![link.id.clone()],
                    format!(
                        "Subnet asymmetry on {}: {} is in {}, {} is in {}",
                        link.id, link.a, subnet_a, link.b, subnet_b
                    ),
                ));
            }
        }
    }
}

fn check_isolated_devices(topology: &Topology, findings: &mut Vec<Finding>) {
    for device in topology.devices() {
        if topology.resolved_links_of(&device.id).next().is_none() {
            findings.push(Finding::new(
                FindingKind::IsolatedDevice,
                Severity::Warning,
                vec![device.id.clone()],
                vec![],
                format!("Device {} has no resolved links", device.id),
            ));
        }
    }
}

fn check_capacity_exceeded(topology: &Topology, findings: &mut Vec<Finding>) {
    for link in topology.links() {
        if let Some(load) = link.load_bps {
            if load > link.capacity_bps {
                findings.push(Finding::new(
                    FindingKind::CapacityExceeded,
                    Severity::Error,
                    link.device_ids(),
                    vec![link.id.clone()],
                    format!(
                        "Link {} carries {} bps over a capacity of {} bps",
                        link.id, load, link.capacity_bps
                    ),
                ));
            }
        }
    }
}

fn check_mtu_mismatch(topology: &Topology, findings: &mut Vec<Finding>) {
    for link in topology.links().filter(|link| link.is_resolved()) {
        let mtu_a = topology.interface(&link.a).and_then(|iface| iface.mtu);
        let mtu_b = topology.interface(&link.b).and_then(|iface| iface.mtu);
        if let (Some(mtu_a), Some(mtu_b)) = (mtu_a, mtu_b) {
            if mtu_a != mtu_b {
                findings.push(Finding::new(
                    FindingKind::MtuMismatch,
                    Severity::Warning,
                    link.device_ids(),
                    vec![link.id.clone()],
                    format!("MTU mismatch between {} ({}) and {} ({})", link.a, mtu_a, link.b, mtu_b),
                ));
            }
        }
    }
}

fn check_gateways(topology: &Topology, findings: &mut Vec<Finding>) {
    for device in topology.devices() {
        let Some(gateway) = device.default_gateway else {
            continue;
        };
        let reachable = device
            .interfaces
            .values()
            .filter_map(|iface| iface.subnet())
            .any(|subnet| subnet.contains(gateway));
        if !reachable {
            findings.push(Finding::new(
                FindingKind::GatewayOutsideSubnet,
                Severity::Warning,
                vec![device.id.clone()],
                vec![],
                format!("Default gateway {} on {} is not in any local interface subnet", gateway, device.id),
            ));
        }
    }
}

fn check_interface_reuse(topology: &Topology, findings: &mut Vec<Finding>) {
    let mut usage: BTreeMap<&Endpoint, Vec<&str>> = BTreeMap::new();
    for link in topology.links().filter(|link| link.is_resolved()) {
        usage.entry(&link.a).or_default().push(&link.id);
        usage.entry(&link.b).or_default().push(&link.id);
    }

    for (endpoint, links) in usage {
        if links.len() < 2 {
            continue;
        }
        findings.push(Finding::new(
            FindingKind::InterfaceReuse,
            Severity::Error,
            vec![endpoint.device.clone()],
            links.iter().map(|id| id.to_string()).collect(),
            format!("Interface {} terminates {} links: {}", endpoint, links.len(), links.join(", ")),
        ));
    }
}

fn check_admin_down_endpoints(topology: &Topology, findings: &mut Vec<Finding>) {
    for link in topology.links().filter(|link| link.is_resolved() && link.status != LinkStatus::Down) {
        for endpoint in [&link.a, &link.b] {
            let shut = topology.interface(endpoint).is_some_and(|iface| !iface.admin_up);
            if shut {
                findings.push(Finding::new(
                    FindingKind::AdminDownEndpoint,
                    Severity::Warning,
                    vec![endpoint.device.clone()],
                    vec![link.id.clone()],
                    format!("Link {} is {} but interface {} is administratively down", link.id, link.status, endpoint),
                ));
            }
        }
    }
}

/// One finding per independent cycle: every traversable link outside a
/// breadth-first spanning forest closes exactly one loop.
fn check_loops(topology: &Topology, findings: &mut Vec<Finding>) {
    let graph = RoutingGraph::new(topology, PathMetric::Hops, 1, 0);
    let n = graph.node_count();
    let mut parent: Vec<Option<(usize, usize)>> = vec![None; n];
    let mut depth: Vec<usize> = vec![0; n];
    let mut visited = vec![false; n];
    let mut tree_links = vec![false; graph.links().len()];

    for root in 0..n {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            for edge in graph.neighbors(node) {
                if !visited[edge.to] {
                    visited[edge.to] = true;
                    parent[edge.to] = Some((node, edge.link));
                    depth[edge.to] = depth[node] + 1;
                    tree_links[edge.link] = true;
                    queue.push_back(edge.to);
                }
            }
        }
    }

    for (link_index, link) in graph.links().iter().enumerate() {
        if tree_links[link_index] {
            continue;
        }
        let (Some(mut u), Some(mut v)) = (graph.index_of(&link.a.device), graph.index_of(&link.b.device)) else {
            continue;
        };

        let mut devices = Vec::new();
        let mut links = vec![link.id.clone()];
        while u != v {
            let step_from = if depth[u] >= depth[v] { &mut u } else { &mut v };
            devices.push(graph.node_id(*step_from).to_string());
            match parent[*step_from] {
                Some((up, via)) => {
                    links.push(graph.link(via).id.clone());
                    *step_from = up;
                }
                None => break,
            }
        }
        devices.push(graph.node_id(u).to_string());

        let mut cycle = devices.clone();
        cycle.sort();
        findings.push(Finding::new(
            FindingKind::NetworkLoop,
            Severity::Info,
            devices,
            links,
            format!("Network loop closed by {} among {}", link.id, cycle.join(", ")),
        ));
    }
}
