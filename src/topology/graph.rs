//! Index-based routing view over a topology.
//!
//! Device ids are mapped to dense indices in ascending id order and every
//! adjacency list is sorted by (neighbor id, link id), so algorithms that walk
//! the view visit nodes and edges in a reproducible order.

use std::collections::BTreeMap;

use super::types::{Link, Topology};
use crate::config::{AnalysisConfig, PathMetric};

/// A directed half of a traversable link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Index of the neighbor node
    pub to: usize,
    /// Index into [`RoutingGraph::links`]
    pub link: usize,
    /// Routing cost of the link under the configured metric
    pub cost: u64,
    /// Inverse-capacity cost, compared when routing costs tie
    pub tie_cost: u64,
}

/// Traversable part of a topology with dense node indices
#[derive(Debug, Clone)]
pub struct RoutingGraph<'a> {
    nodes: Vec<&'a str>,
    index: BTreeMap<&'a str, usize>,
    links: Vec<&'a Link>,
    adjacency: Vec<Vec<Edge>>,
}

impl<'a> RoutingGraph<'a> {
    /// View used for routing: honors the usability floor of the config
    pub fn for_routing(topology: &'a Topology, config: &AnalysisConfig) -> Self {
        Self::new(
            topology,
            config.path_metric,
            config.reference_bandwidth_bps,
            config.min_usable_capacity_bps,
        )
    }

    /// View used for reachability: every traversable link counts
    pub fn for_connectivity(topology: &'a Topology, config: &AnalysisConfig) -> Self {
        Self::new(topology, config.path_metric, config.reference_bandwidth_bps, 0)
    }

    pub fn new(topology: &'a Topology, metric: PathMetric, reference_bps: u64, min_capacity_bps: u64) -> Self {
        let nodes: Vec<&str> = topology.device_ids();
        let index: BTreeMap<&str, usize> = nodes.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let links: Vec<&Link> = topology
            .links()
            .filter(|link| link.is_traversable())
            .filter(|link| link.a.device != link.b.device)
            .filter(|link| {
                let capacity = link.effective_capacity_bps();
                capacity > 0 && capacity >= min_capacity_bps
            })
            .collect();

        let mut adjacency: Vec<Vec<Edge>> = vec![Vec::new(); nodes.len()];
        for (link_index, link) in links.iter().enumerate() {
            let (Some(&a), Some(&b)) = (index.get(link.a.device.as_str()), index.get(link.b.device.as_str())) else {
                continue;
            };
            let tie_cost = link_cost(link, reference_bps);
            let cost = match metric {
                PathMetric::Hops => 1,
                PathMetric::InverseCapacity => tie_cost,
            };
            adjacency[a].push(Edge { to: b, link: link_index, cost, tie_cost });
            adjacency[b].push(Edge { to: a, link: link_index, cost, tie_cost });
        }

        // Links are already in id order, so a stable sort on the neighbor keeps
        // parallel links ordered by id.
        for edges in &mut adjacency {
            edges.sort_by_key(|edge| edge.to);
        }

        Self {
            nodes,
            index,
            links,
            adjacency,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_id(&self, index: usize) -> &'a str {
        self.nodes[index]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn links(&self) -> &[&'a Link] {
        &self.links
    }

    pub fn link(&self, index: usize) -> &'a Link {
        self.links[index]
    }

    pub fn link_index(&self, id: &str) -> Option<usize> {
        self.links.iter().position(|link| link.id == id)
    }

    pub fn neighbors(&self, node: usize) -> &[Edge] {
        &self.adjacency[node]
    }
}

/// OSPF-style auto-cost: `max(1, ceil(reference / capacity))`
pub fn link_cost(link: &Link, reference_bps: u64) -> u64 {
    let capacity = link.effective_capacity_bps().max(1);
    reference_bps.div_ceil(capacity).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{DeviceRecord, EndpointRecord, LinkRecord, LinkStatusRecord, TopologyInput};
    use crate::topology::{build_topology, BuildOptions};

    fn topology() -> Topology {
        let input = TopologyInput {
            devices: vec![
                DeviceRecord::with_interfaces("B", &["e0", "e1"]),
                DeviceRecord::with_interfaces("A", &["e0", "e1", "e2"]),
                DeviceRecord::with_interfaces("C", &["e0"]),
            ],
            links: vec![
                LinkRecord::between(EndpointRecord::new("A", "e0"), EndpointRecord::new("B", "e0"), Some(1_000)),
                LinkRecord::between(EndpointRecord::new("A", "e1"), EndpointRecord::new("B", "e1"), Some(10_000)),
                LinkRecord {
                    status: Some(LinkStatusRecord::Down),
                    ..LinkRecord::between(EndpointRecord::new("A", "e2"), EndpointRecord::new("C", "e0"), Some(10_000))
                },
            ],
        };
        build_topology(&input, &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_nodes_sorted_and_down_links_skipped() {
        let topology = topology();
        let graph = RoutingGraph::new(&topology, PathMetric::InverseCapacity, 10_000, 0);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.node_id(0), "A");
        assert_eq!(graph.index_of("C"), Some(2));
        assert_eq!(graph.links().len(), 2);
        assert!(graph.neighbors(2).is_empty());

        let a = graph.neighbors(0);
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].cost, 10);
        assert_eq!(a[1].cost, 1);
    }

    #[test]
    fn test_capacity_floor() {
        let topology = topology();
        let graph = RoutingGraph::new(&topology, PathMetric::InverseCapacity, 10_000, 5_000);
        assert_eq!(graph.links().len(), 1);
        assert_eq!(graph.link(0).capacity_bps, 10_000);
        assert_eq!(graph.link_index(&graph.link(0).id), Some(0));
    }

    #[test]
    fn test_hop_metric_keeps_capacity_as_tie_cost() {
        let topology = topology();
        let graph = RoutingGraph::new(&topology, PathMetric::Hops, 10_000, 0);
        let a = graph.neighbors(0);
        assert!(a.iter().all(|edge| edge.cost == 1));
        assert_eq!(a[0].tie_cost, 10);
        assert_eq!(a[1].tie_cost, 1);
    }

    #[test]
    fn test_degraded_link_costs_double() {
        let input = TopologyInput {
            devices: vec![
                DeviceRecord::with_interfaces("A", &["e0", "e1"]),
                DeviceRecord::with_interfaces("B", &["e0", "e1"]),
            ],
            links: vec![
                LinkRecord::between(EndpointRecord::new("A", "e0"), EndpointRecord::new("B", "e0"), Some(1_000)),
                LinkRecord {
                    status: Some(LinkStatusRecord::Degraded),
                    ..LinkRecord::between(EndpointRecord::new("A", "e1"), EndpointRecord::new("B", "e1"), Some(1_000))
                },
            ],
        };
        let topology = build_topology(&input, &BuildOptions::default()).unwrap();
        let healthy = topology.link("A:e0--B:e0").unwrap();
        let degraded = topology.link("A:e1--B:e1").unwrap();

        assert_eq!(degraded.effective_capacity_bps(), 500);
        assert_eq!(link_cost(healthy, 10_000), 10);
        assert_eq!(link_cost(degraded, 10_000), 20);

        let graph = RoutingGraph::new(&topology, PathMetric::InverseCapacity, 10_000, 0);
        let costs: Vec<u64> = graph.neighbors(0).iter().map(|edge| edge.cost).collect();
        assert_eq!(costs, vec![10, 20]);

        // Below the floor once halved
        let graph = RoutingGraph::new(&topology, PathMetric::InverseCapacity, 10_000, 800);
        assert_eq!(graph.links().len(), 1);
    }
}
