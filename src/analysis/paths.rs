//! Lowest-cost paths over the routing graph.
//!
//! Link costs are non-negative integers, so Dijkstra applies. Under the
//! default hop metric every link costs 1 and the inverse-capacity cost (see
//! [`crate::topology::graph::link_cost`]) decides between equally short
//! paths. Remaining ties go to the lexicographically smallest device-id
//! sequence, then to the smaller link ids; node and link indices follow id
//! order, which lets the search compare index sequences directly.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::budgeted_par_map;
use super::types::*;
use crate::config::AnalysisConfig;
use crate::topology::{RoutingGraph, Topology};

/// A path found by the search, as node and link indices
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Route {
    pub cost: u64,
    pub tie_cost: u64,
    pub nodes: Vec<usize>,
    pub links: Vec<usize>,
}

/// Best route from `source` to every node, plus the number of edge relaxations
pub(crate) fn shortest_path_tree(
    graph: &RoutingGraph<'_>,
    source: usize,
    excluded_link: Option<usize>,
) -> (Vec<Option<Route>>, u64) {
    let mut best: Vec<Option<Route>> = vec![None; graph.node_count()];
    let mut steps = 0u64;
    let start = Route {
        cost: 0,
        tie_cost: 0,
        nodes: vec![source],
        links: Vec::new(),
    };
    best[source] = Some(start.clone());

    let mut heap = BinaryHeap::new();
    heap.push(Reverse(start));

    while let Some(Reverse(route)) = heap.pop() {
        let Some(&node) = route.nodes.last() else {
            continue;
        };
        if best[node].as_ref() != Some(&route) {
            continue;
        }
        for edge in graph.neighbors(node) {
            steps += 1;
            if Some(edge.link) == excluded_link {
                continue;
            }
            let mut candidate = Route {
                cost: route.cost.saturating_add(edge.cost),
                tie_cost: route.tie_cost.saturating_add(edge.tie_cost),
                nodes: route.nodes.clone(),
                links: route.links.clone(),
            };
            candidate.nodes.push(edge.to);
            candidate.links.push(edge.link);

            let improves = best[edge.to].as_ref().map_or(true, |current| candidate < *current);
            if improves {
                best[edge.to] = Some(candidate.clone());
                heap.push(Reverse(candidate));
            }
        }
    }

    (best, steps)
}

/// Path cost from `source` to every node, plus the number of edge relaxations
pub(crate) fn distances(
    graph: &RoutingGraph<'_>,
    source: usize,
    excluded_link: Option<usize>,
) -> (Vec<Option<u64>>, u64) {
    let mut dist: Vec<Option<u64>> = vec![None; graph.node_count()];
    let mut steps = 0u64;
    dist[source] = Some(0);

    let mut heap = BinaryHeap::new();
    heap.push(Reverse((0u64, source)));

    while let Some(Reverse((cost, node))) = heap.pop() {
        if dist[node].is_some_and(|known| cost > known) {
            continue;
        }
        for edge in graph.neighbors(node) {
            steps += 1;
            if Some(edge.link) == excluded_link {
                continue;
            }
            let next = cost.saturating_add(edge.cost);
            if dist[edge.to].map_or(true, |known| next < known) {
                dist[edge.to] = Some(next);
                heap.push(Reverse((next, edge.to)));
            }
        }
    }

    (dist, steps)
}

/// Cost matrix for every source, or `None` if the budget ran out
pub(crate) fn all_pairs_costs(
    graph: &RoutingGraph<'_>,
    excluded_link: Option<usize>,
    budget: &mut Budget,
) -> Option<Vec<Vec<Option<u64>>>> {
    let sources: Vec<usize> = (0..graph.node_count()).collect();
    let (rows, truncated) = budgeted_par_map(&sources, budget, |&source| distances(graph, source, excluded_link));
    if truncated {
        None
    } else {
        Some(rows)
    }
}

pub(crate) fn to_path_result(graph: &RoutingGraph<'_>, route: &Route) -> PathResult {
    let devices: Vec<String> = route.nodes.iter().map(|&n| graph.node_id(n).to_string()).collect();
    PathResult {
        source: devices.first().cloned().unwrap_or_default(),
        target: devices.last().cloned().unwrap_or_default(),
        links: route.links.iter().map(|&l| graph.link(l).id.clone()).collect(),
        cost: route.cost,
        hops: route.links.len(),
        devices,
    }
}

/// Lowest-cost path between two devices.
///
/// Returns `None` when either device is unknown or no usable path exists.
pub fn shortest_path(topology: &Topology, from: &str, to: &str, config: &AnalysisConfig) -> Option<PathResult> {
    let graph = RoutingGraph::for_routing(topology, config);
    let source = graph.index_of(from)?;
    let target = graph.index_of(to)?;
    let (tree, _) = shortest_path_tree(&graph, source, None);
    tree[target].as_ref().map(|route| to_path_result(&graph, route))
}

/// Per-component path statistics from a full cost matrix
pub(crate) fn summarize_paths(reachability: &Reachability, graph: &RoutingGraph<'_>, costs: &[Vec<Option<u64>>]) -> Vec<ComponentPaths> {
    reachability
        .components
        .iter()
        .map(|component| {
            let members: Vec<usize> = component
                .devices
                .iter()
                .filter_map(|id| graph.index_of(id))
                .collect();

            let mut routed = 0usize;
            let mut unrouted = 0usize;
            let mut total = 0u64;
            let mut max_cost = 0u64;
            for (i, &a) in members.iter().enumerate() {
                for &b in &members[i + 1..] {
                    match costs[a][b] {
                        Some(cost) => {
                            routed += 1;
                            total = total.saturating_add(cost);
                            max_cost = max_cost.max(cost);
                        }
                        None => unrouted += 1,
                    }
                }
            }

            ComponentPaths {
                component: component.id,
                routed_pairs: routed,
                unrouted_pairs: unrouted,
                average_cost: if routed > 0 { total as f64 / routed as f64 } else { 0.0 },
                max_cost,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathMetric;
    use crate::records::{DeviceRecord, EndpointRecord, LinkRecord, LinkStatusRecord, TopologyInput};
    use crate::topology::{build_topology, BuildOptions};

    const GBPS: u64 = 1_000_000_000;

    fn link(a: &str, ai: &str, b: &str, bi: &str, capacity: u64) -> LinkRecord {
        LinkRecord::between(EndpointRecord::new(a, ai), EndpointRecord::new(b, bi), Some(capacity))
    }

    fn square(diagonal_capacity: u64) -> Topology {
        // A - B - D and A - C - D, plus a diagonal A - D
        let input = TopologyInput {
            devices: vec![
                DeviceRecord::with_interfaces("A", &["b", "c", "d"]),
                DeviceRecord::with_interfaces("B", &["a", "d"]),
                DeviceRecord::with_interfaces("C", &["a", "d"]),
                DeviceRecord::with_interfaces("D", &["a", "b", "c"]),
            ],
            links: vec![
                link("A", "b", "B", "a", GBPS),
                link("B", "d", "D", "b", GBPS),
                link("A", "c", "C", "a", GBPS),
                link("C", "d", "D", "c", GBPS),
                link("A", "d", "D", "a", diagonal_capacity),
            ],
        };
        build_topology(&input, &BuildOptions::default()).unwrap()
    }

    fn inverse_capacity(reference_bandwidth_bps: u64) -> AnalysisConfig {
        AnalysisConfig {
            path_metric: PathMetric::InverseCapacity,
            reference_bandwidth_bps,
            ..Default::default()
        }
    }

    #[test]
    fn test_equal_cost_tie_breaks_lexicographically() {
        // Diagonal costs 10, both two-hop paths cost 2
        let topology = square(100_000_000);
        let path = shortest_path(&topology, "A", "D", &inverse_capacity(GBPS)).unwrap();
        assert_eq!(path.devices, vec!["A", "B", "D"]);
        assert_eq!(path.cost, 2);
        assert_eq!(path.hops, 2);
        assert_eq!(path.links, vec!["A:b--B:a", "B:d--D:b"]);
    }

    #[test]
    fn test_inverse_capacity_weighting() {
        let topology = square(GBPS);
        let path = shortest_path(&topology, "A", "D", &inverse_capacity(GBPS)).unwrap();
        assert_eq!(path.devices, vec!["A", "D"]);
        assert_eq!(path.cost, 1);
    }

    #[test]
    fn test_hop_metric_prefers_fewer_hops() {
        let topology = square(100_000_000);
        let path = shortest_path(&topology, "A", "D", &AnalysisConfig::default()).unwrap();
        assert_eq!(path.devices, vec!["A", "D"]);
        assert_eq!(path.cost, 1);
    }

    #[test]
    fn test_hop_ties_go_to_higher_capacity() {
        // Two 2-hop paths A-B-D and A-C-D; A-B is the slow one
        let input = TopologyInput {
            devices: vec![
                DeviceRecord::with_interfaces("A", &["b", "c"]),
                DeviceRecord::with_interfaces("B", &["a", "d"]),
                DeviceRecord::with_interfaces("C", &["a", "d"]),
                DeviceRecord::with_interfaces("D", &["b", "c"]),
            ],
            links: vec![
                link("A", "b", "B", "a", 10_000_000),
                link("B", "d", "D", "b", GBPS),
                link("A", "c", "C", "a", GBPS),
                link("C", "d", "D", "c", GBPS),
            ],
        };
        let topology = build_topology(&input, &BuildOptions::default()).unwrap();
        let path = shortest_path(&topology, "A", "D", &AnalysisConfig::default()).unwrap();
        assert_eq!(path.devices, vec!["A", "C", "D"]);
        assert_eq!(path.cost, 2);
    }

    #[test]
    fn test_degraded_link_loses_hop_tie() {
        let mut input = TopologyInput {
            devices: vec![
                DeviceRecord::with_interfaces("A", &["b", "c"]),
                DeviceRecord::with_interfaces("B", &["a", "d"]),
                DeviceRecord::with_interfaces("C", &["a", "d"]),
                DeviceRecord::with_interfaces("D", &["b", "c"]),
            ],
            links: vec![
                link("A", "b", "B", "a", 100_000_000),
                link("B", "d", "D", "b", 100_000_000),
                link("A", "c", "C", "a", 100_000_000),
                link("C", "d", "D", "c", 100_000_000),
            ],
        };
        let topology = build_topology(&input, &BuildOptions::default()).unwrap();
        let config = AnalysisConfig::default();
        assert_eq!(shortest_path(&topology, "A", "D", &config).unwrap().devices, vec!["A", "B", "D"]);

        input.links[0].status = Some(LinkStatusRecord::Degraded);
        let topology = build_topology(&input, &BuildOptions::default()).unwrap();
        assert_eq!(shortest_path(&topology, "A", "D", &config).unwrap().devices, vec!["A", "C", "D"]);
    }

    #[test]
    fn test_usability_floor_excludes_weak_links() {
        let config = AnalysisConfig {
            reference_bandwidth_bps: 100_000_000,
            min_usable_capacity_bps: GBPS,
            ..Default::default()
        };
        let topology = square(500_000_000);
        let path = shortest_path(&topology, "A", "D", &config).unwrap();
        assert_eq!(path.hops, 2);
    }

    #[test]
    fn test_path_cost_saturates() {
        // Each 1 bps link costs u64::MAX under this reference
        let input = TopologyInput {
            devices: vec![
                DeviceRecord::with_interfaces("A", &["b"]),
                DeviceRecord::with_interfaces("B", &["a", "c"]),
                DeviceRecord::with_interfaces("C", &["b"]),
            ],
            links: vec![link("A", "b", "B", "a", 1), link("B", "c", "C", "b", 1)],
        };
        let topology = build_topology(&input, &BuildOptions::default()).unwrap();
        let config = inverse_capacity(u64::MAX);

        let path = shortest_path(&topology, "A", "C", &config).unwrap();
        assert_eq!(path.devices, vec!["A", "B", "C"]);
        assert_eq!(path.cost, u64::MAX);

        let report = crate::analysis::analyze_topology(&topology, &config);
        assert_eq!(report.paths[0].max_cost, u64::MAX);
    }

    #[test]
    fn test_unknown_or_unreachable() {
        let topology = square(GBPS);
        let config = AnalysisConfig::default();
        assert!(shortest_path(&topology, "A", "Z", &config).is_none());

        let path = shortest_path(&topology, "B", "B", &config).unwrap();
        assert_eq!(path.hops, 0);
        assert_eq!(path.cost, 0);
    }

    #[test]
    fn test_distances_match_tree_costs() {
        let topology = square(100_000_000);
        let config = AnalysisConfig::default();
        let graph = RoutingGraph::for_routing(&topology, &config);
        for source in 0..graph.node_count() {
            let (tree, _) = shortest_path_tree(&graph, source, None);
            let (dist, _) = distances(&graph, source, None);
            let tree_costs: Vec<Option<u64>> = tree.iter().map(|r| r.as_ref().map(|r| r.cost)).collect();
            assert_eq!(tree_costs, dist);
        }
    }
}
