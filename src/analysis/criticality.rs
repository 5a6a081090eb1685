//! Critical link detection.
//!
//! A link is critical when losing it affects at least
//! `criticality_pair_threshold` device pairs. Bridges (cut edges, found with
//! the low-link DFS) affect every pair they separate. Any other link affects
//! the pairs whose path cost grows by more than `cost_increase_ratio`, or
//! which lose their last usable path.

use super::paths::all_pairs_costs;
use super::reachability::component_labels;
use super::types::*;
use super::budgeted_par_map;
use crate::config::AnalysisConfig;
use crate::topology::{DeviceId, LinkId, RoutingGraph, Topology};

const UNVISITED: usize = usize::MAX;

/// Depth-first search tree with bridge information
struct DfsTree {
    tin: Vec<usize>,
    tout: Vec<usize>,
    /// (link index, child node below the bridge)
    bridges: Vec<(usize, usize)>,
}

impl DfsTree {
    fn in_subtree(&self, root: usize, node: usize) -> bool {
        self.tin[root] <= self.tin[node] && self.tin[node] < self.tout[root]
    }
}

/// Iterative low-link search. Parallel links are distinct edges, so only the
/// link used to enter a node is skipped when looking for back edges.
fn dfs_bridges(graph: &RoutingGraph<'_>) -> DfsTree {
    let n = graph.node_count();
    let mut tin = vec![UNVISITED; n];
    let mut low = vec![0usize; n];
    let mut tout = vec![0usize; n];
    let mut bridges = Vec::new();
    let mut timer = 0usize;

    for root in 0..n {
        if tin[root] != UNVISITED {
            continue;
        }
        tin[root] = timer;
        low[root] = timer;
        timer += 1;

        // (node, link used to reach it, next neighbor to inspect)
        let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(root, None, 0)];
        while let Some(frame) = stack.last_mut() {
            let (node, entry_link) = (frame.0, frame.1);
            let neighbors = graph.neighbors(node);

            if frame.2 < neighbors.len() {
                let edge = neighbors[frame.2];
                frame.2 += 1;
                if Some(edge.link) == entry_link {
                    continue;
                }
                if tin[edge.to] == UNVISITED {
                    tin[edge.to] = timer;
                    low[edge.to] = timer;
                    timer += 1;
                    stack.push((edge.to, Some(edge.link), 0));
                } else {
                    low[node] = low[node].min(tin[edge.to]);
                }
                continue;
            }

            stack.pop();
            tout[node] = timer;
            if let (Some(&(parent, _, _)), Some(link)) = (stack.last(), entry_link) {
                low[parent] = low[parent].min(low[node]);
                if low[node] > tin[parent] {
                    bridges.push((link, node));
                }
            }
        }
    }

    bridges.sort_unstable();
    DfsTree { tin, tout, bridges }
}

/// Ids of all bridge links, ascending
pub fn find_bridges(topology: &Topology, config: &AnalysisConfig) -> Vec<LinkId> {
    let graph = RoutingGraph::for_connectivity(topology, config);
    dfs_bridges(&graph)
        .bridges
        .iter()
        .map(|&(link, _)| graph.link(link).id.clone())
        .collect()
}

fn ordered_pair(a: &str, b: &str) -> (DeviceId, DeviceId) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Evaluate every traversable link.
///
/// `baseline` is the routing cost matrix, absent when the budget was already
/// exhausted; bridges are still reported in that case. Returns the critical
/// links ordered by id and whether the evaluation was cut short.
pub(crate) fn evaluate_criticality(
    connectivity: &RoutingGraph<'_>,
    routing: &RoutingGraph<'_>,
    baseline: Option<&[Vec<Option<u64>>]>,
    config: &AnalysisConfig,
    budget: &mut Budget,
) -> (Vec<CriticalLink>, bool) {
    let tree = dfs_bridges(connectivity);
    let labels = component_labels(connectivity, None);
    let n = connectivity.node_count();

    let mut candidates: Vec<(usize, Option<usize>)> = Vec::new();
    let mut affected: Vec<Option<(bool, Vec<(DeviceId, DeviceId)>)>> = vec![None; connectivity.links().len()];

    for link_index in 0..connectivity.links().len() {
        match tree.bridges.binary_search_by_key(&link_index, |&(link, _)| link) {
            Ok(pos) => {
                let child = tree.bridges[pos].1;
                let component = labels[child];
                let mut pairs = Vec::new();
                for x in (0..n).filter(|&x| labels[x] == component && tree.in_subtree(child, x)) {
                    for y in (0..n).filter(|&y| labels[y] == component && !tree.in_subtree(child, y)) {
                        pairs.push(ordered_pair(connectivity.node_id(x), connectivity.node_id(y)));
                    }
                }
                pairs.sort();
                affected[link_index] = Some((true, pairs));
            }
            Err(_) => {
                let routing_index = routing.link_index(&connectivity.link(link_index).id);
                candidates.push((link_index, routing_index));
            }
        }
    }

    let mut truncated = baseline.is_none();
    if let Some(baseline) = baseline {
        let (results, cut) = budgeted_par_map(&candidates, budget, |&(_, routing_index)| {
            let Some(routing_index) = routing_index else {
                // Not used for routing, so no path cost can change
                return (Vec::new(), 0);
            };
            let mut steps_budget = Budget::unlimited();
            let Some(after) = all_pairs_costs(routing, Some(routing_index), &mut steps_budget) else {
                return (Vec::new(), 0);
            };
            let mut pairs = Vec::new();
            for a in 0..routing.node_count() {
                for b in (a + 1)..routing.node_count() {
                    let Some(before) = baseline[a][b] else {
                        continue;
                    };
                    let degraded = match after[a][b] {
                        None => true,
                        Some(cost) => cost as f64 > before as f64 * config.cost_increase_ratio,
                    };
                    if degraded {
                        pairs.push(ordered_pair(routing.node_id(a), routing.node_id(b)));
                    }
                }
            }
            pairs.sort();
            (pairs, steps_budget.used())
        });
        truncated = cut;
        for ((link_index, _), pairs) in candidates.iter().zip(results) {
            affected[*link_index] = Some((false, pairs));
        }
    }

    let critical = affected
        .into_iter()
        .enumerate()
        .filter_map(|(link_index, outcome)| {
            let (is_bridge, pairs) = outcome?;
            if pairs.len() < config.criticality_pair_threshold {
                return None;
            }
            let link = connectivity.link(link_index);
            Some(CriticalLink {
                link: link.id.clone(),
                devices: link.device_ids(),
                is_bridge,
                disconnected_pairs: if is_bridge { pairs.len() } else { 0 },
                degraded_pairs: if is_bridge { 0 } else { pairs.len() },
                affected_pairs: pairs,
            })
        })
        .collect();

    (critical, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::paths::all_pairs_costs;
    use crate::records::{DeviceRecord, EndpointRecord, LinkRecord, TopologyInput};
    use crate::topology::{build_topology, BuildOptions};

    fn chain_with_parallel() -> Topology {
        // A = B (two parallel links), B - C, C - D
        let input = TopologyInput {
            devices: vec![
                DeviceRecord::with_interfaces("A", &["0", "1"]),
                DeviceRecord::with_interfaces("B", &["0", "1", "2"]),
                DeviceRecord::with_interfaces("C", &["0", "1"]),
                DeviceRecord::with_interfaces("D", &["0"]),
            ],
            links: vec![
                LinkRecord::between(EndpointRecord::new("A", "0"), EndpointRecord::new("B", "0"), None),
                LinkRecord::between(EndpointRecord::new("A", "1"), EndpointRecord::new("B", "1"), None),
                LinkRecord::between(EndpointRecord::new("B", "2"), EndpointRecord::new("C", "0"), None),
                LinkRecord::between(EndpointRecord::new("C", "1"), EndpointRecord::new("D", "0"), None),
            ],
        };
        build_topology(&input, &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_parallel_links_are_not_bridges() {
        let topology = chain_with_parallel();
        let bridges = find_bridges(&topology, &AnalysisConfig::default());
        assert_eq!(bridges, vec!["B:2--C:0".to_string(), "C:1--D:0".to_string()]);
    }

    #[test]
    fn test_bridge_affected_pairs() {
        let topology = chain_with_parallel();
        let config = AnalysisConfig::default();
        let connectivity = RoutingGraph::for_connectivity(&topology, &config);
        let routing = RoutingGraph::for_routing(&topology, &config);
        let mut budget = Budget::unlimited();
        let baseline = all_pairs_costs(&routing, None, &mut budget).unwrap();

        let (critical, truncated) = evaluate_criticality(&connectivity, &routing, Some(baseline.as_slice()), &config, &mut budget);
        assert!(!truncated);
        assert_eq!(critical.len(), 2);

        let b_c = &critical[0];
        assert_eq!(b_c.link, "B:2--C:0");
        assert!(b_c.is_bridge);
        // {A, B} x {C, D}
        assert_eq!(b_c.disconnected_pairs, 4);
        assert!(b_c.affected_pairs.contains(&("A".to_string(), "D".to_string())));

        let c_d = &critical[1];
        assert_eq!(c_d.disconnected_pairs, 3);
    }

    #[test]
    fn test_truncated_baseline_still_reports_bridges() {
        let topology = chain_with_parallel();
        let config = AnalysisConfig::default();
        let connectivity = RoutingGraph::for_connectivity(&topology, &config);
        let routing = RoutingGraph::for_routing(&topology, &config);
        let mut budget = Budget::new(Some(0));

        let (critical, truncated) = evaluate_criticality(&connectivity, &routing, None, &config, &mut budget);
        assert!(truncated);
        assert_eq!(critical.len(), 2);
        assert!(critical.iter().all(|c| c.is_bridge));
    }
}
