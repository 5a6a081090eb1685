//! Bandwidth analysis: measured utilization and estimated demand load.

use super::budgeted_par_map;
use super::paths::shortest_path_tree;
use super::types::*;
use crate::config::AnalysisConfig;
use crate::topology::{RoutingGraph, Topology};

/// Utilization ratio for every link with a known load, in link id order.
///
/// Ratios are taken against declared capacity; a down link with a stale load
/// figure is still reported.
pub fn analyze_utilization(topology: &Topology, config: &AnalysisConfig) -> Vec<LinkUtilization> {
    topology
        .links()
        .filter_map(|link| {
            let ratio = link.utilization()?;
            Some(LinkUtilization {
                link: link.id.clone(),
                capacity_bps: link.capacity_bps,
                load_bps: link.load_bps.unwrap_or(0),
                ratio,
                high: ratio > config.high_utilization_threshold,
            })
        })
        .collect()
}

/// Route `demand_per_pair_bps` between every ordered pair of routable devices
/// and sum the load each link would carry.
///
/// Returns `None` when the budget runs out before every source is routed.
pub fn estimate_demand_load(
    topology: &Topology,
    config: &AnalysisConfig,
    demand_per_pair_bps: u64,
    budget: &mut Budget,
) -> Option<Vec<LinkLoadEstimate>> {
    let graph = RoutingGraph::for_routing(topology, config);
    estimate_on_graph(&graph, demand_per_pair_bps, budget)
}

pub(crate) fn estimate_on_graph(
    graph: &RoutingGraph<'_>,
    demand_per_pair_bps: u64,
    budget: &mut Budget,
) -> Option<Vec<LinkLoadEstimate>> {
    let sources: Vec<usize> = (0..graph.node_count()).collect();
    let link_count = graph.links().len();

    let (per_source, truncated) = budgeted_par_map(&sources, budget, |&source| {
        let (tree, steps) = shortest_path_tree(graph, source, None);
        let mut load = vec![0u64; link_count];
        for (target, route) in tree.iter().enumerate() {
            if target == source {
                continue;
            }
            if let Some(route) = route {
                for &link in &route.links {
                    load[link] = load[link].saturating_add(demand_per_pair_bps);
                }
            }
        }
        (load, steps)
    });
    if truncated {
        return None;
    }

    let mut totals = vec![0u64; link_count];
    for load in per_source {
        for (total, value) in totals.iter_mut().zip(load) {
            *total = total.saturating_add(value);
        }
    }

    Some(
        graph
            .links()
            .iter()
            .zip(totals)
            .map(|(link, estimated)| LinkLoadEstimate {
                link: link.id.clone(),
                capacity_bps: link.capacity_bps,
                estimated_load_bps: estimated,
                ratio: estimated as f64 / link.capacity_bps.max(1) as f64,
            })
            .collect(),
    )
}

/// Extra load per link when `volume_bps` enters at `source`.
///
/// With a destination the whole volume follows the shortest path to it;
/// without one the volume is split evenly across every other device the
/// source can reach. Returned pairs are (link index, added load).
pub(crate) fn route_traffic(
    graph: &RoutingGraph<'_>,
    source: usize,
    destination: Option<usize>,
    volume_bps: u64,
) -> Vec<(usize, u64)> {
    let (tree, _) = shortest_path_tree(graph, source, None);
    let targets: Vec<usize> = match destination {
        Some(target) => vec![target],
        None => (0..graph.node_count())
            .filter(|&target| target != source && tree[target].is_some())
            .collect(),
    };
    if targets.is_empty() {
        return Vec::new();
    }

    // The remainder goes one unit at a time to the first targets, so the
    // shares always add up to the injected volume.
    let count = targets.len() as u64;
    let (base, remainder) = (volume_bps / count, volume_bps % count);
    let mut added = vec![0u64; graph.links().len()];
    for (position, target) in targets.into_iter().enumerate() {
        let share = base + u64::from((position as u64) < remainder);
        if let Some(route) = &tree[target] {
            for &link in &route.links {
                added[link] = added[link].saturating_add(share);
            }
        }
    }

    added
        .into_iter()
        .enumerate()
        .filter(|&(_, load)| load > 0)
        .collect()
}
