//! Connected components over traversable links.

use std::collections::VecDeque;

use super::types::*;
use crate::config::AnalysisConfig;
use crate::topology::{RoutingGraph, Topology};

/// Partition every device into connected components.
///
/// Only resolved links that are not down connect devices; the usability floor
/// does not apply here.
pub fn analyze_reachability(topology: &Topology, config: &AnalysisConfig) -> Reachability {
    let graph = RoutingGraph::for_connectivity(topology, config);
    components_of(&graph, None)
}

/// Components of `graph`, optionally pretending one link is absent
pub(crate) fn components_of(graph: &RoutingGraph<'_>, excluded_link: Option<usize>) -> Reachability {
    let labels = component_labels(graph, excluded_link);
    let count = labels.iter().copied().max().map_or(0, |max| max + 1);

    let mut components: Vec<Component> = (0..count)
        .map(|id| Component {
            id,
            devices: Vec::new(),
            size: 0,
        })
        .collect();

    // Node indices follow ascending device ids, so members come out sorted
    for (node, &label) in labels.iter().enumerate() {
        let component = &mut components[label];
        component.devices.push(graph.node_id(node).to_string());
        component.size += 1;
    }

    Reachability { components }
}

/// Component label per node, numbered in order of each component's lowest node
pub(crate) fn component_labels(graph: &RoutingGraph<'_>, excluded_link: Option<usize>) -> Vec<usize> {
    let n = graph.node_count();
    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut next = 0;

    for start in 0..n {
        if labels[start].is_some() {
            continue;
        }
        labels[start] = Some(next);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for edge in graph.neighbors(node) {
                if Some(edge.link) == excluded_link || labels[edge.to].is_some() {
                    continue;
                }
                labels[edge.to] = Some(next);
                queue.push_back(edge.to);
            }
        }
        next += 1;
    }

    labels.into_iter().map(|label| label.unwrap_or(0)).collect()
}
