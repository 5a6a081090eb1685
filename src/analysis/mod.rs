//! Topology analysis.
//!
//! Reachability, lowest-cost paths, critical links, bandwidth utilization and
//! resiliency metrics over a read-only [`Topology`].

pub mod types;
pub mod reachability;
pub mod paths;
pub mod criticality;
pub mod bandwidth;
pub mod resilience;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::AnalysisConfig;
use crate::finding::{sort_findings, Finding, FindingKind, Severity};
use crate::topology::{RoutingGraph, Topology};

pub use types::*;
pub use reachability::analyze_reachability;
pub use paths::shortest_path;
pub use criticality::find_bridges;
pub use bandwidth::{analyze_utilization, estimate_demand_load};
pub use resilience::{leaf_devices, resiliency_score};

/// Map `f` over `items` in parallel, charging the step count it reports to
/// `budget` in item order.
///
/// With a limited budget the items are processed in chunks of the pool size
/// and processing stops at the first item whose charge would exceed the
/// limit, so the cut-off point does not depend on thread scheduling. Returns
/// the results and whether the run was cut short.
pub(crate) fn budgeted_par_map<I, T, F>(items: &[I], budget: &mut Budget, f: F) -> (Vec<T>, bool)
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> (T, u64) + Sync + Send,
{
    if !budget.is_limited() {
        let results: Vec<(T, u64)> = items.par_iter().map(&f).collect();
        let mut out = Vec::with_capacity(results.len());
        for (value, steps) in results {
            budget.try_charge(steps);
            out.push(value);
        }
        return (out, false);
    }

    let chunk_size = rayon::current_num_threads().max(1);
    let mut out = Vec::with_capacity(items.len());
    for chunk in items.chunks(chunk_size) {
        let results: Vec<(T, u64)> = chunk.par_iter().map(&f).collect();
        for (value, steps) in results {
            if !budget.try_charge(steps) {
                return (out, true);
            }
            out.push(value);
        }
    }
    (out, false)
}

/// Run every analysis stage over `topology`.
///
/// Components without a usable path between some of their devices are
/// reported per component rather than failing the run. When
/// `config.max_steps` is exhausted the stages that did not finish are left
/// empty and the report status says where the run stopped.
pub fn analyze_topology(topology: &Topology, config: &AnalysisConfig) -> AnalysisReport {
    let mut budget = Budget::new(config.max_steps);
    let mut status = AnalysisStatus::Complete;

    let connectivity = RoutingGraph::for_connectivity(topology, config);
    let routing = RoutingGraph::for_routing(topology, config);

    let reachability = reachability::components_of(&connectivity, None);
    debug!("Found {} connected component(s)", reachability.component_count());

    let costs = paths::all_pairs_costs(&routing, None, &mut budget);
    let paths = match &costs {
        Some(costs) => paths::summarize_paths(&reachability, &routing, costs),
        None => {
            mark_truncated(&mut status, "paths", &budget);
            Vec::new()
        }
    };

    let (critical_links, cut) =
        criticality::evaluate_criticality(&connectivity, &routing, costs.as_deref(), config, &mut budget);
    if cut {
        mark_truncated(&mut status, "criticality", &budget);
    }

    let utilization = bandwidth::analyze_utilization(topology, config);

    let demand_estimate = match config.demand_per_pair_bps {
        Some(demand) if !status.is_truncated() => {
            let estimate = bandwidth::estimate_on_graph(&routing, demand, &mut budget);
            if estimate.is_none() {
                mark_truncated(&mut status, "demand-estimate", &budget);
            }
            estimate
        }
        _ => None,
    };

    let resiliency = resilience::resiliency_score(topology, &utilization);
    let leaf_devices = resilience::leaf_devices(topology);
    let findings = analysis_findings(topology, &critical_links, &utilization, config);

    if let AnalysisStatus::Truncated { stage, steps_used } = &status {
        warn!("Analysis truncated during {} after {} steps", stage, steps_used);
    }

    let report = AnalysisReport {
        device_count: topology.device_count(),
        link_count: topology.link_count(),
        traversable_link_count: connectivity.links().len(),
        reachability,
        paths,
        critical_links,
        utilization,
        demand_estimate,
        resiliency,
        leaf_devices,
        findings,
        status,
    };
    info!("{}", report.summary());
    report
}

fn mark_truncated(status: &mut AnalysisStatus, stage: &str, budget: &Budget) {
    if !status.is_truncated() {
        *status = AnalysisStatus::Truncated {
            stage: stage.to_string(),
            steps_used: budget.used(),
        };
    }
}

/// Criticality and utilization results as findings
fn analysis_findings(
    topology: &Topology,
    critical_links: &[CriticalLink],
    utilization: &[LinkUtilization],
    config: &AnalysisConfig,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for critical in critical_links {
        let finding = if critical.is_bridge {
            Finding::new(
                FindingKind::CriticalLink,
                Severity::Warning,
                critical.devices.clone(),
                vec![critical.link.clone()],
                format!(
                    "Link {} is a bridge: losing it disconnects {} device pair(s)",
                    critical.link, critical.disconnected_pairs
                ),
            )
        } else {
            Finding::new(
                FindingKind::CriticalLink,
                Severity::Info,
                critical.devices.clone(),
                vec![critical.link.clone()],
                format!(
                    "Losing link {} raises path cost by more than {}x for {} device pair(s); \
                     every pair stays connected",
                    critical.link, config.cost_increase_ratio, critical.degraded_pairs
                ),
            )
        };
        findings.push(finding);
    }

    for entry in utilization.iter().filter(|u| u.high) {
        let devices = topology
            .link(&entry.link)
            .map(|link| link.device_ids())
            .unwrap_or_default();
        findings.push(Finding::new(
            FindingKind::HighUtilization,
            Severity::Warning,
            devices,
            vec![entry.link.clone()],
            format!(
                "Link {} utilization {:.2} exceeds {:.2}",
                entry.link, entry.ratio, config.high_utilization_threshold
            ),
        ));
    }

    sort_findings(&mut findings);
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TopologyInput;
    use crate::topology::{build_topology, BuildOptions};

    const TRIANGLE: &str = r#"
devices:
  - id: R1
    interfaces: [{name: e0}, {name: e1}]
  - id: R2
    interfaces: [{name: e0}, {name: e1}]
  - id: R3
    interfaces: [{name: e0}, {name: e1}]
links:
  - endpoint_a: {device: R1, interface: e0}
    endpoint_b: {device: R2, interface: e0}
    declared_capacity: 100000000
  - endpoint_a: {device: R2, interface: e1}
    endpoint_b: {device: R3, interface: e0}
    declared_capacity: 100000000
  - endpoint_a: {device: R1, interface: e1}
    endpoint_b: {device: R3, interface: e1}
    declared_capacity: 10000000
"#;

    fn triangle() -> Topology {
        let input: TopologyInput = serde_yaml::from_str(TRIANGLE).unwrap();
        build_topology(&input, &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_budgeted_map_is_deterministic() {
        let items: Vec<u64> = (1..=10).collect();
        let mut budget = Budget::new(Some(10));
        let (values, cut) = budgeted_par_map(&items, &mut budget, |&x| (x * 2, x));
        // 1 + 2 + 3 + 4 = 10, item 5 does not fit
        assert!(cut);
        assert_eq!(values, vec![2, 4, 6, 8]);
        assert_eq!(budget.used(), 10);
    }

    #[test]
    fn test_triangle_analysis() {
        let topology = triangle();
        let config = AnalysisConfig::default();
        let report = analyze_topology(&topology, &config);

        assert_eq!(report.status, AnalysisStatus::Complete);
        assert_eq!(report.reachability.component_count(), 1);

        let path = shortest_path(&topology, "R1", "R3", &config).unwrap();
        assert_eq!(path.devices, vec!["R1", "R3"]);
        assert_eq!(path.hops, 1);

        // Every link is critical by cost, none is a bridge
        assert_eq!(report.critical_links.len(), 3);
        let direct = report
            .critical_links
            .iter()
            .find(|c| c.link == "R1:e1--R3:e1")
            .unwrap();
        assert!(!direct.is_bridge);
        assert_eq!(direct.affected_pairs, vec![("R1".to_string(), "R3".to_string())]);
        assert!(report
            .findings
            .iter()
            .all(|f| f.kind == FindingKind::CriticalLink && f.severity == Severity::Info));
    }

    #[test]
    fn test_single_link_bridge() {
        let yaml = r#"
devices:
  - id: R1
    interfaces: [{name: e0}]
  - id: R2
    interfaces: [{name: e0}]
links:
  - endpoint_a: {device: R1, interface: e0}
    endpoint_b: {device: R2, interface: e0}
"#;
        let input: TopologyInput = serde_yaml::from_str(yaml).unwrap();
        let topology = build_topology(&input, &BuildOptions::default()).unwrap();
        let report = analyze_topology(&topology, &AnalysisConfig::default());

        assert_eq!(report.critical_links.len(), 1);
        assert!(report.critical_links[0].is_bridge);
        assert_eq!(report.findings[0].severity, Severity::Warning);
        assert_eq!(report.findings[0].devices, vec!["R1", "R2"]);
        assert_eq!(report.leaf_devices, vec!["R1", "R2"]);
    }

    #[test]
    fn test_tiny_budget_reports_truncation() {
        let topology = triangle();
        let config = AnalysisConfig {
            max_steps: Some(1),
            demand_per_pair_bps: Some(1_000),
            ..Default::default()
        };
        let report = analyze_topology(&topology, &config);
        assert_eq!(
            report.status,
            AnalysisStatus::Truncated {
                stage: "paths".to_string(),
                steps_used: 0
            }
        );
        assert!(report.paths.is_empty());
        assert!(report.demand_estimate.is_none());
        // Reachability does not depend on the budget
        assert_eq!(report.reachability.component_count(), 1);
    }

    #[test]
    fn test_analysis_is_reproducible() {
        let topology = triangle();
        let config = AnalysisConfig {
            demand_per_pair_bps: Some(1_000),
            ..Default::default()
        };
        let first = serde_json::to_string(&analyze_topology(&topology, &config)).unwrap();
        let second = serde_json::to_string(&analyze_topology(&topology, &config)).unwrap();
        assert_eq!(first, second);
    }
}
