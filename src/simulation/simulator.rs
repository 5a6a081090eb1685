//! Scenario execution on disposable copies of a topology.
//!
//! Targets are resolved against the canonical topology before anything is
//! cloned, so a bad scenario fails without side effects. Each run works on
//! its own clone, which is dropped when the run ends.

use std::collections::BTreeSet;

use log::{debug, info, warn};
use rayon::prelude::*;

use super::types::*;
use crate::analysis::bandwidth::route_traffic;
use crate::analysis::{analyze_topology, AnalysisReport};
use crate::config::AnalysisConfig;
use crate::error::ScenarioError;
use crate::finding::{sort_findings, Finding};
use crate::topology::{DeviceId, LinkId, LinkStatus, RoutingGraph, Topology};
use crate::validator::validate_topology;

/// A scenario step with every id resolved
#[derive(Debug, Clone)]
enum Step {
    LinkDown(LinkId),
    DeviceDown(DeviceId),
    Inject {
        source: DeviceId,
        destination: Option<DeviceId>,
        volume_bps: u64,
    },
}

/// Runs scenarios against one canonical topology.
///
/// The baseline analysis is computed once and shared by every run.
pub struct Simulator<'a> {
    topology: &'a Topology,
    config: &'a AnalysisConfig,
    validate: bool,
    baseline: AnalysisReport,
    baseline_findings: Option<Vec<Finding>>,
}

impl<'a> Simulator<'a> {
    pub fn new(topology: &'a Topology, config: &'a AnalysisConfig, validate: bool) -> Self {
        let baseline = analyze_topology(topology, config);
        let baseline_findings = validate.then(|| validate_topology(topology));
        Self {
            topology,
            config,
            validate,
            baseline,
            baseline_findings,
        }
    }

    pub fn baseline(&self) -> &AnalysisReport {
        &self.baseline
    }

    /// Simulate one scenario
    pub fn run(&self, scenario: &Scenario) -> Result<SimulationResult, ScenarioError> {
        let mut steps = Vec::new();
        resolve(self.topology, scenario, &mut steps)?;

        let mut working = self.topology.clone();
        for step in &steps {
            apply(&mut working, step, self.config);
        }

        let post = analyze_topology(&working, self.config);
        let post_findings = self.validate.then(|| validate_topology(&working));
        let diff = diff(
            self.topology,
            &working,
            &self.baseline,
            &post,
            self.baseline_findings.as_deref(),
            post_findings.as_deref(),
        );
        info!(
            "Scenario {}: {} component(s) -> {}, {} pair(s) newly unreachable",
            scenario,
            self.baseline.reachability.component_count(),
            post.reachability.component_count(),
            diff.newly_unreachable_pairs.len()
        );

        Ok(SimulationResult {
            scenario: scenario.clone(),
            baseline: self.baseline.clone(),
            post,
            baseline_findings: self.baseline_findings.clone(),
            post_findings,
            diff,
        })
    }

    /// Simulate independent scenarios in parallel; results keep input order
    pub fn run_all(&self, scenarios: &[Scenario]) -> Vec<Result<SimulationResult, ScenarioError>> {
        scenarios.par_iter().map(|scenario| self.run(scenario)).collect()
    }
}

/// Simulate one scenario against `topology`
pub fn simulate(
    topology: &Topology,
    scenario: &Scenario,
    config: &AnalysisConfig,
    validate: bool,
) -> Result<SimulationResult, ScenarioError> {
    // Resolve before paying for the baseline analysis
    resolve(topology, scenario, &mut Vec::new())?;
    Simulator::new(topology, config, validate).run(scenario)
}

/// Simulate several independent scenarios against `topology`
pub fn simulate_all(
    topology: &Topology,
    scenarios: &[Scenario],
    config: &AnalysisConfig,
    validate: bool,
) -> Vec<Result<SimulationResult, ScenarioError>> {
    Simulator::new(topology, config, validate).run_all(scenarios)
}

/// Find the link a `LinkDown` key refers to
pub fn resolve_link(topology: &Topology, key: &str) -> Result<LinkId, ScenarioError> {
    if topology.link(key).is_some() {
        return Ok(key.to_string());
    }

    let not_found = || ScenarioError::TargetNotFound {
        kind: "link",
        id: key.to_string(),
    };
    // Hostnames may contain '-' themselves, so every split into two known
    // devices is a candidate device pair.
    let pairs: Vec<(&str, &str)> = key
        .match_indices('-')
        .map(|(at, _)| (&key[..at], &key[at + 1..]))
        .filter(|(a, b)| topology.device(a).is_some() && topology.device(b).is_some())
        .collect();
    let mut candidates: Vec<LinkId> = topology
        .links()
        .filter(|link| {
            pairs.iter().any(|&(a, b)| {
                (link.a.device == a && link.b.device == b) || (link.a.device == b && link.b.device == a)
            })
        })
        .map(|link| link.id.clone())
        .collect();

    match candidates.len() {
        0 => Err(not_found()),
        1 => Ok(candidates.swap_remove(0)),
        _ => Err(ScenarioError::AmbiguousLink {
            key: key.to_string(),
            candidates,
        }),
    }
}

fn require_device(topology: &Topology, id: &str) -> Result<DeviceId, ScenarioError> {
    match topology.device(id) {
        Some(device) => Ok(device.id.clone()),
        None => Err(ScenarioError::TargetNotFound {
            kind: "device",
            id: id.to_string(),
        }),
    }
}

fn resolve(topology: &Topology, scenario: &Scenario, steps: &mut Vec<Step>) -> Result<(), ScenarioError> {
    match scenario {
        Scenario::LinkDown { link } => steps.push(Step::LinkDown(resolve_link(topology, link)?)),
        Scenario::DeviceDown { device } => steps.push(Step::DeviceDown(require_device(topology, device)?)),
        Scenario::TrafficInjection {
            source,
            destination,
            volume_bps,
        } => {
            if *volume_bps == 0 {
                return Err(ScenarioError::InvalidVolume(*volume_bps));
            }
            let source = require_device(topology, source)?;
            let destination = match destination {
                Some(id) => Some(require_device(topology, id)?),
                None => None,
            };
            steps.push(Step::Inject {
                source,
                destination,
                volume_bps: *volume_bps,
            });
        }
        Scenario::Combined(scenarios) => {
            for inner in scenarios {
                resolve(topology, inner, steps)?;
            }
        }
    }
    Ok(())
}

fn apply(working: &mut Topology, step: &Step, config: &AnalysisConfig) {
    match step {
        Step::LinkDown(id) => {
            if let Some(link) = working.link_mut(id) {
                link.status = LinkStatus::Down;
                debug!("Link {} set down", id);
            }
        }
        Step::DeviceDown(device) => {
            let attached: Vec<LinkId> = working
                .links()
                .filter(|link| link.touches(device))
                .map(|link| link.id.clone())
                .collect();
            for id in attached {
                if let Some(link) = working.link_mut(&id) {
                    link.status = LinkStatus::Down;
                }
            }
            debug!("Device {} taken down", device);
        }
        Step::Inject {
            source,
            destination,
            volume_bps,
        } => {
            let added: Vec<(LinkId, u64)> = {
                let graph = RoutingGraph::for_routing(working, config);
                let (Some(src), dst) = (graph.index_of(source), destination.as_deref().and_then(|d| graph.index_of(d)))
                else {
                    return;
                };
                route_traffic(&graph, src, dst, *volume_bps)
                    .into_iter()
                    .map(|(link, load)| (graph.link(link).id.clone(), load))
                    .collect()
            };
            if added.is_empty() {
                warn!("Injected traffic from {} has no usable path", source);
            }
            for (id, load) in added {
                if let Some(link) = working.link_mut(&id) {
                    link.load_bps = Some(link.load_bps.unwrap_or(0).saturating_add(load));
                }
            }
        }
    }
}

fn connected_pairs(report: &AnalysisReport) -> BTreeSet<(DeviceId, DeviceId)> {
    let mut pairs = BTreeSet::new();
    for component in &report.reachability.components {
        for (i, a) in component.devices.iter().enumerate() {
            for b in &component.devices[i + 1..] {
                pairs.insert((a.clone(), b.clone()));
            }
        }
    }
    pairs
}

fn diff(
    before_topology: &Topology,
    after_topology: &Topology,
    before: &AnalysisReport,
    after: &AnalysisReport,
    before_findings: Option<&[Finding]>,
    after_findings: Option<&[Finding]>,
) -> SimulationDiff {
    let still_connected = connected_pairs(after);
    let newly_unreachable_pairs = connected_pairs(before)
        .into_iter()
        .filter(|pair| !still_connected.contains(pair))
        .collect();

    let newly_isolated_devices = after_topology
        .devices()
        .filter(|device| after_topology.degree(&device.id) == 0 && before_topology.degree(&device.id) > 0)
        .map(|device| device.id.clone())
        .collect();

    let hot_before: BTreeSet<&str> = before
        .utilization
        .iter()
        .filter(|u| u.high)
        .map(|u| u.link.as_str())
        .collect();
    let new_bottlenecks = after
        .utilization
        .iter()
        .filter(|u| u.high && !hot_before.contains(u.link.as_str()))
        .map(|u| u.link.clone())
        .collect();

    let critical_before: BTreeSet<&str> = before.critical_links.iter().map(|c| c.link.as_str()).collect();
    let new_critical_links = after
        .critical_links
        .iter()
        .filter(|c| !critical_before.contains(c.link.as_str()))
        .map(|c| c.link.clone())
        .collect();

    let mut known: Vec<&Finding> = before.findings.iter().collect();
    known.extend(before_findings.unwrap_or_default());
    let mut new_findings: Vec<Finding> = after
        .findings
        .iter()
        .chain(after_findings.unwrap_or_default())
        .filter(|finding| !known.contains(finding))
        .cloned()
        .collect();
    sort_findings(&mut new_findings);

    SimulationDiff {
        component_delta: after.reachability.component_count() as i64 - before.reachability.component_count() as i64,
        newly_unreachable_pairs,
        newly_isolated_devices,
        new_bottlenecks,
        new_critical_links,
        new_findings,
    }
}
