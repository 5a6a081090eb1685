//! Scenario and result types for what-if simulation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisReport;
use crate::finding::Finding;
use crate::topology::{DeviceId, LinkId};

/// A hypothetical event applied to a working copy of the topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Take one link down. The key is a link id, or `A-B` naming the only
    /// link between devices A and B.
    LinkDown { link: String },
    /// Take every link attached to a device down
    DeviceDown { device: DeviceId },
    /// Add `volume_bps` of traffic entering at `source`.
    ///
    /// With a destination the volume follows the lowest-cost path to it;
    /// without one it is split evenly across every reachable device.
    TrafficInjection {
        source: DeviceId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<DeviceId>,
        volume_bps: u64,
    },
    /// Several events applied in order to the same working copy
    Combined(Vec<Scenario>),
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::LinkDown { link } => write!(f, "link-down {}", link),
            Scenario::DeviceDown { device } => write!(f, "device-down {}", device),
            Scenario::TrafficInjection {
                source,
                destination: Some(destination),
                volume_bps,
            } => write!(f, "inject {} bps {} -> {}", volume_bps, source, destination),
            Scenario::TrafficInjection {
                source,
                destination: None,
                volume_bps,
            } => write!(f, "inject {} bps from {}", volume_bps, source),
            Scenario::Combined(steps) => {
                let parts: Vec<String> = steps.iter().map(Scenario::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// What changed between the baseline and the simulated topology
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationDiff {
    /// Post-event component count minus baseline component count
    pub component_delta: i64,
    /// Device pairs connected before and disconnected after, each ascending
    pub newly_unreachable_pairs: Vec<(DeviceId, DeviceId)>,
    /// Devices left without any traversable link that had one before
    pub newly_isolated_devices: Vec<DeviceId>,
    /// Links that crossed the high-utilization threshold
    pub new_bottlenecks: Vec<LinkId>,
    /// Links that became critical
    pub new_critical_links: Vec<LinkId>,
    /// Validator and analyzer findings not present in the baseline
    pub new_findings: Vec<Finding>,
}

impl SimulationDiff {
    pub fn is_empty(&self) -> bool {
        self.component_delta == 0
            && self.newly_unreachable_pairs.is_empty()
            && self.newly_isolated_devices.is_empty()
            && self.new_bottlenecks.is_empty()
            && self.new_critical_links.is_empty()
            && self.new_findings.is_empty()
    }
}

/// Outcome of one simulation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scenario: Scenario,
    pub baseline: AnalysisReport,
    pub post: AnalysisReport,
    /// Validator output, present when validation was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_findings: Option<Vec<Finding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_findings: Option<Vec<Finding>>,
    pub diff: SimulationDiff,
}
