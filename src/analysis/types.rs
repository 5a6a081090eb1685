//! Core data types for topology analysis.

use serde::{Deserialize, Serialize};

use crate::finding::Finding;
use crate::topology::{DeviceId, LinkId};

/// A connected set of devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: usize,
    /// Member devices, ascending
    pub devices: Vec<DeviceId>,
    pub size: usize,
}

/// Partition of all devices into connected components.
///
/// Components are ordered by their smallest device id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reachability {
    pub components: Vec<Component>,
}

impl Reachability {
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Index of the component containing `device`
    pub fn component_of(&self, device: &str) -> Option<usize> {
        self.components
            .iter()
            .position(|c| c.devices.binary_search_by(|d| d.as_str().cmp(device)).is_ok())
    }

    pub fn are_connected(&self, a: &str, b: &str) -> bool {
        match (self.component_of(a), self.component_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

/// Lowest-cost path between two devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    pub source: DeviceId,
    pub target: DeviceId,
    /// Devices on the path, source first
    pub devices: Vec<DeviceId>,
    /// Links traversed, in path order
    pub links: Vec<LinkId>,
    pub cost: u64,
    pub hops: usize,
}

/// Path statistics for one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPaths {
    pub component: usize,
    /// Unordered device pairs with a usable path
    pub routed_pairs: usize,
    /// Unordered device pairs in the component without a usable path
    pub unrouted_pairs: usize,
    pub average_cost: f64,
    pub max_cost: u64,
}

/// A link whose loss disconnects devices or inflates path costs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalLink {
    pub link: LinkId,
    pub devices: Vec<DeviceId>,
    /// Removal splits a component
    pub is_bridge: bool,
    /// Device pairs that lose connectivity
    pub disconnected_pairs: usize,
    /// Device pairs whose path cost grows above the threshold
    pub degraded_pairs: usize,
    /// All affected pairs, each ascending, list ascending
    pub affected_pairs: Vec<(DeviceId, DeviceId)>,
}

impl CriticalLink {
    pub fn affected_count(&self) -> usize {
        self.affected_pairs.len()
    }
}

/// Measured utilization of one link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkUtilization {
    pub link: LinkId,
    pub capacity_bps: u64,
    pub load_bps: u64,
    pub ratio: f64,
    /// Above the configured high-utilization threshold
    pub high: bool,
}

/// Load estimated from the all-to-all demand model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkLoadEstimate {
    pub link: LinkId,
    pub capacity_bps: u64,
    pub estimated_load_bps: u64,
    pub ratio: f64,
}

/// Composite resiliency score, 0 to 100
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResiliencyScore {
    pub score: f64,
    /// Share of devices with more than one link, scaled to 50
    pub redundancy: f64,
    /// Mean utilization headroom, scaled to 50
    pub headroom: f64,
}

/// Whether the work budget allowed every stage to finish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum AnalysisStatus {
    Complete,
    Truncated { stage: String, steps_used: u64 },
}

impl AnalysisStatus {
    pub fn is_truncated(&self) -> bool {
        matches!(self, AnalysisStatus::Truncated { .. })
    }
}

/// Everything the analyzer derives from one topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub device_count: usize,
    pub link_count: usize,
    pub traversable_link_count: usize,
    pub reachability: Reachability,
    pub paths: Vec<ComponentPaths>,
    /// Ordered by link id
    pub critical_links: Vec<CriticalLink>,
    /// Links with a known load, ordered by link id
    pub utilization: Vec<LinkUtilization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demand_estimate: Option<Vec<LinkLoadEstimate>>,
    pub resiliency: ResiliencyScore,
    /// Devices with exactly one traversable link
    pub leaf_devices: Vec<DeviceId>,
    /// Criticality and utilization findings, in report order
    pub findings: Vec<Finding>,
    pub status: AnalysisStatus,
}

impl AnalysisReport {
    /// One-line summary for logs and text reports
    pub fn summary(&self) -> String {
        format!(
            "Devices: {}, Links: {}, Components: {}, Critical links: {}, High utilization: {}, Resiliency: {}/100",
            self.device_count,
            self.link_count,
            self.reachability.component_count(),
            self.critical_links.len(),
            self.utilization.iter().filter(|u| u.high).count(),
            self.resiliency.score
        )
    }
}

/// Caller-provided bound on path and criticality work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Budget {
    limit: Option<u64>,
    used: u64,
}

impl Budget {
    pub fn new(limit: Option<u64>) -> Self {
        Self { limit, used: 0 }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn is_limited(&self) -> bool {
        self.limit.is_some()
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    /// Account for `steps` units of work; false once the limit would be exceeded
    pub fn try_charge(&mut self, steps: u64) -> bool {
        match self.limit {
            Some(limit) if self.used.saturating_add(steps) > limit => false,
            _ => {
                self.used = self.used.saturating_add(steps);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_charging() {
        let mut budget = Budget::new(Some(10));
        assert!(budget.try_charge(6));
        assert!(budget.try_charge(4));
        assert!(!budget.try_charge(1));
        assert_eq!(budget.used(), 10);

        let mut unlimited = Budget::unlimited();
        assert!(unlimited.try_charge(u64::MAX));
        assert!(!unlimited.is_limited());
    }

    #[test]
    fn test_reachability_lookup() {
        let reachability = Reachability {
            components: vec![
                Component { id: 0, devices: vec!["A".into(), "C".into()], size: 2 },
                Component { id: 1, devices: vec!["B".into()], size: 1 },
            ],
        };
        assert_eq!(reachability.component_of("C"), Some(0));
        assert!(reachability.are_connected("A", "C"));
        assert!(!reachability.are_connected("A", "B"));
        assert!(!reachability.are_connected("A", "Z"));
    }
}
