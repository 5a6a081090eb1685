//! Network resiliency scoring.
//!
//! Combines two views of how well a topology absorbs failures: how many
//! devices have an alternative link, and how much capacity headroom the
//! measured links still have.

use super::types::{LinkUtilization, ResiliencyScore};
use crate::topology::{DeviceId, Topology};

/// Score a topology on a 0 to 100 scale.
///
/// Half of the score is the share of devices with more than one traversable
/// link, the other half the mean headroom `1 - ratio` (clamped to 0..=1) of
/// links with known utilization. Without any utilization data the headroom
/// half counts as 0.5.
pub fn resiliency_score(topology: &Topology, utilization: &[LinkUtilization]) -> ResiliencyScore {
    let device_count = topology.device_count();
    let redundancy_share = if device_count == 0 {
        0.0
    } else {
        let redundant = topology.devices().filter(|d| topology.degree(&d.id) > 1).count();
        redundant as f64 / device_count as f64
    };

    let headroom_share = if utilization.is_empty() {
        0.5
    } else {
        let total: f64 = utilization.iter().map(|u| (1.0 - u.ratio).clamp(0.0, 1.0)).sum();
        total / utilization.len() as f64
    };

    let redundancy = round2(50.0 * redundancy_share);
    let headroom = round2(50.0 * headroom_share);
    ResiliencyScore {
        score: round2(redundancy + headroom),
        redundancy,
        headroom,
    }
}

/// Devices with exactly one traversable link, ascending
pub fn leaf_devices(topology: &Topology) -> Vec<DeviceId> {
    topology
        .devices()
        .filter(|d| topology.degree(&d.id) == 1)
        .map(|d| d.id.clone())
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TopologyInput;
    use crate::topology::{build_topology, BuildOptions};

    fn star() -> Topology {
        let yaml = r#"
devices:
  - id: HUB
    interfaces: [{name: e0}, {name: e1}, {name: e2}]
  - id: S1
    interfaces: [{name: e0}]
  - id: S2
    interfaces: [{name: e0}]
  - id: S3
    interfaces: [{name: e0}]
links:
  - endpoint_a: {device: HUB, interface: e0}
    endpoint_b: {device: S1, interface: e0}
  - endpoint_a: {device: HUB, interface: e1}
    endpoint_b: {device: S2, interface: e0}
  - endpoint_a: {device: HUB, interface: e2}
    endpoint_b: {device: S3, interface: e0}
"#;
        let input: TopologyInput = serde_yaml::from_str(yaml).unwrap();
        build_topology(&input, &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_star_score_without_utilization() {
        let topology = star();
        let score = resiliency_score(&topology, &[]);
        // One of four devices is redundant
        assert_eq!(score.redundancy, 12.5);
        assert_eq!(score.headroom, 25.0);
        assert_eq!(score.score, 37.5);
    }

    #[test]
    fn test_headroom_from_utilization() {
        let topology = star();
        let utilization = vec![LinkUtilization {
            link: "HUB:e0--S1:e0".to_string(),
            capacity_bps: 100,
            load_bps: 120,
            ratio: 1.2,
            high: true,
        }];
        let score = resiliency_score(&topology, &utilization);
        assert_eq!(score.headroom, 0.0);
    }

    #[test]
    fn test_leaf_devices() {
        assert_eq!(leaf_devices(&star()), vec!["S1", "S2", "S3"]);
    }
}
