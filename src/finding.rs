//! Findings: structured reports of network inconsistencies and risks.
//!
//! Findings are plain values produced fresh on every run. They are data about
//! the network, not program errors, and a topology may legitimately yield
//! hundreds of them.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::topology::{DeviceId, LinkId};

/// Severity of a finding, ordered `Info < Warning < Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Kind of detected inconsistency or risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    DuplicateIp,
    OrphanLink,
    SpeedMismatch,
    AsymmetricSubnet,
    IsolatedDevice,
    CapacityExceeded,
    MtuMismatch,
    GatewayOutsideSubnet,
    InterfaceReuse,
    AdminDownEndpoint,
    NetworkLoop,
    HighUtilization,
    CriticalLink,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::DuplicateIp => "duplicate-ip",
            FindingKind::OrphanLink => "orphan-link",
            FindingKind::SpeedMismatch => "speed-mismatch",
            FindingKind::AsymmetricSubnet => "asymmetric-subnet",
            FindingKind::IsolatedDevice => "isolated-device",
            FindingKind::CapacityExceeded => "capacity-exceeded",
            FindingKind::MtuMismatch => "mtu-mismatch",
            FindingKind::GatewayOutsideSubnet => "gateway-outside-subnet",
            FindingKind::InterfaceReuse => "interface-reuse",
            FindingKind::AdminDownEndpoint => "admin-down-endpoint",
            FindingKind::NetworkLoop => "network-loop",
            FindingKind::HighUtilization => "high-utilization",
            FindingKind::CriticalLink => "critical-link",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected inconsistency or risk in the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    /// Implicated devices, ascending
    pub devices: Vec<DeviceId>,
    /// Implicated links, ascending
    pub links: Vec<LinkId>,
    pub message: String,
}

impl Finding {
    pub fn new(
        kind: FindingKind,
        severity: Severity,
        devices: Vec<DeviceId>,
        links: Vec<LinkId>,
        message: impl Into<String>,
    ) -> Self {
        let mut devices = devices;
        devices.sort();
        devices.dedup();
        let mut links = links;
        links.sort();
        links.dedup();
        Self {
            kind,
            severity,
            devices,
            links,
            message: message.into(),
        }
    }

    /// Stable report order: severity descending, then implicated devices and
    /// links ascending, then kind and message.
    pub fn report_order(&self, other: &Self) -> Ordering {
        other
            .severity
            .cmp(&self.severity)
            .then_with(|| self.devices.cmp(&other.devices))
            .then_with(|| self.links.cmp(&other.links))
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.message.cmp(&other.message))
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.kind, self.message)
    }
}

/// Sort findings into report order
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(Finding::report_order);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_order() {
        let mut findings = vec![
            Finding::new(FindingKind::IsolatedDevice, Severity::Warning, vec!["R2".into()], vec![], "b"),
            Finding::new(FindingKind::OrphanLink, Severity::Error, vec!["R9".into()], vec!["L1".into()], "a"),
            Finding::new(FindingKind::NetworkLoop, Severity::Info, vec!["R1".into()], vec![], "c"),
            Finding::new(FindingKind::IsolatedDevice, Severity::Warning, vec!["R1".into()], vec![], "d"),
        ];
        sort_findings(&mut findings);

        let order: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(order, vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn test_ids_are_normalized_and_kind_serializes_kebab() {
        let finding = Finding::new(
            FindingKind::DuplicateIp,
            Severity::Error,
            vec!["R2".into(), "R1".into(), "R2".into()],
            vec![],
            "dup",
        );
        assert_eq!(finding.devices, vec!["R1".to_string(), "R2".to_string()]);

        let json = serde_json::to_string(&finding).unwrap();
        assert!(json.contains("\"kind\":\"duplicate-ip\""));
        assert!(json.contains("\"severity\":\"error\""));
        assert_eq!(finding.to_string(), "[ERROR] duplicate-ip: dup");
    }
}
