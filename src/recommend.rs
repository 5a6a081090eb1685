//! Ranked improvement suggestions.
//!
//! Recommendations are derived from validator findings and an analysis
//! report. Nothing here touches the topology.

use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisReport;
use crate::config::AnalysisConfig;
use crate::finding::{Finding, FindingKind, Severity};
use crate::topology::{DeviceId, LinkId};

/// Urgency of a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Critical => write!(f, "CRITICAL"),
            Priority::High => write!(f, "HIGH"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::Low => write!(f, "LOW"),
        }
    }
}

/// What a recommendation was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationSource {
    Validation,
    Criticality,
    Utilization,
    Aggregation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// 1-based position in the ranking
    pub rank: usize,
    pub priority: Priority,
    pub source: RecommendationSource,
    pub devices: Vec<DeviceId>,
    pub links: Vec<LinkId>,
    pub message: String,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. [{}] {}", self.rank, self.priority, self.message)
    }
}

/// Produce ranked recommendations.
///
/// Order: error findings, critical links by affected pairs descending,
/// highly utilized links by ratio descending, the remaining findings by
/// severity, and last the access-layer aggregation hint.
pub fn recommend(findings: &[Finding], report: &AnalysisReport, config: &AnalysisConfig) -> Vec<Recommendation> {
    let mut ranked: Vec<Recommendation> = Vec::new();

    let mut ordered: Vec<&Finding> = findings
        .iter()
        .filter(|f| !matches!(f.kind, FindingKind::CriticalLink | FindingKind::HighUtilization))
        .collect();
    ordered.sort_by(|a, b| a.report_order(b));
    let (errors, others): (Vec<&Finding>, Vec<&Finding>) =
        ordered.into_iter().partition(|f| f.severity == Severity::Error);

    for finding in errors {
        ranked.push(from_finding(finding, Priority::Critical));
    }

    let mut critical: Vec<_> = report.critical_links.iter().collect();
    critical.sort_by(|a, b| {
        b.affected_count()
            .cmp(&a.affected_count())
            .then_with(|| a.link.cmp(&b.link))
    });
    for link in critical {
        let (priority, message) = if link.is_bridge {
            (
                Priority::High,
                format!(
                    "Add a redundant path around link {}: losing it disconnects {} device pair(s)",
                    link.link, link.disconnected_pairs
                ),
            )
        } else {
            (
                Priority::Medium,
                format!(
                    "Strengthen the alternatives to link {}: losing it inflates path cost for {} device pair(s)",
                    link.link, link.degraded_pairs
                ),
            )
        };
        ranked.push(Recommendation {
            rank: 0,
            priority,
            source: RecommendationSource::Criticality,
            devices: link.devices.clone(),
            links: vec![link.link.clone()],
            message,
        });
    }

    let mut hot: Vec<_> = report.utilization.iter().filter(|u| u.high).collect();
    hot.sort_by(|a, b| b.ratio.total_cmp(&a.ratio).then_with(|| a.link.cmp(&b.link)));
    for entry in hot {
        let (priority, message) = if entry.ratio > config.upgrade_utilization_threshold {
            (
                Priority::High,
                format!("Upgrade link {} (utilization {:.2}) or add a backup path", entry.link, entry.ratio),
            )
        } else {
            (
                Priority::Medium,
                format!("Consider traffic engineering for link {} (utilization {:.2})", entry.link, entry.ratio),
            )
        };
        ranked.push(Recommendation {
            rank: 0,
            priority,
            source: RecommendationSource::Utilization,
            devices: Vec::new(),
            links: vec![entry.link.clone()],
            message,
        });
    }

    for finding in others {
        let priority = match finding.severity {
            Severity::Warning => Priority::Medium,
            _ => Priority::Low,
        };
        ranked.push(from_finding(finding, priority));
    }

    let leaves = &report.leaf_devices;
    if leaves.len() >= config.leaf_aggregation_min {
        ranked.push(Recommendation {
            rank: 0,
            priority: Priority::Low,
            source: RecommendationSource::Aggregation,
            devices: leaves.clone(),
            links: Vec::new(),
            message: format!(
                "{} leaf devices ({}); consider access-layer aggregation",
                leaves.len(),
                leaves.join(", ")
            ),
        });
    }

    for (i, recommendation) in ranked.iter_mut().enumerate() {
        recommendation.rank = i + 1;
    }
    info!("Generated {} recommendations", ranked.len());
    ranked
}

fn from_finding(finding: &Finding, priority: Priority) -> Recommendation {
    Recommendation {
        rank: 0,
        priority,
        source: RecommendationSource::Validation,
        devices: finding.devices.clone(),
        links: finding.links.clone(),
        message: format!("Resolve {}: {}", finding.kind, finding.message),
    }
}
