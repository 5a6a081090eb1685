//! Report rendering for the command-line front end.
//!
//! Generates JSON and human-readable text from the results of one pipeline
//! run. Rendering returns strings; where they go is up to the caller.

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisReport, AnalysisStatus};
use crate::autofix::AutoFixProposal;
use crate::finding::Finding;
use crate::recommend::Recommendation;
use crate::simulation::SimulationResult;

/// Everything one CLI invocation produced; absent stages were not run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub device_count: usize,
    pub link_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub findings: Option<Vec<Finding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Recommendation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autofix: Option<AutoFixProposal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub simulations: Vec<SimulationResult>,
}

/// Generate JSON report
pub fn generate_json_report(report: &PipelineReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")
}

fn section(lines: &mut Vec<String>, title: &str) {
    lines.push("=".repeat(80));
    lines.push(format!("{:^80}", title));
    lines.push("=".repeat(80));
    lines.push(String::new());
}

fn push_findings(lines: &mut Vec<String>, findings: &[Finding]) {
    if findings.is_empty() {
        lines.push("  none".to_string());
    }
    for finding in findings {
        lines.push(format!("  {}", finding));
    }
    lines.push(String::new());
}

/// Generate human-readable text report
pub fn generate_text_report(report: &PipelineReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    section(&mut lines, "NETWORK TOPOLOGY REPORT");
    lines.push(format!("Devices: {}", report.device_count));
    lines.push(format!("Links: {}", report.link_count));
    lines.push(String::new());

    if let Some(ref findings) = report.findings {
        section(&mut lines, "VALIDATION");
        push_findings(&mut lines, findings);
    }

    if let Some(ref analysis) = report.analysis {
        section(&mut lines, "ANALYSIS");
        if let AnalysisStatus::Truncated { stage, steps_used } = &analysis.status {
            lines.push(format!("WARNING: analysis truncated during {} after {} steps", stage, steps_used));
            lines.push(String::new());
        }

        lines.push(format!("Connected components: {}", analysis.reachability.component_count()));
        for (component, paths) in analysis
            .reachability
            .components
            .iter()
            .map(|c| (c, analysis.paths.iter().find(|p| p.component == c.id)))
        {
            let mut line = format!("  #{} ({} devices): {}", component.id, component.size, component.devices.join(", "));
            if let Some(paths) = paths {
                line.push_str(&format!(
                    " | avg cost {:.1}, max cost {}",
                    paths.average_cost, paths.max_cost
                ));
                if paths.unrouted_pairs > 0 {
                    line.push_str(&format!(", {} pair(s) below capacity floor", paths.unrouted_pairs));
                }
            }
            lines.push(line);
        }
        lines.push(String::new());

        lines.push(format!("Critical links: {}", analysis.critical_links.len()));
        for critical in &analysis.critical_links {
            let kind = if critical.is_bridge { "bridge" } else { "cost" };
            lines.push(format!(
                "  {} [{}]: {} affected pair(s)",
                critical.link,
                kind,
                critical.affected_count()
            ));
        }
        lines.push(String::new());

        if !analysis.utilization.is_empty() {
            lines.push("Link utilization:".to_string());
            for entry in &analysis.utilization {
                let marker = if entry.high { " HIGH" } else { "" };
                lines.push(format!("  {}: {:.1}%{}", entry.link, entry.ratio * 100.0, marker));
            }
            lines.push(String::new());
        }

        if let Some(ref estimate) = analysis.demand_estimate {
            lines.push("Estimated demand load:".to_string());
            for entry in estimate {
                lines.push(format!(
                    "  {}: {} bps ({:.1}% of capacity)",
                    entry.link,
                    entry.estimated_load_bps,
                    entry.ratio * 100.0
                ));
            }
            lines.push(String::new());
        }

        lines.push(format!(
            "Resiliency score: {:.2}/100 (redundancy {:.2}, headroom {:.2})",
            analysis.resiliency.score, analysis.resiliency.redundancy, analysis.resiliency.headroom
        ));
        lines.push(String::new());
    }

    if let Some(ref recommendations) = report.recommendations {
        section(&mut lines, "RECOMMENDATIONS");
        if recommendations.is_empty() {
            lines.push("  none".to_string());
        }
        for recommendation in recommendations {
            lines.push(format!("  {}", recommendation));
        }
        lines.push(String::new());
    }

    if let Some(ref proposal) = report.autofix {
        section(&mut lines, "AUTOFIX PROPOSAL");
        for entry in &proposal.patch.entries {
            lines.push(format!("  {}", entry));
        }
        lines.push(String::new());
        lines.push(format!("Remaining findings after patch: {}", proposal.remaining_findings.len()));
        push_findings(&mut lines, &proposal.remaining_findings);
    }

    for result in &report.simulations {
        section(&mut lines, &format!("SIMULATION: {}", result.scenario));
        let diff = &result.diff;
        lines.push(format!(
            "Components: {} -> {}",
            result.baseline.reachability.component_count(),
            result.post.reachability.component_count()
        ));
        lines.push(format!("Newly unreachable pairs: {}", diff.newly_unreachable_pairs.len()));
        for (a, b) in &diff.newly_unreachable_pairs {
            lines.push(format!("  {} <-> {}", a, b));
        }
        if !diff.newly_isolated_devices.is_empty() {
            lines.push(format!("Newly isolated devices: {}", diff.newly_isolated_devices.join(", ")));
        }
        if !diff.new_bottlenecks.is_empty() {
            lines.push(format!("New bottlenecks: {}", diff.new_bottlenecks.join(", ")));
        }
        if !diff.new_critical_links.is_empty() {
            lines.push(format!("Newly critical links: {}", diff.new_critical_links.join(", ")));
        }
        lines.push("New findings:".to_string());
        push_findings(&mut lines, &diff.new_findings);
    }

    lines.push("=".repeat(80));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_topology;
    use crate::config::AnalysisConfig;
    use crate::records::TopologyInput;
    use crate::simulation::{simulate, Scenario};
    use crate::topology::{build_topology, BuildOptions};
    use crate::validator::validate_topology;

    fn pipeline() -> PipelineReport {
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
        let config = AnalysisConfig::default();
        let scenario = Scenario::LinkDown {
            link: "R1-R2".to_string(),
        };

        PipelineReport {
            device_count: topology.device_count(),
            link_count: topology.link_count(),
            findings: Some(validate_topology(&topology)),
            analysis: Some(analyze_topology(&topology, &config)),
            simulations: vec![simulate(&topology, &scenario, &config, false).unwrap()],
            ..Default::default()
        }
    }

    #[test]
    fn test_text_report_sections() {
        let text = generate_text_report(&pipeline());
        assert!(text.contains("NETWORK TOPOLOGY REPORT"));
        assert!(text.contains("VALIDATION"));
        assert!(text.contains("R1:e0--R2:e0 [bridge]: 1 affected pair(s)"));
        assert!(text.contains("SIMULATION: link-down R1-R2"));
        assert!(text.contains("R1 <-> R2"));
        assert!(!text.contains("RECOMMENDATIONS"));
    }

    #[test]
    fn test_json_report_skips_missing_stages() {
        let json = generate_json_report(&pipeline()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["device_count"], 2);
        assert!(value.get("autofix").is_none());
        assert!(value["analysis"]["critical_links"].is_array());
    }
}
