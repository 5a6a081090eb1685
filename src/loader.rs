//! File loading for the command-line front end.
//!
//! Reads builder input from YAML or JSON, plain-text links files and the
//! analysis configuration. The core never touches the filesystem; only the
//! binary goes through here.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use color_eyre::eyre::{Result, WrapErr};
use log::{info, warn};
use regex::Regex;

use crate::config::AnalysisConfig;
use crate::records::{EndpointRecord, LinkRecord, TopologyInput};

/// Match: "R1:Gi0/1 - R2:Gi0/1" with an optional trailing capacity in bps
static LINK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:\s]+):(\S+?)\s*-\s*([^:\s]+):(\S+?)(?:\s+(\d+))?$").expect("Invalid link line regex")
});

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load device and link records from a YAML or JSON file
pub fn load_topology_input(path: &Path) -> Result<TopologyInput> {
    info!("Loading topology input from: {:?}", path);
    let content = fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;

    let input: TopologyInput = if is_json(path) {
        serde_json::from_str(&content).wrap_err_with(|| format!("Failed to parse JSON input {}", path.display()))?
    } else {
        serde_yaml::from_str(&content).wrap_err_with(|| format!("Failed to parse YAML input {}", path.display()))?
    };

    info!("Loaded {} device record(s), {} link record(s)", input.devices.len(), input.links.len());
    Ok(input)
}

/// Parse a links file body.
///
/// One link per line, `#` starts a comment line. Lines that do not match
/// `DEV:IF - DEV:IF [capacity]` are skipped with a warning.
pub fn parse_links(content: &str) -> Vec<LinkRecord> {
    let mut links = Vec::new();
    for (number, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(caps) = LINK_LINE.captures(line) else {
            warn!("Skipping invalid link line {}: {}", number + 1, line);
            continue;
        };

        let capacity = match caps.get(5) {
            Some(m) => match m.as_str().parse::<u64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Skipping link line {} with out-of-range capacity: {}", number + 1, line);
                    continue;
                }
            },
            None => None,
        };

        links.push(LinkRecord::between(
            EndpointRecord::new(&caps[1], &caps[2]),
            EndpointRecord::new(&caps[3], &caps[4]),
            capacity,
        ));
    }
    links
}

/// Read a links file
pub fn load_links_file(path: &Path) -> Result<Vec<LinkRecord>> {
    let content = fs::read_to_string(path).wrap_err_with(|| format!("Failed to read links file {}", path.display()))?;
    let links = parse_links(&content);
    info!("Parsed {} links from {:?}", links.len(), path);
    Ok(links)
}

/// Load the builder input, appending links from an optional links file
pub fn load_inputs(input: &Path, links: Option<&Path>) -> Result<TopologyInput> {
    let mut records = load_topology_input(input)?;
    if let Some(path) = links {
        records.links.extend(load_links_file(path)?);
    }
    Ok(records)
}

/// Load and validate analysis thresholds; defaults when no file is given
pub fn load_analysis_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading analysis configuration from: {:?}", path);
            let content = fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
            if is_json(path) {
                serde_json::from_str(&content).wrap_err("Failed to parse analysis configuration")?
            } else {
                serde_yaml::from_str(&content).wrap_err("Failed to parse analysis configuration")?
            }
        }
        None => AnalysisConfig::default(),
    };
    config.validate()?;
    Ok(config)
}
