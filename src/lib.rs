//! # Netsim - Network topology validation, analysis and what-if simulation
//!
//! This library turns parsed router-configuration records into a validated
//! network graph, analyzes the graph for capacity and resiliency, and
//! simulates failures and traffic against disposable copies of it.
//!
//! ## Overview
//!
//! The canonical [`topology::Topology`] is built once from structured records
//! and is read-only afterwards. Validation, analysis and recommendations only
//! read it; AutoFix and the simulator clone it before changing anything, so
//! any number of them can run against the same topology at once.
//!
//! ## Architecture
//!
//! - `records`: Input records handed over by the config parser
//! - `topology`: Topology model, builder and the index-based routing view
//! - `validator`: Consistency checks producing [`finding::Finding`] values
//! - `analysis`: Reachability, paths, critical links, bandwidth and resiliency
//! - `recommend`: Ranked improvement suggestions
//! - `autofix`: Patch proposals applied to a working copy
//! - `simulation`: Link/device failure and traffic injection scenarios
//! - `config`: Analysis thresholds
//! - `loader` / `report`: File loading and rendering for the CLI
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use netsim::{analysis, config::AnalysisConfig, loader, topology, validator};
//!
//! let input = loader::load_topology_input("network.yaml".as_ref())?;
//! let config = AnalysisConfig::default();
//! let topology = topology::build_topology(&input, &(&config).into())?;
//!
//! for finding in validator::validate_topology(&topology) {
//!     println!("{}", finding);
//! }
//! let report = analysis::analyze_topology(&topology, &config);
//! println!("{}", report.summary());
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Malformed records and duplicate ids abort the build with a
//! [`error::BuildError`]. Everything wrong with the network itself is
//! reported as findings, never as errors. File loading in `loader` uses
//! `color_eyre` for error reporting with context.

pub mod error;
pub mod config;
pub mod records;
pub mod utils;
pub mod topology;
pub mod finding;
pub mod validator;
pub mod analysis;
pub mod recommend;
pub mod autofix;
pub mod simulation;
pub mod loader;
pub mod report;
