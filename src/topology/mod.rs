//! Network topology module.
//!
//! This module contains the topology model (devices, links and their
//! invariants), the builder that turns parsed records into a model, and the
//! indexed routing view the analysis algorithms run on.

pub mod types;
pub mod builder;
pub mod graph;

// Re-export key types and functions for easier access
pub use types::{Device, DeviceId, Endpoint, Interface, Link, LinkId, LinkStatus, Resolution, Topology};
pub use builder::{build_topology, normalize_interface, BuildOptions};
pub use graph::RoutingGraph;
