//! What-if simulation: link and device failures, traffic injection.

pub mod types;
pub mod simulator;

pub use types::*;
pub use simulator::{resolve_link, simulate, simulate_all, Simulator};
