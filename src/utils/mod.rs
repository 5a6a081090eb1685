//! Shared utilities: IPv4 subnet math.

pub mod ip_utils;

pub use ip_utils::{parse_ip_with_prefix, parse_prefix, Subnet};
