//! IPv4 subnet helpers used by the builder, validator and autofix.

use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// An IPv4 network in canonical form (host bits cleared)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Subnet {
    pub network: Ipv4Addr,
    pub prefix_len: u8,
}

impl Subnet {
    /// Build the subnet containing `ip` with the given prefix length
    pub fn new(ip: Ipv4Addr, prefix_len: u8) -> Self {
        let prefix_len = prefix_len.min(32);
        let network = Ipv4Addr::from(u32::from(ip) & mask_from_prefix(prefix_len));
        Self { network, prefix_len }
    }

    /// Check whether `ip` lies inside this subnet
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & mask_from_prefix(self.prefix_len) == u32::from(self.network)
    }

    /// Two subnets overlap when the wider one contains the narrower one
    pub fn overlaps(&self, other: &Subnet) -> bool {
        let prefix = self.prefix_len.min(other.prefix_len);
        let mask = mask_from_prefix(prefix);
        u32::from(self.network) & mask == u32::from(other.network) & mask
    }

    /// Usable host addresses, lowest first.
    ///
    /// Network and broadcast addresses are excluded except for /31 and /32,
    /// where every address is usable.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        let base = u32::from(self.network) as u64;
        let size = 1u64 << (32 - self.prefix_len as u32);
        let (first, last) = if self.prefix_len >= 31 {
            (base, base + size - 1)
        } else {
            (base + 1, base + size - 2)
        };
        (first..=last).map(|raw| Ipv4Addr::from(raw as u32))
    }

    /// Lowest usable host that is not in `used`
    pub fn first_free_host(&self, used: &BTreeSet<Ipv4Addr>) -> Option<Ipv4Addr> {
        self.hosts().find(|ip| !used.contains(ip))
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// Netmask bits for a prefix length
pub fn mask_from_prefix(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - p as u32),
    }
}

/// Parse a subnet designation: a dotted netmask (`255.255.255.0`),
/// `/24` or a bare `24`.
pub fn parse_prefix(value: &str) -> Result<u8, String> {
    let value = value.trim();
    let bare = value.strip_prefix('/').unwrap_or(value);

    if let Ok(prefix) = bare.parse::<u8>() {
        if prefix > 32 {
            return Err(format!("prefix length {} exceeds 32", prefix));
        }
        return Ok(prefix);
    }

    let mask: Ipv4Addr = bare
        .parse()
        .map_err(|_| format!("'{}' is neither a prefix length nor a netmask", value))?;
    let bits = u32::from(mask);
    let prefix = bits.leading_ones();
    if bits.checked_shl(prefix).unwrap_or(0) != 0 {
        return Err(format!("netmask {} is not contiguous", mask));
    }
    Ok(prefix as u8)
}

/// Parse an address that may carry a CIDR suffix (`10.0.0.1/30`)
pub fn parse_ip_with_prefix(value: &str) -> Result<(Ipv4Addr, Option<u8>), String> {
    let value = value.trim();
    match value.split_once('/') {
        Some((ip, prefix)) => {
            let ip = ip
                .parse::<Ipv4Addr>()
                .map_err(|_| format!("invalid IPv4 address '{}'", ip))?;
            Ok((ip, Some(parse_prefix(prefix)?)))
        }
        None => value
            .parse::<Ipv4Addr>()
            .map(|ip| (ip, None))
            .map_err(|_| format!("invalid IPv4 address '{}'", value)),
    }
}
