//! Network identity checks.
//!
//! Vault returns the IP address an OTP was issued for. The helper accepts it only
//! when the address belongs to one of this host's interface networks or, for
//! deployments behind NAT or load balancers, to an entry of `allowed_cidr_list`.

use super::error::IdentityError;
use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use nix::ifaddrs::getifaddrs;
use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};
use tracing::{debug, warn};

/// Source of the networks bound to this host's interfaces.
pub trait InterfaceAddrs {
    /// # Errors
    /// Returns an error if the interface table cannot be read.
    fn networks(&self) -> Result<Vec<IpNetwork>, IdentityError>;
}

/// Reads the interface table of the running host with `getifaddrs(3)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInterfaces;

impl InterfaceAddrs for SystemInterfaces {
    fn networks(&self) -> Result<Vec<IpNetwork>, IdentityError> {
        let addrs = getifaddrs().map_err(|e| IdentityError::Interfaces(e.into()))?;

        let mut networks = Vec::new();

        for ifaddr in addrs {
            let (Some(address), Some(netmask)) = (ifaddr.address, ifaddr.netmask) else {
                continue;
            };

            let network = if let (Some(addr), Some(mask)) =
                (address.as_sockaddr_in(), netmask.as_sockaddr_in())
            {
                let addr = *SocketAddrV4::from(*addr).ip();
                Ipv4Network::with_netmask(addr, *SocketAddrV4::from(*mask).ip())
                    .map(IpNetwork::V4)
                    .map_err(|e| (IpAddr::V4(addr), e))
            } else if let (Some(addr), Some(mask)) =
                (address.as_sockaddr_in6(), netmask.as_sockaddr_in6())
            {
                let addr = *SocketAddrV6::from(*addr).ip();
                Ipv6Network::with_netmask(addr, *SocketAddrV6::from(*mask).ip())
                    .map(IpNetwork::V6)
                    .map_err(|e| (IpAddr::V6(addr), e))
            } else {
                continue;
            };

            match network {
                Ok(network) => networks.push(network),
                Err((addr, e)) => warn!("skipping {} address {}: {}", ifaddr.interface_name, addr, e),
            }
        }

        Ok(networks)
    }
}

/// Fixed list of interface networks.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces(pub Vec<IpNetwork>);

impl InterfaceAddrs for StaticInterfaces {
    fn networks(&self) -> Result<Vec<IpNetwork>, IdentityError> {
        Ok(self.0.clone())
    }
}

/// Parse a single `address/prefix` entry.
///
/// # Errors
/// Returns [`IdentityError::InvalidCidr`] if the prefix is missing or the entry
/// cannot be parsed.
pub fn parse_cidr(cidr: &str) -> Result<IpNetwork, IdentityError> {
    let cidr = cidr.trim();

    if !cidr.contains('/') {
        return Err(IdentityError::InvalidCidr {
            cidr: cidr.to_string(),
            reason: "missing prefix length".to_string(),
        });
    }

    cidr.parse::<IpNetwork>()
        .map_err(|e| IdentityError::InvalidCidr {
            cidr: cidr.to_string(),
            reason: e.to_string(),
        })
}

// IPv4-mapped IPv6 addresses (::ffff:a.b.c.d) are compared as IPv4.
fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}

/// Validate the IP address returned by Vault against the interface networks of
/// this host, falling back to `allowed_cidrs`.
///
/// # Errors
/// Returns an [`IdentityError`] if the address is malformed, an allow-list entry
/// is malformed, the interface table cannot be read, or nothing matches.
pub fn validate_ip<I>(ip: &str, allowed_cidrs: &[String], interfaces: &I) -> Result<(), IdentityError>
where
    I: InterfaceAddrs + ?Sized,
{
    let addr = ip
        .trim()
        .parse::<IpAddr>()
        .map(normalize)
        .map_err(|_| IdentityError::InvalidIp(ip.to_string()))?;

    for network in interfaces.networks()? {
        if network.contains(addr) {
            debug!("{} matches interface network {}", addr, network);
            return Ok(());
        }
    }

    if allowed_cidrs.is_empty() {
        return Err(IdentityError::NoInterfaceMatch { ip: addr.to_string() });
    }

    // Parse the whole list first so a bad entry fails regardless of its position
    let blocks = allowed_cidrs
        .iter()
        .map(|cidr| parse_cidr(cidr))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(block) = blocks.iter().find(|block| block.contains(addr)) {
        debug!("{} matches allowed CIDR block {}", addr, block);
        return Ok(());
    }

    Err(IdentityError::NoMatch { ip: addr.to_string() })
}
