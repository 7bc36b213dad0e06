use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};

use crate::error::{Result, TransportError};

/// Address the harness targets when none is given.
pub const DEFAULT_ADDR: &str = "127.0.0.1:1102";

/// Resolve a listen or connect address.
///
/// Accepts `ip:port`, `host:port`, and the bare `:port` form, which binds
/// every IPv4 interface. The first resolved address wins.
pub fn resolve_addr(input: &str) -> Result<SocketAddr> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TransportError::InvalidAddress(input.to_string()));
    }

    if let Some(port) = input.strip_prefix(':') {
        let port: u16 = port
            .parse()
            .map_err(|_| TransportError::InvalidAddress(input.to_string()))?;
        return Ok(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)));
    }

    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    input
        .to_socket_addrs()
        .map_err(|_| TransportError::InvalidAddress(input.to_string()))?
        .next()
        .ok_or_else(|| TransportError::InvalidAddress(input.to_string()))
}
