//! Listener offsets for jobs running outside the primary identity scope.
//!
//! Two instances of the same job share one process when a secondary scope is
//! configured. The secondary instance shifts every fixed listening port so it
//! does not collide with the primary one.

use crate::runtime::probes::DISABLED_ADDR;
use crate::types::{Error, Result};

/// Increment applied to every port of a non-primary instance.
pub const SECONDARY_PORT_OFFSET: u16 = 10;

/// Port used when an address to offset carries none.
pub const FALLBACK_PORT: u16 = 8081;

/// Port for an instance, offset when it is not the primary one.
pub fn scoped_port(port: u16, secondary: bool) -> u16 {
    if secondary {
        port.saturating_add(SECONDARY_PORT_OFFSET)
    } else {
        port
    }
}

/// Bind address for an instance, offset when it is not the primary one.
pub fn scoped_addr(addr: &str, secondary: bool) -> Result<String> {
    if secondary {
        offset_addr(addr)
    } else {
        Ok(addr.to_string())
    }
}

/// Shift the port of a `host:port` address by [`SECONDARY_PORT_OFFSET`].
///
/// A disabled address stays disabled. An address without a port gets
/// [`FALLBACK_PORT`].
pub fn offset_addr(addr: &str) -> Result<String> {
    if addr == DISABLED_ADDR {
        return Ok(addr.to_string());
    }
    let parts: Vec<&str> = addr.split(':').collect();
    if parts.len() != 2 {
        return Ok(format!("{addr}:{FALLBACK_PORT}"));
    }
    let port: u16 = parts[1]
        .parse()
        .map_err(|e| Error::address(format!("{addr}: {e}")))?;
    let shifted = port
        .checked_add(SECONDARY_PORT_OFFSET)
        .ok_or_else(|| Error::address(format!("{addr}: port overflow")))?;
    Ok(format!("{}:{}", parts[0], shifted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_port() {
        assert_eq!(scoped_port(9542, false), 9542);
        assert_eq!(scoped_port(9542, true), 9552);
    }

    #[test]
    fn test_offset_addr() {
        assert_eq!(offset_addr(":8081").unwrap(), ":8091");
        assert_eq!(offset_addr("0.0.0.0:8080").unwrap(), "0.0.0.0:8090");
        assert_eq!(offset_addr("localhost").unwrap(), "localhost:8081");
        assert_eq!(offset_addr("0").unwrap(), "0");
    }

    #[test]
    fn test_offset_addr_rejects_bad_port() {
        assert!(matches!(offset_addr("host:http"), Err(Error::Address(_))));
        assert!(offset_addr("host:65530").is_err());
    }

    #[test]
    fn test_primary_addr_untouched() {
        assert_eq!(scoped_addr("host:1", false).unwrap(), "host:1");
        assert_eq!(scoped_addr("host:1", true).unwrap(), "host:11");
    }
}
