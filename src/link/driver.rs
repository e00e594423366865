//! Trait abstraction for the wireless link driver
//!
//! The agent never touches radio bring-up, interrupt wiring or DHCP
//! internals; it consumes the link through this narrow interface. `init`
//! failure is the one unrecoverable condition in the system: broken
//! hardware, surfaced as a terminal error rather than a retry loop.

use async_trait::async_trait;
use std::io;
use std::net::IpAddr;

use crate::config::WifiConfig;
use crate::error::Result;

/// Operations the agent needs from the wireless-link driver.
#[async_trait]
pub trait LinkDriver: Send {
    /// One-time hardware bring-up. An error here is fatal.
    async fn init(&mut self) -> Result<()>;

    /// Associate with the access point. False means "try again later",
    /// never a permanent failure.
    async fn connect(&mut self, wifi: &WifiConfig) -> bool;

    /// Current link health.
    async fn is_link_up(&mut self) -> bool;

    /// Resolve a host name through the link's name service.
    async fn resolve_host(&mut self, name: &str) -> io::Result<IpAddr>;
}

/// Link driver for hosts whose operating system owns the network link.
///
/// Association and DHCP are the OS's problem; `connect` and `is_link_up`
/// report success so the recovery state machine exercises only the session
/// layer. Name resolution goes through the system resolver.
#[derive(Debug, Default)]
pub struct HostLink;

impl HostLink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LinkDriver for HostLink {
    async fn init(&mut self) -> Result<()> {
        Ok(())
    }

    async fn connect(&mut self, _wifi: &WifiConfig) -> bool {
        true
    }

    async fn is_link_up(&mut self) -> bool {
        true
    }

    async fn resolve_host(&mut self, name: &str) -> io::Result<IpAddr> {
        // Port is irrelevant for address resolution, lookup_host wants one
        let mut addrs = tokio::net::lookup_host((name, 0)).await?;
        addrs
            .next()
            .map(|sock| sock.ip())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address records"))
    }
}
