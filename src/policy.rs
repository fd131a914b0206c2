//! Connection admission policy for the server role.
//!
//! A policy is consulted once per accepted transport, before a [`Session`]
//! is constructed for it. Rejecting a peer here closes the transport before
//! any handshake byte is read or written, and has no effect on other
//! sessions.
//!
//! [`Session`]: crate::session::Session

use std::collections::HashSet;
use std::net::IpAddr;

/// Decides whether an incoming connection from `peer` may proceed to the
/// STARTDT handshake.
///
/// Grounded on the reference server's `ConnectionPolicy` protocol
/// (`allow(peername) -> bool`). Implemented as a native `async fn` in a
/// trait (stable since the teacher's MSRV of 1.75) rather than pulling in an
/// `async-trait`-style boxing crate; the tradeoff is that a policy is used
/// as a static type parameter rather than `dyn ConnectionPolicy`, since
/// async trait methods aren't dyn-compatible without that extra boxing.
pub trait ConnectionPolicy: Send + Sync {
    /// Return `true` to admit the connection, `false` to reject it.
    async fn allow(&self, peer: std::net::SocketAddr) -> bool;
}

/// Admits every connection. The default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl ConnectionPolicy for AllowAll {
    async fn allow(&self, _peer: std::net::SocketAddr) -> bool {
        true
    }
}

/// Admits only connections whose peer IP address is in an explicit
/// allowlist. The port is ignored, matching the reference policy.
#[derive(Debug, Clone)]
pub struct IpAllowlist {
    allowed: HashSet<IpAddr>,
}

impl IpAllowlist {
    /// Build an allowlist from any iterable of IP addresses.
    pub fn new(allowed: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl ConnectionPolicy for IpAllowlist {
    async fn allow(&self, peer: std::net::SocketAddr) -> bool {
        self.allowed.contains(&peer.ip())
    }
}

/// Check `policy` against `peer`, turning a rejection into a
/// [`crate::error::Iec104Error::PolicyViolation`].
pub async fn enforce<P: ConnectionPolicy>(
    policy: &P,
    peer: std::net::SocketAddr,
) -> crate::error::Result<()> {
    if policy.allow(peer).await {
        Ok(())
    } else {
        Err(crate::error::Iec104Error::policy_violation(format!(
            "connection from {} denied by policy",
            peer.ip()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn addr(ip: [u8; 4], port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::from(ip)), port)
    }

    #[tokio::test]
    async fn allow_all_admits_everyone() {
        let policy = AllowAll;
        assert!(policy.allow(addr([10, 0, 0, 1], 2404)).await);
    }

    #[tokio::test]
    async fn allowlist_admits_listed_ip_regardless_of_port() {
        let policy = IpAllowlist::new([IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))]);
        assert!(policy.allow(addr([192, 168, 1, 1], 2404)).await);
        assert!(policy.allow(addr([192, 168, 1, 1], 9999)).await);
    }

    #[tokio::test]
    async fn allowlist_rejects_unlisted_ip() {
        let policy = IpAllowlist::new([IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))]);
        assert!(!policy.allow(addr([192, 168, 1, 2], 2404)).await);
    }

    #[tokio::test]
    async fn enforce_turns_rejection_into_policy_violation() {
        let policy = IpAllowlist::new([]);
        let err = enforce(&policy, addr([1, 2, 3, 4], 2404)).await.unwrap_err();
        assert!(matches!(err, crate::error::Iec104Error::PolicyViolation(_)));
    }
}
