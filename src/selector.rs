//! Endpoint selection on top of an assignment provider.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use tracing::trace;

/// A single (address, port) member of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Endpoint address.
    pub address: IpAddr,
    /// Endpoint port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    /// The address as IPv4, if it is one. IPv4-mapped IPv6 addresses count as IPv4.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        match self.address {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(v6) => v6.to_ipv4_mapped(),
        }
    }

    /// The address as IPv6, if it is a native IPv6 address.
    pub fn ipv6(&self) -> Option<Ipv6Addr> {
        match self.address {
            IpAddr::V6(v6) if v6.to_ipv4_mapped().is_none() => Some(v6),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", std::net::SocketAddr::new(self.address, self.port))
    }
}

/// Result of asking the provider for one endpoint of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The cluster exists and this endpoint was picked.
    Endpoint(Endpoint),
    /// The cluster exists but has no (healthy) endpoints.
    Empty,
    /// The provider does not know the cluster.
    NotFound,
}

impl Selection {
    /// True unless the cluster is unknown.
    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Source of cluster endpoints.
///
/// Implementations must be safe to call concurrently from many queries; the
/// router never mutates anything through this trait.
pub trait AssignmentProvider: Send + Sync {
    /// Pick one endpoint of `cluster`. Selection policy is up to the provider.
    fn select(&self, cluster: &str, healthy_only: bool) -> Selection;

    /// All endpoints of `cluster`, in the provider's order. Empty if the cluster
    /// is unknown or has no (healthy) endpoints.
    fn all(&self, cluster: &str, healthy_only: bool) -> Vec<Endpoint>;
}

/// Applies the configured health filter to every provider call.
#[derive(Clone)]
pub struct EndpointSelector {
    provider: Arc<dyn AssignmentProvider>,
    healthy_only: bool,
}

impl EndpointSelector {
    /// Create a selector over `provider`.
    pub fn new(provider: Arc<dyn AssignmentProvider>, healthy_only: bool) -> Self {
        Self {
            provider,
            healthy_only,
        }
    }

    /// One endpoint of `cluster`.
    pub fn select_one(&self, cluster: &str) -> Selection {
        let selection = self.provider.select(cluster, self.healthy_only);
        trace!(cluster, healthy_only = self.healthy_only, ?selection, "select one");
        selection
    }

    /// Every endpoint of `cluster`, in provider order.
    pub fn select_all(&self, cluster: &str) -> Vec<Endpoint> {
        let endpoints = self.provider.all(cluster, self.healthy_only);
        trace!(cluster, healthy_only = self.healthy_only, count = endpoints.len(), "select all");
        endpoints
    }
}

impl fmt::Debug for EndpointSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointSelector")
            .field("healthy_only", &self.healthy_only)
            .finish_non_exhaustive()
    }
}
