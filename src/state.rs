//! In-memory cluster assignments.
//!
//! The store is the single source of endpoints for the query router. It is
//! written by the assignment source and read concurrently by every query.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::metrics;
use crate::selector::{AssignmentProvider, Endpoint, Selection};

/// Health of an endpoint as reported by the assignment source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Health is not known.
    Unknown,
    /// Endpoint passes health checks.
    #[default]
    Healthy,
    /// Endpoint fails health checks.
    Unhealthy,
    /// Endpoint is being drained.
    Draining,
    /// Health checks timed out.
    Timeout,
    /// Endpoint is degraded.
    Degraded,
}

/// An endpoint with its load-balancing attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LbEndpoint {
    /// Address and port.
    pub endpoint: Endpoint,
    /// Reported health.
    pub health: HealthStatus,
    /// Relative load-balancing weight.
    pub weight: u32,
}

impl LbEndpoint {
    fn eligible(&self, healthy_only: bool) -> bool {
        !healthy_only || self.health == HealthStatus::Healthy
    }
}

/// The endpoints assigned to one cluster, in assignment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignment {
    /// Cluster identifier.
    pub name: String,
    /// Endpoints in assignment order.
    pub endpoints: Vec<LbEndpoint>,
}

/// Thread-safe in-memory assignment state.
#[derive(Debug, Clone, Default)]
pub struct AssignmentState {
    inner: Arc<RwLock<AssignmentStateInner>>,
}

#[derive(Debug, Default)]
struct AssignmentStateInner {
    /// cluster id (lower-cased) -> assignment
    clusters: HashMap<String, ClusterAssignment>,

    /// Incremented on every change.
    version: u64,

    /// True after the first complete load.
    ready: bool,
}

impl AssignmentState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one cluster.
    pub fn upsert_cluster(&self, mut cluster: ClusterAssignment) {
        cluster.name = cluster.name.to_ascii_lowercase();
        let mut inner = self.inner.write();
        debug!(
            cluster = %cluster.name,
            endpoints = cluster.endpoints.len(),
            "upserting cluster"
        );
        inner.clusters.insert(cluster.name.clone(), cluster);
        inner.version = inner.version.wrapping_add(1);
    }

    /// Replace the whole assignment set in one step.
    pub fn replace_all(&self, clusters: Vec<ClusterAssignment>) {
        let clusters: HashMap<String, ClusterAssignment> = clusters
            .into_iter()
            .map(|mut cluster| {
                cluster.name = cluster.name.to_ascii_lowercase();
                (cluster.name.clone(), cluster)
            })
            .collect();

        let mut inner = self.inner.write();
        inner.clusters = clusters;
        inner.version = inner.version.wrapping_add(1);
        debug!(
            clusters = inner.clusters.len(),
            version = inner.version,
            "replaced all assignments"
        );
    }

    /// Mark the initial load complete.
    pub fn mark_ready(&self) {
        let mut inner = self.inner.write();
        if !inner.ready {
            inner.ready = true;
            debug!(clusters = inner.clusters.len(), "assignment state ready");
        }
    }

    /// Check if state is ready to serve DNS queries.
    pub fn is_ready(&self) -> bool {
        self.inner.read().ready
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Get count of clusters (for health check).
    pub fn clusters_count(&self) -> usize {
        self.inner.read().clusters.len()
    }

    /// Get count of endpoints across all clusters.
    pub fn endpoints_count(&self) -> usize {
        self.inner
            .read()
            .clusters
            .values()
            .map(|c| c.endpoints.len())
            .sum()
    }

    /// Emit current state metrics.
    pub fn emit_metrics(&self) {
        let inner = self.inner.read();

        let endpoints: usize = inner.clusters.values().map(|c| c.endpoints.len()).sum();
        let healthy = inner
            .clusters
            .values()
            .flat_map(|c| &c.endpoints)
            .filter(|e| e.health == HealthStatus::Healthy)
            .count();

        metrics::record_state_counts(inner.clusters.len(), endpoints, healthy);
        metrics::record_ready_state(inner.ready);
        metrics::record_version(inner.version);
    }
}

impl AssignmentProvider for AssignmentState {
    /// Weighted random pick among eligible endpoints; uniform if all weights are zero.
    fn select(&self, cluster: &str, healthy_only: bool) -> Selection {
        let inner = self.inner.read();
        let Some(assignment) = inner.clusters.get(cluster) else {
            return Selection::NotFound;
        };

        let eligible: Vec<&LbEndpoint> = assignment
            .endpoints
            .iter()
            .filter(|e| e.eligible(healthy_only))
            .collect();

        if eligible.is_empty() {
            return Selection::Empty;
        }

        let total: u64 = eligible.iter().map(|e| u64::from(e.weight)).sum();
        if total == 0 {
            return Selection::Endpoint(eligible[fastrand::usize(..eligible.len())].endpoint);
        }

        let mut point = fastrand::u64(..total);
        for lb in &eligible {
            let weight = u64::from(lb.weight);
            if point < weight {
                return Selection::Endpoint(lb.endpoint);
            }
            point -= weight;
        }

        // Unreachable while point < total; fall back to the last endpoint.
        Selection::Endpoint(eligible[eligible.len() - 1].endpoint)
    }

    fn all(&self, cluster: &str, healthy_only: bool) -> Vec<Endpoint> {
        let inner = self.inner.read();
        inner
            .clusters
            .get(cluster)
            .map(|assignment| {
                assignment
                    .endpoints
                    .iter()
                    .filter(|e| e.eligible(healthy_only))
                    .map(|e| e.endpoint)
                    .collect()
            })
            .unwrap_or_default()
    }
}
