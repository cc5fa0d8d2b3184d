//! Assignment file loading.
//!
//! Cluster assignments live in a TOML file that is polled for changes. Each
//! successful load replaces the whole [`AssignmentState`] in one step; a file
//! that cannot be read or parsed leaves the previous assignments in place.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AssignmentsConfig;
use crate::error::DnsError;
use crate::metrics::{self, ReloadOutcome};
use crate::selector::Endpoint;
use crate::state::{AssignmentState, ClusterAssignment, HealthStatus, LbEndpoint};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AssignmentFile {
    #[serde(default, rename = "cluster")]
    clusters: Vec<ClusterEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClusterEntry {
    name: String,
    #[serde(default, rename = "endpoint")]
    endpoints: Vec<EndpointEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EndpointEntry {
    address: String,
    port: u16,
    #[serde(default)]
    health: HealthStatus,
    #[serde(default = "default_weight")]
    weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Parse and validate the contents of an assignment file.
///
/// Cluster names must be non-empty, valid DNS names and unique (ignoring case).
/// Endpoint order is kept as written.
pub fn parse_assignments(contents: &str) -> Result<Vec<ClusterAssignment>, DnsError> {
    let file: AssignmentFile = toml::from_str(contents)?;

    let mut seen = HashSet::with_capacity(file.clusters.len());
    let mut clusters = Vec::with_capacity(file.clusters.len());

    for entry in file.clusters {
        let name = entry.name.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(DnsError::Assignments("cluster name must not be empty".into()));
        }
        hickory_proto::rr::Name::from_ascii(&name).map_err(|e| {
            DnsError::Assignments(format!("cluster {name:?} is not a valid DNS name: {e}"))
        })?;
        if !seen.insert(name.clone()) {
            return Err(DnsError::Assignments(format!("duplicate cluster {name:?}")));
        }

        let endpoints = entry
            .endpoints
            .into_iter()
            .map(|endpoint| {
                let address: IpAddr = endpoint.address.parse().map_err(|_| {
                    DnsError::InvalidAddress(format!(
                        "{} (cluster {name:?})",
                        endpoint.address
                    ))
                })?;
                Ok(LbEndpoint {
                    endpoint: Endpoint::new(address, endpoint.port),
                    health: endpoint.health,
                    weight: endpoint.weight,
                })
            })
            .collect::<Result<Vec<_>, DnsError>>()?;

        clusters.push(ClusterAssignment { name, endpoints });
    }

    Ok(clusters)
}

/// SHA-256 of the file contents.
type Fingerprint = Vec<u8>;

fn fingerprint(contents: &str) -> Fingerprint {
    Sha256::digest(contents.as_bytes()).to_vec()
}

/// Delay before the retry after the one that waited `current`.
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Polls an assignment file and applies it to the shared state.
pub struct AssignmentSource {
    path: PathBuf,
    poll_interval: Duration,
    state: AssignmentState,
    loaded: Option<Fingerprint>,
}

impl AssignmentSource {
    /// Create a source writing into `state`.
    pub fn new(config: &AssignmentsConfig, state: AssignmentState) -> Self {
        Self {
            path: config.path.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            state,
            loaded: None,
        }
    }

    /// Path of the assignment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file if its contents changed since the last successful load.
    ///
    /// The file is read on every call and compared by digest, so edits that
    /// keep the size and modification time are still picked up.
    /// Returns `true` if new assignments were applied.
    pub async fn load_once(&mut self) -> Result<bool, DnsError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                metrics::record_reload(ReloadOutcome::ReadError);
                return Err(e.into());
            }
        };

        let digest = fingerprint(&contents);
        if self.loaded.as_ref() == Some(&digest) {
            metrics::record_reload(ReloadOutcome::Unchanged);
            return Ok(false);
        }

        let clusters = match parse_assignments(&contents) {
            Ok(clusters) => clusters,
            Err(e) => {
                metrics::record_reload(ReloadOutcome::ParseError);
                return Err(e);
            }
        };

        let endpoints: usize = clusters.iter().map(|c| c.endpoints.len()).sum();
        info!(
            path = %self.path.display(),
            clusters = clusters.len(),
            endpoints,
            "loaded assignments"
        );

        self.state.replace_all(clusters);
        self.state.mark_ready();
        self.loaded = Some(digest);
        metrics::record_reload(ReloadOutcome::Loaded);

        Ok(true)
    }

    /// Poll until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            path = %self.path.display(),
            poll_interval = ?self.poll_interval,
            "starting assignment source"
        );

        let mut backoff = INITIAL_BACKOFF;

        loop {
            let delay = match self.load_once().await {
                Ok(changed) => {
                    if !changed {
                        debug!(path = %self.path.display(), "assignments unchanged");
                    }
                    backoff = INITIAL_BACKOFF;
                    self.poll_interval
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        retry_in = ?backoff,
                        "failed to load assignments, keeping previous state"
                    );
                    let delay = backoff;
                    backoff = next_backoff(backoff);
                    delay
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("assignment source shutting down");
                    return;
                }
                _ = sleep(delay) => {}
            }
        }
    }
}
