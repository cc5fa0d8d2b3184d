//! DNS server setup and lifecycle management.

use hickory_server::authority::{AuthorityObject, Catalog};
use hickory_server::ServerFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::authority::TrafficAuthority;
use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::router::QueryRouter;
use crate::source::AssignmentSource;
use crate::state::AssignmentState;

/// Interval for emitting state metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

const TCP_TIMEOUT: Duration = Duration::from_secs(30);

/// Periodically emit state metrics.
async fn metrics_loop(state: AssignmentState, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                state.emit_metrics();
                debug!(
                    clusters = state.clusters_count(),
                    endpoints = state.endpoints_count(),
                    version = state.version(),
                    "emitted state metrics"
                );
            }
            _ = shutdown.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// Build a catalog with one authority per zone, all sharing `router`.
pub fn build_catalog(router: Arc<QueryRouter>) -> Catalog {
    let mut catalog = Catalog::new();
    for zone in router.zones().iter() {
        let authority: Arc<dyn AuthorityObject> =
            Arc::new(TrafficAuthority::new(zone.clone(), router.clone()));
        catalog.upsert(zone.clone().into(), vec![authority]);
    }
    catalog
}

/// DNS server answering from file-backed cluster assignments.
pub struct DnsServer {
    config: DnsConfig,
    state: AssignmentState,
}

impl DnsServer {
    /// Create a new DNS server with the given configuration.
    pub fn new(config: DnsConfig) -> Self {
        Self {
            config,
            state: AssignmentState::new(),
        }
    }

    /// The assignment state queries are answered from.
    pub fn state(&self) -> &AssignmentState {
        &self.state
    }

    /// Run the DNS server until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        self.config.validate()?;

        info!(
            listen_addr = %self.config.listen_addr,
            zones = ?self.config.zones,
            management_cluster = %self.config.management_cluster,
            healthy_only = self.config.healthy_only,
            "Starting traffic-dns server"
        );

        let router = Arc::new(QueryRouter::from_config(
            &self.config,
            Arc::new(self.state.clone()),
        )?);

        let source = AssignmentSource::new(&self.config.assignments, self.state.clone());
        info!(path = %source.path().display(), "Waiting for initial assignments...");
        let source_handle = tokio::spawn(source.run(shutdown.clone()));

        // Wait for the first load before answering anything
        loop {
            if shutdown.is_cancelled() {
                info!("Shutdown requested before assignments were loaded");
                let _ = source_handle.await;
                return Ok(());
            }

            if self.state.is_ready() {
                info!(
                    clusters = self.state.clusters_count(),
                    endpoints = self.state.endpoints_count(),
                    "Initial assignments loaded"
                );
                break;
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let mut server = ServerFuture::new(build_catalog(router));

        let udp_socket = UdpSocket::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        let tcp_listener = TcpListener::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "DNS TCP listening");
        server.register_listener(tcp_listener, TCP_TIMEOUT);

        info!(zones = ?self.config.zones, "DNS server ready to serve queries");

        let metrics_handle = tokio::spawn(metrics_loop(self.state.clone(), shutdown.clone()));
        self.state.emit_metrics();

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
            }
        }

        let _ = metrics_handle.await;

        info!("Waiting for assignment source to stop...");
        let _ = source_handle.await;

        info!("DNS server stopped");
        Ok(())
    }
}
