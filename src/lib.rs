//! Traffic DNS - an authoritative DNS server for service-cluster names.
//!
//! Every name under a configured zone is a virtual name for a cluster of
//! endpoints. Answers are synthesized per query from the current cluster
//! assignments; nothing is stored as zone data.
//!
//! ## Name forms
//!
//! ```text
//! <cluster>.<zone>                 A/AAAA: one endpoint   SRV: every endpoint + glue
//! endpoint-<N>.<cluster>.<zone>    A/AAAA: the N-th endpoint
//! _tcp.<cluster>.<zone>            NODATA (empty non-terminal)
//! _grpclb._tcp.<cluster>.<zone>    answered from the management cluster
//! ```
//!
//! Names that fit no form are NXDOMAIN. Existing names without data for the
//! query type are NODATA. Both carry a synthetic SOA in the authority section.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                           traffic-dns                             │
//! │                                                                   │
//! │  ┌──────────────────┐    ┌──────────────────┐                     │
//! │  │ AssignmentSource │───▶│ AssignmentState  │                     │
//! │  │ (TOML file poll) │    │  (in-memory)     │                     │
//! │  └──────────────────┘    └────────┬─────────┘                     │
//! │                                   │ EndpointSelector              │
//! │                                   ▼                               │
//! │                          ┌──────────────────┐                     │
//! │                          │   QueryRouter    │                     │
//! │                          │ zone ▸ classify  │                     │
//! │                          │ ▸ select ▸ synth │                     │
//! │                          └────────┬─────────┘                     │
//! │                                   ▼                               │
//! │                          ┌──────────────────┐                     │
//! │                          │ TrafficAuthority │◀── UDP/TCP          │
//! │                          │ (one per zone)   │                     │
//! │                          └──────────────────┘                     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use traffic_dns::{AssignmentsConfig, DnsConfig, DnsServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DnsConfig {
//!         listen_addr: "[::]:5353".parse().unwrap(),
//!         zones: vec!["example.org.".to_string()],
//!         management_cluster: "mgmt".to_string(),
//!         healthy_only: true,
//!         assignments: AssignmentsConfig {
//!             path: "assignments.toml".into(),
//!             poll_interval_secs: 5,
//!         },
//!     };
//!
//!     let shutdown = CancellationToken::new();
//!     DnsServer::new(config).run(shutdown).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod authority;
pub mod config;
pub mod error;
pub mod metrics;
pub mod router;
pub mod selector;
pub mod server;
pub mod source;
pub mod state;
pub mod synthesis;
pub mod telemetry;
pub mod zone;

// Re-export main types
pub use authority::TrafficAuthority;
pub use config::{AssignmentsConfig, Config, DnsConfig, LogFormat, TelemetryConfig};
pub use error::{DnsError, Negative};
pub use router::QueryRouter;
pub use selector::{AssignmentProvider, Endpoint, EndpointSelector, Selection};
pub use server::{build_catalog, DnsServer};
pub use source::{parse_assignments, AssignmentSource};
pub use state::{AssignmentState, ClusterAssignment, HealthStatus, LbEndpoint};
pub use synthesis::{Outcome, Response};
pub use zone::{NameForm, Subject, Zones};
