//! Per-query routing from name to synthesized response.
//!
//! The router first tries the whole subject as a cluster id. Only when the
//! provider does not know it is the subject parsed as one of the structured
//! name forms. A cluster literally named `_tcp.web` is therefore answered as a
//! cluster, never as an empty non-terminal.
//!
//! ```text
//! subject ──select_one──▶ found ──────────────────────────▶ synthesize
//!            │
//!            └─ not found ─▶ classify
//!                             ├─ _tcp.<c>            NODATA
//!                             ├─ endpoint-N.<c>      select_one(c), select_all(c)[N]
//!                             ├─ _grpclb._tcp.<c>    select_one(management) ─▶ synthesize
//!                             └─ anything else       NXDOMAIN
//! ```

use std::sync::Arc;

use hickory_proto::rr::{Name, RecordType};
use tracing::{debug, warn};

use crate::config::DnsConfig;
use crate::error::{DnsError, Negative};
use crate::metrics;
use crate::selector::{AssignmentProvider, EndpointSelector, Selection};
use crate::synthesis::{self, Outcome, Response};
use crate::zone::{NameForm, Subject, Zones};

/// Answers queries for cluster names under the configured zones.
///
/// Holds only immutable configuration and a handle to the provider, so one
/// router can serve any number of concurrent queries.
#[derive(Debug)]
pub struct QueryRouter {
    zones: Zones,
    management_cluster: String,
    selector: EndpointSelector,
}

impl QueryRouter {
    /// Create a router.
    pub fn new(
        zones: Zones,
        management_cluster: impl Into<String>,
        selector: EndpointSelector,
    ) -> Self {
        Self {
            zones,
            management_cluster: management_cluster.into().to_ascii_lowercase(),
            selector,
        }
    }

    /// Create a router from validated configuration.
    pub fn from_config(
        config: &DnsConfig,
        provider: Arc<dyn AssignmentProvider>,
    ) -> Result<Self, DnsError> {
        Ok(Self::new(
            Zones::new(&config.zones)?,
            config.management_cluster.as_str(),
            EndpointSelector::new(provider, config.healthy_only),
        ))
    }

    /// The configured zones.
    pub fn zones(&self) -> &Zones {
        &self.zones
    }

    /// Resolve one query. `None` if `name` is under none of the zones.
    pub fn route(&self, name: &Name, rtype: RecordType) -> Option<Response> {
        let (zone, subject) = self.zones.split(name)?;
        let outcome = self.resolve(name, rtype, zone, &subject);
        Some(Response::new(zone.clone(), outcome))
    }

    fn resolve(&self, name: &Name, rtype: RecordType, zone: &Name, subject: &Subject) -> Outcome {
        if subject.is_empty() {
            return apex(zone, rtype);
        }
        if subject.is_opaque() {
            debug!(%name, "label holds an escaped dot or non-UTF-8 bytes");
            return Negative::InvalidNameGrammar.into();
        }

        let cluster = subject.cluster_id();
        let selection = self.selector.select_one(&cluster);
        if selection.is_found() {
            return self.answer_cluster(name, rtype, zone, &cluster, selection);
        }

        match subject.classify() {
            NameForm::BareTcp { cluster } => {
                debug!(%cluster, "empty non-terminal");
                Negative::EmptyNonTerminal.into()
            }
            NameForm::Endpoint { index, cluster } => {
                if !self.selector.select_one(&cluster).is_found() {
                    debug!(%cluster, index, "endpoint query for unknown cluster");
                    return Negative::ClusterNotFound.into();
                }
                self.answer_endpoint(name, rtype, &cluster, index)
            }
            NameForm::Grpclb { service } => {
                debug!(
                    %service,
                    management_cluster = %self.management_cluster,
                    "grpclb query, answering from management cluster"
                );
                let selection = self.selector.select_one(&self.management_cluster);
                self.answer_cluster(name, rtype, zone, &self.management_cluster, selection)
            }
            NameForm::Simple { cluster } => {
                debug!(%cluster, "cluster not found");
                Negative::ClusterNotFound.into()
            }
            NameForm::Invalid(negative) => {
                debug!(subject = %subject.cluster_id(), reason = %negative, "invalid name");
                negative.into()
            }
        }
    }

    /// Answer for a whole cluster given the endpoint the provider picked.
    fn answer_cluster(
        &self,
        name: &Name,
        rtype: RecordType,
        zone: &Name,
        cluster: &str,
        selection: Selection,
    ) -> Outcome {
        let endpoint = match selection {
            Selection::Endpoint(endpoint) => endpoint,
            Selection::Empty | Selection::NotFound => {
                debug!(cluster, "no (healthy) endpoints found");
                return Negative::NoEndpoints.into();
            }
        };

        if rtype != RecordType::SRV {
            return synthesis::address_answer(name, rtype, &endpoint);
        }

        let endpoints = self.selector.select_all(cluster);
        match synthesis::srv_answer(name, cluster, zone, &endpoints) {
            Ok(outcome) => {
                metrics::record_srv_records_returned(endpoints.len());
                outcome
            }
            Err(e) => {
                warn!(cluster, %zone, error = %e, "cannot build SRV targets");
                Negative::SyntheticNameTooLong.into()
            }
        }
    }

    /// Answer for `endpoint-<index>.<cluster>`. Only A and AAAA carry data here.
    fn answer_endpoint(
        &self,
        name: &Name,
        rtype: RecordType,
        cluster: &str,
        index: usize,
    ) -> Outcome {
        let endpoints = self.selector.select_all(cluster);
        match endpoints.get(index) {
            Some(endpoint) => synthesis::address_answer(name, rtype, endpoint),
            None => {
                debug!(cluster, index, count = endpoints.len(), "endpoint index out of range");
                Negative::EndpointIndexOutOfRange.into()
            }
        }
    }
}

/// The zone apex owns the synthetic SOA and NS and nothing else.
fn apex(zone: &Name, rtype: RecordType) -> Outcome {
    let record = match rtype {
        RecordType::SOA => synthesis::soa_record(zone),
        RecordType::NS => synthesis::ns_record(zone),
        _ => return Negative::UnsupportedType.into(),
    };
    Outcome::Answer {
        answers: vec![record],
        additionals: Vec::new(),
    }
}
