//! Zone matching and virtual-name classification.
//!
//! A query name is split into the configured zone it falls under and the
//! remaining labels (the *subject*). The subject is then read as one of the
//! supported name forms:
//!
//! ```text
//! web.example.org.                  Simple   (cluster "web")
//! endpoint-3.web.example.org.       Endpoint (index 3 of cluster "web")
//! _tcp.web.example.org.             BareTcp  (empty non-terminal)
//! _grpclb._tcp.web.example.org.     Grpclb   (answered from the management cluster)
//! ```

use hickory_proto::rr::Name;

use crate::error::{DnsError, Negative};

const ENDPOINT_PREFIX: &str = "endpoint-";
const TCP_LABEL: &str = "_tcp";
const GRPCLB_LABEL: &str = "_grpclb";

/// Ordered list of zones this server is authoritative for.
#[derive(Debug, Clone)]
pub struct Zones {
    zones: Vec<Name>,
}

impl Zones {
    /// Parse zone names. Order is preserved and decides which zone wins when
    /// more than one contains a query name.
    pub fn new<S: AsRef<str>>(zones: &[S]) -> Result<Self, DnsError> {
        let mut parsed = Vec::with_capacity(zones.len());
        for zone in zones {
            let mut name = Name::from_ascii(zone.as_ref())?.to_lowercase();
            name.set_fqdn(true);
            parsed.push(name);
        }

        if parsed.is_empty() {
            return Err(DnsError::Config("at least one zone is required".into()));
        }

        Ok(Self { zones: parsed })
    }

    /// Iterate zones in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Name> {
        self.zones.iter()
    }

    /// Find the first zone containing `name` and the labels left of it.
    ///
    /// Matching is case-insensitive and on label boundaries, so `notexample.org.`
    /// is not under `example.org.`. A name equal to a zone is always that zone's
    /// apex, even if an earlier zone also contains it.
    pub fn split(&self, name: &Name) -> Option<(&Name, Subject)> {
        let zone = self
            .zones
            .iter()
            .find(|zone| *zone == name)
            .or_else(|| self.zones.iter().find(|zone| zone.zone_of(name)))?;

        let labels: Vec<&[u8]> = name.iter().collect();
        let keep = labels.len().saturating_sub(zone.iter().count());

        let mut opaque = false;
        let labels = labels[..keep]
            .iter()
            .map(|label| match std::str::from_utf8(label) {
                Ok(text) if !text.contains('.') => text.to_ascii_lowercase(),
                _ => {
                    opaque = true;
                    String::from_utf8_lossy(label).to_ascii_lowercase()
                }
            })
            .collect();

        Some((zone, Subject { labels, opaque }))
    }
}

/// The labels of a query name below its zone, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    labels: Vec<String>,
    /// Some label holds an escaped `.` or bytes that are not UTF-8, so the
    /// dotted cluster id would not round-trip to the same labels.
    opaque: bool,
}

impl Subject {
    /// Build a subject from already split labels.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let opaque = labels.iter().any(|label| label.contains('.'));
        Self { labels, opaque }
    }

    /// The individual labels, leftmost first.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// True for the zone apex itself.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// True if some label cannot be written as a plain cluster id label.
    /// Such subjects match no cluster and no name form.
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    /// The whole subject as one cluster identifier.
    pub fn cluster_id(&self) -> String {
        self.labels.join(".")
    }

    /// Read the subject as one of the structured name forms.
    pub fn classify(&self) -> NameForm {
        if self.opaque {
            return NameForm::Invalid(Negative::InvalidNameGrammar);
        }
        match self.labels.as_slice() {
            [cluster] => NameForm::Simple {
                cluster: cluster.clone(),
            },
            [first, cluster] => {
                if first.eq_ignore_ascii_case(TCP_LABEL) {
                    return NameForm::BareTcp {
                        cluster: cluster.clone(),
                    };
                }
                match endpoint_index(first) {
                    Some(Ok(index)) => NameForm::Endpoint {
                        index,
                        cluster: cluster.clone(),
                    },
                    Some(Err(())) => NameForm::Invalid(Negative::MalformedEndpointIndex),
                    None => NameForm::Invalid(Negative::InvalidNameGrammar),
                }
            }
            [first, second, service]
                if first.eq_ignore_ascii_case(GRPCLB_LABEL)
                    && second.eq_ignore_ascii_case(TCP_LABEL) =>
            {
                NameForm::Grpclb {
                    service: service.clone(),
                }
            }
            _ => NameForm::Invalid(Negative::InvalidNameGrammar),
        }
    }
}

/// `None` if the label is not an `endpoint-` label at all, `Some(Err)` if it
/// is but the suffix is not a non-negative integer.
fn endpoint_index(label: &str) -> Option<Result<usize, ()>> {
    let prefix = label.get(..ENDPOINT_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(ENDPOINT_PREFIX) {
        return None;
    }
    Some(label[ENDPOINT_PREFIX.len()..].parse::<usize>().map_err(|_| ()))
}

/// Structured reading of a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameForm {
    /// `<cluster>`
    Simple {
        /// Cluster name.
        cluster: String,
    },
    /// `endpoint-<index>.<cluster>`
    Endpoint {
        /// Position in the cluster's endpoint list.
        index: usize,
        /// Cluster name.
        cluster: String,
    },
    /// `_tcp.<cluster>`
    BareTcp {
        /// Cluster name (never looked up).
        cluster: String,
    },
    /// `_grpclb._tcp.<service>`
    Grpclb {
        /// The service the client asked about; selection uses the management cluster instead.
        service: String,
    },
    /// Anything else.
    Invalid(Negative),
}
