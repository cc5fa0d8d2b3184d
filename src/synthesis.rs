//! Record synthesis for cluster answers and negative responses.

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, AAAA, NS, SOA, SRV};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_proto::ProtoError;

use crate::error::Negative;
use crate::selector::Endpoint;

/// TTL of every synthesized record.
pub const TTL: u32 = 5;

const SRV_PRIORITY: u16 = 100;
const SRV_WEIGHT: u16 = 100;

const SOA_MNAME: &str = "ns";
const SOA_RNAME: &str = "hostmaster";
const SOA_REFRESH: i32 = 14400;
const SOA_RETRY: i32 = 3600;
const SOA_EXPIRE: i32 = 604800;
const SOA_MINIMUM: u32 = 5;

/// What a query resolved to.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Positive answer, with glue for SRV targets in `additionals`.
    Answer {
        /// Answer section.
        answers: Vec<Record>,
        /// Additional section.
        additionals: Vec<Record>,
    },
    /// NXDOMAIN or NODATA; the authority section carries the synthetic SOA.
    Negative(Negative),
}

impl From<Negative> for Outcome {
    fn from(negative: Negative) -> Self {
        Self::Negative(negative)
    }
}

/// A synthesized response for one query under one zone.
#[derive(Debug, Clone)]
pub struct Response {
    /// The zone the query matched.
    pub zone: Name,
    /// Answer or negative outcome.
    pub outcome: Outcome,
}

impl Response {
    /// Wrap an outcome for `zone`.
    pub fn new(zone: Name, outcome: impl Into<Outcome>) -> Self {
        Self {
            zone,
            outcome: outcome.into(),
        }
    }

    /// NOERROR for answers and NODATA, NXDOMAIN for names that do not exist.
    pub fn response_code(&self) -> ResponseCode {
        match &self.outcome {
            Outcome::Answer { .. } => ResponseCode::NoError,
            Outcome::Negative(negative) => negative.response_code(),
        }
    }

    /// The negative reason, if any.
    pub fn negative(&self) -> Option<Negative> {
        match &self.outcome {
            Outcome::Answer { .. } => None,
            Outcome::Negative(negative) => Some(*negative),
        }
    }

    /// Answer section.
    pub fn answers(&self) -> &[Record] {
        match &self.outcome {
            Outcome::Answer { answers, .. } => answers,
            Outcome::Negative(_) => &[],
        }
    }

    /// Additional section.
    pub fn additionals(&self) -> &[Record] {
        match &self.outcome {
            Outcome::Answer { additionals, .. } => additionals,
            Outcome::Negative(_) => &[],
        }
    }

    /// Authority section: the synthetic SOA for negative responses, empty otherwise.
    pub fn authority(&self) -> Vec<Record> {
        match &self.outcome {
            Outcome::Answer { .. } => Vec::new(),
            Outcome::Negative(_) => vec![soa_record(&self.zone)],
        }
    }
}

/// A or AAAA answer for a single endpoint.
///
/// A type/family mismatch is NODATA, as is any other query type.
pub fn address_answer(name: &Name, rtype: RecordType, endpoint: &Endpoint) -> Outcome {
    let rdata = match rtype {
        RecordType::A => endpoint.ipv4().map(|ip| RData::A(A::from(ip))),
        RecordType::AAAA => endpoint.ipv6().map(|ip| RData::AAAA(AAAA::from(ip))),
        _ => return Negative::UnsupportedType.into(),
    };

    match rdata {
        Some(rdata) => Outcome::Answer {
            answers: vec![record(name.clone(), rdata)],
            additionals: Vec::new(),
        },
        None => Negative::AddressFamilyMismatch.into(),
    }
}

/// SRV answer listing every endpoint, with one glue record per target.
///
/// Targets are `endpoint-<i>.<cluster>.<zone>` where `i` is the position in
/// `endpoints`, so they resolve back through the `endpoint-N` name form.
pub fn srv_answer(
    name: &Name,
    cluster: &str,
    zone: &Name,
    endpoints: &[Endpoint],
) -> Result<Outcome, ProtoError> {
    if endpoints.is_empty() {
        return Ok(Negative::NoEndpoints.into());
    }

    let mut answers = Vec::with_capacity(endpoints.len());
    let mut additionals = Vec::with_capacity(endpoints.len());

    for (index, endpoint) in endpoints.iter().enumerate() {
        let target = endpoint_target(index, cluster, zone)?;

        answers.push(record(
            name.clone(),
            RData::SRV(SRV::new(
                SRV_PRIORITY,
                SRV_WEIGHT,
                endpoint.port,
                target.clone(),
            )),
        ));
        additionals.push(glue_record(target, endpoint));
    }

    Ok(Outcome::Answer {
        answers,
        additionals,
    })
}

/// `endpoint-<index>.<cluster>.<zone>`
pub fn endpoint_target(index: usize, cluster: &str, zone: &Name) -> Result<Name, ProtoError> {
    Name::from_ascii(format!("endpoint-{index}.{cluster}"))?.append_name(zone)
}

/// A record for IPv4 (and IPv4-mapped) endpoints, AAAA otherwise.
pub fn glue_record(name: Name, endpoint: &Endpoint) -> Record {
    let rdata = match endpoint.address {
        IpAddr::V4(v4) => RData::A(A::from(v4)),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => RData::A(A::from(v4)),
            None => RData::AAAA(AAAA::from(v6)),
        },
    };
    record(name, rdata)
}

/// The synthetic SOA for `zone`. The serial is the current Unix time.
pub fn soa_record(zone: &Name) -> Record {
    let soa = SOA::new(
        under_zone(SOA_MNAME, zone),
        under_zone(SOA_RNAME, zone),
        serial_now(),
        SOA_REFRESH,
        SOA_RETRY,
        SOA_EXPIRE,
        SOA_MINIMUM,
    );
    record(zone.clone(), RData::SOA(soa))
}

/// NS record naming the synthetic primary server of `zone`.
pub fn ns_record(zone: &Name) -> Record {
    record(zone.clone(), RData::NS(NS(under_zone(SOA_MNAME, zone))))
}

fn under_zone(label: &str, zone: &Name) -> Name {
    Name::from_ascii(label)
        .and_then(|name| name.append_name(zone))
        .unwrap_or_else(|_| zone.clone())
}

/// Seconds since the epoch, truncated to 32 bits.
fn serial_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or_default()
}

fn record(name: Name, rdata: RData) -> Record {
    let mut record = Record::from_rdata(name, TTL, rdata);
    record.set_dns_class(DNSClass::IN);
    record
}
