//! Shared test infrastructure for catalog and loopback integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::{SOA, SRV};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{Catalog, MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, ResponseHandler, ResponseInfo};

use traffic_dns::{
    build_catalog, AssignmentState, ClusterAssignment, Endpoint, EndpointSelector, HealthStatus,
    LbEndpoint, QueryRouter, Zones,
};

// --- Constants ---

pub const ZONE: &str = "example.org.";
pub const SECOND_ZONE: &str = "example.net.";
pub const MANAGEMENT_CLUSTER: &str = "mgmt";

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// The response is serialized via `MessageResponse::destructive_emit()` and
/// stored as raw wire bytes, parsed back with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(io::Error::other)?;
        Ok(info)
    }
}

// --- Assignment builder ---

/// Builds an `AssignmentState` one cluster at a time.
pub struct TestAssignments {
    state: AssignmentState,
}

impl TestAssignments {
    pub fn new() -> Self {
        Self {
            state: AssignmentState::new(),
        }
    }

    /// Add a cluster of healthy endpoints given as `"addr:port"` strings.
    pub fn cluster(self, name: &str, endpoints: &[&str]) -> Self {
        let endpoints = endpoints
            .iter()
            .map(|e| (*e, HealthStatus::Healthy))
            .collect::<Vec<_>>();
        self.cluster_with_health(name, &endpoints)
    }

    /// Add a cluster with explicit per-endpoint health.
    pub fn cluster_with_health(self, name: &str, endpoints: &[(&str, HealthStatus)]) -> Self {
        self.state.upsert_cluster(ClusterAssignment {
            name: name.to_string(),
            endpoints: endpoints
                .iter()
                .map(|(addr, health)| {
                    let addr: SocketAddr = addr.parse().expect("bad test endpoint");
                    LbEndpoint {
                        endpoint: Endpoint::new(addr.ip(), addr.port()),
                        health: *health,
                        weight: 1,
                    }
                })
                .collect(),
        });
        self
    }

    /// Mark the state ready and return it.
    pub fn build(self) -> AssignmentState {
        self.state.mark_ready();
        self.state
    }
}

// --- Catalog construction ---

pub fn test_router(state: AssignmentState, healthy_only: bool) -> Arc<QueryRouter> {
    Arc::new(QueryRouter::new(
        Zones::new(&[ZONE, SECOND_ZONE]).expect("valid zones"),
        MANAGEMENT_CLUSTER,
        EndpointSelector::new(Arc::new(state), healthy_only),
    ))
}

/// A catalog with one authority per test zone.
pub fn test_catalog(state: AssignmentState) -> Catalog {
    build_catalog(test_router(state, false))
}

pub fn test_catalog_healthy_only(state: AssignmentState) -> Catalog {
    build_catalog(test_router(state, true))
}

// --- Query/Request construction ---

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

pub fn build_request(name: &str, record_type: RecordType, id: u16) -> Request {
    let bytes = build_query_bytes(name, record_type, id);
    let msg = parse_message_request(&bytes);
    let src: SocketAddr = "127.0.0.1:53000".parse().unwrap();
    Request::new(msg, src, Protocol::Udp)
}

/// Execute a query through the catalog and return the parsed response.
pub async fn execute_query(
    catalog: &Catalog,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Message {
    use hickory_server::server::RequestHandler;

    let request = build_request(name, record_type, id);
    let handler = TestResponseHandler::new();
    catalog.handle_request(&request, handler.clone()).await;
    handler.into_message()
}

// --- Response helpers ---

pub fn extract_a_ips(records: &[Record]) -> Vec<Ipv4Addr> {
    records
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(Ipv4Addr::from(*a)),
            _ => None,
        })
        .collect()
}

pub fn extract_aaaa_ips(records: &[Record]) -> Vec<Ipv6Addr> {
    records
        .iter()
        .filter_map(|r| match r.data() {
            RData::AAAA(aaaa) => Some(Ipv6Addr::from(*aaaa)),
            _ => None,
        })
        .collect()
}

pub fn extract_srv(msg: &Message) -> Vec<SRV> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::SRV(srv) => Some(srv.clone()),
            _ => None,
        })
        .collect()
}

/// The address a glue record in the additional section gives for `target`.
pub fn glue_for(msg: &Message, target: &Name) -> Option<IpAddr> {
    msg.additionals()
        .iter()
        .filter(|r| r.name() == target)
        .find_map(|r| match r.data() {
            RData::A(a) => Some(IpAddr::V4(Ipv4Addr::from(*a))),
            RData::AAAA(aaaa) => Some(IpAddr::V6(Ipv6Addr::from(*aaaa))),
            _ => None,
        })
}

pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// The SOA from the authority section; panics if there is none.
pub fn authority_soa(msg: &Message) -> (Name, SOA) {
    msg.name_servers()
        .iter()
        .find_map(|r| match r.data() {
            RData::SOA(soa) => Some((r.name().clone(), soa.clone())),
            _ => None,
        })
        .expect("authority section should carry an SOA")
}

/// NXDOMAIN or NODATA with the synthetic SOA of `zone`.
pub fn assert_negative(msg: &Message, expected: ResponseCode, zone: &str) {
    assert_response_code(msg, expected);
    assert!(
        msg.answers().is_empty(),
        "negative answer carried records: {:?}",
        msg.answers()
    );

    let (owner, soa) = authority_soa(msg);
    assert_eq!(owner, Name::from_ascii(zone).unwrap());
    assert_eq!(soa.minimum(), 5);
}
