//! Error types for traffic-dns.
//!
//! [`DnsError`] covers operational failures (startup, configuration, assignment
//! loading). Query handling never fails with it: every query outcome that is not
//! a positive answer is a [`Negative`] value mapped to a DNS response code.

use hickory_proto::op::ResponseCode;
use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Assignment file could not be decoded
    #[error("Assignment file parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Assignment file decoded but is semantically invalid
    #[error("Invalid assignments: {0}")]
    Assignments(String),

    /// Failed to parse address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Why a query produced no positive answer.
///
/// Each variant maps to exactly one response code, see [`Negative::response_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Negative {
    /// The provider does not know the cluster.
    #[error("cluster not found")]
    ClusterNotFound,

    /// The name does not fit any of the supported name forms.
    #[error("invalid name grammar")]
    InvalidNameGrammar,

    /// `endpoint-N` with N past the end of the endpoint list.
    #[error("endpoint index out of range")]
    EndpointIndexOutOfRange,

    /// `endpoint-N` where N is not a non-negative integer.
    #[error("malformed endpoint index")]
    MalformedEndpointIndex,

    /// The endpoint's address family does not match the query type.
    #[error("address family mismatch")]
    AddressFamilyMismatch,

    /// `_tcp.<cluster>`: a structural node without data.
    #[error("empty non-terminal")]
    EmptyNonTerminal,

    /// The cluster exists but has no (healthy) endpoints.
    #[error("no endpoints available")]
    NoEndpoints,

    /// The query type is not served at this name.
    #[error("unsupported record type")]
    UnsupportedType,

    /// The cluster exists but its SRV target names would exceed 255 octets.
    #[error("synthetic target name too long")]
    SyntheticNameTooLong,
}

impl Negative {
    /// NXDOMAIN for names that do not exist, NOERROR (NODATA) for names that do.
    pub fn response_code(self) -> ResponseCode {
        match self {
            Self::ClusterNotFound
            | Self::InvalidNameGrammar
            | Self::EndpointIndexOutOfRange
            | Self::MalformedEndpointIndex => ResponseCode::NXDomain,
            Self::AddressFamilyMismatch
            | Self::EmptyNonTerminal
            | Self::NoEndpoints
            | Self::UnsupportedType
            | Self::SyntheticNameTooLong => ResponseCode::NoError,
        }
    }

    /// True when the response is NODATA rather than NXDOMAIN.
    pub fn is_nodata(self) -> bool {
        self.response_code() == ResponseCode::NoError
    }
}
