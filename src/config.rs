//! Configuration types for traffic-dns.

use hickory_proto::rr::Name;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::DnsError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    pub dns: DnsConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for DNS server to listen on (UDP and TCP).
    pub listen_addr: SocketAddr,

    /// Zones this server is authoritative for, e.g. `["example.org."]`.
    /// Zones may not be nested in one another or repeated.
    pub zones: Vec<String>,

    /// Cluster whose endpoints answer `_grpclb._tcp.<cluster>` queries.
    pub management_cluster: String,

    /// Only hand out endpoints reporting healthy.
    #[serde(default)]
    pub healthy_only: bool,

    /// Where cluster assignments are loaded from.
    pub assignments: AssignmentsConfig,
}

impl DnsConfig {
    /// Check the values the query router relies on.
    pub fn validate(&self) -> Result<(), DnsError> {
        if self.zones.is_empty() {
            return Err(DnsError::Config("at least one zone is required".into()));
        }
        let mut parsed: Vec<Name> = Vec::with_capacity(self.zones.len());
        for zone in &self.zones {
            let mut name = Name::from_ascii(zone)
                .map_err(|e| DnsError::Config(format!("invalid zone {zone:?}: {e}")))?
                .to_lowercase();
            name.set_fqdn(true);

            // hickory dispatches to the longest matching zone, the router to the first
            if let Some(other) = parsed
                .iter()
                .find(|other| other.zone_of(&name) || name.zone_of(other))
            {
                return Err(DnsError::Config(format!(
                    "zone {name} overlaps zone {other}"
                )));
            }
            parsed.push(name);
        }
        if self.management_cluster.trim().is_empty() {
            return Err(DnsError::Config("management_cluster must not be empty".into()));
        }
        if self.assignments.poll_interval_secs == 0 {
            return Err(DnsError::Config(
                "assignments.poll_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Assignment file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentsConfig {
    /// Path to the TOML assignment file.
    pub path: PathBuf,

    /// How often the file is checked for changes, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "traffic_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OpenTelemetry configuration.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name for traces.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "traffic-dns".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> DnsConfig {
        DnsConfig {
            listen_addr: "127.0.0.1:5353".parse().unwrap(),
            zones: vec!["example.org.".to_string()],
            management_cluster: "mgmt".to_string(),
            healthy_only: false,
            assignments: AssignmentsConfig {
                path: PathBuf::from("assignments.toml"),
                poll_interval_secs: 5,
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_zones_rejected() {
        let config = DnsConfig {
            zones: vec![],
            ..valid_config()
        };
        assert!(matches!(config.validate(), Err(DnsError::Config(_))));
    }

    #[test]
    fn test_nested_zones_rejected() {
        for zones in [
            vec!["example.org.", "svc.example.org."],
            vec!["svc.example.org.", "Example.ORG"],
            vec!["example.org.", "example.org"],
        ] {
            let config = DnsConfig {
                zones: zones.into_iter().map(String::from).collect(),
                ..valid_config()
            };
            assert!(
                matches!(config.validate(), Err(DnsError::Config(_))),
                "zones {:?}",
                config.zones
            );
        }
    }

    #[test]
    fn test_sibling_zones_accepted() {
        let config = DnsConfig {
            zones: vec![
                "example.org.".to_string(),
                "example.net.".to_string(),
                "notexample.org.".to_string(),
            ],
            ..valid_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_management_cluster_rejected() {
        let config = DnsConfig {
            management_cluster: "  ".to_string(),
            ..valid_config()
        };
        assert!(matches!(config.validate(), Err(DnsError::Config(_))));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = valid_config();
        config.assignments.poll_interval_secs = 0;
        assert!(matches!(config.validate(), Err(DnsError::Config(_))));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [dns]
            listen_addr = "[::]:5353"
            zones = ["example.org.", "example.net."]
            management_cluster = "mgmt"

            [dns.assignments]
            path = "/etc/traffic-dns/assignments.toml"
            "#,
        )
        .unwrap();

        assert_eq!(config.dns.zones.len(), 2);
        assert!(!config.dns.healthy_only);
        assert_eq!(config.dns.assignments.poll_interval_secs, 5);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.telemetry.prometheus_addr.is_none());
        assert_eq!(config.telemetry.log_format, LogFormat::Text);
    }

    #[test]
    fn test_deserialize_json_log_format() {
        let telemetry: TelemetryConfig = toml::from_str(
            r#"
            log_level = "traffic_dns=debug"
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(telemetry.log_format, LogFormat::Json);
        assert_eq!(telemetry.log_level, "traffic_dns=debug");
    }
}
