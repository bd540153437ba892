//! Configuration types for gateway-dns.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for the DNS server to listen on (UDP and TCP).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Address written into every created record: where hostnames declared
    /// by cluster resources should resolve to. In a pod this is usually
    /// the pod IP; locally it stays on loopback.
    #[serde(default = "default_service_addr")]
    pub service_addr: Ipv4Addr,

    /// Seconds between existence probes while a watched resource kind is
    /// not yet registered with the cluster.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

impl DnsConfig {
    /// Probe interval as a [`Duration`].
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            service_addr: default_service_addr(),
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "gateway_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5353))
}

fn default_service_addr() -> Ipv4Addr {
    Ipv4Addr::LOCALHOST
}

fn default_probe_interval_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
