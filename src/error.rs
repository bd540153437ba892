//! Error types for gateway-dns.

use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cluster watch interface error
    #[error("Cluster error: {0}")]
    Cluster(#[from] crate::cluster::ClusterError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}
