//! gateway-dns - A development-cluster DNS server fed by the Kubernetes API.
//!
//! This crate provides a DNS server that answers address queries for
//! hostnames declared by Gateway API route objects (HTTPRoute, GRPCRoute)
//! and Ingress objects, resolving all of them to a configured local
//! service IP. There is no persistent storage: the record set is derived
//! entirely from live watch streams against the cluster.
//!
//! ## Features
//!
//! - Real-time record updates via Kubernetes watch streams
//! - Wildcard hostnames (`*.example.com`) matching a single label
//! - Per-resource record ownership: a deleted route takes exactly its own
//!   records with it
//! - Existence probing for kinds whose CRDs are not installed yet
//! - Graceful shutdown support
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         gateway-dns                             │
//! │                                                                 │
//! │  ┌──────────────────┐    ┌──────────────────┐                  │
//! │  │ Watch streams    │───▶│  Record Store    │                  │
//! │  │ (one per kind)   │    │  (in-memory)     │                  │
//! │  └──────────────────┘    └────────┬─────────┘                  │
//! │         │                         │                             │
//! │         │ Watched kinds:          ▼                             │
//! │         │ - HTTPRoute        ┌──────────────────┐              │
//! │         │ - GRPCRoute        │  Hickory DNS     │◀── UDP/TCP   │
//! │         │ - Ingress          │  Server          │              │
//! │         └───────────────────▶└──────────────────┘              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! my-api.example.com A?
//!   → match against stored patterns (label-wise, `*` = one label)
//!   → answer with the configured service IP, TTL 0
//!   → no match ⇒ NXDOMAIN
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use gateway_dns::{DnsConfig, DnsServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DnsConfig {
//!         listen_addr: "0.0.0.0:5353".parse().unwrap(),
//!         service_addr: "10.96.0.10".parse().unwrap(),
//!         probe_interval_secs: 10,
//!     };
//!
//!     let cancel = CancellationToken::new();
//!     let server = DnsServer::new(config);
//!     server.run(cancel).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod authority;
pub mod cluster;
pub mod config;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod reconcile;
pub mod server;
pub mod store;
pub mod telemetry;

// Re-export main types
pub use config::{Config, DnsConfig, TelemetryConfig};
pub use error::DnsError;
pub use server::DnsServer;
pub use store::RecordStore;
