//! DNS server setup and lifecycle management.

use hickory_server::authority::{AuthorityObject, Catalog};
use hickory_server::ServerFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::authority::RouteAuthority;
use crate::cluster::{ClusterWatch, KubeCluster};
use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::extract::WATCHED_KINDS;
use crate::reconcile::Reconciler;
use crate::store::RecordStore;

/// Interval for emitting store metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Idle timeout for TCP DNS connections.
const TCP_TIMEOUT: Duration = Duration::from_secs(30);

/// Periodically emit store metrics.
async fn metrics_loop(store: RecordStore, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                store.emit_metrics();
                debug!(
                    records = store.records_count(),
                    owners = store.owners_count(),
                    "emitted store metrics"
                );
            }
            _ = cancel.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// DNS server answering for hostnames declared by watched cluster resources.
pub struct DnsServer {
    config: DnsConfig,
    store: RecordStore,
}

impl DnsServer {
    /// Create a new DNS server with the given configuration.
    pub fn new(config: DnsConfig) -> Self {
        Self {
            config,
            store: RecordStore::new(),
        }
    }

    /// Get a reference to the record store.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Run against the ambient Kubernetes cluster until cancelled.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), DnsError> {
        let cluster = Arc::new(KubeCluster::connect().await?);
        self.run_with_cluster(cluster, cancel).await
    }

    /// Run against the given cluster interface until cancelled.
    pub async fn run_with_cluster<C: ClusterWatch>(
        self,
        cluster: Arc<C>,
        cancel: CancellationToken,
    ) -> Result<(), DnsError> {
        info!(
            listen_addr = %self.config.listen_addr,
            service_addr = %self.config.service_addr,
            "Starting gateway-dns server"
        );

        // One reconciliation loop per watched kind. A loop that stops on a
        // hard probe error only takes its own kind down.
        let mut recon_handles = Vec::with_capacity(WATCHED_KINDS.len());
        for kind in WATCHED_KINDS {
            let reconciler = Reconciler::new(
                cluster.clone(),
                self.store.clone(),
                kind,
                self.config.service_addr,
                self.config.probe_interval(),
            );
            let recon_cancel = cancel.clone();
            recon_handles.push(tokio::spawn(async move {
                if let Err(e) = reconciler.run(recon_cancel).await {
                    error!(kind = kind.kind, error = %e, "reconciliation loop error");
                }
            }));
        }

        // Create authority and catalog
        let authority = RouteAuthority::new(self.store.clone());

        let mut catalog = Catalog::new();
        let authority: Arc<dyn AuthorityObject> = Arc::new(authority);
        catalog.upsert(authority.origin().clone(), vec![authority]);

        // Create server
        let mut server = ServerFuture::new(catalog);

        // Bind UDP
        let udp_socket = UdpSocket::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        // Bind TCP
        let tcp_listener = TcpListener::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "DNS TCP listening");
        server.register_listener(tcp_listener, TCP_TIMEOUT);

        info!("DNS server ready to serve queries");

        // Start metrics loop
        let metrics_handle = tokio::spawn(metrics_loop(self.store.clone(), cancel.clone()));

        // Emit initial metrics
        self.store.emit_metrics();

        // Run server until cancelled
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
            }
        }

        // Wait for metrics loop to stop
        let _ = metrics_handle.await;

        // Wait for reconciliation loops to stop
        info!("Waiting for reconciliation loops to stop...");
        for handle in recon_handles {
            let _ = handle.await;
        }

        info!("DNS server stopped");
        Ok(())
    }
}
