//! Reconciliation loop: converges the record store with one watched kind.
//!
//! One loop runs per entry in [`crate::extract::WATCHED_KINDS`]. A loop
//! first probes until the kind exists in the cluster, then processes watch
//! events strictly in arrival order, reopening the stream on any fault
//! until the cancellation signal fires.

use futures::StreamExt;
use kube::api::DynamicObject;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::cluster::{ClusterError, ClusterWatch, ResourceEvent};
use crate::extract::WatchedKind;
use crate::metrics::{self, ReopenReason, WatchEventType};
use crate::store::RecordStore;

/// Keeps the record store converged with one resource kind.
pub struct Reconciler<C> {
    cluster: Arc<C>,
    store: RecordStore,
    kind: &'static WatchedKind,
    service_addr: Ipv4Addr,
    probe_interval: Duration,
}

impl<C: ClusterWatch> Reconciler<C> {
    /// Create a loop for `kind`. Every record it writes points at
    /// `service_addr`; `probe_interval` paces the existence probe.
    pub fn new(
        cluster: Arc<C>,
        store: RecordStore,
        kind: &'static WatchedKind,
        service_addr: Ipv4Addr,
        probe_interval: Duration,
    ) -> Self {
        Self {
            cluster,
            store,
            kind,
            service_addr,
            probe_interval,
        }
    }

    /// Run until cancelled.
    ///
    /// Returns `Ok(())` on cancellation. A probe failure other than
    /// kind-not-found is returned as an error and ends this loop without
    /// affecting other kinds.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ClusterError> {
        if !self.wait_until_kind_exists(&cancel).await? {
            return Ok(());
        }

        info!(kind = self.kind.kind, "resource kind detected, continuing to monitor for changes");
        self.watch_until_cancelled(&cancel).await;
        Ok(())
    }

    /// Probe for the kind until it exists. Returns `false` when cancelled
    /// first.
    async fn wait_until_kind_exists(&self, cancel: &CancellationToken) -> Result<bool, ClusterError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(false);
            }

            match self.cluster.list(self.kind).await {
                Ok(()) => return Ok(true),
                Err(ClusterError::KindNotFound) => {
                    warn!(
                        kind = self.kind.kind,
                        retry_secs = self.probe_interval.as_secs(),
                        "resource kind cannot be found, waiting before trying again"
                    );
                    metrics::record_probe_retry(self.kind.kind);

                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => return Ok(false),
                        _ = sleep(self.probe_interval) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Watch for changes, reopening the stream on every fault until
    /// cancelled. Retries are unbounded and immediate.
    async fn watch_until_cancelled(&self, cancel: &CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                info!(kind = self.kind.kind, "watch loop shutting down");
                return;
            }

            let mut stream = match self.cluster.watch(self.kind).await {
                Ok(s) => {
                    info!(kind = self.kind.kind, "watching for changes");
                    s
                }
                Err(e) => {
                    error!(kind = self.kind.kind, error = %e, "failed to open watch stream");
                    metrics::record_watch_reopen(self.kind.kind, ReopenReason::OpenFailed);
                    continue;
                }
            };

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        info!(kind = self.kind.kind, "watch received shutdown signal");
                        return;
                    }

                    item = stream.next() => {
                        match item {
                            Some(Ok(event)) => self.apply_event(event),
                            Some(Err(e)) => {
                                warn!(kind = self.kind.kind, error = %e, "watch stream error, reopening");
                                metrics::record_watch_reopen(self.kind.kind, ReopenReason::Error);
                                break;
                            }
                            None => {
                                info!(kind = self.kind.kind, "watch stream ended, reopening");
                                metrics::record_watch_reopen(self.kind.kind, ReopenReason::StreamEnded);
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Apply one watch event to the store.
    fn apply_event(&self, event: ResourceEvent) {
        match event {
            ResourceEvent::Added(obj) => {
                metrics::record_watch_event(self.kind.kind, WatchEventType::Added);
                self.add_records(&obj);
            }
            ResourceEvent::Modified(obj) => {
                // Full resync for the owner, not a differential patch.
                metrics::record_watch_event(self.kind.kind, WatchEventType::Modified);
                let owner = (self.kind.rules.owner_id)(&obj);
                self.store.remove_records_for_owner(&owner);
                self.add_records(&obj);
            }
            ResourceEvent::Deleted(obj) => {
                metrics::record_watch_event(self.kind.kind, WatchEventType::Deleted);
                let owner = (self.kind.rules.owner_id)(&obj);
                info!(
                    kind = self.kind.kind,
                    resource = %(self.kind.rules.display_name)(&obj),
                    "removing records for deleted resource"
                );
                self.store.remove_records_for_owner(&owner);
            }
            ResourceEvent::Other(label) => {
                trace!(kind = self.kind.kind, event = %label, "ignoring watch event");
                metrics::record_watch_event(self.kind.kind, WatchEventType::Other);
            }
        }
    }

    /// Add one record per declared hostname, owned by the resource.
    fn add_records(&self, obj: &DynamicObject) {
        let rules = &self.kind.rules;
        let owner = (rules.owner_id)(obj);
        let resource_name = (rules.display_name)(obj);

        for host in (rules.hostnames)(obj) {
            info!(
                kind = self.kind.kind,
                resource = %resource_name,
                host = %host,
                addr = %self.service_addr,
                "creating record"
            );
            if !self.store.add_record(&owner, &host, self.service_addr) {
                debug!(host = %host, owner_id = %owner, "record already present");
            }
        }
    }
}
