//! Cluster watch interface and its Kubernetes-backed implementation.
//!
//! The reconciliation loop only ever talks to [`ClusterWatch`]: an
//! existence probe (`list`) and a lazy, unbounded event stream (`watch`).
//! [`KubeCluster`] implements it against the live API server; tests supply
//! scripted implementations.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::api::{Api, DynamicObject, ListParams, WatchEvent, WatchParams};
use thiserror::Error;
use tracing::debug;

use crate::extract::WatchedKind;

/// One observed change to a watched resource.
#[derive(Debug)]
pub enum ResourceEvent {
    /// The resource was created (or existed when the watch opened).
    Added(DynamicObject),
    /// The resource changed.
    Modified(DynamicObject),
    /// The resource was deleted.
    Deleted(DynamicObject),
    /// Any other notification; carries a label for trace logging.
    Other(String),
}

/// Errors surfaced by the cluster interface.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The resource kind is not served by the cluster (missing CRD).
    #[error("resource kind is not registered with the cluster")]
    KindNotFound,

    /// Any other API failure (auth, forbidden, transport, decode).
    #[error("cluster API error: {0}")]
    Api(#[from] kube::Error),

    /// Error status delivered inside an open watch stream.
    #[error("watch stream error: {0}")]
    Stream(String),
}

/// Lazy, cancellable sequence of resource events.
pub type EventStream = BoxStream<'static, Result<ResourceEvent, ClusterError>>;

/// Read access to the cluster's view of a resource kind.
#[async_trait]
pub trait ClusterWatch: Send + Sync + 'static {
    /// Probe whether `kind` exists in the cluster.
    ///
    /// Returns [`ClusterError::KindNotFound`] when the API serves a
    /// not-found for the kind itself; every other failure is passed
    /// through untouched.
    async fn list(&self, kind: &WatchedKind) -> Result<(), ClusterError>;

    /// Open a watch stream over all instances of `kind`.
    async fn watch(&self, kind: &WatchedKind) -> Result<EventStream, ClusterError>;
}

/// [`ClusterWatch`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: kube::Client,
}

impl KubeCluster {
    /// Wrap an existing client.
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient configuration: in-cluster service account
    /// when running in a pod, local kubeconfig otherwise.
    pub async fn connect() -> Result<Self, ClusterError> {
        let client = kube::Client::try_default().await?;
        Ok(Self { client })
    }

    fn api(&self, kind: &WatchedKind) -> Api<DynamicObject> {
        Api::all_with(self.client.clone(), &kind.api_resource())
    }
}

#[async_trait]
impl ClusterWatch for KubeCluster {
    async fn list(&self, kind: &WatchedKind) -> Result<(), ClusterError> {
        match self.api(kind).list(&ListParams::default().limit(1)).await {
            Ok(list) => {
                debug!(kind = kind.kind, items = list.items.len(), "existence probe succeeded");
                Ok(())
            }
            Err(kube::Error::Api(resp)) if resp.code == 404 => Err(ClusterError::KindNotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn watch(&self, kind: &WatchedKind) -> Result<EventStream, ClusterError> {
        // Version "0" replays current state as Added events before
        // streaming live changes, so a fresh loop converges immediately.
        let stream = self
            .api(kind)
            .watch(&WatchParams::default(), "0")
            .await?
            .map(convert_event)
            .boxed();
        Ok(stream)
    }
}

fn convert_event(
    item: Result<WatchEvent<DynamicObject>, kube::Error>,
) -> Result<ResourceEvent, ClusterError> {
    match item {
        Ok(WatchEvent::Added(obj)) => Ok(ResourceEvent::Added(obj)),
        Ok(WatchEvent::Modified(obj)) => Ok(ResourceEvent::Modified(obj)),
        Ok(WatchEvent::Deleted(obj)) => Ok(ResourceEvent::Deleted(obj)),
        Ok(WatchEvent::Bookmark(_)) => Ok(ResourceEvent::Other("bookmark".to_string())),
        Ok(WatchEvent::Error(resp)) => Err(ClusterError::Stream(resp.message)),
        Err(e) => Err(e.into()),
    }
}
