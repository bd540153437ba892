//! Reconciliation-loop integration tests against a scripted cluster.
//!
//! The scripted cluster serves canned probe outcomes and watch streams, so
//! these tests exercise the real loop: existence gating, event ordering,
//! fault-driven stream reopening, and cancellation. Timers run under
//! tokio's paused clock, so probe intervals elapse instantly.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use kube::api::DynamicObject;
use kube::core::ErrorResponse;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use gateway_dns::cluster::{ClusterError, ClusterWatch, EventStream, ResourceEvent};
use gateway_dns::extract::{watched_kind, WatchedKind};
use gateway_dns::reconcile::Reconciler;
use gateway_dns::store::{RecordKind, RecordStore};

const SERVICE_ADDR: &str = "10.0.0.5";
const PROBE_INTERVAL: Duration = Duration::from_secs(10);

// --- Scripted cluster ---

/// `ClusterWatch` implementation driven by canned responses.
///
/// Probe outcomes are consumed front-to-back; once exhausted, probes
/// succeed (or keep failing with not-found when `kind_never_appears`).
/// Watch streams are consumed the same way; once exhausted, a stream that
/// never yields is returned so the loop parks until cancellation.
struct ScriptedCluster {
    probes: Mutex<VecDeque<Result<(), ClusterError>>>,
    streams: Mutex<VecDeque<Vec<Result<ResourceEvent, ClusterError>>>>,
    kind_never_appears: bool,
    probe_count: AtomicUsize,
    watch_count: AtomicUsize,
    probes_before_first_watch: AtomicUsize,
}

impl ScriptedCluster {
    fn new(
        probes: Vec<Result<(), ClusterError>>,
        streams: Vec<Vec<Result<ResourceEvent, ClusterError>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            probes: Mutex::new(probes.into()),
            streams: Mutex::new(streams.into()),
            kind_never_appears: false,
            probe_count: AtomicUsize::new(0),
            watch_count: AtomicUsize::new(0),
            probes_before_first_watch: AtomicUsize::new(0),
        })
    }

    fn never_appearing() -> Arc<Self> {
        Arc::new(Self {
            probes: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            kind_never_appears: true,
            probe_count: AtomicUsize::new(0),
            watch_count: AtomicUsize::new(0),
            probes_before_first_watch: AtomicUsize::new(0),
        })
    }

    fn probe_count(&self) -> usize {
        self.probe_count.load(Ordering::SeqCst)
    }

    fn watch_count(&self) -> usize {
        self.watch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterWatch for ScriptedCluster {
    async fn list(&self, _kind: &WatchedKind) -> Result<(), ClusterError> {
        self.probe_count.fetch_add(1, Ordering::SeqCst);
        match self.probes.lock().unwrap().pop_front() {
            Some(result) => result,
            None if self.kind_never_appears => Err(ClusterError::KindNotFound),
            None => Ok(()),
        }
    }

    async fn watch(&self, _kind: &WatchedKind) -> Result<EventStream, ClusterError> {
        if self.watch_count.fetch_add(1, Ordering::SeqCst) == 0 {
            self.probes_before_first_watch
                .store(self.probe_count(), Ordering::SeqCst);
        }
        match self.streams.lock().unwrap().pop_front() {
            Some(events) => Ok(futures::stream::iter(events).boxed()),
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}

// --- Helpers ---

fn route(name: &str, uid: &str, hostnames: &[&str]) -> DynamicObject {
    let kind = watched_kind("HTTPRoute");
    let mut obj = DynamicObject::new(name, &kind.api_resource()).within("default");
    obj.metadata.uid = Some(uid.to_string());
    obj.data = json!({ "spec": { "hostnames": hostnames } });
    obj
}

fn reconciler(cluster: Arc<ScriptedCluster>, store: RecordStore) -> Reconciler<ScriptedCluster> {
    Reconciler::new(
        cluster,
        store,
        watched_kind("HTTPRoute"),
        SERVICE_ADDR.parse::<Ipv4Addr>().unwrap(),
        PROBE_INTERVAL,
    )
}

fn kind_not_found() -> Result<(), ClusterError> {
    Err(ClusterError::KindNotFound)
}

fn forbidden() -> Result<(), ClusterError> {
    Err(ClusterError::Api(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: "httproutes.gateway.networking.k8s.io is forbidden".to_string(),
        reason: "Forbidden".to_string(),
        code: 403,
    })))
}

fn has_record(store: &RecordStore, name: &str) -> bool {
    !store.resolve(name, Some(RecordKind::A)).is_empty()
}

/// Poll until `cond` holds; panics after the (paused-clock) deadline.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(60), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached before deadline");
}

// --- Tests ---

#[tokio::test(start_paused = true)]
async fn test_existence_gating_probes_until_kind_appears() {
    let cluster = ScriptedCluster::new(vec![kind_not_found(), kind_not_found()], vec![]);
    let store = RecordStore::new();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(reconciler(cluster.clone(), store).run(cancel.clone()));

    wait_until(|| cluster.watch_count() >= 1).await;

    // Two failed cycles, then the probe that confirms the kind.
    assert_eq!(cluster.probe_count(), 3);
    assert_eq!(cluster.probes_before_first_watch.load(Ordering::SeqCst), 3);

    cancel.cancel();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_non_not_found_probe_error_is_fatal_for_the_loop() {
    let cluster = ScriptedCluster::new(vec![forbidden()], vec![]);
    let store = RecordStore::new();
    let cancel = CancellationToken::new();

    let result = reconciler(cluster.clone(), store).run(cancel).await;

    assert!(result.is_err());
    assert_eq!(cluster.probe_count(), 1);
    assert_eq!(cluster.watch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_added_then_modified_converges_to_latest_hostnames() {
    let cluster = ScriptedCluster::new(
        vec![],
        vec![vec![
            Ok(ResourceEvent::Added(route(
                "web",
                "u-1",
                &["h1.example.com", "h2.example.com"],
            ))),
            Ok(ResourceEvent::Modified(route(
                "web",
                "u-1",
                &["h2.example.com", "h3.example.com"],
            ))),
        ]],
    );
    let store = RecordStore::new();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(reconciler(cluster, store.clone()).run(cancel.clone()));

    wait_until(|| has_record(&store, "h3.example.com")).await;

    assert!(!has_record(&store, "h1.example.com"));
    assert!(has_record(&store, "h2.example.com"));
    assert!(has_record(&store, "h3.example.com"));
    assert_eq!(store.records_count(), 2);

    cancel.cancel();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_deleted_resource_loses_its_records_only() {
    let cluster = ScriptedCluster::new(
        vec![],
        vec![vec![
            Ok(ResourceEvent::Added(route("web", "u-1", &["a.example.com"]))),
            Ok(ResourceEvent::Added(route("api", "u-2", &["b.example.com"]))),
            Ok(ResourceEvent::Deleted(route("web", "u-1", &[]))),
        ]],
    );
    let store = RecordStore::new();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(reconciler(cluster, store.clone()).run(cancel.clone()));

    wait_until(|| store.records_count() == 1).await;

    assert!(!has_record(&store, "a.example.com"));
    assert!(has_record(&store, "b.example.com"));

    cancel.cancel();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_watch_fault_reopens_the_stream() {
    let cluster = ScriptedCluster::new(
        vec![],
        vec![
            vec![
                Ok(ResourceEvent::Added(route("web", "u-1", &["a.example.com"]))),
                Err(ClusterError::Stream("connection reset".to_string())),
            ],
            vec![Ok(ResourceEvent::Added(route("api", "u-2", &["b.example.com"])))],
        ],
    );
    let store = RecordStore::new();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(reconciler(cluster.clone(), store.clone()).run(cancel.clone()));

    wait_until(|| has_record(&store, "b.example.com")).await;

    assert!(has_record(&store, "a.example.com"));
    assert!(cluster.watch_count() >= 2);

    cancel.cancel();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_probing() {
    let cluster = ScriptedCluster::never_appearing();
    let store = RecordStore::new();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(reconciler(cluster.clone(), store).run(cancel.clone()));

    wait_until(|| cluster.probe_count() >= 2).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop did not exit after cancellation")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(cluster.watch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_watching() {
    let cluster = ScriptedCluster::new(vec![], vec![]);
    let store = RecordStore::new();
    let cancel = CancellationToken::new();

    let handle = tokio::spawn(reconciler(cluster.clone(), store).run(cancel.clone()));

    wait_until(|| cluster.watch_count() >= 1).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop did not exit after cancellation")
        .unwrap();
    assert!(result.is_ok());
}
