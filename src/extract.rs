//! Hostname extraction for watched resource kinds.
//!
//! Each supported kind registers a [`HostnameRules`] value: three functions
//! that read the owner id, a display name, and the declared hostnames out
//! of a resource body. The reconciliation loop is identical for every kind;
//! only the registered rules differ, so supporting a new kind is a new
//! entry in [`WATCHED_KINDS`] and nothing else.

use kube::api::{ApiResource, DynamicObject};
use kube::core::GroupVersionKind;
use serde_json::Value;

/// Extraction strategy for one resource kind.
#[derive(Clone, Copy)]
pub struct HostnameRules {
    /// Stable identifier of the resource instance; scopes record ownership.
    pub owner_id: fn(&DynamicObject) -> String,
    /// Human-readable name for logs.
    pub display_name: fn(&DynamicObject) -> String,
    /// Hostnames the resource declares.
    pub hostnames: fn(&DynamicObject) -> Vec<String>,
}

/// A cluster resource kind watched for hostname declarations.
pub struct WatchedKind {
    /// API group, empty for the core group.
    pub group: &'static str,
    /// API version.
    pub version: &'static str,
    /// Kind name.
    pub kind: &'static str,
    /// Plural resource name used on the wire.
    pub plural: &'static str,
    /// Extraction strategy for this kind.
    pub rules: HostnameRules,
}

impl WatchedKind {
    /// Resource descriptor for API calls against this kind.
    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(self.group, self.version, self.kind);
        ApiResource::from_gvk_with_plural(&gvk, self.plural)
    }
}

const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";

/// All kinds the server watches.
pub static WATCHED_KINDS: &[WatchedKind] = &[
    WatchedKind {
        group: GATEWAY_API_GROUP,
        version: "v1",
        kind: "HTTPRoute",
        plural: "httproutes",
        rules: HostnameRules {
            owner_id: resource_owner_id,
            display_name: resource_display_name,
            hostnames: route_hostnames,
        },
    },
    WatchedKind {
        group: GATEWAY_API_GROUP,
        version: "v1",
        kind: "GRPCRoute",
        plural: "grpcroutes",
        rules: HostnameRules {
            owner_id: resource_owner_id,
            display_name: resource_display_name,
            hostnames: route_hostnames,
        },
    },
    WatchedKind {
        group: "networking.k8s.io",
        version: "v1",
        kind: "Ingress",
        plural: "ingresses",
        rules: HostnameRules {
            owner_id: resource_owner_id,
            display_name: resource_display_name,
            hostnames: ingress_hostnames,
        },
    },
];

/// Look up the registered kind by name.
///
/// # Panics
///
/// Panics when no extraction rules are registered for `kind`. That is a
/// missing registration, not a runtime condition, and must not be retried.
pub fn watched_kind(kind: &str) -> &'static WatchedKind {
    WATCHED_KINDS
        .iter()
        .find(|k| k.kind == kind)
        .unwrap_or_else(|| panic!("no hostname extraction registered for resource kind {kind}"))
}

/// Owner id: the object uid when the API assigned one, otherwise a
/// kind-scoped `kind/namespace/name` tuple.
fn resource_owner_id(obj: &DynamicObject) -> String {
    if let Some(uid) = obj.metadata.uid.as_deref() {
        return uid.to_string();
    }
    format!(
        "{}/{}",
        obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("unknown"),
        resource_display_name(obj)
    )
}

fn resource_display_name(obj: &DynamicObject) -> String {
    format!(
        "{}/{}",
        obj.metadata.namespace.as_deref().unwrap_or("default"),
        obj.metadata.name.as_deref().unwrap_or("<unnamed>")
    )
}

/// HTTPRoute and GRPCRoute declare hostnames at `spec.hostnames`.
fn route_hostnames(obj: &DynamicObject) -> Vec<String> {
    obj.data
        .get("spec")
        .and_then(|spec| spec.get("hostnames"))
        .and_then(Value::as_array)
        .map(|hosts| {
            hosts
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Ingress declares one optional host per rule at `spec.rules[].host`.
fn ingress_hostnames(obj: &DynamicObject) -> Vec<String> {
    obj.data
        .get("spec")
        .and_then(|spec| spec.get("rules"))
        .and_then(Value::as_array)
        .map(|rules| {
            rules
                .iter()
                .filter_map(|rule| rule.get("host"))
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
