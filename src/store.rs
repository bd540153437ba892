//! In-memory record store scoped by owning cluster resource.
//!
//! Every record is keyed by `(owner id, domain pattern, record kind)` so
//! that all records created for one resource can be removed together when
//! that resource goes away. Lookups are wildcard-aware: a `*` label in a
//! stored pattern matches any single label of the queried name.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::metrics;

/// Records are served with a fixed zero TTL; clients re-resolve on every
/// lookup and always observe the live cluster state.
pub const DEFAULT_TTL: u32 = 0;

/// Kinds of records the store can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// IPv4 address record.
    A,
}

/// Composite key identifying one record.
///
/// No two records may share a key; the same pattern may exist under
/// different owners.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    owner_id: String,
    pattern: String,
    kind: RecordKind,
}

/// A stored address record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRecord {
    /// Dot-separated pattern the record answers for; labels may be `*`.
    pub pattern: String,
    /// Address every matching query resolves to.
    pub addr: Ipv4Addr,
    /// Record kind.
    pub kind: RecordKind,
    /// TTL in seconds, always [`DEFAULT_TTL`].
    pub ttl: u32,
}

struct StoredEntry {
    record: DomainRecord,
    matcher: Regex,
}

/// Thread-safe record store.
///
/// Cloning is cheap and all clones share the same map. Mutation is keyed,
/// so writers for unrelated resources never contend beyond the map's
/// per-shard locking, and lookups see a consistent snapshot without
/// waiting on writers.
#[derive(Clone, Default)]
pub struct RecordStore {
    entries: Arc<DashMap<RecordKey, StoredEntry>>,
}

impl RecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an A record for `pattern` owned by `owner_id`.
    ///
    /// Idempotent: returns `false` without touching the existing record
    /// when the exact key is already present.
    pub fn add_record(&self, owner_id: &str, pattern: &str, addr: Ipv4Addr) -> bool {
        let matcher = match compile_matcher(pattern) {
            Ok(m) => m,
            Err(e) => {
                warn!(pattern, error = %e, "rejecting record with uncompilable pattern");
                return false;
            }
        };

        let key = RecordKey {
            owner_id: owner_id.to_string(),
            pattern: pattern.to_string(),
            kind: RecordKind::A,
        };

        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                debug!(owner_id, pattern, %addr, "adding record");
                vacant.insert(StoredEntry {
                    record: DomainRecord {
                        pattern: pattern.to_string(),
                        addr,
                        kind: RecordKind::A,
                        ttl: DEFAULT_TTL,
                    },
                    matcher,
                });
                true
            }
        }
    }

    /// Remove every record owned by `owner_id`.
    ///
    /// Each removal is logged; removing a key that is already gone is a
    /// warning, never an error.
    pub fn remove_records_for_owner(&self, owner_id: &str) {
        let keys: Vec<RecordKey> = self
            .entries
            .iter()
            .filter(|entry| entry.key().owner_id == owner_id)
            .map(|entry| entry.key().clone())
            .collect();

        for key in keys {
            if self.entries.remove(&key).is_some() {
                trace!(
                    owner_id,
                    pattern = %key.pattern,
                    "removal of record succeeded"
                );
            } else {
                warn!(
                    owner_id,
                    pattern = %key.pattern,
                    "removal of record failed"
                );
            }
        }
    }

    /// Return a snapshot of every record matching `query_name`.
    ///
    /// `query_kind` of `None` is a wildcard query type and matches records
    /// of any kind. An empty result means the name is unknown and the
    /// transport must answer with a negative response.
    pub fn resolve(&self, query_name: &str, query_kind: Option<RecordKind>) -> Vec<DomainRecord> {
        self.entries
            .iter()
            .filter(|entry| match query_kind {
                Some(kind) => entry.value().record.kind == kind,
                None => true,
            })
            .filter(|entry| entry.value().matcher.is_match(query_name))
            .map(|entry| entry.value().record.clone())
            .collect()
    }

    /// Total number of records.
    pub fn records_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of distinct owning resources.
    pub fn owners_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.key().owner_id.clone())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Emit current store gauges.
    pub fn emit_metrics(&self) {
        metrics::record_store_counts(self.records_count(), self.owners_count());
    }
}

/// Build the anchored case-insensitive matcher for a stored pattern.
///
/// Each literal label is escaped for exact match, each `*` label matches
/// one-or-more word characters, labels join on a literal dot. Equal label
/// count is implied by the anchoring: a pattern never matches a query with
/// a different number of labels, and a wildcard never spans a dot.
fn compile_matcher(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('.')
        .map(|label| {
            if label == "*" {
                r"(\w+)".to_string()
            } else {
                regex::escape(label)
            }
        })
        .collect::<Vec<_>>()
        .join(r"\.");

    RegexBuilder::new(&format!("^{body}$"))
        .case_insensitive(true)
        .build()
}
