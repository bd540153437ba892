//! Hickory DNS authority backed by the record store.
//!
//! This is the read-only boundary between the DNS transport and the core:
//! every query funnels into [`crate::store::RecordStore::resolve`], and an
//! empty result becomes an NXDOMAIN answer.

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{LowerName, Name, RData, Record, RecordSet, RecordType};
use hickory_server::authority::{
    Authority, LookupControlFlow, LookupError, LookupOptions, LookupRecords, MessageRequest,
    UpdateResult, ZoneType,
};
use hickory_server::server::RequestInfo;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::metrics::{self, QueryResult, Timer};
use crate::store::{DomainRecord, RecordKind, RecordStore};

/// Authority answering for hostnames declared by watched cluster resources.
///
/// Rooted at `.`: declared hostnames are arbitrary, so there is no single
/// zone to anchor on.
pub struct RouteAuthority {
    origin: LowerName,
    store: RecordStore,
}

impl RouteAuthority {
    /// Create an authority over the given store.
    pub fn new(store: RecordStore) -> Self {
        Self {
            origin: LowerName::from(Name::root()),
            store,
        }
    }

    /// Build an A record set for the given name.
    fn build_a_records(&self, name: Name, records: &[DomainRecord]) -> RecordSet {
        let mut record_set = RecordSet::new(name.clone(), RecordType::A, 0);

        for rec in records {
            let mut record = Record::from_rdata(name.clone(), rec.ttl, RData::A(A::from(rec.addr)));
            record.set_dns_class(hickory_proto::rr::DNSClass::IN);
            record_set.insert(record, 0);
        }

        record_set
    }

    fn lookup_store(
        &self,
        name: &LowerName,
        query_kind: Option<RecordKind>,
        rtype_str: &str,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<LookupRecords> {
        let timer = Timer::start();
        let name_str = name.to_string();
        // Remove the trailing dot for store lookup
        let lookup_name = name_str.trim_end_matches('.');

        let records = self.store.resolve(lookup_name, query_kind);

        if records.is_empty() {
            debug!(name = %lookup_name, "lookup: no records found");
            metrics::record_query(rtype_str, QueryResult::NxDomain, timer.elapsed());
            return LookupControlFlow::Break(Err(LookupError::ResponseCode(
                ResponseCode::NXDomain,
            )));
        }

        debug!(name = %lookup_name, count = records.len(), "lookup: returning records");
        metrics::record_answers_returned(records.len());
        metrics::record_query(rtype_str, QueryResult::Success, timer.elapsed());
        let dns_name = Name::from(name.clone());
        let record_set = Arc::new(self.build_a_records(dns_name, &records));
        LookupControlFlow::Break(Ok(LookupRecords::new(lookup_options, record_set)))
    }
}

#[async_trait]
impl Authority for RouteAuthority {
    type Lookup = LookupRecords;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        trace!(name = %name, rtype = ?rtype, "DNS lookup");

        match rtype {
            RecordType::A => self.lookup_store(name, Some(RecordKind::A), "A", lookup_options),
            RecordType::ANY => self.lookup_store(name, None, "ANY", lookup_options),
            _ => {
                // Address records only; everything else gets an empty
                // NOERROR answer rather than NXDOMAIN.
                trace!(name = %name, rtype = ?rtype, "unsupported record type");
                metrics::record_query(
                    &format!("{rtype:?}"),
                    QueryResult::NoData,
                    std::time::Duration::ZERO,
                );
                LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
            }
        }
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        self.lookup(
            request_info.query.name(),
            request_info.query.query_type(),
            lookup_options,
        )
        .await
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        // DNSSEC not supported
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
    }

    async fn update(&self, _update: &MessageRequest) -> UpdateResult<bool> {
        // Dynamic updates not supported
        Err(ResponseCode::NotImp)
    }
}
