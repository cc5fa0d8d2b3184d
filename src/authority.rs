//! Hickory DNS authority backed by the query router.

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{LowerName, Name, Record, RecordSet, RecordType};
use hickory_server::authority::{
    AuthLookup, Authority, LookupControlFlow, LookupError, LookupOptions, LookupRecords,
    MessageRequest, UpdateResult, ZoneType,
};
use hickory_server::server::RequestInfo;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::metrics::{self, QueryResult, Timer};
use crate::router::QueryRouter;
use crate::synthesis::Outcome;

/// Authority for one zone. All zones share one router.
pub struct TrafficAuthority {
    origin: LowerName,
    router: Arc<QueryRouter>,
}

impl TrafficAuthority {
    /// Create an authority for `origin`.
    pub fn new(origin: Name, router: Arc<QueryRouter>) -> Self {
        Self {
            origin: origin.into(),
            router,
        }
    }
}

/// Group records into one set per (name, type), keeping first-seen order.
fn record_sets(records: &[Record]) -> Vec<Arc<RecordSet>> {
    let mut sets: Vec<RecordSet> = Vec::new();

    for record in records {
        let existing = sets
            .iter_mut()
            .find(|set| set.name() == record.name() && set.record_type() == record.record_type());

        match existing {
            Some(set) => {
                set.insert(record.clone(), 0);
            }
            None => {
                let mut set = RecordSet::new(record.name().clone(), record.record_type(), 0);
                set.insert(record.clone(), 0);
                sets.push(set);
            }
        }
    }

    sets.into_iter().map(Arc::new).collect()
}

fn lookup_records(records: &[Record], lookup_options: LookupOptions) -> LookupRecords {
    let mut sets = record_sets(records);
    match sets.len() {
        0 => LookupRecords::Empty,
        1 => LookupRecords::new(lookup_options, sets.remove(0)),
        _ => LookupRecords::many(lookup_options, sets),
    }
}

#[async_trait]
impl Authority for TrafficAuthority {
    type Lookup = AuthLookup;

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
        let timer = Timer::start();
        let rtype_str = rtype.to_string();
        let name = Name::from(name.clone());

        trace!(%name, ?rtype, "DNS lookup");

        let Some(response) = self.router.route(&name, rtype) else {
            trace!(%name, origin = %self.origin, "name not under any zone");
            return LookupControlFlow::Skip;
        };

        match response.outcome {
            Outcome::Answer {
                answers,
                additionals,
            } => {
                debug!(
                    %name,
                    ?rtype,
                    answers = answers.len(),
                    additionals = additionals.len(),
                    "returning records"
                );
                metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());

                let additionals = (!additionals.is_empty())
                    .then(|| lookup_records(&additionals, lookup_options));
                LookupControlFlow::Break(Ok(AuthLookup::answers(
                    lookup_records(&answers, lookup_options),
                    additionals,
                )))
            }
            Outcome::Negative(negative) if negative.is_nodata() => {
                debug!(%name, ?rtype, reason = %negative, "NODATA");
                metrics::record_query(&rtype_str, QueryResult::NoData, timer.elapsed());
                LookupControlFlow::Break(Err(LookupError::NameExists))
            }
            Outcome::Negative(negative) => {
                debug!(%name, ?rtype, reason = %negative, "NXDOMAIN");
                metrics::record_query(&rtype_str, QueryResult::NxDomain, timer.elapsed());
                LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NXDomain)))
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
        Err(ResponseCode::NotImp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::{Endpoint, EndpointSelector};
    use crate::state::{AssignmentState, ClusterAssignment, HealthStatus, LbEndpoint};
    use crate::zone::Zones;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::RData;
    use hickory_server::authority::LookupObject;
    use std::net::Ipv4Addr;

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    fn lower(s: &str) -> LowerName {
        name(s).into()
    }

    fn test_authority() -> TrafficAuthority {
        let state = AssignmentState::new();
        state.upsert_cluster(ClusterAssignment {
            name: "web".to_string(),
            endpoints: vec![
                LbEndpoint {
                    endpoint: Endpoint::new("10.0.0.1".parse().unwrap(), 8080),
                    health: HealthStatus::Healthy,
                    weight: 1,
                },
                LbEndpoint {
                    endpoint: Endpoint::new("10.0.0.2".parse().unwrap(), 8081),
                    health: HealthStatus::Healthy,
                    weight: 1,
                },
            ],
        });
        state.mark_ready();

        let router = QueryRouter::new(
            Zones::new(&["example.org."]).unwrap(),
            "mgmt",
            EndpointSelector::new(Arc::new(state), false),
        );
        TrafficAuthority::new(name("example.org."), Arc::new(router))
    }

    fn records(lookup: &AuthLookup) -> Vec<Record> {
        lookup.iter().cloned().collect()
    }

    #[test]
    fn test_record_sets_group_by_name_and_type() {
        let records = vec![
            Record::from_rdata(name("a.example.org."), 5, RData::A(A::new(10, 0, 0, 1))),
            Record::from_rdata(name("b.example.org."), 5, RData::A(A::new(10, 0, 0, 2))),
            Record::from_rdata(name("a.example.org."), 5, RData::A(A::new(10, 0, 0, 3))),
        ];

        let sets = record_sets(&records);
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].name(), &name("a.example.org."));
        assert_eq!(sets[0].records_without_rrsigs().count(), 2);
        assert_eq!(sets[1].name(), &name("b.example.org."));
    }

    #[tokio::test]
    async fn test_lookup_a_returns_record() {
        let authority = test_authority();
        let result = authority
            .lookup(&lower("web.example.org."), RecordType::A, LookupOptions::default())
            .await;

        let LookupControlFlow::Break(Ok(lookup)) = result else {
            panic!("expected records");
        };
        let answers = records(&lookup);
        assert_eq!(answers.len(), 1);
        let RData::A(a) = answers[0].data() else {
            panic!("expected A, got {:?}", answers[0]);
        };
        assert!([Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)].contains(&a.0));
    }

    #[tokio::test]
    async fn test_lookup_srv_carries_glue() {
        let authority = test_authority();
        let result = authority
            .lookup(&lower("web.example.org."), RecordType::SRV, LookupOptions::default())
            .await;

        let LookupControlFlow::Break(Ok(mut lookup)) = result else {
            panic!("expected records");
        };
        assert_eq!(records(&lookup).len(), 2);

        let glue: Vec<Record> = LookupObject::take_additionals(&mut lookup)
            .map(|additionals| additionals.iter().cloned().collect())
            .unwrap_or_default();
        assert_eq!(glue.len(), 2);
        assert_eq!(glue[0].name(), &name("endpoint-0.web.example.org."));
        assert_eq!(glue[1].name(), &name("endpoint-1.web.example.org."));
    }

    #[tokio::test]
    async fn test_lookup_unknown_is_nxdomain() {
        let authority = test_authority();
        let result = authority
            .lookup(&lower("db.example.org."), RecordType::A, LookupOptions::default())
            .await;

        assert!(matches!(
            result,
            LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NXDomain)))
        ));
    }

    #[tokio::test]
    async fn test_lookup_family_mismatch_is_name_exists() {
        let authority = test_authority();
        let result = authority
            .lookup(&lower("web.example.org."), RecordType::AAAA, LookupOptions::default())
            .await;

        assert!(matches!(
            result,
            LookupControlFlow::Break(Err(LookupError::NameExists))
        ));
    }

    #[tokio::test]
    async fn test_lookup_apex_soa() {
        let authority = test_authority();
        let result = authority
            .lookup(&lower("example.org."), RecordType::SOA, LookupOptions::default())
            .await;

        let LookupControlFlow::Break(Ok(lookup)) = result else {
            panic!("expected SOA");
        };
        let answers = records(&lookup);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].record_type(), RecordType::SOA);
    }

    #[tokio::test]
    async fn test_lookup_outside_zone_skips() {
        let authority = test_authority();
        let result = authority
            .lookup(&lower("web.example.com."), RecordType::A, LookupOptions::default())
            .await;

        assert!(matches!(result, LookupControlFlow::Skip));
    }
}
