#![allow(dead_code)]

use common::catalog::MemCatalog;
use common::config::PushdownConfig;
use common::testutil::{account_object, opportunity_object, ts};
use common::{TableSchema, Tuple};
use optimizer::MedDataServer;
use queryexe::csv_utils::read_tuples;
use queryexe::dataset::{deleted_schema, lov_schema};
use queryexe::{Dataset, FixedClock, MedSession, RemoteEndpoint, RemoteService};
use std::sync::Arc;

pub const ACCOUNTS: &str = "\
001,Acme,info@acme.com
002,Globex,
003,Initech,hello@initech.com
004,Umbrella,
005,Acme Labs,labs@acme.com
";

pub const OPPORTUNITIES: &str = "\
006A,Big deal,1500.00,0.9,2020-01-15,2019-12-01T09:00:00Z,true,10
006B,Small deal,99.50,0.2,2020-02-01,2019-12-05T10:30:00Z,false,1
006C,Renewal,,0.5,2020-03-31,2020-01-02T00:00:00Z,,3
006D,Expansion,250.00,,,2020-01-10T16:45:00Z,true,
006E,Pilot,0.00,0.1,2020-01-15,,false,0
006F,Upsell,1200.75,0.75,2020-06-30,2020-01-20T08:00:00Z,true,7
";

pub const DELETED: &str = "\
101,2020-01-05T00:00:00Z
102,2020-01-20T12:00:00Z
103,2020-01-24T23:59:59Z
";

pub const LOV: &str = "\
Industry,Banking
Industry,Retail
Rating,Hot
";

pub fn catalog() -> MemCatalog {
    MemCatalog::new(vec![account_object(), opportunity_object()])
}

pub fn dataset() -> Dataset {
    let mut dataset = Dataset::new();
    let rows = |text: &str, schema: &TableSchema| read_tuples(text.as_bytes(), schema).unwrap();
    dataset.add_rows("Account", rows(ACCOUNTS, &account_object().schema()));
    dataset.add_rows("Opportunity", rows(OPPORTUNITIES, &opportunity_object().schema()));
    dataset.add_deleted("Account", rows(DELETED, &deleted_schema()));
    dataset.add_lov("Account", rows(LOV, &lov_schema()));
    dataset
}

pub fn service() -> Arc<dyn RemoteService> {
    Arc::new(RemoteEndpoint::with_clock(
        catalog(),
        dataset(),
        Box::new(FixedClock(ts("2020-01-25 00:00:00"))),
    ))
}

pub fn session_with(pushdown: PushdownConfig) -> MedSession {
    common::testutil::init();
    MedSession::new(MedDataServer::new(catalog(), 0, pushdown), service())
}

/// Default pushdown: enabled, whole filters only.
pub fn session() -> MedSession {
    session_with(PushdownConfig::default())
}

pub fn local_session() -> MedSession {
    session_with(PushdownConfig {
        enabled: false,
        partial_filter_pushdown: false,
    })
}

pub fn partial_session() -> MedSession {
    session_with(PushdownConfig {
        enabled: true,
        partial_filter_pushdown: true,
    })
}

/// First field of every row, as text.
pub fn firsts(rows: &[Tuple]) -> Vec<String> {
    rows.iter()
        .map(|t| t.get_field(0).map(|f| f.to_string()).unwrap_or_default())
        .collect()
}
