use criterion::{black_box, criterion_group, Criterion};

use common::catalog::MemCatalog;
use common::config::PushdownConfig;
use common::testutil::*;
use common::{RelNode, RexNode, RexOp};
use e2e_benchmarks::opportunity_tree;
use optimizer::{MedDataServer, Planner};

fn server(pushdown: PushdownConfig) -> MedDataServer<MemCatalog> {
    MedDataServer::new(
        MemCatalog::new(vec![account_object(), opportunity_object()]),
        0,
        pushdown,
    )
}

fn bench_plan(c: &mut Criterion, name: &str, planner: &Planner, rel: &RelNode) {
    c.bench_function(name, |b| b.iter(|| planner.optimize(black_box(rel.clone()))));
}

fn bench_pushdown(c: &mut Criterion) {
    let pushed = server(PushdownConfig::default()).planner();
    let local = server(PushdownConfig {
        enabled: false,
        partial_filter_pushdown: false,
    })
    .planner();
    for terms in [1, 16].iter() {
        let rel = opportunity_tree(*terms).unwrap();
        bench_plan(c, &format!("plan_pushdown_{}", terms), &pushed, &rel);
        bench_plan(c, &format!("plan_local_{}", terms), &local, &rel);
    }
}

fn bench_partial(c: &mut Criterion) {
    let planner = server(PushdownConfig {
        enabled: true,
        partial_filter_pushdown: true,
    })
    .planner();
    // UPPER cannot be printed, so only the comparisons are pushed.
    let scan = object_scan(&opportunity_object());
    let unprintable = call2(
        RexOp::Eq,
        RexNode::call(RexOp::Upper, vec![RexNode::input_ref(1)]),
        string_lit("PILOT"),
    );
    let condition = RexNode::and(vec![
        cmp(2, RexOp::Gt, decimal_lit("100.00")),
        unprintable,
        cmp(7, RexOp::Lt, int_lit(10)),
    ])
    .expect("three terms");
    let rel = RelNode::filter(scan, condition);
    bench_plan(c, "plan_partial", &planner, &rel);
}

criterion_group!(plan_benches, bench_pushdown, bench_partial);
