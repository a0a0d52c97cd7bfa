use criterion::criterion_main;

mod benchmarks;

criterion_main! {
    benchmarks::reducebench::reduce_benches,
    benchmarks::planbench::plan_benches,
}
