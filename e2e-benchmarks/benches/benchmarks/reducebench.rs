use criterion::{black_box, criterion_group, BatchSize, Criterion};

use e2e_benchmarks::{arithmetic_list, predicate_text};
use parser::{parse_expression, to_tree, OperatorTable};

fn bench_reduce_list(c: &mut Criterion) {
    let table = OperatorTable::standard();
    for n in [8, 64, 256].iter() {
        let list = arithmetic_list(&table, *n).unwrap();
        c.bench_function(&format!("reduce_arith_{}", n), |b| {
            b.iter_batched(
                || list.clone(),
                |l| to_tree(black_box(l)),
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_parse_predicate(c: &mut Criterion) {
    for n in [4, 32, 128].iter() {
        let text = predicate_text(*n);
        c.bench_function(&format!("parse_predicate_{}", n), |b| {
            b.iter(|| parse_expression(black_box(&text)))
        });
    }
    let special = "a BETWEEN 1 AND 10 AND b NOT LIKE 'x%' ESCAPE '!' OR c IS NOT NULL";
    c.bench_function("parse_special", |b| {
        b.iter(|| parse_expression(black_box(special)))
    });
}

criterion_group!(reduce_benches, bench_reduce_list, bench_parse_predicate);
