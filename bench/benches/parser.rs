use criterion::{criterion_group, criterion_main, Criterion};
use funwap::parser::parse_program;
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/big.funwap");

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("parser", |b| {
        b.iter(|| {
            let program = parse_program(black_box(INPUT)).unwrap();
            black_box(program.functions.len());
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
