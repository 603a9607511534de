//! Benchmarks for moment-matrix assembly, the scaling-sensitive part of
//! the hierarchy: monomial generation, canonical-class deduplication and
//! problem construction.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use nonlocal_solver_core::{ChshGame, GhzGame, MomentHierarchy};

fn bench_hierarchy_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchy_build");

    for &level in &[1u8, 3] {
        group.bench_with_input(BenchmarkId::new("chsh", level), &level, |b, &level| {
            b.iter(|| MomentHierarchy::new(ChshGame::new(), level).unwrap());
        });
    }

    for &level in &[1u8, 2] {
        group.bench_with_input(BenchmarkId::new("ghz", level), &level, |b, &level| {
            b.iter(|| MomentHierarchy::new(GhzGame::new(), level).unwrap());
        });
    }

    group.finish();
}

fn bench_problem_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("problem_assembly");

    group.bench_function("chsh_level1_with_nash", |b| {
        b.iter(|| {
            let mut hierarchy = MomentHierarchy::new(ChshGame::new(), 1).unwrap();
            hierarchy.set_nash_constraints();
            hierarchy.to_problem()
        });
    });

    group.bench_function("ghz_level2_with_nash", |b| {
        b.iter(|| {
            let mut hierarchy = MomentHierarchy::new(GhzGame::new(), 2).unwrap();
            hierarchy.set_nash_constraints();
            hierarchy.to_problem()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_hierarchy_build, bench_problem_assembly);
criterion_main!(benches);
