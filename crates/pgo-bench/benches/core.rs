use std::hint::black_box;

use divan::{AllocProfiler, Bencher};
use pgo_ast::ModularBlock;
use pgo_bench::{arithmetic_chain, mapped_instances, process_fleet};
use pgo_infer::{DefinitionRegistry, InferOptions, InferenceContext, generate_constraints, solve};

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

#[divan::bench(args = [16, 64, 256])]
fn resolve_names(bencher: Bencher, processes: usize) {
    let block = process_fleet(processes);
    bencher.bench(|| {
        let registry = DefinitionRegistry::from_block(black_box(&block));
        black_box(registry.diagnostics().len())
    });
}

#[divan::bench(args = [16, 64, 256])]
fn generate_process_fleet(bencher: Bencher, processes: usize) {
    let block = process_fleet(processes);
    let registry = DefinitionRegistry::from_block(&block);
    bencher.bench(|| {
        let mut registry = registry.clone();
        let mut ctx = InferenceContext::new();
        let vars = generate_constraints(black_box(&block), &mut registry, &mut ctx);
        black_box((vars.len(), ctx.constraints().len()))
    });
}

#[divan::bench(args = [16, 64, 256])]
fn solve_arithmetic_chain(bencher: Bencher, terms: usize) {
    bench_solve(bencher, &arithmetic_chain(terms));
}

#[divan::bench(args = [16, 64, 256])]
fn solve_process_fleet(bencher: Bencher, processes: usize) {
    bench_solve(bencher, &process_fleet(processes));
}

#[divan::bench(args = [8, 32, 128])]
fn solve_mapped_instances(bencher: Bencher, instances: usize) {
    bench_solve(bencher, &mapped_instances(instances));
}

#[divan::bench(args = [8, 32, 128])]
fn full_pass_mapped_instances(bencher: Bencher, instances: usize) {
    let block = mapped_instances(instances);
    let options = InferOptions::default();
    bencher.bench(|| {
        let mut registry = DefinitionRegistry::from_block(black_box(&block));
        let result = pgo::check_types(&block, &mut registry, &options)
            .unwrap_or_else(|err| panic!("inference failed in benchmark setup: {err}"));
        black_box(result.types.len())
    });
}

/// Solve only: generation runs once outside the measured closure.
fn bench_solve(bencher: Bencher, block: &ModularBlock) {
    let mut registry = DefinitionRegistry::from_block(block);
    let mut ctx = InferenceContext::new();
    let vars = generate_constraints(block, &mut registry, &mut ctx);
    let constraints = ctx.take_constraints();
    let options = InferOptions::default();
    bencher.bench(|| {
        let solution = solve(black_box(constraints.clone()), &options);
        assert!(!solution.has_errors(), "unexpected errors: {:?}", solution.diagnostics);
        black_box(solution.resolve(&vars).types.len())
    });
}
