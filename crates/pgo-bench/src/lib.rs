//! Synthetic algorithms for benchmarking the inference core.
//!
//! Each builder scales one dimension the solver is sensitive to: the number
//! of pending alternatives, the number of processes, or the number of
//! instances wired to a single archetype through mapping macros.

use pgo_ast::build::AstBuilder;
use pgo_ast::{BinOp, ModularBlock, Processes};

/// `x = 0 + 1 + ... + terms`. Every `+` contributes one alternative, and
/// none is forced until the default commits the first.
pub fn arithmetic_chain(terms: usize) -> ModularBlock {
    let mut b = AstBuilder::new();
    let mut expr = b.int(0);
    for n in 1..=terms.max(1) {
        let rhs = b.int(n as i64);
        expr = b.binary(BinOp::Add, expr, rhs);
    }
    let x = b.var_eq("x", expr);
    ModularBlock {
        name: "ArithmeticChain".into(),
        variables: vec![x],
        ..ModularBlock::default()
    }
}

/// `count` processes `P0 \in 1..3`, `P1 \in 1..3`, ... each incrementing a
/// shared global and comparing it against its own identity.
pub fn process_fleet(count: usize) -> ModularBlock {
    let mut b = AstBuilder::new();
    let zero = b.int(0);
    let counter = b.var_eq("counter", zero);
    let processes = (0..count.max(1))
        .map(|i| {
            let range = b.range(1, 3);
            let name = b.var_in(&format!("P{i}"), range);
            let step = b.int(1);
            let local = b.var_eq("step", step);

            let current = b.ident("counter");
            let step = b.ident("step");
            let next = b.binary(BinOp::Add, current, step);
            let increment = b.assign_var("counter", next);
            let current = b.ident("counter");
            let me = b.ident("self");
            let ahead = b.binary(BinOp::Gt, current, me);
            let wait = b.await_stmt(ahead);
            let body = vec![b.labeled("inc", vec![increment, wait])];
            b.process(name, vec![local], body)
        })
        .collect();
    ModularBlock {
        name: "ProcessFleet".into(),
        variables: vec![counter],
        processes: Processes::Multi(processes),
        ..ModularBlock::default()
    }
}

/// One archetype `Worker(ref queue)` and `count` instances, each mapping
/// its own global through the `Identity` macro.
pub fn mapped_instances(count: usize) -> ModularBlock {
    let mut b = AstBuilder::new();

    let param = b.param("queue", true);
    let queue = b.ident("queue");
    let one = b.int(1);
    let next = b.binary(BinOp::Add, queue, one);
    let body = vec![b.assign_var("queue", next)];
    let archetype = b.archetype("Worker", vec![param], vec![], body);

    let variable = b.ident("$variable");
    let read_body = vec![b.yield_stmt(variable)];
    let value = b.ident("$value");
    let write_body = vec![b.yield_stmt(value)];
    let identity = b.mapping_macro("Identity", read_body, write_body);

    let mut variables = Vec::new();
    let mut instances = Vec::new();
    for i in 0..count.max(1) {
        let global = format!("q{i}");
        let zero = b.int(0);
        variables.push(b.var_eq(&global, zero));
        let id = b.int(i as i64);
        let name = b.var_eq(&format!("W{i}"), id);
        let arg = b.reference(&global);
        let mapping = b.mapping(&global, "Identity");
        instances.push(b.instance(name, "Worker", vec![arg], vec![mapping]));
    }

    ModularBlock {
        name: "MappedInstances".into(),
        variables,
        archetypes: vec![archetype],
        mapping_macros: vec![identity],
        instances,
        ..ModularBlock::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgo_infer::{DefinitionRegistry, InferOptions};

    #[test]
    fn fixtures_infer_without_errors() {
        for block in [arithmetic_chain(8), process_fleet(4), mapped_instances(4)] {
            let mut registry = DefinitionRegistry::from_block(&block);
            let result = pgo::infer_types(&block, &mut registry, &InferOptions::default());
            assert!(
                result.diagnostics.is_empty(),
                "{}: {:?}",
                block.name,
                result.diagnostics
            );
        }
    }
}
