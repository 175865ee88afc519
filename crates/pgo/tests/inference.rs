use pgo::{DefinitionRegistry, InferError, InferOptions, check_types, infer_types};
use pgo_ast::build::AstBuilder;
use pgo_ast::{BinOp, ModularBlock, NodeId, Processes};
use pgo_diag::Category;
use pgo_types::{GoType, Origins, Type};

fn int() -> Type {
    Type::int(Origins::none())
}

fn string() -> Type {
    Type::string(Origins::none())
}

fn check(block: &ModularBlock) -> (Result<pgo::InferenceResult, InferError>, DefinitionRegistry) {
    let mut registry = DefinitionRegistry::from_block(block);
    let result = check_types(block, &mut registry, &InferOptions::default());
    (result, registry)
}

fn categories(err: &InferError) -> Vec<Category> {
    err.diagnostics().iter().map(|d| d.category).collect()
}

/// `variables x = {1, 2, 3};`
fn set_global() -> (ModularBlock, NodeId) {
    let mut b = AstBuilder::new();
    let elems = vec![b.int(1), b.int(2), b.int(3)];
    let value = b.set(elems);
    let x = b.var_eq("x", value);
    let x_id = x.id;
    let block = ModularBlock {
        name: "SetGlobal".into(),
        variables: vec![x],
        ..ModularBlock::default()
    };
    (block, x_id)
}

#[test]
fn set_literal_global_resolves_and_is_written_back() {
    let (block, x_id) = set_global();
    let (result, registry) = check(&block);
    let result = result.unwrap();
    assert_eq!(
        result.type_of(x_id),
        Some(&Type::set(int(), Origins::none()))
    );
    assert_eq!(
        registry.global_variable_type(x_id),
        Some(&GoType::Slice {
            elem: Box::new(GoType::Int)
        })
    );
}

#[test]
fn process_identities_are_independent() {
    let mut b = AstBuilder::new();
    let range = b.range(1, 3);
    let p = b.var_in("P", range);
    let names = vec![b.string("a"), b.string("b")];
    let names = b.set(names);
    let q = b.var_in("Q", names);
    let (p_id, q_id) = (p.id, q.id);
    let p_body = vec![b.skip()];
    let q_body = vec![b.skip()];
    let processes = vec![b.process(p, vec![], p_body), b.process(q, vec![], q_body)];
    let block = ModularBlock {
        processes: Processes::Multi(processes),
        ..ModularBlock::default()
    };
    let (result, _) = check(&block);
    let result = result.unwrap();
    assert_eq!(result.type_of(p_id), Some(&int()));
    assert_eq!(result.type_of(q_id), Some(&string()));
}

/// `procedure Foo(x) { l: print x; return; }` called once per argument list.
fn foo_calls(args: &[&str]) -> (ModularBlock, NodeId) {
    let mut b = AstBuilder::new();
    let x = b.var("x");
    let x_id = x.id;
    let print_x = b.ident("x");
    let stmts = vec![b.print(print_x), b.ret()];
    let body = vec![b.labeled("l", stmts)];
    let foo = b.procedure("Foo", vec![x], vec![], body);
    let calls = args
        .iter()
        .map(|arg| {
            let arg = match arg.parse::<i64>() {
                Ok(n) => b.int(n),
                Err(_) => b.string(arg),
            };
            b.call("Foo", vec![arg])
        })
        .collect();
    let block = ModularBlock {
        procedures: vec![foo],
        processes: Processes::Single(calls),
        ..ModularBlock::default()
    };
    (block, x_id)
}

#[test]
fn procedure_parameter_takes_type_of_argument() {
    let (block, x_id) = foo_calls(&["1"]);
    let (result, _) = check(&block);
    assert_eq!(result.unwrap().type_of(x_id), Some(&int()));
}

#[test]
fn procedure_called_with_int_and_string_conflicts() {
    let (block, _) = foo_calls(&["1", "s"]);
    let err = check(&block).0.unwrap_err();
    assert_eq!(categories(&err), vec![Category::TypeMismatch]);
    assert!(err.to_string().contains("call of procedure `Foo`"));
}

/// `queue = 0`; archetype `A(ref q)` computes `q + 1`; macro `M` yields
/// `$variable > 0` on reads; `Inst = 1` instantiates `A(ref queue)` with
/// `queue` mapped through `M`.
#[test]
fn boolean_mapping_macro_conflicts_with_integer_global() {
    let mut b = AstBuilder::new();
    let zero = b.int(0);
    let queue = b.var_eq("queue", zero);
    let queue_id = queue.id;

    let param = b.param("q", true);
    let q = b.ident("q");
    let one = b.int(1);
    let next = b.binary(BinOp::Add, q, one);
    let body = vec![b.assign_var("q", next)];
    let archetype = b.archetype("A", vec![param], vec![], body);

    let variable = b.ident("$variable");
    let zero = b.int(0);
    let positive = b.binary(BinOp::Gt, variable, zero);
    let read_body = vec![b.yield_stmt(positive)];
    let value = b.ident("$value");
    let write_body = vec![b.yield_stmt(value)];
    let mapping_macro = b.mapping_macro("M", read_body, write_body);

    let id = b.int(1);
    let name = b.var_eq("Inst", id);
    let arg = b.reference("queue");
    let mapping = b.mapping("queue", "M");
    let instance = b.instance(name, "A", vec![arg], vec![mapping]);

    let block = ModularBlock {
        variables: vec![queue],
        archetypes: vec![archetype],
        mapping_macros: vec![mapping_macro],
        instances: vec![instance],
        ..ModularBlock::default()
    };
    let (result, registry) = check(&block);
    let err = result.unwrap_err();
    assert!(categories(&err).contains(&Category::TypeMismatch));
    assert!(err.to_string().contains("mapping macro `M` reads values of type `Bool`"));
    assert!(registry.global_variable_type(queue_id).is_none());
}

/// As above, but `queue` has no initializer: only `q + 1` makes it an
/// integer, and the macro reads `$variable = TRUE`.
#[test]
fn arithmetic_alone_fixes_mapped_global_against_boolean_macro() {
    let mut b = AstBuilder::new();
    let queue = b.var("queue");

    let param = b.param("q", true);
    let q = b.ident("q");
    let one = b.int(1);
    let next = b.binary(BinOp::Add, q, one);
    let body = vec![b.assign_var("q", next)];
    let archetype = b.archetype("A", vec![param], vec![], body);

    let variable = b.ident("$variable");
    let t = b.boolean(true);
    let is_set = b.binary(BinOp::Eq, variable, t);
    let read_body = vec![b.yield_stmt(is_set)];
    let value = b.ident("$value");
    let write_body = vec![b.yield_stmt(value)];
    let mapping_macro = b.mapping_macro("M", read_body, write_body);

    let id = b.int(1);
    let name = b.var_eq("Inst", id);
    let arg = b.reference("queue");
    let mapping = b.mapping("queue", "M");
    let instance = b.instance(name, "A", vec![arg], vec![mapping]);

    let block = ModularBlock {
        variables: vec![queue],
        archetypes: vec![archetype],
        mapping_macros: vec![mapping_macro],
        instances: vec![instance],
        ..ModularBlock::default()
    };
    let err = check(&block).0.unwrap_err();
    let categories = categories(&err);
    assert!(!categories.is_empty());
    assert!(categories.iter().all(|c| *c == Category::TypeMismatch), "{err}");
    assert!(err.to_string().contains(
        "mapping macro `M` reads values of type `Bool`, but the mapped variable has type `Int`"
    ));
}

#[test]
fn archetype_self_defaults_to_int() {
    let mut b = AstBuilder::new();
    let self_use = b.ident("self");
    let one = b.int(1);
    let sum = b.binary(BinOp::Add, self_use, one);
    let local = b.var_eq("next", sum);
    let body = vec![b.skip()];
    let archetype = b.archetype("A", vec![], vec![local], body);
    let self_id = archetype.self_id;
    let block = ModularBlock {
        archetypes: vec![archetype],
        ..ModularBlock::default()
    };
    let (result, _) = check(&block);
    assert_eq!(result.unwrap().type_of(self_id), Some(&int()));
}

#[test]
fn inference_is_deterministic() {
    let (block, _) = foo_calls(&["1", "2", "3"]);
    let first = check(&block).0.unwrap();
    let second = check(&block).0.unwrap();
    assert_eq!(first.types, second.types);
    let first = serde_json::to_string(&first.report()).unwrap();
    let second = serde_json::to_string(&second.report()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn fully_initialized_algorithm_types_every_node() {
    let mut b = AstBuilder::new();
    let range = b.range(1, 4);
    let i = b.var_in("i", range);
    let total = b.int(0);
    let total = b.var_eq("total", total);
    let total_use = b.ident("total");
    let i_use = b.ident("i");
    let sum = b.binary(BinOp::Add, total_use, i_use);
    let add = b.assign_var("total", sum);
    let total_use = b.ident("total");
    let ten = b.int(10);
    let cond = b.binary(BinOp::Lt, total_use, ten);
    let body = vec![b.while_stmt(cond, vec![add])];
    let block = ModularBlock {
        variables: vec![i, total],
        processes: Processes::Single(body),
        ..ModularBlock::default()
    };
    let result = check(&block).0.unwrap();
    assert!(result.diagnostics.is_empty());
    assert!(result.types.values().all(|ty| !ty.contains_vars()));
    assert!(result.types.values().all(|ty| !ty.contains_unresolved()));
}

#[test]
fn best_effort_mapping_survives_errors() {
    let mut b = AstBuilder::new();
    let seven = b.int(7);
    let y = b.var_eq("y", seven);
    let y_id = y.id;
    let cond = b.boolean(true);
    let one = b.int(1);
    let s = b.string("s");
    let branches = b.if_expr(cond, one, s);
    let z = b.var_eq("z", branches);
    let block = ModularBlock {
        variables: vec![y, z],
        ..ModularBlock::default()
    };
    let mut registry = DefinitionRegistry::from_block(&block);
    let result = infer_types(&block, &mut registry, &InferOptions::default());
    assert!(result.has_errors());
    assert_eq!(result.type_of(y_id), Some(&int()));
    assert!(registry.global_variable_type(y_id).is_none());
}

#[test]
fn report_serializes_types_and_diagnostics() {
    let (block, x_id) = set_global();
    let mut registry = DefinitionRegistry::from_block(&block);
    let result = infer_types(&block, &mut registry, &InferOptions::default());
    let json = serde_json::to_value(result.report()).unwrap();
    assert_eq!(json["types"][x_id.0.to_string()], "Set(Int)");
    assert_eq!(json["diagnostics"], serde_json::json!([]));
    assert!(json.get("gen_trace").is_none());
}

#[test]
fn tracing_records_generation_and_unification() {
    let (block, _) = set_global();
    let options: InferOptions =
        serde_json::from_str(r#"{ "tracing": true, "type_var_prefix": "tv" }"#).unwrap();
    let mut registry = DefinitionRegistry::from_block(&block);
    let result = infer_types(&block, &mut registry, &options);
    assert!(!result.gen_trace.is_empty());
    assert!(!result.unify_trace.is_empty());
    let json = serde_json::to_value(result.report()).unwrap();
    assert_eq!(json["gen_trace"][0]["rule"], "literal");
    assert_eq!(json["gen_trace"][0]["type"], "Int");
    assert!(
        result
            .unify_trace
            .iter()
            .any(|step| step.detail.starts_with("tv0 := "))
    );
}

#[test]
fn mismatch_diagnostic_renders_with_node_locations() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let s = b.string("s");
    let value = b.set(vec![one, s]);
    let x = b.var_eq("x", value);
    let block = ModularBlock {
        variables: vec![x],
        ..ModularBlock::default()
    };
    let err = check(&block).0.unwrap_err();
    insta::assert_snapshot!(err.to_string(), @r"
    type inference failed:
      - error[E0001]: set elements have different types: `Int` vs `String`
      --> node #1
      note: node #0: expected `Int` inferred here
      help: all elements of a set must share one type
    ");
}
