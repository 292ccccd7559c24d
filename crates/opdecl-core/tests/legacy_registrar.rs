//! Batch registration through `RegisterOperators`.

use opdecl_core::{
    AliasAnalysisKind, DeclarationError, DispatchKey, Dispatcher, Kernel, OperatorName, Options,
    RegisterOperators,
};
use std::sync::Arc;

fn registry() -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new())
}

#[test]
fn bare_name_without_inferable_kernel_names_the_operator() {
    let registry = registry();
    let mut registrar = RegisterOperators::new(registry.clone());
    let err = registrar
        .op(
            Options::new()
                .schema("legacy::opaque")
                .unwrap()
                .catch_all_kernel(Kernel::fallthrough()),
        )
        .err()
        .expect("schema cannot be inferred");
    assert!(err.is_schema_inference());
    insta::assert_snapshot!(
        err.to_string(),
        @"Cannot infer operator schema for this kind of kernel in registration of operator legacy::opaque. Please explicitly specify the operator schema or specify at least one kernel for which we can infer the schema."
    );
    assert!(registry.snapshot().is_empty());
}

#[test]
fn bare_name_takes_first_inferred_schema() {
    let registry = registry();
    let mut registrar = RegisterOperators::new(registry.clone());
    registrar
        .op(
            Options::new()
                .schema("legacy::add.int")
                .unwrap()
                .kernel(DispatchKey::CPU, Kernel::from_fn(|a: i64, b: i64| a + b))
                .kernel(DispatchKey::CUDA, Kernel::fallthrough()),
        )
        .expect("registration accepted");

    let name = OperatorName::new("legacy::add", "int");
    let schema = registry.schema(&name).expect("schema registered");
    assert_eq!(schema.to_string(), "legacy::add.int(int _0, int _1) -> int");
    assert!(registry.kernel(&name, Some(DispatchKey::CPU)).is_some());
    assert!(registry.kernel(&name, Some(DispatchKey::CUDA)).is_some());
    assert_eq!(registrar.registration_count(), 3);
}

#[test]
fn inferred_schema_refuses_from_schema_alias_analysis() {
    let registry = registry();
    let mut registrar = RegisterOperators::new(registry.clone());
    let err = registrar
        .op(
            Options::new()
                .schema("legacy::neg")
                .unwrap()
                .catch_all_kernel(Kernel::from_fn(|a: i64| -a))
                .alias_analysis(AliasAnalysisKind::FromSchema),
        )
        .err()
        .expect("FROM_SCHEMA with inferred schema rejected");
    insta::assert_snapshot!(
        err.to_string(),
        @"In operator registration: Tried to register operator legacy::neg(int _0) -> int with AliasAnalysisKind::FROM_SCHEMA, but the schema is inferred."
    );
}

#[test]
fn explicit_schema_keeps_alias_analysis_override() {
    let registry = registry();
    let mut registrar = RegisterOperators::new(registry.clone());
    registrar
        .op(
            Options::new()
                .schema("legacy::relu(Tensor self) -> Tensor")
                .unwrap()
                .catch_all_kernel(Kernel::fallthrough())
                .alias_analysis(AliasAnalysisKind::PureFunction),
        )
        .expect("registration accepted");

    let schema = registry
        .schema(&OperatorName::new("legacy::relu", ""))
        .expect("schema registered");
    assert_eq!(schema.alias_analysis(), AliasAnalysisKind::PureFunction);
}

#[test]
fn duplicate_kernels_are_rejected_before_registration() {
    let registry = registry();
    let mut registrar = RegisterOperators::new(registry.clone());
    let err = registrar
        .op(
            Options::new()
                .schema("legacy::mul(Tensor a, Tensor b) -> Tensor")
                .unwrap()
                .kernel(DispatchKey::CPU, Kernel::fallthrough())
                .kernel(DispatchKey::CPU, Kernel::fallthrough()),
        )
        .err()
        .expect("duplicate key rejected");
    assert_eq!(
        err,
        DeclarationError::DuplicateKernel {
            dispatch_key: DispatchKey::CPU,
            schema: "legacy::mul(Tensor a, Tensor b) -> Tensor".to_string(),
        }
    );
    assert!(registry.snapshot().is_empty());

    let err = registrar
        .op(
            Options::new()
                .schema("legacy::mul")
                .unwrap()
                .catch_all_kernel(Kernel::from_fn(|a: f64, b: f64| a * b))
                .catch_all_kernel(Kernel::fallthrough()),
        )
        .err()
        .expect("second catch-all rejected");
    insta::assert_snapshot!(
        err.to_string(),
        @"In operator registration: Tried to register multiple catch-all kernels for operator schema legacy::mul(float _0, float _1) -> float"
    );
}

#[test]
fn dropping_registrar_revokes_everything() {
    let registry = registry();
    let before = registry.state_digest();
    {
        let mut registrar = RegisterOperators::new(registry.clone());
        registrar
            .op_with("legacy::sq(int a) -> int", Kernel::from_fn(|a: i64| a * a))
            .and_then(|registrar| {
                registrar.op_with(
                    "legacy::cube",
                    Kernel::from_fn(|a: i64| a * a * a).dispatch_key(DispatchKey::CPU),
                )
            })
            .expect("registrations accepted");
        assert_eq!(registry.registration_count(), 4);
    }
    assert_eq!(registry.state_digest(), before);
}

#[test]
fn legacy_and_block_definitions_merge_when_identical() {
    let registry = registry();
    let mut registrar = RegisterOperators::new(registry.clone());
    registrar
        .op_with("legacy::abs(int a) -> int", Kernel::from_fn(|a: i64| a.abs()))
        .expect("legacy registration accepted");

    let mut m = opdecl_core::library_fragment!(registry.clone(), "legacy").expect("fragment opens");
    m.def("abs(int a) -> int").expect("identical definition merges");

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.operators.len(), 1);
    assert_eq!(snapshot.operators[0].definitions, 2);

    drop(registrar);
    assert!(registry.schema(&OperatorName::new("legacy::abs", "")).is_some());
}
