//! Declaration blocks against an in-memory dispatcher.

use opdecl_core::{
    DeclarationError, DispatchKey, Dispatcher, Kernel, LibraryKind, OperatorName, RegistryConfig,
    dispatch, library, library_fragment, library_impl,
};
use opdecl_dispatch::RegistryError;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

fn registry() -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new())
}

/// Replace the `file:line` part of a block context so snapshots stay stable.
fn redact_location(message: &str) -> String {
    match message.rfind(" block at ") {
        Some(at) => format!("{} block at <location>)", &message[..at]),
        None => message.to_string(),
    }
}

#[test]
fn definition_block_stamps_namespace_on_schema() {
    let registry = registry();
    let mut m = library!(registry.clone(), "myops").expect("library opens");
    let name = m
        .define(opdecl_schema::parse_schema("add(Tensor a, Tensor b) -> Tensor").unwrap())
        .expect("definition accepted");

    assert_eq!(name, OperatorName::new("myops::add", ""));
    let schema = registry.schema(&name).expect("schema registered");
    assert_eq!(schema.to_string(), "myops::add(Tensor a, Tensor b) -> Tensor");
}

#[test]
fn explicit_namespace_in_schema_is_rejected() {
    let registry = registry();
    let mut m = library!(registry.clone(), "myops").expect("library opens");

    let err = m
        .def("myops::add(Tensor a, Tensor b) -> Tensor")
        .err()
        .expect("redundant namespace rejected");
    assert!(matches!(err, DeclarationError::RedundantSchemaNamespace { .. }));
    insta::assert_snapshot!(
        redact_location(&err.to_string()),
        @r#"def("myops::add"): Redundant definition of namespace (myops) in both schema and the enclosing library! block.  Delete the namespace from your schema string.  (Error occurred while processing library! block at <location>)"#
    );

    let err = m
        .def("otherops::mul(Tensor a, Tensor b) -> Tensor")
        .err()
        .expect("foreign namespace rejected");
    insta::assert_snapshot!(
        redact_location(&err.to_string()),
        @r#"def("otherops::mul"): Invalid explicit namespace (otherops) in schema string.  Move this definition to the (unique) library! block for this namespace and delete the namespace from your schema string.  (Error occurred while processing library! block at <location>)"#
    );
    assert!(registry.snapshot().operators.is_empty());
}

#[test]
fn implementation_block_stamps_namespace_and_key() {
    let registry = registry();
    let mut m = library!(registry.clone(), "myops").expect("library opens");
    m.def("add(int a, int b) -> int").expect("definition accepted");

    let mut cpu = library_impl!(registry.clone(), "myops", DispatchKey::CPU).expect("impl opens");
    cpu.implement("add", Kernel::from_fn(|a: i64, b: i64| a + b))
        .expect("impl accepted");

    let name = OperatorName::new("myops::add", "");
    let kernel = registry
        .kernel(&name, Some(DispatchKey::CPU))
        .expect("kernel registered under CPU");
    let mut stack = vec![serde_json::json!(2), serde_json::json!(40)];
    kernel.call(&name, &mut stack).expect("kernel runs");
    assert_eq!(stack, vec![serde_json::json!(42)]);

    let err = cpu
        .implement("myops::add", Kernel::from_fn(|a: i64, b: i64| a + b))
        .err()
        .expect("redundant namespace rejected");
    assert!(matches!(
        err,
        DeclarationError::RedundantNameNamespace { ref namespace, .. } if namespace == "myops"
    ));
    insta::assert_snapshot!(
        redact_location(&err.to_string()),
        @r#"impl("myops::add", ...): Redundant definition of namespace (myops) in both operator name and the enclosing library_impl! block.  Delete the namespace from your operator name.  (Error occurred while processing library_impl! block at <location>)"#
    );

    let err = cpu
        .implement("otherops::add", Kernel::fallthrough())
        .err()
        .expect("foreign namespace rejected");
    assert!(matches!(
        err,
        DeclarationError::NameNamespaceMismatch { ref namespace, .. } if namespace == "otherops"
    ));
}

#[test]
fn def_with_bare_name_uses_inferred_schema() {
    let registry = registry();
    let mut m = library!(registry.clone(), "myops").expect("library opens");
    m.def_with("scale", Kernel::from_fn(|x: f64, k: f64| x * k))
        .expect("definition with kernel accepted");

    let name = OperatorName::new("myops::scale", "");
    let schema = registry.schema(&name).expect("schema registered");
    assert_eq!(schema.to_string(), "myops::scale(float _0, float _1) -> float");
    assert_eq!(
        schema.alias_analysis(),
        opdecl_core::AliasAnalysisKind::Conservative
    );
    assert!(registry.kernel(&name, None).is_some());

    let err = m
        .def_with("opaque", Kernel::fallthrough())
        .err()
        .expect("bare name without inferable kernel rejected");
    insta::assert_snapshot!(
        redact_location(&err.to_string()),
        @r#"def("opaque"): Full schema string was not specified, and we couldn't infer schema either.  Please explicitly provide a schema string.  (Error occurred while processing library! block at <location>)"#
    );
}

#[test]
fn def_with_kernel_key_registers_under_that_key() {
    let registry = registry();
    let mut m = library!(registry.clone(), "myops").expect("library opens");
    m.def_with(
        "neg(int a) -> int",
        dispatch(DispatchKey::CUDA, Kernel::from_fn(|a: i64| -a)),
    )
    .expect("definition with kernel accepted");

    let name = OperatorName::new("myops::neg", "");
    assert!(registry.kernel(&name, Some(DispatchKey::CUDA)).is_some());
    assert!(registry.kernel(&name, None).is_none());
}

#[test]
fn second_definition_block_for_namespace_fails_but_fragments_coexist() {
    let registry = registry();
    let _first = library!(registry.clone(), "myops").expect("first library opens");
    let err = library!(registry.clone(), "myops").expect_err("second library rejected");
    assert!(matches!(
        err,
        DeclarationError::Registry(RegistryError::DuplicateNamespace { ref namespace, .. })
            if namespace == "myops"
    ));

    let mut a = library_fragment!(registry.clone(), "extra").expect("fragment opens");
    let mut b = library_fragment!(registry.clone(), "extra").expect("fragment opens");
    a.def("one() -> int").expect("fragment def accepted");
    b.def("two() -> int").expect("fragment def accepted");
    assert!(registry.schema(&OperatorName::new("extra::one", "")).is_some());
    assert!(registry.schema(&OperatorName::new("extra::two", "")).is_some());
    assert!(!registry.has_namespace("extra"));
}

#[test]
fn inferred_and_spelled_out_definitions_merge() {
    let registry = registry();
    let mut a = library_fragment!(registry.clone(), "myops").expect("fragment opens");
    let mut b = library_fragment!(registry.clone(), "myops").expect("fragment opens");
    a.def_with("id", Kernel::from_fn(|x: i64| x))
        .expect("inferred definition accepted");
    b.def("id(int _0) -> int")
        .expect("identical definition merges");

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.operators[0].name, "myops::id");
    assert_eq!(snapshot.operators[0].definitions, 2);

    drop(a);
    assert!(registry.schema(&OperatorName::new("myops::id", "")).is_some());
    drop(b);
    assert_eq!(registry.registration_count(), 0);
}

#[test]
fn definitions_with_different_alias_kinds_conflict() {
    let registry = registry();
    let mut a = library_fragment!(registry.clone(), "myops").expect("fragment opens");
    let mut b = library_fragment!(registry.clone(), "myops").expect("fragment opens");
    let mut pure = opdecl_schema::parse_schema("id(int _0) -> int").unwrap();
    pure.set_alias_analysis(opdecl_core::AliasAnalysisKind::PureFunction);
    a.define(pure).expect("definition accepted");
    let err = b
        .def("id(int _0) -> int")
        .err()
        .expect("different alias kind rejected");
    assert!(matches!(
        err,
        DeclarationError::Registry(RegistryError::ConflictingDefinition { .. })
    ));
}

#[test]
fn definition_blocks_reject_wildcard_namespace() {
    let registry = registry();
    let err = library!(registry.clone(), "_").expect_err("wildcard library rejected");
    insta::assert_snapshot!(
        redact_location(&err.to_string()),
        @"library!: cannot define library! with the wildcard namespace _ (every library! defines operators for a distinct namespace!) Did you mean to use library_impl! instead?  (Error occurred while processing library! block at <location>)"
    );

    let err = library_fragment!(registry.clone(), "_").expect_err("wildcard fragment rejected");
    assert!(matches!(
        err,
        DeclarationError::WildcardNamespace {
            kind: LibraryKind::Fragment,
            ..
        }
    ));
    assert!(registry.snapshot().is_empty());
}

#[test]
fn def_inside_implementation_block_is_wrong_block_kind() {
    let registry = registry();
    let mut cpu = library_impl!(registry.clone(), "myops", DispatchKey::CPU).expect("impl opens");
    let err = cpu
        .def("add(Tensor a, Tensor b) -> Tensor")
        .err()
        .expect("def in impl block rejected");
    assert!(err.is_wrong_block_kind());
    insta::assert_snapshot!(
        redact_location(&err.to_string()),
        @r#"def("add"): Cannot define an operator inside of a library_impl! block.  All def()s should be placed in the (unique) library! block for their namespace.  (Error occurred while processing library_impl! block at <location>)"#
    );
}

#[test]
fn kernel_and_block_dispatch_keys_must_agree() {
    let registry = registry();
    let mut cpu = library_impl!(registry.clone(), "myops", DispatchKey::CPU).expect("impl opens");

    let err = cpu
        .implement("add", dispatch(DispatchKey::CUDA, Kernel::fallthrough()))
        .err()
        .expect("conflicting keys rejected");
    assert!(matches!(
        err,
        DeclarationError::DispatchKeyConflict {
            kernel_key: DispatchKey::CUDA,
            block_key: DispatchKey::CPU,
            ..
        }
    ));

    cpu.implement("add", dispatch(DispatchKey::CPU, Kernel::fallthrough()))
        .expect("matching keys accepted");
    cpu.implement("sub", Kernel::fallthrough())
        .expect("kernel without key takes the block key");

    let mut any = library_impl!(registry.clone(), "myops").expect("impl opens");
    any.implement("mul", dispatch(DispatchKey::XLA, Kernel::fallthrough()))
        .expect("block without key takes the kernel key");

    assert!(
        registry
            .kernel(&OperatorName::new("myops::sub", ""), Some(DispatchKey::CPU))
            .is_some()
    );
    assert!(
        registry
            .kernel(&OperatorName::new("myops::mul", ""), Some(DispatchKey::XLA))
            .is_some()
    );
}

#[test]
fn fallbacks_are_global_per_dispatch_key() {
    let registry = registry();

    let mut scoped = library_impl!(registry.clone(), "myops", DispatchKey::Autocast).expect("impl opens");
    let err = scoped
        .fallback(Kernel::fallthrough())
        .err()
        .expect("namespaced fallback rejected");
    assert_eq!(
        redact_location(&err.to_string()),
        "fallback(...): Fallback functions which apply to only a single namespace (you specified myops) \
         are not supported.  If you intended to apply this fallback function globally, please define a \
         separate block:\n\n    library_impl!(registry, \"_\", DispatchKey::Autocast)?.fallback(...)?;\n\n\
         (Error occurred while processing library_impl! block at <location>)"
    );

    let mut m = library!(registry.clone(), "myops").expect("library opens");
    let err = m
        .fallback(dispatch(DispatchKey::CPU, Kernel::fallthrough()))
        .err()
        .expect("fallback in definition block rejected");
    assert!(err.is_wrong_block_kind());

    let mut global = library_impl!(registry.clone(), "_", DispatchKey::Autocast).expect("impl opens");
    global
        .fallback(Kernel::fallthrough())
        .expect("global fallback accepted");
    let mut keyed = library_impl!(registry.clone(), "_").expect("impl opens");
    keyed
        .fallback(dispatch(DispatchKey::Batched, Kernel::fallthrough()))
        .expect("fallback keyed by kernel accepted");

    assert!(registry.fallback(DispatchKey::Autocast).is_some());
    assert!(registry.fallback(DispatchKey::Batched).is_some());
}

#[test]
fn dropping_blocks_restores_prior_registry_state() {
    let registry = registry();
    let before = registry.state_digest();
    {
        let mut m = library!(registry.clone(), "myops").expect("library opens");
        m.def("add(int a, int b) -> int")
            .and_then(|m| m.def_with("neg", Kernel::from_fn(|a: i64| -a)))
            .expect("definitions accepted");
        let mut cpu = library_impl!(registry.clone(), "myops", DispatchKey::CPU).expect("impl opens");
        cpu.implement("add", Kernel::from_fn(|a: i64, b: i64| a + b))
            .expect("impl accepted");
        let mut global = library_impl!(registry.clone(), "_", DispatchKey::Tracer).expect("impl opens");
        global
            .fallback(Kernel::fallthrough())
            .expect("fallback accepted");

        assert_ne!(registry.state_digest(), before);
        assert!(registry.has_namespace("myops"));
    }
    assert_eq!(registry.registration_count(), 0);
    assert_eq!(registry.state_digest(), before);
}

#[test]
fn failed_declaration_keeps_earlier_registrations() {
    let registry = registry();
    let mut m = library!(registry.clone(), "myops").expect("library opens");
    m.def("add(int a, int b) -> int").expect("definition accepted");
    let count = m.registration_count();

    assert!(m.def("add(float a, float b) -> float").is_err());
    assert_eq!(m.registration_count(), count);
    assert!(registry.schema(&OperatorName::new("myops::add", "")).is_some());
}

#[test]
fn stripped_labels_leave_no_locations_in_snapshot() {
    let config = RegistryConfig::from_toml_str("strip_debug_labels = true").expect("config parses");
    let registry = Arc::new(Dispatcher::with_config(config));
    let mut m = library!(registry.clone(), "myops").expect("library opens");
    m.def_with("id", Kernel::from_fn(|a: i64| a).debug("identity"))
        .expect("definition accepted");

    let snapshot = registry.snapshot();
    assert!(snapshot.namespaces.iter().all(|row| row.debug.is_empty()));
    assert!(
        snapshot
            .operators
            .iter()
            .flat_map(|op| &op.kernels)
            .all(|kernel| kernel.debug.is_empty())
    );
}

#[test]
fn kernel_note_replaces_location_label() {
    let registry = registry();
    let mut m = library!(registry.clone(), "myops").expect("library opens");
    m.def_with("id", Kernel::from_fn(|a: i64| a).debug("identity kernel"))
        .expect("definition accepted");

    let snapshot = registry.snapshot();
    assert!(snapshot.namespaces[0].debug.starts_with("registered at "));
    assert_eq!(snapshot.operators[0].kernels[0].debug, "identity kernel");
}

#[test]
fn dropping_a_block_whose_kernel_owns_another_block_does_not_deadlock() {
    let registry = registry();
    let before = registry.state_digest();

    let mut inner = library_fragment!(registry.clone(), "inner").expect("fragment opens");
    inner.def("noop() -> ()").expect("definition accepted");
    let inner = Mutex::new(inner);

    let mut outer = library!(registry.clone(), "outer").expect("library opens");
    outer
        .def_with(
            "run() -> ()",
            Kernel::boxed(move |_, _| {
                let _inner = inner.lock();
                Ok(())
            }),
        )
        .expect("definition with kernel accepted");
    assert_eq!(registry.snapshot().operators.len(), 2);

    let (done, finished) = mpsc::channel();
    thread::spawn(move || {
        drop(outer);
        done.send(()).expect("receiver is alive");
    });
    finished
        .recv_timeout(Duration::from_secs(5))
        .expect("dropping the outer block should not deadlock");

    assert_eq!(registry.registration_count(), 0);
    assert_eq!(registry.state_digest(), before);
}
