use ferrous_singleton::{
    ArgTuple, Arity, InheritancePolicy, SingletonEngine, SingletonError, TypeRef, TypeSpec,
};
use std::sync::Arc;

fn counter(engine: &SingletonEngine) -> TypeRef {
    engine
        .define_singleton(
            TypeSpec::new("Counter").init(Arity::Positional(1), |ctx, args| {
                ctx.set("value", args.int(0)?);
                Ok(())
            }),
            InheritancePolicy::NonDerivable,
        )
        .unwrap()
}

#[test]
fn counter_scenario() {
    let engine = SingletonEngine::new();
    let counter = counter(&engine);

    let first = engine.construct(&counter, [0]).unwrap();
    assert_eq!(first.get_int("value"), Some(0));

    match engine.construct(&counter, [5]) {
        Err(err @ SingletonError::StaleArguments { .. }) => {
            assert_eq!(err.stored_arguments(), Some(&ArgTuple::new([0])));
            assert!(err.to_string().contains("stored arguments: (0)"));
        }
        other => panic!("Expected StaleArguments, got {:?}", other),
    }

    // Cached instance is untouched and still served
    let again = engine.construct(&counter, [0]).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(again.get_int("value"), Some(0));
}

#[test]
fn base_child_scenario() {
    let engine = SingletonEngine::new();
    let base = engine
        .define_singleton(TypeSpec::new("Base"), InheritancePolicy::SingletonChildren)
        .unwrap();
    let child = engine.declare(TypeSpec::new("Child").base(&base)).unwrap();

    let b1 = engine.construct(&base, ()).unwrap();
    let b2 = engine.construct(&base, ()).unwrap();
    let c1 = engine.construct(&child, ()).unwrap();
    let c2 = engine.construct(&child, ()).unwrap();

    assert!(Arc::ptr_eq(&b1, &b2));
    assert!(Arc::ptr_eq(&c1, &c2));
    assert!(!Arc::ptr_eq(&b1, &c1));
    assert_eq!(c1.type_name(), "Child");
    assert!(c1.is_instance_of(&base));
    assert!(!b1.is_instance_of(&child));
}

#[test]
fn non_derivable_rejects_any_child() {
    let engine = SingletonEngine::new();
    let base = engine
        .define_singleton(TypeSpec::new("Sealed"), InheritancePolicy::NonDerivable)
        .unwrap();

    let attempts = vec![
        TypeSpec::new("Empty").base(&base),
        TypeSpec::new("WithInit").base(&base).init(Arity::Nullary, |_, _| Ok(())),
        TypeSpec::new("WithAlloc").base(&base).alloc(Arity::Nullary, |ctx, _| Ok(ctx.blank())),
    ];
    for spec in attempts {
        match engine.declare(spec) {
            Err(err @ SingletonError::InvalidBaseType(_)) => {
                assert_eq!(err.to_string(), "type 'Sealed' is not an acceptable base type");
                assert!(err.is_declaration_error());
            }
            other => panic!("Expected InvalidBaseType, got {:?}", other),
        }
    }

    // Nothing partial was published
    assert_eq!(engine.type_descriptors().len(), 1);
}

#[test]
fn non_singleton_children_construct_fresh_instances() {
    let engine = SingletonEngine::new();
    let base = engine
        .define_singleton(
            TypeSpec::new("Base").init(Arity::Nullary, |ctx, _| {
                ctx.set("val", 3);
                Ok(())
            }),
            InheritancePolicy::NonSingletonChildren,
        )
        .unwrap();
    let child = engine.declare(TypeSpec::new("Child").base(&base)).unwrap();

    let a = engine.construct(&base, ()).unwrap();
    let a2 = engine.construct(&base, ()).unwrap();
    assert!(Arc::ptr_eq(&a, &a2));

    let b = engine.construct(&child, ()).unwrap();
    let b2 = engine.construct(&child, ()).unwrap();
    assert!(!Arc::ptr_eq(&b, &b2));
    assert_eq!(b.get_int("val"), Some(3));
    assert!(!child.is_singleton());
    assert!(!child.cache().already_created());
}

#[test]
fn child_of_derivable_singleton_can_be_wrapped() {
    let engine = SingletonEngine::new();
    let base = engine
        .define_singleton(TypeSpec::new("Base"), InheritancePolicy::NonSingletonChildren)
        .unwrap();
    let child = engine.declare(TypeSpec::new("OtherChild").base(&base)).unwrap();
    let wrapped = engine.wrap_type(&child, InheritancePolicy::NonDerivable).unwrap();

    let b = engine.construct(&wrapped, ()).unwrap();
    let b2 = engine.construct(&wrapped, ()).unwrap();
    assert!(Arc::ptr_eq(&b, &b2));
}

#[test]
fn plain_types_are_not_cached() {
    let engine = SingletonEngine::new();
    let plain = engine.declare(TypeSpec::new("Plain")).unwrap();

    let a = engine.construct(&plain, [1]).unwrap();
    let b = engine.construct(&plain, [2]).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(plain.policy().is_none());
}

#[test]
fn equal_keyword_arguments_hit_the_cache() {
    let engine = SingletonEngine::new();
    let ty = engine
        .define_singleton(TypeSpec::new("Keyed"), InheritancePolicy::NonDerivable)
        .unwrap();

    let args = ArgTuple::new([1]).with_keyword("mode", "fast");
    let first = engine.construct(&ty, args.clone()).unwrap();
    let second = engine.construct(&ty, args).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let different = ArgTuple::new([1]).with_keyword("mode", "slow");
    assert!(matches!(
        engine.construct(&ty, different),
        Err(SingletonError::StaleArguments { .. })
    ));
}

#[test]
fn redeclaration_gets_a_fresh_cache() {
    let engine = SingletonEngine::new();
    let first = counter(&engine);
    let old = engine.construct(&first, [1]).unwrap();

    let second = counter(&engine);
    let new = engine.construct(&second, [2]).unwrap();

    assert!(!Arc::ptr_eq(&old, &new));
    assert!(Arc::ptr_eq(&engine.lookup_type("Counter").unwrap(), &second));
    // The old descriptor keeps its own populated cache
    assert!(Arc::ptr_eq(&engine.construct(&first, [1]).unwrap(), &old));
}
