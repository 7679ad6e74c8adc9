//! Derivation chains, split allocation/initialization overrides and
//! multiple bases.

use ferrous_singleton::{
    Arity, InheritancePolicy, SingletonEngine, SingletonError, TypeRef, TypeSpec, WrapOptions,
};
use std::sync::Arc;

/// Base whose allocation sets `val0` and whose initialization sets `val`.
fn split_base(engine: &SingletonEngine, policy: InheritancePolicy) -> TypeRef {
    engine
        .define_singleton(
            TypeSpec::new("SplitBase")
                .alloc(Arity::Positional(1), |ctx, args| {
                    let obj = ctx.blank();
                    obj.set("val0", args.int(0)?);
                    Ok(obj)
                })
                .init(Arity::Positional(2), |ctx, args| {
                    ctx.set("val", args.int(1)?);
                    Ok(())
                }),
            policy,
        )
        .unwrap()
}

#[test]
fn split_steps_go_through_the_cache() {
    for policy in [InheritancePolicy::NonDerivable, InheritancePolicy::NonSingletonChildren] {
        let engine = SingletonEngine::new();
        let base = split_base(&engine, policy);

        let a = engine.construct(&base, [1, 13]).unwrap();
        assert_eq!((a.get_int("val0"), a.get_int("val")), (Some(1), Some(13)));

        let a2 = engine.construct(&base, [1, 13]).unwrap();
        assert!(Arc::ptr_eq(&a, &a2));
    }
}

#[test]
fn child_alloc_chaining_to_base_alloc_stays_uncached() {
    let engine = SingletonEngine::new();
    let base = split_base(&engine, InheritancePolicy::NonSingletonChildren);
    let populated = engine.construct(&base, [1, 13]).unwrap();

    let child = engine
        .declare(
            TypeSpec::new("Child")
                .base(&base)
                .alloc(Arity::Positional(2), |ctx, args| {
                    let obj = ctx.base_alloc(args)?;
                    obj.set("val0", 2);
                    obj.set("val", 3);
                    Ok(obj)
                })
                .init(Arity::Positional(2), |_, _| Ok(())),
        )
        .unwrap();

    let b = engine.construct(&child, [3, 5]).unwrap();
    assert_eq!((b.get_int("val0"), b.get_int("val")), (Some(2), Some(3)));
    assert_eq!(b.type_name(), "Child");

    let b2 = engine.construct(&child, [3, 5]).unwrap();
    assert!(!Arc::ptr_eq(&b, &b2));

    // The base cache was neither consulted nor mutated
    assert!(Arc::ptr_eq(&base.cache().instance().unwrap(), &populated));
    assert_eq!(populated.get_int("val0"), Some(1));
}

#[test]
fn child_alloc_using_blank_allocator() {
    let engine = SingletonEngine::new();
    let base = split_base(&engine, InheritancePolicy::NonSingletonChildren);
    let child = engine
        .declare(
            TypeSpec::new("Child")
                .base(&base)
                .alloc(Arity::Nullary, |ctx, _| {
                    let obj = ctx.blank();
                    obj.set("val0", 2);
                    obj.set("val", 3);
                    Ok(obj)
                })
                .init(Arity::Nullary, |_, _| Ok(())),
        )
        .unwrap();

    let b = engine.construct(&child, [3, 5]).unwrap();
    assert_eq!((b.get_int("val0"), b.get_int("val")), (Some(2), Some(3)));
    assert!(!Arc::ptr_eq(&b, &engine.construct(&child, [3, 5]).unwrap()));
}

#[test]
fn singleton_child_overriding_only_alloc_inherits_init() {
    let engine = SingletonEngine::new();
    let base = split_base(&engine, InheritancePolicy::SingletonChildren);
    let child = engine
        .declare(TypeSpec::new("Child").base(&base).alloc(Arity::Variadic, |ctx, args| {
            let obj = ctx.base_alloc(args)?;
            obj.set("z", 99);
            Ok(obj)
        }))
        .unwrap();

    let c = engine.construct(&child, [7, 8]).unwrap();
    assert_eq!(c.get_int("val0"), Some(7));
    assert_eq!(c.get_int("val"), Some(8));
    assert_eq!(c.get_int("z"), Some(99));
    assert!(Arc::ptr_eq(&c, &engine.construct(&child, [7, 8]).unwrap()));
    assert!(!base.cache().already_created());
}

#[test]
fn grandchildren_follow_the_inherited_rule() {
    let engine = SingletonEngine::new();

    let singleton_root = engine
        .define_singleton(TypeSpec::new("Root"), InheritancePolicy::SingletonChildren)
        .unwrap();
    let child = engine.declare(TypeSpec::new("Child").base(&singleton_root)).unwrap();
    let grandchild = engine.declare(TypeSpec::new("Grandchild").base(&child)).unwrap();
    assert_eq!(grandchild.policy(), Some(InheritancePolicy::SingletonChildren));

    let g1 = engine.construct(&grandchild, ()).unwrap();
    let g2 = engine.construct(&grandchild, ()).unwrap();
    let c1 = engine.construct(&child, ()).unwrap();
    assert!(Arc::ptr_eq(&g1, &g2));
    assert!(!Arc::ptr_eq(&g1, &c1));

    let plain_root = engine
        .define_singleton(TypeSpec::new("PlainRoot"), InheritancePolicy::NonSingletonChildren)
        .unwrap();
    let plain_child = engine.declare(TypeSpec::new("PlainChild").base(&plain_root)).unwrap();
    let plain_grandchild = engine
        .declare(TypeSpec::new("PlainGrandchild").base(&plain_child))
        .unwrap();
    assert!(!Arc::ptr_eq(
        &engine.construct(&plain_grandchild, ()).unwrap(),
        &engine.construct(&plain_grandchild, ()).unwrap()
    ));
}

#[test]
fn double_wrapping_requires_override() {
    let engine = SingletonEngine::new();
    let wrapped = engine
        .define_singleton(TypeSpec::new("Twice"), InheritancePolicy::SingletonChildren)
        .unwrap();

    match engine.wrap_type(&wrapped, InheritancePolicy::SingletonChildren) {
        Err(SingletonError::DoubleWrapping { type_name, existing }) => {
            assert_eq!(type_name, "Twice");
            assert_eq!(existing, InheritancePolicy::SingletonChildren);
        }
        other => panic!("Expected DoubleWrapping, got {:?}", other),
    }

    let rewrapped = engine
        .wrap_type_with(
            &wrapped,
            InheritancePolicy::NonSingletonChildren,
            WrapOptions::new().with_rewrap(),
        )
        .unwrap();
    let child = engine.declare(TypeSpec::new("Child").base(&rewrapped)).unwrap();
    assert!(!child.is_singleton());

    // Each layer keeps an independent cache
    let outer = engine.construct(&rewrapped, ()).unwrap();
    let inner = engine.construct(&wrapped, ()).unwrap();
    assert!(!Arc::ptr_eq(&outer, &inner));
}

#[test]
fn wrapping_non_derivable_fails_even_with_override() {
    let engine = SingletonEngine::new();
    let sealed = engine
        .define_singleton(TypeSpec::new("Sealed"), InheritancePolicy::NonDerivable)
        .unwrap();

    for options in [WrapOptions::new(), WrapOptions::new().with_rewrap()] {
        assert!(matches!(
            engine.wrap_type_with(&sealed, InheritancePolicy::SingletonChildren, options),
            Err(SingletonError::InvalidBaseType(name)) if name == "Sealed"
        ));
    }
}

#[test]
fn multiple_bases_must_agree() {
    let engine = SingletonEngine::new();
    let singles = engine
        .define_singleton(TypeSpec::new("Singles"), InheritancePolicy::SingletonChildren)
        .unwrap();
    let fresh = engine
        .define_singleton(TypeSpec::new("Fresh"), InheritancePolicy::NonSingletonChildren)
        .unwrap();
    let plain = engine.declare(TypeSpec::new("Mixin")).unwrap();

    match engine.declare(TypeSpec::new("Both").base(&singles).base(&fresh)) {
        Err(err @ SingletonError::ConflictingBasePolicies { .. }) => {
            assert!(err.is_declaration_error());
            assert_eq!(
                err.to_string(),
                "bases of 'Both' carry conflicting policies: Singles (SingletonChildren), Fresh (NonSingletonChildren)"
            );
        }
        other => panic!("Expected ConflictingBasePolicies, got {:?}", other),
    }
    assert!(engine.lookup_type("Both").is_none());

    // A policy-free mixin does not conflict
    let mixed = engine
        .declare(TypeSpec::new("Mixed").base(&plain).base(&singles))
        .unwrap();
    assert!(mixed.is_singleton());
    assert!(mixed.is_subtype_of(&plain));
    assert!(mixed.is_subtype_of(&singles));

    let agreeing = engine
        .declare(TypeSpec::new("Agreeing").base(&singles).base(&mixed))
        .unwrap();
    assert_eq!(agreeing.policy(), Some(InheritancePolicy::SingletonChildren));
}

#[test]
fn non_derivable_among_multiple_bases_fails() {
    let engine = SingletonEngine::new();
    let plain = engine.declare(TypeSpec::new("Mixin")).unwrap();
    let sealed = engine
        .define_singleton(TypeSpec::new("Sealed"), InheritancePolicy::NonDerivable)
        .unwrap();

    assert!(matches!(
        engine.declare(TypeSpec::new("Sneaky").base(&plain).base(&sealed)),
        Err(SingletonError::InvalidBaseType(name)) if name == "Sealed"
    ));
}

#[test]
fn steps_come_from_the_first_base() {
    let engine = SingletonEngine::new();
    let left = engine
        .declare(TypeSpec::new("Left").init(Arity::Nullary, |ctx, _| {
            ctx.set("side", "left");
            Ok(())
        }))
        .unwrap();
    let right = engine
        .declare(TypeSpec::new("Right").init(Arity::Nullary, |ctx, _| {
            ctx.set("side", "right");
            Ok(())
        }))
        .unwrap();

    let leaf = engine
        .declare(TypeSpec::new("Leaf").base(&left).base(&right))
        .unwrap();
    let obj = engine.construct(&leaf, ()).unwrap();
    assert_eq!(obj.get_str("side").as_deref(), Some("left"));
}
