#![no_main]

use ferrous_singleton::{
    ArgTuple, ArgumentMismatch, Arity, InheritancePolicy, SingletonEngine, SingletonError, TypeSpec,
    ObjectRef, WrapOptions,
};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fn tuple(bytes: &[u8]) -> ArgTuple {
    let mut args: ArgTuple = bytes.iter().take(3).map(|b| i64::from(*b)).collect();
    if let Some(flag) = bytes.get(3) {
        if flag % 2 == 0 {
            args = args.with_keyword("flag", *flag as i64);
        }
    }
    args
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let policy = InheritancePolicy::from_flags(data[0] & 1 == 1, data[0] & 2 == 2);
    let mode = if data[0] & 4 == 4 {
        ArgumentMismatch::Permissive
    } else {
        ArgumentMismatch::Strict
    };

    let engine = SingletonEngine::new();
    let plain = engine
        .declare(TypeSpec::new("Fuzzed").init(Arity::Positional(1), |ctx, args| {
            if let Some(first) = args.get(0) {
                ctx.set("first", first.clone());
            }
            Ok(())
        }))
        .unwrap();
    let ty = engine
        .wrap_type_with(&plain, policy, WrapOptions::new().with_argument_mismatch(mode))
        .unwrap();

    // Remaining bytes are split into successive argument tuples
    let mut first: Option<(ArgTuple, ObjectRef)> = None;
    for chunk in data[1..].chunks(4) {
        let args = tuple(chunk);
        let result = engine.construct(&ty, args.clone());

        let Some((stored, original)) = &first else {
            match result {
                Ok(obj) => first = Some((args, obj)),
                Err(err) => panic!("first construction failed: {}", err),
            }
            continue;
        };

        match result {
            Ok(obj) => {
                assert!(Arc::ptr_eq(original, &obj));
                assert!(stored == &args || mode == ArgumentMismatch::Permissive);
            }
            Err(SingletonError::StaleArguments { stored: reported, .. }) => {
                assert_eq!(mode, ArgumentMismatch::Strict);
                assert_eq!(stored, &reported);
                assert!(stored != &args);
            }
            Err(err) => panic!("unexpected error: {}", err),
        }
    }

    assert_eq!(ty.cache().already_created(), first.is_some());
});
