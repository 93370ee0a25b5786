mod common;

use common::demo_registry;
use wiregraph::codec;
use wiregraph::errors::EngineError;
use wiregraph::registry::{FunctionRegistry, RegistryError};
use wiregraph::slots::{SlotId, ValueStore};

#[test]
fn registration_rejects_invalid_names() {
    let mut registry = FunctionRegistry::new();
    for bad in ["", "kv get", "kv.get", "kv-get"] {
        let err = registry.register(bad, || 0i64).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName { .. }), "{bad:?}");
    }
    assert!(registry.is_empty());
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut registry = FunctionRegistry::new();
    registry.register("math/add", |a: i64, b: i64| a + b).unwrap();

    let err = registry
        .register("math/add", |a: i64, b: i64| a * b)
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateRegistration { .. }));
    assert_eq!(registry.len(), 1);
}

#[test]
fn unregister_frees_the_name() {
    let mut registry = FunctionRegistry::new();
    registry.register("util/once", || 1i64).unwrap();

    assert!(registry.unregister("util/once"));
    assert!(!registry.unregister("util/once"));
    assert!(!registry.contains("util/once"));

    // The name is reusable after removal.
    registry.register("util/once", || 2i64).unwrap();
    assert!(registry.contains("util/once"));
}

#[test]
fn invoking_an_unregistered_name_fails() {
    let registry = FunctionRegistry::new();
    let mut store = ValueStore::new();

    let err = registry.invoke("no/such", &mut store, &[]).unwrap_err();
    assert!(matches!(err, EngineError::FunctionNotFound { .. }));
}

#[test]
fn arity_mismatch_is_a_decode_failure() {
    let (registry, _) = demo_registry();

    let mut store = ValueStore::new();
    let a = SlotId::FIRST;
    store.insert(a, codec::encode(&1i64).unwrap());

    let err = registry.invoke("math/add", &mut store, &[a]).unwrap_err();
    assert!(matches!(err, EngineError::Decode { .. }));
}

#[test]
fn direct_invoke_decodes_calls_and_encodes() {
    let (registry, _) = demo_registry();

    let mut store = ValueStore::new();
    let a = SlotId::FIRST;
    let b = a.next();
    store.insert(a, codec::encode(&2000i64).unwrap());
    store.insert(b, codec::encode(&25i64).unwrap());

    let result = registry.invoke("math/add", &mut store, &[a, b]).unwrap();
    assert_eq!(codec::decode::<i64>(&result).unwrap(), 2025);
}

#[test]
fn reference_parameters_write_back_to_their_slot() {
    let (registry, _) = demo_registry();

    let mut store = ValueStore::new();
    let base = SlotId::FIRST;
    let suffix = base.next();
    store.insert(base, codec::encode(&"the sum is ".to_string()).unwrap());
    store.insert(suffix, codec::encode(&"2025".to_string()).unwrap());

    registry
        .invoke("str/append", &mut store, &[base, suffix])
        .unwrap();

    let appended: String = codec::decode(store.get(base).unwrap()).unwrap();
    assert_eq!(appended, "the sum is 2025");
    // The immutable parameter's slot is untouched.
    let untouched: String = codec::decode(store.get(suffix).unwrap()).unwrap();
    assert_eq!(untouched, "2025");
}

#[test]
fn void_functions_return_decodable_unit() {
    let (registry, _) = demo_registry();

    let mut store = ValueStore::new();
    let key = SlotId::FIRST;
    let value = key.next();
    store.insert(key, codec::encode(&"k".to_string()).unwrap());
    store.insert(value, codec::encode(&"v".to_string()).unwrap());

    let result = registry.invoke("kv/set", &mut store, &[key, value]).unwrap();
    codec::decode::<()>(&result).unwrap();
}

#[test]
fn nullary_functions_take_no_arguments() {
    let (registry, _) = demo_registry();
    let mut store = ValueStore::new();

    let first = registry.invoke("util/next_id", &mut store, &[]).unwrap();
    let second = registry.invoke("util/next_id", &mut store, &[]).unwrap();
    assert_eq!(codec::decode::<u64>(&first).unwrap(), 0);
    assert_eq!(codec::decode::<u64>(&second).unwrap(), 1);
}

#[test]
fn malformed_argument_bytes_fail_decode() {
    let (registry, _) = demo_registry();

    let mut store = ValueStore::new();
    let a = SlotId::FIRST;
    let b = a.next();
    store.insert(a, codec::encode(&"seven".to_string()).unwrap());
    store.insert(b, codec::encode(&1i64).unwrap());

    let err = registry.invoke("math/add", &mut store, &[a, b]).unwrap_err();
    assert!(matches!(err, EngineError::Decode { .. }));
}
