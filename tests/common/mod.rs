#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use wiregraph::registry::{FunctionRegistry, Ref};

pub type KvTable = Arc<Mutex<HashMap<String, String>>>;

/// The demo registry: a shared key-value table plus arithmetic and string
/// helpers. Returns the table handle so tests can seed and inspect it.
pub fn demo_registry() -> (FunctionRegistry, KvTable) {
    let table: KvTable = Arc::default();
    let next_id = Arc::new(AtomicU64::new(0));
    let mut registry = FunctionRegistry::new();

    let kv = table.clone();
    registry
        .register("kv/set", move |key: String, value: String| {
            kv.lock().expect("kv table poisoned").insert(key, value);
        })
        .expect("register kv/set");

    let kv = table.clone();
    registry
        .register("kv/get", move |key: String| -> String {
            kv.lock()
                .expect("kv table poisoned")
                .get(&key)
                .cloned()
                .unwrap_or_default()
        })
        .expect("register kv/get");

    let kv = table.clone();
    registry
        .register("kv/del", move |key: String| {
            kv.lock().expect("kv table poisoned").remove(&key);
        })
        .expect("register kv/del");

    registry
        .register("math/to_int", |s: String| -> i64 { s.parse().unwrap_or(0) })
        .expect("register math/to_int");

    registry
        .register("math/add", |a: i64, b: i64| -> i64 { a + b })
        .expect("register math/add");

    registry
        .register("math/to_string", |x: i64| -> String { x.to_string() })
        .expect("register math/to_string");

    registry
        .register("math/lt", |a: i64, b: i64| -> bool { a < b })
        .expect("register math/lt");

    registry
        .register("str/append", |base: Ref<String>, suffix: String| {
            base.borrow_mut().push_str(&suffix);
        })
        .expect("register str/append");

    registry
        .register("util/next_id", move || -> u64 {
            next_id.fetch_add(1, Ordering::Relaxed)
        })
        .expect("register util/next_id");

    (registry, table)
}

/// Seeds the table behind a `demo_registry`.
pub fn seed_kv(table: &KvTable, entries: &[(&str, &str)]) {
    let mut guard = table.lock().expect("kv table poisoned");
    for (key, value) in entries {
        guard.insert((*key).to_string(), (*value).to_string());
    }
}
