//! Demo server: a small key-value store plus arithmetic helpers.
//!
//! Run with `cargo run --example kv_server`, then drive it with
//! `cargo run --example kv_client`. Host functions that touch shared state
//! guard it themselves; the core performs no locking on their behalf.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;
use wiregraph::registry::{FunctionRegistry, Ref};
use wiregraph::server::{Server, ServerConfig};

fn build_registry() -> Result<FunctionRegistry, Box<dyn std::error::Error>> {
    let table: Arc<Mutex<HashMap<String, String>>> = Arc::default();
    let next_id = Arc::new(AtomicU64::new(0));
    let mut registry = FunctionRegistry::new();

    let kv = table.clone();
    registry.register("kv/set", move |key: String, value: String| {
        info!(%key, %value, "kv/set");
        kv.lock().expect("kv table poisoned").insert(key, value);
    })?;

    let kv = table.clone();
    registry.register("kv/get", move |key: String| -> String {
        info!(%key, "kv/get");
        kv.lock()
            .expect("kv table poisoned")
            .get(&key)
            .cloned()
            .unwrap_or_default()
    })?;

    let kv = table.clone();
    registry.register("kv/del", move |key: String| {
        info!(%key, "kv/del");
        kv.lock().expect("kv table poisoned").remove(&key);
    })?;

    registry.register("math/to_int", |s: String| -> i64 {
        info!(%s, "math/to_int");
        s.parse().unwrap_or(0)
    })?;

    registry.register("math/add", |a: i64, b: i64| -> i64 {
        info!(a, b, "math/add");
        a + b
    })?;

    registry.register("math/to_string", |x: i64| -> String {
        info!(x, "math/to_string");
        x.to_string()
    })?;

    registry.register("math/lt", |a: i64, b: i64| -> bool {
        info!(a, b, "math/lt");
        a < b
    })?;

    registry.register("str/append", |base: Ref<String>, suffix: String| {
        info!(base = %base.borrow(), %suffix, "str/append");
        base.borrow_mut().push_str(&suffix);
    })?;

    registry.register("util/next_id", move || -> u64 {
        let id = next_id.fetch_add(1, Ordering::Relaxed);
        info!(id, "util/next_id");
        id
    })?;

    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    wiregraph::telemetry::init();

    let registry = build_registry()?;
    let server = Server::new(registry).with_config(ServerConfig::from_env());

    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
