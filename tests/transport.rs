mod common;

use std::net::SocketAddr;

use common::demo_registry;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use wiregraph::builder::{CallBuilder, OutputError};
use wiregraph::client::{Client, ClientConfig};
use wiregraph::engine::Engine;
use wiregraph::errors::FaultKind;
use wiregraph::registry::FunctionRegistry;
use wiregraph::server::{ServeError, Server, ServerConfig};

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), ServeError>>,
}

impl TestServer {
    async fn start(registry: FunctionRegistry) -> Self {
        Self::start_with_engine(registry, Engine::new()).await
    }

    async fn start_with_engine(registry: FunctionRegistry, engine: Engine) -> Self {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        };
        let bound = Server::new(registry)
            .with_config(config)
            .with_engine(engine)
            .bind()
            .await
            .expect("bind test server");
        let addr = bound.local_addr().expect("local addr");

        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(bound.serve_with_shutdown(async {
            let _ = rx.await;
        }));
        Self {
            addr,
            shutdown: Some(tx),
            task,
        }
    }

    fn client(&self) -> Client {
        Client::new(ClientConfig {
            addr: self.addr.to_string(),
            ..ClientConfig::default()
        })
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

#[tokio::test]
async fn composed_call_round_trip() {
    let (registry, _) = demo_registry();
    let server = TestServer::start(registry).await;
    let client = server.client();

    // Seed through one fire-and-forget program.
    let mut b = CallBuilder::new();
    b.invoke("kv/set", ("a", "2000")).unwrap();
    b.invoke("kv/set", ("b", "25")).unwrap();
    client.call(&mut b).await.unwrap();

    // Fetch, parse, and add in a second round trip.
    let mut b = CallBuilder::new();
    let a = b.invoke("kv/get", ("a",)).unwrap();
    let a = b.invoke("math/to_int", (a,)).unwrap();
    let c = b.invoke("kv/get", ("b",)).unwrap();
    let c = b.invoke("math/to_int", (c,)).unwrap();
    let sum = b.invoke("math/add", (a, c)).unwrap();
    let sum = b.bind(sum);
    b.mark_outputs(&[&sum]);
    client.call(&mut b).await.unwrap();

    let sum: i64 = b.read_output(&sum).unwrap();
    assert_eq!(sum, 2025);

    server.stop().await;
}

#[tokio::test]
async fn by_reference_append_over_the_wire() {
    let (registry, table) = demo_registry();
    common::seed_kv(&table, &[("sum", "2025")]);
    let server = TestServer::start(registry).await;
    let client = server.client();

    let mut b = CallBuilder::new();
    let base = b.literal("the sum is ".to_string()).unwrap();
    let suffix = b.invoke("kv/get", ("sum",)).unwrap();
    b.invoke("str/append", (&base, suffix)).unwrap();
    b.mark_outputs(&[&base]);
    client.call(&mut b).await.unwrap();

    let appended: String = b.read_output(&base).unwrap();
    assert_eq!(appended, "the sum is 2025");

    server.stop().await;
}

#[tokio::test]
async fn server_side_loop_runs_to_completion() {
    let (registry, _) = demo_registry();
    let server = TestServer::start(registry).await;
    let client = server.client();

    let mut b = CallBuilder::new();
    let acc = b.literal(0i64).unwrap();
    let limit = b.literal(11i64).unwrap();
    let pending = b.invoke("math/lt", (&acc, &limit)).unwrap();
    let keep_going = b.bind(pending);
    b.while_loop(&keep_going, |b| {
        let next = b.invoke("math/add", (&acc, 2i64))?;
        b.rebind(&acc, next);
        let again = b.invoke("math/lt", (&acc, &limit))?;
        b.rebind(&keep_going, again);
        Ok(())
    })
    .unwrap();
    b.mark_outputs(&[&acc]);
    client.call(&mut b).await.unwrap();

    let acc: i64 = b.read_output(&acc).unwrap();
    assert_eq!(acc, 12);

    server.stop().await;
}

#[tokio::test]
async fn remote_unknown_function_is_a_classified_fault() {
    let (registry, _) = demo_registry();
    let server = TestServer::start(registry).await;
    let client = server.client();

    let mut b = CallBuilder::new();
    let p = b.invoke("no/such_function", ()).unwrap();
    let h = b.bind(p);
    b.mark_outputs(&[&h]);

    let err = client.call(&mut b).await.unwrap_err();
    assert_eq!(err.remote_kind(), Some(FaultKind::FunctionNotFound));

    // A failed call installs no outputs.
    let read = b.read_output::<i64>(&h).unwrap_err();
    assert!(matches!(read, OutputError::NotCompleted));

    server.stop().await;
}

#[tokio::test]
async fn remote_budget_exhaustion_is_a_classified_fault() {
    let (registry, _) = demo_registry();
    let server = TestServer::start_with_engine(registry, Engine::new().with_max_steps(10)).await;
    let client = server.client();

    let mut b = CallBuilder::new();
    let cond = b.literal(true).unwrap();
    b.while_loop(&cond, |_| Ok(())).unwrap();

    let err = client.call(&mut b).await.unwrap_err();
    assert_eq!(err.remote_kind(), Some(FaultKind::ExecutionLimitExceeded));

    server.stop().await;
}

#[tokio::test]
async fn panicking_host_function_yields_internal_fault() {
    let mut registry = FunctionRegistry::new();
    registry
        .register("util/explode", || -> i64 { panic!("boom") })
        .unwrap();
    let server = TestServer::start(registry).await;
    let client = server.client();

    // First request panics server-side but the worker answers structurally.
    let mut b = CallBuilder::new();
    b.invoke("util/explode", ()).unwrap();
    let err = client.call(&mut b).await.unwrap_err();
    assert_eq!(err.remote_kind(), Some(FaultKind::Internal));

    // The server is still alive for the next request.
    let mut b = CallBuilder::new();
    let x = b.literal(7i64).unwrap();
    b.mark_outputs(&[&x]);
    client.call(&mut b).await.unwrap();
    assert_eq!(b.read_output::<i64>(&x).unwrap(), 7);

    server.stop().await;
}

#[tokio::test]
async fn unrequested_slots_stay_out_of_the_response() {
    let (registry, _) = demo_registry();
    let server = TestServer::start(registry).await;
    let client = server.client();

    let mut b = CallBuilder::new();
    let wanted = b.literal(1i64).unwrap();
    let unwanted = b.literal(2i64).unwrap();
    b.mark_outputs(&[&wanted]);
    client.call(&mut b).await.unwrap();

    assert_eq!(b.read_output::<i64>(&wanted).unwrap(), 1);
    let err = b.read_output::<i64>(&unwanted).unwrap_err();
    assert!(matches!(err, OutputError::SlotNotFound { .. }));

    server.stop().await;
}
