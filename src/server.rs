//! Framed TCP server executing call graphs against a shared registry.
//!
//! The accept loop hands each connection to its own task; each request on a
//! connection gets an exclusive working [`ValueStore`](crate::slots::ValueStore)
//! and an exclusive engine run, so no request shares mutable core state with
//! another. The
//! registry is shared read-only; host functions guard their own state.
//!
//! Engine runs are synchronous and bounded by the instruction budget, so
//! they execute inline on the connection task. A panicking host function is
//! caught and resolved to a structured internal-fault response; an
//! internal failure never takes the worker (or the process) down with it.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument, warn};

use crate::engine::Engine;
use crate::errors::FaultKind;
use crate::registry::FunctionRegistry;
use crate::wire::{self, DEFAULT_MAX_FRAME, ResponseEnvelope};

/// Listener parameters for a [`Server`].
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to listen on, `host:port`.
    pub bind_addr: String,
    /// Per-frame payload cap.
    pub max_frame: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5300".to_string(),
            max_frame: DEFAULT_MAX_FRAME,
        }
    }
}

impl ServerConfig {
    /// Builds a config from the environment, falling back to defaults.
    ///
    /// Reads `WIREGRAPH_BIND_ADDR`, loading a `.env` file first when one is
    /// present.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("WIREGRAPH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        config
    }
}

/// A server startup failure.
#[derive(Debug, Error, Diagnostic)]
pub enum ServeError {
    /// The listener could not bind.
    #[error("failed to bind {addr}")]
    #[diagnostic(
        code(wiregraph::server::bind),
        help("check that the address is valid and the port is free")
    )]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The bound listener's local address could not be read.
    #[error("failed to read the listener address")]
    #[diagnostic(code(wiregraph::server::local_addr))]
    LocalAddr(#[source] io::Error),
}

/// Server builder: registry plus listener and engine configuration.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    engine: Engine,
    registry: Arc<FunctionRegistry>,
}

impl Server {
    /// A server over `registry` with default configuration.
    #[must_use]
    pub fn new(registry: FunctionRegistry) -> Self {
        Self {
            config: ServerConfig::default(),
            engine: Engine::new(),
            registry: Arc::new(registry),
        }
    }

    /// Replaces the listener configuration.
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the engine (for a different instruction budget).
    #[must_use]
    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    /// Binds the listener without starting the accept loop.
    ///
    /// Useful for binding port 0 and reading the assigned address before
    /// serving.
    pub async fn bind(self) -> Result<BoundServer, ServeError> {
        let listener =
            TcpListener::bind(&self.config.bind_addr)
                .await
                .map_err(|source| ServeError::Bind {
                    addr: self.config.bind_addr.clone(),
                    source,
                })?;
        Ok(BoundServer {
            listener,
            engine: self.engine,
            registry: self.registry,
            max_frame: self.config.max_frame,
        })
    }

    /// Binds and serves until the process is stopped.
    pub async fn serve(self) -> Result<(), ServeError> {
        self.bind().await?.serve().await
    }

    /// Binds and serves until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()>,
    {
        self.bind().await?.serve_with_shutdown(shutdown).await
    }
}

/// A server whose listener is already bound.
#[derive(Debug)]
pub struct BoundServer {
    listener: TcpListener,
    engine: Engine,
    registry: Arc<FunctionRegistry>,
    max_frame: usize,
}

impl BoundServer {
    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServeError> {
        self.listener.local_addr().map_err(ServeError::LocalAddr)
    }

    /// Serves until the process is stopped.
    pub async fn serve(self) -> Result<(), ServeError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves; in-flight connections are dropped.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(%addr, "listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(%addr, "shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let engine = self.engine;
                            let registry = Arc::clone(&self.registry);
                            let max_frame = self.max_frame;
                            tokio::spawn(async move {
                                handle_connection(stream, peer, engine, registry, max_frame).await;
                            });
                        }
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                        }
                    }
                }
            }
        }
    }
}

/// Serves framed requests on one connection until the peer hangs up.
#[instrument(skip_all, fields(%peer))]
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    engine: Engine,
    registry: Arc<FunctionRegistry>,
    max_frame: usize,
) {
    debug!("connection open");
    loop {
        let payload = match wire::read_frame(&mut stream, max_frame).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("connection closed by peer");
                return;
            }
            Err(err) => {
                warn!(error = %err, "read failed");
                return;
            }
        };

        let envelope = process_request(&engine, &registry, &payload);

        let response = match wire::encode_response(&envelope) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(error = %err, "response encode failed");
                return;
            }
        };
        if let Err(err) = wire::write_frame(&mut stream, &response, max_frame).await {
            warn!(error = %err, "write failed");
            return;
        }
    }
}

/// Runs one request to a structured envelope; nothing escapes unhandled.
fn process_request(
    engine: &Engine,
    registry: &FunctionRegistry,
    payload: &[u8],
) -> ResponseEnvelope {
    let (mut store, program) = match wire::decode_request(payload) {
        Ok(parts) => parts,
        Err(err) => {
            warn!(error = %err, "bad request payload");
            return ResponseEnvelope::fault(
                FaultKind::BadRequest.status_code(),
                format!("undecodable request: {err}"),
            );
        }
    };

    let run = catch_unwind(AssertUnwindSafe(|| {
        engine.run(&program, &mut store, registry)
    }));

    match run {
        Ok(Ok(outputs)) => ResponseEnvelope::success(outputs),
        Ok(Err(err)) => {
            debug!(error = %err, "run failed");
            ResponseEnvelope::fault(err.status_code(), err.to_string())
        }
        Err(_) => {
            error!("host function panicked");
            ResponseEnvelope::fault(
                FaultKind::Internal.status_code(),
                "internal fault: host function panicked",
            )
        }
    }
}
