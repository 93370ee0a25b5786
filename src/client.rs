//! Framed TCP client for executing call graphs remotely.
//!
//! One [`Client::call`] is one round trip: the builder's seeded store,
//! program, and output selection travel as a single framed request; the
//! response's output mapping is installed back into the builder so
//! [`read_output`](crate::builder::CallBuilder::read_output) becomes valid.
//!
//! Transport failures ([`CallError::Transport`], [`CallError::Timeout`])
//! are a separate class from remote engine faults ([`CallError::Remote`]):
//! the former mean the conversation broke, the latter mean the server
//! executed (some of) the program and reported a structured failure.

use std::io;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::builder::CallBuilder;
use crate::codec::CodecError;
use crate::errors::FaultKind;
use crate::wire::{self, DEFAULT_MAX_FRAME, STATUS_OK};

/// Connection parameters for a [`Client`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server address, `host:port`.
    pub addr: String,
    /// Limit on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Limit on the full request/response exchange; `None` waits
    /// indefinitely (the server's own instruction budget still bounds the
    /// engine run).
    pub call_timeout: Option<Duration>,
    /// Per-frame payload cap.
    pub max_frame: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5300".to_string(),
            connect_timeout: Duration::from_secs(10),
            call_timeout: Some(Duration::from_secs(30)),
            max_frame: DEFAULT_MAX_FRAME,
        }
    }
}

impl ClientConfig {
    /// Builds a config from the environment, falling back to defaults.
    ///
    /// Reads `WIREGRAPH_ADDR`, `WIREGRAPH_CONNECT_TIMEOUT_MS`, and
    /// `WIREGRAPH_CALL_TIMEOUT_MS` (0 disables the call timeout), loading a
    /// `.env` file first when one is present.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("WIREGRAPH_ADDR") {
            config.addr = addr;
        }
        if let Some(ms) = env_millis("WIREGRAPH_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_millis("WIREGRAPH_CALL_TIMEOUT_MS") {
            config.call_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        config
    }
}

fn env_millis(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}

/// A client-side call failure.
#[derive(Debug, Error, Diagnostic)]
pub enum CallError {
    /// The connection could not be established or broke mid-exchange.
    #[error("transport error: {0}")]
    #[diagnostic(code(wiregraph::client::transport))]
    Transport(#[from] io::Error),

    /// A configured timeout elapsed.
    #[error("timed out while {phase}")]
    #[diagnostic(code(wiregraph::client::timeout))]
    Timeout { phase: &'static str },

    /// A payload failed to encode or decode locally.
    #[error(transparent)]
    #[diagnostic(code(wiregraph::client::codec))]
    Codec(#[from] CodecError),

    /// The server reported a structured engine fault.
    #[error("remote fault (status {code}): {message}")]
    #[diagnostic(
        code(wiregraph::client::remote),
        help("the program was rejected or failed server-side; no outputs were produced")
    )]
    Remote { code: u32, message: String },

    /// The server closed the connection without responding.
    #[error("connection closed before a response arrived")]
    #[diagnostic(code(wiregraph::client::closed))]
    ConnectionClosed,
}

impl CallError {
    /// The classified fault kind for [`Remote`](Self::Remote) failures,
    /// `None` for transport-level ones.
    #[must_use]
    pub fn remote_kind(&self) -> Option<FaultKind> {
        match self {
            CallError::Remote { code, .. } => FaultKind::from_status(*code),
            _ => None,
        }
    }
}

/// Framed TCP client. One connection per call.
#[derive(Clone, Debug, Default)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    /// A client with the given configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Executes the builder's call graph on the server.
    ///
    /// On success the response outputs are installed into `builder`, making
    /// [`read_output`](CallBuilder::read_output) valid for the marked
    /// handles.
    ///
    /// # Errors
    ///
    /// [`CallError::Remote`] when the server reports an engine fault (the
    /// builder then carries no outputs); transport-class variants otherwise.
    #[instrument(skip_all, fields(addr = %self.config.addr))]
    pub async fn call(&self, builder: &mut CallBuilder) -> Result<(), CallError> {
        let payload = wire::encode_request(
            builder.seed(),
            builder.instructions(),
            builder.output_slots(),
        )?;

        let mut stream = timeout(self.config.connect_timeout, TcpStream::connect(&self.config.addr))
            .await
            .map_err(|_| CallError::Timeout { phase: "connecting" })??;

        let exchange = async {
            wire::write_frame(&mut stream, &payload, self.config.max_frame).await?;
            wire::read_frame(&mut stream, self.config.max_frame).await
        };
        let frame = match self.config.call_timeout {
            Some(limit) => timeout(limit, exchange)
                .await
                .map_err(|_| CallError::Timeout { phase: "awaiting response" })??,
            None => exchange.await?,
        };
        let frame = frame.ok_or(CallError::ConnectionClosed)?;

        let envelope = wire::decode_response(&frame)?;
        if envelope.status != STATUS_OK {
            return Err(CallError::Remote {
                code: envelope.status,
                message: envelope.message,
            });
        }

        debug!(outputs = envelope.outputs.len(), "call complete");
        builder.install_results(envelope.outputs);
        Ok(())
    }
}
