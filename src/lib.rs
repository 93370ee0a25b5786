//! # Wiregraph: Graph-batched Remote Call Framework
//!
//! Wiregraph lets a client compose several named remote operations into a
//! single request, expressed as a small data-dependency graph with optional
//! loops, and have a server execute that graph as one bounded unit of work
//! against a registry of host-provided functions.
//!
//! ## Core Concepts
//!
//! - **Slots**: Addressable cells in a per-request value store, identified by
//!   integer ids and holding opaque MessagePack-encoded bytes
//! - **Program**: An immutable instruction list (invoke, return, jumps) plus
//!   the slot ids the caller wants back
//! - **Builder**: Client-side construction API that allocates slots, emits
//!   instructions, and backpatches loop exits
//! - **Registry**: Server-side table of typed host functions behind a uniform
//!   decode-call-encode adapter, including by-reference write-back
//! - **Engine**: A sequential, instruction-budgeted interpreter that walks a
//!   program against a value store
//!
//! ## Quick Start
//!
//! ### Composing a call graph
//!
//! ```
//! use wiregraph::builder::CallBuilder;
//!
//! # fn main() -> Result<(), wiregraph::builder::BuildError> {
//! let mut b = CallBuilder::new();
//!
//! // Nested invocations: pending results flow into later instructions.
//! let a = b.invoke("kv/get", ("a",))?;
//! let a = b.invoke("math/to_int", (a,))?;
//! let c = b.invoke("kv/get", ("b",))?;
//! let c = b.invoke("math/to_int", (c,))?;
//! let sum = b.invoke("math/add", (a, c))?;
//! let sum = b.bind(sum);
//!
//! b.mark_outputs(&[&sum]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Registering host functions
//!
//! ```
//! use wiregraph::registry::{FunctionRegistry, Ref};
//!
//! # fn main() -> Result<(), wiregraph::registry::RegistryError> {
//! let mut registry = FunctionRegistry::new();
//!
//! registry.register("math/add", |a: i64, b: i64| a + b)?;
//! registry.register("math/to_int", |s: String| -> i64 {
//!     s.parse().unwrap_or(0)
//! })?;
//!
//! // A `Ref<T>` parameter is mutated in place and written back to its slot,
//! // so the caller observes the change when reading that slot afterwards.
//! registry.register("str/append", |base: Ref<String>, suffix: String| {
//!     base.borrow_mut().push_str(&suffix);
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Running a program locally
//!
//! ```
//! use wiregraph::builder::CallBuilder;
//! use wiregraph::engine::Engine;
//! use wiregraph::registry::FunctionRegistry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = FunctionRegistry::new();
//! registry.register("math/add", |a: i64, b: i64| a + b)?;
//!
//! let mut b = CallBuilder::new();
//! let sum = b.invoke("math/add", (2000i64, 25i64))?;
//! let sum = b.bind(sum);
//! b.mark_outputs(&[&sum]);
//!
//! let (mut store, program) = b.build();
//! let outputs = Engine::new().run(&program, &mut store, &registry)?;
//! assert!(outputs.contains(sum.slot()));
//! # Ok(())
//! # }
//! ```
//!
//! For the networked path, see [`client::Client`] and [`server::Server`]:
//! the builder's store, program, and output list travel as one framed
//! MessagePack request; the response is the output mapping (or a structured
//! fault) and is read back through
//! [`CallBuilder::read_output`](builder::CallBuilder::read_output).
//!
//! ## Error Handling
//!
//! Every engine-side failure resolves to a variant of
//! [`errors::EngineError`] with a stable wire status code; a failed run
//! never yields partial outputs. Transport failures are a separate class on
//! the client ([`client::CallError`]) so callers can tell "the server said
//! no" apart from "the connection broke".
//!
//! ## Module Guide
//!
//! - [`slots`] - Slot identifiers and the per-request value store
//! - [`program`] - Instructions, programs, and name validation
//! - [`builder`] - Client-side graph construction and loop backpatching
//! - [`registry`] - Host function registration and typed dispatch
//! - [`engine`] - The bounded interpreter
//! - [`wire`] - Request/response payloads and framing
//! - [`client`] / [`server`] - Framed TCP transport
//! - [`telemetry`] - Tracing subscriber setup for binaries and tests

pub mod builder;
pub mod client;
pub mod codec;
pub mod engine;
pub mod errors;
pub mod program;
pub mod registry;
pub mod server;
pub mod slots;
pub mod telemetry;
pub mod wire;
