//! Host function registration and typed dispatch.
//!
//! The registry is the server-side table from function name to a uniform
//! "decode arguments, call, encode result, write back mutations" adapter.
//! Plain Rust closures and fn items register directly; one adapter is built
//! per distinct signature at registration time via the marker-trait
//! machinery in [`host_fn`], independent of what the functions actually do.
//!
//! Host functions are ordinary, potentially stateful application code. If
//! they touch state shared across requests they synchronize it themselves;
//! the registry performs no locking on their behalf and makes no ordering
//! guarantee across requests.
//!
//! # Examples
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::{Arc, Mutex};
//! use wiregraph::registry::{FunctionRegistry, Ref};
//!
//! # fn main() -> Result<(), wiregraph::registry::RegistryError> {
//! let table: Arc<Mutex<HashMap<String, String>>> = Arc::default();
//! let mut registry = FunctionRegistry::new();
//!
//! let kv = table.clone();
//! registry.register("kv/set", move |key: String, value: String| {
//!     kv.lock().expect("kv table poisoned").insert(key, value);
//! })?;
//!
//! let kv = table.clone();
//! registry.register("kv/get", move |key: String| -> String {
//!     kv.lock()
//!         .expect("kv table poisoned")
//!         .get(&key)
//!         .cloned()
//!         .unwrap_or_default()
//! })?;
//!
//! // Mutable-by-reference parameter: the post-call value is written back
//! // to the argument's slot.
//! registry.register("str/append", |base: Ref<String>, suffix: String| {
//!     base.borrow_mut().push_str(&suffix);
//! })?;
//! # Ok(())
//! # }
//! ```

mod host_fn;

pub use host_fn::{ByRef, ByValue, Callable, HostArg, Ref};

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::errors::EngineError;
use crate::program::is_valid_function_name;
use crate::slots::{SlotId, ValueStore};

use host_fn::{ErasedFunction, FunctionAdapter};

/// A registration-time failure.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    /// The name fails the `^[A-Za-z0-9_/]+$` charset rule.
    #[error("invalid function name: {name:?}")]
    #[diagnostic(
        code(wiregraph::registry::invalid_name),
        help("function names are non-empty and match ^[A-Za-z0-9_/]+$")
    )]
    InvalidName { name: String },

    /// The name is already registered; there is no silent override.
    #[error("function already registered: {name}")]
    #[diagnostic(
        code(wiregraph::registry::duplicate),
        help("unregister the existing binding first if replacement is intended")
    )]
    DuplicateRegistration { name: String },
}

/// Server-side table from function name to an erased typed adapter.
#[derive(Default)]
pub struct FunctionRegistry {
    table: FxHashMap<String, Box<dyn ErasedFunction>>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `func` under `name`.
    ///
    /// The function's signature is captured at this point: parameter count,
    /// which positions are mutable-by-reference ([`Ref<T>`]), and how each
    /// parameter and the return value are encoded.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidName`] if the charset check fails,
    /// [`RegistryError::DuplicateRegistration`] if the name is taken.
    pub fn register<Marker, F>(
        &mut self,
        name: impl Into<String>,
        func: F,
    ) -> Result<(), RegistryError>
    where
        F: Callable<Marker>,
        Marker: 'static,
    {
        let name = name.into();
        if !is_valid_function_name(&name) {
            return Err(RegistryError::InvalidName { name });
        }
        if self.table.contains_key(&name) {
            return Err(RegistryError::DuplicateRegistration { name });
        }
        tracing::debug!(function = %name, arity = F::ARITY, "registering host function");
        self.table.insert(name, Box::new(FunctionAdapter::new(func)));
        Ok(())
    }

    /// Removes the binding for `name`, returning whether one existed.
    ///
    /// Safe to call for absent names.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.table.remove(name).is_some()
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Invokes `name` with the values at `args`, returning the encoded
    /// return value for the caller to store.
    ///
    /// Mutable-by-reference parameters are re-encoded into `store` under
    /// the same slot ids they were read from before this returns, so later
    /// reads of those slots observe the mutation.
    ///
    /// # Errors
    ///
    /// [`EngineError::FunctionNotFound`] for unregistered names,
    /// [`EngineError::MissingArgument`] for slots absent from the store,
    /// and [`EngineError::Decode`] for malformed argument bytes or an
    /// argument count that disagrees with the registered signature.
    pub fn invoke(
        &self,
        name: &str,
        store: &mut ValueStore,
        args: &[SlotId],
    ) -> Result<Vec<u8>, EngineError> {
        let func = self
            .table
            .get(name)
            .ok_or_else(|| EngineError::FunctionNotFound { name: name.into() })?;
        if args.len() != func.arity() {
            return Err(EngineError::arity(name, func.arity(), args.len()));
        }
        func.invoke(store, args)
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.table.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}
