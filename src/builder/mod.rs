//! Client-side call graph construction.
//!
//! [`CallBuilder`] owns everything a single remote call is made of: the
//! seeded value store, the growing instruction list, the output selection,
//! and slot-id allocation. Construction is purely in-memory; the builder
//! performs no I/O. One builder represents exactly one in-flight call;
//! reuse across calls, or reading outputs before the round trip completes,
//! is a caller precondition violation.
//!
//! # Pending results and handles
//!
//! [`invoke`](CallBuilder::invoke) returns a [`PendingResult`]: a reference
//! to the instruction's not-yet-slotted return value. Ownership makes the
//! two-phase scheme safe: a pending result is consumed exactly once, by
//! one of:
//!
//! - [`bind`](CallBuilder::bind): first binding, allocating a fresh slot
//!   and producing a [`Handle`];
//! - [`rebind`](CallBuilder::rebind): redirecting the instruction to write
//!   into an existing handle's slot (loop-carried variables: the slot id
//!   is fixed at first declaration, only the producer changes);
//! - use as an argument to a later `invoke`, which auto-finalizes it
//!   (first binding);
//! - being dropped, which leaves the instruction's result unassigned: a
//!   fire-and-forget invocation whose return value is discarded.
//!
//! # Examples
//!
//! ```
//! use wiregraph::builder::CallBuilder;
//!
//! # fn main() -> Result<(), wiregraph::builder::BuildError> {
//! let mut b = CallBuilder::new();
//!
//! // Loop-carried accumulator: a starts at 0, is rebound each iteration.
//! let a = b.literal(0i64)?;
//! let limit = b.literal(11i64)?;
//! let pending = b.invoke("math/lt", (&a, &limit))?;
//! let keep_going = b.bind(pending);
//!
//! b.while_loop(&keep_going, |b| {
//!     let next = b.invoke("math/add", (&a, 2i64))?;
//!     b.rebind(&a, next);
//!     let again = b.invoke("math/lt", (&a, &limit))?;
//!     b.rebind(&keep_going, again);
//!     Ok(())
//! })?;
//!
//! b.mark_outputs(&[&a]);
//! # Ok(())
//! # }
//! ```

mod args;
mod loops;

pub use args::{AsHandle, AsLiteral, AsPending, Handle, IntoArg, IntoArgs, PendingResult};

use std::sync::atomic::{AtomicU64, Ordering};

use miette::Diagnostic;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::codec::{self, CodecError};
use crate::program::{Instruction, Program, is_valid_function_name};
use crate::slots::{SlotId, ValueStore};

/// A graph construction failure.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    /// The function name fails the `^[A-Za-z0-9_/]+$` charset rule.
    #[error("invalid function name: {name:?}")]
    #[diagnostic(
        code(wiregraph::builder::invalid_name),
        help("function names are non-empty and match ^[A-Za-z0-9_/]+$")
    )]
    InvalidName { name: String },

    /// A literal could not be encoded.
    #[error(transparent)]
    #[diagnostic(code(wiregraph::builder::codec))]
    Codec(#[from] CodecError),
}

/// A failure while reading a call's outputs.
#[derive(Debug, Error, Diagnostic)]
pub enum OutputError {
    /// No successful round trip has completed on this builder.
    #[error("no completed call: outputs are readable only after a successful round trip")]
    #[diagnostic(code(wiregraph::builder::not_completed))]
    NotCompleted,

    /// The slot was not among, or not returned in, the output mapping.
    #[error("slot {slot} is not present in the returned outputs")]
    #[diagnostic(
        code(wiregraph::builder::slot_not_found),
        help(
            "mark the handle as an output before calling, and note that a \
             slot never written during execution is absent, not defaulted"
        )
    )]
    SlotNotFound { slot: SlotId },

    /// The returned bytes did not decode as the requested type.
    #[error(transparent)]
    #[diagnostic(code(wiregraph::builder::codec))]
    Codec(#[from] CodecError),
}

static NEXT_BUILDER_ID: AtomicU64 = AtomicU64::new(0);

/// Mutable construction API for one remote call.
#[derive(Debug)]
pub struct CallBuilder {
    id: u64,
    seed: ValueStore,
    instructions: Vec<Instruction>,
    outputs: Vec<SlotId>,
    next_slot: SlotId,
    results: Option<ValueStore>,
}

impl Default for CallBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CallBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed),
            seed: ValueStore::new(),
            instructions: Vec::new(),
            outputs: Vec::new(),
            next_slot: SlotId::FIRST,
            results: None,
        }
    }

    /// Encodes `value`, seeds it into a fresh slot, and returns the bound
    /// handle.
    pub fn literal<T: Serialize>(&mut self, value: T) -> Result<Handle, BuildError> {
        let bytes = codec::encode(&value)?;
        let slot = self.alloc_slot();
        self.seed.insert(slot, bytes);
        Ok(Handle::new(slot))
    }

    /// Appends an invocation of the named function.
    ///
    /// `args` is a tuple (0 to 8 elements) whose members are converted to
    /// slot ids: a [`Handle`] (or `&Handle`) contributes its slot, a
    /// [`PendingResult`] is auto-finalized first, and any `Serialize` value
    /// is wrapped as a literal.
    ///
    /// The instruction's result slot is left unassigned until the returned
    /// [`PendingResult`] is finalized (or dropped, for fire-and-forget).
    ///
    /// # Errors
    ///
    /// [`BuildError::InvalidName`] if the name fails the charset check,
    /// rejected here rather than deferred to the server.
    pub fn invoke<Marker, A>(
        &mut self,
        name: impl Into<String>,
        args: A,
    ) -> Result<PendingResult, BuildError>
    where
        A: IntoArgs<Marker>,
    {
        let name = name.into();
        if !is_valid_function_name(&name) {
            return Err(BuildError::InvalidName { name });
        }
        let args = args.into_slots(self)?;
        self.instructions.push(Instruction::Invoke {
            name,
            args,
            result: SlotId::UNASSIGNED,
        });
        Ok(PendingResult::new(self.id, self.instructions.len() - 1))
    }

    /// First binding: allocates a fresh slot for the pending invocation's
    /// result and returns the handle.
    pub fn bind(&mut self, pending: PendingResult) -> Handle {
        debug_assert_eq!(
            pending.builder_id(),
            self.id,
            "pending result finalized on a different builder"
        );
        let slot = self.alloc_slot();
        self.set_result_slot(pending.instruction(), slot);
        Handle::new(slot)
    }

    /// Rebinding: the pending invocation writes into `handle`'s existing
    /// slot. The handle's slot id never changes; only which instruction
    /// produces into it does.
    pub fn rebind(&mut self, handle: &Handle, pending: PendingResult) {
        debug_assert_eq!(
            pending.builder_id(),
            self.id,
            "pending result finalized on a different builder"
        );
        self.set_result_slot(pending.instruction(), handle.slot());
    }

    /// Appends an unconditional, non-error stop.
    pub fn early_return(&mut self) {
        self.instructions.push(Instruction::Return);
    }

    /// Records the output selection, replacing any previous one.
    pub fn mark_outputs(&mut self, handles: &[&Handle]) {
        self.outputs = handles.iter().map(|h| h.slot()).collect();
    }

    /// Decodes the returned output for `handle`.
    ///
    /// Valid only after a successful call completed on this builder.
    ///
    /// # Errors
    ///
    /// [`OutputError::NotCompleted`] before any round trip,
    /// [`OutputError::SlotNotFound`] when the slot was not requested or was
    /// never written during execution.
    pub fn read_output<T: DeserializeOwned>(&self, handle: &Handle) -> Result<T, OutputError> {
        let results = self.results.as_ref().ok_or(OutputError::NotCompleted)?;
        let bytes = results
            .get(handle.slot())
            .ok_or(OutputError::SlotNotFound {
                slot: handle.slot(),
            })?;
        Ok(codec::decode(bytes)?)
    }

    /// Freezes the construction state into a seeded store and an immutable
    /// program.
    ///
    /// The builder stays usable afterwards (the transport reads outputs
    /// back into it), but the returned program never reflects later edits.
    #[must_use]
    pub fn build(&self) -> (ValueStore, Program) {
        (
            self.seed.clone(),
            Program::new(self.instructions.clone(), self.outputs.clone()),
        )
    }

    /// Installs the output mapping of a completed call, making
    /// [`read_output`](Self::read_output) valid.
    ///
    /// Called by the transport client; useful directly when embedding the
    /// engine in-process.
    pub fn install_results(&mut self, results: ValueStore) {
        self.results = Some(results);
    }

    pub(crate) fn seed(&self) -> &ValueStore {
        &self.seed
    }

    pub(crate) fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub(crate) fn output_slots(&self) -> &[SlotId] {
        &self.outputs
    }

    fn alloc_slot(&mut self) -> SlotId {
        let slot = self.next_slot;
        self.next_slot = slot.next();
        slot
    }

    fn set_result_slot(&mut self, index: usize, slot: SlotId) {
        match &mut self.instructions[index] {
            Instruction::Invoke { result, .. } => *result = slot,
            other => unreachable!("pending result points at non-invoke instruction {other:?}"),
        }
    }
}
