//! Handles, pending results, and argument conversion.
//!
//! Mirrors the registry's marker-trait dispatch on the client side: each
//! argument position resolves through [`IntoArg`] with a marker saying
//! whether it is a bound handle, a pending result, or a raw literal, and
//! whole tuples convert through [`IntoArgs`]. Inference picks the marker
//! from the argument's type alone, so call sites stay plain:
//!
//! ```
//! use wiregraph::builder::CallBuilder;
//!
//! # fn main() -> Result<(), wiregraph::builder::BuildError> {
//! let mut b = CallBuilder::new();
//! let key = b.literal("a")?;                     // Handle
//! let raw = b.invoke("kv/get", (&key,))?;        // &Handle argument
//! let parsed = b.invoke("math/to_int", (raw,))?; // PendingResult argument
//! let _sum = b.invoke("math/add", (parsed, 25i64))?; // literal argument
//! # Ok(())
//! # }
//! ```

use super::{BuildError, CallBuilder};
use crate::slots::SlotId;

use serde::Serialize;

/// A finalized reference to a slot.
///
/// The slot id is fixed when the handle is created, by
/// [`literal`](CallBuilder::literal) or by first-binding a
/// [`PendingResult`], and stays identical across any number of
/// rebindings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Handle {
    slot: SlotId,
}

impl Handle {
    pub(super) fn new(slot: SlotId) -> Self {
        Self { slot }
    }

    /// The slot this handle is bound to.
    #[must_use]
    pub fn slot(&self) -> SlotId {
        self.slot
    }
}

/// An unfinalized reference to an invocation's return value.
///
/// Cannot be read or serialized; it is consumed exactly once, by
/// [`bind`](CallBuilder::bind), [`rebind`](CallBuilder::rebind), or use as
/// an argument (auto-first-binding). Dropping one leaves the invocation
/// fire-and-forget: its result is discarded server-side.
#[derive(Debug)]
pub struct PendingResult {
    builder_id: u64,
    instruction: usize,
}

impl PendingResult {
    pub(super) fn new(builder_id: u64, instruction: usize) -> Self {
        Self {
            builder_id,
            instruction,
        }
    }

    pub(super) fn builder_id(&self) -> u64 {
        self.builder_id
    }

    pub(super) fn instruction(&self) -> usize {
        self.instruction
    }
}

/// Marker: the argument is a raw value, auto-wrapped as a literal.
pub struct AsLiteral;
/// Marker: the argument is an already-bound handle.
pub struct AsHandle;
/// Marker: the argument is a pending result, auto-finalized first.
pub struct AsPending;

/// One invocation argument, converted to the slot id it occupies.
pub trait IntoArg<Marker> {
    /// Resolves this argument to a slot id, allocating through `builder`
    /// when needed.
    fn into_slot(self, builder: &mut CallBuilder) -> Result<SlotId, BuildError>;
}

impl<T: Serialize> IntoArg<AsLiteral> for T {
    fn into_slot(self, builder: &mut CallBuilder) -> Result<SlotId, BuildError> {
        Ok(builder.literal(self)?.slot())
    }
}

impl IntoArg<AsHandle> for Handle {
    fn into_slot(self, _builder: &mut CallBuilder) -> Result<SlotId, BuildError> {
        Ok(self.slot)
    }
}

impl IntoArg<AsHandle> for &Handle {
    fn into_slot(self, _builder: &mut CallBuilder) -> Result<SlotId, BuildError> {
        Ok(self.slot)
    }
}

impl IntoArg<AsPending> for PendingResult {
    fn into_slot(self, builder: &mut CallBuilder) -> Result<SlotId, BuildError> {
        Ok(builder.bind(self).slot())
    }
}

/// An argument tuple, converted left to right into slot ids.
pub trait IntoArgs<Marker> {
    /// Resolves every element to its slot id, in order.
    fn into_slots(self, builder: &mut CallBuilder) -> Result<Vec<SlotId>, BuildError>;
}

macro_rules! impl_into_args {
    ($( ($Arg:ident, $Marker:ident) ),*) => {
        impl<$($Arg, $Marker),*> IntoArgs<($($Marker,)*)> for ($($Arg,)*)
        where
            $($Arg: IntoArg<$Marker>,)*
        {
            #[allow(unused_variables)]
            fn into_slots(self, builder: &mut CallBuilder) -> Result<Vec<SlotId>, BuildError> {
                #[allow(non_snake_case)]
                let ($($Arg,)*) = self;
                Ok(vec![$($Arg.into_slot(builder)?),*])
            }
        }
    };
}

impl_into_args!();
impl_into_args!((A0, M0));
impl_into_args!((A0, M0), (A1, M1));
impl_into_args!((A0, M0), (A1, M1), (A2, M2));
impl_into_args!((A0, M0), (A1, M1), (A2, M2), (A3, M3));
impl_into_args!((A0, M0), (A1, M1), (A2, M2), (A3, M3), (A4, M4));
impl_into_args!((A0, M0), (A1, M1), (A2, M2), (A3, M3), (A4, M4), (A5, M5));
impl_into_args!(
    (A0, M0),
    (A1, M1),
    (A2, M2),
    (A3, M3),
    (A4, M4),
    (A5, M5),
    (A6, M6)
);
impl_into_args!(
    (A0, M0),
    (A1, M1),
    (A2, M2),
    (A3, M3),
    (A4, M4),
    (A5, M5),
    (A6, M6),
    (A7, M7)
);
