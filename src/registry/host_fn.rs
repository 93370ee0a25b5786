//! Marker-trait machinery turning typed functions into uniform adapters.
//!
//! Each registered function gets one concrete adapter built at registration
//! time from its signature: how many parameters it declares, which
//! positions are mutable-by-reference, and how to decode/encode each value.
//! The pattern is the usual marker-generic dispatch (one blanket
//! [`Callable`] impl per arity, parameter kinds resolved through
//! [`HostArg`]): the marker type parameter keeps the by-value and
//! by-reference blankets coherent, and type inference picks the right one
//! from the closure's signature alone.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{self, CodecError};
use crate::errors::EngineError;
use crate::slots::{SlotId, ValueStore};

/// Parameter kind marker: decoded and passed by value.
pub struct ByValue;

/// Parameter kind marker: decoded into a [`Ref<T>`] cell and written back
/// to its slot after the call.
pub struct ByRef;

/// A mutable-by-reference host function parameter.
///
/// The adapter decodes the argument into the cell, hands the function a
/// handle to it, and after the call re-encodes the cell's value into the
/// value store under the argument's original slot id. That write-back is
/// the whole mechanism behind "pass by reference across an RPC boundary":
/// the caller sees the mutation because the slot was rewritten, not because
/// any aliasing crossed the wire.
pub struct Ref<T> {
    cell: Rc<RefCell<T>>,
}

impl<T> Ref<T> {
    fn new(value: T) -> Self {
        Self {
            cell: Rc::new(RefCell::new(value)),
        }
    }

    /// Immutably borrows the value.
    pub fn borrow(&self) -> std::cell::Ref<'_, T> {
        self.cell.borrow()
    }

    /// Mutably borrows the value.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.cell.borrow_mut()
    }

    /// Replaces the value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        self.cell.replace(value)
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ref").field(&self.cell.borrow()).finish()
    }
}

/// How one parameter position decodes, and whether it writes back.
///
/// `Kind` is [`ByValue`] or [`ByRef`]; the two blanket impls live on
/// different trait instantiations, so any concrete parameter type resolves
/// to exactly one of them.
pub trait HostArg<Kind>: Sized {
    /// Whether this position is mutable-by-reference.
    const MUTATES: bool;

    /// Decodes the argument from its slot bytes.
    fn decode(bytes: &[u8]) -> Result<Self, CodecError>;

    /// A handle kept across the call for write-back, when this position
    /// mutates.
    fn retained(&self) -> Option<Self> {
        None
    }

    /// Re-encodes the post-call value into `slot`.
    fn write_back(&self, store: &mut ValueStore, slot: SlotId) -> Result<(), CodecError> {
        let _ = (store, slot);
        Ok(())
    }
}

impl<T> HostArg<ByValue> for T
where
    T: Serialize + DeserializeOwned,
{
    const MUTATES: bool = false;

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }
}

impl<T> HostArg<ByRef> for Ref<T>
where
    T: Serialize + DeserializeOwned,
{
    const MUTATES: bool = true;

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(Ref::new(codec::decode(bytes)?))
    }

    fn retained(&self) -> Option<Self> {
        Some(self.clone())
    }

    fn write_back(&self, store: &mut ValueStore, slot: SlotId) -> Result<(), CodecError> {
        let bytes = codec::encode(&*self.cell.borrow())?;
        store.insert(slot, bytes);
        Ok(())
    }
}

/// A function registrable under some signature marker.
///
/// Implemented for `Fn` closures and fn items of arity 0 through 8 whose
/// parameters implement [`HostArg`] and whose return type is `Serialize`
/// (a function with no meaningful result returns `()`, encoded as nil).
pub trait Callable<Marker>: Send + Sync + 'static {
    /// Declared parameter count.
    const ARITY: usize;

    /// Decodes arguments from `store`, calls the function, writes back
    /// mutable-by-reference parameters, and returns the encoded result.
    fn call(&self, store: &mut ValueStore, args: &[SlotId]) -> Result<Vec<u8>, EngineError>;
}

macro_rules! impl_callable {
    ($arity:literal $(, ($Arg:ident, $Kind:ident, $idx:tt))*) => {
        impl<Fun, Res $(, $Arg, $Kind)*> Callable<(($(($Arg, $Kind),)*), Res)> for Fun
        where
            Fun: Fn($($Arg),*) -> Res + Send + Sync + 'static,
            Res: Serialize,
            $($Arg: HostArg<$Kind>,)*
        {
            const ARITY: usize = $arity;

            #[allow(unused_variables)]
            fn call(
                &self,
                store: &mut ValueStore,
                args: &[SlotId],
            ) -> Result<Vec<u8>, EngineError> {
                debug_assert_eq!(args.len(), $arity);
                $(
                    #[allow(non_snake_case)]
                    let $Arg = {
                        let slot = args[$idx];
                        let bytes = store
                            .get(slot)
                            .ok_or(EngineError::MissingArgument { slot })?;
                        <$Arg as HostArg<$Kind>>::decode(bytes).map_err(|source| {
                            EngineError::decode(format!("argument {}", $idx), source)
                        })?
                    };
                )*
                let retained = ($( <$Arg as HostArg<$Kind>>::retained(&$Arg), )*);
                let result = (self)($($Arg),*);
                $(
                    if let Some(kept) = retained.$idx {
                        kept.write_back(store, args[$idx]).map_err(|source| {
                            EngineError::decode("reference write-back", source)
                        })?;
                    }
                )*
                codec::encode(&result)
                    .map_err(|source| EngineError::decode("return value", source))
            }
        }
    };
}

impl_callable!(0);
impl_callable!(1, (A0, K0, 0));
impl_callable!(2, (A0, K0, 0), (A1, K1, 1));
impl_callable!(3, (A0, K0, 0), (A1, K1, 1), (A2, K2, 2));
impl_callable!(4, (A0, K0, 0), (A1, K1, 1), (A2, K2, 2), (A3, K3, 3));
impl_callable!(
    5,
    (A0, K0, 0),
    (A1, K1, 1),
    (A2, K2, 2),
    (A3, K3, 3),
    (A4, K4, 4)
);
impl_callable!(
    6,
    (A0, K0, 0),
    (A1, K1, 1),
    (A2, K2, 2),
    (A3, K3, 3),
    (A4, K4, 4),
    (A5, K5, 5)
);
impl_callable!(
    7,
    (A0, K0, 0),
    (A1, K1, 1),
    (A2, K2, 2),
    (A3, K3, 3),
    (A4, K4, 4),
    (A5, K5, 5),
    (A6, K6, 6)
);
impl_callable!(
    8,
    (A0, K0, 0),
    (A1, K1, 1),
    (A2, K2, 2),
    (A3, K3, 3),
    (A4, K4, 4),
    (A5, K5, 5),
    (A6, K6, 6),
    (A7, K7, 7)
);

/// Object-safe face of a registered function.
pub(crate) trait ErasedFunction: Send + Sync {
    fn arity(&self) -> usize;
    fn invoke(&self, store: &mut ValueStore, args: &[SlotId]) -> Result<Vec<u8>, EngineError>;
}

/// Pairs a typed function with its inferred signature marker.
pub(crate) struct FunctionAdapter<F, Marker> {
    func: F,
    _marker: PhantomData<fn() -> Marker>,
}

impl<F, Marker> FunctionAdapter<F, Marker> {
    pub(crate) fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

impl<F, Marker> ErasedFunction for FunctionAdapter<F, Marker>
where
    F: Callable<Marker>,
    Marker: 'static,
{
    fn arity(&self) -> usize {
        F::ARITY
    }

    fn invoke(&self, store: &mut ValueStore, args: &[SlotId]) -> Result<Vec<u8>, EngineError> {
        self.func.call(store, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_value_args_do_not_retain() {
        let decoded = <i64 as HostArg<ByValue>>::decode(&codec::encode(&5i64).unwrap()).unwrap();
        assert_eq!(decoded, 5);
        assert!(<i64 as HostArg<ByValue>>::retained(&decoded).is_none());
    }

    #[test]
    fn ref_args_retain_and_write_back() {
        let bytes = codec::encode(&"abc".to_string()).unwrap();
        let cell = <Ref<String> as HostArg<ByRef>>::decode(&bytes).unwrap();
        let kept = cell.retained().expect("ByRef always retains");

        cell.borrow_mut().push('d');

        let mut store = ValueStore::new();
        kept.write_back(&mut store, SlotId::FIRST).unwrap();
        let back: String = codec::decode(store.get(SlotId::FIRST).unwrap()).unwrap();
        assert_eq!(back, "abcd");
    }
}
