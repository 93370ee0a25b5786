//! Slot identifiers and the per-request value store.
//!
//! A *slot* is an addressable cell holding one opaque, MessagePack-encoded
//! value. One [`ValueStore`] accompanies one program: the client seeds it
//! with literals, the engine extends it with instruction results, and the
//! response carries back the subset the caller asked for. Nothing in a store
//! survives past a single request/response cycle.
//!
//! # Examples
//!
//! ```
//! use wiregraph::slots::{SlotId, ValueStore};
//!
//! let mut store = ValueStore::new();
//! let slot = SlotId::FIRST;
//! store.insert(slot, vec![0xc3]); // msgpack `true`
//!
//! assert!(store.contains(slot));
//! assert_eq!(store.get(slot), Some(&[0xc3][..]));
//! assert!(!store.contains(SlotId::UNASSIGNED));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// Identifies one cell of a per-request [`ValueStore`].
///
/// Ids are unique within one program and assigned monotonically starting at
/// [`SlotId::FIRST`]. [`SlotId::UNASSIGNED`] (zero) is a sentinel meaning
/// "no slot": it marks instruction results nobody captured and must never
/// address a real value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(u32);

impl SlotId {
    /// Sentinel id meaning "no slot assigned".
    pub const UNASSIGNED: SlotId = SlotId(0);
    /// First real slot id handed out by a builder.
    pub const FIRST: SlotId = SlotId(1);

    /// The raw integer form, as it appears on the wire.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` for the [`UNASSIGNED`](Self::UNASSIGNED) sentinel.
    #[must_use]
    pub const fn is_unassigned(self) -> bool {
        self.0 == 0
    }

    /// The id following this one in allocation order.
    pub const fn next(self) -> SlotId {
        SlotId(self.0 + 1)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-request mapping from slot id to serialized bytes.
///
/// Backed by a `BTreeMap` so the wire encoding is deterministic: encoding
/// the same store twice yields identical bytes. Values are stored as opaque
/// byte strings (`serde_bytes`), never re-interpreted by the store itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueStore {
    slots: BTreeMap<SlotId, ByteBuf>,
}

impl ValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or overwrites) the value at `slot`.
    pub fn insert(&mut self, slot: SlotId, bytes: Vec<u8>) {
        self.slots.insert(slot, ByteBuf::from(bytes));
    }

    /// The serialized bytes at `slot`, if any.
    #[must_use]
    pub fn get(&self, slot: SlotId) -> Option<&[u8]> {
        self.slots.get(&slot).map(|b| b.as_slice())
    }

    /// Returns `true` if `slot` holds a value.
    #[must_use]
    pub fn contains(&self, slot: SlotId) -> bool {
        self.slots.contains_key(&slot)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no slot holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates over `(slot, bytes)` pairs in slot-id order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &[u8])> {
        self.slots.iter().map(|(id, b)| (*id, b.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_id_ordering_and_sentinel() {
        assert!(SlotId::UNASSIGNED.is_unassigned());
        assert!(!SlotId::FIRST.is_unassigned());
        assert_eq!(SlotId::FIRST.next().raw(), 2);
        assert!(SlotId::UNASSIGNED < SlotId::FIRST);
    }

    #[test]
    fn store_insert_overwrites() {
        let mut store = ValueStore::new();
        store.insert(SlotId::FIRST, vec![1]);
        store.insert(SlotId::FIRST, vec![2]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(SlotId::FIRST), Some(&[2][..]));
    }

    #[test]
    fn store_iterates_in_slot_order() {
        let mut store = ValueStore::new();
        let a = SlotId::FIRST;
        let b = a.next();
        let c = b.next();
        store.insert(c, vec![3]);
        store.insert(a, vec![1]);
        store.insert(b, vec![2]);
        let ids: Vec<u32> = store.iter().map(|(id, _)| id.raw()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
