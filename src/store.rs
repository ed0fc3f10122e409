//! In-memory field storage for dynamic messages.
//!
//! Every message owns a flat slot array laid out by its codec table: one
//! slot per field, with all members of a oneof sharing a single slot. A
//! slot is a tagged union over the storage shapes the wire format needs,
//! so field access is a bounds-checked index plus a variant match, never
//! a pointer cast.
//!
//! Presence for explicit-presence fields lives outside the slots in a
//! compact has-bit array. Unknown fields are kept verbatim as raw wire
//! bytes, and extension fields hang off an optional side table so the
//! extension-free case pays a single null check.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::containers::ProtoString;
use crate::extension::ExtensionMap;
use crate::reflection::DynamicMessage;
use crate::value::{MapKey, Value};

/// Storage for one field (or one whole oneof) of a dynamic message.
///
/// The variant is fixed at table-build time from the field's kind and
/// cardinality and never changes afterwards; coders match on the variant
/// they laid out and treat anything else as a table bug.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Slot {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Enum(i32),
    String(ProtoString),
    Bytes(Vec<u8>),
    Message(Option<Box<DynamicMessage>>),
    RepeatedBool(Vec<bool>),
    RepeatedI32(Vec<i32>),
    RepeatedI64(Vec<i64>),
    RepeatedU32(Vec<u32>),
    RepeatedU64(Vec<u64>),
    RepeatedF32(Vec<f32>),
    RepeatedF64(Vec<f64>),
    RepeatedEnum(Vec<i32>),
    RepeatedString(Vec<ProtoString>),
    RepeatedBytes(Vec<Vec<u8>>),
    RepeatedMessage(Vec<DynamicMessage>),
    Map(HashMap<MapKey, Value>),
    Oneof(Option<Box<OneofValue>>),
}

/// The currently populated member of a oneof, by field number.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct OneofValue {
    pub(crate) number: u32,
    pub(crate) value: Value,
}

impl Slot {
    /// Resets the slot to its unset state without changing its shape.
    pub(crate) fn clear(&mut self) {
        match self {
            Slot::Bool(v) => *v = false,
            Slot::I32(v) | Slot::Enum(v) => *v = 0,
            Slot::I64(v) => *v = 0,
            Slot::U32(v) => *v = 0,
            Slot::U64(v) => *v = 0,
            Slot::F32(v) => *v = 0.0,
            Slot::F64(v) => *v = 0.0,
            Slot::String(s) => s.clear(),
            Slot::Bytes(b) => b.clear(),
            Slot::Message(m) => *m = None,
            Slot::RepeatedBool(v) => v.clear(),
            Slot::RepeatedI32(v) | Slot::RepeatedEnum(v) => v.clear(),
            Slot::RepeatedI64(v) => v.clear(),
            Slot::RepeatedU32(v) => v.clear(),
            Slot::RepeatedU64(v) => v.clear(),
            Slot::RepeatedF32(v) => v.clear(),
            Slot::RepeatedF64(v) => v.clear(),
            Slot::RepeatedString(v) => v.clear(),
            Slot::RepeatedBytes(v) => v.clear(),
            Slot::RepeatedMessage(v) => v.clear(),
            Slot::Map(m) => m.clear(),
            Slot::Oneof(o) => *o = None,
        }
    }

    /// True when the slot holds its default: zero scalars, empty strings
    /// and containers, an absent message or oneof. Float zero compares by
    /// value, so -0.0 counts as default while NaN does not.
    pub(crate) fn is_zero(&self) -> bool {
        match self {
            Slot::Bool(v) => !*v,
            Slot::I32(v) | Slot::Enum(v) => *v == 0,
            Slot::I64(v) => *v == 0,
            Slot::U32(v) => *v == 0,
            Slot::U64(v) => *v == 0,
            Slot::F32(v) => *v == 0.0,
            Slot::F64(v) => *v == 0.0,
            Slot::String(s) => s.is_empty(),
            Slot::Bytes(b) => b.is_empty(),
            Slot::Message(m) => m.is_none(),
            Slot::RepeatedBool(v) => v.is_empty(),
            Slot::RepeatedI32(v) | Slot::RepeatedEnum(v) => v.is_empty(),
            Slot::RepeatedI64(v) => v.is_empty(),
            Slot::RepeatedU32(v) => v.is_empty(),
            Slot::RepeatedU64(v) => v.is_empty(),
            Slot::RepeatedF32(v) => v.is_empty(),
            Slot::RepeatedF64(v) => v.is_empty(),
            Slot::RepeatedString(v) => v.is_empty(),
            Slot::RepeatedBytes(v) => v.is_empty(),
            Slot::RepeatedMessage(v) => v.is_empty(),
            Slot::Map(m) => m.is_empty(),
            Slot::Oneof(o) => o.is_none(),
        }
    }

    pub(crate) fn variant_name(&self) -> &'static str {
        match self {
            Slot::Bool(_) => "Bool",
            Slot::I32(_) => "I32",
            Slot::I64(_) => "I64",
            Slot::U32(_) => "U32",
            Slot::U64(_) => "U64",
            Slot::F32(_) => "F32",
            Slot::F64(_) => "F64",
            Slot::Enum(_) => "Enum",
            Slot::String(_) => "String",
            Slot::Bytes(_) => "Bytes",
            Slot::Message(_) => "Message",
            Slot::RepeatedBool(_) => "RepeatedBool",
            Slot::RepeatedI32(_) => "RepeatedI32",
            Slot::RepeatedI64(_) => "RepeatedI64",
            Slot::RepeatedU32(_) => "RepeatedU32",
            Slot::RepeatedU64(_) => "RepeatedU64",
            Slot::RepeatedF32(_) => "RepeatedF32",
            Slot::RepeatedF64(_) => "RepeatedF64",
            Slot::RepeatedEnum(_) => "RepeatedEnum",
            Slot::RepeatedString(_) => "RepeatedString",
            Slot::RepeatedBytes(_) => "RepeatedBytes",
            Slot::RepeatedMessage(_) => "RepeatedMessage",
            Slot::Map(_) => "Map",
            Slot::Oneof(_) => "Oneof",
        }
    }
}

/// The mutable state of one dynamic message instance.
#[derive(Clone, Debug)]
pub(crate) struct FieldStore {
    pub(crate) slots: Box<[Slot]>,
    pub(crate) has_bits: Box<[u32]>,
    pub(crate) unknown: Vec<u8>,
    pub(crate) extensions: Option<Box<ExtensionMap>>,
    pub(crate) cached_size: CachedSize,
}

impl FieldStore {
    pub(crate) fn new(slots: Box<[Slot]>, has_words: usize) -> FieldStore {
        FieldStore {
            slots,
            has_bits: vec![0; has_words].into_boxed_slice(),
            unknown: Vec::new(),
            extensions: None,
            cached_size: CachedSize::new(),
        }
    }

    pub(crate) fn has_bit(&self, index: u32) -> bool {
        self.has_bits[(index / 32) as usize] & (1 << (index % 32)) != 0
    }

    pub(crate) fn set_has_bit(&mut self, index: u32) {
        self.has_bits[(index / 32) as usize] |= 1 << (index % 32);
    }

    pub(crate) fn clear_has_bit(&mut self, index: u32) {
        self.has_bits[(index / 32) as usize] &= !(1 << (index % 32));
    }

    pub(crate) fn extensions_mut(&mut self) -> &mut ExtensionMap {
        self.extensions.get_or_insert_with(Default::default)
    }

    pub(crate) fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.has_bits.fill(0);
        self.unknown.clear();
        self.extensions = None;
        self.cached_size.clear();
    }
}

// Size caches are volatile and never part of message identity.
impl PartialEq for FieldStore {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
            && self.has_bits == other.has_bits
            && self.unknown == other.unknown
            && self.extensions == other.extensions
    }
}

/// A lazily computed serialized size, shared between the size and marshal
/// passes of one encode and safe to read from multiple threads.
///
/// Zero means "not computed"; stored values are offset by one so a real
/// size of zero stays representable.
#[derive(Debug, Default)]
pub(crate) struct CachedSize(AtomicU64);

impl CachedSize {
    pub(crate) fn new() -> CachedSize {
        CachedSize(AtomicU64::new(0))
    }

    pub(crate) fn get(&self) -> Option<usize> {
        match self.0.load(Ordering::Relaxed) {
            0 => None,
            n => Some((n - 1) as usize),
        }
    }

    pub(crate) fn set(&self, size: usize) {
        self.0.store(size as u64 + 1, Ordering::Relaxed);
    }

    pub(crate) fn clear(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

impl Clone for CachedSize {
    // Clones start with no cached size.
    fn clone(&self) -> CachedSize {
        CachedSize::new()
    }
}
