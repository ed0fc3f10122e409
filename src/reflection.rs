//! Dynamic messages and field access.
//!
//! A [`DynamicMessage`] is a message instance described entirely at runtime
//! by a [`MessageDescriptor`]. Fields are reached through the descriptor's
//! codec table: each field resolves to a slot index once, at table build,
//! and every accessor here is an O(1) slot lookup away from the data.
//!
//! Values cross the API boundary as [`Value`](crate::value::Value), cloned
//! in and out. Accessors take the field's own descriptor; handing in a
//! descriptor from another message type is a contract violation and panics,
//! as does a value whose shape does not match the field.
//!
//! # Example
//!
//! ```
//! use protoflect::{
//!     Cardinality, DescriptorPool, DynamicMessage, FieldDef, FileDef, Kind, MessageDef,
//!     Syntax, Value,
//! };
//!
//! let pool = DescriptorPool::from_file(
//!     FileDef::new("point.proto", "demo", Syntax::Proto3).message(
//!         MessageDef::new("Point")
//!             .field(FieldDef::scalar("x", 1, Cardinality::Optional, Kind::Int32))
//!             .field(FieldDef::scalar("y", 2, Cardinality::Optional, Kind::Int32)),
//!     ),
//! )
//! .unwrap();
//!
//! let desc = pool.get_message_by_name("demo.Point").unwrap();
//! let x = desc.field_by_name("x").unwrap();
//!
//! let mut point = DynamicMessage::new(desc.clone());
//! point.set_field(&x, Value::I32(300));
//!
//! let bytes = point.encode_to_vec().unwrap();
//! assert_eq!(bytes, [0x08, 0xAC, 0x02]);
//!
//! let back = DynamicMessage::decode(desc, &bytes).unwrap();
//! assert_eq!(back.get_field(&x), Value::I32(300));
//! ```

use std::fmt;

use crate::decoding::DecodeOptions;
use crate::descriptor::{
    EnumDescriptor, ExtensionDescriptor, FieldDescriptor, Kind, MessageDescriptor, OneofDescriptor,
};
use crate::encoding::{self, EncodeOptions};
use crate::error::{DecodeError, EncodeError};
use crate::extension::{ExtensionField, ExtensionValue};
use crate::store::{FieldStore, OneofValue, Slot};
use crate::tables::{FieldInfo, Presence};
use crate::value::{MapKey, Value};

/// A message instance driven by a runtime descriptor.
///
/// Construction allocates the slot array laid out by the type's codec
/// table; the descriptor handle pins the pool the table lives in.
#[derive(Clone)]
pub struct DynamicMessage {
    pub(crate) descriptor: MessageDescriptor,
    pub(crate) store: FieldStore,
}

impl DynamicMessage {
    /// An empty message of the given type.
    pub fn new(descriptor: MessageDescriptor) -> DynamicMessage {
        let store = descriptor.type_info().new_store();
        DynamicMessage { descriptor, store }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// The field's value, or its default when absent.
    ///
    /// Absent repeated fields and maps read as empty, absent message fields
    /// as an empty message, absent scalars as their declared default.
    ///
    /// # Panics
    ///
    /// Panics if `field` does not belong to this message type.
    pub fn get_field(&self, field: &FieldDescriptor) -> Value {
        let info = field_info(&self.descriptor, field);
        let slot = &self.store.slots[info.slot as usize];
        if field.is_map() {
            return match slot {
                Slot::Map(m) => Value::Map(m.clone()),
                other => slot_shape_bug(field, other),
            };
        }
        if field.is_repeated() {
            return read_list(slot);
        }
        match info.presence {
            Presence::OneofMember => match slot {
                Slot::Oneof(Some(ov)) if ov.number == info.number => ov.value.clone(),
                _ => field.default_value(),
            },
            Presence::Explicit | Presence::Required => {
                if self.present(info, slot) {
                    read_scalar(slot)
                } else {
                    field.default_value()
                }
            }
            Presence::Implicit => read_scalar(slot),
        }
    }

    /// Stores `value` in `field`, replacing whatever was there. Setting a
    /// oneof member clears the other members of the oneof.
    ///
    /// # Panics
    ///
    /// Panics if `field` does not belong to this message type or `value`
    /// does not match the field's kind and cardinality.
    pub fn set_field(&mut self, field: &FieldDescriptor, value: Value) {
        let info = field_info(&self.descriptor, field);
        let slot = &mut self.store.slots[info.slot as usize];
        if field.is_map() {
            write_map(slot, info, field, value);
        } else if field.is_repeated() {
            write_list(slot, field, value);
        } else if info.presence == Presence::OneofMember {
            if !kind_matches(field.kind(), &value) {
                value_shape_panic(field, &value);
            }
            *slot = Slot::Oneof(Some(Box::new(OneofValue {
                number: info.number,
                value,
            })));
        } else {
            if !kind_matches(field.kind(), &value) {
                value_shape_panic(field, &value);
            }
            write_scalar(slot, value);
            if let Some(bit) = info.has_bit {
                self.store.set_has_bit(bit);
            }
        }
        self.store.cached_size.clear();
    }

    /// Whether the field is present: has-bit or slot state for explicit
    /// presence, non-default value for implicit presence, non-empty for
    /// repeated fields and maps.
    ///
    /// # Panics
    ///
    /// Panics if `field` does not belong to this message type.
    pub fn has_field(&self, field: &FieldDescriptor) -> bool {
        let info = field_info(&self.descriptor, field);
        let slot = &self.store.slots[info.slot as usize];
        match info.presence {
            Presence::OneofMember => {
                matches!(slot, Slot::Oneof(Some(ov)) if ov.number == info.number)
            }
            Presence::Explicit | Presence::Required => self.present(info, slot),
            Presence::Implicit => !slot.is_zero(),
        }
    }

    /// Resets the field to absent. Clearing an unset oneof member leaves
    /// whichever member is set alone.
    ///
    /// # Panics
    ///
    /// Panics if `field` does not belong to this message type.
    pub fn clear_field(&mut self, field: &FieldDescriptor) {
        let info = field_info(&self.descriptor, field);
        let slot = &mut self.store.slots[info.slot as usize];
        if info.presence == Presence::OneofMember {
            if matches!(slot, Slot::Oneof(Some(ov)) if ov.number == info.number) {
                *slot = Slot::Oneof(None);
            }
        } else {
            slot.clear();
            if let Some(bit) = info.has_bit {
                self.store.clear_has_bit(bit);
            }
        }
        self.store.cached_size.clear();
    }

    /// The member of `oneof` currently set, if any.
    ///
    /// # Panics
    ///
    /// Panics if `oneof` does not belong to this message type.
    pub fn which_oneof(&self, oneof: &OneofDescriptor) -> Option<FieldDescriptor> {
        assert!(
            oneof.containing_message() == self.descriptor,
            "oneof {} does not belong to {}",
            oneof.name(),
            self.descriptor.full_name()
        );
        let slot = self.descriptor.type_info().oneof_slots[oneof.index()];
        match &self.store.slots[slot as usize] {
            Slot::Oneof(Some(ov)) => self.descriptor.field_by_number(ov.number),
            _ => None,
        }
    }

    /// The extension's value, or its default when absent. A lazily stored
    /// message payload is decoded on first read and the result memoized.
    ///
    /// # Panics
    ///
    /// Panics if `ext` does not extend this message type.
    pub fn get_extension(&self, ext: &ExtensionDescriptor) -> Value {
        self.check_extendee(ext);
        match self.extension_entry(ext) {
            Some(entry) => entry.resolved(),
            None => ext.default_value(),
        }
    }

    /// Stores `value` in the extension.
    ///
    /// # Panics
    ///
    /// Panics if `ext` does not extend this message type or `value` does
    /// not match the extension's kind and cardinality.
    pub fn set_extension(&mut self, ext: &ExtensionDescriptor, value: Value) {
        self.check_extendee(ext);
        let ok = if ext.is_repeated() {
            match &value {
                Value::List(items) => items.iter().all(|v| kind_matches(ext.kind(), v)),
                _ => false,
            }
        } else {
            kind_matches(ext.kind(), &value)
        };
        assert!(
            ok,
            "cannot store a {} value in extension {} ({:?})",
            value.variant_name(),
            ext.full_name(),
            ext.kind()
        );
        self.store.extensions_mut().entries.insert(
            ext.number(),
            ExtensionField {
                descriptor: ext.clone(),
                value: ExtensionValue::Eager(value),
            },
        );
        self.store.cached_size.clear();
    }

    /// # Panics
    ///
    /// Panics if `ext` does not extend this message type.
    pub fn has_extension(&self, ext: &ExtensionDescriptor) -> bool {
        self.check_extendee(ext);
        self.extension_entry(ext).is_some()
    }

    /// # Panics
    ///
    /// Panics if `ext` does not extend this message type.
    pub fn clear_extension(&mut self, ext: &ExtensionDescriptor) {
        self.check_extendee(ext);
        if let Some(exts) = &mut self.store.extensions {
            exts.entries.remove(&ext.number());
        }
        self.store.cached_size.clear();
    }

    /// Records that decoded to no known field or extension, verbatim in
    /// arrival order. Re-encoding writes them back after all known fields.
    pub fn unknown_fields(&self) -> &[u8] {
        &self.store.unknown
    }

    pub fn clear_unknown_fields(&mut self) {
        self.store.unknown.clear();
        self.store.cached_size.clear();
    }

    /// Whether every required field is set, here and in every reachable
    /// submessage. Always true for types without required fields.
    pub fn is_initialized(&self) -> bool {
        find_missing_required(self).is_none()
    }

    /// Resets every field, extension and unknown record.
    pub fn clear(&mut self) {
        self.store.clear();
    }

    /// Serializes with default options.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        EncodeOptions::new().encode(self)
    }

    /// Serializes with `opts`.
    pub fn encode_to_vec_with(&self, opts: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
        opts.encode(self)
    }

    /// Exact size of the encoding, without producing it.
    pub fn encoded_len(&self) -> usize {
        encoding::encoded_len(self)
    }

    /// Parses a new message with default options.
    pub fn decode(descriptor: MessageDescriptor, buf: &[u8]) -> Result<DynamicMessage, DecodeError> {
        DecodeOptions::new().decode(descriptor, buf)
    }

    /// Parses a new message with `opts`.
    pub fn decode_with(
        descriptor: MessageDescriptor,
        buf: &[u8],
        opts: &DecodeOptions,
    ) -> Result<DynamicMessage, DecodeError> {
        opts.decode(descriptor, buf)
    }

    /// Parses `buf` into this message with default options. Scalars take
    /// the last value, repeated fields accumulate, submessages merge.
    pub fn merge_from(&mut self, buf: &[u8]) -> Result<(), DecodeError> {
        DecodeOptions::new().merge(self, buf)
    }

    /// Parses `buf` into this message with `opts`.
    pub fn merge_from_with(&mut self, buf: &[u8], opts: &DecodeOptions) -> Result<(), DecodeError> {
        opts.merge(self, buf)
    }

    fn present(&self, info: &FieldInfo, slot: &Slot) -> bool {
        match info.has_bit {
            Some(bit) => self.store.has_bit(bit),
            None => matches!(slot, Slot::Message(Some(_))),
        }
    }

    fn extension_entry(&self, ext: &ExtensionDescriptor) -> Option<&ExtensionField> {
        let entry = self.store.extensions.as_ref()?.entries.get(&ext.number())?;
        (entry.descriptor == *ext).then_some(entry)
    }

    fn check_extendee(&self, ext: &ExtensionDescriptor) {
        assert!(
            ext.extendee() == self.descriptor,
            "extension {} does not extend {}",
            ext.full_name(),
            self.descriptor.full_name()
        );
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor && self.store == other.store
    }
}

impl fmt::Debug for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.descriptor.name());
        for fd in self.descriptor.fields() {
            if !self.has_field(&fd) {
                continue;
            }
            let value = self.get_field(&fd);
            let enums = if fd.is_map() {
                fd.map_value_enum()
            } else {
                fd.enum_type()
            };
            s.field(
                fd.name(),
                &ValueDebug {
                    value: &value,
                    enums: enums.as_ref(),
                },
            );
        }
        if let Some(exts) = &self.store.extensions {
            let mut entries: Vec<&ExtensionField> = exts.entries.values().collect();
            entries.sort_by_key(|e| e.descriptor.number());
            for entry in entries {
                let name = format!("[{}]", entry.descriptor.full_name());
                let value = entry.resolved();
                let enums = entry.descriptor.enum_type();
                s.field(
                    &name,
                    &ValueDebug {
                        value: &value,
                        enums: enums.as_ref(),
                    },
                );
            }
        }
        s.finish()
    }
}

/// Renders a field value with enum numbers replaced by their declared
/// names when the type knows them.
struct ValueDebug<'a> {
    value: &'a Value,
    enums: Option<&'a EnumDescriptor>,
}

impl fmt::Debug for ValueDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Bool(v) => fmt::Debug::fmt(v, f),
            Value::I32(v) => fmt::Debug::fmt(v, f),
            Value::I64(v) => fmt::Debug::fmt(v, f),
            Value::U32(v) => fmt::Debug::fmt(v, f),
            Value::U64(v) => fmt::Debug::fmt(v, f),
            Value::F32(v) => fmt::Debug::fmt(v, f),
            Value::F64(v) => fmt::Debug::fmt(v, f),
            Value::Enum(n) => match self.enums.and_then(|e| e.value_name(*n)) {
                Some(name) => f.write_str(name),
                None => fmt::Debug::fmt(n, f),
            },
            Value::String(s) => fmt::Debug::fmt(s, f),
            Value::Bytes(b) => fmt::Debug::fmt(b, f),
            Value::Message(m) => fmt::Debug::fmt(m, f),
            Value::List(items) => f
                .debug_list()
                .entries(items.iter().map(|v| ValueDebug {
                    value: v,
                    enums: self.enums,
                }))
                .finish(),
            Value::Map(entries) => {
                let mut sorted: Vec<(&MapKey, &Value)> = entries.iter().collect();
                sorted.sort_by(|a, b| a.0.cmp(b.0));
                f.debug_map()
                    .entries(sorted.into_iter().map(|(k, v)| {
                        (
                            MapKeyDebug(k),
                            ValueDebug {
                                value: v,
                                enums: self.enums,
                            },
                        )
                    }))
                    .finish()
            }
        }
    }
}

struct MapKeyDebug<'a>(&'a MapKey);

impl fmt::Debug for MapKeyDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            MapKey::Bool(v) => fmt::Debug::fmt(v, f),
            MapKey::I32(v) => fmt::Debug::fmt(v, f),
            MapKey::I64(v) => fmt::Debug::fmt(v, f),
            MapKey::U32(v) => fmt::Debug::fmt(v, f),
            MapKey::U64(v) => fmt::Debug::fmt(v, f),
            MapKey::String(v) => fmt::Debug::fmt(v, f),
        }
    }
}

/// Interface for compiled-in wrapper types over a [`DynamicMessage`].
///
/// A generated type holds a `DynamicMessage` and exposes typed accessors;
/// implementing the two projections gives it the codec entry points for
/// free and keeps it interchangeable with fully dynamic use.
pub trait Protobuf {
    fn as_dynamic(&self) -> &DynamicMessage;
    fn as_dynamic_mut(&mut self) -> &mut DynamicMessage;

    fn descriptor(&self) -> MessageDescriptor {
        self.as_dynamic().descriptor().clone()
    }

    fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        self.as_dynamic().encode_to_vec()
    }

    fn encoded_len(&self) -> usize {
        self.as_dynamic().encoded_len()
    }

    fn merge_from(&mut self, buf: &[u8]) -> Result<(), DecodeError> {
        self.as_dynamic_mut().merge_from(buf)
    }

    fn is_initialized(&self) -> bool {
        self.as_dynamic().is_initialized()
    }
}

/// Full name of the first unset required field reachable from `msg`,
/// depth first through present submessages, repeated elements, map values
/// and already materialized extension messages.
pub(crate) fn find_missing_required(msg: &DynamicMessage) -> Option<String> {
    let info_table = msg.descriptor.type_info();
    for info in info_table.fields.iter() {
        if info.presence != Presence::Required {
            continue;
        }
        let present = match info.has_bit {
            Some(bit) => msg.store.has_bit(bit),
            None => matches!(&msg.store.slots[info.slot as usize], Slot::Message(Some(_))),
        };
        if !present {
            return Some(info.descriptor.full_name().to_string());
        }
    }
    for slot in msg.store.slots.iter() {
        let found = match slot {
            Slot::Message(Some(m)) => find_missing_required(m),
            Slot::RepeatedMessage(ms) => ms.iter().find_map(find_missing_required),
            Slot::Map(entries) => entries.values().find_map(value_missing_required),
            Slot::Oneof(Some(ov)) => value_missing_required(&ov.value),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    if let Some(exts) = &msg.store.extensions {
        for entry in exts.entries.values() {
            let found = match &entry.value {
                ExtensionValue::Eager(v) => value_missing_required(v),
                // An undecoded lazy payload is taken at face value; it is
                // checked once something forces the decode.
                ExtensionValue::Lazy { cell, .. } => match cell.get() {
                    Some(Some(m)) => find_missing_required(m),
                    _ => None,
                },
            };
            if found.is_some() {
                return found;
            }
        }
    }
    None
}

fn value_missing_required(v: &Value) -> Option<String> {
    match v {
        Value::Message(m) => find_missing_required(m),
        Value::List(items) => items.iter().find_map(value_missing_required),
        _ => None,
    }
}

fn field_info<'a>(desc: &'a MessageDescriptor, field: &FieldDescriptor) -> &'a FieldInfo {
    let info = desc.type_info().field(field.number());
    match info {
        Some(info) if info.descriptor == *field => info,
        _ => panic!(
            "field {} does not belong to {}",
            field.full_name(),
            desc.full_name()
        ),
    }
}

/// Whether `value` is the shape a singular field of `kind` stores.
fn kind_matches(kind: Kind, value: &Value) -> bool {
    matches!(
        (kind, value),
        (Kind::Bool, Value::Bool(_))
            | (Kind::Int32 | Kind::Sint32 | Kind::Sfixed32, Value::I32(_))
            | (Kind::Int64 | Kind::Sint64 | Kind::Sfixed64, Value::I64(_))
            | (Kind::Uint32 | Kind::Fixed32, Value::U32(_))
            | (Kind::Uint64 | Kind::Fixed64, Value::U64(_))
            | (Kind::Float, Value::F32(_))
            | (Kind::Double, Value::F64(_))
            | (Kind::Enum, Value::Enum(_))
            | (Kind::String, Value::String(_))
            | (Kind::Bytes, Value::Bytes(_))
            | (Kind::Message | Kind::Group, Value::Message(_))
    )
}

fn map_key_matches(kind: Kind, key: &MapKey) -> bool {
    matches!(
        (kind, key),
        (Kind::Bool, MapKey::Bool(_))
            | (Kind::Int32 | Kind::Sint32 | Kind::Sfixed32, MapKey::I32(_))
            | (Kind::Int64 | Kind::Sint64 | Kind::Sfixed64, MapKey::I64(_))
            | (Kind::Uint32 | Kind::Fixed32, MapKey::U32(_))
            | (Kind::Uint64 | Kind::Fixed64, MapKey::U64(_))
            | (Kind::String, MapKey::String(_))
    )
}

fn read_scalar(slot: &Slot) -> Value {
    match slot {
        Slot::Bool(v) => Value::Bool(*v),
        Slot::I32(v) => Value::I32(*v),
        Slot::I64(v) => Value::I64(*v),
        Slot::U32(v) => Value::U32(*v),
        Slot::U64(v) => Value::U64(*v),
        Slot::F32(v) => Value::F32(*v),
        Slot::F64(v) => Value::F64(*v),
        Slot::Enum(v) => Value::Enum(*v),
        Slot::String(s) => Value::String(s.clone()),
        Slot::Bytes(b) => Value::Bytes(b.clone()),
        Slot::Message(Some(m)) => Value::Message(m.clone()),
        Slot::Message(None) => unreachable!("presence checked before read"),
        other => panic!("singular read from {} slot", other.variant_name()),
    }
}

fn read_list(slot: &Slot) -> Value {
    let items: Vec<Value> = match slot {
        Slot::RepeatedBool(v) => v.iter().map(|&x| Value::Bool(x)).collect(),
        Slot::RepeatedI32(v) => v.iter().map(|&x| Value::I32(x)).collect(),
        Slot::RepeatedI64(v) => v.iter().map(|&x| Value::I64(x)).collect(),
        Slot::RepeatedU32(v) => v.iter().map(|&x| Value::U32(x)).collect(),
        Slot::RepeatedU64(v) => v.iter().map(|&x| Value::U64(x)).collect(),
        Slot::RepeatedF32(v) => v.iter().map(|&x| Value::F32(x)).collect(),
        Slot::RepeatedF64(v) => v.iter().map(|&x| Value::F64(x)).collect(),
        Slot::RepeatedEnum(v) => v.iter().map(|&x| Value::Enum(x)).collect(),
        Slot::RepeatedString(v) => v.iter().cloned().map(Value::String).collect(),
        Slot::RepeatedBytes(v) => v.iter().cloned().map(Value::Bytes).collect(),
        Slot::RepeatedMessage(v) => v
            .iter()
            .cloned()
            .map(|m| Value::Message(Box::new(m)))
            .collect(),
        other => panic!("repeated read from {} slot", other.variant_name()),
    };
    Value::List(items)
}

fn write_scalar(slot: &mut Slot, value: Value) {
    *slot = match value {
        Value::Bool(v) => Slot::Bool(v),
        Value::I32(v) => Slot::I32(v),
        Value::I64(v) => Slot::I64(v),
        Value::U32(v) => Slot::U32(v),
        Value::U64(v) => Slot::U64(v),
        Value::F32(v) => Slot::F32(v),
        Value::F64(v) => Slot::F64(v),
        Value::Enum(v) => Slot::Enum(v),
        Value::String(s) => Slot::String(s),
        Value::Bytes(b) => Slot::Bytes(b),
        Value::Message(m) => Slot::Message(Some(m)),
        other => panic!("singular write of a {} value", other.variant_name()),
    };
}

fn write_list(slot: &mut Slot, field: &FieldDescriptor, value: Value) {
    let Value::List(items) = value else {
        value_shape_panic(field, &value);
    };
    macro_rules! fill {
        ($dst:expr, $variant:path) => {{
            $dst.clear();
            for item in items {
                match item {
                    $variant(x) => $dst.push(x),
                    other => value_shape_panic(field, &other),
                }
            }
        }};
    }
    match slot {
        Slot::RepeatedBool(v) => fill!(v, Value::Bool),
        Slot::RepeatedI32(v) => fill!(v, Value::I32),
        Slot::RepeatedI64(v) => fill!(v, Value::I64),
        Slot::RepeatedU32(v) => fill!(v, Value::U32),
        Slot::RepeatedU64(v) => fill!(v, Value::U64),
        Slot::RepeatedF32(v) => fill!(v, Value::F32),
        Slot::RepeatedF64(v) => fill!(v, Value::F64),
        Slot::RepeatedEnum(v) => fill!(v, Value::Enum),
        Slot::RepeatedString(v) => fill!(v, Value::String),
        Slot::RepeatedBytes(v) => fill!(v, Value::Bytes),
        Slot::RepeatedMessage(v) => {
            v.clear();
            for item in items {
                match item {
                    Value::Message(m) => v.push(*m),
                    other => value_shape_panic(field, &other),
                }
            }
        }
        other => slot_shape_bug(field, other),
    }
}

fn write_map(slot: &mut Slot, info: &FieldInfo, field: &FieldDescriptor, value: Value) {
    let Value::Map(entries) = value else {
        value_shape_panic(field, &value);
    };
    let Some(map) = &info.map else {
        slot_shape_bug(field, slot);
    };
    for (k, v) in &entries {
        if !map_key_matches(map.key.kind, k) || !kind_matches(map.value.kind, v) {
            panic!("entry shape does not match map field {}", field.full_name());
        }
    }
    match slot {
        Slot::Map(m) => *m = entries,
        other => slot_shape_bug(field, other),
    }
}

fn value_shape_panic(field: &FieldDescriptor, value: &Value) -> ! {
    panic!(
        "cannot store a {} value in field {} ({:?} {:?})",
        value.variant_name(),
        field.full_name(),
        field.cardinality(),
        field.kind()
    )
}

fn slot_shape_bug(field: &FieldDescriptor, slot: &Slot) -> ! {
    panic!(
        "field {} laid out over a {} slot",
        field.full_name(),
        slot.variant_name()
    )
}
