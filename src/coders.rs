//! Field coder functions.
//!
//! A coder is a set of plain function pointers (size, marshal, unmarshal)
//! selected once per field when its codec table is built, so the per-record
//! work during encoding and decoding is one indirect call with no
//! per-record branching on kind or cardinality. [`select_coder`] is the
//! single place that maps a field's shape onto a coder; combinations the
//! descriptor pool is supposed to reject panic there rather than limp
//! along.
//!
//! Slot coders operate on a field's slot inside a [`FieldStore`]. Value
//! coders are the same three operations over a detached [`Value`], used
//! for map keys, map values and extension fields.
//!
//! Unmarshal functions return [`FieldError::Unknown`] for records that are
//! well-formed wire data but not acceptable for the field, a wire-type
//! mismatch or a closed enum's undeclared number; the parse loop routes
//! those records to unknown fields. Wire-level corruption is fatal.

use std::collections::HashMap;

use crate::containers::ProtoString;
use crate::decoding::{self, DecodeContext};
use crate::descriptor::{EnumDescriptor, FieldDescriptor, Kind, MessageDescriptor};
use crate::encoding::{self, EncodeContext, SizeOpts};
use crate::error::DecodeError;
use crate::reflection::DynamicMessage;
use crate::store::{FieldStore, OneofValue, Slot};
use crate::tables::{FieldInfo, Presence};
use crate::value::{MapKey, Value};
use crate::wire::{self, WireType};

/// Why a coder declined a record during unmarshal.
#[derive(Debug)]
pub(crate) enum FieldError {
    /// Well-formed but not decodable as this field; the record belongs in
    /// unknown fields.
    Unknown,
    Fatal(DecodeError),
}

impl From<DecodeError> for FieldError {
    fn from(e: DecodeError) -> FieldError {
        FieldError::Fatal(e)
    }
}

/// The three operations of one field's codec.
#[derive(Clone, Copy)]
pub(crate) struct CoderFuncs {
    pub(crate) size: fn(&FieldStore, &FieldInfo, SizeOpts) -> usize,
    pub(crate) marshal: fn(&FieldStore, &FieldInfo, &mut Vec<u8>, &mut EncodeContext),
    pub(crate) unmarshal:
        fn(&mut FieldStore, &FieldInfo, WireType, &[u8], &mut DecodeContext) -> Result<usize, FieldError>,
}

/// Codec over a detached [`Value`], for map entries and extensions.
#[derive(Clone, Copy)]
pub(crate) struct ValueCoderFuncs {
    pub(crate) size: fn(&Value, &ValueContext, SizeOpts) -> usize,
    pub(crate) marshal: fn(&Value, &ValueContext, &mut Vec<u8>, &mut EncodeContext),
    pub(crate) unmarshal:
        fn(&mut Value, &ValueContext, WireType, &[u8], &mut DecodeContext) -> Result<usize, FieldError>,
}

/// Everything a value coder needs to know about the field it serves.
pub(crate) struct ValueContext {
    pub(crate) number: u32,
    pub(crate) kind: Kind,
    /// Tag with the kind's native wire type; packed runs derive theirs.
    pub(crate) wire_tag: u32,
    pub(crate) tag_size: usize,
    pub(crate) child: Option<MessageDescriptor>,
    pub(crate) enum_desc: Option<EnumDescriptor>,
    pub(crate) validate_utf8: bool,
    pub(crate) full_name: String,
}

fn slot_panic(info: &FieldInfo, want: &str, got: &Slot) -> ! {
    panic!(
        "field {}: coder expected {} slot, found {}",
        info.descriptor.full_name(),
        want,
        got.variant_name()
    );
}

fn value_panic(name: &str, want: &str, got: &Value) -> ! {
    panic!("field {name}: value holds {} where {want} expected", got.variant_name());
}

#[inline]
fn has_bit_of(info: &FieldInfo) -> u32 {
    match info.has_bit {
        Some(bit) => bit,
        None => panic!(
            "field {}: explicit presence without a has-bit",
            info.descriptor.full_name()
        ),
    }
}

fn child_of(info: &FieldInfo) -> MessageDescriptor {
    match &info.child {
        Some(d) => d.clone(),
        None => panic!(
            "field {}: message coder without a message type",
            info.descriptor.full_name()
        ),
    }
}

fn value_child(ctx: &ValueContext) -> MessageDescriptor {
    match &ctx.child {
        Some(d) => d.clone(),
        None => panic!("field {}: message value without a message type", ctx.full_name),
    }
}

/// The value of the oneof member `info` describes, if it is the one set.
fn oneof_current<'a>(store: &'a FieldStore, info: &FieldInfo) -> Option<&'a Value> {
    match &store.slots[info.slot as usize] {
        Slot::Oneof(Some(v)) if v.number == info.number => Some(&v.value),
        Slot::Oneof(_) => None,
        other => slot_panic(info, "Oneof", other),
    }
}

/// Makes `info`'s member the set one, displacing any other member.
fn set_oneof(store: &mut FieldStore, info: &FieldInfo, value: Value) {
    match &mut store.slots[info.slot as usize] {
        Slot::Oneof(slot) => {
            *slot = Some(Box::new(OneofValue {
                number: info.number,
                value,
            }))
        }
        other => slot_panic(info, "Oneof", other),
    }
}

fn note_utf8_encode(ctx: &mut EncodeContext, name: &str) {
    if ctx.utf8_error.is_none() {
        ctx.utf8_error = Some(name.to_string());
    }
}

fn note_utf8_decode(ctx: &mut DecodeContext, name: &str) {
    if ctx.utf8_error.is_none() {
        ctx.utf8_error = Some(name.to_string());
    }
}

/// Stamps the coder families for one fixed-width or varint scalar kind:
/// slot accessors, the five slot coders and the element primitives the
/// value coders reuse.
macro_rules! scalar_coder {
    ($name:ident, $slot:ident, $repeated:ident, $value:ident, $ty:ty, $wt:expr,
     zero: |$zv:ident| $zero:expr,
     size: |$sv:ident| $size:expr,
     put: |$pb:ident, $pv:ident| $put:expr,
     get: |$gb:ident| $get:expr) => {
        pub(crate) mod $name {
            use super::*;

            #[inline]
            pub(crate) fn size_one($sv: $ty) -> usize {
                $size
            }

            #[inline]
            pub(crate) fn put_one($pb: &mut Vec<u8>, $pv: $ty) {
                $put
            }

            #[inline]
            pub(crate) fn get_one($gb: &[u8]) -> Result<($ty, usize), DecodeError> {
                $get
            }

            #[inline]
            fn is_zero($zv: $ty) -> bool {
                $zero
            }

            fn get(store: &FieldStore, info: &FieldInfo) -> $ty {
                match &store.slots[info.slot as usize] {
                    Slot::$slot(v) => *v,
                    other => slot_panic(info, stringify!($slot), other),
                }
            }

            fn set(store: &mut FieldStore, info: &FieldInfo, v: $ty) {
                match &mut store.slots[info.slot as usize] {
                    Slot::$slot(slot) => *slot = v,
                    other => slot_panic(info, stringify!($slot), other),
                }
            }

            fn elems<'a>(store: &'a FieldStore, info: &FieldInfo) -> &'a [$ty] {
                match &store.slots[info.slot as usize] {
                    Slot::$repeated(v) => v,
                    other => slot_panic(info, stringify!($repeated), other),
                }
            }

            fn elems_mut<'a>(store: &'a mut FieldStore, info: &FieldInfo) -> &'a mut Vec<$ty> {
                match &mut store.slots[info.slot as usize] {
                    Slot::$repeated(v) => v,
                    other => slot_panic(info, stringify!($repeated), other),
                }
            }

            fn size_implicit(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
                let v = get(store, info);
                if is_zero(v) {
                    return 0;
                }
                info.tag_size + size_one(v)
            }

            fn marshal_implicit(
                store: &FieldStore,
                info: &FieldInfo,
                buf: &mut Vec<u8>,
                _ctx: &mut EncodeContext,
            ) {
                let v = get(store, info);
                if is_zero(v) {
                    return;
                }
                wire::put_varint(buf, info.wire_tag as u64);
                put_one(buf, v);
            }

            fn size_explicit(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
                if !store.has_bit(has_bit_of(info)) {
                    return 0;
                }
                info.tag_size + size_one(get(store, info))
            }

            fn marshal_explicit(
                store: &FieldStore,
                info: &FieldInfo,
                buf: &mut Vec<u8>,
                _ctx: &mut EncodeContext,
            ) {
                if !store.has_bit(has_bit_of(info)) {
                    return;
                }
                wire::put_varint(buf, info.wire_tag as u64);
                put_one(buf, get(store, info));
            }

            fn unmarshal_singular(
                store: &mut FieldStore,
                info: &FieldInfo,
                wire_type: WireType,
                buf: &[u8],
                _ctx: &mut DecodeContext,
            ) -> Result<usize, FieldError> {
                if wire_type != $wt {
                    return Err(FieldError::Unknown);
                }
                let (v, n) = get_one(buf)?;
                set(store, info, v);
                if let Some(bit) = info.has_bit {
                    store.set_has_bit(bit);
                }
                Ok(n)
            }

            fn size_repeated(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
                let mut total = 0;
                for &v in elems(store, info) {
                    total += info.tag_size + size_one(v);
                }
                total
            }

            fn marshal_repeated(
                store: &FieldStore,
                info: &FieldInfo,
                buf: &mut Vec<u8>,
                _ctx: &mut EncodeContext,
            ) {
                for &v in elems(store, info) {
                    wire::put_varint(buf, info.wire_tag as u64);
                    put_one(buf, v);
                }
            }

            // Accepts both representations regardless of the field's own
            // packing, as required for wire compatibility.
            fn unmarshal_repeated(
                store: &mut FieldStore,
                info: &FieldInfo,
                wire_type: WireType,
                buf: &[u8],
                _ctx: &mut DecodeContext,
            ) -> Result<usize, FieldError> {
                if wire_type == WireType::LengthDelimited {
                    let (payload, consumed) = wire::get_bytes(buf)?;
                    let elems = elems_mut(store, info);
                    let mut pos = 0;
                    while pos < payload.len() {
                        let (v, n) = get_one(&payload[pos..])?;
                        elems.push(v);
                        pos += n;
                    }
                    return Ok(consumed);
                }
                if wire_type != $wt {
                    return Err(FieldError::Unknown);
                }
                let (v, n) = get_one(buf)?;
                elems_mut(store, info).push(v);
                Ok(n)
            }

            fn payload_size(elems: &[$ty]) -> usize {
                let mut total = 0;
                for &v in elems {
                    total += size_one(v);
                }
                total
            }

            fn size_packed(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
                let elems = elems(store, info);
                if elems.is_empty() {
                    return 0;
                }
                info.tag_size + wire::size_len_prefixed(payload_size(elems))
            }

            fn marshal_packed(
                store: &FieldStore,
                info: &FieldInfo,
                buf: &mut Vec<u8>,
                _ctx: &mut EncodeContext,
            ) {
                let elems = elems(store, info);
                if elems.is_empty() {
                    return;
                }
                wire::put_varint(buf, info.wire_tag as u64);
                wire::put_varint(buf, payload_size(elems) as u64);
                for &v in elems {
                    put_one(buf, v);
                }
            }

            fn size_oneof(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
                match oneof_current(store, info) {
                    Some(Value::$value(v)) => info.tag_size + size_one(*v),
                    Some(other) => value_panic(info.descriptor.full_name(), stringify!($value), other),
                    None => 0,
                }
            }

            fn marshal_oneof(
                store: &FieldStore,
                info: &FieldInfo,
                buf: &mut Vec<u8>,
                _ctx: &mut EncodeContext,
            ) {
                let v = match oneof_current(store, info) {
                    Some(Value::$value(v)) => *v,
                    Some(other) => value_panic(info.descriptor.full_name(), stringify!($value), other),
                    None => return,
                };
                wire::put_varint(buf, info.wire_tag as u64);
                put_one(buf, v);
            }

            fn unmarshal_oneof(
                store: &mut FieldStore,
                info: &FieldInfo,
                wire_type: WireType,
                buf: &[u8],
                _ctx: &mut DecodeContext,
            ) -> Result<usize, FieldError> {
                if wire_type != $wt {
                    return Err(FieldError::Unknown);
                }
                let (v, n) = get_one(buf)?;
                set_oneof(store, info, Value::$value(v));
                Ok(n)
            }

            pub(crate) const IMPLICIT: CoderFuncs = CoderFuncs {
                size: size_implicit,
                marshal: marshal_implicit,
                unmarshal: unmarshal_singular,
            };
            pub(crate) const EXPLICIT: CoderFuncs = CoderFuncs {
                size: size_explicit,
                marshal: marshal_explicit,
                unmarshal: unmarshal_singular,
            };
            pub(crate) const REPEATED: CoderFuncs = CoderFuncs {
                size: size_repeated,
                marshal: marshal_repeated,
                unmarshal: unmarshal_repeated,
            };
            pub(crate) const PACKED: CoderFuncs = CoderFuncs {
                size: size_packed,
                marshal: marshal_packed,
                unmarshal: unmarshal_repeated,
            };
            pub(crate) const ONEOF: CoderFuncs = CoderFuncs {
                size: size_oneof,
                marshal: marshal_oneof,
                unmarshal: unmarshal_oneof,
            };
        }
    };
}

scalar_coder!(boolean, Bool, RepeatedBool, Bool, bool, WireType::Varint,
    zero: |v| !v,
    size: |v| wire::size_varint(v as u64),
    put: |buf, v| wire::put_varint(buf, v as u64),
    get: |buf| wire::get_varint(buf).map(|(n, c)| (n != 0, c)));

scalar_coder!(int32, I32, RepeatedI32, I32, i32, WireType::Varint,
    zero: |v| v == 0,
    size: |v| wire::size_varint(v as i64 as u64),
    put: |buf, v| wire::put_varint(buf, v as i64 as u64),
    get: |buf| wire::get_varint(buf).map(|(n, c)| (n as i32, c)));

scalar_coder!(int64, I64, RepeatedI64, I64, i64, WireType::Varint,
    zero: |v| v == 0,
    size: |v| wire::size_varint(v as u64),
    put: |buf, v| wire::put_varint(buf, v as u64),
    get: |buf| wire::get_varint(buf).map(|(n, c)| (n as i64, c)));

scalar_coder!(uint32, U32, RepeatedU32, U32, u32, WireType::Varint,
    zero: |v| v == 0,
    size: |v| wire::size_varint(v as u64),
    put: |buf, v| wire::put_varint(buf, v as u64),
    get: |buf| wire::get_varint(buf).map(|(n, c)| (n as u32, c)));

scalar_coder!(uint64, U64, RepeatedU64, U64, u64, WireType::Varint,
    zero: |v| v == 0,
    size: |v| wire::size_varint(v),
    put: |buf, v| wire::put_varint(buf, v),
    get: |buf| wire::get_varint(buf));

scalar_coder!(sint32, I32, RepeatedI32, I32, i32, WireType::Varint,
    zero: |v| v == 0,
    size: |v| wire::size_varint(wire::zigzag_encode(v as i64)),
    put: |buf, v| wire::put_varint(buf, wire::zigzag_encode(v as i64)),
    get: |buf| wire::get_varint(buf).map(|(n, c)| (wire::zigzag_decode32(n), c)));

scalar_coder!(sint64, I64, RepeatedI64, I64, i64, WireType::Varint,
    zero: |v| v == 0,
    size: |v| wire::size_varint(wire::zigzag_encode(v)),
    put: |buf, v| wire::put_varint(buf, wire::zigzag_encode(v)),
    get: |buf| wire::get_varint(buf).map(|(n, c)| (wire::zigzag_decode(n), c)));

scalar_coder!(fixed32, U32, RepeatedU32, U32, u32, WireType::Fixed32,
    zero: |v| v == 0,
    size: |_v| 4,
    put: |buf, v| wire::put_fixed32(buf, v),
    get: |buf| wire::get_fixed32(buf));

scalar_coder!(fixed64, U64, RepeatedU64, U64, u64, WireType::Fixed64,
    zero: |v| v == 0,
    size: |_v| 8,
    put: |buf, v| wire::put_fixed64(buf, v),
    get: |buf| wire::get_fixed64(buf));

scalar_coder!(sfixed32, I32, RepeatedI32, I32, i32, WireType::Fixed32,
    zero: |v| v == 0,
    size: |_v| 4,
    put: |buf, v| wire::put_fixed32(buf, v as u32),
    get: |buf| wire::get_fixed32(buf).map(|(n, c)| (n as i32, c)));

scalar_coder!(sfixed64, I64, RepeatedI64, I64, i64, WireType::Fixed64,
    zero: |v| v == 0,
    size: |_v| 8,
    put: |buf, v| wire::put_fixed64(buf, v as u64),
    get: |buf| wire::get_fixed64(buf).map(|(n, c)| (n as i64, c)));

scalar_coder!(float, F32, RepeatedF32, F32, f32, WireType::Fixed32,
    zero: |v| v == 0.0,
    size: |_v| 4,
    put: |buf, v| wire::put_fixed32(buf, v.to_bits()),
    get: |buf| wire::get_fixed32(buf).map(|(n, c)| (f32::from_bits(n), c)));

scalar_coder!(double, F64, RepeatedF64, F64, f64, WireType::Fixed64,
    zero: |v| v == 0.0,
    size: |_v| 8,
    put: |buf, v| wire::put_fixed64(buf, v.to_bits()),
    get: |buf| wire::get_fixed64(buf).map(|(n, c)| (f64::from_bits(n), c)));

/// Enum coders. Same wire shape as int32, with one extra rule: numbers a
/// closed enum does not declare are not stored, they go back to unknown
/// fields, per element for packed runs and per record otherwise.
pub(crate) mod enum_coder {
    use super::*;

    #[inline]
    pub(crate) fn size_one(v: i32) -> usize {
        wire::size_varint(v as i64 as u64)
    }

    #[inline]
    pub(crate) fn put_one(buf: &mut Vec<u8>, v: i32) {
        wire::put_varint(buf, v as i64 as u64);
    }

    #[inline]
    pub(crate) fn get_one(buf: &[u8]) -> Result<(i32, usize), DecodeError> {
        wire::get_varint(buf).map(|(n, c)| (n as i32, c))
    }

    fn permitted(info: &FieldInfo, v: i32) -> bool {
        match &info.enum_desc {
            Some(e) if e.is_closed() => e.contains_number(v),
            _ => true,
        }
    }

    fn get(store: &FieldStore, info: &FieldInfo) -> i32 {
        match &store.slots[info.slot as usize] {
            Slot::Enum(v) => *v,
            other => slot_panic(info, "Enum", other),
        }
    }

    fn set(store: &mut FieldStore, info: &FieldInfo, v: i32) {
        match &mut store.slots[info.slot as usize] {
            Slot::Enum(slot) => *slot = v,
            other => slot_panic(info, "Enum", other),
        }
    }

    fn elems<'a>(store: &'a FieldStore, info: &FieldInfo) -> &'a [i32] {
        match &store.slots[info.slot as usize] {
            Slot::RepeatedEnum(v) => v,
            other => slot_panic(info, "RepeatedEnum", other),
        }
    }

    fn size_implicit(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        let v = get(store, info);
        if v == 0 {
            return 0;
        }
        info.tag_size + size_one(v)
    }

    fn marshal_implicit(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, _ctx: &mut EncodeContext) {
        let v = get(store, info);
        if v == 0 {
            return;
        }
        wire::put_varint(buf, info.wire_tag as u64);
        put_one(buf, v);
    }

    fn size_explicit(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        if !store.has_bit(has_bit_of(info)) {
            return 0;
        }
        info.tag_size + size_one(get(store, info))
    }

    fn marshal_explicit(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, _ctx: &mut EncodeContext) {
        if !store.has_bit(has_bit_of(info)) {
            return;
        }
        wire::put_varint(buf, info.wire_tag as u64);
        put_one(buf, get(store, info));
    }

    fn unmarshal_singular(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        _ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::Varint {
            return Err(FieldError::Unknown);
        }
        let (v, n) = get_one(buf)?;
        if !permitted(info, v) {
            return Err(FieldError::Unknown);
        }
        set(store, info, v);
        if let Some(bit) = info.has_bit {
            store.set_has_bit(bit);
        }
        Ok(n)
    }

    fn size_repeated(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        let mut total = 0;
        for &v in elems(store, info) {
            total += info.tag_size + size_one(v);
        }
        total
    }

    fn marshal_repeated(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, _ctx: &mut EncodeContext) {
        for &v in elems(store, info) {
            wire::put_varint(buf, info.wire_tag as u64);
            put_one(buf, v);
        }
    }

    fn unmarshal_repeated(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type == WireType::LengthDelimited {
            let (payload, consumed) = wire::get_bytes(buf)?;
            let mut pos = 0;
            while pos < payload.len() {
                let (v, n) = get_one(&payload[pos..])?;
                pos += n;
                if permitted(info, v) {
                    match &mut store.slots[info.slot as usize] {
                        Slot::RepeatedEnum(elems) => elems.push(v),
                        other => slot_panic(info, "RepeatedEnum", other),
                    }
                } else if !ctx.discard_unknown {
                    // Undeclared numbers leave the packed run as singular
                    // records so they survive a round trip.
                    wire::put_tag(&mut store.unknown, info.number, WireType::Varint);
                    put_one(&mut store.unknown, v);
                }
            }
            return Ok(consumed);
        }
        if wire_type != WireType::Varint {
            return Err(FieldError::Unknown);
        }
        let (v, n) = get_one(buf)?;
        if !permitted(info, v) {
            return Err(FieldError::Unknown);
        }
        match &mut store.slots[info.slot as usize] {
            Slot::RepeatedEnum(elems) => elems.push(v),
            other => slot_panic(info, "RepeatedEnum", other),
        }
        Ok(n)
    }

    fn payload_size(elems: &[i32]) -> usize {
        let mut total = 0;
        for &v in elems {
            total += size_one(v);
        }
        total
    }

    fn size_packed(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        let elems = elems(store, info);
        if elems.is_empty() {
            return 0;
        }
        info.tag_size + wire::size_len_prefixed(payload_size(elems))
    }

    fn marshal_packed(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, _ctx: &mut EncodeContext) {
        let elems = elems(store, info);
        if elems.is_empty() {
            return;
        }
        wire::put_varint(buf, info.wire_tag as u64);
        wire::put_varint(buf, payload_size(elems) as u64);
        for &v in elems {
            put_one(buf, v);
        }
    }

    fn size_oneof(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        match oneof_current(store, info) {
            Some(Value::Enum(v)) => info.tag_size + size_one(*v),
            Some(other) => value_panic(info.descriptor.full_name(), "Enum", other),
            None => 0,
        }
    }

    fn marshal_oneof(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, _ctx: &mut EncodeContext) {
        let v = match oneof_current(store, info) {
            Some(Value::Enum(v)) => *v,
            Some(other) => value_panic(info.descriptor.full_name(), "Enum", other),
            None => return,
        };
        wire::put_varint(buf, info.wire_tag as u64);
        put_one(buf, v);
    }

    fn unmarshal_oneof(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        _ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::Varint {
            return Err(FieldError::Unknown);
        }
        let (v, n) = get_one(buf)?;
        if !permitted(info, v) {
            return Err(FieldError::Unknown);
        }
        set_oneof(store, info, Value::Enum(v));
        Ok(n)
    }

    pub(crate) const IMPLICIT: CoderFuncs = CoderFuncs {
        size: size_implicit,
        marshal: marshal_implicit,
        unmarshal: unmarshal_singular,
    };
    pub(crate) const EXPLICIT: CoderFuncs = CoderFuncs {
        size: size_explicit,
        marshal: marshal_explicit,
        unmarshal: unmarshal_singular,
    };
    pub(crate) const REPEATED: CoderFuncs = CoderFuncs {
        size: size_repeated,
        marshal: marshal_repeated,
        unmarshal: unmarshal_repeated,
    };
    pub(crate) const PACKED: CoderFuncs = CoderFuncs {
        size: size_packed,
        marshal: marshal_packed,
        unmarshal: unmarshal_repeated,
    };
    pub(crate) const ONEOF: CoderFuncs = CoderFuncs {
        size: size_oneof,
        marshal: marshal_oneof,
        unmarshal: unmarshal_oneof,
    };
}

/// String coders. Payloads that fail UTF-8 validation are still stored and
/// still written; the first offender is remembered on the context and
/// surfaces when the whole operation finishes.
pub(crate) mod string_coder {
    use super::*;

    fn get<'a>(store: &'a FieldStore, info: &FieldInfo) -> &'a ProtoString {
        match &store.slots[info.slot as usize] {
            Slot::String(s) => s,
            other => slot_panic(info, "String", other),
        }
    }

    fn check_encode(info: &FieldInfo, s: &ProtoString, ctx: &mut EncodeContext) {
        if info.validate_utf8 && !s.is_valid_utf8() {
            note_utf8_encode(ctx, info.descriptor.full_name());
        }
    }

    fn size_implicit(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        let s = get(store, info);
        if s.is_empty() {
            return 0;
        }
        info.tag_size + wire::size_len_prefixed(s.len())
    }

    fn marshal_implicit(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
        let s = get(store, info);
        if s.is_empty() {
            return;
        }
        check_encode(info, s, ctx);
        wire::put_varint(buf, info.wire_tag as u64);
        wire::put_bytes(buf, s.as_bytes());
    }

    fn size_explicit(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        if !store.has_bit(has_bit_of(info)) {
            return 0;
        }
        info.tag_size + wire::size_len_prefixed(get(store, info).len())
    }

    fn marshal_explicit(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
        if !store.has_bit(has_bit_of(info)) {
            return;
        }
        let s = get(store, info);
        check_encode(info, s, ctx);
        wire::put_varint(buf, info.wire_tag as u64);
        wire::put_bytes(buf, s.as_bytes());
    }

    fn unmarshal_singular(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::LengthDelimited {
            return Err(FieldError::Unknown);
        }
        let (payload, valid, consumed) = wire::get_string(buf)?;
        if info.validate_utf8 && !valid {
            note_utf8_decode(ctx, info.descriptor.full_name());
        }
        match &mut store.slots[info.slot as usize] {
            Slot::String(s) => s.assign_bytes(payload),
            other => slot_panic(info, "String", other),
        }
        if let Some(bit) = info.has_bit {
            store.set_has_bit(bit);
        }
        Ok(consumed)
    }

    fn size_repeated(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        let elems = match &store.slots[info.slot as usize] {
            Slot::RepeatedString(v) => v,
            other => slot_panic(info, "RepeatedString", other),
        };
        let mut total = 0;
        for s in elems {
            total += info.tag_size + wire::size_len_prefixed(s.len());
        }
        total
    }

    fn marshal_repeated(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
        let elems = match &store.slots[info.slot as usize] {
            Slot::RepeatedString(v) => v,
            other => slot_panic(info, "RepeatedString", other),
        };
        for s in elems {
            check_encode(info, s, ctx);
            wire::put_varint(buf, info.wire_tag as u64);
            wire::put_bytes(buf, s.as_bytes());
        }
    }

    fn unmarshal_repeated(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::LengthDelimited {
            return Err(FieldError::Unknown);
        }
        let (payload, valid, consumed) = wire::get_string(buf)?;
        if info.validate_utf8 && !valid {
            note_utf8_decode(ctx, info.descriptor.full_name());
        }
        match &mut store.slots[info.slot as usize] {
            Slot::RepeatedString(elems) => elems.push(ProtoString::from_bytes(payload.to_vec())),
            other => slot_panic(info, "RepeatedString", other),
        }
        Ok(consumed)
    }

    fn size_oneof(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        match oneof_current(store, info) {
            Some(Value::String(s)) => info.tag_size + wire::size_len_prefixed(s.len()),
            Some(other) => value_panic(info.descriptor.full_name(), "String", other),
            None => 0,
        }
    }

    fn marshal_oneof(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
        let s = match oneof_current(store, info) {
            Some(Value::String(s)) => s,
            Some(other) => value_panic(info.descriptor.full_name(), "String", other),
            None => return,
        };
        if info.validate_utf8 && !s.is_valid_utf8() {
            note_utf8_encode(ctx, info.descriptor.full_name());
        }
        wire::put_varint(buf, info.wire_tag as u64);
        wire::put_bytes(buf, s.as_bytes());
    }

    fn unmarshal_oneof(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::LengthDelimited {
            return Err(FieldError::Unknown);
        }
        let (payload, valid, consumed) = wire::get_string(buf)?;
        if info.validate_utf8 && !valid {
            note_utf8_decode(ctx, info.descriptor.full_name());
        }
        set_oneof(store, info, Value::String(ProtoString::from_bytes(payload.to_vec())));
        Ok(consumed)
    }

    pub(crate) const IMPLICIT: CoderFuncs = CoderFuncs {
        size: size_implicit,
        marshal: marshal_implicit,
        unmarshal: unmarshal_singular,
    };
    pub(crate) const EXPLICIT: CoderFuncs = CoderFuncs {
        size: size_explicit,
        marshal: marshal_explicit,
        unmarshal: unmarshal_singular,
    };
    pub(crate) const REPEATED: CoderFuncs = CoderFuncs {
        size: size_repeated,
        marshal: marshal_repeated,
        unmarshal: unmarshal_repeated,
    };
    pub(crate) const ONEOF: CoderFuncs = CoderFuncs {
        size: size_oneof,
        marshal: marshal_oneof,
        unmarshal: unmarshal_oneof,
    };
}

pub(crate) mod bytes_coder {
    use super::*;

    fn get<'a>(store: &'a FieldStore, info: &FieldInfo) -> &'a Vec<u8> {
        match &store.slots[info.slot as usize] {
            Slot::Bytes(b) => b,
            other => slot_panic(info, "Bytes", other),
        }
    }

    fn size_implicit(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        let b = get(store, info);
        if b.is_empty() {
            return 0;
        }
        info.tag_size + wire::size_len_prefixed(b.len())
    }

    fn marshal_implicit(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, _ctx: &mut EncodeContext) {
        let b = get(store, info);
        if b.is_empty() {
            return;
        }
        wire::put_varint(buf, info.wire_tag as u64);
        wire::put_bytes(buf, b);
    }

    fn size_explicit(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        if !store.has_bit(has_bit_of(info)) {
            return 0;
        }
        info.tag_size + wire::size_len_prefixed(get(store, info).len())
    }

    fn marshal_explicit(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, _ctx: &mut EncodeContext) {
        if !store.has_bit(has_bit_of(info)) {
            return;
        }
        wire::put_varint(buf, info.wire_tag as u64);
        wire::put_bytes(buf, get(store, info));
    }

    fn unmarshal_singular(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        _ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::LengthDelimited {
            return Err(FieldError::Unknown);
        }
        let (payload, consumed) = wire::get_bytes(buf)?;
        match &mut store.slots[info.slot as usize] {
            Slot::Bytes(b) => {
                b.clear();
                b.extend_from_slice(payload);
            }
            other => slot_panic(info, "Bytes", other),
        }
        if let Some(bit) = info.has_bit {
            store.set_has_bit(bit);
        }
        Ok(consumed)
    }

    fn size_repeated(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        let elems = match &store.slots[info.slot as usize] {
            Slot::RepeatedBytes(v) => v,
            other => slot_panic(info, "RepeatedBytes", other),
        };
        let mut total = 0;
        for b in elems {
            total += info.tag_size + wire::size_len_prefixed(b.len());
        }
        total
    }

    fn marshal_repeated(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, _ctx: &mut EncodeContext) {
        let elems = match &store.slots[info.slot as usize] {
            Slot::RepeatedBytes(v) => v,
            other => slot_panic(info, "RepeatedBytes", other),
        };
        for b in elems {
            wire::put_varint(buf, info.wire_tag as u64);
            wire::put_bytes(buf, b);
        }
    }

    fn unmarshal_repeated(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        _ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::LengthDelimited {
            return Err(FieldError::Unknown);
        }
        let (payload, consumed) = wire::get_bytes(buf)?;
        match &mut store.slots[info.slot as usize] {
            Slot::RepeatedBytes(elems) => elems.push(payload.to_vec()),
            other => slot_panic(info, "RepeatedBytes", other),
        }
        Ok(consumed)
    }

    fn size_oneof(store: &FieldStore, info: &FieldInfo, _opts: SizeOpts) -> usize {
        match oneof_current(store, info) {
            Some(Value::Bytes(b)) => info.tag_size + wire::size_len_prefixed(b.len()),
            Some(other) => value_panic(info.descriptor.full_name(), "Bytes", other),
            None => 0,
        }
    }

    fn marshal_oneof(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, _ctx: &mut EncodeContext) {
        let b = match oneof_current(store, info) {
            Some(Value::Bytes(b)) => b,
            Some(other) => value_panic(info.descriptor.full_name(), "Bytes", other),
            None => return,
        };
        wire::put_varint(buf, info.wire_tag as u64);
        wire::put_bytes(buf, b);
    }

    fn unmarshal_oneof(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        _ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::LengthDelimited {
            return Err(FieldError::Unknown);
        }
        let (payload, consumed) = wire::get_bytes(buf)?;
        set_oneof(store, info, Value::Bytes(payload.to_vec()));
        Ok(consumed)
    }

    pub(crate) const IMPLICIT: CoderFuncs = CoderFuncs {
        size: size_implicit,
        marshal: marshal_implicit,
        unmarshal: unmarshal_singular,
    };
    pub(crate) const EXPLICIT: CoderFuncs = CoderFuncs {
        size: size_explicit,
        marshal: marshal_explicit,
        unmarshal: unmarshal_singular,
    };
    pub(crate) const REPEATED: CoderFuncs = CoderFuncs {
        size: size_repeated,
        marshal: marshal_repeated,
        unmarshal: unmarshal_repeated,
    };
    pub(crate) const ONEOF: CoderFuncs = CoderFuncs {
        size: size_oneof,
        marshal: marshal_oneof,
        unmarshal: unmarshal_oneof,
    };
}

/// Message and group coders. Submessage lengths come from the size pass
/// through each message's size cache, so marshal never re-walks children.
/// Unmarshal merges into an existing child when one is present.
pub(crate) mod message_coder {
    use super::*;

    fn get<'a>(store: &'a FieldStore, info: &FieldInfo) -> Option<&'a DynamicMessage> {
        match &store.slots[info.slot as usize] {
            Slot::Message(m) => m.as_deref(),
            other => slot_panic(info, "Message", other),
        }
    }

    fn get_or_insert<'a>(store: &'a mut FieldStore, info: &FieldInfo) -> &'a mut DynamicMessage {
        match &mut store.slots[info.slot as usize] {
            Slot::Message(m) => {
                m.get_or_insert_with(|| Box::new(DynamicMessage::new(child_of(info))))
            }
            other => slot_panic(info, "Message", other),
        }
    }

    fn elems<'a>(store: &'a FieldStore, info: &FieldInfo) -> &'a [DynamicMessage] {
        match &store.slots[info.slot as usize] {
            Slot::RepeatedMessage(v) => v,
            other => slot_panic(info, "RepeatedMessage", other),
        }
    }

    fn size_singular(store: &FieldStore, info: &FieldInfo, opts: SizeOpts) -> usize {
        match get(store, info) {
            Some(m) => info.tag_size + wire::size_len_prefixed(encoding::size_message(m, opts)),
            None => 0,
        }
    }

    fn marshal_singular(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
        let Some(m) = get(store, info) else { return };
        let n = encoding::size_message(m, SizeOpts { use_cached: true });
        wire::put_varint(buf, info.wire_tag as u64);
        wire::put_varint(buf, n as u64);
        encoding::marshal_message(m, buf, ctx);
    }

    fn unmarshal_singular(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::LengthDelimited {
            return Err(FieldError::Unknown);
        }
        let (payload, consumed) = wire::get_bytes(buf)?;
        decoding::merge_slice(get_or_insert(store, info), payload, ctx)?;
        Ok(consumed)
    }

    fn size_group(store: &FieldStore, info: &FieldInfo, opts: SizeOpts) -> usize {
        match get(store, info) {
            // Start and end tags encode to the same width.
            Some(m) => 2 * info.tag_size + encoding::size_message(m, opts),
            None => 0,
        }
    }

    fn marshal_group(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
        let Some(m) = get(store, info) else { return };
        wire::put_varint(buf, info.wire_tag as u64);
        encoding::marshal_message(m, buf, ctx);
        wire::put_tag(buf, info.number, WireType::EndGroup);
    }

    fn unmarshal_group(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::StartGroup {
            return Err(FieldError::Unknown);
        }
        let consumed = decoding::merge_group(get_or_insert(store, info), buf, info.number, ctx)?;
        Ok(consumed)
    }

    fn size_repeated(store: &FieldStore, info: &FieldInfo, opts: SizeOpts) -> usize {
        let mut total = 0;
        for m in elems(store, info) {
            total += info.tag_size + wire::size_len_prefixed(encoding::size_message(m, opts));
        }
        total
    }

    fn marshal_repeated(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
        for m in elems(store, info) {
            let n = encoding::size_message(m, SizeOpts { use_cached: true });
            wire::put_varint(buf, info.wire_tag as u64);
            wire::put_varint(buf, n as u64);
            encoding::marshal_message(m, buf, ctx);
        }
    }

    fn unmarshal_repeated(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::LengthDelimited {
            return Err(FieldError::Unknown);
        }
        let (payload, consumed) = wire::get_bytes(buf)?;
        let mut m = DynamicMessage::new(child_of(info));
        decoding::merge_slice(&mut m, payload, ctx)?;
        match &mut store.slots[info.slot as usize] {
            Slot::RepeatedMessage(elems) => elems.push(m),
            other => slot_panic(info, "RepeatedMessage", other),
        }
        Ok(consumed)
    }

    fn size_repeated_group(store: &FieldStore, info: &FieldInfo, opts: SizeOpts) -> usize {
        let mut total = 0;
        for m in elems(store, info) {
            total += 2 * info.tag_size + encoding::size_message(m, opts);
        }
        total
    }

    fn marshal_repeated_group(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
        for m in elems(store, info) {
            wire::put_varint(buf, info.wire_tag as u64);
            encoding::marshal_message(m, buf, ctx);
            wire::put_tag(buf, info.number, WireType::EndGroup);
        }
    }

    fn unmarshal_repeated_group(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::StartGroup {
            return Err(FieldError::Unknown);
        }
        let mut m = DynamicMessage::new(child_of(info));
        let consumed = decoding::merge_group(&mut m, buf, info.number, ctx)?;
        match &mut store.slots[info.slot as usize] {
            Slot::RepeatedMessage(elems) => elems.push(m),
            other => slot_panic(info, "RepeatedMessage", other),
        }
        Ok(consumed)
    }

    fn oneof_message<'a>(store: &'a FieldStore, info: &FieldInfo) -> Option<&'a DynamicMessage> {
        match oneof_current(store, info) {
            Some(Value::Message(m)) => Some(m),
            Some(other) => value_panic(info.descriptor.full_name(), "Message", other),
            None => None,
        }
    }

    fn size_oneof(store: &FieldStore, info: &FieldInfo, opts: SizeOpts) -> usize {
        match oneof_message(store, info) {
            Some(m) => info.tag_size + wire::size_len_prefixed(encoding::size_message(m, opts)),
            None => 0,
        }
    }

    fn marshal_oneof(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
        let Some(m) = oneof_message(store, info) else { return };
        let n = encoding::size_message(m, SizeOpts { use_cached: true });
        wire::put_varint(buf, info.wire_tag as u64);
        wire::put_varint(buf, n as u64);
        encoding::marshal_message(m, buf, ctx);
    }

    fn unmarshal_oneof(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::LengthDelimited {
            return Err(FieldError::Unknown);
        }
        let (payload, consumed) = wire::get_bytes(buf)?;
        // A record for the member already set merges; any other member is
        // displaced by a fresh message.
        if let Slot::Oneof(Some(v)) = &mut store.slots[info.slot as usize] {
            if v.number == info.number {
                if let Value::Message(m) = &mut v.value {
                    decoding::merge_slice(m, payload, ctx)?;
                    return Ok(consumed);
                }
            }
        }
        let mut m = DynamicMessage::new(child_of(info));
        decoding::merge_slice(&mut m, payload, ctx)?;
        set_oneof(store, info, Value::Message(Box::new(m)));
        Ok(consumed)
    }

    fn size_oneof_group(store: &FieldStore, info: &FieldInfo, opts: SizeOpts) -> usize {
        match oneof_message(store, info) {
            Some(m) => 2 * info.tag_size + encoding::size_message(m, opts),
            None => 0,
        }
    }

    fn marshal_oneof_group(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
        let Some(m) = oneof_message(store, info) else { return };
        wire::put_varint(buf, info.wire_tag as u64);
        encoding::marshal_message(m, buf, ctx);
        wire::put_tag(buf, info.number, WireType::EndGroup);
    }

    fn unmarshal_oneof_group(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::StartGroup {
            return Err(FieldError::Unknown);
        }
        if let Slot::Oneof(Some(v)) = &mut store.slots[info.slot as usize] {
            if v.number == info.number {
                if let Value::Message(m) = &mut v.value {
                    return Ok(decoding::merge_group(m, buf, info.number, ctx)?);
                }
            }
        }
        let mut m = DynamicMessage::new(child_of(info));
        let consumed = decoding::merge_group(&mut m, buf, info.number, ctx)?;
        set_oneof(store, info, Value::Message(Box::new(m)));
        Ok(consumed)
    }

    pub(crate) const SINGULAR: CoderFuncs = CoderFuncs {
        size: size_singular,
        marshal: marshal_singular,
        unmarshal: unmarshal_singular,
    };
    pub(crate) const GROUP: CoderFuncs = CoderFuncs {
        size: size_group,
        marshal: marshal_group,
        unmarshal: unmarshal_group,
    };
    pub(crate) const REPEATED: CoderFuncs = CoderFuncs {
        size: size_repeated,
        marshal: marshal_repeated,
        unmarshal: unmarshal_repeated,
    };
    pub(crate) const REPEATED_GROUP: CoderFuncs = CoderFuncs {
        size: size_repeated_group,
        marshal: marshal_repeated_group,
        unmarshal: unmarshal_repeated_group,
    };
    pub(crate) const ONEOF: CoderFuncs = CoderFuncs {
        size: size_oneof,
        marshal: marshal_oneof,
        unmarshal: unmarshal_oneof,
    };
    pub(crate) const ONEOF_GROUP: CoderFuncs = CoderFuncs {
        size: size_oneof_group,
        marshal: marshal_oneof_group,
        unmarshal: unmarshal_oneof_group,
    };
}

/// Map coders. Each entry is a nested message with the key on field 1 and
/// the value on field 2; both are always emitted, defaults included. On
/// decode, a missing key or value falls back to its default, numbers other
/// than 1 and 2 inside an entry are skipped, and an entry whose key or
/// value is not acceptable (a closed enum's undeclared number) is routed
/// to unknown fields whole.
pub(crate) mod map_coder {
    use super::*;
    use crate::tables::MapInfo;

    fn map_info(info: &FieldInfo) -> &MapInfo {
        match &info.map {
            Some(m) => m,
            None => panic!("field {}: map coder without map info", info.descriptor.full_name()),
        }
    }

    fn get<'a>(store: &'a FieldStore, info: &FieldInfo) -> &'a HashMap<MapKey, Value> {
        match &store.slots[info.slot as usize] {
            Slot::Map(m) => m,
            other => slot_panic(info, "Map", other),
        }
    }

    fn entry_size(mi: &MapInfo, key: &MapKey, value: &Value, opts: SizeOpts) -> usize {
        let key_value = key.clone().into_value();
        (mi.key_coder.size)(&key_value, &mi.key, opts) + (mi.value_coder.size)(value, &mi.value, opts)
    }

    fn size_field(store: &FieldStore, info: &FieldInfo, opts: SizeOpts) -> usize {
        let mi = map_info(info);
        let mut total = 0;
        for (key, value) in get(store, info) {
            total += info.tag_size + wire::size_len_prefixed(entry_size(mi, key, value, opts));
        }
        total
    }

    fn marshal_entry(
        mi: &MapInfo,
        info: &FieldInfo,
        key: &MapKey,
        value: &Value,
        buf: &mut Vec<u8>,
        ctx: &mut EncodeContext,
    ) {
        let entry_len = entry_size(mi, key, value, SizeOpts { use_cached: true });
        wire::put_varint(buf, info.wire_tag as u64);
        wire::put_varint(buf, entry_len as u64);
        let key_value = key.clone().into_value();
        (mi.key_coder.marshal)(&key_value, &mi.key, buf, ctx);
        (mi.value_coder.marshal)(value, &mi.value, buf, ctx);
    }

    fn marshal_field(store: &FieldStore, info: &FieldInfo, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
        let entries = get(store, info);
        if entries.is_empty() {
            return;
        }
        let mi = map_info(info);
        if ctx.deterministic {
            let mut keys: Vec<&MapKey> = entries.keys().collect();
            keys.sort();
            for key in keys {
                marshal_entry(mi, info, key, &entries[key], buf, ctx);
            }
        } else {
            for (key, value) in entries {
                marshal_entry(mi, info, key, value, buf, ctx);
            }
        }
    }

    fn unmarshal_field(
        store: &mut FieldStore,
        info: &FieldInfo,
        wire_type: WireType,
        buf: &[u8],
        ctx: &mut DecodeContext,
    ) -> Result<usize, FieldError> {
        if wire_type != WireType::LengthDelimited {
            return Err(FieldError::Unknown);
        }
        let (payload, consumed) = wire::get_bytes(buf)?;
        let mi = map_info(info);

        let mut key_value = MapKey::default_for(mi.key.kind).into_value();
        let mut value = zero_value(&mi.value);
        let mut pos = 0;
        while pos < payload.len() {
            let (number, wt, n) = wire::get_tag(&payload[pos..])?;
            pos += n;
            match number {
                1 => pos += (mi.key_coder.unmarshal)(&mut key_value, &mi.key, wt, &payload[pos..], ctx)?,
                2 => pos += (mi.value_coder.unmarshal)(&mut value, &mi.value, wt, &payload[pos..], ctx)?,
                _ => pos += wire::skip_field(&payload[pos..], number, wt)?,
            }
        }

        let Some(key) = MapKey::from_value(key_value) else {
            panic!("field {}: map key kind mismatch", info.descriptor.full_name());
        };
        match &mut store.slots[info.slot as usize] {
            Slot::Map(entries) => {
                entries.insert(key, value);
            }
            other => slot_panic(info, "Map", other),
        }
        Ok(consumed)
    }

    pub(crate) const MAP: CoderFuncs = CoderFuncs {
        size: size_field,
        marshal: marshal_field,
        unmarshal: unmarshal_field,
    };
}

/// The default a detached value starts from before a record merges into
/// it. Closed enums default to their first declared number.
pub(crate) fn zero_value(ctx: &ValueContext) -> Value {
    match ctx.kind {
        Kind::Message | Kind::Group => {
            Value::Message(Box::new(DynamicMessage::new(value_child(ctx))))
        }
        Kind::Enum => Value::Enum(ctx.enum_desc.as_ref().map_or(0, |e| e.default_number())),
        kind => Value::default_for_scalar(kind),
    }
}

fn size_value_body(v: &Value, ctx: &ValueContext, opts: SizeOpts) -> usize {
    match (ctx.kind, v) {
        (Kind::Bool, Value::Bool(x)) => boolean::size_one(*x),
        (Kind::Int32, Value::I32(x)) => int32::size_one(*x),
        (Kind::Int64, Value::I64(x)) => int64::size_one(*x),
        (Kind::Uint32, Value::U32(x)) => uint32::size_one(*x),
        (Kind::Uint64, Value::U64(x)) => uint64::size_one(*x),
        (Kind::Sint32, Value::I32(x)) => sint32::size_one(*x),
        (Kind::Sint64, Value::I64(x)) => sint64::size_one(*x),
        (Kind::Fixed32, Value::U32(_)) | (Kind::Sfixed32, Value::I32(_)) => 4,
        (Kind::Fixed64, Value::U64(_)) | (Kind::Sfixed64, Value::I64(_)) => 8,
        (Kind::Float, Value::F32(_)) => 4,
        (Kind::Double, Value::F64(_)) => 8,
        (Kind::Enum, Value::Enum(x)) => enum_coder::size_one(*x),
        (Kind::String, Value::String(s)) => wire::size_len_prefixed(s.len()),
        (Kind::Bytes, Value::Bytes(b)) => wire::size_len_prefixed(b.len()),
        (Kind::Message, Value::Message(m)) => {
            wire::size_len_prefixed(encoding::size_message(m, opts))
        }
        // Group body plus its end tag; the start tag is the caller's.
        (Kind::Group, Value::Message(m)) => encoding::size_message(m, opts) + ctx.tag_size,
        (kind, other) => value_panic(&ctx.full_name, kind_variant_name(kind), other),
    }
}

fn marshal_value_body(v: &Value, ctx: &ValueContext, buf: &mut Vec<u8>, ectx: &mut EncodeContext) {
    match (ctx.kind, v) {
        (Kind::Bool, Value::Bool(x)) => boolean::put_one(buf, *x),
        (Kind::Int32, Value::I32(x)) => int32::put_one(buf, *x),
        (Kind::Int64, Value::I64(x)) => int64::put_one(buf, *x),
        (Kind::Uint32, Value::U32(x)) => uint32::put_one(buf, *x),
        (Kind::Uint64, Value::U64(x)) => uint64::put_one(buf, *x),
        (Kind::Sint32, Value::I32(x)) => sint32::put_one(buf, *x),
        (Kind::Sint64, Value::I64(x)) => sint64::put_one(buf, *x),
        (Kind::Fixed32, Value::U32(x)) => fixed32::put_one(buf, *x),
        (Kind::Fixed64, Value::U64(x)) => fixed64::put_one(buf, *x),
        (Kind::Sfixed32, Value::I32(x)) => sfixed32::put_one(buf, *x),
        (Kind::Sfixed64, Value::I64(x)) => sfixed64::put_one(buf, *x),
        (Kind::Float, Value::F32(x)) => float::put_one(buf, *x),
        (Kind::Double, Value::F64(x)) => double::put_one(buf, *x),
        (Kind::Enum, Value::Enum(x)) => enum_coder::put_one(buf, *x),
        (Kind::String, Value::String(s)) => {
            if ctx.validate_utf8 && !s.is_valid_utf8() {
                note_utf8_encode(ectx, &ctx.full_name);
            }
            wire::put_bytes(buf, s.as_bytes());
        }
        (Kind::Bytes, Value::Bytes(b)) => wire::put_bytes(buf, b),
        (Kind::Message, Value::Message(m)) => {
            let n = encoding::size_message(m, SizeOpts { use_cached: true });
            wire::put_varint(buf, n as u64);
            encoding::marshal_message(m, buf, ectx);
        }
        (Kind::Group, Value::Message(m)) => {
            encoding::marshal_message(m, buf, ectx);
            wire::put_tag(buf, ctx.number, WireType::EndGroup);
        }
        (kind, other) => value_panic(&ctx.full_name, kind_variant_name(kind), other),
    }
}

fn size_singular_value(v: &Value, ctx: &ValueContext, opts: SizeOpts) -> usize {
    ctx.tag_size + size_value_body(v, ctx, opts)
}

fn marshal_singular_value(v: &Value, ctx: &ValueContext, buf: &mut Vec<u8>, ectx: &mut EncodeContext) {
    wire::put_varint(buf, ctx.wire_tag as u64);
    marshal_value_body(v, ctx, buf, ectx);
}

fn unmarshal_singular_value(
    v: &mut Value,
    ctx: &ValueContext,
    wire_type: WireType,
    buf: &[u8],
    dctx: &mut DecodeContext,
) -> Result<usize, FieldError> {
    if wire_type != ctx.kind.wire_type() {
        return Err(FieldError::Unknown);
    }
    match ctx.kind {
        Kind::Bool => {
            let (x, n) = boolean::get_one(buf)?;
            *v = Value::Bool(x);
            Ok(n)
        }
        Kind::Int32 => {
            let (x, n) = int32::get_one(buf)?;
            *v = Value::I32(x);
            Ok(n)
        }
        Kind::Int64 => {
            let (x, n) = int64::get_one(buf)?;
            *v = Value::I64(x);
            Ok(n)
        }
        Kind::Uint32 => {
            let (x, n) = uint32::get_one(buf)?;
            *v = Value::U32(x);
            Ok(n)
        }
        Kind::Uint64 => {
            let (x, n) = uint64::get_one(buf)?;
            *v = Value::U64(x);
            Ok(n)
        }
        Kind::Sint32 => {
            let (x, n) = sint32::get_one(buf)?;
            *v = Value::I32(x);
            Ok(n)
        }
        Kind::Sint64 => {
            let (x, n) = sint64::get_one(buf)?;
            *v = Value::I64(x);
            Ok(n)
        }
        Kind::Fixed32 => {
            let (x, n) = fixed32::get_one(buf)?;
            *v = Value::U32(x);
            Ok(n)
        }
        Kind::Fixed64 => {
            let (x, n) = fixed64::get_one(buf)?;
            *v = Value::U64(x);
            Ok(n)
        }
        Kind::Sfixed32 => {
            let (x, n) = sfixed32::get_one(buf)?;
            *v = Value::I32(x);
            Ok(n)
        }
        Kind::Sfixed64 => {
            let (x, n) = sfixed64::get_one(buf)?;
            *v = Value::I64(x);
            Ok(n)
        }
        Kind::Float => {
            let (x, n) = float::get_one(buf)?;
            *v = Value::F32(x);
            Ok(n)
        }
        Kind::Double => {
            let (x, n) = double::get_one(buf)?;
            *v = Value::F64(x);
            Ok(n)
        }
        Kind::Enum => {
            let (x, n) = enum_coder::get_one(buf)?;
            if let Some(e) = &ctx.enum_desc {
                if e.is_closed() && !e.contains_number(x) {
                    return Err(FieldError::Unknown);
                }
            }
            *v = Value::Enum(x);
            Ok(n)
        }
        Kind::String => {
            let (payload, valid, consumed) = wire::get_string(buf)?;
            if ctx.validate_utf8 && !valid {
                note_utf8_decode(dctx, &ctx.full_name);
            }
            *v = Value::String(ProtoString::from_bytes(payload.to_vec()));
            Ok(consumed)
        }
        Kind::Bytes => {
            let (payload, consumed) = wire::get_bytes(buf)?;
            *v = Value::Bytes(payload.to_vec());
            Ok(consumed)
        }
        Kind::Message => {
            let (payload, consumed) = wire::get_bytes(buf)?;
            let Value::Message(m) = v else {
                value_panic(&ctx.full_name, "Message", v)
            };
            decoding::merge_slice(m, payload, dctx)?;
            Ok(consumed)
        }
        Kind::Group => {
            let Value::Message(m) = v else {
                value_panic(&ctx.full_name, "Message", v)
            };
            Ok(decoding::merge_group(m, buf, ctx.number, dctx)?)
        }
    }
}

fn repeated_items<'a>(v: &'a Value, ctx: &ValueContext) -> &'a [Value] {
    match v {
        Value::List(items) => items,
        other => value_panic(&ctx.full_name, "List", other),
    }
}

fn size_repeated_value(v: &Value, ctx: &ValueContext, opts: SizeOpts) -> usize {
    let mut total = 0;
    for item in repeated_items(v, ctx) {
        total += ctx.tag_size + size_value_body(item, ctx, opts);
    }
    total
}

fn marshal_repeated_value(v: &Value, ctx: &ValueContext, buf: &mut Vec<u8>, ectx: &mut EncodeContext) {
    for item in repeated_items(v, ctx) {
        wire::put_varint(buf, ctx.wire_tag as u64);
        marshal_value_body(item, ctx, buf, ectx);
    }
}

fn unmarshal_repeated_value(
    v: &mut Value,
    ctx: &ValueContext,
    wire_type: WireType,
    buf: &[u8],
    dctx: &mut DecodeContext,
) -> Result<usize, FieldError> {
    if wire_type == WireType::LengthDelimited && ctx.kind.is_packable() {
        let (payload, consumed) = wire::get_bytes(buf)?;
        // Parsed into a side list first: a rejected element sends the whole
        // record back to the caller untouched.
        let mut parsed = Vec::new();
        let mut pos = 0;
        while pos < payload.len() {
            let mut item = zero_value(ctx);
            pos += unmarshal_singular_value(&mut item, ctx, ctx.kind.wire_type(), &payload[pos..], dctx)?;
            parsed.push(item);
        }
        let Value::List(items) = v else {
            value_panic(&ctx.full_name, "List", v)
        };
        items.append(&mut parsed);
        return Ok(consumed);
    }
    let mut item = zero_value(ctx);
    let n = unmarshal_singular_value(&mut item, ctx, wire_type, buf, dctx)?;
    let Value::List(items) = v else {
        value_panic(&ctx.full_name, "List", v)
    };
    items.push(item);
    Ok(n)
}

fn packed_wire_tag(ctx: &ValueContext) -> u64 {
    (ctx.wire_tag & !7 | WireType::LengthDelimited as u32) as u64
}

fn size_packed_value(v: &Value, ctx: &ValueContext, opts: SizeOpts) -> usize {
    let items = repeated_items(v, ctx);
    if items.is_empty() {
        return 0;
    }
    let mut body = 0;
    for item in items {
        body += size_value_body(item, ctx, opts);
    }
    ctx.tag_size + wire::size_len_prefixed(body)
}

fn marshal_packed_value(v: &Value, ctx: &ValueContext, buf: &mut Vec<u8>, ectx: &mut EncodeContext) {
    let items = repeated_items(v, ctx);
    if items.is_empty() {
        return;
    }
    let mut body = 0;
    for item in items {
        body += size_value_body(item, ctx, SizeOpts { use_cached: true });
    }
    wire::put_varint(buf, packed_wire_tag(ctx));
    wire::put_varint(buf, body as u64);
    for item in items {
        marshal_value_body(item, ctx, buf, ectx);
    }
}

pub(crate) const SINGULAR_VALUE: ValueCoderFuncs = ValueCoderFuncs {
    size: size_singular_value,
    marshal: marshal_singular_value,
    unmarshal: unmarshal_singular_value,
};
pub(crate) const REPEATED_VALUE: ValueCoderFuncs = ValueCoderFuncs {
    size: size_repeated_value,
    marshal: marshal_repeated_value,
    unmarshal: unmarshal_repeated_value,
};
pub(crate) const PACKED_VALUE: ValueCoderFuncs = ValueCoderFuncs {
    size: size_packed_value,
    marshal: marshal_packed_value,
    unmarshal: unmarshal_repeated_value,
};

fn kind_variant_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Bool => "Bool",
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => "I32",
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => "I64",
        Kind::Uint32 | Kind::Fixed32 => "U32",
        Kind::Uint64 | Kind::Fixed64 => "U64",
        Kind::Float => "F32",
        Kind::Double => "F64",
        Kind::Enum => "Enum",
        Kind::String => "String",
        Kind::Bytes => "Bytes",
        Kind::Message | Kind::Group => "Message",
    }
}

/// Maps one field's shape onto its coder. Shapes the descriptor pool
/// rejects have no coder and panic here.
pub(crate) fn select_coder(fd: &FieldDescriptor, presence: Presence) -> CoderFuncs {
    if fd.is_map() {
        return map_coder::MAP;
    }
    if fd.is_repeated() {
        if fd.is_packed() {
            return match fd.kind() {
                Kind::Bool => boolean::PACKED,
                Kind::Int32 => int32::PACKED,
                Kind::Int64 => int64::PACKED,
                Kind::Uint32 => uint32::PACKED,
                Kind::Uint64 => uint64::PACKED,
                Kind::Sint32 => sint32::PACKED,
                Kind::Sint64 => sint64::PACKED,
                Kind::Fixed32 => fixed32::PACKED,
                Kind::Fixed64 => fixed64::PACKED,
                Kind::Sfixed32 => sfixed32::PACKED,
                Kind::Sfixed64 => sfixed64::PACKED,
                Kind::Float => float::PACKED,
                Kind::Double => double::PACKED,
                Kind::Enum => enum_coder::PACKED,
                kind => panic!("field {}: packed coder for unpackable kind {kind:?}", fd.full_name()),
            };
        }
        return match fd.kind() {
            Kind::Bool => boolean::REPEATED,
            Kind::Int32 => int32::REPEATED,
            Kind::Int64 => int64::REPEATED,
            Kind::Uint32 => uint32::REPEATED,
            Kind::Uint64 => uint64::REPEATED,
            Kind::Sint32 => sint32::REPEATED,
            Kind::Sint64 => sint64::REPEATED,
            Kind::Fixed32 => fixed32::REPEATED,
            Kind::Fixed64 => fixed64::REPEATED,
            Kind::Sfixed32 => sfixed32::REPEATED,
            Kind::Sfixed64 => sfixed64::REPEATED,
            Kind::Float => float::REPEATED,
            Kind::Double => double::REPEATED,
            Kind::Enum => enum_coder::REPEATED,
            Kind::String => string_coder::REPEATED,
            Kind::Bytes => bytes_coder::REPEATED,
            Kind::Message => message_coder::REPEATED,
            Kind::Group => message_coder::REPEATED_GROUP,
        };
    }
    if presence == Presence::OneofMember {
        return match fd.kind() {
            Kind::Bool => boolean::ONEOF,
            Kind::Int32 => int32::ONEOF,
            Kind::Int64 => int64::ONEOF,
            Kind::Uint32 => uint32::ONEOF,
            Kind::Uint64 => uint64::ONEOF,
            Kind::Sint32 => sint32::ONEOF,
            Kind::Sint64 => sint64::ONEOF,
            Kind::Fixed32 => fixed32::ONEOF,
            Kind::Fixed64 => fixed64::ONEOF,
            Kind::Sfixed32 => sfixed32::ONEOF,
            Kind::Sfixed64 => sfixed64::ONEOF,
            Kind::Float => float::ONEOF,
            Kind::Double => double::ONEOF,
            Kind::Enum => enum_coder::ONEOF,
            Kind::String => string_coder::ONEOF,
            Kind::Bytes => bytes_coder::ONEOF,
            Kind::Message => message_coder::ONEOF,
            Kind::Group => message_coder::ONEOF_GROUP,
        };
    }
    match fd.kind() {
        Kind::Message => message_coder::SINGULAR,
        Kind::Group => message_coder::GROUP,
        kind => {
            let explicit = matches!(presence, Presence::Explicit | Presence::Required);
            match (kind, explicit) {
                (Kind::Bool, false) => boolean::IMPLICIT,
                (Kind::Bool, true) => boolean::EXPLICIT,
                (Kind::Int32, false) => int32::IMPLICIT,
                (Kind::Int32, true) => int32::EXPLICIT,
                (Kind::Int64, false) => int64::IMPLICIT,
                (Kind::Int64, true) => int64::EXPLICIT,
                (Kind::Uint32, false) => uint32::IMPLICIT,
                (Kind::Uint32, true) => uint32::EXPLICIT,
                (Kind::Uint64, false) => uint64::IMPLICIT,
                (Kind::Uint64, true) => uint64::EXPLICIT,
                (Kind::Sint32, false) => sint32::IMPLICIT,
                (Kind::Sint32, true) => sint32::EXPLICIT,
                (Kind::Sint64, false) => sint64::IMPLICIT,
                (Kind::Sint64, true) => sint64::EXPLICIT,
                (Kind::Fixed32, false) => fixed32::IMPLICIT,
                (Kind::Fixed32, true) => fixed32::EXPLICIT,
                (Kind::Fixed64, false) => fixed64::IMPLICIT,
                (Kind::Fixed64, true) => fixed64::EXPLICIT,
                (Kind::Sfixed32, false) => sfixed32::IMPLICIT,
                (Kind::Sfixed32, true) => sfixed32::EXPLICIT,
                (Kind::Sfixed64, false) => sfixed64::IMPLICIT,
                (Kind::Sfixed64, true) => sfixed64::EXPLICIT,
                (Kind::Float, false) => float::IMPLICIT,
                (Kind::Float, true) => float::EXPLICIT,
                (Kind::Double, false) => double::IMPLICIT,
                (Kind::Double, true) => double::EXPLICIT,
                (Kind::Enum, false) => enum_coder::IMPLICIT,
                (Kind::Enum, true) => enum_coder::EXPLICIT,
                (Kind::String, false) => string_coder::IMPLICIT,
                (Kind::String, true) => string_coder::EXPLICIT,
                (Kind::Bytes, false) => bytes_coder::IMPLICIT,
                (Kind::Bytes, true) => bytes_coder::EXPLICIT,
                (Kind::Message | Kind::Group, _) => unreachable!(),
            }
        }
    }
}

pub(crate) fn select_value_coder(kind: Kind, repeated: bool, packed: bool) -> ValueCoderFuncs {
    if repeated && packed {
        if !kind.is_packable() {
            panic!("packed value coder for unpackable kind {kind:?}");
        }
        PACKED_VALUE
    } else if repeated {
        REPEATED_VALUE
    } else {
        SINGULAR_VALUE
    }
}
