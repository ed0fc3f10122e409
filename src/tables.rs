//! Per-message codec tables.
//!
//! The first encode or decode touching a message type builds a
//! [`MessageTypeInfo`] and parks it in the descriptor pool behind a
//! once-cell, so the work happens once per type per pool no matter how
//! many threads race. The table holds one [`FieldInfo`] per field, sorted
//! by field number, each carrying a precomputed wire tag, a slot index
//! into the message store, its presence policy and the coder functions
//! selected for its kind and cardinality.
//!
//! Incoming tags resolve through a dense number-indexed array while the
//! numbers stay small and contiguous, falling back to binary search over
//! the sorted fields for sparse numbers.

use crate::coders::{self, CoderFuncs, ValueCoderFuncs, ValueContext};
use crate::descriptor::{
    Cardinality, EnumDescriptor, FieldDescriptor, Kind, MessageDescriptor, Syntax,
};
use crate::store::{FieldStore, Slot};
use crate::wire::{self, WireType};

/// How a field decides whether it is present on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Presence {
    /// proto2 `required`: tracked like explicit presence and checked for
    /// initialization after every parse and serialize.
    Required,
    /// Explicit presence: a has-bit, or Some/None for message fields.
    Explicit,
    /// proto3 implicit presence: default values are absent. Also used by
    /// repeated and map fields, where emptiness means absent.
    Implicit,
    /// Member of a oneof; present when the shared slot holds its number.
    OneofMember,
}

/// Everything the codec needs to know about one field.
pub(crate) struct FieldInfo {
    pub(crate) number: u32,
    pub(crate) kind: Kind,
    /// Tag for this field's primary encoding, length-delimited when packed.
    pub(crate) wire_tag: u32,
    pub(crate) tag_size: usize,
    pub(crate) slot: u32,
    pub(crate) presence: Presence,
    pub(crate) has_bit: Option<u32>,
    /// Position in the seen-required bitmask, for the first 64 required
    /// fields only.
    pub(crate) required_index: Option<u8>,
    pub(crate) coder: CoderFuncs,
    pub(crate) child: Option<MessageDescriptor>,
    pub(crate) enum_desc: Option<EnumDescriptor>,
    pub(crate) map: Option<Box<MapInfo>>,
    pub(crate) validate_utf8: bool,
    pub(crate) descriptor: FieldDescriptor,
}

/// Key and value codecs for one map field. Entries encode as a nested
/// message with key on field 1 and value on field 2.
pub(crate) struct MapInfo {
    pub(crate) key: ValueContext,
    pub(crate) value: ValueContext,
    pub(crate) key_coder: ValueCoderFuncs,
    pub(crate) value_coder: ValueCoderFuncs,
}

pub(crate) struct MessageTypeInfo {
    /// Sorted ascending by field number; also the serialization order.
    pub(crate) fields: Box<[FieldInfo]>,
    /// Field number -> index+1 into `fields`, zero meaning absent.
    dense: Box<[u32]>,
    /// Fresh slot array for a new store, one entry per storage location.
    slot_templates: Box<[Slot]>,
    has_words: usize,
    /// Total count of required fields, not capped.
    pub(crate) num_required: u32,
    /// Slot index of each oneof, by oneof declaration index.
    pub(crate) oneof_slots: Box<[u32]>,
}

impl MessageTypeInfo {
    pub(crate) fn build(desc: &MessageDescriptor) -> MessageTypeInfo {
        let mut fds: Vec<FieldDescriptor> = desc.fields().collect();
        fds.sort_by_key(FieldDescriptor::number);

        let mut slot_templates: Vec<Slot> = Vec::new();
        let oneof_slots: Vec<u32> = desc
            .oneofs()
            .map(|_| {
                let slot = slot_templates.len() as u32;
                slot_templates.push(Slot::Oneof(None));
                slot
            })
            .collect();

        let mut next_has_bit = 0u32;
        let mut num_required = 0u32;
        let mut fields = Vec::with_capacity(fds.len());
        for fd in &fds {
            let presence = presence_of(fd);

            let slot = match fd.oneof_index() {
                Some(i) => oneof_slots[i],
                None => {
                    let slot = slot_templates.len() as u32;
                    slot_templates.push(slot_template(fd));
                    slot
                }
            };

            // Message presence rides on the Option in the slot; everything
            // else with explicit presence gets a has-bit.
            let mut has_bit = None;
            if matches!(presence, Presence::Explicit | Presence::Required)
                && !matches!(fd.kind(), Kind::Message | Kind::Group)
            {
                has_bit = Some(next_has_bit);
                next_has_bit += 1;
            }

            let mut required_index = None;
            if presence == Presence::Required {
                if num_required < 64 {
                    required_index = Some(num_required as u8);
                }
                num_required += 1;
            }

            let wire_type = if fd.is_packed() {
                WireType::LengthDelimited
            } else {
                fd.kind().wire_type()
            };
            let wire_tag = wire::make_tag(fd.number(), wire_type);

            let map = fd.is_map().then(|| Box::new(map_info(fd)));

            fields.push(FieldInfo {
                number: fd.number(),
                kind: fd.kind(),
                wire_tag,
                tag_size: wire::size_tag(fd.number()),
                slot,
                presence,
                has_bit,
                required_index,
                coder: coders::select_coder(fd, presence),
                child: fd.message_type(),
                enum_desc: fd.enum_type(),
                map,
                validate_utf8: fd.requires_utf8(),
                descriptor: fd.clone(),
            });
        }

        let dense = build_dense(&fields);
        log::debug!(
            "built codec table for {}: {} fields, {} slots, dense through {}",
            desc.full_name(),
            fields.len(),
            slot_templates.len(),
            dense.len().saturating_sub(1)
        );

        MessageTypeInfo {
            fields: fields.into_boxed_slice(),
            dense,
            slot_templates: slot_templates.into_boxed_slice(),
            has_words: next_has_bit.div_ceil(32) as usize,
            num_required,
            oneof_slots: oneof_slots.into_boxed_slice(),
        }
    }

    /// Resolves an incoming field number to its table entry.
    pub(crate) fn field(&self, number: u32) -> Option<&FieldInfo> {
        if (number as usize) < self.dense.len() {
            return match self.dense[number as usize] {
                0 => None,
                i => Some(&self.fields[i as usize - 1]),
            };
        }
        self.fields
            .binary_search_by_key(&number, |f| f.number)
            .ok()
            .map(|i| &self.fields[i])
    }

    pub(crate) fn new_store(&self) -> FieldStore {
        FieldStore::new(self.slot_templates.clone(), self.has_words)
    }
}

/// Sizes the dense lookup. Numbers are admitted in ascending order until
/// one would leave the table less than half full, with everything below 16
/// always admitted.
fn build_dense(fields: &[FieldInfo]) -> Box<[u32]> {
    let mut max_dense = 0u32;
    for f in fields {
        if f.number >= 16 && f.number >= 2 * max_dense {
            break;
        }
        max_dense = f.number;
    }
    let mut dense = vec![0u32; max_dense as usize + 1];
    for (i, f) in fields.iter().enumerate() {
        if f.number <= max_dense {
            dense[f.number as usize] = i as u32 + 1;
        }
    }
    dense.into_boxed_slice()
}

fn presence_of(fd: &FieldDescriptor) -> Presence {
    if fd.is_repeated() {
        return Presence::Implicit;
    }
    if fd.oneof_index().is_some() {
        return Presence::OneofMember;
    }
    if fd.cardinality() == Cardinality::Required {
        return Presence::Required;
    }
    if fd.has_presence() {
        Presence::Explicit
    } else {
        Presence::Implicit
    }
}

fn slot_template(fd: &FieldDescriptor) -> Slot {
    if fd.is_map() {
        return Slot::Map(Default::default());
    }
    if fd.is_repeated() {
        return match fd.kind() {
            Kind::Bool => Slot::RepeatedBool(Vec::new()),
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Slot::RepeatedI32(Vec::new()),
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Slot::RepeatedI64(Vec::new()),
            Kind::Uint32 | Kind::Fixed32 => Slot::RepeatedU32(Vec::new()),
            Kind::Uint64 | Kind::Fixed64 => Slot::RepeatedU64(Vec::new()),
            Kind::Float => Slot::RepeatedF32(Vec::new()),
            Kind::Double => Slot::RepeatedF64(Vec::new()),
            Kind::Enum => Slot::RepeatedEnum(Vec::new()),
            Kind::String => Slot::RepeatedString(Vec::new()),
            Kind::Bytes => Slot::RepeatedBytes(Vec::new()),
            Kind::Message | Kind::Group => Slot::RepeatedMessage(Vec::new()),
        };
    }
    match fd.kind() {
        Kind::Bool => Slot::Bool(false),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Slot::I32(0),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Slot::I64(0),
        Kind::Uint32 | Kind::Fixed32 => Slot::U32(0),
        Kind::Uint64 | Kind::Fixed64 => Slot::U64(0),
        Kind::Float => Slot::F32(0.0),
        Kind::Double => Slot::F64(0.0),
        Kind::Enum => Slot::Enum(0),
        Kind::String => Slot::String(Default::default()),
        Kind::Bytes => Slot::Bytes(Vec::new()),
        Kind::Message | Kind::Group => Slot::Message(None),
    }
}

fn map_info(fd: &FieldDescriptor) -> MapInfo {
    let key_kind = fd.map_key_kind().unwrap();
    let value_kind = fd.map_value_kind().unwrap();
    let proto3 = fd.syntax() == Syntax::Proto3;
    MapInfo {
        key: ValueContext {
            number: 1,
            kind: key_kind,
            wire_tag: wire::make_tag(1, key_kind.wire_type()),
            tag_size: 1,
            child: None,
            enum_desc: None,
            validate_utf8: key_kind == Kind::String && proto3,
            full_name: fd.full_name().to_string(),
        },
        value: ValueContext {
            number: 2,
            kind: value_kind,
            wire_tag: wire::make_tag(2, value_kind.wire_type()),
            tag_size: 1,
            child: fd.map_value_message(),
            enum_desc: fd.map_value_enum(),
            validate_utf8: value_kind == Kind::String && proto3,
            full_name: fd.full_name().to_string(),
        },
        key_coder: coders::select_value_coder(key_kind, false, false),
        value_coder: coders::select_value_coder(value_kind, false, false),
    }
}
