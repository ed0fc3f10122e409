//! Extension field storage.
//!
//! Extensions live outside a message's slot array, in a side map keyed by
//! field number that is only allocated once a message actually carries
//! one. Values are encoded and decoded by the same value coders that
//! serve map entries.
//!
//! Singular message extensions are stored lazily: the decoder buffers the
//! raw payload bytes and defers building the submessage until something
//! reads it. Records for the same number concatenate, which is exactly
//! wire format merge semantics, and the deferred decode happens once even
//! under concurrent readers. A payload that later turns out to be
//! malformed reads as an empty message and still reserializes byte for
//! byte.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::coders::{self, FieldError, ValueContext};
use crate::decoding::{self, DecodeContext, DecodeOptions};
use crate::descriptor::{DescriptorPool, ExtensionDescriptor, Kind};
use crate::encoding::{EncodeContext, SizeOpts};
use crate::reflection::DynamicMessage;
use crate::store::FieldStore;
use crate::value::Value;
use crate::wire::{self, WireType};

/// Resolves extension fields met on the wire. Decoding defaults to the
/// pool the message type was built in; anything that can map an extendee
/// name and field number to an extension can stand in for it.
pub trait ExtensionResolver {
    fn find_extension_by_number(
        &self,
        containing_message: &str,
        number: u32,
    ) -> Option<ExtensionDescriptor>;
}

impl ExtensionResolver for DescriptorPool {
    fn find_extension_by_number(
        &self,
        containing_message: &str,
        number: u32,
    ) -> Option<ExtensionDescriptor> {
        DescriptorPool::find_extension_by_number(self, containing_message, number)
    }
}

/// Extension fields present on one message.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ExtensionMap {
    pub(crate) entries: HashMap<u32, ExtensionField>,
}

#[derive(Clone, Debug)]
pub(crate) struct ExtensionField {
    pub(crate) descriptor: ExtensionDescriptor,
    pub(crate) value: ExtensionValue,
}

impl PartialEq for ExtensionField {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor && self.value == other.value
    }
}

#[derive(Clone, Debug)]
pub(crate) enum ExtensionValue {
    Eager(Value),
    /// Undecoded singular message payloads, length prefixes stripped,
    /// later records appended. The cell holds the result of the deferred
    /// decode, `None` when the bytes would not parse.
    Lazy {
        raw: Vec<u8>,
        cell: OnceLock<Option<Box<DynamicMessage>>>,
    },
}

// The decode cell is a cache of `raw`, so it does not take part in
// equality; an undecoded value and its decoded twin compare equal.
impl PartialEq for ExtensionValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExtensionValue::Eager(a), ExtensionValue::Eager(b)) => a == b,
            (ExtensionValue::Lazy { raw: a, .. }, ExtensionValue::Lazy { raw: b, .. }) => a == b,
            _ => false,
        }
    }
}

pub(crate) fn value_context(ext: &ExtensionDescriptor) -> ValueContext {
    let kind = ext.kind();
    ValueContext {
        number: ext.number(),
        kind,
        wire_tag: wire::make_tag(ext.number(), kind.wire_type()),
        tag_size: wire::size_tag(ext.number()),
        child: ext.message_type(),
        enum_desc: ext.enum_type(),
        validate_utf8: ext.requires_utf8(),
        full_name: ext.full_name().to_string(),
    }
}

fn decode_deferred(raw: &[u8], ext: &ExtensionDescriptor) -> Option<Box<DynamicMessage>> {
    let child = ext.message_type()?;
    let mut msg = DynamicMessage::new(child);
    let opts = DecodeOptions {
        allow_partial: true,
        ..DecodeOptions::default()
    };
    decoding::merge(&mut msg, raw, &opts).ok()?;
    Some(Box::new(msg))
}

impl ExtensionField {
    /// The field's value. Lazy payloads decode here, once.
    pub(crate) fn resolved(&self) -> Value {
        match &self.value {
            ExtensionValue::Eager(v) => v.clone(),
            ExtensionValue::Lazy { raw, cell } => {
                match cell.get_or_init(|| decode_deferred(raw, &self.descriptor)) {
                    Some(m) => Value::Message(m.clone()),
                    None => self.descriptor.default_value(),
                }
            }
        }
    }
}

/// Decodes one wire record into the extension `ext` on `store`. Returns
/// [`FieldError::Unknown`] without touching the map when the record is
/// not acceptable, so the caller can route it to unknown fields.
pub(crate) fn unmarshal_field(
    store: &mut FieldStore,
    ext: &ExtensionDescriptor,
    wire_type: WireType,
    buf: &[u8],
    ctx: &mut DecodeContext,
) -> Result<usize, FieldError> {
    let number = ext.number();

    // Singular message payloads are buffered undecoded.
    if !ext.is_repeated() && ext.kind() == Kind::Message {
        if wire_type != WireType::LengthDelimited {
            return Err(FieldError::Unknown);
        }
        let (payload, consumed) = wire::get_bytes(buf)?;
        let exts = store.extensions_mut();
        let entry = exts.entries.entry(number).or_insert_with(|| ExtensionField {
            descriptor: ext.clone(),
            value: ExtensionValue::Lazy {
                raw: Vec::new(),
                cell: OnceLock::new(),
            },
        });
        match &mut entry.value {
            ExtensionValue::Lazy { raw, cell } => {
                raw.extend_from_slice(payload);
                // The appended bytes outdate any earlier decode.
                *cell = OnceLock::new();
            }
            // Set through reflection earlier: merge into it directly.
            ExtensionValue::Eager(Value::Message(m)) => {
                decoding::merge_slice(m, payload, ctx)?;
            }
            ExtensionValue::Eager(other) => panic!(
                "extension {}: value holds {} where Message expected",
                ext.full_name(),
                other.variant_name()
            ),
        }
        return Ok(consumed);
    }

    let vctx = value_context(ext);
    let coder = coders::select_value_coder(ext.kind(), ext.is_repeated(), ext.is_packed());
    if let Some(field) = store.extensions_mut().entries.get_mut(&number) {
        let ExtensionValue::Eager(value) = &mut field.value else {
            panic!("extension {}: lazy storage for non-message kind", ext.full_name());
        };
        return (coder.unmarshal)(value, &vctx, wire_type, buf, ctx);
    }
    // First record: decode into a detached value so a refused record
    // leaves no empty entry behind.
    let mut value = if ext.is_repeated() {
        Value::List(Vec::new())
    } else {
        coders::zero_value(&vctx)
    };
    let consumed = (coder.unmarshal)(&mut value, &vctx, wire_type, buf, ctx)?;
    store.extensions_mut().entries.insert(
        number,
        ExtensionField {
            descriptor: ext.clone(),
            value: ExtensionValue::Eager(value),
        },
    );
    Ok(consumed)
}

/// Byte count of every extension on `store`, order independent.
pub(crate) fn size_all(exts: &ExtensionMap, opts: SizeOpts) -> usize {
    let mut total = 0;
    for field in exts.entries.values() {
        total += match &field.value {
            ExtensionValue::Eager(v) => {
                let vctx = value_context(&field.descriptor);
                let coder = coders::select_value_coder(
                    field.descriptor.kind(),
                    field.descriptor.is_repeated(),
                    field.descriptor.is_packed(),
                );
                (coder.size)(v, &vctx, opts)
            }
            // Re-emitted as one record framing the buffered payload.
            ExtensionValue::Lazy { raw, .. } => {
                wire::size_tag(field.descriptor.number()) + wire::size_len_prefixed(raw.len())
            }
        };
    }
    total
}

/// Writes every extension on `store` in ascending field number.
pub(crate) fn marshal_all(exts: &ExtensionMap, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
    let mut numbers: Vec<u32> = exts.entries.keys().copied().collect();
    numbers.sort_unstable();
    for number in numbers {
        let field = &exts.entries[&number];
        match &field.value {
            ExtensionValue::Eager(v) => {
                let vctx = value_context(&field.descriptor);
                let coder = coders::select_value_coder(
                    field.descriptor.kind(),
                    field.descriptor.is_repeated(),
                    field.descriptor.is_packed(),
                );
                (coder.marshal)(v, &vctx, buf, ctx);
            }
            ExtensionValue::Lazy { raw, .. } => {
                wire::put_tag(buf, field.descriptor.number(), WireType::LengthDelimited);
                wire::put_bytes(buf, raw);
            }
        }
    }
}
