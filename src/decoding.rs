//! Wire decoding.
//!
//! Parsing is a tag loop over a slice: read a tag, look the field number
//! up in the message's codec table and hand the record to that field's
//! coder. Records nobody claims, unknown numbers, wire type mismatches
//! and closed enum values a field refuses, are preserved byte for byte in
//! the message's unknown fields in arrival order.
//!
//! Decoding merges. Scalars take the last value seen, repeated fields and
//! maps accumulate, and submessages merge field by field into whatever is
//! already there. Nested lengths are not known until met, so submessages
//! and groups recurse with a depth budget carried by [`DecodeContext`].

use std::sync::Arc;

use crate::coders::FieldError;
use crate::descriptor::MessageDescriptor;
use crate::error::DecodeError;
use crate::extension::{self, ExtensionResolver};
use crate::reflection::DynamicMessage;
use crate::store::{FieldStore, Slot};
use crate::tables::{MessageTypeInfo, Presence};
use crate::wire::{self, WireType};

/// Nesting depth (messages plus groups) accepted by default.
pub const DEFAULT_RECURSION_LIMIT: u32 = 10_000;

/// Knobs for one decode call. Owns the decode entry points.
#[derive(Clone)]
pub struct DecodeOptions {
    /// Drop unclaimed records instead of keeping them in unknown fields.
    pub discard_unknown: bool,
    /// Accept messages with unset required fields.
    pub allow_partial: bool,
    pub recursion_limit: u32,
    /// Where to look up extension fields by extendee and number. Unset
    /// means the pool the message type was built in.
    pub resolver: Option<Arc<dyn ExtensionResolver + Send + Sync>>,
}

impl DecodeOptions {
    pub fn new() -> DecodeOptions {
        DecodeOptions::default()
    }

    pub fn discard_unknown(mut self, on: bool) -> DecodeOptions {
        self.discard_unknown = on;
        self
    }

    pub fn allow_partial(mut self, on: bool) -> DecodeOptions {
        self.allow_partial = on;
        self
    }

    pub fn recursion_limit(mut self, limit: u32) -> DecodeOptions {
        self.recursion_limit = limit;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn ExtensionResolver + Send + Sync>) -> DecodeOptions {
        self.resolver = Some(resolver);
        self
    }

    /// Parses `buf` into a fresh message of the given type.
    pub fn decode(
        &self,
        descriptor: MessageDescriptor,
        buf: &[u8],
    ) -> Result<DynamicMessage, DecodeError> {
        let mut msg = DynamicMessage::new(descriptor);
        merge(&mut msg, buf, self)?;
        Ok(msg)
    }

    /// Parses `buf` into `msg`, merging with what is already set. On error
    /// the fields parsed before the failure stay in place, so the caller
    /// decides how severe a tail error is.
    pub fn merge(&self, msg: &mut DynamicMessage, buf: &[u8]) -> Result<(), DecodeError> {
        merge(msg, buf, self)
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            discard_unknown: false,
            allow_partial: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            resolver: None,
        }
    }
}

impl std::fmt::Debug for DecodeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("discard_unknown", &self.discard_unknown)
            .field("allow_partial", &self.allow_partial)
            .field("recursion_limit", &self.recursion_limit)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// State threaded through one parse.
pub(crate) struct DecodeContext {
    pub(crate) discard_unknown: bool,
    /// Remaining nesting budget; zero fails the frame about to open.
    pub(crate) depth: u32,
    pub(crate) resolver: Option<Arc<dyn ExtensionResolver + Send + Sync>>,
    /// First required field a finished frame found unset.
    pub(crate) missing_required: Option<String>,
    /// First string field that carried invalid UTF-8. The parse keeps
    /// going; the error surfaces once the buffer is consumed.
    pub(crate) utf8_error: Option<String>,
}

impl DecodeContext {
    pub(crate) fn new(opts: &DecodeOptions) -> DecodeContext {
        DecodeContext {
            discard_unknown: opts.discard_unknown,
            depth: opts.recursion_limit,
            resolver: opts.resolver.clone(),
            missing_required: None,
            utf8_error: None,
        }
    }
}

/// Merges `buf` into `msg` under `opts`.
pub(crate) fn merge(msg: &mut DynamicMessage, buf: &[u8], opts: &DecodeOptions) -> Result<(), DecodeError> {
    let mut ctx = DecodeContext::new(opts);
    merge_slice(msg, buf, &mut ctx)?;
    if let Some(name) = ctx.utf8_error {
        return Err(DecodeError::InvalidUtf8(name));
    }
    if !opts.allow_partial {
        if let Some(name) = ctx.missing_required {
            return Err(DecodeError::MissingRequiredField(name));
        }
    }
    Ok(())
}

/// One message frame over an exact slice.
pub(crate) fn merge_slice(
    msg: &mut DynamicMessage,
    buf: &[u8],
    ctx: &mut DecodeContext,
) -> Result<(), DecodeError> {
    if ctx.depth == 0 {
        return Err(DecodeError::RecursionLimitExceeded);
    }
    ctx.depth -= 1;
    let result = parse_fields(msg, buf, None, ctx);
    ctx.depth += 1;
    let consumed = result?;
    debug_assert_eq!(consumed, buf.len());
    Ok(())
}

/// One group frame. The slice extends to the end of the parent frame;
/// parsing stops at the matching end tag and the returned count includes
/// it. Running out of input first is [`DecodeError::MissingEndGroup`].
pub(crate) fn merge_group(
    msg: &mut DynamicMessage,
    buf: &[u8],
    group_number: u32,
    ctx: &mut DecodeContext,
) -> Result<usize, DecodeError> {
    if ctx.depth == 0 {
        return Err(DecodeError::RecursionLimitExceeded);
    }
    ctx.depth -= 1;
    let result = parse_fields(msg, buf, Some(group_number), ctx);
    ctx.depth += 1;
    result
}

fn parse_fields(
    msg: &mut DynamicMessage,
    buf: &[u8],
    group: Option<u32>,
    ctx: &mut DecodeContext,
) -> Result<usize, DecodeError> {
    let descriptor = msg.descriptor.clone();
    let info_table = descriptor.type_info();
    let store = &mut msg.store;
    store.cached_size.clear();

    let mut seen_required: u64 = 0;
    let mut pos = 0;
    'fields: while pos < buf.len() {
        let (number, wire_type, tag_len) = wire::get_tag(&buf[pos..])?;
        let record_start = pos;
        pos += tag_len;

        if wire_type == WireType::EndGroup {
            return match group {
                Some(g) if g == number => {
                    note_missing_required(store, info_table, seen_required, ctx);
                    Ok(pos)
                }
                _ => Err(DecodeError::UnexpectedEndGroup(number)),
            };
        }

        'unknown: {
            if let Some(info) = info_table.field(number) {
                match (info.coder.unmarshal)(store, info, wire_type, &buf[pos..], ctx) {
                    Ok(consumed) => {
                        pos += consumed;
                        if let Some(i) = info.required_index {
                            seen_required |= 1u64 << i;
                        }
                    }
                    Err(FieldError::Unknown) => break 'unknown,
                    Err(FieldError::Fatal(e)) => return Err(e),
                }
            } else if descriptor.in_extension_range(number) {
                let ext = match &ctx.resolver {
                    Some(r) => r.find_extension_by_number(descriptor.full_name(), number),
                    None => descriptor
                        .pool()
                        .find_extension_by_number(descriptor.full_name(), number),
                };
                let Some(ext) = ext else {
                    break 'unknown;
                };
                match extension::unmarshal_field(store, &ext, wire_type, &buf[pos..], ctx) {
                    Ok(consumed) => pos += consumed,
                    Err(FieldError::Unknown) => break 'unknown,
                    Err(FieldError::Fatal(e)) => return Err(e),
                }
            } else {
                break 'unknown;
            }
            continue 'fields;
        }

        // Not this message's data: kept verbatim unless dropped.
        let skipped = wire::skip_field(&buf[pos..], number, wire_type)?;
        pos += skipped;
        log::trace!(
            "{}: unknown field {}, {} bytes",
            descriptor.full_name(),
            number,
            pos - record_start
        );
        if !ctx.discard_unknown {
            store.unknown.extend_from_slice(&buf[record_start..pos]);
        }
    }

    if let Some(g) = group {
        return Err(DecodeError::MissingEndGroup(g));
    }
    note_missing_required(store, info_table, seen_required, ctx);
    Ok(pos)
}

/// Required check for one finished frame. The parse keeps a bitmask of the
/// required fields it saw; a complete mask settles it, anything else falls
/// back to presence state, which also covers values merged in earlier and
/// messages with more required fields than mask bits.
fn note_missing_required(
    store: &FieldStore,
    info_table: &MessageTypeInfo,
    seen: u64,
    ctx: &mut DecodeContext,
) {
    if info_table.num_required == 0 {
        return;
    }
    if info_table.num_required <= 64 && seen.count_ones() == info_table.num_required {
        return;
    }
    for info in info_table.fields.iter() {
        if info.presence != Presence::Required {
            continue;
        }
        let present = match info.has_bit {
            Some(bit) => store.has_bit(bit),
            None => match &store.slots[info.slot as usize] {
                Slot::Message(m) => m.is_some(),
                _ => false,
            },
        };
        if !present {
            if ctx.missing_required.is_none() {
                ctx.missing_required = Some(info.descriptor.full_name().to_string());
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::ProtoString;
    use crate::descriptor::{
        Cardinality, DescriptorPool, FieldDef, FileDef, Kind, MessageDef, Syntax,
    };

    fn test_pool() -> DescriptorPool {
        let file = FileDef::new("d.proto", "d", Syntax::Proto2)
            .message(
                MessageDef::new("Inner")
                    .field(FieldDef::scalar("x", 1, Cardinality::Optional, Kind::Int32)),
            )
            .message(
                MessageDef::new("Outer")
                    .field(FieldDef::scalar("a", 1, Cardinality::Optional, Kind::Int32))
                    .field(FieldDef::message("inner", 2, Cardinality::Optional, "d.Inner"))
                    .field(FieldDef::group("grp", 3, Cardinality::Optional, "d.Inner"))
                    .field(FieldDef::scalar("name", 4, Cardinality::Optional, Kind::String)),
            )
            .message(
                MessageDef::new("Needy")
                    .field(FieldDef::scalar("id", 1, Cardinality::Required, Kind::Int32)),
            )
            .message(
                MessageDef::new("Recur")
                    .field(FieldDef::message("next", 1, Cardinality::Optional, "d.Recur")),
            );
        DescriptorPool::from_file(file).unwrap()
    }

    fn new_message(pool: &DescriptorPool, name: &str) -> DynamicMessage {
        DynamicMessage::new(pool.get_message_by_name(name).unwrap())
    }

    fn slot_of<'a>(msg: &'a DynamicMessage, number: u32) -> &'a Slot {
        let info = msg.descriptor.type_info().field(number).unwrap();
        &msg.store.slots[info.slot as usize]
    }

    #[test]
    fn test_decode_varint_field() {
        let pool = test_pool();
        let mut msg = new_message(&pool, "d.Outer");
        merge(&mut msg, &[0x08, 0xac, 0x02], &DecodeOptions::default()).unwrap();
        assert_eq!(*slot_of(&msg, 1), Slot::I32(300));
    }

    #[test]
    fn test_decode_nested_message() {
        let pool = test_pool();
        let mut msg = new_message(&pool, "d.Outer");
        merge(&mut msg, &[0x12, 0x02, 0x08, 0x05], &DecodeOptions::default()).unwrap();
        let Slot::Message(Some(inner)) = slot_of(&msg, 2) else {
            panic!("inner not set");
        };
        assert_eq!(*slot_of(inner, 1), Slot::I32(5));
    }

    #[test]
    fn test_decode_group() {
        let pool = test_pool();
        let mut msg = new_message(&pool, "d.Outer");
        // start(3), x = 5, end(3)
        merge(&mut msg, &[0x1b, 0x08, 0x05, 0x1c], &DecodeOptions::default()).unwrap();
        let Slot::Message(Some(inner)) = slot_of(&msg, 3) else {
            panic!("group not set");
        };
        assert_eq!(*slot_of(inner, 1), Slot::I32(5));
    }

    #[test]
    fn test_group_framing_errors() {
        let pool = test_pool();
        let mut msg = new_message(&pool, "d.Outer");
        assert_eq!(
            merge(&mut msg, &[0x1b, 0x08, 0x05], &DecodeOptions::default()),
            Err(DecodeError::MissingEndGroup(3))
        );
        let mut msg = new_message(&pool, "d.Outer");
        assert_eq!(
            merge(&mut msg, &[0x1c], &DecodeOptions::default()),
            Err(DecodeError::UnexpectedEndGroup(3))
        );
    }

    #[test]
    fn test_unknown_fields_preserved_verbatim() {
        let pool = test_pool();
        let mut msg = new_message(&pool, "d.Outer");
        // field 99 varint, then an unknown group with a varint inside
        let buf = [
            0x98, 0x06, 0x01, // 99: 1
            0xa3, 0x06, 0x08, 0x07, 0xa4, 0x06, // group 100 { 1: 7 }
        ];
        merge(&mut msg, &buf, &DecodeOptions::default()).unwrap();
        assert_eq!(msg.store.unknown, buf);

        let mut msg = new_message(&pool, "d.Outer");
        let opts = DecodeOptions {
            discard_unknown: true,
            ..DecodeOptions::default()
        };
        merge(&mut msg, &buf, &opts).unwrap();
        assert!(msg.store.unknown.is_empty());
    }

    #[test]
    fn test_wire_type_mismatch_routed_to_unknown() {
        let pool = test_pool();
        let mut msg = new_message(&pool, "d.Outer");
        // field 1 is int32 but arrives as fixed32
        let buf = [0x0d, 0x01, 0x00, 0x00, 0x00];
        merge(&mut msg, &buf, &DecodeOptions::default()).unwrap();
        assert_eq!(*slot_of(&msg, 1), Slot::I32(0));
        assert_eq!(msg.store.unknown, buf);
    }

    #[test]
    fn test_merge_overwrites_scalars_and_merges_messages() {
        let pool = test_pool();
        let mut msg = new_message(&pool, "d.Outer");
        merge(&mut msg, &[0x08, 0x01, 0x12, 0x02, 0x08, 0x05], &DecodeOptions::default()).unwrap();
        merge(&mut msg, &[0x08, 0x02, 0x12, 0x02, 0x08, 0x07], &DecodeOptions::default()).unwrap();
        assert_eq!(*slot_of(&msg, 1), Slot::I32(2));
        let Slot::Message(Some(inner)) = slot_of(&msg, 2) else {
            panic!("inner not set");
        };
        assert_eq!(*slot_of(inner, 1), Slot::I32(7));
    }

    #[test]
    fn test_truncated_input() {
        let pool = test_pool();
        let mut msg = new_message(&pool, "d.Outer");
        assert_eq!(
            merge(&mut msg, &[0x08], &DecodeOptions::default()),
            Err(DecodeError::Truncated)
        );
        let mut msg = new_message(&pool, "d.Outer");
        assert_eq!(
            merge(&mut msg, &[0x12, 0x05, 0x08, 0x01], &DecodeOptions::default()),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn test_recursion_limit() {
        let pool = test_pool();
        // Three frames deep: Recur { next { next {} } }
        let buf = [0x0a, 0x02, 0x0a, 0x00];
        let mut msg = new_message(&pool, "d.Recur");
        let opts = DecodeOptions {
            recursion_limit: 2,
            ..DecodeOptions::default()
        };
        assert_eq!(
            merge(&mut msg, &buf, &opts),
            Err(DecodeError::RecursionLimitExceeded)
        );
        let mut msg = new_message(&pool, "d.Recur");
        let opts = DecodeOptions {
            recursion_limit: 3,
            ..DecodeOptions::default()
        };
        merge(&mut msg, &buf, &opts).unwrap();
    }

    #[test]
    fn test_missing_required_field() {
        let pool = test_pool();
        let mut msg = new_message(&pool, "d.Needy");
        assert_eq!(
            merge(&mut msg, &[], &DecodeOptions::default()),
            Err(DecodeError::MissingRequiredField("d.Needy.id".into()))
        );

        let mut msg = new_message(&pool, "d.Needy");
        let opts = DecodeOptions {
            allow_partial: true,
            ..DecodeOptions::default()
        };
        merge(&mut msg, &[], &opts).unwrap();

        let mut msg = new_message(&pool, "d.Needy");
        merge(&mut msg, &[0x08, 0x07], &DecodeOptions::default()).unwrap();
        assert_eq!(*slot_of(&msg, 1), Slot::I32(7));
    }

    #[test]
    fn test_required_satisfied_by_earlier_merge() {
        let pool = test_pool();
        let mut msg = new_message(&pool, "d.Needy");
        merge(&mut msg, &[0x08, 0x07], &DecodeOptions::default()).unwrap();
        // A second buffer without the field is fine, presence carries over.
        merge(&mut msg, &[], &DecodeOptions::default()).unwrap();
    }

    #[test]
    fn test_invalid_utf8_reported_after_full_parse() {
        let file = FileDef::new("u.proto", "u", Syntax::Proto3).message(
            MessageDef::new("S")
                .field(FieldDef::scalar("s", 1, Cardinality::Optional, Kind::String))
                .field(FieldDef::scalar("n", 2, Cardinality::Optional, Kind::Int32)),
        );
        let pool = DescriptorPool::from_file(file).unwrap();
        let mut msg = DynamicMessage::new(pool.get_message_by_name("u.S").unwrap());
        let buf = [0x0a, 0x01, 0xff, 0x10, 0x09];
        assert_eq!(
            merge(&mut msg, &buf, &DecodeOptions::default()),
            Err(DecodeError::InvalidUtf8("u.S.s".into()))
        );
        // The parse still consumed everything: bytes stored, later fields set.
        assert_eq!(
            *slot_of(&msg, 1),
            Slot::String(ProtoString::from_bytes(vec![0xff]))
        );
        assert_eq!(*slot_of(&msg, 2), Slot::I32(9));
    }

    #[test]
    fn test_proto2_string_skips_utf8_validation() {
        let pool = test_pool();
        let mut msg = new_message(&pool, "d.Outer");
        merge(&mut msg, &[0x22, 0x01, 0xff], &DecodeOptions::default()).unwrap();
        assert_eq!(
            *slot_of(&msg, 4),
            Slot::String(ProtoString::from_bytes(vec![0xff]))
        );
    }
}
