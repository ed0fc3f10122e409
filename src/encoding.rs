//! Wire encoding.
//!
//! Encoding runs in two passes. The size pass walks the tree once, asking
//! each field coder for its exact byte count and caching every message's
//! total in its size cache. The marshal pass then writes into a buffer
//! sized in one allocation, reading submessage lengths back from the
//! caches instead of recomputing them.
//!
//! Output order per message: extensions first in ascending field number,
//! then fields in ascending number, then unknown fields verbatim. With
//! [`EncodeOptions::deterministic`] set, map entries are additionally
//! sorted by key, making equal messages byte for byte reproducible.

use crate::error::EncodeError;
use crate::reflection::DynamicMessage;

/// Knobs for one encode call. Owns the encode entry points.
#[derive(Clone, Copy, Debug, Default)]
pub struct EncodeOptions {
    /// Sort map entries by key. Fields are always ordered by number.
    pub deterministic: bool,
    /// Skip the required field check.
    pub allow_partial: bool,
    /// Trust sizes cached by an earlier [`encoded_len`](Self::encoded_len)
    /// or encode of the same tree. Only sound while nothing changed in
    /// between: mutators clear the cache of the message they touch, not of
    /// the messages containing it.
    pub use_cached_size: bool,
}

impl EncodeOptions {
    pub fn new() -> EncodeOptions {
        EncodeOptions::default()
    }

    pub fn deterministic(mut self, on: bool) -> EncodeOptions {
        self.deterministic = on;
        self
    }

    pub fn allow_partial(mut self, on: bool) -> EncodeOptions {
        self.allow_partial = on;
        self
    }

    pub fn use_cached_size(mut self, on: bool) -> EncodeOptions {
        self.use_cached_size = on;
        self
    }

    /// Serializes `msg` into a fresh buffer.
    pub fn encode(&self, msg: &DynamicMessage) -> Result<Vec<u8>, EncodeError> {
        encode(msg, self)
    }

    /// Serializes `msg` onto the end of `buf`.
    ///
    /// On error the appended bytes are left in place; callers that need
    /// the buffer back intact should truncate to its prior length.
    pub fn encode_append(&self, msg: &DynamicMessage, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        encode_append(msg, buf, self)
    }

    /// Exact encoded length of `msg`, caching per-message sizes on the way.
    pub fn encoded_len(&self, msg: &DynamicMessage) -> usize {
        size_message(
            msg,
            SizeOpts {
                use_cached: self.use_cached_size,
            },
        )
    }
}

/// How the size pass treats message size caches.
#[derive(Clone, Copy)]
pub(crate) struct SizeOpts {
    /// Trust an already cached size instead of walking the message again.
    /// The marshal pass always sets this; the size pass it follows sets it
    /// only when the caller vouched for the caches through
    /// [`EncodeOptions::use_cached_size`].
    pub(crate) use_cached: bool,
}

/// State threaded through one marshal pass.
pub(crate) struct EncodeContext {
    pub(crate) deterministic: bool,
    /// First string field that carried invalid UTF-8. The bytes are
    /// written regardless; the error surfaces at the end.
    pub(crate) utf8_error: Option<String>,
}

/// Encoded byte count of `msg`, cached on the message.
pub(crate) fn size_message(msg: &DynamicMessage, opts: SizeOpts) -> usize {
    if opts.use_cached {
        if let Some(n) = msg.store.cached_size.get() {
            return n;
        }
    }
    let info_table = msg.descriptor.type_info();
    let mut total = 0;
    if let Some(exts) = &msg.store.extensions {
        total += crate::extension::size_all(exts, opts);
    }
    for info in info_table.fields.iter() {
        total += (info.coder.size)(&msg.store, info, opts);
    }
    total += msg.store.unknown.len();
    msg.store.cached_size.set(total);
    total
}

/// Writes `msg`'s fields into `buf`. Lengths come from the size caches
/// filled by [`size_message`], which must run first.
pub(crate) fn marshal_message(msg: &DynamicMessage, buf: &mut Vec<u8>, ctx: &mut EncodeContext) {
    let info_table = msg.descriptor.type_info();
    if let Some(exts) = &msg.store.extensions {
        crate::extension::marshal_all(exts, buf, ctx);
    }
    for info in info_table.fields.iter() {
        (info.coder.marshal)(&msg.store, info, buf, ctx);
    }
    buf.extend_from_slice(&msg.store.unknown);
}

/// Encodes `msg` into a fresh buffer.
pub(crate) fn encode(msg: &DynamicMessage, opts: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    encode_append(msg, &mut buf, opts)?;
    Ok(buf)
}

/// Encodes `msg` onto the end of `buf`.
///
/// On error the appended bytes are left in place; callers that need the
/// buffer back intact should truncate to its prior length.
pub(crate) fn encode_append(
    msg: &DynamicMessage,
    buf: &mut Vec<u8>,
    opts: &EncodeOptions,
) -> Result<(), EncodeError> {
    let total = size_message(
        msg,
        SizeOpts {
            use_cached: opts.use_cached_size,
        },
    );
    buf.reserve(total);
    let mut ctx = EncodeContext {
        deterministic: opts.deterministic,
        utf8_error: None,
    };
    marshal_message(msg, buf, &mut ctx);
    if let Some(name) = ctx.utf8_error {
        return Err(EncodeError::InvalidUtf8(name));
    }
    // Required fields are checked after the bytes are written.
    if !opts.allow_partial {
        if let Some(name) = crate::reflection::find_missing_required(msg) {
            return Err(EncodeError::MissingRequiredField(name));
        }
    }
    Ok(())
}

/// Exact encoded length of `msg`, without encoding it.
pub(crate) fn encoded_len(msg: &DynamicMessage) -> usize {
    size_message(msg, SizeOpts { use_cached: false })
}
