//! Test utilities for protoflect - available to downstream crates for testing.

use crate::decoding::DecodeOptions;
use crate::encoding::EncodeOptions;
use crate::reflection::DynamicMessage;

/// Assert that a message survives encode → decode → encode byte identical.
/// Returns the decoded copy for further checks.
pub fn assert_roundtrip(msg: &DynamicMessage) -> DynamicMessage {
    assert_roundtrip_with(msg, &EncodeOptions::new(), &DecodeOptions::new())
}

/// [`assert_roundtrip`] under explicit options: deterministic output, a
/// resolver other than the message's own pool, partial messages.
pub fn assert_roundtrip_with(
    msg: &DynamicMessage,
    eopts: &EncodeOptions,
    dopts: &DecodeOptions,
) -> DynamicMessage {
    let name = msg.descriptor().full_name().to_string();
    let data = eopts.encode(msg).expect("message should encode");

    let mut decoded = DynamicMessage::new(msg.descriptor().clone());
    dopts
        .merge(&mut decoded, &data)
        .unwrap_or_else(|e| panic!("{name}: {} encoded bytes should decode: {e}", data.len()));

    let redata = eopts.encode(&decoded).expect("decoded message should encode");
    assert_eq!(redata, data, "{name}: re-encoding changed the bytes");
    decoded
}

/// Assert that `buf` decodes into the type and re-encodes to exactly `buf`.
/// This is the property unknown fields and groups are held to.
pub fn assert_bytes_roundtrip(
    descriptor: &crate::descriptor::MessageDescriptor,
    buf: &[u8],
) -> DynamicMessage {
    let msg = DynamicMessage::decode(descriptor.clone(), buf)
        .unwrap_or_else(|e| panic!("{}: bytes should decode: {e}", descriptor.full_name()));
    let out = msg.encode_to_vec().expect("decoded message should encode");
    assert_eq!(
        out,
        buf,
        "{}: decode/encode changed the bytes",
        descriptor.full_name()
    );
    msg
}
