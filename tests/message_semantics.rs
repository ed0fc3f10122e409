//! Presence, oneof, required, UTF-8 and merge behavior end to end.

mod support;

use protoflect::{
    DecodeError, DecodeOptions, DynamicMessage, EncodeError, EncodeOptions, ProtoString, Value,
};

#[test]
fn oneof_members_displace_each_other() {
    let pool = support::pool();
    let mut msg = support::message(&pool, "t.Reading");
    let oneof = msg
        .descriptor()
        .oneof_by_name("source")
        .expect("source oneof");

    assert_eq!(msg.which_oneof(&oneof), None);

    support::set(&mut msg, "source_id", Value::U32(11));
    assert_eq!(
        msg.which_oneof(&oneof).expect("member set").name(),
        "source_id"
    );

    support::set(
        &mut msg,
        "source_sample",
        Value::from(support::sample(&pool, 1, "s")),
    );
    assert_eq!(
        msg.which_oneof(&oneof).expect("member set").name(),
        "source_sample"
    );
    assert!(!support::has(&msg, "source_id"));
    assert_eq!(support::get(&msg, "source_id"), Value::U32(0));

    // Clearing a member that is not held is a no-op.
    let source_id = support::field(&msg, "source_id");
    msg.clear_field(&source_id);
    assert_eq!(
        msg.which_oneof(&oneof).expect("member still set").name(),
        "source_sample"
    );

    let source_sample = support::field(&msg, "source_sample");
    msg.clear_field(&source_sample);
    assert_eq!(msg.which_oneof(&oneof), None);

    // On the wire the later member wins regardless of shape.
    let mut a = support::message(&pool, "t.Reading");
    support::set(&mut a, "source_sample", Value::from(support::sample(&pool, 2, "")));
    let mut bytes = a.encode_to_vec().expect("should encode");
    let mut b = support::message(&pool, "t.Reading");
    support::set(&mut b, "source_id", Value::U32(9));
    bytes.extend(b.encode_to_vec().expect("should encode"));

    let decoded =
        DynamicMessage::decode(msg.descriptor().clone(), &bytes).expect("should decode");
    assert_eq!(
        decoded.which_oneof(&oneof).expect("member set").name(),
        "source_id"
    );
    assert_eq!(support::get(&decoded, "source_id"), Value::U32(9));
}

#[test]
fn required_fields_gate_encode_and_decode() {
    let pool = support::pool();
    let desc = pool.get_message_by_name("arch.Record").expect("arch.Record");

    let mut rec = support::message(&pool, "arch.Record");
    support::set(&mut rec, "title", Value::from("untitled"));
    assert!(!rec.is_initialized());
    assert_eq!(
        rec.encode_to_vec(),
        Err(EncodeError::MissingRequiredField("arch.Record.id".into()))
    );
    let partial = EncodeOptions::new()
        .allow_partial(true)
        .encode(&rec)
        .expect("partial encode succeeds");

    assert_eq!(
        DynamicMessage::decode(desc.clone(), &partial),
        Err(DecodeError::MissingRequiredField("arch.Record.id".into()))
    );
    let decoded = DecodeOptions::new()
        .allow_partial(true)
        .decode(desc.clone(), &partial)
        .expect("partial decode succeeds");
    assert!(!decoded.is_initialized());
    assert_eq!(support::get(&decoded, "title"), Value::from("untitled"));

    // The check walks into submessages.
    let mut outer = support::record(&pool, 1);
    let hollow = support::message(&pool, "arch.Record");
    support::set(&mut outer, "inner", Value::from(hollow));
    assert!(!outer.is_initialized());
    assert_eq!(
        outer.encode_to_vec(),
        Err(EncodeError::MissingRequiredField("arch.Record.id".into()))
    );

    let Value::Message(mut inner) = support::get(&outer, "inner") else {
        panic!("inner should be a message");
    };
    support::set(&mut inner, "id", Value::I32(2));
    support::set(&mut outer, "inner", Value::Message(inner));
    assert!(outer.is_initialized());
    outer.encode_to_vec().expect("complete record encodes");
}

#[test]
fn custom_defaults_and_explicit_presence() {
    let pool = support::pool();
    let mut rec = support::record(&pool, 1);

    // The declared default is virtual until the field is written.
    assert!(!support::has(&rec, "retries"));
    assert_eq!(support::get(&rec, "retries"), Value::I32(5));

    // An explicit zero is real: present, and on the wire.
    support::set(&mut rec, "retries", Value::I32(0));
    assert!(support::has(&rec, "retries"));
    assert_eq!(support::get(&rec, "retries"), Value::I32(0));
    assert_eq!(
        rec.encode_to_vec().expect("should encode"),
        [0x08, 0x01, 0x18, 0x00]
    );

    let retries = support::field(&rec, "retries");
    rec.clear_field(&retries);
    assert!(!support::has(&rec, "retries"));
    assert_eq!(support::get(&rec, "retries"), Value::I32(5));

    // Proto2 strings keep empty-but-present.
    support::set(&mut rec, "title", Value::from(""));
    assert!(support::has(&rec, "title"));
    assert_eq!(
        rec.encode_to_vec().expect("should encode"),
        [0x08, 0x01, 0x12, 0x00]
    );

    // Closed enums default to their first declared value.
    assert_eq!(support::get(&rec, "mode"), Value::Enum(1));

    // Proto3 implicit fields treat zero as absent.
    let mut reading = support::message(&pool, "t.Reading");
    support::set(&mut reading, "count", Value::I32(0));
    assert!(!support::has(&reading, "count"));
    assert_eq!(support::get(&reading, "count"), Value::I32(0));
    assert_eq!(reading.encoded_len(), 0);
}

#[test]
fn utf8_validation_follows_syntax() {
    let pool = support::pool();

    // Proto3 strings must be UTF-8 in both directions.
    let sample_desc = pool.get_message_by_name("t.Sample").expect("t.Sample");
    assert_eq!(
        DynamicMessage::decode(sample_desc.clone(), &[0x12, 0x01, 0xFF]),
        Err(DecodeError::InvalidUtf8("t.Sample.label".into()))
    );
    let mut sample = DynamicMessage::new(sample_desc);
    sample.set_field(
        &support::field(&sample, "label"),
        Value::String(ProtoString::from_bytes(vec![0xFF])),
    );
    assert_eq!(
        sample.encode_to_vec(),
        Err(EncodeError::InvalidUtf8("t.Sample.label".into()))
    );

    // Proto2 strings pass bytes through unchecked.
    let meta_desc = pool.get_message_by_name("arch.Meta").expect("arch.Meta");
    let meta =
        DynamicMessage::decode(meta_desc, &[0x0A, 0x01, 0xFF]).expect("proto2 accepts raw bytes");
    let Value::String(tag) = support::get(&meta, "tag") else {
        panic!("tag should be a string");
    };
    assert_eq!(tag.as_str(), None);
    assert_eq!(tag.as_bytes(), [0xFF]);
    assert_eq!(
        meta.encode_to_vec().expect("should encode"),
        [0x0A, 0x01, 0xFF]
    );

    // Bytes fields take anything under either syntax.
    let mut reading = support::message(&pool, "t.Reading");
    support::set(&mut reading, "payload", Value::Bytes(vec![0xFF, 0xFE]));
    reading.encode_to_vec().expect("bytes are unchecked");
}

#[test]
fn recursion_limit_counts_message_frames() {
    let pool = support::pool();

    // Reading -> sample -> next -> next -> next: five frames.
    let mut tail = support::sample(&pool, 4, "");
    for x in (1..=3).rev() {
        let mut link = support::sample(&pool, x, "");
        support::set(&mut link, "next", Value::from(tail));
        tail = link;
    }
    let mut msg = support::message(&pool, "t.Reading");
    support::set(&mut msg, "sample", Value::from(tail));
    let bytes = msg.encode_to_vec().expect("should encode");

    let desc = msg.descriptor().clone();
    assert_eq!(
        DecodeOptions::new()
            .recursion_limit(4)
            .decode(desc.clone(), &bytes)
            .map(|_| ()),
        Err(DecodeError::RecursionLimitExceeded)
    );
    let decoded = DecodeOptions::new()
        .recursion_limit(5)
        .decode(desc, &bytes)
        .expect("five frames fit the limit");
    assert_eq!(decoded, msg);
}

#[test]
fn merge_keeps_fields_parsed_before_an_error() {
    let pool = support::pool();
    let mut msg = support::message(&pool, "t.Reading");

    // A complete name record, then a truncated length prefix.
    let bytes = [0x12, 0x01, 0x61, 0x1A, 0x05, 0x00];
    assert_eq!(msg.merge_from(&bytes), Err(DecodeError::Truncated));
    assert_eq!(support::get(&msg, "name"), Value::from("a"));
}

#[test]
fn clear_resets_everything() {
    let pool = support::pool();
    let desc = pool.get_message_by_name("t.Sample").expect("t.Sample");

    let mut input = vec![0x08, 0x07];
    input.extend_from_slice(&[0x98, 0x06, 0x2A]); // unknown 99: 42
    let mut msg = DynamicMessage::decode(desc, &input).expect("should decode");
    assert!(!msg.unknown_fields().is_empty());

    msg.clear_unknown_fields();
    assert_eq!(msg.encode_to_vec().expect("should encode"), [0x08, 0x07]);

    msg.clear();
    assert!(!support::has(&msg, "x"));
    assert_eq!(msg.encoded_len(), 0);
}

#[test]
fn deterministic_mode_is_repeatable_and_cache_compatible() {
    let pool = support::pool();
    let mut msg = support::message(&pool, "t.Reading");
    support::set(
        &mut msg,
        "by_name",
        Value::Map(
            [
                ("c".into(), Value::I32(3)),
                ("a".into(), Value::I32(1)),
                ("b".into(), Value::I32(2)),
            ]
            .into(),
        ),
    );
    support::set(&mut msg, "name", Value::from("det"));

    let det = EncodeOptions::new().deterministic(true);
    let first = det.encode(&msg).expect("should encode");
    assert_eq!(det.encode(&msg).expect("should encode"), first);

    // Sizing then reusing the caches does not disturb the ordering.
    assert_eq!(det.encoded_len(&msg), first.len());
    let cached = EncodeOptions::new()
        .deterministic(true)
        .use_cached_size(true)
        .encode(&msg)
        .expect("should encode");
    assert_eq!(cached, first);
}

#[test]
fn map_entries_tolerate_partial_and_noisy_records() {
    let pool = support::pool();
    let desc = pool.get_message_by_name("t.Reading").expect("t.Reading");

    // by_name entries: value-less "a", an empty entry, a key-less 7
    // (overwriting the empty entry's default key), and one carrying an
    // entry-local field 3 to skip.
    let input = [
        0xB2, 0x01, 0x03, 0x0A, 0x01, 0x61, // {"a": <default>}
        0xB2, 0x01, 0x00, // {"": 0}
        0xB2, 0x01, 0x02, 0x10, 0x07, // {"": 7}
        0xB2, 0x01, 0x07, 0x0A, 0x01, 0x62, 0x10, 0x05, 0x18, 0x09, // {"b": 5} + noise
    ];
    let msg = DynamicMessage::decode(desc, &input).expect("map entries decode");
    assert_eq!(
        support::get(&msg, "by_name"),
        Value::Map(
            [
                ("a".into(), Value::I32(0)),
                ("".into(), Value::I32(7)),
                ("b".into(), Value::I32(5)),
            ]
            .into()
        )
    );
    assert!(msg.unknown_fields().is_empty());

    // Entries always re-encode with both fields present.
    let bytes = msg.encode_to_vec().expect("should encode");
    let canonical: &[u8] = &[0xB2, 0x01, 0x05, 0x0A, 0x01, 0x61, 0x10, 0x00];
    let mut single = support::message(&pool, "t.Reading");
    support::set(
        &mut single,
        "by_name",
        Value::Map([("a".into(), Value::I32(0))].into()),
    );
    assert_eq!(single.encode_to_vec().expect("should encode"), canonical);
    assert_eq!(bytes.len(), 8 + 7 + 8); // three full entries
}

#[test]
fn codec_tables_build_once_across_threads() {
    let pool = support::pool();
    let desc = pool.get_message_by_name("t.Reading").expect("t.Reading");

    let mut msg = support::message(&pool, "t.Reading");
    support::set(&mut msg, "name", Value::from("shared"));
    support::set(
        &mut msg,
        "sample",
        Value::from(support::sample(&pool, 3, "leaf")),
    );
    support::set(
        &mut msg,
        "ticks",
        Value::List(vec![Value::I32(1), Value::I32(2)]),
    );
    let bytes = msg.encode_to_vec().expect("should encode");

    // First use per type races the lazy table build; every thread must see
    // the same finished table.
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..50 {
                    let decoded = DynamicMessage::decode(desc.clone(), &bytes)
                        .expect("shared descriptor decodes");
                    assert_eq!(decoded.encode_to_vec().expect("should encode"), bytes);
                }
            });
        }
    });
}

#[test]
fn repeated_and_map_presence_is_non_emptiness() {
    let pool = support::pool();
    let mut msg = support::message(&pool, "t.Reading");

    assert!(!support::has(&msg, "ticks"));
    assert!(!support::has(&msg, "by_name"));

    support::set(&mut msg, "ticks", Value::List(vec![Value::I32(1)]));
    support::set(
        &mut msg,
        "by_name",
        Value::Map([("k".into(), Value::I32(1))].into()),
    );
    assert!(support::has(&msg, "ticks"));
    assert!(support::has(&msg, "by_name"));

    support::set(&mut msg, "ticks", Value::List(Vec::new()));
    assert!(!support::has(&msg, "ticks"));
}
