//! Shared schema fixtures for the integration tests.
//!
//! One pool, two files: `telemetry.proto` (proto3) runs through every scalar
//! kind plus repeated, packed, map and oneof shapes; `archive.proto` (proto2)
//! covers required fields, custom defaults, a closed enum, a group and
//! extensions.

#![allow(dead_code)]

use protoflect::{
    Cardinality, DescriptorPool, DynamicMessage, EnumDef, ExtensionDef, FieldDef, FieldDescriptor,
    FileDef, Kind, MessageDef, Syntax, Value,
};

pub fn pool() -> DescriptorPool {
    let telemetry = FileDef::new("telemetry.proto", "t", Syntax::Proto3)
        .enumeration(
            EnumDef::new("Level")
                .value("LEVEL_UNSPECIFIED", 0)
                .value("LEVEL_INFO", 1)
                .value("LEVEL_ALERT", 2),
        )
        .message(
            MessageDef::new("Sample")
                .field(FieldDef::scalar("x", 1, Cardinality::Optional, Kind::Int32))
                .field(FieldDef::scalar(
                    "label",
                    2,
                    Cardinality::Optional,
                    Kind::String,
                ))
                .field(FieldDef::message(
                    "next",
                    3,
                    Cardinality::Optional,
                    "t.Sample",
                )),
        )
        .message(
            MessageDef::new("Reading")
                .field(FieldDef::scalar("id", 1, Cardinality::Optional, Kind::Uint64))
                .field(FieldDef::scalar(
                    "name",
                    2,
                    Cardinality::Optional,
                    Kind::String,
                ))
                .field(FieldDef::scalar(
                    "payload",
                    3,
                    Cardinality::Optional,
                    Kind::Bytes,
                ))
                .field(FieldDef::scalar(
                    "temperature",
                    4,
                    Cardinality::Optional,
                    Kind::Double,
                ))
                .field(FieldDef::scalar(
                    "ratio",
                    5,
                    Cardinality::Optional,
                    Kind::Float,
                ))
                .field(FieldDef::scalar(
                    "count",
                    6,
                    Cardinality::Optional,
                    Kind::Int32,
                ))
                .field(FieldDef::scalar(
                    "total",
                    7,
                    Cardinality::Optional,
                    Kind::Int64,
                ))
                .field(FieldDef::scalar(
                    "flags",
                    8,
                    Cardinality::Optional,
                    Kind::Uint32,
                ))
                .field(FieldDef::scalar(
                    "delta",
                    9,
                    Cardinality::Optional,
                    Kind::Sint32,
                ))
                .field(FieldDef::scalar(
                    "offset",
                    10,
                    Cardinality::Optional,
                    Kind::Sint64,
                ))
                .field(FieldDef::scalar(
                    "stamp",
                    11,
                    Cardinality::Optional,
                    Kind::Fixed64,
                ))
                .field(FieldDef::scalar(
                    "crc",
                    12,
                    Cardinality::Optional,
                    Kind::Fixed32,
                ))
                .field(FieldDef::scalar(
                    "adjustment",
                    13,
                    Cardinality::Optional,
                    Kind::Sfixed32,
                ))
                .field(FieldDef::scalar(
                    "baseline",
                    14,
                    Cardinality::Optional,
                    Kind::Sfixed64,
                ))
                .field(FieldDef::scalar(
                    "active",
                    15,
                    Cardinality::Optional,
                    Kind::Bool,
                ))
                .field(FieldDef::enumeration(
                    "level",
                    16,
                    Cardinality::Optional,
                    "t.Level",
                ))
                .field(FieldDef::message(
                    "sample",
                    17,
                    Cardinality::Optional,
                    "t.Sample",
                ))
                .field(FieldDef::scalar(
                    "ticks",
                    18,
                    Cardinality::Repeated,
                    Kind::Int32,
                ))
                .field(FieldDef::scalar(
                    "names",
                    19,
                    Cardinality::Repeated,
                    Kind::String,
                ))
                .field(FieldDef::message(
                    "samples",
                    20,
                    Cardinality::Repeated,
                    "t.Sample",
                ))
                .field(
                    FieldDef::scalar("loose", 21, Cardinality::Repeated, Kind::Int32)
                        .packed(false),
                )
                .field(FieldDef::map("by_name", 22, Kind::String, Kind::Int32, ""))
                .field(FieldDef::map(
                    "by_id",
                    23,
                    Kind::Int32,
                    Kind::Message,
                    "t.Sample",
                ))
                .oneof("source")
                .field(
                    FieldDef::scalar("source_id", 24, Cardinality::Optional, Kind::Uint32)
                        .in_oneof(0),
                )
                .field(
                    FieldDef::message("source_sample", 25, Cardinality::Optional, "t.Sample")
                        .in_oneof(0),
                ),
        );

    let archive = FileDef::new("archive.proto", "arch", Syntax::Proto2)
        .enumeration(EnumDef::new("Mode").value("MODE_A", 1).value("MODE_B", 2))
        .message(MessageDef::new("Meta").field(FieldDef::scalar(
            "tag",
            1,
            Cardinality::Optional,
            Kind::String,
        )))
        .message(
            MessageDef::new("Attrs")
                .field(FieldDef::scalar("n", 1, Cardinality::Optional, Kind::Int32))
                .field(FieldDef::scalar("s", 2, Cardinality::Optional, Kind::String)),
        )
        .message(
            MessageDef::new("Record")
                .field(FieldDef::scalar("id", 1, Cardinality::Required, Kind::Int32))
                .field(FieldDef::scalar(
                    "title",
                    2,
                    Cardinality::Optional,
                    Kind::String,
                ))
                .field(
                    FieldDef::scalar("retries", 3, Cardinality::Optional, Kind::Int32)
                        .default(Value::I32(5)),
                )
                .field(FieldDef::enumeration(
                    "mode",
                    4,
                    Cardinality::Optional,
                    "arch.Mode",
                ))
                .field(FieldDef::group(
                    "attrs",
                    5,
                    Cardinality::Optional,
                    "arch.Attrs",
                ))
                .field(FieldDef::scalar(
                    "codes",
                    6,
                    Cardinality::Repeated,
                    Kind::Int32,
                ))
                .field(
                    FieldDef::scalar("packed_codes", 7, Cardinality::Repeated, Kind::Int32)
                        .packed(true),
                )
                .field(FieldDef::message(
                    "meta",
                    8,
                    Cardinality::Optional,
                    "arch.Meta",
                ))
                .field(FieldDef::message(
                    "inner",
                    9,
                    Cardinality::Optional,
                    "arch.Record",
                ))
                .extension_range(100, 200),
        )
        .extension(ExtensionDef::new(
            "arch.Record",
            FieldDef::scalar("ext_score", 100, Cardinality::Optional, Kind::Int32),
        ))
        .extension(ExtensionDef::new(
            "arch.Record",
            FieldDef::message("ext_meta", 101, Cardinality::Optional, "arch.Meta"),
        ))
        .extension(ExtensionDef::new(
            "arch.Record",
            FieldDef::scalar("ext_tags", 102, Cardinality::Repeated, Kind::Uint32),
        ));

    DescriptorPool::build(vec![telemetry, archive]).expect("fixture schema should build")
}

pub fn message(pool: &DescriptorPool, name: &str) -> DynamicMessage {
    DynamicMessage::new(
        pool.get_message_by_name(name)
            .unwrap_or_else(|| panic!("{name} should be in the fixture pool")),
    )
}

pub fn field(msg: &DynamicMessage, name: &str) -> FieldDescriptor {
    msg.descriptor()
        .field_by_name(name)
        .unwrap_or_else(|| panic!("{}.{name} should exist", msg.descriptor().full_name()))
}

pub fn set(msg: &mut DynamicMessage, name: &str, value: Value) {
    let fd = field(msg, name);
    msg.set_field(&fd, value);
}

pub fn get(msg: &DynamicMessage, name: &str) -> Value {
    msg.get_field(&field(msg, name))
}

pub fn has(msg: &DynamicMessage, name: &str) -> bool {
    msg.has_field(&field(msg, name))
}

/// A populated `t.Sample` leaf.
pub fn sample(pool: &DescriptorPool, x: i32, label: &str) -> DynamicMessage {
    let mut s = message(pool, "t.Sample");
    set(&mut s, "x", Value::I32(x));
    set(&mut s, "label", Value::from(label));
    s
}

/// The smallest valid `arch.Record`: just the required id.
pub fn record(pool: &DescriptorPool, id: i32) -> DynamicMessage {
    let mut r = message(pool, "arch.Record");
    set(&mut r, "id", Value::I32(id));
    r
}
