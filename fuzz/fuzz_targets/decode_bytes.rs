#![no_main]

use std::sync::LazyLock;

use libfuzzer_sys::fuzz_target;
use protoflect::{
    Cardinality, DescriptorPool, DynamicMessage, EncodeOptions, FieldDef, FileDef, Kind,
    MessageDef, Syntax,
};

static POOL: LazyLock<DescriptorPool> = LazyLock::new(|| {
    let file = FileDef::new("fuzz.proto", "f", Syntax::Proto3).message(
        MessageDef::new("Input")
            .field(FieldDef::scalar("a", 1, Cardinality::Optional, Kind::Int32))
            .field(FieldDef::scalar("s", 2, Cardinality::Optional, Kind::String))
            .field(FieldDef::scalar("b", 3, Cardinality::Optional, Kind::Bytes))
            .field(FieldDef::message("child", 4, Cardinality::Optional, "f.Input"))
            .field(FieldDef::scalar("reps", 5, Cardinality::Repeated, Kind::Uint64))
            .field(FieldDef::map("m", 6, Kind::String, Kind::Int32, ""))
            .field(FieldDef::scalar("fx", 7, Cardinality::Optional, Kind::Fixed32))
            .field(FieldDef::scalar("zz", 8, Cardinality::Optional, Kind::Sint64))
            .oneof("pick")
            .field(FieldDef::scalar("pn", 9, Cardinality::Optional, Kind::Uint32).in_oneof(0))
            .field(FieldDef::message("pm", 10, Cardinality::Optional, "f.Input").in_oneof(0)),
    );
    DescriptorPool::from_file(file).expect("fuzz schema")
});

fuzz_target!(|data: &[u8]| {
    let desc = POOL.get_message_by_name("f.Input").expect("f.Input");
    let Ok(msg) = DynamicMessage::decode(desc.clone(), data) else {
        return;
    };

    // Anything that decoded must re-encode, and the deterministic
    // re-encoding must be a fixed point.
    let det = EncodeOptions::new().deterministic(true);
    let first = det.encode(&msg).expect("decoded message encodes");
    let again = DynamicMessage::decode(desc, &first).expect("own output decodes");
    assert_eq!(det.encode(&again).expect("re-encode"), first);
});
