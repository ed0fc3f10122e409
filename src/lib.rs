//! Descriptor-driven protocol buffer binary codec.
//!
//! Message types are described at runtime by descriptors interned in a
//! [`DescriptorPool`]. The first encode or decode of a type builds its
//! codec table (one set of size/marshal/unmarshal functions per field) once,
//! thread safely, and every [`DynamicMessage`] of that type runs on it.
//! Unknown fields round-trip verbatim, extensions resolve through a
//! pluggable [`ExtensionResolver`], and [`EncodeOptions`]/[`DecodeOptions`]
//! carry the per-call knobs.

pub mod containers;
pub mod decoding;
pub mod descriptor;
pub mod encoding;
pub mod error;
pub mod extension;
pub mod reflection;
pub mod test_utils;
pub mod value;
pub mod wire;

mod coders;
mod descriptor_pool;
mod store;
mod tables;

pub use containers::ProtoString;
pub use decoding::{DEFAULT_RECURSION_LIMIT, DecodeOptions};
pub use descriptor::{
    Cardinality, DescriptorPool, DescriptorPoolBuilder, EnumDef, EnumDescriptor, ExtensionDef,
    ExtensionDescriptor, FieldDef, FieldDescriptor, FileDef, FileDescriptor, Kind, MapDef,
    MessageDef, MessageDescriptor, OneofDescriptor, Syntax,
};
pub use encoding::EncodeOptions;
pub use error::{DecodeError, DescriptorError, EncodeError};
pub use extension::ExtensionResolver;
pub use reflection::{DynamicMessage, Protobuf};
pub use value::{MapKey, Value};
