//! Descriptor model: the runtime description of message types.
//!
//! Definitions enter through the `*Def` structs (the shape a `.proto` parser
//! or a code generator would emit), are validated and interned by
//! [`DescriptorPool`](crate::DescriptorPool), and come back out as cheap
//! `Arc`-backed handles:
//!
//! - [`MessageDescriptor`], [`FieldDescriptor`], [`OneofDescriptor`]
//! - [`EnumDescriptor`]
//! - [`ExtensionDescriptor`]
//! - [`FileDescriptor`]
//!
//! Handles are `Send + Sync`, cheap to clone, and compare equal exactly when
//! they name the same entry of the same pool. Type names in definitions are
//! fully qualified; a leading `.` is tolerated and stripped.

pub use crate::descriptor_pool::{DescriptorPool, DescriptorPoolBuilder};

use crate::descriptor_pool::{ExtensionData, FieldData, MessageData, OneofData, TypeRef};
use crate::reflection::DynamicMessage;
use crate::value::Value;
use crate::wire::WireType;

/// The syntax edition of a `.proto` file. It decides field presence defaults,
/// packedness defaults, whether enums are closed, and UTF-8 enforcement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
    Proto3,
}

/// The declared type of a field, numbered as in `descriptor.proto`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Kind {
    Double = 1,
    Float = 2,
    Int64 = 3,
    Uint64 = 4,
    Int32 = 5,
    Fixed64 = 6,
    Fixed32 = 7,
    Bool = 8,
    String = 9,
    Group = 10,
    Message = 11,
    Bytes = 12,
    Uint32 = 13,
    Enum = 14,
    Sfixed32 = 15,
    Sfixed64 = 16,
    Sint32 = 17,
    Sint64 = 18,
}

impl Kind {
    /// The wire type a single value of this kind is encoded with.
    pub const fn wire_type(self) -> WireType {
        match self {
            Kind::Int32
            | Kind::Int64
            | Kind::Uint32
            | Kind::Uint64
            | Kind::Sint32
            | Kind::Sint64
            | Kind::Bool
            | Kind::Enum => WireType::Varint,
            Kind::Fixed64 | Kind::Sfixed64 | Kind::Double => WireType::Fixed64,
            Kind::String | Kind::Bytes | Kind::Message => WireType::LengthDelimited,
            Kind::Group => WireType::StartGroup,
            Kind::Fixed32 | Kind::Sfixed32 | Kind::Float => WireType::Fixed32,
        }
    }

    /// Whether repeated fields of this kind may use packed encoding.
    pub const fn is_packable(self) -> bool {
        !matches!(
            self,
            Kind::String | Kind::Bytes | Kind::Message | Kind::Group
        )
    }

    /// Encoded width of one value, for the fixed-width kinds.
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Kind::Fixed32 | Kind::Sfixed32 | Kind::Float => Some(4),
            Kind::Fixed64 | Kind::Sfixed64 | Kind::Double => Some(8),
            _ => None,
        }
    }

    /// Whether this kind references another named type.
    pub const fn needs_type_name(self) -> bool {
        matches!(self, Kind::Message | Kind::Group | Kind::Enum)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    Optional,
    Required,
    Repeated,
}

// ---------------------------------------------------------------------------
// Definition inputs.

/// One `.proto` file's worth of definitions.
#[derive(Clone, Debug)]
pub struct FileDef {
    pub name: String,
    pub package: String,
    pub syntax: Syntax,
    pub messages: Vec<MessageDef>,
    pub enums: Vec<EnumDef>,
    pub extensions: Vec<ExtensionDef>,
}

impl FileDef {
    pub fn new(name: impl Into<String>, package: impl Into<String>, syntax: Syntax) -> Self {
        FileDef {
            name: name.into(),
            package: package.into(),
            syntax,
            messages: Vec::new(),
            enums: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn message(mut self, m: MessageDef) -> Self {
        self.messages.push(m);
        self
    }

    pub fn enumeration(mut self, e: EnumDef) -> Self {
        self.enums.push(e);
        self
    }

    pub fn extension(mut self, x: ExtensionDef) -> Self {
        self.extensions.push(x);
        self
    }
}

#[derive(Clone, Debug)]
pub struct MessageDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub oneofs: Vec<String>,
    pub nested: Vec<MessageDef>,
    pub enums: Vec<EnumDef>,
    /// Inclusive number ranges open for extension.
    pub extension_ranges: Vec<(u32, u32)>,
    pub extensions: Vec<ExtensionDef>,
}

impl MessageDef {
    pub fn new(name: impl Into<String>) -> Self {
        MessageDef {
            name: name.into(),
            fields: Vec::new(),
            oneofs: Vec::new(),
            nested: Vec::new(),
            enums: Vec::new(),
            extension_ranges: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn field(mut self, f: FieldDef) -> Self {
        self.fields.push(f);
        self
    }

    pub fn oneof(mut self, name: impl Into<String>) -> Self {
        self.oneofs.push(name.into());
        self
    }

    pub fn nested(mut self, m: MessageDef) -> Self {
        self.nested.push(m);
        self
    }

    pub fn enumeration(mut self, e: EnumDef) -> Self {
        self.enums.push(e);
        self
    }

    pub fn extension_range(mut self, lo: u32, hi: u32) -> Self {
        self.extension_ranges.push((lo, hi));
        self
    }

    pub fn extension(mut self, x: ExtensionDef) -> Self {
        self.extensions.push(x);
        self
    }
}

/// One field declaration. Map fields are built through [`FieldDef::map`],
/// which fixes the shape protobuf requires of them (repeated, never packed,
/// never a oneof member).
#[derive(Clone, Debug)]
pub struct FieldDef {
    pub name: String,
    /// Overrides the lowerCamelCase JSON name derived from `name`.
    pub json_name: Option<String>,
    pub number: u32,
    pub kind: Kind,
    pub cardinality: Cardinality,
    /// Fully-qualified name of the message/enum/group type, when the kind
    /// needs one. A leading `.` is tolerated.
    pub type_name: String,
    /// Explicit packedness; `None` defers to the syntax default (packed in
    /// proto3, unpacked in proto2) for packable repeated fields.
    pub packed: Option<bool>,
    pub oneof_index: Option<usize>,
    pub proto3_optional: bool,
    pub weak: bool,
    pub default_value: Option<Value>,
    pub map: Option<MapDef>,
}

#[derive(Clone, Debug)]
pub struct MapDef {
    pub key_kind: Kind,
    pub value_kind: Kind,
    pub value_type_name: String,
}

impl FieldDef {
    pub fn scalar(
        name: impl Into<String>,
        number: u32,
        cardinality: Cardinality,
        kind: Kind,
    ) -> Self {
        FieldDef {
            name: name.into(),
            json_name: None,
            number,
            kind,
            cardinality,
            type_name: String::new(),
            packed: None,
            oneof_index: None,
            proto3_optional: false,
            weak: false,
            default_value: None,
            map: None,
        }
    }

    pub fn message(
        name: impl Into<String>,
        number: u32,
        cardinality: Cardinality,
        type_name: impl Into<String>,
    ) -> Self {
        let mut f = Self::scalar(name, number, cardinality, Kind::Message);
        f.type_name = type_name.into();
        f
    }

    pub fn group(
        name: impl Into<String>,
        number: u32,
        cardinality: Cardinality,
        type_name: impl Into<String>,
    ) -> Self {
        let mut f = Self::scalar(name, number, cardinality, Kind::Group);
        f.type_name = type_name.into();
        f
    }

    pub fn enumeration(
        name: impl Into<String>,
        number: u32,
        cardinality: Cardinality,
        type_name: impl Into<String>,
    ) -> Self {
        let mut f = Self::scalar(name, number, cardinality, Kind::Enum);
        f.type_name = type_name.into();
        f
    }

    pub fn map(
        name: impl Into<String>,
        number: u32,
        key_kind: Kind,
        value_kind: Kind,
        value_type_name: impl Into<String>,
    ) -> Self {
        let mut f = Self::scalar(name, number, Cardinality::Repeated, Kind::Message);
        f.map = Some(MapDef {
            key_kind,
            value_kind,
            value_type_name: value_type_name.into(),
        });
        f
    }

    pub fn packed(mut self, packed: bool) -> Self {
        self.packed = Some(packed);
        self
    }

    pub fn in_oneof(mut self, index: usize) -> Self {
        self.oneof_index = Some(index);
        self
    }

    pub fn proto3_optional(mut self) -> Self {
        self.proto3_optional = true;
        self
    }

    pub fn weak(mut self) -> Self {
        self.weak = true;
        self
    }

    pub fn default(mut self, v: Value) -> Self {
        self.default_value = Some(v);
        self
    }

    pub fn json_name(mut self, name: impl Into<String>) -> Self {
        self.json_name = Some(name.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<(String, i32)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>) -> Self {
        EnumDef {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push((name.into(), number));
        self
    }
}

/// A field declared outside its containing message, targeting an extension
/// range of `extendee`.
#[derive(Clone, Debug)]
pub struct ExtensionDef {
    pub extendee: String,
    pub field: FieldDef,
}

impl ExtensionDef {
    pub fn new(extendee: impl Into<String>, field: FieldDef) -> Self {
        ExtensionDef {
            extendee: extendee.into(),
            field,
        }
    }
}

// ---------------------------------------------------------------------------
// Handles.

#[derive(Clone)]
pub struct FileDescriptor {
    pub(crate) pool: DescriptorPool,
    pub(crate) index: u32,
}

impl FileDescriptor {
    pub fn name(&self) -> &str {
        &self.pool.inner().files[self.index as usize].name
    }

    pub fn package(&self) -> &str {
        &self.pool.inner().files[self.index as usize].package
    }

    pub fn syntax(&self) -> Syntax {
        self.pool.inner().files[self.index as usize].syntax
    }
}

impl std::fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileDescriptor({})", self.name())
    }
}

#[derive(Clone)]
pub struct MessageDescriptor {
    pub(crate) pool: DescriptorPool,
    pub(crate) index: u32,
}

impl MessageDescriptor {
    pub(crate) fn data(&self) -> &MessageData {
        &self.pool.inner().messages[self.index as usize]
    }

    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    pub fn name(&self) -> &str {
        let full = self.full_name();
        full.rsplit('.').next().unwrap_or(full)
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    pub fn file(&self) -> FileDescriptor {
        FileDescriptor {
            pool: self.pool.clone(),
            index: self.data().file,
        }
    }

    pub fn syntax(&self) -> Syntax {
        self.pool.inner().files[self.data().file as usize].syntax
    }

    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        (0..self.data().fields.len() as u32).map(move |i| FieldDescriptor {
            pool: self.pool.clone(),
            message: self.index,
            index: i,
        })
    }

    pub fn field_by_number(&self, number: u32) -> Option<FieldDescriptor> {
        let i = self.data().fields.iter().position(|f| f.number == number)?;
        Some(FieldDescriptor {
            pool: self.pool.clone(),
            message: self.index,
            index: i as u32,
        })
    }

    pub fn field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        let i = self.data().fields.iter().position(|f| f.name == name)?;
        Some(FieldDescriptor {
            pool: self.pool.clone(),
            message: self.index,
            index: i as u32,
        })
    }

    pub fn oneofs(&self) -> impl ExactSizeIterator<Item = OneofDescriptor> + '_ {
        (0..self.data().oneofs.len() as u32).map(move |i| OneofDescriptor {
            pool: self.pool.clone(),
            message: self.index,
            index: i,
        })
    }

    pub fn oneof_by_name(&self, name: &str) -> Option<OneofDescriptor> {
        let i = self.data().oneofs.iter().position(|o| o.name == name)?;
        Some(OneofDescriptor {
            pool: self.pool.clone(),
            message: self.index,
            index: i as u32,
        })
    }

    /// Inclusive field-number ranges open for extension.
    pub fn extension_ranges(&self) -> &[(u32, u32)] {
        &self.data().extension_ranges
    }

    pub fn in_extension_range(&self, number: u32) -> bool {
        self.data()
            .extension_ranges
            .iter()
            .any(|&(lo, hi)| (lo..=hi).contains(&number))
    }

    pub(crate) fn type_info(&self) -> &crate::tables::MessageTypeInfo {
        self.data()
            .type_info
            .get_or_init(|| crate::tables::MessageTypeInfo::build(self))
    }
}

impl PartialEq for MessageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.pool.same_pool(&other.pool)
    }
}

impl Eq for MessageDescriptor {}

impl std::fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageDescriptor({})", self.full_name())
    }
}

#[derive(Clone)]
pub struct FieldDescriptor {
    pub(crate) pool: DescriptorPool,
    pub(crate) message: u32,
    pub(crate) index: u32,
}

impl FieldDescriptor {
    pub(crate) fn data(&self) -> &FieldData {
        &self.pool.inner().messages[self.message as usize].fields[self.index as usize]
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    pub fn json_name(&self) -> &str {
        &self.data().json_name
    }

    pub fn number(&self) -> u32 {
        self.data().number
    }

    pub fn kind(&self) -> Kind {
        self.data().kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.data().cardinality
    }

    pub fn is_repeated(&self) -> bool {
        self.data().cardinality == Cardinality::Repeated
    }

    pub fn is_required(&self) -> bool {
        self.data().cardinality == Cardinality::Required
    }

    /// Resolved packedness: the explicit option when given, otherwise the
    /// syntax default for packable repeated fields.
    pub fn is_packed(&self) -> bool {
        self.data().packed
    }

    pub fn is_map(&self) -> bool {
        self.data().map.is_some()
    }

    pub fn is_weak(&self) -> bool {
        self.data().weak
    }

    pub fn proto3_optional(&self) -> bool {
        self.data().proto3_optional
    }

    pub fn containing_message(&self) -> MessageDescriptor {
        MessageDescriptor {
            pool: self.pool.clone(),
            index: self.message,
        }
    }

    pub fn syntax(&self) -> Syntax {
        self.containing_message().syntax()
    }

    pub fn oneof_index(&self) -> Option<usize> {
        self.data().oneof.map(|i| i as usize)
    }

    pub fn containing_oneof(&self) -> Option<OneofDescriptor> {
        self.data().oneof.map(|i| OneofDescriptor {
            pool: self.pool.clone(),
            message: self.message,
            index: i,
        })
    }

    /// The referenced message type for message and group kinds, and for map
    /// fields the (synthetic) entry is not materialized; use the map
    /// accessors instead.
    pub fn message_type(&self) -> Option<MessageDescriptor> {
        match self.data().type_ref {
            TypeRef::Message(i) => Some(MessageDescriptor {
                pool: self.pool.clone(),
                index: i,
            }),
            _ => None,
        }
    }

    pub fn enum_type(&self) -> Option<EnumDescriptor> {
        match self.data().type_ref {
            TypeRef::Enum(i) => Some(EnumDescriptor {
                pool: self.pool.clone(),
                index: i,
            }),
            _ => None,
        }
    }

    pub fn map_key_kind(&self) -> Option<Kind> {
        self.data().map.as_ref().map(|m| m.key_kind)
    }

    pub fn map_value_kind(&self) -> Option<Kind> {
        self.data().map.as_ref().map(|m| m.value_kind)
    }

    pub fn map_value_message(&self) -> Option<MessageDescriptor> {
        match self.data().map.as_ref()?.value_ref {
            TypeRef::Message(i) => Some(MessageDescriptor {
                pool: self.pool.clone(),
                index: i,
            }),
            _ => None,
        }
    }

    pub fn map_value_enum(&self) -> Option<EnumDescriptor> {
        match self.data().map.as_ref()?.value_ref {
            TypeRef::Enum(i) => Some(EnumDescriptor {
                pool: self.pool.clone(),
                index: i,
            }),
            _ => None,
        }
    }

    /// Whether absence is observable: true for everything except proto3
    /// implicit-presence scalars.
    pub fn has_presence(&self) -> bool {
        if self.is_repeated() {
            return false;
        }
        matches!(self.kind(), Kind::Message | Kind::Group)
            || self.data().oneof.is_some()
            || self.proto3_optional()
            || self.syntax() == Syntax::Proto2
    }

    /// The value reads observe when the field is absent: the custom default
    /// when declared, else the zero value for the kind (first declared value
    /// for proto2 enums, an empty message for message kinds).
    pub fn default_value(&self) -> Value {
        if self.is_map() {
            return Value::Map(Default::default());
        }
        if self.is_repeated() {
            return Value::List(Vec::new());
        }
        if let Some(v) = &self.data().default_value {
            return v.clone();
        }
        match self.kind() {
            Kind::Message | Kind::Group => match self.message_type() {
                Some(m) => Value::Message(Box::new(DynamicMessage::new(m))),
                None => unreachable!("message field without resolved type"),
            },
            Kind::Enum => match self.enum_type() {
                Some(e) => Value::Enum(e.default_number()),
                None => unreachable!("enum field without resolved type"),
            },
            kind => Value::default_for_scalar(kind),
        }
    }

    /// Whether decoded string payloads must be valid UTF-8 (proto3 strings).
    pub fn requires_utf8(&self) -> bool {
        self.kind() == Kind::String && self.syntax() == Syntax::Proto3
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
            && self.index == other.index
            && self.pool.same_pool(&other.pool)
    }
}

impl Eq for FieldDescriptor {}

impl std::fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FieldDescriptor({})", self.full_name())
    }
}

#[derive(Clone)]
pub struct OneofDescriptor {
    pub(crate) pool: DescriptorPool,
    pub(crate) message: u32,
    pub(crate) index: u32,
}

impl OneofDescriptor {
    pub(crate) fn data(&self) -> &OneofData {
        &self.pool.inner().messages[self.message as usize].oneofs[self.index as usize]
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn containing_message(&self) -> MessageDescriptor {
        MessageDescriptor {
            pool: self.pool.clone(),
            index: self.message,
        }
    }

    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldDescriptor> + '_ {
        self.data().members.iter().map(move |&i| FieldDescriptor {
            pool: self.pool.clone(),
            message: self.message,
            index: i,
        })
    }
}

impl PartialEq for OneofDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
            && self.index == other.index
            && self.pool.same_pool(&other.pool)
    }
}

impl Eq for OneofDescriptor {}

impl std::fmt::Debug for OneofDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OneofDescriptor({}.{})",
            self.containing_message().full_name(),
            self.name()
        )
    }
}

#[derive(Clone)]
pub struct EnumDescriptor {
    pub(crate) pool: DescriptorPool,
    pub(crate) index: u32,
}

impl EnumDescriptor {
    fn data(&self) -> &crate::descriptor_pool::EnumData {
        &self.pool.inner().enums[self.index as usize]
    }

    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    pub fn name(&self) -> &str {
        let full = self.full_name();
        full.rsplit('.').next().unwrap_or(full)
    }

    pub fn syntax(&self) -> Syntax {
        self.pool.inner().files[self.data().file as usize].syntax
    }

    /// Closed enums (proto2) reject undeclared numbers at decode time; the
    /// record is routed to the unknown set instead of the field.
    pub fn is_closed(&self) -> bool {
        self.syntax() == Syntax::Proto2
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = (&str, i32)> {
        self.data().values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn contains_number(&self, number: i32) -> bool {
        self.data().values.iter().any(|&(_, v)| v == number)
    }

    pub fn value_name(&self, number: i32) -> Option<&str> {
        self.data()
            .values
            .iter()
            .find(|&&(_, v)| v == number)
            .map(|(n, _)| n.as_str())
    }

    /// The default for fields of this enum type: the first declared value.
    pub fn default_number(&self) -> i32 {
        self.data().values.first().map(|&(_, v)| v).unwrap_or(0)
    }
}

impl PartialEq for EnumDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.pool.same_pool(&other.pool)
    }
}

impl Eq for EnumDescriptor {}

impl std::fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EnumDescriptor({})", self.full_name())
    }
}

#[derive(Clone)]
pub struct ExtensionDescriptor {
    pub(crate) pool: DescriptorPool,
    pub(crate) index: u32,
}

impl ExtensionDescriptor {
    pub(crate) fn data(&self) -> &ExtensionData {
        &self.pool.inner().extensions[self.index as usize]
    }

    fn field(&self) -> &FieldData {
        &self.data().field
    }

    pub fn full_name(&self) -> &str {
        &self.field().full_name
    }

    pub fn name(&self) -> &str {
        &self.field().name
    }

    pub fn number(&self) -> u32 {
        self.field().number
    }

    pub fn kind(&self) -> Kind {
        self.field().kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.field().cardinality
    }

    pub fn is_repeated(&self) -> bool {
        self.field().cardinality == Cardinality::Repeated
    }

    pub fn is_packed(&self) -> bool {
        self.field().packed
    }

    pub fn extendee(&self) -> MessageDescriptor {
        MessageDescriptor {
            pool: self.pool.clone(),
            index: self.data().extendee,
        }
    }

    pub fn message_type(&self) -> Option<MessageDescriptor> {
        match self.field().type_ref {
            TypeRef::Message(i) => Some(MessageDescriptor {
                pool: self.pool.clone(),
                index: i,
            }),
            _ => None,
        }
    }

    pub fn enum_type(&self) -> Option<EnumDescriptor> {
        match self.field().type_ref {
            TypeRef::Enum(i) => Some(EnumDescriptor {
                pool: self.pool.clone(),
                index: i,
            }),
            _ => None,
        }
    }

    pub fn syntax(&self) -> Syntax {
        self.pool.inner().files[self.data().file as usize].syntax
    }

    pub fn requires_utf8(&self) -> bool {
        self.kind() == Kind::String && self.syntax() == Syntax::Proto3
    }

    /// The value reads observe when the extension is absent.
    pub fn default_value(&self) -> Value {
        if self.is_repeated() {
            return Value::List(Vec::new());
        }
        if let Some(v) = &self.field().default_value {
            return v.clone();
        }
        match self.kind() {
            Kind::Message | Kind::Group => match self.message_type() {
                Some(m) => Value::Message(Box::new(DynamicMessage::new(m))),
                None => unreachable!("message extension without resolved type"),
            },
            Kind::Enum => match self.enum_type() {
                Some(e) => Value::Enum(e.default_number()),
                None => unreachable!("enum extension without resolved type"),
            },
            kind => Value::default_for_scalar(kind),
        }
    }
}

impl PartialEq for ExtensionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.pool.same_pool(&other.pool)
    }
}

impl Eq for ExtensionDescriptor {}

impl std::fmt::Debug for ExtensionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExtensionDescriptor({})", self.full_name())
    }
}
