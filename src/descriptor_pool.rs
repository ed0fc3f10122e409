//! The descriptor pool: validation, interning and lookup of type definitions.
//!
//! A pool is built in two passes, the way descriptor files arrive: the first
//! pass walks every file and registers all type names (messages, enums,
//! extensions, including nested scopes), the second pass builds the field
//! data, resolving type references against the completed name table and
//! validating everything that can be validated structurally.
//!
//! The pool doubles as the codec-table registry: every interned message
//! carries a once-cell that caches its codec table after the first use.
//! Built pools are immutable and shared through `Arc`-backed handles.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::descriptor::{
    Cardinality, EnumDef, EnumDescriptor, ExtensionDef, ExtensionDescriptor, FieldDef,
    FileDef, FileDescriptor, Kind, MessageDef, MessageDescriptor, Syntax,
};
use crate::error::DescriptorError;
use crate::tables::MessageTypeInfo;
use crate::value::Value;
use crate::wire::MAX_FIELD_NUMBER;

pub(crate) struct FileData {
    pub(crate) name: String,
    pub(crate) package: String,
    pub(crate) syntax: Syntax,
}

pub(crate) struct MessageData {
    pub(crate) full_name: String,
    pub(crate) file: u32,
    pub(crate) fields: Vec<FieldData>,
    pub(crate) oneofs: Vec<OneofData>,
    pub(crate) extension_ranges: Vec<(u32, u32)>,
    pub(crate) type_info: OnceLock<MessageTypeInfo>,
}

pub(crate) struct OneofData {
    pub(crate) name: String,
    /// Field indices within the containing message, in declaration order.
    pub(crate) members: Vec<u32>,
}

pub(crate) struct FieldData {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) json_name: String,
    pub(crate) number: u32,
    pub(crate) kind: Kind,
    pub(crate) cardinality: Cardinality,
    pub(crate) packed: bool,
    pub(crate) oneof: Option<u32>,
    pub(crate) proto3_optional: bool,
    pub(crate) weak: bool,
    pub(crate) default_value: Option<Value>,
    pub(crate) type_ref: TypeRef,
    pub(crate) map: Option<MapData>,
}

#[derive(Clone, Copy)]
pub(crate) enum TypeRef {
    None,
    Message(u32),
    Enum(u32),
}

pub(crate) struct MapData {
    pub(crate) key_kind: Kind,
    pub(crate) value_kind: Kind,
    pub(crate) value_ref: TypeRef,
}

pub(crate) struct EnumData {
    pub(crate) full_name: String,
    pub(crate) file: u32,
    pub(crate) values: Vec<(String, i32)>,
}

pub(crate) struct ExtensionData {
    pub(crate) field: FieldData,
    pub(crate) extendee: u32,
    pub(crate) file: u32,
}

enum NameEntry {
    Message(u32),
    Enum(u32),
    Extension(u32),
}

#[derive(Default)]
pub(crate) struct PoolInner {
    pub(crate) files: Vec<FileData>,
    pub(crate) messages: Vec<MessageData>,
    pub(crate) enums: Vec<EnumData>,
    pub(crate) extensions: Vec<ExtensionData>,
    names: HashMap<String, NameEntry>,
    /// (extendee message index, field number) -> extension index.
    by_extendee: HashMap<(u32, u32), u32>,
}

/// A registry of built descriptors, shared by all handles derived from it.
#[derive(Clone)]
pub struct DescriptorPool {
    inner: Arc<PoolInner>,
}

impl Default for DescriptorPool {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorPool {
    /// An empty pool.
    pub fn new() -> Self {
        DescriptorPool {
            inner: Arc::new(PoolInner::default()),
        }
    }

    pub fn builder() -> DescriptorPoolBuilder {
        DescriptorPoolBuilder { files: Vec::new() }
    }

    /// Builds a pool from a set of files. Files may reference types from any
    /// other file in the set; resolution runs after all names are registered.
    pub fn build(files: Vec<FileDef>) -> Result<DescriptorPool, DescriptorError> {
        let mut builder = Self::builder();
        for file in files {
            builder = builder.add_file(file);
        }
        builder.build()
    }

    pub fn from_file(file: FileDef) -> Result<DescriptorPool, DescriptorError> {
        Self::build(vec![file])
    }

    pub(crate) fn inner(&self) -> &PoolInner {
        &self.inner
    }

    pub(crate) fn same_pool(&self, other: &DescriptorPool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn files(&self) -> impl ExactSizeIterator<Item = FileDescriptor> + '_ {
        (0..self.inner.files.len() as u32).map(move |i| FileDescriptor {
            pool: self.clone(),
            index: i,
        })
    }

    pub fn messages(&self) -> impl ExactSizeIterator<Item = MessageDescriptor> + '_ {
        (0..self.inner.messages.len() as u32).map(move |i| MessageDescriptor {
            pool: self.clone(),
            index: i,
        })
    }

    pub fn get_message_by_name(&self, name: &str) -> Option<MessageDescriptor> {
        match self.inner.names.get(normalize(name))? {
            NameEntry::Message(i) => Some(MessageDescriptor {
                pool: self.clone(),
                index: *i,
            }),
            _ => None,
        }
    }

    pub fn get_enum_by_name(&self, name: &str) -> Option<EnumDescriptor> {
        match self.inner.names.get(normalize(name))? {
            NameEntry::Enum(i) => Some(EnumDescriptor {
                pool: self.clone(),
                index: *i,
            }),
            _ => None,
        }
    }

    pub fn get_extension_by_name(&self, name: &str) -> Option<ExtensionDescriptor> {
        match self.inner.names.get(normalize(name))? {
            NameEntry::Extension(i) => Some(ExtensionDescriptor {
                pool: self.clone(),
                index: *i,
            }),
            _ => None,
        }
    }

    /// Looks up an extension of `containing_message` (full name) by field
    /// number. This is also the default extension resolver for decoding.
    pub fn find_extension_by_number(
        &self,
        containing_message: &str,
        number: u32,
    ) -> Option<ExtensionDescriptor> {
        let NameEntry::Message(msg) = self.inner.names.get(normalize(containing_message))?
        else {
            return None;
        };
        let index = *self.inner.by_extendee.get(&(*msg, number))?;
        Some(ExtensionDescriptor {
            pool: self.clone(),
            index,
        })
    }

    /// All registered extensions of one message, in registration order.
    pub fn extensions_for(
        &self,
        message: &MessageDescriptor,
    ) -> impl Iterator<Item = ExtensionDescriptor> + '_ {
        let target = message.index;
        (0..self.inner.extensions.len() as u32).filter_map(move |i| {
            (self.inner.extensions[i as usize].extendee == target).then(|| ExtensionDescriptor {
                pool: self.clone(),
                index: i,
            })
        })
    }
}

impl std::fmt::Debug for DescriptorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DescriptorPool({} messages, {} enums, {} extensions)",
            self.inner.messages.len(),
            self.inner.enums.len(),
            self.inner.extensions.len()
        )
    }
}

/// Accumulates files for a single [`DescriptorPool::build`] pass.
pub struct DescriptorPoolBuilder {
    files: Vec<FileDef>,
}

impl DescriptorPoolBuilder {
    pub fn add_file(mut self, file: FileDef) -> Self {
        self.files.push(file);
        self
    }

    pub fn build(self) -> Result<DescriptorPool, DescriptorError> {
        let mut builder = Builder::default();
        // First pass: register every name so references resolve regardless
        // of declaration order.
        for file in self.files {
            builder.register_file(file)?;
        }
        // Second pass: link field data against the complete name table.
        let inner = builder.link()?;
        Ok(DescriptorPool {
            inner: Arc::new(inner),
        })
    }
}

fn normalize(name: &str) -> &str {
    name.strip_prefix('.').unwrap_or(name)
}

fn join_name(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn to_json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// A message definition flattened out of its nesting, remembering its scope.
struct PendingMessage {
    full_name: String,
    file: u32,
    def: MessageDef,
}

struct PendingExtension {
    scope: String,
    file: u32,
    def: ExtensionDef,
}

#[derive(Default)]
struct Builder {
    files: Vec<FileData>,
    pending_messages: Vec<PendingMessage>,
    enums: Vec<EnumData>,
    pending_extensions: Vec<PendingExtension>,
    names: HashMap<String, NameEntry>,
}

impl Builder {
    fn claim_name(&mut self, name: &str, entry: NameEntry) -> Result<(), DescriptorError> {
        if self.names.insert(name.to_string(), entry).is_some() {
            return Err(DescriptorError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn register_file(&mut self, file: FileDef) -> Result<(), DescriptorError> {
        let file_index = self.files.len() as u32;
        let package = file.package.clone();
        self.files.push(FileData {
            name: file.name,
            package: file.package,
            syntax: file.syntax,
        });
        for message in file.messages {
            self.register_message(&package, file_index, message)?;
        }
        for e in file.enums {
            self.register_enum(&package, file_index, e)?;
        }
        for x in file.extensions {
            self.pending_extensions.push(PendingExtension {
                scope: package.clone(),
                file: file_index,
                def: x,
            });
        }
        Ok(())
    }

    fn register_message(
        &mut self,
        scope: &str,
        file: u32,
        mut def: MessageDef,
    ) -> Result<(), DescriptorError> {
        let full_name = join_name(scope, &def.name);
        let index = self.pending_messages.len() as u32;
        self.claim_name(&full_name, NameEntry::Message(index))?;

        let nested = std::mem::take(&mut def.nested);
        let enums = std::mem::take(&mut def.enums);
        let extensions = std::mem::take(&mut def.extensions);
        self.pending_messages.push(PendingMessage {
            full_name: full_name.clone(),
            file,
            def,
        });

        for m in nested {
            self.register_message(&full_name, file, m)?;
        }
        for e in enums {
            self.register_enum(&full_name, file, e)?;
        }
        for x in extensions {
            self.pending_extensions.push(PendingExtension {
                scope: full_name.clone(),
                file,
                def: x,
            });
        }
        Ok(())
    }

    fn register_enum(
        &mut self,
        scope: &str,
        file: u32,
        def: EnumDef,
    ) -> Result<(), DescriptorError> {
        let full_name = join_name(scope, &def.name);
        if def.values.is_empty() {
            return Err(DescriptorError::EmptyEnum(full_name));
        }
        let index = self.enums.len() as u32;
        self.claim_name(&full_name, NameEntry::Enum(index))?;
        self.enums.push(EnumData {
            full_name,
            file,
            values: def.values,
        });
        Ok(())
    }

    fn resolve(
        &self,
        field_full_name: &str,
        type_name: &str,
    ) -> Result<&NameEntry, DescriptorError> {
        if type_name.is_empty() {
            return Err(DescriptorError::MissingTypeName {
                field: field_full_name.to_string(),
            });
        }
        self.names
            .get(normalize(type_name))
            .ok_or_else(|| DescriptorError::UnresolvedTypeName {
                field: field_full_name.to_string(),
                type_name: type_name.to_string(),
            })
    }

    fn resolve_message(
        &self,
        field_full_name: &str,
        type_name: &str,
    ) -> Result<u32, DescriptorError> {
        match self.resolve(field_full_name, type_name)? {
            NameEntry::Message(i) => Ok(*i),
            _ => Err(DescriptorError::NotAMessage {
                field: field_full_name.to_string(),
                type_name: type_name.to_string(),
            }),
        }
    }

    fn resolve_type_ref(
        &self,
        field_full_name: &str,
        kind: Kind,
        type_name: &str,
    ) -> Result<TypeRef, DescriptorError> {
        match kind {
            Kind::Message | Kind::Group => self
                .resolve_message(field_full_name, type_name)
                .map(TypeRef::Message),
            Kind::Enum => match self.resolve(field_full_name, type_name)? {
                NameEntry::Enum(i) => Ok(TypeRef::Enum(*i)),
                _ => Err(DescriptorError::NotAnEnum {
                    field: field_full_name.to_string(),
                    type_name: type_name.to_string(),
                }),
            },
            _ => Ok(TypeRef::None),
        }
    }

    /// Everything validated about one field, shared by message fields and
    /// extensions.
    fn link_field(
        &self,
        scope: &str,
        syntax: Syntax,
        def: &FieldDef,
    ) -> Result<FieldData, DescriptorError> {
        let full_name = join_name(scope, &def.name);

        if def.number < 1 || def.number > MAX_FIELD_NUMBER {
            return Err(DescriptorError::FieldNumberOutOfRange {
                message: scope.to_string(),
                number: def.number,
            });
        }
        if def.cardinality == Cardinality::Required && syntax == Syntax::Proto3 {
            return Err(DescriptorError::RequiredNotAllowed { field: full_name });
        }
        if def.kind == Kind::Group && syntax == Syntax::Proto3 {
            return Err(DescriptorError::GroupNotAllowed { field: full_name });
        }

        let map = match &def.map {
            Some(m) => {
                if !matches!(
                    m.key_kind,
                    Kind::Bool
                        | Kind::Int32
                        | Kind::Int64
                        | Kind::Uint32
                        | Kind::Uint64
                        | Kind::Sint32
                        | Kind::Sint64
                        | Kind::Fixed32
                        | Kind::Fixed64
                        | Kind::Sfixed32
                        | Kind::Sfixed64
                        | Kind::String
                ) {
                    return Err(DescriptorError::InvalidMapKey { field: full_name });
                }
                if m.value_kind == Kind::Group {
                    return Err(DescriptorError::InvalidMapValue { field: full_name });
                }
                let value_ref =
                    self.resolve_type_ref(&full_name, m.value_kind, &m.value_type_name)?;
                Some(MapData {
                    key_kind: m.key_kind,
                    value_kind: m.value_kind,
                    value_ref,
                })
            }
            None => None,
        };

        let packable =
            def.cardinality == Cardinality::Repeated && def.kind.is_packable() && map.is_none();
        let packed = match def.packed {
            Some(true) if !packable => {
                return Err(DescriptorError::NotPackable { field: full_name });
            }
            Some(p) => p && packable,
            None => packable && syntax == Syntax::Proto3,
        };

        let type_ref = if map.is_some() {
            TypeRef::None
        } else {
            self.resolve_type_ref(&full_name, def.kind, &def.type_name)?
        };

        if let Some(v) = &def.default_value {
            let ok = syntax == Syntax::Proto2
                && def.cardinality != Cardinality::Repeated
                && default_matches(def.kind, v)
                && match (v, type_ref) {
                    (Value::Enum(n), TypeRef::Enum(e)) => {
                        self.enums[e as usize].values.iter().any(|&(_, v)| v == *n)
                    }
                    (Value::Enum(_), _) => false,
                    _ => true,
                };
            if !ok {
                return Err(DescriptorError::InvalidDefault { field: full_name });
            }
        }

        Ok(FieldData {
            json_name: def
                .json_name
                .clone()
                .unwrap_or_else(|| to_json_name(&def.name)),
            name: def.name.clone(),
            full_name,
            number: def.number,
            kind: def.kind,
            cardinality: def.cardinality,
            packed,
            oneof: None,
            proto3_optional: def.proto3_optional,
            weak: def.weak,
            default_value: def.default_value.clone(),
            type_ref,
            map,
        })
    }

    fn link(self) -> Result<PoolInner, DescriptorError> {
        let mut messages = Vec::with_capacity(self.pending_messages.len());
        for pending in &self.pending_messages {
            let syntax = self.files[pending.file as usize].syntax;
            let full_name = &pending.full_name;

            let mut oneofs: Vec<OneofData> = pending
                .def
                .oneofs
                .iter()
                .map(|name| OneofData {
                    name: name.clone(),
                    members: Vec::new(),
                })
                .collect();

            let mut fields = Vec::with_capacity(pending.def.fields.len());
            let mut seen_numbers = HashMap::new();
            for def in &pending.def.fields {
                let mut data = self.link_field(full_name, syntax, def)?;
                if seen_numbers.insert(def.number, ()).is_some() {
                    return Err(DescriptorError::DuplicateFieldNumber {
                        message: full_name.clone(),
                        number: def.number,
                    });
                }
                if let Some(idx) = def.oneof_index {
                    if idx >= oneofs.len() {
                        return Err(DescriptorError::InvalidOneofIndex {
                            field: data.full_name,
                            index: idx,
                        });
                    }
                    if def.cardinality != Cardinality::Optional || data.map.is_some() {
                        return Err(DescriptorError::OneofMemberNotSingular {
                            field: data.full_name,
                        });
                    }
                    data.oneof = Some(idx as u32);
                    oneofs[idx].members.push(fields.len() as u32);
                }
                fields.push(data);
            }

            messages.push(MessageData {
                full_name: full_name.clone(),
                file: pending.file,
                fields,
                oneofs,
                extension_ranges: pending.def.extension_ranges.clone(),
                type_info: OnceLock::new(),
            });
        }

        let mut extensions: Vec<ExtensionData> = Vec::with_capacity(self.pending_extensions.len());
        let mut by_extendee = HashMap::new();
        for pending in &self.pending_extensions {
            let syntax = self.files[pending.file as usize].syntax;
            let def = &pending.def.field;
            let field = self.link_field(&pending.scope, syntax, def)?;
            if field.map.is_some() {
                return Err(DescriptorError::MapExtension {
                    field: field.full_name,
                });
            }
            if let Some(index) = def.oneof_index {
                return Err(DescriptorError::InvalidOneofIndex {
                    field: field.full_name,
                    index,
                });
            }
            if def.cardinality == Cardinality::Required {
                return Err(DescriptorError::RequiredNotAllowed {
                    field: field.full_name,
                });
            }

            let extendee = self.resolve_message(&field.full_name, &pending.def.extendee)?;
            let target = &self.pending_messages[extendee as usize];
            let in_range = target
                .def
                .extension_ranges
                .iter()
                .any(|&(lo, hi)| (lo..=hi).contains(&field.number));
            if !in_range {
                return Err(DescriptorError::ExtensionOutOfRange {
                    extension: field.full_name,
                    extendee: target.full_name.clone(),
                    number: field.number,
                });
            }

            let index = extensions.len() as u32;
            if by_extendee.insert((extendee, field.number), index).is_some() {
                return Err(DescriptorError::DuplicateFieldNumber {
                    message: target.full_name.clone(),
                    number: field.number,
                });
            }
            extensions.push(ExtensionData {
                field,
                extendee,
                file: pending.file,
            });
        }

        let mut names = self.names;
        for (index, ext) in extensions.iter().enumerate() {
            if names
                .insert(
                    ext.field.full_name.clone(),
                    NameEntry::Extension(index as u32),
                )
                .is_some()
            {
                return Err(DescriptorError::DuplicateName(ext.field.full_name.clone()));
            }
        }

        Ok(PoolInner {
            files: self.files,
            messages,
            enums: self.enums,
            extensions,
            names,
            by_extendee,
        })
    }
}

fn default_matches(kind: Kind, v: &Value) -> bool {
    matches!(
        (kind, v),
        (Kind::Double, Value::F64(_))
            | (Kind::Float, Value::F32(_))
            | (Kind::Int64 | Kind::Sint64 | Kind::Sfixed64, Value::I64(_))
            | (Kind::Uint64 | Kind::Fixed64, Value::U64(_))
            | (Kind::Int32 | Kind::Sint32 | Kind::Sfixed32, Value::I32(_))
            | (Kind::Uint32 | Kind::Fixed32, Value::U32(_))
            | (Kind::Bool, Value::Bool(_))
            | (Kind::String, Value::String(_))
            | (Kind::Bytes, Value::Bytes(_))
            | (Kind::Enum, Value::Enum(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::ProtoString;

    fn sample_file() -> FileDef {
        FileDef::new("test.proto", "test", Syntax::Proto3)
            .message(
                MessageDef::new("Outer")
                    .field(FieldDef::scalar("id", 1, Cardinality::Optional, Kind::Int32))
                    .field(FieldDef::scalar(
                        "xs",
                        2,
                        Cardinality::Repeated,
                        Kind::Int32,
                    ))
                    .field(FieldDef::message(
                        "inner",
                        3,
                        Cardinality::Optional,
                        ".test.Outer.Inner",
                    ))
                    .field(FieldDef::enumeration(
                        "color",
                        4,
                        Cardinality::Optional,
                        "test.Color",
                    ))
                    .field(FieldDef::map("labels", 5, Kind::String, Kind::Int64, ""))
                    .oneof("choice")
                    .field(
                        FieldDef::scalar("a", 6, Cardinality::Optional, Kind::Uint32).in_oneof(0),
                    )
                    .field(
                        FieldDef::scalar("b", 7, Cardinality::Optional, Kind::String).in_oneof(0),
                    )
                    .nested(MessageDef::new("Inner").field(FieldDef::scalar(
                        "x",
                        1,
                        Cardinality::Optional,
                        Kind::Sint64,
                    ))),
            )
            .enumeration(
                EnumDef::new("Color")
                    .value("COLOR_UNSPECIFIED", 0)
                    .value("COLOR_RED", 1),
            )
    }

    #[test]
    fn test_build_and_lookup() {
        let pool = DescriptorPool::from_file(sample_file()).unwrap();
        let outer = pool.get_message_by_name("test.Outer").unwrap();
        assert_eq!(outer.full_name(), "test.Outer");
        assert_eq!(outer.name(), "Outer");
        assert_eq!(outer.syntax(), Syntax::Proto3);
        assert_eq!(outer.fields().len(), 7);

        // Leading dots are tolerated everywhere names are accepted.
        assert_eq!(
            pool.get_message_by_name(".test.Outer.Inner")
                .unwrap()
                .full_name(),
            "test.Outer.Inner"
        );

        let inner_field = outer.field_by_name("inner").unwrap();
        assert_eq!(inner_field.kind(), Kind::Message);
        assert_eq!(
            inner_field.message_type().unwrap().full_name(),
            "test.Outer.Inner"
        );

        let color = outer.field_by_name("color").unwrap();
        assert_eq!(color.enum_type().unwrap().full_name(), "test.Color");
        assert!(!color.enum_type().unwrap().is_closed());

        let labels = outer.field_by_name("labels").unwrap();
        assert!(labels.is_map());
        assert_eq!(labels.map_key_kind(), Some(Kind::String));
        assert_eq!(labels.map_value_kind(), Some(Kind::Int64));
        assert!(labels.is_repeated());
        assert!(!labels.is_packed());
    }

    #[test]
    fn test_packed_defaults_by_syntax() {
        let pool = DescriptorPool::from_file(sample_file()).unwrap();
        let outer = pool.get_message_by_name("test.Outer").unwrap();
        // proto3 packs packable repeated fields by default.
        assert!(outer.field_by_name("xs").unwrap().is_packed());

        let proto2 = FileDef::new("p2.proto", "p2", Syntax::Proto2).message(
            MessageDef::new("M")
                .field(FieldDef::scalar("xs", 1, Cardinality::Repeated, Kind::Int32))
                .field(FieldDef::scalar("ys", 2, Cardinality::Repeated, Kind::Int32).packed(true)),
        );
        let pool = DescriptorPool::from_file(proto2).unwrap();
        let m = pool.get_message_by_name("p2.M").unwrap();
        assert!(!m.field_by_name("xs").unwrap().is_packed());
        assert!(m.field_by_name("ys").unwrap().is_packed());
    }

    #[test]
    fn test_oneof_members() {
        let pool = DescriptorPool::from_file(sample_file()).unwrap();
        let outer = pool.get_message_by_name("test.Outer").unwrap();
        let choice = outer.oneof_by_name("choice").unwrap();
        let members: Vec<String> = choice.fields().map(|f| f.name().to_string()).collect();
        assert_eq!(members, ["a", "b"]);
        assert_eq!(
            outer.field_by_name("a").unwrap().containing_oneof().unwrap(),
            choice
        );
    }

    #[test]
    fn test_presence_rules() {
        let pool = DescriptorPool::from_file(sample_file()).unwrap();
        let outer = pool.get_message_by_name("test.Outer").unwrap();
        // proto3 scalar: implicit presence.
        assert!(!outer.field_by_name("id").unwrap().has_presence());
        // message, oneof member: explicit.
        assert!(outer.field_by_name("inner").unwrap().has_presence());
        assert!(outer.field_by_name("a").unwrap().has_presence());
        assert!(!outer.field_by_name("xs").unwrap().has_presence());
    }

    #[test]
    fn test_json_names() {
        let file = FileDef::new("j.proto", "j", Syntax::Proto3).message(
            MessageDef::new("M")
                .field(FieldDef::scalar(
                    "foo_bar_baz",
                    1,
                    Cardinality::Optional,
                    Kind::Int32,
                ))
                .field(
                    FieldDef::scalar("odd_one", 2, Cardinality::Optional, Kind::Int32)
                        .json_name("OddOne"),
                ),
        );
        let pool = DescriptorPool::from_file(file).unwrap();
        let m = pool.get_message_by_name("j.M").unwrap();
        assert_eq!(
            m.field_by_name("foo_bar_baz").unwrap().json_name(),
            "fooBarBaz"
        );
        // A declared name wins over the derived one.
        assert_eq!(m.field_by_name("odd_one").unwrap().json_name(), "OddOne");
    }

    #[test]
    fn test_duplicate_field_number_rejected() {
        let file = FileDef::new("d.proto", "d", Syntax::Proto3).message(
            MessageDef::new("M")
                .field(FieldDef::scalar("a", 1, Cardinality::Optional, Kind::Int32))
                .field(FieldDef::scalar("b", 1, Cardinality::Optional, Kind::Int32)),
        );
        assert_eq!(
            DescriptorPool::from_file(file).unwrap_err(),
            DescriptorError::DuplicateFieldNumber {
                message: "d.M".to_string(),
                number: 1
            }
        );
    }

    #[test]
    fn test_proto3_restrictions() {
        let required = FileDef::new("r.proto", "r", Syntax::Proto3).message(
            MessageDef::new("M").field(FieldDef::scalar(
                "a",
                1,
                Cardinality::Required,
                Kind::Int32,
            )),
        );
        assert!(matches!(
            DescriptorPool::from_file(required).unwrap_err(),
            DescriptorError::RequiredNotAllowed { .. }
        ));

        let group = FileDef::new("g.proto", "g", Syntax::Proto3).message(
            MessageDef::new("M")
                .field(FieldDef::group("grp", 1, Cardinality::Optional, "g.M.Grp"))
                .nested(MessageDef::new("Grp")),
        );
        assert!(matches!(
            DescriptorPool::from_file(group).unwrap_err(),
            DescriptorError::GroupNotAllowed { .. }
        ));
    }

    #[test]
    fn test_unresolved_and_mismatched_types() {
        let unresolved = FileDef::new("u.proto", "u", Syntax::Proto3).message(
            MessageDef::new("M").field(FieldDef::message(
                "x",
                1,
                Cardinality::Optional,
                "u.Missing",
            )),
        );
        assert!(matches!(
            DescriptorPool::from_file(unresolved).unwrap_err(),
            DescriptorError::UnresolvedTypeName { .. }
        ));

        let mismatched = FileDef::new("m.proto", "m", Syntax::Proto3)
            .message(MessageDef::new("M").field(FieldDef::message(
                "x",
                1,
                Cardinality::Optional,
                "m.E",
            )))
            .enumeration(EnumDef::new("E").value("E_ZERO", 0));
        assert!(matches!(
            DescriptorPool::from_file(mismatched).unwrap_err(),
            DescriptorError::NotAMessage { .. }
        ));
    }

    #[test]
    fn test_packed_on_string_rejected() {
        let file = FileDef::new("s.proto", "s", Syntax::Proto3).message(
            MessageDef::new("M")
                .field(FieldDef::scalar("xs", 1, Cardinality::Repeated, Kind::String).packed(true)),
        );
        assert!(matches!(
            DescriptorPool::from_file(file).unwrap_err(),
            DescriptorError::NotPackable { .. }
        ));
    }

    #[test]
    fn test_extension_validation() {
        let base = MessageDef::new("Base")
            .field(FieldDef::scalar("id", 1, Cardinality::Optional, Kind::Int32))
            .extension_range(100, 199);
        let good = FileDef::new("e.proto", "e", Syntax::Proto2)
            .message(base.clone())
            .extension(ExtensionDef::new(
                "e.Base",
                FieldDef::scalar("ext_a", 100, Cardinality::Optional, Kind::Uint64),
            ));
        let pool = DescriptorPool::from_file(good).unwrap();
        let base_desc = pool.get_message_by_name("e.Base").unwrap();
        assert!(base_desc.in_extension_range(150));
        assert!(!base_desc.in_extension_range(1));

        let ext = pool.find_extension_by_number("e.Base", 100).unwrap();
        assert_eq!(ext.full_name(), "e.ext_a");
        assert_eq!(ext.extendee(), base_desc);
        assert!(pool.find_extension_by_number("e.Base", 101).is_none());
        assert_eq!(pool.get_extension_by_name("e.ext_a").unwrap().number(), 100);

        let out_of_range = FileDef::new("e2.proto", "e2", Syntax::Proto2)
            .message(base.clone())
            .extension(ExtensionDef::new(
                "e2.Base",
                FieldDef::scalar("ext_b", 200, Cardinality::Optional, Kind::Uint64),
            ));
        assert!(matches!(
            DescriptorPool::from_file(out_of_range).unwrap_err(),
            DescriptorError::ExtensionOutOfRange { number: 200, .. }
        ));
    }

    #[test]
    fn test_proto2_defaults() {
        let file = FileDef::new("def.proto", "def", Syntax::Proto2)
            .message(
                MessageDef::new("M")
                    .field(
                        FieldDef::scalar("n", 1, Cardinality::Optional, Kind::Int32)
                            .default(Value::I32(42)),
                    )
                    .field(
                        FieldDef::scalar("s", 2, Cardinality::Optional, Kind::String)
                            .default(Value::String(ProtoString::from("hi"))),
                    )
                    .field(
                        FieldDef::enumeration("e", 3, Cardinality::Optional, "def.E")
                            .default(Value::Enum(2)),
                    ),
            )
            .enumeration(EnumDef::new("E").value("E_ONE", 1).value("E_TWO", 2));
        let pool = DescriptorPool::from_file(file).unwrap();
        let m = pool.get_message_by_name("def.M").unwrap();
        assert_eq!(m.field_by_name("n").unwrap().default_value(), Value::I32(42));
        assert_eq!(
            m.field_by_name("s").unwrap().default_value(),
            Value::String(ProtoString::from("hi"))
        );
        assert_eq!(m.field_by_name("e").unwrap().default_value(), Value::Enum(2));

        // Proto2 enum fields default to the first declared value.
        let e = pool.get_enum_by_name("def.E").unwrap();
        assert!(e.is_closed());
        assert_eq!(e.default_number(), 1);
        assert_eq!(e.value_name(2), Some("E_TWO"));
        assert!(!e.contains_number(9));

        // A default naming an undeclared enum number is rejected.
        let bad = FileDef::new("bad.proto", "bad", Syntax::Proto2)
            .message(MessageDef::new("M").field(
                FieldDef::enumeration("e", 1, Cardinality::Optional, "bad.E")
                    .default(Value::Enum(9)),
            ))
            .enumeration(EnumDef::new("E").value("E_ONE", 1));
        assert!(matches!(
            DescriptorPool::from_file(bad).unwrap_err(),
            DescriptorError::InvalidDefault { .. }
        ));
    }
}
