//! Error types for wire decoding, encoding and descriptor construction.
//!
//! Data-dependent failures are returned as values from these enums. Misuse of
//! the API (mismatched descriptors, illegal field shapes reaching the coder
//! selector) is a programmer error and panics instead; see the panics
//! documented on the individual entry points.

use thiserror::Error;

/// Failure while parsing wire-format bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended in the middle of a record.
    #[error("unexpected end of input")]
    Truncated,

    /// A varint ran longer than 10 bytes or did not fit in 64 bits.
    #[error("varint overflows 64 bits")]
    VarintOverflow,

    /// Tag carried field number 0 or a number above `2^29 - 1`.
    #[error("invalid field number {0}")]
    InvalidFieldNumber(u64),

    /// Tag carried wire type 6 or 7.
    #[error("invalid wire type {0}")]
    InvalidWireType(u8),

    /// An end-group tag appeared without a matching open group.
    #[error("unexpected end-group tag for field {0}")]
    UnexpectedEndGroup(u32),

    /// A group was opened but input ended before its end tag.
    #[error("missing end-group marker for field {0}")]
    MissingEndGroup(u32),

    /// A string field held bytes that are not valid UTF-8. The bytes are
    /// stored anyway; callers decide whether this is fatal.
    #[error("field {0} contains invalid UTF-8")]
    InvalidUtf8(String),

    /// Message/group nesting exceeded the configured recursion limit.
    #[error("message nesting exceeds the recursion limit")]
    RecursionLimitExceeded,

    /// A required field was absent and `allow_partial` was not set.
    #[error("required field {0} not set")]
    MissingRequiredField(String),
}

/// Failure while serializing a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A proto3 string field held bytes that are not valid UTF-8. The bytes
    /// are written anyway; callers decide whether this is fatal.
    #[error("field {0} contains invalid UTF-8")]
    InvalidUtf8(String),

    /// A required field was absent and `allow_partial` was not set.
    #[error("required field {0} not set")]
    MissingRequiredField(String),
}

/// Failure while adding definitions to a descriptor pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("duplicate name {0}")]
    DuplicateName(String),

    #[error("{message}: field number {number} out of range")]
    FieldNumberOutOfRange { message: String, number: u32 },

    #[error("{message}: duplicate field number {number}")]
    DuplicateFieldNumber { message: String, number: u32 },

    #[error("{field}: cannot resolve type name {type_name}")]
    UnresolvedTypeName { field: String, type_name: String },

    #[error("{field}: {type_name} is not a message type")]
    NotAMessage { field: String, type_name: String },

    #[error("{field}: {type_name} is not an enum type")]
    NotAnEnum { field: String, type_name: String },

    #[error("{field}: field kind requires a type name")]
    MissingTypeName { field: String },

    #[error("{field}: invalid map key kind")]
    InvalidMapKey { field: String },

    #[error("{field}: invalid map value kind")]
    InvalidMapValue { field: String },

    #[error("{field}: packed is only valid on repeated scalar fields")]
    NotPackable { field: String },

    #[error("{field}: required fields are proto2 only")]
    RequiredNotAllowed { field: String },

    #[error("{field}: groups are proto2 only")]
    GroupNotAllowed { field: String },

    #[error("{field}: oneof index {index} out of range")]
    InvalidOneofIndex { field: String, index: usize },

    #[error("{field}: oneof members must be singular")]
    OneofMemberNotSingular { field: String },

    #[error("{field}: default value not allowed or of the wrong type")]
    InvalidDefault { field: String },

    #[error("enum {0} declares no values")]
    EmptyEnum(String),

    #[error("{field}: extensions cannot be map fields")]
    MapExtension { field: String },

    #[error("extension {extension}: number {number} outside the extension ranges of {extendee}")]
    ExtensionOutOfRange {
        extension: String,
        extendee: String,
        number: u32,
    },
}
