//! Typed views of attribute payloads.
//!
//! Node payloads and inline slot values are raw byte blobs; the attribute's
//! declared type gives them meaning. [`Variant`] is the decoded form used by
//! the unpack path and by metadata writers.

use crate::error::{Result, VernierError};
use crate::types::AttributeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of an attribute's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    /// The invalid sentinel type.
    #[default]
    Inv,
    /// Opaque user-defined bytes.
    Usr,
    /// Signed 64-bit integer.
    Int,
    /// Unsigned 64-bit integer.
    Uint,
    /// UTF-8 text.
    String,
    /// Machine address.
    Address,
    /// 64-bit floating point.
    Double,
    /// Boolean flag.
    Bool,
    /// An attribute type tag itself.
    Type,
}

impl AttributeType {
    /// Parse a type from its configuration name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inv" => Some(Self::Inv),
            "usr" => Some(Self::Usr),
            "int" => Some(Self::Int),
            "uint" => Some(Self::Uint),
            "string" => Some(Self::String),
            "addr" | "address" => Some(Self::Address),
            "double" => Some(Self::Double),
            "bool" => Some(Self::Bool),
            "type" => Some(Self::Type),
            _ => None,
        }
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inv => "inv",
            Self::Usr => "usr",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::String => "string",
            Self::Address => "address",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::Type => "type",
        }
    }

    /// The exact payload width for fixed-width types, `None` for
    /// variable-length ones (`usr`, `string`) and the invalid sentinel.
    #[must_use]
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Int | Self::Uint | Self::Address | Self::Double => Some(8),
            Self::Bool | Self::Type => Some(1),
            Self::Usr | Self::String | Self::Inv => None,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Signed integer value.
    Int(i64),
    /// Unsigned integer value.
    Uint(u64),
    /// Floating-point value.
    Double(f64),
    /// Text value.
    Str(String),
    /// Address value.
    Address(u64),
    /// Boolean value.
    Bool(bool),
    /// Type-tag value.
    Type(AttributeType),
    /// Opaque bytes.
    Usr(Vec<u8>),
}

impl Variant {
    /// Decode a payload blob according to the attribute's declared type.
    ///
    /// Fixed-width types reject blobs of any other size with a
    /// type-mismatch error; `usr` and `string` accept any length. The
    /// `attribute` id is only used for error context.
    pub fn from_bytes(attribute: AttributeId, ty: AttributeType, bytes: &[u8]) -> Result<Self> {
        Ok(match ty {
            AttributeType::Int => Self::Int(i64::from_le_bytes(fixed(attribute, ty, bytes)?)),
            AttributeType::Uint => Self::Uint(u64::from_le_bytes(fixed(attribute, ty, bytes)?)),
            AttributeType::Double => {
                Self::Double(f64::from_le_bytes(fixed(attribute, ty, bytes)?))
            }
            AttributeType::Address => {
                Self::Address(u64::from_le_bytes(fixed(attribute, ty, bytes)?))
            }
            AttributeType::Bool => Self::Bool(fixed::<1>(attribute, ty, bytes)?[0] != 0),
            AttributeType::Type => Self::Type(type_from_tag(fixed::<1>(attribute, ty, bytes)?[0])),
            AttributeType::String => Self::Str(String::from_utf8_lossy(bytes).into_owned()),
            AttributeType::Usr | AttributeType::Inv => Self::Usr(bytes.to_vec()),
        })
    }

    /// Decode an inline 64-bit slot value according to the attribute's type.
    #[must_use]
    pub fn from_word(ty: AttributeType, word: u64) -> Self {
        match ty {
            AttributeType::Int => Self::Int(word as i64),
            AttributeType::Double => Self::Double(f64::from_bits(word)),
            AttributeType::Address => Self::Address(word),
            AttributeType::Bool => Self::Bool(word != 0),
            AttributeType::Type => Self::Type(type_from_tag(word as u8)),
            _ => Self::Uint(word),
        }
    }

    /// Encode this value as a payload blob.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Int(v) => v.to_le_bytes().to_vec(),
            Self::Uint(v) | Self::Address(v) => v.to_le_bytes().to_vec(),
            Self::Double(v) => v.to_le_bytes().to_vec(),
            Self::Str(s) => s.as_bytes().to_vec(),
            Self::Bool(v) => vec![u8::from(*v)],
            Self::Type(t) => vec![type_tag(*t)],
            Self::Usr(b) => b.clone(),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Address(v) => write!(f, "{v:#x}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Type(t) => write!(f, "{t}"),
            Self::Usr(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

fn fixed<const N: usize>(
    attribute: AttributeId,
    ty: AttributeType,
    bytes: &[u8],
) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| VernierError::TypeMismatch {
        attribute,
        expected: ty.as_str(),
        width: N,
        actual: bytes.len(),
    })
}

fn type_tag(ty: AttributeType) -> u8 {
    match ty {
        AttributeType::Inv => 0,
        AttributeType::Usr => 1,
        AttributeType::Int => 2,
        AttributeType::Uint => 3,
        AttributeType::String => 4,
        AttributeType::Address => 5,
        AttributeType::Double => 6,
        AttributeType::Bool => 7,
        AttributeType::Type => 8,
    }
}

fn type_from_tag(tag: u8) -> AttributeType {
    match tag {
        1 => AttributeType::Usr,
        2 => AttributeType::Int,
        3 => AttributeType::Uint,
        4 => AttributeType::String,
        5 => AttributeType::Address,
        6 => AttributeType::Double,
        7 => AttributeType::Bool,
        8 => AttributeType::Type,
        _ => AttributeType::Inv,
    }
}
