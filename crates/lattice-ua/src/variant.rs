//! The OPC UA Variant: a discriminated union over the built-in types.
//!
//! A [`Variant`] is either a single [`Scalar`] or a one-dimensional array of
//! scalars with an optional dimensions hint. It carries no timestamp; that is
//! the job of [`crate::DataValue`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ByteString, ExpandedNodeId, LocalizedText, NodeId, QualifiedName, StatusCode,
};

// =============================================================================
// VariantType
// =============================================================================

/// Built-in type codes (OPC UA Part 6). The code doubles as the `type` byte
/// of the JSON encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum VariantType {
    /// No value.
    #[default]
    Null = 0,
    /// Boolean.
    Boolean = 1,
    /// Signed 8-bit integer.
    SByte = 2,
    /// Unsigned 8-bit integer.
    Byte = 3,
    /// Signed 16-bit integer.
    Int16 = 4,
    /// Unsigned 16-bit integer.
    UInt16 = 5,
    /// Signed 32-bit integer.
    Int32 = 6,
    /// Unsigned 32-bit integer.
    UInt32 = 7,
    /// Signed 64-bit integer.
    Int64 = 8,
    /// Unsigned 64-bit integer.
    UInt64 = 9,
    /// 32-bit IEEE 754 float.
    Float = 10,
    /// 64-bit IEEE 754 double.
    Double = 11,
    /// UTF-8 string.
    String = 12,
    /// Date and time.
    DateTime = 13,
    /// GUID.
    Guid = 14,
    /// Opaque bytes.
    ByteString = 15,
    /// XML element, carried as text.
    XmlElement = 16,
    /// Node id.
    NodeId = 17,
    /// Expanded node id.
    ExpandedNodeId = 18,
    /// Status code.
    StatusCode = 19,
    /// Qualified name.
    QualifiedName = 20,
    /// Localized text.
    LocalizedText = 21,
    /// Extension object.
    ExtensionObject = 22,
    /// Data value.
    DataValue = 23,
    /// Variant. Also the "any type" marker for variables typed BaseDataType.
    Variant = 24,
    /// Diagnostic info.
    DiagnosticInfo = 25,
}

impl VariantType {
    /// Converts a JSON `type` byte back to a variant type.
    pub fn from_code(code: u8) -> Option<Self> {
        use VariantType::*;
        Some(match code {
            0 => Null,
            1 => Boolean,
            2 => SByte,
            3 => Byte,
            4 => Int16,
            5 => UInt16,
            6 => Int32,
            7 => UInt32,
            8 => Int64,
            9 => UInt64,
            10 => Float,
            11 => Double,
            12 => String,
            13 => DateTime,
            14 => Guid,
            15 => ByteString,
            16 => XmlElement,
            17 => NodeId,
            18 => ExpandedNodeId,
            19 => StatusCode,
            20 => QualifiedName,
            21 => LocalizedText,
            22 => ExtensionObject,
            23 => DataValue,
            24 => Variant,
            25 => DiagnosticInfo,
            _ => return None,
        })
    }

    /// The JSON `type` byte.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns `true` for the types a non-None deadband may be applied to.
    #[inline]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            VariantType::SByte
                | VariantType::Byte
                | VariantType::Int16
                | VariantType::UInt16
                | VariantType::Int32
                | VariantType::UInt32
                | VariantType::Int64
                | VariantType::UInt64
                | VariantType::Float
                | VariantType::Double
        )
    }

    /// Resolves a standard-namespace data type node id to its variant type.
    ///
    /// Non-builtin ids (including BaseDataType and Structure) map to
    /// [`VariantType::Variant`] and [`VariantType::ExtensionObject`]
    /// respectively; callers walk the subtype chain first.
    pub fn from_data_type_id(id: &NodeId) -> Option<Self> {
        if id.namespace_index != 0 {
            return None;
        }
        match id.as_numeric()? {
            1 => Some(VariantType::Boolean),
            2 => Some(VariantType::SByte),
            3 => Some(VariantType::Byte),
            4 => Some(VariantType::Int16),
            5 => Some(VariantType::UInt16),
            6 => Some(VariantType::Int32),
            7 => Some(VariantType::UInt32),
            8 => Some(VariantType::Int64),
            9 => Some(VariantType::UInt64),
            10 => Some(VariantType::Float),
            11 => Some(VariantType::Double),
            12 => Some(VariantType::String),
            13 => Some(VariantType::DateTime),
            14 => Some(VariantType::Guid),
            15 => Some(VariantType::ByteString),
            16 => Some(VariantType::XmlElement),
            17 => Some(VariantType::NodeId),
            18 => Some(VariantType::ExpandedNodeId),
            19 => Some(VariantType::StatusCode),
            20 => Some(VariantType::QualifiedName),
            21 => Some(VariantType::LocalizedText),
            22 => Some(VariantType::ExtensionObject),
            23 => Some(VariantType::DataValue),
            24 => Some(VariantType::Variant),
            25 => Some(VariantType::DiagnosticInfo),
            _ => None,
        }
    }
}

// =============================================================================
// Supporting structures
// =============================================================================

/// An encoded structure the server passes through without interpreting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtensionObject {
    /// Id of the structure's encoding node.
    #[serde(rename = "typeId")]
    pub type_id: ExpandedNodeId,
    /// The structure body as plain JSON.
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Diagnostic information attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiagnosticInfo {
    /// Index into the string table of the response header.
    #[serde(default, rename = "symbolicId")]
    pub symbolic_id: i32,
    /// Vendor-specific diagnostic text.
    #[serde(default, skip_serializing_if = "String::is_empty", rename = "additionalInfo")]
    pub additional_info: String,
}

// =============================================================================
// Scalar
// =============================================================================

/// A single value of one of the built-in types.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    /// No value.
    #[default]
    Null,
    /// Boolean.
    Boolean(bool),
    /// Signed 8-bit integer.
    SByte(i8),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Date and time.
    DateTime(DateTime<Utc>),
    /// GUID.
    Guid(Uuid),
    /// Opaque bytes.
    ByteString(ByteString),
    /// XML element text.
    XmlElement(String),
    /// Node id.
    NodeId(Box<NodeId>),
    /// Expanded node id.
    ExpandedNodeId(Box<ExpandedNodeId>),
    /// Status code.
    StatusCode(StatusCode),
    /// Qualified name.
    QualifiedName(QualifiedName),
    /// Localized text.
    LocalizedText(LocalizedText),
    /// Extension object.
    ExtensionObject(Box<ExtensionObject>),
    /// Nested data value.
    DataValue(Box<crate::DataValue>),
    /// Nested variant.
    Variant(Box<Variant>),
    /// Diagnostic info.
    DiagnosticInfo(Box<DiagnosticInfo>),
}

impl Scalar {
    /// The built-in type of this scalar.
    pub fn variant_type(&self) -> VariantType {
        match self {
            Scalar::Null => VariantType::Null,
            Scalar::Boolean(_) => VariantType::Boolean,
            Scalar::SByte(_) => VariantType::SByte,
            Scalar::Byte(_) => VariantType::Byte,
            Scalar::Int16(_) => VariantType::Int16,
            Scalar::UInt16(_) => VariantType::UInt16,
            Scalar::Int32(_) => VariantType::Int32,
            Scalar::UInt32(_) => VariantType::UInt32,
            Scalar::Int64(_) => VariantType::Int64,
            Scalar::UInt64(_) => VariantType::UInt64,
            Scalar::Float(_) => VariantType::Float,
            Scalar::Double(_) => VariantType::Double,
            Scalar::String(_) => VariantType::String,
            Scalar::DateTime(_) => VariantType::DateTime,
            Scalar::Guid(_) => VariantType::Guid,
            Scalar::ByteString(_) => VariantType::ByteString,
            Scalar::XmlElement(_) => VariantType::XmlElement,
            Scalar::NodeId(_) => VariantType::NodeId,
            Scalar::ExpandedNodeId(_) => VariantType::ExpandedNodeId,
            Scalar::StatusCode(_) => VariantType::StatusCode,
            Scalar::QualifiedName(_) => VariantType::QualifiedName,
            Scalar::LocalizedText(_) => VariantType::LocalizedText,
            Scalar::ExtensionObject(_) => VariantType::ExtensionObject,
            Scalar::DataValue(_) => VariantType::DataValue,
            Scalar::Variant(_) => VariantType::Variant,
            Scalar::DiagnosticInfo(_) => VariantType::DiagnosticInfo,
        }
    }

    /// Numeric value as f64, for deadband and scaling arithmetic.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::SByte(v) => Some(*v as f64),
            Scalar::Byte(v) => Some(*v as f64),
            Scalar::Int16(v) => Some(*v as f64),
            Scalar::UInt16(v) => Some(*v as f64),
            Scalar::Int32(v) => Some(*v as f64),
            Scalar::UInt32(v) => Some(*v as f64),
            Scalar::Int64(v) => Some(*v as f64),
            Scalar::UInt64(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v as f64),
            Scalar::Double(v) => Some(*v),
            Scalar::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Boolean value, if this is a boolean scalar.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// String slice, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Boolean(v) => write!(f, "{}", v),
            Scalar::SByte(v) => write!(f, "{}", v),
            Scalar::Byte(v) => write!(f, "{}", v),
            Scalar::Int16(v) => write!(f, "{}", v),
            Scalar::UInt16(v) => write!(f, "{}", v),
            Scalar::Int32(v) => write!(f, "{}", v),
            Scalar::UInt32(v) => write!(f, "{}", v),
            Scalar::Int64(v) => write!(f, "{}", v),
            Scalar::UInt64(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Double(v) => write!(f, "{}", v),
            Scalar::String(v) => write!(f, "{}", v),
            Scalar::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Scalar::Guid(v) => write!(f, "{}", v),
            Scalar::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Scalar::XmlElement(v) => write!(f, "{}", v),
            Scalar::NodeId(v) => write!(f, "{}", v),
            Scalar::ExpandedNodeId(v) => write!(f, "{}", v),
            Scalar::StatusCode(v) => write!(f, "{}", v),
            Scalar::QualifiedName(v) => write!(f, "{}", v),
            Scalar::LocalizedText(v) => write!(f, "{}", v),
            Scalar::ExtensionObject(_) => write!(f, "<extension object>"),
            Scalar::DataValue(_) => write!(f, "<data value>"),
            Scalar::Variant(v) => write!(f, "{}", v),
            Scalar::DiagnosticInfo(_) => write!(f, "<diagnostic info>"),
        }
    }
}

// =============================================================================
// Variant
// =============================================================================

/// A scalar or a one-dimensional array of scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// A single value.
    Scalar(Scalar),
    /// An array of values of one element type.
    Array(ArrayValue),
}

/// The array payload of a [`Variant`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    /// Element type of the array.
    pub element_type: VariantType,
    /// The elements.
    pub elements: Vec<Scalar>,
    /// Optional dimensions hint carried through the JSON encoding.
    pub dimensions: Option<Vec<u32>>,
}

impl Variant {
    /// The null variant.
    pub const fn null() -> Self {
        Variant::Scalar(Scalar::Null)
    }

    /// Creates an array variant of a single element type.
    pub fn array(element_type: VariantType, elements: Vec<Scalar>) -> Self {
        Variant::Array(ArrayValue { element_type, elements, dimensions: None })
    }

    /// Returns `true` for the null scalar.
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Scalar(Scalar::Null))
    }

    /// Returns `true` for array variants.
    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    /// The built-in type of the value; for arrays, the element type.
    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Scalar(s) => s.variant_type(),
            Variant::Array(a) => a.element_type,
        }
    }

    /// Borrows the scalar payload, if scalar.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Variant::Scalar(s) => Some(s),
            Variant::Array(_) => None,
        }
    }

    /// Borrows the array payload, if array.
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Variant::Scalar(_) => None,
            Variant::Array(a) => Some(a),
        }
    }

    /// Array length; `None` for scalars.
    pub fn array_len(&self) -> Option<usize> {
        self.as_array().map(|a| a.elements.len())
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::null()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Scalar(s) => write!(f, "{}", s),
            Variant::Array(a) => write!(f, "[{} x {:?}]", a.elements.len(), a.element_type),
        }
    }
}

impl From<Scalar> for Variant {
    fn from(s: Scalar) -> Self {
        Variant::Scalar(s)
    }
}

macro_rules! impl_from_scalar {
    ($type:ty, $variant:ident) => {
        impl From<$type> for Scalar {
            fn from(v: $type) -> Self {
                Scalar::$variant(v)
            }
        }

        impl From<$type> for Variant {
            fn from(v: $type) -> Self {
                Variant::Scalar(Scalar::$variant(v))
            }
        }
    };
}

impl_from_scalar!(bool, Boolean);
impl_from_scalar!(i8, SByte);
impl_from_scalar!(u8, Byte);
impl_from_scalar!(i16, Int16);
impl_from_scalar!(u16, UInt16);
impl_from_scalar!(i32, Int32);
impl_from_scalar!(u32, UInt32);
impl_from_scalar!(i64, Int64);
impl_from_scalar!(u64, UInt64);
impl_from_scalar!(f32, Float);
impl_from_scalar!(f64, Double);
impl_from_scalar!(String, String);
impl_from_scalar!(Uuid, Guid);
impl_from_scalar!(ByteString, ByteString);
impl_from_scalar!(StatusCode, StatusCode);
impl_from_scalar!(QualifiedName, QualifiedName);
impl_from_scalar!(LocalizedText, LocalizedText);

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_string())
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::Scalar(Scalar::from(v))
    }
}

impl From<NodeId> for Scalar {
    fn from(v: NodeId) -> Self {
        Scalar::NodeId(Box::new(v))
    }
}

impl From<NodeId> for Variant {
    fn from(v: NodeId) -> Self {
        Variant::Scalar(Scalar::from(v))
    }
}

impl From<DateTime<Utc>> for Variant {
    fn from(v: DateTime<Utc>) -> Self {
        Variant::Scalar(Scalar::DateTime(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_type_codes_round_trip() {
        for code in 0..=25u8 {
            let vt = VariantType::from_code(code).unwrap();
            assert_eq!(vt.code(), code);
        }
        assert!(VariantType::from_code(26).is_none());
    }

    #[test]
    fn numeric_family() {
        assert!(VariantType::Double.is_numeric());
        assert!(VariantType::SByte.is_numeric());
        assert!(!VariantType::String.is_numeric());
        assert!(!VariantType::Boolean.is_numeric());
        assert!(!VariantType::ByteString.is_numeric());
    }

    #[test]
    fn variant_kind_accessors() {
        let scalar: Variant = 42i32.into();
        assert!(!scalar.is_array());
        assert_eq!(scalar.variant_type(), VariantType::Int32);

        let arr = Variant::array(
            VariantType::Int32,
            vec![Scalar::Int32(1), Scalar::Int32(2), Scalar::Int32(3)],
        );
        assert!(arr.is_array());
        assert_eq!(arr.variant_type(), VariantType::Int32);
        assert_eq!(arr.array_len(), Some(3));
    }

    #[test]
    fn data_type_id_resolution() {
        use crate::ids::data_type_id;
        assert_eq!(
            VariantType::from_data_type_id(&data_type_id::DOUBLE),
            Some(VariantType::Double)
        );
        assert_eq!(
            VariantType::from_data_type_id(&data_type_id::BASE_DATA_TYPE),
            Some(VariantType::Variant)
        );
        assert_eq!(VariantType::from_data_type_id(&NodeId::string(2, "x")), None);
    }
}
