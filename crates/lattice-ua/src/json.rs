//! JSON encoding of variants and data values.
//!
//! A variant encodes as `{ "type": <byte code>, "body": <value>,
//! "dimensions": [u32]? }`. The type byte is the OPC UA built-in type code
//! and is omitted for null. GUID bodies are the canonical string form,
//! ByteString bodies are base64. Arrays encode element bodies in a JSON
//! array. ExtensionObject bodies are passed through on encode; decoding an
//! ExtensionObject is not supported and fails.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    ArrayValue, ByteString, DataValue, DiagnosticInfo, ExpandedNodeId, ExtensionObject,
    LocalizedText, NodeId, QualifiedName, Scalar, StatusCode, Variant, VariantType,
};

// =============================================================================
// Scalar body <-> JSON
// =============================================================================

fn scalar_body(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Null => Value::Null,
        Scalar::Boolean(v) => json!(v),
        Scalar::SByte(v) => json!(v),
        Scalar::Byte(v) => json!(v),
        Scalar::Int16(v) => json!(v),
        Scalar::UInt16(v) => json!(v),
        Scalar::Int32(v) => json!(v),
        Scalar::UInt32(v) => json!(v),
        Scalar::Int64(v) => json!(v),
        Scalar::UInt64(v) => json!(v),
        Scalar::Float(v) => json!(v),
        Scalar::Double(v) => json!(v),
        Scalar::String(v) => json!(v),
        Scalar::DateTime(v) => json!(v.to_rfc3339()),
        Scalar::Guid(v) => json!(v.to_string()),
        Scalar::ByteString(v) => json!(BASE64.encode(v.as_ref())),
        Scalar::XmlElement(v) => json!(v),
        Scalar::NodeId(v) => serde_json::to_value(v.as_ref()).unwrap_or(Value::Null),
        Scalar::ExpandedNodeId(v) => serde_json::to_value(v.as_ref()).unwrap_or(Value::Null),
        Scalar::StatusCode(v) => json!(v.0),
        Scalar::QualifiedName(v) => serde_json::to_value(v).unwrap_or(Value::Null),
        Scalar::LocalizedText(v) => serde_json::to_value(v).unwrap_or(Value::Null),
        Scalar::ExtensionObject(v) => serde_json::to_value(v.as_ref()).unwrap_or(Value::Null),
        Scalar::DataValue(v) => serde_json::to_value(v.as_ref()).unwrap_or(Value::Null),
        Scalar::Variant(v) => serde_json::to_value(v.as_ref()).unwrap_or(Value::Null),
        Scalar::DiagnosticInfo(v) => serde_json::to_value(v.as_ref()).unwrap_or(Value::Null),
    }
}

fn scalar_from_body(vt: VariantType, body: &Value) -> Result<Scalar, String> {
    fn int<T: TryFrom<i64>>(body: &Value) -> Result<T, String> {
        body.as_i64()
            .and_then(|v| T::try_from(v).ok())
            .ok_or_else(|| "integer body out of range".to_string())
    }
    fn uint<T: TryFrom<u64>>(body: &Value) -> Result<T, String> {
        body.as_u64()
            .and_then(|v| T::try_from(v).ok())
            .ok_or_else(|| "unsigned body out of range".to_string())
    }
    fn text(body: &Value) -> Result<&str, String> {
        body.as_str().ok_or_else(|| "expected string body".to_string())
    }
    fn obj<T: serde::de::DeserializeOwned>(body: &Value) -> Result<T, String> {
        serde_json::from_value(body.clone()).map_err(|e| e.to_string())
    }

    Ok(match vt {
        VariantType::Null => Scalar::Null,
        VariantType::Boolean => Scalar::Boolean(
            body.as_bool().ok_or_else(|| "expected boolean body".to_string())?,
        ),
        VariantType::SByte => Scalar::SByte(int(body)?),
        VariantType::Byte => Scalar::Byte(uint(body)?),
        VariantType::Int16 => Scalar::Int16(int(body)?),
        VariantType::UInt16 => Scalar::UInt16(uint(body)?),
        VariantType::Int32 => Scalar::Int32(int(body)?),
        VariantType::UInt32 => Scalar::UInt32(uint(body)?),
        VariantType::Int64 => Scalar::Int64(int(body)?),
        VariantType::UInt64 => Scalar::UInt64(uint(body)?),
        VariantType::Float => Scalar::Float(
            body.as_f64().ok_or_else(|| "expected number body".to_string())? as f32,
        ),
        VariantType::Double => Scalar::Double(
            body.as_f64().ok_or_else(|| "expected number body".to_string())?,
        ),
        VariantType::String => Scalar::String(text(body)?.to_string()),
        VariantType::DateTime => Scalar::DateTime(
            chrono::DateTime::parse_from_rfc3339(text(body)?)
                .map_err(|e| e.to_string())?
                .with_timezone(&chrono::Utc),
        ),
        VariantType::Guid => Scalar::Guid(Uuid::parse_str(text(body)?).map_err(|e| e.to_string())?),
        VariantType::ByteString => Scalar::ByteString(ByteString::from(
            BASE64.decode(text(body)?).map_err(|e| e.to_string())?,
        )),
        VariantType::XmlElement => Scalar::XmlElement(text(body)?.to_string()),
        VariantType::NodeId => Scalar::NodeId(Box::new(obj::<NodeId>(body)?)),
        VariantType::ExpandedNodeId => {
            Scalar::ExpandedNodeId(Box::new(obj::<ExpandedNodeId>(body)?))
        }
        VariantType::StatusCode => Scalar::StatusCode(StatusCode(uint(body)?)),
        VariantType::QualifiedName => Scalar::QualifiedName(obj::<QualifiedName>(body)?),
        VariantType::LocalizedText => Scalar::LocalizedText(obj::<LocalizedText>(body)?),
        VariantType::ExtensionObject => {
            return Err("json variant decoder does not support ExtensionObject".to_string())
        }
        VariantType::DataValue => Scalar::DataValue(Box::new(obj::<DataValue>(body)?)),
        VariantType::Variant => Scalar::Variant(Box::new(obj::<Variant>(body)?)),
        VariantType::DiagnosticInfo => Scalar::DiagnosticInfo(Box::new(obj::<DiagnosticInfo>(body)?)),
    })
}

// =============================================================================
// Variant serde
// =============================================================================

impl Serialize for Variant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serde_json::Map::new();
        match self {
            Variant::Scalar(s) => {
                let vt = s.variant_type();
                if vt != VariantType::Null {
                    map.insert("type".to_string(), json!(vt.code()));
                }
                map.insert("body".to_string(), scalar_body(s));
            }
            Variant::Array(a) => {
                map.insert("type".to_string(), json!(a.element_type.code()));
                map.insert(
                    "body".to_string(),
                    Value::Array(a.elements.iter().map(scalar_body).collect()),
                );
                if let Some(dims) = &a.dimensions {
                    map.insert("dimensions".to_string(), json!(dims));
                }
            }
        }
        Value::Object(map).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Variant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(Variant::null());
        }
        let code = raw.get("type").and_then(Value::as_u64).unwrap_or(0) as u8;
        let vt = VariantType::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("invalid variant type {}", code)))?;
        let body = raw.get("body").unwrap_or(&Value::Null);

        if body.is_null() {
            return Ok(Variant::null());
        }
        match body {
            Value::Array(items) => {
                let elements = items
                    .iter()
                    .map(|item| scalar_from_body(vt, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(de::Error::custom)?;
                let dimensions: Option<Vec<u32>> = raw
                    .get("dimensions")
                    .map(|d| serde_json::from_value(d.clone()))
                    .transpose()
                    .map_err(de::Error::custom)?;
                Ok(Variant::Array(ArrayValue { element_type: vt, elements, dimensions }))
            }
            _ => Ok(Variant::Scalar(scalar_from_body(vt, body).map_err(de::Error::custom)?)),
        }
    }
}

// =============================================================================
// DataValue serde
// =============================================================================

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = json!({
            "value": self.value,
            "status": self.status.0,
            "sourceTimestamp": self.source_timestamp.map(|t| t.to_rfc3339()),
            "sourcePicoseconds": self.source_picoseconds,
            "serverTimestamp": self.server_timestamp.map(|t| t.to_rfc3339()),
            "serverPicoseconds": self.server_picoseconds,
        });
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(DataValue::default());
        }

        let value: Variant = match raw.get("value") {
            Some(v) => serde_json::from_value(v.clone()).map_err(de::Error::custom)?,
            None => Variant::null(),
        };
        // absent or null status decodes as Good
        let status = match raw.get("status") {
            Some(Value::Null) | None => StatusCode::GOOD,
            Some(v) => StatusCode(
                v.as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| de::Error::custom("status must be a u32"))?,
            ),
        };

        fn timestamp<E: de::Error>(raw: &Value, key: &str) -> Result<Option<chrono::DateTime<chrono::Utc>>, E> {
            match raw.get(key) {
                Some(Value::Null) | None => Ok(None),
                Some(Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s)
                    .map(|t| Some(t.with_timezone(&chrono::Utc)))
                    .map_err(de::Error::custom),
                Some(_) => Err(de::Error::custom("timestamp must be an rfc3339 string")),
            }
        }
        fn picos<E: de::Error>(raw: &Value, key: &str) -> Result<u16, E> {
            match raw.get(key) {
                Some(Value::Null) | None => Ok(0),
                Some(v) => v
                    .as_u64()
                    .and_then(|v| u16::try_from(v).ok())
                    .ok_or_else(|| de::Error::custom("picoseconds must be a u16")),
            }
        }

        Ok(DataValue {
            value,
            status,
            source_timestamp: timestamp(&raw, "sourceTimestamp")?,
            source_picoseconds: picos(&raw, "sourcePicoseconds")?,
            server_timestamp: timestamp(&raw, "serverTimestamp")?,
            server_picoseconds: picos(&raw, "serverPicoseconds")?,
        })
    }
}

/// Encodes a variant to its JSON document.
pub fn encode_variant(variant: &Variant) -> Value {
    serde_json::to_value(variant).unwrap_or(Value::Null)
}

/// Decodes a variant from its JSON document.
pub fn decode_variant(value: &Value) -> Result<Variant, serde_json::Error> {
    serde_json::from_value(value.clone())
}

/// Best-effort conversion of a bare JSON value into a scalar, used when a
/// property bag supplies values without type bytes.
pub fn scalar_from_loose_json(value: &Value) -> Scalar {
    match value {
        Value::Null => Scalar::Null,
        Value::Bool(b) => Scalar::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Scalar::Int64(i)
            } else if let Some(u) = n.as_u64() {
                Scalar::UInt64(u)
            } else {
                Scalar::Double(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Scalar::String(s.clone()),
        other => Scalar::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExtensionObject;
    use chrono::{TimeZone, Utc};

    fn round_trip(v: Variant) {
        let json = serde_json::to_value(&v).unwrap();
        let back: Variant = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn scalar_round_trips() {
        round_trip(Variant::from(true));
        round_trip(Variant::from(-5i8));
        round_trip(Variant::from(200u8));
        round_trip(Variant::from(-12345i16));
        round_trip(Variant::from(54321u16));
        round_trip(Variant::from(-7i32));
        round_trip(Variant::from(7u32));
        round_trip(Variant::from(i64::MIN));
        round_trip(Variant::from(u64::MAX));
        round_trip(Variant::from(2.5f32));
        round_trip(Variant::from(3.75f64));
        round_trip(Variant::from("hello"));
        round_trip(Variant::from(Uuid::parse_str("5ce9dbce-5d79-434c-9ac3-1cfba9a6e92c").unwrap()));
        round_trip(Variant::from(ByteString::from(vec![1u8, 2, 3])));
        round_trip(Variant::from(StatusCode::BAD_OUT_OF_RANGE));
        round_trip(Variant::from(QualifiedName::new(2, "Plc1")));
        round_trip(Variant::from(LocalizedText::en("hello")));
        round_trip(Variant::from(NodeId::string(0, "Root.Connectivity")));
        round_trip(Variant::from(Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap()));
    }

    #[test]
    fn guid_body_is_string() {
        let uuid = Uuid::parse_str("5ce9dbce-5d79-434c-9ac3-1cfba9a6e92c").unwrap();
        let json = serde_json::to_value(Variant::from(uuid)).unwrap();
        assert_eq!(json["type"], 14);
        assert_eq!(json["body"], uuid.to_string());
    }

    #[test]
    fn null_omits_type() {
        let json = serde_json::to_value(Variant::null()).unwrap();
        assert!(json.get("type").is_none());
        assert!(json["body"].is_null());
    }

    #[test]
    fn array_round_trip_with_dimensions() {
        let mut v = Variant::array(
            VariantType::Double,
            vec![Scalar::Double(1.0), Scalar::Double(2.0), Scalar::Double(3.0)],
        );
        if let Variant::Array(a) = &mut v {
            a.dimensions = Some(vec![3]);
        }
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["type"], 11);
        assert_eq!(json["dimensions"], json!([3]));
        let back: Variant = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn extension_object_decode_rejected() {
        let encoded = serde_json::to_value(Variant::Scalar(Scalar::ExtensionObject(Box::new(
            ExtensionObject::default(),
        ))))
        .unwrap();
        assert!(serde_json::from_value::<Variant>(encoded).is_err());
    }

    #[test]
    fn data_value_round_trip_identity() {
        let dv = DataValue {
            value: Variant::from(21.5f64),
            status: StatusCode::GOOD,
            source_timestamp: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap()),
            source_picoseconds: 250,
            server_timestamp: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 1).unwrap()),
            server_picoseconds: 0,
        };
        let json = serde_json::to_value(&dv).unwrap();
        let back: DataValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, dv);
    }

    #[test]
    fn data_value_null_status_decodes_good() {
        let back: DataValue =
            serde_json::from_value(json!({ "value": { "type": 1, "body": true }, "status": null }))
                .unwrap();
        assert_eq!(back.status, StatusCode::GOOD);
        assert_eq!(back.value, Variant::from(true));
        assert!(back.source_timestamp.is_none());
    }
}
