//! OPC UA node identifiers.
//!
//! A [`NodeId`] uniquely identifies a node within a server. It pairs a
//! namespace index with one of four identifier kinds: numeric, string, GUID
//! or opaque bytes.
//!
//! # Text grammar
//!
//! ```text
//! i=85
//! ns=2;s=Connectivity.Plc1.Temperature
//! ns=2;g=5ce9dbce-5d79-434c-9ac3-1cfba9a6e92c
//! ns=2;b=YWJjZA==
//! ```
//!
//! The `ns=` prefix is omitted for namespace 0. Parsing the string form of
//! any NodeId yields the identical value back.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ByteString;

/// Error produced when a NodeId cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid node id '{input}': {reason}")]
pub struct NodeIdParseError {
    /// The offending input.
    pub input: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl NodeIdParseError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self { input: input.to_string(), reason }
    }
}

// =============================================================================
// Identifier
// =============================================================================

/// The identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// Numeric identifier. Used for all standard-namespace nodes.
    Numeric(u32),
    /// String identifier. This server uses `.`-joined browse paths.
    String(String),
    /// Globally unique identifier.
    Guid(Uuid),
    /// Opaque byte-string identifier.
    Opaque(ByteString),
}

impl Identifier {
    /// The `idType` code used by the JSON object form.
    pub const fn id_type(&self) -> u8 {
        match self {
            Identifier::Numeric(_) => 0,
            Identifier::String(_) => 1,
            Identifier::Guid(_) => 2,
            Identifier::Opaque(_) => 3,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={}", v),
            Identifier::String(v) => write!(f, "s={}", v),
            Identifier::Guid(v) => write!(f, "g={}", v),
            Identifier::Opaque(v) => write!(f, "b={}", BASE64.encode(v.as_ref())),
        }
    }
}

// =============================================================================
// NodeId
// =============================================================================

/// Identifies a node in the server address space.
///
/// Equality is structural. Namespace 0 is the OPC UA standard namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    /// Namespace index into the server's namespace-URI table.
    pub namespace_index: u16,
    /// The identifier.
    pub identifier: Identifier,
}

impl NodeId {
    /// Creates a numeric node id.
    #[inline]
    pub const fn numeric(ns: u16, value: u32) -> Self {
        Self { namespace_index: ns, identifier: Identifier::Numeric(value) }
    }

    /// Creates a string node id.
    #[inline]
    pub fn string(ns: u16, value: impl Into<String>) -> Self {
        Self { namespace_index: ns, identifier: Identifier::String(value.into()) }
    }

    /// Creates a GUID node id.
    #[inline]
    pub const fn guid(ns: u16, value: Uuid) -> Self {
        Self { namespace_index: ns, identifier: Identifier::Guid(value) }
    }

    /// Creates an opaque node id.
    #[inline]
    pub fn opaque(ns: u16, value: impl Into<ByteString>) -> Self {
        Self { namespace_index: ns, identifier: Identifier::Opaque(value.into()) }
    }

    /// The null node id (`ns=0;i=0`).
    #[inline]
    pub const fn null() -> Self {
        Self::numeric(0, 0)
    }

    /// Returns `true` for `ns=0;i=0`.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, Identifier::Numeric(0))
    }

    /// Returns the string identifier, if this is a string node id.
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match &self.identifier {
            Identifier::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric identifier, if this is a numeric node id.
    #[inline]
    pub fn as_numeric(&self) -> Option<u32> {
        match self.identifier {
            Identifier::Numeric(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the GUID identifier, if this is a GUID node id.
    #[inline]
    pub fn as_guid(&self) -> Option<&Uuid> {
        match &self.identifier {
            Identifier::Guid(g) => Some(g),
            _ => None,
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index == 0 {
            write!(f, "{}", self.identifier)
        } else {
            write!(f, "ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl FromStr for NodeId {
    type Err = NodeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s;
        let s = s.trim();

        let (ns, rest) = match s.strip_prefix("ns=") {
            Some(tail) => {
                let pos = tail
                    .find(';')
                    .ok_or_else(|| NodeIdParseError::new(input, "missing identifier after namespace"))?;
                let ns: u16 = tail[..pos]
                    .parse()
                    .map_err(|_| NodeIdParseError::new(input, "invalid namespace index"))?;
                (ns, &tail[pos + 1..])
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = rest.strip_prefix("i=") {
            let value: u32 = id
                .parse()
                .map_err(|_| NodeIdParseError::new(input, "invalid numeric identifier"))?;
            if value == 0 && ns == 0 {
                return Err(NodeIdParseError::new(input, "null node id"));
            }
            Identifier::Numeric(value)
        } else if let Some(id) = rest.strip_prefix("s=") {
            Identifier::String(id.to_string())
        } else if let Some(id) = rest.strip_prefix("g=") {
            let uuid =
                Uuid::parse_str(id).map_err(|_| NodeIdParseError::new(input, "invalid guid"))?;
            Identifier::Guid(uuid)
        } else if let Some(id) = rest.strip_prefix("b=") {
            let bytes = BASE64
                .decode(id)
                .map_err(|_| NodeIdParseError::new(input, "invalid base64"))?;
            Identifier::Opaque(ByteString::from(bytes))
        } else {
            return Err(NodeIdParseError::new(input, "expected i=, s=, g= or b= identifier"));
        };

        Ok(NodeId { namespace_index: ns, identifier })
    }
}

// The wire/json object form is `{ "idType": n, "id": ..., "namespace": k }`.
// Numeric ids omit idType, matching the persisted snapshots of the original
// project files.
impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("NodeId", 3)?;
        match &self.identifier {
            Identifier::Numeric(v) => {
                st.serialize_field("id", v)?;
            }
            Identifier::String(v) => {
                st.serialize_field("idType", &1u8)?;
                st.serialize_field("id", v)?;
            }
            Identifier::Guid(v) => {
                st.serialize_field("idType", &2u8)?;
                st.serialize_field("id", &v.to_string())?;
            }
            Identifier::Opaque(v) => {
                st.serialize_field("idType", &3u8)?;
                st.serialize_field("id", &BASE64.encode(v.as_ref()))?;
            }
        }
        st.serialize_field("namespace", &self.namespace_index)?;
        st.end()
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default, rename = "idType")]
            id_type: u8,
            id: serde_json::Value,
            #[serde(default)]
            namespace: u16,
        }

        let raw = Raw::deserialize(deserializer)?;
        let identifier = match raw.id_type {
            0 => {
                let v = raw
                    .id
                    .as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| de::Error::custom("numeric node id out of range"))?;
                Identifier::Numeric(v)
            }
            1 => Identifier::String(
                raw.id
                    .as_str()
                    .ok_or_else(|| de::Error::custom("string node id must be a string"))?
                    .to_string(),
            ),
            2 => {
                let s = raw
                    .id
                    .as_str()
                    .ok_or_else(|| de::Error::custom("guid node id must be a string"))?;
                Identifier::Guid(Uuid::parse_str(s).map_err(de::Error::custom)?)
            }
            3 => {
                let s = raw
                    .id
                    .as_str()
                    .ok_or_else(|| de::Error::custom("opaque node id must be a string"))?;
                Identifier::Opaque(ByteString::from(
                    BASE64.decode(s).map_err(de::Error::custom)?,
                ))
            }
            other => return Err(de::Error::custom(format!("invalid idType {}", other))),
        };
        Ok(NodeId { namespace_index: raw.namespace, identifier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_omits_default_namespace() {
        assert_eq!(NodeId::numeric(0, 85).to_string(), "i=85");
        assert_eq!(NodeId::numeric(2, 1001).to_string(), "ns=2;i=1001");
        assert_eq!(NodeId::string(2, "A.B").to_string(), "ns=2;s=A.B");
    }

    #[test]
    fn parse_round_trips_all_kinds() {
        let ids = [
            NodeId::numeric(0, 85),
            NodeId::numeric(65535, 7),
            NodeId::string(0, "Root"),
            NodeId::string(3, "Connectivity.Plc1"),
            NodeId::guid(2, Uuid::parse_str("5ce9dbce-5d79-434c-9ac3-1cfba9a6e92c").unwrap()),
            NodeId::opaque(4, vec![0u8, 1, 2, 255]),
        ];
        for id in ids {
            let text = id.to_string();
            let parsed: NodeId = text.parse().unwrap();
            assert_eq!(parsed, id, "round trip failed for {}", text);
        }
    }

    #[test]
    fn parse_rejects_null_and_garbage() {
        assert!("i=0".parse::<NodeId>().is_err());
        assert!("x=12".parse::<NodeId>().is_err());
        assert!("ns=2".parse::<NodeId>().is_err());
        assert!("ns=99999;i=1".parse::<NodeId>().is_err());
        assert!("g=not-a-guid".parse::<NodeId>().is_err());
    }

    #[test]
    fn parse_accepts_nonzero_numeric_in_nonzero_namespace() {
        let id: NodeId = "ns=1;i=0".parse().unwrap();
        assert_eq!(id, NodeId::numeric(1, 0));
    }

    #[test]
    fn json_object_form() {
        let id = NodeId::string(2, "Root.Connectivity");
        let json = serde_json::to_value(&id).unwrap();
        assert_eq!(json["idType"], 1);
        assert_eq!(json["id"], "Root.Connectivity");
        assert_eq!(json["namespace"], 2);
        let back: NodeId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn json_numeric_omits_id_type() {
        let json = serde_json::to_value(NodeId::numeric(0, 85)).unwrap();
        assert!(json.get("idType").is_none());
        let back: NodeId = serde_json::from_value(json).unwrap();
        assert_eq!(back, NodeId::numeric(0, 85));
    }
}
