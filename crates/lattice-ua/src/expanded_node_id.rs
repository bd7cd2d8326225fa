//! Expanded node identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::node_id::{NodeId, NodeIdParseError};

/// A [`NodeId`] extended with an optional namespace URI and server index.
///
/// When `namespace_uri` is set it takes precedence over the inner node id's
/// namespace index; [`ExpandedNodeId::to_node_id`] substitutes the URI for an
/// index via the server's namespace-URI table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpandedNodeId {
    /// The inner node id.
    #[serde(flatten)]
    pub node_id: NodeId,
    /// Explicit namespace URI, overriding the index when present.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "namespaceUri")]
    pub namespace_uri: Option<String>,
    /// Index of the server the node lives on; 0 is the local server.
    #[serde(default, skip_serializing_if = "is_zero", rename = "serverIndex")]
    pub server_index: u32,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl ExpandedNodeId {
    /// Wraps a local node id.
    pub fn local(node_id: NodeId) -> Self {
        Self { node_id, namespace_uri: None, server_index: 0 }
    }

    /// Wraps a node id with an explicit namespace URI.
    pub fn with_uri(node_id: NodeId, uri: impl Into<String>) -> Self {
        Self { node_id, namespace_uri: Some(uri.into()), server_index: 0 }
    }

    /// Converts a node id to its expanded form, substituting the namespace
    /// URI when the index points into `namespace_uris`.
    pub fn from_node_id(node_id: NodeId, namespace_uris: &[String]) -> Self {
        let ns = node_id.namespace_index as usize;
        if ns > 0 && ns < namespace_uris.len() {
            Self::with_uri(node_id.clone(), namespace_uris[ns].clone())
        } else {
            Self::local(node_id)
        }
    }

    /// Resolves to a plain [`NodeId`], mapping the namespace URI back to an
    /// index. Returns `None` when the URI is unknown or the node lives on a
    /// remote server.
    pub fn to_node_id(&self, namespace_uris: &[String]) -> Option<NodeId> {
        if self.server_index != 0 {
            return None;
        }
        match &self.namespace_uri {
            None => Some(self.node_id.clone()),
            Some(uri) => {
                let ns = namespace_uris.iter().position(|u| u == uri)?;
                let mut id = self.node_id.clone();
                id.namespace_index = ns as u16;
                Some(id)
            }
        }
    }

    /// Returns `true` for the null expanded node id.
    pub fn is_null(&self) -> bool {
        self.namespace_uri.is_none() && self.server_index == 0 && self.node_id.is_null()
    }
}

impl Default for ExpandedNodeId {
    fn default() -> Self {
        Self::local(NodeId::null())
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        Self::local(node_id)
    }
}

impl fmt::Display for ExpandedNodeId {
    /// Text form: `svr=N;nsu=URI;<nodeid>` with unset parts omitted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.server_index != 0 {
            write!(f, "svr={};", self.server_index)?;
        }
        if let Some(uri) = &self.namespace_uri {
            write!(f, "nsu={};", uri)?;
        }
        write!(f, "{}", self.node_id)
    }
}

impl FromStr for ExpandedNodeId {
    type Err = NodeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s.trim();
        let mut server_index = 0u32;
        let mut namespace_uri = None;

        if let Some(tail) = rest.strip_prefix("svr=") {
            let pos = tail.find(';').ok_or_else(|| NodeIdParseError {
                input: s.to_string(),
                reason: "missing ';' after server index",
            })?;
            server_index = tail[..pos].parse().map_err(|_| NodeIdParseError {
                input: s.to_string(),
                reason: "invalid server index",
            })?;
            rest = &tail[pos + 1..];
        }
        if let Some(tail) = rest.strip_prefix("nsu=") {
            let pos = tail.find(';').ok_or_else(|| NodeIdParseError {
                input: s.to_string(),
                reason: "missing ';' after namespace uri",
            })?;
            namespace_uri = Some(tail[..pos].to_string());
            rest = &tail[pos + 1..];
        }

        Ok(Self { node_id: rest.parse()?, namespace_uri, server_index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_round_trip() {
        let id = ExpandedNodeId {
            node_id: NodeId::string(0, "Root.Connectivity"),
            namespace_uri: Some("urn:lattice:ns".to_string()),
            server_index: 2,
        };
        let text = id.to_string();
        assert_eq!(text, "svr=2;nsu=urn:lattice:ns;s=Root.Connectivity");
        assert_eq!(text.parse::<ExpandedNodeId>().unwrap(), id);
    }

    #[test]
    fn uri_resolution() {
        let uris = vec![
            "http://opcfoundation.org/UA/".to_string(),
            "urn:lattice:project".to_string(),
        ];
        let expanded =
            ExpandedNodeId::with_uri(NodeId::numeric(0, 42), "urn:lattice:project");
        let resolved = expanded.to_node_id(&uris).unwrap();
        assert_eq!(resolved, NodeId::numeric(1, 42));

        let unknown = ExpandedNodeId::with_uri(NodeId::numeric(0, 42), "urn:other");
        assert!(unknown.to_node_id(&uris).is_none());
    }

    #[test]
    fn local_passthrough() {
        let id = ExpandedNodeId::local(NodeId::numeric(3, 9));
        assert_eq!(id.to_node_id(&[]).unwrap(), NodeId::numeric(3, 9));
    }
}
