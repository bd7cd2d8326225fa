//! Project node types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProjectError;

/// The project-level kind of an object node.
///
/// Discriminants are stable and persisted in the `_NodeType` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
#[repr(i64)]
pub enum NodeType {
    /// The project root.
    Root = 1,
    /// The Connectivity category.
    Connectivity = 2,
    /// A communication channel.
    Channel = 4,
    /// A device behind a channel.
    Device = 8,
    /// A tag group.
    Group = 16,
    /// A tag.
    Tag = 32,
    /// The Data Loggers category.
    DataLoggers = 1024,
    /// A data logger.
    DataLogger = 2048,
    /// The Alarms category.
    Alarms = 32768,
}

impl NodeType {
    /// The display name of this node type.
    pub const fn name(self) -> &'static str {
        match self {
            NodeType::Root => "Root",
            NodeType::Connectivity => "Connectivity",
            NodeType::Channel => "Channel",
            NodeType::Device => "Device",
            NodeType::Group => "Group",
            NodeType::Tag => "Tag",
            NodeType::DataLoggers => "Data Loggers",
            NodeType::DataLogger => "Data Logger",
            NodeType::Alarms => "Alarms",
        }
    }

    /// Parses a case-insensitive node type name.
    pub fn parse_name(name: &str) -> Result<Self, ProjectError> {
        match name.to_lowercase().as_str() {
            "root" => Ok(NodeType::Root),
            "connectivity" => Ok(NodeType::Connectivity),
            "channel" => Ok(NodeType::Channel),
            "device" => Ok(NodeType::Device),
            "group" => Ok(NodeType::Group),
            "tag" => Ok(NodeType::Tag),
            "dataloggers" | "data loggers" => Ok(NodeType::DataLoggers),
            "datalogger" | "data logger" => Ok(NodeType::DataLogger),
            "alarms" => Ok(NodeType::Alarms),
            _ => Err(ProjectError::InvalidNodeType),
        }
    }

    /// Converts a persisted discriminant.
    pub fn from_i64(value: i64) -> Result<Self, ProjectError> {
        match value {
            1 => Ok(NodeType::Root),
            2 => Ok(NodeType::Connectivity),
            4 => Ok(NodeType::Channel),
            8 => Ok(NodeType::Device),
            16 => Ok(NodeType::Group),
            32 => Ok(NodeType::Tag),
            1024 => Ok(NodeType::DataLoggers),
            2048 => Ok(NodeType::DataLogger),
            32768 => Ok(NodeType::Alarms),
            _ => Err(ProjectError::InvalidNodeType),
        }
    }

    /// The persisted discriminant.
    #[inline]
    pub const fn as_i64(self) -> i64 {
        self as i64
    }

    /// Returns `true` for the project root.
    #[inline]
    pub const fn is_root(self) -> bool {
        matches!(self, NodeType::Root)
    }

    /// Returns `true` for tags.
    #[inline]
    pub const fn is_tag(self) -> bool {
        matches!(self, NodeType::Tag)
    }

    /// Returns `true` for the fixed category nodes under the root.
    #[inline]
    pub const fn is_category(self) -> bool {
        matches!(self, NodeType::Connectivity | NodeType::DataLoggers | NodeType::Alarms)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<NodeType> for i64 {
    fn from(nt: NodeType) -> Self {
        nt.as_i64()
    }
}

impl TryFrom<i64> for NodeType {
    type Error = ProjectError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        NodeType::from_i64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_are_stable() {
        assert_eq!(NodeType::Root.as_i64(), 1);
        assert_eq!(NodeType::Tag.as_i64(), 32);
        assert_eq!(NodeType::DataLoggers.as_i64(), 1024);
        assert_eq!(NodeType::Alarms.as_i64(), 32768);
        for v in [1, 2, 4, 8, 16, 32, 1024, 2048, 32768] {
            assert_eq!(NodeType::from_i64(v).unwrap().as_i64(), v);
        }
        assert!(NodeType::from_i64(3).is_err());
    }

    #[test]
    fn name_parsing_is_case_insensitive() {
        assert_eq!(NodeType::parse_name("tag").unwrap(), NodeType::Tag);
        assert_eq!(NodeType::parse_name("Data Loggers").unwrap(), NodeType::DataLoggers);
        assert_eq!(NodeType::parse_name("CHANNEL").unwrap(), NodeType::Channel);
        assert!(NodeType::parse_name("turbine").is_err());
    }

    #[test]
    fn category_predicate() {
        assert!(NodeType::Connectivity.is_category());
        assert!(NodeType::Alarms.is_category());
        assert!(!NodeType::Channel.is_category());
        assert!(!NodeType::Root.is_category());
    }
}
