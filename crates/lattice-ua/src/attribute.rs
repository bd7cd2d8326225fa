//! Attribute ids, node classes, access levels and the small wire enums
//! shared by the service set.

use serde::{Deserialize, Serialize};

// =============================================================================
// AttributeId
// =============================================================================

/// Node attribute identifiers (OPC UA Part 4).
pub mod attribute_id {
    /// The canonical node identifier.
    pub const NODE_ID: u32 = 1;
    /// The node class.
    pub const NODE_CLASS: u32 = 2;
    /// The browse name.
    pub const BROWSE_NAME: u32 = 3;
    /// The display name.
    pub const DISPLAY_NAME: u32 = 4;
    /// The description.
    pub const DESCRIPTION: u32 = 5;
    /// Whether a type node is abstract.
    pub const IS_ABSTRACT: u32 = 8;
    /// Whether a reference type is symmetric.
    pub const SYMMETRIC: u32 = 9;
    /// The inverse name of a reference type.
    pub const INVERSE_NAME: u32 = 10;
    /// Whether a view contains no loops.
    pub const CONTAINS_NO_LOOPS: u32 = 11;
    /// The event notifier byte.
    pub const EVENT_NOTIFIER: u32 = 12;
    /// The value of a variable.
    pub const VALUE: u32 = 13;
    /// The data type of a variable.
    pub const DATA_TYPE: u32 = 14;
    /// The value rank of a variable.
    pub const VALUE_RANK: u32 = 15;
    /// The array dimensions of a variable.
    pub const ARRAY_DIMENSIONS: u32 = 16;
    /// The access level mask.
    pub const ACCESS_LEVEL: u32 = 17;
    /// The access level mask for the current user.
    pub const USER_ACCESS_LEVEL: u32 = 18;
    /// The fastest supported sampling interval.
    pub const MINIMUM_SAMPLING_INTERVAL: u32 = 19;
    /// Whether history is collected for the variable.
    pub const HISTORIZING: u32 = 20;
    /// Whether a method may be called.
    pub const EXECUTABLE: u32 = 21;
    /// Whether the current user may call a method.
    pub const USER_EXECUTABLE: u32 = 22;
    /// The abstract definition of a data type.
    pub const DATA_TYPE_DEFINITION: u32 = 23;
    /// Role permissions of the node.
    pub const ROLE_PERMISSIONS: u32 = 24;
    /// Role permissions of the node for the current user.
    pub const USER_ROLE_PERMISSIONS: u32 = 25;
}

// =============================================================================
// NodeClass
// =============================================================================

/// The class of a node. Values form a bitmask for browse filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum NodeClass {
    /// No class; used in masked-out reference descriptions.
    #[default]
    Unspecified = 0,
    /// Object node.
    Object = 1,
    /// Variable node.
    Variable = 2,
    /// Method node.
    Method = 4,
    /// Object type node.
    ObjectType = 8,
    /// Variable type node.
    VariableType = 16,
    /// Reference type node.
    ReferenceType = 32,
    /// Data type node.
    DataType = 64,
    /// View node.
    View = 128,
}

impl NodeClass {
    /// Bitmask value used with `NodeClassMask` filters.
    #[inline]
    pub const fn mask(self) -> u32 {
        self as u32
    }
}

// =============================================================================
// Access levels
// =============================================================================

/// AccessLevel bit constants.
pub mod access_level {
    /// No access.
    pub const NONE: u8 = 0;
    /// The current value may be read.
    pub const CURRENT_READ: u8 = 1;
    /// The current value may be written.
    pub const CURRENT_WRITE: u8 = 2;
    /// History may be read.
    pub const HISTORY_READ: u8 = 4;
    /// History may be written.
    pub const HISTORY_WRITE: u8 = 8;
    /// Semantic changes are signalled.
    pub const SEMANTIC_CHANGE: u8 = 16;
    /// The status code may be written.
    pub const STATUS_WRITE: u8 = 32;
    /// The timestamps may be written.
    pub const TIMESTAMP_WRITE: u8 = 64;
}

// =============================================================================
// Permissions
// =============================================================================

/// PermissionType bit constants used in role permissions.
pub mod permission {
    /// See the node when browsing.
    pub const BROWSE: u32 = 1;
    /// Read the RolePermissions attribute.
    pub const READ_ROLE_PERMISSIONS: u32 = 2;
    /// Write node attributes other than Value.
    pub const WRITE_ATTRIBUTE: u32 = 4;
    /// Write the RolePermissions attribute.
    pub const WRITE_ROLE_PERMISSIONS: u32 = 8;
    /// Toggle the Historizing attribute.
    pub const WRITE_HISTORIZING: u32 = 16;
    /// Read the current value.
    pub const READ: u32 = 32;
    /// Write the current value.
    pub const WRITE: u32 = 64;
    /// Read historical values.
    pub const READ_HISTORY: u32 = 128;
    /// Insert historical values.
    pub const INSERT_HISTORY: u32 = 256;
    /// Modify historical values.
    pub const MODIFY_HISTORY: u32 = 512;
    /// Delete historical values.
    pub const DELETE_HISTORY: u32 = 1024;
    /// Receive events.
    pub const RECEIVE_EVENTS: u32 = 2048;
    /// Call methods.
    pub const CALL: u32 = 4096;
    /// Add references.
    pub const ADD_REFERENCE: u32 = 8192;
    /// Remove references.
    pub const REMOVE_REFERENCE: u32 = 16384;
    /// Delete the node.
    pub const DELETE_NODE: u32 = 32768;
    /// Add child nodes.
    pub const ADD_NODE: u32 = 65536;
}

/// EventNotifier bit constants.
pub mod event_notifier {
    /// The node produces events that may be subscribed to.
    pub const SUBSCRIBE_TO_EVENTS: u8 = 1;
    /// Event history may be read.
    pub const HISTORY_READ: u8 = 4;
    /// Event history may be written.
    pub const HISTORY_WRITE: u8 = 8;
}

// =============================================================================
// ValueRank
// =============================================================================

/// Variable value rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(i32)]
pub enum ValueRank {
    /// Scalar or a one-dimensional array.
    ScalarOrOneDimension = -3,
    /// Scalar or an array of any dimensionality.
    Any = -2,
    /// Scalar only.
    #[default]
    Scalar = -1,
    /// Array with one or more dimensions.
    OneOrMoreDimensions = 0,
    /// One-dimensional array only.
    OneDimension = 1,
}

impl ValueRank {
    /// Converts from the wire i32 form. Values above one collapse to
    /// [`ValueRank::OneDimension`]; matrices are not carried by this server.
    pub fn from_i32(v: i32) -> Self {
        match v {
            -3 => ValueRank::ScalarOrOneDimension,
            -2 => ValueRank::Any,
            -1 => ValueRank::Scalar,
            0 => ValueRank::OneOrMoreDimensions,
            _ => ValueRank::OneDimension,
        }
    }

    /// Returns `true` when a scalar value is admissible.
    pub fn accepts_scalar(self) -> bool {
        matches!(self, ValueRank::Scalar | ValueRank::ScalarOrOneDimension | ValueRank::Any)
    }

    /// Returns `true` when an array value is admissible.
    pub fn accepts_array(self) -> bool {
        matches!(
            self,
            ValueRank::OneDimension
                | ValueRank::OneOrMoreDimensions
                | ValueRank::ScalarOrOneDimension
                | ValueRank::Any
        )
    }
}

// =============================================================================
// Browse enums
// =============================================================================

/// Direction of reference traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum BrowseDirection {
    /// Follow references in their forward direction.
    #[default]
    Forward = 0,
    /// Follow references in their inverse direction.
    Inverse = 1,
    /// Follow references in both directions.
    Both = 2,
}

impl BrowseDirection {
    /// Converts the wire u32, rejecting out-of-range values.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(BrowseDirection::Forward),
            1 => Some(BrowseDirection::Inverse),
            2 => Some(BrowseDirection::Both),
            _ => None,
        }
    }
}

/// Bits selecting which fields of a ReferenceDescription are filled in.
pub mod browse_result_mask {
    /// Include the reference type id.
    pub const REFERENCE_TYPE_ID: u32 = 1;
    /// Include the is-forward flag.
    pub const IS_FORWARD: u32 = 2;
    /// Include the node class.
    pub const NODE_CLASS: u32 = 4;
    /// Include the browse name.
    pub const BROWSE_NAME: u32 = 8;
    /// Include the display name.
    pub const DISPLAY_NAME: u32 = 16;
    /// Include the type definition.
    pub const TYPE_DEFINITION: u32 = 32;
    /// All fields.
    pub const ALL: u32 = 63;
}

// =============================================================================
// Timestamps / monitoring enums
// =============================================================================

/// Which timestamps the client wants returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum TimestampsToReturn {
    /// Only the source timestamp.
    Source = 0,
    /// Only the server timestamp.
    Server = 1,
    /// Both timestamps.
    #[default]
    Both = 2,
    /// Neither timestamp.
    Neither = 3,
}

impl TimestampsToReturn {
    /// Converts the wire u32, rejecting out-of-range values.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(TimestampsToReturn::Source),
            1 => Some(TimestampsToReturn::Server),
            2 => Some(TimestampsToReturn::Both),
            3 => Some(TimestampsToReturn::Neither),
            _ => None,
        }
    }
}

/// Monitoring mode of a monitored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum MonitoringMode {
    /// Sampling and reporting disabled.
    Disabled = 0,
    /// Sampling enabled, reporting disabled.
    Sampling = 1,
    /// Sampling and reporting enabled.
    #[default]
    Reporting = 2,
}

/// Deadband kind of a data-change filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum DeadbandType {
    /// No deadband.
    #[default]
    None = 0,
    /// Absolute deadband.
    Absolute = 1,
    /// Percent deadband.
    Percent = 2,
}

/// What kind of change triggers a data-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum DataChangeTrigger {
    /// Status changes only.
    Status = 0,
    /// Status or value changes.
    #[default]
    StatusValue = 1,
    /// Status, value or source-timestamp changes.
    StatusValueTimestamp = 2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browse_direction_bounds() {
        assert_eq!(BrowseDirection::from_u32(0), Some(BrowseDirection::Forward));
        assert_eq!(BrowseDirection::from_u32(2), Some(BrowseDirection::Both));
        assert_eq!(BrowseDirection::from_u32(3), None);
    }

    #[test]
    fn value_rank_admission() {
        assert!(ValueRank::Scalar.accepts_scalar());
        assert!(!ValueRank::Scalar.accepts_array());
        assert!(ValueRank::OneDimension.accepts_array());
        assert!(!ValueRank::OneDimension.accepts_scalar());
        assert!(ValueRank::Any.accepts_scalar() && ValueRank::Any.accepts_array());
        assert!(
            ValueRank::ScalarOrOneDimension.accepts_scalar()
                && ValueRank::ScalarOrOneDimension.accepts_array()
        );
    }

    #[test]
    fn timestamps_to_return_bounds() {
        assert_eq!(TimestampsToReturn::from_u32(3), Some(TimestampsToReturn::Neither));
        assert_eq!(TimestampsToReturn::from_u32(4), None);
    }
}
