//! References and role permissions.

use serde::{Deserialize, Serialize};

use crate::{ExpandedNodeId, NodeId};

/// A typed directed edge between two nodes.
///
/// References are a free-form multi-edge relation over the address space;
/// they never express ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Id of the reference type node.
    #[serde(rename = "referenceTypeId")]
    pub reference_type_id: NodeId,
    /// `true` when the edge is stored in its inverse direction.
    #[serde(default, rename = "isInverse")]
    pub is_inverse: bool,
    /// The target node.
    #[serde(rename = "targetId")]
    pub target_id: ExpandedNodeId,
}

impl Reference {
    /// Creates a reference.
    pub fn new(reference_type_id: NodeId, is_inverse: bool, target_id: ExpandedNodeId) -> Self {
        Self { reference_type_id, is_inverse, target_id }
    }

    /// Creates a forward reference to a local target.
    pub fn forward(reference_type_id: NodeId, target: NodeId) -> Self {
        Self::new(reference_type_id, false, ExpandedNodeId::local(target))
    }

    /// Creates an inverse reference to a local target.
    pub fn inverse(reference_type_id: NodeId, target: NodeId) -> Self {
        Self::new(reference_type_id, true, ExpandedNodeId::local(target))
    }
}

/// A role id paired with the permissions granted to that role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermission {
    /// Id of the role node.
    #[serde(rename = "roleId")]
    pub role_id: NodeId,
    /// Bitmask of [`crate::permission`] values.
    pub permissions: u32,
}

impl RolePermission {
    /// Creates a role permission entry.
    pub fn new(role_id: NodeId, permissions: u32) -> Self {
        Self { role_id, permissions }
    }
}

/// Returns `true` if any entry in `permissions` grants `wanted`.
pub fn is_permitted(permissions: &[RolePermission], wanted: u32) -> bool {
    permissions.iter().any(|rp| rp.permissions & wanted != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission;

    #[test]
    fn permission_check() {
        let role = NodeId::numeric(0, 15680);
        let perms = vec![RolePermission::new(role, permission::BROWSE | permission::READ)];
        assert!(is_permitted(&perms, permission::BROWSE));
        assert!(is_permitted(&perms, permission::READ));
        assert!(!is_permitted(&perms, permission::WRITE));
        assert!(!is_permitted(&[], permission::BROWSE));
    }
}
