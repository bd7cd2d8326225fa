//! Builders for test nodes.

use std::sync::Arc;

use lattice_project::{Node, NodeBase, VariableNode};
use lattice_ua::ids::data_type_id;
use lattice_ua::{
    access_level, DataValue, LocalizedText, NodeId, QualifiedName, RolePermission, ValueRank,
    Variant,
};

/// Builds variable nodes with sensible defaults: a readable, writable
/// scalar Double.
pub struct VariableBuilder {
    name: String,
    value: Variant,
    data_type: NodeId,
    value_rank: ValueRank,
    access_level: u8,
    role_permissions: Option<Vec<RolePermission>>,
}

impl VariableBuilder {
    /// Starts a builder for a variable named `name`; the node id is the
    /// name itself.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Variant::from(0.0f64),
            data_type: data_type_id::DOUBLE,
            value_rank: ValueRank::Scalar,
            access_level: access_level::CURRENT_READ | access_level::CURRENT_WRITE,
            role_permissions: None,
        }
    }

    /// Sets the initial value.
    pub fn value(mut self, value: impl Into<Variant>) -> Self {
        self.value = value.into();
        self
    }

    /// Sets the data type.
    pub fn data_type(mut self, data_type: NodeId) -> Self {
        self.data_type = data_type;
        self
    }

    /// Sets the value rank.
    pub fn value_rank(mut self, rank: ValueRank) -> Self {
        self.value_rank = rank;
        self
    }

    /// Sets the access level mask.
    pub fn access_level(mut self, level: u8) -> Self {
        self.access_level = level;
        self
    }

    /// Sets node-local role permissions.
    pub fn role_permissions(mut self, permissions: Vec<RolePermission>) -> Self {
        self.role_permissions = Some(permissions);
        self
    }

    /// Builds the node handle.
    pub fn build(self) -> (NodeId, Node) {
        let node_id = NodeId::string(0, self.name.clone());
        let variable = VariableNode::new(
            NodeBase::new(
                node_id.clone(),
                QualifiedName::new(0, self.name.clone()),
                LocalizedText::en(self.name.clone()),
                LocalizedText::en(""),
                self.role_permissions,
                Vec::new(),
            ),
            DataValue::now(self.value),
            self.data_type,
            self.value_rank,
            Vec::new(),
            self.access_level,
            -1.0,
            false,
        );
        (node_id, Node::Variable(Arc::new(variable)))
    }
}
