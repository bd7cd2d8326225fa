//! Variable nodes.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use lattice_ua::ids::{reference_type_id, variable_type_id};
use lattice_ua::{
    access_level, permission, DataValue, LocalizedText, NodeId, QualifiedName, Reference,
    RolePermission, StatusCode, ValueRank,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::node::NodeBase;
use crate::object_node::ObjectNode;

/// Handler consulted instead of the stored value on reads.
pub type ReadValueHandler =
    Arc<dyn Fn(&lattice_ua::service::ReadValueId) -> DataValue + Send + Sync>;

/// Handler consulted instead of the range splice on writes. Returns the
/// value to store and the status to report; the value is stored only on
/// Good.
pub type WriteValueHandler =
    Arc<dyn Fn(&lattice_ua::service::WriteValue) -> (DataValue, StatusCode) + Send + Sync>;

/// Distinguishes plugin-declared properties from built-in ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// Declared by the owning node's plugin; changes refresh plugin props.
    Plugin,
    /// A built-in or synthetic property.
    #[default]
    Default,
}

impl PropertyType {
    /// Returns `true` for plugin-declared properties.
    #[inline]
    pub const fn is_plugin_property(self) -> bool {
        matches!(self, PropertyType::Plugin)
    }
}

/// A variable node: a value with type metadata and access control.
pub struct VariableNode {
    /// Common attributes.
    pub base: NodeBase,
    value: RwLock<DataValue>,
    data_type: RwLock<NodeId>,
    value_rank: ValueRank,
    array_dimensions: Vec<u32>,
    access_level: AtomicU8,
    minimum_sampling_interval: f64,
    historizing: AtomicBool,
    property_type: PropertyType,
    owner: RwLock<Weak<ObjectNode>>,
    read_handler: RwLock<Option<ReadValueHandler>>,
    write_handler: RwLock<Option<WriteValueHandler>>,
}

impl std::fmt::Debug for VariableNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableNode")
            .field("base", &self.base)
            .field("value", &self.value)
            .field("data_type", &self.data_type)
            .field("value_rank", &self.value_rank)
            .field("array_dimensions", &self.array_dimensions)
            .field("access_level", &self.access_level)
            .field("minimum_sampling_interval", &self.minimum_sampling_interval)
            .field("historizing", &self.historizing)
            .field("property_type", &self.property_type)
            .field("read_handler", &self.read_handler.read().is_some())
            .field("write_handler", &self.write_handler.read().is_some())
            .finish()
    }
}

impl VariableNode {
    /// Creates a variable node.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        base: NodeBase,
        value: DataValue,
        data_type: NodeId,
        value_rank: ValueRank,
        array_dimensions: Vec<u32>,
        access_level: u8,
        minimum_sampling_interval: f64,
        historizing: bool,
    ) -> Self {
        Self {
            base,
            value: RwLock::new(value),
            data_type: RwLock::new(data_type),
            value_rank,
            array_dimensions,
            access_level: AtomicU8::new(access_level),
            minimum_sampling_interval,
            historizing: AtomicBool::new(historizing),
            property_type: PropertyType::Default,
            owner: RwLock::new(Weak::new()),
            read_handler: RwLock::new(None),
            write_handler: RwLock::new(None),
        }
    }

    /// Creates a property variable of an object node: scalar, typed
    /// PropertyType, owned by `owner_id`.
    pub fn property(
        owner_id: &NodeId,
        name: &str,
        description: &str,
        value: DataValue,
        data_type: NodeId,
        access_level: u8,
        property_type: PropertyType,
    ) -> Self {
        let owner_path = owner_id.as_string().unwrap_or_default();
        let id = NodeId::string(0, format!("{}.{}", owner_path, name));
        let references = vec![
            Reference::new(
                reference_type_id::HAS_TYPE_DEFINITION,
                false,
                variable_type_id::PROPERTY_TYPE.into(),
            ),
            Reference::inverse(reference_type_id::HAS_PROPERTY, owner_id.clone()),
        ];
        let base = NodeBase::new(
            id,
            QualifiedName::new(0, name),
            LocalizedText::en(name),
            LocalizedText::en(description),
            None,
            references,
        );
        let mut node = Self::new(
            base,
            value,
            data_type,
            ValueRank::Scalar,
            Vec::new(),
            access_level,
            -1.0,
            false,
        );
        node.property_type = property_type;
        node
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> DataValue {
        self.value.read().clone()
    }

    /// Stores a new value, returning `true` when it differed from the
    /// previous one. A changed plugin property refreshes the owner's plugin
    /// props unless the owner is mid-update.
    pub fn set_value(&self, value: DataValue) -> bool {
        let changed = {
            let mut current = self.value.write();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };

        if changed && self.property_type.is_plugin_property() {
            if let Some(owner) = self.owner.read().upgrade() {
                if !owner.is_updating() {
                    owner.refresh_plugin_props();
                }
            }
        }
        changed
    }

    /// The DataType attribute.
    pub fn data_type(&self) -> NodeId {
        self.data_type.read().clone()
    }

    /// Replaces the DataType attribute.
    pub fn set_data_type(&self, id: NodeId) {
        *self.data_type.write() = id;
    }

    /// The ValueRank attribute.
    pub fn value_rank(&self) -> ValueRank {
        self.value_rank
    }

    /// The ArrayDimensions attribute.
    pub fn array_dimensions(&self) -> &[u32] {
        &self.array_dimensions
    }

    /// The AccessLevel attribute.
    pub fn access_level(&self) -> u8 {
        self.access_level.load(Ordering::Relaxed)
    }

    /// Replaces the AccessLevel attribute.
    pub fn set_access_level(&self, level: u8) {
        self.access_level.store(level, Ordering::Relaxed);
    }

    /// The AccessLevel attribute reduced by the user's role permissions:
    /// missing Read/Write/ReadHistory permissions clear the corresponding
    /// bits.
    pub fn user_access_level(&self, user_roles: &[NodeId], defaults: &[RolePermission]) -> u8 {
        let mut level = self.access_level();
        let granted = self.base.user_role_permissions(user_roles, defaults);
        let mut read = false;
        let mut write = false;
        let mut history = false;
        for rp in &granted {
            read |= rp.permissions & permission::READ != 0;
            write |= rp.permissions & permission::WRITE != 0;
            history |= rp.permissions & permission::READ_HISTORY != 0;
        }
        if !read {
            level &= !access_level::CURRENT_READ;
        }
        if !write {
            level &= !access_level::CURRENT_WRITE;
        }
        if !history {
            level &= !access_level::HISTORY_READ;
        }
        level
    }

    /// The MinimumSamplingInterval attribute in milliseconds.
    pub fn minimum_sampling_interval(&self) -> f64 {
        self.minimum_sampling_interval
    }

    /// The Historizing attribute.
    pub fn historizing(&self) -> bool {
        self.historizing.load(Ordering::Relaxed)
    }

    /// Toggles the Historizing attribute.
    pub fn set_historizing(&self, value: bool) {
        self.historizing.store(value, Ordering::Relaxed);
    }

    /// How this property was declared.
    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    /// The owning object node, when still alive.
    pub fn owner(&self) -> Option<Arc<ObjectNode>> {
        self.owner.read().upgrade()
    }

    /// Binds the owning object node.
    pub fn set_owner(&self, owner: &Weak<ObjectNode>) {
        *self.owner.write() = owner.clone();
    }

    /// Installs a read handler.
    pub fn set_read_handler(&self, handler: ReadValueHandler) {
        *self.read_handler.write() = Some(handler);
    }

    /// The installed read handler, if any.
    pub fn read_handler(&self) -> Option<ReadValueHandler> {
        self.read_handler.read().clone()
    }

    /// Installs a write handler.
    pub fn set_write_handler(&self, handler: WriteValueHandler) {
        *self.write_handler.write() = Some(handler);
    }

    /// The installed write handler, if any.
    pub fn write_handler(&self) -> Option<WriteValueHandler> {
        self.write_handler.read().clone()
    }

    /// Rewrites the node id, replacing `old_prefix` with `new_prefix`.
    pub(crate) fn replace_node_id_prefix(&self, old_prefix: &str, new_prefix: &str) -> NodeId {
        let current = self.base.node_id();
        let path = current.as_string().unwrap_or_default();
        let new_id =
            NodeId::string(0, format!("{}{}", new_prefix, &path[old_prefix.len().min(path.len())..]));
        self.base.set_node_id(new_id.clone());
        new_id
    }

    /// Validates the stored value against the owner's plugin declaration.
    pub fn validate(&self) -> Option<crate::error::ProjectError> {
        let owner = self.owner()?;
        let name = self.base.browse_name().name;
        let mut fm = crate::fields::FieldMap::new();
        let loose = match self.value().value {
            lattice_ua::Variant::Scalar(s) => scalar_to_loose_json(&s),
            lattice_ua::Variant::Array(_) => return None,
        };
        fm.insert(name.clone(), loose);
        let (errors, _) = owner.plugin().check_update_valid(&owner, &fm);
        errors.get(&name).cloned()
    }
}

pub(crate) fn scalar_to_loose_json(scalar: &lattice_ua::Scalar) -> serde_json::Value {
    use lattice_ua::Scalar;
    match scalar {
        Scalar::Null => serde_json::Value::Null,
        Scalar::Boolean(v) => serde_json::json!(v),
        Scalar::SByte(v) => serde_json::json!(v),
        Scalar::Byte(v) => serde_json::json!(v),
        Scalar::Int16(v) => serde_json::json!(v),
        Scalar::UInt16(v) => serde_json::json!(v),
        Scalar::Int32(v) => serde_json::json!(v),
        Scalar::UInt32(v) => serde_json::json!(v),
        Scalar::Int64(v) => serde_json::json!(v),
        Scalar::UInt64(v) => serde_json::json!(v),
        Scalar::Float(v) => serde_json::json!(v),
        Scalar::Double(v) => serde_json::json!(v),
        Scalar::String(v) => serde_json::json!(v),
        other => serde_json::json!(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_ua::ids::{data_type_id, role_id};
    use lattice_ua::Variant;

    fn variable(access: u8) -> VariableNode {
        VariableNode::new(
            NodeBase::new(
                NodeId::string(0, "Tag1"),
                QualifiedName::new(0, "Tag1"),
                LocalizedText::en("Tag1"),
                LocalizedText::en(""),
                None,
                Vec::new(),
            ),
            DataValue::now(Variant::from(1.0f64)),
            data_type_id::DOUBLE,
            ValueRank::Scalar,
            Vec::new(),
            access,
            -1.0,
            false,
        )
    }

    #[test]
    fn set_value_reports_change() {
        let node = variable(access_level::CURRENT_READ);
        let first = node.value();
        assert!(!node.set_value(first.clone()));
        let mut next = first;
        next.value = Variant::from(2.0f64);
        assert!(node.set_value(next));
    }

    #[test]
    fn user_access_level_masks_missing_permissions() {
        let node = variable(access_level::CURRENT_READ | access_level::CURRENT_WRITE);
        let read_only =
            vec![RolePermission::new(role_id::OPERATOR, permission::BROWSE | permission::READ)];
        let level = node.user_access_level(&[role_id::OPERATOR], &read_only);
        assert_eq!(level & access_level::CURRENT_READ, access_level::CURRENT_READ);
        assert_eq!(level & access_level::CURRENT_WRITE, 0);

        // no roles at all: everything masked
        assert_eq!(node.user_access_level(&[], &read_only), 0);
    }

    #[test]
    fn historizing_toggle() {
        let node = variable(access_level::CURRENT_READ);
        assert!(!node.historizing());
        node.set_historizing(true);
        assert!(node.historizing());
    }

    #[test]
    fn property_node_id_joins_owner_path() {
        let prop = VariableNode::property(
            &NodeId::string(0, "Root.Connectivity"),
            "_InternalId",
            "InternalId",
            DataValue::now(Variant::from(uuid::Uuid::nil())),
            data_type_id::GUID,
            access_level::CURRENT_READ,
            PropertyType::Default,
        );
        assert_eq!(prop.base.node_id().as_string().unwrap(), "Root.Connectivity._InternalId");
    }
}
