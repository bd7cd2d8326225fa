//! The node model.
//!
//! Nodes are kept in an owning arena keyed by [`NodeId`]; a [`Node`] is a
//! cheap-to-clone handle over one of the eight class variants. References
//! between nodes hold ids, never pointers; the ownership tree
//! (`ObjectNode::children`) is the only strong parent/child relation.

use std::sync::Arc;

use lattice_ua::{
    attribute_id, is_permitted, permission, LocalizedText, NodeClass, NodeId, QualifiedName,
    Reference, RolePermission,
};
use parking_lot::RwLock;

use crate::object_node::ObjectNode;
use crate::variable_node::VariableNode;

// =============================================================================
// NodeBase
// =============================================================================

/// The attribute block every node carries.
#[derive(Debug)]
pub struct NodeBase {
    node_id: RwLock<NodeId>,
    browse_name: RwLock<QualifiedName>,
    display_name: RwLock<LocalizedText>,
    description: RwLock<LocalizedText>,
    role_permissions: RwLock<Option<Vec<RolePermission>>>,
    access_restrictions: u16,
    references: RwLock<Vec<Reference>>,
}

impl NodeBase {
    /// Creates a node attribute block.
    pub fn new(
        node_id: NodeId,
        browse_name: QualifiedName,
        display_name: LocalizedText,
        description: LocalizedText,
        role_permissions: Option<Vec<RolePermission>>,
        references: Vec<Reference>,
    ) -> Self {
        Self {
            node_id: RwLock::new(node_id),
            browse_name: RwLock::new(browse_name),
            display_name: RwLock::new(display_name),
            description: RwLock::new(description),
            role_permissions: RwLock::new(role_permissions),
            access_restrictions: 0,
            references: RwLock::new(references),
        }
    }

    /// The current node id.
    pub fn node_id(&self) -> NodeId {
        self.node_id.read().clone()
    }

    /// Swaps the node id; the namespace manager keeps the index in step.
    pub(crate) fn set_node_id(&self, id: NodeId) {
        *self.node_id.write() = id;
    }

    /// The browse name.
    pub fn browse_name(&self) -> QualifiedName {
        self.browse_name.read().clone()
    }

    pub(crate) fn set_browse_name_raw(&self, name: &str) {
        self.browse_name.write().name = name.to_string();
    }

    /// The display name.
    pub fn display_name(&self) -> LocalizedText {
        self.display_name.read().clone()
    }

    /// Sets the display name text.
    pub fn set_display_name(&self, text: &str) {
        self.display_name.write().text = text.to_string();
    }

    /// The description.
    pub fn description(&self) -> LocalizedText {
        self.description.read().clone()
    }

    /// Sets the description text.
    pub fn set_description(&self, text: &str) {
        self.description.write().text = text.to_string();
    }

    /// The node's own role permissions; `None` falls back to the server
    /// defaults.
    pub fn role_permissions(&self) -> Option<Vec<RolePermission>> {
        self.role_permissions.read().clone()
    }

    /// Replaces the node's role permissions.
    pub fn set_role_permissions(&self, value: Option<Vec<RolePermission>>) {
        *self.role_permissions.write() = value;
    }

    /// The access restrictions mask.
    pub fn access_restrictions(&self) -> u16 {
        self.access_restrictions
    }

    /// Snapshot of the references.
    pub fn references(&self) -> Vec<Reference> {
        self.references.read().clone()
    }

    /// Replaces the references.
    pub fn set_references(&self, value: Vec<Reference>) {
        *self.references.write() = value;
    }

    /// Appends one reference.
    pub fn add_reference(&self, reference: Reference) {
        self.references.write().push(reference);
    }

    /// Filters the node's permissions down to the entries matching the
    /// user's roles, falling back to `defaults` when the node declares none.
    pub fn user_role_permissions(
        &self,
        user_roles: &[NodeId],
        defaults: &[RolePermission],
    ) -> Vec<RolePermission> {
        let own = self.role_permissions.read();
        let effective: &[RolePermission] = match own.as_deref() {
            Some(rps) => rps,
            None => defaults,
        };
        let mut filtered = Vec::new();
        for role in user_roles {
            for rp in effective {
                if &rp.role_id == role {
                    filtered.push(rp.clone());
                }
            }
        }
        filtered
    }
}

// =============================================================================
// Simple node variants
// =============================================================================

/// A callable method.
pub struct MethodNode {
    /// Common attributes.
    pub base: NodeBase,
    executable: bool,
    call_handler: RwLock<Option<CallMethodHandler>>,
}

impl std::fmt::Debug for MethodNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodNode")
            .field("base", &self.base)
            .field("executable", &self.executable)
            .field("call_handler", &self.call_handler.read().is_some())
            .finish()
    }
}

/// Handler invoked when a method node is called.
pub type CallMethodHandler = Arc<
    dyn Fn(&lattice_ua::service::CallMethodRequest) -> lattice_ua::service::CallMethodResult
        + Send
        + Sync,
>;

impl MethodNode {
    /// Creates a method node.
    pub fn new(base: NodeBase, executable: bool) -> Self {
        Self { base, executable, call_handler: RwLock::new(None) }
    }

    /// The Executable attribute.
    pub fn executable(&self) -> bool {
        self.executable
    }

    /// Executable for the given user: the node must be executable and the
    /// user's effective permissions must include Call.
    pub fn user_executable(&self, user_roles: &[NodeId], defaults: &[RolePermission]) -> bool {
        self.executable
            && is_permitted(
                &self.base.user_role_permissions(user_roles, defaults),
                permission::CALL,
            )
    }

    /// Installs the call handler.
    pub fn set_call_handler(&self, handler: CallMethodHandler) {
        *self.call_handler.write() = Some(handler);
    }

    /// The installed call handler, if any.
    pub fn call_handler(&self) -> Option<CallMethodHandler> {
        self.call_handler.read().clone()
    }
}

/// An object type.
#[derive(Debug)]
pub struct ObjectTypeNode {
    /// Common attributes.
    pub base: NodeBase,
    /// IsAbstract attribute.
    pub is_abstract: bool,
}

/// A variable type.
#[derive(Debug)]
pub struct VariableTypeNode {
    /// Common attributes.
    pub base: NodeBase,
    /// IsAbstract attribute.
    pub is_abstract: bool,
    /// DataType attribute.
    pub data_type: NodeId,
    /// ValueRank attribute.
    pub value_rank: lattice_ua::ValueRank,
    /// ArrayDimensions attribute.
    pub array_dimensions: Vec<u32>,
}

/// A reference type.
#[derive(Debug)]
pub struct ReferenceTypeNode {
    /// Common attributes.
    pub base: NodeBase,
    /// IsAbstract attribute.
    pub is_abstract: bool,
    /// Symmetric attribute.
    pub symmetric: bool,
    /// InverseName attribute.
    pub inverse_name: LocalizedText,
}

/// A data type.
#[derive(Debug)]
pub struct DataTypeNode {
    /// Common attributes.
    pub base: NodeBase,
    /// IsAbstract attribute.
    pub is_abstract: bool,
    /// The DataTypeDefinition attribute, when the type declares one.
    pub data_type_definition: Option<lattice_ua::ExtensionObject>,
}

/// A view over the address space.
#[derive(Debug)]
pub struct ViewNode {
    /// Common attributes.
    pub base: NodeBase,
    /// ContainsNoLoops attribute.
    pub contains_no_loops: bool,
    /// EventNotifier attribute.
    pub event_notifier: u8,
}

// =============================================================================
// Node
// =============================================================================

/// A handle to a node of any class.
#[derive(Debug, Clone)]
pub enum Node {
    /// Object node.
    Object(Arc<ObjectNode>),
    /// Variable node.
    Variable(Arc<VariableNode>),
    /// Method node.
    Method(Arc<MethodNode>),
    /// Object type node.
    ObjectType(Arc<ObjectTypeNode>),
    /// Variable type node.
    VariableType(Arc<VariableTypeNode>),
    /// Reference type node.
    ReferenceType(Arc<ReferenceTypeNode>),
    /// Data type node.
    DataType(Arc<DataTypeNode>),
    /// View node.
    View(Arc<ViewNode>),
}

impl Node {
    /// The node's attribute block.
    pub fn base(&self) -> &NodeBase {
        match self {
            Node::Object(n) => &n.base,
            Node::Variable(n) => &n.base,
            Node::Method(n) => &n.base,
            Node::ObjectType(n) => &n.base,
            Node::VariableType(n) => &n.base,
            Node::ReferenceType(n) => &n.base,
            Node::DataType(n) => &n.base,
            Node::View(n) => &n.base,
        }
    }

    /// The node id.
    pub fn node_id(&self) -> NodeId {
        self.base().node_id()
    }

    /// The node class.
    pub fn node_class(&self) -> NodeClass {
        match self {
            Node::Object(_) => NodeClass::Object,
            Node::Variable(_) => NodeClass::Variable,
            Node::Method(_) => NodeClass::Method,
            Node::ObjectType(_) => NodeClass::ObjectType,
            Node::VariableType(_) => NodeClass::VariableType,
            Node::ReferenceType(_) => NodeClass::ReferenceType,
            Node::DataType(_) => NodeClass::DataType,
            Node::View(_) => NodeClass::View,
        }
    }

    /// The browse name.
    pub fn browse_name(&self) -> QualifiedName {
        self.base().browse_name()
    }

    /// The display name.
    pub fn display_name(&self) -> LocalizedText {
        self.base().display_name()
    }

    /// Snapshot of the references.
    pub fn references(&self) -> Vec<Reference> {
        self.base().references()
    }

    /// The user's effective role permissions on this node.
    pub fn user_role_permissions(
        &self,
        user_roles: &[NodeId],
        defaults: &[RolePermission],
    ) -> Vec<RolePermission> {
        self.base().user_role_permissions(user_roles, defaults)
    }

    /// Borrows the object payload, if this is an object node.
    pub fn as_object(&self) -> Option<&Arc<ObjectNode>> {
        match self {
            Node::Object(n) => Some(n),
            _ => None,
        }
    }

    /// Borrows the variable payload, if this is a variable node.
    pub fn as_variable(&self) -> Option<&Arc<VariableNode>> {
        match self {
            Node::Variable(n) => Some(n),
            _ => None,
        }
    }

    /// Borrows the method payload, if this is a method node.
    pub fn as_method(&self) -> Option<&Arc<MethodNode>> {
        match self {
            Node::Method(n) => Some(n),
            _ => None,
        }
    }

    /// Returns `true` when `attribute_id` is defined for this node class.
    pub fn is_attribute_id_valid(&self, attribute: u32) -> bool {
        use attribute_id::*;
        let common = matches!(
            attribute,
            NODE_ID
                | NODE_CLASS
                | BROWSE_NAME
                | DISPLAY_NAME
                | DESCRIPTION
                | ROLE_PERMISSIONS
                | USER_ROLE_PERMISSIONS
        );
        if common {
            return true;
        }
        match self {
            Node::Object(_) => matches!(attribute, EVENT_NOTIFIER),
            Node::Variable(_) => matches!(
                attribute,
                VALUE
                    | DATA_TYPE
                    | VALUE_RANK
                    | ARRAY_DIMENSIONS
                    | ACCESS_LEVEL
                    | USER_ACCESS_LEVEL
                    | MINIMUM_SAMPLING_INTERVAL
                    | HISTORIZING
            ),
            Node::Method(_) => matches!(attribute, EXECUTABLE | USER_EXECUTABLE),
            Node::ObjectType(_) => matches!(attribute, IS_ABSTRACT),
            Node::VariableType(_) => {
                matches!(attribute, IS_ABSTRACT | DATA_TYPE | VALUE_RANK | ARRAY_DIMENSIONS)
            }
            Node::ReferenceType(_) => matches!(attribute, IS_ABSTRACT | SYMMETRIC | INVERSE_NAME),
            Node::DataType(_) => matches!(attribute, IS_ABSTRACT | DATA_TYPE_DEFINITION),
            Node::View(_) => matches!(attribute, CONTAINS_NO_LOOPS | EVENT_NOTIFIER),
        }
    }
}

impl From<Arc<ObjectNode>> for Node {
    fn from(n: Arc<ObjectNode>) -> Self {
        Node::Object(n)
    }
}

impl From<Arc<VariableNode>> for Node {
    fn from(n: Arc<VariableNode>) -> Self {
        Node::Variable(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_ua::ids::role_id;

    fn base(name: &str) -> NodeBase {
        NodeBase::new(
            NodeId::string(0, name),
            QualifiedName::new(0, name),
            LocalizedText::en(name),
            LocalizedText::en(""),
            None,
            Vec::new(),
        )
    }

    #[test]
    fn user_role_permissions_fall_back_to_defaults() {
        let b = base("N");
        let defaults = vec![RolePermission::new(role_id::OPERATOR, permission::BROWSE)];
        let granted = b.user_role_permissions(&[role_id::OPERATOR], &defaults);
        assert_eq!(granted.len(), 1);

        b.set_role_permissions(Some(vec![RolePermission::new(
            role_id::ENGINEER,
            permission::BROWSE | permission::WRITE,
        )]));
        assert!(b.user_role_permissions(&[role_id::OPERATOR], &defaults).is_empty());
        assert_eq!(b.user_role_permissions(&[role_id::ENGINEER], &defaults).len(), 1);
    }

    #[test]
    fn method_attribute_validity() {
        let node = Node::Method(Arc::new(MethodNode::new(base("M"), true)));
        assert!(node.is_attribute_id_valid(attribute_id::EXECUTABLE));
        assert!(node.is_attribute_id_valid(attribute_id::BROWSE_NAME));
        assert!(!node.is_attribute_id_valid(attribute_id::VALUE));
    }

    #[test]
    fn user_executable_needs_call_permission() {
        let method = MethodNode::new(base("M"), true);
        let defaults = vec![RolePermission::new(role_id::OPERATOR, permission::BROWSE)];
        assert!(!method.user_executable(&[role_id::OPERATOR], &defaults));
        let with_call =
            vec![RolePermission::new(role_id::OPERATOR, permission::BROWSE | permission::CALL)];
        assert!(method.user_executable(&[role_id::OPERATOR], &with_call));
    }
}
