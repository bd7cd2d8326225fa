//! Object nodes: the ownership tree of the project.
//!
//! An object node exclusively owns its ordered children and its property
//! variables. Its node id is the `.`-joined browse path from the root, so
//! renaming a node rewrites the id of the whole subtree; that happens under
//! the project lock through [`ObjectNode::set_browse_name`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use lattice_ua::ids::{data_type_id, object_id, object_type_id, reference_type_id};
use lattice_ua::{
    access_level, DataValue, LocalizedText, NodeId, QualifiedName, Reference, Variant,
};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{FieldErrors, ProjectError, ProjectResult};
use crate::fields::FieldMap;
use crate::node::{Node, NodeBase};
use crate::node_type::NodeType;
use crate::plugin::{Plugin, PluginProps};
use crate::project::ProjectContext;
use crate::variable_node::{PropertyType, VariableNode};

/// Name of the synthetic internal-id property.
pub const PROPERTY_INTERNAL_ID: &str = "_InternalId";
/// Name of the synthetic plugin-id property.
pub const PROPERTY_PLUGIN_ID: &str = "_PluginId";
/// Name of the synthetic node-type property.
pub const PROPERTY_NODE_TYPE: &str = "_NodeType";
/// Name of the synthetic entry property.
pub const PROPERTY_ENTRY: &str = "_Entry";
/// Name of the synthetic tag-value property.
pub const PROPERTY_VALUE: &str = "_Value";

/// Pseudo-fields accepted by update/create field maps.
pub const FIELD_BROWSE_NAME: &str = "BrowseName";
/// DisplayName pseudo-field.
pub const FIELD_DISPLAY_NAME: &str = "DisplayName";
/// Description pseudo-field.
pub const FIELD_DESCRIPTION: &str = "Description";

/// Separator joining browse names into node-id paths.
pub const PATH_SEPARATOR: char = '.';

// =============================================================================
// Events
// =============================================================================

/// An event raised by an object node.
#[derive(Debug, Clone)]
pub struct Event {
    /// Id of the event type.
    pub event_type: NodeId,
    /// The node the event originated from.
    pub source_node: NodeId,
    /// Browse name of the source.
    pub source_name: String,
    /// Event message.
    pub message: LocalizedText,
    /// Severity 1..=1000.
    pub severity: u16,
    /// When the event occurred.
    pub time: DateTime<Utc>,
}

/// Receives events from an object node.
pub trait EventListener: Send + Sync {
    /// Called for every event the node raises.
    fn on_event(&self, event: &Event);
}

// =============================================================================
// ObjectNode
// =============================================================================

/// An object node of the project tree.
pub struct ObjectNode {
    /// Common attributes.
    pub base: NodeBase,
    node_type: NodeType,
    plugin: Arc<dyn Plugin>,
    plugin_props: RwLock<Option<Arc<dyn PluginProps>>>,
    event_notifier: u8,
    entry: AtomicBool,
    parent: RwLock<Weak<ObjectNode>>,
    children: RwLock<Vec<Arc<ObjectNode>>>,
    properties: RwLock<HashMap<String, Arc<VariableNode>>>,
    listeners: RwLock<HashMap<u64, Arc<dyn EventListener>>>,
    is_updating: AtomicBool,
}

impl std::fmt::Debug for ObjectNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectNode")
            .field("node_id", &self.base.node_id())
            .field("node_type", &self.node_type)
            .field("entry", &self.entry.load(Ordering::Relaxed))
            .finish()
    }
}

impl ObjectNode {
    /// Builds an object node under `parent` with the mandatory synthetic
    /// properties, wiring parent/child references but not yet attaching it
    /// to the parent's child list.
    pub fn build(
        parent: Option<&Arc<ObjectNode>>,
        browse_name: QualifiedName,
        display_name: LocalizedText,
        description: LocalizedText,
        node_type: NodeType,
        plugin: Arc<dyn Plugin>,
        internal_id: Uuid,
    ) -> Arc<ObjectNode> {
        let path = match parent {
            Some(p) => {
                let parent_path = p.base.node_id().as_string().unwrap_or_default().to_string();
                format!("{}{}{}", parent_path, PATH_SEPARATOR, browse_name.name)
                    .trim_start_matches(PATH_SEPARATOR)
                    .to_string()
            }
            None => browse_name.name.clone(),
        };
        let node_id = NodeId::string(0, path);

        let mut references = Vec::new();
        if let Some(p) = parent {
            references.push(Reference::inverse(reference_type_id::ORGANIZES, p.base.node_id()));
        }
        if node_type.is_root() {
            references
                .push(Reference::inverse(reference_type_id::ORGANIZES, object_id::OBJECTS_FOLDER));
        }
        references.push(Reference::new(
            reference_type_id::HAS_TYPE_DEFINITION,
            false,
            object_type_id::FOLDER_TYPE.into(),
        ));

        let plugin_id = plugin.info().id;
        let node = Arc::new_cyclic(|weak: &Weak<ObjectNode>| {
            let mut properties = HashMap::new();
            let mut references = references.clone();

            let prop_internal = Arc::new(VariableNode::property(
                &node_id,
                PROPERTY_INTERNAL_ID,
                "InternalId",
                DataValue::now(Variant::from(internal_id)),
                data_type_id::GUID,
                access_level::CURRENT_READ,
                PropertyType::Default,
            ));
            prop_internal.set_owner(weak);
            references.push(Reference::forward(
                reference_type_id::HAS_PROPERTY,
                prop_internal.base.node_id(),
            ));
            properties.insert(PROPERTY_INTERNAL_ID.to_string(), prop_internal);

            let prop_plugin = Arc::new(VariableNode::property(
                &node_id,
                PROPERTY_PLUGIN_ID,
                "PluginId",
                DataValue::now(Variant::from(plugin_id)),
                data_type_id::INT16,
                access_level::CURRENT_READ,
                PropertyType::Default,
            ));
            prop_plugin.set_owner(weak);
            references.push(Reference::forward(
                reference_type_id::HAS_PROPERTY,
                prop_plugin.base.node_id(),
            ));
            properties.insert(PROPERTY_PLUGIN_ID.to_string(), prop_plugin);

            let prop_node_type = Arc::new(VariableNode::property(
                &node_id,
                PROPERTY_NODE_TYPE,
                "NodeType",
                DataValue::now(Variant::from(node_type.as_i64())),
                data_type_id::INT64,
                access_level::CURRENT_READ,
                PropertyType::Default,
            ));
            prop_node_type.set_owner(weak);
            references.push(Reference::forward(
                reference_type_id::HAS_PROPERTY,
                prop_node_type.base.node_id(),
            ));
            properties.insert(PROPERTY_NODE_TYPE.to_string(), prop_node_type);

            let prop_entry = Arc::new(VariableNode::property(
                &node_id,
                PROPERTY_ENTRY,
                "Entry",
                DataValue::now(Variant::from(false)),
                data_type_id::BOOLEAN,
                access_level::CURRENT_READ,
                PropertyType::Default,
            ));
            prop_entry.set_owner(weak);
            references.push(Reference::forward(
                reference_type_id::HAS_PROPERTY,
                prop_entry.base.node_id(),
            ));
            properties.insert(PROPERTY_ENTRY.to_string(), prop_entry);

            if node_type.is_tag() {
                let prop_value = Arc::new(VariableNode::property(
                    &node_id,
                    PROPERTY_VALUE,
                    "Value",
                    DataValue::now(Variant::null()),
                    data_type_id::STRING,
                    access_level::CURRENT_READ,
                    PropertyType::Default,
                ));
                prop_value.set_owner(weak);
                references.push(Reference::forward(
                    reference_type_id::HAS_PROPERTY,
                    prop_value.base.node_id(),
                ));
                properties.insert(PROPERTY_VALUE.to_string(), prop_value);
            }

            ObjectNode {
                base: NodeBase::new(
                    node_id.clone(),
                    browse_name,
                    display_name,
                    description,
                    None,
                    references,
                ),
                node_type,
                plugin,
                plugin_props: RwLock::new(None),
                event_notifier: 0,
                entry: AtomicBool::new(false),
                parent: RwLock::new(parent.map(Arc::downgrade).unwrap_or_default()),
                children: RwLock::new(Vec::new()),
                properties: RwLock::new(properties),
                listeners: RwLock::new(HashMap::new()),
                is_updating: AtomicBool::new(false),
            }
        });

        let entry = node.plugin.is_plugin_entry(&node);
        node.entry.store(entry, Ordering::Relaxed);
        node.must_get_property(PROPERTY_ENTRY)
            .set_value(DataValue::now(Variant::from(entry)));
        node
    }

    /// Builds an object node from a loose field map: `BrowseName`,
    /// `DisplayName` and `Description` come from the map, every remaining
    /// plugin-declared field becomes a property variable. Field failures are
    /// collected instead of aborting.
    pub fn build_with_fields(
        parent: Option<&Arc<ObjectNode>>,
        node_type: NodeType,
        plugin: Arc<dyn Plugin>,
        internal_id: Uuid,
        mut fields: FieldMap,
    ) -> (Arc<ObjectNode>, FieldErrors) {
        fields.normalize_field_names();
        let mut errors = FieldErrors::new();

        let name = fields.get_string(FIELD_BROWSE_NAME).unwrap_or_else(|e| {
            errors.insert(FIELD_BROWSE_NAME.to_string(), e);
            String::new()
        });
        let display_name = fields.get_string(FIELD_DISPLAY_NAME).unwrap_or_else(|e| {
            errors.insert(FIELD_DISPLAY_NAME.to_string(), e);
            String::new()
        });
        let description = fields.get_string(FIELD_DESCRIPTION).unwrap_or_default();

        let node = ObjectNode::build(
            parent,
            QualifiedName::new(0, name),
            LocalizedText::en(display_name),
            LocalizedText::en(description),
            node_type,
            plugin,
            internal_id,
        );
        let node_path = node.base.node_id();

        fields.retain_plugin_fields(&node.plugin.config(), node_type);
        for (field_name, raw) in fields.iter() {
            if node.get_property(field_name).is_some() {
                continue;
            }
            match node.check_property_value(field_name, raw) {
                Err(e) => {
                    errors.insert(field_name.clone(), e);
                }
                Ok(valid) => {
                    let config = node.plugin.config();
                    let def = match config.field_def(field_name, node_type) {
                        Some(def) => def,
                        None => continue,
                    };
                    let prop = Arc::new(VariableNode::property(
                        &node_path,
                        &def.name,
                        &def.description,
                        DataValue::now(Variant::Scalar(valid)),
                        def.data_type_id(),
                        access_level::CURRENT_READ
                            | access_level::CURRENT_WRITE
                            | access_level::HISTORY_READ,
                        PropertyType::Plugin,
                    ));
                    prop.set_owner(&Arc::downgrade(&node));
                    node.base.add_reference(Reference::forward(
                        reference_type_id::HAS_PROPERTY,
                        prop.base.node_id(),
                    ));
                    node.properties.write().insert(def.name.clone(), prop);
                }
            }
        }

        (node, errors)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The project node type.
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// The bound plugin.
    pub fn plugin(&self) -> Arc<dyn Plugin> {
        self.plugin.clone()
    }

    /// The EventNotifier attribute.
    pub fn event_notifier(&self) -> u8 {
        self.event_notifier
    }

    /// Returns `true` when the plugin designates this node a lifecycle
    /// entry.
    pub fn is_entry(&self) -> bool {
        self.entry.load(Ordering::Relaxed)
    }

    /// The owning parent, when still alive.
    pub fn parent(&self) -> Option<Arc<ObjectNode>> {
        self.parent.read().upgrade()
    }

    /// Snapshot of the ordered children.
    pub fn children(&self) -> Vec<Arc<ObjectNode>> {
        self.children.read().clone()
    }

    /// Snapshot of the property map.
    pub fn properties(&self) -> Vec<Arc<VariableNode>> {
        self.properties.read().values().cloned().collect()
    }

    /// Looks up a property by name.
    pub fn get_property(&self, name: &str) -> Option<Arc<VariableNode>> {
        self.properties.read().get(name).cloned()
    }

    /// Looks up a mandatory property.
    ///
    /// # Panics
    ///
    /// Panics when the property is missing; the synthetic properties are a
    /// construction invariant.
    pub fn must_get_property(&self, name: &str) -> Arc<VariableNode> {
        match self.get_property(name) {
            Some(prop) => prop,
            None => panic!(
                "property '{}' not found on node '{}' ({})",
                name,
                self.base.browse_name().name,
                self.base.node_id()
            ),
        }
    }

    /// The node's internal id from the `_InternalId` property.
    pub fn internal_id(&self) -> Uuid {
        match self.must_get_property(PROPERTY_INTERNAL_ID).value().value {
            Variant::Scalar(lattice_ua::Scalar::Guid(id)) => id,
            _ => panic!("_InternalId property of '{}' is not a guid", self.base.node_id()),
        }
    }

    // =========================================================================
    // Plugin props
    // =========================================================================

    /// Lazily creates and binds the plugin props of this node.
    pub fn assign_plugin_props(self: &Arc<Self>) {
        let mut slot = self.plugin_props.write();
        if slot.is_none() {
            if let Some(props) = self.plugin.plugin_props(self) {
                props.assign_node(self);
                *slot = Some(props);
            }
        }
    }

    /// Recomputes the plugin props after a property change.
    pub fn refresh_plugin_props(&self) {
        if let Some(props) = self.plugin_props.read().as_ref() {
            props.update_props();
        }
    }

    /// The bound plugin props, if assigned.
    pub fn plugin_props_handle(&self) -> Option<Arc<dyn PluginProps>> {
        self.plugin_props.read().clone()
    }

    /// Returns `true` while an [`ObjectNode::update`] is coalescing property
    /// changes.
    pub fn is_updating(&self) -> bool {
        self.is_updating.load(Ordering::Relaxed)
    }

    /// Marks the start of a coalesced update.
    pub fn begin_update(&self) {
        self.is_updating.store(true, Ordering::Relaxed);
    }

    /// Marks the end of a coalesced update.
    pub fn end_update(&self) {
        self.is_updating.store(false, Ordering::Relaxed);
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Registers an event listener under `key`.
    pub fn add_event_listener(&self, key: u64, listener: Arc<dyn EventListener>) {
        self.listeners.write().insert(key, listener);
    }

    /// Removes the event listener registered under `key`.
    pub fn remove_event_listener(&self, key: u64) {
        self.listeners.write().remove(&key);
    }

    /// Raises an event to every registered listener.
    pub fn on_event(&self, event: &Event) {
        let listeners: Vec<_> = self.listeners.read().values().cloned().collect();
        for listener in listeners {
            listener.on_event(event);
        }
    }

    // =========================================================================
    // Tree operations
    // =========================================================================

    /// Returns `true` when the plugin accepts a child of `node_type` here.
    pub fn can_add_child(&self, node_type: NodeType) -> bool {
        self.plugin.can_add_node_type(self, node_type)
    }

    /// Appends `child`, wiring its parent link and the Organizes reference
    /// pair, and notifying the plugin.
    pub fn add_child(self: &Arc<Self>, child: &Arc<ObjectNode>) -> ProjectResult<()> {
        if !self.can_add_child(child.node_type()) {
            return Err(ProjectError::NodeTypeNotAccepted);
        }
        *child.parent.write() = Arc::downgrade(self);
        self.children.write().push(child.clone());
        self.base
            .add_reference(Reference::forward(reference_type_id::ORGANIZES, child.base.node_id()));
        self.plugin.add_node(self, child);
        Ok(())
    }

    /// Inserts `child` at `index`.
    pub fn insert_child(self: &Arc<Self>, index: usize, child: &Arc<ObjectNode>) -> ProjectResult<()> {
        if !self.can_add_child(child.node_type()) {
            return Err(ProjectError::NodeTypeNotAccepted);
        }
        let mut children = self.children.write();
        if index > children.len() {
            return Err(ProjectError::InvalidIndex);
        }
        *child.parent.write() = Arc::downgrade(self);
        children.insert(index, child.clone());
        drop(children);
        self.base
            .add_reference(Reference::forward(reference_type_id::ORGANIZES, child.base.node_id()));
        self.plugin.add_node(self, child);
        Ok(())
    }

    /// Moves `node` in front of `target` in the child order.
    pub fn move_before(&self, node: &Arc<ObjectNode>, target: &Arc<ObjectNode>) -> ProjectResult<()> {
        let mut children = self.children.write();
        let index = children
            .iter()
            .position(|c| Arc::ptr_eq(c, node))
            .ok_or(ProjectError::InvalidIndex)?;
        let mut target_index = children
            .iter()
            .position(|c| Arc::ptr_eq(c, target))
            .ok_or(ProjectError::InvalidIndex)?;
        if index != target_index {
            let moved = children.remove(index);
            if index < target_index {
                target_index -= 1;
            }
            children.insert(target_index, moved);
        }
        Ok(())
    }

    /// Moves `node` to the end of the child order.
    pub fn move_to_last(&self, node: &Arc<ObjectNode>) -> ProjectResult<()> {
        let mut children = self.children.write();
        let index = children
            .iter()
            .position(|c| Arc::ptr_eq(c, node))
            .ok_or(ProjectError::InvalidIndex)?;
        let moved = children.remove(index);
        children.push(moved);
        Ok(())
    }

    /// Removes `child`, dropping the Organizes reference and notifying the
    /// plugin.
    pub fn remove_child(self: &Arc<Self>, child: &Arc<ObjectNode>) -> ProjectResult<()> {
        let mut children = self.children.write();
        let index = children
            .iter()
            .position(|c| Arc::ptr_eq(c, child))
            .ok_or(ProjectError::InvalidIndex)?;
        children.remove(index);
        drop(children);
        let child_id = child.base.node_id();
        let mut references = self.base.references();
        references.retain(|r| {
            !(r.reference_type_id == reference_type_id::ORGANIZES
                && !r.is_inverse
                && r.target_id.node_id == child_id)
        });
        self.base.set_references(references);
        self.plugin.remove_node(self, child);
        Ok(())
    }

    /// Adds a property variable after validating its value.
    pub fn add_property(self: &Arc<Self>, prop: Arc<VariableNode>) -> ProjectResult<()> {
        let name = prop.base.browse_name().name;
        if self.properties.read().contains_key(&name) {
            return Err(ProjectError::FieldExisted);
        }
        if name != PROPERTY_VALUE {
            let loose = match &prop.value().value {
                Variant::Scalar(s) => crate::variable_node::scalar_to_loose_json(s),
                Variant::Array(_) => return Err(ProjectError::InvalidField),
            };
            self.check_property_value(&name, &loose)?;
        }
        prop.set_owner(&Arc::downgrade(self));
        self.base
            .add_reference(Reference::forward(reference_type_id::HAS_PROPERTY, prop.base.node_id()));
        self.properties.write().insert(name, prop);
        Ok(())
    }

    // =========================================================================
    // Paths and lookup
    // =========================================================================

    /// The browse path of this node relative to the root node.
    pub fn full_path(&self) -> String {
        let name = self.base.browse_name().name;
        match self.parent() {
            Some(parent) => {
                if parent.node_type().is_root() {
                    name
                } else {
                    format!("{}{}{}", parent.full_path(), PATH_SEPARATOR, name)
                }
            }
            None => format!("{}{}", PATH_SEPARATOR, name),
        }
    }

    /// Resolves a `.`-separated path of browse names below this node.
    pub fn get_child_by_path(&self, path: &str) -> Option<Arc<ObjectNode>> {
        if path.is_empty() {
            return None;
        }
        let (head, rest) = match path.split_once(PATH_SEPARATOR) {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let child = self
            .children
            .read()
            .iter()
            .find(|c| c.base.browse_name().name == head)
            .cloned()?;
        match rest {
            Some(rest) => child.get_child_by_path(rest),
            None => Some(child),
        }
    }

    /// The first direct child matching `predicate`.
    pub fn first(&self, predicate: impl Fn(&Arc<ObjectNode>) -> bool) -> Option<Arc<ObjectNode>> {
        self.children.read().iter().find(|c| predicate(c)).cloned()
    }

    /// The closest ancestor matching `predicate`.
    pub fn ancestor_first(
        &self,
        predicate: impl Fn(&Arc<ObjectNode>) -> bool,
    ) -> Option<Arc<ObjectNode>> {
        let parent = self.parent()?;
        if predicate(&parent) {
            return Some(parent);
        }
        parent.ancestor_first(predicate)
    }

    /// Visits the direct children.
    pub fn for_each(&self, action: &mut dyn FnMut(&Arc<ObjectNode>)) {
        for child in self.children.read().iter() {
            action(child);
        }
    }

    /// Visits this node, then the whole subtree depth-first.
    pub fn for_each_self_depth(self: &Arc<Self>, action: &mut dyn FnMut(&Arc<ObjectNode>)) {
        action(self);
        for child in self.children() {
            child.for_each_self_depth(action);
        }
    }

    /// Visits the whole subtree depth-first, excluding this node.
    pub fn for_each_depth(&self, action: &mut dyn FnMut(&Arc<ObjectNode>)) {
        for child in self.children() {
            child.for_each_self_depth(action);
        }
    }

    // =========================================================================
    // Validation and update
    // =========================================================================

    /// Validates the node's names and every plugin-declared property.
    pub fn validate(self: &Arc<Self>) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for field in [FIELD_BROWSE_NAME, FIELD_DISPLAY_NAME, FIELD_DESCRIPTION] {
            if let Some(err) = self.validate_field(field) {
                errors.insert(field.to_string(), err);
            }
        }
        for (name, err) in self.plugin.validate(self) {
            errors.insert(name, err);
        }
        errors
    }

    fn validate_field(self: &Arc<Self>, name: &str) -> Option<ProjectError> {
        let value = match name {
            FIELD_BROWSE_NAME => self.base.browse_name().name,
            FIELD_DISPLAY_NAME => self.base.display_name().text,
            FIELD_DESCRIPTION => self.base.description().text,
            _ => return Some(ProjectError::InvalidField),
        };
        self.check_property_value(name, &serde_json::Value::String(value)).err()
    }

    /// Validates the current value of one property.
    pub fn validate_property(self: &Arc<Self>, name: &str) -> Option<ProjectError> {
        match name {
            FIELD_BROWSE_NAME | FIELD_DISPLAY_NAME | FIELD_DESCRIPTION => self.validate_field(name),
            _ => match self.get_property(name) {
                Some(prop) => prop.validate(),
                None => Some(ProjectError::InvalidField),
            },
        }
    }

    /// Checks whether `value` is admissible for the named property, routing
    /// name fields through the built-in checks and everything else through
    /// the plugin.
    pub fn check_property_value(
        self: &Arc<Self>,
        name: &str,
        value: &serde_json::Value,
    ) -> ProjectResult<lattice_ua::Scalar> {
        match name {
            FIELD_BROWSE_NAME => {
                let text = coerce_name(value)?;
                check_browse_name(&text, self)?;
                Ok(lattice_ua::Scalar::String(text))
            }
            FIELD_DISPLAY_NAME | FIELD_DESCRIPTION => {
                Ok(lattice_ua::Scalar::String(coerce_name(value)?))
            }
            _ => self.plugin.check_property_value(self, name, value),
        }
    }

    /// Applies a coalesced field update. Name fields rewrite the node id;
    /// property changes refresh the plugin props once at the end. On any
    /// field failure nothing is mutated and the failures are returned.
    pub fn update(self: &Arc<Self>, ctx: &ProjectContext, mut fields: FieldMap) -> FieldErrors {
        let mut errors = FieldErrors::new();
        let mut valid = FieldMap::new();

        fields.normalize_field_names();

        for field in [FIELD_BROWSE_NAME, FIELD_DISPLAY_NAME, FIELD_DESCRIPTION] {
            if let Ok(value) = fields.get_string(field) {
                match self.check_property_value(field, &serde_json::Value::String(value.clone())) {
                    Ok(_) => valid.insert(field, value),
                    Err(e) => {
                        errors.insert(field.to_string(), e);
                    }
                }
            }
        }

        fields.retain_plugin_fields(&self.plugin.config(), self.node_type);
        if errors.is_empty() {
            let (field_errors, valid_fields) = self.plugin.check_update_valid(self, &fields);
            for (k, v) in valid_fields.iter() {
                valid.insert(k.clone(), v.clone());
            }
            for (k, e) in field_errors {
                errors.insert(k, e);
            }
        }

        self.begin_update();
        let mut changed = false;
        if errors.is_empty() {
            for (name, value) in valid.iter() {
                match name.as_str() {
                    FIELD_BROWSE_NAME => {
                        if let Some(text) = value.as_str() {
                            if let Err(e) = self.set_browse_name(ctx, text) {
                                errors.insert(FIELD_BROWSE_NAME.to_string(), e);
                            }
                        }
                    }
                    FIELD_DISPLAY_NAME => {
                        if let Some(text) = value.as_str() {
                            self.base.set_display_name(text);
                        }
                    }
                    FIELD_DESCRIPTION => {
                        if let Some(text) = value.as_str() {
                            self.base.set_description(text);
                        }
                    }
                    _ => {
                        if let Some(prop) = self.get_property(name) {
                            let scalar = lattice_ua::json::scalar_from_loose_json(value);
                            changed |= prop
                                .set_value(DataValue::now(Variant::Scalar(scalar)));
                        }
                    }
                }
            }
        }
        if changed {
            self.refresh_plugin_props();
        }
        self.end_update();

        errors
    }

    /// Renames the node, rewriting its id and the ids of all descendants and
    /// properties, and keeping both the namespace index and the project
    /// index in step. Must run under the project lock.
    pub fn set_browse_name(self: &Arc<Self>, ctx: &ProjectContext, value: &str) -> ProjectResult<()> {
        let name = coerce_name(&serde_json::Value::String(value.to_string()))?;
        check_browse_name(&name, self)?;

        if self.base.browse_name().name == name {
            return Ok(());
        }

        let old_prefix = self.base.node_id().as_string().unwrap_or_default().to_string();
        self.base.set_browse_name_raw(&name);
        let new_prefix = match self.parent() {
            Some(parent) => format!(
                "{}{}{}",
                parent.base.node_id().as_string().unwrap_or_default(),
                PATH_SEPARATOR,
                name
            ),
            None => name,
        };
        self.replace_subtree_prefix(ctx, &old_prefix, &new_prefix);
        if let Some(parent) = self.parent() {
            rewrite_reference_targets(&parent.base, &old_prefix, &new_prefix);
        }
        Ok(())
    }

    fn replace_subtree_prefix(self: &Arc<Self>, ctx: &ProjectContext, old: &str, new: &str) {
        let old_id = self.base.node_id();
        let path = old_id.as_string().unwrap_or_default().to_string();
        let new_id = NodeId::string(0, format!("{}{}", new, &path[old.len().min(path.len())..]));
        self.base.set_node_id(new_id.clone());
        ctx.namespace.reindex(&old_id, &new_id);
        ctx.index.replace_node_id(&old_id, &new_id);
        rewrite_reference_targets(&self.base, old, new);

        for prop in self.properties() {
            let old_prop_id = prop.base.node_id();
            let new_prop_id = prop.replace_node_id_prefix(old, new);
            ctx.namespace.reindex(&old_prop_id, &new_prop_id);
            rewrite_reference_targets(&prop.base, old, new);
        }
        for child in self.children() {
            child.replace_subtree_prefix(ctx, old, new);
        }
    }
}

/// Rewrites every reference target under `old` (the node itself or its
/// descendants) to the renamed prefix.
fn rewrite_reference_targets(base: &NodeBase, old: &str, new: &str) {
    let child_prefix = format!("{}{}", old, PATH_SEPARATOR);
    let mut references = base.references();
    let mut changed = false;
    for reference in references.iter_mut() {
        if let Some(path) = reference.target_id.node_id.as_string() {
            if path == old || path.starts_with(&child_prefix) {
                let rewritten = format!("{}{}", new, &path[old.len()..]);
                reference.target_id.node_id = NodeId::string(0, rewritten);
                changed = true;
            }
        }
    }
    if changed {
        base.set_references(references);
    }
}

// =============================================================================
// Name checks
// =============================================================================

fn coerce_name(value: &serde_json::Value) -> ProjectResult<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.trim().to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ProjectError::InvalidValue),
    }
}

/// Validates a browse name: non-empty, free of path characters, unique
/// among siblings unless the node is the root.
pub fn check_browse_name(value: &str, target: &Arc<ObjectNode>) -> ProjectResult<()> {
    if value.is_empty() {
        return Err(ProjectError::FieldRequired);
    }
    if let Some(invalid) = value.chars().find(|c| matches!(c, '.' | '/' | '\\' | ':')) {
        return Err(ProjectError::validation(format!(
            "the name can't contain '{}'",
            invalid
        )));
    }
    if !target.node_type().is_root() {
        if let Some(parent) = target.parent() {
            let taken = parent
                .first(|child| {
                    child.base.browse_name().name == value && !Arc::ptr_eq(child, target)
                })
                .is_some();
            if taken {
                return Err(ProjectError::validation(format!(
                    "the name '{}' is already taken",
                    value
                )));
            }
        }
    }
    Ok(())
}

/// The node handle of an object node.
pub fn object_handle(node: &Arc<ObjectNode>) -> Node {
    Node::Object(node.clone())
}
