//! The plugin host.
//!
//! Every object node binds to exactly one [`Plugin`], looked up by plugin
//! id. Plugins declare, per node type, which child types a node accepts and
//! which fields it carries; the default trait methods implement the common
//! declaration-driven behavior so concrete plugins only override what they
//! specialize.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lattice_ua::Scalar;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldErrors, ProjectError, ProjectResult};
use crate::fields::{FieldDef, FieldMap};
use crate::node_type::NodeType;
use crate::object_node::ObjectNode;

/// Plugin id of the built-in core plugin.
pub const PLUGIN_ID_CORE: i16 = 0;

// =============================================================================
// Declarations
// =============================================================================

/// Describes a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PluginInfo {
    /// The plugin id referenced by `_PluginId` properties.
    pub id: i16,
    /// Display name.
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// Version string.
    #[serde(default)]
    pub version: String,
    /// Which category node the plugin's entries live under.
    #[serde(default)]
    pub category: i32,
    /// Short description.
    #[serde(default)]
    pub description: String,
}

/// Per-node-type configuration of a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    /// Names of the child node types this node type accepts.
    #[serde(default, rename = "childTypes")]
    pub child_types: Vec<String>,
    /// The configurable fields of this node type.
    #[serde(default, rename = "fieldDefs")]
    pub field_defs: Vec<FieldDef>,
    /// Name of the form view used by clients.
    #[serde(default)]
    pub view: String,
}

/// The full declaration of a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PluginConfig {
    /// Node configuration keyed by node type name.
    #[serde(default, rename = "nodeConfigs")]
    pub node_configs: HashMap<String, NodeConfig>,
    /// View configuration keyed by view name.
    #[serde(default, rename = "viewConfigs")]
    pub view_configs: HashMap<String, Value>,
}

impl PluginConfig {
    /// Looks up the declaration of `field_name` for `node_type`.
    pub fn field_def(&self, field_name: &str, node_type: NodeType) -> Option<&FieldDef> {
        self.node_configs
            .get(node_type.name())?
            .field_defs
            .iter()
            .find(|fd| fd.name == field_name)
    }

    /// Looks up the node configuration for `node_type`.
    pub fn node_config(&self, node_type: NodeType) -> ProjectResult<&NodeConfig> {
        self.node_configs.get(node_type.name()).ok_or(ProjectError::InvalidNodeType)
    }

    /// Returns `true` when `parent_type` accepts children of `child_type`.
    pub fn accepts_child(&self, parent_type: NodeType, child_type: NodeType) -> bool {
        self.node_configs
            .get(parent_type.name())
            .map(|cfg| {
                cfg.child_types
                    .iter()
                    .any(|name| NodeType::parse_name(name) == Ok(child_type))
            })
            .unwrap_or(false)
    }
}

/// Which form a client is asking the configuration for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormType {
    /// The add-node form.
    Add,
    /// The edit-node form.
    Edit,
}

impl FormType {
    /// Parses a case-insensitive form type name.
    pub fn parse(value: &str) -> ProjectResult<Self> {
        match value.to_lowercase().as_str() {
            "add" => Ok(FormType::Add),
            "edit" => Ok(FormType::Edit),
            _ => Err(ProjectError::InvalidFormType),
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormType::Add => write!(f, "ADD"),
            FormType::Edit => write!(f, "EDIT"),
        }
    }
}

/// Runtime state of an entry node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EntryState {
    /// Plugin-specific state code.
    pub state: i64,
    /// The last error message, empty when healthy.
    #[serde(default, rename = "lastError")]
    pub last_error: String,
    /// When the state last changed.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

// =============================================================================
// Plugin trait
// =============================================================================

/// State a plugin keeps per node to run it.
pub trait PluginProps: Send + Sync {
    /// Binds the props to their node.
    fn assign_node(&self, node: &Arc<ObjectNode>);
    /// Recomputes the props after a property change.
    fn update_props(&self);
    /// Called when a child was added to the node.
    fn on_child_add(&self, child: &Arc<ObjectNode>);
    /// Called when a child was removed from the node.
    fn on_child_remove(&self, child: &Arc<ObjectNode>);
}

/// Defines the behavior of the nodes bound to it.
///
/// The provided methods implement the declaration-driven defaults: field
/// validation against [`FieldDef`]s, child-type admission against the
/// configured child types, and a pass-through lifecycle.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Describes the plugin.
    fn info(&self) -> PluginInfo;

    /// The plugin's declaration.
    fn config(&self) -> Arc<PluginConfig>;

    /// Starts the process of an entry node. Expected to spawn its own
    /// tasks and return promptly.
    async fn start(&self, _entry: &Arc<ObjectNode>) -> ProjectResult<()> {
        Ok(())
    }

    /// Stops the process of an entry node.
    async fn stop(&self, _entry: &Arc<ObjectNode>) -> ProjectResult<()> {
        Ok(())
    }

    /// Returns `true` when `node` is a lifecycle anchor of this plugin.
    fn is_plugin_entry(&self, _node: &Arc<ObjectNode>) -> bool {
        false
    }

    /// Creates the per-node runtime props, when the plugin keeps any.
    fn plugin_props(&self, _node: &Arc<ObjectNode>) -> Option<Arc<dyn PluginProps>> {
        None
    }

    /// Validates every declared field of `node`, including missing required
    /// ones.
    fn validate(&self, node: &Arc<ObjectNode>) -> FieldErrors {
        let mut errors = FieldErrors::new();
        let config = self.config();
        let defs = match config.node_configs.get(node.node_type().name()) {
            Some(cfg) => &cfg.field_defs,
            None => return errors,
        };
        for def in defs {
            match node.get_property(&def.name) {
                Some(prop) => {
                    let value = prop.value().value;
                    let loose = match &value {
                        lattice_ua::Variant::Scalar(s) => {
                            crate::variable_node::scalar_to_loose_json(s)
                        }
                        lattice_ua::Variant::Array(_) => continue,
                    };
                    if let Err(e) = def.validate_value(&loose) {
                        errors.insert(def.name.clone(), e);
                    }
                }
                None if def.required => {
                    errors.insert(def.name.clone(), ProjectError::FieldRequired);
                }
                None => {}
            }
        }
        errors
    }

    /// Validates one field value against its declaration.
    fn check_property_value(
        &self,
        node: &Arc<ObjectNode>,
        name: &str,
        value: &Value,
    ) -> ProjectResult<Scalar> {
        let config = self.config();
        let def = config
            .field_def(name, node.node_type())
            .ok_or(ProjectError::InvalidField)?;
        def.validate_value(value)
    }

    /// Returns `true` when `parent` accepts a child of `node_type`.
    fn can_add_node_type(&self, parent: &ObjectNode, node_type: NodeType) -> bool {
        self.config().accepts_child(parent.node_type(), node_type)
    }

    /// Called after a child was attached to `parent`.
    fn add_node(&self, parent: &Arc<ObjectNode>, child: &Arc<ObjectNode>) {
        if let Some(props) = parent.plugin_props_handle() {
            props.on_child_add(child);
        }
    }

    /// Called after a child was detached from `parent`.
    fn remove_node(&self, parent: &Arc<ObjectNode>, child: &Arc<ObjectNode>) {
        if let Some(props) = parent.plugin_props_handle() {
            props.on_child_remove(child);
        }
    }

    /// Validates an update field map, returning failures and the coerced
    /// valid fields.
    fn check_update_valid(
        &self,
        node: &Arc<ObjectNode>,
        fields: &FieldMap,
    ) -> (FieldErrors, FieldMap) {
        let mut errors = FieldErrors::new();
        let mut valid = FieldMap::new();
        for (name, value) in fields.iter() {
            match self.check_property_value(node, name, value) {
                Ok(scalar) => {
                    valid.insert(name.clone(), crate::variable_node::scalar_to_loose_json(&scalar));
                }
                Err(e) => {
                    errors.insert(name.clone(), e);
                }
            }
        }
        (errors, valid)
    }

    /// The form configuration for `node_type`: its declared field defs.
    fn form_config(&self, _form_type: FormType, node_type: NodeType) -> ProjectResult<Value> {
        let config = self.config();
        let node_config = config.node_config(node_type)?;
        serde_json::to_value(&node_config.field_defs).map_err(|_| ProjectError::InvalidFormType)
    }

    /// The runtime state of an entry node.
    fn entry_state(&self, _node: &Arc<ObjectNode>) -> EntryState {
        EntryState::default()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Resolves plugins by id.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<i16, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    /// Creates a registry holding only the core plugin.
    pub fn new() -> Self {
        let mut registry = Self { plugins: HashMap::new() };
        registry.register(Arc::new(CorePlugin::new()));
        registry
    }

    /// Registers a plugin under its declared id.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.info().id, plugin);
    }

    /// Looks up a plugin by id.
    pub fn get(&self, id: i16) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(&id).cloned()
    }

    /// Descriptions of every registered plugin.
    pub fn supported_plugins(&self) -> Vec<PluginInfo> {
        self.plugins.values().map(|p| p.info()).collect()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("ids", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// Core plugin
// =============================================================================

/// The built-in plugin (id 0) backing the root and category nodes.
///
/// It declares no fields; Root accepts the three categories, Connectivity
/// accepts channels, Data Loggers accepts data loggers.
pub struct CorePlugin {
    config: Arc<PluginConfig>,
}

impl CorePlugin {
    /// Creates the core plugin.
    pub fn new() -> Self {
        let mut node_configs = HashMap::new();
        node_configs.insert(
            NodeType::Root.name().to_string(),
            NodeConfig {
                child_types: vec![
                    NodeType::Connectivity.name().to_string(),
                    NodeType::DataLoggers.name().to_string(),
                    NodeType::Alarms.name().to_string(),
                ],
                ..Default::default()
            },
        );
        node_configs.insert(
            NodeType::Connectivity.name().to_string(),
            NodeConfig {
                child_types: vec![NodeType::Channel.name().to_string()],
                ..Default::default()
            },
        );
        node_configs.insert(
            NodeType::DataLoggers.name().to_string(),
            NodeConfig {
                child_types: vec![NodeType::DataLogger.name().to_string()],
                ..Default::default()
            },
        );
        node_configs.insert(NodeType::Alarms.name().to_string(), NodeConfig::default());
        Self {
            config: Arc::new(PluginConfig { node_configs, view_configs: HashMap::new() }),
        }
    }
}

impl Default for CorePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for CorePlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            id: PLUGIN_ID_CORE,
            display_name: "Core".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            category: 0,
            description: "Built-in plugin for the root and category nodes".to_string(),
        }
    }

    fn config(&self) -> Arc<PluginConfig> {
        self.config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_plugin_child_admission() {
        let plugin = CorePlugin::new();
        let config = plugin.config();
        assert!(config.accepts_child(NodeType::Root, NodeType::Connectivity));
        assert!(config.accepts_child(NodeType::Root, NodeType::Alarms));
        assert!(config.accepts_child(NodeType::Connectivity, NodeType::Channel));
        assert!(!config.accepts_child(NodeType::Root, NodeType::Tag));
        assert!(!config.accepts_child(NodeType::Alarms, NodeType::Channel));
    }

    #[test]
    fn registry_resolves_core() {
        let registry = PluginRegistry::new();
        assert!(registry.get(PLUGIN_ID_CORE).is_some());
        assert!(registry.get(99).is_none());
        assert_eq!(registry.supported_plugins().len(), 1);
    }

    #[test]
    fn form_type_parse() {
        assert_eq!(FormType::parse("add").unwrap(), FormType::Add);
        assert_eq!(FormType::parse("EDIT").unwrap(), FormType::Edit);
        assert!(FormType::parse("wizard").is_err());
    }
}
