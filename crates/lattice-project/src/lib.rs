//! # lattice-project
//!
//! The address space and project model of the lattice server:
//!
//! - **Node model**: object/variable/method/type/view nodes with ownership
//!   semantics, synthetic identity properties and per-node locks
//! - **Namespace manager**: the flat `NodeId → Node` index, subtype closure
//!   and variant-type resolution
//! - **Project manager**: the load/unload/reload state machine, snapshot
//!   persistence and the id indexes
//! - **Plugin host**: node-type-specific behavior behind the [`Plugin`]
//!   trait, with declaration-driven validation
//! - **Support**: field maps, value scaling
//!
//! Nodes live in an owning arena keyed by stable ids; references hold
//! [`lattice_ua::NodeId`] values, never pointers.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod fields;
pub mod namespace;
pub mod node;
pub mod node_type;
pub mod object_node;
pub mod plugin;
pub mod project;
pub mod scaling;
pub mod snapshot;
pub mod standard;
pub mod variable_node;

pub use error::{FieldErrors, ProjectError, ProjectResult};
pub use fields::{FieldDef, FieldMap};
pub use namespace::NamespaceManager;
pub use node::{
    CallMethodHandler, DataTypeNode, MethodNode, Node, NodeBase, ObjectTypeNode,
    ReferenceTypeNode, VariableTypeNode, ViewNode,
};
pub use node_type::NodeType;
pub use object_node::{check_browse_name, Event, EventListener, ObjectNode};
pub use plugin::{
    CorePlugin, EntryState, FormType, NodeConfig, Plugin, PluginConfig, PluginInfo,
    PluginProps, PluginRegistry, PLUGIN_ID_CORE,
};
pub use project::{ProjectContext, ProjectIndex, ProjectManager, ProjectState};
pub use scaling::{validate_scaling, Scaling, ScalingMode};
pub use snapshot::{default_project, default_root, JsonObjectNode, JsonProject, JsonVariableNode};
pub use standard::populate as populate_standard_nodes;
pub use variable_node::{PropertyType, ReadValueHandler, VariableNode, WriteValueHandler};
