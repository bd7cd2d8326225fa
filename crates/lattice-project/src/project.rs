//! The project manager and its load/unload/reload state machine.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use lattice_ua::NodeId;
use parking_lot::Mutex;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::error::{ProjectError, ProjectResult};
use crate::namespace::NamespaceManager;
use crate::node::Node;
use crate::object_node::ObjectNode;
use crate::plugin::PluginRegistry;
use crate::snapshot::{default_project, JsonObjectNode, JsonProject};

// =============================================================================
// Context and index
// =============================================================================

/// Explicit handle bundling the managers the node model needs. Passed into
/// node operations instead of process-wide globals.
#[derive(Clone)]
pub struct ProjectContext {
    /// The flat address-space index.
    pub namespace: Arc<NamespaceManager>,
    /// The plugin registry.
    pub plugins: Arc<PluginRegistry>,
    /// The project's object-node indexes.
    pub index: Arc<ProjectIndex>,
}

/// Flat indexes from NodeId and InternalId to the owning object node.
#[derive(Default)]
pub struct ProjectIndex {
    by_node_id: DashMap<NodeId, Arc<ObjectNode>>,
    by_internal_id: DashMap<Uuid, Arc<ObjectNode>>,
}

impl ProjectIndex {
    /// Creates empty indexes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a node under both keys.
    pub fn insert(&self, node: &Arc<ObjectNode>) {
        self.by_node_id.insert(node.base.node_id(), node.clone());
        self.by_internal_id.insert(node.internal_id(), node.clone());
    }

    /// Removes a node from both indexes.
    pub fn remove(&self, node: &Arc<ObjectNode>) {
        self.by_node_id.remove(&node.base.node_id());
        self.by_internal_id.remove(&node.internal_id());
    }

    /// Looks up by node id.
    pub fn by_node_id(&self, id: &NodeId) -> Option<Arc<ObjectNode>> {
        self.by_node_id.get(id).map(|e| e.value().clone())
    }

    /// Looks up by internal id.
    pub fn by_internal_id(&self, id: &Uuid) -> Option<Arc<ObjectNode>> {
        self.by_internal_id.get(id).map(|e| e.value().clone())
    }

    /// Moves a node-id index entry after a rename.
    pub fn replace_node_id(&self, old_id: &NodeId, new_id: &NodeId) {
        if let Some((_, node)) = self.by_node_id.remove(old_id) {
            self.by_node_id.insert(new_id.clone(), node);
        }
    }

    /// Clears both indexes.
    pub fn clear(&self) {
        self.by_node_id.clear();
        self.by_internal_id.clear();
    }
}

// =============================================================================
// State machine
// =============================================================================

/// State of the project manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectState {
    /// No project loaded.
    Unloaded,
    /// A load is in progress.
    Loading,
    /// The project is loaded and running.
    Loaded,
    /// A reload was requested; plugins are being stopped.
    Reload,
    /// A load failed; [`ProjectManager::current_error`] holds the cause.
    Error,
}

impl std::fmt::Display for ProjectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProjectState::Unloaded => "Unloaded",
            ProjectState::Loading => "Loading",
            ProjectState::Loaded => "Loaded",
            ProjectState::Reload => "Reload",
            ProjectState::Error => "Error",
        };
        write!(f, "{}", name)
    }
}

struct ProjectInner {
    state: ProjectState,
    root: Option<Arc<ObjectNode>>,
    entry_nodes: Vec<Arc<ObjectNode>>,
    current_error: Option<ProjectError>,
}

// =============================================================================
// ProjectManager
// =============================================================================

/// Owns the project root, drives the load state machine and keeps the flat
/// indexes total over the ownership tree.
///
/// All public operations take the project lock, assert a non-Error state,
/// then act.
pub struct ProjectManager {
    inner: Mutex<ProjectInner>,
    context: ProjectContext,
    project_path: PathBuf,
}

impl ProjectManager {
    /// Creates an unloaded project manager persisting to `project_path`.
    pub fn new(
        project_path: impl Into<PathBuf>,
        namespace: Arc<NamespaceManager>,
        plugins: Arc<PluginRegistry>,
    ) -> Self {
        Self {
            inner: Mutex::new(ProjectInner {
                state: ProjectState::Unloaded,
                root: None,
                entry_nodes: Vec::new(),
                current_error: None,
            }),
            context: ProjectContext {
                namespace,
                plugins,
                index: Arc::new(ProjectIndex::new()),
            },
            project_path: project_path.into(),
        }
    }

    /// The context handle shared with node operations.
    pub fn context(&self) -> &ProjectContext {
        &self.context
    }

    /// The current state.
    pub fn current_state(&self) -> ProjectState {
        self.inner.lock().state
    }

    /// The recorded error of the Error state.
    pub fn current_error(&self) -> Option<ProjectError> {
        self.inner.lock().current_error.clone()
    }

    /// The error blocking project operations: the recorded error in the
    /// Error state, ProjectNotLoaded when unloaded, nothing otherwise.
    pub fn has_error(&self) -> Option<ProjectError> {
        let inner = self.inner.lock();
        match inner.state {
            ProjectState::Error => {
                Some(inner.current_error.clone().unwrap_or(ProjectError::ProjectNotLoaded))
            }
            ProjectState::Unloaded => Some(ProjectError::ProjectNotLoaded),
            _ => None,
        }
    }

    /// The root of the loaded project.
    pub fn root(&self) -> Option<Arc<ObjectNode>> {
        self.inner.lock().root.clone()
    }

    /// The entry nodes of the loaded project.
    pub fn entry_nodes(&self) -> Vec<Arc<ObjectNode>> {
        self.inner.lock().entry_nodes.clone()
    }

    // =========================================================================
    // State machine
    // =========================================================================

    /// Loads the project from the snapshot file, synthesizing the default
    /// project when none exists, and starts every entry plugin.
    pub fn load(&self) {
        let mut inner = self.inner.lock();
        if !matches!(inner.state, ProjectState::Unloaded | ProjectState::Reload) {
            return;
        }
        inner.state = ProjectState::Loading;
        trace!(state = %inner.state, "project state");
        match self.on_loading(&mut inner) {
            Ok(()) => {
                inner.state = ProjectState::Loaded;
                inner.current_error = None;
                debug!(path = %self.project_path.display(), "project loaded");
            }
            Err(e) => {
                error!(error = %e, "project load failed");
                inner.current_error = Some(e);
                inner.state = ProjectState::Error;
            }
        }
    }

    /// Stops every entry plugin and clears the root and all indexes.
    pub fn unload(&self) {
        let mut inner = self.inner.lock();
        self.stop_entry_plugins(&inner.entry_nodes);
        self.cleanup(&mut inner);
        inner.state = ProjectState::Unloaded;
        trace!("project unloaded");
    }

    /// Stops the running project and loads it again from the snapshot.
    pub fn reload(&self) -> ProjectResult<()> {
        {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, ProjectState::Loaded | ProjectState::Error) {
                return Err(ProjectError::ProjectNotLoaded);
            }
            inner.state = ProjectState::Reload;
            trace!(state = %inner.state, "project state");
            self.stop_entry_plugins(&inner.entry_nodes);
        }
        self.load();
        match self.current_error() {
            Some(e) if self.current_state() == ProjectState::Error => Err(e),
            _ => Ok(()),
        }
    }

    /// Starts every entry plugin. Valid only in the Loaded state.
    pub fn load_plugins(&self) -> ProjectResult<()> {
        let inner = self.inner.lock();
        self.check_state(&inner)?;
        if inner.state != ProjectState::Loaded {
            return Err(ProjectError::ProjectNotLoaded);
        }
        self.start_entry_plugins(&inner.entry_nodes);
        Ok(())
    }

    /// Stops every entry plugin. Valid only in the Loaded state.
    pub fn unload_plugins(&self) -> ProjectResult<()> {
        let inner = self.inner.lock();
        self.check_state(&inner)?;
        if inner.state != ProjectState::Loaded {
            return Err(ProjectError::ProjectNotLoaded);
        }
        self.stop_entry_plugins(&inner.entry_nodes);
        Ok(())
    }

    /// Stops, then starts every entry plugin. Valid only in the Loaded
    /// state.
    pub fn reload_plugins(&self) -> ProjectResult<()> {
        let inner = self.inner.lock();
        self.check_state(&inner)?;
        if inner.state != ProjectState::Loaded {
            return Err(ProjectError::ProjectNotLoaded);
        }
        self.stop_entry_plugins(&inner.entry_nodes);
        self.start_entry_plugins(&inner.entry_nodes);
        Ok(())
    }

    // =========================================================================
    // Node operations
    // =========================================================================

    /// Attaches `node` under `parent`, indexes the subtree and starts the
    /// node's plugin when it is an entry.
    pub fn add_node(&self, parent: &Arc<ObjectNode>, node: &Arc<ObjectNode>) -> ProjectResult<()> {
        let mut inner = self.inner.lock();
        self.check_state(&inner)?;

        node.assign_plugin_props();
        parent.add_child(node)?;

        if let Err(e) = self.context.namespace.add_node(Node::Object(node.clone())) {
            parent.remove_child(node)?;
            return Err(e);
        }
        for prop in node.properties() {
            let _ = self.context.namespace.add_node(Node::Variable(prop));
        }
        self.context.index.insert(node);

        if node.is_entry() {
            inner.entry_nodes.push(node.clone());
            self.start_entry_plugins(std::slice::from_ref(node));
        }
        Ok(())
    }

    /// Detaches `node` from its parent, stops any entry plugins in its
    /// subtree and removes the subtree from all indexes.
    pub fn remove_node(&self, node: &Arc<ObjectNode>) -> ProjectResult<()> {
        let mut inner = self.inner.lock();
        self.check_state(&inner)?;

        let parent = node.parent().ok_or(ProjectError::ParentNotFound)?;
        parent.remove_child(node)?;

        let mut stopped = Vec::new();
        node.for_each_self_depth(&mut |child| {
            if child.is_entry() {
                stopped.push(child.clone());
            }
            self.context.index.remove(child);
        });
        inner
            .entry_nodes
            .retain(|entry| !stopped.iter().any(|s| Arc::ptr_eq(s, entry)));
        self.stop_entry_plugins(&stopped);

        self.context.namespace.delete_node(&Node::Object(node.clone()), true);
        Ok(())
    }

    /// Saves the live tree back to the snapshot file.
    pub fn save(&self) -> ProjectResult<()> {
        let inner = self.inner.lock();
        self.check_state(&inner)?;
        let root = inner.root.as_ref().ok_or(ProjectError::ProjectNotLoaded)?;
        let project = JsonProject { root: Some(JsonObjectNode::from_object(root, true)) };
        project.save_as(&self.project_path)
    }

    /// Captures the live tree as a snapshot document.
    pub fn get_project(&self) -> ProjectResult<JsonProject> {
        let inner = self.inner.lock();
        self.check_state(&inner)?;
        let root = inner.root.as_ref().ok_or(ProjectError::ProjectNotLoaded)?;
        Ok(JsonProject { root: Some(JsonObjectNode::from_object(root, true)) })
    }

    /// Every object node of the loaded project, in tree order.
    pub fn get_all_nodes(&self, include_root: bool) -> ProjectResult<Vec<Arc<ObjectNode>>> {
        let inner = self.inner.lock();
        self.check_state(&inner)?;
        let root = inner.root.as_ref().ok_or(ProjectError::ProjectNotLoaded)?;
        let mut nodes = Vec::new();
        if include_root {
            root.for_each_self_depth(&mut |node| nodes.push(node.clone()));
        } else {
            root.for_each_depth(&mut |node| nodes.push(node.clone()));
        }
        Ok(nodes)
    }

    /// Looks up an object node by node id.
    pub fn get_node_by_node_id(&self, id: &NodeId) -> ProjectResult<Arc<ObjectNode>> {
        let inner = self.inner.lock();
        self.check_state(&inner)?;
        self.context.index.by_node_id(id).ok_or(ProjectError::NotFound)
    }

    /// Looks up an object node by internal id.
    pub fn get_node_by_internal_id(&self, id: &Uuid) -> ProjectResult<Arc<ObjectNode>> {
        let inner = self.inner.lock();
        self.check_state(&inner)?;
        self.context.index.by_internal_id(id).ok_or(ProjectError::NotFound)
    }

    /// Looks up an object node by either id form: a GUID string resolves by
    /// internal id, anything else parses as a node id.
    pub fn get_node(&self, id: &str) -> ProjectResult<Arc<ObjectNode>> {
        if let Ok(internal_id) = Uuid::parse_str(id) {
            return self.get_node_by_internal_id(&internal_id);
        }
        let node_id: NodeId = id.parse().map_err(|_| ProjectError::NotFound)?;
        self.get_node_by_node_id(&node_id)
    }

    /// Moves a node-id index entry after a rename.
    pub fn replace_node_id(&self, old_id: &NodeId, new_id: &NodeId) {
        let _guard = self.inner.lock();
        self.context.index.replace_node_id(old_id, new_id);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn on_loading(&self, inner: &mut ProjectInner) -> ProjectResult<()> {
        if !self.project_path.exists() {
            if let Some(dir) = self.project_path.parent() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    ProjectError::validation(format!("create project directory: {}", e))
                })?;
            }
            default_project(&self.context)?.save_as(&self.project_path)?;
        }

        let project = JsonProject::from_file(&self.project_path)?;
        self.cleanup(inner);
        let root = project.validate(&self.context)?;

        let mut entries = Vec::new();
        root.for_each_self_depth(&mut |node| {
            if node.is_entry() {
                entries.push(node.clone());
            }
            self.context.index.insert(node);
            node.assign_plugin_props();
        });
        root.for_each_self_depth(&mut |node| {
            let _ = self.context.namespace.add_node(Node::Object(node.clone()));
            for prop in node.properties() {
                let _ = self.context.namespace.add_node(Node::Variable(prop));
            }
        });

        inner.root = Some(root);
        inner.entry_nodes = entries;
        self.start_entry_plugins(&inner.entry_nodes);
        Ok(())
    }

    fn start_entry_plugins(&self, entries: &[Arc<ObjectNode>]) {
        for entry in entries {
            let node = entry.clone();
            let plugin = node.plugin();
            tokio::spawn(async move {
                if let Err(e) = plugin.start(&node).await {
                    error!(node = %node.base.node_id(), error = %e, "plugin start failed");
                }
            });
        }
    }

    fn stop_entry_plugins(&self, entries: &[Arc<ObjectNode>]) {
        for entry in entries {
            let node = entry.clone();
            let plugin = node.plugin();
            tokio::spawn(async move {
                if let Err(e) = plugin.stop(&node).await {
                    error!(node = %node.base.node_id(), error = %e, "plugin stop failed");
                }
            });
        }
    }

    fn cleanup(&self, inner: &mut ProjectInner) {
        inner.entry_nodes.clear();
        self.context.index.clear();
        if let Some(root) = inner.root.take() {
            self.context.namespace.delete_node(&Node::Object(root), true);
        }
    }

    fn check_state(&self, inner: &ProjectInner) -> ProjectResult<()> {
        if inner.state == ProjectState::Error {
            return Err(inner.current_error.clone().unwrap_or(ProjectError::ProjectNotLoaded));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_type::NodeType;
    use lattice_ua::{LocalizedText, QualifiedName};

    fn manager(dir: &std::path::Path) -> ProjectManager {
        ProjectManager::new(
            dir.join("project.json"),
            Arc::new(NamespaceManager::default()),
            Arc::new(PluginRegistry::new()),
        )
    }

    #[tokio::test]
    async fn load_synthesizes_default_project() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(dir.path());
        assert_eq!(pm.current_state(), ProjectState::Unloaded);
        assert_eq!(pm.has_error(), Some(ProjectError::ProjectNotLoaded));

        pm.load();
        assert_eq!(pm.current_state(), ProjectState::Loaded);
        assert!(pm.has_error().is_none());
        let root = pm.root().unwrap();
        assert_eq!(root.children().len(), 3);

        // every reachable node is indexed both ways
        for node in pm.get_all_nodes(true).unwrap() {
            let by_id = pm.get_node_by_node_id(&node.base.node_id()).unwrap();
            assert!(Arc::ptr_eq(&by_id, &node));
            let by_internal = pm.get_node_by_internal_id(&node.internal_id()).unwrap();
            assert!(Arc::ptr_eq(&by_internal, &node));
        }
    }

    #[tokio::test]
    async fn load_unload_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(dir.path());
        pm.load();
        let first: Vec<String> = pm
            .get_all_nodes(true)
            .unwrap()
            .iter()
            .map(|n| n.base.node_id().to_string())
            .collect();

        pm.unload();
        assert_eq!(pm.current_state(), ProjectState::Unloaded);
        assert!(pm.root().is_none());
        assert!(pm.get_all_nodes(true).is_err());

        pm.load();
        let second: Vec<String> = pm
            .get_all_nodes(true)
            .unwrap()
            .iter()
            .map(|n| n.base.node_id().to_string())
            .collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn add_and_remove_node_maintain_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(dir.path());
        pm.load();
        let root = pm.root().unwrap();
        let connectivity = root.get_child_by_path("Connectivity").unwrap();
        let plugin = pm.context().plugins.get(0).unwrap();

        let channel = ObjectNode::build(
            Some(&connectivity),
            QualifiedName::new(0, "Plc1"),
            LocalizedText::en("Plc1"),
            LocalizedText::en(""),
            NodeType::Channel,
            plugin,
            Uuid::new_v4(),
        );
        pm.add_node(&connectivity, &channel).unwrap();

        assert!(pm.get_node_by_node_id(&channel.base.node_id()).is_ok());
        assert!(pm.context().namespace.find_node(&channel.base.node_id()).is_some());
        assert_eq!(channel.base.node_id().as_string().unwrap(), "Root.Connectivity.Plc1");

        pm.remove_node(&channel).unwrap();
        assert!(pm.get_node_by_node_id(&channel.base.node_id()).is_err());
        assert!(pm.context().namespace.find_node(&channel.base.node_id()).is_none());
        assert!(connectivity.children().is_empty());
    }

    #[tokio::test]
    async fn rename_rewrites_subtree_ids() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(dir.path());
        pm.load();
        let root = pm.root().unwrap();
        let connectivity = root.get_child_by_path("Connectivity").unwrap();
        let plugin = pm.context().plugins.get(0).unwrap();

        let channel = ObjectNode::build(
            Some(&connectivity),
            QualifiedName::new(0, "Plc1"),
            LocalizedText::en("Plc1"),
            LocalizedText::en(""),
            NodeType::Channel,
            plugin,
            Uuid::new_v4(),
        );
        pm.add_node(&connectivity, &channel).unwrap();

        channel.set_browse_name(pm.context(), "Plc2").unwrap();
        assert_eq!(channel.base.node_id().as_string().unwrap(), "Root.Connectivity.Plc2");
        assert!(pm.context().namespace.find_node(&channel.base.node_id()).is_some());
        assert!(pm
            .context()
            .namespace
            .find_node(&NodeId::string(0, "Root.Connectivity.Plc1"))
            .is_none());
        // properties moved with the node
        assert!(pm
            .context()
            .namespace
            .find_node(&NodeId::string(0, "Root.Connectivity.Plc2._InternalId"))
            .is_some());
    }
}
