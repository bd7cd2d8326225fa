//! The namespace manager: the flat index over the address space.

use dashmap::DashMap;
use lattice_ua::ids::reference_type_id;
use lattice_ua::{NodeClass, NodeId, VariantType};
use parking_lot::RwLock;

use crate::error::{ProjectError, ProjectResult};
use crate::node::Node;

/// URI of the OPC UA standard namespace (index 0).
pub const STANDARD_NAMESPACE_URI: &str = "http://opcfoundation.org/UA/";

/// Flat `NodeId → Node` index plus the namespace-URI table and the subtype
/// closure over `HasSubtype` references.
pub struct NamespaceManager {
    nodes: DashMap<NodeId, Node>,
    namespace_uris: RwLock<Vec<String>>,
}

impl NamespaceManager {
    /// Creates a manager whose URI table holds the standard namespace and
    /// `application_uri` at index 1.
    pub fn new(application_uri: impl Into<String>) -> Self {
        Self {
            nodes: DashMap::new(),
            namespace_uris: RwLock::new(vec![
                STANDARD_NAMESPACE_URI.to_string(),
                application_uri.into(),
            ]),
        }
    }

    /// The namespace-URI table.
    pub fn namespace_uris(&self) -> Vec<String> {
        self.namespace_uris.read().clone()
    }

    /// Appends a namespace URI, returning its index. An existing URI keeps
    /// its index.
    pub fn add_namespace_uri(&self, uri: &str) -> u16 {
        let mut uris = self.namespace_uris.write();
        if let Some(pos) = uris.iter().position(|u| u == uri) {
            return pos as u16;
        }
        uris.push(uri.to_string());
        (uris.len() - 1) as u16
    }

    /// Looks up a node by id.
    pub fn find_node(&self, id: &NodeId) -> Option<Node> {
        self.nodes.get(id).map(|entry| entry.value().clone())
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when no nodes are indexed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indexes a node.
    pub fn add_node(&self, node: Node) -> ProjectResult<()> {
        let id = node.node_id();
        if self.nodes.contains_key(&id) {
            return Err(ProjectError::FieldExisted);
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Removes a node from the index; with `recursive`, also removes the
    /// whole ownership subtree (children and properties).
    pub fn delete_node(&self, node: &Node, recursive: bool) {
        self.nodes.remove(&node.node_id());
        if !recursive {
            return;
        }
        if let Node::Object(object) = node {
            for prop in object.properties() {
                self.nodes.remove(&prop.base.node_id());
            }
            for child in object.children() {
                self.delete_node(&Node::Object(child), true);
            }
        }
    }

    /// Rewrites a node's id and moves its index entry.
    pub fn update_node_id(&self, node: &Node, new_id: NodeId) {
        let old_id = node.node_id();
        node.base().set_node_id(new_id.clone());
        self.reindex(&old_id, &new_id);
    }

    /// Moves an index entry from `old_id` to `new_id` after the node's id
    /// was already rewritten.
    pub fn reindex(&self, old_id: &NodeId, new_id: &NodeId) {
        if let Some((_, node)) = self.nodes.remove(old_id) {
            self.nodes.insert(new_id.clone(), node);
        }
    }

    /// The reflexive-transitive subtype relation over `HasSubtype`
    /// references, restricted to reference type nodes.
    pub fn is_subtype(&self, child: &NodeId, ancestor: &NodeId) -> bool {
        if child == ancestor {
            return true;
        }
        let mut current = child.clone();
        let mut hops = 0usize;
        loop {
            let node = match self.find_node(&current) {
                Some(node) => node,
                None => return false,
            };
            if node.node_class() != NodeClass::ReferenceType {
                return false;
            }
            // inverse HasSubtype points at the supertype
            let supertype = node.references().into_iter().find_map(|r| {
                (r.is_inverse && r.reference_type_id == reference_type_id::HAS_SUBTYPE)
                    .then(|| r.target_id.node_id.clone())
            });
            match supertype {
                Some(supertype) => {
                    if &supertype == ancestor {
                        return true;
                    }
                    current = supertype;
                }
                None => return false,
            }
            hops += 1;
            if hops > 64 {
                // malformed subtype cycle
                return false;
            }
        }
    }

    /// Resolves a data type id to the built-in variant type, walking
    /// `HasSubtype` upward from custom types until a built-in base is
    /// reached. Unresolvable types map to ExtensionObject.
    pub fn find_variant_type(&self, data_type: &NodeId) -> VariantType {
        let mut current = data_type.clone();
        let mut hops = 0usize;
        loop {
            if let Some(vt) = VariantType::from_data_type_id(&current) {
                return vt;
            }
            let node = match self.find_node(&current) {
                Some(node) => node,
                None => return VariantType::ExtensionObject,
            };
            let supertype = node.references().into_iter().find_map(|r| {
                (r.is_inverse && r.reference_type_id == reference_type_id::HAS_SUBTYPE)
                    .then(|| r.target_id.node_id.clone())
            });
            match supertype {
                Some(supertype) => current = supertype,
                None => return VariantType::ExtensionObject,
            }
            hops += 1;
            if hops > 64 {
                return VariantType::ExtensionObject;
            }
        }
    }

    /// Clears the whole index.
    pub fn clear(&self) {
        self.nodes.clear();
    }
}

impl Default for NamespaceManager {
    fn default() -> Self {
        Self::new("urn:lattice:server")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeBase, ReferenceTypeNode};
    use lattice_ua::ids::data_type_id;
    use lattice_ua::{LocalizedText, QualifiedName, Reference};
    use std::sync::Arc;

    fn reference_type(id: NodeId, supertype: Option<NodeId>) -> Node {
        let mut references = Vec::new();
        if let Some(parent) = supertype {
            references.push(Reference::inverse(reference_type_id::HAS_SUBTYPE, parent));
        }
        Node::ReferenceType(Arc::new(ReferenceTypeNode {
            base: NodeBase::new(
                id.clone(),
                QualifiedName::new(0, format!("{}", id)),
                LocalizedText::en(""),
                LocalizedText::en(""),
                None,
                references,
            ),
            is_abstract: false,
            symmetric: false,
            inverse_name: LocalizedText::en(""),
        }))
    }

    fn data_type(id: NodeId, supertype: NodeId) -> Node {
        Node::DataType(Arc::new(crate::node::DataTypeNode {
            base: NodeBase::new(
                id,
                QualifiedName::new(0, "T"),
                LocalizedText::en(""),
                LocalizedText::en(""),
                None,
                vec![Reference::inverse(reference_type_id::HAS_SUBTYPE, supertype)],
            ),
            is_abstract: false,
            data_type_definition: None,
        }))
    }

    #[test]
    fn subtype_closure_is_reflexive_and_transitive() {
        let ns = NamespaceManager::default();
        let references = reference_type_id::REFERENCES;
        let hierarchical = reference_type_id::HIERARCHICAL_REFERENCES;
        let organizes = reference_type_id::ORGANIZES;
        ns.add_node(reference_type(references.clone(), None)).unwrap();
        ns.add_node(reference_type(hierarchical.clone(), Some(references.clone()))).unwrap();
        ns.add_node(reference_type(organizes.clone(), Some(hierarchical.clone()))).unwrap();

        assert!(ns.is_subtype(&organizes, &organizes));
        assert!(ns.is_subtype(&organizes, &hierarchical));
        assert!(ns.is_subtype(&organizes, &references));
        assert!(!ns.is_subtype(&references, &organizes));
        assert!(!ns.is_subtype(&NodeId::numeric(0, 9999), &references));
    }

    #[test]
    fn variant_type_resolution_walks_subtypes() {
        let ns = NamespaceManager::default();
        assert_eq!(ns.find_variant_type(&data_type_id::DOUBLE), VariantType::Double);

        let custom = NodeId::string(2, "TemperatureType");
        ns.add_node(data_type(custom.clone(), data_type_id::DOUBLE)).unwrap();
        assert_eq!(ns.find_variant_type(&custom), VariantType::Double);

        assert_eq!(
            ns.find_variant_type(&NodeId::string(2, "UnknownType")),
            VariantType::ExtensionObject
        );
    }

    #[test]
    fn duplicate_index_entry_is_rejected() {
        let ns = NamespaceManager::default();
        let node = reference_type(reference_type_id::ORGANIZES, None);
        ns.add_node(node.clone()).unwrap();
        assert_eq!(ns.add_node(node), Err(ProjectError::FieldExisted));
    }
}
