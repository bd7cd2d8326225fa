//! The standard-namespace type nodes the address space relies on:
//! the reference-type hierarchy that drives subtype filtering, and the
//! object/variable types project nodes point their HasTypeDefinition
//! references at.

use std::sync::Arc;

use lattice_ua::ids::{object_type_id, reference_type_id, variable_type_id};
use lattice_ua::{LocalizedText, NodeId, QualifiedName, Reference, ValueRank};

use crate::namespace::NamespaceManager;
use crate::node::{Node, NodeBase, ObjectTypeNode, ReferenceTypeNode, VariableTypeNode};

fn base(id: NodeId, name: &str, supertype: Option<NodeId>) -> NodeBase {
    let mut references = Vec::new();
    if let Some(parent) = supertype {
        references.push(Reference::inverse(reference_type_id::HAS_SUBTYPE, parent));
    }
    NodeBase::new(
        id,
        QualifiedName::new(0, name),
        LocalizedText::en(name),
        LocalizedText::en(""),
        None,
        references,
    )
}

fn reference_type(
    id: NodeId,
    name: &str,
    inverse_name: &str,
    is_abstract: bool,
    symmetric: bool,
    supertype: Option<NodeId>,
) -> Node {
    Node::ReferenceType(Arc::new(ReferenceTypeNode {
        base: base(id, name, supertype),
        is_abstract,
        symmetric,
        inverse_name: LocalizedText::en(inverse_name),
    }))
}

/// Seeds the standard reference types, object types and variable types
/// into the namespace. Safe to call once per namespace.
pub fn populate(namespace: &NamespaceManager) {
    use reference_type_id::*;

    let reference_types = [
        reference_type(REFERENCES, "References", "", true, true, None),
        reference_type(
            HIERARCHICAL_REFERENCES,
            "HierarchicalReferences",
            "InverseHierarchicalReferences",
            true,
            false,
            Some(REFERENCES),
        ),
        reference_type(
            NON_HIERARCHICAL_REFERENCES,
            "NonHierarchicalReferences",
            "",
            true,
            true,
            Some(REFERENCES),
        ),
        reference_type(
            HAS_CHILD,
            "HasChild",
            "ChildOf",
            true,
            false,
            Some(HIERARCHICAL_REFERENCES),
        ),
        reference_type(
            ORGANIZES,
            "Organizes",
            "OrganizedBy",
            false,
            false,
            Some(HIERARCHICAL_REFERENCES),
        ),
        reference_type(
            HAS_EVENT_SOURCE,
            "HasEventSource",
            "EventSourceOf",
            false,
            false,
            Some(HIERARCHICAL_REFERENCES),
        ),
        reference_type(
            HAS_TYPE_DEFINITION,
            "HasTypeDefinition",
            "TypeDefinitionOf",
            false,
            false,
            Some(NON_HIERARCHICAL_REFERENCES),
        ),
        reference_type(AGGREGATES, "Aggregates", "AggregatedBy", true, false, Some(HAS_CHILD)),
        reference_type(HAS_SUBTYPE, "HasSubtype", "SubtypeOf", false, false, Some(AGGREGATES)),
        reference_type(HAS_PROPERTY, "HasProperty", "PropertyOf", false, false, Some(AGGREGATES)),
        reference_type(
            HAS_COMPONENT,
            "HasComponent",
            "ComponentOf",
            false,
            false,
            Some(AGGREGATES),
        ),
        reference_type(
            HAS_NOTIFIER,
            "HasNotifier",
            "NotifierOf",
            false,
            false,
            Some(HAS_EVENT_SOURCE),
        ),
    ];
    for node in reference_types {
        let _ = namespace.add_node(node);
    }

    let _ = namespace.add_node(Node::ObjectType(Arc::new(ObjectTypeNode {
        base: base(object_type_id::BASE_OBJECT_TYPE, "BaseObjectType", None),
        is_abstract: false,
    })));
    let _ = namespace.add_node(Node::ObjectType(Arc::new(ObjectTypeNode {
        base: base(
            object_type_id::FOLDER_TYPE,
            "FolderType",
            Some(object_type_id::BASE_OBJECT_TYPE),
        ),
        is_abstract: false,
    })));

    let _ = namespace.add_node(Node::VariableType(Arc::new(VariableTypeNode {
        base: base(
            variable_type_id::BASE_DATA_VARIABLE_TYPE,
            "BaseDataVariableType",
            None,
        ),
        is_abstract: false,
        data_type: lattice_ua::ids::data_type_id::BASE_DATA_TYPE,
        value_rank: ValueRank::Any,
        array_dimensions: Vec::new(),
    })));
    let _ = namespace.add_node(Node::VariableType(Arc::new(VariableTypeNode {
        base: base(variable_type_id::PROPERTY_TYPE, "PropertyType", None),
        is_abstract: false,
        data_type: lattice_ua::ids::data_type_id::BASE_DATA_TYPE,
        value_rank: ValueRank::Any,
        array_dimensions: Vec::new(),
    })));
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_ua::ids::reference_type_id::*;

    #[test]
    fn subtype_chains_resolve() {
        let ns = NamespaceManager::default();
        populate(&ns);
        assert!(ns.is_subtype(&ORGANIZES, &HIERARCHICAL_REFERENCES));
        assert!(ns.is_subtype(&HAS_PROPERTY, &HAS_CHILD));
        assert!(ns.is_subtype(&HAS_COMPONENT, &REFERENCES));
        assert!(!ns.is_subtype(&ORGANIZES, &NON_HIERARCHICAL_REFERENCES));
        assert!(ns.find_node(&lattice_ua::ids::object_type_id::FOLDER_TYPE).is_some());
        assert!(ns.find_node(&lattice_ua::ids::variable_type_id::PROPERTY_TYPE).is_some());
    }
}
