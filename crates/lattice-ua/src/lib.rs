//! # lattice-ua
//!
//! The OPC UA data model used by the lattice server core:
//!
//! - **Identifiers**: [`NodeId`], [`ExpandedNodeId`], [`QualifiedName`]
//! - **Values**: [`Variant`], [`DataValue`], [`StatusCode`], [`ByteString`]
//! - **Address-space vocabulary**: node classes, attribute ids, access
//!   levels, permissions, references, role permissions, well-known ids
//! - **Security**: [`SecurityPolicy`] with its algorithm mapping
//! - **Services**: the typed request/response messages of the implemented
//!   service surface, plus the [`ServiceRequest`]/[`ServiceResponse`]
//!   dispatch enums
//!
//! Wire framing and binary encoding are out of scope; the JSON encoding of
//! variants and data values lives in [`json`].

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod attribute;
mod byte_string;
mod data_value;
mod expanded_node_id;
pub mod ids;
pub mod json;
mod names;
mod node_id;
mod reference;
mod security_policy;
pub mod service;
mod status;
mod variant;

pub use attribute::{
    access_level, attribute_id, browse_result_mask, event_notifier, permission, BrowseDirection,
    DataChangeTrigger, DeadbandType, MonitoringMode, NodeClass, TimestampsToReturn, ValueRank,
};
pub use byte_string::ByteString;
pub use data_value::DataValue;
pub use expanded_node_id::ExpandedNodeId;
pub use names::{LocalizedText, QualifiedName};
pub use node_id::{Identifier, NodeId, NodeIdParseError};
pub use reference::{is_permitted, Reference, RolePermission};
pub use security_policy::{algorithm, EncryptionScheme, SecurityPolicy, SignatureScheme};
pub use service::{ServiceRequest, ServiceResponse, UserIdentity};
pub use status::StatusCode;
pub use variant::{
    ArrayValue, DiagnosticInfo, ExtensionObject, Scalar, Variant, VariantType,
};
