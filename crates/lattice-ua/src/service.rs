//! Service request and response messages.
//!
//! These are the typed messages the secure-channel transport decodes and
//! hands to the dispatcher, and that the dispatcher writes back through the
//! [`ServiceResponse`] enum. Wire framing and binary encoding live outside
//! this crate; everything here is plain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ByteString, DataChangeTrigger, DataValue, ExpandedNodeId, LocalizedText, MonitoringMode,
    NodeClass, NodeId, QualifiedName, StatusCode, Variant,
};

// =============================================================================
// Headers
// =============================================================================

/// Common header of every service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RequestHeader {
    /// The session authentication token.
    #[serde(rename = "authenticationToken")]
    pub authentication_token: NodeId,
    /// Client-side timestamp.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Client-assigned handle echoed in the response.
    #[serde(rename = "requestHandle")]
    pub request_handle: u32,
    /// Processing timeout hint in milliseconds.
    #[serde(default, rename = "timeoutHint")]
    pub timeout_hint: u32,
}

/// Common header of every service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResponseHeader {
    /// Server-side timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    /// The echoed request handle.
    #[serde(rename = "requestHandle")]
    pub request_handle: u32,
    /// Overall service outcome.
    #[serde(rename = "serviceResult")]
    pub service_result: StatusCode,
}

impl ResponseHeader {
    /// Creates a good response header for `request_handle`, stamped now.
    pub fn good(request_handle: u32) -> Self {
        Self { timestamp: Some(Utc::now()), request_handle, service_result: StatusCode::GOOD }
    }

    /// Creates a fault response header for `request_handle`, stamped now.
    pub fn fault(request_handle: u32, status: StatusCode) -> Self {
        Self { timestamp: Some(Utc::now()), request_handle, service_result: status }
    }
}

/// A service-level failure carrying only a response header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceFault {
    /// The response header; `service_result` holds the failure code.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
}

impl ServiceFault {
    /// Creates a fault.
    pub fn new(request_handle: u32, status: StatusCode) -> Self {
        Self { response_header: ResponseHeader::fault(request_handle, status) }
    }
}

// =============================================================================
// Discovery
// =============================================================================

/// Describes an OPC UA application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ApplicationDescription {
    /// Globally unique application URI.
    #[serde(rename = "applicationUri")]
    pub application_uri: String,
    /// Product URI.
    #[serde(default, rename = "productUri")]
    pub product_uri: String,
    /// Human-readable name.
    #[serde(rename = "applicationName")]
    pub application_name: LocalizedText,
    /// Discovery URLs of the application.
    #[serde(default, rename = "discoveryUrls")]
    pub discovery_urls: Vec<String>,
}

/// How messages on a channel are secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum MessageSecurityMode {
    /// Mode not set.
    Invalid = 0,
    /// No signing or encryption.
    #[default]
    None = 1,
    /// Messages are signed.
    Sign = 2,
    /// Messages are signed and encrypted.
    SignAndEncrypt = 3,
}

/// The kind of user identity token a policy admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum UserTokenType {
    /// Anonymous access.
    #[default]
    Anonymous = 0,
    /// User name and password.
    UserName = 1,
    /// X.509 certificate.
    Certificate = 2,
    /// Externally issued token.
    IssuedToken = 3,
}

/// A user identity token policy advertised on an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserTokenPolicy {
    /// Endpoint-unique policy id referenced by identity tokens.
    #[serde(rename = "policyId")]
    pub policy_id: String,
    /// The admitted token kind.
    #[serde(rename = "tokenType")]
    pub token_type: UserTokenType,
    /// Security policy used to encrypt the token, empty to inherit the
    /// channel's policy.
    #[serde(default, rename = "securityPolicyUri")]
    pub security_policy_uri: String,
}

/// Describes one server endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EndpointDescription {
    /// The endpoint URL.
    #[serde(rename = "endpointUrl")]
    pub endpoint_url: String,
    /// The hosting application.
    pub server: ApplicationDescription,
    /// DER server certificate.
    #[serde(default, rename = "serverCertificate")]
    pub server_certificate: ByteString,
    /// Message security mode.
    #[serde(rename = "securityMode")]
    pub security_mode: MessageSecurityMode,
    /// Security policy URI.
    #[serde(rename = "securityPolicyUri")]
    pub security_policy_uri: String,
    /// Admitted user token policies.
    #[serde(default, rename = "userIdentityTokens")]
    pub user_identity_tokens: Vec<UserTokenPolicy>,
    /// Transport profile URI.
    #[serde(default, rename = "transportProfileUri")]
    pub transport_profile_uri: String,
    /// Relative security level of this endpoint.
    #[serde(default, rename = "securityLevel")]
    pub security_level: u8,
}

/// FindServers service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FindServersRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// Endpoint URL the client used.
    #[serde(default, rename = "endpointUrl")]
    pub endpoint_url: String,
    /// Restrict results to these server URIs; empty returns all.
    #[serde(default, rename = "serverUris")]
    pub server_uris: Vec<String>,
}

/// FindServers service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindServersResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Matching servers.
    pub servers: Vec<ApplicationDescription>,
}

/// GetEndpoints service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GetEndpointsRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// Endpoint URL the client used.
    #[serde(default, rename = "endpointUrl")]
    pub endpoint_url: String,
    /// Restrict results to these transport profiles; empty returns all.
    #[serde(default, rename = "profileUris")]
    pub profile_uris: Vec<String>,
}

/// GetEndpoints service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetEndpointsResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Matching endpoints.
    pub endpoints: Vec<EndpointDescription>,
}

// =============================================================================
// Session services
// =============================================================================

/// An asymmetric signature with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SignatureData {
    /// The signature bytes.
    pub signature: ByteString,
    /// URI of the signature algorithm.
    pub algorithm: String,
}

/// CreateSession service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CreateSessionRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The client application.
    #[serde(rename = "clientDescription")]
    pub client_description: ApplicationDescription,
    /// Server URI the client expects.
    #[serde(default, rename = "serverUri")]
    pub server_uri: String,
    /// Endpoint URL the client connected to.
    #[serde(rename = "endpointUrl")]
    pub endpoint_url: String,
    /// Requested session name.
    #[serde(default, rename = "sessionName")]
    pub session_name: String,
    /// Client nonce, at least 32 bytes under secure policies.
    #[serde(default, rename = "clientNonce")]
    pub client_nonce: ByteString,
    /// DER client certificate.
    #[serde(default, rename = "clientCertificate")]
    pub client_certificate: ByteString,
    /// Requested session timeout in milliseconds.
    #[serde(rename = "requestedSessionTimeout")]
    pub requested_session_timeout: f64,
    /// Largest response message the client accepts.
    #[serde(default, rename = "maxResponseMessageSize")]
    pub max_response_message_size: u32,
}

/// CreateSession service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// The assigned session id.
    #[serde(rename = "sessionId")]
    pub session_id: NodeId,
    /// The token that authenticates subsequent requests.
    #[serde(rename = "authenticationToken")]
    pub authentication_token: NodeId,
    /// The granted session timeout in milliseconds.
    #[serde(rename = "revisedSessionTimeout")]
    pub revised_session_timeout: f64,
    /// Fresh server nonce.
    #[serde(rename = "serverNonce")]
    pub server_nonce: ByteString,
    /// DER server certificate.
    #[serde(rename = "serverCertificate")]
    pub server_certificate: ByteString,
    /// All endpoints of this server.
    #[serde(rename = "serverEndpoints")]
    pub server_endpoints: Vec<EndpointDescription>,
    /// Proof of possession over clientCertificate || clientNonce.
    #[serde(rename = "serverSignature")]
    pub server_signature: SignatureData,
    /// Largest request message the server accepts; 0 means no limit.
    #[serde(default, rename = "maxRequestMessageSize")]
    pub max_request_message_size: u32,
}

/// A user identity token supplied on ActivateSession.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tokenType", rename_all = "camelCase")]
pub enum UserIdentityToken {
    /// Anonymous token.
    Anonymous {
        /// Endpoint policy id.
        #[serde(rename = "policyId")]
        policy_id: String,
    },
    /// User name and encrypted password.
    UserName {
        /// Endpoint policy id.
        #[serde(rename = "policyId")]
        policy_id: String,
        /// The user name.
        #[serde(rename = "userName")]
        user_name: String,
        /// The encrypted password blob.
        password: ByteString,
        /// Key-wrap algorithm URI used to encrypt the password.
        #[serde(default, rename = "encryptionAlgorithm")]
        encryption_algorithm: String,
    },
    /// X.509 certificate token.
    X509 {
        /// Endpoint policy id.
        #[serde(rename = "policyId")]
        policy_id: String,
        /// DER user certificate.
        #[serde(rename = "certificateData")]
        certificate_data: ByteString,
    },
    /// Externally issued token.
    Issued {
        /// Endpoint policy id.
        #[serde(rename = "policyId")]
        policy_id: String,
        /// Opaque token data.
        #[serde(rename = "tokenData")]
        token_data: ByteString,
    },
}

impl Default for UserIdentityToken {
    fn default() -> Self {
        UserIdentityToken::Anonymous { policy_id: String::new() }
    }
}

/// A validated user identity, recorded on the session.
#[derive(Debug, Clone, PartialEq)]
pub enum UserIdentity {
    /// Anonymous user.
    Anonymous,
    /// User authenticated by name and password.
    UserName {
        /// The user name.
        user_name: String,
        /// The decrypted password.
        password: String,
    },
    /// User authenticated by certificate.
    X509 {
        /// DER user certificate.
        certificate: ByteString,
    },
    /// User authenticated by an issued token.
    Issued {
        /// Opaque token data.
        token_data: ByteString,
    },
}

/// ActivateSession service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ActivateSessionRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// Proof of possession over serverCertificate || serverNonce.
    #[serde(rename = "clientSignature")]
    pub client_signature: SignatureData,
    /// Requested locales, most preferred first.
    #[serde(default, rename = "localeIds")]
    pub locale_ids: Vec<String>,
    /// The identity to bind to the session.
    #[serde(rename = "userIdentityToken")]
    pub user_identity_token: UserIdentityToken,
    /// Signature over serverCertificate || serverNonce with the user-token
    /// certificate; only for X509 tokens.
    #[serde(default, rename = "userTokenSignature")]
    pub user_token_signature: SignatureData,
}

/// ActivateSession service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivateSessionResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Fresh server nonce.
    #[serde(rename = "serverNonce")]
    pub server_nonce: ByteString,
    /// Per-software-certificate results; unused.
    #[serde(default)]
    pub results: Vec<StatusCode>,
}

/// CloseSession service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CloseSessionRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// Whether to delete the session's subscriptions.
    #[serde(default, rename = "deleteSubscriptions")]
    pub delete_subscriptions: bool,
}

/// CloseSession service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseSessionResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
}

/// Cancel service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CancelRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// Handle of the requests to cancel.
    #[serde(default, rename = "requestHandle")]
    pub cancel_request_handle: u32,
}

/// Cancel service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Number of cancelled requests; always 0 here.
    #[serde(default, rename = "cancelCount")]
    pub cancel_count: u32,
}

// =============================================================================
// View services
// =============================================================================

/// Identifies a view to browse in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ViewDescription {
    /// Id of the view node; `None` browses the whole address space.
    #[serde(default, rename = "viewId")]
    pub view_id: Option<NodeId>,
}

/// One node-to-browse entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseDescription {
    /// The starting node.
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    /// Raw direction value; validated by the service.
    #[serde(rename = "browseDirection")]
    pub browse_direction: u32,
    /// Restrict to this reference type; `None` admits all.
    #[serde(default, rename = "referenceTypeId")]
    pub reference_type_id: Option<NodeId>,
    /// Also admit subtypes of the reference type.
    #[serde(default, rename = "includeSubtypes")]
    pub include_subtypes: bool,
    /// Restrict targets by node class; 0 admits all.
    #[serde(default, rename = "nodeClassMask")]
    pub node_class_mask: u32,
    /// Which ReferenceDescription fields to fill in.
    #[serde(default, rename = "resultMask")]
    pub result_mask: u32,
}

/// A reference discovered by Browse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReferenceDescription {
    /// Reference type id, when selected by the result mask.
    #[serde(default, rename = "referenceTypeId")]
    pub reference_type_id: Option<NodeId>,
    /// Direction flag, when selected by the result mask.
    #[serde(default, rename = "isForward")]
    pub is_forward: bool,
    /// The target node.
    #[serde(rename = "nodeId")]
    pub node_id: ExpandedNodeId,
    /// Browse name, when selected.
    #[serde(default, rename = "browseName")]
    pub browse_name: QualifiedName,
    /// Display name, when selected.
    #[serde(default, rename = "displayName")]
    pub display_name: LocalizedText,
    /// Node class, when selected.
    #[serde(default, rename = "nodeClass")]
    pub node_class: NodeClass,
    /// Type definition, when selected.
    #[serde(default, rename = "typeDefinition")]
    pub type_definition: ExpandedNodeId,
}

/// Per-entry Browse outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrowseResult {
    /// The entry outcome.
    #[serde(rename = "statusCode")]
    pub status_code: StatusCode,
    /// Token resuming a truncated result; empty when complete.
    #[serde(default, rename = "continuationPoint")]
    pub continuation_point: ByteString,
    /// The discovered references.
    #[serde(default)]
    pub references: Vec<ReferenceDescription>,
}

/// Browse service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrowseRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The view to browse in.
    #[serde(default)]
    pub view: ViewDescription,
    /// Cap on references per entry; 0 means no cap.
    #[serde(default, rename = "requestedMaxReferencesPerNode")]
    pub requested_max_references_per_node: u32,
    /// The entries to browse.
    #[serde(rename = "nodesToBrowse")]
    pub nodes_to_browse: Vec<BrowseDescription>,
}

/// Browse service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-entry results, in request order.
    pub results: Vec<BrowseResult>,
}

/// BrowseNext service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrowseNextRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// Drop the continuation points without producing results.
    #[serde(default, rename = "releaseContinuationPoints")]
    pub release_continuation_points: bool,
    /// The continuation points to resume.
    #[serde(rename = "continuationPoints")]
    pub continuation_points: Vec<ByteString>,
}

/// BrowseNext service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseNextResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-entry results, in request order.
    pub results: Vec<BrowseResult>,
}

/// One step of a relative path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RelativePathElement {
    /// Reference type to follow; `None` admits all.
    #[serde(default, rename = "referenceTypeId")]
    pub reference_type_id: Option<NodeId>,
    /// Follow the inverse direction.
    #[serde(default, rename = "isInverse")]
    pub is_inverse: bool,
    /// Also follow subtypes of the reference type.
    #[serde(default, rename = "includeSubtypes")]
    pub include_subtypes: bool,
    /// Browse name the target must carry.
    #[serde(rename = "targetName")]
    pub target_name: QualifiedName,
}

/// A starting node plus the path to walk from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrowsePath {
    /// The starting node.
    #[serde(rename = "startingNode")]
    pub starting_node: NodeId,
    /// The path elements.
    #[serde(rename = "relativePath")]
    pub relative_path: Vec<RelativePathElement>,
}

/// A resolved (or partially resolved) path target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrowsePathTarget {
    /// The target node.
    #[serde(rename = "targetId")]
    pub target_id: ExpandedNodeId,
    /// Remaining depth when resolution stopped early; `u32::MAX` when the
    /// whole path resolved.
    #[serde(rename = "remainingPathIndex")]
    pub remaining_path_index: u32,
}

/// Per-path outcome of TranslateBrowsePathsToNodeIds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrowsePathResult {
    /// The path outcome.
    #[serde(rename = "statusCode")]
    pub status_code: StatusCode,
    /// The resolved targets.
    #[serde(default)]
    pub targets: Vec<BrowsePathTarget>,
}

/// TranslateBrowsePathsToNodeIds service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TranslateBrowsePathsRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The paths to resolve.
    #[serde(rename = "browsePaths")]
    pub browse_paths: Vec<BrowsePath>,
}

/// TranslateBrowsePathsToNodeIds service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateBrowsePathsResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-path results, in request order.
    pub results: Vec<BrowsePathResult>,
}

/// RegisterNodes service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RegisterNodesRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The nodes to register.
    #[serde(rename = "nodesToRegister")]
    pub nodes_to_register: Vec<NodeId>,
}

/// RegisterNodes service response. The ids are echoed verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterNodesResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// The registered (echoed) ids.
    #[serde(rename = "registeredNodeIds")]
    pub registered_node_ids: Vec<NodeId>,
}

/// UnregisterNodes service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UnregisterNodesRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The nodes to unregister.
    #[serde(rename = "nodesToUnregister")]
    pub nodes_to_unregister: Vec<NodeId>,
}

/// UnregisterNodes service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnregisterNodesResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
}

// =============================================================================
// Attribute services
// =============================================================================

/// Identifies one attribute to read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReadValueId {
    /// The node.
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    /// The attribute id.
    #[serde(rename = "attributeId")]
    pub attribute_id: u32,
    /// Index range into array or string values; empty reads everything.
    #[serde(default, rename = "indexRange")]
    pub index_range: String,
    /// Requested data encoding; only the empty name is supported.
    #[serde(default, rename = "dataEncoding")]
    pub data_encoding: QualifiedName,
}

/// Read service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReadRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// Maximum acceptable age of the values in milliseconds.
    #[serde(default, rename = "maxAge")]
    pub max_age: f64,
    /// Raw timestamps-to-return value; validated by the service.
    #[serde(rename = "timestampsToReturn")]
    pub timestamps_to_return: u32,
    /// The attributes to read.
    #[serde(rename = "nodesToRead")]
    pub nodes_to_read: Vec<ReadValueId>,
}

/// Read service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-attribute values, in request order.
    pub results: Vec<DataValue>,
}

/// One attribute write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WriteValue {
    /// The node.
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    /// The attribute id.
    #[serde(rename = "attributeId")]
    pub attribute_id: u32,
    /// Index range to splice into; empty replaces the value.
    #[serde(default, rename = "indexRange")]
    pub index_range: String,
    /// The value to write.
    pub value: DataValue,
}

/// Write service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WriteRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The writes to perform.
    #[serde(rename = "nodesToWrite")]
    pub nodes_to_write: Vec<WriteValue>,
}

/// Write service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-write outcomes, in request order.
    pub results: Vec<StatusCode>,
}

// =============================================================================
// History services
// =============================================================================

/// Identifies one node to read history for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HistoryReadValueId {
    /// The node.
    #[serde(rename = "nodeId")]
    pub node_id: NodeId,
    /// Index range applied to each historical value.
    #[serde(default, rename = "indexRange")]
    pub index_range: String,
    /// Continuation point from a previous call.
    #[serde(default, rename = "continuationPoint")]
    pub continuation_point: ByteString,
}

/// The detail payload of a HistoryRead request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HistoryReadDetails {
    /// Read historical events.
    ReadEvent {
        /// Maximum values per node.
        #[serde(rename = "numValuesPerNode")]
        num_values_per_node: u32,
        /// Start of the time range.
        #[serde(rename = "startTime")]
        start_time: Option<DateTime<Utc>>,
        /// End of the time range.
        #[serde(rename = "endTime")]
        end_time: Option<DateTime<Utc>>,
    },
    /// Read raw or modified values.
    ReadRawModified {
        /// Read modified values instead of raw ones.
        #[serde(rename = "isReadModified")]
        is_read_modified: bool,
        /// Start of the time range.
        #[serde(rename = "startTime")]
        start_time: Option<DateTime<Utc>>,
        /// End of the time range.
        #[serde(rename = "endTime")]
        end_time: Option<DateTime<Utc>>,
        /// Maximum values per node.
        #[serde(rename = "numValuesPerNode")]
        num_values_per_node: u32,
        /// Return bounding values.
        #[serde(rename = "returnBounds")]
        return_bounds: bool,
    },
    /// Read processed (aggregated) values.
    ReadProcessed {
        /// Start of the time range.
        #[serde(rename = "startTime")]
        start_time: Option<DateTime<Utc>>,
        /// End of the time range.
        #[serde(rename = "endTime")]
        end_time: Option<DateTime<Utc>>,
        /// Width of each processing interval in milliseconds.
        #[serde(rename = "processingInterval")]
        processing_interval: f64,
        /// Aggregate type per node.
        #[serde(rename = "aggregateType")]
        aggregate_type: Vec<NodeId>,
    },
    /// Read values at specific times.
    ReadAtTime {
        /// The requested times.
        #[serde(rename = "reqTimes")]
        req_times: Vec<DateTime<Utc>>,
        /// Use simple bounds when no stored value matches.
        #[serde(rename = "useSimpleBounds")]
        use_simple_bounds: bool,
    },
}

/// Per-node outcome of HistoryRead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HistoryReadResult {
    /// The node outcome.
    #[serde(rename = "statusCode")]
    pub status_code: StatusCode,
    /// Continuation point for further values.
    #[serde(default, rename = "continuationPoint")]
    pub continuation_point: ByteString,
    /// The historical values.
    #[serde(default, rename = "historyData")]
    pub history_data: Vec<DataValue>,
}

/// HistoryRead service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryReadRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// What kind of history to read.
    #[serde(rename = "historyReadDetails")]
    pub history_read_details: HistoryReadDetails,
    /// Raw timestamps-to-return value; validated by the service.
    #[serde(rename = "timestampsToReturn")]
    pub timestamps_to_return: u32,
    /// Release the continuation points without producing results.
    #[serde(default, rename = "releaseContinuationPoints")]
    pub release_continuation_points: bool,
    /// The nodes to read history for.
    #[serde(rename = "nodesToRead")]
    pub nodes_to_read: Vec<HistoryReadValueId>,
}

/// HistoryRead service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryReadResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-node results, in request order.
    pub results: Vec<HistoryReadResult>,
}

// =============================================================================
// Method services
// =============================================================================

/// One method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CallMethodRequest {
    /// The object (or object type) the method belongs to.
    #[serde(rename = "objectId")]
    pub object_id: NodeId,
    /// The method node.
    #[serde(rename = "methodId")]
    pub method_id: NodeId,
    /// Input arguments.
    #[serde(default, rename = "inputArguments")]
    pub input_arguments: Vec<Variant>,
}

/// Per-invocation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CallMethodResult {
    /// The invocation outcome.
    #[serde(rename = "statusCode")]
    pub status_code: StatusCode,
    /// Per-input-argument validation results.
    #[serde(default, rename = "inputArgumentResults")]
    pub input_argument_results: Vec<StatusCode>,
    /// Output arguments produced by the method.
    #[serde(default, rename = "outputArguments")]
    pub output_arguments: Vec<Variant>,
}

/// Call service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CallRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The invocations to perform.
    #[serde(rename = "methodsToCall")]
    pub methods_to_call: Vec<CallMethodRequest>,
}

/// Call service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-invocation results, in request order.
    pub results: Vec<CallMethodResult>,
}

// =============================================================================
// Monitored item services
// =============================================================================

/// Filter applied to a monitored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MonitoringFilter {
    /// Data change filter for Value items.
    DataChange(DataChangeFilter),
    /// Event filter for EventNotifier items.
    Event(EventFilter),
}

/// Data-change reporting filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DataChangeFilter {
    /// What kind of change triggers a report.
    pub trigger: DataChangeTrigger,
    /// Raw deadband type; see [`crate::DeadbandType`].
    #[serde(default, rename = "deadbandType")]
    pub deadband_type: u32,
    /// Deadband magnitude.
    #[serde(default, rename = "deadbandValue")]
    pub deadband_value: f64,
}

/// Selects one event field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimpleAttributeOperand {
    /// The event type the path starts at.
    #[serde(rename = "typeDefinitionId")]
    pub type_definition_id: NodeId,
    /// Browse path from the event type to the field.
    #[serde(default, rename = "browsePath")]
    pub browse_path: Vec<QualifiedName>,
    /// The attribute to select.
    #[serde(rename = "attributeId")]
    pub attribute_id: u32,
}

/// Event reporting filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventFilter {
    /// The event fields to return.
    #[serde(default, rename = "selectClauses")]
    pub select_clauses: Vec<SimpleAttributeOperand>,
}

/// Requested monitoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MonitoringParameters {
    /// Client-side handle echoed in notifications.
    #[serde(rename = "clientHandle")]
    pub client_handle: u32,
    /// Requested sampling interval in milliseconds; -1 inherits the
    /// subscription's publishing interval.
    #[serde(rename = "samplingInterval")]
    pub sampling_interval: f64,
    /// Optional filter.
    #[serde(default)]
    pub filter: Option<MonitoringFilter>,
    /// Requested queue depth.
    #[serde(rename = "queueSize")]
    pub queue_size: u32,
    /// Drop the oldest entry when the queue is full.
    #[serde(rename = "discardOldest")]
    pub discard_oldest: bool,
}

/// One monitored item to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MonitoredItemCreateRequest {
    /// The attribute to monitor.
    #[serde(rename = "itemToMonitor")]
    pub item_to_monitor: ReadValueId,
    /// Initial monitoring mode.
    #[serde(rename = "monitoringMode")]
    pub monitoring_mode: MonitoringMode,
    /// Requested parameters.
    #[serde(rename = "requestedParameters")]
    pub requested_parameters: MonitoringParameters,
}

/// Per-item outcome of CreateMonitoredItems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MonitoredItemCreateResult {
    /// The item outcome.
    #[serde(rename = "statusCode")]
    pub status_code: StatusCode,
    /// Server-assigned monitored item id.
    #[serde(rename = "monitoredItemId")]
    pub monitored_item_id: u32,
    /// The granted sampling interval.
    #[serde(rename = "revisedSamplingInterval")]
    pub revised_sampling_interval: f64,
    /// The granted queue depth.
    #[serde(rename = "revisedQueueSize")]
    pub revised_queue_size: u32,
}

/// CreateMonitoredItems service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CreateMonitoredItemsRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The owning subscription.
    #[serde(rename = "subscriptionId")]
    pub subscription_id: u32,
    /// Raw timestamps-to-return value; validated by the service.
    #[serde(rename = "timestampsToReturn")]
    pub timestamps_to_return: u32,
    /// The items to create.
    #[serde(rename = "itemsToCreate")]
    pub items_to_create: Vec<MonitoredItemCreateRequest>,
}

/// CreateMonitoredItems service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMonitoredItemsResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-item results, in request order.
    pub results: Vec<MonitoredItemCreateResult>,
}

/// One monitored item to modify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MonitoredItemModifyRequest {
    /// The item to modify.
    #[serde(rename = "monitoredItemId")]
    pub monitored_item_id: u32,
    /// Requested parameters.
    #[serde(rename = "requestedParameters")]
    pub requested_parameters: MonitoringParameters,
}

/// Per-item outcome of ModifyMonitoredItems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MonitoredItemModifyResult {
    /// The item outcome.
    #[serde(rename = "statusCode")]
    pub status_code: StatusCode,
    /// The granted sampling interval.
    #[serde(rename = "revisedSamplingInterval")]
    pub revised_sampling_interval: f64,
    /// The granted queue depth.
    #[serde(rename = "revisedQueueSize")]
    pub revised_queue_size: u32,
}

/// ModifyMonitoredItems service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModifyMonitoredItemsRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The owning subscription.
    #[serde(rename = "subscriptionId")]
    pub subscription_id: u32,
    /// Raw timestamps-to-return value; validated by the service.
    #[serde(rename = "timestampsToReturn")]
    pub timestamps_to_return: u32,
    /// The items to modify.
    #[serde(rename = "itemsToModify")]
    pub items_to_modify: Vec<MonitoredItemModifyRequest>,
}

/// ModifyMonitoredItems service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyMonitoredItemsResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-item results, in request order.
    pub results: Vec<MonitoredItemModifyResult>,
}

/// SetMonitoringMode service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SetMonitoringModeRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The owning subscription.
    #[serde(rename = "subscriptionId")]
    pub subscription_id: u32,
    /// The mode to apply.
    #[serde(rename = "monitoringMode")]
    pub monitoring_mode: MonitoringMode,
    /// The items to change.
    #[serde(rename = "monitoredItemIds")]
    pub monitored_item_ids: Vec<u32>,
}

/// SetMonitoringMode service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetMonitoringModeResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-item results, in request order.
    pub results: Vec<StatusCode>,
}

/// SetTriggering service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SetTriggeringRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The owning subscription.
    #[serde(rename = "subscriptionId")]
    pub subscription_id: u32,
    /// The triggering item.
    #[serde(rename = "triggeringItemId")]
    pub triggering_item_id: u32,
    /// Links to add.
    #[serde(default, rename = "linksToAdd")]
    pub links_to_add: Vec<u32>,
    /// Links to remove.
    #[serde(default, rename = "linksToRemove")]
    pub links_to_remove: Vec<u32>,
}

/// SetTriggering service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetTriggeringResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-added-link results.
    #[serde(rename = "addResults")]
    pub add_results: Vec<StatusCode>,
    /// Per-removed-link results.
    #[serde(rename = "removeResults")]
    pub remove_results: Vec<StatusCode>,
}

/// DeleteMonitoredItems service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeleteMonitoredItemsRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The owning subscription.
    #[serde(rename = "subscriptionId")]
    pub subscription_id: u32,
    /// The items to delete.
    #[serde(rename = "monitoredItemIds")]
    pub monitored_item_ids: Vec<u32>,
}

/// DeleteMonitoredItems service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteMonitoredItemsResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-item results, in request order.
    pub results: Vec<StatusCode>,
}

// =============================================================================
// Subscription services
// =============================================================================

/// CreateSubscription service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CreateSubscriptionRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// Requested publishing interval in milliseconds.
    #[serde(rename = "requestedPublishingInterval")]
    pub requested_publishing_interval: f64,
    /// Requested lifetime in publishing intervals.
    #[serde(rename = "requestedLifetimeCount")]
    pub requested_lifetime_count: u32,
    /// Requested keep-alive in publishing intervals.
    #[serde(rename = "requestedMaxKeepAliveCount")]
    pub requested_max_keep_alive_count: u32,
    /// Cap on notifications per publish; 0 means no cap.
    #[serde(default, rename = "maxNotificationsPerPublish")]
    pub max_notifications_per_publish: u32,
    /// Start with publishing enabled.
    #[serde(rename = "publishingEnabled")]
    pub publishing_enabled: bool,
    /// Relative priority among the session's subscriptions.
    #[serde(default)]
    pub priority: u8,
}

/// CreateSubscription service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSubscriptionResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Server-assigned subscription id.
    #[serde(rename = "subscriptionId")]
    pub subscription_id: u32,
    /// The granted publishing interval.
    #[serde(rename = "revisedPublishingInterval")]
    pub revised_publishing_interval: f64,
    /// The granted lifetime count.
    #[serde(rename = "revisedLifetimeCount")]
    pub revised_lifetime_count: u32,
    /// The granted keep-alive count.
    #[serde(rename = "revisedMaxKeepAliveCount")]
    pub revised_max_keep_alive_count: u32,
}

/// ModifySubscription service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModifySubscriptionRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The subscription to modify.
    #[serde(rename = "subscriptionId")]
    pub subscription_id: u32,
    /// Requested publishing interval in milliseconds.
    #[serde(rename = "requestedPublishingInterval")]
    pub requested_publishing_interval: f64,
    /// Requested lifetime in publishing intervals.
    #[serde(rename = "requestedLifetimeCount")]
    pub requested_lifetime_count: u32,
    /// Requested keep-alive in publishing intervals.
    #[serde(rename = "requestedMaxKeepAliveCount")]
    pub requested_max_keep_alive_count: u32,
    /// Cap on notifications per publish; 0 means no cap.
    #[serde(default, rename = "maxNotificationsPerPublish")]
    pub max_notifications_per_publish: u32,
    /// Relative priority among the session's subscriptions.
    #[serde(default)]
    pub priority: u8,
}

/// ModifySubscription service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifySubscriptionResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// The granted publishing interval.
    #[serde(rename = "revisedPublishingInterval")]
    pub revised_publishing_interval: f64,
    /// The granted lifetime count.
    #[serde(rename = "revisedLifetimeCount")]
    pub revised_lifetime_count: u32,
    /// The granted keep-alive count.
    #[serde(rename = "revisedMaxKeepAliveCount")]
    pub revised_max_keep_alive_count: u32,
}

/// SetPublishingMode service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SetPublishingModeRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The publishing flag to apply.
    #[serde(rename = "publishingEnabled")]
    pub publishing_enabled: bool,
    /// The subscriptions to change.
    #[serde(rename = "subscriptionIds")]
    pub subscription_ids: Vec<u32>,
}

/// SetPublishingMode service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPublishingModeResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-subscription results, in request order.
    pub results: Vec<StatusCode>,
}

/// DeleteSubscriptions service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeleteSubscriptionsRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The subscriptions to delete.
    #[serde(rename = "subscriptionIds")]
    pub subscription_ids: Vec<u32>,
}

/// DeleteSubscriptions service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteSubscriptionsResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// Per-subscription results, in request order.
    pub results: Vec<StatusCode>,
}

// =============================================================================
// Publish
// =============================================================================

/// Acknowledges one retained notification message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SubscriptionAcknowledgement {
    /// The subscription.
    #[serde(rename = "subscriptionId")]
    pub subscription_id: u32,
    /// Sequence number being acknowledged.
    #[serde(rename = "sequenceNumber")]
    pub sequence_number: u32,
}

/// One monitored-item data change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredItemNotification {
    /// Client handle of the item.
    #[serde(rename = "clientHandle")]
    pub client_handle: u32,
    /// The sampled value.
    pub value: DataValue,
}

/// One monitored-item event report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFieldList {
    /// Client handle of the item.
    #[serde(rename = "clientHandle")]
    pub client_handle: u32,
    /// Selected event fields, in select-clause order.
    #[serde(rename = "eventFields")]
    pub event_fields: Vec<Variant>,
}

/// The payload of a notification message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NotificationData {
    /// Data-change notifications.
    DataChange {
        /// The changed items.
        #[serde(rename = "monitoredItems")]
        monitored_items: Vec<MonitoredItemNotification>,
    },
    /// Event notifications.
    Events {
        /// The event reports.
        events: Vec<EventFieldList>,
    },
    /// A subscription status change.
    StatusChange {
        /// The new status.
        status: StatusCode,
    },
}

/// A sequenced bundle of notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Sequence number within the subscription.
    #[serde(rename = "sequenceNumber")]
    pub sequence_number: u32,
    /// When the message was published.
    #[serde(rename = "publishTime")]
    pub publish_time: Option<DateTime<Utc>>,
    /// The notifications; empty for keep-alives.
    #[serde(default, rename = "notificationData")]
    pub notification_data: Vec<NotificationData>,
}

/// Publish service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PublishRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// Messages the client has received.
    #[serde(default, rename = "subscriptionAcknowledgements")]
    pub subscription_acknowledgements: Vec<SubscriptionAcknowledgement>,
}

/// Publish service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// The subscription the message belongs to.
    #[serde(rename = "subscriptionId")]
    pub subscription_id: u32,
    /// Sequence numbers still held for republish.
    #[serde(rename = "availableSequenceNumbers")]
    pub available_sequence_numbers: Vec<u32>,
    /// More notifications are ready beyond this message.
    #[serde(rename = "moreNotifications")]
    pub more_notifications: bool,
    /// The notification message.
    #[serde(rename = "notificationMessage")]
    pub notification_message: NotificationMessage,
    /// Per-acknowledgement results, in request order.
    pub results: Vec<StatusCode>,
}

/// Republish service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RepublishRequest {
    /// Common header.
    #[serde(rename = "requestHeader")]
    pub request_header: RequestHeader,
    /// The subscription to fetch from.
    #[serde(rename = "subscriptionId")]
    pub subscription_id: u32,
    /// Sequence number of the retained message.
    #[serde(rename = "retransmitSequenceNumber")]
    pub retransmit_sequence_number: u32,
}

/// Republish service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepublishResponse {
    /// Common header.
    #[serde(rename = "responseHeader")]
    pub response_header: ResponseHeader,
    /// The retained message.
    #[serde(rename = "notificationMessage")]
    pub notification_message: NotificationMessage,
}

// =============================================================================
// Dispatch enums
// =============================================================================

/// Every request the dispatcher understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceRequest {
    /// FindServers.
    FindServers(FindServersRequest),
    /// GetEndpoints.
    GetEndpoints(GetEndpointsRequest),
    /// CreateSession.
    CreateSession(Box<CreateSessionRequest>),
    /// ActivateSession.
    ActivateSession(Box<ActivateSessionRequest>),
    /// CloseSession.
    CloseSession(CloseSessionRequest),
    /// Cancel.
    Cancel(CancelRequest),
    /// Browse.
    Browse(BrowseRequest),
    /// BrowseNext.
    BrowseNext(BrowseNextRequest),
    /// TranslateBrowsePathsToNodeIds.
    TranslateBrowsePaths(TranslateBrowsePathsRequest),
    /// RegisterNodes.
    RegisterNodes(RegisterNodesRequest),
    /// UnregisterNodes.
    UnregisterNodes(UnregisterNodesRequest),
    /// Read.
    Read(ReadRequest),
    /// Write.
    Write(WriteRequest),
    /// HistoryRead.
    HistoryRead(Box<HistoryReadRequest>),
    /// Call.
    Call(CallRequest),
    /// CreateMonitoredItems.
    CreateMonitoredItems(CreateMonitoredItemsRequest),
    /// ModifyMonitoredItems.
    ModifyMonitoredItems(ModifyMonitoredItemsRequest),
    /// SetMonitoringMode.
    SetMonitoringMode(SetMonitoringModeRequest),
    /// SetTriggering.
    SetTriggering(SetTriggeringRequest),
    /// DeleteMonitoredItems.
    DeleteMonitoredItems(DeleteMonitoredItemsRequest),
    /// CreateSubscription.
    CreateSubscription(CreateSubscriptionRequest),
    /// ModifySubscription.
    ModifySubscription(ModifySubscriptionRequest),
    /// SetPublishingMode.
    SetPublishingMode(SetPublishingModeRequest),
    /// DeleteSubscriptions.
    DeleteSubscriptions(DeleteSubscriptionsRequest),
    /// Publish.
    Publish(PublishRequest),
    /// Republish.
    Republish(RepublishRequest),
}

impl ServiceRequest {
    /// The request header, independent of the concrete service.
    pub fn request_header(&self) -> &RequestHeader {
        match self {
            ServiceRequest::FindServers(r) => &r.request_header,
            ServiceRequest::GetEndpoints(r) => &r.request_header,
            ServiceRequest::CreateSession(r) => &r.request_header,
            ServiceRequest::ActivateSession(r) => &r.request_header,
            ServiceRequest::CloseSession(r) => &r.request_header,
            ServiceRequest::Cancel(r) => &r.request_header,
            ServiceRequest::Browse(r) => &r.request_header,
            ServiceRequest::BrowseNext(r) => &r.request_header,
            ServiceRequest::TranslateBrowsePaths(r) => &r.request_header,
            ServiceRequest::RegisterNodes(r) => &r.request_header,
            ServiceRequest::UnregisterNodes(r) => &r.request_header,
            ServiceRequest::Read(r) => &r.request_header,
            ServiceRequest::Write(r) => &r.request_header,
            ServiceRequest::HistoryRead(r) => &r.request_header,
            ServiceRequest::Call(r) => &r.request_header,
            ServiceRequest::CreateMonitoredItems(r) => &r.request_header,
            ServiceRequest::ModifyMonitoredItems(r) => &r.request_header,
            ServiceRequest::SetMonitoringMode(r) => &r.request_header,
            ServiceRequest::SetTriggering(r) => &r.request_header,
            ServiceRequest::DeleteMonitoredItems(r) => &r.request_header,
            ServiceRequest::CreateSubscription(r) => &r.request_header,
            ServiceRequest::ModifySubscription(r) => &r.request_header,
            ServiceRequest::SetPublishingMode(r) => &r.request_header,
            ServiceRequest::DeleteSubscriptions(r) => &r.request_header,
            ServiceRequest::Publish(r) => &r.request_header,
            ServiceRequest::Republish(r) => &r.request_header,
        }
    }
}

/// Every response the server writes back through a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResponse {
    /// A service-level fault.
    ServiceFault(ServiceFault),
    /// FindServers.
    FindServers(FindServersResponse),
    /// GetEndpoints.
    GetEndpoints(GetEndpointsResponse),
    /// CreateSession.
    CreateSession(Box<CreateSessionResponse>),
    /// ActivateSession.
    ActivateSession(ActivateSessionResponse),
    /// CloseSession.
    CloseSession(CloseSessionResponse),
    /// Cancel.
    Cancel(CancelResponse),
    /// Browse.
    Browse(BrowseResponse),
    /// BrowseNext.
    BrowseNext(BrowseNextResponse),
    /// TranslateBrowsePathsToNodeIds.
    TranslateBrowsePaths(TranslateBrowsePathsResponse),
    /// RegisterNodes.
    RegisterNodes(RegisterNodesResponse),
    /// UnregisterNodes.
    UnregisterNodes(UnregisterNodesResponse),
    /// Read.
    Read(ReadResponse),
    /// Write.
    Write(WriteResponse),
    /// HistoryRead.
    HistoryRead(HistoryReadResponse),
    /// Call.
    Call(CallResponse),
    /// CreateMonitoredItems.
    CreateMonitoredItems(CreateMonitoredItemsResponse),
    /// ModifyMonitoredItems.
    ModifyMonitoredItems(ModifyMonitoredItemsResponse),
    /// SetMonitoringMode.
    SetMonitoringMode(SetMonitoringModeResponse),
    /// SetTriggering.
    SetTriggering(SetTriggeringResponse),
    /// DeleteMonitoredItems.
    DeleteMonitoredItems(DeleteMonitoredItemsResponse),
    /// CreateSubscription.
    CreateSubscription(CreateSubscriptionResponse),
    /// ModifySubscription.
    ModifySubscription(ModifySubscriptionResponse),
    /// SetPublishingMode.
    SetPublishingMode(SetPublishingModeResponse),
    /// DeleteSubscriptions.
    DeleteSubscriptions(DeleteSubscriptionsResponse),
    /// Publish.
    Publish(Box<PublishResponse>),
    /// Republish.
    Republish(Box<RepublishResponse>),
}

impl ServiceResponse {
    /// The response header, independent of the concrete service.
    pub fn response_header(&self) -> &ResponseHeader {
        match self {
            ServiceResponse::ServiceFault(r) => &r.response_header,
            ServiceResponse::FindServers(r) => &r.response_header,
            ServiceResponse::GetEndpoints(r) => &r.response_header,
            ServiceResponse::CreateSession(r) => &r.response_header,
            ServiceResponse::ActivateSession(r) => &r.response_header,
            ServiceResponse::CloseSession(r) => &r.response_header,
            ServiceResponse::Cancel(r) => &r.response_header,
            ServiceResponse::Browse(r) => &r.response_header,
            ServiceResponse::BrowseNext(r) => &r.response_header,
            ServiceResponse::TranslateBrowsePaths(r) => &r.response_header,
            ServiceResponse::RegisterNodes(r) => &r.response_header,
            ServiceResponse::UnregisterNodes(r) => &r.response_header,
            ServiceResponse::Read(r) => &r.response_header,
            ServiceResponse::Write(r) => &r.response_header,
            ServiceResponse::HistoryRead(r) => &r.response_header,
            ServiceResponse::Call(r) => &r.response_header,
            ServiceResponse::CreateMonitoredItems(r) => &r.response_header,
            ServiceResponse::ModifyMonitoredItems(r) => &r.response_header,
            ServiceResponse::SetMonitoringMode(r) => &r.response_header,
            ServiceResponse::SetTriggering(r) => &r.response_header,
            ServiceResponse::DeleteMonitoredItems(r) => &r.response_header,
            ServiceResponse::CreateSubscription(r) => &r.response_header,
            ServiceResponse::ModifySubscription(r) => &r.response_header,
            ServiceResponse::SetPublishingMode(r) => &r.response_header,
            ServiceResponse::DeleteSubscriptions(r) => &r.response_header,
            ServiceResponse::Publish(r) => &r.response_header,
            ServiceResponse::Republish(r) => &r.response_header,
        }
    }

    /// Shorthand for building a fault response.
    pub fn fault(request_handle: u32, status: StatusCode) -> Self {
        ServiceResponse::ServiceFault(ServiceFault::new(request_handle, status))
    }
}
