//! Server capabilities and configuration.

use lattice_ua::{ids::role_id, permission, RolePermission};

/// Declared per-service operation limits. A request naming more operations
/// than its limit fails with BadTooManyOperations.
#[derive(Debug, Clone)]
pub struct OperationLimits {
    /// Max entries per Read.
    pub max_nodes_per_read: usize,
    /// Max entries per Write.
    pub max_nodes_per_write: usize,
    /// Max entries per Browse and BrowseNext.
    pub max_nodes_per_browse: usize,
    /// Max entries per TranslateBrowsePathsToNodeIds.
    pub max_nodes_per_translate: usize,
    /// Max entries per RegisterNodes and UnregisterNodes.
    pub max_nodes_per_register_nodes: usize,
    /// Max entries per Call.
    pub max_nodes_per_method_call: usize,
    /// Max entries per HistoryRead.
    pub max_nodes_per_history_read: usize,
    /// Max entries per monitored-item service.
    pub max_monitored_items_per_call: usize,
}

impl Default for OperationLimits {
    fn default() -> Self {
        Self {
            max_nodes_per_read: 1000,
            max_nodes_per_write: 1000,
            max_nodes_per_browse: 1000,
            max_nodes_per_translate: 1000,
            max_nodes_per_register_nodes: 1000,
            max_nodes_per_method_call: 1000,
            max_nodes_per_history_read: 1000,
            max_monitored_items_per_call: 1000,
        }
    }
}

/// Capabilities and limits the server enforces.
#[derive(Debug, Clone)]
pub struct ServerCapabilities {
    /// Per-service operation limits.
    pub operation_limits: OperationLimits,
    /// Longest admissible string value.
    pub max_string_length: usize,
    /// Longest admissible byte string value.
    pub max_byte_string_length: usize,
    /// Longest admissible array value.
    pub max_array_length: usize,
    /// Fastest supported sampling interval in milliseconds.
    pub min_supported_sample_rate: f64,
    /// Max concurrent sessions.
    pub max_sessions: usize,
    /// Max concurrent subscriptions.
    pub max_subscriptions: usize,
    /// Max browse continuation points per session.
    pub max_browse_continuation_points: usize,
    /// Retained notification messages per subscription.
    pub max_retransmission_queue_length: usize,
    /// Max queued values per monitored item.
    pub max_monitored_item_queue_size: u32,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            operation_limits: OperationLimits::default(),
            max_string_length: 65_535,
            max_byte_string_length: 65_535,
            max_array_length: 65_535,
            min_supported_sample_rate: 100.0,
            max_sessions: 100,
            max_subscriptions: 100,
            max_browse_continuation_points: 10,
            max_retransmission_queue_length: 10,
            max_monitored_item_queue_size: 1000,
        }
    }
}

/// Static server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The server's application URI; must appear in the certificate SANs.
    pub application_uri: String,
    /// The product URI.
    pub product_uri: String,
    /// Human-readable application name.
    pub application_name: String,
    /// Whether anonymous identities may activate sessions.
    pub allow_anonymous_identity: bool,
    /// Capabilities and limits.
    pub capabilities: ServerCapabilities,
    /// Default role permissions applied to nodes without their own.
    pub role_permissions: Vec<RolePermission>,
    /// Session nonce length in bytes; secure policies require client nonces
    /// of at least this length.
    pub nonce_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            application_uri: "urn:lattice:server".to_string(),
            product_uri: "urn:lattice".to_string(),
            application_name: "Lattice OPC UA Server".to_string(),
            allow_anonymous_identity: true,
            capabilities: ServerCapabilities::default(),
            role_permissions: default_role_permissions(),
            nonce_length: 32,
        }
    }
}

/// The default permission set: anonymous browses, authenticated users read,
/// operators write, engineers configure.
pub fn default_role_permissions() -> Vec<RolePermission> {
    vec![
        RolePermission::new(role_id::ANONYMOUS, permission::BROWSE),
        RolePermission::new(
            role_id::AUTHENTICATED_USER,
            permission::BROWSE | permission::READ | permission::READ_ROLE_PERMISSIONS,
        ),
        RolePermission::new(
            role_id::OPERATOR,
            permission::BROWSE
                | permission::READ
                | permission::WRITE
                | permission::READ_ROLE_PERMISSIONS
                | permission::RECEIVE_EVENTS
                | permission::CALL,
        ),
        RolePermission::new(
            role_id::ENGINEER,
            permission::BROWSE
                | permission::READ
                | permission::WRITE
                | permission::READ_ROLE_PERMISSIONS
                | permission::WRITE_HISTORIZING
                | permission::READ_HISTORY
                | permission::RECEIVE_EVENTS
                | permission::CALL,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_ua::is_permitted;

    #[test]
    fn defaults_are_sane() {
        let config = ServerConfig::default();
        assert!(config.allow_anonymous_identity);
        assert_eq!(config.nonce_length, 32);
        assert!(config.capabilities.operation_limits.max_nodes_per_read > 0);
    }

    #[test]
    fn default_permissions_grade_up() {
        let rps = default_role_permissions();
        let anon: Vec<_> = rps.iter().filter(|rp| rp.role_id == role_id::ANONYMOUS).cloned().collect();
        assert!(is_permitted(&anon, permission::BROWSE));
        assert!(!is_permitted(&anon, permission::WRITE));

        let eng: Vec<_> = rps.iter().filter(|rp| rp.role_id == role_id::ENGINEER).cloned().collect();
        assert!(is_permitted(&eng, permission::WRITE_HISTORIZING));
    }
}
