//! The server context: every manager and collaborator a service handler
//! needs, passed explicitly instead of living in process-wide globals.

use std::sync::Arc;

use lattice_project::{NamespaceManager, ProjectManager};
use lattice_ua::service::{ApplicationDescription, EndpointDescription};
use lattice_ua::{ByteString, LocalizedText, RolePermission};
use rsa::RsaPrivateKey;

use crate::config::ServerConfig;
use crate::historian::Historian;
use crate::security::{
    DefaultRolesProvider, IssuedTokenAuthenticator, RolesProvider, UserNameAuthenticator,
    X509Authenticator,
};
use crate::session::SessionManager;
use crate::subscription::SubscriptionManager;

/// Shared server state handed into every service and plugin call.
pub struct ServerContext {
    /// Static configuration and limits.
    pub config: ServerConfig,
    /// The flat address-space index.
    pub namespace: Arc<NamespaceManager>,
    /// The project manager owning the root.
    pub project: Arc<ProjectManager>,
    /// Live sessions.
    pub sessions: Arc<SessionManager>,
    /// Live subscriptions.
    pub subscriptions: Arc<SubscriptionManager>,
    /// The optional history backend.
    pub historian: Option<Arc<dyn Historian>>,
    /// DER server certificate.
    pub local_certificate: ByteString,
    /// The server's private key; `None` restricts the server to the None
    /// security policy.
    pub local_private_key: Option<RsaPrivateKey>,
    /// The advertised endpoints.
    pub endpoints: Vec<EndpointDescription>,
    /// Authenticator for user-name identities.
    pub user_name_authenticator: Option<Arc<dyn UserNameAuthenticator>>,
    /// Authenticator for X.509 identities.
    pub x509_authenticator: Option<Arc<dyn X509Authenticator>>,
    /// Authenticator for issued-token identities.
    pub issued_token_authenticator: Option<Arc<dyn IssuedTokenAuthenticator>>,
    /// Maps identities to roles.
    pub roles_provider: Arc<dyn RolesProvider>,
}

impl ServerContext {
    /// Creates a context over the given managers with default collaborators,
    /// seeding the standard type nodes into the namespace.
    pub fn new(
        config: ServerConfig,
        namespace: Arc<NamespaceManager>,
        project: Arc<ProjectManager>,
    ) -> Self {
        lattice_project::populate_standard_nodes(&namespace);
        let sessions = Arc::new(SessionManager::new(config.capabilities.max_sessions));
        let subscriptions =
            Arc::new(SubscriptionManager::new(config.capabilities.max_subscriptions));
        Self {
            config,
            namespace,
            project,
            sessions,
            subscriptions,
            historian: None,
            local_certificate: ByteString::new(),
            local_private_key: None,
            endpoints: Vec::new(),
            user_name_authenticator: None,
            x509_authenticator: None,
            issued_token_authenticator: None,
            roles_provider: Arc::new(DefaultRolesProvider),
        }
    }

    /// The server-wide default role permissions.
    pub fn role_permissions(&self) -> &[RolePermission] {
        &self.config.role_permissions
    }

    /// The namespace-URI table.
    pub fn namespace_uris(&self) -> Vec<String> {
        self.namespace.namespace_uris()
    }

    /// The server's application description.
    pub fn local_description(&self) -> ApplicationDescription {
        ApplicationDescription {
            application_uri: self.config.application_uri.clone(),
            product_uri: self.config.product_uri.clone(),
            application_name: LocalizedText::en(self.config.application_name.clone()),
            discovery_urls: self
                .endpoints
                .iter()
                .map(|ep| ep.endpoint_url.clone())
                .collect(),
        }
    }
}
