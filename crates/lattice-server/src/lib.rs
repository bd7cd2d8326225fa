//! # lattice-server
//!
//! The OPC UA server core: the session and security layer, the service
//! dispatcher, the read/write and browse engines, and the subscription,
//! monitoring and publish machinery.
//!
//! Transport framing and wire encoding stay outside: requests arrive as
//! typed [`lattice_ua::ServiceRequest`] values through
//! [`UaServer::dispatch`], responses leave through the [`Channel`] trait.
//!
//! ```rust,ignore
//! let namespace = Arc::new(NamespaceManager::default());
//! let plugins = Arc::new(PluginRegistry::new());
//! let project = Arc::new(ProjectManager::new("project.json", namespace.clone(), plugins));
//! let ctx = Arc::new(ServerContext::new(ServerConfig::default(), namespace, project));
//! let server = UaServer::new(ctx);
//! server.start();
//! server.dispatch(channel, request_id, request).await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod context;
pub mod historian;
pub mod monitored_item;
pub mod security;
pub mod server;
pub mod services;
pub mod session;
pub mod subscription;

pub use channel::Channel;
pub use config::{default_role_permissions, OperationLimits, ServerCapabilities, ServerConfig};
pub use context::ServerContext;
pub use historian::Historian;
pub use monitored_item::{MonitoredItem, QueuedNotification};
pub use security::{
    DefaultRolesProvider, IssuedTokenAuthenticator, RolesProvider, SecurityError,
    UserNameAuthenticator, X509Authenticator,
};
pub use server::UaServer;
pub use session::{
    new_session, PendingPublish, RequestCounters, ServiceKind, Session, SessionManager,
    StateChange,
};
pub use subscription::{Subscription, SubscriptionManager};
