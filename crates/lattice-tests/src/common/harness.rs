//! The activated-server harness.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lattice_project::{NamespaceManager, Node, PluginRegistry, ProjectManager};
use lattice_server::{
    RolesProvider, ServerConfig, ServerContext, UaServer,
};
use lattice_ua::ids::role_id;
use lattice_ua::service::{
    ActivateSessionRequest, CreateSessionRequest, RequestHeader, UserIdentityToken,
};
use lattice_ua::{
    NodeId, ServiceRequest, ServiceResponse, StatusCode, UserIdentity,
};
use tempfile::TempDir;

use crate::common::mocks::MockChannel;

/// Grants every role to every identity; tests tighten access per node
/// through node-local role permissions.
struct AllRolesProvider;

#[async_trait]
impl RolesProvider for AllRolesProvider {
    async fn get_roles(
        &self,
        _identity: &UserIdentity,
        _application_uri: &str,
        _endpoint_url: &str,
    ) -> Result<Vec<NodeId>, StatusCode> {
        Ok(vec![
            role_id::ANONYMOUS,
            role_id::AUTHENTICATED_USER,
            role_id::OPERATOR,
            role_id::ENGINEER,
        ])
    }
}

/// A loaded server with one activated anonymous session on a mock
/// channel.
pub struct TestHarness {
    /// The server under test.
    pub server: UaServer,
    /// The shared context.
    pub ctx: Arc<ServerContext>,
    /// The mock channel the session is bound to.
    pub channel: Arc<MockChannel>,
    /// Authentication token of the activated session.
    pub auth_token: NodeId,
    next_request_id: parking_lot::Mutex<u32>,
    _project_dir: TempDir,
}

impl TestHarness {
    /// Builds a server over the default project and activates one
    /// anonymous session.
    pub async fn activated() -> Self {
        Self::activated_with_config(ServerConfig::default()).await
    }

    /// Same as [`TestHarness::activated`], with a custom configuration.
    pub async fn activated_with_config(config: ServerConfig) -> Self {
        let project_dir = TempDir::new().expect("project dir");
        let namespace = Arc::new(NamespaceManager::new(config.application_uri.clone()));
        let plugins = Arc::new(PluginRegistry::new());
        let project = Arc::new(ProjectManager::new(
            project_dir.path().join("project.json"),
            namespace.clone(),
            plugins,
        ));
        let mut ctx = ServerContext::new(config, namespace, project);
        ctx.roles_provider = Arc::new(AllRolesProvider);
        let ctx = Arc::new(ctx);
        let server = UaServer::new(ctx.clone());
        ctx.project.load();
        assert!(ctx.project.has_error().is_none(), "project must load");

        let channel = MockChannel::new(7);
        let harness = Self {
            server,
            ctx,
            channel,
            auth_token: NodeId::null(),
            next_request_id: parking_lot::Mutex::new(1),
            _project_dir: project_dir,
        };

        let mut harness = harness;
        harness.create_and_activate().await;
        harness
    }

    async fn create_and_activate(&mut self) {
        let create = CreateSessionRequest {
            request_header: RequestHeader { request_handle: 1, ..Default::default() },
            endpoint_url: "opc.tcp://localhost:4840".to_string(),
            session_name: "harness".to_string(),
            requested_session_timeout: 60_000.0,
            ..Default::default()
        };
        let response = self
            .dispatch(ServiceRequest::CreateSession(Box::new(create)))
            .await;
        let token = match response {
            ServiceResponse::CreateSession(response) => response.authentication_token.clone(),
            other => panic!("create session failed: {:?}", other.response_header()),
        };

        let activate = ActivateSessionRequest {
            request_header: RequestHeader {
                authentication_token: token.clone(),
                request_handle: 2,
                ..Default::default()
            },
            user_identity_token: UserIdentityToken::Anonymous {
                policy_id: "anonymous".to_string(),
            },
            ..Default::default()
        };
        let response = self
            .dispatch(ServiceRequest::ActivateSession(Box::new(activate)))
            .await;
        match response {
            ServiceResponse::ActivateSession(_) => {}
            other => panic!("activate session failed: {:?}", other.response_header()),
        }
        self.auth_token = token;
    }

    /// A request header bound to the harness session.
    pub fn header(&self, request_handle: u32) -> RequestHeader {
        RequestHeader {
            authentication_token: self.auth_token.clone(),
            request_handle,
            ..Default::default()
        }
    }

    /// Dispatches a request and returns the response written for it.
    pub async fn dispatch(&self, request: ServiceRequest) -> ServiceResponse {
        let request_id = {
            let mut next = self.next_request_id.lock();
            *next += 1;
            *next
        };
        self.server
            .dispatch(self.channel.clone() as Arc<dyn lattice_server::Channel>, request_id, request)
            .await;
        self.channel
            .wait_for_response(Duration::from_secs(2))
            .await
            .expect("response written")
    }

    /// Dispatches a request without waiting for a response; used for
    /// publish requests that park on the session.
    pub async fn dispatch_no_wait(&self, request: ServiceRequest) {
        let request_id = {
            let mut next = self.next_request_id.lock();
            *next += 1;
            *next
        };
        self.server
            .dispatch(self.channel.clone() as Arc<dyn lattice_server::Channel>, request_id, request)
            .await;
    }

    /// Indexes a prebuilt node into the namespace.
    pub fn add_node(&self, node: Node) {
        self.ctx.namespace.add_node(node).expect("node indexed");
    }
}
