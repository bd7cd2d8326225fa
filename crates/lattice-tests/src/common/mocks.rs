//! A recording mock secure channel.

use std::sync::Arc;
use std::time::Duration;

use lattice_server::Channel;
use lattice_ua::service::{
    EndpointDescription, MessageSecurityMode, UserTokenPolicy, UserTokenType,
};
use lattice_ua::{SecurityPolicy, ServiceResponse, StatusCode};
use parking_lot::Mutex;

/// A channel that records everything the server writes.
pub struct MockChannel {
    channel_id: u32,
    endpoint: EndpointDescription,
    discovery_only: bool,
    responses: Mutex<Vec<(u32, ServiceResponse)>>,
    aborted: Mutex<Option<(StatusCode, String)>>,
}

impl MockChannel {
    /// Creates a channel over the None security policy with an anonymous
    /// and a user-name token policy.
    pub fn new(channel_id: u32) -> Arc<Self> {
        let endpoint = EndpointDescription {
            endpoint_url: "opc.tcp://localhost:4840".to_string(),
            security_mode: MessageSecurityMode::None,
            security_policy_uri: SecurityPolicy::None.uri().to_string(),
            user_identity_tokens: vec![
                UserTokenPolicy {
                    policy_id: "anonymous".to_string(),
                    token_type: UserTokenType::Anonymous,
                    security_policy_uri: String::new(),
                },
                UserTokenPolicy {
                    policy_id: "username".to_string(),
                    token_type: UserTokenType::UserName,
                    security_policy_uri: String::new(),
                },
            ],
            ..Default::default()
        };
        Arc::new(Self {
            channel_id,
            endpoint,
            discovery_only: false,
            responses: Mutex::new(Vec::new()),
            aborted: Mutex::new(None),
        })
    }

    /// Creates a discovery-only channel.
    pub fn discovery_only(channel_id: u32) -> Arc<Self> {
        let base = Self::new(channel_id);
        Arc::new(Self {
            channel_id: base.channel_id,
            endpoint: base.endpoint.clone(),
            discovery_only: true,
            responses: Mutex::new(Vec::new()),
            aborted: Mutex::new(None),
        })
    }

    /// Takes every recorded response.
    pub fn take_responses(&self) -> Vec<(u32, ServiceResponse)> {
        self.responses.lock().drain(..).collect()
    }

    /// Takes the oldest recorded response.
    pub fn pop_response(&self) -> Option<ServiceResponse> {
        let mut responses = self.responses.lock();
        if responses.is_empty() {
            None
        } else {
            Some(responses.remove(0).1)
        }
    }

    /// Number of recorded responses.
    pub fn response_count(&self) -> usize {
        self.responses.lock().len()
    }

    /// Polls until a response is recorded or `timeout` elapses.
    pub async fn wait_for_response(&self, timeout: Duration) -> Option<ServiceResponse> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(response) = self.pop_response() {
                return Some(response);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// The abort recorded on this channel, if any.
    pub fn abort_status(&self) -> Option<StatusCode> {
        self.aborted.lock().as_ref().map(|(status, _)| *status)
    }
}

impl Channel for MockChannel {
    fn write(&self, response: ServiceResponse, request_id: u32) {
        self.responses.lock().push((request_id, response));
    }

    fn abort(&self, status: StatusCode, reason: &str) {
        *self.aborted.lock() = Some((status, reason.to_string()));
    }

    fn channel_id(&self) -> u32 {
        self.channel_id
    }

    fn security_policy_uri(&self) -> String {
        self.endpoint.security_policy_uri.clone()
    }

    fn local_endpoint(&self) -> EndpointDescription {
        self.endpoint.clone()
    }

    fn remote_public_key(&self) -> Option<rsa::RsaPublicKey> {
        None
    }

    fn remote_application_uri(&self) -> String {
        "urn:lattice:test-client".to_string()
    }

    fn is_discovery_only(&self) -> bool {
        self.discovery_only
    }
}
