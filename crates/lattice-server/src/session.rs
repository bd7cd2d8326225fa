//! Sessions and the session manager.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lattice_ua::service::{
    ApplicationDescription, NotificationMessage, ReferenceDescription,
};
use lattice_ua::{ByteString, NodeId, StatusCode, UserIdentity};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

use crate::channel::Channel;
use crate::security::next_nonce;

// =============================================================================
// Request counters
// =============================================================================

/// The services tracked by the per-session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ServiceKind {
    Cancel,
    CloseSession,
    Browse,
    BrowseNext,
    TranslateBrowsePaths,
    RegisterNodes,
    UnregisterNodes,
    Read,
    Write,
    HistoryRead,
    Call,
    CreateMonitoredItems,
    ModifyMonitoredItems,
    SetMonitoringMode,
    SetTriggering,
    DeleteMonitoredItems,
    CreateSubscription,
    ModifySubscription,
    SetPublishingMode,
    DeleteSubscriptions,
    Publish,
    Republish,
}

/// Monotonic per-session request bookkeeping. Counters are bumped on every
/// dispatcher branch; they are not linearized across sessions.
#[derive(Debug, Default)]
pub struct RequestCounters {
    total_requests: AtomicU32,
    total_errors: AtomicU32,
    per_service: Mutex<HashMap<ServiceKind, (u32, u32)>>,
}

impl RequestCounters {
    /// Records one request of `kind`.
    pub fn record_request(&self, kind: ServiceKind) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.per_service.lock().entry(kind).or_default().0 += 1;
    }

    /// Records one failed request of `kind`.
    pub fn record_error(&self, kind: ServiceKind) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        self.per_service.lock().entry(kind).or_default().1 += 1;
    }

    /// Total requests seen.
    pub fn total_requests(&self) -> u32 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Total failed requests seen.
    pub fn total_errors(&self) -> u32 {
        self.total_errors.load(Ordering::Relaxed)
    }

    /// `(requests, errors)` for one service.
    pub fn service(&self, kind: ServiceKind) -> (u32, u32) {
        self.per_service.lock().get(&kind).copied().unwrap_or_default()
    }
}

// =============================================================================
// Publish bookkeeping
// =============================================================================

/// A publish request parked on the session until a subscription has
/// notifications ready.
pub struct PendingPublish {
    /// The channel to answer on.
    pub channel: Arc<dyn Channel>,
    /// The transport request id.
    pub request_id: u32,
    /// The request handle to echo.
    pub request_handle: u32,
    /// The acknowledgement results computed when the request arrived.
    pub results: Vec<StatusCode>,
}

/// A queued subscription state change flushed by the next publish.
pub struct StateChange {
    /// The subscription the change belongs to.
    pub subscription_id: u32,
    /// The status-change notification message.
    pub message: NotificationMessage,
}

struct SessionState {
    session_nonce: ByteString,
    secure_channel_id: u32,
    user_identity: Option<UserIdentity>,
    user_roles: Vec<NodeId>,
    locale_ids: Vec<String>,
    last_access: Instant,
}

// =============================================================================
// Session
// =============================================================================

/// One client session.
pub struct Session {
    session_id: NodeId,
    session_name: String,
    authentication_token: NodeId,
    timeout: Duration,
    client_description: ApplicationDescription,
    endpoint_url: String,
    max_response_message_size: u32,
    state: Mutex<SessionState>,
    /// Per-service request bookkeeping.
    pub counters: RequestCounters,
    continuation_points: Mutex<HashMap<Vec<u8>, (Vec<ReferenceDescription>, usize)>>,
    publish_queue: Mutex<VecDeque<PendingPublish>>,
    state_changes: Mutex<VecDeque<StateChange>>,
}

impl Session {
    /// Creates a session. The nonce becomes the first server nonce returned
    /// by CreateSession.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: NodeId,
        session_name: String,
        authentication_token: NodeId,
        session_nonce: ByteString,
        timeout: Duration,
        client_description: ApplicationDescription,
        endpoint_url: String,
        max_response_message_size: u32,
    ) -> Self {
        Self {
            session_id,
            session_name,
            authentication_token,
            timeout,
            client_description,
            endpoint_url,
            max_response_message_size,
            state: Mutex::new(SessionState {
                session_nonce,
                secure_channel_id: 0,
                user_identity: None,
                user_roles: Vec::new(),
                locale_ids: Vec::new(),
                last_access: Instant::now(),
            }),
            counters: RequestCounters::default(),
            continuation_points: Mutex::new(HashMap::new()),
            publish_queue: Mutex::new(VecDeque::new()),
            state_changes: Mutex::new(VecDeque::new()),
        }
    }

    /// The session id.
    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    /// The session name.
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// The authentication token requests carry.
    pub fn authentication_token(&self) -> &NodeId {
        &self.authentication_token
    }

    /// The revised session timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The client application description.
    pub fn client_description(&self) -> &ApplicationDescription {
        &self.client_description
    }

    /// The endpoint URL the session was created against.
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Largest response the client accepts; 0 means unlimited.
    pub fn max_response_message_size(&self) -> u32 {
        self.max_response_message_size
    }

    /// Marks session activity, postponing expiry.
    pub fn touch(&self) {
        self.state.lock().last_access = Instant::now();
    }

    /// Returns `true` once the session timeout elapsed without activity.
    pub fn is_expired(&self) -> bool {
        self.state.lock().last_access.elapsed() > self.timeout
    }

    /// The current session nonce.
    pub fn session_nonce(&self) -> ByteString {
        self.state.lock().session_nonce.clone()
    }

    /// Rotates the session nonce.
    pub fn set_session_nonce(&self, nonce: ByteString) {
        self.state.lock().session_nonce = nonce;
    }

    /// The bound secure channel id; 0 before activation.
    pub fn secure_channel_id(&self) -> u32 {
        self.state.lock().secure_channel_id
    }

    /// Binds the session to a secure channel.
    pub fn set_secure_channel_id(&self, id: u32) {
        self.state.lock().secure_channel_id = id;
    }

    /// The validated user identity, after activation.
    pub fn user_identity(&self) -> Option<UserIdentity> {
        self.state.lock().user_identity.clone()
    }

    /// Records the validated user identity.
    pub fn set_user_identity(&self, identity: UserIdentity) {
        self.state.lock().user_identity = Some(identity);
    }

    /// The user's role node ids.
    pub fn user_roles(&self) -> Vec<NodeId> {
        self.state.lock().user_roles.clone()
    }

    /// Records the user's roles.
    pub fn set_user_roles(&self, roles: Vec<NodeId>) {
        self.state.lock().user_roles = roles;
    }

    /// The preferred locales, most preferred first.
    pub fn locale_ids(&self) -> Vec<String> {
        self.state.lock().locale_ids.clone()
    }

    /// Records the preferred locales.
    pub fn set_locale_ids(&self, locales: Vec<String>) {
        self.state.lock().locale_ids = locales;
    }

    // =========================================================================
    // Continuation points
    // =========================================================================

    /// Parks the tail of a truncated browse result, returning the opaque
    /// token. Fails once the session holds `cap` points.
    pub fn add_browse_continuation_point(
        &self,
        references: Vec<ReferenceDescription>,
        max_per_node: usize,
        cap: usize,
    ) -> Result<Vec<u8>, ()> {
        let mut points = self.continuation_points.lock();
        if points.len() >= cap {
            return Err(());
        }
        let token = next_nonce(16);
        points.insert(token.clone(), (references, max_per_node));
        Ok(token)
    }

    /// Retrieves and removes a continuation point.
    pub fn take_browse_continuation_point(
        &self,
        token: &[u8],
    ) -> Option<(Vec<ReferenceDescription>, usize)> {
        self.continuation_points.lock().remove(token)
    }

    // =========================================================================
    // Publish queue and state changes
    // =========================================================================

    /// Parks a publish request until a subscription becomes ready.
    pub fn add_publish_request(&self, pending: PendingPublish) {
        self.publish_queue.lock().push_back(pending);
    }

    /// Takes the oldest parked publish request.
    pub fn take_publish_request(&self) -> Option<PendingPublish> {
        self.publish_queue.lock().pop_front()
    }

    /// Drains every parked publish request.
    pub fn drain_publish_requests(&self) -> Vec<PendingPublish> {
        self.publish_queue.lock().drain(..).collect()
    }

    /// Queues a subscription state change for the next publish.
    pub fn push_state_change(&self, change: StateChange) {
        self.state_changes.lock().push_back(change);
    }

    /// Takes the oldest pending state change.
    pub fn pop_state_change(&self) -> Option<StateChange> {
        self.state_changes.lock().pop_front()
    }
}

// =============================================================================
// SessionManager
// =============================================================================

/// Sessions keyed by authentication token.
pub struct SessionManager {
    sessions: DashMap<NodeId, Arc<Session>>,
    max_sessions: usize,
}

impl SessionManager {
    /// Creates a manager admitting at most `max_sessions` sessions.
    pub fn new(max_sessions: usize) -> Self {
        Self { sessions: DashMap::new(), max_sessions }
    }

    /// Admits a session, failing with BadTooManySessions at capacity.
    pub fn add(&self, session: Arc<Session>) -> Result<(), StatusCode> {
        if self.sessions.len() >= self.max_sessions {
            return Err(StatusCode::BAD_TOO_MANY_SESSIONS);
        }
        self.sessions.insert(session.authentication_token().clone(), session);
        Ok(())
    }

    /// Resolves a session by authentication token, marking it active.
    pub fn get(&self, authentication_token: &NodeId) -> Option<Arc<Session>> {
        let session = self.sessions.get(authentication_token).map(|e| e.value().clone())?;
        session.touch();
        Some(session)
    }

    /// Removes a session.
    pub fn remove(&self, session: &Session) {
        self.sessions.remove(session.authentication_token());
        debug!(session = %session.session_id(), "session removed");
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` when no sessions exist.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Removes and returns every expired session.
    pub fn expire_stale(&self) -> Vec<Arc<Session>> {
        let stale: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .filter(|e| e.value().is_expired())
            .map(|e| e.value().clone())
            .collect();
        for session in &stale {
            self.sessions.remove(session.authentication_token());
        }
        stale
    }
}

/// Builds a fresh session the way CreateSession does: an opaque 15-byte
/// session id in namespace 1, an opaque authentication token and a nonce of
/// `nonce_length` bytes.
pub fn new_session(
    session_name: String,
    requested_timeout: Duration,
    client_description: ApplicationDescription,
    endpoint_url: String,
    max_response_message_size: u32,
    nonce_length: usize,
) -> Session {
    Session::new(
        NodeId::opaque(1, next_nonce(15)),
        session_name,
        NodeId::opaque(0, next_nonce(nonce_length)),
        ByteString::from(next_nonce(nonce_length)),
        requested_timeout,
        client_description,
        endpoint_url,
        max_response_message_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(timeout: Duration) -> Session {
        new_session(
            "test".to_string(),
            timeout,
            ApplicationDescription::default(),
            "opc.tcp://localhost:4840".to_string(),
            0,
            32,
        )
    }

    #[test]
    fn counters_are_monotonic() {
        let s = session(Duration::from_secs(60));
        s.counters.record_request(ServiceKind::Read);
        s.counters.record_request(ServiceKind::Read);
        s.counters.record_error(ServiceKind::Read);
        s.counters.record_request(ServiceKind::Browse);
        assert_eq!(s.counters.total_requests(), 3);
        assert_eq!(s.counters.total_errors(), 1);
        assert_eq!(s.counters.service(ServiceKind::Read), (2, 1));
        assert_eq!(s.counters.service(ServiceKind::Browse), (1, 0));
        assert_eq!(s.counters.service(ServiceKind::Write), (0, 0));
    }

    #[test]
    fn continuation_points_are_bounded_and_single_use() {
        let s = session(Duration::from_secs(60));
        let token = s
            .add_browse_continuation_point(Vec::new(), 10, 2)
            .expect("first point");
        let _second = s.add_browse_continuation_point(Vec::new(), 10, 2).expect("second point");
        assert!(s.add_browse_continuation_point(Vec::new(), 10, 2).is_err());

        assert!(s.take_browse_continuation_point(&token).is_some());
        assert!(s.take_browse_continuation_point(&token).is_none());
    }

    #[test]
    fn manager_capacity() {
        let manager = SessionManager::new(1);
        let first = Arc::new(session(Duration::from_secs(60)));
        let second = Arc::new(session(Duration::from_secs(60)));
        manager.add(first.clone()).unwrap();
        assert_eq!(manager.add(second), Err(StatusCode::BAD_TOO_MANY_SESSIONS));
        assert!(manager.get(first.authentication_token()).is_some());
        manager.remove(&first);
        assert!(manager.get(first.authentication_token()).is_none());
    }

    #[test]
    fn expiry_collects_stale_sessions() {
        let manager = SessionManager::new(10);
        let stale = Arc::new(session(Duration::from_millis(0)));
        let fresh = Arc::new(session(Duration::from_secs(60)));
        manager.add(stale.clone()).unwrap();
        manager.add(fresh.clone()).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let expired = manager.expire_stale();
        assert_eq!(expired.len(), 1);
        assert_eq!(manager.len(), 1);
    }
}
