//! The server front: request dispatch and the session binding contract.

use std::sync::Arc;
use std::time::Duration;

use lattice_ua::service::RequestHeader;
use lattice_ua::{ServiceRequest, ServiceResponse, StatusCode};
use tracing::{debug, info};

use crate::channel::Channel;
use crate::context::ServerContext;
use crate::services;
use crate::session::{ServiceKind, Session};

/// The UA server: dispatches decoded requests from secure channels into
/// the service handlers.
pub struct UaServer {
    ctx: Arc<ServerContext>,
}

impl UaServer {
    /// Creates a server over its context.
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// The server context.
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Starts the background session-expiry sweep. Expired sessions lose
    /// their subscriptions and their parked publish requests are drained
    /// with BadNoSubscription.
    pub fn start_expiry_sweep(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                for session in ctx.sessions.expire_stale() {
                    debug!(session = %session.session_id(), "session expired");
                    for subscription in ctx.subscriptions.get_by_session(&session) {
                        ctx.subscriptions.remove(subscription.id());
                        subscription.delete();
                    }
                    for pending in session.drain_publish_requests() {
                        pending.channel.write(
                            ServiceResponse::fault(
                                pending.request_handle,
                                StatusCode::BAD_NO_SUBSCRIPTION,
                            ),
                            pending.request_id,
                        );
                    }
                }
            }
        })
    }

    /// Dispatches one decoded request. The response is written exactly once
    /// to `channel` under `request_id`.
    pub async fn dispatch(
        &self,
        channel: Arc<dyn Channel>,
        request_id: u32,
        request: ServiceRequest,
    ) {
        let ctx = &self.ctx;
        match request {
            ServiceRequest::FindServers(r) => {
                services::discovery::handle_find_servers(ctx, &channel, request_id, r)
            }
            ServiceRequest::GetEndpoints(r) => {
                services::discovery::handle_get_endpoints(ctx, &channel, request_id, r)
            }
            ServiceRequest::CreateSession(r) => {
                services::session::handle_create_session(ctx, &channel, request_id, *r)
            }
            ServiceRequest::ActivateSession(r) => {
                services::session::handle_activate_session(ctx, &channel, request_id, *r).await
            }
            ServiceRequest::CloseSession(r) => {
                services::session::handle_close_session(ctx, &channel, request_id, r)
            }
            ServiceRequest::Cancel(r) => {
                services::session::handle_cancel(ctx, &channel, request_id, r)
            }
            ServiceRequest::Browse(r) => {
                services::view::handle_browse(ctx, &channel, request_id, r).await
            }
            ServiceRequest::BrowseNext(r) => {
                services::view::handle_browse_next(ctx, &channel, request_id, r).await
            }
            ServiceRequest::TranslateBrowsePaths(r) => {
                services::view::handle_translate_browse_paths(ctx, &channel, request_id, r).await
            }
            ServiceRequest::RegisterNodes(r) => {
                services::view::handle_register_nodes(ctx, &channel, request_id, r)
            }
            ServiceRequest::UnregisterNodes(r) => {
                services::view::handle_unregister_nodes(ctx, &channel, request_id, r)
            }
            ServiceRequest::Read(r) => {
                services::attribute::handle_read(ctx, &channel, request_id, r).await
            }
            ServiceRequest::Write(r) => {
                services::attribute::handle_write(ctx, &channel, request_id, r).await
            }
            ServiceRequest::HistoryRead(r) => {
                services::attribute::handle_history_read(ctx, &channel, request_id, *r).await
            }
            ServiceRequest::Call(r) => {
                services::method::handle_call(ctx, &channel, request_id, r).await
            }
            ServiceRequest::CreateMonitoredItems(r) => {
                services::monitor::handle_create_monitored_items(ctx, &channel, request_id, r)
            }
            ServiceRequest::ModifyMonitoredItems(r) => {
                services::monitor::handle_modify_monitored_items(ctx, &channel, request_id, r)
            }
            ServiceRequest::SetMonitoringMode(r) => {
                services::monitor::handle_set_monitoring_mode(ctx, &channel, request_id, r)
            }
            ServiceRequest::SetTriggering(r) => {
                services::monitor::handle_set_triggering(ctx, &channel, request_id, r)
            }
            ServiceRequest::DeleteMonitoredItems(r) => {
                services::monitor::handle_delete_monitored_items(ctx, &channel, request_id, r)
            }
            ServiceRequest::CreateSubscription(r) => {
                services::subscription::handle_create_subscription(ctx, &channel, request_id, r)
            }
            ServiceRequest::ModifySubscription(r) => {
                services::subscription::handle_modify_subscription(ctx, &channel, request_id, r)
            }
            ServiceRequest::SetPublishingMode(r) => {
                services::subscription::handle_set_publishing_mode(ctx, &channel, request_id, r)
            }
            ServiceRequest::DeleteSubscriptions(r) => {
                services::subscription::handle_delete_subscriptions(ctx, &channel, request_id, r)
            }
            ServiceRequest::Publish(r) => {
                services::subscription::handle_publish(ctx, &channel, request_id, r)
            }
            ServiceRequest::Republish(r) => {
                services::subscription::handle_republish(ctx, &channel, request_id, r)
            }
        }
    }

    /// Starts the server: loads the project and begins sweeping sessions.
    pub fn start(&self) {
        info!(
            application_uri = %self.ctx.config.application_uri,
            "starting server"
        );
        self.ctx.project.load();
        self.start_expiry_sweep(Duration::from_secs(1));
    }
}

/// The dispatcher contract shared by every session-bound service, in
/// order: the discovery-only gate aborts the channel; an unknown
/// authentication token is BadSessionIdInvalid; a session never activated
/// is deleted and reported BadSessionNotActivated; a channel mismatch is
/// BadSecureChannelIdInvalid. Counters are bumped on every branch.
pub(crate) fn bind_session(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    header: &RequestHeader,
    kind: ServiceKind,
) -> Option<Arc<Session>> {
    if channel.is_discovery_only() {
        channel.abort(StatusCode::BAD_SECURITY_POLICY_REJECTED, "");
        return None;
    }
    let session = match ctx.sessions.get(&header.authentication_token) {
        Some(session) => session,
        None => {
            channel.write(
                ServiceResponse::fault(header.request_handle, StatusCode::BAD_SESSION_ID_INVALID),
                request_id,
            );
            return None;
        }
    };
    session.counters.record_request(kind);

    let bound_channel = session.secure_channel_id();
    if bound_channel == 0 {
        ctx.sessions.remove(&session);
        session.counters.record_error(kind);
        channel.write(
            ServiceResponse::fault(header.request_handle, StatusCode::BAD_SESSION_NOT_ACTIVATED),
            request_id,
        );
        return None;
    }
    if bound_channel != channel.channel_id() {
        session.counters.record_error(kind);
        channel.write(
            ServiceResponse::fault(
                header.request_handle,
                StatusCode::BAD_SECURE_CHANNEL_ID_INVALID,
            ),
            request_id,
        );
        return None;
    }
    Some(session)
}
