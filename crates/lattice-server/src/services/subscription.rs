//! The subscription services and the publish/republish pairing.

use std::sync::Arc;

use lattice_ua::service::{
    CreateSubscriptionRequest, CreateSubscriptionResponse, DeleteSubscriptionsRequest,
    DeleteSubscriptionsResponse, ModifySubscriptionRequest, ModifySubscriptionResponse,
    PublishRequest, PublishResponse, RepublishRequest, RepublishResponse, ResponseHeader,
    SetPublishingModeRequest, SetPublishingModeResponse,
};
use lattice_ua::{ServiceResponse, StatusCode};
use tracing::debug;

use crate::channel::Channel;
use crate::context::ServerContext;
use crate::server::bind_session;
use crate::session::{PendingPublish, ServiceKind};
use crate::subscription::Subscription;

/// The CreateSubscription service.
pub fn handle_create_subscription(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: CreateSubscriptionRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::CreateSubscription,
    ) {
        Some(session) => session,
        None => return,
    };

    let subscription = Subscription::new(
        ctx.subscriptions.next_id(),
        session.clone(),
        request.requested_publishing_interval,
        request.requested_lifetime_count,
        request.requested_max_keep_alive_count,
        request.max_notifications_per_publish,
        request.publishing_enabled,
        request.priority,
        ctx.config.capabilities.max_retransmission_queue_length,
    );
    if let Err(status) = ctx.subscriptions.add(subscription.clone()) {
        session.counters.record_error(ServiceKind::CreateSubscription);
        channel.write(ServiceResponse::fault(handle, status), request_id);
        return;
    }
    subscription.start_publishing(ctx);
    debug!(subscription = subscription.id(), "subscription created");

    channel.write(
        ServiceResponse::CreateSubscription(CreateSubscriptionResponse {
            response_header: ResponseHeader::good(handle),
            subscription_id: subscription.id(),
            revised_publishing_interval: subscription.publishing_interval(),
            revised_lifetime_count: subscription.lifetime_count(),
            revised_max_keep_alive_count: subscription.max_keep_alive_count(),
        }),
        request_id,
    );
}

/// The ModifySubscription service.
pub fn handle_modify_subscription(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: ModifySubscriptionRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::ModifySubscription,
    ) {
        Some(session) => session,
        None => return,
    };

    let subscription = match ctx.subscriptions.get(request.subscription_id) {
        Some(subscription) => subscription,
        None => {
            session.counters.record_error(ServiceKind::ModifySubscription);
            channel.write(
                ServiceResponse::fault(handle, StatusCode::BAD_SUBSCRIPTION_ID_INVALID),
                request_id,
            );
            return;
        }
    };
    let (publishing_interval, lifetime_count, max_keep_alive_count) = subscription.modify(
        ctx,
        request.requested_publishing_interval,
        request.requested_lifetime_count,
        request.requested_max_keep_alive_count,
        request.max_notifications_per_publish,
        request.priority,
    );

    channel.write(
        ServiceResponse::ModifySubscription(ModifySubscriptionResponse {
            response_header: ResponseHeader::good(handle),
            revised_publishing_interval: publishing_interval,
            revised_lifetime_count: lifetime_count,
            revised_max_keep_alive_count: max_keep_alive_count,
        }),
        request_id,
    );
}

/// The SetPublishingMode service.
pub fn handle_set_publishing_mode(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: SetPublishingModeRequest,
) {
    let handle = request.request_header.request_handle;
    if bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::SetPublishingMode,
    )
    .is_none()
    {
        return;
    }

    let results = request
        .subscription_ids
        .iter()
        .map(|id| match ctx.subscriptions.get(*id) {
            Some(subscription) => {
                subscription.set_publishing_mode(request.publishing_enabled);
                StatusCode::GOOD
            }
            None => StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
        })
        .collect();

    channel.write(
        ServiceResponse::SetPublishingMode(SetPublishingModeResponse {
            response_header: ResponseHeader::good(handle),
            results,
        }),
        request_id,
    );
}

/// The DeleteSubscriptions service. When the session's last subscription
/// goes away, its parked publish requests drain with BadNoSubscription.
pub fn handle_delete_subscriptions(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: DeleteSubscriptionsRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::DeleteSubscriptions,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::DeleteSubscriptions);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    if request.subscription_ids.is_empty() {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }

    let results = request
        .subscription_ids
        .iter()
        .map(|id| match ctx.subscriptions.remove(*id) {
            Some(subscription) => {
                subscription.delete();
                StatusCode::GOOD
            }
            None => StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
        })
        .collect();

    if ctx.subscriptions.get_by_session(&session).is_empty() {
        for pending in session.drain_publish_requests() {
            pending.channel.write(
                ServiceResponse::fault(pending.request_handle, StatusCode::BAD_NO_SUBSCRIPTION),
                pending.request_id,
            );
        }
    }

    channel.write(
        ServiceResponse::DeleteSubscriptions(DeleteSubscriptionsResponse {
            response_header: ResponseHeader::good(handle),
            results,
        }),
        request_id,
    );
}

/// The Publish service: acknowledges retained messages, flushes pending
/// state changes, then matches the request to the highest-priority ready
/// subscription or parks it on the session.
pub fn handle_publish(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: PublishRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::Publish,
    ) {
        Some(session) => session,
        None => return,
    };

    // acknowledge first; results travel with whichever response answers
    let results: Vec<StatusCode> = request
        .subscription_acknowledgements
        .iter()
        .map(|ack| match ctx.subscriptions.get(ack.subscription_id) {
            Some(subscription) => {
                if subscription.acknowledge(ack.sequence_number) {
                    StatusCode::GOOD
                } else {
                    StatusCode::BAD_SEQUENCE_NUMBER_UNKNOWN
                }
            }
            None => StatusCode::BAD_SUBSCRIPTION_ID_INVALID,
        })
        .collect();

    // pending state changes are flushed immediately
    if let Some(change) = session.pop_state_change() {
        channel.write(
            ServiceResponse::Publish(Box::new(PublishResponse {
                response_header: ResponseHeader::good(handle),
                subscription_id: change.subscription_id,
                available_sequence_numbers: Vec::new(),
                more_notifications: false,
                notification_message: change.message,
                results,
            })),
            request_id,
        );
        return;
    }

    if ctx.subscriptions.is_empty() {
        session.counters.record_error(ServiceKind::Publish);
        channel.write(
            ServiceResponse::fault(handle, StatusCode::BAD_NO_SUBSCRIPTION),
            request_id,
        );
        return;
    }

    let mut subscriptions = ctx.subscriptions.get_by_session(&session);
    subscriptions.sort_by(|a, b| b.priority().cmp(&a.priority()));

    let mut pending = PendingPublish {
        channel: channel.clone(),
        request_id,
        request_handle: handle,
        results,
    };
    for subscription in &subscriptions {
        match subscription.handle_late_publish_request(pending) {
            Ok(()) => return,
            Err(returned) => pending = returned,
        }
    }
    session.add_publish_request(pending);
}

/// The Republish service: returns and removes the retained message for the
/// requested sequence number.
pub fn handle_republish(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: RepublishRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::Republish,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::Republish);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let subscription = match ctx.subscriptions.get(request.subscription_id) {
        Some(subscription) => subscription,
        None => return fail(StatusCode::BAD_SUBSCRIPTION_ID_INVALID),
    };

    match subscription.republish(request.retransmit_sequence_number) {
        Some(message) => channel.write(
            ServiceResponse::Republish(Box::new(RepublishResponse {
                response_header: ResponseHeader::good(handle),
                notification_message: message,
            })),
            request_id,
        ),
        None => fail(StatusCode::BAD_MESSAGE_NOT_AVAILABLE),
    }
}
