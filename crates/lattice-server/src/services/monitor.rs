//! The monitored-item services.

use std::sync::Arc;

use lattice_ua::service::{
    CreateMonitoredItemsRequest, CreateMonitoredItemsResponse, DataChangeFilter,
    DeleteMonitoredItemsRequest, DeleteMonitoredItemsResponse, ModifyMonitoredItemsRequest,
    ModifyMonitoredItemsResponse, MonitoredItemCreateRequest, MonitoredItemCreateResult,
    MonitoredItemModifyResult, MonitoringFilter, ResponseHeader, SetMonitoringModeRequest,
    SetMonitoringModeResponse, SetTriggeringRequest, SetTriggeringResponse,
};
use lattice_ua::{
    access_level, attribute_id, event_notifier, permission, DataChangeTrigger, DeadbandType,
    ServiceResponse, StatusCode, TimestampsToReturn,
};
use lattice_project::Node;

use crate::channel::Channel;
use crate::context::ServerContext;
use crate::monitored_item::{ItemEventListener, MonitoredItem};
use crate::server::bind_session;
use crate::services::attribute::validate_index_range;
use crate::services::user_permitted;
use crate::session::{ServiceKind, Session};
use crate::subscription::Subscription;

fn create_one_item(
    ctx: &ServerContext,
    session: &Arc<Session>,
    subscription: &Arc<Subscription>,
    item: &MonitoredItemCreateRequest,
    timestamps: TimestampsToReturn,
) -> MonitoredItemCreateResult {
    let bad = |status: StatusCode| MonitoredItemCreateResult {
        status_code: status,
        ..Default::default()
    };

    let node = match ctx.namespace.find_node(&item.item_to_monitor.node_id) {
        Some(node) => node,
        None => return bad(StatusCode::BAD_NODE_ID_UNKNOWN),
    };
    let attribute = item.item_to_monitor.attribute_id;
    if !node.is_attribute_id_valid(attribute) {
        return bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID);
    }
    let roles = session.user_roles();
    let defaults = ctx.role_permissions();
    let caps = &ctx.config.capabilities;

    match attribute {
        attribute_id::VALUE => {
            let variable = match &node {
                Node::Variable(variable) => variable,
                _ => return bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
            };
            if variable.access_level() & access_level::CURRENT_READ == 0 {
                return bad(StatusCode::BAD_NOT_READABLE);
            }
            if variable.user_access_level(&roles, defaults) & access_level::CURRENT_READ == 0 {
                return bad(StatusCode::BAD_USER_ACCESS_DENIED);
            }
            let range_status = validate_index_range(
                ctx,
                &item.item_to_monitor.index_range,
                &variable.data_type(),
                variable.value_rank(),
            );
            if range_status != StatusCode::GOOD {
                return bad(range_status);
            }

            // Value items default their filter to a status-value trigger
            let mut parameters = item.requested_parameters.clone();
            let filter = match parameters.filter.take() {
                None => DataChangeFilter {
                    trigger: DataChangeTrigger::StatusValue,
                    deadband_type: DeadbandType::None as u32,
                    deadband_value: 0.0,
                },
                Some(MonitoringFilter::DataChange(filter)) => filter,
                Some(MonitoringFilter::Event(_)) => {
                    return bad(StatusCode::BAD_FILTER_NOT_ALLOWED)
                }
            };
            if filter.deadband_type != DeadbandType::None as u32 {
                let dest_type = ctx.namespace.find_variant_type(&variable.data_type());
                if !dest_type.is_numeric() {
                    return bad(StatusCode::BAD_FILTER_NOT_ALLOWED);
                }
            }
            parameters.filter = Some(MonitoringFilter::DataChange(filter));

            let monitored = MonitoredItem::new(
                node.clone(),
                item.item_to_monitor.clone(),
                item.monitoring_mode,
                &parameters,
                timestamps,
                caps.min_supported_sample_rate,
                subscription.publishing_interval(),
                caps.max_monitored_item_queue_size,
            );
            let result = MonitoredItemCreateResult {
                status_code: StatusCode::GOOD,
                monitored_item_id: monitored.id(),
                revised_sampling_interval: monitored.sampling_interval(),
                revised_queue_size: monitored.queue_size(),
            };
            subscription.append_item(monitored);
            result
        }
        attribute_id::EVENT_NOTIFIER => {
            let object = match &node {
                Node::Object(object) => object,
                _ => return bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
            };
            if object.event_notifier() & event_notifier::SUBSCRIBE_TO_EVENTS == 0 {
                return bad(StatusCode::BAD_NOT_READABLE);
            }
            if !user_permitted(ctx, session, &node, permission::RECEIVE_EVENTS) {
                return bad(StatusCode::BAD_USER_ACCESS_DENIED);
            }
            if !matches!(item.requested_parameters.filter, Some(MonitoringFilter::Event(_))) {
                return bad(StatusCode::BAD_FILTER_NOT_ALLOWED);
            }

            let monitored = MonitoredItem::new(
                node.clone(),
                item.item_to_monitor.clone(),
                item.monitoring_mode,
                &item.requested_parameters,
                timestamps,
                0.0,
                subscription.publishing_interval(),
                caps.max_monitored_item_queue_size,
            );
            object.add_event_listener(
                u64::from(monitored.id()),
                ItemEventListener::new(&monitored),
            );
            let result = MonitoredItemCreateResult {
                status_code: StatusCode::GOOD,
                monitored_item_id: monitored.id(),
                revised_sampling_interval: monitored.sampling_interval(),
                revised_queue_size: monitored.queue_size(),
            };
            subscription.append_item(monitored);
            result
        }
        _ => {
            if !user_permitted(ctx, session, &node, permission::BROWSE) {
                return bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID);
            }
            if item.requested_parameters.filter.is_some() {
                return bad(StatusCode::BAD_FILTER_NOT_ALLOWED);
            }
            let monitored = MonitoredItem::new(
                node,
                item.item_to_monitor.clone(),
                item.monitoring_mode,
                &item.requested_parameters,
                timestamps,
                caps.min_supported_sample_rate,
                subscription.publishing_interval(),
                caps.max_monitored_item_queue_size,
            );
            let result = MonitoredItemCreateResult {
                status_code: StatusCode::GOOD,
                monitored_item_id: monitored.id(),
                revised_sampling_interval: monitored.sampling_interval(),
                revised_queue_size: monitored.queue_size(),
            };
            subscription.append_item(monitored);
            result
        }
    }
}

/// The CreateMonitoredItems service.
pub fn handle_create_monitored_items(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: CreateMonitoredItemsRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::CreateMonitoredItems,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::CreateMonitoredItems);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let subscription = match ctx.subscriptions.get(request.subscription_id) {
        Some(subscription) => subscription,
        None => return fail(StatusCode::BAD_SUBSCRIPTION_ID_INVALID),
    };
    subscription.reset_lifetime_counter();

    let timestamps = match TimestampsToReturn::from_u32(request.timestamps_to_return) {
        Some(policy) => policy,
        None => return fail(StatusCode::BAD_TIMESTAMPS_TO_RETURN_INVALID),
    };
    let count = request.items_to_create.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_monitored_items_per_call {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    let results = request
        .items_to_create
        .iter()
        .map(|item| create_one_item(ctx, &session, &subscription, item, timestamps))
        .collect();

    channel.write(
        ServiceResponse::CreateMonitoredItems(CreateMonitoredItemsResponse {
            response_header: ResponseHeader::good(handle),
            results,
        }),
        request_id,
    );
}

/// The ModifyMonitoredItems service.
pub fn handle_modify_monitored_items(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: ModifyMonitoredItemsRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::ModifyMonitoredItems,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::ModifyMonitoredItems);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let subscription = match ctx.subscriptions.get(request.subscription_id) {
        Some(subscription) => subscription,
        None => return fail(StatusCode::BAD_SUBSCRIPTION_ID_INVALID),
    };
    subscription.reset_lifetime_counter();

    if TimestampsToReturn::from_u32(request.timestamps_to_return).is_none() {
        return fail(StatusCode::BAD_TIMESTAMPS_TO_RETURN_INVALID);
    }
    let count = request.items_to_modify.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_monitored_items_per_call {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    let caps = &ctx.config.capabilities;
    let bad = |status: StatusCode| MonitoredItemModifyResult {
        status_code: status,
        ..Default::default()
    };
    let results = request
        .items_to_modify
        .iter()
        .map(|modify| match subscription.find_item(modify.monitored_item_id) {
            None => bad(StatusCode::BAD_MONITORED_ITEM_ID_INVALID),
            Some(item) => {
                let attribute = item.item_to_monitor().attribute_id;
                match attribute {
                    attribute_id::VALUE => {
                        if let Some(MonitoringFilter::Event(_)) = &modify.requested_parameters.filter
                        {
                            return bad(StatusCode::BAD_FILTER_NOT_ALLOWED);
                        }
                        if let Some(MonitoringFilter::DataChange(filter)) =
                            &modify.requested_parameters.filter
                        {
                            if filter.deadband_type != DeadbandType::None as u32 {
                                if let Some(variable) = item.node().as_variable() {
                                    let dest_type =
                                        ctx.namespace.find_variant_type(&variable.data_type());
                                    if !dest_type.is_numeric() {
                                        return bad(StatusCode::BAD_FILTER_NOT_ALLOWED);
                                    }
                                }
                            }
                        }
                        item.modify(
                            &modify.requested_parameters,
                            caps.min_supported_sample_rate,
                            subscription.publishing_interval(),
                            caps.max_monitored_item_queue_size,
                        )
                    }
                    attribute_id::EVENT_NOTIFIER => {
                        if let Some(MonitoringFilter::DataChange(_)) =
                            &modify.requested_parameters.filter
                        {
                            return bad(StatusCode::BAD_FILTER_NOT_ALLOWED);
                        }
                        item.modify(
                            &modify.requested_parameters,
                            0.0,
                            subscription.publishing_interval(),
                            caps.max_monitored_item_queue_size,
                        )
                    }
                    _ => {
                        if modify.requested_parameters.filter.is_some() {
                            return bad(StatusCode::BAD_FILTER_NOT_ALLOWED);
                        }
                        item.modify(
                            &modify.requested_parameters,
                            caps.min_supported_sample_rate,
                            subscription.publishing_interval(),
                            caps.max_monitored_item_queue_size,
                        )
                    }
                }
            }
        })
        .collect();

    channel.write(
        ServiceResponse::ModifyMonitoredItems(ModifyMonitoredItemsResponse {
            response_header: ResponseHeader::good(handle),
            results,
        }),
        request_id,
    );
}

/// The SetMonitoringMode service.
pub fn handle_set_monitoring_mode(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: SetMonitoringModeRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::SetMonitoringMode,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::SetMonitoringMode);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let subscription = match ctx.subscriptions.get(request.subscription_id) {
        Some(subscription) => subscription,
        None => return fail(StatusCode::BAD_SUBSCRIPTION_ID_INVALID),
    };
    subscription.reset_lifetime_counter();

    let count = request.monitored_item_ids.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_monitored_items_per_call {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    let results = request
        .monitored_item_ids
        .iter()
        .map(|id| match subscription.find_item(*id) {
            Some(item) => {
                item.set_monitoring_mode(request.monitoring_mode);
                StatusCode::GOOD
            }
            None => StatusCode::BAD_MONITORED_ITEM_ID_INVALID,
        })
        .collect();

    channel.write(
        ServiceResponse::SetMonitoringMode(SetMonitoringModeResponse {
            response_header: ResponseHeader::good(handle),
            results,
        }),
        request_id,
    );
}

/// The SetTriggering service.
pub fn handle_set_triggering(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: SetTriggeringRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::SetTriggering,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::SetTriggering);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let subscription = match ctx.subscriptions.get(request.subscription_id) {
        Some(subscription) => subscription,
        None => return fail(StatusCode::BAD_SUBSCRIPTION_ID_INVALID),
    };
    subscription.reset_lifetime_counter();

    if request.links_to_add.is_empty() && request.links_to_remove.is_empty() {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    let trigger = match subscription.find_item(request.triggering_item_id) {
        Some(trigger) => trigger,
        None => return fail(StatusCode::BAD_MONITORED_ITEM_ID_INVALID),
    };

    let remove_results = request
        .links_to_remove
        .iter()
        .map(|link| match subscription.find_item(*link) {
            None => StatusCode::BAD_MONITORED_ITEM_ID_INVALID,
            Some(_) => {
                if trigger.remove_triggered_item(*link) {
                    StatusCode::GOOD
                } else {
                    StatusCode::BAD_MONITORED_ITEM_ID_INVALID
                }
            }
        })
        .collect();
    let add_results = request
        .links_to_add
        .iter()
        .map(|link| match subscription.find_item(*link) {
            None => StatusCode::BAD_MONITORED_ITEM_ID_INVALID,
            Some(_) => {
                if trigger.add_triggered_item(*link) {
                    StatusCode::GOOD
                } else {
                    StatusCode::BAD_MONITORED_ITEM_ID_INVALID
                }
            }
        })
        .collect();

    channel.write(
        ServiceResponse::SetTriggering(SetTriggeringResponse {
            response_header: ResponseHeader::good(handle),
            add_results,
            remove_results,
        }),
        request_id,
    );
}

/// The DeleteMonitoredItems service.
pub fn handle_delete_monitored_items(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: DeleteMonitoredItemsRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::DeleteMonitoredItems,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::DeleteMonitoredItems);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let subscription = match ctx.subscriptions.get(request.subscription_id) {
        Some(subscription) => subscription,
        None => return fail(StatusCode::BAD_SUBSCRIPTION_ID_INVALID),
    };
    subscription.reset_lifetime_counter();

    let count = request.monitored_item_ids.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_monitored_items_per_call {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    let results = request
        .monitored_item_ids
        .iter()
        .map(|id| {
            if subscription.delete_item(*id) {
                StatusCode::GOOD
            } else {
                StatusCode::BAD_MONITORED_ITEM_ID_INVALID
            }
        })
        .collect();

    channel.write(
        ServiceResponse::DeleteMonitoredItems(DeleteMonitoredItemsResponse {
            response_header: ResponseHeader::good(handle),
            results,
        }),
        request_id,
    );
}
