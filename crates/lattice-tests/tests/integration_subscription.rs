//! End-to-end subscription tests: keep-alives, publish pairing, republish
//! and session teardown.

use std::time::Duration;

use lattice_tests::{TestHarness, VariableBuilder};
use lattice_ua::service::{
    CloseSessionRequest, CreateMonitoredItemsRequest, CreateSubscriptionRequest,
    MonitoredItemCreateRequest, MonitoringParameters, NotificationData, PublishRequest,
    ReadValueId, RepublishRequest, SubscriptionAcknowledgement, WriteRequest, WriteValue,
};
use lattice_ua::{
    attribute_id, ids::data_type_id, DataValue, MonitoringMode, NodeId, Scalar, ServiceRequest,
    ServiceResponse, StatusCode, TimestampsToReturn, Variant,
};

async fn create_subscription(
    harness: &TestHarness,
    publishing_interval: f64,
    lifetime: u32,
    keep_alive: u32,
) -> u32 {
    let response = harness
        .dispatch(ServiceRequest::CreateSubscription(CreateSubscriptionRequest {
            request_header: harness.header(30),
            requested_publishing_interval: publishing_interval,
            requested_lifetime_count: lifetime,
            requested_max_keep_alive_count: keep_alive,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        }))
        .await;
    match response {
        ServiceResponse::CreateSubscription(created) => created.subscription_id,
        other => panic!("create subscription failed: {:?}", other.response_header()),
    }
}

async fn create_value_item(harness: &TestHarness, subscription_id: u32, node_id: NodeId) -> u32 {
    let response = harness
        .dispatch(ServiceRequest::CreateMonitoredItems(CreateMonitoredItemsRequest {
            request_header: harness.header(31),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both as u32,
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId {
                    node_id,
                    attribute_id: attribute_id::VALUE,
                    ..Default::default()
                },
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 11,
                    sampling_interval: -1.0,
                    filter: None,
                    queue_size: 10,
                    discard_oldest: true,
                },
            }],
        }))
        .await;
    match response {
        ServiceResponse::CreateMonitoredItems(created) => {
            assert_eq!(created.results[0].status_code, StatusCode::GOOD);
            created.results[0].monitored_item_id
        }
        other => panic!("create monitored items failed: {:?}", other.response_header()),
    }
}

fn publish(harness: &TestHarness, acks: Vec<SubscriptionAcknowledgement>) -> ServiceRequest {
    ServiceRequest::Publish(PublishRequest {
        request_header: harness.header(32),
        subscription_acknowledgements: acks,
    })
}

async fn write_value(harness: &TestHarness, node_id: &NodeId, value: f64) {
    let response = harness
        .dispatch(ServiceRequest::Write(WriteRequest {
            request_header: harness.header(33),
            nodes_to_write: vec![WriteValue {
                node_id: node_id.clone(),
                attribute_id: attribute_id::VALUE,
                index_range: String::new(),
                value: DataValue::now(Variant::from(value)),
            }],
        }))
        .await;
    let ServiceResponse::Write(write) = response else { panic!("expected write") };
    assert_eq!(write.results[0], StatusCode::GOOD);
}

async fn next_publish_response(
    harness: &TestHarness,
    acks: Vec<SubscriptionAcknowledgement>,
) -> lattice_ua::service::PublishResponse {
    harness.dispatch_no_wait(publish(harness, acks)).await;
    let response = harness
        .channel
        .wait_for_response(Duration::from_secs(2))
        .await
        .expect("publish answered");
    match response {
        ServiceResponse::Publish(publish) => *publish,
        other => panic!("expected publish response: {:?}", other.response_header()),
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn keep_alive_carries_sequence_one() {
    let harness = TestHarness::activated().await;
    create_subscription(&harness, 100.0, 9, 3).await;

    harness.dispatch_no_wait(publish(&harness, Vec::new())).await;
    let response = harness
        .channel
        .wait_for_response(Duration::from_millis(1500))
        .await
        .expect("keep-alive published");

    let ServiceResponse::Publish(keep_alive) = response else {
        panic!("expected publish response")
    };
    assert_eq!(keep_alive.notification_message.sequence_number, 1);
    assert!(keep_alive.notification_message.notification_data.is_empty());
}

#[tokio::test]
async fn data_changes_flow_through_publish() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Line.Speed")
        .value(Variant::from(1.0f64))
        .data_type(data_type_id::DOUBLE)
        .build();
    harness.add_node(node);

    let subscription_id = create_subscription(&harness, 50.0, 100, 20).await;
    create_value_item(&harness, subscription_id, node_id.clone()).await;

    let first = next_publish_response(&harness, Vec::new()).await;
    assert_eq!(first.subscription_id, subscription_id);
    assert_eq!(first.notification_message.sequence_number, 1);
    match &first.notification_message.notification_data[0] {
        NotificationData::DataChange { monitored_items } => {
            assert_eq!(monitored_items.len(), 1);
            assert_eq!(monitored_items[0].client_handle, 11);
            assert_eq!(monitored_items[0].value.value, Variant::from(1.0f64));
        }
        other => panic!("expected data change, got {:?}", other),
    }

    write_value(&harness, &node_id, 2.5).await;
    let second = next_publish_response(&harness, Vec::new()).await;
    assert_eq!(second.notification_message.sequence_number, 2);
    match &second.notification_message.notification_data[0] {
        NotificationData::DataChange { monitored_items } => {
            assert_eq!(monitored_items[0].value.value, Variant::from(2.5f64));
        }
        other => panic!("expected data change, got {:?}", other),
    }
}

#[tokio::test]
async fn deadband_on_string_variable_is_rejected() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Line.Name")
        .value(Variant::from("conveyor"))
        .data_type(data_type_id::STRING)
        .build();
    harness.add_node(node);

    let subscription_id = create_subscription(&harness, 100.0, 100, 20).await;
    let response = harness
        .dispatch(ServiceRequest::CreateMonitoredItems(CreateMonitoredItemsRequest {
            request_header: harness.header(34),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both as u32,
            items_to_create: vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId {
                    node_id,
                    attribute_id: attribute_id::VALUE,
                    ..Default::default()
                },
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 12,
                    sampling_interval: -1.0,
                    filter: Some(lattice_ua::service::MonitoringFilter::DataChange(
                        lattice_ua::service::DataChangeFilter {
                            trigger: lattice_ua::DataChangeTrigger::StatusValue,
                            deadband_type: lattice_ua::DeadbandType::Absolute as u32,
                            deadband_value: 0.5,
                        },
                    )),
                    queue_size: 10,
                    discard_oldest: true,
                },
            }],
        }))
        .await;
    let ServiceResponse::CreateMonitoredItems(created) = response else {
        panic!("expected create monitored items")
    };
    assert_eq!(created.results[0].status_code, StatusCode::BAD_FILTER_NOT_ALLOWED);
}

#[tokio::test]
async fn republish_returns_and_removes_retained_messages() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Line.Counter")
        .value(Variant::from(0.0f64))
        .data_type(data_type_id::DOUBLE)
        .build();
    harness.add_node(node);

    let subscription_id = create_subscription(&harness, 50.0, 100, 20).await;
    create_value_item(&harness, subscription_id, node_id.clone()).await;

    // three published messages, seq 1..3
    let first = next_publish_response(&harness, Vec::new()).await;
    assert_eq!(first.notification_message.sequence_number, 1);
    write_value(&harness, &node_id, 1.0).await;
    let second = next_publish_response(&harness, Vec::new()).await;
    assert_eq!(second.notification_message.sequence_number, 2);
    write_value(&harness, &node_id, 2.0).await;
    let third = next_publish_response(&harness, Vec::new()).await;
    assert_eq!(third.notification_message.sequence_number, 3);

    // acknowledge only seq 2
    write_value(&harness, &node_id, 3.0).await;
    let acked = next_publish_response(
        &harness,
        vec![SubscriptionAcknowledgement { subscription_id, sequence_number: 2 }],
    )
    .await;
    assert_eq!(acked.results, vec![StatusCode::GOOD]);

    let response = harness
        .dispatch(ServiceRequest::Republish(RepublishRequest {
            request_header: harness.header(35),
            subscription_id,
            retransmit_sequence_number: 2,
        }))
        .await;
    assert_eq!(
        response.response_header().service_result,
        StatusCode::BAD_MESSAGE_NOT_AVAILABLE
    );

    let response = harness
        .dispatch(ServiceRequest::Republish(RepublishRequest {
            request_header: harness.header(36),
            subscription_id,
            retransmit_sequence_number: 3,
        }))
        .await;
    let ServiceResponse::Republish(republished) = response else {
        panic!("expected republish response")
    };
    assert_eq!(republished.notification_message.sequence_number, 3);

    // fetched messages are removed
    let response = harness
        .dispatch(ServiceRequest::Republish(RepublishRequest {
            request_header: harness.header(37),
            subscription_id,
            retransmit_sequence_number: 3,
        }))
        .await;
    assert_eq!(
        response.response_header().service_result,
        StatusCode::BAD_MESSAGE_NOT_AVAILABLE
    );
}

#[tokio::test]
async fn acknowledging_unknown_sequence_number_is_reported() {
    let harness = TestHarness::activated().await;
    let subscription_id = create_subscription(&harness, 100.0, 100, 20).await;

    harness
        .dispatch_no_wait(publish(
            &harness,
            vec![
                SubscriptionAcknowledgement { subscription_id, sequence_number: 99 },
                SubscriptionAcknowledgement { subscription_id: 9999, sequence_number: 1 },
            ],
        ))
        .await;
    // no notifications ready yet: the keep-alive eventually answers and
    // carries the acknowledgement results
    let response = harness
        .channel
        .wait_for_response(Duration::from_secs(3))
        .await
        .expect("publish answered");
    let ServiceResponse::Publish(answered) = response else { panic!("expected publish") };
    assert_eq!(
        answered.results,
        vec![
            StatusCode::BAD_SEQUENCE_NUMBER_UNKNOWN,
            StatusCode::BAD_SUBSCRIPTION_ID_INVALID
        ]
    );
}

#[tokio::test]
async fn close_session_cascades() {
    let harness = TestHarness::activated().await;
    let subscription_id = create_subscription(&harness, 5000.0, 100, 20).await;

    // park a publish request; nothing will be ready on a 5s interval
    harness.dispatch_no_wait(publish(&harness, Vec::new())).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.channel.response_count(), 0);

    let response = harness
        .dispatch(ServiceRequest::CloseSession(CloseSessionRequest {
            request_header: harness.header(38),
            delete_subscriptions: true,
        }))
        .await;

    // two responses race out: the drained publish fault and the close;
    // dispatch returned the first one recorded
    let mut responses = vec![response];
    if let Some(extra) = harness.channel.wait_for_response(Duration::from_secs(1)).await {
        responses.push(extra);
    }
    let drained = responses
        .iter()
        .find(|r| r.response_header().service_result == StatusCode::BAD_NO_SUBSCRIPTION);
    let closed = responses.iter().find(|r| matches!(r, ServiceResponse::CloseSession(_)));
    assert!(drained.is_some(), "parked publish drained with BadNoSubscription");
    assert!(closed.is_some(), "close session answered");

    assert!(harness.ctx.subscriptions.get(subscription_id).is_none());
    assert!(harness.ctx.sessions.get(&harness.auth_token).is_none());
}

#[tokio::test]
async fn expired_subscription_reports_status_change() {
    let harness = TestHarness::activated().await;
    let subscription_id = create_subscription(&harness, 20.0, 3, 1).await;

    // no publish requests: the lifetime counter runs out
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(harness.ctx.subscriptions.get(subscription_id).is_none());

    harness.dispatch_no_wait(publish(&harness, Vec::new())).await;
    let response = harness
        .channel
        .wait_for_response(Duration::from_secs(1))
        .await
        .expect("state change flushed");
    let ServiceResponse::Publish(flushed) = response else { panic!("expected publish") };
    assert_eq!(flushed.subscription_id, subscription_id);
    match &flushed.notification_message.notification_data[0] {
        NotificationData::StatusChange { status } => {
            assert_eq!(*status, StatusCode::BAD_TIMEOUT);
        }
        other => panic!("expected status change, got {:?}", other),
    }
}

#[tokio::test]
async fn publish_without_subscriptions_is_rejected() {
    let harness = TestHarness::activated().await;
    let response = harness.dispatch(publish(&harness, Vec::new())).await;
    assert_eq!(
        response.response_header().service_result,
        StatusCode::BAD_NO_SUBSCRIPTION
    );
}

#[tokio::test]
async fn monitored_item_queue_respects_scalar_filter_default() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Line.Static")
        .value(Variant::from(5.0f64))
        .data_type(data_type_id::DOUBLE)
        .build();
    harness.add_node(node);

    let subscription_id = create_subscription(&harness, 50.0, 100, 3).await;
    create_value_item(&harness, subscription_id, node_id.clone()).await;

    // first sample always reports
    let first = next_publish_response(&harness, Vec::new()).await;
    assert_eq!(first.notification_message.sequence_number, 1);

    // the value does not change: the next answer is a keep-alive carrying
    // the next unconsumed sequence number
    let second = next_publish_response(&harness, Vec::new()).await;
    assert!(second.notification_message.notification_data.is_empty());
    assert_eq!(second.notification_message.sequence_number, 2);
}

#[tokio::test]
async fn set_triggering_links_by_id() {
    let harness = TestHarness::activated().await;
    let (node_a, a) = VariableBuilder::new("Line.A").build();
    let (node_b, b) = VariableBuilder::new("Line.B").build();
    harness.add_node(a);
    harness.add_node(b);

    let subscription_id = create_subscription(&harness, 1000.0, 100, 20).await;
    let trigger = create_value_item(&harness, subscription_id, node_a).await;
    let linked = create_value_item(&harness, subscription_id, node_b).await;

    let response = harness
        .dispatch(ServiceRequest::SetTriggering(lattice_ua::service::SetTriggeringRequest {
            request_header: harness.header(39),
            subscription_id,
            triggering_item_id: trigger,
            links_to_add: vec![linked, 424242],
            links_to_remove: vec![],
        }))
        .await;
    let ServiceResponse::SetTriggering(set) = response else { panic!("expected set triggering") };
    assert_eq!(set.add_results, vec![StatusCode::GOOD, StatusCode::BAD_MONITORED_ITEM_ID_INVALID]);

    let response = harness
        .dispatch(ServiceRequest::SetTriggering(lattice_ua::service::SetTriggeringRequest {
            request_header: harness.header(40),
            subscription_id,
            triggering_item_id: trigger,
            links_to_add: vec![],
            links_to_remove: vec![linked, linked],
        }))
        .await;
    let ServiceResponse::SetTriggering(set) = response else { panic!("expected set triggering") };
    assert_eq!(
        set.remove_results,
        vec![StatusCode::GOOD, StatusCode::BAD_MONITORED_ITEM_ID_INVALID]
    );
}

#[tokio::test]
async fn delete_monitored_items_by_id() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Line.C").build();
    harness.add_node(node);

    let subscription_id = create_subscription(&harness, 1000.0, 100, 20).await;
    let item = create_value_item(&harness, subscription_id, node_id).await;

    let response = harness
        .dispatch(ServiceRequest::DeleteMonitoredItems(
            lattice_ua::service::DeleteMonitoredItemsRequest {
                request_header: harness.header(41),
                subscription_id,
                monitored_item_ids: vec![item, item],
            },
        ))
        .await;
    let ServiceResponse::DeleteMonitoredItems(deleted) = response else {
        panic!("expected delete monitored items")
    };
    assert_eq!(
        deleted.results,
        vec![StatusCode::GOOD, StatusCode::BAD_MONITORED_ITEM_ID_INVALID]
    );
}
