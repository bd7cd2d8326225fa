//! End-to-end service tests: dispatcher contract, browse, read, write and
//! translate.

use lattice_tests::{TestHarness, VariableBuilder};
use lattice_ua::ids::{data_type_id, reference_type_id, role_id};
use lattice_ua::service::{
    BrowseDescription, BrowsePath, BrowseRequest, ReadRequest, ReadValueId,
    RegisterNodesRequest, RelativePathElement, RequestHeader, TranslateBrowsePathsRequest,
    UnregisterNodesRequest, WriteRequest, WriteValue,
};
use lattice_ua::{
    attribute_id, browse_result_mask, permission, ByteString, DataValue, NodeId, QualifiedName,
    RolePermission, Scalar, ServiceRequest, ServiceResponse, StatusCode, TimestampsToReturn,
    ValueRank, Variant, VariantType,
};

fn read_request(header: RequestHeader, nodes: Vec<ReadValueId>) -> ServiceRequest {
    ServiceRequest::Read(ReadRequest {
        request_header: header,
        max_age: 0.0,
        timestamps_to_return: TimestampsToReturn::Both as u32,
        nodes_to_read: nodes,
    })
}

fn value_read(node_id: NodeId) -> ReadValueId {
    ReadValueId {
        node_id,
        attribute_id: attribute_id::VALUE,
        ..Default::default()
    }
}

// =============================================================================
// Dispatcher contract
// =============================================================================

#[tokio::test]
async fn unknown_token_is_session_id_invalid() {
    let harness = TestHarness::activated().await;
    let header = RequestHeader {
        authentication_token: NodeId::string(0, "bogus"),
        request_handle: 9,
        ..Default::default()
    };
    let response = harness
        .dispatch(read_request(header, vec![value_read(NodeId::string(0, "Root"))]))
        .await;
    assert_eq!(
        response.response_header().service_result,
        StatusCode::BAD_SESSION_ID_INVALID
    );
}

#[tokio::test]
async fn empty_request_is_nothing_to_do() {
    let harness = TestHarness::activated().await;
    let response = harness.dispatch(read_request(harness.header(3), Vec::new())).await;
    assert_eq!(
        response.response_header().service_result,
        StatusCode::BAD_NOTHING_TO_DO
    );
}

#[tokio::test]
async fn operation_limit_is_enforced() {
    let mut config = lattice_server::ServerConfig::default();
    config.capabilities.operation_limits.max_nodes_per_read = 2;
    let harness = TestHarness::activated_with_config(config).await;
    let nodes = (0..3).map(|_| value_read(NodeId::string(0, "Root"))).collect();
    let response = harness.dispatch(read_request(harness.header(3), nodes)).await;
    assert_eq!(
        response.response_header().service_result,
        StatusCode::BAD_TOO_MANY_OPERATIONS
    );
}

#[tokio::test]
async fn bad_timestamps_policy_is_rejected() {
    let harness = TestHarness::activated().await;
    let response = harness
        .dispatch(ServiceRequest::Read(ReadRequest {
            request_header: harness.header(4),
            max_age: 0.0,
            timestamps_to_return: 9,
            nodes_to_read: vec![value_read(NodeId::string(0, "Root"))],
        }))
        .await;
    assert_eq!(
        response.response_header().service_result,
        StatusCode::BAD_TIMESTAMPS_TO_RETURN_INVALID
    );
}

// =============================================================================
// Browse
// =============================================================================

#[tokio::test]
async fn browse_root_children_forward() {
    let harness = TestHarness::activated().await;
    let response = harness
        .dispatch(ServiceRequest::Browse(BrowseRequest {
            request_header: harness.header(5),
            view: Default::default(),
            requested_max_references_per_node: 0,
            nodes_to_browse: vec![BrowseDescription {
                node_id: NodeId::string(0, "Root"),
                browse_direction: 0,
                reference_type_id: Some(reference_type_id::ORGANIZES),
                include_subtypes: true,
                node_class_mask: 0,
                result_mask: browse_result_mask::ALL,
            }],
        }))
        .await;

    let ServiceResponse::Browse(browse) = response else {
        panic!("expected browse response");
    };
    assert_eq!(browse.results.len(), 1);
    let result = &browse.results[0];
    assert_eq!(result.status_code, StatusCode::GOOD);
    let names: Vec<&str> = result
        .references
        .iter()
        .map(|r| r.browse_name.name.as_str())
        .collect();
    assert_eq!(names, vec!["Connectivity", "Data Loggers", "Alarms"]);
    assert!(result.references.iter().all(|r| r.is_forward));
}

#[tokio::test]
async fn browse_paginates_with_continuation_points() {
    let harness = TestHarness::activated().await;
    let response = harness
        .dispatch(ServiceRequest::Browse(BrowseRequest {
            request_header: harness.header(6),
            view: Default::default(),
            requested_max_references_per_node: 2,
            nodes_to_browse: vec![BrowseDescription {
                node_id: NodeId::string(0, "Root"),
                browse_direction: 0,
                reference_type_id: Some(reference_type_id::ORGANIZES),
                include_subtypes: true,
                node_class_mask: 0,
                result_mask: browse_result_mask::ALL,
            }],
        }))
        .await;

    let ServiceResponse::Browse(browse) = response else { panic!("expected browse") };
    let first = &browse.results[0];
    assert_eq!(first.references.len(), 2);
    assert!(!first.continuation_point.is_empty());

    let response = harness
        .dispatch(ServiceRequest::BrowseNext(lattice_ua::service::BrowseNextRequest {
            request_header: harness.header(7),
            release_continuation_points: false,
            continuation_points: vec![first.continuation_point.clone()],
        }))
        .await;
    let ServiceResponse::BrowseNext(next) = response else { panic!("expected browse next") };
    assert_eq!(next.results[0].references.len(), 1);
    assert!(next.results[0].continuation_point.is_empty());

    // the point is single use
    let response = harness
        .dispatch(ServiceRequest::BrowseNext(lattice_ua::service::BrowseNextRequest {
            request_header: harness.header(8),
            release_continuation_points: false,
            continuation_points: vec![first.continuation_point.clone()],
        }))
        .await;
    let ServiceResponse::BrowseNext(next) = response else { panic!("expected browse next") };
    assert_eq!(next.results[0].status_code, StatusCode::BAD_CONTINUATION_POINT_INVALID);
}

#[tokio::test]
async fn browse_invalid_direction_is_per_item() {
    let harness = TestHarness::activated().await;
    let response = harness
        .dispatch(ServiceRequest::Browse(BrowseRequest {
            request_header: harness.header(9),
            view: Default::default(),
            requested_max_references_per_node: 0,
            nodes_to_browse: vec![BrowseDescription {
                node_id: NodeId::string(0, "Root"),
                browse_direction: 5,
                reference_type_id: None,
                include_subtypes: false,
                node_class_mask: 0,
                result_mask: 0,
            }],
        }))
        .await;
    let ServiceResponse::Browse(browse) = response else { panic!("expected browse") };
    assert_eq!(browse.results[0].status_code, StatusCode::BAD_BROWSE_DIRECTION_INVALID);
}

// =============================================================================
// Read
// =============================================================================

#[tokio::test]
async fn read_unreadable_variable() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Boiler.Temperature")
        .access_level(0)
        .role_permissions(vec![RolePermission::new(role_id::ANONYMOUS, permission::BROWSE)])
        .build();
    harness.add_node(node);

    let response = harness
        .dispatch(read_request(harness.header(10), vec![value_read(node_id)]))
        .await;
    let ServiceResponse::Read(read) = response else { panic!("expected read") };
    assert_eq!(read.results[0].status, StatusCode::BAD_NOT_READABLE);
}

#[tokio::test]
async fn read_access_denied_without_read_permission() {
    let harness = TestHarness::activated().await;
    // readable node, but every role only gets Browse
    let (node_id, node) = VariableBuilder::new("Boiler.Pressure")
        .role_permissions(vec![
            RolePermission::new(role_id::ANONYMOUS, permission::BROWSE),
            RolePermission::new(role_id::AUTHENTICATED_USER, permission::BROWSE),
            RolePermission::new(role_id::OPERATOR, permission::BROWSE),
            RolePermission::new(role_id::ENGINEER, permission::BROWSE),
        ])
        .build();
    harness.add_node(node);

    let response = harness
        .dispatch(read_request(harness.header(11), vec![value_read(node_id)]))
        .await;
    let ServiceResponse::Read(read) = response else { panic!("expected read") };
    assert_eq!(read.results[0].status, StatusCode::BAD_USER_ACCESS_DENIED);
}

#[tokio::test]
async fn read_value_and_metadata() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Boiler.Level").value(42.5f64).build();
    harness.add_node(node);

    let response = harness
        .dispatch(read_request(
            harness.header(12),
            vec![
                value_read(node_id.clone()),
                ReadValueId {
                    node_id: node_id.clone(),
                    attribute_id: attribute_id::BROWSE_NAME,
                    ..Default::default()
                },
                ReadValueId {
                    node_id: node_id.clone(),
                    attribute_id: attribute_id::DATA_TYPE,
                    ..Default::default()
                },
                ReadValueId {
                    node_id,
                    attribute_id: attribute_id::EXECUTABLE,
                    ..Default::default()
                },
            ],
        ))
        .await;
    let ServiceResponse::Read(read) = response else { panic!("expected read") };
    assert_eq!(read.results[0].value, Variant::from(42.5f64));
    assert_eq!(
        read.results[1].value,
        Variant::from(QualifiedName::new(0, "Boiler.Level"))
    );
    assert_eq!(read.results[2].value, Variant::from(data_type_id::DOUBLE));
    // Executable is not defined on variables
    assert_eq!(read.results[3].status, StatusCode::BAD_ATTRIBUTE_ID_INVALID);
}

#[tokio::test]
async fn read_with_index_range() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Boiler.Tag")
        .value(Variant::from("abcdef"))
        .data_type(data_type_id::STRING)
        .build();
    harness.add_node(node);

    let mut read_id = value_read(node_id);
    read_id.index_range = "1:3".to_string();
    let response = harness.dispatch(read_request(harness.header(13), vec![read_id])).await;
    let ServiceResponse::Read(read) = response else { panic!("expected read") };
    assert_eq!(read.results[0].value, Variant::from("bcd"));
}

#[tokio::test]
async fn read_neither_timestamps_clears_both() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Boiler.Flow").build();
    harness.add_node(node);

    let response = harness
        .dispatch(ServiceRequest::Read(ReadRequest {
            request_header: harness.header(14),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Neither as u32,
            nodes_to_read: vec![value_read(node_id)],
        }))
        .await;
    let ServiceResponse::Read(read) = response else { panic!("expected read") };
    assert!(read.results[0].source_timestamp.is_none());
    assert!(read.results[0].server_timestamp.is_none());
}

// =============================================================================
// Write
// =============================================================================

#[tokio::test]
async fn write_wrong_rank_is_type_mismatch() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Boiler.Setpoint")
        .value(Variant::from(1i32))
        .data_type(data_type_id::INT32)
        .build();
    harness.add_node(node);

    let array = Variant::array(
        VariantType::Int32,
        vec![Scalar::Int32(1), Scalar::Int32(2), Scalar::Int32(3)],
    );
    let response = harness
        .dispatch(ServiceRequest::Write(WriteRequest {
            request_header: harness.header(15),
            nodes_to_write: vec![WriteValue {
                node_id,
                attribute_id: attribute_id::VALUE,
                index_range: String::new(),
                value: DataValue::now(array),
            }],
        }))
        .await;
    let ServiceResponse::Write(write) = response else { panic!("expected write") };
    assert_eq!(write.results[0], StatusCode::BAD_TYPE_MISMATCH);
}

#[tokio::test]
async fn write_then_read_back() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Boiler.Target")
        .value(Variant::from(10i32))
        .data_type(data_type_id::INT32)
        .build();
    harness.add_node(node);

    let response = harness
        .dispatch(ServiceRequest::Write(WriteRequest {
            request_header: harness.header(16),
            nodes_to_write: vec![WriteValue {
                node_id: node_id.clone(),
                attribute_id: attribute_id::VALUE,
                index_range: String::new(),
                value: DataValue::now(Variant::from(77i32)),
            }],
        }))
        .await;
    let ServiceResponse::Write(write) = response else { panic!("expected write") };
    assert_eq!(write.results[0], StatusCode::GOOD);

    let response = harness
        .dispatch(read_request(harness.header(17), vec![value_read(node_id)]))
        .await;
    let ServiceResponse::Read(read) = response else { panic!("expected read") };
    assert_eq!(read.results[0].value, Variant::from(77i32));
}

#[tokio::test]
async fn write_byte_array_coerces_to_byte_string() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Boiler.Blob")
        .value(Variant::from(ByteString::from(vec![0u8; 3])))
        .data_type(data_type_id::BYTE_STRING)
        .build();
    harness.add_node(node);

    let bytes = Variant::array(
        VariantType::Byte,
        vec![Scalar::Byte(1), Scalar::Byte(2), Scalar::Byte(3)],
    );
    let response = harness
        .dispatch(ServiceRequest::Write(WriteRequest {
            request_header: harness.header(18),
            nodes_to_write: vec![WriteValue {
                node_id: node_id.clone(),
                attribute_id: attribute_id::VALUE,
                index_range: String::new(),
                value: DataValue::now(bytes),
            }],
        }))
        .await;
    let ServiceResponse::Write(write) = response else { panic!("expected write") };
    assert_eq!(write.results[0], StatusCode::GOOD);

    let response = harness
        .dispatch(read_request(harness.header(19), vec![value_read(node_id)]))
        .await;
    let ServiceResponse::Read(read) = response else { panic!("expected read") };
    assert_eq!(read.results[0].value, Variant::from(ByteString::from(vec![1u8, 2, 3])));
}

#[tokio::test]
async fn write_unknown_attribute_is_invalid() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Boiler.Mode").build();
    harness.add_node(node);

    let response = harness
        .dispatch(ServiceRequest::Write(WriteRequest {
            request_header: harness.header(20),
            nodes_to_write: vec![WriteValue {
                node_id,
                attribute_id: attribute_id::BROWSE_NAME,
                index_range: String::new(),
                value: DataValue::now(Variant::from("nope")),
            }],
        }))
        .await;
    let ServiceResponse::Write(write) = response else { panic!("expected write") };
    assert_eq!(write.results[0], StatusCode::BAD_ATTRIBUTE_ID_INVALID);
}

#[tokio::test]
async fn write_historizing_requires_permission_and_bool() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Boiler.Hist").build();
    harness.add_node(node);

    // engineer role grants WriteHistorizing in the default permission set
    let response = harness
        .dispatch(ServiceRequest::Write(WriteRequest {
            request_header: harness.header(21),
            nodes_to_write: vec![
                WriteValue {
                    node_id: node_id.clone(),
                    attribute_id: attribute_id::HISTORIZING,
                    index_range: String::new(),
                    value: DataValue::now(Variant::from(true)),
                },
                WriteValue {
                    node_id,
                    attribute_id: attribute_id::HISTORIZING,
                    index_range: String::new(),
                    value: DataValue::now(Variant::from(1i32)),
                },
            ],
        }))
        .await;
    let ServiceResponse::Write(write) = response else { panic!("expected write") };
    assert_eq!(write.results[0], StatusCode::GOOD);
    assert_eq!(write.results[1], StatusCode::BAD_TYPE_MISMATCH);
}

// =============================================================================
// Translate / register
// =============================================================================

#[tokio::test]
async fn translate_resolves_child_path() {
    let harness = TestHarness::activated().await;
    let response = harness
        .dispatch(ServiceRequest::TranslateBrowsePaths(TranslateBrowsePathsRequest {
            request_header: harness.header(22),
            browse_paths: vec![
                BrowsePath {
                    starting_node: NodeId::string(0, "Root"),
                    relative_path: vec![RelativePathElement {
                        reference_type_id: Some(reference_type_id::ORGANIZES),
                        is_inverse: false,
                        include_subtypes: true,
                        target_name: QualifiedName::new(0, "Connectivity"),
                    }],
                },
                BrowsePath {
                    starting_node: NodeId::string(0, "Root"),
                    relative_path: vec![RelativePathElement {
                        reference_type_id: None,
                        is_inverse: false,
                        include_subtypes: false,
                        target_name: QualifiedName::new(0, "NoSuchChild"),
                    }],
                },
                BrowsePath {
                    starting_node: NodeId::string(0, "Root"),
                    relative_path: Vec::new(),
                },
            ],
        }))
        .await;
    let ServiceResponse::TranslateBrowsePaths(translate) = response else {
        panic!("expected translate")
    };
    assert_eq!(translate.results[0].status_code, StatusCode::GOOD);
    assert_eq!(
        translate.results[0].targets[0].target_id.node_id,
        NodeId::string(0, "Root.Connectivity")
    );
    assert_eq!(translate.results[0].targets[0].remaining_path_index, u32::MAX);
    assert_eq!(translate.results[1].status_code, StatusCode::BAD_NO_MATCH);
    assert_eq!(translate.results[2].status_code, StatusCode::BAD_NOTHING_TO_DO);
}

#[tokio::test]
async fn register_nodes_echoes_inputs() {
    let harness = TestHarness::activated().await;
    let ids = vec![NodeId::string(0, "Root"), NodeId::numeric(2, 5), NodeId::string(3, "X")];
    let response = harness
        .dispatch(ServiceRequest::RegisterNodes(RegisterNodesRequest {
            request_header: harness.header(23),
            nodes_to_register: ids.clone(),
        }))
        .await;
    let ServiceResponse::RegisterNodes(registered) = response else {
        panic!("expected register nodes")
    };
    assert_eq!(registered.registered_node_ids, ids);

    let response = harness
        .dispatch(ServiceRequest::UnregisterNodes(UnregisterNodesRequest {
            request_header: harness.header(24),
            nodes_to_unregister: ids,
        }))
        .await;
    assert!(matches!(response, ServiceResponse::UnregisterNodes(_)));
}

// =============================================================================
// Value rank acceptance
// =============================================================================

#[tokio::test]
async fn scalar_write_into_array_variable_is_type_mismatch() {
    let harness = TestHarness::activated().await;
    let (node_id, node) = VariableBuilder::new("Boiler.Samples")
        .value(Variant::array(VariantType::Double, vec![Scalar::Double(0.0)]))
        .value_rank(ValueRank::OneDimension)
        .build();
    harness.add_node(node);

    let response = harness
        .dispatch(ServiceRequest::Write(WriteRequest {
            request_header: harness.header(25),
            nodes_to_write: vec![WriteValue {
                node_id,
                attribute_id: attribute_id::VALUE,
                index_range: String::new(),
                value: DataValue::now(Variant::from(1.5f64)),
            }],
        }))
        .await;
    let ServiceResponse::Write(write) = response else { panic!("expected write") };
    assert_eq!(write.results[0], StatusCode::BAD_TYPE_MISMATCH);
}
