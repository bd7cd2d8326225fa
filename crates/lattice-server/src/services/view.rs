//! Browse, BrowseNext, TranslateBrowsePathsToNodeIds, RegisterNodes and
//! UnregisterNodes.

use std::sync::Arc;

use lattice_ua::service::{
    BrowseDescription, BrowseNextRequest, BrowseNextResponse, BrowsePath, BrowsePathResult,
    BrowsePathTarget, BrowseRequest, BrowseResponse, BrowseResult, ReferenceDescription,
    RegisterNodesRequest, RegisterNodesResponse, RelativePathElement, ResponseHeader,
    TranslateBrowsePathsRequest, TranslateBrowsePathsResponse, UnregisterNodesRequest,
    UnregisterNodesResponse,
};
use lattice_ua::{
    browse_result_mask, ids::reference_type_id, permission, BrowseDirection, ByteString,
    ExpandedNodeId, NodeClass, NodeId, ServiceResponse, StatusCode,
};
use tokio::task::JoinSet;

use crate::channel::Channel;
use crate::context::ServerContext;
use crate::server::bind_session;
use crate::services::user_permitted;
use crate::session::{ServiceKind, Session};

// =============================================================================
// Browse
// =============================================================================

/// Browses one description, producing the full (unpaginated) reference
/// list.
fn browse_node(
    ctx: &ServerContext,
    session: &Arc<Session>,
    description: &BrowseDescription,
) -> Result<Vec<ReferenceDescription>, StatusCode> {
    let direction = BrowseDirection::from_u32(description.browse_direction)
        .ok_or(StatusCode::BAD_BROWSE_DIRECTION_INVALID)?;
    let node = ctx
        .namespace
        .find_node(&description.node_id)
        .ok_or(StatusCode::BAD_NODE_ID_UNKNOWN)?;
    if !user_permitted(ctx, session, &node, permission::BROWSE) {
        return Err(StatusCode::BAD_NODE_ID_UNKNOWN);
    }

    let both = direction == BrowseDirection::Both;
    let want_inverse = direction == BrowseDirection::Inverse;
    let all_types = description.reference_type_id.is_none();
    let all_classes = description.node_class_mask == 0;

    if let Some(filter_id) = &description.reference_type_id {
        let filter_node = ctx
            .namespace
            .find_node(filter_id)
            .ok_or(StatusCode::BAD_REFERENCE_TYPE_ID_INVALID)?;
        if filter_node.node_class() != NodeClass::ReferenceType {
            return Err(StatusCode::BAD_REFERENCE_TYPE_ID_INVALID);
        }
    }

    let namespace_uris = ctx.namespace_uris();
    let mask = description.result_mask;
    let mut descriptions = Vec::new();

    for reference in node.references() {
        if !(both || reference.is_inverse == want_inverse) {
            continue;
        }
        if !all_types {
            let filter_id = description.reference_type_id.as_ref().unwrap();
            let matches = &reference.reference_type_id == filter_id
                || (description.include_subtypes
                    && ctx.namespace.is_subtype(&reference.reference_type_id, filter_id));
            if !matches {
                continue;
            }
        }
        let target_id = match reference.target_id.to_node_id(&namespace_uris) {
            Some(id) => id,
            None => continue,
        };
        let target = match ctx.namespace.find_node(&target_id) {
            Some(target) => target,
            None => return Err(StatusCode::BAD_NODE_ID_UNKNOWN),
        };
        if !user_permitted(ctx, session, &target, permission::BROWSE) {
            continue;
        }
        if !(all_classes || description.node_class_mask & target.node_class().mask() != 0) {
            continue;
        }

        // fields are zeroed unless selected by the result mask
        let reference_type_id = (mask & browse_result_mask::REFERENCE_TYPE_ID != 0)
            .then(|| reference.reference_type_id.clone());
        let is_forward = mask & browse_result_mask::IS_FORWARD != 0 && !reference.is_inverse;
        let node_class = if mask & browse_result_mask::NODE_CLASS != 0 {
            target.node_class()
        } else {
            NodeClass::Unspecified
        };
        let browse_name = if mask & browse_result_mask::BROWSE_NAME != 0 {
            target.browse_name()
        } else {
            Default::default()
        };
        let display_name = if mask & browse_result_mask::DISPLAY_NAME != 0 {
            target.display_name()
        } else {
            Default::default()
        };
        let type_definition = if mask & browse_result_mask::TYPE_DEFINITION != 0
            && matches!(target.node_class(), NodeClass::Object | NodeClass::Variable)
        {
            target
                .references()
                .into_iter()
                .find(|r| r.reference_type_id == reference_type_id::HAS_TYPE_DEFINITION)
                .map(|r| r.target_id)
                .unwrap_or_default()
        } else {
            ExpandedNodeId::default()
        };

        descriptions.push(ReferenceDescription {
            reference_type_id,
            is_forward,
            node_id: reference.target_id.clone(),
            browse_name,
            display_name,
            node_class,
            type_definition,
        });
    }
    Ok(descriptions)
}

/// Truncates a reference list to `max` entries, parking the tail as a
/// session continuation point.
fn paginate(
    ctx: &ServerContext,
    session: &Arc<Session>,
    references: Vec<ReferenceDescription>,
    max: usize,
) -> BrowseResult {
    if max == 0 || references.len() <= max {
        return BrowseResult {
            status_code: StatusCode::GOOD,
            continuation_point: ByteString::new(),
            references,
        };
    }
    let mut head = references;
    let tail = head.split_off(max);
    match session.add_browse_continuation_point(
        tail,
        max,
        ctx.config.capabilities.max_browse_continuation_points,
    ) {
        Ok(token) => BrowseResult {
            status_code: StatusCode::GOOD,
            continuation_point: ByteString::from(token),
            references: head,
        },
        Err(()) => BrowseResult {
            status_code: StatusCode::BAD_NO_CONTINUATION_POINTS,
            continuation_point: ByteString::new(),
            references: Vec::new(),
        },
    }
}

/// The Browse service.
pub async fn handle_browse(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: BrowseRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::Browse,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::Browse);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    if let Some(view_id) = &request.view.view_id {
        match ctx.namespace.find_node(view_id) {
            Some(node) if node.node_class() == NodeClass::View => {}
            _ => return fail(StatusCode::BAD_VIEW_ID_UNKNOWN),
        }
    }
    let count = request.nodes_to_browse.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_nodes_per_browse {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    let max = request.requested_max_references_per_node as usize;
    let mut tasks = JoinSet::new();
    for (index, description) in request.nodes_to_browse.into_iter().enumerate() {
        let ctx = ctx.clone();
        let session = session.clone();
        tasks.spawn(async move {
            let result = match browse_node(&ctx, &session, &description) {
                Ok(references) => paginate(&ctx, &session, references, max),
                Err(status) => BrowseResult {
                    status_code: status,
                    continuation_point: ByteString::new(),
                    references: Vec::new(),
                },
            };
            (index, result)
        });
    }
    let mut results = vec![BrowseResult::default(); count];
    while let Some(joined) = tasks.join_next().await {
        if let Ok((index, result)) = joined {
            results[index] = result;
        }
    }

    channel.write(
        ServiceResponse::Browse(BrowseResponse {
            response_header: ResponseHeader::good(handle),
            results,
        }),
        request_id,
    );
}

/// The BrowseNext service.
pub async fn handle_browse_next(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: BrowseNextRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::BrowseNext,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::BrowseNext);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let count = request.continuation_points.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_nodes_per_browse {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    let release = request.release_continuation_points;
    let mut tasks = JoinSet::new();
    for (index, point) in request.continuation_points.into_iter().enumerate() {
        let ctx = ctx.clone();
        let session = session.clone();
        tasks.spawn(async move {
            let result = if point.is_empty() {
                BrowseResult::default()
            } else {
                match session.take_browse_continuation_point(point.as_bytes()) {
                    None => BrowseResult {
                        status_code: StatusCode::BAD_CONTINUATION_POINT_INVALID,
                        ..Default::default()
                    },
                    Some(_) if release => BrowseResult::default(),
                    Some((references, max)) => paginate(&ctx, &session, references, max),
                }
            };
            (index, result)
        });
    }
    let mut results = vec![BrowseResult::default(); count];
    while let Some(joined) = tasks.join_next().await {
        if let Ok((index, result)) = joined {
            results[index] = result;
        }
    }

    channel.write(
        ServiceResponse::BrowseNext(BrowseNextResponse {
            response_header: ResponseHeader::good(handle),
            results,
        }),
        request_id,
    );
}

// =============================================================================
// TranslateBrowsePathsToNodeIds
// =============================================================================

/// The targets reachable from `node_id` through one path element.
fn targets_of(
    ctx: &ServerContext,
    node_id: &NodeId,
    element: &RelativePathElement,
) -> Result<Vec<ExpandedNodeId>, StatusCode> {
    let node = ctx.namespace.find_node(node_id).ok_or(StatusCode::BAD_NODE_ID_UNKNOWN)?;
    let namespace_uris = ctx.namespace_uris();
    let mut targets = Vec::new();
    for reference in node.references() {
        if reference.is_inverse != element.is_inverse {
            continue;
        }
        if let Some(filter_id) = &element.reference_type_id {
            let matches = &reference.reference_type_id == filter_id
                || (element.include_subtypes
                    && ctx.namespace.is_subtype(&reference.reference_type_id, filter_id));
            if !matches {
                continue;
            }
        }
        let target_id = match reference.target_id.to_node_id(&namespace_uris) {
            Some(id) => id,
            None => continue,
        };
        let target = match ctx.namespace.find_node(&target_id) {
            Some(target) => target,
            None => continue,
        };
        if target.browse_name() != element.target_name {
            continue;
        }
        targets.push(reference.target_id.clone());
    }
    if targets.is_empty() {
        return Err(StatusCode::BAD_NO_MATCH);
    }
    Ok(targets)
}

/// Walks the path elements from `node_id`. Unresolved middle elements
/// yield a target with the remaining depth; a fully resolved path carries
/// `u32::MAX`.
fn follow(
    ctx: &ServerContext,
    node_id: &NodeId,
    elements: &[RelativePathElement],
) -> Result<Vec<BrowsePathTarget>, StatusCode> {
    match elements {
        [] => Err(StatusCode::BAD_NOTHING_TO_DO),
        [only] => {
            let targets = targets_of(ctx, node_id, only)?;
            Ok(targets
                .into_iter()
                .map(|target_id| BrowsePathTarget {
                    target_id,
                    remaining_path_index: u32::MAX,
                })
                .collect())
        }
        [head, rest @ ..] => {
            let mut targets = targets_of(ctx, node_id, head)?;
            let next_id = targets.swap_remove(0);
            let namespace_uris = ctx.namespace_uris();
            match next_id
                .to_node_id(&namespace_uris)
                .and_then(|id| ctx.namespace.find_node(&id))
            {
                Some(next_node) => follow(ctx, &next_node.node_id(), rest),
                None => Ok(vec![BrowsePathTarget {
                    target_id: next_id,
                    remaining_path_index: rest.len() as u32,
                }]),
            }
        }
    }
}

fn translate_path(ctx: &ServerContext, path: &BrowsePath) -> BrowsePathResult {
    if path.relative_path.is_empty() {
        return BrowsePathResult {
            status_code: StatusCode::BAD_NOTHING_TO_DO,
            targets: Vec::new(),
        };
    }
    for element in &path.relative_path {
        if element.target_name.is_empty() {
            return BrowsePathResult {
                status_code: StatusCode::BAD_BROWSE_NAME_INVALID,
                targets: Vec::new(),
            };
        }
    }
    match follow(ctx, &path.starting_node, &path.relative_path) {
        Ok(targets) if !targets.is_empty() => {
            BrowsePathResult { status_code: StatusCode::GOOD, targets }
        }
        Ok(_) => BrowsePathResult { status_code: StatusCode::BAD_NO_MATCH, targets: Vec::new() },
        Err(status) => BrowsePathResult { status_code: status, targets: Vec::new() },
    }
}

/// The TranslateBrowsePathsToNodeIds service.
pub async fn handle_translate_browse_paths(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: TranslateBrowsePathsRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::TranslateBrowsePaths,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::TranslateBrowsePaths);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let count = request.browse_paths.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_nodes_per_translate {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    let mut tasks = JoinSet::new();
    for (index, path) in request.browse_paths.into_iter().enumerate() {
        let ctx = ctx.clone();
        tasks.spawn(async move { (index, translate_path(&ctx, &path)) });
    }
    let mut results = vec![BrowsePathResult::default(); count];
    while let Some(joined) = tasks.join_next().await {
        if let Ok((index, result)) = joined {
            results[index] = result;
        }
    }

    channel.write(
        ServiceResponse::TranslateBrowsePaths(TranslateBrowsePathsResponse {
            response_header: ResponseHeader::good(handle),
            results,
        }),
        request_id,
    );
}

// =============================================================================
// RegisterNodes / UnregisterNodes
// =============================================================================

/// The RegisterNodes service: echoes the requested ids verbatim.
pub fn handle_register_nodes(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: RegisterNodesRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::RegisterNodes,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::RegisterNodes);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let count = request.nodes_to_register.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_nodes_per_register_nodes {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    channel.write(
        ServiceResponse::RegisterNodes(RegisterNodesResponse {
            response_header: ResponseHeader::good(handle),
            registered_node_ids: request.nodes_to_register,
        }),
        request_id,
    );
}

/// The UnregisterNodes service: a validated no-op.
pub fn handle_unregister_nodes(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: UnregisterNodesRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::UnregisterNodes,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::UnregisterNodes);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let count = request.nodes_to_unregister.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_nodes_per_register_nodes {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    channel.write(
        ServiceResponse::UnregisterNodes(UnregisterNodesResponse {
            response_header: ResponseHeader::good(handle),
        }),
        request_id,
    );
}
