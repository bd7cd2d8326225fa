//! The Call service.

use std::sync::Arc;

use lattice_ua::service::{
    CallMethodRequest, CallMethodResult, CallRequest, CallResponse, ResponseHeader,
};
use lattice_ua::{permission, ServiceResponse, StatusCode};
use lattice_project::Node;
use tokio::task::JoinSet;

use crate::channel::Channel;
use crate::context::ServerContext;
use crate::server::bind_session;
use crate::services::user_permitted;
use crate::session::{ServiceKind, Session};

fn call_method(
    ctx: &ServerContext,
    session: &Arc<Session>,
    invocation: &CallMethodRequest,
) -> CallMethodResult {
    let bad = |status: StatusCode| CallMethodResult { status_code: status, ..Default::default() };

    let object = match ctx.namespace.find_node(&invocation.object_id) {
        Some(node) => node,
        None => return bad(StatusCode::BAD_NODE_ID_UNKNOWN),
    };
    if !user_permitted(ctx, session, &object, permission::BROWSE) {
        return bad(StatusCode::BAD_NODE_ID_UNKNOWN);
    }
    if !matches!(object, Node::Object(_) | Node::ObjectType(_)) {
        return bad(StatusCode::BAD_NODE_CLASS_INVALID);
    }

    let method_node = match ctx.namespace.find_node(&invocation.method_id) {
        Some(node) => node,
        None => return bad(StatusCode::BAD_NODE_ID_UNKNOWN),
    };
    if !user_permitted(ctx, session, &method_node, permission::BROWSE) {
        return bad(StatusCode::BAD_NODE_ID_UNKNOWN);
    }
    let method = match method_node.as_method() {
        Some(method) => method,
        None => return bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
    };
    if !method.user_executable(&session.user_roles(), ctx.role_permissions()) {
        return bad(StatusCode::BAD_USER_ACCESS_DENIED);
    }
    match method.call_handler() {
        Some(handler) => handler(invocation),
        None => bad(StatusCode::BAD_NOT_IMPLEMENTED),
    }
}

/// The Call service.
pub async fn handle_call(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: CallRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::Call,
    ) {
        Some(session) => session,
        None => return,
    };
    let fail = |status: StatusCode| {
        session.counters.record_error(ServiceKind::Call);
        channel.write(ServiceResponse::fault(handle, status), request_id);
    };

    let count = request.methods_to_call.len();
    if count == 0 {
        return fail(StatusCode::BAD_NOTHING_TO_DO);
    }
    if count > ctx.config.capabilities.operation_limits.max_nodes_per_method_call {
        return fail(StatusCode::BAD_TOO_MANY_OPERATIONS);
    }

    let mut tasks = JoinSet::new();
    for (index, invocation) in request.methods_to_call.into_iter().enumerate() {
        let ctx = ctx.clone();
        let session = session.clone();
        tasks.spawn(async move { (index, call_method(&ctx, &session, &invocation)) });
    }
    let mut results = vec![CallMethodResult::default(); count];
    while let Some(joined) = tasks.join_next().await {
        if let Ok((index, result)) = joined {
            results[index] = result;
        }
    }

    channel.write(
        ServiceResponse::Call(CallResponse {
            response_header: ResponseHeader::good(handle),
            results,
        }),
        request_id,
    );
}
