//! FindServers and GetEndpoints. Both are valid on discovery-only
//! channels.

use std::sync::Arc;

use lattice_ua::service::{
    FindServersRequest, FindServersResponse, GetEndpointsRequest, GetEndpointsResponse,
    ResponseHeader,
};
use lattice_ua::ServiceResponse;

use crate::channel::Channel;
use crate::context::ServerContext;

/// The FindServers service: the local description, filtered by the
/// requested server URIs.
pub fn handle_find_servers(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: FindServersRequest,
) {
    let local = ctx.local_description();
    let servers = if request.server_uris.is_empty()
        || request.server_uris.iter().any(|uri| *uri == local.application_uri)
    {
        vec![local]
    } else {
        Vec::new()
    };

    channel.write(
        ServiceResponse::FindServers(FindServersResponse {
            response_header: ResponseHeader::good(request.request_header.request_handle),
            servers,
        }),
        request_id,
    );
}

/// The GetEndpoints service: the advertised endpoints, filtered by the
/// requested transport profiles.
pub fn handle_get_endpoints(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: GetEndpointsRequest,
) {
    let endpoints = ctx
        .endpoints
        .iter()
        .filter(|ep| {
            request.profile_uris.is_empty()
                || request.profile_uris.iter().any(|uri| *uri == ep.transport_profile_uri)
        })
        .cloned()
        .collect();

    channel.write(
        ServiceResponse::GetEndpoints(GetEndpointsResponse {
            response_header: ResponseHeader::good(request.request_header.request_handle),
            endpoints,
        }),
        request_id,
    );
}
