//! CreateSession, ActivateSession, CloseSession and Cancel.

use std::sync::Arc;
use std::time::Duration;

use lattice_ua::service::{
    ActivateSessionRequest, ActivateSessionResponse, CancelRequest, CancelResponse,
    CloseSessionRequest, CloseSessionResponse, CreateSessionRequest, CreateSessionResponse,
    ResponseHeader, UserIdentityToken, UserTokenType,
};
use lattice_ua::{
    ByteString, SecurityPolicy, ServiceResponse, StatusCode, UserIdentity,
};
use tracing::{debug, warn};

use crate::channel::Channel;
use crate::context::ServerContext;
use crate::security::{
    self, next_nonce, verify_certificate_application_uri, verify_certificate_hostname,
};
use crate::server::bind_session;
use crate::session::{new_session, ServiceKind};

fn fault(channel: &Arc<dyn Channel>, request_id: u32, handle: u32, status: StatusCode) {
    channel.write(ServiceResponse::fault(handle, status), request_id);
}

/// The CreateSession service.
pub fn handle_create_session(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: CreateSessionRequest,
) {
    if channel.is_discovery_only() {
        channel.abort(StatusCode::BAD_SECURITY_POLICY_REJECTED, "");
        return;
    }
    let handle = request.request_header.request_handle;
    let policy = SecurityPolicy::from_uri(&channel.security_policy_uri())
        .unwrap_or(SecurityPolicy::None);

    // the endpoint url's host must match the server certificate
    if policy.is_secure() || !ctx.local_certificate.is_empty() {
        if verify_certificate_hostname(ctx.local_certificate.as_bytes(), &request.endpoint_url)
            .is_err()
        {
            return fault(
                channel,
                request_id,
                handle,
                StatusCode::BAD_CERTIFICATE_HOST_NAME_INVALID,
            );
        }
    }

    if policy.is_secure() {
        // the client's claimed application uri must appear in its certificate
        if verify_certificate_application_uri(
            request.client_certificate.as_bytes(),
            &request.client_description.application_uri,
        )
        .is_err()
        {
            return fault(channel, request_id, handle, StatusCode::BAD_CERTIFICATE_URI_INVALID);
        }
        if request.client_nonce.len() < ctx.config.nonce_length {
            return fault(channel, request_id, handle, StatusCode::BAD_NONCE_INVALID);
        }
    }

    // proof of possession over clientCertificate || clientNonce
    let server_signature = match (&ctx.local_private_key, policy.is_secure()) {
        (Some(key), true) => {
            match security::create_signature(
                policy,
                key,
                request.client_certificate.as_bytes(),
                request.client_nonce.as_bytes(),
            ) {
                Ok(signature) => signature,
                Err(e) => {
                    warn!(error = %e, "server signature failed");
                    return fault(
                        channel,
                        request_id,
                        handle,
                        StatusCode::BAD_SECURITY_POLICY_REJECTED,
                    );
                }
            }
        }
        _ => Default::default(),
    };

    let session_name = if request.session_name.is_empty() {
        request.client_description.application_uri.clone()
    } else {
        request.session_name.clone()
    };

    let session = Arc::new(new_session(
        session_name,
        Duration::from_millis(request.requested_session_timeout.max(0.0) as u64),
        request.client_description.clone(),
        request.endpoint_url.clone(),
        request.max_response_message_size,
        ctx.config.nonce_length,
    ));
    if let Err(status) = ctx.sessions.add(session.clone()) {
        return fault(channel, request_id, handle, status);
    }
    debug!(session = %session.session_id(), name = session.session_name(), "session created");

    channel.write(
        ServiceResponse::CreateSession(Box::new(CreateSessionResponse {
            response_header: ResponseHeader::good(handle),
            session_id: session.session_id().clone(),
            authentication_token: session.authentication_token().clone(),
            revised_session_timeout: request.requested_session_timeout,
            server_nonce: session.session_nonce(),
            server_certificate: ctx.local_certificate.clone(),
            server_endpoints: ctx.endpoints.clone(),
            server_signature,
            max_request_message_size: 0,
        })),
        request_id,
    );
}

/// The ActivateSession service.
pub async fn handle_activate_session(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: ActivateSessionRequest,
) {
    if channel.is_discovery_only() {
        channel.abort(StatusCode::BAD_SECURITY_POLICY_REJECTED, "");
        return;
    }
    let handle = request.request_header.request_handle;
    let session = match ctx.sessions.get(&request.request_header.authentication_token) {
        Some(session) => session,
        None => return fault(channel, request_id, handle, StatusCode::BAD_SESSION_ID_INVALID),
    };
    let policy = SecurityPolicy::from_uri(&channel.security_policy_uri())
        .unwrap_or(SecurityPolicy::None);

    // verify the client's proof of possession over serverCert || serverNonce
    if policy.is_secure() {
        let remote_key = match channel.remote_public_key() {
            Some(key) => key,
            None => {
                return fault(
                    channel,
                    request_id,
                    handle,
                    StatusCode::BAD_APPLICATION_SIGNATURE_INVALID,
                )
            }
        };
        if security::verify_signature(
            policy,
            &remote_key,
            ctx.local_certificate.as_bytes(),
            session.session_nonce().as_bytes(),
            request.client_signature.signature.as_bytes(),
        )
        .is_err()
        {
            return fault(
                channel,
                request_id,
                handle,
                StatusCode::BAD_APPLICATION_SIGNATURE_INVALID,
            );
        }
    }

    // resolve the identity token against the endpoint's policies
    let endpoint = channel.local_endpoint();
    let identity = match resolve_identity(ctx, &session, &endpoint, &request, policy) {
        Ok(identity) => identity,
        Err(status) => return fault(channel, request_id, handle, status),
    };

    // authenticate
    let endpoint_url = endpoint.endpoint_url.clone();
    let application_uri = channel.remote_application_uri();
    let auth_result = match &identity {
        UserIdentity::Anonymous => {
            if ctx.config.allow_anonymous_identity {
                StatusCode::GOOD
            } else {
                StatusCode::BAD_USER_ACCESS_DENIED
            }
        }
        UserIdentity::UserName { user_name, password } => {
            match &ctx.user_name_authenticator {
                Some(authenticator) => {
                    authenticator
                        .authenticate(user_name, password, &application_uri, &endpoint_url)
                        .await
                }
                None => StatusCode::BAD_USER_ACCESS_DENIED,
            }
        }
        UserIdentity::X509 { certificate } => match &ctx.x509_authenticator {
            Some(authenticator) => {
                authenticator
                    .authenticate(certificate.as_bytes(), &application_uri, &endpoint_url)
                    .await
            }
            None => StatusCode::BAD_USER_ACCESS_DENIED,
        },
        UserIdentity::Issued { token_data } => match &ctx.issued_token_authenticator {
            Some(authenticator) => {
                authenticator
                    .authenticate(token_data.as_bytes(), &application_uri, &endpoint_url)
                    .await
            }
            None => StatusCode::BAD_USER_ACCESS_DENIED,
        },
    };
    if !auth_result.is_good() {
        return fault(channel, request_id, handle, StatusCode::BAD_USER_ACCESS_DENIED);
    }

    let roles = match ctx
        .roles_provider
        .get_roles(&identity, &application_uri, &endpoint_url)
        .await
    {
        Ok(roles) => roles,
        Err(_) => return fault(channel, request_id, handle, StatusCode::BAD_USER_ACCESS_DENIED),
    };

    session.set_user_identity(identity);
    session.set_user_roles(roles);
    session.set_session_nonce(ByteString::from(next_nonce(ctx.config.nonce_length)));
    session.set_secure_channel_id(channel.channel_id());
    session.set_locale_ids(request.locale_ids.clone());
    debug!(session = %session.session_id(), "session activated");

    channel.write(
        ServiceResponse::ActivateSession(ActivateSessionResponse {
            response_header: ResponseHeader::good(handle),
            server_nonce: session.session_nonce(),
            results: Vec::new(),
        }),
        request_id,
    );
}

fn resolve_identity(
    ctx: &Arc<ServerContext>,
    session: &Arc<crate::session::Session>,
    endpoint: &lattice_ua::service::EndpointDescription,
    request: &ActivateSessionRequest,
    channel_policy: SecurityPolicy,
) -> Result<UserIdentity, StatusCode> {
    let find_policy = |token_type: UserTokenType, policy_id: &str| {
        endpoint
            .user_identity_tokens
            .iter()
            .find(|p| p.token_type == token_type && p.policy_id == policy_id)
            .ok_or(StatusCode::BAD_IDENTITY_TOKEN_INVALID)
    };
    let effective_policy = |declared: &str| {
        if declared.is_empty() {
            channel_policy
        } else {
            SecurityPolicy::from_uri(declared).unwrap_or(channel_policy)
        }
    };

    match &request.user_identity_token {
        UserIdentityToken::Anonymous { policy_id } => {
            find_policy(UserTokenType::Anonymous, policy_id)?;
            Ok(UserIdentity::Anonymous)
        }
        UserIdentityToken::UserName { policy_id, user_name, password, encryption_algorithm } => {
            let token_policy = find_policy(UserTokenType::UserName, policy_id)?;
            if user_name.is_empty() {
                return Err(StatusCode::BAD_IDENTITY_TOKEN_INVALID);
            }
            let policy = effective_policy(&token_policy.security_policy_uri);
            let plain = if policy == SecurityPolicy::None {
                password.as_bytes().to_vec()
            } else {
                let key = ctx
                    .local_private_key
                    .as_ref()
                    .ok_or(StatusCode::BAD_IDENTITY_TOKEN_REJECTED)?;
                security::decrypt_password(policy, key, encryption_algorithm, password.as_bytes())
                    .map_err(|e| match e {
                        crate::security::SecurityError::TokenInvalid(_) => {
                            StatusCode::BAD_IDENTITY_TOKEN_INVALID
                        }
                        _ => StatusCode::BAD_IDENTITY_TOKEN_REJECTED,
                    })?
            };
            Ok(UserIdentity::UserName {
                user_name: user_name.clone(),
                password: String::from_utf8_lossy(&plain).to_string(),
            })
        }
        UserIdentityToken::X509 { policy_id, certificate_data } => {
            let token_policy = find_policy(UserTokenType::Certificate, policy_id)?;
            let policy = effective_policy(&token_policy.security_policy_uri);
            let user_key = security::certificate_public_key(certificate_data.as_bytes())
                .map_err(|_| StatusCode::BAD_IDENTITY_TOKEN_INVALID)?;
            security::verify_signature(
                policy,
                &user_key,
                ctx.local_certificate.as_bytes(),
                session.session_nonce().as_bytes(),
                request.user_token_signature.signature.as_bytes(),
            )
            .map_err(|_| StatusCode::BAD_IDENTITY_TOKEN_REJECTED)?;
            Ok(UserIdentity::X509 { certificate: certificate_data.clone() })
        }
        UserIdentityToken::Issued { policy_id, token_data } => {
            find_policy(UserTokenType::IssuedToken, policy_id)?;
            Ok(UserIdentity::Issued { token_data: token_data.clone() })
        }
    }
}

/// The CloseSession service. With `delete_subscriptions`, the session's
/// subscriptions are removed and their parked publish requests drained.
pub fn handle_close_session(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: CloseSessionRequest,
) {
    let handle = request.request_header.request_handle;
    let session = match bind_session(
        ctx,
        channel,
        request_id,
        &request.request_header,
        ServiceKind::CloseSession,
    ) {
        Some(session) => session,
        None => return,
    };

    if request.delete_subscriptions {
        for subscription in ctx.subscriptions.get_by_session(&session) {
            ctx.subscriptions.remove(subscription.id());
            subscription.delete();
        }
    }
    ctx.sessions.remove(&session);
    for pending in session.drain_publish_requests() {
        pending.channel.write(
            ServiceResponse::fault(pending.request_handle, StatusCode::BAD_NO_SUBSCRIPTION),
            pending.request_id,
        );
    }
    debug!(session = %session.session_id(), "session closed");

    channel.write(
        ServiceResponse::CloseSession(CloseSessionResponse {
            response_header: ResponseHeader::good(handle),
        }),
        request_id,
    );
}

/// The Cancel service: validates the binding and reports success; nothing
/// is cancelled.
pub fn handle_cancel(
    ctx: &Arc<ServerContext>,
    channel: &Arc<dyn Channel>,
    request_id: u32,
    request: CancelRequest,
) {
    let handle = request.request_header.request_handle;
    if bind_session(ctx, channel, request_id, &request.request_header, ServiceKind::Cancel)
        .is_none()
    {
        return;
    }
    channel.write(
        ServiceResponse::Cancel(CancelResponse {
            response_header: ResponseHeader::good(handle),
            cancel_count: 0,
        }),
        request_id,
    );
}
