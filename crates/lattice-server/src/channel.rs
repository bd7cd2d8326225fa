//! The secure-channel façade.
//!
//! Transport framing, chunking and message security live outside this
//! crate; the dispatcher only needs to write typed responses back to the
//! channel a request arrived on, or abort the channel on policy
//! violations.

use lattice_ua::service::EndpointDescription;
use lattice_ua::{ServiceResponse, StatusCode};
use rsa::RsaPublicKey;

/// One secure channel as seen by the service dispatcher.
pub trait Channel: Send + Sync {
    /// Writes a response for the request identified by `request_id`.
    /// Called exactly once per request.
    fn write(&self, response: ServiceResponse, request_id: u32);

    /// Aborts the channel with a status and reason.
    fn abort(&self, status: StatusCode, reason: &str);

    /// The channel id. A session is bound to one channel id.
    fn channel_id(&self) -> u32;

    /// URI of the channel's security policy.
    fn security_policy_uri(&self) -> String;

    /// The endpoint the channel was opened against.
    fn local_endpoint(&self) -> EndpointDescription;

    /// The client certificate's public key, for secure policies.
    fn remote_public_key(&self) -> Option<RsaPublicKey>;

    /// The client's application URI, from its certificate.
    fn remote_application_uri(&self) -> String;

    /// Whether only discovery services are allowed on this channel.
    fn is_discovery_only(&self) -> bool;
}
