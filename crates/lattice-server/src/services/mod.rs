//! The service handlers.
//!
//! Every handler follows the same contract: discovery-only channels are
//! aborted, the session is resolved and its channel binding checked, the
//! request shape is validated against the operation limits, per-item work
//! fans out onto the runtime, and the response is written exactly once.

pub mod attribute;
pub mod discovery;
pub mod method;
pub mod monitor;
pub mod session;
pub mod subscription;
pub mod view;

use std::sync::Arc;

use lattice_project::Node;
use lattice_ua::is_permitted;

use crate::context::ServerContext;
use crate::session::Session;

/// Returns `true` when the session's user holds `wanted` on `node`.
pub(crate) fn user_permitted(
    ctx: &ServerContext,
    session: &Arc<Session>,
    node: &Node,
    wanted: u32,
) -> bool {
    let roles = session.user_roles();
    is_permitted(
        &node.user_role_permissions(&roles, ctx.role_permissions()),
        wanted,
    )
}
