//! OPC UA status codes.
//!
//! A [`StatusCode`] is a 32-bit coded outcome. The two most significant bits
//! carry the severity: `00` good, `01` uncertain, `10` bad. The constants
//! below are the codes this server actually produces; the numeric values are
//! the standard ones from OPC UA Part 6, Annex A.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 32-bit OPC UA status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

const SEVERITY_MASK: u32 = 0xC000_0000;
const SEVERITY_BAD: u32 = 0x8000_0000;
const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;

impl StatusCode {
    /// The operation succeeded.
    pub const GOOD: StatusCode = StatusCode(0x0000_0000);

    // -------------------------------------------------------------------------
    // Request-shape errors
    // -------------------------------------------------------------------------

    /// There was nothing to do because the request specified an empty list of
    /// operations.
    pub const BAD_NOTHING_TO_DO: StatusCode = StatusCode(0x800F_0000);
    /// The request could not be processed because it specified too many
    /// operations.
    pub const BAD_TOO_MANY_OPERATIONS: StatusCode = StatusCode(0x8010_0000);
    /// The timestamps to return parameter is invalid.
    pub const BAD_TIMESTAMPS_TO_RETURN_INVALID: StatusCode = StatusCode(0x802B_0000);
    /// The max age parameter is invalid.
    pub const BAD_MAX_AGE_INVALID: StatusCode = StatusCode(0x8070_0000);
    /// The timestamp argument of a history operation is invalid.
    pub const BAD_INVALID_TIMESTAMP_ARGUMENT: StatusCode = StatusCode(0x80BD_0000);

    // -------------------------------------------------------------------------
    // Session / channel errors
    // -------------------------------------------------------------------------

    /// The session id is not valid.
    pub const BAD_SESSION_ID_INVALID: StatusCode = StatusCode(0x8025_0000);
    /// The session cannot be used because ActivateSession has not been called.
    pub const BAD_SESSION_NOT_ACTIVATED: StatusCode = StatusCode(0x8027_0000);
    /// The specified secure channel is no longer valid.
    pub const BAD_SECURE_CHANNEL_ID_INVALID: StatusCode = StatusCode(0x8022_0000);
    /// The security policy does not allow this operation on this channel.
    pub const BAD_SECURITY_POLICY_REJECTED: StatusCode = StatusCode(0x8055_0000);
    /// The server has reached its maximum number of sessions.
    pub const BAD_TOO_MANY_SESSIONS: StatusCode = StatusCode(0x8056_0000);
    /// The nonce does not meet the length requirement.
    pub const BAD_NONCE_INVALID: StatusCode = StatusCode(0x8024_0000);
    /// The hostname in the endpoint url does not match the server certificate.
    pub const BAD_CERTIFICATE_HOST_NAME_INVALID: StatusCode = StatusCode(0x8016_0000);
    /// The application uri does not match the uri in the certificate.
    pub const BAD_CERTIFICATE_URI_INVALID: StatusCode = StatusCode(0x8017_0000);
    /// The signature generated with the client certificate is invalid.
    pub const BAD_APPLICATION_SIGNATURE_INVALID: StatusCode = StatusCode(0x8058_0000);
    /// The user identity token is not valid.
    pub const BAD_IDENTITY_TOKEN_INVALID: StatusCode = StatusCode(0x8020_0000);
    /// The user identity token was rejected.
    pub const BAD_IDENTITY_TOKEN_REJECTED: StatusCode = StatusCode(0x8021_0000);
    /// The user does not have permission for the requested operation.
    pub const BAD_USER_ACCESS_DENIED: StatusCode = StatusCode(0x801F_0000);

    // -------------------------------------------------------------------------
    // Per-item errors
    // -------------------------------------------------------------------------

    /// The node id refers to a node that does not exist.
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    /// The syntax of the node id is not valid.
    pub const BAD_NODE_ID_INVALID: StatusCode = StatusCode(0x8033_0000);
    /// The attribute is not supported for the specified node.
    pub const BAD_ATTRIBUTE_ID_INVALID: StatusCode = StatusCode(0x8035_0000);
    /// The syntax of the index range parameter is invalid.
    pub const BAD_INDEX_RANGE_INVALID: StatusCode = StatusCode(0x8036_0000);
    /// No data exists within the range of indexes specified.
    pub const BAD_INDEX_RANGE_NO_DATA: StatusCode = StatusCode(0x8037_0000);
    /// The data encoding is invalid.
    pub const BAD_DATA_ENCODING_INVALID: StatusCode = StatusCode(0x8038_0000);
    /// The value supplied does not match the data type of the attribute.
    pub const BAD_TYPE_MISMATCH: StatusCode = StatusCode(0x8074_0000);
    /// The access level does not allow reading the value.
    pub const BAD_NOT_READABLE: StatusCode = StatusCode(0x803A_0000);
    /// The access level does not allow writing the value.
    pub const BAD_NOT_WRITABLE: StatusCode = StatusCode(0x803B_0000);
    /// The value was out of range.
    pub const BAD_OUT_OF_RANGE: StatusCode = StatusCode(0x803C_0000);
    /// The requested operation is not implemented.
    pub const BAD_NOT_IMPLEMENTED: StatusCode = StatusCode(0x8040_0000);
    /// The node class is not valid for the operation.
    pub const BAD_NODE_CLASS_INVALID: StatusCode = StatusCode(0x805F_0000);

    // -------------------------------------------------------------------------
    // Browse / translate errors
    // -------------------------------------------------------------------------

    /// The browse direction is not valid.
    pub const BAD_BROWSE_DIRECTION_INVALID: StatusCode = StatusCode(0x804D_0000);
    /// The browse name is invalid.
    pub const BAD_BROWSE_NAME_INVALID: StatusCode = StatusCode(0x8060_0000);
    /// The reference type id does not refer to a valid reference type node.
    pub const BAD_REFERENCE_TYPE_ID_INVALID: StatusCode = StatusCode(0x804C_0000);
    /// The view id does not refer to a valid view node.
    pub const BAD_VIEW_ID_UNKNOWN: StatusCode = StatusCode(0x806B_0000);
    /// The continuation point provided is no longer valid.
    pub const BAD_CONTINUATION_POINT_INVALID: StatusCode = StatusCode(0x804A_0000);
    /// No more continuation points could be allocated for the session.
    pub const BAD_NO_CONTINUATION_POINTS: StatusCode = StatusCode(0x804B_0000);
    /// The requested relative path cannot be resolved to a target.
    pub const BAD_NO_MATCH: StatusCode = StatusCode(0x806F_0000);

    // -------------------------------------------------------------------------
    // Subscription / monitored-item errors
    // -------------------------------------------------------------------------

    /// The subscription id is not valid.
    pub const BAD_SUBSCRIPTION_ID_INVALID: StatusCode = StatusCode(0x8028_0000);
    /// The monitored item id does not refer to a valid monitored item.
    pub const BAD_MONITORED_ITEM_ID_INVALID: StatusCode = StatusCode(0x8042_0000);
    /// The monitored item filter is not allowed for the node or attribute.
    pub const BAD_FILTER_NOT_ALLOWED: StatusCode = StatusCode(0x8045_0000);
    /// The server has reached its maximum number of subscriptions.
    pub const BAD_TOO_MANY_SUBSCRIPTIONS: StatusCode = StatusCode(0x8077_0000);
    /// There is no subscription available for this session.
    pub const BAD_NO_SUBSCRIPTION: StatusCode = StatusCode(0x8079_0000);
    /// The sequence number is unknown to the server.
    pub const BAD_SEQUENCE_NUMBER_UNKNOWN: StatusCode = StatusCode(0x807A_0000);
    /// The requested notification message is no longer available.
    pub const BAD_MESSAGE_NOT_AVAILABLE: StatusCode = StatusCode(0x807B_0000);
    /// The subscription lifetime expired without client activity.
    pub const BAD_TIMEOUT: StatusCode = StatusCode(0x800A_0000);

    // -------------------------------------------------------------------------
    // History errors
    // -------------------------------------------------------------------------

    /// The history details parameter is not valid.
    pub const BAD_HISTORY_OPERATION_INVALID: StatusCode = StatusCode(0x8071_0000);
    /// The server does not support the requested history operation.
    pub const BAD_HISTORY_OPERATION_UNSUPPORTED: StatusCode = StatusCode(0x8072_0000);

    /// Returns `true` if the severity bits are `00` (good).
    #[inline]
    pub const fn is_good(self) -> bool {
        self.0 & SEVERITY_MASK == 0
    }

    /// Returns `true` if the severity bits are `10` (bad).
    #[inline]
    pub const fn is_bad(self) -> bool {
        self.0 & SEVERITY_BAD != 0
    }

    /// Returns `true` if the severity bits are `01` (uncertain).
    #[inline]
    pub const fn is_uncertain(self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_UNCERTAIN
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for StatusCode {
    fn from(v: u32) -> Self {
        StatusCode(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_predicates() {
        assert!(StatusCode::GOOD.is_good());
        assert!(!StatusCode::GOOD.is_bad());
        assert!(StatusCode::BAD_NODE_ID_UNKNOWN.is_bad());
        assert!(!StatusCode::BAD_NODE_ID_UNKNOWN.is_good());
        assert!(StatusCode(0x4000_0000).is_uncertain());
        assert!(!StatusCode(0x4000_0000).is_bad());
    }

    #[test]
    fn default_is_good() {
        assert_eq!(StatusCode::default(), StatusCode::GOOD);
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(StatusCode::BAD_NOTHING_TO_DO.to_string(), "0x800F0000");
    }
}
