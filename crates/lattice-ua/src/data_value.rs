//! Data values: a variant with status and timestamps.

use chrono::{DateTime, Utc};

use crate::{StatusCode, Variant};

/// A value together with its quality and timestamps.
///
/// `None` timestamps mean "unset"; after a read they signal that the
/// timestamp was not requested by the client's `TimestampsToReturn` policy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The value.
    pub value: Variant,
    /// Quality of the value.
    pub status: StatusCode,
    /// When the source produced the value.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Picoseconds part of the source timestamp.
    pub source_picoseconds: u16,
    /// When the server observed the value.
    pub server_timestamp: Option<DateTime<Utc>>,
    /// Picoseconds part of the server timestamp.
    pub server_picoseconds: u16,
}

impl DataValue {
    /// Creates a data value with explicit timestamps.
    pub fn new(
        value: impl Into<Variant>,
        status: StatusCode,
        source_timestamp: Option<DateTime<Utc>>,
        server_timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            value: value.into(),
            status,
            source_timestamp,
            source_picoseconds: 0,
            server_timestamp,
            server_picoseconds: 0,
        }
    }

    /// Creates a Good value stamped now on both clocks.
    pub fn now(value: impl Into<Variant>) -> Self {
        let ts = Some(Utc::now());
        Self::new(value, StatusCode::GOOD, ts, ts)
    }

    /// Creates a valueless result carrying only a status, server-stamped now.
    pub fn bad(status: StatusCode) -> Self {
        Self::new(Variant::null(), status, None, Some(Utc::now()))
    }

    /// Returns `true` when the status is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

impl From<Variant> for DataValue {
    fn from(value: Variant) -> Self {
        DataValue::new(value, StatusCode::GOOD, None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        let dv = DataValue::now(1.5f64);
        assert!(dv.is_good());
        assert!(dv.source_timestamp.is_some());
        assert!(dv.server_timestamp.is_some());

        let bad = DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
        assert!(!bad.is_good());
        assert!(bad.value.is_null());
        assert!(bad.source_timestamp.is_none());
    }
}
