//! The historian collaborator.

use async_trait::async_trait;
use lattice_ua::service::{HistoryReadDetails, HistoryReadResult, HistoryReadValueId};
use lattice_ua::{DataValue, NodeId, StatusCode, TimestampsToReturn};

/// External history backend. HistoryRead dispatches to it per detail kind;
/// variables with Historizing enabled stream their writes into it.
#[async_trait]
pub trait Historian: Send + Sync {
    /// Appends a value to a node's history.
    async fn write_value(&self, node_id: &NodeId, value: &DataValue);

    /// Reads historical events.
    async fn read_event(
        &self,
        nodes: &[HistoryReadValueId],
        details: &HistoryReadDetails,
        timestamps_to_return: TimestampsToReturn,
        release_continuation_points: bool,
    ) -> (Vec<HistoryReadResult>, StatusCode);

    /// Reads raw or modified values.
    async fn read_raw_modified(
        &self,
        nodes: &[HistoryReadValueId],
        details: &HistoryReadDetails,
        timestamps_to_return: TimestampsToReturn,
        release_continuation_points: bool,
    ) -> (Vec<HistoryReadResult>, StatusCode);

    /// Reads processed (aggregated) values.
    async fn read_processed(
        &self,
        nodes: &[HistoryReadValueId],
        details: &HistoryReadDetails,
        timestamps_to_return: TimestampsToReturn,
        release_continuation_points: bool,
    ) -> (Vec<HistoryReadResult>, StatusCode);

    /// Reads values at requested times.
    async fn read_at_time(
        &self,
        nodes: &[HistoryReadValueId],
        details: &HistoryReadDetails,
        timestamps_to_return: TimestampsToReturn,
        release_continuation_points: bool,
    ) -> (Vec<HistoryReadResult>, StatusCode);
}
