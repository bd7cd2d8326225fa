//! Monitored items: server-side samplers feeding a subscription.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use lattice_ua::service::{
    DataChangeFilter, EventFieldList, MonitoredItemModifyResult, MonitoredItemNotification,
    MonitoringFilter, MonitoringParameters, ReadValueId,
};
use lattice_ua::{
    attribute_id, DataChangeTrigger, DataValue, DeadbandType, MonitoringMode, Scalar, StatusCode,
    TimestampsToReturn, Variant,
};
use lattice_project::{Event, EventListener, Node};
use parking_lot::Mutex;

static NEXT_MONITORED_ITEM_ID: AtomicU32 = AtomicU32::new(1);

/// A notification queued by a monitored item.
#[derive(Debug, Clone)]
pub enum QueuedNotification {
    /// A sampled data change.
    DataChange(MonitoredItemNotification),
    /// An event report.
    Event(EventFieldList),
}

struct ItemState {
    monitoring_mode: MonitoringMode,
    client_handle: u32,
    sampling_interval: f64,
    queue_size: u32,
    discard_oldest: bool,
    data_change_filter: Option<DataChangeFilter>,
    queue: VecDeque<QueuedNotification>,
    last_sample: Option<Instant>,
    previous: Option<DataValue>,
    triggered_items: Vec<u32>,
}

/// Samples one attribute of one node for a subscription.
pub struct MonitoredItem {
    id: u32,
    node: Node,
    item_to_monitor: ReadValueId,
    timestamps_to_return: TimestampsToReturn,
    state: Mutex<ItemState>,
}

impl MonitoredItem {
    /// Creates a monitored item, revising the requested sampling interval
    /// against `min_sample_rate` and the queue size against
    /// `max_queue_size`. A negative sampling interval inherits
    /// `publishing_interval`.
    pub fn new(
        node: Node,
        item_to_monitor: ReadValueId,
        monitoring_mode: MonitoringMode,
        parameters: &MonitoringParameters,
        timestamps_to_return: TimestampsToReturn,
        min_sample_rate: f64,
        publishing_interval: f64,
        max_queue_size: u32,
    ) -> Arc<Self> {
        let mut sampling = parameters.sampling_interval;
        if sampling < 0.0 {
            sampling = publishing_interval;
        }
        if sampling < min_sample_rate {
            sampling = min_sample_rate;
        }
        let queue_size = parameters.queue_size.clamp(1, max_queue_size);
        let data_change_filter = match &parameters.filter {
            Some(MonitoringFilter::DataChange(f)) => Some(f.clone()),
            _ => None,
        };

        Arc::new(Self {
            id: NEXT_MONITORED_ITEM_ID.fetch_add(1, Ordering::Relaxed),
            node,
            item_to_monitor,
            timestamps_to_return,
            state: Mutex::new(ItemState {
                monitoring_mode,
                client_handle: parameters.client_handle,
                sampling_interval: sampling,
                queue_size,
                discard_oldest: parameters.discard_oldest,
                data_change_filter,
                queue: VecDeque::new(),
                last_sample: None,
                previous: None,
                triggered_items: Vec::new(),
            }),
        })
    }

    /// The server-assigned item id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The monitored node.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// The monitored attribute description.
    pub fn item_to_monitor(&self) -> &ReadValueId {
        &self.item_to_monitor
    }

    /// The item's timestamp selection.
    pub fn timestamps_to_return(&self) -> TimestampsToReturn {
        self.timestamps_to_return
    }

    /// The granted sampling interval in milliseconds.
    pub fn sampling_interval(&self) -> f64 {
        self.state.lock().sampling_interval
    }

    /// The granted queue depth.
    pub fn queue_size(&self) -> u32 {
        self.state.lock().queue_size
    }

    /// The current monitoring mode.
    pub fn monitoring_mode(&self) -> MonitoringMode {
        self.state.lock().monitoring_mode
    }

    /// Changes the monitoring mode. Disabling clears the queue.
    pub fn set_monitoring_mode(&self, mode: MonitoringMode) {
        let mut state = self.state.lock();
        state.monitoring_mode = mode;
        if mode == MonitoringMode::Disabled {
            state.queue.clear();
            state.previous = None;
        }
    }

    /// Applies new parameters, returning the revised values.
    pub fn modify(
        &self,
        parameters: &MonitoringParameters,
        min_sample_rate: f64,
        publishing_interval: f64,
        max_queue_size: u32,
    ) -> MonitoredItemModifyResult {
        let mut state = self.state.lock();
        let mut sampling = parameters.sampling_interval;
        if sampling < 0.0 {
            sampling = publishing_interval;
        }
        if sampling < min_sample_rate {
            sampling = min_sample_rate;
        }
        state.sampling_interval = sampling;
        state.queue_size = parameters.queue_size.clamp(1, max_queue_size);
        state.client_handle = parameters.client_handle;
        state.discard_oldest = parameters.discard_oldest;
        if let Some(MonitoringFilter::DataChange(f)) = &parameters.filter {
            state.data_change_filter = Some(f.clone());
        }
        while state.queue.len() > state.queue_size as usize {
            state.queue.pop_front();
        }
        MonitoredItemModifyResult {
            status_code: StatusCode::GOOD,
            revised_sampling_interval: state.sampling_interval,
            revised_queue_size: state.queue_size,
        }
    }

    // =========================================================================
    // Sampling
    // =========================================================================

    /// Returns `true` when the sampling interval elapsed since the last
    /// sample.
    pub fn is_sample_due(&self, now: Instant) -> bool {
        let state = self.state.lock();
        if state.monitoring_mode == MonitoringMode::Disabled {
            return false;
        }
        match state.last_sample {
            Some(last) => now.duration_since(last).as_secs_f64() * 1000.0 >= state.sampling_interval,
            None => true,
        }
    }

    /// Offers a sampled value; the data-change filter decides whether it is
    /// queued.
    pub fn offer_sample(&self, value: DataValue, now: Instant) {
        let mut state = self.state.lock();
        if state.monitoring_mode == MonitoringMode::Disabled {
            return;
        }
        state.last_sample = Some(now);

        let report = match &state.previous {
            None => true,
            Some(previous) => {
                let filter = state
                    .data_change_filter
                    .clone()
                    .unwrap_or(DataChangeFilter {
                        trigger: DataChangeTrigger::StatusValue,
                        deadband_type: DeadbandType::None as u32,
                        deadband_value: 0.0,
                    });
                data_change_triggers(previous, &value, &filter)
            }
        };
        if !report {
            return;
        }
        state.previous = Some(value.clone());

        let client_handle = state.client_handle;
        let notification = QueuedNotification::DataChange(MonitoredItemNotification {
            client_handle,
            value,
        });
        push_bounded(&mut state, notification);
    }

    /// Queues an event report.
    pub fn offer_event(&self, fields: Vec<Variant>) {
        let mut state = self.state.lock();
        if state.monitoring_mode == MonitoringMode::Disabled {
            return;
        }
        let client_handle = state.client_handle;
        let notification =
            QueuedNotification::Event(EventFieldList { client_handle, event_fields: fields });
        push_bounded(&mut state, notification);
    }

    /// Returns `true` when notifications are queued.
    pub fn has_notifications(&self) -> bool {
        let state = self.state.lock();
        state.monitoring_mode == MonitoringMode::Reporting && !state.queue.is_empty()
    }

    /// Dequeues up to `max` notifications for publication; reporting mode
    /// only. `max == 0` means no cap.
    pub fn take_notifications(&self, max: usize) -> Vec<QueuedNotification> {
        let mut state = self.state.lock();
        if state.monitoring_mode != MonitoringMode::Reporting {
            return Vec::new();
        }
        drain_queue(&mut state.queue, max)
    }

    /// Dequeues queued notifications regardless of reporting mode; used
    /// when a triggering link fires.
    pub fn take_triggered_notifications(&self, max: usize) -> Vec<QueuedNotification> {
        let mut state = self.state.lock();
        if state.monitoring_mode == MonitoringMode::Disabled {
            return Vec::new();
        }
        drain_queue(&mut state.queue, max)
    }

    // =========================================================================
    // Triggering links
    // =========================================================================

    /// Links `id` so its reports are emitted when this item triggers.
    /// Returns `false` when already linked.
    pub fn add_triggered_item(&self, id: u32) -> bool {
        let mut state = self.state.lock();
        if state.triggered_items.contains(&id) {
            return false;
        }
        state.triggered_items.push(id);
        true
    }

    /// Removes a triggering link. Returns `false` when it was not linked.
    pub fn remove_triggered_item(&self, id: u32) -> bool {
        let mut state = self.state.lock();
        let before = state.triggered_items.len();
        state.triggered_items.retain(|t| *t != id);
        state.triggered_items.len() != before
    }

    /// The linked item ids.
    pub fn triggered_items(&self) -> Vec<u32> {
        self.state.lock().triggered_items.clone()
    }
}

fn drain_queue(queue: &mut VecDeque<QueuedNotification>, max: usize) -> Vec<QueuedNotification> {
    let take = if max == 0 { queue.len() } else { max.min(queue.len()) };
    queue.drain(..take).collect()
}

fn push_bounded(state: &mut ItemState, notification: QueuedNotification) {
    if state.queue.len() >= state.queue_size as usize {
        if state.discard_oldest {
            state.queue.pop_front();
        } else {
            state.queue.pop_back();
        }
    }
    state.queue.push_back(notification);
}

// =============================================================================
// Data change filter
// =============================================================================

/// Decides whether `next` is a reportable change over `previous` under
/// `filter`. A non-None deadband suppresses numeric value changes whose
/// magnitude stays within the deadband.
pub fn data_change_triggers(
    previous: &DataValue,
    next: &DataValue,
    filter: &DataChangeFilter,
) -> bool {
    let status_changed = previous.status != next.status;
    if status_changed {
        return true;
    }
    match filter.trigger {
        DataChangeTrigger::Status => false,
        DataChangeTrigger::StatusValue => value_changed(previous, next, filter),
        DataChangeTrigger::StatusValueTimestamp => {
            value_changed(previous, next, filter)
                || previous.source_timestamp != next.source_timestamp
        }
    }
}

fn value_changed(previous: &DataValue, next: &DataValue, filter: &DataChangeFilter) -> bool {
    if filter.deadband_type == DeadbandType::None as u32 {
        return previous.value != next.value;
    }
    match (numeric_of(&previous.value), numeric_of(&next.value)) {
        (Some(a), Some(b)) => (a - b).abs() > filter.deadband_value,
        _ => previous.value != next.value,
    }
}

fn numeric_of(value: &Variant) -> Option<f64> {
    match value {
        Variant::Scalar(s) => match s {
            Scalar::Boolean(_) => None,
            other => other.as_f64(),
        },
        Variant::Array(_) => None,
    }
}

// =============================================================================
// Event wiring
// =============================================================================

/// Adapts a monitored item into an [`EventListener`] for its object node.
pub struct ItemEventListener {
    item: Weak<MonitoredItem>,
}

impl ItemEventListener {
    /// Wraps an item.
    pub fn new(item: &Arc<MonitoredItem>) -> Arc<Self> {
        Arc::new(Self { item: Arc::downgrade(item) })
    }
}

impl EventListener for ItemEventListener {
    fn on_event(&self, event: &Event) {
        if let Some(item) = self.item.upgrade() {
            item.offer_event(standard_event_fields(event));
        }
    }
}

/// Projects an event onto the standard field order: event type, source
/// node, source name, time, message, severity.
pub fn standard_event_fields(event: &Event) -> Vec<Variant> {
    vec![
        Variant::from(event.event_type.clone()),
        Variant::from(event.source_node.clone()),
        Variant::from(event.source_name.clone()),
        Variant::from(event.time),
        Variant::Scalar(Scalar::LocalizedText(event.message.clone())),
        Variant::from(event.severity),
    ]
}

/// Returns `true` when the item watches the Value attribute.
pub fn is_value_item(item: &ReadValueId) -> bool {
    item.attribute_id == attribute_id::VALUE
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_ua::{LocalizedText, NodeId, QualifiedName};
    use lattice_project::{NodeBase, ViewNode};

    fn dummy_node() -> Node {
        Node::View(Arc::new(ViewNode {
            base: NodeBase::new(
                NodeId::string(0, "N"),
                QualifiedName::new(0, "N"),
                LocalizedText::en("N"),
                LocalizedText::en(""),
                None,
                Vec::new(),
            ),
            contains_no_loops: true,
            event_notifier: 0,
        }))
    }

    fn item(params: MonitoringParameters) -> Arc<MonitoredItem> {
        MonitoredItem::new(
            dummy_node(),
            ReadValueId { attribute_id: attribute_id::VALUE, ..Default::default() },
            MonitoringMode::Reporting,
            &params,
            TimestampsToReturn::Both,
            100.0,
            1000.0,
            1000,
        )
    }

    fn value(v: f64) -> DataValue {
        DataValue::now(Variant::from(v))
    }

    #[test]
    fn sampling_interval_is_revised() {
        let fast = item(MonitoringParameters {
            sampling_interval: 10.0,
            queue_size: 0,
            ..Default::default()
        });
        assert_eq!(fast.sampling_interval(), 100.0);
        assert_eq!(fast.queue_size(), 1);

        let inherit = item(MonitoringParameters {
            sampling_interval: -1.0,
            queue_size: 5,
            ..Default::default()
        });
        assert_eq!(inherit.sampling_interval(), 1000.0);
    }

    #[test]
    fn first_sample_always_reports() {
        let it = item(MonitoringParameters { queue_size: 10, ..Default::default() });
        it.offer_sample(value(1.0), Instant::now());
        assert!(it.has_notifications());
        assert_eq!(it.take_notifications(0).len(), 1);
    }

    #[test]
    fn unchanged_value_is_filtered() {
        let it = item(MonitoringParameters { queue_size: 10, ..Default::default() });
        let now = Instant::now();
        let v = value(1.0);
        it.offer_sample(v.clone(), now);
        it.take_notifications(0);
        it.offer_sample(v, now);
        assert!(!it.has_notifications());
    }

    #[test]
    fn absolute_deadband_suppresses_small_changes() {
        let it = item(MonitoringParameters {
            queue_size: 10,
            filter: Some(MonitoringFilter::DataChange(DataChangeFilter {
                trigger: DataChangeTrigger::StatusValue,
                deadband_type: DeadbandType::Absolute as u32,
                deadband_value: 5.0,
            })),
            ..Default::default()
        });
        let now = Instant::now();
        it.offer_sample(value(10.0), now);
        it.take_notifications(0);

        it.offer_sample(value(12.0), now); // within deadband
        assert!(!it.has_notifications());

        it.offer_sample(value(20.0), now); // beyond deadband
        assert!(it.has_notifications());
    }

    #[test]
    fn queue_bound_discards_per_policy() {
        let oldest = item(MonitoringParameters {
            queue_size: 2,
            discard_oldest: true,
            ..Default::default()
        });
        let now = Instant::now();
        oldest.offer_sample(value(1.0), now);
        oldest.offer_sample(value(2.0), now);
        oldest.offer_sample(value(3.0), now);
        let taken = oldest.take_notifications(0);
        assert_eq!(taken.len(), 2);
        match &taken[0] {
            QueuedNotification::DataChange(n) => {
                assert_eq!(n.value.value, Variant::from(2.0f64));
            }
            _ => panic!("expected data change"),
        }
    }

    #[test]
    fn disabled_mode_drops_samples() {
        let it = item(MonitoringParameters { queue_size: 10, ..Default::default() });
        it.offer_sample(value(1.0), Instant::now());
        it.set_monitoring_mode(MonitoringMode::Disabled);
        assert!(!it.has_notifications());
        it.offer_sample(value(2.0), Instant::now());
        assert!(!it.has_notifications());
    }

    #[test]
    fn sampling_mode_queues_but_does_not_report() {
        let it = item(MonitoringParameters { queue_size: 10, ..Default::default() });
        it.set_monitoring_mode(MonitoringMode::Sampling);
        it.offer_sample(value(1.0), Instant::now());
        assert!(!it.has_notifications());
        assert!(it.take_notifications(0).is_empty());
        // a triggering link can still flush it
        assert_eq!(it.take_triggered_notifications(0).len(), 1);
    }

    #[test]
    fn triggering_links_by_id() {
        let it = item(MonitoringParameters::default());
        assert!(it.add_triggered_item(7));
        assert!(!it.add_triggered_item(7));
        assert_eq!(it.triggered_items(), vec![7]);
        assert!(it.remove_triggered_item(7));
        assert!(!it.remove_triggered_item(7));
    }
}
