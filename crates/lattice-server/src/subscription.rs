//! Subscriptions: the publishing timer, keep-alives, the retransmission
//! queue and the publish pairing logic.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use lattice_ua::service::{
    EventFieldList, MonitoredItemNotification, NotificationData, NotificationMessage,
    PublishResponse, ResponseHeader,
};
use lattice_ua::{ServiceResponse, StatusCode};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::context::ServerContext;
use crate::monitored_item::{MonitoredItem, QueuedNotification};
use crate::session::{PendingPublish, Session, StateChange};

/// Smallest publishing interval the server grants, in milliseconds.
pub const MIN_PUBLISHING_INTERVAL_MS: f64 = 10.0;
/// Default keep-alive count granted when the client requests zero.
pub const DEFAULT_MAX_KEEP_ALIVE_COUNT: u32 = 10;

struct SubscriptionState {
    publishing_interval: f64,
    lifetime_count: u32,
    max_keep_alive_count: u32,
    max_notifications_per_publish: u32,
    priority: u8,
    publishing_enabled: bool,
    lifetime_counter: u32,
    keep_alive_counter: u32,
    next_sequence_number: u32,
    items: HashMap<u32, Arc<MonitoredItem>>,
    retransmission: VecDeque<NotificationMessage>,
    late: bool,
    deleted: bool,
}

/// One subscription of one session.
pub struct Subscription {
    id: u32,
    session: Arc<Session>,
    max_retransmission: usize,
    state: Mutex<SubscriptionState>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

/// Revises the requested subscription parameters: the publishing interval
/// is floored, a zero keep-alive count defaults, and the lifetime is at
/// least three keep-alive periods.
pub fn revise_parameters(
    requested_publishing_interval: f64,
    requested_lifetime_count: u32,
    requested_max_keep_alive_count: u32,
) -> (f64, u32, u32) {
    let publishing_interval = if requested_publishing_interval < MIN_PUBLISHING_INTERVAL_MS {
        MIN_PUBLISHING_INTERVAL_MS
    } else {
        requested_publishing_interval
    };
    let max_keep_alive = if requested_max_keep_alive_count == 0 {
        DEFAULT_MAX_KEEP_ALIVE_COUNT
    } else {
        requested_max_keep_alive_count
    };
    let lifetime = requested_lifetime_count.max(max_keep_alive.saturating_mul(3));
    (publishing_interval, lifetime, max_keep_alive)
}

impl Subscription {
    /// Creates a subscription for `session` with revised parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        session: Arc<Session>,
        requested_publishing_interval: f64,
        requested_lifetime_count: u32,
        requested_max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        publishing_enabled: bool,
        priority: u8,
        max_retransmission: usize,
    ) -> Arc<Self> {
        let (publishing_interval, lifetime_count, max_keep_alive_count) = revise_parameters(
            requested_publishing_interval,
            requested_lifetime_count,
            requested_max_keep_alive_count,
        );
        Arc::new(Self {
            id,
            session,
            max_retransmission,
            state: Mutex::new(SubscriptionState {
                publishing_interval,
                lifetime_count,
                max_keep_alive_count,
                max_notifications_per_publish,
                priority,
                publishing_enabled,
                lifetime_counter: 0,
                keep_alive_counter: 0,
                next_sequence_number: 1,
                items: HashMap::new(),
                retransmission: VecDeque::new(),
                late: false,
                deleted: false,
            }),
            tick_task: Mutex::new(None),
        })
    }

    /// The subscription id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The owning session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The granted publishing interval in milliseconds.
    pub fn publishing_interval(&self) -> f64 {
        self.state.lock().publishing_interval
    }

    /// The granted lifetime count.
    pub fn lifetime_count(&self) -> u32 {
        self.state.lock().lifetime_count
    }

    /// The granted keep-alive count.
    pub fn max_keep_alive_count(&self) -> u32 {
        self.state.lock().max_keep_alive_count
    }

    /// The subscription priority.
    pub fn priority(&self) -> u8 {
        self.state.lock().priority
    }

    /// The current lifetime counter, for tests and diagnostics.
    pub fn lifetime_counter(&self) -> u32 {
        self.state.lock().lifetime_counter
    }

    /// Resets the lifetime counter; every client touch on the subscription
    /// does this.
    pub fn reset_lifetime_counter(&self) {
        self.state.lock().lifetime_counter = 0;
    }

    /// Enables or disables publishing.
    pub fn set_publishing_mode(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.publishing_enabled = enabled;
        state.lifetime_counter = 0;
    }

    /// Applies new parameters, returning the revised
    /// `(publishing_interval, lifetime_count, max_keep_alive_count)`.
    pub fn modify(
        self: &Arc<Self>,
        ctx: &Arc<ServerContext>,
        requested_publishing_interval: f64,
        requested_lifetime_count: u32,
        requested_max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        priority: u8,
    ) -> (f64, u32, u32) {
        let (publishing_interval, lifetime_count, max_keep_alive_count) = revise_parameters(
            requested_publishing_interval,
            requested_lifetime_count,
            requested_max_keep_alive_count,
        );
        let restart = {
            let mut state = self.state.lock();
            let restart = state.publishing_interval != publishing_interval;
            state.publishing_interval = publishing_interval;
            state.lifetime_count = lifetime_count;
            state.max_keep_alive_count = max_keep_alive_count;
            state.max_notifications_per_publish = max_notifications_per_publish;
            state.priority = priority;
            state.lifetime_counter = 0;
            restart
        };
        if restart {
            self.stop_publishing();
            self.start_publishing(ctx);
        }
        (publishing_interval, lifetime_count, max_keep_alive_count)
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Adds a monitored item.
    pub fn append_item(&self, item: Arc<MonitoredItem>) {
        let mut state = self.state.lock();
        state.items.insert(item.id(), item);
        state.lifetime_counter = 0;
    }

    /// Looks up a monitored item by id.
    pub fn find_item(&self, id: u32) -> Option<Arc<MonitoredItem>> {
        self.state.lock().items.get(&id).cloned()
    }

    /// Removes a monitored item by id, detaching any event listener it
    /// registered.
    pub fn delete_item(&self, id: u32) -> bool {
        let removed = self.state.lock().items.remove(&id);
        match removed {
            Some(item) => {
                if let Some(object) = item.node().as_object() {
                    object.remove_event_listener(u64::from(item.id()));
                }
                true
            }
            None => false,
        }
    }

    /// Snapshot of the monitored items.
    pub fn items(&self) -> Vec<Arc<MonitoredItem>> {
        self.state.lock().items.values().cloned().collect()
    }

    // =========================================================================
    // Publishing timer
    // =========================================================================

    /// Spawns the per-subscription publishing timer.
    pub fn start_publishing(self: &Arc<Self>, ctx: &Arc<ServerContext>) {
        let sub = self.clone();
        let ctx = ctx.clone();
        let interval_ms = self.publishing_interval();
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs_f64(interval_ms / 1000.0);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // the first tick of tokio's interval fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !sub.tick(&ctx) {
                    break;
                }
            }
        });
        *self.tick_task.lock() = Some(handle);
    }

    /// Stops the publishing timer.
    pub fn stop_publishing(&self) {
        if let Some(handle) = self.tick_task.lock().take() {
            handle.abort();
        }
    }

    /// One publishing cycle. Samples due items, then either services a
    /// waiting publish request, marks the subscription late, or counts
    /// towards a keep-alive. Returns `false` once the subscription expired
    /// or was deleted.
    pub fn tick(self: &Arc<Self>, ctx: &Arc<ServerContext>) -> bool {
        if self.state.lock().deleted {
            return false;
        }
        self.sample_items();

        let pending = self.session.take_publish_request();

        // decide under the subscription lock, write after releasing it
        let mut to_write: Option<(PendingPublish, NotificationMessage, Vec<u32>)> = None;
        let mut give_back: Option<PendingPublish> = None;
        let expired;
        {
            let mut state = self.state.lock();
            if state.deleted {
                if let Some(pending) = pending {
                    self.session.add_publish_request(pending);
                }
                return false;
            }

            let has_ready = state.publishing_enabled
                && state.items.values().any(|item| item.has_notifications());

            if has_ready {
                match pending {
                    Some(pending) => {
                        let message = build_notification_message(&mut state, true);
                        state.retain_for_republish(message.clone(), self.max_retransmission);
                        state.keep_alive_counter = 0;
                        state.lifetime_counter = 0;
                        state.late = false;
                        let available = state.available_sequence_numbers();
                        to_write = Some((pending, message, available));
                    }
                    None => {
                        state.late = true;
                        state.lifetime_counter += 1;
                    }
                }
            } else {
                give_back = pending;
                state.lifetime_counter += 1;
                state.keep_alive_counter += 1;
                if state.keep_alive_counter >= state.max_keep_alive_count {
                    if let Some(pending) = give_back.take() {
                        // keep-alive: carries the next sequence number without
                        // consuming it and is not retained for republish
                        let message = NotificationMessage {
                            sequence_number: state.next_sequence_number,
                            publish_time: Some(Utc::now()),
                            notification_data: Vec::new(),
                        };
                        state.keep_alive_counter = 0;
                        state.lifetime_counter = 0;
                        let available = state.available_sequence_numbers();
                        to_write = Some((pending, message, available));
                    }
                }
            }
            expired = state.lifetime_counter >= state.lifetime_count;
        }

        if let Some(pending) = give_back {
            self.session.add_publish_request(pending);
        }
        if let Some((pending, message, available)) = to_write {
            self.write_publish_response(pending, message, available, false);
        }
        if expired {
            debug!(subscription = self.id, "subscription lifetime expired");
            self.expire(ctx);
            return false;
        }
        true
    }

    fn sample_items(&self) {
        let now = Instant::now();
        for item in self.items() {
            if !crate::monitored_item::is_value_item(item.item_to_monitor()) {
                continue;
            }
            if !item.is_sample_due(now) {
                continue;
            }
            if let Some(variable) = item.node().as_variable() {
                let sampled = crate::services::attribute::read_range(
                    variable.value(),
                    &item.item_to_monitor().index_range,
                );
                item.offer_sample(sampled, now);
            }
        }
    }

    /// Services a newly arrived publish request when the subscription is
    /// late or has notifications ready. Returns `true` when the request was
    /// consumed.
    pub fn handle_late_publish_request(self: &Arc<Self>, pending: PendingPublish) -> Result<(), PendingPublish> {
        let mut state = self.state.lock();
        if state.deleted {
            return Err(pending);
        }
        let has_ready = state.publishing_enabled
            && state.items.values().any(|item| item.has_notifications());
        if !(state.late || has_ready) {
            return Err(pending);
        }
        if !has_ready {
            state.late = false;
            return Err(pending);
        }
        let message = build_notification_message(&mut state, true);
        state.retain_for_republish(message.clone(), self.max_retransmission);
        state.keep_alive_counter = 0;
        state.lifetime_counter = 0;
        state.late = false;
        let available = state.available_sequence_numbers();
        drop(state);
        self.write_publish_response(pending, message, available, false);
        Ok(())
    }

    fn write_publish_response(
        &self,
        pending: PendingPublish,
        message: NotificationMessage,
        available: Vec<u32>,
        more_notifications: bool,
    ) {
        trace!(
            subscription = self.id,
            sequence = message.sequence_number,
            notifications = message.notification_data.len(),
            "publish"
        );
        pending.channel.write(
            ServiceResponse::Publish(Box::new(PublishResponse {
                response_header: ResponseHeader::good(pending.request_handle),
                subscription_id: self.id,
                available_sequence_numbers: available,
                more_notifications,
                notification_message: message,
                results: pending.results,
            })),
            pending.request_id,
        );
    }

    // =========================================================================
    // Acknowledge / republish / delete
    // =========================================================================

    /// Acknowledges a retained message by sequence number, dropping it from
    /// the retransmission queue.
    pub fn acknowledge(&self, sequence_number: u32) -> bool {
        let mut state = self.state.lock();
        let before = state.retransmission.len();
        state.retransmission.retain(|m| m.sequence_number != sequence_number);
        let found = state.retransmission.len() != before;
        if found {
            state.lifetime_counter = 0;
        }
        found
    }

    /// Fetches and removes a retained message for republish.
    pub fn republish(&self, sequence_number: u32) -> Option<NotificationMessage> {
        let mut state = self.state.lock();
        state.lifetime_counter = 0;
        let index = state
            .retransmission
            .iter()
            .position(|m| m.sequence_number == sequence_number)?;
        state.retransmission.remove(index)
    }

    /// Marks the subscription deleted, stops its timer and detaches all
    /// items.
    pub fn delete(&self) {
        {
            let mut state = self.state.lock();
            state.deleted = true;
            let ids: Vec<u32> = state.items.keys().copied().collect();
            for id in ids {
                if let Some(item) = state.items.remove(&id) {
                    if let Some(object) = item.node().as_object() {
                        object.remove_event_listener(u64::from(item.id()));
                    }
                }
            }
        }
        self.stop_publishing();
    }

    fn expire(self: &Arc<Self>, ctx: &Arc<ServerContext>) {
        self.session.push_state_change(StateChange {
            subscription_id: self.id,
            message: NotificationMessage {
                sequence_number: self.state.lock().next_sequence_number,
                publish_time: Some(Utc::now()),
                notification_data: vec![NotificationData::StatusChange {
                    status: StatusCode::BAD_TIMEOUT,
                }],
            },
        });
        ctx.subscriptions.remove(self.id);
        self.delete();
    }
}

impl SubscriptionState {
    fn retain_for_republish(&mut self, message: NotificationMessage, cap: usize) {
        while self.retransmission.len() >= cap {
            self.retransmission.pop_front();
        }
        self.retransmission.push_back(message);
    }

    fn available_sequence_numbers(&self) -> Vec<u32> {
        self.retransmission.iter().map(|m| m.sequence_number).collect()
    }
}

/// Collects ready notifications from the items into a sequenced message;
/// with `consume_sequence`, the subscription's sequence number advances.
fn build_notification_message(
    state: &mut SubscriptionState,
    consume_sequence: bool,
) -> NotificationMessage {
    let cap = state.max_notifications_per_publish as usize;
    let mut data_changes: Vec<MonitoredItemNotification> = Vec::new();
    let mut events: Vec<EventFieldList> = Vec::new();
    let mut remaining = if cap == 0 { usize::MAX } else { cap };

    let mut reporting: Vec<Arc<MonitoredItem>> = state
        .items
        .values()
        .filter(|item| item.has_notifications())
        .cloned()
        .collect();
    reporting.sort_by_key(|item| item.id());

    for item in &reporting {
        if remaining == 0 {
            break;
        }
        let taken = item.take_notifications(remaining);
        remaining = remaining.saturating_sub(taken.len());
        split_notifications(taken, &mut data_changes, &mut events);

        // a triggering item emits its linked items' reports alongside its own
        for linked_id in item.triggered_items() {
            if remaining == 0 {
                break;
            }
            if let Some(linked) = state.items.get(&linked_id) {
                let taken = linked.take_triggered_notifications(remaining);
                remaining = remaining.saturating_sub(taken.len());
                split_notifications(taken, &mut data_changes, &mut events);
            }
        }
    }

    let mut notification_data = Vec::new();
    if !data_changes.is_empty() {
        notification_data.push(NotificationData::DataChange { monitored_items: data_changes });
    }
    if !events.is_empty() {
        notification_data.push(NotificationData::Events { events });
    }

    let sequence_number = state.next_sequence_number;
    if consume_sequence {
        state.next_sequence_number = state.next_sequence_number.wrapping_add(1).max(1);
    }
    NotificationMessage {
        sequence_number,
        publish_time: Some(Utc::now()),
        notification_data,
    }
}

fn split_notifications(
    taken: Vec<QueuedNotification>,
    data_changes: &mut Vec<MonitoredItemNotification>,
    events: &mut Vec<EventFieldList>,
) {
    for notification in taken {
        match notification {
            QueuedNotification::DataChange(n) => data_changes.push(n),
            QueuedNotification::Event(e) => events.push(e),
        }
    }
}

// =============================================================================
// SubscriptionManager
// =============================================================================

/// Subscriptions keyed by id.
pub struct SubscriptionManager {
    subscriptions: DashMap<u32, Arc<Subscription>>,
    next_id: AtomicU32,
    max_subscriptions: usize,
}

impl SubscriptionManager {
    /// Creates a manager admitting at most `max_subscriptions`.
    pub fn new(max_subscriptions: usize) -> Self {
        Self { subscriptions: DashMap::new(), next_id: AtomicU32::new(1), max_subscriptions }
    }

    /// Allocates the next subscription id.
    pub fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Admits a subscription, failing with BadTooManySubscriptions at
    /// capacity.
    pub fn add(&self, subscription: Arc<Subscription>) -> Result<(), StatusCode> {
        if self.subscriptions.len() >= self.max_subscriptions {
            return Err(StatusCode::BAD_TOO_MANY_SUBSCRIPTIONS);
        }
        self.subscriptions.insert(subscription.id(), subscription);
        Ok(())
    }

    /// Looks up a subscription by id.
    pub fn get(&self, id: u32) -> Option<Arc<Subscription>> {
        self.subscriptions.get(&id).map(|e| e.value().clone())
    }

    /// Removes a subscription by id.
    pub fn remove(&self, id: u32) -> Option<Arc<Subscription>> {
        self.subscriptions.remove(&id).map(|(_, sub)| sub)
    }

    /// Number of live subscriptions across all sessions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` when no subscriptions exist.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// The subscriptions belonging to `session`.
    pub fn get_by_session(&self, session: &Session) -> Vec<Arc<Subscription>> {
        self.subscriptions
            .iter()
            .filter(|e| {
                e.value().session().authentication_token() == session.authentication_token()
            })
            .map(|e| e.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_revision() {
        let (interval, lifetime, keep_alive) = revise_parameters(0.0, 0, 0);
        assert_eq!(interval, MIN_PUBLISHING_INTERVAL_MS);
        assert_eq!(keep_alive, DEFAULT_MAX_KEEP_ALIVE_COUNT);
        assert_eq!(lifetime, keep_alive * 3);

        let (interval, lifetime, keep_alive) = revise_parameters(100.0, 9, 3);
        assert_eq!(interval, 100.0);
        assert_eq!(keep_alive, 3);
        assert_eq!(lifetime, 9);

        // lifetime below three keep-alive periods is raised
        let (_, lifetime, _) = revise_parameters(100.0, 2, 5);
        assert_eq!(lifetime, 15);
    }
}
