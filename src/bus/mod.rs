//! In-process typed pub/sub with per-subscriber in-order delivery and an
//! optional external transport.
//!
//! Each subscription owns an unbounded queue drained by a dedicated worker
//! task, so events from one publisher reach one subscriber in publish order
//! while distinct subscribers run concurrently. `publish` never waits on
//! handler completion; each handler invocation is bounded by a deadline and
//! a panicking or overrunning handler is logged, never fatal.

mod event;
#[cfg(feature = "nats")]
mod transport;

pub use event::{Event, EventPayload, EventType};
#[cfg(feature = "nats")]
pub use transport::NatsEventTransport;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace, warn};

/// Default bound on a single handler invocation.
const DEFAULT_HANDLER_DEADLINE: Duration = Duration::from_secs(30);

/// An async event handler. Use [`handler`] to build one from an async
/// closure.
pub type EventHandler = Arc<dyn Fn(Event) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Wrap an async closure as an [`EventHandler`].
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// Identity of one subscription, usable for targeted removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    sender: mpsc::UnboundedSender<Event>,
}

/// The in-process event bus.
pub struct EventBus {
    subscribers: RwLock<HashMap<EventType, Vec<Subscription>>>,
    next_id: AtomicU64,
    handler_deadline: Duration,
    shutdown: CancellationToken,
    #[cfg(feature = "nats")]
    transport: RwLock<Option<Arc<NatsEventTransport>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// A bus with the default 30-second handler deadline.
    pub fn new() -> Self {
        Self::with_handler_deadline(DEFAULT_HANDLER_DEADLINE)
    }

    /// A bus with a custom handler deadline (tests use short ones).
    pub fn with_handler_deadline(handler_deadline: Duration) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            handler_deadline,
            shutdown: CancellationToken::new(),
            #[cfg(feature = "nats")]
            transport: RwLock::new(None),
        }
    }

    /// Attach an external transport; every published event is forwarded.
    #[cfg(feature = "nats")]
    pub fn set_transport(&self, transport: Arc<NatsEventTransport>) {
        *self.transport.write().expect("bus transport lock poisoned") = Some(transport);
    }

    /// Register a handler for one event type.
    ///
    /// Spawns the subscription's delivery worker, so this must run inside a
    /// Tokio runtime. Events already queued for other subscribers are not
    /// replayed.
    pub fn subscribe(&self, event_type: EventType, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::AcqRel));
        let (sender, mut receiver) = mpsc::unbounded_channel::<Event>();
        let deadline = self.handler_deadline;
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = receiver.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                let event_id = event.id;
                // Spawned so a panicking handler surfaces as a JoinError
                // instead of killing the delivery worker.
                let invocation = tokio::spawn(handler(event));
                let abort = invocation.abort_handle();
                match tokio::time::timeout(deadline, invocation).await {
                    Ok(Ok(())) => {}
                    Ok(Err(join_error)) if join_error.is_panic() => {
                        error!(%event_id, %event_type, %join_error, "event handler panicked");
                    }
                    Ok(Err(_)) => {}
                    Err(_) => {
                        abort.abort();
                        warn!(%event_id, %event_type, ?deadline, "event handler exceeded deadline");
                    }
                }
            }
            trace!(%event_type, "subscription worker stopped");
        });

        self.subscribers
            .write()
            .expect("bus subscriber lock poisoned")
            .entry(event_type)
            .or_default()
            .push(Subscription { id, sender });
        id
    }

    /// Publish an event to every current subscriber of its type.
    ///
    /// Returns the number of local subscribers the event was queued for.
    /// Never blocks on handler completion.
    pub fn publish(&self, event: Event) -> usize {
        #[cfg(feature = "nats")]
        if let Some(transport) = self
            .transport
            .read()
            .expect("bus transport lock poisoned")
            .as_ref()
        {
            transport.forward(&event);
        }

        self.dispatch_local(event)
    }

    /// Deliver an event to local subscribers only (used by the transport
    /// ingest path to avoid re-forwarding remote events).
    pub(crate) fn dispatch_local(&self, event: Event) -> usize {
        let subscribers = self
            .subscribers
            .read()
            .expect("bus subscriber lock poisoned");
        let Some(subs) = subscribers.get(&event.event_type) else {
            trace!(event_type = %event.event_type, "no subscribers; event dropped");
            return 0;
        };

        let mut delivered = 0;
        for sub in subs {
            if sub.sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        trace!(
            event_type = %event.event_type,
            event_id = %event.id,
            delivered,
            "event dispatched"
        );
        delivered
    }

    /// Remove every subscription for one event type.
    pub fn unsubscribe(&self, event_type: EventType) {
        self.subscribers
            .write()
            .expect("bus subscriber lock poisoned")
            .remove(&event_type);
    }

    /// Remove a single subscription by id. Returns `true` if it existed.
    pub fn unsubscribe_id(&self, event_type: EventType, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .expect("bus subscriber lock poisoned");
        let Some(subs) = subscribers.get_mut(&event_type) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|sub| sub.id != id);
        subs.len() != before
    }

    /// Stop delivery: cancels every worker and drops all subscriptions.
    /// Events published after close are dropped.
    pub fn close(&self) {
        self.shutdown.cancel();
        self.subscribers
            .write()
            .expect("bus subscriber lock poisoned")
            .clear();
    }

    /// Number of active subscriptions for one event type.
    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.subscribers
            .read()
            .expect("bus subscriber lock poisoned")
            .get(&event_type)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::{Duration, sleep};

    fn status_event(status: &str) -> Event {
        Event::new(
            "test",
            EventPayload::SystemStatus {
                component: "test".to_string(),
                status: status.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn delivers_to_matching_subscribers() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.subscribe(
            EventType::SystemStatus,
            handler(move |event| {
                let seen = Arc::clone(&seen_clone);
                async move {
                    seen.lock().unwrap().push(event.id);
                }
            }),
        );

        let delivered = bus.publish(status_event("started"));
        assert_eq!(delivered, 1);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn preserves_per_topic_order_for_one_subscriber() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.subscribe(
            EventType::SystemStatus,
            handler(move |event| {
                let seen = Arc::clone(&seen_clone);
                async move {
                    if let EventPayload::SystemStatus { status, .. } = event.payload {
                        seen.lock().unwrap().push(status);
                    }
                }
            }),
        );

        for i in 0..20 {
            bus.publish(status_event(&format!("s{i}")));
        }
        sleep(Duration::from_millis(100)).await;

        let seen = seen.lock().unwrap();
        let expected: Vec<String> = (0..20).map(|i| format!("s{i}")).collect();
        assert_eq!(*seen, expected);
    }

    #[tokio::test]
    async fn unsubscribed_types_get_nothing() {
        let bus = EventBus::new();
        bus.subscribe(EventType::SystemStatus, handler(|_| async {}));
        assert_eq!(bus.subscriber_count(EventType::SystemStatus), 1);

        bus.unsubscribe(EventType::SystemStatus);
        assert_eq!(bus.subscriber_count(EventType::SystemStatus), 0);
        assert_eq!(bus.publish(status_event("ignored")), 0);
    }

    #[tokio::test]
    async fn slow_handler_does_not_stall_the_bus() {
        let bus = EventBus::with_handler_deadline(Duration::from_millis(20));
        let fast_count = Arc::new(Mutex::new(0usize));
        let fast_clone = Arc::clone(&fast_count);

        bus.subscribe(
            EventType::SystemStatus,
            handler(|_| async {
                sleep(Duration::from_secs(3600)).await;
            }),
        );
        bus.subscribe(
            EventType::SystemStatus,
            handler(move |_| {
                let count = Arc::clone(&fast_clone);
                async move {
                    *count.lock().unwrap() += 1;
                }
            }),
        );

        bus.publish(status_event("one"));
        bus.publish(status_event("two"));
        sleep(Duration::from_millis(200)).await;
        assert_eq!(*fast_count.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let bus = EventBus::new();
        let after = Arc::new(Mutex::new(0usize));
        let after_clone = Arc::clone(&after);

        bus.subscribe(
            EventType::SystemStatus,
            handler(|_| async {
                panic!("handler blew up");
            }),
        );
        bus.subscribe(
            EventType::SystemStatus,
            handler(move |_| {
                let after = Arc::clone(&after_clone);
                async move {
                    *after.lock().unwrap() += 1;
                }
            }),
        );

        bus.publish(status_event("boom"));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(*after.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn close_stops_delivery() {
        let bus = EventBus::new();
        bus.subscribe(EventType::SystemStatus, handler(|_| async {}));
        bus.close();
        assert_eq!(bus.publish(status_event("late")), 0);
    }
}
