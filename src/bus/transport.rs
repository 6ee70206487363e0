//! NATS transport for the event bus.
//!
//! Outbound: every published event is serialized to JSON and forwarded to
//! `{prefix}.{event_type}`. The forward is non-blocking on the publish
//! path: serialization happens synchronously, the NATS publish is spawned
//! onto a Tokio runtime and transient failures retry with exponential
//! backoff. Inbound: an ingest loop subscribes to `{prefix}.>` and
//! re-injects remote events to local subscribers only, so they are never
//! forwarded back out.
//!
//! Only compiled with the `nats` feature.

use crate::bus::{Event, EventBus};
use futures_util::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Maximum retry attempts for a transient publish failure.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff between retries, in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 10;

/// Forwards bus events to NATS subjects and ingests remote events.
pub struct NatsEventTransport {
    client: async_nats::Client,
    subject_prefix: String,
    runtime: tokio::runtime::Handle,
    publish_count: AtomicU64,
    error_count: AtomicU64,
    max_retries: u32,
}

impl NatsEventTransport {
    /// Create a transport over an existing NATS client.
    ///
    /// * `subject_prefix` — events go to `{prefix}.{event_type}`.
    /// * `runtime` — handle used to spawn the async publishes.
    pub fn new(
        client: async_nats::Client,
        subject_prefix: String,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        Self {
            client,
            subject_prefix,
            runtime,
            publish_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Override the retry budget. Zero disables retries.
    #[must_use = "builders do nothing unless consumed"]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Successfully forwarded message count.
    #[must_use]
    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::Relaxed)
    }

    /// Permanently failed forward count (retries exhausted).
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Forward one event. Serialization failures are logged and counted;
    /// the caller is never blocked or failed.
    pub(crate) fn forward(self: &Arc<Self>, event: &Event) {
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => bytes::Bytes::from(payload),
            Err(err) => {
                self.error_count.fetch_add(1, Ordering::Relaxed);
                error!(event_id = %event.id, %err, "event serialization failed; not forwarded");
                return;
            }
        };
        let subject = format!("{}.{}", self.subject_prefix, event.event_type);
        let transport = Arc::clone(self);
        let event_id = event.id;

        self.runtime.spawn(async move {
            let mut attempt = 0u32;
            loop {
                match transport
                    .client
                    .publish(subject.clone(), payload.clone())
                    .await
                {
                    Ok(()) => {
                        transport.publish_count.fetch_add(1, Ordering::Relaxed);
                        trace!(%event_id, subject, "event forwarded to transport");
                        return;
                    }
                    Err(err) if attempt < transport.max_retries => {
                        attempt += 1;
                        let delay = BASE_RETRY_DELAY_MS * (1 << attempt.min(6));
                        warn!(%event_id, subject, %err, attempt, "transport publish failed; retrying");
                        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    }
                    Err(err) => {
                        transport.error_count.fetch_add(1, Ordering::Relaxed);
                        error!(%event_id, subject, %err, "transport publish failed permanently");
                        return;
                    }
                }
            }
        });
    }

    /// Ingest remote events until cancelled.
    ///
    /// Subscribes to `{prefix}.>` and re-publishes each decoded event to
    /// local subscribers. Events published by this process come back on the
    /// same subjects; callers who want to suppress them can compare the
    /// event `source` against their own component names.
    pub async fn run_ingest(
        self: Arc<Self>,
        bus: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> Result<(), async_nats::SubscribeError> {
        let subject = format!("{}.>", self.subject_prefix);
        let mut subscription = self.client.subscribe(subject.clone()).await?;
        debug!(subject, "transport ingest started");

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = subscription.next() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            match serde_json::from_slice::<Event>(&message.payload) {
                Ok(event) => {
                    bus.dispatch_local(event);
                }
                Err(err) => {
                    warn!(subject = %message.subject, %err, "undecodable transport event dropped");
                }
            }
        }
        debug!("transport ingest stopped");
        Ok(())
    }
}
