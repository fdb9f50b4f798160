//! # Event Bus System
//!
//! Broadcasts what the offline core is doing using `tokio::sync::broadcast`,
//! so hosts can drive UI ("ready to work offline", "new version active") and
//! diagnostics without coupling to the core's internals.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wraps one enum per domain
//!   ([`LifecycleEvent`], [`CacheEvent`], [`SyncEvent`])
//! - **EventBus**: central broadcast channel for publishing events
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐
//! │ LifecycleCtrl    ├──────────>│           │   subscribe   ┌────────────┐
//! └──────────────────┘           │ EventBus  ├──────────────>│ Subscriber │
//! ┌──────────────────┐   emit    │ (broadcast│               └────────────┘
//! │ BackgroundWriter ├──────────>│  channel) │   subscribe   ┌────────────┐
//! └──────────────────┘           │           ├──────────────>│ Subscriber │
//! ┌──────────────────┐   emit    │           │               └────────────┘
//! │ SyncTrigger      ├──────────>│           │
//! └──────────────────┘           └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Sync(SyncEvent::Completed {
//!     tag: "sync-data".to_string(),
//! }))
//! .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.description(), "Sync procedure completed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns `Err(SendError)`. Publishers in the
//! core ignore that error: events are advisory.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Provision / activate progress and controller state changes
    Lifecycle(LifecycleEvent),
    /// Per-request cache activity
    Cache(CacheEvent),
    /// Background sync trigger activity
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Lifecycle(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Lifecycle(LifecycleEvent::ProvisionFailed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Lifecycle(LifecycleEvent::NamespaceDeleteFailed { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Cache(CacheEvent::WriteFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::FallbackServed { .. }) => EventSeverity::Warning,
            CoreEvent::Lifecycle(LifecycleEvent::Provisioned { .. }) => EventSeverity::Info,
            CoreEvent::Lifecycle(LifecycleEvent::Activated { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Lifecycle Events
// ============================================================================

/// Events raised by the lifecycle controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    /// The controller moved between states.
    StateChanged {
        /// State name before the transition (e.g. "uninstalled").
        from: String,
        /// State name after the transition.
        to: String,
    },
    /// Every manifest entry was fetched and stored.
    Provisioned {
        namespace: String,
        /// Number of entries written.
        entries: usize,
    },
    /// Provisioning aborted; the controller is back to uninstalled.
    ProvisionFailed {
        namespace: String,
        /// Manifest entry (redacted URL) that could not be fetched or stored.
        entry: String,
        message: String,
    },
    /// Stale namespaces were pruned and the current one took control.
    Activated {
        namespace: String,
        /// Stale namespaces that were deleted.
        deleted: Vec<String>,
        /// Clients claimed, when claiming is enabled.
        clients_claimed: usize,
    },
    /// A stale namespace could not be deleted during activation.
    NamespaceDeleteFailed { namespace: String, message: String },
}

impl LifecycleEvent {
    fn description(&self) -> &str {
        match self {
            LifecycleEvent::StateChanged { .. } => "Lifecycle state changed",
            LifecycleEvent::Provisioned { .. } => "Application shell provisioned",
            LifecycleEvent::ProvisionFailed { .. } => "Provisioning failed",
            LifecycleEvent::Activated { .. } => "Cache version activated",
            LifecycleEvent::NamespaceDeleteFailed { .. } => "Stale namespace deletion failed",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events describing how intercepted requests were served.
///
/// URLs are redacted (no query string) before they are published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// Served from the current namespace without touching the network.
    Hit { url: String },
    /// Not in the current namespace; the network was consulted.
    Miss { url: String },
    /// A background write completed.
    Stored { namespace: String, url: String },
    /// A background write failed. The original request was unaffected.
    WriteFailed {
        namespace: String,
        url: String,
        message: String,
    },
    /// The network failed and a stored substitute was served instead.
    FallbackServed {
        url: String,
        /// URL of the document that was served.
        served: String,
    },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::Hit { .. } => "Cache hit",
            CacheEvent::Miss { .. } => "Cache miss",
            CacheEvent::Stored { .. } => "Response stored",
            CacheEvent::WriteFailed { .. } => "Background cache write failed",
            CacheEvent::FallbackServed { .. } => "Offline fallback served",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events raised by the sync trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// The procedure was invoked for a recognized tag.
    Started { tag: String },
    Completed { tag: String },
    /// The procedure failed. The trigger stays armed.
    Failed { tag: String, message: String },
    /// The signal carried a tag nobody registered.
    Ignored { tag: String },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync procedure started",
            SyncEvent::Completed { .. } => "Sync procedure completed",
            SyncEvent::Failed { .. } => "Sync procedure failed",
            SyncEvent::Ignored { .. } => "Sync signal ignored",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls more than `capacity` events behind receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(100);
/// let cache_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Cache(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n`
    /// events, `RecvError::Closed` once all senders are gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> CoreEvent {
        CoreEvent::Cache(CacheEvent::Hit {
            url: url.to_string(),
        })
    }

    fn sync_completed() -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Completed {
            tag: "sync-data".to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(hit("https://app.example/")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.emit(sync_completed()).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), sync_completed());
        assert_eq!(second.recv().await.unwrap(), sync_completed());
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Sync(_)));

        bus.emit(hit("https://app.example/app.js")).unwrap();
        bus.emit(sync_completed()).unwrap();

        assert_eq!(stream.recv().await.unwrap(), sync_completed());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.emit(hit(&format!("https://app.example/{i}"))).unwrap();
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Lifecycle(LifecycleEvent::ProvisionFailed {
            namespace: "shell-v1".to_string(),
            entry: "https://app.example/app.js".to_string(),
            message: "HTTP 404".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let write_failed = CoreEvent::Cache(CacheEvent::WriteFailed {
            namespace: "shell-v1".to_string(),
            url: "https://app.example/app.js".to_string(),
            message: "disk full".to_string(),
        });
        assert_eq!(write_failed.severity(), EventSeverity::Warning);

        assert_eq!(sync_completed().severity(), EventSeverity::Info);
        assert_eq!(hit("https://app.example/").severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Lifecycle(LifecycleEvent::Activated {
            namespace: "shell-v2".to_string(),
            deleted: vec!["shell-v1".to_string()],
            clients_claimed: 3,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Lifecycle");
        assert_eq!(json["payload"]["event"], "Activated");
        assert_eq!(json["payload"]["deleted"][0], "shell-v1");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_try_recv() {
        let bus = EventBus::default();
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(sync_completed()).unwrap();
        assert_eq!(stream.try_recv().unwrap().unwrap(), sync_completed());
    }
}
