//! Process-wide table of streams and subscriptions.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::negotiation::MessageEncoding;

use super::stream::RestconfStream;

/// RFC 8639 subscription states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Suspended,
    Terminated,
}

impl SubscriptionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionState::Active => "active",
            SubscriptionState::Suspended => "suspended",
            SubscriptionState::Terminated => "terminated",
        }
    }
}

/// A client's registered interest in a stream, addressed by numeric id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: u32,
    pub stream_name: String,
    pub encoding: MessageEncoding,
    pub filter: Option<String>,
    pub state: SubscriptionState,
    pub last_sent: Option<DateTime<Utc>>,
}

/// Concurrent registry; every access goes through these methods.
#[derive(Debug)]
pub struct StreamRegistry {
    streams: DashMap<String, Arc<RestconfStream>>,
    subscriptions: DashMap<u32, Subscription>,
    next_subscription: AtomicU32,
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self {
            streams: DashMap::new(),
            subscriptions: DashMap::new(),
            next_subscription: AtomicU32::new(1),
        }
    }

    /// Add a stream, replacing (and ending) any stream of the same name.
    pub fn register_stream(&self, stream: Arc<RestconfStream>) {
        tracing::info!(stream = %stream.name(), "Registered event stream");
        if let Some(previous) = self.streams.insert(stream.name().to_owned(), stream) {
            previous.end();
        }
    }

    pub fn lookup_stream(&self, name: &str) -> Option<Arc<RestconfStream>> {
        self.streams.get(name).map(|entry| entry.value().clone())
    }

    /// Remove a stream and end every sender attached to it.
    pub fn remove_stream(&self, name: &str) -> Option<Arc<RestconfStream>> {
        let (_, stream) = self.streams.remove(name)?;
        stream.end();
        tracing::info!(stream = %name, "Removed event stream");
        Some(stream)
    }

    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.streams.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// End every attached sender on every stream. Used when shutting down
    /// so that open event streams let their connections drain.
    pub fn end_streams(&self) {
        let streams: Vec<Arc<RestconfStream>> =
            self.streams.iter().map(|e| e.value().clone()).collect();
        for stream in streams {
            stream.end();
        }
    }

    /// Record a new active subscription and return its id.
    pub fn register_subscription(
        &self,
        stream_name: impl Into<String>,
        encoding: MessageEncoding,
        filter: Option<String>,
    ) -> u32 {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let subscription = Subscription {
            id,
            stream_name: stream_name.into(),
            encoding,
            filter,
            state: SubscriptionState::Active,
            last_sent: None,
        };
        tracing::info!(subscription = id, stream = %subscription.stream_name, "Registered subscription");
        self.subscriptions.insert(id, subscription);
        id
    }

    pub fn lookup_subscription(&self, id: u32) -> Option<Subscription> {
        self.subscriptions.get(&id).map(|entry| entry.value().clone())
    }

    /// Returns `false` for an unknown id.
    pub fn set_subscription_state(&self, id: u32, state: SubscriptionState) -> bool {
        match self.subscriptions.get_mut(&id) {
            Some(mut entry) => {
                entry.state = state;
                true
            }
            None => false,
        }
    }

    pub fn remove_subscription(&self, id: u32) -> Option<Subscription> {
        self.subscriptions.remove(&id).map(|(_, subscription)| subscription)
    }

    pub fn record_last_sent(&self, id: u32) {
        if let Some(mut entry) = self.subscriptions.get_mut(&id) {
            entry.last_sent = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::sender::{channel, SseFrame};

    #[test]
    fn test_stream_lifecycle() {
        let registry = StreamRegistry::new();
        registry.register_stream(RestconfStream::new("NETCONF", MessageEncoding::ALL.to_vec()));
        assert!(registry.lookup_stream("NETCONF").is_some());
        assert!(registry.lookup_stream("missing").is_none());
        assert_eq!(registry.stream_names(), vec!["NETCONF".to_string()]);

        assert!(registry.remove_stream("NETCONF").is_some());
        assert!(registry.lookup_stream("NETCONF").is_none());
        assert!(registry.remove_stream("NETCONF").is_none());
    }

    #[test]
    fn test_removing_stream_ends_senders() {
        let registry = StreamRegistry::new();
        let stream = RestconfStream::new("NETCONF", MessageEncoding::ALL.to_vec());
        registry.register_stream(stream.clone());
        let (sender, mut rx) = channel(2);
        let _registration = stream
            .add_subscriber(Arc::new(sender), MessageEncoding::Json, None)
            .unwrap();

        registry.remove_stream("NETCONF");
        assert_eq!(rx.try_recv().ok(), Some(SseFrame::End));
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let registry = StreamRegistry::new();
        let a = registry.register_subscription("NETCONF", MessageEncoding::Json, None);
        let b = registry.register_subscription("NETCONF", MessageEncoding::Xml, Some("f".into()));
        assert_ne!(a, b);
        assert_eq!(registry.lookup_subscription(b).unwrap().filter.as_deref(), Some("f"));
    }

    #[test]
    fn test_subscription_state_and_removal() {
        let registry = StreamRegistry::new();
        let id = registry.register_subscription("NETCONF", MessageEncoding::Json, None);
        assert!(registry.set_subscription_state(id, SubscriptionState::Suspended));
        assert_eq!(
            registry.lookup_subscription(id).unwrap().state,
            SubscriptionState::Suspended
        );
        assert!(!registry.set_subscription_state(id + 100, SubscriptionState::Active));

        assert!(registry.remove_subscription(id).is_some());
        assert!(registry.lookup_subscription(id).is_none());
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(StreamRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| registry.register_subscription("s", MessageEncoding::Json, None))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400);
    }
}
