//! A named notification source and its attached senders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::backend::FormatError;
use crate::negotiation::MessageEncoding;

use super::sender::Sender;

/// A notification that can be rendered for one subscriber.
pub trait StreamEvent: Send + Sync {
    /// Render in `encoding`. `Ok(None)` means the event does not pass
    /// `filter` and is not delivered.
    fn format(
        &self,
        encoding: MessageEncoding,
        filter: Option<&str>,
    ) -> Result<Option<String>, FormatError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("stream '{stream}' does not support {encoding} encoding")]
    UnsupportedEncoding {
        stream: String,
        encoding: MessageEncoding,
    },
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("stream '{0}' has ended")]
    Ended(String),
}

struct Subscriber {
    sender: Arc<dyn Sender>,
    encoding: MessageEncoding,
    filter: Option<String>,
}

/// Attached senders. `ended` lives under the same lock so a registration can
/// never slip in after `end` has drained the map.
#[derive(Default)]
struct Subscribers {
    ended: bool,
    attached: HashMap<u64, Subscriber>,
}

pub struct RestconfStream {
    name: String,
    encodings: Vec<MessageEncoding>,
    subscribers: Mutex<Subscribers>,
    next_subscriber: AtomicU64,
}

impl std::fmt::Debug for RestconfStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestconfStream")
            .field("name", &self.name)
            .field("encodings", &self.encodings)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl RestconfStream {
    pub fn new(name: impl Into<String>, encodings: Vec<MessageEncoding>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            encodings,
            subscribers: Mutex::new(Subscribers::default()),
            next_subscriber: AtomicU64::new(1),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports(&self, encoding: MessageEncoding) -> bool {
        self.encodings.contains(&encoding)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.attached.len()).unwrap_or(0)
    }

    /// Attach a sender. Nothing is attached unless the whole registration
    /// succeeds; dropping the returned handle detaches it again.
    pub fn add_subscriber(
        self: &Arc<Self>,
        sender: Arc<dyn Sender>,
        encoding: MessageEncoding,
        filter: Option<String>,
    ) -> Result<Registration, RegistrationError> {
        if !self.supports(encoding) {
            return Err(RegistrationError::UnsupportedEncoding {
                stream: self.name.clone(),
                encoding,
            });
        }
        if let Some(filter) = &filter {
            if filter.trim().is_empty() {
                return Err(RegistrationError::InvalidFilter("empty filter".into()));
            }
        }

        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| RegistrationError::Ended(self.name.clone()))?;
        if subscribers.ended {
            return Err(RegistrationError::Ended(self.name.clone()));
        }
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        subscribers.attached.insert(
            id,
            Subscriber {
                sender,
                encoding,
                filter,
            },
        );
        tracing::debug!(stream = %self.name, subscriber = id, %encoding, "Subscriber attached");

        Ok(Registration {
            stream: Arc::downgrade(self),
            id,
        })
    }

    fn remove_subscriber(&self, id: u64) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            if subscribers.attached.remove(&id).is_some() {
                tracing::debug!(stream = %self.name, subscriber = id, "Subscriber detached");
            }
        }
    }

    /// Render `event` once per distinct (encoding, filter) pair and hand it
    /// to every matching sender. Returns the number of senders reached.
    pub fn publish(&self, event: &dyn StreamEvent) -> usize {
        let targets: Vec<(Arc<dyn Sender>, MessageEncoding, Option<String>)> =
            match self.subscribers.lock() {
                Ok(subscribers) => subscribers
                    .attached
                    .values()
                    .map(|s| (s.sender.clone(), s.encoding, s.filter.clone()))
                    .collect(),
                Err(_) => return 0,
            };

        let mut rendered: HashMap<(MessageEncoding, Option<String>), Option<String>> =
            HashMap::new();
        let mut delivered = 0;
        for (sender, encoding, filter) in targets {
            let message = rendered
                .entry((encoding, filter.clone()))
                .or_insert_with(|| match event.format(encoding, filter.as_deref()) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!(stream = %self.name, error = %e, "Failed to render event");
                        None
                    }
                });
            if let Some(message) = message {
                sender.send_data_message(message);
                delivered += 1;
            }
        }
        delivered
    }

    /// End every attached sender and refuse new ones.
    pub fn end(&self) {
        let drained: Vec<Subscriber> = match self.subscribers.lock() {
            Ok(mut subscribers) => {
                subscribers.ended = true;
                subscribers.attached.drain().map(|(_, s)| s).collect()
            }
            Err(_) => Vec::new(),
        };
        for subscriber in drained {
            subscriber.sender.end_of_stream();
        }
    }
}

/// Keeps a sender attached to its stream; detaches on drop.
#[derive(Debug)]
pub struct Registration {
    stream: Weak<RestconfStream>,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.upgrade() {
            stream.remove_subscriber(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::sender::{channel, SseFrame};

    struct Tick(&'static str);

    impl StreamEvent for Tick {
        fn format(
            &self,
            encoding: MessageEncoding,
            filter: Option<&str>,
        ) -> Result<Option<String>, FormatError> {
            if filter.is_some_and(|f| !self.0.starts_with(f)) {
                return Ok(None);
            }
            Ok(Some(format!("{encoding}:{}", self.0)))
        }
    }

    fn stream() -> Arc<RestconfStream> {
        RestconfStream::new("NETCONF", vec![MessageEncoding::Json, MessageEncoding::Xml])
    }

    #[test]
    fn test_publish_renders_per_encoding() {
        let stream = stream();
        let (json, mut json_rx) = channel(4);
        let (xml, mut xml_rx) = channel(4);
        let _a = stream
            .add_subscriber(Arc::new(json), MessageEncoding::Json, None)
            .unwrap();
        let _b = stream
            .add_subscriber(Arc::new(xml), MessageEncoding::Xml, None)
            .unwrap();

        assert_eq!(stream.publish(&Tick("up")), 2);
        assert_eq!(json_rx.try_recv().ok(), Some(SseFrame::Data("json:up".into())));
        assert_eq!(xml_rx.try_recv().ok(), Some(SseFrame::Data("xml:up".into())));
    }

    #[test]
    fn test_filter_excludes_events() {
        let stream = stream();
        let (sender, mut rx) = channel(4);
        let _r = stream
            .add_subscriber(Arc::new(sender), MessageEncoding::Json, Some("interfaces".into()))
            .unwrap();
        assert_eq!(stream.publish(&Tick("routing")), 0);
        assert_eq!(stream.publish(&Tick("interfaces/eth0")), 1);
        assert_eq!(
            rx.try_recv().ok(),
            Some(SseFrame::Data("json:interfaces/eth0".into()))
        );
    }

    #[test]
    fn test_dropping_registration_detaches() {
        let stream = stream();
        let (sender, _rx) = channel(4);
        let registration = stream
            .add_subscriber(Arc::new(sender), MessageEncoding::Json, None)
            .unwrap();
        assert_eq!(stream.subscriber_count(), 1);
        drop(registration);
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn test_failed_registration_attaches_nothing() {
        let stream = RestconfStream::new("json-only", vec![MessageEncoding::Json]);
        let (sender, _rx) = channel(4);
        let err = stream
            .add_subscriber(Arc::new(sender.clone()), MessageEncoding::Xml, None)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnsupportedEncoding { .. }));

        let err = stream
            .add_subscriber(Arc::new(sender), MessageEncoding::Json, Some(" ".into()))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidFilter(_)));
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn test_end_closes_senders_and_rejects_new_ones() {
        let stream = stream();
        let (sender, mut rx) = channel(4);
        let _r = stream
            .add_subscriber(Arc::new(sender.clone()), MessageEncoding::Json, None)
            .unwrap();
        stream.end();
        assert_eq!(rx.try_recv().ok(), Some(SseFrame::End));
        assert!(matches!(
            stream.add_subscriber(Arc::new(sender), MessageEncoding::Json, None),
            Err(RegistrationError::Ended(_))
        ));
    }

    #[test]
    fn test_registration_waiting_on_lock_sees_end() {
        let stream = stream();
        let mut guard = stream.subscribers.lock().unwrap();

        let registering = {
            let stream = stream.clone();
            std::thread::spawn(move || {
                let (sender, rx) = channel(4);
                let result = stream
                    .add_subscriber(Arc::new(sender), MessageEncoding::Json, None)
                    .map(drop);
                (result, rx)
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        // What `end` does once it wins the lock.
        guard.ended = true;
        drop(guard);

        let (result, mut rx) = registering.join().unwrap();
        assert!(matches!(result, Err(RegistrationError::Ended(_))));
        assert_eq!(stream.subscriber_count(), 0);
        assert!(rx.try_recv().is_err());
    }
}
