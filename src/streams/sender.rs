//! Delivery side of an event stream.

use std::sync::Weak;

use tokio::sync::mpsc;

use super::registry::StreamRegistry;

/// Pushes messages onto exactly one outbound channel.
pub trait Sender: Send + Sync {
    /// Deliver one message as a single SSE event. Silently dropped once the
    /// channel is gone.
    fn send_data_message(&self, message: &str);

    /// Close the channel after everything queued so far.
    fn end_of_stream(&self);
}

/// What travels from publishers to the connection that owns the SSE body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Data(String),
    End,
}

/// Creates a bounded frame channel.
pub fn channel(capacity: usize) -> (ChannelSender, mpsc::Receiver<SseFrame>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSender { tx }, rx)
}

/// Sender bound to the frame channel of one SSE response.
///
/// Publishers run on arbitrary tasks; frames are handed off through the
/// channel and written by the task serving the connection.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::Sender<SseFrame>,
}

impl ChannelSender {
    /// Returns `true` if the frame was queued.
    fn push(&self, frame: SseFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Event stream consumer is lagging, dropping message");
                false
            }
        }
    }
}

impl Sender for ChannelSender {
    fn send_data_message(&self, message: &str) {
        self.push(SseFrame::Data(message.to_owned()));
    }

    fn end_of_stream(&self) {
        self.push(SseFrame::End);
    }
}

/// Channel sender that also records delivery times on its subscription.
pub struct SubscriptionSender {
    inner: ChannelSender,
    registry: Weak<StreamRegistry>,
    subscription_id: u32,
}

impl SubscriptionSender {
    pub fn new(inner: ChannelSender, registry: Weak<StreamRegistry>, subscription_id: u32) -> Self {
        Self {
            inner,
            registry,
            subscription_id,
        }
    }
}

impl Sender for SubscriptionSender {
    fn send_data_message(&self, message: &str) {
        if self.inner.push(SseFrame::Data(message.to_owned())) {
            if let Some(registry) = self.registry.upgrade() {
                registry.record_last_sent(self.subscription_id);
            }
        }
    }

    fn end_of_stream(&self) {
        self.inner.end_of_stream();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::negotiation::MessageEncoding;
    use crate::streams::registry::SubscriptionState;

    #[tokio::test]
    async fn test_channel_sender_delivers_in_order() {
        let (sender, mut rx) = channel(4);
        sender.send_data_message("one");
        sender.send_data_message("two");
        sender.end_of_stream();
        assert_eq!(rx.recv().await, Some(SseFrame::Data("one".into())));
        assert_eq!(rx.recv().await, Some(SseFrame::Data("two".into())));
        assert_eq!(rx.recv().await, Some(SseFrame::End));
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (sender, rx) = channel(1);
        drop(rx);
        sender.send_data_message("lost");
        sender.end_of_stream();
    }

    #[test]
    fn test_full_channel_drops_message() {
        let (sender, mut rx) = channel(1);
        sender.send_data_message("kept");
        sender.send_data_message("dropped");
        assert_eq!(rx.try_recv().ok(), Some(SseFrame::Data("kept".into())));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_subscription_sender_records_last_sent() {
        let registry = Arc::new(StreamRegistry::new());
        let id = registry.register_subscription("NETCONF", MessageEncoding::Json, None);
        let (inner, _rx) = channel(4);
        let sender = SubscriptionSender::new(inner, Arc::downgrade(&registry), id);

        assert!(registry.lookup_subscription(id).unwrap().last_sent.is_none());
        sender.send_data_message("event");
        let subscription = registry.lookup_subscription(id).unwrap();
        assert!(subscription.last_sent.is_some());
        assert_eq!(subscription.state, SubscriptionState::Active);
    }

    #[test]
    fn test_subscription_sender_skips_bookkeeping_when_closed() {
        let registry = Arc::new(StreamRegistry::new());
        let id = registry.register_subscription("NETCONF", MessageEncoding::Json, None);
        let (inner, rx) = channel(4);
        drop(rx);
        let sender = SubscriptionSender::new(inner, Arc::downgrade(&registry), id);
        sender.send_data_message("event");
        assert!(registry.lookup_subscription(id).unwrap().last_sent.is_none());
    }
}
