//! Event-stream and subscription delivery.
//!
//! # Data Flow
//! ```text
//! Publisher (backend, any task)
//!     → RestconfStream::publish(event)
//!     → render once per (encoding, filter)
//!     → Sender::send_data_message (try_send onto bounded channel)
//!     → SseBody (polled by the connection task)
//!     → "data: ...\n\n" frames, ":\n\n" heartbeats when idle
//! ```
//!
//! # Design Decisions
//! - StreamRegistry is the only owner of the stream and subscription maps
//! - Senders never block publishers; a closed channel drops messages silently
//! - The SSE body owns the Registration, so closing the response is the
//!   only deregistration path needed

pub mod registry;
pub mod sender;
pub mod sse;
pub mod stream;

pub use registry::{StreamRegistry, Subscription, SubscriptionState};
pub use sender::{channel, ChannelSender, Sender, SseFrame, SubscriptionSender};
pub use sse::{encode_event, SseBody};
pub use stream::{Registration, RegistrationError, RestconfStream, StreamEvent};
