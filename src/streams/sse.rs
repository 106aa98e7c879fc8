//! `text/event-stream` response bodies.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::observability::metrics;

use super::sender::SseFrame;
use super::stream::Registration;

/// SSE comment line sent when the stream has been idle.
pub const HEARTBEAT: &[u8] = b":\n\n";

/// Frame one message as an SSE event.
///
/// Every line of the message becomes one or more `data:` fields no longer
/// than `max_fragment` bytes (0 means unlimited), split on character
/// boundaries. A blank line ends the event.
pub fn encode_event(message: &str, max_fragment: usize) -> String {
    let mut out = String::with_capacity(message.len() + 16);
    for line in lines(message) {
        if max_fragment == 0 || line.len() <= max_fragment {
            push_field(&mut out, line);
            continue;
        }
        let mut rest = line;
        while !rest.is_empty() {
            let mut end = max_fragment.min(rest.len());
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            if end == 0 {
                // Fragment limit smaller than one character.
                end = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
            }
            push_field(&mut out, &rest[..end]);
            rest = &rest[end..];
        }
    }
    out.push('\n');
    out
}

/// Lines of `message` under SSE rules: CRLF, LF and a lone CR all end a
/// line. One trailing terminator does not open an empty line. Always yields
/// at least one line.
fn lines(message: &str) -> impl Iterator<Item = &str> {
    let message = message
        .strip_suffix("\r\n")
        .or_else(|| message.strip_suffix(['\n', '\r']))
        .unwrap_or(message);
    message.split("\r\n").flat_map(|line| line.split(['\n', '\r']))
}

fn push_field(out: &mut String, value: &str) {
    out.push_str("data: ");
    out.push_str(value);
    out.push('\n');
}

/// Body of a live event-stream response.
///
/// Owns the registration that keeps the sender attached: dropping the body
/// (client gone, stream reset, shutdown) detaches it and stops the heartbeat.
pub struct SseBody {
    frames: mpsc::Receiver<SseFrame>,
    heartbeat: Option<Interval>,
    max_fragment: usize,
    registration: Option<Registration>,
    finished: bool,
}

impl SseBody {
    pub fn new(
        frames: mpsc::Receiver<SseFrame>,
        heartbeat: Duration,
        max_fragment: usize,
    ) -> Self {
        let heartbeat = (!heartbeat.is_zero()).then(|| {
            let mut timer = interval_at(Instant::now() + heartbeat, heartbeat);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });
        metrics::event_stream_opened();
        Self {
            frames,
            heartbeat,
            max_fragment,
            registration: None,
            finished: false,
        }
    }

    /// Tie the sender registration to the lifetime of this body.
    pub fn with_registration(mut self, registration: Registration) -> Self {
        self.registration = Some(registration);
        self
    }

    fn finish(&mut self) {
        self.finished = true;
        self.heartbeat = None;
        self.registration = None;
    }
}

impl Drop for SseBody {
    fn drop(&mut self) {
        metrics::event_stream_closed();
    }
}

impl Stream for SseBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.frames.poll_recv(cx) {
            Poll::Ready(Some(SseFrame::Data(message))) => {
                if let Some(heartbeat) = self.heartbeat.as_mut() {
                    heartbeat.reset();
                }
                let event = encode_event(&message, self.max_fragment);
                return Poll::Ready(Some(Ok(Bytes::from(event))));
            }
            Poll::Ready(Some(SseFrame::End)) | Poll::Ready(None) => {
                self.finish();
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }

        match self.heartbeat.as_mut() {
            Some(heartbeat) => match heartbeat.poll_tick(cx) {
                Poll::Ready(_) => Poll::Ready(Some(Ok(Bytes::from_static(HEARTBEAT)))),
                Poll::Pending => Poll::Pending,
            },
            None => Poll::Pending,
        }
    }
}
