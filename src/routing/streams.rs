//! `{base}/streams/{encoding}/{name}` and `{base}/subscriptions/{id}`.
//!
//! Both resources only serve event streams. Existence is checked here so
//! that unknown targets fail before negotiation; the registry is consulted
//! again at execution time since streams and subscriptions come and go.

use axum::http::Method;

use super::resource::{allow, PrepareContext};
use super::SegmentPeeler;
use crate::negotiation::{self, media_type, MessageEncoding};
use crate::pending::{CompletedRequest, Operation, PreparedRequest, StreamTarget};
use crate::streams::SubscriptionState;

const FILTER_PARAM: &str = "filter";

/// Decoded segments of `remaining`, which must hold exactly `N` non-empty
/// segments.
fn segments<const N: usize>(remaining: &str) -> Option<[String; N]> {
    let mut peeler = SegmentPeeler::new(remaining).ok()?;
    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for slot in out.iter_mut() {
        let segment = peeler.next_segment()?;
        if segment.is_empty() {
            return None;
        }
        *slot = segment.into_owned();
    }
    peeler.is_exhausted().then_some(out)
}

pub fn prepare_stream(ctx: &PrepareContext<'_>, remaining: &str) -> PreparedRequest {
    let Some([encoding, name]) = segments::<2>(remaining) else {
        return CompletedRequest::not_found().into();
    };
    let Some(encoding) = MessageEncoding::from_stream_name(&encoding) else {
        return CompletedRequest::not_found().into();
    };
    if ctx.invariants.registry.lookup_stream(&name).is_none() {
        tracing::debug!(stream = %name, "Unknown event stream");
        return CompletedRequest::not_found().into();
    }
    if let Some(completed) = reject_method(ctx) {
        return completed.into();
    }
    prepare_event_stream(ctx, StreamTarget::Stream { name, encoding })
}

pub fn prepare_subscription(ctx: &PrepareContext<'_>, remaining: &str) -> PreparedRequest {
    // Anything that is not a u32 cannot name a subscription.
    let Some(id) = segments::<1>(remaining).and_then(|[id]| id.parse::<u32>().ok()) else {
        return CompletedRequest::not_found().into();
    };
    let Some(subscription) = ctx.invariants.registry.lookup_subscription(id) else {
        tracing::debug!(subscription = id, "Unknown subscription");
        return CompletedRequest::not_found().into();
    };
    if let Some(completed) = reject_method(ctx) {
        return completed.into();
    }
    if subscription.state != SubscriptionState::Active {
        return ctx
            .conflict(format!(
                "subscription {id} is {}",
                subscription.state.as_str()
            ))
            .into();
    }
    prepare_event_stream(ctx, StreamTarget::Subscription { id })
}

/// OPTIONS and unsupported methods finish here; GET and HEAD go on.
fn reject_method(ctx: &PrepareContext<'_>) -> Option<CompletedRequest> {
    match *ctx.method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(CompletedRequest::options(allow::READ_ONLY, false)),
        _ => Some(CompletedRequest::method_not_allowed(allow::READ_ONLY)),
    }
}

fn prepare_event_stream(ctx: &PrepareContext<'_>, target: StreamTarget) -> PreparedRequest {
    if !negotiation::accepts_event_stream(ctx.headers) {
        return ctx
            .not_acceptable_types(&[media_type::TEXT_EVENT_STREAM])
            .into();
    }
    let filter = ctx.query.get(FILTER_PARAM).map(str::to_owned);
    ctx.pending(
        ctx.error_encoding(),
        Operation::EventStream { target, filter },
    )
    .into()
}
