//! Bound operations and their asynchronous execution.

use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::backend::{
    ChildBody, DataPostResult, ErrorTag, ErrorType, OperationInputBody, PatchBody, ResourceBody,
    ServerRequest, YangError,
};
use crate::negotiation::{media_type, MessageEncoding};
use crate::routing::ApiPath;
use crate::streams::{self, SseBody, Sender, SubscriptionSender, SubscriptionState};

use super::invariants::EndpointInvariants;
use super::transform;

/// Source format of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    Yang,
    Yin,
}

impl ModuleFormat {
    pub fn media_type(self) -> &'static str {
        match self {
            ModuleFormat::Yang => media_type::APPLICATION_YANG,
            ModuleFormat::Yin => media_type::APPLICATION_YIN_XML,
        }
    }
}

/// What an event-stream request attaches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    /// `/streams/{encoding}/{name}`
    Stream {
        name: String,
        encoding: MessageEncoding,
    },
    /// `/subscriptions/{id}`
    Subscription { id: u32 },
}

/// Backend call bound during routing, with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    DataGet { path: ApiPath },
    DataOptions { path: ApiPath },
    DataPost { path: ApiPath, input: MessageEncoding },
    DataPut { path: ApiPath, input: MessageEncoding },
    DataPatch { path: ApiPath, input: MessageEncoding },
    DataYangPatch { path: ApiPath, input: MessageEncoding },
    DataDelete { path: ApiPath },
    OperationsGet { path: ApiPath },
    OperationsOptions { path: ApiPath },
    OperationsPost { path: ApiPath, input: MessageEncoding },
    YangLibraryVersionGet { mount: ApiPath },
    ModuleGet {
        mount: ApiPath,
        name: String,
        revision: Option<String>,
        format: ModuleFormat,
    },
    EventStream {
        target: StreamTarget,
        filter: Option<String>,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::DataGet { .. } => "data-get",
            Operation::DataOptions { .. } => "data-options",
            Operation::DataPost { .. } => "data-post",
            Operation::DataPut { .. } => "data-put",
            Operation::DataPatch { .. } => "data-patch",
            Operation::DataYangPatch { .. } => "data-yang-patch",
            Operation::DataDelete { .. } => "data-delete",
            Operation::OperationsGet { .. } => "operations-get",
            Operation::OperationsOptions { .. } => "operations-options",
            Operation::OperationsPost { .. } => "operations-post",
            Operation::YangLibraryVersionGet { .. } => "yang-library-version-get",
            Operation::ModuleGet { .. } => "module-get",
            Operation::EventStream { .. } => "event-stream",
        }
    }

    fn takes_body(&self) -> bool {
        matches!(
            self,
            Operation::DataPost { .. }
                | Operation::DataPut { .. }
                | Operation::DataPatch { .. }
                | Operation::DataYangPatch { .. }
                | Operation::OperationsPost { .. }
        )
    }
}

/// Logs executions dropped before completion: client reset, connection
/// loss or request timeout.
struct ExecutionGuard {
    operation: &'static str,
    completed: bool,
}

impl ExecutionGuard {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            completed: false,
        }
    }

    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        if !self.completed {
            tracing::debug!(operation = self.operation, "Request cancelled before completion");
        }
    }
}

/// A bound operation awaiting execution. Consumed by [`PendingRequest::execute`],
/// so it runs at most once.
pub struct PendingRequest {
    invariants: Arc<EndpointInvariants>,
    /// `{scheme}://{authority}{base_path}/`
    base_uri: String,
    request: ServerRequest,
    with_content: bool,
    operation: Operation,
}

impl PendingRequest {
    pub fn new(
        invariants: Arc<EndpointInvariants>,
        base_uri: String,
        request: ServerRequest,
        operation: Operation,
    ) -> Self {
        Self {
            invariants,
            base_uri,
            request,
            with_content: true,
            operation,
        }
    }

    /// HEAD variant: same operation, no body in the response.
    pub fn without_content(mut self) -> Self {
        self.with_content = false;
        self
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn request(&self) -> &ServerRequest {
        &self.request
    }

    pub fn with_content(&self) -> bool {
        self.with_content
    }

    /// Run the backend call and assemble the response. `body` is released
    /// before this returns, whether or not the call succeeded.
    pub async fn execute(self, body: Body) -> Response {
        let guard = ExecutionGuard::new(self.operation.name());
        if !self.operation.takes_body() && !body.is_end_stream() {
            tracing::debug!(
                operation = self.operation.name(),
                "Discarding unexpected request body"
            );
        }
        let response = self.run(body).await;
        guard.complete();
        response
    }

    fn failure(&self, error: &crate::backend::ServerError) -> Response {
        transform::server_error(
            error,
            &self.invariants.error_tags,
            self.request.encoding,
            self.request.pretty_print,
            self.with_content,
        )
    }

    async fn run(self, body: Body) -> Response {
        let backend = self.invariants.backend.clone();
        let request = &self.request;
        let encoding = request.encoding;
        let pretty = request.pretty_print;
        let limit = self.invariants.max_body_size;

        match &self.operation {
            Operation::DataGet { path } => {
                drop(body);
                match backend.data_get(request, path).await {
                    Ok(result) => transform::read(
                        result.body.as_ref(),
                        Some(&result.metadata),
                        encoding,
                        pretty,
                        self.with_content,
                    ),
                    Err(error) => self.failure(&error),
                }
            }
            Operation::DataOptions { path } => {
                drop(body);
                match backend.data_options(request, path).await {
                    Ok(kind) => transform::data_options(kind),
                    Err(error) => self.failure(&error),
                }
            }
            Operation::DataPost { path, input } => {
                let mut typed = ChildBody::new(*input, body, limit);
                let result = backend.data_post(request, path, &mut typed).await;
                drop(typed);
                match result {
                    Ok(DataPostResult::Created(created)) => transform::created(
                        &self.base_uri,
                        &created.created_path.to_string(),
                        &created.metadata,
                    ),
                    Ok(DataPostResult::Invoked(invoked)) => {
                        transform::invoked(&invoked, encoding, pretty)
                    }
                    Err(error) => self.failure(&error),
                }
            }
            Operation::DataPut { path, input } => {
                let mut typed = ResourceBody::new(*input, body, limit);
                let result = backend.data_put(request, path, &mut typed).await;
                drop(typed);
                match result {
                    Ok(put) => {
                        let status = if put.created {
                            StatusCode::CREATED
                        } else {
                            StatusCode::NO_CONTENT
                        };
                        transform::metadata_only(status, &put.metadata)
                    }
                    Err(error) => self.failure(&error),
                }
            }
            Operation::DataPatch { path, input } => {
                let mut typed = ResourceBody::new(*input, body, limit);
                let result = backend.data_patch(request, path, &mut typed).await;
                drop(typed);
                match result {
                    Ok(patched) => transform::metadata_only(StatusCode::OK, &patched.metadata),
                    Err(error) => self.failure(&error),
                }
            }
            Operation::DataYangPatch { path, input } => {
                let mut typed = PatchBody::new(*input, body, limit);
                let result = backend.data_yang_patch(request, path, &mut typed).await;
                drop(typed);
                match result {
                    Ok(patched) => transform::yang_patch(
                        &patched.status,
                        &patched.metadata,
                        &self.invariants.error_tags,
                        encoding,
                        pretty,
                    ),
                    Err(error) => self.failure(&error),
                }
            }
            Operation::DataDelete { path } => {
                drop(body);
                match backend.data_delete(request, path).await {
                    Ok(()) => StatusCode::NO_CONTENT.into_response(),
                    Err(error) => self.failure(&error),
                }
            }
            Operation::OperationsGet { path } => {
                drop(body);
                match backend.operations_get(request, path).await {
                    Ok(document) => {
                        transform::read(document.as_ref(), None, encoding, pretty, self.with_content)
                    }
                    Err(error) => self.failure(&error),
                }
            }
            Operation::OperationsOptions { path } => {
                drop(body);
                match backend.operations_options(request, path).await {
                    Ok(kind) => transform::operations_options(kind),
                    Err(error) => self.failure(&error),
                }
            }
            Operation::OperationsPost { path, input } => {
                let mut typed = OperationInputBody::new(*input, body, limit);
                let result = backend.operations_post(request, path, &mut typed).await;
                drop(typed);
                match result {
                    Ok(invoked) => transform::invoked(&invoked, encoding, pretty),
                    Err(error) => self.failure(&error),
                }
            }
            Operation::YangLibraryVersionGet { mount } => {
                drop(body);
                match backend.yang_library_version_get(request, mount).await {
                    Ok(document) => {
                        transform::read(document.as_ref(), None, encoding, pretty, self.with_content)
                    }
                    Err(error) => self.failure(&error),
                }
            }
            Operation::ModuleGet {
                mount,
                name,
                revision,
                format,
            } => {
                drop(body);
                let result = match format {
                    ModuleFormat::Yang => {
                        backend
                            .modules_yang_get(request, mount, name, revision.as_deref())
                            .await
                    }
                    ModuleFormat::Yin => {
                        backend
                            .modules_yin_get(request, mount, name, revision.as_deref())
                            .await
                    }
                };
                match result {
                    Ok(source) => transform::raw(format.media_type(), source.0, self.with_content),
                    Err(error) => self.failure(&error),
                }
            }
            Operation::EventStream { target, filter } => {
                drop(body);
                self.subscribe(target, filter.clone())
            }
        }
    }

    fn local_error(&self, status: StatusCode, tag: ErrorTag, message: String) -> Response {
        transform::errors_response(
            status,
            &[YangError::new(ErrorType::Protocol, tag, message)],
            self.request.encoding,
            self.request.pretty_print,
            HeaderMap::new(),
        )
    }

    /// Attach a sender to the target stream and answer with a live
    /// `text/event-stream` body. Registration is all or nothing.
    fn subscribe(&self, target: &StreamTarget, filter: Option<String>) -> Response {
        let registry = &self.invariants.registry;
        let (stream_name, encoding, filter, subscription) = match target {
            StreamTarget::Stream { name, encoding } => (name.clone(), *encoding, filter, None),
            StreamTarget::Subscription { id } => {
                let Some(subscription) = registry.lookup_subscription(*id) else {
                    return StatusCode::NOT_FOUND.into_response();
                };
                if subscription.state != SubscriptionState::Active {
                    return self.local_error(
                        StatusCode::CONFLICT,
                        ErrorTag::OperationFailed,
                        format!("subscription {id} is not active"),
                    );
                }
                (
                    subscription.stream_name,
                    subscription.encoding,
                    filter.or(subscription.filter),
                    Some(*id),
                )
            }
        };
        let Some(stream) = registry.lookup_stream(&stream_name) else {
            return StatusCode::NOT_FOUND.into_response();
        };

        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if !self.with_content {
            return (StatusCode::OK, headers).into_response();
        }

        let sse = self.invariants.sse;
        let (channel, frames) = streams::channel(sse.channel_capacity);
        let sender: Arc<dyn Sender> = match subscription {
            Some(id) => Arc::new(SubscriptionSender::new(channel, Arc::downgrade(registry), id)),
            None => Arc::new(channel),
        };
        let registration = match stream.add_subscriber(sender, encoding, filter) {
            Ok(registration) => registration,
            Err(error) => {
                tracing::debug!(stream = %stream_name, error = %error, "Stream registration rejected");
                return self.local_error(
                    StatusCode::BAD_REQUEST,
                    ErrorTag::InvalidValue,
                    error.to_string(),
                );
            }
        };
        tracing::info!(
            stream = %stream_name,
            subscription = ?subscription,
            %encoding,
            "Event stream opened"
        );

        let body = SseBody::new(frames, sse.heartbeat_interval, sse.maximum_fragment_length)
            .with_registration(registration);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(media_type::TEXT_EVENT_STREAM),
        );
        (StatusCode::OK, headers, Body::from_stream(body)).into_response()
    }
}
