//! In-memory reference datastore.
//!
//! Stores a JSON document tree keyed by ApiPath steps (`module:name` or
//! `name=key`). There is no schema: any well-formed JSON document is
//! accepted. Good enough to drive the protocol layer end to end.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::negotiation::MessageEncoding;
use crate::pending::xml::XmlWriter;
use crate::routing::api_path::Step;
use crate::routing::ApiPath;
use crate::streams::{RestconfStream, StreamEvent, StreamRegistry};

use super::body::TypedBody;
use super::error::{ErrorTag, ErrorType, ServerError, YangError};
use super::types::{
    ConfigurationMetadata, CreateResourceResult, DataGetResult, DataPatchResult, DataPostResult,
    DataPutResult, DataYangPatchResult, EntityTag, FormatError, FormattableBody, InvokeResult,
    ModuleSource, OptionsResult, PatchEditStatus, PatchStatus, PrettyPrint, ServerRequest,
};
use super::RestconfBackend;

/// Module owning the built-in RPCs and notifications.
pub const MODULE: &str = "restconf-server";
/// Stream carrying data-change notifications.
pub const NOTIFICATION_STREAM: &str = "NETCONF";
pub const YANG_LIBRARY_VERSION: &str = "2019-01-04";

const ECHO: &str = "restconf-server:echo";
const PING: &str = "restconf-server:ping";
const ESTABLISH_SUBSCRIPTION: &str = "ietf-subscribed-notifications:establish-subscription";
const DELETE_SUBSCRIPTION: &str = "ietf-subscribed-notifications:delete-subscription";

/// XML namespace for a module name.
fn namespace_of(module: &str) -> String {
    if module.starts_with("ietf-") {
        format!("urn:ietf:params:xml:ns:yang:{module}")
    } else {
        format!("urn:restconf-server:{module}")
    }
}

/// A JSON document with a single top-level member, renderable as JSON or XML.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument(pub Value);

impl JsonDocument {
    pub fn member(name: impl Into<String>, value: Value) -> Self {
        let mut map = Map::new();
        map.insert(name.into(), value);
        Self(Value::Object(map))
    }
}

impl FormattableBody for JsonDocument {
    fn format(
        &self,
        encoding: MessageEncoding,
        pretty: PrettyPrint,
        out: &mut Vec<u8>,
    ) -> Result<(), FormatError> {
        match encoding {
            MessageEncoding::Json => {
                let written = if pretty.0 {
                    serde_json::to_writer_pretty(&mut *out, &self.0)
                } else {
                    serde_json::to_writer(&mut *out, &self.0)
                };
                written.map_err(|e| FormatError(e.to_string()))
            }
            MessageEncoding::Xml => {
                let Value::Object(members) = &self.0 else {
                    return Err(FormatError("document root is not an object".into()));
                };
                let mut writer = XmlWriter::new(out, pretty.0);
                for (name, value) in members {
                    write_xml_member(&mut writer, name, value, None);
                }
                Ok(())
            }
        }
    }
}

fn write_xml_member(writer: &mut XmlWriter<'_>, name: &str, value: &Value, parent: Option<&str>) {
    let (module, local) = match name.split_once(':') {
        Some((module, local)) => (Some(module), local),
        None => (None, name),
    };
    let local = local.split('=').next().unwrap_or(local);
    let current = module.or(parent);
    let namespace = match module {
        Some(module) if Some(module) != parent => Some(namespace_of(module)),
        _ => None,
    };
    let namespace = namespace.as_deref();

    match value {
        Value::Array(items) => {
            for item in items {
                write_xml_member(writer, name, item, parent);
            }
        }
        Value::Object(children) => {
            writer.start(local, namespace);
            for (child, value) in children {
                write_xml_member(writer, child, value, current);
            }
            writer.end(local);
        }
        Value::Null => writer.empty(local, namespace),
        Value::String(text) => writer.leaf(local, namespace, text),
        other => writer.leaf(local, namespace, &other.to_string()),
    }
}

/// Notification published on every successful edit.
#[derive(Debug, Clone)]
pub struct DataChangeEvent {
    pub path: String,
    pub operation: &'static str,
    pub event_time: DateTime<Utc>,
}

impl StreamEvent for DataChangeEvent {
    /// The filter is a path prefix.
    fn format(
        &self,
        encoding: MessageEncoding,
        filter: Option<&str>,
    ) -> Result<Option<String>, FormatError> {
        if let Some(filter) = filter {
            if !self.path.starts_with(filter) {
                return Ok(None);
            }
        }
        let event_time = self.event_time.to_rfc3339();
        match encoding {
            MessageEncoding::Json => {
                let notification = json!({
                    "ietf-restconf:notification": {
                        "eventTime": event_time,
                        "restconf-server:data-changed": {
                            "path": self.path,
                            "operation": self.operation,
                        }
                    }
                });
                serde_json::to_string(&notification)
                    .map(Some)
                    .map_err(|e| FormatError(e.to_string()))
            }
            MessageEncoding::Xml => {
                let mut out = Vec::new();
                let mut writer = XmlWriter::new(&mut out, false);
                writer.start(
                    "notification",
                    Some("urn:ietf:params:xml:ns:netconf:notification:1.0"),
                );
                writer.leaf("eventTime", None, &event_time);
                writer.start("data-changed", Some(&namespace_of(MODULE)));
                writer.leaf("path", None, &self.path);
                writer.leaf("operation", None, self.operation);
                writer.end("data-changed");
                writer.end("notification");
                String::from_utf8(out)
                    .map(Some)
                    .map_err(|e| FormatError(e.to_string()))
            }
        }
    }
}

struct State {
    root: Map<String, Value>,
    generation: u64,
    last_modified: DateTime<Utc>,
}

impl State {
    fn touch(&mut self) -> ConfigurationMetadata {
        self.generation += 1;
        self.last_modified = Utc::now();
        self.metadata()
    }

    fn metadata(&self) -> ConfigurationMetadata {
        ConfigurationMetadata {
            entity_tag: Some(EntityTag {
                value: self.generation.to_string(),
                weak: false,
            }),
            last_modified: Some(self.last_modified),
        }
    }
}

fn key_of(step: &Step) -> String {
    step.to_string()
}

fn missing(path: &ApiPath) -> ServerError {
    ServerError::new(
        YangError::new(
            ErrorType::Application,
            ErrorTag::DataMissing,
            "Data does not exist",
        )
        .with_path(format!("/{path}")),
    )
}

fn exists(path: &ApiPath) -> ServerError {
    ServerError::new(
        YangError::new(
            ErrorType::Application,
            ErrorTag::DataExists,
            "Data already exists",
        )
        .with_path(format!("/{path}")),
    )
}

fn node<'a>(root: &'a Map<String, Value>, steps: &[Step]) -> Option<&'a Value> {
    let (first, rest) = steps.split_first()?;
    let mut current = root.get(&key_of(first))?;
    for step in rest {
        current = current.as_object()?.get(&key_of(step))?;
    }
    Some(current)
}

/// Container that holds the last step of `steps`, which must be non-empty.
fn parent_mut<'a>(root: &'a mut Map<String, Value>, steps: &[Step]) -> Option<&'a mut Map<String, Value>> {
    let (_, parents) = steps.split_last()?;
    let mut current = root;
    for step in parents {
        current = current.get_mut(&key_of(step))?.as_object_mut()?;
    }
    Some(current)
}

fn merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Unwrap `{"name": value}`; `expected` must match the member name when
/// given.
fn single_member(document: Value, expected: Option<&str>) -> Result<(String, Value), ServerError> {
    let Value::Object(map) = document else {
        return Err(ServerError::protocol(
            ErrorTag::MalformedMessage,
            "body must be a JSON object",
        ));
    };
    if map.len() != 1 {
        return Err(ServerError::protocol(
            ErrorTag::MalformedMessage,
            "body must contain exactly one member",
        ));
    }
    let Some((name, value)) = map.into_iter().next() else {
        return Err(ServerError::protocol(ErrorTag::MalformedMessage, "empty body"));
    };
    if let Some(expected) = expected {
        let local = |n: &str| n.rsplit(':').next().unwrap_or(n).to_owned();
        if name != expected && local(&name) != local(expected) {
            return Err(ServerError::protocol(
                ErrorTag::InvalidValue,
                format!("body member '{name}' does not match target '{expected}'"),
            ));
        }
    }
    Ok((name, value))
}

async fn read_json<K: super::body::BodyKind>(body: &mut TypedBody<K>) -> Result<Option<Value>, ServerError> {
    if body.encoding() != MessageEncoding::Json {
        return Err(ServerError::protocol(
            ErrorTag::OperationNotSupported,
            "the in-memory datastore only accepts JSON bodies",
        ));
    }
    let bytes = body.read_bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ServerError::protocol(ErrorTag::MalformedMessage, e.to_string()))
}

fn join(base: &ApiPath, target: &str) -> Result<ApiPath, ServerError> {
    let relative = ApiPath::parse_remainder(target)
        .map_err(|e| ServerError::protocol(ErrorTag::InvalidValue, e.to_string()))?;
    let mut steps = base.steps().to_vec();
    steps.extend_from_slice(relative.steps());
    Ok(ApiPath::from_steps(steps))
}

struct ModuleEntry {
    yang: Bytes,
    yin: Option<Bytes>,
}

/// Reference [`RestconfBackend`] over an in-memory JSON tree.
pub struct MemoryBackend {
    state: RwLock<State>,
    modules: HashMap<(String, Option<String>), ModuleEntry>,
    registry: Option<Arc<StreamRegistry>>,
    notifications: Option<Arc<RestconfStream>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                root: Map::new(),
                generation: 0,
                last_modified: Utc::now(),
            }),
            modules: HashMap::new(),
            registry: None,
            notifications: None,
        }
    }

    /// Publish data-change notifications on the `NETCONF` stream of
    /// `registry` and serve the subscription RPCs.
    pub fn with_notifications(mut self, registry: Arc<StreamRegistry>) -> Self {
        let stream = RestconfStream::new(NOTIFICATION_STREAM, MessageEncoding::ALL.to_vec());
        registry.register_stream(stream.clone());
        self.notifications = Some(stream);
        self.registry = Some(registry);
        self
    }

    /// Seed the datastore with a JSON document.
    pub fn with_data(self, document: Value) -> Self {
        if let (Value::Object(map), Ok(mut state)) = (document, self.state.write()) {
            state.root = map;
            state.touch();
        }
        self
    }

    pub fn with_module(
        mut self,
        name: impl Into<String>,
        revision: Option<&str>,
        yang: impl Into<Bytes>,
        yin: Option<Bytes>,
    ) -> Self {
        self.modules.insert(
            (name.into(), revision.map(str::to_owned)),
            ModuleEntry {
                yang: yang.into(),
                yin,
            },
        );
        self
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, ServerError> {
        self.state
            .read()
            .map_err(|_| ServerError::application(ErrorTag::OperationFailed, "datastore lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, ServerError> {
        self.state
            .write()
            .map_err(|_| ServerError::application(ErrorTag::OperationFailed, "datastore lock poisoned"))
    }

    fn publish(&self, path: &ApiPath, operation: &'static str) {
        if let Some(stream) = &self.notifications {
            let event = DataChangeEvent {
                path: format!("/{path}"),
                operation,
                event_time: Utc::now(),
            };
            let delivered = stream.publish(&event);
            tracing::trace!(path = %event.path, operation, delivered, "Published data change");
        }
    }

    fn operation_names(&self) -> Vec<&'static str> {
        let mut names = vec![ECHO, PING];
        if self.registry.is_some() {
            names.extend([ESTABLISH_SUBSCRIPTION, DELETE_SUBSCRIPTION]);
        }
        names
    }

    fn is_operation(&self, path: &ApiPath) -> bool {
        match path.steps() {
            [step] if step.keys.is_none() => {
                self.operation_names().contains(&step.qualified_name().as_str())
            }
            _ => false,
        }
    }

    async fn invoke<K: super::body::BodyKind>(
        &self,
        name: &str,
        body: &mut TypedBody<K>,
    ) -> Result<InvokeResult, ServerError> {
        let input = read_json(body).await?;
        let input = match input {
            Some(document) => Some(single_member(document, Some("input"))?.1),
            None => None,
        };
        let module = name.split(':').next().unwrap_or(MODULE);
        let output = |value: Value| JsonDocument::member(format!("{module}:output"), value);

        match name {
            ECHO => Ok(InvokeResult {
                output: input
                    .filter(|v| !v.as_object().is_some_and(Map::is_empty))
                    .map(|v| Box::new(output(v)) as Box<dyn FormattableBody>),
            }),
            PING => Ok(InvokeResult { output: None }),
            ESTABLISH_SUBSCRIPTION | DELETE_SUBSCRIPTION => {
                let registry = self.registry.as_ref().ok_or_else(|| {
                    ServerError::protocol(ErrorTag::OperationNotSupported, "notifications disabled")
                })?;
                let input = input.unwrap_or(Value::Null);
                if name == DELETE_SUBSCRIPTION {
                    let id = input
                        .get("id")
                        .and_then(Value::as_u64)
                        .and_then(|id| u32::try_from(id).ok())
                        .ok_or_else(|| {
                            ServerError::protocol(ErrorTag::MissingElement, "missing subscription id")
                        })?;
                    return match registry.remove_subscription(id) {
                        Some(_) => Ok(InvokeResult { output: None }),
                        None => Err(ServerError::application(
                            ErrorTag::InvalidValue,
                            format!("no subscription with id {id}"),
                        )),
                    };
                }

                let stream = input
                    .get("stream")
                    .and_then(Value::as_str)
                    .unwrap_or(NOTIFICATION_STREAM);
                if registry.lookup_stream(stream).is_none() {
                    return Err(ServerError::application(
                        ErrorTag::InvalidValue,
                        format!("no such stream '{stream}'"),
                    ));
                }
                let encoding = match input.get("encoding").and_then(Value::as_str) {
                    None | Some("encode-json") => MessageEncoding::Json,
                    Some("encode-xml") => MessageEncoding::Xml,
                    Some(other) => {
                        return Err(ServerError::application(
                            ErrorTag::InvalidValue,
                            format!("unsupported encoding '{other}'"),
                        ))
                    }
                };
                let filter = input
                    .get("stream-subtree-filter")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                let id = registry.register_subscription(stream, encoding, filter);
                Ok(InvokeResult {
                    output: Some(Box::new(output(json!({ "id": id })))),
                })
            }
            other => Err(ServerError::protocol(
                ErrorTag::InvalidValue,
                format!("unknown operation '{other}'"),
            )),
        }
    }

    fn apply_edit(
        root: &mut Map<String, Value>,
        target: &ApiPath,
        operation: &str,
        value: Option<Value>,
    ) -> Result<(), ServerError> {
        let Some(last) = target.steps().last() else {
            return match operation {
                "replace" | "merge" => {
                    let value = value.ok_or_else(|| {
                        ServerError::protocol(ErrorTag::MissingElement, "edit has no value")
                    })?;
                    let (_, value) = single_member(value, None)?;
                    match value {
                        Value::Object(map) if operation == "replace" => *root = map,
                        Value::Object(map) => {
                            let mut current = Value::Object(std::mem::take(root));
                            merge(&mut current, Value::Object(map));
                            if let Value::Object(map) = current {
                                *root = map;
                            }
                        }
                        _ => {
                            return Err(ServerError::protocol(
                                ErrorTag::InvalidValue,
                                "datastore root must be an object",
                            ))
                        }
                    }
                    Ok(())
                }
                _ => Err(ServerError::protocol(
                    ErrorTag::OperationNotSupported,
                    format!("'{operation}' is not supported on the datastore root"),
                )),
            };
        };
        let key = key_of(last);
        let expected = target.target_name().unwrap_or_else(|| last.qualified_name());
        let parent = parent_mut(root, target.steps()).ok_or_else(|| missing(target))?;
        let unwrap_value = |value: Option<Value>| -> Result<Value, ServerError> {
            let value = value.ok_or_else(|| {
                ServerError::protocol(ErrorTag::MissingElement, "edit has no value")
            })?;
            Ok(single_member(value, Some(&expected))?.1)
        };

        match operation {
            "create" => {
                if parent.contains_key(&key) {
                    return Err(exists(target));
                }
                parent.insert(key, unwrap_value(value)?);
            }
            "replace" => {
                parent.insert(key, unwrap_value(value)?);
            }
            "merge" => {
                let value = unwrap_value(value)?;
                match parent.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        parent.insert(key, value);
                    }
                }
            }
            "delete" => {
                if parent.remove(&key).is_none() {
                    return Err(missing(target));
                }
            }
            "remove" => {
                parent.remove(&key);
            }
            other => {
                return Err(ServerError::protocol(
                    ErrorTag::OperationNotSupported,
                    format!("edit operation '{other}' is not supported"),
                ))
            }
        }
        Ok(())
    }
}

fn operation_of(edit: &Value) -> &'static str {
    match edit.get("operation").and_then(Value::as_str) {
        Some("create") => "create",
        Some("delete") => "delete",
        Some("remove") => "remove",
        Some("replace") => "replace",
        Some("merge") | None => "merge",
        Some("insert") => "insert",
        Some("move") => "move",
        Some(_) => "unknown",
    }
}

#[async_trait]
impl RestconfBackend for MemoryBackend {
    async fn data_get(
        &self,
        _request: &ServerRequest,
        path: &ApiPath,
    ) -> Result<DataGetResult, ServerError> {
        let state = self.read()?;
        let body = match path.steps().last() {
            None => JsonDocument::member("ietf-restconf:data", Value::Object(state.root.clone())),
            Some(last) => {
                let value = node(&state.root, path.steps()).ok_or_else(|| missing(path))?;
                let name = path.target_name().unwrap_or_else(|| last.qualified_name());
                JsonDocument::member(name, value.clone())
            }
        };
        Ok(DataGetResult {
            body: Box::new(body),
            metadata: state.metadata(),
        })
    }

    async fn data_options(
        &self,
        _request: &ServerRequest,
        path: &ApiPath,
    ) -> Result<OptionsResult, ServerError> {
        if path.is_empty() {
            Ok(OptionsResult::Datastore)
        } else if self.is_operation(path) {
            Ok(OptionsResult::Action)
        } else {
            Ok(OptionsResult::Resource)
        }
    }

    async fn data_post(
        &self,
        _request: &ServerRequest,
        path: &ApiPath,
        body: &mut super::ChildBody,
    ) -> Result<DataPostResult, ServerError> {
        if self.is_operation(path) {
            let name = path.steps()[0].qualified_name();
            return self.invoke(&name, body).await.map(DataPostResult::Invoked);
        }

        let document = read_json(body)
            .await?
            .ok_or_else(|| ServerError::protocol(ErrorTag::MalformedMessage, "missing body"))?;
        let (name, value) = single_member(document, None)?;
        let child = ApiPath::parse(&name)
            .ok()
            .filter(|p| p.steps().len() == 1)
            .ok_or_else(|| {
                ServerError::protocol(ErrorTag::InvalidValue, format!("invalid child name '{name}'"))
            })?;
        let created_path = join(path, &format!("/{child}"))?;

        let metadata = {
            let mut state = self.write()?;
            let parent = match path.is_empty() {
                true => &mut state.root,
                false => node_mut(&mut state.root, path.steps())
                    .and_then(Value::as_object_mut)
                    .ok_or_else(|| missing(path))?,
            };
            let key = child.to_string();
            if parent.contains_key(&key) {
                return Err(exists(&created_path));
            }
            parent.insert(key, value);
            state.touch()
        };
        self.publish(&created_path, "create");
        Ok(DataPostResult::Created(CreateResourceResult {
            created_path,
            metadata,
        }))
    }

    async fn data_put(
        &self,
        _request: &ServerRequest,
        path: &ApiPath,
        body: &mut super::ResourceBody,
    ) -> Result<DataPutResult, ServerError> {
        let document = read_json(body)
            .await?
            .ok_or_else(|| ServerError::protocol(ErrorTag::MalformedMessage, "missing body"))?;
        let expected = path.target_name();
        let (_, value) = single_member(document, expected.as_deref())?;

        let (created, metadata) = {
            let mut state = self.write()?;
            let created = match path.steps().last() {
                None => {
                    let Value::Object(map) = value else {
                        return Err(ServerError::protocol(
                            ErrorTag::InvalidValue,
                            "datastore root must be an object",
                        ));
                    };
                    state.root = map;
                    false
                }
                Some(last) => {
                    let parent = parent_mut(&mut state.root, path.steps())
                        .ok_or_else(|| missing(path))?;
                    parent.insert(key_of(last), value).is_none()
                }
            };
            (created, state.touch())
        };
        self.publish(path, if created { "create" } else { "replace" });
        Ok(DataPutResult { created, metadata })
    }

    async fn data_patch(
        &self,
        _request: &ServerRequest,
        path: &ApiPath,
        body: &mut super::ResourceBody,
    ) -> Result<DataPatchResult, ServerError> {
        let document = read_json(body)
            .await?
            .ok_or_else(|| ServerError::protocol(ErrorTag::MalformedMessage, "missing body"))?;
        let expected = path.target_name();
        let (_, value) = single_member(document, expected.as_deref())?;

        let metadata = {
            let mut state = self.write()?;
            if path.is_empty() {
                let mut root = Value::Object(std::mem::take(&mut state.root));
                merge(&mut root, value);
                if let Value::Object(map) = root {
                    state.root = map;
                }
            } else {
                let target = node_mut(&mut state.root, path.steps()).ok_or_else(|| missing(path))?;
                merge(target, value);
            }
            state.touch()
        };
        self.publish(path, "merge");
        Ok(DataPatchResult { metadata })
    }

    async fn data_yang_patch(
        &self,
        _request: &ServerRequest,
        path: &ApiPath,
        body: &mut super::PatchBody,
    ) -> Result<DataYangPatchResult, ServerError> {
        let document = read_json(body)
            .await?
            .ok_or_else(|| ServerError::protocol(ErrorTag::MalformedMessage, "missing body"))?;
        let (_, patch) = single_member(document, Some("ietf-yang-patch:yang-patch"))?;
        let patch_id = patch
            .get("patch-id")
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::protocol(ErrorTag::MissingElement, "missing patch-id"))?
            .to_owned();
        let edits = patch
            .get("edit")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut state = self.write()?;
        let mut working = state.root.clone();
        let mut statuses = Vec::with_capacity(edits.len());
        let mut applied = Vec::new();
        let mut ok = true;

        for edit in edits {
            let edit_id = edit
                .get("edit-id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let operation = operation_of(&edit);
            let outcome = edit
                .get("target")
                .and_then(Value::as_str)
                .ok_or_else(|| ServerError::protocol(ErrorTag::MissingElement, "edit has no target"))
                .and_then(|target| join(path, target))
                .and_then(|target| {
                    Self::apply_edit(&mut working, &target, operation, edit.get("value").cloned())
                        .map(|()| target)
                });
            match outcome {
                Ok(target) => {
                    applied.push((target, operation));
                    statuses.push(PatchEditStatus {
                        edit_id,
                        ok: true,
                        errors: Vec::new(),
                    });
                }
                Err(error) => {
                    ok = false;
                    statuses.push(PatchEditStatus {
                        edit_id,
                        ok: false,
                        errors: error.errors().to_vec(),
                    });
                    break;
                }
            }
        }

        let metadata = if ok {
            state.root = working;
            state.touch()
        } else {
            state.metadata()
        };
        drop(state);

        if ok {
            for (target, operation) in applied {
                self.publish(&target, operation);
            }
        }
        Ok(DataYangPatchResult {
            status: PatchStatus {
                patch_id,
                ok,
                global_errors: Vec::new(),
                edits: statuses,
            },
            metadata,
        })
    }

    async fn data_delete(&self, _request: &ServerRequest, path: &ApiPath) -> Result<(), ServerError> {
        {
            let mut state = self.write()?;
            Self::apply_edit(&mut state.root, path, "delete", None)?;
            state.touch();
        }
        self.publish(path, "delete");
        Ok(())
    }

    async fn operations_get(
        &self,
        _request: &ServerRequest,
        path: &ApiPath,
    ) -> Result<Box<dyn FormattableBody>, ServerError> {
        let names = self.operation_names();
        if path.is_empty() {
            let operations: Map<String, Value> = names
                .into_iter()
                .map(|name| (name.to_owned(), json!([null])))
                .collect();
            return Ok(Box::new(JsonDocument::member(
                "ietf-restconf:operations",
                Value::Object(operations),
            )));
        }
        if self.is_operation(path) {
            return Ok(Box::new(JsonDocument::member(
                path.steps()[0].qualified_name(),
                json!([null]),
            )));
        }
        Err(missing(path))
    }

    async fn operations_options(
        &self,
        _request: &ServerRequest,
        path: &ApiPath,
    ) -> Result<OptionsResult, ServerError> {
        if self.is_operation(path) {
            Ok(OptionsResult::Rpc)
        } else {
            Err(missing(path))
        }
    }

    async fn operations_post(
        &self,
        _request: &ServerRequest,
        path: &ApiPath,
        body: &mut super::OperationInputBody,
    ) -> Result<InvokeResult, ServerError> {
        if !self.is_operation(path) {
            return Err(ServerError::protocol(
                ErrorTag::InvalidValue,
                format!("unknown operation '/{path}'"),
            ));
        }
        let name = path.steps()[0].qualified_name();
        self.invoke(&name, body).await
    }

    async fn yang_library_version_get(
        &self,
        _request: &ServerRequest,
        mount: &ApiPath,
    ) -> Result<Box<dyn FormattableBody>, ServerError> {
        if !mount.is_empty() {
            return Err(missing(mount));
        }
        Ok(Box::new(JsonDocument::member(
            "ietf-restconf:yang-library-version",
            Value::String(YANG_LIBRARY_VERSION.into()),
        )))
    }

    async fn modules_yang_get(
        &self,
        _request: &ServerRequest,
        mount: &ApiPath,
        file_name: &str,
        revision: Option<&str>,
    ) -> Result<ModuleSource, ServerError> {
        self.module(mount, file_name, revision)
            .map(|entry| ModuleSource(entry.yang.clone()))
    }

    async fn modules_yin_get(
        &self,
        _request: &ServerRequest,
        mount: &ApiPath,
        file_name: &str,
        revision: Option<&str>,
    ) -> Result<ModuleSource, ServerError> {
        let entry = self.module(mount, file_name, revision)?;
        entry.yin.clone().map(ModuleSource).ok_or_else(|| {
            ServerError::application(
                ErrorTag::DataMissing,
                format!("no YIN source for module '{file_name}'"),
            )
        })
    }
}

impl MemoryBackend {
    fn module(
        &self,
        mount: &ApiPath,
        name: &str,
        revision: Option<&str>,
    ) -> Result<&ModuleEntry, ServerError> {
        if !mount.is_empty() {
            return Err(missing(mount));
        }
        let exact = self
            .modules
            .get(&(name.to_owned(), revision.map(str::to_owned)));
        let found = match (exact, revision) {
            (Some(entry), _) => Some(entry),
            // Without a revision, the latest one wins.
            (None, None) => self
                .modules
                .iter()
                .filter(|((n, _), _)| n == name)
                .max_by(|((_, a), _), ((_, b), _)| a.cmp(b))
                .map(|(_, entry)| entry),
            (None, Some(_)) => None,
        };
        found.ok_or_else(|| {
            ServerError::application(
                ErrorTag::DataMissing,
                format!("module '{name}' revision '{}' not found", revision.unwrap_or("")),
            )
        })
    }
}

fn node_mut<'a>(root: &'a mut Map<String, Value>, steps: &[Step]) -> Option<&'a mut Value> {
    let (first, rest) = steps.split_first()?;
    let mut current = root.get_mut(&key_of(first))?;
    for step in rest {
        current = current.as_object_mut()?.get_mut(&key_of(step))?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::QueryParameters;
    use crate::backend::{ChildBody, OperationInputBody, PatchBody, ResourceBody};
    use crate::streams::{channel, SseFrame};
    use axum::body::Body;

    fn request() -> ServerRequest {
        ServerRequest {
            principal: None,
            query: QueryParameters::default(),
            pretty_print: PrettyPrint(false),
            encoding: MessageEncoding::Json,
        }
    }

    fn path(raw: &str) -> ApiPath {
        ApiPath::parse(raw).unwrap()
    }

    fn render(body: &dyn FormattableBody, encoding: MessageEncoding) -> String {
        let mut out = Vec::new();
        body.format(encoding, PrettyPrint(false), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn seeded() -> MemoryBackend {
        MemoryBackend::new().with_data(json!({
            "example:music": { "artist=Foo": { "name": "Foo", "albums": 2 } }
        }))
    }

    #[tokio::test]
    async fn test_get_existing_and_missing() {
        let backend = seeded();
        let result = backend
            .data_get(&request(), &path("example:music/artist=Foo"))
            .await
            .unwrap();
        assert_eq!(
            render(result.body.as_ref(), MessageEncoding::Json),
            r#"{"example:artist":{"albums":2,"name":"Foo"}}"#
        );
        assert!(result.metadata.entity_tag.is_some());

        let err = backend
            .data_get(&request(), &path("example:music/artist=Bar"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.first().error_tag, ErrorTag::DataMissing);
    }

    #[tokio::test]
    async fn test_root_get_wraps_datastore() {
        let backend = seeded();
        let result = backend.data_get(&request(), &ApiPath::empty()).await.unwrap();
        let text = render(result.body.as_ref(), MessageEncoding::Json);
        assert!(text.starts_with(r#"{"ietf-restconf:data":{"example:music""#));
    }

    #[tokio::test]
    async fn test_xml_rendering() {
        let document = JsonDocument(json!({
            "example:music": { "artist": [{ "name": "A&B" }, { "name": "C" }], "flag": [null] }
        }));
        assert_eq!(
            render(&document, MessageEncoding::Xml),
            "<music xmlns=\"urn:restconf-server:example\"><artist><name>A&amp;B</name></artist>\
             <artist><name>C</name></artist><flag/></music>"
        );
    }

    #[tokio::test]
    async fn test_post_creates_child_once() {
        let backend = seeded();
        let mut body = ChildBody::new(
            MessageEncoding::Json,
            Body::from(r#"{"example:artist=Bar":{"name":"Bar"}}"#),
            1024,
        );
        let result = backend
            .data_post(&request(), &path("example:music"), &mut body)
            .await
            .unwrap();
        let DataPostResult::Created(created) = result else {
            panic!("expected creation");
        };
        assert_eq!(created.created_path.to_string(), "example:music/example:artist=Bar");

        let mut again = ChildBody::new(
            MessageEncoding::Json,
            Body::from(r#"{"example:artist=Bar":{}}"#),
            1024,
        );
        let err = backend
            .data_post(&request(), &path("example:music"), &mut again)
            .await
            .err()
            .unwrap();
        assert_eq!(err.first().error_tag, ErrorTag::DataExists);
    }

    #[tokio::test]
    async fn test_put_reports_creation() {
        let backend = MemoryBackend::new();
        let put = |text: &'static str| ResourceBody::new(MessageEncoding::Json, Body::from(text), 1024);

        let mut body = put(r#"{"example:top":{"a":1}}"#);
        let first = backend
            .data_put(&request(), &path("example:top"), &mut body)
            .await
            .unwrap();
        assert!(first.created);

        let mut body = put(r#"{"example:top":{"a":2}}"#);
        let second = backend
            .data_put(&request(), &path("example:top"), &mut body)
            .await
            .unwrap();
        assert!(!second.created);
        assert_ne!(first.metadata.entity_tag, second.metadata.entity_tag);

        let mut body = put(r#"{"example:other":{}}"#);
        let err = backend
            .data_put(&request(), &path("example:top"), &mut body)
            .await
            .err()
            .unwrap();
        assert_eq!(err.first().error_tag, ErrorTag::InvalidValue);
    }

    #[tokio::test]
    async fn test_xml_body_is_rejected() {
        let backend = MemoryBackend::new();
        let mut body = ResourceBody::new(MessageEncoding::Xml, Body::from("<top/>"), 1024);
        let err = backend
            .data_put(&request(), &path("example:top"), &mut body)
            .await
            .err()
            .unwrap();
        assert_eq!(err.first().error_tag, ErrorTag::OperationNotSupported);
    }

    #[tokio::test]
    async fn test_patch_merges() {
        let backend = seeded();
        let mut body = ResourceBody::new(
            MessageEncoding::Json,
            Body::from(r#"{"example:artist":{"albums":3}}"#),
            1024,
        );
        backend
            .data_patch(&request(), &path("example:music/artist=Foo"), &mut body)
            .await
            .unwrap();
        let state = backend.state.read().unwrap();
        assert_eq!(
            node(&state.root, path("example:music/artist=Foo").steps()),
            Some(&json!({ "name": "Foo", "albums": 3 }))
        );
    }

    #[tokio::test]
    async fn test_yang_patch_is_atomic() {
        let backend = seeded();
        let patch = json!({
            "ietf-yang-patch:yang-patch": {
                "patch-id": "p1",
                "edit": [
                    { "edit-id": "e1", "operation": "create", "target": "/example:music/genre",
                      "value": { "genre": "jazz" } },
                    { "edit-id": "e2", "operation": "delete", "target": "/example:absent" }
                ]
            }
        });
        let mut body = PatchBody::new(MessageEncoding::Json, Body::from(patch.to_string()), 4096);
        let result = backend
            .data_yang_patch(&request(), &ApiPath::empty(), &mut body)
            .await
            .unwrap();
        assert!(!result.status.ok);
        assert_eq!(result.status.edits.len(), 2);
        assert!(result.status.edits[0].ok);
        assert_eq!(result.status.edits[1].errors[0].error_tag, ErrorTag::DataMissing);

        let state = backend.state.read().unwrap();
        assert!(node(&state.root, path("example:music/genre").steps()).is_none());
    }

    #[tokio::test]
    async fn test_yang_patch_rejects_insert() {
        let backend = seeded();
        let patch = json!({
            "ietf-yang-patch:yang-patch": {
                "patch-id": "p2",
                "edit": [
                    { "edit-id": "e1", "operation": "insert", "target": "/example:music/genre",
                      "value": { "genre": "jazz" } }
                ]
            }
        });
        let mut body = PatchBody::new(MessageEncoding::Json, Body::from(patch.to_string()), 4096);
        let result = backend
            .data_yang_patch(&request(), &ApiPath::empty(), &mut body)
            .await
            .unwrap();
        assert!(!result.status.ok);
        assert_eq!(
            result.status.edits[0].errors[0].error_tag,
            ErrorTag::OperationNotSupported
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = seeded();
        backend
            .data_delete(&request(), &path("example:music/artist=Foo"))
            .await
            .unwrap();
        let err = backend
            .data_delete(&request(), &path("example:music/artist=Foo"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.first().error_tag, ErrorTag::DataMissing);
    }

    #[tokio::test]
    async fn test_rpcs() {
        let backend = MemoryBackend::new();
        let mut body = OperationInputBody::new(MessageEncoding::Json, Body::empty(), 1024);
        let ping = backend
            .operations_post(&request(), &path("restconf-server:ping"), &mut body)
            .await
            .unwrap();
        assert!(ping.output.is_none());

        let mut body = OperationInputBody::new(
            MessageEncoding::Json,
            Body::from(r#"{"restconf-server:input":{"message":"hi"}}"#),
            1024,
        );
        let echo = backend
            .operations_post(&request(), &path("restconf-server:echo"), &mut body)
            .await
            .unwrap();
        let output = echo.output.unwrap();
        assert_eq!(
            render(output.as_ref(), MessageEncoding::Json),
            r#"{"restconf-server:output":{"message":"hi"}}"#
        );
    }

    #[tokio::test]
    async fn test_edits_publish_notifications() {
        let registry = Arc::new(StreamRegistry::new());
        let backend = MemoryBackend::new().with_notifications(registry.clone());
        let stream = registry.lookup_stream(NOTIFICATION_STREAM).unwrap();
        let (sender, mut rx) = channel(4);
        let _registration = stream
            .add_subscriber(Arc::new(sender), MessageEncoding::Json, Some("/example:top".into()))
            .unwrap();

        let mut body = ResourceBody::new(
            MessageEncoding::Json,
            Body::from(r#"{"example:top":{}}"#),
            1024,
        );
        backend
            .data_put(&request(), &path("example:top"), &mut body)
            .await
            .unwrap();
        let Some(SseFrame::Data(message)) = rx.try_recv().ok() else {
            panic!("expected a notification");
        };
        assert!(message.contains(r#""path":"/example:top""#));
        assert!(message.contains(r#""operation":"create""#));
    }

    #[tokio::test]
    async fn test_establish_subscription() {
        let registry = Arc::new(StreamRegistry::new());
        let backend = MemoryBackend::new().with_notifications(registry.clone());
        let mut body = OperationInputBody::new(
            MessageEncoding::Json,
            Body::from(r#"{"ietf-subscribed-notifications:input":{"stream":"NETCONF"}}"#),
            1024,
        );
        let result = backend
            .operations_post(
                &request(),
                &path("ietf-subscribed-notifications:establish-subscription"),
                &mut body,
            )
            .await
            .unwrap();
        let text = render(result.output.unwrap().as_ref(), MessageEncoding::Json);
        let value: Value = serde_json::from_str(&text).unwrap();
        let id = value["ietf-subscribed-notifications:output"]["id"].as_u64().unwrap();
        assert!(registry.lookup_subscription(id as u32).is_some());
    }

    #[tokio::test]
    async fn test_modules() {
        let backend = MemoryBackend::new()
            .with_module("example", Some("2020-01-01"), "module example { }", None)
            .with_module("example", Some("2021-01-01"), "module example { revision 2021-01-01; }", None);
        let latest = backend
            .modules_yang_get(&request(), &ApiPath::empty(), "example", None)
            .await
            .unwrap();
        assert!(std::str::from_utf8(&latest.0).unwrap().contains("2021-01-01"));

        let err = backend
            .modules_yin_get(&request(), &ApiPath::empty(), "example", Some("2020-01-01"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.first().error_tag, ErrorTag::DataMissing);
    }
}
