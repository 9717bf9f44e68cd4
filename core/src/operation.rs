//! Async operation composer.
//!
//! An [`Operation`] describes one remote call against an entity: method, URL,
//! parameters, and how to turn its outcome into events. The
//! [`OperationComposer`] turns it into a [`ComposedOperation`]:
//!
//! - an immediate pending event (`FETCH_PENDING`, or `ACTION_PENDING` when an
//!   action id is given),
//! - a [`Request`] for an external [`Transport`] to perform,
//! - an [`OutcomeResolver`] that maps the transport's [`Outcome`] to the
//!   success or error event plus the optional side action,
//! - and optionally a [`ScheduledClear`] fired after a delay.
//!
//! Nothing here performs I/O. The runtime's `Store::perform` drives the pieces
//! directly; reducers that start operations return
//! [`ComposedOperation::into_effect`] instead.
//!
//! # Example
//!
//! ```
//! use restful_rust_core::config::EntityConfig;
//! use restful_rust_core::event::EventKind;
//! use restful_rust_core::operation::{Method, Operation, OperationComposer};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(EntityConfig::builder().action_prefix("USER").entity_type("user").build()?);
//! let composer = OperationComposer::new(config);
//!
//! let operation: Operation = Operation::fetch("octocat", "https://api.github.com/users/octocat");
//! let composed = composer.compose(operation);
//! assert_eq!(composed.pending().kind, EventKind::FetchPending);
//! assert_eq!(composed.request().method, Method::Get);
//!
//! let (_, _, resolver) = composed.into_parts();
//! let events = resolver.resolve(Ok(json!({"login": "octocat"})))?;
//! assert_eq!(events[0].kind, EventKind::FetchSuccess);
//! # Ok(())
//! # }
//! ```

use crate::action::{ActionFactory, Lifecycle};
use crate::config::EntityConfig;
use crate::effect::{Effect, EffectId};
use crate::error::{FormatError, OperationError};
use crate::event::{DataUpdate, EntityEvent, EventPayload, NormalizedEntities};
use crate::normalize::{DefaultNormalizer, Normalizer, Schema};
use crate::tree::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// HTTP-like method of a remote operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read
    Get,
    /// Remove
    Delete,
    /// Replace
    Put,
    /// Partial update
    Patch,
    /// Create or invoke
    Post,
}

impl Method {
    /// Upper-case method name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Delete => "DELETE",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Back-reference from a request to the entity slot it reports into
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    /// Action prefix of the owning domain
    pub prefix: String,
    /// Entity id
    pub id: EntityId,
    /// Named action, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
}

impl Correlation {
    /// Cancellation key shared by every operation on the same slot
    #[must_use]
    pub fn effect_id(&self) -> EffectId {
        EffectId::new(format!(
            "{}:{}:{}",
            self.prefix,
            self.id,
            self.action_id.as_deref().unwrap_or_default()
        ))
    }
}

/// Outbound call for a transport to perform
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Method
    pub method: Method,
    /// Endpoint
    pub url: String,
    /// Transport parameters (body, headers, query), passed through untouched
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    /// Slot the outcome belongs to
    pub correlation: Correlation,
}

/// Result of a remote call: `Ok(body)` on success, `Err(response)` on failure
pub type Outcome = Result<Value, Value>;

/// Performs network I/O on behalf of the composer
///
/// Implementations decide how credentials, headers, and status codes map onto
/// an [`Outcome`]. Failures are data, never panics.
pub trait Transport: Send + Sync {
    /// Perform one request
    fn execute(&self, request: Request) -> Pin<Box<dyn Future<Output = Outcome> + Send + '_>>;
}

/// Context passed to a [`Formatter`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatContext {
    /// Entity id of the operation
    pub id: EntityId,
    /// Named action, if any
    pub action_id: Option<String>,
    /// Domain of the operation
    pub entity_type: String,
}

/// Rewrites a successful response before it becomes an event payload
pub type Formatter = Arc<dyn Fn(Value, &FormatContext) -> Result<Value, FormatError> + Send + Sync>;

/// Description of one remote operation
///
/// `A` is the application action type used for side actions.
#[derive(Clone)]
pub struct Operation<A = EntityEvent> {
    method: Method,
    id: EntityId,
    action_id: Option<String>,
    url: String,
    params: Map<String, Value>,
    schema: Option<Schema>,
    formatter: Option<Formatter>,
    replace_model: bool,
    on_success: Option<A>,
    on_error: Option<A>,
    clear_after: Option<Duration>,
    delete: bool,
}

impl<A> Operation<A> {
    fn new(method: Method, id: impl Into<EntityId>, url: impl Into<String>) -> Self {
        Self {
            method,
            id: id.into(),
            action_id: None,
            url: url.into(),
            params: Map::new(),
            schema: None,
            formatter: None,
            replace_model: false,
            on_success: None,
            on_error: None,
            clear_after: None,
            delete: false,
        }
    }

    /// `GET` that loads the entity
    #[must_use]
    pub fn fetch(id: impl Into<EntityId>, url: impl Into<String>) -> Self {
        Self::new(Method::Get, id, url)
    }

    /// Same as [`Operation::fetch`]
    #[must_use]
    pub fn get(id: impl Into<EntityId>, url: impl Into<String>) -> Self {
        Self::fetch(id, url)
    }

    /// `DELETE`; its success removes the entity value
    #[must_use]
    pub fn delete(id: impl Into<EntityId>, url: impl Into<String>) -> Self {
        let mut operation = Self::new(Method::Delete, id, url);
        operation.delete = true;
        operation
    }

    /// `PUT`
    #[must_use]
    pub fn put(id: impl Into<EntityId>, url: impl Into<String>) -> Self {
        Self::new(Method::Put, id, url)
    }

    /// `PATCH`
    #[must_use]
    pub fn patch(id: impl Into<EntityId>, url: impl Into<String>) -> Self {
        Self::new(Method::Patch, id, url)
    }

    /// `POST`
    #[must_use]
    pub fn post(id: impl Into<EntityId>, url: impl Into<String>) -> Self {
        Self::new(Method::Post, id, url)
    }

    /// Report into `actions[action_id]` instead of `fetch`
    #[must_use]
    pub fn with_action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    /// Transport parameters
    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Normalize successful responses with a schema
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<Schema>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Rewrite successful responses; runs before schema normalization
    #[must_use]
    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(Value, &FormatContext) -> Result<Value, FormatError> + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// For named actions: treat the response as the new entity value
    #[must_use]
    pub const fn replace_model(mut self) -> Self {
        self.replace_model = true;
        self
    }

    /// Dispatch `action` after the success event
    #[must_use]
    pub fn on_success(mut self, action: A) -> Self {
        self.on_success = Some(action);
        self
    }

    /// Dispatch `action` after the error event
    #[must_use]
    pub fn on_error(mut self, action: A) -> Self {
        self.on_error = Some(action);
        self
    }

    /// Dispatch `ACTION_CLEAR` for this slot once `after` has elapsed
    #[must_use]
    pub const fn clear_after(mut self, after: Duration) -> Self {
        self.clear_after = Some(after);
        self
    }

    /// Method
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Entity id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Named action, if any
    #[must_use]
    pub fn action_id(&self) -> Option<&str> {
        self.action_id.as_deref()
    }
}

impl<A> fmt::Debug for Operation<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("method", &self.method)
            .field("id", &self.id)
            .field("action_id", &self.action_id)
            .field("url", &self.url)
            .field("schema", &self.schema.is_some())
            .field("formatter", &self.formatter.is_some())
            .field("replace_model", &self.replace_model)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("clear_after", &self.clear_after)
            .finish_non_exhaustive()
    }
}

/// Turns [`Operation`]s into pending events, requests, and resolvers
#[derive(Clone, Debug)]
pub struct OperationComposer {
    config: Arc<EntityConfig>,
    factory: ActionFactory,
}

impl OperationComposer {
    /// Composer for the domain described by `config`
    #[must_use]
    pub fn new(config: Arc<EntityConfig>) -> Self {
        let factory = ActionFactory::new(config.action_prefix());
        Self { config, factory }
    }

    /// Event factory for this domain
    #[must_use]
    pub const fn factory(&self) -> &ActionFactory {
        &self.factory
    }

    /// Compose an operation
    #[must_use]
    pub fn compose<A>(&self, operation: Operation<A>) -> ComposedOperation<A> {
        let pending = self
            .factory
            .pending(operation.id.clone(), operation.action_id.as_deref());
        let request = Request {
            method: operation.method,
            url: operation.url,
            params: operation.params,
            correlation: Correlation {
                prefix: self.factory.prefix().to_string(),
                id: operation.id.clone(),
                action_id: operation.action_id.clone(),
            },
        };

        trace!(
            method = %request.method,
            url = %request.url,
            id = %request.correlation.id,
            "Composed operation"
        );
        if self.config.debug() {
            debug!(
                entity_type = self.config.entity_type(),
                id = %operation.id,
                action_id = ?operation.action_id,
                request = ?request,
                "Creating remote operation"
            );
        }

        ComposedOperation {
            pending,
            request,
            resolver: OutcomeResolver {
                config: Arc::clone(&self.config),
                factory: self.factory.clone(),
                id: operation.id,
                action_id: operation.action_id,
                schema: operation.schema,
                formatter: operation.formatter,
                replace_model: operation.replace_model,
                delete: operation.delete,
                on_success: operation.on_success,
                on_error: operation.on_error,
                clear_after: operation.clear_after,
            },
        }
    }
}

/// A composed operation, ready to be driven by a runtime
pub struct ComposedOperation<A = EntityEvent> {
    pending: EntityEvent,
    request: Request,
    resolver: OutcomeResolver<A>,
}

impl<A> ComposedOperation<A> {
    /// Event to dispatch before the request starts
    #[must_use]
    pub const fn pending(&self) -> &EntityEvent {
        &self.pending
    }

    /// Request for the transport
    #[must_use]
    pub const fn request(&self) -> &Request {
        &self.request
    }

    /// Cancellation key of this operation's slot
    #[must_use]
    pub fn effect_id(&self) -> EffectId {
        self.request.correlation.effect_id()
    }

    /// Split into pending event, request, and resolver
    #[must_use]
    pub fn into_parts(self) -> (EntityEvent, Request, OutcomeResolver<A>) {
        (self.pending, self.request, self.resolver)
    }
}

impl<A> ComposedOperation<A>
where
    A: From<EntityEvent> + Send + 'static,
{
    /// Describe the whole operation as one effect.
    ///
    /// Runs in order: cancel any clear timer still armed for this slot,
    /// dispatch the pending event, perform the request and dispatch the
    /// resolved events, then arm the clear timer (if any) under the slot's id.
    /// Resolution errors are logged; the clear timer is still armed.
    #[must_use]
    pub fn into_effect(self, transport: Arc<dyn Transport>) -> Effect<A> {
        let id = self.effect_id();
        let (pending, request, resolver) = self.into_parts();
        let clear = resolver.scheduled_clear();

        let outcome_events = async_stream::stream! {
            let outcome = transport.execute(request).await;
            match resolver.resolve(outcome) {
                Ok(events) => {
                    for event in events {
                        yield event;
                    }
                },
                Err(error) => {
                    tracing::error!(error = %error, "Failed to resolve operation outcome");
                },
            }
        };

        let mut steps = vec![
            Effect::Cancel(id.clone()),
            Effect::Future(Box::pin(futures::future::ready(Some(A::from(pending))))),
            Effect::Stream(Box::pin(outcome_events)),
        ];
        if let Some(clear) = clear {
            steps.push(Effect::Cancellable {
                id,
                effect: Box::new(Effect::Delay {
                    duration: clear.after,
                    action: Box::new(A::from(clear.event)),
                }),
            });
        }
        Effect::Sequential(steps)
    }
}

impl<A> fmt::Debug for ComposedOperation<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedOperation")
            .field("pending", &self.pending)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// A clear event to dispatch after a delay
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledClear {
    /// Delay after the outcome
    pub after: Duration,
    /// Cancellation key of the timer
    pub effect_id: EffectId,
    /// The `ACTION_CLEAR` event
    pub event: EntityEvent,
}

/// Maps a transport [`Outcome`] to events
pub struct OutcomeResolver<A = EntityEvent> {
    config: Arc<EntityConfig>,
    factory: ActionFactory,
    id: EntityId,
    action_id: Option<String>,
    schema: Option<Schema>,
    formatter: Option<Formatter>,
    replace_model: bool,
    delete: bool,
    on_success: Option<A>,
    on_error: Option<A>,
    clear_after: Option<Duration>,
}

impl<A> OutcomeResolver<A> {
    /// The clear timer to arm after the outcome, if the operation asked for one
    #[must_use]
    pub fn scheduled_clear(&self) -> Option<ScheduledClear> {
        self.clear_after.map(|after| ScheduledClear {
            after,
            effect_id: self.correlation().effect_id(),
            event: self.factory.clear(self.id.clone(), self.action_id.as_deref()),
        })
    }

    fn correlation(&self) -> Correlation {
        Correlation {
            prefix: self.factory.prefix().to_string(),
            id: self.id.clone(),
            action_id: self.action_id.clone(),
        }
    }

    fn format_context(&self) -> FormatContext {
        FormatContext {
            id: self.id.clone(),
            action_id: self.action_id.clone(),
            entity_type: self.config.entity_type().to_string(),
        }
    }

    fn success_payload(&self, response: Value) -> Result<EventPayload, OperationError> {
        let context = self.format_context();

        if self.action_id.is_some() && !self.replace_model {
            let response = match &self.formatter {
                Some(formatter) => formatter(response, &context)?,
                None => response,
            };
            return Ok(EventPayload::for_id(self.id.clone()).with_response(response));
        }

        let (value, formatted) = match &self.formatter {
            Some(formatter) => (formatter(response, &context)?, true),
            None => (response, false),
        };

        let mut payload = if let Some(schema) = &self.schema {
            self.normalize(value, formatted, schema)?
        } else if formatted {
            serde_json::from_value::<EventPayload>(value)?
        } else {
            let mut by_id = std::collections::BTreeMap::new();
            by_id.insert(self.id.clone(), value);
            let mut entities = NormalizedEntities::new();
            entities.insert(self.config.entity_type().to_string(), by_id);
            EventPayload::default()
                .with_result(Value::String(self.id.clone()))
                .with_entities(entities)
        };

        if payload.id.is_none() {
            payload.id = Some(self.id.clone());
        }
        Ok(payload)
    }

    /// Normalize a (possibly formatted) value.
    ///
    /// A formatter may wrap its output as `{result, id, data}`; `result` is
    /// normalized and `id`/`data` are carried onto the payload. Unwrapped
    /// output is normalized whole, and its own `id`/`data` are still carried.
    fn normalize(&self, value: Value, formatted: bool, schema: &Schema) -> Result<EventPayload, OperationError> {
        let (target, id, data) = match value {
            Value::Object(mut fields) if formatted => match fields.remove("result") {
                Some(result) if !result.is_null() => {
                    let id = fields.remove("id");
                    let data = fields.remove("data");
                    (result, id, data)
                },
                _ => {
                    let id = fields.get("id").cloned();
                    let data = fields.get("data").cloned();
                    (Value::Object(fields), id, data)
                },
            },
            other => (other, None, None),
        };

        let normalized = match self.config.normalizer() {
            Some(normalizer) => normalizer.normalize(target, schema)?,
            None => DefaultNormalizer.normalize(target, schema)?,
        };

        let mut payload = EventPayload::default()
            .with_result(normalized.result)
            .with_entities(normalized.entities);
        payload.id = match id {
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        payload.data = data.map(DataUpdate::from_value);
        Ok(payload)
    }

    /// Resolve an outcome into the events to dispatch, in order
    ///
    /// The primary success or error event comes first, followed by the side
    /// action configured for that outcome.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError`] when the formatter or normalizer rejects a
    /// successful response. Failed outcomes never reach either.
    pub fn resolve(self, outcome: Outcome) -> Result<Vec<A>, OperationError>
    where
        A: From<EntityEvent>,
    {
        let lifecycle = Lifecycle::of(self.action_id.as_deref());

        let (primary, side) = match outcome {
            Ok(response) => {
                let mut payload = self.success_payload(response)?;
                if payload.action_id.is_none() {
                    payload.action_id.clone_from(&self.action_id);
                }
                payload.delete |= self.delete;
                (
                    self.factory.create(lifecycle.success_kind(), payload),
                    self.on_success,
                )
            },
            Err(response) => (
                self.factory
                    .error(self.id.clone(), self.action_id.as_deref(), response),
                self.on_error,
            ),
        };

        trace!(event = %primary.type_name(), "Resolved operation outcome");
        if self.config.debug() {
            debug!(event = %primary.type_name(), payload = ?primary.payload, "Triggering outcome event");
        }

        let mut events = vec![A::from(primary)];
        events.extend(side);
        Ok(events)
    }
}

impl<A> fmt::Debug for OutcomeResolver<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeResolver")
            .field("entity_type", &self.config.entity_type())
            .field("id", &self.id)
            .field("action_id", &self.action_id)
            .field("replace_model", &self.replace_model)
            .field("delete", &self.delete)
            .finish_non_exhaustive()
    }
}
