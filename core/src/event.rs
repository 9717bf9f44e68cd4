//! Lifecycle events consumed by the entity engine.
//!
//! An event is a `{PREFIX}_{SUFFIX}` type name and a payload. The prefix selects
//! the engine (one per domain), the suffix selects the lifecycle step. Type
//! names are parsed once at the boundary into an [`EntityEvent`] so the engine
//! matches on [`EventKind`] rather than on strings.
//!
//! # Wire shape
//!
//! ```
//! use restful_rust_core::event::{EntityEvent, EventKind};
//! use serde_json::json;
//!
//! let event: EntityEvent = serde_json::from_value(json!({
//!     "type": "FOO_ACTION_SUCCESS",
//!     "payload": {"id": "1", "actionId": "save", "response": {"ok": true}}
//! }))?;
//!
//! assert_eq!(event.prefix, "FOO");
//! assert_eq!(event.kind, EventKind::ActionSuccess);
//! assert_eq!(event.payload.action_id.as_deref(), Some("save"));
//! # Ok::<(), serde_json::Error>(())
//! ```

use crate::tree::EntityId;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Lifecycle step of an entity event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A fetch started
    FetchPending,
    /// A fetch completed
    FetchSuccess,
    /// A fetch failed
    FetchError,
    /// A named action started
    ActionPending,
    /// A named action completed
    ActionSuccess,
    /// A named action failed
    ActionError,
    /// A named action (or all of them) was dismissed
    ActionClear,
    /// Local write, recorded as a successful fetch
    Set,
    /// Local update of caller metadata
    SetData,
    /// Local update of caller metadata
    Data,
    /// Local removal of the entity value
    Delete,
}

impl EventKind {
    /// Every kind, ordered so that suffix matching is unambiguous
    /// (`SET_DATA` is tried before `DATA`).
    pub const ALL: [Self; 11] = [
        Self::FetchPending,
        Self::FetchSuccess,
        Self::FetchError,
        Self::ActionPending,
        Self::ActionSuccess,
        Self::ActionError,
        Self::ActionClear,
        Self::SetData,
        Self::Data,
        Self::Set,
        Self::Delete,
    ];

    /// Type name suffix
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::FetchPending => "FETCH_PENDING",
            Self::FetchSuccess => "FETCH_SUCCESS",
            Self::FetchError => "FETCH_ERROR",
            Self::ActionPending => "ACTION_PENDING",
            Self::ActionSuccess => "ACTION_SUCCESS",
            Self::ActionError => "ACTION_ERROR",
            Self::ActionClear => "ACTION_CLEAR",
            Self::Set => "SET",
            Self::SetData => "SET_DATA",
            Self::Data => "DATA",
            Self::Delete => "DELETE",
        }
    }

    /// Kind for an exact suffix
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.suffix() == suffix)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Explicit field update: write a value or remove the field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delta<T> {
    /// Write the value
    Set(T),
    /// Remove the field
    Delete,
}

/// Update of an entity's caller metadata (`_meta[domain][id].data`)
#[derive(Clone, Debug, PartialEq)]
pub enum DataUpdate {
    /// Merge fields into the existing data; `Delete` removes a field
    Merge(BTreeMap<String, Delta<Value>>),
    /// Remove the data field entirely
    Clear,
}

impl DataUpdate {
    /// Interpret a wire value.
    ///
    /// An object merges, with `null` fields meaning "remove". Falsy values
    /// (`false`, `null`, `0`, `""`) clear. Any other value changes nothing.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self::Merge(
                fields
                    .into_iter()
                    .map(|(key, value)| {
                        let delta = if value.is_null() {
                            Delta::Delete
                        } else {
                            Delta::Set(value)
                        };
                        (key, delta)
                    })
                    .collect(),
            ),
            Value::Null | Value::Bool(false) => Self::Clear,
            Value::Number(n) if n.as_f64() == Some(0.0) => Self::Clear,
            Value::String(s) if s.is_empty() => Self::Clear,
            _ => Self::Merge(BTreeMap::new()),
        }
    }

    /// Wire representation
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Merge(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, delta)| {
                        let value = match delta {
                            Delta::Set(value) => value.clone(),
                            Delta::Delete => Value::Null,
                        };
                        (key.clone(), value)
                    })
                    .collect(),
            ),
            Self::Clear => Value::Bool(false),
        }
    }

    /// Apply the update to the current data field.
    ///
    /// An empty merge hands back the current data unchanged.
    #[must_use]
    pub fn apply(&self, current: Option<&Arc<Map<String, Value>>>) -> Option<Arc<Map<String, Value>>> {
        match self {
            Self::Clear => None,
            Self::Merge(fields) if fields.is_empty() => current.cloned(),
            Self::Merge(fields) => {
                let mut next = current.map(|data| (**data).clone()).unwrap_or_default();
                for (key, delta) in fields {
                    match delta {
                        Delta::Set(value) => {
                            next.insert(key.clone(), value.clone());
                        },
                        Delta::Delete => {
                            next.remove(key);
                        },
                    }
                }
                Some(Arc::new(next))
            },
        }
    }
}

impl Serialize for DataUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataUpdate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

/// Normalized entities carried by a payload: domain → id → value
pub type NormalizedEntities = BTreeMap<String, BTreeMap<EntityId, Value>>;

/// Payload of an entity event
///
/// Every field is optional; which ones matter depends on the [`EventKind`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Id of the acting entity
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_id"
    )]
    pub id: Option<EntityId>,
    /// Either the id of the acting entity or its new value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Normalized entities to merge into the tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<NormalizedEntities>,
    /// Raw outcome of a remote operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Named action this event belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    /// Update of the caller metadata
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_data"
    )]
    pub data: Option<DataUpdate>,
    /// `Some(false)` suppresses ancestor invalidation for this event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bubble_up: Option<bool>,
    /// The operation removed the entity remotely
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub delete: bool,
}

impl EventPayload {
    /// Payload identifying a single entity
    #[must_use]
    pub fn for_id(id: impl Into<EntityId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Set `result`
    #[must_use]
    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    /// Set `entities`
    #[must_use]
    pub fn with_entities(mut self, entities: NormalizedEntities) -> Self {
        self.entities = Some(entities);
        self
    }

    /// Set `response`
    #[must_use]
    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    /// Set `actionId`
    #[must_use]
    pub fn with_action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    /// Set `data`
    #[must_use]
    pub fn with_data(mut self, data: DataUpdate) -> Self {
        self.data = Some(data);
        self
    }

    /// Suppress ancestor invalidation
    #[must_use]
    pub const fn without_bubble_up(mut self) -> Self {
        self.bubble_up = Some(false);
        self
    }

    /// Mark the entity as removed remotely
    #[must_use]
    pub const fn marked_deleted(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Id of the entity this event acts on: `result` when it is an id, else `id`
    #[must_use]
    pub fn acting_id(&self) -> Option<EntityId> {
        match &self.result {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => self.id.clone().filter(|id| !id.is_empty()),
        }
    }

    /// New value of the acting entity, when `result` carries one
    #[must_use]
    pub fn result_entity(&self) -> Option<&Value> {
        self.result
            .as_ref()
            .filter(|result| result.is_object() || result.is_array())
    }
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<EntityId>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(id) => Ok(Some(id)),
        Value::Number(id) => Ok(Some(id.to_string())),
        other => Err(de::Error::custom(format!("entity id must be a string or number, got {other}"))),
    }
}

fn deserialize_data<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DataUpdate>, D::Error> {
    // A present `data: null` is a clear, not an absent field
    Value::deserialize(deserializer).map(|value| Some(DataUpdate::from_value(value)))
}

/// A lifecycle event addressed to the engine registered under `prefix`
#[derive(Clone, Debug, PartialEq)]
pub struct EntityEvent {
    /// Action prefix of the target engine
    pub prefix: String,
    /// Lifecycle step
    pub kind: EventKind,
    /// Payload
    pub payload: EventPayload,
}

impl EntityEvent {
    /// Create an event
    #[must_use]
    pub fn new(prefix: impl Into<String>, kind: EventKind, payload: EventPayload) -> Self {
        Self {
            prefix: prefix.into(),
            kind,
            payload,
        }
    }

    /// Parse a `{PREFIX}_{SUFFIX}` type name.
    ///
    /// The longest matching suffix wins, so a prefix ending in `_SET` cannot
    /// carry `DATA`; `EntityConfigBuilder::build` rejects such prefixes.
    /// Returns `None` when no known suffix matches or the prefix is empty.
    #[must_use]
    pub fn parse(type_name: &str, payload: EventPayload) -> Option<Self> {
        EventKind::ALL.into_iter().find_map(|kind| {
            let prefix = type_name.strip_suffix(kind.suffix())?.strip_suffix('_')?;
            (!prefix.is_empty()).then(|| Self::new(prefix, kind, payload.clone()))
        })
    }

    /// The `{PREFIX}_{SUFFIX}` type name
    #[must_use]
    pub fn type_name(&self) -> String {
        format!("{}_{}", self.prefix, self.kind.suffix())
    }
}

#[derive(Serialize, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    payload: EventPayload,
}

impl Serialize for EntityEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireEvent {
            type_name: self.type_name(),
            payload: self.payload.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EntityEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireEvent::deserialize(deserializer)?;
        let type_name = wire.type_name;
        Self::parse(&type_name, wire.payload)
            .ok_or_else(|| de::Error::custom(format!("unrecognised event type: {type_name}")))
    }
}
