//! Entity tree and per-entity request metadata.
//!
//! The tree is partitioned by domain. Each domain maps entity ids to opaque
//! JSON values; a parallel `_meta` partition maps the same `(domain, id)` pairs
//! to [`EntityMeta`] records describing fetch and named-action lifecycles.
//!
//! Every container is `Arc`-shared. Cloning a tree is a pair of reference count
//! bumps, and writes go through `Arc::make_mut` so that only the containers on
//! the written path are copied. Consumers can compare containers with
//! `Arc::ptr_eq` to skip recomputation when nothing changed underneath.
//!
//! # Wire shape
//!
//! ```json
//! {
//!   "_meta": { "foo": { "1": { "fetch": { "success": "fetched", "completedAt": 1735689600000 } } } },
//!   "foo": { "1": { "abc": "def" } }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key of the metadata partition in the serialized tree
pub const META_KEY: &str = "_meta";

/// Entity identifier within a domain
pub type EntityId = String;

/// All entity values of one domain
pub type DomainEntities = BTreeMap<EntityId, Arc<Value>>;

/// All entity metadata records of one domain
pub type DomainMeta = BTreeMap<EntityId, Arc<EntityMeta>>;

/// The whole managed state fragment: entity values and their metadata, per domain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityTree {
    domains: Arc<BTreeMap<String, Arc<DomainEntities>>>,
    meta: Arc<BTreeMap<String, Arc<DomainMeta>>>,
}

impl EntityTree {
    /// Create an empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity value stored under `(domain, id)`
    #[must_use]
    pub fn entity(&self, domain: &str, id: &str) -> Option<&Arc<Value>> {
        self.domains.get(domain).and_then(|entities| entities.get(id))
    }

    /// All entity values of a domain
    #[must_use]
    pub fn domain(&self, domain: &str) -> Option<&Arc<DomainEntities>> {
        self.domains.get(domain)
    }

    /// Metadata record for `(domain, id)`
    #[must_use]
    pub fn meta(&self, domain: &str, id: &str) -> Option<&Arc<EntityMeta>> {
        self.meta.get(domain).and_then(|records| records.get(id))
    }

    /// All metadata records of a domain
    #[must_use]
    pub fn meta_domain(&self, domain: &str) -> Option<&Arc<DomainMeta>> {
        self.meta.get(domain)
    }

    /// Names of the domains holding entity values
    pub fn domain_names(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    /// Whether both trees share the same root containers
    ///
    /// This is the cheap "nothing changed" signal: a no-op event hands back a
    /// tree for which `ptr_eq` with the input holds.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.domains, &other.domains) && Arc::ptr_eq(&self.meta, &other.meta)
    }

    /// Copy of this tree with one entity value replaced
    #[must_use]
    pub fn with_entity(&self, domain: &str, id: impl Into<EntityId>, value: Value) -> Self {
        let mut next = self.clone();
        next.domain_mut(domain).insert(id.into(), Arc::new(value));
        next
    }

    /// Copy of this tree with one metadata record replaced
    #[must_use]
    pub fn with_meta(&self, domain: &str, id: impl Into<EntityId>, meta: EntityMeta) -> Self {
        let mut next = self.clone();
        next.meta_domain_mut(domain).insert(id.into(), Arc::new(meta));
        next
    }

    /// Force fresh root containers.
    ///
    /// Only copies when the roots are still shared with another tree.
    pub(crate) fn detach(&mut self) {
        Arc::make_mut(&mut self.domains);
        Arc::make_mut(&mut self.meta);
    }

    /// Make sure a (possibly empty) domain container exists
    pub(crate) fn ensure_domain(&mut self, domain: &str) {
        if !self.domains.contains_key(domain) {
            Arc::make_mut(&mut self.domains).insert(domain.to_string(), Arc::default());
        }
    }

    pub(crate) fn domain_mut(&mut self, domain: &str) -> &mut DomainEntities {
        Arc::make_mut(
            Arc::make_mut(&mut self.domains)
                .entry(domain.to_string())
                .or_default(),
        )
    }

    pub(crate) fn meta_domain_mut(&mut self, domain: &str) -> &mut DomainMeta {
        Arc::make_mut(
            Arc::make_mut(&mut self.meta)
                .entry(domain.to_string())
                .or_default(),
        )
    }
}

impl Serialize for EntityTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.domains.len() + 1))?;
        map.serialize_entry(META_KEY, &*self.meta)?;
        for (domain, entities) in self.domains.iter() {
            map.serialize_entry(domain, entities)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EntityTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let mut domains = BTreeMap::new();
        let mut meta = BTreeMap::new();

        for (key, value) in raw {
            if key == META_KEY {
                let records: BTreeMap<String, BTreeMap<EntityId, EntityMeta>> =
                    serde_json::from_value(value).map_err(de::Error::custom)?;
                for (domain, by_id) in records {
                    let by_id: DomainMeta =
                        by_id.into_iter().map(|(id, m)| (id, Arc::new(m))).collect();
                    meta.insert(domain, Arc::new(by_id));
                }
            } else {
                let by_id: BTreeMap<EntityId, Value> =
                    serde_json::from_value(value).map_err(de::Error::custom)?;
                let by_id: DomainEntities =
                    by_id.into_iter().map(|(id, v)| (id, Arc::new(v))).collect();
                domains.insert(key, Arc::new(by_id));
            }
        }

        Ok(Self {
            domains: Arc::new(domains),
            meta: Arc::new(meta),
        })
    }
}

/// Reference to one entity in another domain
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    /// Domain of the referenced entity
    pub entity_type: String,
    /// Id of the referenced entity
    pub id: EntityId,
}

impl EntityRef {
    /// Create a reference
    #[must_use]
    pub fn new(entity_type: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

/// How an entity came to be present after a successful fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessKind {
    /// Loaded by its own fetch
    Fetched,
    /// Written locally with a `SET` event
    Set,
    /// Introduced as a nested entity of another fetch
    Normalized,
}

/// Current phase of an entity's fetch lifecycle
#[derive(Clone, Debug, PartialEq)]
pub enum FetchPhase {
    /// A fetch is in flight
    Pending,
    /// The entity is present
    Success(SuccessKind),
    /// The last fetch failed with this response
    Error(Arc<Value>),
}

/// Fetch lifecycle metadata of one entity
#[derive(Clone, Debug, PartialEq)]
pub struct FetchState {
    /// Current phase
    pub phase: FetchPhase,
    /// Outer fetch that introduced a normalized entity
    pub source: Option<EntityRef>,
    /// When the pending transition happened
    pub initiated_at: Option<DateTime<Utc>>,
    /// When the success or error transition happened
    pub completed_at: Option<DateTime<Utc>>,
}

impl FetchState {
    /// A fetch that started at `now`
    #[must_use]
    pub const fn pending(now: DateTime<Utc>) -> Self {
        Self {
            phase: FetchPhase::Pending,
            source: None,
            initiated_at: Some(now),
            completed_at: None,
        }
    }

    /// A fetch that completed at `now`
    #[must_use]
    pub const fn succeeded(kind: SuccessKind, now: DateTime<Utc>) -> Self {
        Self {
            phase: FetchPhase::Success(kind),
            source: None,
            initiated_at: None,
            completed_at: Some(now),
        }
    }

    /// An entity introduced at `now` by the fetch of `source`
    #[must_use]
    pub const fn normalized(source: EntityRef, now: DateTime<Utc>) -> Self {
        Self {
            phase: FetchPhase::Success(SuccessKind::Normalized),
            source: Some(source),
            initiated_at: None,
            completed_at: Some(now),
        }
    }

    /// A fetch that failed at `now`
    #[must_use]
    pub const fn failed(response: Arc<Value>, now: DateTime<Utc>) -> Self {
        Self {
            phase: FetchPhase::Error(response),
            source: None,
            initiated_at: None,
            completed_at: Some(now),
        }
    }

    /// Whether a fetch is in flight
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.phase, FetchPhase::Pending)
    }

    /// Success kind, if the entity is present
    #[must_use]
    pub const fn success(&self) -> Option<SuccessKind> {
        match self.phase {
            FetchPhase::Success(kind) => Some(kind),
            _ => None,
        }
    }

    /// Error response, if the last fetch failed
    #[must_use]
    pub fn error(&self) -> Option<&Value> {
        match &self.phase {
            FetchPhase::Error(response) => Some(response),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchStateWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    success: Option<SuccessKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<Arc<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<EntityRef>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    initiated_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    completed_at: Option<DateTime<Utc>>,
}

impl Serialize for FetchState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (pending, success, error) = match &self.phase {
            FetchPhase::Pending => (Some(true), None, None),
            FetchPhase::Success(kind) => (None, Some(*kind), None),
            FetchPhase::Error(response) => (None, None, Some(Arc::clone(response))),
        };
        FetchStateWire {
            pending,
            success,
            error,
            source: self.source.clone(),
            initiated_at: self.initiated_at,
            completed_at: self.completed_at,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FetchState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = FetchStateWire::deserialize(deserializer)?;
        let phase = match (wire.pending, wire.success, wire.error) {
            (Some(true), None, None) => FetchPhase::Pending,
            (None | Some(false), Some(kind), None) => FetchPhase::Success(kind),
            (None | Some(false), None, Some(response)) => FetchPhase::Error(response),
            _ => {
                return Err(de::Error::custom(
                    "fetch state must carry exactly one of pending, success, error",
                ));
            },
        };
        Ok(Self {
            phase,
            source: wire.source,
            initiated_at: wire.initiated_at,
            completed_at: wire.completed_at,
        })
    }
}

/// Current phase of a named action
#[derive(Clone, Debug, PartialEq)]
pub enum ActionPhase {
    /// The action is in flight
    Pending,
    /// The action succeeded; holds its response, or `true` when there was none
    Success(Arc<Value>),
    /// The action failed with this response
    Error(Arc<Value>),
}

/// Lifecycle metadata of one named action on an entity
#[derive(Clone, Debug, PartialEq)]
pub struct ActionState {
    /// Current phase
    pub phase: ActionPhase,
    /// When the pending transition happened
    pub initiated_at: Option<DateTime<Utc>>,
    /// When the success or error transition happened
    pub completed_at: Option<DateTime<Utc>>,
}

impl ActionState {
    /// An action that started at `now`
    #[must_use]
    pub const fn pending(now: DateTime<Utc>) -> Self {
        Self {
            phase: ActionPhase::Pending,
            initiated_at: Some(now),
            completed_at: None,
        }
    }

    /// An action that succeeded at `now`
    #[must_use]
    pub fn succeeded(response: Option<Arc<Value>>, now: DateTime<Utc>) -> Self {
        Self {
            phase: ActionPhase::Success(response.unwrap_or_else(|| Arc::new(Value::Bool(true)))),
            initiated_at: None,
            completed_at: Some(now),
        }
    }

    /// An action that failed at `now`
    #[must_use]
    pub const fn failed(response: Arc<Value>, now: DateTime<Utc>) -> Self {
        Self {
            phase: ActionPhase::Error(response),
            initiated_at: None,
            completed_at: Some(now),
        }
    }

    /// Whether the action is in flight
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.phase, ActionPhase::Pending)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionStateWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    success: Option<Arc<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<Arc<Value>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    initiated_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    completed_at: Option<DateTime<Utc>>,
}

impl Serialize for ActionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (pending, success, error) = match &self.phase {
            ActionPhase::Pending => (Some(true), None, None),
            ActionPhase::Success(response) => (None, Some(Arc::clone(response)), None),
            ActionPhase::Error(response) => (None, None, Some(Arc::clone(response))),
        };
        ActionStateWire {
            pending,
            success,
            error,
            initiated_at: self.initiated_at,
            completed_at: self.completed_at,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ActionState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = ActionStateWire::deserialize(deserializer)?;
        let phase = match (wire.pending, wire.success, wire.error) {
            (Some(true), None, None) => ActionPhase::Pending,
            (None | Some(false), Some(response), None) => ActionPhase::Success(response),
            (None | Some(false), None, Some(response)) => ActionPhase::Error(response),
            _ => {
                return Err(de::Error::custom(
                    "action state must carry exactly one of pending, success, error",
                ));
            },
        };
        Ok(Self {
            phase,
            initiated_at: wire.initiated_at,
            completed_at: wire.completed_at,
        })
    }
}

/// Request and lifecycle metadata of one entity
///
/// A record exists for every `(domain, id)` an event has referenced, even after
/// all of its lifecycle fields have been cleared.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    /// Caller-attached metadata, updated with `DATA`/`SET_DATA` events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Arc<Map<String, Value>>>,
    /// Fetch lifecycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch: Option<FetchState>,
    /// Named actions, keyed by action id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, ActionState>,
    /// Fields this engine does not manage; carried through every update
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityMeta {
    /// Whether no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.fetch.is_none() && self.actions.is_empty() && self.extra.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
    }

    #[test]
    fn test_with_entity_keeps_untouched_references() {
        let tree = EntityTree::new()
            .with_entity("foo", "1", json!({"a": 1}))
            .with_entity("bar", "1", json!({"b": 2}));

        let next = tree.with_entity("foo", "2", json!({"c": 3}));

        assert!(!next.ptr_eq(&tree));
        assert!(Arc::ptr_eq(
            next.domain("bar").unwrap(),
            tree.domain("bar").unwrap()
        ));
        assert!(Arc::ptr_eq(
            next.entity("foo", "1").unwrap(),
            tree.entity("foo", "1").unwrap()
        ));
        assert!(tree.entity("foo", "2").is_none());
    }

    #[test]
    fn test_serializes_to_wire_shape() {
        let meta = EntityMeta {
            fetch: Some(FetchState::normalized(EntityRef::new("fooList", "l1"), at(12345))),
            ..EntityMeta::default()
        };
        let tree = EntityTree::new()
            .with_entity("foo", "1", json!({"foo": "bar"}))
            .with_meta("foo", "1", meta);

        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({
                "_meta": {"foo": {"1": {"fetch": {
                    "success": "normalized",
                    "source": {"entityType": "fooList", "id": "l1"},
                    "completedAt": 12345
                }}}},
                "foo": {"1": {"foo": "bar"}}
            })
        );
    }

    #[test]
    fn test_deserializes_wire_shape() {
        let tree: EntityTree = serde_json::from_value(json!({
            "_meta": {"foo": {"1": {
                "data": {"customMetaProp": "foo"},
                "actions": {"save": {"success": true, "completedAt": 5}},
                "fetched": true
            }}},
            "foo": {"1": {"foo": "abc"}}
        }))
        .unwrap();

        let meta = tree.meta("foo", "1").unwrap();
        assert_eq!(meta.data.as_deref(), json!({"customMetaProp": "foo"}).as_object());
        assert_eq!(
            meta.actions["save"],
            ActionState::succeeded(None, at(5))
        );
        assert_eq!(meta.extra.get("fetched"), Some(&json!(true)));
        assert_eq!(**tree.entity("foo", "1").unwrap(), json!({"foo": "abc"}));
    }

    #[test]
    fn test_rejects_conflicting_fetch_phases() {
        let result: Result<FetchState, _> =
            serde_json::from_value(json!({"pending": true, "success": "fetched"}));
        assert!(result.is_err());
    }
}
