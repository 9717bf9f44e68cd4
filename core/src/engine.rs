//! The state update engine.
//!
//! [`EntityReducer`] folds one [`EntityEvent`] into an [`EntityTree`] and hands
//! back the next tree. The input tree is never mutated: the roots are copied,
//! then only the containers on the written paths are copied on write. Events
//! addressed to another prefix, and malformed events, return a tree that is
//! [`ptr_eq`](EntityTree::ptr_eq) to the input.
//!
//! # Steps
//!
//! 1. Resolve the acting id (`result` when it is an id, else `id`).
//! 2. Run the `before_reduce` hook and detach the roots.
//! 3. Merge normalized `entities`; entities other than the acting one are
//!    recorded as `normalized` with the acting entity as their `source`.
//! 4. Write a `result` value for the acting entity on success-like events.
//! 5. Apply the dispatch row to the entity's metadata, then the `data` update.
//! 6. Remove the entity value when the row clears it (or a success carries `delete`).
//! 7. Invalidate the ancestor recorded as the entity's `source` (one hop).
//! 8. Run the `after_reduce` hook.

use crate::config::EntityConfig;
use crate::dispatch::{handler_for, ActionTemplate, FetchTemplate, Handler, ResponseProp};
use crate::effect::Effect;
use crate::environment::EntityEnvironment;
use crate::event::{Delta, EntityEvent, EventKind, EventPayload, NormalizedEntities};
use crate::reducer::Reducer;
use crate::tree::{ActionState, EntityId, EntityMeta, EntityRef, EntityTree, FetchState};
use chrono::{DateTime, Utc};
use serde_json::Value;
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;
use tracing::{debug, trace};

/// Reducer for one entity domain
#[derive(Clone, Debug)]
pub struct EntityReducer {
    config: Arc<EntityConfig>,
}

impl EntityReducer {
    /// Create an engine for a domain
    #[must_use]
    pub fn new(config: EntityConfig) -> Self {
        Self::from_shared(Arc::new(config))
    }

    /// Create an engine sharing its configuration with a composer
    #[must_use]
    pub const fn from_shared(config: Arc<EntityConfig>) -> Self {
        Self { config }
    }

    /// Configuration of this engine
    #[must_use]
    pub const fn config(&self) -> &Arc<EntityConfig> {
        &self.config
    }

    /// Whether an event is addressed to this engine
    #[must_use]
    pub fn handles(&self, event: &EntityEvent) -> bool {
        event.prefix == self.config.action_prefix()
    }

    /// Apply one event, returning the next tree.
    ///
    /// Never fails: events for another prefix, events without an acting id, and
    /// action events without an `actionId` return the input tree unchanged.
    #[must_use]
    pub fn apply(&self, tree: &EntityTree, event: &EntityEvent, now: DateTime<Utc>) -> EntityTree {
        if !self.handles(event) {
            return tree.clone();
        }
        let Some(handler) = handler_for(event.kind) else {
            return tree.clone();
        };

        let payload = &event.payload;
        let Some(id) = payload.acting_id() else {
            debug!(event = %event.type_name(), "Ignoring event without an entity id");
            return tree.clone();
        };
        if handler.is_action_scoped() && payload.action_id.is_none() {
            debug!(event = %event.type_name(), id = %id, "Ignoring action event without an actionId");
            return tree.clone();
        }

        let domain = self.config.entity_type();
        let mut next = match self.config.before_reduce() {
            Some(hook) => hook(tree, event),
            None => tree.clone(),
        };
        next.detach();

        let prior_source = next
            .meta(domain, &id)
            .and_then(|meta| meta.fetch.as_ref())
            .and_then(|fetch| fetch.source.clone());

        if let Some(entities) = &payload.entities {
            merge_entities(&mut next, entities, &EntityRef::new(domain, id.clone()), now);
        }

        next.ensure_domain(domain);
        let success_like = matches!(
            event.kind,
            EventKind::FetchSuccess | EventKind::ActionSuccess | EventKind::Set
        );
        if success_like {
            if let Some(value) = payload.result_entity() {
                next.domain_mut(domain).insert(id.clone(), Arc::new(value.clone()));
            }
        }

        let mut meta = next
            .meta(domain, &id)
            .map(|meta| (**meta).clone())
            .unwrap_or_default();
        apply_handler(&mut meta, handler, payload, now);
        if let Some(update) = &payload.data {
            meta.data = update.apply(meta.data.as_ref());
        }
        next.meta_domain_mut(domain).insert(id.clone(), Arc::new(meta));

        let removed_remotely = payload.delete && success_like;
        if (handler.clear_model || removed_remotely) && next.entity(domain, &id).is_some() {
            next.domain_mut(domain).remove(&id);
        }

        if self.config.bubble_up() && payload.bubble_up != Some(false) {
            if let Some(source) = prior_source {
                bubble_up(&mut next, &source);
            }
        }

        trace!(domain, id = %id, kind = %event.kind, "Applied entity event");

        match self.config.after_reduce() {
            Some(hook) => hook(&next, event),
            None => next,
        }
    }
}

impl Reducer for EntityReducer {
    type State = EntityTree;
    type Action = EntityEvent;
    type Environment = EntityEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let next = self.apply(state, &action, env.now());
        if !next.ptr_eq(state) {
            *state = next;
        }
        smallvec![Effect::None]
    }
}

/// Merge incoming entities domain by domain; new entries win.
fn merge_entities(
    tree: &mut EntityTree,
    entities: &NormalizedEntities,
    acting: &EntityRef,
    now: DateTime<Utc>,
) {
    for (entity_type, by_id) in entities {
        let target = tree.domain_mut(entity_type);
        for (id, value) in by_id {
            target.insert(id.clone(), Arc::new(value.clone()));
        }

        let introduced: Vec<&EntityId> = by_id
            .keys()
            .filter(|id| *entity_type != acting.entity_type || **id != acting.id)
            .collect();
        if introduced.is_empty() {
            continue;
        }

        let records = tree.meta_domain_mut(entity_type);
        for id in introduced {
            let mut meta = records.get(id).map(|meta| (**meta).clone()).unwrap_or_default();
            meta.fetch = Some(FetchState::normalized(acting.clone(), now));
            records.insert(id.clone(), Arc::new(meta));
        }
    }
}

fn apply_handler(meta: &mut EntityMeta, handler: &Handler, payload: &EventPayload, now: DateTime<Utc>) {
    let routed = |prop: ResponseProp| {
        (handler.response_prop == Some(prop))
            .then(|| payload.response.clone())
            .flatten()
            .map(Arc::new)
    };

    match handler.fetch {
        Some(Delta::Set(FetchTemplate::Pending)) => meta.fetch = Some(FetchState::pending(now)),
        Some(Delta::Set(FetchTemplate::Success(kind))) => {
            meta.fetch = Some(FetchState::succeeded(kind, now));
        },
        Some(Delta::Set(FetchTemplate::Error)) => {
            let response = routed(ResponseProp::FetchError).unwrap_or_else(|| Arc::new(Value::Null));
            meta.fetch = Some(FetchState::failed(response, now));
        },
        Some(Delta::Delete) => meta.fetch = None,
        None => {},
    }

    if handler.clear_actions {
        meta.actions.clear();
    }

    match (handler.action, payload.action_id.as_deref()) {
        (Some(Delta::Set(template)), Some(action_id)) => {
            let state = match template {
                ActionTemplate::Pending => ActionState::pending(now),
                ActionTemplate::Success => ActionState::succeeded(routed(ResponseProp::ActionSuccess), now),
                ActionTemplate::Error => ActionState::failed(
                    routed(ResponseProp::ActionError).unwrap_or_else(|| Arc::new(Value::Null)),
                    now,
                ),
            };
            meta.actions.insert(action_id.to_string(), state);
        },
        (Some(Delta::Delete), Some(action_id)) => {
            meta.actions.remove(action_id);
        },
        (Some(Delta::Delete), None) => meta.actions.clear(),
        (Some(Delta::Set(_)) | None, _) => {},
    }
}

/// Give the ancestor entity a fresh reference with the same contents.
fn bubble_up(tree: &mut EntityTree, source: &EntityRef) {
    let Some(ancestor) = tree.entity(&source.entity_type, &source.id).cloned() else {
        return;
    };
    debug!(
        entity_type = %source.entity_type,
        id = %source.id,
        "Invalidating ancestor entity"
    );
    tree.domain_mut(&source.entity_type)
        .insert(source.id.clone(), Arc::new((*ancestor).clone()));
}
