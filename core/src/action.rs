//! Factory for single lifecycle events.
//!
//! [`ActionFactory`] stamps the domain's prefix onto events so callers never
//! assemble type names by hand.
//!
//! ```
//! use restful_rust_core::action::{ActionFactory, Lifecycle};
//! use restful_rust_core::event::EventKind;
//!
//! let users = ActionFactory::new("USER");
//! let pending = users.pending("octocat", Some("follow"));
//!
//! assert_eq!(pending.type_name(), "USER_ACTION_PENDING");
//! assert_eq!(Lifecycle::of(Some("follow")).pending_kind(), EventKind::ActionPending);
//! ```

use crate::event::{DataUpdate, EntityEvent, EventKind, EventPayload};
use crate::tree::EntityId;
use serde_json::Value;

/// Which metadata slot an operation reports into
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// `fetch`: the entity itself is being loaded
    Fetch,
    /// `actions[actionId]`: a named operation on the entity
    Action,
}

impl Lifecycle {
    /// `Action` when an action id is given, else `Fetch`
    #[must_use]
    pub const fn of(action_id: Option<&str>) -> Self {
        if action_id.is_some() {
            Self::Action
        } else {
            Self::Fetch
        }
    }

    /// Kind of the pending event
    #[must_use]
    pub const fn pending_kind(self) -> EventKind {
        match self {
            Self::Fetch => EventKind::FetchPending,
            Self::Action => EventKind::ActionPending,
        }
    }

    /// Kind of the success event
    #[must_use]
    pub const fn success_kind(self) -> EventKind {
        match self {
            Self::Fetch => EventKind::FetchSuccess,
            Self::Action => EventKind::ActionSuccess,
        }
    }

    /// Kind of the error event
    #[must_use]
    pub const fn error_kind(self) -> EventKind {
        match self {
            Self::Fetch => EventKind::FetchError,
            Self::Action => EventKind::ActionError,
        }
    }
}

/// Builds events for one action prefix
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionFactory {
    prefix: String,
}

impl ActionFactory {
    /// Factory for events with the given prefix
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The action prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Event of any kind with a prepared payload
    #[must_use]
    pub fn create(&self, kind: EventKind, payload: EventPayload) -> EntityEvent {
        EntityEvent::new(self.prefix.clone(), kind, payload)
    }

    /// `FETCH_PENDING`, or `ACTION_PENDING` when an action id is given
    #[must_use]
    pub fn pending(&self, id: impl Into<EntityId>, action_id: Option<&str>) -> EntityEvent {
        let lifecycle = Lifecycle::of(action_id);
        self.create(lifecycle.pending_kind(), with_action(EventPayload::for_id(id), action_id))
    }

    /// `FETCH_SUCCESS`, or `ACTION_SUCCESS` when an action id is given
    ///
    /// The action id is filled in from `action_id` when the payload lacks one.
    #[must_use]
    pub fn success(&self, action_id: Option<&str>, payload: EventPayload) -> EntityEvent {
        let lifecycle = Lifecycle::of(action_id);
        self.create(lifecycle.success_kind(), with_action(payload, action_id))
    }

    /// `FETCH_ERROR`, or `ACTION_ERROR` when an action id is given
    #[must_use]
    pub fn error(&self, id: impl Into<EntityId>, action_id: Option<&str>, response: Value) -> EntityEvent {
        let lifecycle = Lifecycle::of(action_id);
        self.create(
            lifecycle.error_kind(),
            with_action(EventPayload::for_id(id).with_response(response), action_id),
        )
    }

    /// `ACTION_CLEAR` for one action, or for all actions when no id is given
    #[must_use]
    pub fn clear(&self, id: impl Into<EntityId>, action_id: Option<&str>) -> EntityEvent {
        self.create(EventKind::ActionClear, with_action(EventPayload::for_id(id), action_id))
    }

    /// `SET`: write a value locally
    #[must_use]
    pub fn set(&self, id: impl Into<EntityId>, value: Value) -> EntityEvent {
        self.create(EventKind::Set, EventPayload::for_id(id).with_result(value))
    }

    /// `DATA`: merge or clear caller metadata
    #[must_use]
    pub fn data(&self, id: impl Into<EntityId>, update: DataUpdate) -> EntityEvent {
        self.create(EventKind::Data, EventPayload::for_id(id).with_data(update))
    }

    /// `SET_DATA`: merge or clear caller metadata
    #[must_use]
    pub fn set_data(&self, id: impl Into<EntityId>, update: DataUpdate) -> EntityEvent {
        self.create(EventKind::SetData, EventPayload::for_id(id).with_data(update))
    }

    /// `DELETE`: drop the local value and its fetch state
    #[must_use]
    pub fn delete(&self, id: impl Into<EntityId>) -> EntityEvent {
        self.create(EventKind::Delete, EventPayload::for_id(id))
    }
}

fn with_action(mut payload: EventPayload, action_id: Option<&str>) -> EventPayload {
    if payload.action_id.is_none() {
        payload.action_id = action_id.map(str::to_string);
    }
    payload
}
