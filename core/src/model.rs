//! Read accessor over one entity.
//!
//! [`Model`] bundles an entity's value and metadata and answers the questions
//! a view asks before rendering: is it loading, did it fail, may it be fetched.
//!
//! ```
//! use restful_rust_core::model::Model;
//! use restful_rust_core::tree::EntityTree;
//! use serde_json::json;
//!
//! let tree = EntityTree::new().with_entity("user", "octocat", json!({"name": "The Octocat"}));
//! let model = Model::new(&tree, "user", "octocat");
//!
//! assert_eq!(model.value().and_then(|user| user["name"].as_str()), Some("The Octocat"));
//! assert!(!model.can_be_fetched());
//! assert!(Model::new(&tree, "user", "hubot").can_be_fetched());
//! ```

use crate::tree::{ActionPhase, ActionState, EntityMeta, EntityRef, EntityTree, FetchPhase, SuccessKind};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Read-only view of `(domain, id)` in a tree
#[derive(Clone, Copy, Debug)]
pub struct Model<'a> {
    id: &'a str,
    value: Option<&'a Arc<Value>>,
    meta: Option<&'a Arc<EntityMeta>>,
}

impl<'a> Model<'a> {
    /// Accessor for `(domain, id)`
    #[must_use]
    pub fn new(tree: &'a EntityTree, domain: &str, id: &'a str) -> Self {
        Self {
            id,
            value: tree.entity(domain, id),
            meta: tree.meta(domain, id),
        }
    }

    /// Entity id
    #[must_use]
    pub const fn id(&self) -> &'a str {
        self.id
    }

    /// Entity value, if present
    #[must_use]
    pub fn value(&self) -> Option<&'a Value> {
        self.value.map(|value| &**value)
    }

    /// Shared handle of the value, for identity comparisons
    #[must_use]
    pub const fn value_ref(&self) -> Option<&'a Arc<Value>> {
        self.value
    }

    /// Metadata record, if the entity was ever referenced
    #[must_use]
    pub fn meta(&self) -> Option<&'a EntityMeta> {
        self.meta.map(|meta| &**meta)
    }

    /// Caller metadata
    #[must_use]
    pub fn data(&self) -> Option<&'a Map<String, Value>> {
        self.meta()?.data.as_deref()
    }

    /// Whether a fetch is in flight
    #[must_use]
    pub fn is_fetch_pending(&self) -> bool {
        self.fetch_phase()
            .is_some_and(|phase| matches!(phase, FetchPhase::Pending))
    }

    /// How the value got here, if a fetch (or local set) succeeded
    #[must_use]
    pub fn was_fetched(&self) -> Option<SuccessKind> {
        match self.fetch_phase()? {
            FetchPhase::Success(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Error response of the last fetch
    #[must_use]
    pub fn fetch_error(&self) -> Option<&'a Value> {
        match self.fetch_phase()? {
            FetchPhase::Error(response) => Some(response.as_ref()),
            _ => None,
        }
    }

    /// Outer fetch that introduced this entity
    #[must_use]
    pub fn fetch_source(&self) -> Option<&'a EntityRef> {
        self.meta()?.fetch.as_ref()?.source.as_ref()
    }

    /// State of a named action
    #[must_use]
    pub fn action(&self, action_id: &str) -> Option<&'a ActionState> {
        self.meta()?.actions.get(action_id)
    }

    /// Whether a named action is in flight
    #[must_use]
    pub fn is_action_pending(&self, action_id: &str) -> bool {
        self.action(action_id).is_some_and(ActionState::is_pending)
    }

    /// Success response of a named action (`true` when it had none)
    #[must_use]
    pub fn action_success(&self, action_id: &str) -> Option<&'a Value> {
        match &self.action(action_id)?.phase {
            ActionPhase::Success(response) => Some(response.as_ref()),
            _ => None,
        }
    }

    /// Error response of a named action
    #[must_use]
    pub fn action_error(&self, action_id: &str) -> Option<&'a Value> {
        match &self.action(action_id)?.phase {
            ActionPhase::Error(response) => Some(response.as_ref()),
            _ => None,
        }
    }

    /// Whether starting a fetch makes sense: no value, not loading, not failed
    #[must_use]
    pub fn can_be_fetched(&self) -> bool {
        self.value.is_none() && !self.is_fetch_pending() && self.fetch_error().is_none()
    }

    fn fetch_phase(&self) -> Option<&'a FetchPhase> {
        Some(&self.meta()?.fetch.as_ref()?.phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FetchState;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_pending_and_failed_entities_are_not_fetchable() {
        let pending = EntityMeta {
            fetch: Some(FetchState::pending(Utc::now())),
            ..EntityMeta::default()
        };
        let failed = EntityMeta {
            fetch: Some(FetchState::failed(Arc::new(json!({"status": 404})), Utc::now())),
            ..EntityMeta::default()
        };
        let tree = EntityTree::new()
            .with_meta("user", "a", pending)
            .with_meta("user", "b", failed);

        let a = Model::new(&tree, "user", "a");
        assert!(a.is_fetch_pending());
        assert!(!a.can_be_fetched());

        let b = Model::new(&tree, "user", "b");
        assert_eq!(b.fetch_error(), Some(&json!({"status": 404})));
        assert!(!b.can_be_fetched());
    }

    #[test]
    fn test_action_accessors() {
        let mut meta = EntityMeta::default();
        meta.actions.insert("follow".to_string(), ActionState::pending(Utc::now()));
        meta.actions.insert(
            "star".to_string(),
            ActionState::succeeded(None, Utc::now()),
        );
        let tree = EntityTree::new()
            .with_entity("user", "a", json!({}))
            .with_meta("user", "a", meta);

        let model = Model::new(&tree, "user", "a");
        assert!(model.is_action_pending("follow"));
        assert_eq!(model.action_success("star"), Some(&json!(true)));
        assert_eq!(model.action_error("star"), None);
        assert!(model.action("unknown").is_none());
        assert!(model.data().is_none());
    }
}
