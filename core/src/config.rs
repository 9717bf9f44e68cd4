//! Engine configuration.
//!
//! One [`EntityConfig`] describes one domain: the action prefix its events
//! carry, the domain name in the tree, and the optional hooks. The same config
//! drives both the [`EntityReducer`](crate::engine::EntityReducer) and the
//! [`OperationComposer`](crate::operation::OperationComposer) for that domain.

use crate::error::ConfigError;
use crate::event::{EntityEvent, EventKind, EventPayload};
use crate::normalize::Normalizer;
use crate::tree::EntityTree;
use std::fmt;
use std::sync::Arc;

/// Pure transform over `(state, event)` run before or after an update
///
/// Hooks must not mutate shared containers; they return a new tree built from
/// the one they receive.
pub type ReduceHook = Arc<dyn Fn(&EntityTree, &EntityEvent) -> EntityTree + Send + Sync>;

/// Configuration of one entity domain
#[derive(Clone)]
pub struct EntityConfig {
    action_prefix: String,
    entity_type: String,
    bubble_up: bool,
    before_reduce: Option<ReduceHook>,
    after_reduce: Option<ReduceHook>,
    normalizer: Option<Arc<dyn Normalizer>>,
    debug: bool,
}

impl EntityConfig {
    /// Start building a configuration
    #[must_use]
    pub fn builder() -> EntityConfigBuilder {
        EntityConfigBuilder::default()
    }

    /// Prefix of every event type this domain handles
    #[must_use]
    pub fn action_prefix(&self) -> &str {
        &self.action_prefix
    }

    /// Domain name in the entity tree
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Whether ancestor invalidation is enabled
    #[must_use]
    pub const fn bubble_up(&self) -> bool {
        self.bubble_up
    }

    /// Hook run before every handled event
    #[must_use]
    pub const fn before_reduce(&self) -> Option<&ReduceHook> {
        self.before_reduce.as_ref()
    }

    /// Hook run after every handled event
    #[must_use]
    pub const fn after_reduce(&self) -> Option<&ReduceHook> {
        self.after_reduce.as_ref()
    }

    /// Custom schema normalizer
    #[must_use]
    pub fn normalizer(&self) -> Option<&Arc<dyn Normalizer>> {
        self.normalizer.as_ref()
    }

    /// Whether composed operations are logged at debug level
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.debug
    }
}

impl fmt::Debug for EntityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityConfig")
            .field("action_prefix", &self.action_prefix)
            .field("entity_type", &self.entity_type)
            .field("bubble_up", &self.bubble_up)
            .field("before_reduce", &self.before_reduce.is_some())
            .field("after_reduce", &self.after_reduce.is_some())
            .field("normalizer", &self.normalizer.is_some())
            .field("debug", &self.debug)
            .finish()
    }
}

/// Builder for [`EntityConfig`]
#[derive(Default)]
pub struct EntityConfigBuilder {
    action_prefix: Option<String>,
    entity_type: Option<String>,
    bubble_up: Option<bool>,
    before_reduce: Option<ReduceHook>,
    after_reduce: Option<ReduceHook>,
    normalizer: Option<Arc<dyn Normalizer>>,
    debug: bool,
}

impl EntityConfigBuilder {
    /// Prefix of every event type this domain handles (required)
    #[must_use]
    pub fn action_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.action_prefix = Some(prefix.into());
        self
    }

    /// Domain name in the entity tree (required)
    #[must_use]
    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Enable or disable ancestor invalidation (default: enabled)
    #[must_use]
    pub const fn bubble_up(mut self, enabled: bool) -> Self {
        self.bubble_up = Some(enabled);
        self
    }

    /// Transform the incoming state before each handled event
    #[must_use]
    pub fn before_reduce<F>(mut self, hook: F) -> Self
    where
        F: Fn(&EntityTree, &EntityEvent) -> EntityTree + Send + Sync + 'static,
    {
        self.before_reduce = Some(Arc::new(hook));
        self
    }

    /// Transform the outgoing state after each handled event
    #[must_use]
    pub fn after_reduce<F>(mut self, hook: F) -> Self
    where
        F: Fn(&EntityTree, &EntityEvent) -> EntityTree + Send + Sync + 'static,
    {
        self.after_reduce = Some(Arc::new(hook));
        self
    }

    /// Normalizer used by operations that carry a schema
    #[must_use]
    pub fn normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Log composed operations and their outcomes at debug level
    #[must_use]
    pub const fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingOption`] when `action_prefix` or
    /// `entity_type` is missing or empty, and
    /// [`ConfigError::AmbiguousPrefix`] when an event type name built from
    /// `action_prefix` would parse back under a different prefix.
    pub fn build(self) -> Result<EntityConfig, ConfigError> {
        let action_prefix = self
            .action_prefix
            .filter(|prefix| !prefix.is_empty())
            .ok_or(ConfigError::MissingOption("actionPrefix"))?;
        if !round_trips(&action_prefix) {
            return Err(ConfigError::AmbiguousPrefix(action_prefix));
        }
        let entity_type = self
            .entity_type
            .filter(|entity_type| !entity_type.is_empty())
            .ok_or(ConfigError::MissingOption("entityType"))?;

        Ok(EntityConfig {
            action_prefix,
            entity_type,
            bubble_up: self.bubble_up.unwrap_or(true),
            before_reduce: self.before_reduce,
            after_reduce: self.after_reduce,
            normalizer: self.normalizer,
            debug: self.debug,
        })
    }
}

/// Every `{prefix}_{SUFFIX}` parses back to `prefix`
fn round_trips(prefix: &str) -> bool {
    EventKind::ALL.into_iter().all(|kind| {
        let event = EntityEvent::new(prefix, kind, EventPayload::default());
        EntityEvent::parse(&event.type_name(), EventPayload::default())
            .is_some_and(|parsed| parsed.prefix == prefix && parsed.kind == kind)
    })
}
