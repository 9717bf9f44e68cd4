//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use restful_rust_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Actions given with [`when_action`](Self::when_action) are reduced in order;
/// state assertions see the final state, effect assertions see the effects of
/// the last action.
///
/// # Example
///
/// ```ignore
/// use restful_rust_testing::{ReducerTest, test_environment};
///
/// ReducerTest::new(users_engine())
///     .with_env(test_environment())
///     .given_state(EntityTree::new())
///     .when_action(users.pending("octocat", None))
///     .then_state(|tree| {
///         assert!(Model::new(tree, "user", "octocat").is_fetch_pending());
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to reduce (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the effects of the last action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let mut effects = Vec::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action, &env).into_vec();
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use restful_rust_core::effect::{Effect, EffectId};

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| contains(e, &|e| matches!(e, Effect::Future(_)))),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Assert that effects contain at least one Stream effect
    ///
    /// # Panics
    ///
    /// Panics if no Stream effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_stream_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| contains(e, &|e| matches!(e, Effect::Stream(_)))),
            "Expected at least one Stream effect, but none found"
        );
    }

    /// Assert that effects cancel whatever runs under `id`
    ///
    /// # Panics
    ///
    /// Panics if no `Cancel(id)` is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_cancels<A>(effects: &[Effect<A>], id: &EffectId) {
        assert!(
            effects
                .iter()
                .any(|e| contains(e, &|e| matches!(e, Effect::Cancel(cancelled) if cancelled == id))),
            "Expected Effect::Cancel({id}), but none found"
        );
    }

    /// Assert that effects schedule a cancellable effect under `id`
    ///
    /// # Panics
    ///
    /// Panics if no `Cancellable { id, .. }` is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_schedules<A>(effects: &[Effect<A>], id: &EffectId) {
        assert!(
            effects.iter().any(|e| contains(
                e,
                &|e| matches!(e, Effect::Cancellable { id: registered, .. } if registered == id)
            )),
            "Expected Effect::Cancellable under {id}, but none found"
        );
    }

    /// Whether `effect` or any effect nested in it satisfies `predicate`
    fn contains<A>(effect: &Effect<A>, predicate: &dyn Fn(&Effect<A>) -> bool) -> bool {
        if predicate(effect) {
            return true;
        }
        match effect {
            Effect::Parallel(effects) | Effect::Sequential(effects) => {
                effects.iter().any(|e| contains(e, predicate))
            },
            Effect::Cancellable { effect, .. } => contains(effect, predicate),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::test_environment;
    use restful_rust_core::action::ActionFactory;
    use restful_rust_core::config::EntityConfig;
    use restful_rust_core::effect::EffectId;
    use restful_rust_core::engine::EntityReducer;
    use restful_rust_core::model::Model;
    use restful_rust_core::operation::{Operation, OperationComposer};
    use restful_rust_core::tree::{EntityTree, SuccessKind};
    use serde_json::json;
    use std::sync::Arc;

    fn config() -> Arc<EntityConfig> {
        Arc::new(
            EntityConfig::builder()
                .action_prefix("USER")
                .entity_type("user")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_pending_then_success() {
        let users = ActionFactory::new("USER");

        ReducerTest::new(EntityReducer::from_shared(config()))
            .with_env(test_environment())
            .given_state(EntityTree::new())
            .when_action(users.pending("octocat", None))
            .when_action(users.set("octocat", json!({"login": "octocat"})))
            .then_state(|tree| {
                let model = Model::new(tree, "user", "octocat");
                assert_eq!(model.was_fetched(), Some(SuccessKind::Set));
                assert!(!model.is_fetch_pending());
            })
            .then_effects(|effects| {
                assertions::assert_no_effects(effects);
                assertions::assert_effects_count(effects, 1);
            })
            .run();
    }

    #[test]
    fn test_unmatched_event_keeps_state() {
        ReducerTest::new(EntityReducer::from_shared(config()))
            .with_env(test_environment())
            .given_state(EntityTree::new().with_entity("user", "a", json!({})))
            .when_action(ActionFactory::new("REPO").delete("a"))
            .then_state(|tree| {
                assert!(tree.entity("user", "a").is_some());
            })
            .run();
    }

    #[test]
    fn test_operation_effect_assertions() {
        let composer = OperationComposer::new(config());
        let operation: Operation = Operation::post("octocat", "/user/following/octocat")
            .with_action_id("follow")
            .clear_after(std::time::Duration::from_secs(3));
        let effect = composer
            .compose(operation)
            .into_effect(Arc::new(crate::MockTransport::new()));
        let effects = [effect];
        let id = EffectId::new("USER:octocat:follow");

        assertions::assert_cancels(&effects, &id);
        assertions::assert_schedules(&effects, &id);
        assertions::assert_has_future_effect(&effects);
        assertions::assert_has_stream_effect(&effects);
    }
}
