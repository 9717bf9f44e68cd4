//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers:
//! - **`chain_reducers`**: Run multiple reducers against the same state, each one
//!   seeing the state the previous one produced
//! - **`scope_reducer`**: Focus a reducer on a subset of state and a subset of actions
//!
//! Several per-domain entity engines sharing one [`EntityTree`](crate::tree::EntityTree)
//! are assembled with [`chain_reducers`]; external concerns with their own state
//! (routing, session) are lifted in with [`scope_reducer`] first.
//!
//! # Examples
//!
//! ```
//! use restful_rust_core::composition::chain_reducers;
//! use restful_rust_core::config::EntityConfig;
//! use restful_rust_core::engine::EntityReducer;
//! use restful_rust_core::environment::EntityEnvironment;
//! use restful_rust_core::event::{EntityEvent, EventKind, EventPayload};
//! use restful_rust_core::reducer::Reducer;
//! use restful_rust_core::tree::EntityTree;
//!
//! # fn main() -> Result<(), restful_rust_core::error::ConfigError> {
//! let users = EntityReducer::new(EntityConfig::builder().action_prefix("USER").entity_type("user").build()?);
//! let repos = EntityReducer::new(EntityConfig::builder().action_prefix("REPO").entity_type("repo").build()?);
//! let root = chain_reducers(vec![Box::new(users), Box::new(repos)]);
//!
//! let mut tree = EntityTree::new();
//! let _ = root.reduce(
//!     &mut tree,
//!     EntityEvent::new("REPO", EventKind::FetchPending, EventPayload::for_id("r1")),
//!     &EntityEnvironment::default(),
//! );
//! assert!(tree.meta("repo", "r1").is_some());
//! assert!(tree.meta("user", "r1").is_none());
//! # Ok(())
//! # }
//! ```

use crate::effect::Effect;
use crate::reducer::Reducer;
use smallvec::{smallvec, SmallVec};

/// Chains multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in the given order against the running state, so the
/// output of one is the input of the next. The action is passed unchanged to
/// every reducer and all effects are concatenated.
///
/// When no reducer touches the state, the state is left exactly as it was:
/// chaining never introduces copies of its own.
#[must_use]
pub fn chain_reducers<S, A, E>(
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
) -> ChainedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    ChainedReducer { reducers }
}

/// A reducer that runs multiple reducers in sequence.
///
/// Created by [`chain_reducers`].
pub struct ChainedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
}

impl<S, A, E> ChainedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    /// Number of chained reducers
    #[must_use]
    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    /// Whether the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S, A, E> Reducer for ChainedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut all_effects = SmallVec::new();

        for reducer in &self.reducers {
            let effects = reducer.reduce(state, action.clone(), env);
            all_effects.extend(effects.into_iter().filter(|effect| !effect.is_none()));
        }

        if all_effects.is_empty() {
            all_effects.push(Effect::None);
        }
        all_effects
    }
}

/// Scopes a reducer to a subset of a larger state and action type.
///
/// Actions the `extract_action` function does not recognise are ignored and the
/// parent state is left untouched. Recognised actions run against a copy of the
/// sub-state, which is written back afterwards; effects are lifted back into the
/// parent action type with `embed_action`.
///
/// # Examples
///
/// ```
/// use restful_rust_core::composition::scope_reducer;
/// use restful_rust_core::config::EntityConfig;
/// use restful_rust_core::engine::EntityReducer;
/// use restful_rust_core::environment::EntityEnvironment;
/// use restful_rust_core::event::{EntityEvent, EventKind, EventPayload};
/// use restful_rust_core::reducer::Reducer;
/// use restful_rust_core::tree::EntityTree;
///
/// #[derive(Clone, Default)]
/// struct AppState {
///     entities: EntityTree,
///     path: String,
/// }
///
/// #[derive(Clone)]
/// enum AppAction {
///     Entity(EntityEvent),
///     Navigate(String),
/// }
///
/// # fn main() -> Result<(), restful_rust_core::error::ConfigError> {
/// let engine = EntityReducer::new(EntityConfig::builder().action_prefix("FOO").entity_type("foo").build()?);
/// let scoped = scope_reducer(
///     engine,
///     |app: &AppState| &app.entities,
///     |app: &mut AppState, tree: EntityTree| app.entities = tree,
///     |action: AppAction| match action {
///         AppAction::Entity(event) => Some(event),
///         AppAction::Navigate(_) => None,
///     },
///     AppAction::Entity,
/// );
///
/// let mut state = AppState::default();
/// let event = EntityEvent::new("FOO", EventKind::FetchPending, EventPayload::for_id("1"));
/// let _ = scoped.reduce(&mut state, AppAction::Entity(event), &EntityEnvironment::default());
/// assert!(state.entities.meta("foo", "1").is_some());
/// # Ok(())
/// # }
/// ```
pub fn scope_reducer<S, SubS, A, SubA, E, R>(
    reducer: R,
    get_state: fn(&S) -> &SubS,
    set_state: fn(&mut S, SubS),
    extract_action: fn(A) -> Option<SubA>,
    embed_action: fn(SubA) -> A,
) -> ScopedReducer<S, SubS, A, SubA, E, R>
where
    S: 'static,
    SubS: Clone + 'static,
    A: Send + 'static,
    SubA: Send + 'static,
    E: 'static,
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
{
    ScopedReducer {
        reducer,
        get_state,
        set_state,
        extract_action,
        embed_action,
        _phantom: std::marker::PhantomData,
    }
}

/// A scoped reducer that operates on a subset of state.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, SubS, A, SubA, E, R>
where
    S: 'static,
    SubS: Clone + 'static,
    A: Send + 'static,
    SubA: Send + 'static,
    E: 'static,
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
{
    reducer: R,
    get_state: fn(&S) -> &SubS,
    set_state: fn(&mut S, SubS),
    extract_action: fn(A) -> Option<SubA>,
    embed_action: fn(SubA) -> A,
    _phantom: std::marker::PhantomData<fn() -> E>,
}

impl<S, SubS, A, SubA, E, R> Reducer for ScopedReducer<S, SubS, A, SubA, E, R>
where
    S: 'static,
    SubS: Clone + 'static,
    A: Send + 'static,
    SubA: Send + 'static,
    E: 'static,
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let Some(sub_action) = (self.extract_action)(action) else {
            return smallvec![Effect::None];
        };

        let mut sub_state = (self.get_state)(state).clone();
        let effects = self.reducer.reduce(&mut sub_state, sub_action, env);
        (self.set_state)(state, sub_state);

        let embed = self.embed_action;
        effects.into_iter().map(|effect| effect.map(embed)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct TestState {
        counter: i32,
        name: String,
    }

    #[derive(Clone, Debug)]
    enum TestAction {
        Increment,
        SetName(String),
        Unknown,
    }

    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            if matches!(action, TestAction::Increment) {
                state.counter += 1;
            }
            smallvec![Effect::None]
        }
    }

    struct NameReducer;

    impl Reducer for NameReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            if let TestAction::SetName(name) = action {
                // Sees the counter written by the reducer before it
                state.name = format!("{name}#{}", state.counter);
            }
            smallvec![Effect::None]
        }
    }

    #[test]
    fn test_chain_reducers_feeds_output_forward() {
        let chained = chain_reducers(vec![Box::new(CounterReducer), Box::new(NameReducer)]);
        let mut state = TestState::default();

        let _ = chained.reduce(&mut state, TestAction::Increment, &());
        let _ = chained.reduce(&mut state, TestAction::SetName("Alice".to_string()), &());

        assert_eq!(state.counter, 1);
        assert_eq!(state.name, "Alice#1");
    }

    #[test]
    fn test_chain_reducers_unmatched_action_keeps_state() {
        let chained = chain_reducers(vec![Box::new(CounterReducer), Box::new(NameReducer)]);
        let mut state = TestState {
            counter: 3,
            name: "Bob".to_string(),
        };

        let effects = chained.reduce(&mut state, TestAction::Unknown, &());

        assert_eq!(
            state,
            TestState {
                counter: 3,
                name: "Bob".to_string()
            }
        );
        assert_eq!(effects.len(), 1);
        assert!(effects[0].is_none());
    }

    #[derive(Clone, Default)]
    struct ParentState {
        sub: TestState,
        other: String,
    }

    #[derive(Clone, Debug)]
    enum ParentAction {
        Child(TestAction),
        Other,
    }

    #[test]
    fn test_scope_reducer() {
        let scoped = scope_reducer(
            CounterReducer,
            |parent: &ParentState| &parent.sub,
            |parent: &mut ParentState, sub: TestState| parent.sub = sub,
            |action: ParentAction| match action {
                ParentAction::Child(child) => Some(child),
                ParentAction::Other => None,
            },
            ParentAction::Child,
        );

        let mut state = ParentState {
            sub: TestState::default(),
            other: "test".to_string(),
        };

        let _ = scoped.reduce(&mut state, ParentAction::Child(TestAction::Increment), &());
        assert_eq!(state.sub.counter, 1);
        assert_eq!(state.other, "test");

        let effects = scoped.reduce(&mut state, ParentAction::Other, &());
        assert_eq!(state.sub.counter, 1);
        assert!(effects[0].is_none());
    }
}
