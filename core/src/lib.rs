//! # Restful Rust Core
//!
//! Core traits and types for a normalized, domain-partitioned entity store
//! driven by remote request lifecycles.
//!
//! The crate is organised around the Reducer pattern: lifecycle events are
//! folded into an immutable [`tree::EntityTree`] by the
//! [`engine::EntityReducer`], and a single "perform a remote operation" intent
//! is turned into the pending/success/error event sequence by the
//! [`operation::OperationComposer`].
//!
//! ## Core Concepts
//!
//! - **Entity tree**: per-domain entity maps plus per-entity request metadata (`_meta`)
//! - **Event**: `{PREFIX}_{SUFFIX}` lifecycle step with a typed payload
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Transport**: The external collaborator that performs network I/O
//!
//! ## Example
//!
//! ```
//! use restful_rust_core::config::EntityConfig;
//! use restful_rust_core::engine::EntityReducer;
//! use restful_rust_core::event::{EntityEvent, EventKind, EventPayload};
//! use restful_rust_core::tree::EntityTree;
//! use chrono::Utc;
//!
//! # fn main() -> Result<(), restful_rust_core::error::ConfigError> {
//! let config = EntityConfig::builder()
//!     .action_prefix("FOO")
//!     .entity_type("foo")
//!     .build()?;
//! let engine = EntityReducer::new(config);
//!
//! let tree = EntityTree::new();
//! let event = EntityEvent::new("FOO", EventKind::FetchPending, EventPayload::for_id("1"));
//! let next = engine.apply(&tree, &event, Utc::now());
//!
//! assert!(next.meta("foo", "1").is_some());
//! # Ok(())
//! # }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// Factory for single lifecycle events
pub mod action;

/// Reducer composition utilities
pub mod composition;

/// Engine and composer configuration
pub mod config;

/// Event dispatch table
pub mod dispatch;

/// State update engine
pub mod engine;

/// Error types
pub mod error;

/// Lifecycle events and payloads
pub mod event;

/// Read accessor over one entity
pub mod model;

/// Response normalization
pub mod normalize;

/// Async operation composer
pub mod operation;

/// Entity tree and per-entity metadata
pub mod tree;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for RouteReducer {
    ///     type State = RouteState;
    ///     type Action = RouteAction;
    ///     type Environment = EntityEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut RouteState,
    ///         action: RouteAction,
    ///         env: &EntityEnvironment,
    ///     ) -> SmallVec<[Effect<RouteAction>; 4]> {
    ///         match action {
    ///             RouteAction::Navigate(path) => {
    ///                 state.path = path;
    ///                 smallvec![Effect::None]
    ///             }
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// Effects to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }

    /// Shared reducers, so a non-`Clone` root (e.g. a chain) can back a store
    impl<R> Reducer for std::sync::Arc<R>
    where
        R: Reducer + ?Sized,
    {
        type State = R::State;
        type Action = R::Action;
        type Environment = R::Environment;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            (**self).reduce(state, action, env)
        }
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable and cancellable.
pub mod effect {
    use futures::{Stream, StreamExt};
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;

    /// Identifier for a cancellable effect
    ///
    /// Scheduling a new [`Effect::Cancellable`] under an id that is still
    /// running aborts the older one.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct EffectId(String);

    impl EffectId {
        /// Create an effect id
        #[must_use]
        pub fn new(id: impl Into<String>) -> Self {
            Self(id.into())
        }

        /// The id as a string slice
        #[must_use]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for EffectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Delayed action (for timeouts such as auto-clear)
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Async computation producing any number of actions, fed back in order
        Stream(Pin<Box<dyn Stream<Item = Action> + Send>>),

        /// Effect that can be aborted by id
        Cancellable {
            /// Cancellation key
            id: EffectId,
            /// Effect to run under the key
            effect: Box<Effect<Action>>,
        },

        /// Abort the running effect registered under an id, if any
        Cancel(EffectId),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> fmt::Debug for Effect<Action>
    where
        Action: fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Stream(_) => write!(f, "Effect::Stream(<stream>)"),
                Effect::Cancellable { id, effect } => f
                    .debug_struct("Effect::Cancellable")
                    .field("id", id)
                    .field("effect", effect)
                    .finish(),
                Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Whether this effect does nothing
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }

    impl<Action: Send + 'static> Effect<Action> {
        /// Lift an effect into another action type
        ///
        /// Every action the effect would produce is passed through `f`.
        #[must_use]
        pub fn map<B, F>(self, f: F) -> Effect<B>
        where
            B: Send + 'static,
            F: Fn(Action) -> B + Send + Sync + 'static,
        {
            self.map_shared(Arc::new(f))
        }

        fn map_shared<B>(self, f: Arc<dyn Fn(Action) -> B + Send + Sync>) -> Effect<B>
        where
            B: Send + 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Parallel(effects) => Effect::Parallel(
                    effects
                        .into_iter()
                        .map(|effect| effect.map_shared(Arc::clone(&f)))
                        .collect(),
                ),
                Effect::Sequential(effects) => Effect::Sequential(
                    effects
                        .into_iter()
                        .map(|effect| effect.map_shared(Arc::clone(&f)))
                        .collect(),
                ),
                Effect::Delay { duration, action } => Effect::Delay {
                    duration,
                    action: Box::new(f(*action)),
                },
                Effect::Future(fut) => Effect::Future(Box::pin(async move { fut.await.map(|a| f(a)) })),
                Effect::Stream(stream) => Effect::Stream(Box::pin(stream.map(move |a| f(a)))),
                Effect::Cancellable { id, effect } => Effect::Cancellable {
                    id,
                    effect: Box::new(effect.map_shared(f)),
                },
                Effect::Cancel(id) => Effect::Cancel(id),
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use crate::operation::Transport;
    use chrono::{DateTime, Utc};
    use std::fmt;
    use std::sync::Arc;

    /// Clock trait - abstracts time operations for testability
    ///
    /// Lifecycle timestamps (`initiatedAt`, `completedAt`) are read from the
    /// environment clock, never from the system directly.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Environment shared by entity reducers
    #[derive(Clone)]
    pub struct EntityEnvironment {
        /// Clock used for lifecycle timestamps
        pub clock: Arc<dyn Clock>,
        /// Transport used by reducers that start remote operations
        pub transport: Option<Arc<dyn Transport>>,
    }

    impl EntityEnvironment {
        /// Create an environment with the given clock and no transport
        #[must_use]
        pub fn new(clock: Arc<dyn Clock>) -> Self {
            Self {
                clock,
                transport: None,
            }
        }

        /// Attach a transport
        #[must_use]
        pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
            self.transport = Some(transport);
            self
        }

        /// Current time according to the environment clock
        #[must_use]
        pub fn now(&self) -> DateTime<Utc> {
            self.clock.now()
        }
    }

    impl Default for EntityEnvironment {
        fn default() -> Self {
            Self::new(Arc::new(SystemClock))
        }
    }

    impl fmt::Debug for EntityEnvironment {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("EntityEnvironment")
                .field("has_transport", &self.transport.is_some())
                .finish_non_exhaustive()
        }
    }
}
