//! # Restful Rust Runtime
//!
//! Runtime for entity reducers.
//!
//! This crate provides the [`Store`] that owns the state, runs the reducer
//! and executes the effects it returns, including remote operations composed
//! by [`OperationComposer`](restful_rust_core::operation::OperationComposer).
//!
//! ## Core Components
//!
//! - **Store**: The runtime that manages state and executes effects
//! - **Effect Executor**: Executes effect descriptions and feeds actions back to reducers
//! - **Cancellation registry**: Aborts scheduled effects (auto-clear timers) by id
//!
//! ## Example
//!
//! ```ignore
//! use restful_rust_runtime::Store;
//!
//! let store = Store::new(EntityTree::new(), engine, EntityEnvironment::default());
//!
//! let composed = composer.compose(Operation::fetch("octocat", "/users/octocat"));
//! store.perform(composed, &transport).await?;
//!
//! let loaded = store.state(|tree| tree.entity("user", "octocat").is_some()).await;
//! ```

use restful_rust_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use restful_rust_core::error::OperationError;
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for an action or for effects to finish
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        ///
        /// The action broadcast channel was closed, typically because the
        /// store is shutting down.
        #[error("Action broadcast channel closed")]
        ChannelClosed,

        /// A remote operation's outcome could not be turned into events
        ///
        /// The pending event was dispatched; the outcome was not.
        #[error("Operation failed: {0}")]
        Operation(#[from] OperationError),
    }
}

pub use error::StoreError;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects of one
/// action to complete. Actions fed back by those effects are tracked by their
/// own handles.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(event).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    /// Create a handle and the tracking context its effects report to
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };
        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (handle, _tracking) = Self::new();
        handle
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires before all
    /// effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: counter shared between an [`EffectHandle`] and its effects
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    /// Increment the effect counter (effect started)
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the effect counter (effect completed)
    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Ensures the effect counter is always decremented, even if the effect
/// panics or is aborted.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Registry of running [`Effect::Cancellable`] tasks, keyed by effect id
mod cancellation {
    use restful_rust_core::effect::EffectId;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use tokio::task::AbortHandle;

    struct Registration {
        generation: u64,
        handle: AbortHandle,
    }

    #[derive(Default)]
    pub(crate) struct CancellationRegistry {
        next_generation: AtomicU64,
        tasks: Mutex<HashMap<EffectId, Registration>>,
    }

    impl CancellationRegistry {
        /// Register a task; returns its generation and the task it superseded
        pub(crate) fn register(&self, id: EffectId, handle: AbortHandle) -> (u64, Option<AbortHandle>) {
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            let previous = self.lock().insert(id, Registration { generation, handle });
            (generation, previous.map(|registration| registration.handle))
        }

        /// Forget a finished task, unless a newer one took its id
        pub(crate) fn release(&self, id: &EffectId, generation: u64) {
            let mut tasks = self.lock();
            if tasks
                .get(id)
                .is_some_and(|registration| registration.generation == generation)
            {
                tasks.remove(id);
            }
        }

        pub(crate) fn take(&self, id: &EffectId) -> Option<AbortHandle> {
            self.lock().remove(id).map(|registration| registration.handle)
        }

        pub(crate) fn len(&self) -> usize {
            self.lock().len()
        }

        fn lock(&self) -> MutexGuard<'_, HashMap<EffectId, Registration>> {
            // Entries stay consistent even if a holder panicked
            self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::cancellation::CancellationRegistry;
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DecrementGuard, Duration, Effect,
        EffectHandle, Ordering, Reducer, RwLock, StoreError,
    };
    use crate::metrics::StoreMetrics;
    use futures::StreamExt;
    use restful_rust_core::effect::EffectId;
    use restful_rust_core::event::EntityEvent;
    use restful_rust_core::operation::{ComposedOperation, ScheduledClear, Transport};
    use std::future::Future;
    use std::pin::Pin;
    use tokio::sync::broadcast;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop and cancellation by id)
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        cancellations: Arc<CancellationRegistry>,
        /// Action broadcast channel for observing actions produced by effects
        /// and remote operations.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// The action broadcast capacity is 16; use
        /// [`with_broadcast_capacity`](Self::with_broadcast_capacity) for
        /// many slow observers.
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(initial_state, reducer, environment, 16)
        }

        /// Create a new Store with custom action broadcast capacity
        ///
        /// # Arguments
        ///
        /// - `initial_state`: The starting state for the store
        /// - `reducer`: The reducer implementation (business logic)
        /// - `environment`: Injected dependencies
        /// - `capacity`: Action broadcast channel capacity (number of actions buffered)
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity);

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                cancellations: Arc::new(CancellationRegistry::default()),
                action_broadcast,
            }
        }

        /// Initiate graceful shutdown of the store
        ///
        /// Sets the shutdown flag (rejecting new actions) and waits for
        /// running effects, including scheduled auto-clears, to finish.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            let start = tokio::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);
                StoreMetrics::record_pending(pending);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_effects = pending,
                        "Shutdown timeout: {} effects still running", pending
                    );
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tracing::debug!(
                    pending_effects = pending,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Waiting for effects to complete"
                );

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Starts the returned effects in spawned tasks
        ///
        /// `send()` returns once the state is updated and the effects are
        /// started, not when they complete. Use the returned [`EffectHandle`]
        /// to wait for them.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        ///
        /// # Panics
        ///
        /// If the reducer panics, the panic will propagate.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                StoreMetrics::record_rejected();
                return Err(StoreError::ShutdownInProgress);
            }

            let effects = {
                let mut state = self.state.write().await;
                tracing::trace!("Acquired write lock on state");

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                StoreMetrics::record_command(start.elapsed(), effects.len());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            Ok(self.execute_effects(effects))
        }

        /// Send an action and wait for a matching result action
        ///
        /// Subscribes to the action broadcast before sending, so an action
        /// produced immediately by the effects is not missed.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: Timeout expired before matching action received
        /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            let rx = self.action_broadcast.subscribe();
            self.send(action).await?;
            wait_for(rx, predicate, timeout).await
        }

        /// Subscribe to all actions produced by effects and operations
        ///
        /// Actions sent directly through [`send`](Self::send) are not
        /// broadcast. A receiver that lags skips old actions and receives
        /// [`RecvError::Lagged`](broadcast::error::RecvError::Lagged).
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let loaded = store.state(|tree| tree.entity("user", "octocat").cloned()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Abort the cancellable effect registered under `id`
        ///
        /// Returns whether an effect was running under the id.
        pub fn cancel(&self, id: &EffectId) -> bool {
            match self.cancellations.take(id) {
                Some(handle) => {
                    handle.abort();
                    StoreMetrics::record_timer_cancelled();
                    tracing::warn!(effect_id = %id, "Cancelled scheduled effect");
                    true
                },
                None => {
                    tracing::trace!(effect_id = %id, "No scheduled effect to cancel");
                    false
                },
            }
        }

        /// Number of cancellable effects currently registered
        #[must_use]
        pub fn scheduled_effects(&self) -> usize {
            self.cancellations.len()
        }

        /// Start effects in spawned tasks, tracked by one handle
        fn execute_effects(&self, effects: impl IntoIterator<Item = Effect<A>>) -> EffectHandle {
            let (handle, tracking) = EffectHandle::new();

            for effect in effects {
                if effect.is_none() {
                    tracing::trace!("Executing Effect::None (no-op)");
                    StoreMetrics::record_effect("none");
                    continue;
                }

                tracking.increment();
                let guard = DecrementGuard(tracking.clone());

                // Track global pending effects for shutdown
                self.pending_effects.fetch_add(1, Ordering::SeqCst);
                let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

                let store = self.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    let _pending_guard = pending_guard;
                    store.run(effect).await;
                });
            }

            handle
        }

        /// Run one effect to completion
        ///
        /// Produced actions are broadcast and fed back through
        /// [`send`](Self::send) in the order they are produced. A
        /// `Cancellable` runs in its own task so [`cancel`](Self::cancel) can
        /// abort it; whatever encloses it continues once it ends.
        #[allow(clippy::too_many_lines)]
        fn run(&self, effect: Effect<A>) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async move {
                match effect {
                    Effect::None => {
                        StoreMetrics::record_effect("none");
                    },
                    Effect::Future(fut) => {
                        tracing::trace!("Executing Effect::Future");
                        StoreMetrics::record_effect("future");

                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            self.feed_back(action).await;
                        } else {
                            tracing::trace!("Effect::Future completed with no action");
                        }
                    },
                    Effect::Delay { duration, action } => {
                        tracing::trace!("Executing Effect::Delay (duration: {:?})", duration);
                        StoreMetrics::record_effect("delay");

                        tokio::time::sleep(duration).await;
                        tracing::trace!("Effect::Delay completed, sending action");
                        self.feed_back(*action).await;
                    },
                    Effect::Stream(mut stream) => {
                        tracing::trace!("Executing Effect::Stream");
                        StoreMetrics::record_effect("stream");

                        let mut produced = 0_usize;
                        while let Some(action) = stream.next().await {
                            produced += 1;
                            self.feed_back(action).await;
                        }
                        tracing::trace!(produced, "Effect::Stream completed");
                    },
                    Effect::Parallel(effects) => {
                        tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                        StoreMetrics::record_effect("parallel");

                        futures::future::join_all(effects.into_iter().map(|effect| self.run(effect)))
                            .await;
                    },
                    Effect::Sequential(effects) => {
                        let effect_count = effects.len();
                        tracing::trace!("Executing Effect::Sequential with {} effects", effect_count);
                        StoreMetrics::record_effect("sequential");

                        for (idx, effect) in effects.into_iter().enumerate() {
                            tracing::trace!(
                                "Executing sequential effect {} of {}",
                                idx + 1,
                                effect_count
                            );
                            self.run(effect).await;
                        }
                        tracing::trace!("Effect::Sequential completed");
                    },
                    Effect::Cancellable { id, effect } => {
                        tracing::trace!(effect_id = %id, "Executing Effect::Cancellable");
                        StoreMetrics::record_effect("cancellable");

                        let store = self.clone();
                        let task = tokio::spawn(async move { store.run(*effect).await });

                        let (generation, superseded) =
                            self.cancellations.register(id.clone(), task.abort_handle());
                        if let Some(previous) = superseded {
                            previous.abort();
                            StoreMetrics::record_timer_cancelled();
                            tracing::debug!(effect_id = %id, "Superseded running effect");
                        }

                        match task.await {
                            Ok(()) => tracing::trace!(effect_id = %id, "Effect::Cancellable completed"),
                            Err(error) if error.is_cancelled() => {
                                tracing::trace!(effect_id = %id, "Effect::Cancellable aborted");
                            },
                            Err(error) => {
                                tracing::error!(effect_id = %id, error = %error, "Cancellable effect failed");
                            },
                        }
                        self.cancellations.release(&id, generation);
                    },
                    Effect::Cancel(id) => {
                        StoreMetrics::record_effect("cancel");
                        self.cancel(&id);
                    },
                }
            })
        }

        /// Broadcast an action to observers, then send it back to the store
        async fn feed_back(&self, action: A) {
            let _ = self.action_broadcast.send(action.clone());
            if let Err(error) = self.send(action).await {
                tracing::debug!(error = %error, "Dropped action produced by effect");
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        A: From<EntityEvent> + Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        /// Perform a composed remote operation against a transport
        ///
        /// 1. Cancels the auto-clear still scheduled for the same slot
        /// 2. Dispatches the pending event
        /// 3. Awaits the transport
        /// 4. Dispatches the outcome event, then the side action if any
        /// 5. Schedules the auto-clear, if the operation asked for one
        ///
        /// Every dispatched event is also broadcast to
        /// [`subscribe_actions`](Self::subscribe_actions) observers.
        ///
        /// # Errors
        ///
        /// - [`StoreError::ShutdownInProgress`]: the store is shutting down
        /// - [`StoreError::Operation`]: the formatter or normalizer rejected
        ///   the response; no outcome event was dispatched, the auto-clear
        ///   is still scheduled
        pub async fn perform(
            &self,
            composed: ComposedOperation<A>,
            transport: &dyn Transport,
        ) -> Result<(), StoreError> {
            let effect_id = composed.effect_id();
            let (pending, request, resolver) = composed.into_parts();
            let clear = resolver.scheduled_clear();

            self.cancel(&effect_id);
            self.dispatch(A::from(pending)).await?;

            tracing::debug!(
                method = %request.method,
                url = %request.url,
                effect_id = %effect_id,
                "Performing remote operation"
            );
            let outcome = transport.execute(request).await;
            StoreMetrics::record_operation(if outcome.is_ok() { "success" } else { "error" });

            let events = match resolver.resolve(outcome) {
                Ok(events) => events,
                Err(error) => {
                    tracing::error!(effect_id = %effect_id, error = %error, "Failed to resolve operation outcome");
                    if let Some(clear) = clear {
                        self.schedule_clear(clear);
                    }
                    return Err(error.into());
                },
            };

            for event in events {
                self.dispatch(event).await?;
            }
            if let Some(clear) = clear {
                self.schedule_clear(clear);
            }
            Ok(())
        }

        /// Perform an operation and wait for an action matching `predicate`
        ///
        /// Actions fed back by the effects of the operation's events count.
        ///
        /// # Errors
        ///
        /// As [`perform`](Self::perform), plus [`StoreError::Timeout`] and
        /// [`StoreError::ChannelClosed`] as in
        /// [`send_and_wait_for`](Self::send_and_wait_for).
        pub async fn perform_and_wait_for<F>(
            &self,
            composed: ComposedOperation<A>,
            transport: &dyn Transport,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            let rx = self.action_broadcast.subscribe();
            self.perform(composed, transport).await?;
            wait_for(rx, predicate, timeout).await
        }

        async fn dispatch(&self, action: A) -> Result<EffectHandle, StoreError> {
            let _ = self.action_broadcast.send(action.clone());
            self.send(action).await
        }

        fn schedule_clear(&self, clear: ScheduledClear) {
            tracing::trace!(effect_id = %clear.effect_id, after = ?clear.after, "Scheduling auto-clear");
            let _ = self.execute_effects([Effect::Cancellable {
                id: clear.effect_id,
                effect: Box::new(Effect::Delay {
                    duration: clear.after,
                    action: Box::new(A::from(clear.event)),
                }),
            }]);
        }
    }

    async fn wait_for<A, F>(
        mut rx: broadcast::Receiver<A>,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        A: Clone,
        F: Fn(&A) -> bool,
    {
        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // If the matching action was dropped, the timeout catches it
                        tracing::warn!(skipped, "Action observer lagged, {} actions skipped", skipped);
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    },
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                cancellations: Arc::clone(&self.cancellations),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
