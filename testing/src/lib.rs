//! # Restful Rust Testing
//!
//! Testing utilities for entity reducers and the store runtime.
//!
//! This crate provides:
//! - Mock implementations of environment collaborators (clock, transport)
//! - JSON fixture helpers for entity trees
//! - Property-based testing strategies
//! - A Given-When-Then helper for reducers
//!
//! ## Example
//!
//! ```ignore
//! use restful_rust_testing::{test_environment, MockTransport};
//! use restful_rust_runtime::Store;
//!
//! #[tokio::test]
//! async fn test_profile_loads() {
//!     let transport = MockTransport::new();
//!     transport.route("/users/octocat", Ok(json!({"login": "octocat"})));
//!
//!     let store = Store::new(EntityTree::new(), engine(), test_environment());
//!     store.perform(composer.compose(Operation::fetch("octocat", "/users/octocat")), &transport).await?;
//!
//!     assert!(store.state(|tree| tree.entity("user", "octocat").is_some()).await);
//! }
//! ```

use chrono::{DateTime, Utc};
use restful_rust_core::environment::Clock;

/// Given-When-Then reducer tests
pub mod reducer_test;

/// Mock implementations of environment collaborators.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use restful_rust_core::environment::EntityEnvironment;
    use restful_rust_core::operation::{Outcome, Request, Transport};
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use std::time::Duration;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making lifecycle timestamps reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use restful_rust_testing::mocks::FixedClock;
    /// use restful_rust_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Milliseconds since the epoch of [`test_clock`]
    pub const TEST_TIME_MS: i64 = 1_735_689_600_000;

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::from_timestamp_millis(TEST_TIME_MS).unwrap_or_default())
    }

    /// Entity environment reading time from [`test_clock`]
    #[must_use]
    pub fn test_environment() -> EntityEnvironment {
        EntityEnvironment::new(Arc::new(test_clock()))
    }

    #[derive(Default)]
    struct Responses {
        routes: HashMap<String, Outcome>,
        queued: VecDeque<Outcome>,
        requests: Vec<Request>,
    }

    /// In-memory transport with canned outcomes
    ///
    /// Outcomes are looked up by URL first (a route answers every request to
    /// it), then taken from the queue in order. A request nothing answers
    /// fails with `{"message": "no response for <url>"}`. Every request is
    /// recorded.
    ///
    /// ```
    /// use restful_rust_testing::MockTransport;
    /// use serde_json::json;
    ///
    /// let transport = MockTransport::new();
    /// transport.route("/users/octocat", Ok(json!({"login": "octocat"})));
    /// transport.push_outcome(Err(json!({"status": 500})));
    /// assert_eq!(transport.request_count(), 0);
    /// ```
    #[derive(Default)]
    pub struct MockTransport {
        responses: Mutex<Responses>,
        latency: Option<Duration>,
    }

    impl MockTransport {
        /// Transport with no canned outcomes
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Delay every response by `latency`
        #[must_use]
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Answer every request to `url` with `outcome`
        pub fn route(&self, url: impl Into<String>, outcome: Outcome) {
            self.lock().routes.insert(url.into(), outcome);
        }

        /// Answer the next unrouted request with `outcome`
        pub fn push_outcome(&self, outcome: Outcome) {
            self.lock().queued.push_back(outcome);
        }

        /// Requests performed so far, oldest first
        #[must_use]
        pub fn requests(&self) -> Vec<Request> {
            self.lock().requests.clone()
        }

        /// Number of requests performed so far
        #[must_use]
        pub fn request_count(&self) -> usize {
            self.lock().requests.len()
        }

        fn lock(&self) -> MutexGuard<'_, Responses> {
            self.responses.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Transport for MockTransport {
        fn execute(&self, request: Request) -> Pin<Box<dyn Future<Output = Outcome> + Send + '_>> {
            let outcome = {
                let mut responses = self.lock();
                let outcome = responses
                    .routes
                    .get(&request.url)
                    .cloned()
                    .or_else(|| responses.queued.pop_front())
                    .unwrap_or_else(|| Err(json!({"message": format!("no response for {}", request.url)})));
                responses.requests.push(request);
                outcome
            };
            let latency = self.latency;

            Box::pin(async move {
                if let Some(latency) = latency {
                    tokio::time::sleep(latency).await;
                }
                outcome
            })
        }
    }
}

/// Fixture helpers for entity trees.
pub mod helpers {
    use restful_rust_core::event::EntityEvent;
    use restful_rust_core::tree::EntityTree;
    use serde_json::Value;
    use tracing_subscriber::EnvFilter;

    /// Build a tree from its JSON wire shape
    ///
    /// # Panics
    ///
    /// Panics if the value is not a valid tree.
    #[must_use]
    #[allow(clippy::expect_used)] // Fixture helper
    pub fn tree_from_json(value: Value) -> EntityTree {
        serde_json::from_value(value).expect("fixture is a valid entity tree")
    }

    /// The JSON wire shape of a tree
    ///
    /// # Panics
    ///
    /// Panics if the tree cannot be serialized.
    #[must_use]
    #[allow(clippy::expect_used)] // Fixture helper
    pub fn tree_to_json(tree: &EntityTree) -> Value {
        serde_json::to_value(tree).expect("entity trees serialize")
    }

    /// Build an event from its `{type, payload}` wire shape
    ///
    /// # Panics
    ///
    /// Panics if the value is not a valid event.
    #[must_use]
    #[allow(clippy::expect_used)] // Fixture helper
    pub fn event_from_json(value: Value) -> EntityEvent {
        serde_json::from_value(value).expect("fixture is a valid entity event")
    }

    /// Install a test-friendly `tracing` subscriber (honours `RUST_LOG`)
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing strategies.
pub mod properties {
    use proptest::prelude::*;
    use restful_rust_core::event::{EntityEvent, EventKind, EventPayload};
    use serde_json::json;

    /// Any event kind
    pub fn event_kind() -> impl Strategy<Value = EventKind> {
        proptest::sample::select(EventKind::ALL.to_vec())
    }

    /// Well-formed events for `prefix` addressing ids `0..ids`
    ///
    /// Action-scoped kinds always carry an action id, success kinds carry an
    /// object `result`.
    pub fn entity_event(prefix: &'static str, ids: u8) -> impl Strategy<Value = EntityEvent> {
        (event_kind(), 0..ids, prop::option::of("[a-z]{1,4}")).prop_map(
            move |(kind, id, action_id)| {
                let mut payload = EventPayload::for_id(id.to_string());
                match kind {
                    EventKind::FetchSuccess | EventKind::ActionSuccess | EventKind::Set => {
                        payload = payload.with_result(json!({"id": id}));
                    },
                    EventKind::FetchError | EventKind::ActionError => {
                        payload = payload.with_response(json!({"status": 500}));
                    },
                    _ => {},
                }
                let scoped = matches!(
                    kind,
                    EventKind::ActionPending | EventKind::ActionSuccess | EventKind::ActionError
                );
                if scoped || kind == EventKind::ActionClear {
                    if let Some(action_id) = action_id.or_else(|| scoped.then(|| "save".to_string())) {
                        payload = payload.with_action_id(action_id);
                    }
                }
                EntityEvent::new(prefix, kind, payload)
            },
        )
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, test_environment, FixedClock, MockTransport, TEST_TIME_MS};
pub use reducer_test::{assertions, ReducerTest};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use restful_rust_core::config::EntityConfig;
    use restful_rust_core::engine::EntityReducer;
    use restful_rust_core::operation::{Correlation, Method, Request, Transport};
    use restful_rust_core::tree::EntityTree;
    use serde_json::{json, Map};

    fn request(url: &str) -> Request {
        Request {
            method: Method::Get,
            url: url.to_string(),
            params: Map::new(),
            correlation: Correlation {
                prefix: "USER".to_string(),
                id: "octocat".to_string(),
                action_id: None,
            },
        }
    }

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().timestamp_millis(), TEST_TIME_MS);
    }

    #[tokio::test]
    async fn test_mock_transport_routes_then_queue() {
        let transport = MockTransport::new();
        transport.route("/users/octocat", Ok(json!({"login": "octocat"})));
        transport.push_outcome(Err(json!({"status": 404})));

        assert_eq!(
            transport.execute(request("/users/octocat")).await,
            Ok(json!({"login": "octocat"}))
        );
        assert_eq!(
            transport.execute(request("/users/octocat")).await,
            Ok(json!({"login": "octocat"}))
        );
        assert_eq!(
            transport.execute(request("/users/hubot")).await,
            Err(json!({"status": 404}))
        );
        assert_eq!(
            transport.execute(request("/users/hubot")).await,
            Err(json!({"message": "no response for /users/hubot"}))
        );

        let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls.len(), 4);
        assert_eq!(urls[2], "/users/hubot");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_transport_latency() {
        let transport = MockTransport::new().with_latency(std::time::Duration::from_secs(2));
        transport.push_outcome(Ok(json!(null)));

        let start = tokio::time::Instant::now();
        let outcome = transport.execute(request("/slow")).await;

        assert_eq!(outcome, Ok(json!(null)));
        assert!(start.elapsed() >= std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_tree_fixture_helpers() {
        let value = json!({"_meta": {"user": {"a": {"data": {"x": 1}}}}, "user": {"a": {"login": "a"}}});
        assert_eq!(helpers::tree_to_json(&helpers::tree_from_json(value.clone())), value);
    }

    proptest! {
        #[test]
        fn prop_generated_events_always_touch_their_slot(event in properties::entity_event("USER", 5)) {
            let engine = EntityReducer::new(
                EntityConfig::builder()
                    .action_prefix("USER")
                    .entity_type("user")
                    .build()
                    .unwrap(),
            );
            let id = event.payload.id.clone().unwrap();

            let next = engine.apply(&EntityTree::new(), &event, test_clock().now());
            prop_assert!(next.meta("user", &id).is_some());
        }
    }
}
