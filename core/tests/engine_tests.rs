//! Behavioural tests for the entity engine, expressed against the JSON wire
//! shape of the tree.

#![allow(clippy::unwrap_used)] // Tests can use unwrap
#![allow(clippy::too_many_lines)] // Fixture-heavy tests

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use restful_rust_core::composition::chain_reducers;
use restful_rust_core::config::EntityConfig;
use restful_rust_core::engine::EntityReducer;
use restful_rust_core::environment::{Clock, EntityEnvironment};
use restful_rust_core::event::{EntityEvent, EventKind, EventPayload};
use restful_rust_core::reducer::Reducer;
use restful_rust_core::tree::EntityTree;
use serde_json::{json, Value};
use std::sync::Arc;

const NOW_MS: i64 = 1_735_689_600_000;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn foo_engine() -> EntityReducer {
    EntityReducer::new(
        EntityConfig::builder()
            .action_prefix("FOO")
            .entity_type("foo")
            .build()
            .unwrap(),
    )
}

fn tree(value: Value) -> EntityTree {
    serde_json::from_value(value).unwrap()
}

fn event(value: Value) -> EntityEvent {
    serde_json::from_value(value).unwrap()
}

fn apply(state: &EntityTree, action: Value) -> EntityTree {
    foo_engine().apply(state, &event(action), now())
}

fn wire(state: &EntityTree) -> Value {
    serde_json::to_value(state).unwrap()
}

fn fetched_state() -> EntityTree {
    tree(json!({
        "_meta": {"foo": {"1": {
            "data": {"customMetaProp": "foo"},
            "fetch": {"success": "fetched", "completedAt": 12345}
        }}},
        "foo": {"1": {"foo": "abc", "beep": "boop"}}
    }))
}

fn initial_state() -> EntityTree {
    tree(json!({
        "_meta": {"foo": {"1": {"data": {"customMetaProp": "foo"}}}},
        "foo": {"1": {"foo": "abc", "beep": "boop"}}
    }))
}

fn bubble_up_state() -> EntityTree {
    tree(json!({
        "_meta": {
            "fooList": {"l1": {"fetch": {"success": "fetched"}}},
            "foo": {"1": {"fetch": {
                "success": "normalized",
                "source": {"entityType": "fooList", "id": "l1"}
            }}}
        },
        "fooList": {"l1": ["1"]},
        "foo": {"1": {"foo": "bar"}}
    }))
}

fn with_actions(state: &EntityTree) -> EntityTree {
    let mut value = wire(state);
    value["_meta"]["foo"]["1"]["actions"] = json!({
        "bar": {"success": "foo"},
        "foo": {"success": true}
    });
    tree(value)
}

#[test]
fn test_lifecycle() {
    let pending = apply(
        &EntityTree::new(),
        json!({"type": "FOO_FETCH_PENDING", "payload": {"id": "1"}}),
    );
    assert_eq!(
        wire(&pending),
        json!({"_meta": {"foo": {"1": {"fetch": {"pending": true, "initiatedAt": NOW_MS}}}}, "foo": {}})
    );

    let success = apply(
        &pending,
        json!({"type": "FOO_FETCH_SUCCESS", "payload": {"id": "1", "result": {"abc": "def"}}}),
    );
    assert_eq!(
        wire(&success),
        json!({
            "_meta": {"foo": {"1": {"fetch": {"success": "fetched", "completedAt": NOW_MS}}}},
            "foo": {"1": {"abc": "def"}}
        })
    );

    let error = apply(
        &pending,
        json!({"type": "FOO_FETCH_ERROR", "payload": {"id": "1", "response": {"abc": "def"}}}),
    );
    assert_eq!(
        wire(&error),
        json!({
            "_meta": {"foo": {"1": {"fetch": {"error": {"abc": "def"}, "completedAt": NOW_MS}}}},
            "foo": {}
        })
    );
}

#[test]
fn test_unmatched_type_returns_same_tree() {
    let state = initial_state();
    let next = apply(
        &state,
        json!({"type": "BAR_FETCH_SUCCESS", "payload": {"id": "1", "result": {"foo": "bar"}}}),
    );
    assert!(next.ptr_eq(&state));
}

#[test]
fn test_chain_returns_original_state_when_nothing_matches() {
    let bar = EntityReducer::new(
        EntityConfig::builder()
            .action_prefix("BAR")
            .entity_type("bar")
            .build()
            .unwrap(),
    );
    let root = chain_reducers(vec![Box::new(foo_engine()), Box::new(bar)]);
    let env = EntityEnvironment::default();

    let original = initial_state();
    let mut state = original.clone();
    let _ = root.reduce(
        &mut state,
        event(json!({"type": "BAZ_FETCH_PENDING", "payload": {"id": "1"}})),
        &env,
    );
    assert!(state.ptr_eq(&original));

    let _ = root.reduce(
        &mut state,
        event(json!({"type": "BAR_FETCH_PENDING", "payload": {"id": "9"}})),
        &env,
    );
    assert!(!state.ptr_eq(&original));
    assert!(state.meta("bar", "9").is_some());
    assert!(Arc::ptr_eq(
        state.entity("foo", "1").unwrap(),
        original.entity("foo", "1").unwrap()
    ));
}

mod local_events {
    use super::*;

    #[test]
    fn test_set_data() {
        let next = apply(
            &EntityTree::new(),
            json!({"type": "FOO_SET_DATA", "payload": {"id": "2", "data": {"abc": "def"}}}),
        );
        assert_eq!(
            wire(&next),
            json!({"_meta": {"foo": {"2": {"data": {"abc": "def"}}}}, "foo": {}})
        );
    }

    #[test]
    fn test_set() {
        let next = apply(
            &EntityTree::new(),
            json!({"type": "FOO_SET", "payload": {"id": "2", "result": {"abc": "def"}}}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"2": {"fetch": {"success": "set", "completedAt": NOW_MS}}}},
                "foo": {"2": {"abc": "def"}}
            })
        );
    }

    #[test]
    fn test_delete() {
        let next = apply(
            &fetched_state(),
            json!({"type": "FOO_DELETE", "payload": {"id": "1"}}),
        );
        assert_eq!(
            wire(&next),
            json!({"_meta": {"foo": {"1": {"data": {"customMetaProp": "foo"}}}}, "foo": {}})
        );
    }
}

mod bubble_up {
    use super::*;

    const SUCCESS: &str = "FOO_FETCH_SUCCESS";

    #[test]
    fn test_ancestor_gets_new_reference_by_default() {
        let state = bubble_up_state();
        let before = wire(&state);

        let next = apply(
            &state,
            json!({"type": SUCCESS, "payload": {"id": "1", "result": {"beep": "boop"}}}),
        );

        assert_eq!(wire(&state), before);
        let old = state.entity("fooList", "l1").unwrap();
        let new = next.entity("fooList", "l1").unwrap();
        assert!(!Arc::ptr_eq(old, new));
        assert_eq!(old, new);
    }

    #[test]
    fn test_payload_can_suppress() {
        let state = bubble_up_state();
        let next = apply(
            &state,
            json!({"type": SUCCESS, "payload": {"id": "1", "result": {"beep": "boop"}, "bubbleUp": false}}),
        );

        assert!(Arc::ptr_eq(
            state.entity("fooList", "l1").unwrap(),
            next.entity("fooList", "l1").unwrap()
        ));
    }

    #[test]
    fn test_config_can_disable() {
        let engine = EntityReducer::new(
            EntityConfig::builder()
                .action_prefix("FOO")
                .entity_type("foo")
                .bubble_up(false)
                .build()
                .unwrap(),
        );
        let state = bubble_up_state();
        let next = engine.apply(
            &state,
            &event(json!({"type": SUCCESS, "payload": {"id": "1", "result": {"beep": "boop"}}})),
            now(),
        );

        assert!(Arc::ptr_eq(
            state.entity("fooList", "l1").unwrap(),
            next.entity("fooList", "l1").unwrap()
        ));
    }
}

mod data {
    use super::*;

    #[test]
    fn test_adds_attribute() {
        let next = apply(
            &initial_state(),
            json!({"type": "FOO_DATA", "payload": {"id": "1", "data": {"boop": "beep"}}}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {"data": {"customMetaProp": "foo", "boop": "beep"}}}},
                "foo": {"1": {"foo": "abc", "beep": "boop"}}
            })
        );
    }

    #[test]
    fn test_removes_attribute() {
        let state = initial_state();
        let before = wire(&state);
        let next = apply(
            &state,
            json!({"type": "FOO_DATA", "payload": {"id": "1", "data": {"boop": "beep", "customMetaProp": null}}}),
        );

        assert_eq!(wire(&state), before);
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {"data": {"boop": "beep"}}}},
                "foo": {"1": {"foo": "abc", "beep": "boop"}}
            })
        );
    }

    #[test]
    fn test_falsy_data_clears_everything() {
        let next = apply(
            &initial_state(),
            json!({"type": "FOO_DATA", "payload": {"id": "1", "data": false}}),
        );
        assert_eq!(
            wire(&next),
            json!({"_meta": {"foo": {"1": {}}}, "foo": {"1": {"foo": "abc", "beep": "boop"}}})
        );
    }

    #[test]
    fn test_lifecycle_events_share_data() {
        let state = tree(json!({
            "_meta": {"foo": {"1": {
                "fetch": {"success": "normalized", "source": {"entityType": "fooList", "id": "l1"}},
                "data": {"abc": [123, 456]}
            }}},
            "foo": {"1": {"foo": "bar"}}
        }));

        let next = apply(&state, json!({"type": "FOO_FETCH_PENDING", "payload": {"id": "1"}}));

        let before = state.meta("foo", "1").unwrap().data.as_ref().unwrap();
        let after = next.meta("foo", "1").unwrap().data.as_ref().unwrap();
        assert!(Arc::ptr_eq(before, after));
        assert_eq!(
            wire(&next)["_meta"]["foo"]["1"],
            json!({"fetch": {"pending": true, "initiatedAt": NOW_MS}, "data": {"abc": [123, 456]}})
        );
    }
}

mod hooks {
    use super::*;

    fn mark(state: &EntityTree, _: &EntityEvent) -> EntityTree {
        state.with_entity("audit", "last", json!("seen"))
    }

    fn success() -> Value {
        json!({
            "type": "FOO_FETCH_SUCCESS",
            "payload": {"result": "1", "entities": {"foo": {"1": {"beep": "boop"}}}}
        })
    }

    fn expected() -> Value {
        json!({
            "_meta": {"foo": {"1": {"fetch": {"success": "fetched", "completedAt": NOW_MS}}}},
            "audit": {"last": "seen"},
            "foo": {"1": {"beep": "boop"}}
        })
    }

    #[test]
    fn test_before_reduce() {
        let engine = EntityReducer::new(
            EntityConfig::builder()
                .action_prefix("FOO")
                .entity_type("foo")
                .before_reduce(mark)
                .build()
                .unwrap(),
        );
        let next = engine.apply(&EntityTree::new(), &event(success()), now());
        assert_eq!(wire(&next), expected());
    }

    #[test]
    fn test_after_reduce() {
        let engine = EntityReducer::new(
            EntityConfig::builder()
                .action_prefix("FOO")
                .entity_type("foo")
                .after_reduce(mark)
                .build()
                .unwrap(),
        );
        let next = engine.apply(&EntityTree::new(), &event(success()), now());
        assert_eq!(wire(&next), expected());
    }

    #[test]
    fn test_hooks_skip_unmatched_events() {
        let engine = EntityReducer::new(
            EntityConfig::builder()
                .action_prefix("FOO")
                .entity_type("foo")
                .after_reduce(mark)
                .build()
                .unwrap(),
        );
        let state = EntityTree::new();
        let next = engine.apply(
            &state,
            &event(json!({"type": "BAR_FETCH_SUCCESS", "payload": {"id": "1"}})),
            now(),
        );
        assert!(next.ptr_eq(&state));
    }
}

mod fetch_success {
    use super::*;

    fn fetched(id: &str) -> Value {
        json!({"type": "FOO_FETCH_SUCCESS", "payload": {"result": id, "entities": {"foo": {id: {"beep": "boop"}}}}})
    }

    #[test]
    fn test_empty_state() {
        let next = apply(&EntityTree::new(), fetched("1"));
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {"fetch": {"success": "fetched", "completedAt": NOW_MS}}}},
                "foo": {"1": {"beep": "boop"}}
            })
        );
    }

    #[test]
    fn test_keeps_existing_entities() {
        let first = apply(&EntityTree::new(), fetched("1"));
        let second = apply(
            &first,
            json!({"type": "FOO_FETCH_SUCCESS", "payload": {"id": "2", "result": {"abc": "def"}}}),
        );

        assert_eq!(
            wire(&second),
            json!({
                "_meta": {"foo": {
                    "1": {"fetch": {"success": "fetched", "completedAt": NOW_MS}},
                    "2": {"fetch": {"success": "fetched", "completedAt": NOW_MS}}
                }},
                "foo": {"1": {"beep": "boop"}, "2": {"abc": "def"}}
            })
        );
        assert!(Arc::ptr_eq(
            first.entity("foo", "1").unwrap(),
            second.entity("foo", "1").unwrap()
        ));
    }

    #[test]
    fn test_keeps_custom_meta() {
        let state = initial_state();
        let before = wire(&state);
        let next = apply(&state, fetched("1"));

        assert_eq!(wire(&state), before);
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {
                    "fetch": {"success": "fetched", "completedAt": NOW_MS},
                    "data": {"customMetaProp": "foo"}
                }}},
                "foo": {"1": {"beep": "boop"}}
            })
        );
    }

    #[test]
    fn test_unrelated_entities_record_their_source() {
        let next = apply(
            &initial_state(),
            json!({"type": "FOO_FETCH_SUCCESS", "payload": {
                "id": "2",
                "result": {"aaa": "bbb"},
                "entities": {"foo": {"1": {"flip": "flop"}}}
            }}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {
                    "1": {
                        "data": {"customMetaProp": "foo"},
                        "fetch": {
                            "success": "normalized",
                            "source": {"id": "2", "entityType": "foo"},
                            "completedAt": NOW_MS
                        }
                    },
                    "2": {"fetch": {"success": "fetched", "completedAt": NOW_MS}}
                }},
                "foo": {"1": {"flip": "flop"}, "2": {"aaa": "bbb"}}
            })
        );
    }

    #[test]
    fn test_other_domains_are_normalized() {
        let next = apply(
            &initial_state(),
            json!({"type": "FOO_FETCH_SUCCESS", "payload": {
                "result": "1",
                "entities": {"foo": {"1": {"beep": "boop"}}, "bar": {"1": {"a": "b"}}}
            }}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {
                    "foo": {"1": {
                        "fetch": {"success": "fetched", "completedAt": NOW_MS},
                        "data": {"customMetaProp": "foo"}
                    }},
                    "bar": {"1": {"fetch": {
                        "success": "normalized",
                        "source": {"entityType": "foo", "id": "1"},
                        "completedAt": NOW_MS
                    }}}
                },
                "foo": {"1": {"beep": "boop"}},
                "bar": {"1": {"a": "b"}}
            })
        );
    }

    #[test]
    fn test_payload_data_is_merged() {
        let next = apply(
            &EntityTree::new(),
            json!({"type": "FOO_FETCH_SUCCESS", "payload": {
                "result": "1",
                "entities": {"foo": {"1": {"beep": "boop"}}},
                "data": {"abc": "def"}
            }}),
        );
        assert_eq!(
            wire(&next)["_meta"]["foo"]["1"],
            json!({"fetch": {"success": "fetched", "completedAt": NOW_MS}, "data": {"abc": "def"}})
        );
    }

    #[test]
    fn test_clears_named_actions() {
        let next = apply(&with_actions(&initial_state()), fetched("1"));
        assert!(next.meta("foo", "1").unwrap().actions.is_empty());
    }
}

mod fetch_pending_and_error {
    use super::*;

    #[test]
    fn test_pending_keeps_meta_and_clears_model() {
        let next = apply(
            &initial_state(),
            json!({"type": "FOO_FETCH_PENDING", "payload": {"id": "1"}}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {
                    "fetch": {"pending": true, "initiatedAt": NOW_MS},
                    "data": {"customMetaProp": "foo"}
                }}},
                "foo": {}
            })
        );
    }

    #[test]
    fn test_error_on_empty_state() {
        let next = apply(
            &EntityTree::new(),
            json!({"type": "FOO_FETCH_ERROR", "payload": {"id": "1", "response": {"code": "bad"}}}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {"fetch": {"error": {"code": "bad"}, "completedAt": NOW_MS}}}},
                "foo": {}
            })
        );
    }

    #[test]
    fn test_error_clears_model_and_keeps_data() {
        let next = apply(
            &initial_state(),
            json!({"type": "FOO_FETCH_ERROR", "payload": {"id": "1", "response": {"code": "bad"}}}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {
                    "fetch": {"error": {"code": "bad"}, "completedAt": NOW_MS},
                    "data": {"customMetaProp": "foo"}
                }}},
                "foo": {}
            })
        );
    }

    #[test]
    fn test_phases_stay_exclusive() {
        let mut state = EntityTree::new();
        for (kind, payload) in [
            ("FOO_FETCH_PENDING", json!({"id": "1"})),
            ("FOO_FETCH_ERROR", json!({"id": "1", "response": "boom"})),
            ("FOO_FETCH_PENDING", json!({"id": "1"})),
            ("FOO_FETCH_SUCCESS", json!({"id": "1", "result": {"a": 1}})),
        ] {
            state = apply(&state, json!({"type": kind, "payload": payload}));
            let fetch = &wire(&state)["_meta"]["foo"]["1"]["fetch"];
            let phases = ["pending", "success", "error"]
                .iter()
                .filter(|phase| fetch.get(**phase).is_some())
                .count();
            assert_eq!(phases, 1, "{fetch}");
        }
    }
}

mod actions {
    use super::*;

    #[test]
    fn test_success_with_response() {
        let next = apply(
            &EntityTree::new(),
            json!({"type": "FOO_ACTION_SUCCESS", "payload": {"id": "1", "actionId": "test", "response": {"foo": "bar"}}}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {"actions": {"test": {"success": {"foo": "bar"}, "completedAt": NOW_MS}}}}},
                "foo": {}
            })
        );
    }

    #[test]
    fn test_success_with_entities_replaces_model() {
        let next = apply(
            &initial_state(),
            json!({"type": "FOO_ACTION_SUCCESS", "payload": {
                "id": "1",
                "actionId": "test",
                "entities": {"foo": {"1": {"newProp": "new value"}}}
            }}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {
                    "actions": {"test": {"success": true, "completedAt": NOW_MS}},
                    "data": {"customMetaProp": "foo"}
                }}},
                "foo": {"1": {"newProp": "new value"}}
            })
        );
    }

    #[test]
    fn test_pending_keeps_model() {
        let next = apply(
            &initial_state(),
            json!({"type": "FOO_ACTION_PENDING", "payload": {"id": "1", "actionId": "bar"}}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {
                    "actions": {"bar": {"pending": true, "initiatedAt": NOW_MS}},
                    "data": {"customMetaProp": "foo"}
                }}},
                "foo": {"1": {"beep": "boop", "foo": "abc"}}
            })
        );
    }

    #[test]
    fn test_error() {
        let next = apply(
            &initial_state(),
            json!({"type": "FOO_ACTION_ERROR", "payload": {"id": "1", "actionId": "bar", "response": {"abc": "def"}}}),
        );
        assert_eq!(
            wire(&next)["_meta"]["foo"]["1"]["actions"],
            json!({"bar": {"error": {"abc": "def"}, "completedAt": NOW_MS}})
        );
        assert!(next.entity("foo", "1").is_some());
    }

    #[test]
    fn test_clear_on_empty_state_touches_meta() {
        let next = apply(
            &EntityTree::new(),
            json!({"type": "FOO_ACTION_CLEAR", "payload": {"id": "1", "actionId": "bar"}}),
        );
        assert_eq!(wire(&next), json!({"_meta": {"foo": {"1": {}}}, "foo": {}}));
    }

    #[test]
    fn test_clear_keeps_other_actions() {
        let next = apply(
            &with_actions(&initial_state()),
            json!({"type": "FOO_ACTION_CLEAR", "payload": {"id": "1", "actionId": "bar"}}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {
                    "actions": {"foo": {"success": true}},
                    "data": {"customMetaProp": "foo"}
                }}},
                "foo": {"1": {"foo": "abc", "beep": "boop"}}
            })
        );
    }

    #[test]
    fn test_clear_without_action_id_drops_all_actions() {
        let next = apply(
            &with_actions(&initial_state()),
            json!({"type": "FOO_ACTION_CLEAR", "payload": {"id": "1"}}),
        );
        assert_eq!(
            wire(&next),
            json!({
                "_meta": {"foo": {"1": {"data": {"customMetaProp": "foo"}}}},
                "foo": {"1": {"foo": "abc", "beep": "boop"}}
            })
        );
    }
}

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        now()
    }
}

fn arbitrary_event(kind: usize, id: u8) -> EntityEvent {
    let id = id.to_string();
    let (kind, payload) = match kind {
        0 => (EventKind::FetchPending, EventPayload::for_id(id)),
        1 => (
            EventKind::FetchSuccess,
            EventPayload::for_id(id).with_result(json!({"v": 1})),
        ),
        2 => (
            EventKind::FetchError,
            EventPayload::for_id(id).with_response(json!("boom")),
        ),
        3 => (
            EventKind::ActionPending,
            EventPayload::for_id(id).with_action_id("save"),
        ),
        4 => (
            EventKind::ActionSuccess,
            EventPayload::for_id(id).with_action_id("save"),
        ),
        5 => (EventKind::ActionClear, EventPayload::for_id(id)),
        _ => (EventKind::Delete, EventPayload::for_id(id)),
    };
    EntityEvent::new("FOO", kind, payload)
}

proptest! {
    #[test]
    fn prop_updates_preserve_unrelated_references(
        events in prop::collection::vec((0_usize..7, 0_u8..8), 1..40)
    ) {
        let engine = foo_engine();
        let env = EntityEnvironment::new(Arc::new(FixedClock));

        let mut base = EntityTree::new();
        for i in 0..8_u8 {
            base = base
                .with_entity("bar", i.to_string(), json!({"bar": i}))
                .with_entity("foo", i.to_string(), json!({"foo": i}));
        }

        let mut state = base.clone();
        for (kind, id) in events {
            let previous = state.clone();
            let _ = engine.reduce(&mut state, arbitrary_event(kind, id), &env);

            prop_assert!(Arc::ptr_eq(state.domain("bar").unwrap(), base.domain("bar").unwrap()));
            prop_assert!(state.meta("foo", &id.to_string()).is_some());
            for other in (0..8_u8).filter(|other| *other != id) {
                let other = other.to_string();
                match (previous.entity("foo", &other), state.entity("foo", &other)) {
                    (Some(before), Some(after)) => prop_assert!(Arc::ptr_eq(before, after)),
                    (None, None) => {},
                    _ => prop_assert!(false, "unrelated entity {} changed presence", other),
                }
            }
        }
        prop_assert!(base.entity("foo", "0").is_some());
    }
}
