//! # GitHub Profile Example
//!
//! A profile viewer built from entity engines, a routing reducer, and remote
//! operations against the GitHub REST API.
//!
//! This example showcases:
//! - Two entity engines (`USER`, `USER_REPOS`) sharing one entity tree
//! - A routing reducer lifted into the app state with `scope_reducer`
//! - Operations started by a reducer through the environment's transport
//! - Rendering from the `Model` accessor
//!
//! ## Example
//!
//! ```no_run
//! use github_profile::{app_reducer, AppAction, AppState};
//! use github_profile::transport::HttpTransport;
//! use restful_rust_core::environment::EntityEnvironment;
//! use restful_rust_runtime::Store;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let transport = HttpTransport::new("https://api.github.com")?;
//! let env = EntityEnvironment::default().with_transport(Arc::new(transport));
//! let store = Store::new(AppState::default(), app_reducer()?, env);
//!
//! let mut handle = store.send(AppAction::OpenProfile("octocat".to_string())).await?;
//! handle.wait().await;
//! println!("{}", store.state(github_profile::view::render).await);
//! # Ok(())
//! # }
//! ```

use restful_rust_core::composition::{chain_reducers, scope_reducer, ChainedReducer};
use restful_rust_core::config::EntityConfig;
use restful_rust_core::effect::Effect;
use restful_rust_core::engine::EntityReducer;
use restful_rust_core::environment::EntityEnvironment;
use restful_rust_core::error::ConfigError;
use restful_rust_core::event::EntityEvent;
use restful_rust_core::model::Model;
use restful_rust_core::normalize::{EntitySchema, Schema};
use restful_rust_core::operation::{Operation, OperationComposer};
use restful_rust_core::reducer::Reducer;
use restful_rust_core::tree::EntityTree;
use restful_rust_core::{smallvec, SmallVec};
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;

/// HTTP transport for the GitHub API
pub mod transport;

/// Text rendering of the current screen
pub mod view;

/// Domain of user profiles
pub const USER: &str = "user";

/// Domain of per-user repository lists (ids into `repo`)
pub const USER_REPOS: &str = "userRepos";

/// Domain of repositories
pub const REPO: &str = "repo";

/// Named action for following a user
pub const FOLLOW: &str = "follow";

/// How long a follow outcome stays visible
pub const FOLLOW_CLEAR_AFTER: Duration = Duration::from_secs(3);

/// Navigation state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteState {
    /// Current path
    pub path: String,
    /// Previously visited paths, oldest first
    pub history: Vec<String>,
}

/// Application state
#[derive(Clone, Debug, Default)]
pub struct AppState {
    /// Normalized entities and their request metadata
    pub entities: EntityTree,
    /// Navigation
    pub route: RouteState,
}

/// Application actions
#[derive(Clone, Debug)]
pub enum AppAction {
    /// Entity lifecycle event
    Entity(EntityEvent),
    /// Change the current path
    Navigate(String),
    /// Show a user's profile, loading what is missing
    OpenProfile(String),
    /// Follow a user
    Follow(String),
}

impl From<EntityEvent> for AppAction {
    fn from(event: EntityEvent) -> Self {
        Self::Entity(event)
    }
}

/// Routing actions
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteAction {
    /// Change the current path
    Navigate(String),
}

/// Keeps the current path and the visit history
#[derive(Clone, Copy, Debug, Default)]
pub struct RouteReducer;

impl Reducer for RouteReducer {
    type State = RouteState;
    type Action = RouteAction;
    type Environment = EntityEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            RouteAction::Navigate(path) => {
                if path != state.path {
                    let previous = std::mem::replace(&mut state.path, path);
                    if !previous.is_empty() {
                        state.history.push(previous);
                    }
                }
            },
        }
        smallvec![Effect::None]
    }
}

/// Turns user intents into navigation and remote operations
#[derive(Clone, Debug)]
pub struct ProfileReducer {
    users: OperationComposer,
    repos: OperationComposer,
}

impl ProfileReducer {
    /// Reducer issuing operations for the given engines
    #[must_use]
    pub fn new(users: Arc<EntityConfig>, repos: Arc<EntityConfig>) -> Self {
        Self {
            users: OperationComposer::new(users),
            repos: OperationComposer::new(repos),
        }
    }

    fn open_profile(&self, state: &AppState, login: String, env: &EntityEnvironment) -> Vec<Effect<AppAction>> {
        let path = format!("/users/{login}");
        let mut effects = vec![Effect::Future(Box::pin(std::future::ready(Some(
            AppAction::Navigate(path.clone()),
        ))))];

        let Some(transport) = env.transport.clone() else {
            tracing::warn!(login = %login, "No transport configured, showing cached profile only");
            return effects;
        };

        if Model::new(&state.entities, USER, &login).can_be_fetched() {
            let operation = Operation::fetch(login.clone(), path);
            effects.push(self.users.compose(operation).into_effect(Arc::clone(&transport)));
        } else {
            tracing::debug!(login = %login, "Profile already loaded or loading");
        }

        if Model::new(&state.entities, USER_REPOS, &login).can_be_fetched() {
            let mut params = Map::new();
            params.insert("sort".to_string(), json!("updated"));
            params.insert("per_page".to_string(), json!(10));
            let operation = Operation::fetch(login.clone(), format!("/users/{login}/repos"))
                .with_params(params)
                .with_schema(Schema::list(EntitySchema::new(REPO).into()));
            effects.push(self.repos.compose(operation).into_effect(transport));
        }

        effects
    }
}

impl Reducer for ProfileReducer {
    type State = AppState;
    type Action = AppAction;
    type Environment = EntityEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            AppAction::OpenProfile(login) => {
                smallvec![Effect::Parallel(self.open_profile(state, login, env))]
            },
            AppAction::Follow(login) => {
                let Some(transport) = env.transport.clone() else {
                    tracing::warn!(login = %login, "No transport configured, cannot follow");
                    return smallvec![Effect::None];
                };
                let operation = Operation::put(login.clone(), format!("/user/following/{login}"))
                    .with_action_id(FOLLOW)
                    .clear_after(FOLLOW_CLEAR_AFTER);
                smallvec![self.users.compose(operation).into_effect(transport)]
            },
            AppAction::Entity(_) | AppAction::Navigate(_) => smallvec![Effect::None],
        }
    }
}

/// Top-level reducer of the app
pub type AppReducer = Arc<ChainedReducer<AppState, AppAction, EntityEnvironment>>;

type BoxedReducer<S, A> = Box<dyn Reducer<State = S, Action = A, Environment = EntityEnvironment> + Send + Sync>;

/// Engine configuration for user profiles (`USER_*` events)
///
/// # Errors
///
/// Never fails for these fixed options; the builder reports missing options.
pub fn users_config() -> Result<EntityConfig, ConfigError> {
    EntityConfig::builder().action_prefix("USER").entity_type(USER).build()
}

/// Engine configuration for repository lists (`USER_REPOS_*` events)
///
/// # Errors
///
/// Never fails for these fixed options; the builder reports missing options.
pub fn repos_config() -> Result<EntityConfig, ConfigError> {
    EntityConfig::builder()
        .action_prefix("USER_REPOS")
        .entity_type(USER_REPOS)
        .build()
}

/// Chain the entity engines, the router and the intent reducer
///
/// # Errors
///
/// Returns [`ConfigError`] if an engine configuration is incomplete.
pub fn app_reducer() -> Result<AppReducer, ConfigError> {
    let users = Arc::new(users_config()?);
    let repos = Arc::new(repos_config()?);

    let engines: Vec<BoxedReducer<EntityTree, EntityEvent>> = vec![
        Box::new(EntityReducer::from_shared(Arc::clone(&users))),
        Box::new(EntityReducer::from_shared(Arc::clone(&repos))),
    ];
    let entities = scope_reducer(
        chain_reducers(engines),
        entities_of,
        set_entities,
        entity_event,
        AppAction::Entity,
    );
    let router = scope_reducer(RouteReducer, route_of, set_route, route_action, embed_route);

    let root: Vec<BoxedReducer<AppState, AppAction>> = vec![
        Box::new(entities),
        Box::new(router),
        Box::new(ProfileReducer::new(users, repos)),
    ];
    Ok(Arc::new(chain_reducers(root)))
}

fn entities_of(state: &AppState) -> &EntityTree {
    &state.entities
}

fn set_entities(state: &mut AppState, entities: EntityTree) {
    state.entities = entities;
}

fn entity_event(action: AppAction) -> Option<EntityEvent> {
    match action {
        AppAction::Entity(event) => Some(event),
        _ => None,
    }
}

fn route_of(state: &AppState) -> &RouteState {
    &state.route
}

fn set_route(state: &mut AppState, route: RouteState) {
    state.route = route;
}

fn route_action(action: AppAction) -> Option<RouteAction> {
    match action {
        AppAction::Navigate(path) => Some(RouteAction::Navigate(path)),
        _ => None,
    }
}

fn embed_route(action: RouteAction) -> AppAction {
    match action {
        RouteAction::Navigate(path) => AppAction::Navigate(path),
    }
}
