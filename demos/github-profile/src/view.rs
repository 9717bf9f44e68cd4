use crate::{AppState, FOLLOW, REPO, USER, USER_REPOS};
use restful_rust_core::model::Model;
use restful_rust_core::tree::EntityTree;
use serde_json::Value;
use std::fmt::Write;

/// Render the screen for the current route
#[must_use]
pub fn render(state: &AppState) -> String {
    match state.route.path.strip_prefix("/users/") {
        Some(login) if !login.is_empty() => render_profile(&state.entities, login),
        _ => "Nothing to show. Open a profile with /users/<login>.".to_string(),
    }
}

/// Render one user's profile and repositories
#[must_use]
pub fn render_profile(tree: &EntityTree, login: &str) -> String {
    let user = Model::new(tree, USER, login);

    if user.is_fetch_pending() {
        return format!("Loading {login}...");
    }
    if let Some(error) = user.fetch_error() {
        return format!("Could not load {login}: {}", describe_error(error));
    }
    let Some(profile) = user.value() else {
        return format!("No profile for {login}.");
    };

    let mut out = String::new();
    let name = text(profile, "name").unwrap_or(login);
    let _ = writeln!(out, "{name} (@{login})");
    if let Some(bio) = text(profile, "bio") {
        let _ = writeln!(out, "{bio}");
    }
    let _ = writeln!(
        out,
        "followers: {}  following: {}  public repos: {}",
        count(profile, "followers"),
        count(profile, "following"),
        count(profile, "public_repos"),
    );

    if user.is_action_pending(FOLLOW) {
        let _ = writeln!(out, "[following...]");
    } else if user.action_success(FOLLOW).is_some() {
        let _ = writeln!(out, "[followed]");
    } else if let Some(error) = user.action_error(FOLLOW) {
        let _ = writeln!(out, "[follow failed: {}]", describe_error(error));
    }

    out.push_str(&render_repos(tree, login));
    out
}

fn render_repos(tree: &EntityTree, login: &str) -> String {
    let repos = Model::new(tree, USER_REPOS, login);
    if repos.is_fetch_pending() {
        return "Repositories: loading...\n".to_string();
    }
    if let Some(error) = repos.fetch_error() {
        return format!("Repositories: unavailable ({})\n", describe_error(error));
    }
    let Some(Value::Array(ids)) = repos.value() else {
        return String::new();
    };

    let mut out = String::from("Repositories:\n");
    for id in ids {
        let key = match id {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        let Some(repo) = tree.entity(REPO, &key) else {
            continue;
        };
        let _ = writeln!(
            out,
            "  {} ★{}",
            text(repo, "name").unwrap_or(&key),
            count(repo, "stargazers_count")
        );
    }
    out
}

fn text<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn count(value: &Value, field: &str) -> u64 {
    value.get(field).and_then(Value::as_u64).unwrap_or(0)
}

fn describe_error(error: &Value) -> String {
    match (error.get("status"), error.get("message")) {
        (Some(status), _) => format!("HTTP {status}"),
        (None, Some(Value::String(message))) => message.clone(),
        _ => error.to_string(),
    }
}
