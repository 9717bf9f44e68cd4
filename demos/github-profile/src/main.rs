//! GitHub profile viewer binary
//!
//! Usage: `github-profile [login] [--follow]`
//!
//! Reads `GITHUB_API_URL` (default `https://api.github.com`), `GITHUB_TOKEN`
//! (needed for `--follow`) and `RUST_LOG`.

use anyhow::Context;
use github_profile::transport::{HttpTransport, DEFAULT_API_URL};
use github_profile::{app_reducer, view, AppAction, AppState};
use restful_rust_core::environment::EntityEnvironment;
use restful_rust_core::event::EventKind;
use restful_rust_runtime::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "github_profile=info,restful_rust_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let login = args.next().unwrap_or_else(|| "octocat".to_string());
    let follow = args.any(|arg| arg == "--follow");

    let base_url = std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let mut transport = HttpTransport::new(base_url).context("failed to build HTTP client")?;
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        transport = transport.with_token(token);
    }
    tracing::info!(base_url = %transport.base_url(), login = %login, "Opening profile");

    let env = EntityEnvironment::default().with_transport(Arc::new(transport));
    let store = Store::new(AppState::default(), app_reducer()?, env);

    let mut handle = store.send(AppAction::OpenProfile(login.clone())).await?;
    handle
        .wait_with_timeout(REQUEST_TIMEOUT)
        .await
        .context("profile did not load in time")?;
    println!("{}", store.state(view::render).await);

    if follow {
        let outcome = store
            .send_and_wait_for(AppAction::Follow(login.clone()), is_follow_outcome, REQUEST_TIMEOUT)
            .await
            .context("follow did not complete in time")?;
        match outcome {
            AppAction::Entity(event) if event.kind == EventKind::ActionSuccess => {
                println!("Now following {login}.");
            },
            AppAction::Entity(event) => {
                println!("Could not follow {login}: {}", event.payload.response.unwrap_or_default());
            },
            _ => {},
        }
    }

    store.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}

fn is_follow_outcome(action: &AppAction) -> bool {
    matches!(
        action,
        AppAction::Entity(event) if matches!(event.kind, EventKind::ActionSuccess | EventKind::ActionError)
    )
}
