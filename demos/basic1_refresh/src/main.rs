use crate::tracing_setup::tracing_init;
use asyncresult::{AsyncResult, AsyncResultNotifier, AsyncResultStreamExt, Failure};
use futures::StreamExt;
use futures_signals::signal::SignalExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

mod tracing_setup;

#[derive(Debug, Clone, PartialEq)]
struct Profile {
    name: String,
    followers: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct LoadError(String);

fn render(state: &AsyncResult<Profile, LoadError>) -> String {
    match state {
        AsyncResult::Empty => "<nothing to show>".to_string(),
        AsyncResult::Loading { value: None, .. } => "<spinner>".to_string(),
        AsyncResult::Loading {
            value: Some(profile),
            ..
        }
        | AsyncResult::LoadingMore { value: profile, .. } => {
            format!("{} ({} followers) <updating>", profile.name, profile.followers)
        }
        AsyncResult::Ok { value } => format!("{} ({} followers)", value.name, value.followers),
        AsyncResult::Error { error, .. } => format!("<failed: {}>", error.0),
    }
}

async fn fetch_profile(attempt: u32) -> Result<Profile, String> {
    sleep(Duration::from_millis(150)).await;
    if attempt == 3 {
        return Err(format!("server unavailable on attempt {attempt}"));
    }
    Ok(Profile {
        name: "ferris".to_string(),
        followers: attempt * 100,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init()?;

    let notifier: AsyncResultNotifier<Profile, LoadError> =
        AsyncResultNotifier::new(AsyncResult::Empty, |failure: Failure| {
            LoadError(failure.to_string())
        });

    let _subscription = notifier.listen(|new, previous| {
        debug!("Listener | {} -> {}", previous.kind(), new.kind());
    });

    let renderer = tokio::spawn(notifier.watch(render).to_stream().for_each(
        |frame| async move {
            info!("  Render | {}", frame);
        },
    ));

    info!("==========================================");
    warn!("A. First load shows a spinner, refreshes keep the old profile on screen");
    for attempt in 1..=2 {
        notifier.refresh(fetch_profile(attempt)).await;
        sleep(Duration::from_millis(50)).await;
    }

    info!("==========================================");
    warn!("B. A failed refresh drops the stale profile");
    let follower = tokio::spawn(notifier.to_stream().until_settled().for_each(
        |state| async move {
            info!("  Follow | {}", state.kind());
        },
    ));
    notifier.refresh(fetch_profile(3)).await;
    info!("  Main | value after failure: {:?}", notifier.extract_value());

    follower.await?;
    sleep(Duration::from_millis(50)).await;
    renderer.abort();
    info!("  Main | Finish");
    Ok(())
}
