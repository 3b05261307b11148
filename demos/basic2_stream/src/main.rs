use crate::tracing_setup::tracing_init;
use asyncresult::{AsyncError, AsyncResult, AsyncResultNotifier};
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

mod tracing_setup;

/// Prices pushed by a feed that drops the connection after a few ticks.
fn price_feed() -> impl futures::Stream<Item = Result<f64, String>> {
    stream::unfold(0_u32, |tick| async move {
        sleep(Duration::from_millis(100)).await;
        match tick {
            0..=3 => Some((Ok(100.0 + f64::from(tick) * 0.25), tick + 1)),
            4 => Some((Err("feed disconnected".to_string()), tick + 1)),
            _ => None,
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init()?;

    let notifier: AsyncResultNotifier<f64, AsyncError> =
        AsyncResultNotifier::with_default_errors(AsyncResult::Empty);

    info!("==========================================");
    warn!("A. Adapting the feed does not touch the notifier");
    let states: Vec<_> = notifier.stream(price_feed()).collect().await;
    for state in &states {
        info!("  Main | adapted: {:?}", state);
    }
    info!("  Main | notifier still holds: {:?}", notifier.get_state());

    info!("==========================================");
    warn!("B. Driving the notifier from the feed");
    let subscription = notifier.listen(|new, _| {
        info!("  Listener | {:?}", new);
    });
    notifier.drive(price_feed()).await;
    subscription.cancel();

    info!("  Main | Finish");
    Ok(())
}
