use crate::tracing_setup::tracing_init;
use asyncresult::{AsyncError, AsyncResult, AsyncResultNotifier, ConnectionState, Snapshot};
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

mod tracing_setup;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init()?;

    let notifier: AsyncResultNotifier<Vec<String>, AsyncError> =
        AsyncResultNotifier::with_default_errors(AsyncResult::Empty);
    notifier
        .listen(|new, previous| {
            info!("  Listener | {:?} (was {})", new, previous.kind());
        })
        .detach();

    info!("==========================================");
    warn!("A. A connection's lifecycle observed from outside");
    let inbox = vec!["hello".to_string()];
    let snapshots = vec![
        Snapshot::nothing(),
        Snapshot::waiting(),
        Snapshot::with_data(ConnectionState::Active, inbox.clone()),
        Snapshot::with_data(ConnectionState::Waiting, inbox.clone()),
        Snapshot::with_data(
            ConnectionState::Done,
            vec!["hello".to_string(), "again".to_string()],
        ),
    ];
    notifier
        .follow(stream::iter(snapshots).then(|snapshot| async move {
            sleep(Duration::from_millis(80)).await;
            snapshot
        }))
        .await;

    info!("==========================================");
    warn!("B. An error wins over stale data");
    notifier.handle_snapshot(
        Snapshot::with_error(ConnectionState::Done, "connection reset").and_data(inbox),
    );
    info!("  Main | final: {:?}", notifier.get_state());

    info!("  Main | Finish");
    Ok(())
}
