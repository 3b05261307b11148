mod common;

#[cfg(test)]
mod tests {
    use super::common::{notifier, UiError};
    use asyncresult::mock::{assert, delayed, failing_after, TransitionRecorder};
    use asyncresult::AsyncResult;
    use std::time::Duration;

    #[tokio::test]
    async fn test_refresh_from_empty() {
        let notifier = notifier(AsyncResult::Empty);
        let recorder = TransitionRecorder::attach(&notifier);

        notifier
            .refresh(delayed(Duration::from_millis(5), "X".to_string()))
            .await;

        assert::assert_states(
            &recorder,
            &[AsyncResult::loading(None), AsyncResult::ok("X".to_string())],
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_from_empty() {
        let notifier = notifier(AsyncResult::Empty);
        let recorder = TransitionRecorder::attach(&notifier);

        notifier
            .refresh(failing_after::<String>(Duration::from_millis(5), "boom"))
            .await;

        assert::assert_states(
            &recorder,
            &[
                AsyncResult::loading(None),
                AsyncResult::error(UiError::new("boom")),
            ],
        );
    }

    #[tokio::test]
    async fn test_refresh_preserves_stale_value() {
        let notifier = notifier(AsyncResult::ok("old".to_string()));
        let recorder = TransitionRecorder::attach(&notifier);

        notifier
            .refresh(delayed(Duration::from_millis(5), "new".to_string()))
            .await;

        let states = recorder.states();
        assert_eq!(states.first(), Some(&AsyncResult::loading(Some("old".to_string()))));
        assert_eq!(states.last(), Some(&AsyncResult::ok("new".to_string())));
    }

    #[tokio::test]
    async fn test_previous_state_chains_across_drivers() {
        let initial = AsyncResult::ok("start".to_string());
        let notifier = notifier(initial.clone());
        let recorder = TransitionRecorder::attach(&notifier);

        notifier.refresh(async { "a".to_string() }).await;
        notifier
            .refresh(failing_after::<String>(Duration::from_millis(1), "down"))
            .await;
        notifier.set_state(AsyncResult::loading_more("a".to_string()));
        notifier.set_state(AsyncResult::Empty);

        assert_eq!(recorder.len(), 6);
        assert::assert_chained(&recorder, &initial);
    }

    #[tokio::test]
    async fn test_spawned_refreshes_settle() {
        let notifier = notifier(AsyncResult::Empty);
        let handles: Vec<_> = (0..4)
            .map(|n| notifier.spawn_refresh(delayed(Duration::from_millis(n * 3), n.to_string())))
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(notifier.with_state(|state| state.is_ok()));
    }
}
