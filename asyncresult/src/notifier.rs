use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::{FutureExt, StreamExt};
use futures_core::stream::Stream;
use futures_signals::signal::{
    Mutable, MutableSignalCloned, MutableSignalRef, SignalExt, SignalStream,
};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::failure::{BoxError, ErrorHandler, Failure};
use crate::outcome::IntoOutcome;
use crate::snapshot::{ConnectionState, Snapshot};
use crate::stream_ext::ResultStream;
use crate::{AsyncResult, Trace};

type Listener<T, E> = Arc<dyn Fn(&AsyncResult<T, E>, &AsyncResult<T, E>) + Send + Sync>;

struct Listeners<T, E> {
    next_id: u64,
    entries: Vec<(u64, Listener<T, E>)>,
    /// Set while some `set_state` call is delivering transitions.
    notifying: bool,
    /// `(new, previous)` pairs not yet delivered, oldest first.
    pending: VecDeque<(AsyncResult<T, E>, AsyncResult<T, E>)>,
}

/// Resets the delivery state when a listener unwinds through `set_state`.
struct Delivery<'a, T, E>(&'a Mutex<Listeners<T, E>>);

impl<T, E> Drop for Delivery<'_, T, E> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut listeners = lock(self.0);
            listeners.notifying = false;
            listeners.pending.clear();
        }
    }
}

/// Holds the current [`AsyncResult`] of one asynchronous operation and tells observers when it
/// changes.
///
/// Cloning a notifier yields another handle to the same state, normalizer and observers.
/// Nothing serializes the drivers: overlapping `refresh` calls race and the last one to finish
/// leaves its terminal state behind.
pub struct AsyncResultNotifier<T, E> {
    state: Mutable<AsyncResult<T, E>>,
    on_error: ErrorHandler<E>,
    listeners: Arc<Mutex<Listeners<T, E>>>,
}

impl<T, E> Clone for AsyncResultNotifier<T, E> {
    fn clone(&self) -> Self {
        AsyncResultNotifier {
            state: self.state.clone(),
            on_error: self.on_error.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

impl<T, E> fmt::Debug for AsyncResultNotifier<T, E>
where
    T: fmt::Debug,
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = lock(&*self.listeners).entries.len();
        f.debug_struct("AsyncResultNotifier")
            .field("state", &*self.state.lock_ref())
            .field("listeners", &listeners)
            .finish()
    }
}

fn lock<T, E>(listeners: &Mutex<Listeners<T, E>>) -> MutexGuard<'_, Listeners<T, E>> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T, E> AsyncResultNotifier<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates a notifier holding `initial_state`, with no observers.
    ///
    /// `on_error` turns every raw failure met by the drivers into the typed error `E`. It must
    /// not panic.
    pub fn new<F>(initial_state: AsyncResult<T, E>, on_error: F) -> Self
    where
        F: Fn(Failure) -> E + Send + Sync + 'static,
    {
        AsyncResultNotifier {
            state: Mutable::new(initial_state),
            on_error: Arc::new(on_error),
            listeners: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
                notifying: false,
                pending: VecDeque::new(),
            })),
        }
    }

    /// Creates a notifier that normalizes failures with `E::from`.
    pub fn with_default_errors(initial_state: AsyncResult<T, E>) -> Self
    where
        E: From<Failure>,
    {
        Self::new(initial_state, <E as From<Failure>>::from)
    }

    pub fn get_state(&self) -> AsyncResult<T, E> {
        self.state.get_cloned()
    }

    /// Runs `action` against the current state without cloning it.
    ///
    /// The state is read-locked while `action` runs; `action` must not call back into the
    /// notifier.
    pub fn with_state<R, F>(&self, action: F) -> R
    where
        F: FnOnce(&AsyncResult<T, E>) -> R,
    {
        action(&self.state.lock_ref())
    }

    /// The value carried by the current state, if any.
    pub fn extract_value(&self) -> Option<T> {
        self.state.lock_ref().value_ref().cloned()
    }

    /// Replaces the current state and notifies every listener with `(new, previous)`.
    ///
    /// Any state may follow any other. Listeners run synchronously on the caller's thread,
    /// outside the registry lock, so they may call back into the notifier. A `set_state` made
    /// while listeners are being notified replaces the state at once, but its notification is
    /// queued and delivered after the current one, so every listener sees transitions in the
    /// order the state changed.
    pub fn set_state(&self, new_state: AsyncResult<T, E>) {
        {
            let mut listeners = lock(&*self.listeners);
            let previous = self.state.replace(new_state.clone());
            trace!("state: {} -> {}", previous.kind(), new_state.kind());
            listeners.pending.push_back((new_state, previous));
            if listeners.notifying {
                return;
            }
            listeners.notifying = true;
        }

        let _delivery = Delivery(&*self.listeners);
        loop {
            let (batch, (current, previous)) = {
                let mut listeners = lock(&*self.listeners);
                let Some(transition) = listeners.pending.pop_front() else {
                    listeners.notifying = false;
                    return;
                };
                let batch: Vec<Listener<T, E>> = listeners
                    .entries
                    .iter()
                    .map(|(_, listener)| listener.clone())
                    .collect();
                (batch, transition)
            };
            for listener in batch {
                listener(&current, &previous);
            }
        }
    }

    /// Drives the state from one future.
    ///
    /// Sets `Loading` carrying the current value, awaits `computation`, then sets `Ok` with its
    /// output or `Error` with the normalized failure. A failed refresh does not keep the stale
    /// value. Panics raised by `computation` are caught and reported as failures.
    pub async fn refresh<R, F>(&self, computation: F)
    where
        F: Future<Output = R>,
        R: IntoOutcome<T>,
    {
        self.set_state(AsyncResult::loading(self.extract_value()));

        let next = match AssertUnwindSafe(computation).catch_unwind().await {
            Ok(output) => match output.into_outcome() {
                Ok(value) => AsyncResult::ok(value),
                Err(failure) => self.failed(failure),
            },
            Err(payload) => self.failed(Failure::from_panic(payload)),
        };
        self.set_state(next);
    }

    /// Runs [`refresh`](Self::refresh) on the tokio runtime and returns immediately.
    pub fn spawn_refresh<R, F>(&self, computation: F) -> JoinHandle<()>
    where
        F: Future<Output = R> + Send + 'static,
        R: IntoOutcome<T> + Send + 'static,
    {
        let notifier = self.clone();
        tokio::spawn(async move { notifier.refresh(computation).await })
    }

    /// Adapts `source` into a stream of states without touching the current state.
    ///
    /// The stream yields `Loading`, then `Ok` per item, and ends after the first error with a
    /// single normalized `Error`. Feed the states back with [`set_state`](Self::set_state), or
    /// use [`drive`](Self::drive).
    pub fn stream<S, X>(&self, source: S) -> ResultStream<S, E>
    where
        S: Stream<Item = Result<T, X>>,
        X: Into<BoxError>,
    {
        ResultStream::new(source, self.on_error.clone())
    }

    /// Sets every state produced by [`stream`](Self::stream) in order, until it ends.
    pub async fn drive<S, X>(&self, source: S)
    where
        S: Stream<Item = Result<T, X>>,
        X: Into<BoxError>,
    {
        let mut states = pin!(self.stream(source));
        while let Some(state) = states.next().await {
            self.set_state(state);
        }
    }

    /// Maps a connection snapshot onto a state and sets it.
    ///
    /// An error takes priority over data once the connection is active or done; a waiting
    /// connection with data is `LoadingMore`.
    pub fn handle_snapshot(&self, snapshot: Snapshot<T>) {
        let Snapshot {
            state,
            data,
            error,
            trace,
        } = snapshot;

        let next = match (state, data, error) {
            (ConnectionState::None, _, _) => AsyncResult::Empty,
            (ConnectionState::Waiting, Some(data), _) => AsyncResult::loading_more(data),
            (ConnectionState::Waiting, None, _) => AsyncResult::loading(None),
            (ConnectionState::Active | ConnectionState::Done, _, Some(error)) => {
                AsyncResult::error_with(self.normalize(error), None, trace)
            }
            (ConnectionState::Active | ConnectionState::Done, Some(data), None) => {
                AsyncResult::ok(data)
            }
            (ConnectionState::Active | ConnectionState::Done, None, None) => AsyncResult::Empty,
        };
        self.set_state(next);
    }

    /// Applies [`handle_snapshot`](Self::handle_snapshot) to each snapshot in order.
    pub async fn follow<S>(&self, snapshots: S)
    where
        S: Stream<Item = Snapshot<T>>,
    {
        let mut snapshots = pin!(snapshots);
        while let Some(snapshot) = snapshots.next().await {
            self.handle_snapshot(snapshot);
        }
    }

    /// Registers `callback` to receive `(new, previous)` on every [`set_state`](Self::set_state).
    ///
    /// The callback stays registered until the returned [`Subscription`] is cancelled or dropped.
    pub fn listen<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AsyncResult<T, E>, &AsyncResult<T, E>) + Send + Sync + 'static,
    {
        let id = {
            let mut listeners = lock(&*self.listeners);
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Arc::new(callback)));
            id
        };

        let registry: Weak<Mutex<Listeners<T, E>>> = Arc::downgrade(&self.listeners);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    lock(&*registry).entries.retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&*self.listeners).entries.len()
    }

    /// Render-on-change: a signal of `render(current)`, re-evaluated whenever the state changes.
    ///
    /// Like every `futures-signals` signal it is lossy: a consumer that falls behind only sees
    /// the latest state.
    pub fn watch<U, F>(&self, render: F) -> MutableSignalRef<AsyncResult<T, E>, F>
    where
        F: FnMut(&AsyncResult<T, E>) -> U,
    {
        self.state.signal_ref(render)
    }

    pub fn to_signal(&self) -> MutableSignalCloned<AsyncResult<T, E>> {
        self.state.signal_cloned()
    }

    pub fn to_stream(&self) -> SignalStream<MutableSignalCloned<AsyncResult<T, E>>> {
        self.state.signal_cloned().to_stream()
    }

    fn normalize(&self, failure: Failure) -> E {
        debug!("normalizing failure: {}", failure);
        (self.on_error)(failure)
    }

    fn failed(&self, failure: Failure) -> AsyncResult<T, E> {
        let trace = Trace::capture();
        AsyncResult::error_with(self.normalize(failure), None, trace)
    }
}

/// Keeps a [`listen`](AsyncResultNotifier::listen) callback registered.
///
/// Dropping the subscription unregisters the callback.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn cancel(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    /// Keeps the callback registered for as long as the notifier lives.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::assert::{assert_chained, assert_states};
    use crate::mock::TransitionRecorder;
    use crate::AsyncError;

    type TestResult = AsyncResult<String, AsyncError>;

    fn notifier(initial: TestResult) -> AsyncResultNotifier<String, AsyncError> {
        AsyncResultNotifier::with_default_errors(initial)
    }

    #[test]
    fn test_new_has_no_listeners() {
        let notifier = notifier(AsyncResult::ok("a".to_string()));
        assert_eq!(notifier.listener_count(), 0);
        assert_eq!(notifier.get_state(), AsyncResult::ok("a".to_string()));
        assert_eq!(notifier.extract_value(), Some("a".to_string()));
    }

    #[test]
    fn test_extract_value_per_variant() {
        let notifier = notifier(AsyncResult::Empty);
        assert_eq!(notifier.extract_value(), None);

        notifier.set_state(AsyncResult::loading(Some("l".to_string())));
        assert_eq!(notifier.extract_value(), Some("l".to_string()));

        notifier.set_state(AsyncResult::loading_more("m".to_string()));
        assert_eq!(notifier.extract_value(), Some("m".to_string()));

        notifier.set_state(AsyncResult::error_with(
            AsyncError::error("e"),
            Some("kept".to_string()),
            None,
        ));
        assert_eq!(notifier.extract_value(), Some("kept".to_string()));

        notifier.set_state(AsyncResult::error(AsyncError::error("e")));
        assert_eq!(notifier.extract_value(), None);
    }

    #[test]
    fn test_listener_receives_previous_state() {
        let notifier = notifier(AsyncResult::Empty);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _subscription = notifier.listen(move |new, previous| {
            seen_clone
                .lock()
                .unwrap()
                .push((new.clone(), previous.clone()));
        });

        notifier.set_state(AsyncResult::loading(None));
        notifier.set_state(AsyncResult::ok("x".to_string()));

        let expected: Vec<(TestResult, TestResult)> = vec![
            (AsyncResult::loading(None), AsyncResult::Empty),
            (AsyncResult::ok("x".to_string()), AsyncResult::loading(None)),
        ];
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[test]
    fn test_dropped_subscription_stops_notifications() {
        let notifier = notifier(AsyncResult::Empty);
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        let subscription = notifier.listen(move |_, _| *count_clone.lock().unwrap() += 1);
        assert_eq!(notifier.listener_count(), 1);

        notifier.set_state(AsyncResult::loading(None));
        drop(subscription);
        assert_eq!(notifier.listener_count(), 0);
        notifier.set_state(AsyncResult::Empty);

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_detached_subscription_stays_registered() {
        let notifier = notifier(AsyncResult::Empty);
        notifier.listen(|_, _| {}).detach();
        assert_eq!(notifier.listener_count(), 1);

        let other = notifier.listen(|_, _| {});
        other.cancel();
        assert_eq!(notifier.listener_count(), 1);
    }

    #[test]
    fn test_listener_may_set_state_reentrantly() {
        let notifier = notifier(AsyncResult::Empty);
        let inner = notifier.clone();
        let _subscription = notifier.listen(move |new, _| {
            if new.is_error() {
                inner.set_state(AsyncResult::Empty);
            }
        });

        notifier.set_state(AsyncResult::error(AsyncError::error("reset me")));
        assert_eq!(notifier.get_state(), AsyncResult::Empty);
    }

    #[test]
    fn test_reentrant_set_state_keeps_notifications_ordered() {
        let notifier = notifier(AsyncResult::Empty);
        let inner = notifier.clone();
        let _reset = notifier.listen(move |new, _| {
            if new.is_error() {
                inner.set_state(AsyncResult::Empty);
            }
        });
        let recorder = TransitionRecorder::attach(&notifier);

        let failed = AsyncResult::error(AsyncError::error("reset me"));
        notifier.set_state(failed.clone());

        assert_states(&recorder, &[failed, AsyncResult::Empty]);
        assert_chained(&recorder, &AsyncResult::Empty);
        assert_eq!(recorder.states().last(), Some(&notifier.get_state()));
    }

    #[test]
    fn test_reentrant_listener_sees_its_own_transition_last() {
        let notifier = notifier(AsyncResult::Empty);
        let recorder = TransitionRecorder::attach(&notifier);
        let inner = notifier.clone();
        let _reset = notifier.listen(move |new, _| {
            if new.is_error() {
                inner.set_state(AsyncResult::Empty);
            }
        });

        notifier.set_state(AsyncResult::error(AsyncError::error("reset me")));
        notifier.set_state(AsyncResult::ok("x".to_string()));

        assert_chained(&recorder, &AsyncResult::Empty);
        assert_eq!(recorder.len(), 3);
        assert_eq!(notifier.get_state(), AsyncResult::ok("x".to_string()));
    }

    #[test]
    fn test_panicking_listener_does_not_block_later_notifications() {
        let notifier = notifier(AsyncResult::Empty);
        let _bomb = notifier.listen(|new, _| {
            if new.is_error() {
                panic!("listener failed");
            }
        });
        let recorder = TransitionRecorder::attach(&notifier);

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            notifier.set_state(AsyncResult::error(AsyncError::error("e")));
        }));
        assert!(outcome.is_err());

        notifier.set_state(AsyncResult::ok("x".to_string()));
        assert_eq!(recorder.states(), vec![AsyncResult::ok("x".to_string())]);
        assert_eq!(notifier.get_state(), AsyncResult::ok("x".to_string()));
    }

    #[test]
    fn test_handle_snapshot_table() {
        let notifier = notifier(AsyncResult::ok("x".to_string()));

        notifier.handle_snapshot(Snapshot::with_data(
            ConnectionState::None,
            "ignored".to_string(),
        ));
        assert_eq!(notifier.get_state(), AsyncResult::Empty);

        notifier.handle_snapshot(Snapshot::with_data(
            ConnectionState::Waiting,
            "stale".to_string(),
        ));
        assert_eq!(notifier.get_state(), AsyncResult::loading_more("stale".to_string()));

        notifier.handle_snapshot(Snapshot::waiting());
        assert_eq!(notifier.get_state(), AsyncResult::loading(None));

        notifier.handle_snapshot(Snapshot::with_error(ConnectionState::Waiting, "ignored"));
        assert_eq!(notifier.get_state(), AsyncResult::loading(None));

        notifier.handle_snapshot(Snapshot::with_data(
            ConnectionState::Done,
            "final".to_string(),
        ));
        assert_eq!(notifier.get_state(), AsyncResult::ok("final".to_string()));

        notifier.handle_snapshot(
            Snapshot::with_error(ConnectionState::Done, "e").and_data("final".to_string()),
        );
        assert_eq!(notifier.get_state(), AsyncResult::error(AsyncError::error("e")));

        notifier.handle_snapshot(Snapshot::with_error(ConnectionState::Active, "e"));
        assert_eq!(notifier.get_state(), AsyncResult::error(AsyncError::error("e")));

        notifier.handle_snapshot(Snapshot::with_data(
            ConnectionState::Active,
            "live".to_string(),
        ));
        assert_eq!(notifier.get_state(), AsyncResult::ok("live".to_string()));

        notifier.handle_snapshot(Snapshot::in_state(ConnectionState::Active));
        assert_eq!(notifier.get_state(), AsyncResult::Empty);

        notifier.handle_snapshot(Snapshot::nothing());
        assert_eq!(notifier.get_state(), AsyncResult::Empty);
    }

    #[test]
    fn test_handle_snapshot_keeps_trace() {
        let notifier = notifier(AsyncResult::Empty);
        let trace = Trace::from(std::backtrace::Backtrace::force_capture());
        notifier.handle_snapshot(
            Snapshot::with_error(ConnectionState::Done, "e").and_trace(Some(trace)),
        );
        assert!(notifier.with_state(|state| state.trace().is_some()));
    }
}
