//! Test helpers: recording notifier transitions and scripting futures and streams.

use std::fmt::Debug;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::{self, Stream};
use tokio::time::sleep;

use crate::{AsyncResult, AsyncResultNotifier, BoxError, Subscription};

/// One `set_state` as seen by a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<T, E> {
    /// The state that was replaced.
    pub previous: AsyncResult<T, E>,
    /// The state that was set.
    pub current: AsyncResult<T, E>,
}

/// Records every transition of a notifier, in order.
///
/// Recording stops when the recorder is dropped.
pub struct TransitionRecorder<T, E> {
    transitions: Arc<Mutex<Vec<Transition<T, E>>>>,
    _subscription: Subscription,
}

impl<T, E> TransitionRecorder<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn attach(notifier: &AsyncResultNotifier<T, E>) -> Self {
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let sink = transitions.clone();
        let subscription = notifier.listen(move |current, previous| {
            lock(&sink).push(Transition {
                previous: previous.clone(),
                current: current.clone(),
            });
        });

        TransitionRecorder {
            transitions,
            _subscription: subscription,
        }
    }

    pub fn transitions(&self) -> Vec<Transition<T, E>> {
        lock(&self.transitions).clone()
    }

    /// The states that were set, in order.
    pub fn states(&self) -> Vec<AsyncResult<T, E>> {
        lock(&self.transitions)
            .iter()
            .map(|transition| transition.current.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.transitions).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.transitions).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.transitions).clear();
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves to `output` after `delay`.
pub fn delayed<R>(delay: Duration, output: R) -> impl Future<Output = R> {
    async move {
        sleep(delay).await;
        output
    }
}

/// Fails with `message` after `delay`.
pub fn failing_after<T>(
    delay: Duration,
    message: &str,
) -> impl Future<Output = Result<T, BoxError>> {
    let error: BoxError = message.into();
    async move {
        sleep(delay).await;
        Err(error)
    }
}

#[derive(Debug, Clone)]
enum Step<T> {
    Emit(T),
    Fail(String),
    Wait(Duration),
}

/// A scripted push source: emits values, waits and fails in the order they were added.
///
/// ```
/// use asyncresult::mock::ScriptedSource;
/// use std::time::Duration;
///
/// let source = ScriptedSource::new()
///     .emit("one")
///     .wait(Duration::from_millis(5))
///     .emit("two")
///     .fail("err")
///     .into_stream();
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedSource<T> {
    steps: Vec<Step<T>>,
}

impl<T> Default for ScriptedSource<T> {
    fn default() -> Self {
        ScriptedSource { steps: Vec::new() }
    }
}

impl<T: Send + 'static> ScriptedSource<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(mut self, value: T) -> Self {
        self.steps.push(Step::Emit(value));
        self
    }

    pub fn wait(mut self, delay: Duration) -> Self {
        self.steps.push(Step::Wait(delay));
        self
    }

    /// Fails with `message`. Steps added after a failure are still produced if polled.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push(Step::Fail(message.into()));
        self
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<T, BoxError>> + Send {
        stream::unfold(self.steps.into_iter(), |mut steps| async move {
            loop {
                match steps.next()? {
                    Step::Emit(value) => return Some((Ok(value), steps)),
                    Step::Fail(message) => return Some((Err(BoxError::from(message)), steps)),
                    Step::Wait(delay) => sleep(delay).await,
                }
            }
        })
    }
}

/// Assertion helpers for recorded transitions.
pub mod assert {
    use super::*;

    /// Asserts the exact sequence of states that were set.
    pub fn assert_states<T, E>(recorder: &TransitionRecorder<T, E>, expected: &[AsyncResult<T, E>])
    where
        T: Clone + Send + Sync + PartialEq + Debug + 'static,
        E: Clone + Send + Sync + PartialEq + Debug + 'static,
    {
        assert_eq!(recorder.states(), expected, "recorded states differ");
    }

    /// Asserts that each transition's `previous` is the `current` of the one before it,
    /// starting from `initial`.
    pub fn assert_chained<T, E>(recorder: &TransitionRecorder<T, E>, initial: &AsyncResult<T, E>)
    where
        T: Clone + Send + Sync + PartialEq + Debug + 'static,
        E: Clone + Send + Sync + PartialEq + Debug + 'static,
    {
        let mut expected_previous = initial.clone();
        for (index, transition) in recorder.transitions().into_iter().enumerate() {
            assert_eq!(
                transition.previous, expected_previous,
                "transition {} has an unexpected previous state",
                index
            );
            expected_previous = transition.current;
        }
    }
}
