use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::ready;
use futures_core::stream::{FusedStream, Stream};
use pin_project::pin_project;
use tracing::{debug, trace};

use crate::failure::{BoxError, ErrorHandler, Failure};
use crate::AsyncResult;

/// Stream adapters for asynchronous results.
///
/// Implemented for every `Stream`; each method states the item type it needs.
pub trait AsyncResultStreamExt: Stream {
    /// Follows a stream of states through one load.
    ///
    /// Settled states seen before any loading state pass through. Once a `Loading` or
    /// `LoadingMore` state has been seen, the next settled state is yielded and the stream ends.
    ///
    /// ## Examples
    ///
    /// ```
    /// use asyncresult::{AsyncError, AsyncResult, AsyncResultNotifier, AsyncResultStreamExt};
    /// use futures::StreamExt;
    ///
    /// async fn example(notifier: AsyncResultNotifier<u32, AsyncError>) {
    ///     let states = notifier.to_stream().until_settled();
    ///     notifier.spawn_refresh(async { 42u32 });
    ///     // e.g. [Empty, Loading(None), Ok(42)]
    ///     let states: Vec<AsyncResult<u32, AsyncError>> = states.collect().await;
    /// }
    /// ```
    fn until_settled<T, E>(self) -> UntilSettled<Self>
    where
        Self: Stream<Item = AsyncResult<T, E>> + Sized,
    {
        UntilSettled {
            stream: self,
            loading_seen: false,
            finished: false,
        }
    }

    /// Adapts a stream of `Result`s into a stream of [`AsyncResult`] states.
    ///
    /// See [`ResultStream`] for the exact sequence produced.
    fn into_async_results<T, X, E, F>(self, on_error: F) -> ResultStream<Self, E>
    where
        Self: Stream<Item = Result<T, X>> + Sized,
        X: Into<BoxError>,
        F: Fn(Failure) -> E + Send + Sync + 'static,
    {
        ResultStream::new(self, Arc::new(on_error))
    }
}
impl<T: ?Sized> AsyncResultStreamExt for T where T: Stream {}

/// Created by [`AsyncResultStreamExt::until_settled`].
#[pin_project(project = UntilSettledProj)]
#[derive(Debug)]
#[must_use = "Streams do nothing unless polled"]
pub struct UntilSettled<S> {
    #[pin]
    stream: S,
    loading_seen: bool,
    finished: bool,
}

impl<S, T, E> Stream for UntilSettled<S>
where
    S: Stream<Item = AsyncResult<T, E>>,
{
    type Item = AsyncResult<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let UntilSettledProj {
            stream,
            loading_seen,
            finished,
        } = self.project();

        if *finished {
            return Poll::Ready(None);
        }
        match ready!(stream.poll_next(cx)) {
            Some(state) => {
                if state.is_loading() {
                    *loading_seen = true;
                } else if *loading_seen {
                    trace!("load settled as {}", state.kind());
                    *finished = true;
                }
                Poll::Ready(Some(state))
            }
            None => {
                *finished = true;
                Poll::Ready(None)
            }
        }
    }
}

impl<S, T, E> FusedStream for UntilSettled<S>
where
    S: Stream<Item = AsyncResult<T, E>>,
{
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Running,
    Done,
}

/// A stream of [`AsyncResult`] states adapted from a stream of `Result`s.
///
/// Yields `Loading` first, then `Ok(v)` for every `Ok(v)` of the source. The first `Err(e)`
/// (or a panic while polling the source) yields a single `Error(on_error(e))` and ends the
/// stream; the source is not polled again. When the source ends, so does this stream.
///
/// Created by [`AsyncResultNotifier::stream`](crate::AsyncResultNotifier::stream) or
/// [`AsyncResultStreamExt::into_async_results`].
#[pin_project(project = ResultStreamProj)]
#[must_use = "Streams do nothing unless polled"]
pub struct ResultStream<S, E> {
    #[pin]
    stream: S,
    phase: Phase,
    on_error: ErrorHandler<E>,
}

impl<S, E> ResultStream<S, E> {
    pub(crate) fn new(stream: S, on_error: ErrorHandler<E>) -> Self {
        ResultStream {
            stream,
            phase: Phase::Start,
            on_error,
        }
    }
}

impl<S, T, X, E> Stream for ResultStream<S, E>
where
    S: Stream<Item = Result<T, X>>,
    X: Into<BoxError>,
{
    type Item = AsyncResult<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let ResultStreamProj {
            stream,
            phase,
            on_error,
        } = self.project();

        match *phase {
            Phase::Start => {
                *phase = Phase::Running;
                Poll::Ready(Some(AsyncResult::loading(None)))
            }
            Phase::Done => Poll::Ready(None),
            Phase::Running => {
                let polled = catch_unwind(AssertUnwindSafe(|| stream.poll_next(cx)));
                let failure = match polled {
                    Ok(Poll::Pending) => return Poll::Pending,
                    Ok(Poll::Ready(Some(Ok(value)))) => {
                        return Poll::Ready(Some(AsyncResult::ok(value)))
                    }
                    Ok(Poll::Ready(None)) => {
                        *phase = Phase::Done;
                        return Poll::Ready(None);
                    }
                    Ok(Poll::Ready(Some(Err(error)))) => Failure::new(error),
                    Err(payload) => Failure::from_panic(payload),
                };
                *phase = Phase::Done;
                debug!("stream source failed: {}", failure);
                Poll::Ready(Some(AsyncResult::error((**on_error)(failure))))
            }
        }
    }
}

impl<S, T, X, E> FusedStream for ResultStream<S, E>
where
    S: Stream<Item = Result<T, X>>,
    X: Into<BoxError>,
{
    fn is_terminated(&self) -> bool {
        self.phase == Phase::Done
    }
}
