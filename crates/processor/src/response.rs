use std::convert::Infallible;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{self, Poll};

use crate::ProcessorError;

/// An incremental text stream produced by a processor.
pub trait ResponseStream: Send + 'static {
    /// The error type that may be returned by the stream.
    type Error: ProcessorError;

    /// Attempts to pull out the next text increment from the stream.
    ///
    /// # Return value
    ///
    /// - `Poll::Pending` means the stream is still waiting for the next
    ///   increment. Implementations will ensure that the current task is
    ///   notified when it may be ready.
    /// - `Poll::Ready(Ok(Some(increment)))` delivers one increment; more
    ///   may follow on subsequent calls.
    /// - `Poll::Ready(Ok(None))` means the stream has terminated.
    /// - `Poll::Ready(Err(error))` means producing the increment failed.
    ///
    /// Calling this method after termination should keep returning
    /// `Ok(None)`.
    fn poll_next_increment(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>>;
}

/// The result of a successfully dispatched request.
///
/// The variant is chosen by the processor at the capability boundary:
/// transcription finishes in one shot, chat and vision stream. Consumers
/// match on the variant instead of probing the value.
#[derive(Debug)]
pub enum ProcessorOutput<S> {
    /// A finished text, delivered whole.
    Scalar(String),
    /// A sequence of partial-text increments, terminating naturally.
    Stream(S),
}

/// A [`ResponseStream`] that cannot be constructed.
///
/// Scalar-only processors use this as their stream type to state, in the
/// type system, that they never stream.
pub struct NeverStream<E> {
    never: Infallible,
    _marker: PhantomData<E>,
}

// An uninhabited stream can never move, so pinning is vacuous; the
// unconditional impl keeps `E` free of an `Unpin` bound.
impl<E> Unpin for NeverStream<E> {}

impl<E: ProcessorError> ResponseStream for NeverStream<E> {
    type Error = E;

    fn poll_next_increment(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        match self.get_mut().never {}
    }
}
