use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ProcessRequest;
use crate::response::{ProcessorOutput, ResponseStream};

/// The error type for a processor.
pub trait ProcessorError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A capability that turns a request into a response.
///
/// One implementation exists per capability binding. Once created, the
/// processor should behave like a stateless object: it can keep internal
/// state, but callers must not rely on it, and the processor should be
/// prepared for being dropped anytime.
pub trait Processor: Send + Sync {
    /// The error type that may be returned by the processor.
    type Error: ProcessorError;

    /// The stream type for the [`ProcessorOutput::Stream`] variant.
    type Stream: ResponseStream<Error = Self::Error>;

    /// Handles a request.
    ///
    /// The returned future resolves once the processor knows whether the
    /// response is a scalar or a stream; for streams, the increments are
    /// pulled afterwards.
    fn process(
        &self,
        req: &ProcessRequest,
    ) -> impl Future<Output = Result<ProcessorOutput<Self::Stream>, Self::Error>> + Send + 'static;
}
