//! Type-erased processor dispatch.

use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use playground_processor::{
    ProcessRequest, Processor, ProcessorError, ProcessorOutput, ResponseStream,
};
use tracing::Instrument;

pub(crate) type DispatchResult = Result<Completion, Box<dyn ProcessorError>>;
type BoxedDispatchFuture = Pin<Box<dyn Future<Output = DispatchResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ProcessRequest, Box<dyn Fn(String) + Send + 'static>)
        -> BoxedDispatchFuture + Send + Sync
>;

/// A wrapper around a processor that drives one request to completion
/// behind a type-erased interface, so the session doesn't carry the
/// processor's generic parameters.
#[derive(Clone)]
pub(crate) struct ProcessorClient {
    handler_fn: HandlerFn,
}

/// A fully resolved request.
#[derive(Clone, Debug)]
pub(crate) struct Completion {
    /// The complete response text. For streamed responses this is the
    /// concatenation of every increment in production order.
    pub transcript: String,
    /// Whether the response arrived as a stream.
    #[allow(dead_code)]
    pub streamed: bool,
}

impl ProcessorClient {
    #[inline]
    pub fn new<P: Processor + 'static>(processor: P) -> Self {
        // The type `P` has to be erased here, since the session doesn't
        // have a generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_increment| {
            let fut = processor.process(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let output_or_err = fut.await;
                    consume_output::<P>(output_or_err, on_increment).await
                }
                .instrument(trace_span!("processor req")),
            )
        });
        Self { handler_fn }
    }

    /// Dispatches a request and drives its response to completion.
    ///
    /// Stream increments are forwarded to `on_increment` strictly in
    /// production order before being folded into the final transcript;
    /// scalar responses produce no increments.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops producing further
    /// increments when this operation is cancelled.
    #[inline]
    pub async fn dispatch(
        &self,
        req: ProcessRequest,
        on_increment: impl Fn(String) + Send + 'static,
    ) -> DispatchResult {
        (self.handler_fn)(req, Box::new(on_increment)).await
    }
}

async fn consume_output<P: Processor + 'static>(
    output_or_err: Result<ProcessorOutput<P::Stream>, P::Error>,
    on_increment: Box<dyn Fn(String) + Send + 'static>,
) -> DispatchResult {
    let stream = match output_or_err {
        Ok(ProcessorOutput::Scalar(text)) => {
            trace!("got a scalar response");
            return Ok(Completion {
                transcript: text,
                streamed: false,
            });
        }
        Ok(ProcessorOutput::Stream(stream)) => stream,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    trace!("start receiving increments");

    let mut transcript = String::new();
    let mut pinned_stream = pin!(stream);
    loop {
        let increment_or_err =
            poll_fn(|cx| pinned_stream.as_mut().poll_next_increment(cx)).await;
        let increment = match increment_or_err {
            Ok(Some(increment)) => increment,
            Ok(None) => break,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };
        transcript.push_str(&increment);
        on_increment(increment);
    }

    trace!("finished a request");

    Ok(Completion {
        transcript,
        streamed: true,
    })
}
