//! Scripted fake collaborators for testing the session core.
//!
//! [`ScriptedProcessor`] replays preset replies, one per request, and
//! records what it was asked; [`ScriptedCaptureDevice`] either denies
//! access or produces a fixed set of audio chunks. Neither is optimized
//! for production use, there are heavy copies involved.

mod capture;
mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use playground_processor::{
    ErrorKind, ProcessRequest, Processor, ProcessorError, ProcessorOutput, ResponseStream,
};
use std::collections::VecDeque;
use tokio::time::{Sleep, sleep};

pub use capture::{ScriptedCaptureDevice, ScriptedCaptureStream};
pub use preset::{PresetReply, StreamStep};

/// The error type produced by scripted collaborators.
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ProcessorError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A processor that replays a script of preset replies.
///
/// Each request consumes the next reply from the queue; a request beyond
/// the end of the script fails. Requests and the invocation count are
/// recorded for assertions.
#[derive(Clone, Default)]
pub struct ScriptedProcessor {
    script: Arc<Mutex<VecDeque<PresetReply>>>,
    requests: Arc<Mutex<Vec<ProcessRequest>>>,
    invocations: Arc<AtomicUsize>,
    increment_delay: Option<Duration>,
}

impl ScriptedProcessor {
    /// Appends a reply to the script.
    pub fn push_reply(&mut self, reply: PresetReply) {
        lock(&self.script).push_back(reply);
    }

    /// Delays each stream increment by `duration` (virtual time under a
    /// paused runtime).
    pub fn set_increment_delay(&mut self, duration: Duration) {
        self.increment_delay = Some(duration);
    }

    /// How many times [`Processor::process`] has been called.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::Relaxed)
    }

    /// The requests seen so far, in order.
    pub fn recorded_requests(&self) -> Vec<ProcessRequest> {
        lock(&self.requests).clone()
    }
}

impl Processor for ScriptedProcessor {
    type Error = Error;
    type Stream = ScriptedStream;

    fn process(
        &self,
        req: &ProcessRequest,
    ) -> impl Future<Output = Result<ProcessorOutput<Self::Stream>, Self::Error>> + Send + 'static
    {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        lock(&self.requests).push(req.clone());

        let reply = lock(&self.script).pop_front();
        let delay = self.increment_delay;
        ready(match reply {
            None => Err(Error::new("the script has been exhausted", ErrorKind::Other)),
            Some(PresetReply::Scalar(text)) => Ok(ProcessorOutput::Scalar(text)),
            Some(PresetReply::Stream(steps)) => {
                Ok(ProcessorOutput::Stream(ScriptedStream::new(steps, delay)))
            }
            Some(PresetReply::Fail(message)) => {
                Err(Error::new(message, ErrorKind::Other))
            }
        })
    }
}

/// The stream behind [`PresetReply::Stream`].
pub struct ScriptedStream {
    steps: VecDeque<StreamStep>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
    done: bool,
}

impl ScriptedStream {
    fn new(steps: Vec<StreamStep>, delay: Option<Duration>) -> Self {
        Self {
            steps: steps.into(),
            delay: delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
            done: false,
        }
    }
}

impl ResponseStream for ScriptedStream {
    type Error = Error;

    fn poll_next_increment(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<String>, Self::Error>> {
        let this = self.get_mut();
        if this.done {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            return match this.steps.pop_front() {
                None => {
                    this.done = true;
                    Poll::Ready(Ok(None))
                }
                Some(StreamStep::Delta(delta)) => Poll::Ready(Ok(Some(delta))),
                Some(StreamStep::Fail(message)) => {
                    this.done = true;
                    Poll::Ready(Err(Error::new(message, ErrorKind::Other)))
                }
            };
        }

        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_increment(cx)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use playground_processor::ModelParams;

    use super::*;

    fn request() -> ProcessRequest {
        ProcessRequest {
            text: "Hi".to_owned(),
            file: None,
            prior: vec![],
            params: ModelParams::default(),
        }
    }

    async fn collect(stream: ScriptedStream) -> Result<Vec<String>, Error> {
        let mut stream = pin!(stream);
        let mut increments = Vec::new();
        loop {
            match poll_fn(|cx| stream.as_mut().poll_next_increment(cx)).await? {
                Some(increment) => increments.push(increment),
                None => return Ok(increments),
            }
        }
    }

    #[tokio::test]
    async fn test_replies_consumed_in_order() {
        let mut processor = ScriptedProcessor::default();
        processor.push_reply(PresetReply::Scalar("first".to_owned()));
        processor.push_reply(PresetReply::Stream(vec![
            StreamStep::Delta("sec".to_owned()),
            StreamStep::Delta("ond".to_owned()),
        ]));

        let Ok(ProcessorOutput::Scalar(text)) = processor.process(&request()).await else {
            panic!("expected a scalar");
        };
        assert_eq!(text, "first");

        let Ok(ProcessorOutput::Stream(stream)) = processor.process(&request()).await else {
            panic!("expected a stream");
        };
        assert_eq!(collect(stream).await.unwrap(), ["sec", "ond"]);

        assert!(processor.process(&request()).await.is_err());
        assert_eq!(processor.invocations(), 3);
    }

    #[tokio::test]
    async fn test_mid_stream_failure() {
        let mut processor = ScriptedProcessor::default();
        processor.push_reply(PresetReply::Stream(vec![
            StreamStep::Delta("par".to_owned()),
            StreamStep::Fail("boom".to_owned()),
        ]));

        let Ok(ProcessorOutput::Stream(stream)) = processor.process(&request()).await else {
            panic!("expected a stream");
        };
        assert!(collect(stream).await.is_err());
    }
}
