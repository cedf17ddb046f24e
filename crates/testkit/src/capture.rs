use std::collections::VecDeque;
use std::future::ready;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use playground_processor::{CaptureDevice, CaptureStream, PermissionDenied};

#[derive(Clone)]
enum Behavior {
    Denied(String),
    Chunks(Vec<Bytes>),
    ClosingChunks(Vec<Bytes>),
}

/// A capture device that either denies access or replays fixed chunks.
#[derive(Clone)]
pub struct ScriptedCaptureDevice {
    behavior: Behavior,
}

impl ScriptedCaptureDevice {
    /// A device that refuses every open request.
    pub fn denied<S: Into<String>>(reason: S) -> Self {
        Self {
            behavior: Behavior::Denied(reason.into()),
        }
    }

    /// A device that grants access and yields the given chunks, then
    /// stays open (pending) until the stream is dropped, like a real
    /// microphone would.
    pub fn with_chunks<C: Into<Vec<Bytes>>>(chunks: C) -> Self {
        Self {
            behavior: Behavior::Chunks(chunks.into()),
        }
    }

    /// A device that grants access, yields the given chunks and then
    /// ends the stream, as if the hardware went away mid-capture.
    pub fn with_closing_stream<C: Into<Vec<Bytes>>>(chunks: C) -> Self {
        Self {
            behavior: Behavior::ClosingChunks(chunks.into()),
        }
    }
}

impl CaptureDevice for ScriptedCaptureDevice {
    type Stream = ScriptedCaptureStream;

    fn open(
        &self,
    ) -> impl Future<Output = Result<Self::Stream, PermissionDenied>> + Send + 'static {
        ready(match &self.behavior {
            Behavior::Denied(reason) => Err(PermissionDenied::new(reason.clone())),
            Behavior::Chunks(chunks) => Ok(ScriptedCaptureStream {
                chunks: chunks.clone().into(),
                closes: false,
            }),
            Behavior::ClosingChunks(chunks) => Ok(ScriptedCaptureStream {
                chunks: chunks.clone().into(),
                closes: true,
            }),
        })
    }
}

/// The stream produced by [`ScriptedCaptureDevice`].
pub struct ScriptedCaptureStream {
    chunks: VecDeque<Bytes>,
    closes: bool,
}

impl CaptureStream for ScriptedCaptureStream {
    fn poll_next_chunk(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        let this = self.get_mut();
        match this.chunks.pop_front() {
            Some(chunk) => Poll::Ready(Some(chunk)),
            None if this.closes => Poll::Ready(None),
            // The device is held open; only dropping the stream (or the
            // caller's kill path) ends the capture.
            None => Poll::Pending,
        }
    }
}
