use std::error::Error;
use std::fmt::{self, Display};
use std::pin::Pin;
use std::task::{self, Poll};

use bytes::Bytes;

/// Microphone access was refused, or no capture capability exists.
#[derive(Debug)]
pub struct PermissionDenied {
    reason: String,
}

impl PermissionDenied {
    /// Creates a new `PermissionDenied` with a human-readable reason.
    #[inline]
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The human-readable reason.
    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for PermissionDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "microphone access denied: {}", self.reason)
    }
}

impl Error for PermissionDenied {}

/// An open microphone, producing captured audio chunks.
pub trait CaptureStream: Send + 'static {
    /// Attempts to pull out the next captured chunk.
    ///
    /// `Poll::Ready(None)` means the device closed on its own. Dropping
    /// the stream releases the device; implementations must not hold the
    /// device open past their own drop.
    fn poll_next_chunk(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Option<Bytes>>;
}

/// An audio capture capability, the microphone-side collaborator of the
/// session.
///
/// Like [`Processor`](crate::Processor), implementations plug in from the
/// outside; the session only ever drives the contract.
pub trait CaptureDevice: Send + Sync + 'static {
    /// The stream type produced once access is granted.
    type Stream: CaptureStream;

    /// Requests access to the device.
    ///
    /// The returned future suspends until the permission decision is
    /// made. Refusal and unavailability are both reported as
    /// [`PermissionDenied`].
    fn open(&self) -> impl Future<Output = Result<Self::Stream, PermissionDenied>> + Send + 'static;
}
