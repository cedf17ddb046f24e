//! Type-erased capture device access.

use std::pin::Pin;
use std::sync::Arc;

use playground_processor::{CaptureDevice, CaptureStream, PermissionDenied};

pub(crate) type BoxedCaptureStream = Pin<Box<dyn CaptureStream>>;
type OpenResult = Result<BoxedCaptureStream, PermissionDenied>;
type BoxedOpenFuture = Pin<Box<dyn Future<Output = OpenResult> + Send>>;
type OpenFn = Arc<dyn Fn() -> BoxedOpenFuture + Send + Sync>;

/// A wrapper around a capture device that erases its concrete type, the
/// recording-side counterpart of the processor client.
#[derive(Clone)]
pub(crate) struct CaptureClient {
    open_fn: OpenFn,
}

impl CaptureClient {
    #[inline]
    pub fn new<D: CaptureDevice>(device: D) -> Self {
        let open_fn: OpenFn = Arc::new(move || {
            let fut = device.open();
            Box::pin(async move {
                let stream = fut.await?;
                Ok(Box::pin(stream) as BoxedCaptureStream)
            })
        });
        Self { open_fn }
    }

    /// Requests access to the device.
    #[inline]
    pub fn open(&self) -> BoxedOpenFuture {
        (self.open_fn)()
    }
}
