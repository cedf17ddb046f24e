use std::sync::Arc;

use playground_actor::Actor;
use playground_processor::{CaptureDevice, ModelParams, Processor};

use super::{Session, SessionAlert, Snapshot};
use crate::client::ProcessorClient;
use crate::recording::CaptureClient;
use crate::session::state::SessionState;

/// [`Session`] builder.
#[derive(Default)]
pub struct SessionBuilder {
    processor: Option<ProcessorClient>,
    capture: Option<CaptureClient>,
    params: ModelParams,
    on_change: Option<Arc<dyn Fn(Snapshot) + Send + Sync>>,
    on_alert: Option<Arc<dyn Fn(SessionAlert) + Send + Sync>>,
}

impl SessionBuilder {
    /// Creates a builder for a session with no capabilities attached.
    ///
    /// A session built without a processor is unconfigured: every send
    /// is rejected until [`Session::configure`] supplies one.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the processing capability.
    #[inline]
    pub fn with_processor<P: Processor + 'static>(mut self, processor: P) -> Self {
        self.processor = Some(ProcessorClient::new(processor));
        self
    }

    /// Attaches the audio capture capability.
    #[inline]
    pub fn with_capture_device<D: CaptureDevice>(mut self, device: D) -> Self {
        self.capture = Some(CaptureClient::new(device));
        self
    }

    /// Sets the initial model parameters.
    #[inline]
    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Attaches a callback invoked with a fresh snapshot after every
    /// visible mutation.
    #[inline]
    pub fn on_change(mut self, on_change: impl Fn(Snapshot) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(on_change));
        self
    }

    /// Attaches a callback for out-of-log notifications.
    #[inline]
    pub fn on_alert(mut self, on_alert: impl Fn(SessionAlert) + Send + Sync + 'static) -> Self {
        self.on_alert = Some(Arc::new(on_alert));
        self
    }

    /// Builds the session and spawns its task.
    pub fn build(self) -> Session {
        let state = SessionState::from_builder(self);
        Session {
            handle: Actor::spawn(state, Some("session")),
        }
    }
}

impl SessionState {
    fn from_builder(builder: SessionBuilder) -> Self {
        let SessionBuilder {
            processor,
            capture,
            params,
            on_change,
            on_alert,
        } = builder;
        SessionState::new(processor, capture, params, on_change, on_alert)
    }
}
