mod builder;
mod state;
#[cfg(test)]
mod tests;

use playground_actor::Actor;
use playground_processor::{MediaFile, ModelParams, Processor};

use crate::StagedInput;
use crate::log::Message;
pub use builder::SessionBuilder;
use state::{
    CancelRecording, ClearSession, ClearStaged, Configure, SendCurrentInput, SessionState,
    SetInput, SetParams, StageFile, StartRecording, StopRecording,
};

/// A conversation session.
///
/// The session owns the message log, the draft text entry, the staged
/// input, and the recording lifecycle, and serializes every mutation
/// through one mailbox. Methods post a message and return immediately;
/// observe the effects through the builder's `on_change` callback.
///
/// Dropping the session tears it down: an active recording is stopped
/// and the device released, previews are revoked, and any response still
/// in flight can no longer touch the state.
pub struct Session {
    handle: Actor<SessionState>,
}

impl Session {
    /// Replaces the draft text entry.
    pub fn set_input<S: Into<String>>(&self, text: S) {
        self.post(SetInput(text.into()));
    }

    /// Stages a file as the pending input, replacing any prior one.
    pub fn stage_file(&self, file: MediaFile) {
        self.post(StageFile(file));
    }

    /// Discards the staged input, if any.
    pub fn clear_staged(&self) {
        self.post(ClearStaged);
    }

    /// Sends the draft text and staged input as a new conversation turn.
    ///
    /// Silently rejected when there is nothing to send, when no
    /// processor is configured, or while a previous send is still in
    /// flight.
    pub fn send(&self) {
        self.post(SendCurrentInput);
    }

    /// Empties the log, discards the staged input and the draft.
    ///
    /// An in-flight request is not cancelled, but its late increments
    /// can no longer touch the emptied log.
    pub fn clear(&self) {
        self.post(ClearSession);
    }

    /// Requests microphone access and starts recording.
    ///
    /// Refusal is reported through the `on_alert` callback; rejected
    /// while a recording is already active or pending.
    pub fn start_recording(&self) {
        self.post(StartRecording);
    }

    /// Stops the active recording and stages the captured audio as the
    /// pending input.
    pub fn stop_recording(&self) {
        self.post(StopRecording);
    }

    /// Discards the active recording without staging anything.
    pub fn cancel_recording(&self) {
        self.post(CancelRecording);
    }

    /// Replaces the model parameters used for subsequent sends.
    pub fn set_params(&self, params: ModelParams) {
        self.post(SetParams(params));
    }

    /// Configures (or replaces) the processing capability.
    pub fn configure<P: Processor + 'static>(&self, processor: P) {
        self.post(Configure::new(processor));
    }

    #[inline]
    fn post<M: playground_actor::Message<SessionState>>(&self, msg: M) {
        self.handle
            .send(msg)
            .expect("session task has been dropped too early");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.handle.try_kill();
    }
}

/// The state of a session at one point in time, emitted to the
/// `on_change` observer after every visible mutation.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// The message log, in insertion order.
    pub log: Vec<Message>,
    /// The staged input, if any.
    pub staged: Option<StagedInput>,
    /// Whether a response is awaited but has produced nothing visible
    /// yet.
    pub waiting: bool,
    /// Whether a request is outstanding.
    pub in_flight: bool,
    /// The recording lifecycle position.
    pub recording: RecordingStatus,
}

/// Where the recorder currently is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingStatus {
    /// No recording activity.
    Idle,
    /// Waiting for the permission decision.
    Requesting,
    /// Capturing, with the elapsed time at 1-second resolution.
    Active {
        /// Seconds since capture began.
        elapsed_secs: u64,
    },
}

/// An out-of-log notification.
///
/// The only condition reported this way is a microphone refusal, since
/// no conversation turn exists yet to attach it to; everything else
/// surfaces as an in-log error message.
#[derive(Clone, Debug)]
pub enum SessionAlert {
    /// Microphone access was refused or unavailable.
    MicrophoneDenied {
        /// A human-readable reason.
        reason: String,
    },
}
