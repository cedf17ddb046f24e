use std::fmt::{self, Debug};
use std::future::poll_fn;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use mime::Mime;
use playground_actor::{Actor, Message as ActorMessage};
use playground_processor::{
    ChatTurn, MediaFile, ModelParams, PermissionDenied, ProcessRequest, Role,
};
use tokio::select;
use tokio::sync::watch;
use tokio::time;
use tracing::Instrument;

use crate::attachment::StagedInput;
use crate::client::{DispatchResult, ProcessorClient};
use crate::log::{MediaKind, Message, Preview};
use crate::recording::{BoxedCaptureStream, CaptureClient};
use crate::session::{RecordingStatus, SessionAlert, Snapshot};

const RECORDING_FILE_NAME: &str = "recording.webm";

fn audio_container() -> Mime {
    // MediaRecorder's generic audio container.
    "audio/webm"
        .parse()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

/// The state behind a [`Session`](crate::Session) handle.
///
/// Every mutation happens inside a mailbox handler, so interleaving with
/// asynchronous completions (response increments, capture chunks, timer
/// ticks) can only occur between whole handlers. Completions carry the
/// generation or recording id they were issued under and are dropped
/// when stale, which is what keeps a cleared log and a cancelled
/// recording safe from late arrivals.
pub(crate) struct SessionState {
    processor: Option<ProcessorClient>,
    capture: Option<CaptureClient>,
    params: ModelParams,
    log: Vec<Message>,
    draft: String,
    staged: Option<StagedInput>,
    recorder: RecorderState,
    waiting: bool,
    in_flight: bool,
    generation: u64,
    next_recording_id: u64,

    on_change: Option<Arc<dyn Fn(Snapshot) + Send + Sync>>,
    on_alert: Option<Arc<dyn Fn(SessionAlert) + Send + Sync>>,
}

enum RecorderState {
    Idle,
    Requesting { id: u64 },
    Active(ActiveRecording),
}

struct ActiveRecording {
    id: u64,
    chunks: Vec<Bytes>,
    elapsed_secs: u64,
    kill_tx: watch::Sender<bool>,
}

impl SessionState {
    pub(super) fn new(
        processor: Option<ProcessorClient>,
        capture: Option<CaptureClient>,
        params: ModelParams,
        on_change: Option<Arc<dyn Fn(Snapshot) + Send + Sync>>,
        on_alert: Option<Arc<dyn Fn(SessionAlert) + Send + Sync>>,
    ) -> Self {
        Self {
            processor,
            capture,
            params,
            log: Vec::new(),
            draft: String::new(),
            staged: None,
            recorder: RecorderState::Idle,
            waiting: false,
            in_flight: false,
            generation: 0,
            next_recording_id: 1,
            on_change,
            on_alert,
        }
    }

    // --------------
    // Send and clear
    // --------------

    fn send_current_input(&mut self, handle: &Actor<Self>) {
        // Single-flight: one outstanding request per session.
        if self.in_flight {
            debug!("send rejected: a request is already in flight");
            return;
        }
        let Some(processor) = self.processor.clone() else {
            debug!("send rejected: no processor configured");
            return;
        };
        if self.draft.trim().is_empty() && self.staged.is_none() {
            debug!("send rejected: nothing to send");
            return;
        }

        let text = mem::take(&mut self.draft);
        let staged = self.staged.take();

        self.log
            .push(Message::user(text.clone(), staged.as_ref().and_then(StagedInput::attachment)));
        // Snapshot the prior turns before the placeholder goes in; the
        // triggering user turn is included.
        let prior = self.chat_turns();
        self.log.push(Message::assistant_placeholder());
        self.waiting = true;
        self.in_flight = true;

        let req = ProcessRequest {
            text,
            file: staged.map(StagedInput::into_file),
            prior,
            params: self.params.clone(),
        };
        let generation = self.generation;
        let increment_handle = handle.clone();
        let finish_handle = handle.clone();
        tokio::spawn(
            async move {
                let result = processor
                    .dispatch(req, move |delta| {
                        increment_handle
                            .send(StreamIncrement { generation, delta })
                            .ok();
                    })
                    .await;
                finish_handle
                    .send(RequestFinished { generation, result })
                    .ok();
            }
            .instrument(trace_span!("session req")),
        );

        self.emit_change();
    }

    fn chat_turns(&self) -> Vec<ChatTurn> {
        self.log
            .iter()
            .map(|msg| ChatTurn {
                role: msg.role,
                content: msg.content.clone(),
                image: msg
                    .attachment
                    .as_ref()
                    .filter(|att| att.kind == MediaKind::Image)
                    .and_then(|att| att.preview.as_data_uri())
                    .map(str::to_owned),
            })
            .collect()
    }

    fn apply_increment(&mut self, generation: u64, delta: String) {
        if generation != self.generation {
            trace!("discarding a stale increment");
            return;
        }
        if delta.is_empty() {
            return;
        }
        // The first visible increment ends the waiting state.
        self.waiting = false;
        let Some(last) = self
            .log
            .last_mut()
            .filter(|msg| msg.role == Role::Assistant && !msg.is_error)
        else {
            return;
        };
        last.content.push_str(&delta);
        self.emit_change();
    }

    fn finish_request(&mut self, generation: u64, result: DispatchResult) {
        // The flags track the physical request and clear on every
        // outcome, even when the log mutation is suppressed as stale.
        self.in_flight = false;
        self.waiting = false;

        if generation != self.generation {
            trace!("discarding a stale completion");
            self.emit_change();
            return;
        }

        match result {
            Ok(completion) => {
                if let Some(last) = self
                    .log
                    .last_mut()
                    .filter(|msg| msg.role == Role::Assistant && !msg.is_error)
                {
                    last.content = completion.transcript;
                }
            }
            Err(err) => {
                let description = format!("Error: {err}");
                match self.log.last_mut() {
                    // The placeholder received nothing, take its place.
                    Some(last)
                        if last.role == Role::Assistant
                            && last.content.is_empty()
                            && !last.is_error =>
                    {
                        *last = Message::error(description);
                    }
                    // Partial content is worth keeping, append instead.
                    _ => self.log.push(Message::error(description)),
                }
            }
        }
        self.emit_change();
    }

    fn clear_session(&mut self) {
        self.revoke_log_previews();
        self.log.clear();
        if let Some(staged) = self.staged.take() {
            staged.revoke_preview();
        }
        self.draft.clear();
        // Anything still in flight was issued under an older generation
        // and can no longer touch the log.
        self.generation += 1;
        self.emit_change();
    }

    fn revoke_log_previews(&self) {
        for msg in &self.log {
            if let Some(attachment) = &msg.attachment {
                if let Preview::Handle(handle) = &attachment.preview {
                    handle.revoke();
                }
            }
        }
    }

    // -------
    // Staging
    // -------

    fn stage_file(&mut self, file: MediaFile) {
        if let Some(prev) = self.staged.take() {
            prev.revoke_preview();
        }
        self.staged = Some(StagedInput::new(file));
        self.emit_change();
    }

    fn clear_staged(&mut self) {
        if let Some(staged) = self.staged.take() {
            staged.revoke_preview();
            self.emit_change();
        }
    }

    // ---------
    // Recording
    // ---------

    fn start_recording(&mut self, handle: &Actor<Self>) {
        if !matches!(self.recorder, RecorderState::Idle) {
            debug!("start rejected: recorder is not idle");
            return;
        }
        let Some(capture) = self.capture.clone() else {
            self.emit_alert(SessionAlert::MicrophoneDenied {
                reason: "no capture device attached".to_owned(),
            });
            return;
        };

        let id = self.next_recording_id;
        self.next_recording_id += 1;
        self.recorder = RecorderState::Requesting { id };

        let open_fut = capture.open();
        let handle = handle.clone();
        tokio::spawn(
            async move {
                match open_fut.await {
                    Ok(stream) => {
                        handle.send(CaptureOpened { id, stream }).ok();
                    }
                    Err(denied) => {
                        handle.send(CaptureRefused { id, denied }).ok();
                    }
                }
            }
            .instrument(trace_span!("capture open")),
        );

        self.emit_change();
    }

    fn capture_opened(&mut self, id: u64, stream: BoxedCaptureStream, handle: &Actor<Self>) {
        match self.recorder {
            RecorderState::Requesting { id: current } if current == id => {}
            _ => {
                // The request was abandoned before the grant arrived;
                // dropping the stream releases the device.
                trace!("dropping a capture stream for an abandoned request");
                return;
            }
        }

        let (kill_tx, kill_rx) = watch::channel(false);
        self.recorder = RecorderState::Active(ActiveRecording {
            id,
            chunks: Vec::new(),
            elapsed_secs: 0,
            kill_tx,
        });
        tokio::spawn(
            drive_capture(id, stream, kill_rx, handle.clone())
                .instrument(trace_span!("capture drive")),
        );
        self.emit_change();
    }

    fn capture_refused(&mut self, id: u64, denied: PermissionDenied) {
        match self.recorder {
            RecorderState::Requesting { id: current } if current == id => {}
            _ => return,
        }
        self.recorder = RecorderState::Idle;
        self.emit_alert(SessionAlert::MicrophoneDenied {
            reason: denied.reason().to_owned(),
        });
        self.emit_change();
    }

    fn push_capture_chunk(&mut self, id: u64, data: Bytes) {
        match &mut self.recorder {
            RecorderState::Active(rec) if rec.id == id => rec.chunks.push(data),
            _ => trace!("discarding a stale capture chunk"),
        }
    }

    fn recording_tick(&mut self, id: u64) {
        match &mut self.recorder {
            RecorderState::Active(rec) if rec.id == id => {
                rec.elapsed_secs += 1;
                self.emit_change();
            }
            _ => trace!("discarding a stale recording tick"),
        }
    }

    fn capture_ended(&mut self, id: u64) {
        match &self.recorder {
            RecorderState::Active(rec) if rec.id == id => {}
            _ => {
                trace!("discarding a stale capture end");
                return;
            }
        }
        // The device closed on its own (hardware unplugged, permission
        // revoked); finalize what was captured as if stopped manually.
        debug!("capture device closed, finalizing the recording");
        self.stop_recording();
    }

    fn stop_recording(&mut self) {
        match mem::replace(&mut self.recorder, RecorderState::Idle) {
            RecorderState::Active(rec) => {
                rec.kill_tx.send(true).ok();
                let mut data =
                    BytesMut::with_capacity(rec.chunks.iter().map(Bytes::len).sum());
                for chunk in &rec.chunks {
                    data.extend_from_slice(chunk);
                }
                let file =
                    MediaFile::new(RECORDING_FILE_NAME, audio_container(), data.freeze());
                if let Some(prev) = self.staged.take() {
                    prev.revoke_preview();
                }
                self.staged = Some(StagedInput::new(file));
                self.emit_change();
            }
            other => {
                self.recorder = other;
                debug!("stop rejected: no active recording");
            }
        }
    }

    fn cancel_recording(&mut self) {
        match mem::replace(&mut self.recorder, RecorderState::Idle) {
            RecorderState::Active(rec) => {
                rec.kill_tx.send(true).ok();
                // Chunks are dropped here; the staged input is left
                // untouched and nothing is finalized.
                self.emit_change();
            }
            RecorderState::Requesting { .. } => {
                // Abandoned before the permission decision; the stream
                // will be dropped on arrival by the id check.
                self.emit_change();
            }
            RecorderState::Idle => {
                debug!("cancel rejected: no active recording");
            }
        }
    }

    // ---------
    // Observers
    // ---------

    fn emit_change(&self) {
        let Some(on_change) = &self.on_change else {
            return;
        };
        on_change(self.snapshot());
    }

    fn emit_alert(&self, alert: SessionAlert) {
        if let Some(on_alert) = &self.on_alert {
            on_alert(alert);
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            log: self.log.clone(),
            staged: self.staged.clone(),
            waiting: self.waiting,
            in_flight: self.in_flight,
            recording: match &self.recorder {
                RecorderState::Idle => RecordingStatus::Idle,
                RecorderState::Requesting { .. } => RecordingStatus::Requesting,
                RecorderState::Active(rec) => RecordingStatus::Active {
                    elapsed_secs: rec.elapsed_secs,
                },
            },
        }
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        // Teardown: release the device, invalidate previews. In-flight
        // completions can no longer be delivered once the mailbox is
        // gone.
        if let RecorderState::Active(rec) = &self.recorder {
            rec.kill_tx.send(true).ok();
        }
        if let Some(staged) = &self.staged {
            staged.revoke_preview();
        }
        self.revoke_log_previews();
    }
}

async fn drive_capture(
    id: u64,
    mut stream: BoxedCaptureStream,
    mut kill_rx: watch::Receiver<bool>,
    handle: Actor<SessionState>,
) {
    let mut ticker = time::interval(Duration::from_secs(1));
    // The first tick completes immediately, consume it.
    ticker.tick().await;

    loop {
        select! {
            biased;

            _ = kill_rx.changed() => break,
            _ = ticker.tick() => {
                if handle.send(RecordingTick { id }).is_err() {
                    break;
                }
            }
            chunk = poll_fn(|cx| stream.as_mut().poll_next_chunk(cx)) => {
                match chunk {
                    Some(data) => {
                        if handle.send(CaptureChunk { id, data }).is_err() {
                            break;
                        }
                    }
                    // The device closed on its own; let the session
                    // finalize instead of leaving the recorder frozen.
                    None => {
                        handle.send(CaptureEnded { id }).ok();
                        break;
                    }
                }
            }
        }
    }
    // Dropping the stream releases the device.
}

// --------
// Messages
// --------

#[derive(Debug)]
pub(crate) struct SetInput(pub String);

impl ActorMessage<SessionState> for SetInput {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.draft = self.0;
    }
}

#[derive(Debug)]
pub(crate) struct StageFile(pub MediaFile);

impl ActorMessage<SessionState> for StageFile {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.stage_file(self.0);
    }
}

#[derive(Debug)]
pub(crate) struct ClearStaged;

impl ActorMessage<SessionState> for ClearStaged {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.clear_staged();
    }
}

#[derive(Debug)]
pub(crate) struct SendCurrentInput;

impl ActorMessage<SessionState> for SendCurrentInput {
    fn handle(self, state: &mut SessionState, handle: &Actor<SessionState>) {
        state.send_current_input(handle);
    }
}

#[derive(Debug)]
pub(crate) struct ClearSession;

impl ActorMessage<SessionState> for ClearSession {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.clear_session();
    }
}

#[derive(Debug)]
pub(crate) struct StartRecording;

impl ActorMessage<SessionState> for StartRecording {
    fn handle(self, state: &mut SessionState, handle: &Actor<SessionState>) {
        state.start_recording(handle);
    }
}

#[derive(Debug)]
pub(crate) struct StopRecording;

impl ActorMessage<SessionState> for StopRecording {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.stop_recording();
    }
}

#[derive(Debug)]
pub(crate) struct CancelRecording;

impl ActorMessage<SessionState> for CancelRecording {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.cancel_recording();
    }
}

#[derive(Debug)]
pub(crate) struct SetParams(pub ModelParams);

impl ActorMessage<SessionState> for SetParams {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.params = self.0;
    }
}

pub(crate) struct Configure(ProcessorClient);

impl Configure {
    pub(crate) fn new<P: playground_processor::Processor + 'static>(processor: P) -> Self {
        Self(ProcessorClient::new(processor))
    }
}

impl Debug for Configure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configure").finish_non_exhaustive()
    }
}

impl ActorMessage<SessionState> for Configure {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.processor = Some(self.0);
    }
}

#[derive(Debug)]
struct StreamIncrement {
    generation: u64,
    delta: String,
}

impl ActorMessage<SessionState> for StreamIncrement {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.apply_increment(self.generation, self.delta);
    }
}

struct RequestFinished {
    generation: u64,
    result: DispatchResult,
}

impl Debug for RequestFinished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestFinished")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl ActorMessage<SessionState> for RequestFinished {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.finish_request(self.generation, self.result);
    }
}

struct CaptureOpened {
    id: u64,
    stream: BoxedCaptureStream,
}

impl Debug for CaptureOpened {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureOpened")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl ActorMessage<SessionState> for CaptureOpened {
    fn handle(self, state: &mut SessionState, handle: &Actor<SessionState>) {
        state.capture_opened(self.id, self.stream, handle);
    }
}

#[derive(Debug)]
struct CaptureRefused {
    id: u64,
    denied: PermissionDenied,
}

impl ActorMessage<SessionState> for CaptureRefused {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.capture_refused(self.id, self.denied);
    }
}

#[derive(Debug)]
struct CaptureChunk {
    id: u64,
    data: Bytes,
}

impl ActorMessage<SessionState> for CaptureChunk {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.push_capture_chunk(self.id, self.data);
    }
}

#[derive(Debug)]
struct RecordingTick {
    id: u64,
}

impl ActorMessage<SessionState> for RecordingTick {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.recording_tick(self.id);
    }
}

#[derive(Debug)]
struct CaptureEnded {
    id: u64,
}

impl ActorMessage<SessionState> for CaptureEnded {
    fn handle(self, state: &mut SessionState, _handle: &Actor<SessionState>) {
        state.capture_ended(self.id);
    }
}
