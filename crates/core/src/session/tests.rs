use std::time::Duration;

use bytes::Bytes;
use playground_processor::{MediaFile, ProcessRequest, Role};
use playground_testkit::{PresetReply, ScriptedCaptureDevice, ScriptedProcessor, StreamStep};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;

use crate::log::Preview;
use crate::session::{RecordingStatus, Session, SessionAlert, SessionBuilder, Snapshot};

struct Observer {
    changes: UnboundedReceiver<Snapshot>,
    alerts: UnboundedReceiver<SessionAlert>,
}

impl Observer {
    async fn next_change(&mut self) -> Snapshot {
        timeout(Duration::from_secs(5), self.changes.recv())
            .await
            .expect("timed out waiting for a snapshot")
            .expect("the session has been dropped")
    }

    async fn change_where(&mut self, pred: impl Fn(&Snapshot) -> bool) -> Snapshot {
        loop {
            let snapshot = self.next_change().await;
            if pred(&snapshot) {
                return snapshot;
            }
        }
    }

    async fn next_alert(&mut self) -> SessionAlert {
        timeout(Duration::from_secs(5), self.alerts.recv())
            .await
            .expect("timed out waiting for an alert")
            .expect("the session has been dropped")
    }
}

fn observed(builder: SessionBuilder) -> (Session, Observer) {
    let (change_tx, changes) = mpsc::unbounded_channel();
    let (alert_tx, alerts) = mpsc::unbounded_channel();
    let session = builder
        .on_change(move |snapshot| {
            change_tx.send(snapshot).ok();
        })
        .on_alert(move |alert| {
            alert_tx.send(alert).ok();
        })
        .build();
    (session, Observer { changes, alerts })
}

fn streaming_processor(deltas: &[&str]) -> ScriptedProcessor {
    let mut processor = ScriptedProcessor::default();
    processor.push_reply(PresetReply::Stream(
        deltas
            .iter()
            .map(|delta| StreamStep::Delta((*delta).to_owned()))
            .collect(),
    ));
    processor
}

fn text_file() -> MediaFile {
    MediaFile::new("notes.txt", mime::TEXT_PLAIN, Bytes::from_static(b"hi"))
}

#[tokio::test]
async fn test_streamed_response_folds_into_log() {
    let processor = streaming_processor(&["Hel", "lo"]);
    let (session, mut observer) = observed(SessionBuilder::new().with_processor(processor));

    session.set_input("Hi");
    session.send();

    let sent = observer.next_change().await;
    assert_eq!(sent.log.len(), 2);
    assert_eq!(sent.log[0].role, Role::User);
    assert_eq!(sent.log[0].content, "Hi");
    assert_eq!(sent.log[1].role, Role::Assistant);
    assert_eq!(sent.log[1].content, "");
    assert!(sent.waiting);
    assert!(sent.in_flight);

    let first = observer.next_change().await;
    assert_eq!(first.log[1].content, "Hel");
    assert!(!first.waiting, "the first increment ends the waiting state");

    let second = observer.next_change().await;
    assert_eq!(second.log[1].content, "Hello");

    let done = observer.next_change().await;
    assert_eq!(done.log.len(), 2);
    assert_eq!(done.log[1].content, "Hello");
    assert!(!done.log[1].is_error);
    assert!(!done.in_flight);
}

#[tokio::test]
async fn test_scalar_response_resolves_in_one_step() {
    let mut processor = ScriptedProcessor::default();
    processor.push_reply(PresetReply::Scalar("42".to_owned()));
    let (session, mut observer) = observed(SessionBuilder::new().with_processor(processor));

    session.set_input("Answer?");
    session.send();

    let sent = observer.next_change().await;
    assert!(sent.waiting);

    let done = observer.next_change().await;
    assert_eq!(done.log.len(), 2);
    assert_eq!(done.log[1].content, "42");
    assert!(!done.waiting);
    assert!(!done.in_flight);
}

#[tokio::test]
async fn test_failure_replaces_empty_placeholder() {
    let mut processor = ScriptedProcessor::default();
    processor.push_reply(PresetReply::Fail("boom".to_owned()));
    let (session, mut observer) = observed(SessionBuilder::new().with_processor(processor));

    session.set_input("Hi");
    session.send();

    let done = observer.change_where(|snapshot| !snapshot.in_flight).await;
    assert_eq!(done.log.len(), 2);
    assert!(done.log[1].is_error);
    assert_eq!(done.log[1].content, "Error: boom");
}

#[tokio::test]
async fn test_failure_after_partial_output_appends() {
    let mut processor = ScriptedProcessor::default();
    processor.push_reply(PresetReply::Stream(vec![
        StreamStep::Delta("par".to_owned()),
        StreamStep::Fail("boom".to_owned()),
    ]));
    let (session, mut observer) = observed(SessionBuilder::new().with_processor(processor));

    session.set_input("Hi");
    session.send();

    let done = observer.change_where(|snapshot| !snapshot.in_flight).await;
    assert_eq!(done.log.len(), 3, "partial output is worth keeping");
    assert_eq!(done.log[1].content, "par");
    assert!(!done.log[1].is_error);
    assert!(done.log[2].is_error);
    assert_eq!(done.log[2].content, "Error: boom");
}

#[tokio::test]
async fn test_blank_input_is_not_sent() {
    let processor = ScriptedProcessor::default();
    let (session, mut observer) =
        observed(SessionBuilder::new().with_processor(processor.clone()));

    session.set_input("   ");
    session.send();
    // The mailbox is in order: once this lands, the send was handled.
    session.stage_file(text_file());

    let snapshot = observer.next_change().await;
    assert!(snapshot.log.is_empty());
    assert_eq!(processor.invocations(), 0);
}

#[tokio::test]
async fn test_send_without_processor_is_rejected() {
    let (session, mut observer) = observed(SessionBuilder::new());

    session.set_input("Hi");
    session.send();
    session.stage_file(text_file());

    let snapshot = observer.next_change().await;
    assert!(snapshot.log.is_empty());
    assert!(!snapshot.in_flight);
}

#[tokio::test]
async fn test_configure_enables_sending() {
    let mut processor = ScriptedProcessor::default();
    processor.push_reply(PresetReply::Scalar("hey".to_owned()));
    let (session, mut observer) = observed(SessionBuilder::new());

    session.configure(processor.clone());
    session.set_input("Hi");
    session.send();

    let done = observer.change_where(|snapshot| !snapshot.in_flight).await;
    assert_eq!(done.log.len(), 2);
    assert_eq!(done.log[1].content, "hey");
    assert_eq!(processor.invocations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_single_flight() {
    let mut processor = streaming_processor(&["slow"]);
    processor.set_increment_delay(Duration::from_secs(1));
    let (session, mut observer) =
        observed(SessionBuilder::new().with_processor(processor.clone()));

    session.set_input("one");
    session.send();
    let sent = observer.next_change().await;
    assert!(sent.in_flight);

    session.set_input("two");
    session.send();

    let done = observer.change_where(|snapshot| !snapshot.in_flight).await;
    assert_eq!(done.log.len(), 2, "the second send was rejected outright");
    assert_eq!(processor.invocations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_suppresses_late_completion() {
    let mut processor = streaming_processor(&["late"]);
    processor.set_increment_delay(Duration::from_secs(1));
    let (session, mut observer) = observed(SessionBuilder::new().with_processor(processor));

    session.set_input("Hi");
    session.send();
    let sent = observer.next_change().await;
    assert!(sent.in_flight);

    session.clear();
    let cleared = observer.next_change().await;
    assert!(cleared.log.is_empty());

    let done = observer.change_where(|snapshot| !snapshot.in_flight).await;
    assert!(done.log.is_empty(), "a stale completion cannot touch the log");
}

#[tokio::test]
async fn test_clear_resets_everything_and_revokes_previews() {
    let mut processor = ScriptedProcessor::default();
    processor.push_reply(PresetReply::Scalar("ok".to_owned()));
    let (session, mut observer) = observed(SessionBuilder::new().with_processor(processor));

    session.set_input("Hi");
    session.send();
    observer.change_where(|snapshot| !snapshot.in_flight).await;

    let media_type = "audio/webm".parse().unwrap();
    session.stage_file(MediaFile::new(
        "clip.webm",
        media_type,
        Bytes::from_static(b"opus"),
    ));
    let staged = observer.next_change().await;
    let Some(Preview::Handle(handle)) = staged.staged.as_ref().and_then(|input| input.preview())
    else {
        panic!("expected an audio preview handle");
    };
    let handle = handle.clone();
    assert!(handle.resolve().is_some());

    session.clear();
    let cleared = observer.next_change().await;
    assert!(cleared.log.is_empty());
    assert!(cleared.staged.is_none());
    assert!(handle.resolve().is_none(), "clearing revokes the preview");
}

#[tokio::test]
async fn test_image_turns_carry_a_data_uri() {
    let mut processor = ScriptedProcessor::default();
    processor.push_reply(PresetReply::Scalar("a cat".to_owned()));
    let (session, mut observer) =
        observed(SessionBuilder::new().with_processor(processor.clone()));

    session.stage_file(MediaFile::new(
        "pic.png",
        mime::IMAGE_PNG,
        Bytes::from_static(b"\x89PNG"),
    ));
    session.set_input("look");
    session.send();
    observer.change_where(|snapshot| !snapshot.in_flight).await;

    let requests: Vec<ProcessRequest> = processor.recorded_requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.text, "look");
    assert_eq!(req.file.as_ref().map(|file| file.name.as_str()), Some("pic.png"));
    assert_eq!(req.prior.len(), 1, "the triggering turn is included");
    assert_eq!(req.prior[0].role, Role::User);
    assert!(
        req.prior[0]
            .image
            .as_deref()
            .is_some_and(|uri| uri.starts_with("data:image/png;base64,"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_recording_stop_stages_the_audio() {
    let device = ScriptedCaptureDevice::with_chunks(vec![
        Bytes::from_static(b"ab"),
        Bytes::from_static(b"cd"),
    ]);
    let (session, mut observer) =
        observed(SessionBuilder::new().with_capture_device(device));

    session.start_recording();
    let requesting = observer.next_change().await;
    assert_eq!(requesting.recording, RecordingStatus::Requesting);

    let active = observer.next_change().await;
    assert_eq!(active.recording, RecordingStatus::Active { elapsed_secs: 0 });

    // Chunks are delivered before the first tick, so the tick doubles as
    // a delivery barrier.
    observer
        .change_where(|snapshot| {
            matches!(
                snapshot.recording,
                RecordingStatus::Active { elapsed_secs } if elapsed_secs >= 1
            )
        })
        .await;

    session.stop_recording();
    let stopped = observer.next_change().await;
    assert_eq!(stopped.recording, RecordingStatus::Idle);
    let staged = stopped.staged.expect("the capture should be staged");
    assert_eq!(staged.file().name, "recording.webm");
    assert_eq!(staged.file().media_type.essence_str(), "audio/webm");
    assert_eq!(staged.file().data, Bytes::from_static(b"abcd"));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_discards_the_recording() {
    let device = ScriptedCaptureDevice::with_chunks(vec![Bytes::from_static(b"ab")]);
    let (session, mut observer) =
        observed(SessionBuilder::new().with_capture_device(device));

    session.start_recording();
    observer
        .change_where(|snapshot| {
            matches!(snapshot.recording, RecordingStatus::Active { .. })
        })
        .await;

    session.cancel_recording();
    let cancelled = observer
        .change_where(|snapshot| snapshot.recording == RecordingStatus::Idle)
        .await;
    assert!(cancelled.staged.is_none(), "nothing is staged on cancel");
}

#[tokio::test(start_paused = true)]
async fn test_device_closing_finalizes_the_recording() {
    let device = ScriptedCaptureDevice::with_closing_stream(vec![Bytes::from_static(b"ab")]);
    let (session, mut observer) =
        observed(SessionBuilder::new().with_capture_device(device));

    session.start_recording();
    // The stream ends right after its chunks; no stop is ever sent.
    let stopped = observer
        .change_where(|snapshot| {
            snapshot.recording == RecordingStatus::Idle && snapshot.staged.is_some()
        })
        .await;
    let staged = stopped.staged.expect("the capture should be staged");
    assert_eq!(staged.file().name, "recording.webm");
    assert_eq!(staged.file().data, Bytes::from_static(b"ab"));
}

#[tokio::test]
async fn test_cancel_before_the_grant_abandons_it() {
    let device = ScriptedCaptureDevice::with_chunks(vec![Bytes::from_static(b"ab")]);
    let (session, mut observer) =
        observed(SessionBuilder::new().with_capture_device(device));

    // Both land in the mailbox before the permission decision arrives,
    // so the grant carries the id of an abandoned request.
    session.start_recording();
    session.cancel_recording();

    let requesting = observer.next_change().await;
    assert_eq!(requesting.recording, RecordingStatus::Requesting);
    let idle = observer.next_change().await;
    assert_eq!(idle.recording, RecordingStatus::Idle);

    // A sentinel change shows the late grant never activated anything.
    session.stage_file(text_file());
    let snapshot = observer.next_change().await;
    assert_eq!(snapshot.recording, RecordingStatus::Idle);

    // The recorder is still usable afterwards.
    session.start_recording();
    observer
        .change_where(|snapshot| {
            matches!(snapshot.recording, RecordingStatus::Active { elapsed_secs: 0 })
        })
        .await;
}

#[tokio::test]
async fn test_denied_capture_raises_an_alert() {
    let device = ScriptedCaptureDevice::denied("no mic");
    let (session, mut observer) =
        observed(SessionBuilder::new().with_capture_device(device));

    session.start_recording();
    let requesting = observer.next_change().await;
    assert_eq!(requesting.recording, RecordingStatus::Requesting);

    let SessionAlert::MicrophoneDenied { reason } = observer.next_alert().await;
    assert_eq!(reason, "no mic");

    let idle = observer.next_change().await;
    assert_eq!(idle.recording, RecordingStatus::Idle);
    assert!(idle.staged.is_none());
}

#[tokio::test]
async fn test_start_without_a_device_raises_an_alert() {
    let (session, mut observer) = observed(SessionBuilder::new());

    session.start_recording();
    let SessionAlert::MicrophoneDenied { .. } = observer.next_alert().await;

    session.stage_file(text_file());
    let snapshot = observer.next_change().await;
    assert_eq!(snapshot.recording, RecordingStatus::Idle);
}
