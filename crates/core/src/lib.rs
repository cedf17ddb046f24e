//! The conversation session core.
//!
//! This crate owns everything between the input widgets and the
//! capability bindings: the ordered message log, the staged attachment
//! and its preview, the microphone recording lifecycle, and the folding
//! of scalar or streamed responses into the trailing assistant message.
//! Presentation and the provider wire protocol both live elsewhere.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod attachment;
mod client;
mod log;
mod recording;
mod session;

pub use attachment::StagedInput;
pub use log::{Attachment, MediaKind, Message, Preview, PreviewHandle};
pub use session::{
    RecordingStatus, Session, SessionAlert, SessionBuilder, Snapshot,
};
