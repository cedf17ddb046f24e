//! Capability bindings for OpenAI-compatible APIs.
//!
//! [`ChatProcessor`] drives the streaming chat completions endpoint,
//! with an optional vision mode that forwards image attachments as data
//! URIs. [`TranscriptionProcessor`] uploads an audio file and resolves
//! to the transcribed text in one shot. [`AssistantProcessor`] drives
//! the provider's persistent assistant threads, also in one shot.

#[macro_use]
extern crate tracing;

mod assistant;
mod chat;
mod config;
mod sse;
mod stream;
mod transcription;

use std::error::Error as StdError;
use std::fmt::{self, Display};

use playground_processor::{ErrorKind, ProcessorError};

pub use assistant::AssistantProcessor;
pub use chat::ChatProcessor;
pub use config::{OpenAIConfig, OpenAIConfigBuilder};
pub use stream::ChatStream;
pub use transcription::TranscriptionProcessor;

/// Error type for the OpenAI-backed processors.
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

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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

fn request_error(err: reqwest::Error) -> Error {
    let kind = if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
        ErrorKind::RateLimited
    } else {
        ErrorKind::Other
    };
    Error::new(format!("{err}"), kind)
}
