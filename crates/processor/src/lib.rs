//! The collaborator boundary of the playground.
//!
//! Each capability (chat, vision, transcription) plugs into the session
//! by supplying a type that implements [`Processor`]; the microphone
//! plugs in as a [`CaptureDevice`]. This crate defines those contracts
//! and the data types that cross them, so that the session core never
//! needs to know which capability it is driving.
//!
//! Types in this crate don't define any behavior, they are the
//! constraints that the implementors should adhere to. Whether a request
//! produces a finished string or an incremental stream is decided by the
//! implementor and expressed as an explicit [`ProcessorOutput`] variant,
//! never inspected dynamically by the consumer.

#![deny(missing_docs)]

mod capture;
mod contract;
mod error;
mod request;
mod response;

pub use capture::*;
pub use contract::*;
pub use error::*;
pub use request::*;
pub use response::*;
