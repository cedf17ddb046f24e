//! A terminal playground over conversation sessions.
//!
//! The crate binds the OpenAI-backed capabilities onto the session core
//! and persists the API key between runs. It includes a CLI binary and
//! can also be embedded as a library.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod capability;
mod credentials;

pub use capability::{Capability, bind_capability};
pub use credentials::CredentialStore;

/// Re-exports of [`playground_core`] crate.
pub mod core {
    pub use playground_core::*;
}
