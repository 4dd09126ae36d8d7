//! Host subscription primitives
//!
//! Expression values may arrive later than the render that binds them. Two
//! shapes are supported: a [`Deferred`] settles once, a [`Source`] pushes any
//! number of values to a [`Sink`] until it completes or fails. Both hand back
//! a [`Subscription`]; dropping or unsubscribing it stops delivery for good.
//!
//! Everything here is single-threaded (`Rc` based). Adapters for `futures`
//! streams and futures spawn onto a caller-supplied local executor.

mod deferred;
mod source;
mod subscription;

pub use deferred::{Deferred, Settle};
pub use source::{Notification, Sink, Source};
pub use subscription::Subscription;

use thiserror::Error;

/// Error signalled by an asynchronous source
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SourceError {
    pub message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for SourceError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for SourceError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<futures::task::SpawnError> for SourceError {
    fn from(err: futures::task::SpawnError) -> Self {
        Self::new(format!("cannot spawn source task: {err}"))
    }
}
