//! Error types for notifyexec.
//!
//! Errors fall into three groups:
//!
//! - [`ConfigError`]: bad command-line input. Fatal, reported before any
//!   watch is registered.
//! - [`WatcherError`]: watch registration or provider faults. Registration
//!   failures are fatal at startup; faults while watching end the loop.
//! - [`DispatchError`]: a command failed to start. Logged; the loop goes on.
//!
//! Nothing is retried.

use thiserror::Error;

use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use crate::source::WatcherError;

/// Errors that can end a notifyexec run.
#[derive(Error, Debug)]
pub enum NotifyExecError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File watching error.
    #[error("file watch error: {0}")]
    Watch(#[from] WatcherError),

    /// Command start error.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// A specialized `Result` type for notifyexec operations.
pub type Result<T> = std::result::Result<T, NotifyExecError>;
