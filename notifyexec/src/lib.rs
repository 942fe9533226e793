//! notifyexec - run a command whenever a watched directory changes.
//!
//! This crate watches a directory for filesystem events and, for every event
//! that makes it through pacing and filtering, starts an external command
//! with event fields substituted into its arguments.
//!
//! # Pipeline
//!
//! ```text
//! EventSource -> EventGate -> template::render -> Dispatch
//! ```
//!
//! # Modules
//!
//! - [`types`]: Event and event-mask types
//! - [`source`]: Event source trait and the notify-backed implementation
//! - [`gate`]: Pacing and include/exclude filtering
//! - [`template`]: Placeholder substitution into command arguments
//! - [`dispatch`]: Detached command spawning
//! - [`driver`]: The driver loop state machine
//! - [`config`]: Validated watch configuration
//! - [`cli`]: Command-line parsing
//! - [`error`]: Error types for notifyexec operations

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod gate;
pub mod source;
pub mod template;
pub mod types;

pub use cli::{normalize_args, Cli, LogFormat};
pub use config::{resolve_event_mask, ConfigError, EventFilter, WatchConfig, WatchOptions};
pub use dispatch::{CommandDispatcher, Dispatch, DispatchError, Dispatched};
pub use driver::{Driver, DriverState, RunSummary, Termination};
pub use error::{NotifyExecError, Result};
pub use gate::{Admission, Clock, EventGate, PacingState, SystemClock, PACE_BACKOFF};
pub use source::{map_notify_event, EventSource, NotifySource, WatcherError};
pub use template::render;
pub use types::{Event, EventMask};
