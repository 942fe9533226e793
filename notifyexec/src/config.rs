//! Watch configuration.
//!
//! A [`WatchConfig`] is built once at startup from the command line and is
//! read-only afterwards. Everything that can be rejected is rejected here,
//! before any watch is registered:
//!
//! | Setting | Default | Notes |
//! |---------|---------|-------|
//! | event keyword | `all` | unknown keywords fall back to `all` with a warning |
//! | include pattern | `.*` | empty disables inclusion filtering |
//! | exclude pattern | (empty) | empty disables exclusion filtering |
//! | pace | `true` | one admitted event per second |
//! | one-shot | `false` | stop after the first dispatch |
//! | watch path | `.` | watched non-recursively |

use std::path::PathBuf;
use std::str::FromStr;

use regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::gate::EventGate;
use crate::types::EventMask;

/// Default include pattern: everything.
pub const DEFAULT_INCLUDE_PATTERN: &str = ".*";

/// Default event keyword.
pub const DEFAULT_EVENT_KEYWORD: &str = "all";

/// Errors that can occur while building a [`WatchConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A `--filter` or `--exclude` pattern failed to compile.
    #[error("invalid regex for --{flag}: {source}")]
    InvalidPattern {
        flag: &'static str,
        #[source]
        source: regex::Error,
    },

    /// No command was given.
    #[error("no command given")]
    MissingCommand,
}

/// Event-kind keywords accepted by `--event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Access,
    Close,
    Create,
    Delete,
    Modify,
    Move,
}

impl EventFilter {
    /// Every keyword, in the order shown in usage text.
    pub const ALL_KEYWORDS: [EventFilter; 7] = [
        Self::All,
        Self::Access,
        Self::Close,
        Self::Create,
        Self::Delete,
        Self::Modify,
        Self::Move,
    ];

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Access => "access",
            Self::Close => "close",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Modify => "modify",
            Self::Move => "move",
        }
    }

    #[must_use]
    pub fn mask(self) -> EventMask {
        match self {
            Self::All => EventMask::ALL_EVENTS,
            Self::Access => EventMask::ACCESS,
            Self::Close => EventMask::CLOSE,
            Self::Create => EventMask::CREATE,
            Self::Delete => EventMask::DELETE,
            Self::Modify => EventMask::MODIFY,
            Self::Move => EventMask::MOVE,
        }
    }
}

impl FromStr for EventFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL_KEYWORDS
            .into_iter()
            .find(|filter| filter.keyword() == s)
            .ok_or_else(|| format!("unknown event keyword '{s}'"))
    }
}

/// Resolves an `--event` keyword to a mask.
///
/// Unknown keywords are not an error: they log a warning and select every
/// event kind.
#[must_use]
pub fn resolve_event_mask(keyword: &str) -> EventMask {
    match keyword.parse::<EventFilter>() {
        Ok(filter) => filter.mask(),
        Err(_) => {
            warn!(keyword, "Unknown event mode, listening to all events");
            EventMask::ALL_EVENTS
        }
    }
}

/// Compiles `pattern`, treating the empty string as "no pattern".
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPattern`] if the pattern does not compile.
pub fn compile_pattern(flag: &'static str, pattern: &str) -> Result<Option<Regex>, ConfigError> {
    if pattern.is_empty() {
        return Ok(None);
    }

    Regex::new(pattern)
        .map(Some)
        .map_err(|source| ConfigError::InvalidPattern { flag, source })
}

/// Validated configuration for one watch session.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Kinds of events to subscribe to.
    pub event_mask: EventMask,
    /// Stop after the first dispatch attempt.
    pub one_shot: bool,
    /// Admit at most one event per second.
    pub pace: bool,
    /// Names must match this to be admitted.
    pub include: Option<Regex>,
    /// Names matching this are dropped.
    pub exclude: Option<Regex>,
    /// Program to run for each admitted event.
    pub command: String,
    /// Argument template, rendered per event.
    pub template: Vec<String>,
    /// Directory to watch.
    pub watch_path: PathBuf,
}

impl WatchConfig {
    /// Builds a config from raw option values.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if either pattern fails to compile or the
    /// command is empty.
    pub fn new(options: WatchOptions) -> Result<Self, ConfigError> {
        if options.command.is_empty() {
            return Err(ConfigError::MissingCommand);
        }

        let include = compile_pattern("filter", &options.filter)?;
        let exclude = compile_pattern("exclude", &options.exclude)?;

        Ok(Self {
            event_mask: resolve_event_mask(&options.event),
            one_shot: options.one_shot,
            pace: options.pace,
            include,
            exclude,
            command: options.command,
            template: options.params,
            watch_path: options.path,
        })
    }

    /// Builds the admission gate for this config.
    #[must_use]
    pub fn gate(&self) -> EventGate {
        EventGate::new(self.pace, self.include.clone(), self.exclude.clone())
    }
}

/// Unvalidated option values, as collected from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    pub event: String,
    pub one_shot: bool,
    pub pace: bool,
    pub filter: String,
    pub exclude: String,
    pub path: PathBuf,
    pub command: String,
    pub params: Vec<String>,
}

impl WatchOptions {
    /// Options with every default applied, running `command`.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            event: DEFAULT_EVENT_KEYWORD.to_string(),
            one_shot: false,
            pace: true,
            filter: DEFAULT_INCLUDE_PATTERN.to_string(),
            exclude: String::new(),
            path: PathBuf::from("."),
            command: command.into(),
            params: Vec::new(),
        }
    }
}
