//! Command-line surface.
//!
//! Flags may be written Go-style with a single dash (`-event=create`,
//! `-one-shot`) or with the usual double dash. Everything from the first
//! positional argument on belongs to the command being run and is passed
//! through untouched, hyphens included.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::config::{WatchOptions, DEFAULT_EVENT_KEYWORD, DEFAULT_INCLUDE_PATTERN};

/// Long flags that take a value.
const VALUE_FLAGS: &[&str] = &["event", "filter", "exclude", "path", "log-format"];

/// Long flags that take an optional `=true|false`.
const SWITCH_FLAGS: &[&str] = &["one-shot", "pace", "help", "version"];

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// notifyexec - run a command whenever the watched directory changes.
#[derive(Parser, Debug)]
#[command(name = "notifyexec")]
#[command(author, version, about, long_about = None)]
#[command(override_usage = "notifyexec [OPTIONS] <COMMAND> [PARAMS]...")]
#[command(after_help = "\
PLACEHOLDERS:
    Each PARAM may contain placeholders replaced with values of the event:
    [[Cookie]]      unique cookie of the event (links both halves of a move)
    [[Filename]]    file/directory name
    [[Info]]        debug description of the event

EXAMPLES:
    # Open newly created files in an editor
    notifyexec -event=create code [[Filename]]

    # Log every change to a .rs file, at most once per second
    notifyexec -filter='\\.rs$' echo changed: [[Info]]

    # Convert the first uploaded image, then exit
    notifyexec -one-shot -event=close -exclude='^\\.' convert [[Filename]] out.png
")]
pub struct Cli {
    /// Events to react to: all, access, close, create, delete, modify, move.
    ///
    /// Plain reads are not reported by the platform notifier: `access` never
    /// fires and `close` only fires after a write.
    #[arg(long, default_value = DEFAULT_EVENT_KEYWORD)]
    pub event: String,

    /// Only execute once, then stop watching.
    #[arg(
        long = "one-shot",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true"
    )]
    pub one_shot: bool,

    /// Only execute once a second (--pace=false to disable).
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub pace: bool,

    /// Only react to names matching this regex (empty: no filter).
    #[arg(long, default_value = DEFAULT_INCLUDE_PATTERN)]
    pub filter: String,

    /// Ignore names matching this regex (default: exclude none).
    #[arg(long)]
    pub exclude: Option<String>,

    /// Directory to watch.
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Command to execute for each event.
    pub command: Option<String>,

    /// Parameters passed to the command; may contain placeholders.
    pub params: Vec<String>,
}

impl Cli {
    /// Parses the process arguments, accepting single-dash long flags.
    #[must_use]
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    /// Parses `args` (program name first), accepting single-dash long flags.
    ///
    /// # Errors
    ///
    /// Returns the clap error for unknown flags or invalid values.
    pub fn try_parse_normalized_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_args(args))
    }

    /// Converts to [`WatchOptions`], or `None` when no command was given.
    #[must_use]
    pub fn watch_options(&self) -> Option<WatchOptions> {
        let command = self.command.clone().filter(|c| !c.is_empty())?;

        Some(WatchOptions {
            event: self.event.clone(),
            one_shot: self.one_shot,
            pace: self.pace,
            filter: self.filter.clone(),
            exclude: self.exclude.clone().unwrap_or_default(),
            path: self.path.clone(),
            command,
            params: self.params.clone(),
        })
    }
}

/// Rewrites Go-style flags into clap's double-dash form.
///
/// The first element is the program name and is kept as is. Scanning stops
/// at the first positional argument or at `--`; a `--` is inserted before the
/// positional so the command's own flags never reach clap.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    let mut out: Vec<OsString> = args.next().into_iter().collect();

    while let Some(arg) = args.next() {
        let Some(text) = arg.to_str() else {
            out.push("--".into());
            out.push(arg);
            break;
        };

        if text == "--" {
            out.push(arg);
            break;
        }

        if text.len() < 2 || !text.starts_with('-') {
            out.push("--".into());
            out.push(arg);
            break;
        }

        let flag = text.strip_prefix("--").unwrap_or(&text[1..]);
        let (name, has_value) = match flag.split_once('=') {
            Some((name, _)) => (name, true),
            None => (flag, false),
        };

        if VALUE_FLAGS.contains(&name) {
            out.push(format!("--{flag}").into());
            if !has_value {
                if let Some(value) = args.next() {
                    out.push(value);
                }
            }
        } else if SWITCH_FLAGS.contains(&name) {
            out.push(format!("--{flag}").into());
        } else {
            out.push(arg);
        }
    }

    out.extend(args);
    out
}
