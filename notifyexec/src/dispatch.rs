//! Command dispatch.
//!
//! Commands are spawned directly (never through a shell) with stdin, stdout
//! and stderr inherited from notifyexec. The child handle is dropped right
//! after spawning: nothing waits on it, nothing limits how many run at once,
//! and nothing kills it when notifyexec exits. The tokio runtime reaps
//! children that exit while it is still running.

use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors that can occur while starting a command.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The OS refused to start the process (not found, permission denied, ...).
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// A successfully started, detached command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    /// Process id, when the OS reports one.
    pub pid: Option<u32>,
}

/// Something that can start a command for an admitted event.
pub trait Dispatch {
    /// Starts `command` with `args` and returns without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`] if the process could not be started.
    fn dispatch(&self, command: &str, args: &[String]) -> Result<Dispatched, DispatchError>;
}

/// Spawns real processes with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandDispatcher;

impl Dispatch for CommandDispatcher {
    fn dispatch(&self, command: &str, args: &[String]) -> Result<Dispatched, DispatchError> {
        let child = Command::new(command)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| DispatchError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let pid = child.id();
        debug!(command, ?pid, "Command started");

        // Detach: dropping the handle neither waits for nor kills the child.
        drop(child);

        Ok(Dispatched { pid })
    }
}
