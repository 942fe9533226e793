//! Filesystem event source.
//!
//! [`EventSource`] is the seam between the driver loop and the platform
//! notification provider. [`NotifySource`] implements it on top of the
//! [`notify`] crate.
//!
//! # Architecture
//!
//! The notify callback runs on the provider's own thread. It only maps the
//! raw notification into [`Event`]s, discards kinds outside the subscribed
//! mask, and forwards the rest through a bounded channel with `try_send`.
//! The driver loop owns the receiving end.
//!
//! Watching is non-recursive: only direct children of the watched directory
//! (and the directory itself) produce events.

use std::path::{Path, PathBuf};

use notify::{
    event::{AccessKind, AccessMode, ModifyKind, RenameMode},
    Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::types::{Event, EventMask};

/// Default capacity of the channel between the notify callback and the driver.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Kinds the notify backends never subscribe to (plain reads, close after read).
pub const UNDELIVERABLE_KINDS: EventMask =
    EventMask::from_bits(EventMask::ACCESS.bits() | EventMask::CLOSE_NOWRITE.bits());

/// Returns `true` if `mask` selects nothing the provider can deliver.
#[must_use]
pub fn is_undeliverable(mask: EventMask) -> bool {
    UNDELIVERABLE_KINDS.contains(mask)
}

/// Errors that can occur while watching.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialise the watcher or register the watch.
    #[error("failed to add watch: {0}")]
    WatcherInit(#[from] notify::Error),

    /// The provider reported a fault after the watch was registered.
    #[error("notification provider error: {0}")]
    Provider(#[source] notify::Error),

    /// The watch path does not exist or is inaccessible.
    #[error("watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    /// `subscribe` was called on a source that is already watching.
    #[error("event source is already subscribed")]
    AlreadySubscribed,
}

/// Result type for event source operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// A stream of filesystem events for a single watched path.
#[allow(async_fn_in_trait)]
pub trait EventSource {
    /// Registers a watch on `path` for the kinds in `mask`.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch cannot be registered.
    fn subscribe(&mut self, path: &Path, mask: EventMask) -> Result<()>;

    /// Waits for the next event.
    ///
    /// Returns `None` once the source is closed, and `Some(Err(_))` when the
    /// provider reports a fault.
    async fn recv(&mut self) -> Option<Result<Event>>;

    /// Unregisters the watch. Subsequent calls to `recv` return `None`.
    fn close(&mut self);
}

/// [`EventSource`] backed by the platform's recommended notify watcher.
#[derive(Debug)]
pub struct NotifySource {
    capacity: usize,
    watcher: Option<RecommendedWatcher>,
    receiver: Option<mpsc::Receiver<Result<Event>>>,
    root: Option<PathBuf>,
}

impl NotifySource {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a source whose internal channel holds up to `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            watcher: None,
            receiver: None,
            root: None,
        }
    }

    /// Returns the canonical directory being watched, if subscribed.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

impl Default for NotifySource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for NotifySource {
    fn subscribe(&mut self, path: &Path, mask: EventMask) -> Result<()> {
        if self.watcher.is_some() {
            return Err(WatcherError::AlreadySubscribed);
        }

        let root = path
            .canonicalize()
            .map_err(|_| WatcherError::DirectoryNotFound(path.to_path_buf()))?;

        if is_undeliverable(mask) {
            warn!(
                mask = %mask,
                "Requested events are never reported by this platform's notifier, nothing will fire"
            );
        } else if mask.intersects(UNDELIVERABLE_KINDS) {
            debug!(mask = %mask, "Access and close-after-read events will not be reported");
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        let callback_root = root.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| {
                handle_notify_event(res, &callback_root, mask, &tx);
            },
            Config::default(),
        )?;

        watcher.watch(&root, RecursiveMode::NonRecursive)?;

        info!(path = %root.display(), mask = %mask, "Watch registered");

        self.watcher = Some(watcher);
        self.receiver = Some(rx);
        self.root = Some(root);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Event>> {
        self.receiver.as_mut()?.recv().await
    }

    fn close(&mut self) {
        if let (Some(mut watcher), Some(root)) = (self.watcher.take(), self.root.as_ref()) {
            if let Err(e) = watcher.unwatch(root) {
                debug!(error = %e, "Failed to unwatch, dropping watcher anyway");
            }
            info!(path = %root.display(), "Watch released");
        }
        self.receiver = None;
    }
}

/// Notify callback: map, filter by mask, forward.
fn handle_notify_event(
    res: std::result::Result<notify::Event, notify::Error>,
    root: &Path,
    mask: EventMask,
    tx: &mpsc::Sender<Result<Event>>,
) {
    let raw = match res {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "File watcher error");
            forward(tx, Err(WatcherError::Provider(e)));
            return;
        }
    };

    trace!(kind = ?raw.kind, paths = ?raw.paths, "Received notify event");

    for event in map_notify_event(&raw, root) {
        if mask.intersects(event.mask) {
            forward(tx, Ok(event));
        } else {
            trace!(name = %event.name, kind = %event.mask, "Event kind not subscribed");
        }
    }
}

fn forward(tx: &mpsc::Sender<Result<Event>>, item: Result<Event>) {
    // Never block the provider thread; a full channel loses the event.
    if let Err(e) = tx.try_send(item) {
        match e {
            mpsc::error::TrySendError::Full(_) => {
                warn!("Event channel full, dropping event");
            }
            mpsc::error::TrySendError::Closed(_) => {
                trace!("Event channel closed, dropping event");
            }
        }
    }
}

/// Maps one notify event onto zero or more [`Event`]s.
///
/// Paths are reported relative to `root`; an event on `root` itself has an
/// empty name and uses the `*_SELF` kinds where they apply.
#[must_use]
pub fn map_notify_event(raw: &notify::Event, root: &Path) -> Vec<Event> {
    // Trackers that do not fit a u32 cookie are reported as 0.
    let cookie = raw
        .attrs
        .tracker()
        .and_then(|t| u32::try_from(t).ok())
        .unwrap_or(0);

    // inotify also reports each rename as separate From and To events; the
    // combined event would duplicate them.
    if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = raw.kind {
        return Vec::new();
    }

    let kind_for = |path: &Path| -> Option<EventMask> {
        let is_root = path == root;
        let mask = match raw.kind {
            EventKind::Access(AccessKind::Open(_)) => EventMask::OPEN,
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => EventMask::CLOSE_WRITE,
            EventKind::Access(AccessKind::Close(_)) => EventMask::CLOSE_NOWRITE,
            EventKind::Access(_) => EventMask::ACCESS,
            EventKind::Create(_) => EventMask::CREATE,
            EventKind::Modify(ModifyKind::Name(_)) if is_root => EventMask::MOVE_SELF,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => EventMask::MOVED_FROM,
            EventKind::Modify(ModifyKind::Name(_)) => EventMask::MOVED_TO,
            EventKind::Modify(ModifyKind::Metadata(_)) => EventMask::ATTRIB,
            EventKind::Modify(_) => EventMask::MODIFY,
            EventKind::Remove(_) if is_root => EventMask::DELETE_SELF,
            EventKind::Remove(_) => EventMask::DELETE,
            EventKind::Any | EventKind::Other => return None,
        };
        Some(mask)
    };

    let name_of = |path: &Path| -> String {
        path.strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    };

    raw.paths
        .iter()
        .filter_map(|path| kind_for(path).map(|mask| Event::new(cookie, name_of(path), mask)))
        .collect()
}
