//! The driver loop.
//!
//! Ties the pipeline together:
//!
//! ```text
//! EventSource -> EventGate -> template::render -> Dispatch
//! ```
//!
//! State machine:
//!
//! ```text
//! Init -> Watching -> Dispatched -> Watching
//!                              \-> Terminated   (one-shot)
//!         Watching -> Terminated                (source closed or faulted)
//! ```
//!
//! The source is closed on every path out of [`Driver::run`].

use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::WatchConfig;
use crate::dispatch::Dispatch;
use crate::error::Result;
use crate::gate::{Admission, Clock, EventGate, PacingState, PACE_BACKOFF};
use crate::source::EventSource;
use crate::template;
use crate::types::Event;

/// Where the driver loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Init,
    Watching,
    Dispatched,
    Terminated,
}

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// One-shot mode and an event was dispatched.
    OneShot,
    /// The event source closed its stream.
    SourceClosed,
}

/// Counters reported when a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub termination: Termination,
    pub received: u64,
    pub admitted: u64,
    pub dispatched: u64,
    pub failed_dispatches: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: u64,
    admitted: u64,
    dispatched: u64,
    failed_dispatches: u64,
}

/// Runs the event pipeline for one watch.
#[derive(Debug)]
pub struct Driver<S, D, C> {
    config: WatchConfig,
    gate: EventGate,
    source: S,
    dispatcher: D,
    clock: C,
    pacing: PacingState,
    pace_backoff: Duration,
    state: DriverState,
    counters: Counters,
}

impl<S, D, C> Driver<S, D, C>
where
    S: EventSource,
    D: Dispatch,
    C: Clock,
{
    #[must_use]
    pub fn new(config: WatchConfig, source: S, dispatcher: D, clock: C) -> Self {
        let gate = config.gate();
        let pacing = PacingState::new(clock.now_secs());

        Self {
            config,
            gate,
            source,
            dispatcher,
            clock,
            pacing,
            pace_backoff: PACE_BACKOFF,
            state: DriverState::Init,
            counters: Counters::default(),
        }
    }

    /// Overrides the pause taken after a paced-out event.
    #[must_use]
    pub fn with_pace_backoff(mut self, backoff: Duration) -> Self {
        self.pace_backoff = backoff;
        self
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Subscribes, processes events until termination, then closes the source.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch cannot be registered or the source
    /// reports a fault. Command start failures are not errors.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let result = self.watch().await;

        self.source.close();
        self.state = DriverState::Terminated;

        match &result {
            Ok(summary) => info!(
                termination = ?summary.termination,
                received = summary.received,
                admitted = summary.admitted,
                dispatched = summary.dispatched,
                failed = summary.failed_dispatches,
                "Watch finished"
            ),
            Err(e) => error!(error = %e, "Watch aborted"),
        }

        result
    }

    async fn watch(&mut self) -> Result<RunSummary> {
        self.source
            .subscribe(&self.config.watch_path, self.config.event_mask)?;

        self.pacing = PacingState::new(self.clock.now_secs());
        self.state = DriverState::Watching;

        info!(
            path = %self.config.watch_path.display(),
            command = %self.config.command,
            one_shot = self.config.one_shot,
            pace = self.config.pace,
            "Watching for events"
        );

        loop {
            let event = match self.source.recv().await {
                Some(Ok(event)) => event,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    debug!("Event source closed");
                    return Ok(self.summary(Termination::SourceClosed));
                }
            };

            self.counters.received += 1;

            if self.process(&event).await && self.config.one_shot {
                return Ok(self.summary(Termination::OneShot));
            }
        }
    }

    /// Handles one event. Returns `true` if a dispatch was attempted.
    async fn process(&mut self, event: &Event) -> bool {
        let now = self.clock.now_secs();

        match self.gate.admit(event, &mut self.pacing, now) {
            Admission::Admitted => {}
            Admission::Paced => {
                debug!(name = %event.name, "Event paced out");
                tokio::time::sleep(self.pace_backoff).await;
                return false;
            }
            dropped => {
                debug!(name = %event.name, reason = ?dropped, "Event filtered out");
                return false;
            }
        }

        self.counters.admitted += 1;
        info!("{event}");

        let args = template::render(self.config.template.as_slice(), event);
        self.state = DriverState::Dispatched;

        match self.dispatcher.dispatch(&self.config.command, &args) {
            Ok(dispatched) => {
                self.counters.dispatched += 1;
                debug!(pid = ?dispatched.pid, ?args, "Dispatched command");
            }
            Err(e) => {
                self.counters.failed_dispatches += 1;
                error!(error = %e, "Error while running command");
            }
        }

        self.state = DriverState::Watching;
        true
    }

    fn summary(&self, termination: Termination) -> RunSummary {
        RunSummary {
            termination,
            received: self.counters.received,
            admitted: self.counters.admitted,
            dispatched: self.counters.dispatched,
            failed_dispatches: self.counters.failed_dispatches,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::config::WatchOptions;
    use crate::dispatch::{DispatchError, Dispatched};
    use crate::source::{self, WatcherError};
    use crate::types::EventMask;

    #[derive(Default)]
    struct ScriptedSource {
        events: VecDeque<source::Result<Event>>,
        subscribed: Option<(PathBuf, EventMask)>,
        fail_subscribe: bool,
        receives: usize,
        closed: bool,
    }

    impl EventSource for ScriptedSource {
        fn subscribe(&mut self, path: &Path, mask: EventMask) -> source::Result<()> {
            if self.fail_subscribe {
                return Err(WatcherError::DirectoryNotFound(path.to_path_buf()));
            }
            self.subscribed = Some((path.to_path_buf(), mask));
            Ok(())
        }

        async fn recv(&mut self) -> Option<source::Result<Event>> {
            self.receives += 1;
            self.events.pop_front()
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        calls: RefCell<Vec<(String, Vec<String>)>>,
        fail: bool,
    }

    impl Dispatch for RecordingDispatcher {
        fn dispatch(
            &self,
            command: &str,
            args: &[String],
        ) -> std::result::Result<Dispatched, DispatchError> {
            self.calls
                .borrow_mut()
                .push((command.to_string(), args.to_vec()));
            if self.fail {
                return Err(DispatchError::Spawn {
                    command: command.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                });
            }
            Ok(Dispatched { pid: Some(1) })
        }
    }

    /// Clock that advances one second per reading.
    struct TickingClock(std::cell::Cell<i64>);

    impl Clock for TickingClock {
        fn now_secs(&self) -> i64 {
            let now = self.0.get();
            self.0.set(now + 1);
            now
        }
    }

    struct FrozenClock(i64);

    impl Clock for FrozenClock {
        fn now_secs(&self) -> i64 {
            self.0
        }
    }

    fn config(options: WatchOptions) -> WatchConfig {
        WatchConfig::new(options).unwrap()
    }

    fn created(name: &str) -> source::Result<Event> {
        Ok(Event::new(0, name, EventMask::CREATE))
    }

    fn source_with(events: Vec<source::Result<Event>>) -> ScriptedSource {
        ScriptedSource {
            events: events.into(),
            ..ScriptedSource::default()
        }
    }

    #[tokio::test]
    async fn admitted_events_dispatch_rendered_arguments() {
        let options = WatchOptions {
            params: vec!["[[Filename]]".to_string(), "#[[Cookie]]".to_string()],
            ..WatchOptions::new("handler")
        };
        let events = vec![Ok(Event::new(4, "a.txt", EventMask::CREATE))];
        let mut driver = Driver::new(
            config(options),
            source_with(events),
            RecordingDispatcher::default(),
            TickingClock(std::cell::Cell::new(0)),
        );

        let summary = driver.run().await.unwrap();

        assert_eq!(summary.termination, Termination::SourceClosed);
        assert_eq!(summary.dispatched, 1);
        assert_eq!(
            *driver.dispatcher.calls.borrow(),
            vec![(
                "handler".to_string(),
                vec!["a.txt".to_string(), "#4".to_string()]
            )]
        );
        assert_eq!(driver.state(), DriverState::Terminated);
        assert!(driver.source().closed);
    }

    #[tokio::test]
    async fn subscribes_with_configured_path_and_mask() {
        let options = WatchOptions {
            event: "delete".to_string(),
            path: PathBuf::from("/srv/in"),
            ..WatchOptions::new("x")
        };
        let mut driver = Driver::new(
            config(options),
            ScriptedSource::default(),
            RecordingDispatcher::default(),
            FrozenClock(0),
        );

        driver.run().await.unwrap();

        assert_eq!(
            driver.source().subscribed,
            Some((PathBuf::from("/srv/in"), EventMask::DELETE))
        );
    }

    #[tokio::test]
    async fn one_shot_stops_receiving_after_first_dispatch() {
        let options = WatchOptions {
            one_shot: true,
            pace: false,
            ..WatchOptions::new("x")
        };
        let mut driver = Driver::new(
            config(options),
            source_with(vec![created("a"), created("b"), created("c")]),
            RecordingDispatcher::default(),
            FrozenClock(0),
        );

        let summary = driver.run().await.unwrap();

        assert_eq!(summary.termination, Termination::OneShot);
        assert_eq!(summary.dispatched, 1);
        assert_eq!(driver.source().receives, 1);
        assert!(driver.source().closed);
    }

    #[tokio::test]
    async fn one_shot_terminates_even_when_spawn_fails() {
        let options = WatchOptions {
            one_shot: true,
            pace: false,
            ..WatchOptions::new("x")
        };
        let dispatcher = RecordingDispatcher {
            fail: true,
            ..RecordingDispatcher::default()
        };
        let mut driver = Driver::new(
            config(options),
            source_with(vec![created("a"), created("b")]),
            dispatcher,
            FrozenClock(0),
        );

        let summary = driver.run().await.unwrap();

        assert_eq!(summary.termination, Termination::OneShot);
        assert_eq!(summary.failed_dispatches, 1);
        assert_eq!(driver.source().receives, 1);
    }

    #[tokio::test]
    async fn one_shot_waits_for_an_admitted_event() {
        let options = WatchOptions {
            one_shot: true,
            pace: false,
            filter: r"\.txt$".to_string(),
            ..WatchOptions::new("x")
        };
        let mut driver = Driver::new(
            config(options),
            source_with(vec![created("a.log"), created("b.txt"), created("c.txt")]),
            RecordingDispatcher::default(),
            FrozenClock(0),
        );

        let summary = driver.run().await.unwrap();

        assert_eq!(summary.received, 2);
        assert_eq!(driver.dispatcher.calls.borrow()[0].1, Vec::<String>::new());
        assert_eq!(driver.source().receives, 2);
    }

    #[tokio::test]
    async fn spawn_failures_do_not_stop_the_loop() {
        let options = WatchOptions {
            pace: false,
            ..WatchOptions::new("x")
        };
        let dispatcher = RecordingDispatcher {
            fail: true,
            ..RecordingDispatcher::default()
        };
        let mut driver = Driver::new(
            config(options),
            source_with(vec![created("a"), created("b")]),
            dispatcher,
            FrozenClock(0),
        );

        let summary = driver.run().await.unwrap();

        assert_eq!(summary.failed_dispatches, 2);
        assert_eq!(summary.dispatched, 0);
        assert_eq!(summary.termination, Termination::SourceClosed);
    }

    #[tokio::test]
    async fn pacing_drops_events_within_the_same_second() {
        let mut driver = Driver::new(
            config(WatchOptions::new("x")),
            source_with(vec![created("a"), created("b"), created("c")]),
            RecordingDispatcher::default(),
            FrozenClock(100),
        )
        .with_pace_backoff(Duration::ZERO);

        // The frozen clock keeps every event in the startup second.
        let summary = driver.run().await.unwrap();

        assert_eq!(summary.received, 3);
        assert_eq!(summary.admitted, 0);
    }

    #[tokio::test]
    async fn provider_error_terminates_and_closes_source() {
        let events = vec![
            created("a"),
            Err(WatcherError::Provider(notify::Error::generic("overflow"))),
            created("b"),
        ];
        let options = WatchOptions {
            pace: false,
            ..WatchOptions::new("x")
        };
        let mut driver = Driver::new(
            config(options),
            source_with(events),
            RecordingDispatcher::default(),
            FrozenClock(0),
        );

        let err = driver.run().await.unwrap_err();

        assert!(matches!(
            err,
            crate::error::NotifyExecError::Watch(WatcherError::Provider(_))
        ));
        assert_eq!(driver.dispatcher.calls.borrow().len(), 1);
        assert_eq!(driver.source().receives, 2);
        assert!(driver.source().closed);
        assert_eq!(driver.state(), DriverState::Terminated);
    }

    #[tokio::test]
    async fn subscribe_failure_is_fatal_and_receives_nothing() {
        let source = ScriptedSource {
            fail_subscribe: true,
            ..source_with(vec![created("a")])
        };
        let mut driver = Driver::new(
            config(WatchOptions::new("x")),
            source,
            RecordingDispatcher::default(),
            FrozenClock(0),
        );

        assert!(driver.run().await.is_err());
        assert_eq!(driver.source().receives, 0);
        assert!(driver.source().closed);
    }

    #[test]
    fn new_driver_starts_in_init() {
        let driver = Driver::new(
            config(WatchOptions::new("x")),
            ScriptedSource::default(),
            RecordingDispatcher::default(),
            FrozenClock(0),
        );
        assert_eq!(driver.state(), DriverState::Init);
        assert_eq!(driver.config().command, "x");
    }
}
