//! Scenario scheduler: orders events, paces them, and drives dispatch on
//! the caller's thread or on a background thread.
//!
//! Notification delivery and the power-flow hook run inline with dispatch,
//! so a slow consumer or solver delays every later event. The scheduler
//! never buffers or drops events to catch up.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::SchedulerError;
use crate::network::SharedNetwork;

use super::clock::{Due, Pacing, ScenarioClock};
use super::control::{CommandSender, RunControl, RunState, Wake};
use super::dispatch::EventDispatcher;
use super::event::Event;
use super::notifier::Notifier;
use super::powerflow::PowerFlowTrigger;
use super::schedule::ScenarioSchedule;

/// Summary of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// `Completed` or `Stopped`.
    pub state: RunState,
    /// Events in the schedule.
    pub total: usize,
    /// Events dispatched successfully.
    pub executed: usize,
    /// Events dropped because their target or kind could not be resolved.
    pub skipped: usize,
    /// Breaker commands applied during the run.
    pub commands: usize,
    /// Wall-clock duration of the run in seconds.
    pub elapsed_s: f64,
}

impl RunReport {
    fn new(total: usize) -> Self {
        Self {
            state: RunState::Running,
            total,
            executed: 0,
            skipped: 0,
            commands: 0,
            elapsed_s: 0.0,
        }
    }

    /// Scheduled events never reached because the run stopped early.
    pub fn pending(&self) -> usize {
        self.total - self.executed - self.skipped
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scenario {} after {:.2}s | executed={} skipped={} pending={} commands={}",
            self.state,
            self.elapsed_s,
            self.executed,
            self.skipped,
            self.pending(),
            self.commands,
        )
    }
}

/// Runs scenarios against a shared network, one at a time.
///
/// State machine: `Idle -> Running -> {Completed, Stopped}`, and back to
/// `Running` for the next run.
pub struct Scheduler {
    network: SharedNetwork,
    dispatcher: Arc<Mutex<EventDispatcher>>,
    control: Arc<RunControl>,
    handle: Option<JoinHandle<RunReport>>,
}

impl Scheduler {
    pub fn new(network: SharedNetwork, notifier: Notifier) -> Self {
        Self::from_dispatcher(EventDispatcher::new(network, notifier))
    }

    /// Builds a scheduler with the power-flow hook attached.
    pub fn with_powerflow(
        network: SharedNetwork,
        notifier: Notifier,
        trigger: PowerFlowTrigger,
    ) -> Self {
        Self::from_dispatcher(EventDispatcher::new(network, notifier).with_powerflow(trigger))
    }

    pub fn from_dispatcher(dispatcher: EventDispatcher) -> Self {
        Self {
            network: dispatcher.network().clone(),
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            control: RunControl::new(),
            handle: None,
        }
    }

    /// The network this scheduler mutates. Readers should take snapshots.
    pub fn network(&self) -> &SharedNetwork {
        &self.network
    }

    pub fn state(&self) -> RunState {
        self.control.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Handle for delivering breaker commands into runs of this scheduler.
    pub fn commands(&self) -> CommandSender {
        CommandSender::new(Arc::clone(&self.control))
    }

    /// Runs `events` on the calling thread until completion or cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if another run is active.
    pub fn run_scenario(
        &self,
        events: impl IntoIterator<Item = Event>,
        realtime: bool,
    ) -> Result<RunReport, SchedulerError> {
        if !self.control.try_begin() {
            return Err(SchedulerError::AlreadyRunning);
        }
        let mut guard = RunGuard::new(&self.control);
        let schedule = ScenarioSchedule::new(events);
        let report = drive(
            &self.dispatcher,
            &self.control,
            schedule,
            Pacing::from_realtime(realtime),
        );
        guard.state = report.state;
        Ok(report)
    }

    /// Starts `events` on a background thread and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if a previous run has not
    /// terminated, or [`SchedulerError::ThreadSpawn`] if the thread cannot
    /// be created.
    pub fn start_in_background(
        &mut self,
        events: impl IntoIterator<Item = Event>,
        realtime: bool,
    ) -> Result<(), SchedulerError> {
        if !self.control.try_begin() {
            return Err(SchedulerError::AlreadyRunning);
        }
        // reap the previous, already finished, thread
        self.join();

        let schedule = ScenarioSchedule::new(events);
        let dispatcher = Arc::clone(&self.dispatcher);
        let control = Arc::clone(&self.control);
        let pacing = Pacing::from_realtime(realtime);

        let spawned = thread::Builder::new()
            .name("n1-scenario".to_string())
            .spawn(move || {
                let mut guard = RunGuard::new(&control);
                let report = drive(&dispatcher, &control, schedule, pacing);
                guard.state = report.state;
                report
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                debug!("scenario started on background thread");
                Ok(())
            }
            Err(e) => {
                self.control.finish(RunState::Idle);
                Err(SchedulerError::ThreadSpawn(e))
            }
        }
    }

    /// Signals cancellation and waits up to `timeout` for the run to end.
    ///
    /// `None` or a zero timeout only signals. Returns `true` if no run is
    /// active when this returns. A background run's report stays available
    /// through [`Scheduler::join`].
    pub fn request_stop(&self, timeout: Option<Duration>) -> bool {
        self.control.cancel();
        let state = match timeout {
            Some(t) if !t.is_zero() => self.control.wait_finished(t),
            _ => self.control.state(),
        };
        state != RunState::Running
    }

    /// Waits for the background run to finish and returns its report.
    ///
    /// Returns `None` if there is no background run or its thread panicked.
    pub fn join(&mut self) -> Option<RunReport> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                error!("scenario thread panicked");
                None
            }
        }
    }
}

impl Drop for Scheduler {
    /// Cancels any background run; its thread exits at the next check point.
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.control.cancel();
        }
    }
}

/// Records the run's terminal state when dropped. A run that unwinds
/// before setting `state` ends as `Stopped`.
struct RunGuard<'a> {
    control: &'a RunControl,
    state: RunState,
}

impl<'a> RunGuard<'a> {
    fn new(control: &'a RunControl) -> Self {
        Self {
            control,
            state: RunState::Stopped,
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("scenario run panicked, marking it stopped");
        }
        self.control.finish(self.state);
    }
}

/// The run loop. Cancellation is checked before each wait and before each
/// dispatch; pending breaker commands are applied at the same points and
/// whenever they interrupt a wait.
fn drive(
    dispatcher: &Mutex<EventDispatcher>,
    control: &RunControl,
    schedule: ScenarioSchedule,
    pacing: Pacing,
) -> RunReport {
    let mut dispatcher = dispatcher.lock().unwrap_or_else(PoisonError::into_inner);
    let clock = ScenarioClock::start(pacing);
    let mut report = RunReport::new(schedule.len());

    info!(
        events = schedule.len(),
        horizon_s = schedule.horizon_s(),
        pacing = ?clock.pacing(),
        "scenario starting"
    );

    let mut stopped = false;
    'events: for event in schedule {
        if control.is_cancelled() {
            stopped = true;
            break;
        }
        report.commands += apply_commands(&mut dispatcher, control, &clock);

        let deadline = match clock.due(event.at_s()) {
            Due::Now => None,
            Due::At(at) => {
                debug!(
                    wait_s = event.at_s() - clock.elapsed_s(),
                    next = %event,
                    "waiting for next event"
                );
                Some(Some(at))
            }
            Due::Never => {
                warn!(next = %event, "offset beyond clock range, waiting until stopped");
                Some(None)
            }
        };
        if let Some(deadline) = deadline {
            loop {
                match control.wait_until(deadline) {
                    Wake::Due => break,
                    Wake::Cancelled => {
                        stopped = true;
                        break 'events;
                    }
                    Wake::Command => {
                        report.commands += apply_commands(&mut dispatcher, control, &clock);
                    }
                }
            }
        }

        if control.is_cancelled() {
            stopped = true;
            break;
        }
        report.commands += apply_commands(&mut dispatcher, control, &clock);

        match dispatcher.dispatch(&event) {
            Ok(()) => report.executed += 1,
            Err(_) => report.skipped += 1,
        }
    }

    report.elapsed_s = clock.elapsed_s();
    report.state = if stopped {
        info!(pending = report.pending(), "scenario stopped");
        RunState::Stopped
    } else {
        info!(
            executed = report.executed,
            skipped = report.skipped,
            "scenario finished"
        );
        RunState::Completed
    };
    report
}

fn apply_commands(
    dispatcher: &mut EventDispatcher,
    control: &RunControl,
    clock: &ScenarioClock,
) -> usize {
    let commands = control.drain_commands();
    for command in &commands {
        let event = command.into_event(clock.elapsed_s());
        info!(
            equipment = command.equipment,
            closed = command.closed,
            "applying breaker command"
        );
        // failures are logged by the dispatcher; the command is consumed
        let _ = dispatcher.dispatch(&event);
    }
    commands.len()
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::network::{Equipment, EquipmentState, Line, NetworkDirectory};
    use crate::sim::notifier::{Notification, NotificationLog};

    fn scheduler() -> (Scheduler, NotificationLog) {
        let log = NotificationLog::new();
        let network = SharedNetwork::new(NetworkDirectory::new(
            vec![Line::new(1, 1, 2, 2.0)],
            vec![Equipment::recloser(1, 2, EquipmentState::Closed)],
        ));
        (Scheduler::new(network, Notifier::new(log.clone())), log)
    }

    #[test]
    fn fast_forward_ignores_offsets() {
        let (s, log) = scheduler();
        let start = Instant::now();
        let report = s.run_scenario(
            vec![Event::recloser_open(3600.0, 1), Event::line_failure(7200.0, 1)],
            false,
        );
        assert!(start.elapsed() < Duration::from_secs(5));
        let report = report.ok();
        assert_eq!(report.as_ref().map(|r| r.state), Some(RunState::Completed));
        assert_eq!(report.as_ref().map(|r| r.executed), Some(2));
        assert_eq!(log.len(), 2);
        assert_eq!(s.state(), RunState::Completed);
    }

    #[test]
    fn skipped_event_does_not_stop_the_run() {
        let (s, log) = scheduler();
        let report = s
            .run_scenario(
                vec![
                    Event::recloser_open(0.0, 99),
                    Event::line_failure(1.0, 1),
                ],
                false,
            )
            .ok();
        assert_eq!(report.as_ref().map(|r| (r.executed, r.skipped)), Some((1, 1)));
        assert_eq!(log.notifications()[0].event_name(), "line_failure");
    }

    #[test]
    fn empty_schedule_completes() {
        let (s, log) = scheduler();
        let report = s.run_scenario(Vec::new(), true).ok();
        assert_eq!(report.map(|r| r.state), Some(RunState::Completed));
        assert!(log.is_empty());
    }

    #[test]
    fn queued_commands_apply_at_run_start() {
        let (s, log) = scheduler();
        s.commands().set_breaker(1, false);
        let report = s.run_scenario(vec![Event::line_failure(0.0, 1)], false).ok();
        assert_eq!(report.map(|r| r.commands), Some(1));
        let first = log.notifications().first().cloned();
        assert!(matches!(
            first,
            Some(Notification::EquipmentState {
                new_state: EquipmentState::Open,
                ..
            })
        ));
    }

    #[test]
    fn reusable_after_completion() {
        let (s, _log) = scheduler();
        assert!(s.run_scenario(vec![Event::line_failure(0.0, 1)], false).is_ok());
        assert!(s.run_scenario(vec![Event::line_failure(0.0, 1)], false).is_ok());
        assert_eq!(s.state(), RunState::Completed);
    }

    #[test]
    fn unwinding_run_ends_stopped() {
        let control = RunControl::new();
        assert!(control.try_begin());
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = RunGuard::new(&control);
            panic!("dispatch bug");
        }));
        assert!(outcome.is_err());
        assert_eq!(control.state(), RunState::Stopped);
        assert!(control.try_begin());
    }

    #[test]
    fn completed_run_records_its_state() {
        let control = RunControl::new();
        assert!(control.try_begin());
        {
            let mut guard = RunGuard::new(&control);
            guard.state = RunState::Completed;
        }
        assert_eq!(control.state(), RunState::Completed);
    }

    #[test]
    fn report_display_mentions_state() {
        let mut report = RunReport::new(3);
        report.state = RunState::Stopped;
        report.executed = 1;
        let s = report.to_string();
        assert!(s.contains("stopped"));
        assert!(s.contains("pending=2"));
    }
}
