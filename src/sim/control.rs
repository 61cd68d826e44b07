//! Control plane shared between a running scenario and its caller:
//! cooperative cancellation, breaker commands, and the run state machine.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::network::EquipmentId;

use super::event::{Event, EventKind};

/// Lifecycle of a scheduler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Operator request to switch a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerCommand {
    pub equipment: EquipmentId,
    pub closed: bool,
}

impl BreakerCommand {
    /// The event that applies this command at offset `at_s`.
    pub fn into_event(self, at_s: f64) -> Event {
        let kind = if self.closed {
            EventKind::RecloserRestore {
                equipment: self.equipment,
            }
        } else {
            EventKind::RecloserOpen {
                equipment: self.equipment,
            }
        };
        Event::new(at_s, kind)
    }
}

/// Why a wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The deadline passed.
    Due,
    /// Cancellation was requested.
    Cancelled,
    /// A breaker command is pending.
    Command,
}

#[derive(Debug)]
struct Inner {
    state: RunState,
    cancelled: bool,
    commands: VecDeque<BreakerCommand>,
}

/// Shared control block. Every change notifies the condition variable, so
/// waits wake on cancellation, commands, and run termination alike.
#[derive(Debug)]
pub struct RunControl {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl Default for RunControl {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: RunState::Idle,
                cancelled: false,
                commands: VecDeque::new(),
            }),
            changed: Condvar::new(),
        }
    }
}

impl RunControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    /// Moves to `Running` and clears any earlier cancellation.
    ///
    /// Returns `false` if a run is already active.
    pub fn try_begin(&self) -> bool {
        let mut inner = self.lock();
        if inner.state == RunState::Running {
            return false;
        }
        inner.state = RunState::Running;
        inner.cancelled = false;
        true
    }

    /// Records the terminal state and wakes anyone waiting for it.
    pub fn finish(&self, state: RunState) {
        self.lock().state = state;
        self.changed.notify_all();
    }

    pub fn cancel(&self) {
        self.lock().cancelled = true;
        self.changed.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    pub fn push_command(&self, command: BreakerCommand) {
        self.lock().commands.push_back(command);
        self.changed.notify_all();
    }

    /// Removes and returns all pending commands in arrival order.
    pub fn drain_commands(&self) -> Vec<BreakerCommand> {
        self.lock().commands.drain(..).collect()
    }

    /// Blocks until `deadline`, cancellation, or a pending command,
    /// whichever comes first. Without a deadline only cancellation or a
    /// command ends the wait.
    pub fn wait_until(&self, deadline: Option<Instant>) -> Wake {
        let mut inner = self.lock();
        loop {
            if inner.cancelled {
                return Wake::Cancelled;
            }
            if !inner.commands.is_empty() {
                return Wake::Command;
            }
            inner = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Wake::Due;
                    }
                    self.changed
                        .wait_timeout(inner, deadline - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0)
                }
                None => self
                    .changed
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Blocks until the run leaves `Running` or `timeout` elapses. A timeout
    /// too large to represent waits without limit.
    ///
    /// Returns the state observed last.
    pub fn wait_finished(&self, timeout: Duration) -> RunState {
        let deadline = Instant::now().checked_add(timeout);
        let mut inner = self.lock();
        while inner.state == RunState::Running {
            inner = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    self.changed
                        .wait_timeout(inner, deadline - now)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0)
                }
                None => self
                    .changed
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
        inner.state
    }
}

/// Cloneable handle for delivering breaker commands into a scheduler.
#[derive(Debug, Clone)]
pub struct CommandSender {
    control: Arc<RunControl>,
}

impl CommandSender {
    pub(crate) fn new(control: Arc<RunControl>) -> Self {
        Self { control }
    }

    /// Queues a breaker command; it is applied at the next check point of
    /// the active run, or at the start of the next one.
    pub fn set_breaker(&self, equipment: EquipmentId, closed: bool) {
        self.control.push_command(BreakerCommand { equipment, closed });
    }
}
