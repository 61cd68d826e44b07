/// Scenario clock for real-time and fast-forward pacing.
pub mod clock;
/// Cancellation, breaker commands, and run state shared with the caller.
pub mod control;
pub mod dispatch;
/// Scheduled event definitions.
pub mod event;
pub mod notifier;
pub mod powerflow;
/// Event ordering for a single run.
pub mod schedule;
pub mod scheduler;

pub use control::{BreakerCommand, CommandSender, RunState};
pub use dispatch::EventDispatcher;
pub use event::{AlarmParameters, Event, EventKind};
pub use notifier::{
    FanOut, JsonLinesSink, LoggedNotification, Notification, NotificationLog, NotificationSink,
    Notifier,
};
pub use powerflow::{PowerFlowSolver, PowerFlowTrigger};
pub use schedule::ScenarioSchedule;
pub use scheduler::{RunReport, Scheduler};
