//! Notifications pushed to the supervisory consumer and the sinks that
//! receive them.
//!
//! A sink error (or panic) is contained inside [`Notifier::notify`]; it is
//! logged and never reaches the scheduler.

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use tracing::{debug, error};

use crate::error::SinkError;
use crate::network::{BusId, EquipmentId, EquipmentState, LineId};

use super::event::AlarmParameters;

/// Snapshot of one change, delivered to the consumer as `(event name, fields)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    LineFailure {
        line_id: LineId,
        from_bus: BusId,
        to_bus: BusId,
    },
    EquipmentState {
        equipment_id: EquipmentId,
        kind: String,
        previous_state: Option<EquipmentState>,
        new_state: EquipmentState,
        reason: &'static str,
    },
    TransformerOutage {
        transformer_id: EquipmentId,
    },
    ManualAlarm {
        parameters: AlarmParameters,
    },
    PowerFlow {
        artifact: String,
        results: Value,
    },
}

impl Notification {
    /// Event name seen by the consumer.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::LineFailure { .. } => "line_failure",
            Self::EquipmentState { .. } => "equipment_state",
            Self::TransformerOutage { .. } => "transformer_outage",
            Self::ManualAlarm { .. } => "manual_alarm",
            Self::PowerFlow { .. } => "powerflow",
        }
    }

    /// Payload fields. Alarm parameters are returned as given.
    pub fn fields(&self) -> Map<String, Value> {
        let value = match self {
            Self::LineFailure {
                line_id,
                from_bus,
                to_bus,
            } => json!({ "line_id": line_id, "from_bus": from_bus, "to_bus": to_bus }),
            Self::EquipmentState {
                equipment_id,
                kind,
                previous_state,
                new_state,
                reason,
            } => json!({
                "equipment_id": equipment_id,
                "kind": kind,
                "previous_state": previous_state,
                "new_state": new_state,
                "reason": reason,
            }),
            Self::TransformerOutage { transformer_id } => {
                json!({ "transformer_id": transformer_id })
            }
            Self::ManualAlarm { parameters } => return parameters.clone(),
            Self::PowerFlow { artifact, results } => {
                json!({ "artifact": artifact, "results": results })
            }
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// `{"event": name, "fields": {...}}`.
    pub fn to_json(&self) -> Value {
        json!({ "event": self.event_name(), "fields": self.fields() })
    }
}

impl Serialize for Notification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// A consumer of notifications.
pub trait NotificationSink: Send {
    /// Delivers one notification.
    fn deliver(&mut self, notification: &Notification) -> Result<(), SinkError>;

    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        "sink"
    }
}

impl<F> NotificationSink for F
where
    F: FnMut(&Notification) -> Result<(), SinkError> + Send,
{
    fn deliver(&mut self, notification: &Notification) -> Result<(), SinkError> {
        self(notification)
    }

    fn name(&self) -> &str {
        "callback"
    }
}

/// Delivers notifications synchronously to at most one registered sink.
#[derive(Default)]
pub struct Notifier {
    sink: Option<Box<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new(sink: impl NotificationSink + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
        }
    }

    /// A notifier without a consumer; every notification is dropped.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Delivers `notification`, returning `true` when the sink accepted it.
    ///
    /// A missing sink is a no-op and returns `true`. Sink errors and panics
    /// are logged and reported as `false`.
    pub fn notify(&mut self, notification: &Notification) -> bool {
        debug!(event = notification.event_name(), "notifying consumer");
        let Some(sink) = self.sink.as_mut() else {
            return true;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(notification)));
        match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(
                    sink = sink.name(),
                    event = notification.event_name(),
                    %e,
                    "notification consumer failed"
                );
                false
            }
            Err(payload) => {
                error!(
                    sink = sink.name(),
                    event = notification.event_name(),
                    panic = panic_message(payload.as_ref()),
                    "notification consumer panicked"
                );
                false
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// One delivered notification with its sequence number and wall-clock time.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedNotification {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub notification: Notification,
}

/// Shared in-memory notification history.
///
/// Clones share the same history, so one clone can be registered as a sink
/// while another is read by an exporter or the API.
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    entries: Arc<Mutex<Vec<LoggedNotification>>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// All entries delivered so far.
    pub fn entries(&self) -> Vec<LoggedNotification> {
        self.lock().clone()
    }

    /// Entries with `from <= seq <= to`.
    pub fn range(&self, from: u64, to: u64) -> Vec<LoggedNotification> {
        self.lock()
            .iter()
            .filter(|e| e.seq >= from && e.seq <= to)
            .cloned()
            .collect()
    }

    /// Notifications without their metadata, in delivery order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().iter().map(|e| e.notification.clone()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LoggedNotification>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationSink for NotificationLog {
    fn deliver(&mut self, notification: &Notification) -> Result<(), SinkError> {
        let mut entries = self.lock();
        let seq = entries.len() as u64;
        entries.push(LoggedNotification {
            seq,
            at: Utc::now(),
            notification: notification.clone(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "notification_log"
    }
}

/// Writes each notification as one JSON line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> NotificationSink for JsonLinesSink<W> {
    fn deliver(&mut self, notification: &Notification) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, &notification.to_json())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "json_lines"
    }
}

/// Delivers to several sinks in order.
///
/// Every sink is offered each notification even if an earlier one fails;
/// the failures are reported together.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl NotificationSink for FanOut {
    fn deliver(&mut self, notification: &Notification) -> Result<(), SinkError> {
        let failures: Vec<String> = self
            .sinks
            .iter_mut()
            .filter_map(|sink| {
                sink.deliver(notification)
                    .err()
                    .map(|e| format!("{}: {e}", sink.name()))
            })
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SinkError(failures.join("; ")))
        }
    }

    fn name(&self) -> &str {
        "fan_out"
    }
}
