use std::fmt;

use serde_json::{Map, Value};

use crate::network::{EquipmentId, LineId};

/// Free-form alarm payload, passed through to the notification verbatim.
pub type AlarmParameters = Map<String, Value>;

/// What a scheduled event does, with the target it acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Takes a line out of service.
    LineFailure { line: LineId },
    /// Opens a recloser.
    RecloserOpen { equipment: EquipmentId },
    /// Marks a recloser as failed.
    RecloserFailure { equipment: EquipmentId },
    /// Closes a recloser.
    RecloserRestore { equipment: EquipmentId },
    /// Deactivates a transformer.
    TransformerOutage { equipment: EquipmentId },
    /// Emits an operator alarm without touching the network.
    ManualAlarm { parameters: AlarmParameters },
    /// A kind the dispatcher does not recognise; skipped at run time.
    Unknown { name: String, target: u32 },
}

impl EventKind {
    /// Builds a kind from its snake_case name, e.g. as read from a scenario file.
    ///
    /// Unrecognised names become [`EventKind::Unknown`].
    pub fn from_name(name: &str, target: u32, parameters: AlarmParameters) -> Self {
        match name {
            "line_failure" => Self::LineFailure { line: target },
            "recloser_open" => Self::RecloserOpen { equipment: target },
            "recloser_failure" => Self::RecloserFailure { equipment: target },
            "recloser_restore" => Self::RecloserRestore { equipment: target },
            "transformer_outage" => Self::TransformerOutage { equipment: target },
            "manual_alarm" => Self::ManualAlarm { parameters },
            other => Self::Unknown {
                name: other.to_string(),
                target,
            },
        }
    }

    /// Snake_case name of the kind.
    pub fn name(&self) -> &str {
        match self {
            Self::LineFailure { .. } => "line_failure",
            Self::RecloserOpen { .. } => "recloser_open",
            Self::RecloserFailure { .. } => "recloser_failure",
            Self::RecloserRestore { .. } => "recloser_restore",
            Self::TransformerOutage { .. } => "transformer_outage",
            Self::ManualAlarm { .. } => "manual_alarm",
            Self::Unknown { name, .. } => name,
        }
    }

    /// Id of the affected line or equipment; `None` for alarms.
    pub fn target(&self) -> Option<u32> {
        match self {
            Self::LineFailure { line } => Some(*line),
            Self::RecloserOpen { equipment }
            | Self::RecloserFailure { equipment }
            | Self::RecloserRestore { equipment }
            | Self::TransformerOutage { equipment } => Some(*equipment),
            Self::Unknown { target, .. } => Some(*target),
            Self::ManualAlarm { .. } => None,
        }
    }
}

/// An immutable action scheduled at an offset from scenario start.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Seconds after scenario start at which the event fires.
    at_s: f64,
    kind: EventKind,
}

impl Event {
    /// Creates an event firing `at_s` seconds into the scenario.
    ///
    /// # Panics
    ///
    /// Panics if `at_s` is negative or not finite.
    pub fn new(at_s: f64, kind: EventKind) -> Self {
        assert!(at_s.is_finite() && at_s >= 0.0, "event offset must be >= 0");
        Self { at_s, kind }
    }

    pub fn line_failure(at_s: f64, line: LineId) -> Self {
        Self::new(at_s, EventKind::LineFailure { line })
    }

    pub fn recloser_open(at_s: f64, equipment: EquipmentId) -> Self {
        Self::new(at_s, EventKind::RecloserOpen { equipment })
    }

    pub fn recloser_failure(at_s: f64, equipment: EquipmentId) -> Self {
        Self::new(at_s, EventKind::RecloserFailure { equipment })
    }

    pub fn recloser_restore(at_s: f64, equipment: EquipmentId) -> Self {
        Self::new(at_s, EventKind::RecloserRestore { equipment })
    }

    pub fn transformer_outage(at_s: f64, equipment: EquipmentId) -> Self {
        Self::new(at_s, EventKind::TransformerOutage { equipment })
    }

    pub fn manual_alarm(at_s: f64, parameters: AlarmParameters) -> Self {
        Self::new(at_s, EventKind::ManualAlarm { parameters })
    }

    /// Offset from scenario start in seconds.
    pub fn at_s(&self) -> f64 {
        self.at_s
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.target() {
            Some(target) => write!(f, "{}@{:.3}s -> {}", self.kind.name(), self.at_s, target),
            None => write!(f, "{}@{:.3}s", self.kind.name(), self.at_s),
        }
    }
}
