//! TOML-based scenario configuration and preset definitions.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::network::{Bus, Equipment, EquipmentState, Line, Load, NetworkDirectory};
use crate::sim::event::{Event, EventKind};
use crate::sim::powerflow::DEFAULT_OUTPUT_DIR;

/// Top-level scenario configuration parsed from TOML.
///
/// Load from TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::demo`] for the built-in two-bus example.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Pacing and power-flow settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Buses, lines, loads, and equipment.
    #[serde(default)]
    pub network: NetworkDirectory,
    /// Scheduled events, in any order.
    #[serde(default)]
    pub events: Vec<EventConfig>,
}

/// Pacing and power-flow settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Wait for each event's offset (`true`) or replay back-to-back.
    pub realtime: bool,
    /// Run the power-flow hook after each event, if a solver is attached.
    pub powerflow: bool,
    /// Directory for power-flow artifacts.
    pub output_dir: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            realtime: true,
            powerflow: false,
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
        }
    }
}

/// One scheduled event as written in a scenario file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventConfig {
    /// Offset from scenario start (seconds).
    pub at_s: f64,
    /// Snake_case kind, e.g. `"line_failure"` or `"recloser_open"`.
    pub kind: String,
    /// Target line or equipment id; ignored for `manual_alarm`.
    #[serde(default)]
    pub target: Option<u32>,
    /// Alarm payload; ignored for other kinds.
    #[serde(default)]
    pub parameters: toml::Table,
}

impl EventConfig {
    fn new(at_s: f64, kind: &str, target: u32) -> Self {
        Self {
            at_s,
            kind: kind.to_string(),
            target: Some(target),
            parameters: toml::Table::new(),
        }
    }

    /// Converts to a scheduler event. Unknown kinds are kept as
    /// [`EventKind::Unknown`] and skipped at run time. Offsets that fail
    /// validation are clamped to `0.0`.
    pub fn to_event(&self) -> Event {
        let parameters = match serde_json::to_value(&self.parameters) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let kind = EventKind::from_name(&self.kind, self.target.unwrap_or_default(), parameters);
        let at_s = if self.at_s.is_finite() {
            self.at_s.max(0.0)
        } else {
            0.0
        };
        Event::new(at_s, kind)
    }
}

impl ScenarioConfig {
    /// Two buses joined by one line, a closed recloser and an active
    /// transformer; the line fails at 2 s, the recloser opens at 4 s and the
    /// transformer drops out at 8 s.
    pub fn demo() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            network: NetworkDirectory {
                buses: vec![
                    Bus {
                        id: 1,
                        name: "Bus A".to_string(),
                        vn_kv: 13.8,
                    },
                    Bus {
                        id: 2,
                        name: "Bus B".to_string(),
                        vn_kv: 13.8,
                    },
                ],
                lines: vec![Line::new(1, 1, 2, 2.0)],
                loads: Vec::new(),
                equipment: vec![
                    Equipment::recloser(1, 2, EquipmentState::Closed),
                    Equipment::transformer(2, 1, EquipmentState::Active),
                ],
            },
            events: vec![
                EventConfig::new(2.0, "line_failure", 1),
                EventConfig::new(4.0, "recloser_open", 1),
                EventConfig::new(8.0, "transformer_outage", 2),
            ],
        }
    }

    /// A four-bus radial feeder with two reclosers: a mid-feeder line
    /// fault, a failed reclose attempt, a successful restoration and an
    /// operator alarm.
    pub fn radial_feeder() -> Self {
        let bus = |id, name: &str, vn_kv| Bus {
            id,
            name: name.to_string(),
            vn_kv,
        };
        let mut alarm = EventConfig::new(9.0, "manual_alarm", 0);
        alarm.target = None;
        alarm
            .parameters
            .insert("message".into(), toml::Value::String("feeder section 2 isolated".into()));
        alarm
            .parameters
            .insert("priority".into(), toml::Value::Integer(2));

        Self {
            simulation: SimulationConfig::default(),
            network: NetworkDirectory {
                buses: vec![
                    bus(1, "Substation", 69.0),
                    bus(2, "Feeder head", 13.8),
                    bus(3, "Section 2", 13.8),
                    bus(4, "Section 3", 13.8),
                ],
                lines: vec![
                    Line::new(1, 2, 3, 3.2),
                    Line::new(2, 3, 4, 1.7),
                    Line::new(3, 2, 4, 4.5),
                ],
                loads: vec![
                    Load {
                        id: 1,
                        bus: 3,
                        p_kw: 850.0,
                    },
                    Load {
                        id: 2,
                        bus: 4,
                        p_kw: 420.0,
                    },
                ],
                equipment: vec![
                    Equipment::transformer(10, 1, EquipmentState::Active),
                    Equipment::recloser(11, 2, EquipmentState::Closed),
                    Equipment::recloser(12, 3, EquipmentState::Closed),
                ],
            },
            events: vec![
                EventConfig::new(1.0, "line_failure", 1),
                EventConfig::new(1.5, "recloser_open", 11),
                EventConfig::new(4.0, "recloser_failure", 12),
                EventConfig::new(6.0, "recloser_restore", 11),
                alarm,
            ],
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["demo", "radial_feeder"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "demo" => Ok(Self::demo()),
            "radial_feeder" => Ok(Self::radial_feeder()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Scheduler events in file order.
    pub fn to_events(&self) -> Vec<Event> {
        self.events.iter().map(EventConfig::to_event).collect()
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid. Targets missing
    /// from the network and unknown kinds are not errors: they are skipped
    /// with a warning when the scenario runs.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let net = &self.network;

        check_unique(net.buses.iter().map(|b| b.id), "network.buses", &mut errors);
        check_unique(net.lines.iter().map(|l| l.id), "network.lines", &mut errors);
        check_unique(net.loads.iter().map(|l| l.id), "network.loads", &mut errors);
        check_unique(
            net.equipment.iter().map(|e| e.id),
            "network.equipment",
            &mut errors,
        );

        if !net.buses.is_empty() {
            let buses: HashSet<u32> = net.buses.iter().map(|b| b.id).collect();
            let mut check_bus = |field: String, bus: u32| {
                if !buses.contains(&bus) {
                    errors.push(ConfigError::new(field, format!("unknown bus {bus}")));
                }
            };
            for (i, l) in net.lines.iter().enumerate() {
                check_bus(format!("network.lines[{i}].from_bus"), l.from_bus);
                check_bus(format!("network.lines[{i}].to_bus"), l.to_bus);
            }
            for (i, l) in net.loads.iter().enumerate() {
                check_bus(format!("network.loads[{i}].bus"), l.bus);
            }
            for (i, e) in net.equipment.iter().enumerate() {
                check_bus(format!("network.equipment[{i}].bus"), e.bus);
            }
        }

        for (i, l) in net.lines.iter().enumerate() {
            if l.length_km.is_nan() || l.length_km < 0.0 {
                errors.push(ConfigError::new(
                    format!("network.lines[{i}].length_km"),
                    "must be >= 0",
                ));
            }
        }

        for (i, ev) in self.events.iter().enumerate() {
            if !ev.at_s.is_finite() || ev.at_s < 0.0 {
                errors.push(ConfigError::new(
                    format!("events[{i}].at_s"),
                    "must be a finite number >= 0",
                ));
            }
            if ev.kind != "manual_alarm" && ev.target.is_none() {
                errors.push(ConfigError::new(
                    format!("events[{i}].target"),
                    format!("required for \"{}\"", ev.kind),
                ));
            }
        }

        if self.simulation.powerflow && self.simulation.output_dir.trim().is_empty() {
            errors.push(ConfigError::new(
                "simulation.output_dir",
                "must not be empty when powerflow is enabled",
            ));
        }

        errors
    }
}

fn check_unique(ids: impl Iterator<Item = u32>, field: &str, errors: &mut Vec<ConfigError>) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            errors.push(ConfigError::new(field, format!("duplicate id {id}")));
        }
    }
}
