//! Network entities: buses, lines, loads, and switchable equipment.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Bus identifier.
pub type BusId = u32;
/// Line identifier.
pub type LineId = u32;
/// Equipment identifier, unique within a run.
pub type EquipmentId = u32;

/// Equipment kind string for reclosers.
pub const RECLOSER: &str = "recloser";
/// Equipment kind string for transformers.
pub const TRANSFORMER: &str = "transformer";

/// A node of the electrical network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bus {
    pub id: BusId,
    #[serde(default)]
    pub name: String,
    /// Nominal voltage (kV).
    pub vn_kv: f64,
}

/// A transmission or distribution line between two buses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Line {
    pub id: LineId,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub length_km: f64,
    /// Set by a line failure; never cleared during a run.
    #[serde(default)]
    pub out_of_service: bool,
}

impl Line {
    /// Creates an in-service line.
    pub fn new(id: LineId, from_bus: BusId, to_bus: BusId, length_km: f64) -> Self {
        Self {
            id,
            from_bus,
            to_bus,
            length_km,
            out_of_service: false,
        }
    }
}

/// A load connected to a bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Load {
    pub id: u32,
    pub bus: BusId,
    /// Active power demand (kW).
    pub p_kw: f64,
}

/// Operating state of a piece of equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentState {
    Closed,
    Open,
    Failed,
    Active,
    Inactive,
}

impl EquipmentState {
    /// Lowercase wire name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::Failed => "failed",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for EquipmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A switchable or outage-capable device attached to a bus
/// (e.g. `"recloser"`, `"transformer"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Equipment {
    pub id: EquipmentId,
    pub kind: String,
    pub bus: BusId,
    /// Current state; `None` until the equipment is first switched.
    #[serde(default)]
    pub state: Option<EquipmentState>,
    /// Free-form ratings and settings carried through untouched.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Equipment {
    /// Creates equipment with the given initial state and no attributes.
    pub fn new(
        id: EquipmentId,
        kind: impl Into<String>,
        bus: BusId,
        state: Option<EquipmentState>,
    ) -> Self {
        Self {
            id,
            kind: kind.into(),
            bus,
            state,
            attributes: BTreeMap::new(),
        }
    }

    /// Shorthand for a recloser in the given state.
    pub fn recloser(id: EquipmentId, bus: BusId, state: EquipmentState) -> Self {
        Self::new(id, RECLOSER, bus, Some(state))
    }

    /// Shorthand for a transformer in the given state.
    pub fn transformer(id: EquipmentId, bus: BusId, state: EquipmentState) -> Self {
        Self::new(id, TRANSFORMER, bus, Some(state))
    }

    /// Sets the state and returns the previous one.
    pub fn set_state(&mut self, state: EquipmentState) -> Option<EquipmentState> {
        self.state.replace(state)
    }
}

impl fmt::Display for Equipment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @ bus {}", self.kind, self.id, self.bus)
    }
}
