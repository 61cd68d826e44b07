//! Grid topology and equipment state owned for the duration of a run.

/// Id-based lookup and in-place mutation over the network collections.
pub mod directory;
pub mod types;

pub use directory::{NetworkDirectory, SharedNetwork};
pub use types::{Bus, BusId, Equipment, EquipmentId, EquipmentState, Line, LineId, Load};
