//! N-1 contingency event scheduler and notification engine for a
//! SCADA-monitored distribution network.

#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod error;
pub mod io;
/// Network directory: buses, lines, loads, and switchable equipment.
pub mod network;
pub mod scenario;
/// Scheduling, dispatch, notification, and power-flow modules.
pub mod sim;
