//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use n1_sim::network::{Equipment, EquipmentState, Line, NetworkDirectory, SharedNetwork};
use n1_sim::sim::{Event, NotificationLog, Notifier, Scheduler};

/// Line 1 between buses 1 and 2, recloser 1 (closed) and transformer 2
/// (active).
pub fn two_bus_network() -> NetworkDirectory {
    NetworkDirectory::new(
        vec![Line::new(1, 1, 2, 2.0)],
        vec![
            Equipment::recloser(1, 2, EquipmentState::Closed),
            Equipment::transformer(2, 1, EquipmentState::Active),
        ],
    )
}

/// Scheduler over [`two_bus_network`] delivering into a fresh log.
///
/// Returns `(scheduler, network, log)`.
pub fn two_bus_scheduler() -> (Scheduler, SharedNetwork, NotificationLog) {
    let network = SharedNetwork::new(two_bus_network());
    let log = NotificationLog::new();
    let scheduler = Scheduler::new(network.clone(), Notifier::new(log.clone()));
    (scheduler, network, log)
}

/// Line failure at 2 s, recloser opening at 4 s, transformer outage at 8 s.
pub fn contingency_events() -> Vec<Event> {
    vec![
        Event::line_failure(2.0, 1),
        Event::recloser_open(4.0, 1),
        Event::transformer_outage(8.0, 2),
    ]
}

/// Current state of equipment `id`, if it exists and has one.
pub fn equipment_state(network: &SharedNetwork, id: u32) -> Option<EquipmentState> {
    network.read().equipment(id).and_then(|e| e.state)
}

/// Polls `cond` every few milliseconds until it holds or `timeout` passes.
pub fn wait_for(timeout: std::time::Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    cond()
}
