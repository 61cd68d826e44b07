//! Integration tests for presets, scenario files, and generated sweeps.

mod common;

use std::path::Path;

use n1_sim::config::ScenarioConfig;
use n1_sim::network::{EquipmentState, SharedNetwork};
use n1_sim::scenario::n1_sweep;
use n1_sim::sim::{Notification, NotificationLog, Notifier, RunState, Scheduler};

fn run_fast(cfg: &ScenarioConfig) -> (SharedNetwork, NotificationLog, n1_sim::sim::RunReport) {
    let network = SharedNetwork::new(cfg.network.clone());
    let log = NotificationLog::new();
    let scheduler = Scheduler::new(network.clone(), Notifier::new(log.clone()));
    let report = scheduler.run_scenario(cfg.to_events(), false).unwrap();
    (network, log, report)
}

#[test]
fn every_preset_runs_to_completion() {
    for name in ScenarioConfig::PRESETS {
        let cfg = ScenarioConfig::from_preset(name).unwrap();
        assert!(cfg.validate().is_empty(), "preset \"{name}\" invalid");

        let (_network, log, report) = run_fast(&cfg);
        assert_eq!(report.state, RunState::Completed, "preset \"{name}\"");
        assert_eq!(report.skipped, 0, "preset \"{name}\"");
        assert!(!log.is_empty(), "preset \"{name}\" produced no notifications");
    }
}

#[test]
fn demo_preset_matches_contingency_fixture() {
    let cfg = ScenarioConfig::demo();
    assert_eq!(cfg.to_events(), common::contingency_events());
    assert_eq!(cfg.network.lines, common::two_bus_network().lines);
    assert_eq!(cfg.network.equipment, common::two_bus_network().equipment);
}

#[test]
fn radial_feeder_ends_with_expected_states() {
    let cfg = ScenarioConfig::radial_feeder();
    let (network, log, report) = run_fast(&cfg);

    assert_eq!(report.executed, 5);
    assert_eq!(
        common::equipment_state(&network, 11),
        Some(EquipmentState::Closed)
    );
    assert_eq!(
        common::equipment_state(&network, 12),
        Some(EquipmentState::Failed)
    );
    assert_eq!(network.snapshot().lines_out_of_service(), 1);

    let last = log.notifications().pop().unwrap();
    assert_eq!(last.event_name(), "manual_alarm");
}

#[test]
fn scenario_file_loads_and_runs() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios/feeder_fault.toml");
    let cfg = ScenarioConfig::from_toml_file(&path).unwrap();
    assert!(cfg.validate().is_empty());
    assert!(cfg.simulation.realtime);
    assert_eq!(cfg.network.buses.len(), 3);
    assert_eq!(cfg.network.equipment[0].attributes["sn_mva"], 25.0);

    let (network, log, report) = run_fast(&cfg);
    assert_eq!(report.executed, 4);

    let names: Vec<&str> = log
        .notifications()
        .iter()
        .map(Notification::event_name)
        .collect();
    assert_eq!(
        names,
        vec![
            "line_failure",
            "equipment_state",
            "manual_alarm",
            "equipment_state"
        ]
    );
    assert_eq!(
        common::equipment_state(&network, 2),
        Some(EquipmentState::Closed)
    );
}

#[test]
fn invalid_scenario_reports_every_problem() {
    let toml = r#"
[[network.buses]]
id = 1
vn_kv = 13.8

[[network.lines]]
id = 1
from_bus = 1
to_bus = 9
length_km = -1.0

[[events]]
at_s = -2.0
kind = "recloser_open"
"#;
    let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
    let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
    assert_eq!(
        fields,
        vec![
            "network.lines[0].to_bus",
            "network.lines[0].length_km",
            "events[0].at_s",
            "events[0].target",
        ]
    );
}

#[test]
fn unknown_fields_are_rejected() {
    let err = ScenarioConfig::from_toml_str("[simulation]\nrealtim = true\n");
    assert!(err.is_err());
}

#[test]
fn sweep_covers_the_radial_feeder() {
    let cfg = ScenarioConfig::radial_feeder();
    let events = n1_sweep(&cfg.network, 0.0, 11);
    // 3 lines, 2 reclosers, 1 transformer
    assert_eq!(events.len(), 6);

    let network = SharedNetwork::new(cfg.network.clone());
    let scheduler = Scheduler::new(network.clone(), Notifier::silent());
    let report = scheduler.run_scenario(events, false).unwrap();
    assert_eq!(report.executed, 6);

    let snapshot = network.snapshot();
    assert_eq!(snapshot.lines_out_of_service(), 3);
    assert_eq!(
        common::equipment_state(&network, 10),
        Some(EquipmentState::Inactive)
    );
}
