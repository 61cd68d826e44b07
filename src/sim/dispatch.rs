//! Applies events to the network and emits the resulting notifications.

use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::network::{EquipmentId, EquipmentState, NetworkDirectory, SharedNetwork};

use super::event::{Event, EventKind};
use super::notifier::{Notification, Notifier};
use super::powerflow::PowerFlowTrigger;

/// Owns the notification path and the optional power-flow hook, and
/// mutates the shared network on behalf of the running scenario.
pub struct EventDispatcher {
    network: SharedNetwork,
    notifier: Notifier,
    powerflow: Option<PowerFlowTrigger>,
}

impl EventDispatcher {
    pub fn new(network: SharedNetwork, notifier: Notifier) -> Self {
        Self {
            network,
            notifier,
            powerflow: None,
        }
    }

    #[must_use]
    pub fn with_powerflow(mut self, trigger: PowerFlowTrigger) -> Self {
        self.powerflow = Some(trigger);
        self
    }

    pub fn network(&self) -> &SharedNetwork {
        &self.network
    }

    /// Applies one event.
    ///
    /// A target that does not resolve leaves everything untouched and skips
    /// the power-flow hook. Every other event, an unknown kind included, is
    /// followed by one power-flow run when the hook is enabled.
    ///
    /// # Errors
    ///
    /// Returns the [`DispatchError`] that caused the event to be skipped;
    /// it has already been logged.
    pub fn dispatch(&mut self, event: &Event) -> Result<(), DispatchError> {
        debug!(%event, "executing event");

        let result = self.apply(event.kind());
        let notifications = match result {
            Ok(notifications) => notifications,
            Err(e @ (DispatchError::LineNotFound(_) | DispatchError::EquipmentNotFound(_))) => {
                warn!(%event, %e, "event target not found, skipping");
                return Err(e);
            }
            Err(e @ DispatchError::UnknownKind(_)) => {
                warn!(%event, %e, "unknown event kind, skipping");
                self.run_powerflow();
                return Err(e);
            }
        };

        for notification in &notifications {
            self.notifier.notify(notification);
        }
        self.run_powerflow();
        Ok(())
    }

    fn apply(&mut self, kind: &EventKind) -> Result<Vec<Notification>, DispatchError> {
        let mut network = self.network.write();
        match kind {
            EventKind::LineFailure { line } => {
                let line = network.resolve_line(*line)?;
                line.out_of_service = true;
                info!(
                    line_id = line.id,
                    from_bus = line.from_bus,
                    to_bus = line.to_bus,
                    "line taken out of service"
                );
                Ok(vec![Notification::LineFailure {
                    line_id: line.id,
                    from_bus: line.from_bus,
                    to_bus: line.to_bus,
                }])
            }
            EventKind::RecloserOpen { equipment } => Ok(vec![switch_equipment(
                &mut network,
                *equipment,
                EquipmentState::Open,
                "RecloserOpen",
            )?]),
            EventKind::RecloserFailure { equipment } => Ok(vec![switch_equipment(
                &mut network,
                *equipment,
                EquipmentState::Failed,
                "RecloserFailure",
            )?]),
            EventKind::RecloserRestore { equipment } => Ok(vec![switch_equipment(
                &mut network,
                *equipment,
                EquipmentState::Closed,
                "restoration",
            )?]),
            EventKind::TransformerOutage { equipment } => {
                let state_change = switch_equipment(
                    &mut network,
                    *equipment,
                    EquipmentState::Inactive,
                    "TransformerOutage",
                )?;
                Ok(vec![
                    state_change,
                    Notification::TransformerOutage {
                        transformer_id: *equipment,
                    },
                ])
            }
            EventKind::ManualAlarm { parameters } => Ok(vec![Notification::ManualAlarm {
                parameters: parameters.clone(),
            }]),
            EventKind::Unknown { name, .. } => Err(DispatchError::UnknownKind(name.clone())),
        }
    }

    fn run_powerflow(&mut self) {
        let Some(trigger) = self.powerflow.as_mut() else {
            return;
        };
        let notification = {
            let network = self.network.read();
            trigger.run(&network)
        };
        if let Some(notification) = notification {
            self.notifier.notify(&notification);
        }
    }
}

fn switch_equipment(
    network: &mut NetworkDirectory,
    id: EquipmentId,
    new_state: EquipmentState,
    reason: &'static str,
) -> Result<Notification, DispatchError> {
    let equipment = network.resolve_equipment(id)?;
    let previous_state = equipment.set_state(new_state);
    info!(
        kind = %equipment.kind,
        id,
        previous = previous_state.map_or("none", EquipmentState::as_str),
        new = %new_state,
        reason,
        "equipment state changed"
    );
    Ok(Notification::EquipmentState {
        equipment_id: id,
        kind: equipment.kind.clone(),
        previous_state,
        new_state,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value, json};

    use super::*;
    use crate::error::{PowerFlowError, SinkError};
    use crate::network::{Equipment, Line};
    use crate::sim::notifier::NotificationLog;

    fn network() -> SharedNetwork {
        SharedNetwork::new(NetworkDirectory::new(
            vec![Line::new(1, 1, 2, 2.0)],
            vec![
                Equipment::recloser(1, 2, EquipmentState::Closed),
                Equipment::transformer(2, 1, EquipmentState::Active),
            ],
        ))
    }

    fn dispatcher() -> (EventDispatcher, NotificationLog) {
        let log = NotificationLog::new();
        (
            EventDispatcher::new(network(), Notifier::new(log.clone())),
            log,
        )
    }

    #[test]
    fn line_failure_marks_line_out() {
        let (mut d, log) = dispatcher();
        assert!(d.dispatch(&Event::line_failure(0.0, 1)).is_ok());
        assert!(d.network().read().lines[0].out_of_service);
        assert_eq!(
            log.notifications(),
            vec![Notification::LineFailure {
                line_id: 1,
                from_bus: 1,
                to_bus: 2
            }]
        );
    }

    #[test]
    fn recloser_transitions_and_reasons() {
        let cases = [
            (Event::recloser_open(0.0, 1), EquipmentState::Open, "RecloserOpen"),
            (Event::recloser_failure(0.0, 1), EquipmentState::Failed, "RecloserFailure"),
            (Event::recloser_restore(0.0, 1), EquipmentState::Closed, "restoration"),
        ];
        let (mut d, log) = dispatcher();
        let mut previous = EquipmentState::Closed;
        for (event, expected, expected_reason) in cases {
            assert!(d.dispatch(&event).is_ok());
            let last = log.notifications().pop();
            assert_eq!(
                last,
                Some(Notification::EquipmentState {
                    equipment_id: 1,
                    kind: "recloser".into(),
                    previous_state: Some(previous),
                    new_state: expected,
                    reason: expected_reason,
                })
            );
            previous = expected;
        }
    }

    #[test]
    fn restore_on_closed_recloser_still_notifies() {
        let (mut d, log) = dispatcher();
        assert!(d.dispatch(&Event::recloser_restore(0.0, 1)).is_ok());
        let fields = log.notifications()[0].fields();
        assert_eq!(fields.get("previous_state"), Some(&json!("closed")));
        assert_eq!(fields.get("new_state"), Some(&json!("closed")));
    }

    #[test]
    fn transformer_outage_emits_two_notifications() {
        let (mut d, log) = dispatcher();
        assert!(d.dispatch(&Event::transformer_outage(0.0, 2)).is_ok());
        let names: Vec<_> = log.notifications().iter().map(Notification::event_name).collect();
        assert_eq!(names, vec!["equipment_state", "transformer_outage"]);
        assert_eq!(
            d.network().read().equipment(2).and_then(|e| e.state),
            Some(EquipmentState::Inactive)
        );
    }

    #[test]
    fn manual_alarm_passes_parameters_and_mutates_nothing() {
        let (mut d, log) = dispatcher();
        let mut params = Map::new();
        params.insert("text".into(), json!("drill"));
        assert!(d.dispatch(&Event::manual_alarm(0.0, params.clone())).is_ok());
        assert_eq!(log.notifications()[0].fields(), params);
        assert_eq!(d.network().snapshot(), network().snapshot());
    }

    #[test]
    fn missing_target_is_skipped_without_side_effects() {
        let (mut d, log) = dispatcher();
        let result = d.dispatch(&Event::recloser_open(0.0, 42));
        assert!(matches!(result, Err(DispatchError::EquipmentNotFound(42))));
        let result = d.dispatch(&Event::line_failure(0.0, 42));
        assert!(matches!(result, Err(DispatchError::LineNotFound(42))));
        assert!(log.is_empty());
        assert_eq!(d.network().snapshot(), network().snapshot());
    }

    #[test]
    fn unknown_kind_emits_nothing() {
        let (mut d, log) = dispatcher();
        let event = Event::new(
            0.0,
            EventKind::Unknown {
                name: "solar_flare".into(),
                target: 1,
            },
        );
        assert!(matches!(d.dispatch(&event), Err(DispatchError::UnknownKind(_))));
        assert!(log.is_empty());
    }

    #[test]
    fn failing_consumer_does_not_block_mutation() {
        let mut d = EventDispatcher::new(
            network(),
            Notifier::new(|_: &Notification| -> Result<(), SinkError> {
                Err(SinkError("scada down".into()))
            }),
        );
        assert!(d.dispatch(&Event::recloser_open(0.0, 1)).is_ok());
        assert_eq!(
            d.network().read().equipment(1).and_then(|e| e.state),
            Some(EquipmentState::Open)
        );
    }

    #[test]
    fn powerflow_runs_after_every_resolved_event() {
        let dir = tempfile::tempdir().ok();
        let out = dir.as_ref().map(|d| d.path().to_path_buf()).unwrap_or_default();
        let trigger = PowerFlowTrigger::new(
            |net: &NetworkDirectory| -> Result<Value, PowerFlowError> {
                Ok(json!({ "lines_out": net.lines_out_of_service() }))
            },
            &out,
        );
        let (d, log) = dispatcher();
        let mut d = d.with_powerflow(trigger);

        assert!(d.dispatch(&Event::line_failure(0.0, 1)).is_ok());
        assert!(d.dispatch(&Event::manual_alarm(0.0, Map::new())).is_ok());
        assert!(d.dispatch(&Event::line_failure(0.0, 99)).is_err());

        let names: Vec<_> = log.notifications().iter().map(Notification::event_name).collect();
        assert_eq!(
            names,
            vec!["line_failure", "powerflow", "manual_alarm", "powerflow"]
        );
        let notifications = log.notifications();
        assert_eq!(notifications[1].fields()["results"], json!({ "lines_out": 1 }));
    }
}
