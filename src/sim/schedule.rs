use super::event::Event;

/// A batch of events in firing order, fixed for one run.
#[derive(Debug, Default, Clone)]
pub struct ScenarioSchedule {
    events: Vec<Event>,
}

impl ScenarioSchedule {
    /// Orders events by offset ascending; equal offsets keep insertion order.
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        let mut events: Vec<Event> = events.into_iter().collect();
        // stable sort: ties keep insertion order
        events.sort_by(|a, b| a.at_s().total_cmp(&b.at_s()));
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Offset of the last event, or `0.0` for an empty schedule.
    pub fn horizon_s(&self) -> f64 {
        self.events.last().map_or(0.0, Event::at_s)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

impl IntoIterator for ScenarioSchedule {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
