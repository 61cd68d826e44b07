use std::time::{Duration, Instant};

/// How a scenario maps event offsets onto wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Events fire at `start + offset`.
    Realtime,
    /// Events fire back-to-back with no waiting.
    FastForward,
}

impl Pacing {
    pub fn from_realtime(realtime: bool) -> Self {
        if realtime {
            Self::Realtime
        } else {
            Self::FastForward
        }
    }
}

/// When an event becomes due relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// Already due; dispatch without waiting.
    Now,
    /// Due at this instant.
    At(Instant),
    /// The offset lies beyond what the clock can represent; the event only
    /// ends a wait through cancellation.
    Never,
}

/// Scenario clock anchored at the start of a run.
///
/// # Examples
///
/// ```
/// use n1_sim::sim::clock::{Due, Pacing, ScenarioClock};
///
/// let clock = ScenarioClock::start(Pacing::FastForward);
/// assert_eq!(clock.due(30.0), Due::Now);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ScenarioClock {
    started: Instant,
    pacing: Pacing,
}

impl ScenarioClock {
    /// Starts the clock now.
    pub fn start(pacing: Pacing) -> Self {
        Self {
            started: Instant::now(),
            pacing,
        }
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Seconds since the run started.
    pub fn elapsed_s(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// When an event at `offset_s` becomes due. Always [`Due::Now`] in
    /// fast-forward.
    pub fn due(&self, offset_s: f64) -> Due {
        if self.pacing == Pacing::FastForward {
            return Due::Now;
        }
        let at = Duration::try_from_secs_f64(offset_s.max(0.0))
            .ok()
            .and_then(|offset| self.started.checked_add(offset));
        match at {
            Some(at) if at > Instant::now() => Due::At(at),
            Some(_) => Due::Now,
            None => Due::Never,
        }
    }
}
