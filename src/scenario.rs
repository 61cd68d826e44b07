//! Generated contingency sweeps.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::network::NetworkDirectory;
use crate::network::types::{RECLOSER, TRANSFORMER};
use crate::sim::event::{Event, EventKind};

/// Builds an N-1 sweep over `network`: one line failure per line, one
/// opening per recloser, and one outage per transformer.
///
/// The contingencies are shuffled with a seeded RNG, so the same seed and
/// network always give the same order. Event `i` fires at
/// `(i + 1) * spacing_s`.
///
/// # Panics
///
/// Panics if `spacing_s` is negative or not finite.
pub fn n1_sweep(network: &NetworkDirectory, spacing_s: f64, seed: u64) -> Vec<Event> {
    assert!(
        spacing_s.is_finite() && spacing_s >= 0.0,
        "spacing must be >= 0"
    );

    let mut kinds: Vec<EventKind> = network
        .lines
        .iter()
        .map(|l| EventKind::LineFailure { line: l.id })
        .collect();
    kinds.extend(
        network
            .equipment_of_kind(RECLOSER)
            .map(|e| EventKind::RecloserOpen { equipment: e.id }),
    );
    kinds.extend(
        network
            .equipment_of_kind(TRANSFORMER)
            .map(|e| EventKind::TransformerOutage { equipment: e.id }),
    );

    let mut rng = StdRng::seed_from_u64(seed);
    kinds.shuffle(&mut rng);

    kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| Event::new((i + 1) as f64 * spacing_s, kind))
        .collect()
}
