//! Seeded choice of cluster locations for a scenario's workloads.
//!
//! The available locations are shuffled with an RNG seeded from the
//! scenario, so re-running the same scenario against the same cluster pins
//! the workloads to the same agents.

use probe_types::{ProbeError, Scenario};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

/// Where the origin and proxy workloads of one scenario will run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Location of the origin (VIP backend) workload.
    pub origin: String,
    /// Location of the proxy workload.
    pub proxy: String,
}

impl Placement {
    /// Whether both workloads share a location.
    pub fn is_co_located(&self) -> bool {
        self.origin == self.proxy
    }
}

/// Whether `available` locations are enough for `scenario`.
pub fn is_placeable(scenario: &Scenario, available: usize) -> bool {
    available >= scenario.required_locations()
}

/// `locations` with repeats removed, first occurrence kept.
pub fn distinct_locations(locations: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(locations.len());
    locations
        .iter()
        .filter(|l| seen.insert(l.as_str()))
        .cloned()
        .collect()
}

/// Pick locations for `scenario` from `locations`.
///
/// Repeated entries count once. Returns
/// [`ProbeError::InsufficientCapacity`] when the scenario needs two
/// distinct locations and fewer are available.
pub fn choose_placement(scenario: &Scenario, locations: &[String]) -> Result<Placement, ProbeError> {
    let mut shuffled = distinct_locations(locations);
    if !is_placeable(scenario, shuffled.len()) {
        return Err(ProbeError::InsufficientCapacity {
            required: scenario.required_locations(),
            available: shuffled.len(),
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(scenario.seed());
    shuffled.shuffle(&mut rng);

    let origin = shuffled[0].clone();
    let proxy = if scenario.co_located() {
        origin.clone()
    } else {
        shuffled[1].clone()
    };

    Ok(Placement { origin, proxy })
}
