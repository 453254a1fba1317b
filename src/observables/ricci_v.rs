//! Ricci-like scaling curve restricted to timelike separations.

use rand::rngs::StdRng;
use rand::Rng;

use crate::core::pool::Label;
use crate::core::universe::Universe;
use crate::core::vertex::Vertex;
use crate::observables::observable::{average_shell_distance, random_vertex, sphere, Observable};

/// The vertical variant of [`Ricci`](crate::observables::ricci::Ricci):
/// the second sphere center is drawn only from the members of the first
/// ε-sphere whose time differs from the origin's by exactly ε, so the
/// curve probes curvature along the foliation direction.
#[derive(Debug)]
pub struct RicciV {
    epsilons: Vec<u32>,
}

impl RicciV {
    #[must_use]
    pub fn new(epsilons: Vec<u32>) -> Self {
        assert!(!epsilons.is_empty(), "at least one radius is required");
        assert!(epsilons.iter().all(|&e| e > 0), "radii must be positive");
        Self { epsilons }
    }
}

impl Observable for RicciV {
    fn name(&self) -> &str {
        "ricciv"
    }

    fn process(&mut self, universe: &Universe, rng: &mut StdRng) -> String {
        let values: Vec<String> = self
            .epsilons
            .iter()
            .map(|&epsilon| {
                let origin = random_vertex(universe, rng);
                let value = average_sphere_distance(universe, origin, epsilon, rng);
                format!("{value:.6}")
            })
            .collect();
        values.join(" ")
    }
}

/// Average link distance between the ε-sphere of `p1` and the ε-sphere of
/// a random timelike-separated member of it, normalized by ε. When the
/// sphere holds no vertex at time offset exactly ε the measurement
/// contributes zero instead of stalling.
fn average_sphere_distance(
    universe: &Universe,
    p1: Label<Vertex>,
    epsilon: u32,
    rng: &mut StdRng,
) -> f64 {
    let s1 = sphere(universe, p1, epsilon);
    let origin_time = i64::from(universe.vertex(p1).time);
    // Drawing uniformly until the time offset matches is the same as
    // drawing uniformly from the qualifying subset.
    let candidates: Vec<Label<Vertex>> = s1
        .iter()
        .copied()
        .filter(|&v| (i64::from(universe.vertex(v).time) - origin_time).unsigned_abs() == u64::from(epsilon))
        .collect();
    if candidates.is_empty() {
        return 0.0;
    }
    let p2 = candidates[rng.random_range(0..candidates.len())];
    let s2 = sphere(universe, p2, epsilon);
    average_shell_distance(universe, &s1, &s2, epsilon)
}

// =============================================================================
// TESTS
// =============================================================================
