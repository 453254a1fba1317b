//! Ricci-like curvature scaling curve.
//!
//! For two vertices at distance ε, the average distance between their
//! ε-spheres (normalized by ε) deviates from its flat-space value in
//! proportion to a coarse-grained Ricci curvature. Recording the average
//! over a range of ε gives a scaling curve.

use rand::rngs::StdRng;
use rand::Rng;

use crate::core::pool::Label;
use crate::core::universe::Universe;
use crate::core::vertex::Vertex;
use crate::observables::observable::{average_shell_distance, random_vertex, sphere, Observable};

/// Measures the normalized average sphere distance at each configured
/// radius, one space-separated value per radius and one line per sweep.
#[derive(Debug)]
pub struct Ricci {
    epsilons: Vec<u32>,
}

impl Ricci {
    #[must_use]
    pub fn new(epsilons: Vec<u32>) -> Self {
        assert!(!epsilons.is_empty(), "at least one radius is required");
        assert!(epsilons.iter().all(|&e| e > 0), "radii must be positive");
        Self { epsilons }
    }
}

impl Observable for Ricci {
    fn name(&self) -> &str {
        "ricci"
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
/// a random member of it, normalized by ε.
fn average_sphere_distance(
    universe: &Universe,
    p1: Label<Vertex>,
    epsilon: u32,
    rng: &mut StdRng,
) -> f64 {
    let s1 = sphere(universe, p1, epsilon);
    if s1.is_empty() {
        return 0.0;
    }
    let p2 = s1[rng.random_range(0..s1.len())];
    let s2 = sphere(universe, p2, epsilon);
    average_shell_distance(universe, &s1, &s2, epsilon)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn curve_has_one_value_per_radius() {
        let mut universe = Universe::new(8, false, 16);
        universe.rebuild_adjacency();
        let mut rng = StdRng::seed_from_u64(3);
        let mut ricci = Ricci::new(vec![1, 2]);
        let line = ricci.process(&universe, &mut rng);
        assert_eq!(line.split_whitespace().count(), 2);
        for value in line.split_whitespace() {
            let parsed: f64 = value.parse().unwrap();
            assert!(parsed >= 0.0);
        }
    }

    #[test]
    fn unit_radius_distances_are_normalized() {
        let mut universe = Universe::new(6, false, 16);
        universe.rebuild_adjacency();
        let mut rng = StdRng::seed_from_u64(9);
        let v = universe.vertex_labels()[0];
        let value = average_sphere_distance(&universe, v, 1, &mut rng);
        // Neighboring unit spheres overlap, so the normalized average
        // distance stays within the 3ε search horizon.
        assert!(value >= 0.0);
        assert!(value <= 3.0);
    }
}
