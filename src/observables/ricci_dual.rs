//! Ricci-like curvature scaling curve on the dual lattice.

use rand::rngs::StdRng;
use rand::Rng;
use rustc_hash::FxHashSet;

use crate::core::pool::Label;
use crate::core::triangle::Triangle;
use crate::core::universe::Universe;
use crate::observables::observable::{random_triangle, sphere_dual, Observable};

/// The dual-lattice counterpart of
/// [`Ricci`](crate::observables::ricci::Ricci): the normalized average
/// dual distance between the ε-spheres of two triangles ε apart, recorded
/// for each configured radius.
#[derive(Debug)]
pub struct RicciDual {
    epsilons: Vec<u32>,
}

impl RicciDual {
    #[must_use]
    pub fn new(epsilons: Vec<u32>) -> Self {
        assert!(!epsilons.is_empty(), "at least one radius is required");
        assert!(epsilons.iter().all(|&e| e > 0), "radii must be positive");
        Self { epsilons }
    }
}

impl Observable for RicciDual {
    fn name(&self) -> &str {
        "ricci_dual"
    }

    fn process(&mut self, universe: &Universe, rng: &mut StdRng) -> String {
        let values: Vec<String> = self
            .epsilons
            .iter()
            .map(|&epsilon| {
                let origin = random_triangle(universe, rng);
                let value = average_sphere_distance(universe, origin, epsilon, rng);
                format!("{value:.6}")
            })
            .collect();
        values.join(" ")
    }
}

/// Average dual link distance between the ε-sphere of `t1` and the
/// ε-sphere of a random member of it, normalized by ε. As on the primal
/// lattice, the search for each distance is bounded at depth `3ε`.
fn average_sphere_distance(
    universe: &Universe,
    t1: Label<Triangle>,
    epsilon: u32,
    rng: &mut StdRng,
) -> f64 {
    let s1 = sphere_dual(universe, t1, epsilon);
    if s1.is_empty() {
        return 0.0;
    }
    let t2 = s1[rng.random_range(0..s1.len())];
    let s2 = sphere_dual(universe, t2, epsilon);

    let mut distance_sum = 0u64;
    let mut distance_count = 0u64;

    for &b in &s1 {
        let mut targets: FxHashSet<Label<Triangle>> = s2.iter().copied().collect();
        let mut done: FxHashSet<Label<Triangle>> = FxHashSet::default();
        let mut frontier = vec![b];
        let mut next = Vec::new();
        done.insert(b);
        if targets.remove(&b) {
            distance_count += 1;
        }

        'search: for depth in 0..3 * epsilon {
            for &t in &frontier {
                for &neighbor in universe.triangle_neighbors(t) {
                    if done.insert(neighbor) {
                        next.push(neighbor);
                        if targets.remove(&neighbor) {
                            distance_sum += u64::from(depth) + 1;
                            distance_count += 1;
                        }
                    }
                    if targets.is_empty() {
                        break 'search;
                    }
                }
            }
            std::mem::swap(&mut frontier, &mut next);
            next.clear();
        }
    }

    if distance_count == 0 {
        return 0.0;
    }
    distance_sum as f64 / (f64::from(epsilon) * distance_count as f64)
}

// =============================================================================
// TESTS
// =============================================================================
