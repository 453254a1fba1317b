//! Hausdorff-dimension estimate on the primal lattice.

use rand::rngs::StdRng;

use crate::core::universe::Universe;
use crate::observables::observable::{random_vertex, sphere, Observable};

/// Measures metric-sphere sizes around random vertices for radii
/// `1 .. nSlices/2`; the growth exponent of the series estimates the
/// Hausdorff dimension.
#[derive(Debug, Default)]
pub struct Hausdorff;

impl Observable for Hausdorff {
    fn name(&self) -> &str {
        "hausdorff"
    }

    fn process(&mut self, universe: &Universe, rng: &mut StdRng) -> String {
        let max_radius = universe.n_slices() / 2;
        let mut sizes = Vec::new();
        for radius in 1..max_radius {
            let origin = random_vertex(universe, rng);
            let shell = sphere(universe, origin, radius);
            sizes.push(shell.len().to_string());
        }
        sizes.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn series_has_one_entry_per_radius() {
        let mut universe = Universe::new(8, false, 16);
        universe.rebuild_adjacency();
        let mut rng = StdRng::seed_from_u64(1);
        let line = Hausdorff.process(&universe, &mut rng);
        // Radii 1..4 on an 8-slice universe.
        assert_eq!(line.split_whitespace().count(), 3);
    }
}
