//! Hausdorff-dimension estimate on the dual lattice.

use rand::rngs::StdRng;

use crate::core::universe::Universe;
use crate::observables::observable::{random_triangle, sphere_dual, Observable};

/// The dual-lattice counterpart of
/// [`Hausdorff`](crate::observables::hausdorff::Hausdorff): dual-sphere
/// sizes around random triangles for radii `1 .. nSlices`.
#[derive(Debug, Default)]
pub struct HausdorffDual;

impl Observable for HausdorffDual {
    fn name(&self) -> &str {
        "hausdorff_dual"
    }

    fn process(&mut self, universe: &Universe, rng: &mut StdRng) -> String {
        let max_radius = universe.n_slices();
        let mut sizes = Vec::new();
        for radius in 1..max_radius {
            let origin = random_triangle(universe, rng);
            let shell = sphere_dual(universe, origin, radius);
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
        let mut universe = Universe::new(4, false, 8);
        universe.rebuild_adjacency();
        let mut rng = StdRng::seed_from_u64(2);
        let line = HausdorffDual.process(&universe, &mut rng);
        assert_eq!(line.split_whitespace().count(), 3);
    }
}
