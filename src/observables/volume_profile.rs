//! Volume per time slice.

use rand::rngs::StdRng;

use crate::core::universe::Universe;
use crate::observables::observable::Observable;

/// Records the spatial volume (vertex count) of every time slice,
/// space-separated, one measurement per line.
#[derive(Debug, Default)]
pub struct VolumeProfile;

impl Observable for VolumeProfile {
    fn name(&self) -> &str {
        "volume_profile"
    }

    fn process(&mut self, universe: &Universe, _rng: &mut StdRng) -> String {
        let sizes: Vec<String> = universe
            .slice_sizes()
            .iter()
            .map(ToString::to_string)
            .collect();
        sizes.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn profile_lists_every_slice() {
        let mut universe = Universe::new(4, false, 8);
        universe.rebuild_adjacency();
        let mut rng = StdRng::seed_from_u64(0);
        let line = VolumeProfile.process(&universe, &mut rng);
        assert_eq!(line, "3 3 3 3");
    }
}
