//! # cdt2d
//!
//! Markov-chain Monte Carlo sampling of two-dimensional
//! [Causal Dynamical Triangulations](https://en.wikipedia.org/wiki/Causal_dynamical_triangulation):
//! random simplicial manifolds built from space–time triangles with a
//! preferred time foliation, on a torus or a 2-sphere.
//!
//! The sampler drives three local ergodic moves — the (2,4) vertex
//! insertion, its (4,2) inverse, and the (2,2) timelike-edge flip — with a
//! Metropolis acceptance rule and a soft fixing of the total triangle
//! count, and periodically exposes the triangulation to observables
//! through a frozen adjacency view.
//!
//! # Architecture
//!
//! - [`core::pool`] — slab allocator handing out stable 32-bit labels;
//!   every inter-simplex pointer in the (densely cyclic) triangulation
//!   graph is such a label.
//! - [`core::bag`] — random-access label subsets with O(1) add, remove,
//!   membership, and uniform pick; the move-candidate sets live here.
//! - [`core::universe`] — the triangulation itself: invariants, the three
//!   moves, candidate-bag bookkeeping, the adjacency rebuild, and the
//!   geometry checkpoint format.
//! - [`simulation`] — the Metropolis driver: move selection, acceptance
//!   ratios, sweeps, the growth and thermalization phases.
//! - [`observables`] — the measurement contract plus the standard
//!   observables (volume profile, Hausdorff-dimension series, Ricci-like
//!   scaling curves on the primal and dual lattice).
//!
//! # Basic usage
//!
//! ```rust
//! use cdt2d::core::universe::Universe;
//! use cdt2d::simulation::Simulation;
//!
//! // A fresh torus universe: 8 time slices, all of width 3.
//! let universe = Universe::new(8, false, 100);
//! assert_eq!(universe.triangle_count(), 2 * universe.vertex_count());
//!
//! // Grow it to the target volume under the Metropolis dynamics.
//! let mut simulation = Simulation::new(universe, 2.0_f64.ln(), 100, 1, "demo");
//! simulation.grow();
//! assert!(simulation.universe().triangle_count() >= 100);
//! ```
//!
//! # Invariants
//!
//! After every accepted move the triangulation satisfies, and debug
//! builds re-validate at sweep boundaries via
//! [`Universe::check`](core::universe::Universe::check):
//!
//! - every neighbor relation is mutual (`t.left.right == t`, and the
//!   center relation is an involution);
//! - center neighbors alternate orientation (UP against DOWN);
//! - the triangles based on each time slice close into a cycle whose
//!   length equals the slice size;
//! - the three candidate bags mirror the triangulation exactly;
//! - on the 2-sphere both polar caps keep exactly three vertices.
//!
//! # Reproducibility
//!
//! Two PRNG streams are derived from the base seed: `seed + 0` drives the
//! Metropolis decisions, `seed + 1` the uniform candidate picks and the
//! observable helpers. Identical seeds on the same build give identical
//! trajectories; the guarantee does not extend across implementations of
//! the underlying distributions.

#![forbid(unsafe_code)]

/// Triangulation engine: pools, bags, simplices, and the universe.
pub mod core {
    pub mod bag;
    pub mod link;
    pub mod pool;
    pub mod triangle;
    pub mod universe;
    pub mod vertex;
    pub use bag::*;
    pub use link::*;
    pub use pool::*;
    pub use triangle::*;
    pub use universe::*;
    pub use vertex::*;
}

pub mod config;

/// Measurement contract, BFS toolbox, and the standard observables.
pub mod observables {
    pub mod hausdorff;
    pub mod hausdorff_dual;
    pub mod observable;
    pub mod ricci;
    pub mod ricci_dual;
    pub mod ricci_v;
    pub mod volume_profile;
    pub use hausdorff::*;
    pub use hausdorff_dual::*;
    pub use observable::*;
    pub use ricci::*;
    pub use ricci_dual::*;
    pub use ricci_v::*;
    pub use volume_profile::*;
}

pub mod simulation;

/// Re-exports of the commonly used types.
pub mod prelude {
    pub use crate::config::{Config, ConfigError};
    pub use crate::core::bag::Bag;
    pub use crate::core::link::Link;
    pub use crate::core::pool::{Label, Pool};
    pub use crate::core::triangle::{Orientation, Triangle};
    pub use crate::core::universe::{GeometryIoError, Universe};
    pub use crate::core::vertex::Vertex;
    pub use crate::observables::hausdorff::Hausdorff;
    pub use crate::observables::hausdorff_dual::HausdorffDual;
    pub use crate::observables::observable::{
        distance, random_triangle, random_vertex, sphere, sphere_dual, Observable,
    };
    pub use crate::observables::ricci::Ricci;
    pub use crate::observables::ricci_dual::RicciDual;
    pub use crate::observables::ricci_v::RicciV;
    pub use crate::observables::volume_profile::VolumeProfile;
    pub use crate::simulation::{MoveOutcome, Simulation, SimulationError};
}
