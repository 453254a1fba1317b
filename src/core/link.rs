//! Links (edges) of the triangulation.
//!
//! Links are derived data: they are rebuilt from scratch on every
//! adjacency rebuild and exist only for the observables that measure on
//! edges. The Monte Carlo moves never touch them.

use crate::core::pool::Label;
use crate::core::triangle::Triangle;
use crate::core::vertex::Vertex;

/// An undirected edge between two vertices, remembered together with the
/// two triangles it borders.
///
/// A link is timelike iff its endpoints live on different time slices,
/// spacelike iff they share one; the classification is made by
/// [`Universe::link_is_timelike`](crate::core::universe::Universe::link_is_timelike)
/// since it needs the vertex pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct Link {
    /// Initial vertex (the earlier one for timelike links).
    pub(crate) vi: Label<Vertex>,
    /// Final vertex.
    pub(crate) vf: Label<Vertex>,
    /// Triangle on the plus side.
    pub(crate) tp: Label<Triangle>,
    /// Triangle on the minus side.
    pub(crate) tm: Label<Triangle>,
}

impl Link {
    #[must_use]
    pub fn vertex_initial(&self) -> Label<Vertex> {
        self.vi
    }

    #[must_use]
    pub fn vertex_final(&self) -> Label<Vertex> {
        self.vf
    }

    #[must_use]
    pub fn triangle_plus(&self) -> Label<Triangle> {
        self.tp
    }

    #[must_use]
    pub fn triangle_minus(&self) -> Label<Triangle> {
        self.tm
    }
}
