//! Triangles, the 2-simplices of the triangulation.

use crate::core::pool::Label;
use crate::core::vertex::Vertex;

/// Orientation of a triangle with respect to the time foliation.
///
/// An `Up` triangle is a (2,1)-simplex: two base vertices on its time
/// slice and the apex on the next slice. A `Down` triangle is the mirror
/// (1,2)-simplex with the apex on the previous slice.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Up,
    Down,
}

/// A triangle of the causal triangulation.
///
/// Stores its orientation, the time of its left base vertex, the three
/// vertex labels `(vl, vr, vc)` (left/right on the base, center at the
/// opposite tip), and the three neighbor labels `(tl, tr, tc)`: the left
/// and right neighbors share the timelike edges, the center neighbor
/// shares the spacelike base edge and always has the opposite
/// orientation. All fields are maintained by `Universe`, which keeps the
/// reverse pointers of every neighbor relation in sync.
#[derive(Debug, Default, Clone, Copy)]
pub struct Triangle {
    /// Time of the left base vertex.
    pub time: u32,
    /// Orientation, recomputed from vertex times whenever the vertex set
    /// changes.
    pub(crate) orientation: Orientation,
    pub(crate) tl: Label<Triangle>,
    pub(crate) tr: Label<Triangle>,
    pub(crate) tc: Label<Triangle>,
    pub(crate) vl: Label<Vertex>,
    pub(crate) vr: Label<Vertex>,
    pub(crate) vc: Label<Vertex>,
}

impl Triangle {
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    #[must_use]
    pub fn is_up(&self) -> bool {
        self.orientation == Orientation::Up
    }

    #[must_use]
    pub fn is_down(&self) -> bool {
        self.orientation == Orientation::Down
    }

    /// Neighbor across the left timelike edge.
    #[must_use]
    pub fn triangle_left(&self) -> Label<Triangle> {
        self.tl
    }

    /// Neighbor across the right timelike edge.
    #[must_use]
    pub fn triangle_right(&self) -> Label<Triangle> {
        self.tr
    }

    /// Neighbor across the spacelike base edge; always of opposite
    /// orientation.
    #[must_use]
    pub fn triangle_center(&self) -> Label<Triangle> {
        self.tc
    }

    /// Left base vertex.
    #[must_use]
    pub fn vertex_left(&self) -> Label<Vertex> {
        self.vl
    }

    /// Right base vertex.
    #[must_use]
    pub fn vertex_right(&self) -> Label<Vertex> {
        self.vr
    }

    /// Apex vertex.
    #[must_use]
    pub fn vertex_center(&self) -> Label<Vertex> {
        self.vc
    }
}
