//! The triangulation itself: state, invariants, local moves, adjacency
//! rebuild, and the checkpoint file format.
//!
//! A [`Universe`] owns the simplex pools, the move-candidate bags, and the
//! derived adjacency vectors that observables read between sweeps. All
//! cross-simplex mutation is routed through `Universe` methods so that
//! every neighbor relation keeps its reverse pointer in sync; nothing in
//! the graph is a language-level reference, only pool labels.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::info;

use crate::core::bag::Bag;
use crate::core::link::Link;
use crate::core::pool::{Label, Pool};
use crate::core::triangle::{Orientation, Triangle};
use crate::core::vertex::Vertex;

/// Width of every spatial slice in the initial strip. Three is the
/// manifold minimum, so freshly built universes start as thin as allowed.
const INITIAL_WIDTH: usize = 3;

/// Per-vertex neighbor list; the mean vertex degree is six.
pub type VertexNeighborList = SmallVec<[Label<Vertex>; 8]>;
/// Per-triangle dual neighbor list; at most three entries.
pub type TriangleNeighborList = SmallVec<[Label<Triangle>; 3]>;
/// Links incident to one vertex.
pub type VertexLinkList = SmallVec<[Label<Link>; 8]>;
/// The left, right, and center link of one triangle.
pub type TriangleLinkSlots = [Option<Label<Link>>; 3];

/// Environmental failures of geometry export/import.
#[derive(Debug, Error)]
pub enum GeometryIoError {
    /// The file could not be read or written.
    #[error("failed to {action} geometry file `{path}`: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file was read but its contents do not describe a valid
    /// triangulation.
    #[error("malformed geometry file `{path}`: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// A two-dimensional causal triangulation with a fixed time foliation.
///
/// The topology (torus or 2-sphere) is fixed at creation. The three local
/// moves ([`insert_vertex`](Self::insert_vertex),
/// [`remove_vertex`](Self::remove_vertex), [`flip_link`](Self::flip_link))
/// keep the simplicial-manifold invariants and incrementally maintain the
/// three candidate bags that the Metropolis driver samples from.
///
/// # Examples
///
/// ```rust
/// use cdt2d::core::universe::Universe;
///
/// let universe = Universe::new(4, false, 8);
/// assert_eq!(universe.vertex_count(), 12);
/// assert_eq!(universe.triangle_count(), 24);
/// assert_eq!(universe.slice_sizes(), &[3, 3, 3, 3]);
/// ```
pub struct Universe {
    n_slices: u32,
    sphere: bool,
    imported: bool,
    /// Number of vertices per time slice.
    slice_sizes: Vec<u32>,

    vertices: Pool<Vertex>,
    triangles: Pool<Triangle>,
    links: Pool<Link>,

    /// All live triangles; candidates for the (2,4) add move.
    triangles_all: Bag<Triangle>,
    /// Order-4 vertices; candidates for the (4,2) delete move.
    vertices_four: Bag<Vertex>,
    /// Triangles whose right neighbor has opposite orientation;
    /// candidates for the (2,2) flip move.
    triangles_flip: Bag<Triangle>,

    // Derived adjacency, rebuilt once per sweep for the observables.
    // Neighbor vectors are dense tables indexed by raw label.
    vertex_order: Vec<Label<Vertex>>,
    triangle_order: Vec<Label<Triangle>>,
    link_order: Vec<Label<Link>>,
    vertex_neighbors: Vec<VertexNeighborList>,
    triangle_neighbors: Vec<TriangleNeighborList>,
    vertex_links: Vec<VertexLinkList>,
    triangle_links: Vec<TriangleLinkSlots>,
}

impl Universe {
    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// Worst-case pool sizes for a run aiming at `target_volume`
    /// triangles. The soft volume fixing keeps the triangle count close to
    /// the target, so a handful of multiples is ample headroom.
    fn vertex_capacity(target_volume: u32, slices: u32) -> usize {
        4 * (target_volume as usize).max(16) + INITIAL_WIDTH * slices as usize
    }

    fn empty(n_slices: u32, sphere: bool, vertex_capacity: usize) -> Self {
        assert!(n_slices >= 3, "a causal strip needs at least 3 time slices");
        let triangle_capacity = 2 * vertex_capacity;
        let link_capacity = 3 * vertex_capacity;
        Self {
            n_slices,
            sphere,
            imported: false,
            slice_sizes: vec![0; n_slices as usize],
            vertices: Pool::with_capacity(vertex_capacity),
            triangles: Pool::with_capacity(triangle_capacity),
            links: Pool::with_capacity(link_capacity),
            triangles_all: Bag::new(triangle_capacity),
            vertices_four: Bag::new(vertex_capacity),
            triangles_flip: Bag::new(triangle_capacity),
            vertex_order: Vec::new(),
            triangle_order: Vec::new(),
            link_order: Vec::new(),
            vertex_neighbors: Vec::new(),
            triangle_neighbors: Vec::new(),
            vertex_links: Vec::new(),
            triangle_links: Vec::new(),
        }
    }

    /// Builds the initial regular strip of width 3: `slices` time slices,
    /// periodic in space and time. In sphere mode the strip is the same
    /// (every slice already sits at the three-vertex cap minimum); the cap
    /// semantics are enforced by the move rejection rules and by the
    /// adjacency rebuild, which never exposes a dual neighbor across
    /// either cap.
    #[must_use]
    pub fn new(slices: u32, sphere: bool, target_volume: u32) -> Self {
        let mut universe = Self::empty(
            slices,
            sphere,
            Self::vertex_capacity(target_volume, slices),
        );
        universe.build_initial_strip();
        universe
    }

    fn build_initial_strip(&mut self) {
        let w = INITIAL_WIDTH;
        let t = self.n_slices as usize;

        let mut initial_vertices = Vec::with_capacity(w * t);
        for i in 0..w * t {
            let v = self.vertices.create();
            self.vertices[v].time = (i / w) as u32;
            initial_vertices.push(v);
        }
        for size in &mut self.slice_sizes {
            *size = w as u32;
        }

        // Two triangles per lattice site: an UP one based on row i and a
        // DOWN one based on row i+1, periodic in both directions.
        let mut initial_triangles = Vec::with_capacity(2 * w * t);
        for i in 0..t {
            for j in 0..w {
                let up = self.triangles.create();
                self.set_vertices(
                    up,
                    initial_vertices[i * w + j],
                    initial_vertices[i * w + (j + 1) % w],
                    initial_vertices[((i + 1) % t) * w + j],
                );
                initial_triangles.push(up);

                let down = self.triangles.create();
                self.set_vertices(
                    down,
                    initial_vertices[((i + 1) % t) * w + j],
                    initial_vertices[((i + 1) % t) * w + (j + 1) % w],
                    initial_vertices[i * w + (j + 1) % w],
                );
                initial_triangles.push(down);

                self.triangles_all.add(up);
                self.triangles_all.add(down);
                // UP and DOWN alternate horizontally, so the whole strip
                // starts out flippable.
                self.triangles_flip.add(up);
                self.triangles_flip.add(down);
            }
        }

        // Wire the neighbor cycles: each strip is a cycle of 2w
        // alternating triangles, and center neighbors sit in the
        // vertically adjacent strip.
        for i in 0..t {
            for j in 0..w {
                let row = 2 * i * w;
                let column = 2 * j;
                self.set_triangles(
                    initial_triangles[row + column],
                    initial_triangles[row + (column + 2 * w - 1) % (2 * w)],
                    initial_triangles[row + column + 1],
                    initial_triangles[(row + column + 2 * t * w - 2 * w + 1) % (2 * t * w)],
                );
                self.set_triangles(
                    initial_triangles[row + column + 1],
                    initial_triangles[row + column],
                    initial_triangles[row + (column + 2) % (2 * w)],
                    initial_triangles[(row + column + 2 * w) % (2 * t * w)],
                );
            }
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Number of time slices `T`.
    #[must_use]
    pub fn n_slices(&self) -> u32 {
        self.n_slices
    }

    /// Whether the topology is a 2-sphere (otherwise a torus).
    #[must_use]
    pub fn is_sphere(&self) -> bool {
        self.sphere
    }

    /// Whether this universe was loaded from a geometry file.
    #[must_use]
    pub fn imported(&self) -> bool {
        self.imported
    }

    /// Vertices per time slice.
    #[must_use]
    pub fn slice_sizes(&self) -> &[u32] {
        &self.slice_sizes
    }

    /// `N₀`, the number of live vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// `N₂`, the number of live triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of links from the last adjacency rebuild.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn vertex(&self, v: Label<Vertex>) -> &Vertex {
        &self.vertices[v]
    }

    #[must_use]
    pub fn triangle(&self, t: Label<Triangle>) -> &Triangle {
        &self.triangles[t]
    }

    #[must_use]
    pub fn link(&self, l: Label<Link>) -> &Link {
        &self.links[l]
    }

    /// All live triangles, the (2,4)-move candidates.
    #[must_use]
    pub fn triangles_all(&self) -> &Bag<Triangle> {
        &self.triangles_all
    }

    /// Order-4 vertices, the (4,2)-move candidates.
    #[must_use]
    pub fn vertices_four(&self) -> &Bag<Vertex> {
        &self.vertices_four
    }

    /// Flippable triangles, the (2,2)-move candidates.
    #[must_use]
    pub fn triangles_flip(&self) -> &Bag<Triangle> {
        &self.triangles_flip
    }

    /// Vertex labels in the emission order of the last adjacency rebuild.
    #[must_use]
    pub fn vertex_labels(&self) -> &[Label<Vertex>] {
        &self.vertex_order
    }

    /// Triangle labels in the emission order of the last adjacency rebuild.
    #[must_use]
    pub fn triangle_labels(&self) -> &[Label<Triangle>] {
        &self.triangle_order
    }

    /// Link labels from the last adjacency rebuild.
    #[must_use]
    pub fn link_labels(&self) -> &[Label<Link>] {
        &self.link_order
    }

    /// Neighbors of `v` from the last adjacency rebuild.
    #[must_use]
    pub fn vertex_neighbors(&self, v: Label<Vertex>) -> &[Label<Vertex>] {
        &self.vertex_neighbors[v.index()]
    }

    /// Dual neighbors of `t` from the last adjacency rebuild. Sphere caps
    /// expose only the two timelike neighbors.
    #[must_use]
    pub fn triangle_neighbors(&self, t: Label<Triangle>) -> &[Label<Triangle>] {
        &self.triangle_neighbors[t.index()]
    }

    /// Links incident to `v` from the last adjacency rebuild.
    #[must_use]
    pub fn vertex_links(&self, v: Label<Vertex>) -> &[Label<Link>] {
        &self.vertex_links[v.index()]
    }

    /// Left, right, and center link of `t` from the last adjacency rebuild.
    #[must_use]
    pub fn triangle_link_slots(&self, t: Label<Triangle>) -> &TriangleLinkSlots {
        &self.triangle_links[t.index()]
    }

    /// Whether `l` connects vertices on different time slices.
    #[must_use]
    pub fn link_is_timelike(&self, l: Label<Link>) -> bool {
        let link = self.links[l];
        self.vertices[link.vertex_initial()].time != self.vertices[link.vertex_final()].time
    }

    // =========================================================================
    // GRAPH MUTATION PRIMITIVES
    // =========================================================================
    //
    // Setting a neighbor on one side always rewrites the reverse pointer
    // on the other, so a single call keeps the relation mutual.

    fn set_triangle_left(&mut self, t: Label<Triangle>, other: Label<Triangle>) {
        self.triangles[t].tl = other;
        self.triangles[other].tr = t;
    }

    fn set_triangle_right(&mut self, t: Label<Triangle>, other: Label<Triangle>) {
        self.triangles[t].tr = other;
        self.triangles[other].tl = t;
    }

    fn set_triangle_center(&mut self, t: Label<Triangle>, other: Label<Triangle>) {
        self.triangles[t].tc = other;
        self.triangles[other].tc = t;
    }

    fn set_triangles(
        &mut self,
        t: Label<Triangle>,
        tl: Label<Triangle>,
        tr: Label<Triangle>,
        tc: Label<Triangle>,
    ) {
        self.set_triangle_left(t, tl);
        self.set_triangle_right(t, tr);
        self.set_triangle_center(t, tc);
    }

    /// Replaces the right base vertex of `t`. For an UP triangle this also
    /// claims the vertex's left anchor.
    fn set_vertex_right(&mut self, t: Label<Triangle>, v: Label<Vertex>) {
        self.triangles[t].vr = v;
        if self.triangles[t].is_up() {
            self.vertices[v].tl = t;
        }
    }

    /// Assigns all three vertices of `t`, refreshes its time and
    /// orientation, and (for UP triangles) claims the base vertices'
    /// anchors.
    fn set_vertices(
        &mut self,
        t: Label<Triangle>,
        vl: Label<Vertex>,
        vr: Label<Vertex>,
        vc: Label<Vertex>,
    ) {
        {
            let tri = &mut self.triangles[t];
            tri.vl = vl;
            tri.vr = vr;
            tri.vc = vc;
        }
        self.triangles[t].time = self.vertices[vl].time;
        self.update_orientation(t);
        if self.triangles[t].is_up() {
            self.vertices[vl].tr = t;
            self.vertices[vr].tl = t;
        }
    }

    /// Recomputes the orientation of `t` from its vertex times. The two
    /// extra rules handle the periodic seam, where slice `T-1` is adjacent
    /// to slice 0.
    fn update_orientation(&mut self, t: Label<Triangle>) {
        let vl_time = self.vertices[self.triangles[t].vl].time;
        let vc_time = self.vertices[self.triangles[t].vc].time;
        let mut orientation = if vl_time < vc_time {
            Orientation::Up
        } else {
            Orientation::Down
        };
        if vc_time == 0 && vl_time > 1 {
            orientation = Orientation::Up;
        }
        if vl_time == 0 && vc_time > 1 {
            orientation = Orientation::Down;
        }
        self.triangles[t].orientation = orientation;
    }

    // =========================================================================
    // ORDER-4 AND FLIP PREDICATES
    // =========================================================================

    /// Whether `v` has exactly four incident triangles (two UP, two DOWN):
    /// its anchors are horizontally adjacent, and so are their center
    /// neighbors.
    #[must_use]
    pub fn is_four_vertex(&self, v: Label<Vertex>) -> bool {
        let tl = self.vertices[v].tl;
        let tr = self.vertices[v].tr;
        self.triangles[tl].tr == tr
            && self.triangles[self.triangles[tl].tc].tr == self.triangles[tr].tc
    }

    /// Re-tests `v` against the order-4 predicate and syncs its
    /// `vertices_four` membership.
    fn sync_four_vertex(&mut self, v: Label<Vertex>) {
        let eligible = self.is_four_vertex(v);
        let member = self.vertices_four.contains(v);
        if eligible && !member {
            self.vertices_four.add(v);
        } else if !eligible && member {
            self.vertices_four.remove(v);
        }
    }

    /// Re-tests `t` against the opposite-type-right-neighbor criterion and
    /// syncs its `triangles_flip` membership.
    fn sync_flip_candidate(&mut self, t: Label<Triangle>) {
        let tr = self.triangles[t].tr;
        let eligible = self.triangles[t].orientation != self.triangles[tr].orientation;
        let member = self.triangles_flip.contains(t);
        if eligible && !member {
            self.triangles_flip.add(t);
        } else if !eligible && member {
            self.triangles_flip.remove(t);
        }
    }

    // =========================================================================
    // LOCAL MOVES
    // =========================================================================

    /// The (2,4) add move: splits the shared timelike edge of `t` and its
    /// center neighbor by a new vertex on `t`'s base slice, creating the
    /// right halves of both triangles.
    ///
    /// The caller is responsible for the Metropolis accept/reject decision
    /// and, in sphere mode, for rejecting cap slices beforehand.
    pub fn insert_vertex(&mut self, t: Label<Triangle>) {
        let tc = self.triangles[t].tc;
        let vr = self.triangles[t].vr;
        let time = self.triangles[t].time;
        debug_assert!(
            !self.sphere || (time != 0 && time != self.n_slices - 1),
            "add move must not grow a sphere cap"
        );

        let v = self.vertices.create();
        self.vertices[v].time = time;
        // A fresh vertex starts with exactly four incident triangles.
        self.vertices_four.add(v);
        self.slice_sizes[time as usize] += 1;

        self.set_vertex_right(t, v);
        self.set_vertex_right(tc, v);

        let t1 = self.triangles.create();
        let t2 = self.triangles.create();
        self.triangles_all.add(t1);
        self.triangles_all.add(t2);

        let t_vc = self.triangles[t].vc;
        let tc_vc = self.triangles[tc].vc;
        self.set_vertices(t1, v, vr, t_vc);
        self.set_vertices(t2, v, vr, tc_vc);

        let t_right = self.triangles[t].tr;
        let tc_right = self.triangles[tc].tr;
        self.set_triangles(t1, t, t_right, t2);
        self.set_triangles(t2, tc, tc_right, t1);

        // The new halves inherit their originals' right neighbors, hence
        // also their flip candidacy; the originals now border their own
        // halves (same orientation) and drop out.
        if self.triangles[t1].orientation != self.triangles[t_right].orientation {
            self.triangles_flip.remove(t);
            self.triangles_flip.add(t1);
        }
        if self.triangles[t2].orientation != self.triangles[tc_right].orientation {
            self.triangles_flip.remove(tc);
            self.triangles_flip.add(t2);
        }
    }

    /// The (4,2) delete move: merges the four triangles around the
    /// order-4 vertex `v` into two by destroying the right UP/DOWN pair
    /// and extending the left pair over their span.
    ///
    /// The caller must have checked `slice_sizes[v.time] >= 4`; shrinking
    /// a slice below three vertices would leave the manifold.
    pub fn remove_vertex(&mut self, v: Label<Vertex>) {
        let time = self.vertices[v].time;
        debug_assert!(
            self.slice_sizes[time as usize] >= 4,
            "delete move would collapse slice {time} below the manifold minimum"
        );

        let tl = self.vertices[v].tl;
        let tr = self.vertices[v].tr;
        let tlc = self.triangles[tl].tc;
        let trc = self.triangles[tr].tc;

        let trn = self.triangles[tr].tr;
        let trcn = self.triangles[trc].tr;

        self.set_triangle_right(tl, trn);
        self.set_triangle_right(tlc, trcn);

        // Both doomed triangles share the same right base vertex; the
        // surviving pair takes it over, and (via the UP setter) its left
        // anchor now points at `tl`.
        let far = self.triangles[tr].vr;
        self.set_vertex_right(tl, far);
        self.set_vertex_right(tlc, far);

        self.slice_sizes[time as usize] -= 1;

        self.triangles_all.remove(tr);
        self.triangles_all.remove(trc);
        // The left survivors inherit the removed triangles' right
        // neighbors, hence their flip candidacy; the survivors themselves
        // cannot have been candidates (their right neighbors were the
        // same-orientation doomed pair).
        if self.triangles_flip.contains(tr) {
            self.triangles_flip.remove(tr);
            self.triangles_flip.add(tl);
        }
        if self.triangles_flip.contains(trc) {
            self.triangles_flip.remove(trc);
            self.triangles_flip.add(tlc);
        }

        self.triangles.destroy(tr);
        self.triangles.destroy(trc);

        self.vertices_four.remove(v);
        self.vertices.destroy(v);
    }

    /// The (2,2) flip move: re-triangulates the quadrilateral formed by
    /// `t` and its right neighbor, reconnecting the shared timelike edge
    /// to the other diagonal pair of vertices.
    ///
    /// `t` must be a flip candidate (right neighbor of opposite
    /// orientation).
    pub fn flip_link(&mut self, t: Label<Triangle>) {
        let tr = self.triangles[t].tr;
        debug_assert!(
            self.triangles[t].orientation != self.triangles[tr].orientation,
            "flip move needs an opposite-orientation right neighbor"
        );
        let tc = self.triangles[t].tc;
        let trc = self.triangles[tr].tc;

        // Whichever of the pair is UP loses its base to the other; its
        // base vertices re-anchor onto the new UP triangle.
        if self.triangles[t].is_up() {
            let vl = self.triangles[t].vl;
            let vr = self.triangles[t].vr;
            self.vertices[vl].tr = tr;
            self.vertices[vr].tl = tr;
        } else {
            let vl = self.triangles[tr].vl;
            let vr = self.triangles[tr].vr;
            self.vertices[vl].tr = t;
            self.vertices[vr].tl = t;
        }

        self.set_triangle_center(t, trc);
        self.set_triangle_center(tr, tc);

        let vl = self.triangles[t].vl;
        let vr = self.triangles[t].vr;
        let vc = self.triangles[t].vc;
        let vrr = self.triangles[tr].vr;

        self.set_vertices(t, vc, vrr, vl);
        self.set_vertices(tr, vl, vr, vrr);

        // Orders of all four touched vertices may have shifted by one in
        // either direction.
        self.sync_four_vertex(vl);
        self.sync_four_vertex(vr);
        self.sync_four_vertex(vc);
        self.sync_four_vertex(vrr);

        // Both of `t` and `tr` changed orientation, so `t` itself stays a
        // flip candidate; only its left neighbor and `tr` can change
        // status.
        let t_left = self.triangles[t].tl;
        self.sync_flip_candidate(t_left);
        self.sync_flip_candidate(tr);
    }

    // =========================================================================
    // SELF-CHECK
    // =========================================================================

    /// Validates every structural invariant: neighbor mutuality, UP–DOWN
    /// alternation, slice closure, candidate-bag agreement, and (in sphere
    /// mode) the three-vertex caps. Intended for debug builds at sweep
    /// boundaries; all violations are fatal.
    pub fn check(&self) {
        let mut up_per_slice = vec![0u32; self.n_slices as usize];

        for &t in &self.triangles_all {
            let tri = &self.triangles[t];
            assert!(self.triangles.contains(tri.tl), "dangling left neighbor");
            assert!(self.triangles.contains(tri.tr), "dangling right neighbor");
            assert!(self.triangles.contains(tri.tc), "dangling center neighbor");
            assert!(self.vertices.contains(tri.vl), "dangling left vertex");
            assert!(self.vertices.contains(tri.vr), "dangling right vertex");
            assert!(self.vertices.contains(tri.vc), "dangling center vertex");

            assert_eq!(self.triangles[tri.tl].tr, t, "left neighbor not mutual");
            assert_eq!(self.triangles[tri.tr].tl, t, "right neighbor not mutual");
            assert_eq!(self.triangles[tri.tc].tc, t, "center neighbor not mutual");
            assert_ne!(
                tri.orientation,
                self.triangles[tri.tc].orientation,
                "center neighbor must have opposite orientation"
            );

            let flippable = tri.orientation != self.triangles[tri.tr].orientation;
            assert_eq!(
                self.triangles_flip.contains(t),
                flippable,
                "flip bag disagrees with the right-neighbor criterion at {t}"
            );

            if tri.is_up() {
                up_per_slice[tri.time as usize] += 1;
            }
        }

        for (time, (&ups, &size)) in up_per_slice.iter().zip(&self.slice_sizes).enumerate() {
            assert_eq!(
                ups, size,
                "slice {time}: UP-triangle count disagrees with slice size"
            );
        }

        // Walk every vertex star once (each UP triangle contributes its
        // left base vertex exactly once) and compare the true incidence
        // count against the order-4 bag.
        for &t in &self.triangles_all {
            if self.triangles[t].is_down() {
                continue;
            }
            let v = self.triangles[t].vl;
            let anchor_right = self.vertices[v].tr;

            let mut up_degree = 1;
            let mut tn = self.vertices[v].tl;
            while self.triangles[tn].tr != anchor_right {
                tn = self.triangles[tn].tr;
                up_degree += 1;
            }
            up_degree += 1;

            let mut down_degree = 1;
            let end = self.triangles[anchor_right].tc;
            tn = self.triangles[self.vertices[v].tl].tc;
            while self.triangles[tn].tr != end {
                tn = self.triangles[tn].tr;
                down_degree += 1;
            }
            down_degree += 1;

            assert_eq!(
                self.vertices_four.contains(v),
                up_degree + down_degree == 4,
                "order-4 bag disagrees with the actual order of vertex {v}"
            );
        }

        for &v in &self.vertices_four {
            let tl = self.vertices[v].tl;
            let tr = self.vertices[v].tr;
            assert_eq!(self.triangles[tl].tr, tr, "order-4 anchors not adjacent");
            assert_eq!(self.triangles[tr].tl, tl, "order-4 anchors not mutual");
        }

        if self.sphere {
            assert_eq!(self.slice_sizes[0], 3, "bottom cap must keep 3 vertices");
            assert_eq!(
                self.slice_sizes[self.n_slices as usize - 1],
                3,
                "top cap must keep 3 vertices"
            );
        }
    }

    // =========================================================================
    // ADJACENCY REBUILD
    // =========================================================================

    /// Rebuilds all derived adjacency data in the order the parts depend
    /// on each other: vertices, triangles, links.
    pub fn rebuild_adjacency(&mut self) {
        self.update_vertex_data();
        self.update_triangle_data();
        self.update_link_data();
    }

    /// Collects the live vertices (via the left base vertex of each UP
    /// triangle) and rebuilds their neighbor lists by walking each star:
    /// the UP cycle along the base slice, then the DOWN cycle below it.
    /// Sphere caps walk only the side that exists.
    pub fn update_vertex_data(&mut self) {
        self.vertex_order.clear();
        let mut max_label = 0;
        for &t in &self.triangles_all {
            if self.triangles[t].is_up() {
                let v = self.triangles[t].vl;
                self.vertex_order.push(v);
                max_label = max_label.max(v.index());
            }
        }

        self.vertex_neighbors.clear();
        self.vertex_neighbors
            .resize(max_label + 1, VertexNeighborList::new());

        for idx in 0..self.vertex_order.len() {
            let v = self.vertex_order[idx];
            let time = self.vertices[v].time;
            let mut neighbors = VertexNeighborList::new();

            if self.sphere && time == 0 {
                let mut tn = self.vertices[v].tl;
                loop {
                    neighbors.push(self.triangles[tn].vl);
                    tn = self.triangles[tn].tr;
                    if !self.triangles[tn].is_down() {
                        break;
                    }
                }
                neighbors.push(self.triangles[tn].vc);
                neighbors.push(self.triangles[tn].vr);
            } else if self.sphere && time == self.n_slices - 1 {
                let mut tn = self.triangles[self.vertices[v].tl].tc;
                loop {
                    neighbors.push(self.triangles[tn].vl);
                    tn = self.triangles[tn].tr;
                    if !self.triangles[tn].is_up() {
                        break;
                    }
                }
                neighbors.push(self.triangles[tn].vc);
                neighbors.push(self.triangles[tn].vr);
            } else {
                let mut tn = self.vertices[v].tl;
                loop {
                    neighbors.push(self.triangles[tn].vl);
                    tn = self.triangles[tn].tr;
                    if !self.triangles[tn].is_down() {
                        break;
                    }
                }
                neighbors.push(self.triangles[tn].vc);
                neighbors.push(self.triangles[tn].vr);

                tn = self.triangles[self.triangles[tn].tc].tl;
                while self.triangles[tn].is_up() {
                    neighbors.push(self.triangles[tn].vr);
                    tn = self.triangles[tn].tl;
                }
                neighbors.push(self.triangles[tn].vc);
            }

            self.vertex_neighbors[v.index()] = neighbors;
        }
    }

    /// Rebuilds the dual adjacency. Interior triangles expose all three
    /// neighbors; in sphere mode the triangles bordering a cap expose only
    /// their two timelike neighbors.
    pub fn update_triangle_data(&mut self) {
        self.triangle_order.clear();
        let mut max_label = 0;
        for &t in &self.triangles_all {
            self.triangle_order.push(t);
            max_label = max_label.max(t.index());
        }

        self.triangle_neighbors.clear();
        self.triangle_neighbors
            .resize(max_label + 1, TriangleNeighborList::new());

        for idx in 0..self.triangle_order.len() {
            let t = self.triangle_order[idx];
            let tri = self.triangles[t];
            let capped = self.sphere
                && ((tri.is_up() && tri.time == 0)
                    || (tri.is_down() && tri.time == self.n_slices - 1));
            let mut neighbors = TriangleNeighborList::new();
            neighbors.push(tri.tl);
            neighbors.push(tri.tr);
            if !capped {
                neighbors.push(tri.tc);
            }
            self.triangle_neighbors[t.index()] = neighbors;
        }
    }

    /// Destroys all links and regenerates them: every triangle contributes
    /// its left timelike link, every UP triangle additionally the
    /// spacelike link along its base. On the torus this yields exactly
    /// `3 · |vertices|` links.
    pub fn update_link_data(&mut self) {
        for idx in 0..self.link_order.len() {
            let l = self.link_order[idx];
            self.links.destroy(l);
        }
        self.link_order.clear();

        self.vertex_links.clear();
        self.vertex_links
            .resize(self.vertex_neighbors.len(), VertexLinkList::new());
        self.triangle_links.clear();
        self.triangle_links
            .resize(self.triangle_neighbors.len(), [None; 3]);

        for idx in 0..self.triangle_order.len() {
            let t = self.triangle_order[idx];
            let tri = self.triangles[t];

            let ll = self.links.create();
            {
                let link = &mut self.links[ll];
                if tri.is_up() {
                    link.vi = tri.vl;
                    link.vf = tri.vc;
                } else {
                    link.vi = tri.vc;
                    link.vf = tri.vl;
                }
                link.tp = tri.tl;
                link.tm = t;
            }
            self.vertex_links[tri.vl.index()].push(ll);
            self.vertex_links[tri.vc.index()].push(ll);
            self.triangle_links[t.index()][0] = Some(ll);
            self.triangle_links[tri.tl.index()][1] = Some(ll);
            self.link_order.push(ll);

            if tri.is_up() {
                let lh = self.links.create();
                {
                    let link = &mut self.links[lh];
                    link.vi = tri.vl;
                    link.vf = tri.vr;
                    link.tp = t;
                    link.tm = tri.tc;
                }
                self.vertex_links[tri.vl.index()].push(lh);
                self.vertex_links[tri.vr.index()].push(lh);
                self.triangle_links[t.index()][2] = Some(lh);
                self.triangle_links[tri.tc.index()][2] = Some(lh);
                self.link_order.push(lh);
            }
        }

        assert_eq!(
            self.link_order.len(),
            3 * self.vertex_order.len(),
            "link regeneration lost the 3:1 link-to-vertex ratio"
        );
    }

    // =========================================================================
    // GEOMETRY EXPORT / IMPORT
    // =========================================================================

    /// Conventional file name for a geometry checkpoint:
    /// `geometry-v<targetVolume>-t<slices>-s<seed>[-sphere].dat`.
    #[must_use]
    pub fn checkpoint_filename(target_volume: u32, slices: u32, seed: u64, sphere: bool) -> String {
        format!(
            "geometry-v{target_volume}-t{slices}-s{seed}{}.dat",
            if sphere { "-sphere" } else { "" }
        )
    }

    /// [`checkpoint_filename`](Self::checkpoint_filename) for this
    /// universe's parameters.
    #[must_use]
    pub fn geometry_filename(&self, target_volume: u32, seed: u64) -> String {
        Self::checkpoint_filename(target_volume, self.n_slices, seed, self.sphere)
    }

    /// Serializes the current geometry to `path` in the line-delimited
    /// integer format. Vertices and triangles are written in the adjacency
    /// emission order and referenced by their 0-based position.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryIoError::Io`] when the file cannot be written.
    pub fn export_geometry(&mut self, path: &Path) -> Result<(), GeometryIoError> {
        self.update_vertex_data();
        self.update_triangle_data();

        let io_err = |source| GeometryIoError::Io {
            action: "write",
            path: path.to_path_buf(),
            source,
        };

        let mut vertex_index: FxHashMap<Label<Vertex>, usize> = FxHashMap::default();
        for (i, &v) in self.vertex_order.iter().enumerate() {
            vertex_index.insert(v, i);
        }
        let mut triangle_index: FxHashMap<Label<Triangle>, usize> = FxHashMap::default();
        for (i, &t) in self.triangle_order.iter().enumerate() {
            triangle_index.insert(t, i);
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let mut out = BufWriter::new(File::create(path).map_err(io_err)?);

        writeln!(out, "{}", self.vertex_order.len()).map_err(io_err)?;
        for &v in &self.vertex_order {
            writeln!(out, "{}", self.vertices[v].time).map_err(io_err)?;
        }
        writeln!(out, "{}", self.vertex_order.len()).map_err(io_err)?;
        writeln!(out, "{}", self.triangle_order.len()).map_err(io_err)?;
        for &t in &self.triangle_order {
            let tri = self.triangles[t];
            writeln!(
                out,
                "{} {} {}",
                vertex_index[&tri.vl], vertex_index[&tri.vr], vertex_index[&tri.vc]
            )
            .map_err(io_err)?;
            writeln!(
                out,
                "{} {} {}",
                triangle_index[&tri.tl], triangle_index[&tri.tr], triangle_index[&tri.tc]
            )
            .map_err(io_err)?;
        }
        writeln!(out, "{}", self.triangle_order.len()).map_err(io_err)?;
        out.flush().map_err(io_err)?;

        info!(path = %path.display(), "exported geometry");
        Ok(())
    }

    /// Reconstructs a universe from a geometry file written by
    /// [`export_geometry`](Self::export_geometry). Candidate bags are
    /// repopulated from scratch and the full invariant check runs before
    /// the universe is handed back.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryIoError::Io`] when the file cannot be read and
    /// [`GeometryIoError::Malformed`] when its contents are not a valid
    /// geometry (bad counts, out-of-range indices, violated cap
    /// invariant).
    pub fn import_geometry(
        path: &Path,
        sphere: bool,
        target_volume: u32,
    ) -> Result<Self, GeometryIoError> {
        let text = fs::read_to_string(path).map_err(|source| GeometryIoError::Io {
            action: "read",
            path: path.to_path_buf(),
            source,
        })?;
        let malformed = |reason: String| GeometryIoError::Malformed {
            path: path.to_path_buf(),
            reason,
        };

        let mut tokens = text.split_ascii_whitespace();
        let mut next_int = move || -> Result<usize, GeometryIoError> {
            let token = tokens.next().ok_or_else(|| GeometryIoError::Malformed {
                path: path.to_path_buf(),
                reason: "unexpected end of file".into(),
            })?;
            token.parse::<usize>().map_err(|_| GeometryIoError::Malformed {
                path: path.to_path_buf(),
                reason: format!("not a non-negative integer: `{token}`"),
            })
        };

        let n_vertices = next_int()?;
        if n_vertices == 0 {
            return Err(malformed("empty vertex section".into()));
        }
        let mut times = Vec::with_capacity(n_vertices);
        let mut max_time = 0;
        for _ in 0..n_vertices {
            let time = next_int()?;
            max_time = max_time.max(time);
            times.push(time as u32);
        }
        if next_int()? != n_vertices {
            return Err(malformed("vertex-count delimiter mismatch".into()));
        }

        let n_triangles = next_int()?;
        let mut triangle_records = Vec::with_capacity(n_triangles);
        for _ in 0..n_triangles {
            let mut record = [0usize; 6];
            for slot in &mut record {
                *slot = next_int()?;
            }
            for &v in &record[..3] {
                if v >= n_vertices {
                    return Err(malformed(format!("vertex index {v} out of range")));
                }
            }
            for &t in &record[3..] {
                if t >= n_triangles {
                    return Err(malformed(format!("triangle index {t} out of range")));
                }
            }
            triangle_records.push(record);
        }
        if next_int()? != n_triangles {
            return Err(malformed("triangle-count delimiter mismatch".into()));
        }

        let n_slices = max_time as u32 + 1;
        if n_slices < 3 {
            return Err(malformed(format!("only {n_slices} time slices")));
        }
        let capacity =
            Self::vertex_capacity(target_volume, n_slices).max(2 * n_vertices);
        let mut universe = Self::empty(n_slices, sphere, capacity);

        let mut vertex_labels = Vec::with_capacity(n_vertices);
        for &time in &times {
            let v = universe.vertices.create();
            universe.vertices[v].time = time;
            universe.slice_sizes[time as usize] += 1;
            vertex_labels.push(v);
        }

        let mut triangle_labels = Vec::with_capacity(n_triangles);
        for record in &triangle_records {
            let t = universe.triangles.create();
            universe.set_vertices(
                t,
                vertex_labels[record[0]],
                vertex_labels[record[1]],
                vertex_labels[record[2]],
            );
            universe.triangles_all.add(t);
            triangle_labels.push(t);
        }
        for (i, record) in triangle_records.iter().enumerate() {
            universe.set_triangles(
                triangle_labels[i],
                triangle_labels[record[3]],
                triangle_labels[record[4]],
                triangle_labels[record[5]],
            );
        }

        for i in 0..triangle_labels.len() {
            let t = triangle_labels[i];
            if universe.triangles[t].is_up() {
                let v = universe.triangles[t].vl;
                universe.sync_four_vertex(v);
            }
            universe.sync_flip_candidate(t);
        }

        if sphere {
            let bottom = universe.slice_sizes[0];
            let top = universe.slice_sizes[n_slices as usize - 1];
            if bottom != 3 || top != 3 {
                return Err(malformed(format!(
                    "sphere caps must hold 3 vertices, found {bottom} and {top}"
                )));
            }
        }

        universe.check();
        universe.imported = true;
        info!(path = %path.display(), vertices = n_vertices, triangles = n_triangles, "imported geometry");
        Ok(universe)
    }
}

impl fmt::Debug for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Universe")
            .field("n_slices", &self.n_slices)
            .field("sphere", &self.sphere)
            .field("vertices", &self.vertices.len())
            .field("triangles", &self.triangles.len())
            .field("slice_sizes", &self.slice_sizes)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn first_triangle(universe: &Universe) -> Label<Triangle> {
        *universe.triangles_all().iter().next().expect("non-empty universe")
    }

    #[test]
    fn torus_initial_strip_counts() {
        let universe = Universe::new(4, false, 8);
        assert_eq!(universe.vertex_count(), 12);
        assert_eq!(universe.triangle_count(), 24);
        assert_eq!(universe.slice_sizes(), &[3, 3, 3, 3]);
        assert_eq!(universe.triangles_all().len(), 24);
        assert_eq!(universe.triangles_flip().len(), 24);
        assert!(universe.vertices_four().is_empty());
        universe.check();
    }

    #[test]
    fn initial_strip_alternates_orientations() {
        let universe = Universe::new(4, false, 8);
        let mut up = 0;
        let mut down = 0;
        for &t in universe.triangles_all() {
            let tri = universe.triangle(t);
            if tri.is_up() {
                up += 1;
            } else {
                down += 1;
            }
            assert_ne!(
                tri.orientation(),
                universe.triangle(tri.triangle_center()).orientation()
            );
        }
        assert_eq!(up, 12);
        assert_eq!(down, 12);
    }

    #[test]
    fn add_move_grows_slice_and_marks_new_vertex() {
        let mut universe = Universe::new(4, false, 8);
        let t = first_triangle(&universe);
        let time = universe.triangle(t).time;
        universe.insert_vertex(t);

        assert_eq!(universe.triangle_count(), 26);
        assert_eq!(universe.vertex_count(), 13);
        assert_eq!(universe.slice_sizes()[time as usize], 4);
        assert_eq!(universe.vertices_four().len(), 1);
        let v = *universe.vertices_four().iter().next().unwrap();
        assert!(universe.is_four_vertex(v));
        universe.check();
    }

    #[test]
    fn add_then_delete_restores_all_counters() {
        let mut universe = Universe::new(4, false, 8);
        let flip_before = universe.triangles_flip().len();
        let t = first_triangle(&universe);
        universe.insert_vertex(t);
        let v = *universe.vertices_four().iter().next().unwrap();
        universe.remove_vertex(v);

        assert_eq!(universe.vertex_count(), 12);
        assert_eq!(universe.triangle_count(), 24);
        assert_eq!(universe.slice_sizes(), &[3, 3, 3, 3]);
        assert!(universe.vertices_four().is_empty());
        assert_eq!(universe.triangles_flip().len(), flip_before);
        universe.check();
    }

    #[test]
    fn flip_move_preserves_counts_and_invariants() {
        let mut universe = Universe::new(4, false, 8);
        let t = *universe.triangles_flip().iter().next().unwrap();
        universe.flip_link(t);
        assert_eq!(universe.vertex_count(), 12);
        assert_eq!(universe.triangle_count(), 24);
        universe.check();

        // Flipping the same edge back must also be legal: t keeps its
        // opposite-orientation right neighbor through the move.
        universe.flip_link(t);
        universe.check();
    }

    #[test]
    fn adjacency_rebuild_on_torus_satisfies_link_ratio() {
        let mut universe = Universe::new(4, false, 8);
        universe.rebuild_adjacency();
        assert_eq!(universe.vertex_labels().len(), 12);
        assert_eq!(universe.triangle_labels().len(), 24);
        assert_eq!(universe.link_labels().len(), 36);

        // Interior vertices of the regular strip all have degree 6, and
        // every triangle exposes its three dual neighbors.
        for &v in universe.vertex_labels() {
            assert_eq!(universe.vertex_neighbors(v).len(), 6);
        }
        for &t in universe.triangle_labels() {
            assert_eq!(universe.triangle_neighbors(t).len(), 3);
        }
    }

    #[test]
    fn links_split_into_timelike_and_spacelike() {
        let mut universe = Universe::new(4, false, 8);
        universe.rebuild_adjacency();
        let timelike = universe
            .link_labels()
            .iter()
            .filter(|&&l| universe.link_is_timelike(l))
            .count();
        // 2 timelike links per vertex, 1 spacelike.
        assert_eq!(timelike, 24);
        assert_eq!(universe.link_labels().len() - timelike, 12);
    }

    #[test]
    fn link_slots_are_fully_populated_on_the_torus() {
        let mut universe = Universe::new(4, false, 8);
        universe.rebuild_adjacency();
        for &t in universe.triangle_labels() {
            let slots = universe.triangle_link_slots(t);
            assert!(slots.iter().all(Option::is_some));
            // The left link of a triangle is the right link of its left
            // neighbor, and the center link is shared across the base.
            let tri = universe.triangle(t);
            let left_slots = universe.triangle_link_slots(tri.triangle_left());
            assert_eq!(slots[0], left_slots[1]);
            let center_slots = universe.triangle_link_slots(tri.triangle_center());
            assert_eq!(slots[2], center_slots[2]);
        }
        for &v in universe.vertex_labels() {
            assert_eq!(universe.vertex_links(v).len(), 6);
            for &l in universe.vertex_links(v) {
                let link = universe.link(l);
                assert!(link.vertex_initial() == v || link.vertex_final() == v);
            }
        }
    }

    #[test]
    fn vertex_anchors_are_adjacent_up_triangles() {
        let universe = Universe::new(4, false, 8);
        for &t in universe.triangles_all() {
            if !universe.triangle(t).is_up() {
                continue;
            }
            let v = universe.triangle(t).vertex_left();
            let vertex = universe.vertex(v);
            let left = universe.triangle(vertex.triangle_left());
            assert!(left.is_up());
            assert_eq!(left.vertex_right(), v);
            assert_eq!(
                universe.triangle(vertex.triangle_right()).vertex_left(),
                v
            );
        }
    }

    #[test]
    fn sphere_mode_hides_cap_neighbors() {
        let mut universe = Universe::new(6, true, 40);
        universe.rebuild_adjacency();
        universe.check();
        for &t in universe.triangle_labels() {
            let tri = universe.triangle(t);
            let expected = if (tri.is_up() && tri.time == 0) || (tri.is_down() && tri.time == 5) {
                2
            } else {
                3
            };
            assert_eq!(universe.triangle_neighbors(t).len(), expected);
        }
    }

    #[test]
    fn repeated_adds_keep_check_green() {
        let mut universe = Universe::new(5, false, 16);
        for _ in 0..8 {
            let t = first_triangle(&universe);
            universe.insert_vertex(t);
            universe.check();
        }
        assert_eq!(universe.triangle_count(), 30 + 2 * 8);
    }

    #[test]
    fn geometry_filename_convention() {
        let torus = Universe::new(8, false, 100);
        assert_eq!(torus.geometry_filename(100, 1), "geometry-v100-t8-s1.dat");
        let sphere = Universe::new(6, true, 40);
        assert_eq!(
            sphere.geometry_filename(40, 7),
            "geometry-v40-t6-s7-sphere.dat"
        );
    }
}
