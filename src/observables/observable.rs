//! The observable contract and the measurement toolbox.
//!
//! Observables are opaque consumers of the frozen adjacency view: once per
//! sweep each registered observable receives the universe (after its
//! adjacency rebuild) plus the auxiliary PRNG stream and returns one
//! output line. Labels must never be retained across sweeps; the next
//! sweep invalidates them and rewrites the adjacency vectors — the
//! by-reference signature of [`Observable::process`] makes holding on to
//! the view impossible in the first place.

use rand::rngs::StdRng;
use rand::Rng;
use rustc_hash::FxHashSet;

use crate::core::pool::Label;
use crate::core::triangle::Triangle;
use crate::core::universe::Universe;
use crate::core::vertex::Vertex;

/// A measurable quantity of the triangulation.
pub trait Observable {
    /// Name used for the output file, e.g. `volume_profile`.
    fn name(&self) -> &str;

    /// Computes one measurement line from the frozen adjacency view.
    fn process(&mut self, universe: &Universe, rng: &mut StdRng) -> String;
}

/// Vertices at link distance exactly `radius` from `origin`
/// (breadth-first over the rebuilt vertex adjacency).
#[must_use]
pub fn sphere(universe: &Universe, origin: Label<Vertex>, radius: u32) -> Vec<Label<Vertex>> {
    let mut done: FxHashSet<Label<Vertex>> = FxHashSet::default();
    let mut frontier = vec![origin];
    let mut next = Vec::new();
    done.insert(origin);

    let mut shell = Vec::new();
    for depth in 0..radius {
        for &v in &frontier {
            for &neighbor in universe.vertex_neighbors(v) {
                if done.insert(neighbor) {
                    next.push(neighbor);
                    if depth == radius - 1 {
                        shell.push(neighbor);
                    }
                }
            }
        }
        std::mem::swap(&mut frontier, &mut next);
        next.clear();
    }
    shell
}

/// Triangles at dual distance exactly `radius` from `origin`
/// (breadth-first over the rebuilt dual adjacency).
#[must_use]
pub fn sphere_dual(
    universe: &Universe,
    origin: Label<Triangle>,
    radius: u32,
) -> Vec<Label<Triangle>> {
    let mut done: FxHashSet<Label<Triangle>> = FxHashSet::default();
    let mut frontier = vec![origin];
    let mut next = Vec::new();
    done.insert(origin);

    let mut shell = Vec::new();
    for depth in 0..radius {
        for &t in &frontier {
            for &neighbor in universe.triangle_neighbors(t) {
                if done.insert(neighbor) {
                    next.push(neighbor);
                    if depth == radius - 1 {
                        shell.push(neighbor);
                    }
                }
            }
        }
        std::mem::swap(&mut frontier, &mut next);
        next.clear();
    }
    shell
}

/// Shortest link distance between two vertices.
#[must_use]
pub fn distance(universe: &Universe, from: Label<Vertex>, to: Label<Vertex>) -> u32 {
    if from == to {
        return 0;
    }
    let mut done: FxHashSet<Label<Vertex>> = FxHashSet::default();
    let mut frontier = vec![from];
    let mut next = Vec::new();
    done.insert(from);

    let mut depth = 0;
    while !frontier.is_empty() {
        depth += 1;
        for &v in &frontier {
            for &neighbor in universe.vertex_neighbors(v) {
                if neighbor == to {
                    return depth;
                }
                if done.insert(neighbor) {
                    next.push(neighbor);
                }
            }
        }
        std::mem::swap(&mut frontier, &mut next);
        next.clear();
    }
    unreachable!("the triangulation is connected");
}

/// Average link distance from the members of `s1` to the members of `s2`,
/// normalized by ε. Each per-member search is bounded at depth `3ε`;
/// targets beyond that horizon contribute nothing. Shared by the
/// Ricci-curve observables, which differ only in how the two shells are
/// chosen.
pub(crate) fn average_shell_distance(
    universe: &Universe,
    s1: &[Label<Vertex>],
    s2: &[Label<Vertex>],
    epsilon: u32,
) -> f64 {
    let mut distance_sum = 0u64;
    let mut distance_count = 0u64;

    for &b in s1 {
        let mut targets: FxHashSet<Label<Vertex>> = s2.iter().copied().collect();
        let mut done: FxHashSet<Label<Vertex>> = FxHashSet::default();
        let mut frontier = vec![b];
        let mut next = Vec::new();
        done.insert(b);
        if targets.remove(&b) {
            distance_count += 1;
        }

        'search: for depth in 0..3 * epsilon {
            for &v in &frontier {
                for &neighbor in universe.vertex_neighbors(v) {
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

/// Uniformly random vertex of the frozen view.
pub fn random_vertex<R: Rng + ?Sized>(universe: &Universe, rng: &mut R) -> Label<Vertex> {
    let labels = universe.vertex_labels();
    labels[rng.random_range(0..labels.len())]
}

/// Uniformly random triangle of the frozen view.
pub fn random_triangle<R: Rng + ?Sized>(universe: &Universe, rng: &mut R) -> Label<Triangle> {
    let labels = universe.triangle_labels();
    labels[rng.random_range(0..labels.len())]
}

// =============================================================================
// TESTS
// =============================================================================
