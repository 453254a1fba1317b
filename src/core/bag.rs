//! Random-access subset of pool labels with O(1) uniform sampling.
//!
//! The Monte Carlo moves need to pick a uniformly random candidate from a
//! changing subset of simplices (all triangles, order-4 vertices, flippable
//! triangles). A [`Bag`] keeps a dense array of members plus a sparse
//! label-indexed position table, giving O(1) `add`, `remove`, `contains`
//! and `pick`.

use rand::Rng;

use crate::core::pool::Label;

const EMPTY: i32 = -1;

/// Unordered subset of the labels of one pool, supporting O(1) membership
/// updates and uniform random picks.
///
/// Misuse (adding a member twice, removing a non-member, picking from an
/// empty bag) is a programming error and panics.
///
/// # Examples
///
/// ```rust
/// use cdt2d::core::bag::Bag;
/// use cdt2d::core::pool::Pool;
///
/// let mut pool: Pool<u32> = Pool::with_capacity(8);
/// let mut bag: Bag<u32> = Bag::new(pool.capacity());
/// let a = pool.create();
/// bag.add(a);
/// assert!(bag.contains(a));
/// bag.remove(a);
/// assert!(bag.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Bag<T> {
    /// Position of each label in `elements`, or `EMPTY`.
    indices: Vec<i32>,
    /// Dense member array.
    elements: Vec<Label<T>>,
}

impl<T> Bag<T> {
    /// Creates an empty bag over a label universe of `capacity` slots,
    /// normally the capacity of the owning pool.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            indices: vec![EMPTY; capacity],
            elements: Vec::new(),
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the bag has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// O(1) membership test.
    #[must_use]
    pub fn contains(&self, label: Label<T>) -> bool {
        self.indices[label.index()] != EMPTY
    }

    /// Adds `label`; it must not already be a member.
    pub fn add(&mut self, label: Label<T>) {
        assert!(!self.contains(label), "bag already contains label {label}");
        self.indices[label.index()] = self.elements.len() as i32;
        self.elements.push(label);
    }

    /// Removes `label`; it must be a member. The last member is moved into
    /// the vacated position to keep the dense array gap-free.
    pub fn remove(&mut self, label: Label<T>) {
        assert!(self.contains(label), "bag does not contain label {label}");
        let position = self.indices[label.index()] as usize;
        let last = self.elements.pop().expect("non-empty by the membership check");
        if last != label {
            self.elements[position] = last;
            self.indices[last.index()] = position as i32;
        }
        self.indices[label.index()] = EMPTY;
    }

    /// Picks a member uniformly at random; the bag must not be empty.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Label<T> {
        assert!(!self.is_empty(), "picking from an empty bag");
        self.elements[rng.random_range(0..self.elements.len())]
    }

    /// Iterates over the members in dense-array order.
    pub fn iter(&self) -> std::slice::Iter<'_, Label<T>> {
        self.elements.iter()
    }
}

impl<'a, T> IntoIterator for &'a Bag<T> {
    type Item = &'a Label<T>;
    type IntoIter = std::slice::Iter<'a, Label<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // Bags only look at the index, so fabricating labels is fine here.
    fn label(i: usize) -> Label<u32> {
        Label::new(i)
    }

    #[test]
    fn add_then_remove_is_identity() {
        let mut bag: Bag<u32> = Bag::new(16);
        let a = label(3);
        let b = label(7);
        bag.add(b);
        bag.add(a);
        bag.remove(a);
        assert!(!bag.contains(a));
        assert!(bag.contains(b));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn remove_patches_the_moved_member() {
        let mut bag: Bag<u32> = Bag::new(16);
        let (a, b, c) = (label(1), label(2), label(3));
        bag.add(a);
        bag.add(b);
        bag.add(c);
        // Removing the first member moves the last one into its slot.
        bag.remove(a);
        assert!(bag.contains(b));
        assert!(bag.contains(c));
        bag.remove(c);
        assert!(bag.contains(b));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn pick_returns_members_only() {
        let mut bag: Bag<u32> = Bag::new(16);
        for i in [2, 5, 11] {
            bag.add(label(i));
        }
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..64 {
            let picked = bag.pick(&mut rng);
            assert!(bag.contains(picked));
        }
    }

    #[test]
    fn pick_is_uniform_enough() {
        let mut bag: Bag<u32> = Bag::new(8);
        for i in 0..4 {
            bag.add(label(i));
        }
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0usize; 8];
        for _ in 0..4000 {
            counts[bag.pick(&mut rng).index()] += 1;
        }
        for i in 0..4 {
            // Each member should land around 1000 draws.
            assert!(counts[i] > 800, "member {i} drawn only {} times", counts[i]);
        }
    }

    #[test]
    #[should_panic(expected = "already contains")]
    fn double_add_panics() {
        let mut bag: Bag<u32> = Bag::new(8);
        let a = label(1);
        bag.add(a);
        bag.add(a);
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn absent_remove_panics() {
        let mut bag: Bag<u32> = Bag::new(8);
        bag.remove(label(1));
    }

    #[test]
    #[should_panic(expected = "empty bag")]
    fn empty_pick_panics() {
        let bag: Bag<u32> = Bag::new(8);
        let mut rng = StdRng::seed_from_u64(0);
        bag.pick(&mut rng);
    }
}
