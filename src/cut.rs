//! Cuts and per-node cut sets
//!
//! A cut set stores its cuts in a fixed arena of slots and keeps a separate
//! order array of slot indices, so reordering never moves a cut.

use crate::network::Node;
use std::cmp::Ordering;
use std::fmt;

/// Largest number of leaves a cut can hold.
pub const MAX_CUT_SIZE: usize = 8;

/// Tolerance for comparing floating point costs.
pub const EPS: f32 = 0.005;

/// Cost annotations shared by every cut based engine.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CutData {
    pub delay: u32,
    pub area_flow: f32,
    pub edge_flow: f32,
    /// Set when the cut must not be selected, e.g. it has no library match.
    pub ignore: bool,
    /// Index into an engine specific match table.
    pub match_index: u32,
}

/// Priority used to keep a cut set sorted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    /// Delay, then size, then area flow, then edge flow.
    Delay,
    /// Delay, then area flow, then edge flow, then size.
    Delay2,
    /// Area flow, then edge flow, then size, then delay.
    Area,
}

#[derive(Clone, PartialEq)]
pub struct Cut {
    leaves: [Node; MAX_CUT_SIZE],
    size: u8,
    signature: u64,
    function: u32,
    pub data: CutData,
}

impl Cut {
    /// Creates a cut over sorted, pairwise distinct leaves.
    pub fn new(leaves: &[Node]) -> Cut {
        assert!(
            leaves.len() <= MAX_CUT_SIZE,
            "cut has {} leaves but at most {} are supported",
            leaves.len(),
            MAX_CUT_SIZE
        );
        assert!(
            leaves.windows(2).all(|w| w[0] < w[1]),
            "cut leaves must be sorted and distinct"
        );

        let mut cut = Cut {
            leaves: [0; MAX_CUT_SIZE],
            size: leaves.len() as u8,
            signature: 0,
            function: 0,
            data: CutData::default(),
        };
        cut.leaves[..leaves.len()].copy_from_slice(leaves);
        cut.signature = leaves.iter().fold(0, |acc, l| acc | signature_bit(*l));
        cut
    }

    /// Creates the unit cut of a node.
    pub fn trivial(n: Node) -> Cut {
        Cut::new(&[n])
    }

    pub fn leaves(&self) -> &[Node] {
        &self.leaves[..self.size as usize]
    }

    pub fn size(&self) -> usize {
        self.size as usize
    }

    pub fn signature(&self) -> u64 {
        self.signature
    }

    /// Returns the handle of the cut function in a truth table cache.
    pub fn function(&self) -> u32 {
        self.function
    }

    pub fn set_function(&mut self, function: u32) {
        self.function = function;
    }

    /// Replaces the leaves, keeping function and data.
    pub fn set_leaves(&mut self, leaves: &[Node]) {
        let function = self.function;
        let data = self.data;
        *self = Cut::new(leaves);
        self.function = function;
        self.data = data;
    }

    pub fn is_trivial_of(&self, n: Node) -> bool {
        self.size == 1 && self.leaves[0] == n
    }

    /// Returns true if every leaf of `self` is a leaf of `other`.
    pub fn dominates(&self, other: &Cut) -> bool {
        if self.size > other.size || self.signature & other.signature != self.signature {
            return false;
        }

        let mut j = 0;
        for leaf in self.leaves() {
            while j < other.size() && other.leaves[j] < *leaf {
                j += 1;
            }
            if j == other.size() || other.leaves[j] != *leaf {
                return false;
            }
            j += 1;
        }
        true
    }

    /// Returns the union of the leaf sets, or `None` as soon as the union
    /// grows beyond `cut_size` leaves.
    pub fn merge(&self, other: &Cut, cut_size: usize) -> Option<Cut> {
        if (self.signature | other.signature).count_ones() as usize > cut_size {
            return None;
        }

        let mut leaves = [0; MAX_CUT_SIZE];
        let mut size = 0;
        let (a, b) = (self.leaves(), other.leaves());
        let (mut i, mut j) = (0, 0);
        while i < a.len() || j < b.len() {
            let leaf = match (a.get(i), b.get(j)) {
                (Some(x), Some(y)) if x == y => {
                    i += 1;
                    j += 1;
                    *x
                }
                (Some(x), Some(y)) if x < y => {
                    i += 1;
                    *x
                }
                (Some(x), None) => {
                    i += 1;
                    *x
                }
                (_, Some(y)) => {
                    j += 1;
                    *y
                }
                (None, None) => unreachable!(),
            };
            if size == cut_size {
                return None;
            }
            leaves[size] = leaf;
            size += 1;
        }

        Some(Cut::new(&leaves[..size]))
    }

    /// Compares two cuts under `order`; `Less` means `self` is better.
    pub fn compare(&self, other: &Cut, order: SortOrder) -> Ordering {
        let delay = self.data.delay.cmp(&other.data.delay);
        let size = self.size.cmp(&other.size);
        let area_flow = compare_eps(self.data.area_flow, other.data.area_flow);
        let edge_flow = compare_eps(self.data.edge_flow, other.data.edge_flow);

        match order {
            SortOrder::Delay => delay.then(size).then(area_flow).then(edge_flow),
            SortOrder::Delay2 => delay.then(area_flow).then(edge_flow).then(size),
            SortOrder::Area => area_flow.then(edge_flow).then(size).then(delay),
        }
    }
}

impl fmt::Debug for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for leaf in self.leaves() {
            write!(f, "{} ", leaf)?;
        }
        write!(f, "}}")
    }
}

fn signature_bit(leaf: Node) -> u64 {
    1 << (leaf % 64)
}

/// Compares two costs, treating values closer than [`EPS`] as equal.
pub fn compare_eps(a: f32, b: f32) -> Ordering {
    if a < b - EPS {
        Ordering::Less
    } else if a > b + EPS {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// A bounded, sorted collection of cuts. The best cut is at index 0.
#[derive(Clone, Debug)]
pub struct CutSet {
    slots: Vec<Cut>,
    order: Vec<usize>,
    free: Vec<usize>,
    capacity: usize,
}

impl CutSet {
    pub fn new(capacity: usize) -> CutSet {
        assert!(capacity > 0, "cut set capacity must be positive");

        CutSet {
            slots: Vec::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
            free: vec![],
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
        self.free.clear();
    }

    fn allocate(&mut self, cut: Cut) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = cut;
                slot
            }
            None => {
                self.slots.push(cut);
                self.slots.len() - 1
            }
        }
    }

    /// Appends a cut without sorting or dominance checks. Does nothing if
    /// the set is full.
    pub fn add_cut(&mut self, leaves: &[Node]) -> Option<&mut Cut> {
        if self.len() == self.capacity {
            return None;
        }

        let slot = self.allocate(Cut::new(leaves));
        self.order.push(slot);
        Some(&mut self.slots[slot])
    }

    /// Returns true if a cut of the set dominates `cut`.
    pub fn is_dominated(&self, cut: &Cut) -> bool {
        self.iter().any(|c| c.dominates(cut))
    }

    /// Removes the cuts `cut` dominates, then inserts it in sorted position.
    pub fn insert(&mut self, cut: Cut, order: SortOrder) {
        let slots = &self.slots;
        let free = &mut self.free;
        self.order.retain(|slot| {
            let dominated = cut.dominates(&slots[*slot]);
            if dominated {
                free.push(*slot);
            }
            !dominated
        });

        self.simple_insert(cut, order);
    }

    /// Inserts `cut` in sorted position without dominance checks. When the
    /// set is full the worst cut is evicted, or `cut` is dropped if it
    /// would be the worst.
    pub fn simple_insert(&mut self, cut: Cut, order: SortOrder) {
        let position = self
            .order
            .partition_point(|slot| self.slots[*slot].compare(&cut, order) == Ordering::Less);

        if self.len() == self.capacity {
            if position == self.len() {
                return;
            }
            if let Some(evicted) = self.order.pop() {
                self.free.push(evicted);
            }
        }

        let slot = self.allocate(cut);
        self.order.insert(position, slot);
    }

    /// Keeps only the first `k` cuts.
    pub fn limit(&mut self, k: usize) {
        while self.order.len() > k {
            if let Some(slot) = self.order.pop() {
                self.free.push(slot);
            }
        }
    }

    /// Moves cut `i` to the front, keeping the relative order of the rest.
    pub fn update_best(&mut self, i: usize) {
        self.order[..=i].rotate_right(1);
    }

    pub fn best(&self) -> &Cut {
        assert!(!self.is_empty(), "cut set is empty");
        &self.slots[self.order[0]]
    }

    pub fn get(&self, i: usize) -> &Cut {
        &self.slots[self.order[i]]
    }

    pub fn get_mut(&mut self, i: usize) -> &mut Cut {
        &mut self.slots[self.order[i]]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cut> + '_ {
        self.order.iter().map(move |slot| &self.slots[*slot])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn cut_with_area(leaves: &[Node], area_flow: f32) -> Cut {
        let mut cut = Cut::new(leaves);
        cut.data.area_flow = area_flow;
        cut
    }

    #[test]
    fn dominance() {
        let small = Cut::new(&[1, 3]);
        let large = Cut::new(&[1, 2, 3]);
        let other = Cut::new(&[2, 3, 4]);
        assert!(small.dominates(&large));
        assert!(small.dominates(&small));
        assert!(!large.dominates(&small));
        assert!(!small.dominates(&other));

        // Leaves 65 and 1 share a signature bit
        assert!(!Cut::new(&[65]).dominates(&Cut::new(&[1, 2])));
    }

    #[test]
    fn merge() {
        let a = Cut::new(&[1, 4]);
        let b = Cut::new(&[2, 4, 7]);
        assert_eq!(a.merge(&b, 4).unwrap().leaves(), &[1, 2, 4, 7]);
        assert!(a.merge(&b, 3).is_none());
        assert_eq!(a.merge(&a, 2).unwrap().leaves(), &[1, 4]);
    }

    #[test]
    #[should_panic(expected = "cut leaves must be sorted and distinct")]
    fn unsorted_leaves() {
        Cut::new(&[3, 1]);
    }

    #[test]
    fn comparison_tolerance() {
        let mut a = cut_with_area(&[1, 2], 1.0);
        let b = cut_with_area(&[1], 1.004);
        // Equal area flow within tolerance, so size decides
        assert_eq!(a.compare(&b, SortOrder::Area), Ordering::Greater);
        a.data.area_flow = 0.99;
        assert_eq!(a.compare(&b, SortOrder::Area), Ordering::Less);

        a.data.delay = 1;
        assert_eq!(a.compare(&b, SortOrder::Delay), Ordering::Greater);
        assert_eq!(b.compare(&a, SortOrder::Delay2), Ordering::Less);
    }

    #[test]
    fn insert_removes_dominated() {
        let mut set = CutSet::new(8);
        set.insert(Cut::new(&[1, 2, 3]), SortOrder::Area);
        set.insert(Cut::new(&[2, 3, 4]), SortOrder::Area);
        assert_eq!(set.len(), 2);

        let cut = Cut::new(&[2, 3]);
        assert!(!set.is_dominated(&cut));
        set.insert(cut, SortOrder::Area);
        assert_eq!(set.len(), 1);
        assert_eq!(set.best().leaves(), &[2, 3]);
        assert!(set.is_dominated(&Cut::new(&[1, 2, 3])));
    }

    #[test]
    fn capacity_keeps_best() {
        let k = 6;
        let mut set = CutSet::new(k);
        // Distinct single leaf cuts never dominate each other
        let areas = [7.0, 3.0, 9.0, 1.0, 8.0, 4.0, 10.0, 2.0, 6.0, 5.0, 0.5];
        assert_eq!(areas.len(), k + 5);
        for (i, area) in areas.iter().enumerate() {
            set.insert(cut_with_area(&[i as Node + 1], *area), SortOrder::Area);
            assert!(set.len() <= k);
        }

        assert_eq!(set.len(), k);
        let kept = set.iter().map(|c| c.data.area_flow).collect::<Vec<_>>();
        assert_eq!(kept, vec![0.5, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn add_cut_when_full() {
        let mut set = CutSet::new(1);
        assert!(set.add_cut(&[1]).is_some());
        assert!(set.add_cut(&[2]).is_none());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn limit_and_update_best() {
        let mut set = CutSet::new(8);
        for i in 0..5 {
            set.simple_insert(cut_with_area(&[i + 1], i as f32), SortOrder::Area);
        }
        set.update_best(3);
        let leaves = set.iter().map(|c| c.leaves()[0]).collect::<Vec<_>>();
        assert_eq!(leaves, vec![4, 1, 2, 3, 5]);

        set.limit(2);
        assert_eq!(set.len(), 2);
        assert_eq!(set.best().leaves(), &[4]);

        // Slots freed by the limit are reused
        set.simple_insert(cut_with_area(&[9], -1.0), SortOrder::Area);
        assert_eq!(set.best().leaves(), &[9]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn random_inserts_stay_irredundant() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut set = CutSet::new(8);
            for _ in 0..40 {
                let mut leaves = (0..rng.gen_range(1..=4))
                    .map(|_| rng.gen_range(0..10))
                    .collect::<Vec<Node>>();
                leaves.sort_unstable();
                leaves.dedup();
                let mut cut = Cut::new(&leaves);
                cut.data.area_flow = rng.gen_range(0.0..4.0);
                if !set.is_dominated(&cut) {
                    set.insert(cut, SortOrder::Area);
                }
            }

            assert!(set.len() <= set.capacity());
            for (i, a) in set.iter().enumerate() {
                for (j, b) in set.iter().enumerate() {
                    assert!(i == j || !a.dominates(b), "{:?} dominates {:?}", a, b);
                }
            }
            for w in set.iter().collect::<Vec<_>>().windows(2) {
                assert_ne!(w[0].compare(w[1], SortOrder::Area), Ordering::Greater);
            }
        }
    }
}
