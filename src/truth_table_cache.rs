//! Hash-consed storage for cut functions
//!
//! Only one of `f` and `!f` is stored: the one whose first bit is zero. A
//! handle is the index of the stored table shifted left by one, with the
//! low bit telling whether the function is the complement of the stored
//! table.

use crate::truth_table::TruthTable;
use hashbrown::HashMap;

#[derive(Clone, Debug, Default)]
pub struct TruthTableCache {
    tables: Vec<TruthTable>,
    index: HashMap<TruthTable, u32>,
}

impl TruthTableCache {
    pub fn new() -> TruthTableCache {
        TruthTableCache::default()
    }

    /// Returns the handle of `tt`, storing it if it is new.
    pub fn insert(&mut self, tt: &TruthTable) -> u32 {
        let complemented = tt.get_bit(0);
        let normalized = if complemented { !tt } else { tt.clone() };

        let index = match self.index.get(&normalized) {
            Some(index) => *index,
            None => {
                let index = self.tables.len() as u32;
                self.tables.push(normalized.clone());
                self.index.insert(normalized, index);
                index
            }
        };

        (index << 1) | complemented as u32
    }

    pub fn get(&self, handle: u32) -> TruthTable {
        let tt = &self.tables[(handle >> 1) as usize];
        if handle & 1 == 1 {
            !tt
        } else {
            tt.clone()
        }
    }

    /// Returns the number of stored tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complements_share_storage() {
        let mut cache = TruthTableCache::new();
        let and = TruthTable::from_u64(2, 0x8);
        let nand = TruthTable::from_u64(2, 0x7);

        let h0 = cache.insert(&and);
        let h1 = cache.insert(&nand);
        assert_eq!(h0 ^ 1, h1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(h0), and);
        assert_eq!(cache.get(h1), nand);
        assert_eq!(cache.insert(&and), h0);

        // Same bits over a different variable count is a different table
        cache.insert(&TruthTable::from_u64(3, 0x8));
        assert_eq!(cache.len(), 2);
    }
}
