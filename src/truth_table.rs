//! Dynamic-size truth tables
//!
//! Bit `i` of a truth table holds the function value for the input assignment
//! whose binary encoding is `i`, with variable 0 as the least significant bit.
//! Tables over fewer than six variables live in the low bits of a single word;
//! the unused high bits are always kept clear so that equality and hashing
//! work on the raw words.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

/// Largest number of variables a truth table may have.
pub const MAX_VARS: u32 = 16;

/// Projection masks for the variables which live inside a single word.
const VAR_MASKS: [u64; 6] = [
    0xaaaa_aaaa_aaaa_aaaa,
    0xcccc_cccc_cccc_cccc,
    0xf0f0_f0f0_f0f0_f0f0,
    0xff00_ff00_ff00_ff00,
    0xffff_0000_ffff_0000,
    0xffff_ffff_0000_0000,
];

/// A Boolean function over `num_vars` variables, stored as a bit vector.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TruthTable {
    num_vars: u32,
    words: Vec<u64>,
}

fn num_words(num_vars: u32) -> usize {
    if num_vars <= 6 {
        1
    } else {
        1 << (num_vars - 6)
    }
}

fn word_mask(num_vars: u32) -> u64 {
    if num_vars >= 6 {
        u64::MAX
    } else {
        (1u64 << (1u32 << num_vars)) - 1
    }
}

impl TruthTable {
    /// Creates the constant-zero function over `num_vars` variables.
    pub fn new(num_vars: u32) -> TruthTable {
        assert!(
            num_vars <= MAX_VARS,
            "truth table variable count out of bounds: the maximum is {} but {} were requested",
            MAX_VARS,
            num_vars
        );

        TruthTable {
            num_vars,
            words: vec![0; num_words(num_vars)],
        }
    }

    /// Creates the constant-one function over `num_vars` variables.
    pub fn const1(num_vars: u32) -> TruthTable {
        !TruthTable::new(num_vars)
    }

    /// Creates the projection function of variable `var`.
    pub fn nth_var(num_vars: u32, var: u32) -> TruthTable {
        assert!(
            var < num_vars,
            "variable index out of bounds: the table has {} variables but the index is {}",
            num_vars,
            var
        );

        let mut tt = TruthTable::new(num_vars);
        if var < 6 {
            let mask = VAR_MASKS[var as usize] & word_mask(num_vars);
            tt.words.iter_mut().for_each(|w| *w = mask);
        } else {
            let stride = 1usize << (var - 6);
            for (i, w) in tt.words.iter_mut().enumerate() {
                if (i / stride) & 1 == 1 {
                    *w = u64::MAX;
                }
            }
        }
        tt
    }

    /// Creates a table over at most six variables from its raw bits.
    pub fn from_u64(num_vars: u32, bits: u64) -> TruthTable {
        assert!(num_vars <= 6, "from_u64 supports at most 6 variables");

        let mut tt = TruthTable::new(num_vars);
        tt.words[0] = bits & word_mask(num_vars);
        tt
    }

    /// Returns the raw bits of a table over at most six variables.
    pub fn as_u64(&self) -> u64 {
        assert!(self.num_vars <= 6, "as_u64 supports at most 6 variables");
        self.words[0]
    }

    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub fn num_bits(&self) -> usize {
        1 << self.num_vars
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn get_bit(&self, index: usize) -> bool {
        (self.words[index >> 6] >> (index & 63)) & 1 == 1
    }

    pub fn set_bit(&mut self, index: usize, value: bool) {
        let word = &mut self.words[index >> 6];
        if value {
            *word |= 1 << (index & 63);
        } else {
            *word &= !(1 << (index & 63));
        }
    }

    pub fn is_const0(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn is_const1(&self) -> bool {
        let mask = word_mask(self.num_vars);
        self.words.iter().all(|w| *w == mask)
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    fn mask_off(&mut self) {
        if self.num_vars < 6 {
            self.words[0] &= word_mask(self.num_vars);
        }
    }

    fn assert_same_size(&self, other: &TruthTable) {
        assert_eq!(
            self.num_vars, other.num_vars,
            "truth table size mismatch: {} vs {} variables",
            self.num_vars, other.num_vars
        );
    }

    /// Returns the negative cofactor with respect to `var`, as a function
    /// over the same variables which no longer depends on `var`.
    pub fn cofactor0(&self, var: u32) -> TruthTable {
        let mut tt = self.clone();
        if var < 6 {
            let shift = 1u32 << var;
            let mask = !VAR_MASKS[var as usize];
            for w in tt.words.iter_mut() {
                *w = (*w & mask) | ((*w & mask) << shift);
            }
            tt.mask_off();
        } else {
            let stride = 1usize << (var - 6);
            for i in 0..tt.words.len() {
                if (i / stride) & 1 == 1 {
                    tt.words[i] = tt.words[i - stride];
                }
            }
        }
        tt
    }

    /// Returns the positive cofactor with respect to `var`.
    pub fn cofactor1(&self, var: u32) -> TruthTable {
        let mut tt = self.clone();
        if var < 6 {
            let shift = 1u32 << var;
            let mask = VAR_MASKS[var as usize];
            for w in tt.words.iter_mut() {
                *w = (*w & mask) | ((*w & mask) >> shift);
            }
            tt.mask_off();
        } else {
            let stride = 1usize << (var - 6);
            for i in 0..tt.words.len() {
                if (i / stride) & 1 == 0 {
                    tt.words[i] = tt.words[i + stride];
                }
            }
        }
        tt
    }

    /// Returns true if the function depends on `var`.
    pub fn has_var(&self, var: u32) -> bool {
        if var < 6 {
            let shift = 1u32 << var;
            let mask = VAR_MASKS[var as usize];
            self.words
                .iter()
                .any(|w| ((w & mask) >> shift) != (w & !mask & word_mask(self.num_vars)))
        } else {
            let stride = 1usize << (var - 6);
            (0..self.words.len())
                .filter(|i| (i / stride) & 1 == 0)
                .any(|i| self.words[i] != self.words[i + stride])
        }
    }

    /// Complements variable `var` in place.
    pub fn flip(&mut self, var: u32) {
        if var < 6 {
            let shift = 1u32 << var;
            let mask = VAR_MASKS[var as usize];
            for w in self.words.iter_mut() {
                *w = ((*w & mask) >> shift) | ((*w & !mask) << shift);
            }
            self.mask_off();
        } else {
            let stride = 1usize << (var - 6);
            for i in 0..self.words.len() {
                if (i / stride) & 1 == 0 {
                    self.words.swap(i, i + stride);
                }
            }
        }
    }

    /// Swaps variables `a` and `b` in place.
    pub fn swap(&mut self, a: u32, b: u32) {
        if a == b {
            return;
        }
        let mut result = TruthTable::new(self.num_vars);
        for row in 0..self.num_bits() {
            let bit_a = (row >> a) & 1;
            let bit_b = (row >> b) & 1;
            let mut source = row & !(1 << a) & !(1 << b);
            source |= bit_a << b;
            source |= bit_b << a;
            if self.get_bit(source) {
                result.set_bit(row, true);
            }
        }
        *self = result;
    }

    /// Returns the same function over `num_vars` variables, which must not be
    /// fewer than the current count. The added variables are don't-care.
    pub fn extend_to(&self, num_vars: u32) -> TruthTable {
        assert!(num_vars >= self.num_vars, "cannot shrink a truth table by extension");

        let mut tt = TruthTable::new(num_vars);
        if self.num_vars >= 6 {
            for (i, w) in tt.words.iter_mut().enumerate() {
                *w = self.words[i % self.words.len()];
            }
        } else {
            let mut word = self.words[0];
            let mut width = 1u32 << self.num_vars;
            while width < 64 {
                word |= word << width;
                width *= 2;
            }
            tt.words.iter_mut().for_each(|w| *w = word);
            tt.mask_off();
        }
        tt
    }

    /// Re-expresses a function over `from` (sorted leaf identifiers, one per
    /// variable) as a function over `to`, which must be a sorted superset.
    pub fn expand(&self, from: &[u32], to: &[u32]) -> TruthTable {
        assert_eq!(from.len() as u32, self.num_vars, "leaf count does not match truth table size");

        let mut positions = Vec::with_capacity(from.len());
        for leaf in from {
            let position = to.iter().position(|l| l == leaf);
            assert!(position.is_some(), "leaf {} missing from the expansion target", leaf);
            positions.push(position.unwrap_or_default());
        }

        let mut result = TruthTable::new(to.len() as u32);
        for row in 0..result.num_bits() {
            let source = positions
                .iter()
                .enumerate()
                .fold(0, |acc, (i, p)| acc | (((row >> p) & 1) << i));
            if self.get_bit(source) {
                result.set_bit(row, true);
            }
        }
        result
    }

    /// Removes the variables the function does not depend on. Returns the
    /// shrunk table and the original indices of the kept variables.
    pub fn min_base(&self) -> (TruthTable, Vec<u32>) {
        let support = (0..self.num_vars).filter(|v| self.has_var(*v)).collect::<Vec<_>>();
        if support.len() as u32 == self.num_vars {
            return (self.clone(), support);
        }

        let mut result = TruthTable::new(support.len() as u32);
        for row in 0..result.num_bits() {
            let source = support
                .iter()
                .enumerate()
                .fold(0, |acc, (i, v)| acc | (((row >> i) & 1) << v));
            if self.get_bit(source) {
                result.set_bit(row, true);
            }
        }
        (result, support)
    }

    /// Parses a hexadecimal string, most significant digit first.
    pub fn from_hex(num_vars: u32, hex: &str) -> Option<TruthTable> {
        let mut tt = TruthTable::new(num_vars);
        let digits = ((tt.num_bits() + 3) / 4).max(1);
        if hex.len() != digits {
            return None;
        }

        for (i, c) in hex.chars().rev().enumerate() {
            let nibble = c.to_digit(16)? as u64;
            tt.words[i / 16] |= nibble << ((i % 16) * 4);
        }
        tt.mask_off();
        Some(tt)
    }

    /// Returns the on-set cover of the function as an irredundant sum of
    /// products.
    pub fn isop(&self) -> Vec<Cube> {
        isop_with_dc(self, self)
    }
}

impl fmt::LowerHex for TruthTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = ((self.num_bits() + 3) / 4).max(1);
        for i in (0..digits).rev() {
            let nibble = (self.words[i / 16] >> ((i % 16) * 4)) & 0xf;
            write!(f, "{:x}", nibble)?;
        }
        Ok(())
    }
}

impl fmt::Display for TruthTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

impl fmt::Debug for TruthTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TruthTable({}: 0x{:x})", self.num_vars, self)
    }
}

impl Not for TruthTable {
    type Output = TruthTable;

    fn not(mut self) -> TruthTable {
        self.words.iter_mut().for_each(|w| *w = !*w);
        self.mask_off();
        self
    }
}

impl Not for &TruthTable {
    type Output = TruthTable;

    fn not(self) -> TruthTable {
        !self.clone()
    }
}

macro_rules! binary_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&TruthTable> for &TruthTable {
            type Output = TruthTable;

            fn $method(self, rhs: &TruthTable) -> TruthTable {
                self.assert_same_size(rhs);
                TruthTable {
                    num_vars: self.num_vars,
                    words: self
                        .words
                        .iter()
                        .zip(rhs.words.iter())
                        .map(|(a, b)| a $op b)
                        .collect(),
                }
            }
        }

        impl $trait<TruthTable> for TruthTable {
            type Output = TruthTable;

            fn $method(self, rhs: TruthTable) -> TruthTable {
                &self $op &rhs
            }
        }

        impl $trait<&TruthTable> for TruthTable {
            type Output = TruthTable;

            fn $method(self, rhs: &TruthTable) -> TruthTable {
                &self $op rhs
            }
        }

        impl $trait<TruthTable> for &TruthTable {
            type Output = TruthTable;

            fn $method(self, rhs: TruthTable) -> TruthTable {
                self $op &rhs
            }
        }
    };
}

binary_op!(BitAnd, bitand, &);
binary_op!(BitOr, bitor, |);
binary_op!(BitXor, bitxor, ^);

/// A product term. Bit `i` of `mask` marks variable `i` as present, and bit
/// `i` of `polarity` tells whether it appears positive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cube {
    pub mask: u32,
    pub polarity: u32,
}

impl Cube {
    pub fn num_literals(&self) -> u32 {
        self.mask.count_ones()
    }

    pub fn has_literal(&self, var: u32, positive: bool) -> bool {
        (self.mask >> var) & 1 == 1 && ((self.polarity >> var) & 1 == 1) == positive
    }

    pub fn add_literal(&mut self, var: u32, positive: bool) {
        self.mask |= 1 << var;
        if positive {
            self.polarity |= 1 << var;
        } else {
            self.polarity &= !(1 << var);
        }
    }

    pub fn remove_literal(&mut self, var: u32) {
        self.mask &= !(1 << var);
        self.polarity &= !(1 << var);
    }

    /// Returns the function of the cube over `num_vars` variables.
    pub fn to_truth_table(&self, num_vars: u32) -> TruthTable {
        let mut tt = TruthTable::const1(num_vars);
        for var in 0..num_vars {
            if (self.mask >> var) & 1 == 1 {
                let v = TruthTable::nth_var(num_vars, var);
                tt = if (self.polarity >> var) & 1 == 1 { tt & v } else { tt & !v };
            }
        }
        tt
    }
}

/// Computes an irredundant sum of products which covers `on` and lies within
/// `upper` (Minato-Morreale). Everything in `upper` but not `on` is a
/// don't-care.
pub fn isop_with_dc(on: &TruthTable, upper: &TruthTable) -> Vec<Cube> {
    on.assert_same_size(upper);
    assert!((on & !upper).is_const0(), "on-set must be contained in the upper bound");

    let mut cubes = vec![];
    isop_rec(on, upper, on.num_vars(), &mut cubes);
    cubes
}

fn isop_rec(on: &TruthTable, upper: &TruthTable, var: u32, cubes: &mut Vec<Cube>) -> TruthTable {
    if on.is_const0() {
        return TruthTable::new(on.num_vars());
    }
    if upper.is_const1() {
        cubes.push(Cube::default());
        return TruthTable::const1(on.num_vars());
    }

    let mut v = var;
    loop {
        // `on` is non-constant here, so some variable below `var` is in the
        // support of one of the two functions
        v -= 1;
        if on.has_var(v) || upper.has_var(v) {
            break;
        }
    }

    let on0 = on.cofactor0(v);
    let on1 = on.cofactor1(v);
    let upper0 = upper.cofactor0(v);
    let upper1 = upper.cofactor1(v);

    let begin0 = cubes.len();
    let res0 = isop_rec(&(&on0 & &!&upper1), &upper0, v, cubes);
    let end0 = cubes.len();
    let res1 = isop_rec(&(&on1 & &!&upper0), &upper1, v, cubes);
    let end1 = cubes.len();
    let rest_on = (&on0 & &!&res0) | (&on1 & &!&res1);
    let res_star = isop_rec(&rest_on, &(&upper0 & &upper1), v, cubes);

    cubes[begin0..end0].iter_mut().for_each(|c| c.add_literal(v, false));
    cubes[end0..end1].iter_mut().for_each(|c| c.add_literal(v, true));

    let var_tt = TruthTable::nth_var(on.num_vars(), v);
    (&res0 & &!&var_tt) | (&res1 & &var_tt) | res_star
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cover(cubes: &[Cube], num_vars: u32) -> TruthTable {
        cubes
            .iter()
            .fold(TruthTable::new(num_vars), |acc, c| acc | c.to_truth_table(num_vars))
    }

    #[test]
    fn projections() {
        assert_eq!(TruthTable::nth_var(2, 0).as_u64(), 0xa);
        assert_eq!(TruthTable::nth_var(2, 1).as_u64(), 0xc);
        assert_eq!(TruthTable::nth_var(4, 3).as_u64(), 0xff00);

        let v7 = TruthTable::nth_var(8, 7);
        assert_eq!(v7.words(), &[0, 0, u64::MAX, u64::MAX]);
        for row in 0..256 {
            assert_eq!(v7.get_bit(row), row & 0x80 != 0);
        }
    }

    #[test]
    fn and_of_four() {
        let tt = (0..4)
            .map(|v| TruthTable::nth_var(4, v))
            .fold(TruthTable::const1(4), |acc, v| acc & v);
        assert_eq!(tt.as_u64(), 0x8000);
        assert_eq!(format!("{}", tt), "8000");
    }

    #[test]
    fn negation_keeps_unused_bits_clear() {
        let tt = !TruthTable::nth_var(2, 0);
        assert_eq!(tt.as_u64(), 0x5);
        assert!(TruthTable::const1(3).is_const1());
        assert_eq!(TruthTable::const1(3).as_u64(), 0xff);
    }

    #[test]
    fn cofactors_and_support() {
        let a = TruthTable::nth_var(3, 0);
        let b = TruthTable::nth_var(3, 1);
        let f = &a & &b;

        assert!(f.has_var(0));
        assert!(f.has_var(1));
        assert!(!f.has_var(2));
        assert_eq!(f.cofactor1(0), b);
        assert!(f.cofactor0(0).is_const0());

        let v6 = TruthTable::nth_var(7, 6);
        let g = &v6 & &TruthTable::nth_var(7, 0);
        assert!(g.has_var(6));
        assert_eq!(g.cofactor1(6), TruthTable::nth_var(7, 0));
        assert!(g.cofactor0(6).is_const0());
    }

    #[test]
    fn flip_and_swap() {
        let mut f = TruthTable::nth_var(2, 0) & !TruthTable::nth_var(2, 1);
        f.flip(1);
        assert_eq!(f.as_u64(), 0x8);

        let mut g = TruthTable::nth_var(3, 0) & !TruthTable::nth_var(3, 2);
        g.swap(0, 2);
        assert_eq!(g, TruthTable::nth_var(3, 2) & !TruthTable::nth_var(3, 0));

        let mut h = TruthTable::nth_var(7, 6);
        h.flip(6);
        assert_eq!(h, !TruthTable::nth_var(7, 6));
    }

    #[test]
    fn min_base_and_expand() {
        let f = TruthTable::nth_var(4, 1) ^ TruthTable::nth_var(4, 3);
        let (small, support) = f.min_base();
        assert_eq!(support, vec![1, 3]);
        assert_eq!(small.as_u64(), 0x6);

        let expanded = small.expand(&[10, 30], &[10, 20, 30, 40]);
        assert_eq!(expanded, TruthTable::nth_var(4, 0) ^ TruthTable::nth_var(4, 2));
    }

    #[test]
    fn extend() {
        let f = TruthTable::from_u64(2, 0x8);
        let g = f.extend_to(3);
        assert_eq!(g.as_u64(), 0x88);
        let h = f.extend_to(7);
        assert_eq!(h, TruthTable::nth_var(7, 0) & TruthTable::nth_var(7, 1));
    }

    #[test]
    fn hex_round_trip() {
        let tt = TruthTable::from_hex(4, "cafe").unwrap();
        assert_eq!(tt.as_u64(), 0xcafe);
        assert_eq!(format!("{:x}", tt), "cafe");
        assert_eq!(TruthTable::from_hex(4, "caf"), None);
        assert_eq!(format!("{}", TruthTable::from_u64(1, 0x2)), "2");
    }

    #[test]
    fn isop_covers_function() {
        for bits in [0x0u64, 0x8, 0x6, 0xe8, 0x1ee1, 0xcafe, 0xffff] {
            let n = if bits > 0xff { 4 } else if bits > 0xf { 3 } else { 2 };
            let tt = TruthTable::from_u64(n, bits);
            let cubes = tt.isop();
            assert_eq!(cover(&cubes, n), tt, "cover mismatch for {:x}", bits);
        }
    }

    #[test]
    fn isop_uses_dont_cares() {
        // a & b with the row a & !b as don't care collapses to the single
        // literal a
        let a = TruthTable::nth_var(2, 0);
        let b = TruthTable::nth_var(2, 1);
        let on = &a & &b;
        let upper = a.clone();

        let cubes = isop_with_dc(&on, &upper);
        assert_eq!(cubes.len(), 1);
        assert_eq!(cubes[0].num_literals(), 1);
        assert!(cubes[0].has_literal(0, true));
    }

    #[test]
    fn mixed_operands() {
        let a = TruthTable::nth_var(2, 0);
        let b = TruthTable::nth_var(2, 1);
        assert_eq!((&a & !&b).as_u64(), 0x2);
        assert_eq!((&a | !b.clone()).as_u64(), 0xb);
        assert_eq!((&a ^ b).as_u64(), 0x6);
    }

    #[test]
    #[should_panic(expected = "on-set must be contained in the upper bound")]
    fn isop_rejects_on_set_outside_upper_bound() {
        let a = TruthTable::nth_var(2, 0);
        let b = TruthTable::nth_var(2, 1);
        isop_with_dc(&a, &b);
    }

    #[test]
    fn largest_table() {
        let tt = TruthTable::nth_var(MAX_VARS, MAX_VARS - 1);
        assert_eq!(tt.num_bits(), 1 << MAX_VARS);
        assert!(tt.get_bit((1 << MAX_VARS) - 1));
        assert!(!tt.get_bit((1 << (MAX_VARS - 1)) - 1));
    }

    #[test]
    #[should_panic(expected = "truth table variable count out of bounds")]
    fn too_many_vars() {
        TruthTable::new(MAX_VARS + 1);
    }

    #[test]
    #[should_panic(expected = "truth table size mismatch: 2 vs 3 variables")]
    fn mismatched_sizes() {
        let _ = TruthTable::new(2) & TruthTable::new(3);
    }
}
