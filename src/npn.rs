//! Exact NPN and NP canonization
//!
//! A transform relates a function `f` to a function `g` over the same
//! number of variables by
//!
//! ```text
//! g(y) = f(x) ^ output_negation,  where x[perm[i]] = y[i] ^ negated(i)
//! ```
//!
//! so canonical pin `i` is driven by original input `perm[i]`, complemented
//! when bit `i` of `input_negations` is set. Every caller in the crate uses
//! this one convention: to implement `f` from a structure for `g`, connect
//! pin `i` of the structure to input `perm[i]` (inverted if pin `i` is
//! negated) and invert the output if `output_negation` is set.
//!
//! The canonical representative of a class is its numerically smallest
//! truth table. Canonization enumerates every transform exhaustively, so it
//! is limited to six variables.

use crate::truth_table::TruthTable;

/// Largest number of variables supported by canonization.
pub const MAX_NPN_VARS: u32 = 6;

/// An input permutation, input negation and output negation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NpnTransform {
    pub perm: Vec<u8>,
    pub input_negations: u32,
    pub output_negation: bool,
}

impl NpnTransform {
    pub fn identity(num_vars: u32) -> NpnTransform {
        NpnTransform {
            perm: (0..num_vars as u8).collect(),
            input_negations: 0,
            output_negation: false,
        }
    }

    pub fn num_vars(&self) -> u32 {
        self.perm.len() as u32
    }

    pub fn is_identity(&self) -> bool {
        self.input_negations == 0
            && !self.output_negation
            && self.perm.iter().enumerate().all(|(i, p)| i == *p as usize)
    }

    pub fn input_negated(&self, pin: usize) -> bool {
        (self.input_negations >> pin) & 1 == 1
    }

    /// Packs the negations into one mask: bits `0..n` are the input
    /// negations, bit `n` is the output negation.
    pub fn phase(&self) -> u32 {
        self.input_negations | ((self.output_negation as u32) << self.num_vars())
    }

    /// Returns the transform which undoes this one.
    pub fn inverse(&self) -> NpnTransform {
        let mut perm = vec![0u8; self.perm.len()];
        let mut input_negations = 0;
        for (i, p) in self.perm.iter().enumerate() {
            perm[*p as usize] = i as u8;
            if self.input_negated(i) {
                input_negations |= 1 << p;
            }
        }

        NpnTransform {
            perm,
            input_negations,
            output_negation: self.output_negation,
        }
    }
}

/// The canonical representative of a function together with the transform
/// which maps the function onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpnCanonization {
    pub canonical: TruthTable,
    pub transform: NpnTransform,
}

fn word_mask(num_vars: u32) -> u64 {
    if num_vars >= 6 {
        u64::MAX
    } else {
        (1u64 << (1u32 << num_vars)) - 1
    }
}

const VAR_MASKS: [u64; 6] = [
    0xaaaa_aaaa_aaaa_aaaa,
    0xcccc_cccc_cccc_cccc,
    0xf0f0_f0f0_f0f0_f0f0,
    0xff00_ff00_ff00_ff00,
    0xffff_0000_ffff_0000,
    0xffff_ffff_0000_0000,
];

fn flip_word(word: u64, var: u32, num_vars: u32) -> u64 {
    let shift = 1u32 << var;
    let mask = VAR_MASKS[var as usize];
    (((word & mask) >> shift) | ((word & !mask) << shift)) & word_mask(num_vars)
}

fn permute_word(word: u64, perm: &[u8], num_vars: u32) -> u64 {
    let mut result = 0;
    for y in 0..(1u32 << num_vars) {
        let x = perm
            .iter()
            .enumerate()
            .fold(0, |acc, (i, p)| acc | (((y >> i) & 1) << p));
        result |= ((word >> x) & 1) << y;
    }
    result
}

/// Returns every permutation of `0..n`, starting with the identity.
fn permutations(n: usize) -> Vec<Vec<u8>> {
    // Heap's algorithm, iterative form
    let mut perm = (0..n as u8).collect::<Vec<_>>();
    let mut result = vec![perm.clone()];
    let mut c = vec![0usize; n];
    let mut i = 0;
    while i < n {
        if c[i] < i {
            if i % 2 == 0 {
                perm.swap(0, i);
            } else {
                perm.swap(c[i], i);
            }
            result.push(perm.clone());
            c[i] += 1;
            i = 0;
        } else {
            c[i] = 0;
            i += 1;
        }
    }
    result
}

/// Applies `transform` to `tt` as described in the module documentation.
pub fn apply_transform(tt: &TruthTable, transform: &NpnTransform) -> TruthTable {
    let num_vars = tt.num_vars();
    assert_eq!(
        transform.num_vars(),
        num_vars,
        "transform arity does not match truth table size"
    );

    let mut result = TruthTable::new(num_vars);
    for y in 0..tt.num_bits() {
        let x = transform.perm.iter().enumerate().fold(0usize, |acc, (i, p)| {
            let bit = ((y >> i) & 1) ^ ((transform.input_negations as usize >> i) & 1);
            acc | (bit << p)
        });
        if tt.get_bit(x) ^ transform.output_negation {
            result.set_bit(y, true);
        }
    }
    result
}

/// Calls `on_variant` with every transform of `tt` reachable by input
/// permutation and input negation, together with that transform. The
/// identity comes first.
fn enumerate_word(
    word: u64,
    num_vars: u32,
    mut on_variant: impl FnMut(u64, &[u8], u32),
) {
    for perm in permutations(num_vars as usize) {
        let mut current = permute_word(word, &perm, num_vars);
        let mut negations = 0u32;
        on_variant(current, &perm, negations);

        // Visit the negations in Gray code order so that each step is a
        // single flip
        for k in 1u32..(1 << num_vars) {
            let var = k.trailing_zeros();
            current = flip_word(current, var, num_vars);
            negations ^= 1 << var;
            on_variant(current, &perm, negations);
        }
    }
}

fn canonize(tt: &TruthTable, with_output_negation: bool) -> NpnCanonization {
    let num_vars = tt.num_vars();
    assert!(
        num_vars <= MAX_NPN_VARS,
        "canonization supports at most {} variables but the function has {}",
        MAX_NPN_VARS,
        num_vars
    );

    let word = tt.as_u64();
    let mask = word_mask(num_vars);
    let mut best = word;
    let mut best_transform = NpnTransform::identity(num_vars);

    enumerate_word(word, num_vars, |variant, perm, negations| {
        if variant < best {
            best = variant;
            best_transform = NpnTransform {
                perm: perm.to_vec(),
                input_negations: negations,
                output_negation: false,
            };
        }
        if with_output_negation && (!variant & mask) < best {
            best = !variant & mask;
            best_transform = NpnTransform {
                perm: perm.to_vec(),
                input_negations: negations,
                output_negation: true,
            };
        }
    });

    NpnCanonization {
        canonical: TruthTable::from_u64(num_vars, best),
        transform: best_transform,
    }
}

/// Computes the canonical representative of `tt` under input negation,
/// input permutation and output negation.
pub fn exact_npn_canonization(tt: &TruthTable) -> NpnCanonization {
    canonize(tt, true)
}

/// Computes the canonical representative of `tt` under input negation and
/// input permutation only.
pub fn exact_np_canonization(tt: &TruthTable) -> NpnCanonization {
    canonize(tt, false)
}

/// Calls `on_variant` once for each of the `2^n * n!` input negation and
/// permutation transforms of `tt`, passing the transformed function and the
/// transform which produced it.
pub fn np_enumeration(tt: &TruthTable, mut on_variant: impl FnMut(&TruthTable, &NpnTransform)) {
    let num_vars = tt.num_vars();
    assert!(
        num_vars <= MAX_NPN_VARS,
        "enumeration supports at most {} variables but the function has {}",
        MAX_NPN_VARS,
        num_vars
    );

    enumerate_word(tt.as_u64(), num_vars, |variant, perm, negations| {
        let transform = NpnTransform {
            perm: perm.to_vec(),
            input_negations: negations,
            output_negation: false,
        };
        on_variant(&TruthTable::from_u64(num_vars, variant), &transform);
    });
}

/// Returns the canonical representative of every NPN class over `num_vars`
/// variables, in increasing order.
pub fn npn_classes(num_vars: u32) -> Vec<TruthTable> {
    assert!(num_vars <= 4, "class enumeration supports at most 4 variables");

    let num_functions = 1usize << (1u32 << num_vars);
    let mask = word_mask(num_vars);
    let mut visited = vec![false; num_functions];
    let mut classes = vec![];

    // Scanning in increasing order means the first unvisited function of a
    // class is its smallest member
    for word in 0..num_functions as u64 {
        if visited[word as usize] {
            continue;
        }

        classes.push(TruthTable::from_u64(num_vars, word));
        enumerate_word(word, num_vars, |variant, _, _| {
            visited[variant as usize] = true;
            visited[(!variant & mask) as usize] = true;
        });
    }

    classes
}
