//! Resynthesis of small functions into AIG structures

use crate::network::{Aig, Signal};
use crate::truth_table::{Cube, TruthTable};

/// Builds AIG structures computing a function over given leaf signals.
pub trait Resynthesis {
    /// Creates candidate implementations of `function` in `aig`, variable
    /// `i` being `leaves[i]`, and passes each one to `on_candidate`. Stops
    /// early if `on_candidate` returns false.
    fn resynthesize(
        &mut self,
        aig: &mut Aig,
        function: &TruthTable,
        leaves: &[Signal],
        on_candidate: &mut dyn FnMut(Signal) -> bool,
    );
}

/// Factors an irredundant sum of products of the function, and optionally
/// of its complement.
#[derive(Clone, Debug)]
pub struct SopFactoring {
    pub try_both_polarities: bool,
}

impl Default for SopFactoring {
    fn default() -> Self {
        SopFactoring {
            try_both_polarities: true,
        }
    }
}

impl Resynthesis for SopFactoring {
    fn resynthesize(
        &mut self,
        aig: &mut Aig,
        function: &TruthTable,
        leaves: &[Signal],
        on_candidate: &mut dyn FnMut(Signal) -> bool,
    ) {
        assert_eq!(
            function.num_vars() as usize,
            leaves.len(),
            "resynthesis needs one leaf per variable"
        );

        if function.is_const0() || function.is_const1() {
            on_candidate(aig.get_constant(function.is_const1()));
            return;
        }

        let on_set = function.isop();
        let off_set = if self.try_both_polarities {
            (!function).isop()
        } else {
            vec![]
        };

        let on_literals = num_literals(&on_set);
        let off_literals = num_literals(&off_set);
        let on_first = !self.try_both_polarities || on_literals <= off_literals;

        let mut candidates = vec![(on_set, false)];
        if self.try_both_polarities {
            candidates.push((off_set, true));
            if !on_first {
                candidates.swap(0, 1);
            }
        }

        for (cubes, complemented) in candidates {
            let s = factor(aig, &cubes, leaves);
            if !on_candidate(s ^ complemented) {
                return;
            }
        }
    }
}

fn num_literals(cubes: &[Cube]) -> u32 {
    cubes.iter().map(|c| c.num_literals()).sum()
}

/// Builds a factored form of a sum of products: the literal shared by the
/// most cubes is divided out recursively.
pub fn factor(aig: &mut Aig, cubes: &[Cube], leaves: &[Signal]) -> Signal {
    match cubes {
        [] => return aig.get_constant(false),
        [cube] => return cube_signal(aig, cube, leaves),
        _ => {}
    }
    if cubes.iter().any(|c| c.mask == 0) {
        return aig.get_constant(true);
    }

    let mut best: Option<(u32, bool, usize)> = None;
    for var in 0..leaves.len() as u32 {
        for positive in [true, false] {
            let count = cubes.iter().filter(|c| c.has_literal(var, positive)).count();
            if count > 1 && best.map_or(true, |(_, _, c)| count > c) {
                best = Some((var, positive, count));
            }
        }
    }

    let (var, positive) = match best {
        Some((var, positive, _)) => (var, positive),
        None => {
            let products = cubes
                .iter()
                .map(|c| cube_signal(aig, c, leaves))
                .collect::<Vec<_>>();
            return aig.create_nary_or(&products);
        }
    };

    let mut quotient = vec![];
    let mut remainder = vec![];
    for cube in cubes {
        if cube.has_literal(var, positive) {
            let mut cube = *cube;
            cube.remove_literal(var);
            quotient.push(cube);
        } else {
            remainder.push(*cube);
        }
    }

    let literal = leaves[var as usize] ^ !positive;
    let quotient = factor(aig, &quotient, leaves);
    let product = aig.create_and(literal, quotient);
    if remainder.is_empty() {
        product
    } else {
        let remainder = factor(aig, &remainder, leaves);
        aig.create_or(product, remainder)
    }
}

fn cube_signal(aig: &mut Aig, cube: &Cube, leaves: &[Signal]) -> Signal {
    let literals = (0..leaves.len() as u32)
        .filter(|v| (cube.mask >> v) & 1 == 1)
        .map(|v| leaves[v as usize] ^ !cube.has_literal(v, true))
        .collect::<Vec<_>>();
    aig.create_nary_and(&literals)
}
