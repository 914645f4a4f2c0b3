#[macro_export]
macro_rules! assert_equiv {
    ($left:expr, $right:expr) => {
        let left = $left;
        let right = $right;

        assert!(
            left.len() == right.len(),
            "left length ({}) did not match right length ({})",
            left.len(),
            right.len()
        );

        for v in left.iter() {
            assert!(
                right.contains(v),
                "element {:?} from left not in right (left = {:?}, right = {:?})",
                v,
                left,
                right
            );
        }
    };
}

#[cfg(test)]
use crate::network::{Aig, Signal};
#[cfg(test)]
use rand::rngs::SmallRng;
#[cfg(test)]
use rand::Rng;

/// Builds a random AIG whose last `num_pos` signals drive the outputs.
#[cfg(test)]
pub fn random_aig(rng: &mut SmallRng, num_pis: usize, num_gates: usize, num_pos: usize) -> Aig {
    let mut aig = Aig::new();
    let mut signals = (0..num_pis).map(|_| aig.create_pi()).collect::<Vec<Signal>>();
    for _ in 0..num_gates {
        // Favour recent signals so that the network gets some depth
        let window = signals.len().min(12);
        let a = signals[signals.len() - 1 - rng.gen_range(0..window)] ^ rng.gen_bool(0.5);
        let b = signals[rng.gen_range(0..signals.len())] ^ rng.gen_bool(0.5);
        let s = if rng.gen_bool(0.2) {
            aig.create_xor(a, b)
        } else {
            aig.create_and(a, b)
        };
        signals.push(s);
    }
    for s in signals.iter().rev().take(num_pos) {
        aig.create_po(*s ^ rng.gen_bool(0.3));
    }
    aig
}
