//! Refactoring of MFFCs through a resynthesis functor
//!
//! Every gate is collapsed into a truth table over a small window, either
//! the leaves of its MFFC or, when those are too many, a reconvergence
//! driven cut. The function is resynthesised from scratch and the result
//! replaces the gate if it needs fewer gates than the logic it frees.

use crate::depth::DepthView;
use crate::error::{Error, Result};
use crate::mffc::{collect_mffc, reconvergence_cut};
use crate::network::{Aig, Network, Node, Signal, Workspace};
use crate::resynthesis::Resynthesis;
use crate::simulate::simulate_window;
use crate::topo::topological_order;
use hashbrown::{HashMap, HashSet};
use log::{debug, info, trace};
use std::fmt;
use std::time::{Duration, Instant};

/// Largest window a node is collapsed over.
const MAX_WINDOW_INPUTS: u32 = 12;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefactorParams {
    /// Largest number of window inputs.
    pub max_pis: u32,
    pub allow_zero_gain: bool,
    pub preserve_depth: bool,
    pub verbose: bool,
}

impl Default for RefactorParams {
    fn default() -> Self {
        RefactorParams {
            max_pis: 6,
            allow_zero_gain: false,
            preserve_depth: false,
            verbose: false,
        }
    }
}

impl RefactorParams {
    pub fn validate(&self) -> Result<()> {
        if !(2..=MAX_WINDOW_INPUTS).contains(&self.max_pis) {
            return Err(Error::InvalidParameter(format!(
                "refactoring windows need 2 to {} inputs, got {}",
                MAX_WINDOW_INPUTS, self.max_pis
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct RefactorStats {
    pub gates_before: usize,
    pub gates_after: usize,
    pub depth_before: u32,
    pub depth_after: u32,
    pub substitutions: usize,
    /// Windows taken from a reconvergence driven cut.
    pub reconvergence_windows: usize,
    pub time_resynthesis: Duration,
    pub time_total: Duration,
}

impl RefactorStats {
    pub fn gain(&self) -> usize {
        self.gates_before.saturating_sub(self.gates_after)
    }
}

impl fmt::Display for RefactorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[i] gates          = {} -> {}", self.gates_before, self.gates_after)?;
        writeln!(f, "[i] depth          = {} -> {}", self.depth_before, self.depth_after)?;
        writeln!(f, "[i] substitutions  = {}", self.substitutions)?;
        writeln!(f, "[i] reconv windows = {}", self.reconvergence_windows)?;
        writeln!(f, "[i] resyn time     = {:>5.2} secs", self.time_resynthesis.as_secs_f64())?;
        write!(f, "[i] total time     = {:>5.2} secs", self.time_total.as_secs_f64())
    }
}

/// Counts the gates of the cone of `candidate` which either did not exist
/// before `first_new` or belong to `mffc`, and computes the level of the
/// candidate. Returns `None` if the cone contains `root`.
fn evaluate_candidate(
    aig: &Aig,
    depth: &DepthView,
    mffc: &HashSet<Node>,
    first_new: Node,
    root: Node,
    candidate: Signal,
) -> Option<(u32, u32)> {
    let is_new = |n: Node| n >= first_new;

    let mut added = 0;
    let mut visited = HashSet::new();
    let mut stack = vec![candidate.node()];
    while let Some(n) = stack.pop() {
        if n == root {
            return None;
        }
        if !aig.is_and(n) || !visited.insert(n) {
            continue;
        }
        if is_new(n) || mffc.contains(&n) {
            added += 1;
            stack.extend(aig.fanins(n).iter().map(|f| f.node()));
        }
    }

    // Only the new gates lack a level
    let mut levels: HashMap<Node, u32> = HashMap::new();
    let mut stack = vec![(candidate.node(), false)];
    while let Some((n, expanded)) = stack.pop() {
        if levels.contains_key(&n) {
            continue;
        }
        if !is_new(n) || !aig.is_and(n) {
            levels.insert(n, depth.level(n));
            continue;
        }
        if expanded {
            let level = aig
                .fanins(n)
                .iter()
                .map(|f| levels[&f.node()] + 1)
                .max()
                .unwrap_or(0);
            levels.insert(n, level);
        } else {
            stack.push((n, true));
            stack.extend(aig.fanins(n).iter().map(|f| (f.node(), false)));
        }
    }

    Some((added, levels[&candidate.node()]))
}

struct Refactor<'a, R: Resynthesis> {
    aig: &'a mut Aig,
    resyn: &'a mut R,
    params: &'a RefactorParams,
    depth: DepthView,
    ws: Workspace,
    stats: RefactorStats,
}

impl<'a, R: Resynthesis> Refactor<'a, R> {
    fn run(mut self) -> RefactorStats {
        let start = Instant::now();

        for n in topological_order(&*self.aig) {
            if !self.aig.is_and(n) || self.aig.fanout_size(n) == 0 {
                continue;
            }
            self.refactor_node(n);
        }

        self.stats.gates_after = self.aig.num_gates();
        self.stats.depth_after = self.depth.depth();
        self.stats.time_total = start.elapsed();

        let summary = format!(
            "refactor: {} -> {} gates, depth {} -> {}, {} substitutions",
            self.stats.gates_before,
            self.stats.gates_after,
            self.stats.depth_before,
            self.stats.depth_after,
            self.stats.substitutions
        );
        if self.params.verbose {
            info!("{}", summary);
        } else {
            debug!("{}", summary);
        }
        self.stats
    }

    /// Returns the window leaves of `n` and the gates of its MFFC bounded
    /// by them.
    fn window(&mut self, n: Node) -> (Vec<Node>, Vec<Node>) {
        let mffc = collect_mffc(self.aig, &mut self.ws, n);
        if mffc.leaves.len() <= self.params.max_pis as usize {
            return (mffc.leaves, mffc.nodes);
        }

        self.stats.reconvergence_windows += 1;
        let leaves = reconvergence_cut(self.aig, &mut self.ws, n, self.params.max_pis as usize);
        for leaf in &leaves {
            self.aig.incr_fanout_size(*leaf);
        }
        let mffc = collect_mffc(self.aig, &mut self.ws, n);
        for leaf in &leaves {
            self.aig.decr_fanout_size(*leaf);
        }
        (leaves, mffc.nodes)
    }

    fn refactor_node(&mut self, n: Node) {
        let (leaves, mffc) = self.window(n);
        let function = simulate_window(self.aig, n, &leaves);
        let mffc = mffc.into_iter().collect::<HashSet<_>>();
        let saved = mffc.len() as i32;

        let first_new = self.aig.size() as Node;
        let leaf_signals = leaves.iter().map(|l| Signal::new(*l, false)).collect::<Vec<_>>();
        let mut candidates = vec![];
        let start = Instant::now();
        self.resyn.resynthesize(self.aig, &function, &leaf_signals, &mut |s| {
            if !candidates.contains(&s) {
                candidates.push(s);
            }
            true
        });
        self.stats.time_resynthesis += start.elapsed();

        let required = if self.params.preserve_depth {
            self.depth.required(n)
        } else {
            u32::MAX
        };

        let mut best: Option<(Signal, i32, u32)> = None;
        for candidate in &candidates {
            let (added, level) =
                match evaluate_candidate(self.aig, &self.depth, &mffc, first_new, n, *candidate) {
                    Some(evaluation) => evaluation,
                    None => continue,
                };
            let gain = saved - added as i32;
            trace!(
                "node {}: {} leaves, candidate {:?}, gain {}, level {}",
                n,
                leaves.len(),
                candidate,
                gain,
                level
            );
            if level > required {
                continue;
            }
            if best.map_or(true, |(_, g, l)| gain > g || (gain == g && level < l)) {
                best = Some((*candidate, gain, level));
            }
        }

        let accepted = best.filter(|(_, gain, _)| *gain > 0 || (self.params.allow_zero_gain && *gain == 0));
        if let Some((s, gain, _)) = accepted {
            debug!("node {}: replaced by {:?} with gain {}", n, s, gain);
            let modified = self.aig.substitute_node(n, s);
            self.depth.update_after_substitution(self.aig, &modified);
            self.stats.substitutions += 1;
        }

        // Drop what is left of the other candidates
        for m in first_new..self.aig.size() as Node {
            if self.aig.is_and(m) && self.aig.fanout_size(m) == 0 {
                self.aig.take_out_node(m);
            }
        }
    }
}

/// Refactors `aig` in place in one pass, resynthesising windows with
/// `resyn`.
pub fn refactor<R: Resynthesis>(aig: &mut Aig, resyn: &mut R, params: &RefactorParams) -> Result<RefactorStats> {
    params.validate()?;

    let mut depth = DepthView::new(aig);
    if params.preserve_depth {
        depth.compute_required(aig);
    }
    let refactor = Refactor {
        stats: RefactorStats {
            gates_before: aig.num_gates(),
            depth_before: depth.depth(),
            ..Default::default()
        },
        aig,
        resyn,
        params,
        depth,
        ws: Workspace::new(),
    };
    Ok(refactor.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resynthesis::SopFactoring;
    use crate::simulate::equivalent;
    use crate::test_utils::random_aig;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn shared_literal_is_factored() {
        // (a & b) | (a & c) is a & (b | c)
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let c = aig.create_pi();
        let ab = aig.create_and(a, b);
        let ac = aig.create_and(a, c);
        let f = aig.create_or(ab, ac);
        aig.create_po(f);
        let original = aig.clone();

        let stats = refactor(&mut aig, &mut SopFactoring::default(), &RefactorParams::default()).unwrap();
        assert_eq!(stats.substitutions, 1);
        assert_eq!(aig.num_gates(), 2);
        assert!(equivalent(&original, &aig));
    }

    #[test]
    fn constant_cone() {
        // (a & b) & (!a & c) is constant zero
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let c = aig.create_pi();
        let ab = aig.create_and(a, b);
        let ac = aig.create_and(!a, c);
        let f = aig.create_and(ab, ac);
        aig.create_po(f);

        refactor(&mut aig, &mut SopFactoring::default(), &RefactorParams::default()).unwrap();
        assert_eq!(aig.num_gates(), 0);
        assert_eq!(aig.cos()[0], aig.get_constant(false));
    }

    #[test]
    fn random_networks_never_grow() {
        let mut rng = SmallRng::seed_from_u64(17);
        for max_pis in [3, 6] {
            let params = RefactorParams {
                max_pis,
                ..Default::default()
            };
            for _ in 0..5 {
                let mut aig = random_aig(&mut rng, 7, 80, 4);
                let original = aig.clone();
                let before = aig.num_gates();

                let stats = refactor(&mut aig, &mut SopFactoring::default(), &params).unwrap();
                assert!(aig.num_gates() <= before);
                assert_eq!(stats.gates_after, aig.num_gates());
                assert!(equivalent(&original, &aig));
            }
        }
    }

    #[test]
    fn preserve_depth() {
        let mut rng = SmallRng::seed_from_u64(19);
        let params = RefactorParams {
            preserve_depth: true,
            ..Default::default()
        };
        for _ in 0..5 {
            let mut aig = random_aig(&mut rng, 6, 60, 4);
            let original = aig.clone();
            let stats = refactor(&mut aig, &mut SopFactoring::default(), &params).unwrap();
            assert!(stats.depth_after <= stats.depth_before);
            assert!(equivalent(&original, &aig));
        }
    }

    #[test]
    fn window_size_is_checked() {
        let mut aig = Aig::new();
        let params = RefactorParams {
            max_pis: 1,
            ..Default::default()
        };
        assert!(matches!(
            refactor(&mut aig, &mut SopFactoring::default(), &params),
            Err(Error::InvalidParameter(_))
        ));
    }
}
