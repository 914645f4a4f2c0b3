//! Cut rewriting against a database of NPN class structures
//!
//! Nodes are visited once in topological order. For every cut of a node,
//! the cut function is canonized and each stored structure of its class is
//! laid over the cut leaves. Walking the structure against the structural
//! hash table of the network tells which of its gates already exist, so
//! the gain of a replacement is the size of the node's MFFC minus the gates
//! the replacement would add. The best replacement with a positive gain is
//! built and substituted for the node.

use crate::cut::SortOrder;
use crate::cut_enumeration::{CutEnumerationParams, NetworkCuts};
use crate::depth::DepthView;
use crate::error::{check_cut_size, Result};
use crate::exact_library::ExactLibrary;
use crate::mffc::{collect_mffc, gate_cost, mffc_cost, recursive_deref, recursive_ref, CostMetric};
use crate::network::{Aig, Network, Node, Signal, Workspace};
use crate::npn::exact_npn_canonization;
use crate::simulate::simulate_window;
use crate::stopwatch::call_with_stopwatch;
use crate::topo::topological_order;
use crate::truth_table::TruthTable;
use hashbrown::HashMap;
use log::{debug, info, trace};
use std::cmp::Reverse;
use std::fmt;
use std::time::{Duration, Instant};

/// Largest cut a structure database is built for.
pub const MAX_REWRITE_CUT_SIZE: u32 = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct RewriteParams {
    pub cut_enumeration: CutEnumerationParams,
    /// Rewrite each node over the leaves of its MFFC instead of its cuts.
    pub use_mffc: bool,
    /// Reject replacements which would make a node later than its required
    /// level.
    pub preserve_depth: bool,
    pub allow_zero_gain: bool,
    /// Count literals instead of gates.
    pub optimize_literal_cost: bool,
    pub verbose: bool,
}

impl Default for RewriteParams {
    fn default() -> Self {
        RewriteParams {
            cut_enumeration: CutEnumerationParams {
                cut_size: 4,
                cut_limit: 8,
                minimize_truth_table: true,
            },
            use_mffc: false,
            preserve_depth: false,
            allow_zero_gain: false,
            optimize_literal_cost: false,
            verbose: false,
        }
    }
}

impl RewriteParams {
    pub fn validate(&self) -> Result<()> {
        self.cut_enumeration.validate(MAX_REWRITE_CUT_SIZE)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RewriteStats {
    pub gates_before: usize,
    pub gates_after: usize,
    pub depth_before: u32,
    pub depth_after: u32,
    pub substitutions: usize,
    /// Structures evaluated over all cuts.
    pub candidates: usize,
    pub time_cuts: Duration,
    pub time_evaluation: Duration,
    pub time_total: Duration,
}

impl RewriteStats {
    pub fn gain(&self) -> usize {
        self.gates_before.saturating_sub(self.gates_after)
    }
}

impl fmt::Display for RewriteStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[i] gates          = {} -> {}", self.gates_before, self.gates_after)?;
        writeln!(f, "[i] depth          = {} -> {}", self.depth_before, self.depth_after)?;
        writeln!(f, "[i] substitutions  = {}", self.substitutions)?;
        writeln!(f, "[i] candidates     = {}", self.candidates)?;
        writeln!(f, "[i] cuts time      = {:>5.2} secs", self.time_cuts.as_secs_f64())?;
        writeln!(f, "[i] eval time      = {:>5.2} secs", self.time_evaluation.as_secs_f64())?;
        write!(f, "[i] total time     = {:>5.2} secs", self.time_total.as_secs_f64())
    }
}

/// Cost of laying a structure over a cut.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Evaluation {
    nodes_added: u32,
    literals_added: u32,
    level: u32,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    /// The network signal of a structure node, `None` if it must be built.
    signal: Option<Signal>,
    level: u32,
}

/// Walks `structure` in the database with its pins bound to `pins` and
/// counts the gates that are neither present in `aig` nor freed by
/// replacing `root`. The MFFC of `root` must be dereferenced, so that its
/// gates are the ones without fan-out.
///
/// Returns `None` if the structure is `root` itself or would have to be
/// built on top of it.
fn evaluate_structure(
    aig: &Aig,
    depth: &DepthView,
    database: &Aig,
    root: Node,
    pins: &[Signal],
    structure: Signal,
) -> Option<Evaluation> {
    let mut memo: HashMap<Node, Entry> = HashMap::new();
    memo.insert(
        0,
        Entry {
            signal: Some(aig.get_constant(false)),
            level: 0,
        },
    );
    for (pin, s) in database.cis().iter().zip(pins) {
        memo.insert(
            *pin,
            Entry {
                signal: Some(*s),
                level: depth.level(s.node()),
            },
        );
    }

    let mut eval = Evaluation::default();
    let mut stack = vec![(structure.node(), false)];
    while let Some((d, expanded)) = stack.pop() {
        if memo.contains_key(&d) {
            continue;
        }
        let [f0, f1] = [database.fanins(d)[0], database.fanins(d)[1]];
        if !expanded {
            stack.push((d, true));
            stack.push((f0.node(), false));
            stack.push((f1.node(), false));
            continue;
        }

        let c0 = memo[&f0.node()];
        let c1 = memo[&f1.node()];
        let edges = [
            c0.signal.map_or(f0.is_complemented(), |s| (s ^ f0.is_complemented()).is_complemented()),
            c1.signal.map_or(f1.is_complemented(), |s| (s ^ f1.is_complemented()).is_complemented()),
        ];
        let existing = match (c0.signal, c1.signal) {
            (Some(s0), Some(s1)) => aig.has_and(s0 ^ f0.is_complemented(), s1 ^ f1.is_complemented()),
            _ => None,
        };

        let entry = match existing {
            Some(s) if s.node() == root => return None,
            Some(s) => {
                if aig.is_and(s.node()) && aig.fanout_size(s.node()) == 0 {
                    eval.nodes_added += 1;
                    eval.literals_added += gate_cost(aig, s.node(), CostMetric::Literals);
                }
                Entry {
                    signal: Some(s),
                    level: depth.level(s.node()),
                }
            }
            None => {
                eval.nodes_added += 1;
                eval.literals_added += 2 + edges.iter().filter(|e| **e).count() as u32;
                Entry {
                    signal: None,
                    level: 1 + c0.level.max(c1.level),
                }
            }
        };
        memo.insert(d, entry);
    }

    eval.level = memo[&structure.node()].level;
    Some(eval)
}

/// Copies `structure` out of the database into `aig` over `pins`.
fn build_structure(aig: &mut Aig, database: &Aig, pins: &[Signal], structure: Signal) -> Signal {
    let mut memo: HashMap<Node, Signal> = HashMap::new();
    memo.insert(0, aig.get_constant(false));
    for (pin, s) in database.cis().iter().zip(pins) {
        memo.insert(*pin, *s);
    }

    let mut stack = vec![(structure.node(), false)];
    while let Some((d, expanded)) = stack.pop() {
        if memo.contains_key(&d) {
            continue;
        }
        let [f0, f1] = [database.fanins(d)[0], database.fanins(d)[1]];
        if expanded {
            let a = memo[&f0.node()] ^ f0.is_complemented();
            let b = memo[&f1.node()] ^ f1.is_complemented();
            let s = aig.create_and(a, b);
            memo.insert(d, s);
        } else {
            stack.push((d, true));
            stack.push((f0.node(), false));
            stack.push((f1.node(), false));
        }
    }

    memo[&structure.node()] ^ structure.is_complemented()
}

struct Candidate {
    pins: Vec<Signal>,
    structure: Signal,
    output_negation: bool,
    /// Primary and secondary gain.
    gain: (i32, i32),
    level: u32,
}

impl Candidate {
    fn key(&self) -> (i32, i32, Reverse<u32>) {
        (self.gain.0, self.gain.1, Reverse(self.level))
    }
}

struct Rewriter<'a> {
    aig: &'a mut Aig,
    library: &'a ExactLibrary,
    params: &'a RewriteParams,
    cuts: NetworkCuts,
    depth: DepthView,
    ws: Workspace,
    stats: RewriteStats,
}

impl<'a> Rewriter<'a> {
    fn new(aig: &'a mut Aig, library: &'a ExactLibrary, params: &'a RewriteParams) -> Rewriter<'a> {
        let mut depth = DepthView::new(aig);
        if params.preserve_depth {
            depth.compute_required(aig);
        }

        Rewriter {
            stats: RewriteStats {
                gates_before: aig.num_gates(),
                depth_before: depth.depth(),
                ..Default::default()
            },
            aig,
            library,
            params,
            cuts: NetworkCuts::new(params.cut_enumeration.clone(), SortOrder::Delay),
            depth,
            ws: Workspace::new(),
        }
    }

    fn run(mut self) -> RewriteStats {
        let start = Instant::now();

        // Nodes created by replacements are not visited again in this pass
        for n in topological_order(&*self.aig) {
            if !self.aig.is_and(n) || self.aig.fanout_size(n) == 0 {
                continue;
            }
            self.rewrite_node(n);
        }

        self.stats.gates_after = self.aig.num_gates();
        self.stats.depth_after = self.depth.depth();
        self.stats.time_total = start.elapsed();

        let summary = format!(
            "rewrite: {} -> {} gates, depth {} -> {}, {} substitutions",
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

    /// Returns the leaves and functions of the windows to rewrite `n` over.
    fn windows(&mut self, n: Node) -> Vec<(Vec<Node>, TruthTable)> {
        if self.params.use_mffc {
            let mffc = collect_mffc(self.aig, &mut self.ws, n);
            if mffc.leaves.len() > self.params.cut_enumeration.cut_size as usize {
                return vec![];
            }
            let tt = simulate_window(self.aig, n, &mffc.leaves);
            return vec![(mffc.leaves, tt)];
        }

        let aig: &Aig = self.aig;
        let cuts = &mut self.cuts;
        call_with_stopwatch(&mut self.stats.time_cuts, || cuts.compute_cone(aig, n));
        cuts.cuts(n)
            .iter()
            .filter(|cut| !cut.is_trivial_of(n))
            .map(|cut| (cut.leaves().to_vec(), cuts.truth_table(cut)))
            .collect()
    }

    fn rewrite_node(&mut self, n: Node) {
        let windows = self.windows(n);
        if windows.is_empty() {
            return;
        }

        let start = Instant::now();
        let mut best: Option<Candidate> = None;
        for (leaves, tt) in &windows {
            // The leaves bound the MFFC, so they are referenced once more
            // while it is dereferenced
            for leaf in leaves {
                self.aig.incr_fanout_size(*leaf);
            }
            let literals_saved = mffc_cost(self.aig, n, CostMetric::Literals) as i32;
            let nodes_saved = recursive_deref(self.aig, n, CostMetric::Nodes) as i32;
            if let Some(candidate) = self.best_structure(n, leaves, tt, nodes_saved, literals_saved) {
                if best.as_ref().map_or(true, |b| candidate.key() > b.key()) {
                    best = Some(candidate);
                }
            }
            recursive_ref(self.aig, n, CostMetric::Nodes);
            for leaf in leaves {
                self.aig.decr_fanout_size(*leaf);
            }
        }
        self.stats.time_evaluation += start.elapsed();

        let best = match best {
            Some(best) => best,
            None => return,
        };
        let accepted = best.gain.0 > 0 || (self.params.allow_zero_gain && best.gain.0 == 0);
        if !accepted {
            return;
        }

        let database = self.library.database();
        let s = build_structure(self.aig, database, &best.pins, best.structure) ^ best.output_negation;
        debug!("node {}: replaced by {:?} with gain {:?}", n, s, best.gain);

        self.cuts.invalidate_fanout(self.aig, n);
        let modified = self.aig.substitute_node(n, s);
        self.depth.update_after_substitution(self.aig, &modified);
        self.stats.substitutions += 1;
    }

    /// Evaluates every structure of the class of `tt` over `leaves`. The
    /// MFFC of `n` must be dereferenced.
    fn best_structure(
        &mut self,
        n: Node,
        leaves: &[Node],
        tt: &TruthTable,
        nodes_saved: i32,
        literals_saved: i32,
    ) -> Option<Candidate> {
        let aig: &Aig = self.aig;
        let database = self.library.database();
        let num_vars = self.library.num_vars();
        let required = if self.params.preserve_depth {
            self.depth.required(n)
        } else {
            u32::MAX
        };

        let canon = exact_npn_canonization(&tt.extend_to(num_vars));
        let supergates = self.library.get_supergates(&canon.canonical)?;

        // Pins beyond the cut are tied to zero; the structure does not
        // depend on them
        let transform = &canon.transform;
        let pins = (0..num_vars as usize)
            .map(|i| {
                let leaf = leaves
                    .get(transform.perm[i] as usize)
                    .map_or(aig.get_constant(false), |l| Signal::new(*l, false));
                leaf ^ transform.input_negated(i)
            })
            .collect::<Vec<_>>();

        let mut best: Option<Candidate> = None;
        for sg in supergates {
            self.stats.candidates += 1;
            let eval = match evaluate_structure(aig, &self.depth, database, n, &pins, sg.root) {
                Some(eval) => eval,
                None => continue,
            };
            if eval.level > required {
                continue;
            }

            let nodes_gain = nodes_saved - eval.nodes_added as i32;
            let literals_gain = literals_saved - eval.literals_added as i32;
            let candidate = Candidate {
                pins: pins.clone(),
                structure: sg.root,
                output_negation: transform.output_negation,
                gain: if self.params.optimize_literal_cost {
                    (literals_gain, nodes_gain)
                } else {
                    (nodes_gain, literals_gain)
                },
                level: eval.level,
            };
            trace!(
                "node {}: cut {:?}, structure {:?}, gain {:?}, level {}",
                n,
                leaves,
                sg.root,
                candidate.gain,
                candidate.level
            );
            if best.as_ref().map_or(true, |b| candidate.key() > b.key()) {
                best = Some(candidate);
            }
        }
        best
    }
}

/// Rewrites `aig` in place in one pass.
pub fn rewrite(aig: &mut Aig, library: &ExactLibrary, params: &RewriteParams) -> Result<RewriteStats> {
    params.validate()?;
    check_cut_size(params.cut_enumeration.cut_size, library.num_vars())?;
    Ok(Rewriter::new(aig, library, params).run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::exact_library::ExactLibraryParams;
    use crate::resynthesis::SopFactoring;
    use crate::simulate::equivalent;
    use crate::test_utils::random_aig;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn library() -> ExactLibrary {
        ExactLibrary::new(&mut SopFactoring::default(), &ExactLibraryParams::default()).unwrap()
    }

    #[test]
    fn double_negation_is_removed() {
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        // n1 = !a & !a, so !n1 = a
        let n1 = aig.create_and_raw(!a, !a);
        let g = aig.create_and(!n1, b);
        aig.create_po(g);
        let original = aig.clone();

        let stats = rewrite(&mut aig, &library(), &RewriteParams::default()).unwrap();
        assert_eq!(stats.gates_before, 2);
        assert!(aig.num_gates() < 2);
        assert_eq!(stats.gain(), 1);
        assert!(equivalent(&original, &aig));
    }

    #[test]
    fn redundant_structure_shrinks() {
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

        let stats = rewrite(&mut aig, &library(), &RewriteParams::default()).unwrap();
        assert_eq!(stats.gates_after, 2);
        assert!(equivalent(&original, &aig));
    }

    #[test]
    fn random_networks_never_grow() {
        let library = library();
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..10 {
            let mut aig = random_aig(&mut rng, 6, 60, 4);
            let original = aig.clone();
            let before = aig.num_gates();

            let stats = rewrite(&mut aig, &library, &RewriteParams::default()).unwrap();
            assert!(aig.num_gates() <= before);
            assert_eq!(stats.gates_after, aig.num_gates());
            assert!(equivalent(&original, &aig));
        }
    }

    #[test]
    fn fixed_point() {
        let library = library();
        let mut rng = SmallRng::seed_from_u64(11);
        let mut aig = random_aig(&mut rng, 7, 120, 5);
        let original = aig.clone();

        let mut passes = 0;
        loop {
            let before = aig.num_gates();
            let stats = rewrite(&mut aig, &library, &RewriteParams::default()).unwrap();
            passes += 1;
            if stats.substitutions == 0 {
                break;
            }
            assert!(aig.num_gates() < before);
        }
        assert!(passes <= original.num_gates() + 1);
        assert!(equivalent(&original, &aig));
    }

    #[test]
    fn variants() {
        let library = library();
        let mut rng = SmallRng::seed_from_u64(3);
        let configurations = [
            RewriteParams {
                use_mffc: true,
                ..Default::default()
            },
            RewriteParams {
                optimize_literal_cost: true,
                ..Default::default()
            },
            RewriteParams {
                allow_zero_gain: true,
                ..Default::default()
            },
        ];
        for params in &configurations {
            let mut aig = random_aig(&mut rng, 6, 50, 3);
            let original = aig.clone();
            rewrite(&mut aig, &library, params).unwrap();
            assert!(equivalent(&original, &aig));
        }
    }

    #[test]
    fn preserve_depth() {
        let library = library();
        let mut rng = SmallRng::seed_from_u64(5);
        let params = RewriteParams {
            preserve_depth: true,
            ..Default::default()
        };
        for _ in 0..5 {
            let mut aig = random_aig(&mut rng, 6, 60, 4);
            let original = aig.clone();
            let stats = rewrite(&mut aig, &library, &params).unwrap();
            assert!(stats.depth_after <= stats.depth_before);
            assert_eq!(DepthView::new(&aig).depth(), stats.depth_after);
            assert!(equivalent(&original, &aig));
        }
    }

    #[test]
    fn cut_size_is_bounded() {
        let mut aig = Aig::new();
        let params = RewriteParams {
            cut_enumeration: CutEnumerationParams {
                cut_size: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            rewrite(&mut aig, &library(), &params),
            Err(Error::CutSizeTooLarge { requested: 5, max: 4 })
        ));
    }
}
