//! Cut enumeration
//!
//! Cuts of a gate are built by merging one cut of every fan-in, keeping the
//! union only while it fits the cut size. Merged cuts are pruned by
//! dominance, sorted by cost and truncated to the cut limit, after which the
//! unit cut of the gate is appended as a fallback. The cut made of the
//! fan-ins themselves is never pruned away, so every gate keeps a cut its own
//! function can cover.
//!
//! [`NetworkCuts`] can be filled for a whole network in topological order
//! with [`cut_enumeration`], or on demand node by node, in which case cuts
//! of nodes whose fan-in cone changed must be dropped with
//! [`NetworkCuts::invalidate_fanout`].

use crate::cut::{Cut, CutSet, SortOrder, MAX_CUT_SIZE};
use crate::error::{check_cut_size, Error, Result};
use crate::network::{Aig, Network, Node};
use crate::topo::topological_order;
use crate::truth_table::TruthTable;
use crate::truth_table_cache::TruthTableCache;
use log::{debug, trace};
use std::fmt;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct CutEnumerationParams {
    /// Largest number of leaves in a cut.
    pub cut_size: u32,
    /// Largest number of cuts kept per node, the unit cut included.
    pub cut_limit: u32,
    /// Remove leaves the cut function does not depend on.
    pub minimize_truth_table: bool,
}

impl Default for CutEnumerationParams {
    fn default() -> Self {
        CutEnumerationParams {
            cut_size: 4,
            cut_limit: 8,
            minimize_truth_table: true,
        }
    }
}

impl CutEnumerationParams {
    /// Checks the parameters against the largest cut size an engine
    /// supports.
    pub fn validate(&self, max_cut_size: u32) -> Result<()> {
        check_cut_size(self.cut_size, max_cut_size.min(MAX_CUT_SIZE as u32))?;
        if self.cut_limit < 2 {
            return Err(Error::InvalidParameter(format!(
                "cut limit must be at least 2, got {}",
                self.cut_limit
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct CutEnumerationStats {
    pub total_cuts: usize,
    pub time_total: Duration,
    pub time_truth_table: Duration,
}

impl fmt::Display for CutEnumerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[i] total time     = {:>5.2} secs", self.time_total.as_secs_f64())?;
        writeln!(f, "[i] truth table    = {:>5.2} secs", self.time_truth_table.as_secs_f64())?;
        write!(f, "[i] total cuts     = {}", self.total_cuts)
    }
}

/// The cut sets of a network together with the cache of their functions.
pub struct NetworkCuts {
    params: CutEnumerationParams,
    order: SortOrder,
    cut_sets: Vec<Option<CutSet>>,
    cache: TruthTableCache,
    pub stats: CutEnumerationStats,
}

impl NetworkCuts {
    pub fn new(params: CutEnumerationParams, order: SortOrder) -> NetworkCuts {
        NetworkCuts {
            params,
            order,
            cut_sets: vec![],
            cache: TruthTableCache::new(),
            stats: CutEnumerationStats::default(),
        }
    }

    pub fn params(&self) -> &CutEnumerationParams {
        &self.params
    }

    pub fn has_cuts(&self, n: Node) -> bool {
        matches!(self.cut_sets.get(n as usize), Some(Some(_)))
    }

    /// Returns the cuts of `n`, which must have been computed.
    pub fn cuts(&self, n: Node) -> &CutSet {
        match self.cut_sets.get(n as usize) {
            Some(Some(cuts)) => cuts,
            _ => panic!("cuts of node {} have not been computed", n),
        }
    }

    pub fn cuts_mut(&mut self, n: Node) -> &mut CutSet {
        match self.cut_sets.get_mut(n as usize) {
            Some(Some(cuts)) => cuts,
            _ => panic!("cuts of node {} have not been computed", n),
        }
    }

    pub fn truth_table(&self, cut: &Cut) -> TruthTable {
        self.cache.get(cut.function())
    }

    /// Stores `tt` in the function cache and returns its handle.
    pub fn insert_truth_table(&mut self, tt: &TruthTable) -> u32 {
        self.cache.insert(tt)
    }

    pub fn total_cuts(&self) -> usize {
        self.cut_sets.iter().flatten().map(|cuts| cuts.len()).sum()
    }

    /// Drops the cuts of `n`.
    pub fn invalidate(&mut self, n: Node) {
        if let Some(slot) = self.cut_sets.get_mut(n as usize) {
            *slot = None;
        }
    }

    /// Drops the cuts of every node in the transitive fan-out of `n`, `n`
    /// included.
    pub fn invalidate_fanout(&mut self, aig: &Aig, n: Node) {
        let mut stack = vec![n];
        while let Some(n) = stack.pop() {
            if self.has_cuts(n) {
                self.invalidate(n);
                stack.extend_from_slice(aig.fanouts(n));
            }
        }
    }

    /// Computes the cuts of `n` and, first, of every fan-in in its cone
    /// which has none yet. Cut costs are left at zero.
    pub fn compute_cone<N: Network>(&mut self, ntk: &N, n: Node) {
        let mut stack = vec![(n, false)];
        while let Some((n, expanded)) = stack.pop() {
            if self.has_cuts(n) {
                continue;
            }
            if expanded {
                self.compute_node(ntk, n, |_| {});
                continue;
            }

            stack.push((n, true));
            for fanin in ntk.fanins(n) {
                if !self.has_cuts(fanin.node()) {
                    stack.push((fanin.node(), false));
                }
            }
        }
    }

    /// Computes the cuts of `n` from the cuts of its fan-ins, which must
    /// all be available. `cost` fills in the data of every candidate cut
    /// before it is inserted.
    pub fn compute_node<N: Network>(&mut self, ntk: &N, n: Node, mut cost: impl FnMut(&mut Cut)) {
        if n as usize >= self.cut_sets.len() {
            self.cut_sets.resize(n as usize + 1, None);
        }

        let limit = self.params.cut_limit as usize;
        let mut set = CutSet::new(limit);

        if ntk.is_constant(n) {
            let tt = if ntk.constant_value(n) {
                TruthTable::const1(0)
            } else {
                TruthTable::new(0)
            };
            if let Some(cut) = set.add_cut(&[]) {
                cut.set_function(self.cache.insert(&tt));
                cost(cut);
            }
        } else if ntk.is_ci(n) {
            self.add_unit_cut(&mut set, n, &mut cost);
        } else {
            let fanins = ntk.fanins(n).iter().map(|f| f.node()).collect::<Vec<_>>();
            for fanin in &fanins {
                assert!(self.has_cuts(*fanin), "fan-in {} of node {} has no cuts", fanin, n);
            }

            let start = std::time::Instant::now();
            self.merge_fanin_cuts(ntk, n, &fanins, &mut set, &mut cost);
            self.stats.time_truth_table += start.elapsed();

            set.limit(limit - 1);
            self.keep_fanin_cut(ntk, n, &fanins, &mut set, &mut cost);
            self.add_unit_cut(&mut set, n, &mut cost);
        }

        trace!("node {}: {} cuts", n, set.len());
        self.stats.total_cuts += set.len();
        self.cut_sets[n as usize] = Some(set);
    }

    fn add_unit_cut(&mut self, set: &mut CutSet, n: Node, cost: &mut impl FnMut(&mut Cut)) {
        let function = self.cache.insert(&TruthTable::nth_var(1, 0));
        if let Some(cut) = set.add_cut(&[n]) {
            cut.set_function(function);
            cost(cut);
        }
    }

    /// Puts the cut made of the fan-ins themselves back into `set` when
    /// pruning dropped it and no cut of the set dominates it. The last slot
    /// stays free for the unit cut.
    fn keep_fanin_cut<N: Network>(
        &mut self,
        ntk: &N,
        n: Node,
        fanins: &[Node],
        set: &mut CutSet,
        cost: &mut impl FnMut(&mut Cut),
    ) {
        if fanins.is_empty() {
            return;
        }
        let cut_size = self.params.cut_size as usize;
        let Some(children) = fanins
            .iter()
            .map(|f| {
                self.cuts(*f)
                    .iter()
                    .find(|c| c.is_trivial_of(*f) || c.size() == 0)
                    .cloned()
            })
            .collect::<Option<Vec<_>>>()
        else {
            return;
        };

        let mut merged = children[0].clone();
        for child in &children[1..] {
            match merged.merge(child, cut_size) {
                Some(cut) => merged = cut,
                None => return,
            }
        }
        if set.is_dominated(&merged) {
            return;
        }
        let Some(mut cut) = self.finish_cut(ntk, n, merged, &children, set) else {
            return;
        };

        cost(&mut cut);
        if set.len() + 2 > set.capacity() {
            set.limit(set.capacity() - 2);
        }
        trace!("node {}: fan-in cut restored", n);
        set.insert(cut, self.order);
    }

    fn merge_fanin_cuts<N: Network>(
        &mut self,
        ntk: &N,
        n: Node,
        fanins: &[Node],
        set: &mut CutSet,
        cost: &mut impl FnMut(&mut Cut),
    ) {
        let cut_size = self.params.cut_size as usize;
        let sizes = fanins
            .iter()
            .map(|f| self.cuts(*f).len())
            .collect::<Vec<_>>();
        if sizes.iter().any(|s| *s == 0) {
            return;
        }

        // Mixed radix enumeration of one cut per fan-in; the last digit
        // varies fastest so a failed partial merge skips its whole suffix
        let mut digits = vec![0usize; fanins.len()];
        'tuples: loop {
            let mut merged = self.cuts(fanins[0]).get(digits[0]).clone();
            let mut failed_at = None;
            for i in 1..fanins.len() {
                match merged.merge(self.cuts(fanins[i]).get(digits[i]), cut_size) {
                    Some(cut) => merged = cut,
                    None => {
                        failed_at = Some(i);
                        break;
                    }
                }
            }

            if failed_at.is_none() && merged.size() <= cut_size && !set.is_dominated(&merged) {
                let children = fanins
                    .iter()
                    .zip(digits.iter())
                    .map(|(f, d)| self.cuts(*f).get(*d).clone())
                    .collect::<Vec<_>>();
                if let Some(cut) = self.finish_cut(ntk, n, merged, &children, set) {
                    let mut cut = cut;
                    cost(&mut cut);
                    set.insert(cut, self.order);
                }
            }

            // Advance the digits
            let mut i = failed_at.unwrap_or(fanins.len() - 1);
            loop {
                digits[i] += 1;
                if digits[i] < sizes[i] {
                    break;
                }
                if i == 0 {
                    break 'tuples;
                }
                digits[i] = 0;
                i -= 1;
            }
            for digit in digits.iter_mut().skip(i + 1) {
                *digit = 0;
            }
        }
    }

    /// Computes the function of a merged cut and minimises its support.
    /// Returns `None` if the minimised cut is dominated.
    fn finish_cut<N: Network>(
        &mut self,
        ntk: &N,
        n: Node,
        mut cut: Cut,
        children: &[Cut],
        set: &CutSet,
    ) -> Option<Cut> {
        let functions = children
            .iter()
            .map(|child| self.cache.get(child.function()).expand(child.leaves(), cut.leaves()))
            .collect::<Vec<_>>();
        let tt = ntk.compute(n, &functions);

        if self.params.minimize_truth_table {
            let (minimized, support) = tt.min_base();
            if support.len() < cut.size() {
                let leaves = support
                    .iter()
                    .map(|v| cut.leaves()[*v as usize])
                    .collect::<Vec<_>>();
                cut.set_leaves(&leaves);
                if set.is_dominated(&cut) {
                    return None;
                }
                cut.set_function(self.cache.insert(&minimized));
                return Some(cut);
            }
        }

        cut.set_function(self.cache.insert(&tt));
        Some(cut)
    }
}

/// Enumerates the cuts of every live node of the network.
///
/// Cuts are sorted by delay, then size, then area flow, where the delay of
/// a cut is one more than the largest delay of the best cuts of its leaves
/// and its area flow is one plus the shared area flows of those cuts. Cuts
/// with fewer than two leaves cost nothing.
pub fn cut_enumeration<N: Network>(ntk: &N, params: &CutEnumerationParams) -> Result<NetworkCuts> {
    params.validate(MAX_CUT_SIZE as u32)?;

    let start = std::time::Instant::now();
    let mut cuts = NetworkCuts::new(params.clone(), SortOrder::Delay);
    let mut delays = vec![0u32; ntk.size()];
    let mut flows = vec![0f32; ntk.size()];

    for n in topological_order(ntk) {
        cuts.compute_node(ntk, n, |cut| {
            if cut.size() < 2 {
                return;
            }
            cut.data.delay = 1 + cut.leaves().iter().map(|l| delays[*l as usize]).max().unwrap_or(0);
            cut.data.area_flow = 1.0
                + cut
                    .leaves()
                    .iter()
                    .map(|l| flows[*l as usize] / ntk.fanout_size(*l).max(1) as f32)
                    .sum::<f32>();
        });

        if ntk.is_gate(n) {
            let best = cuts.cuts(n).best().data;
            delays[n as usize] = best.delay;
            flows[n as usize] = best.area_flow;
        }
    }

    cuts.stats.time_total = start.elapsed();
    debug!(
        "enumerated {} cuts over {} nodes",
        cuts.stats.total_cuts,
        ntk.size()
    );
    Ok(cuts)
}
