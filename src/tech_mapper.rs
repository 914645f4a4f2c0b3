//! Standard-cell technology mapping
//!
//! Every node is matched in both output phases. A phase is either built
//! natively, by a library gate implementing the cut function (phase 0) or
//! its complement (phase 1), or by an inverter on the other phase. After
//! both phases are matched the mapper decides whether dropping one of them
//! in favour of an inverter is cheaper; a node built that way has
//! `same_match` set and both phases share the cone of the kept one.
//!
//! Rounds follow the LUT mapper: delay, area flow under required times,
//! then exact area, where referencing a phase built through an inverter
//! references the inverter and the kept phase.

use crate::cell_network::CellNetwork;
use crate::cut::{compare_eps, Cut, EPS};
use crate::cut_enumeration::{cut_enumeration, CutEnumerationParams, NetworkCuts};
use crate::error::{Error, Result};
use crate::library::{CellInfo, Supergate, SupergateInput, TechLibrary};
use crate::mapping::{blend_references, resolve_required, MappingStats, Round, UNCONSTRAINED};
use crate::network::{Aig, Network, Node, Signal};
use crate::npn::MAX_NPN_VARS;
use crate::stopwatch::Stopwatch;
use crate::topo::topological_order;
use log::{debug, info, trace};
use std::cmp::Ordering;
use std::time::Instant;

#[derive(Clone, Debug, PartialEq)]
pub struct TechMapParams {
    pub cut_enumeration: CutEnumerationParams,
    /// Required time of the COs; zero asks for the best delay.
    pub required_time: f32,
    pub skip_delay_round: bool,
    pub area_flow_rounds: u32,
    pub ela_rounds: u32,
    /// Relative slack on the best delay granted to the area rounds when no
    /// required time is given.
    pub area_margin: f32,
    pub verbose: bool,
}

impl Default for TechMapParams {
    fn default() -> Self {
        TechMapParams {
            cut_enumeration: CutEnumerationParams {
                cut_size: 5,
                cut_limit: 16,
                minimize_truth_table: true,
            },
            required_time: 0.0,
            skip_delay_round: false,
            area_flow_rounds: 1,
            ela_rounds: 2,
            area_margin: 0.0,
            verbose: false,
        }
    }
}

impl TechMapParams {
    pub fn validate(&self) -> Result<()> {
        self.cut_enumeration.validate(MAX_NPN_VARS)?;
        if self.required_time < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "required time must not be negative, got {}",
                self.required_time
            )));
        }
        if self.area_margin < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "area margin must not be negative, got {}",
                self.area_margin
            )));
        }
        Ok(())
    }
}

/// A native implementation of one phase of a node.
#[derive(Clone, Copy, Debug)]
struct PhaseMatch<'a> {
    /// Index of the cut in the node's cut set.
    cut: usize,
    /// `None` for a constant cut.
    supergate: Option<&'a Supergate>,
    arrival: f32,
    flow: f32,
}

#[derive(Clone, Debug)]
struct NodeMatch<'a> {
    native: [Option<PhaseMatch<'a>>; 2],
    same_match: bool,
    /// The phase built natively when `same_match` is set.
    kept: usize,
    arrival: [f32; 2],
    required: [f32; 2],
    flow: [f32; 2],
    map_refs: [u32; 2],
    est_refs: f32,
}

impl NodeMatch<'_> {
    fn is_native(&self, phase: usize) -> bool {
        !self.same_match || self.kept == phase
    }

    /// Returns the phases built natively and the phases built by an
    /// inverter, given the current references.
    fn usage(&self) -> ([bool; 2], [bool; 2]) {
        let mut native = [false; 2];
        let mut inverted = [false; 2];
        for p in 0..2 {
            if self.map_refs[p] == 0 {
                continue;
            }
            if self.is_native(p) {
                native[p] = true;
            } else {
                inverted[p] = true;
                native[self.kept] = true;
            }
        }
        (native, inverted)
    }
}

/// Each cut leaf with the phase its supergate pin needs.
fn leaf_phases(cut: &Cut, supergate: &Supergate) -> Vec<(Node, usize)> {
    cut.leaves()
        .iter()
        .enumerate()
        .map(|(i, leaf)| (*leaf, ((supergate.polarity >> i) & 1) as usize))
        .collect()
}

struct TechMapper<'a> {
    aig: &'a Aig,
    library: &'a TechLibrary,
    params: &'a TechMapParams,
    inverter: CellInfo,
    cuts: NetworkCuts,
    /// Supergates of every cut of every node, per phase.
    matches: Vec<Vec<[&'a [Supergate]; 2]>>,
    nodes: Vec<NodeMatch<'a>>,
    topo: Vec<Node>,
    target: Option<f32>,
    area: f32,
    delay: f32,
    inverters: usize,
    round: u32,
    stats: MappingStats,
}

impl<'a> TechMapper<'a> {
    fn new(aig: &'a Aig, library: &'a TechLibrary, params: &'a TechMapParams) -> Result<TechMapper<'a>> {
        let inverter = library.inverter().ok_or_else(|| {
            Error::InvalidParameter("the technology library has no inverter".to_string())
        })?;

        let mut stats = MappingStats::default();
        let cuts = {
            let _watch = Stopwatch::new(&mut stats.time_cuts);
            cut_enumeration(aig, &params.cut_enumeration)?
        };

        let mut nodes = Vec::with_capacity(aig.size());
        for n in 0..aig.size() as Node {
            let ci = aig.is_ci(n);
            let mut node = NodeMatch {
                native: [None; 2],
                same_match: ci,
                kept: 0,
                arrival: [0.0; 2],
                required: [UNCONSTRAINED; 2],
                flow: [0.0; 2],
                map_refs: [0; 2],
                est_refs: aig.fanout_size(n) as f32,
            };
            if ci {
                node.arrival[1] = inverter.delay;
                node.flow[1] = inverter.area;
            }
            nodes.push(node);
        }

        let mut mapper = TechMapper {
            aig,
            library,
            params,
            inverter,
            cuts,
            matches: vec![],
            nodes,
            topo: topological_order(aig),
            target: None,
            area: 0.0,
            delay: 0.0,
            inverters: 0,
            round: 0,
            stats,
        };
        mapper.compute_matches()?;
        Ok(mapper)
    }

    /// Looks up the supergates of every cut. Fails if a gate has no
    /// matched cut in either phase.
    fn compute_matches(&mut self) -> Result<()> {
        let aig = self.aig;
        let library: &'a TechLibrary = self.library;
        self.matches = vec![vec![]; aig.size()];
        for n in aig.gates() {
            let set = self.cuts.cuts(n);
            let mut matched = false;
            let mut cut_matches = Vec::with_capacity(set.len());
            for cut in set.iter() {
                if cut.is_trivial_of(n) || cut.size() == 0 {
                    matched |= cut.size() == 0;
                    cut_matches.push([&[][..], &[][..]]);
                    continue;
                }
                let tt = self.cuts.truth_table(cut);
                let phase0 = library.get_supergates(&tt).unwrap_or(&[]);
                let phase1 = library.get_supergates(&!tt).unwrap_or(&[]);
                matched |= !phase0.is_empty() || !phase1.is_empty();
                cut_matches.push([phase0, phase1]);
            }
            if !matched {
                return Err(Error::Unmappable { node: n });
            }
            self.matches[n as usize] = cut_matches;
        }
        Ok(())
    }

    fn run(mut self) -> (CellNetwork, MappingStats) {
        let start = Instant::now();

        let first = if self.params.skip_delay_round {
            Round::AreaFlow
        } else {
            Round::Delay
        };
        self.map_round(first);
        self.compute_mapping(first);

        for _ in 0..self.params.area_flow_rounds {
            self.map_round(Round::AreaFlow);
            self.compute_mapping(Round::AreaFlow);
        }
        for _ in 0..self.params.ela_rounds {
            self.map_round(Round::ExactArea);
            self.compute_mapping(Round::ExactArea);
        }
        self.stats.time_mapping = start.elapsed();

        let cells = self.derive();
        self.stats.time_total = start.elapsed() + self.stats.time_cuts;
        self.stats.area = self.area;
        self.stats.delay = self.delay;
        self.stats.nodes = cells.num_gates();
        self.stats.inverters = self.inverters;

        let summary = format!(
            "technology mapping: area {:.2}, delay {:.2}, {} cells, {} inverters",
            self.area,
            self.delay,
            cells.num_gates(),
            self.inverters
        );
        if self.params.verbose {
            info!("{}", summary);
        } else {
            debug!("{}", summary);
        }
        (cells, self.stats)
    }

    fn map_round(&mut self, round: Round) {
        if round == Round::AreaFlow {
            for node in self.nodes.iter_mut() {
                let refs = node.map_refs[0] + node.map_refs[1];
                node.est_refs = blend_references(node.est_refs, refs, self.round);
            }
            self.round += 1;
        }

        for i in 0..self.topo.len() {
            let n = self.topo[i];
            if !self.aig.is_gate(n) {
                continue;
            }

            let node = &self.nodes[n as usize];
            let mapped = round == Round::ExactArea && node.map_refs[0] + node.map_refs[1] > 0;
            if mapped {
                self.release(n);
            }

            let phase0 = self.match_phase(n, 0, round);
            let phase1 = self.match_phase(n, 1, round);
            self.drop_phase(n, [phase0, phase1], round);

            if mapped {
                self.acquire(n);
            }
        }
    }

    fn evaluate_match(&self, cut: &Cut, supergate: &Supergate) -> (f32, f32) {
        let mut arrival = 0f32;
        let mut flow = supergate.area;
        for (i, (leaf, phase)) in leaf_phases(cut, supergate).into_iter().enumerate() {
            let node = &self.nodes[leaf as usize];
            arrival = arrival.max(node.arrival[phase] + supergate.delay[i]);
            flow += node.flow[phase] / node.est_refs.max(1.0);
        }
        (arrival, flow)
    }

    fn exact_area(&mut self, cut: &Cut, supergate: &Supergate) -> f32 {
        let leaves = leaf_phases(cut, supergate);
        let mut area = supergate.area;
        for (leaf, phase) in &leaves {
            area += self.reference(*leaf, *phase);
        }
        for (leaf, phase) in &leaves {
            self.dereference(*leaf, *phase);
        }
        area
    }

    /// Selects the best native implementation of `phase` of gate `n`
    /// together with its cost. Area rounds only consider matches meeting
    /// the required time, and fall back to the fastest match.
    fn match_phase(&mut self, n: Node, phase: usize, round: Round) -> Option<(PhaseMatch<'a>, f32)> {
        let required = self.nodes[n as usize].required[phase];
        let mut best: Option<(PhaseMatch<'a>, f32, usize)> = None;

        for c in 0..self.cuts.cuts(n).len() {
            let cut = self.cuts.cuts(n).get(c).clone();
            if cut.is_trivial_of(n) {
                continue;
            }
            if cut.size() == 0 {
                let constant = PhaseMatch {
                    cut: c,
                    supergate: None,
                    arrival: 0.0,
                    flow: 0.0,
                };
                return Some((constant, 0.0));
            }

            let supergates: &'a [Supergate] = self.matches[n as usize][c][phase];
            for supergate in supergates {
                let (arrival, flow) = self.evaluate_match(&cut, supergate);
                if round != Round::Delay && arrival > required + EPS {
                    continue;
                }
                let cost = match round {
                    Round::ExactArea => self.exact_area(&cut, supergate),
                    _ => flow,
                };

                let better = match &best {
                    None => true,
                    Some((other, other_cost, other_size)) => {
                        let arrival = compare_eps(arrival, other.arrival);
                        let cost = compare_eps(cost, *other_cost);
                        let size = cut.size().cmp(other_size);
                        let ordering = match round {
                            Round::Delay => arrival.then(cost).then(size),
                            _ => cost.then(arrival).then(size),
                        };
                        ordering == Ordering::Less
                    }
                };
                if better {
                    let m = PhaseMatch {
                        cut: c,
                        supergate: Some(supergate),
                        arrival,
                        flow,
                    };
                    best = Some((m, cost, cut.size()));
                }
            }
        }

        match best {
            Some((m, cost, _)) => Some((m, cost)),
            None if round != Round::Delay => self.match_phase(n, phase, Round::Delay),
            None => None,
        }
    }

    /// Records the native matches of `n` and decides whether one phase is
    /// better built by an inverter on the other.
    fn drop_phase(&mut self, n: Node, matches: [Option<(PhaseMatch<'a>, f32)>; 2], round: Round) {
        let inverter = self.inverter;
        let node = &mut self.nodes[n as usize];
        node.native = [matches[0].map(|m| m.0), matches[1].map(|m| m.0)];

        let kept = match matches {
            [Some(_), None] => Some(0),
            [None, Some(_)] => Some(1),
            [None, None] => unreachable!("node {} has no match in either phase", n),
            [Some((m0, c0)), Some((m1, c1))] => {
                let arrival = [m0.arrival, m1.arrival];
                let cost = [c0, c1];
                let meets = |p: usize, arrival: f32| arrival <= node.required[p] + EPS;
                (0..2).find(|&k| {
                    let d = 1 - k;
                    let via_arrival = arrival[k] + inverter.delay;
                    let cheaper = compare_eps(cost[k] + inverter.area, cost[d]) == Ordering::Less;
                    match round {
                        Round::Delay => match compare_eps(via_arrival, arrival[d]) {
                            Ordering::Less => true,
                            Ordering::Equal => cheaper,
                            Ordering::Greater => false,
                        },
                        // A native match which misses its required time is
                        // the fallback and must be replaced if possible
                        _ => {
                            meets(k, arrival[k])
                                && meets(d, via_arrival)
                                && (cheaper || !meets(d, arrival[d]))
                        }
                    }
                })
            }
        };

        node.same_match = kept.is_some();
        node.kept = kept.unwrap_or(0);
        for p in 0..2 {
            if let Some(m) = node.native[p].filter(|_| node.is_native(p)) {
                node.arrival[p] = m.arrival;
                node.flow[p] = m.flow;
            }
        }
        if let Some(k) = kept {
            node.arrival[1 - k] = node.arrival[k] + inverter.delay;
            node.flow[1 - k] = node.flow[k] + inverter.area;
        }

        trace!(
            "node {}: arrival {:?}, flow {:?}, same match {}",
            n,
            node.arrival,
            node.flow,
            node.same_match
        );
    }

    fn native_area(&self, n: Node, phase: usize) -> f32 {
        if !self.aig.is_gate(n) {
            return 0.0;
        }
        self.nodes[n as usize].native[phase]
            .and_then(|m| m.supergate)
            .map_or(0.0, |sg| sg.area)
    }

    fn native_leaves(&self, n: Node, phase: usize) -> Vec<(Node, usize)> {
        if !self.aig.is_gate(n) {
            return vec![];
        }
        match self.nodes[n as usize].native[phase] {
            Some(PhaseMatch {
                cut,
                supergate: Some(supergate),
                ..
            }) => leaf_phases(self.cuts.cuts(n).get(cut), supergate),
            _ => vec![],
        }
    }

    /// References `phase` of `n` and returns the area which became used.
    fn reference(&mut self, n: Node, phase: usize) -> f32 {
        let mut area = 0.0;
        let mut stack = vec![(n, phase)];
        while let Some((n, phase)) = stack.pop() {
            let node = &mut self.nodes[n as usize];
            let (native_before, inverted_before) = node.usage();
            node.map_refs[phase] += 1;
            let (native_after, inverted_after) = node.usage();

            for q in 0..2 {
                if inverted_after[q] && !inverted_before[q] {
                    area += self.inverter.area;
                }
                if native_after[q] && !native_before[q] {
                    area += self.native_area(n, q);
                    stack.extend(self.native_leaves(n, q));
                }
            }
        }
        area
    }

    fn dereference(&mut self, n: Node, phase: usize) -> f32 {
        let mut area = 0.0;
        let mut stack = vec![(n, phase)];
        while let Some((n, phase)) = stack.pop() {
            let node = &mut self.nodes[n as usize];
            let (native_before, inverted_before) = node.usage();
            assert!(
                node.map_refs[phase] > 0,
                "mapping reference of node {} underflowed",
                n
            );
            node.map_refs[phase] -= 1;
            let (native_after, inverted_after) = node.usage();

            for q in 0..2 {
                if inverted_before[q] && !inverted_after[q] {
                    area += self.inverter.area;
                }
                if native_before[q] && !native_after[q] {
                    area += self.native_area(n, q);
                    stack.extend(self.native_leaves(n, q));
                }
            }
        }
        area
    }

    /// Dereferences the cones of the phases `n` builds natively.
    fn release(&mut self, n: Node) {
        let (native, _) = self.nodes[n as usize].usage();
        for q in (0..2).filter(|q| native[*q]) {
            for (leaf, phase) in self.native_leaves(n, q) {
                self.dereference(leaf, phase);
            }
        }
    }

    fn acquire(&mut self, n: Node) {
        let (native, _) = self.nodes[n as usize].usage();
        for q in (0..2).filter(|q| native[*q]) {
            for (leaf, phase) in self.native_leaves(n, q) {
                self.reference(leaf, phase);
            }
        }
    }

    /// Recomputes references, area and delay of the current selection,
    /// then the required times.
    fn compute_mapping(&mut self, round: Round) {
        for node in self.nodes.iter_mut() {
            node.map_refs = [0; 2];
            node.required = [UNCONSTRAINED; 2];
        }
        for co in self.aig.cos() {
            self.nodes[co.node() as usize].map_refs[co.is_complemented() as usize] += 1;
        }

        self.area = 0.0;
        self.inverters = 0;
        for i in (0..self.topo.len()).rev() {
            let n = self.topo[i];
            if self.aig.is_constant(n) {
                continue;
            }
            let (native, inverted) = self.nodes[n as usize].usage();
            for q in 0..2 {
                if inverted[q] {
                    self.area += self.inverter.area;
                    self.inverters += 1;
                }
                if native[q] {
                    self.area += self.native_area(n, q);
                    for (leaf, phase) in self.native_leaves(n, q) {
                        self.nodes[leaf as usize].map_refs[phase] += 1;
                    }
                }
            }
        }

        self.delay = self
            .aig
            .cos()
            .iter()
            .map(|co| self.nodes[co.node() as usize].arrival[co.is_complemented() as usize])
            .fold(0.0, f32::max);
        let params = self.params;
        let delay = self.delay;
        let target = *self.target.get_or_insert_with(|| {
            if params.required_time > 0.0 {
                resolve_required(params.required_time, delay)
            } else {
                delay * (1.0 + params.area_margin)
            }
        });

        for co in self.aig.cos() {
            let required = &mut self.nodes[co.node() as usize].required[co.is_complemented() as usize];
            *required = required.min(target);
        }
        for i in (0..self.topo.len()).rev() {
            let n = self.topo[i];
            if !self.aig.is_gate(n) {
                continue;
            }
            let (native, inverted) = self.nodes[n as usize].usage();
            let node = &mut self.nodes[n as usize];
            for q in (0..2).filter(|q| inverted[*q]) {
                let kept = node.kept;
                node.required[kept] = node.required[kept].min(node.required[q] - self.inverter.delay);
            }
            for q in (0..2).filter(|q| native[*q]) {
                let required = self.nodes[n as usize].required[q];
                let supergate = match self.nodes[n as usize].native[q].and_then(|m| m.supergate) {
                    Some(supergate) => supergate,
                    None => continue,
                };
                for (i, (leaf, phase)) in self.native_leaves(n, q).into_iter().enumerate() {
                    let leaf_required = &mut self.nodes[leaf as usize].required[phase];
                    *leaf_required = leaf_required.min(required - supergate.delay[i]);
                }
            }
        }

        debug!(
            "{} round: area {:.2}, delay {:.2}",
            round, self.area, self.delay
        );
        self.stats.record(round, self.area, self.delay);
    }

    fn derive(&self) -> CellNetwork {
        let aig = self.aig;
        let mut cells = CellNetwork::new(self.library.gates());
        let mut signals: Vec<[Option<Signal>; 2]> = vec![[None; 2]; aig.size()];
        signals[0] = [Some(cells.get_constant(false)), Some(cells.get_constant(true))];

        for (i, ci) in aig.cis().iter().enumerate() {
            let s = if i < aig.num_pis() {
                cells.create_pi()
            } else {
                cells.create_ro(aig.latch_init(i - aig.num_pis()))
            };
            signals[*ci as usize][0] = Some(s);
        }
        for ci in aig.cis() {
            if self.nodes[*ci as usize].map_refs[1] > 0 {
                let s = signals[*ci as usize][0].map(|s| cells.create_cell(self.inverter.gate, &[s]));
                signals[*ci as usize][1] = s;
            }
        }

        let signal = |signals: &[[Option<Signal>; 2]], n: Node, phase: usize| match signals[n as usize][phase] {
            Some(s) => s,
            None => panic!("phase {} of node {} is used before it is mapped", phase, n),
        };

        for n in self.topo.iter().copied() {
            if !aig.is_gate(n) {
                continue;
            }
            let node = &self.nodes[n as usize];
            let (native, inverted) = node.usage();

            for q in (0..2).filter(|q| native[*q]) {
                let m = match node.native[q] {
                    Some(m) => m,
                    None => panic!("phase {} of node {} has no match", q, n),
                };
                let cut = self.cuts.cuts(n).get(m.cut);
                let s = match m.supergate {
                    None => {
                        let value = self.cuts.truth_table(cut).is_const1();
                        cells.get_constant(value ^ (q == 1))
                    }
                    Some(supergate) => {
                        let mut fanins = vec![Signal::default(); supergate.num_vars()];
                        for (i, (leaf, phase)) in leaf_phases(cut, supergate).into_iter().enumerate() {
                            fanins[supergate.permutation[i] as usize] = signal(&signals, leaf, phase);
                        }
                        instantiate(&mut cells, supergate, &fanins)
                    }
                };
                signals[n as usize][q] = Some(s);
            }

            for q in (0..2).filter(|q| inverted[*q]) {
                let kept = signal(&signals, n, node.kept);
                signals[n as usize][q] = Some(cells.create_cell(self.inverter.gate, &[kept]));
            }
        }

        for (i, co) in aig.cos().iter().enumerate() {
            let s = signal(&signals, co.node(), co.is_complemented() as usize);
            if i < aig.num_pos() {
                cells.create_po(s);
            } else {
                cells.create_ri(s);
            }
        }

        cells
    }
}

/// Creates the cells of `supergate` with its inputs driven by `pins` and
/// returns its output.
fn instantiate(cells: &mut CellNetwork, supergate: &Supergate, pins: &[Signal]) -> Signal {
    let mut outputs: Vec<Signal> = Vec::with_capacity(supergate.instances.len());
    for instance in &supergate.instances {
        let fanins = instance
            .fanins
            .iter()
            .map(|fanin| match *fanin {
                SupergateInput::Pin(i) => pins[i as usize],
                SupergateInput::Instance(k) => outputs[k as usize],
            })
            .collect::<Vec<_>>();
        outputs.push(cells.create_cell(instance.gate, &fanins));
    }
    match outputs.last() {
        Some(s) => *s,
        None => cells.create_cell(supergate.gate, pins),
    }
}

/// Maps `aig` onto the gates of `library`.
pub fn tech_map(aig: &Aig, library: &TechLibrary, params: &TechMapParams) -> Result<(CellNetwork, MappingStats)> {
    params.validate()?;
    Ok(TechMapper::new(aig, library, params)?.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genlib::parse_genlib;
    use crate::library::{GateInstance, SupergateDefinition, TechLibraryParams};
    use crate::simulate::equivalent;
    use crate::test_utils::random_aig;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const CELLS: &str = "
GATE zero   0   O=CONST0;
GATE one    0   O=CONST1;
GATE inv    1   O=!a;          PIN * INV 1 999 0.9 0 0.9 0
GATE buf    1.5 O=a;           PIN * NONINV 1 999 1.0 0 1.0 0
GATE nand2  2   O=!(a*b);      PIN * INV 1 999 1.0 0 1.0 0
GATE nor2   2   O=!(a+b);      PIN * INV 1 999 1.4 0 1.4 0
GATE and2   3   O=a*b;         PIN * NONINV 1 999 1.9 0 1.9 0
GATE xor2   5   O=a^b;         PIN * UNKNOWN 2 999 2.1 0 2.1 0
GATE aoi21  3   O=!(a*b+c);    PIN * INV 1 999 1.6 0 1.6 0
GATE oai21  3   O=!((a+b)*c);  PIN * INV 1 999 1.6 0 1.6 0
GATE mux2   6   O=a*s+b*!s;    PIN * UNKNOWN 1 999 2.0 0 2.0 0
";

    fn library(text: &str) -> TechLibrary {
        TechLibrary::new(parse_genlib(text).unwrap(), &TechLibraryParams::default())
    }

    fn nand_inverter_library() -> TechLibrary {
        library(
            "GATE inv 1 O=!a; PIN * INV 1 999 1 0 1 0
             GATE nand2 2 O=!(a*b); PIN * INV 1 999 1 0 1 0",
        )
    }

    #[test]
    fn and_from_nand_and_inverter() {
        let library = nand_inverter_library();
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let g = aig.create_and(a, b);
        aig.create_po(g);

        let (cells, stats) = tech_map(&aig, &library, &TechMapParams::default()).unwrap();
        assert_eq!(cells.num_gates(), 2);
        assert_eq!(cells.area(), 3.0);
        assert_eq!(stats.area, 3.0);
        assert_eq!(stats.delay, 2.0);
        assert_eq!(stats.inverters, 1);
        let cell = cells.cell(cells.cos()[0].node()).unwrap();
        assert_eq!(cell.name, "inv");
        assert!(equivalent(&aig, &cells));
    }

    #[test]
    fn complemented_output_uses_the_nand_alone() {
        let library = nand_inverter_library();
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let g = aig.create_and(a, b);
        aig.create_po(!g);

        let (cells, stats) = tech_map(&aig, &library, &TechMapParams::default()).unwrap();
        assert_eq!(cells.num_gates(), 1);
        assert_eq!(stats.area, 2.0);
        assert_eq!(stats.inverters, 0);
        assert_eq!(cells.cell(cells.cos()[0].node()).unwrap().name, "nand2");
        assert!(equivalent(&aig, &cells));
    }

    #[test]
    fn both_phases_share_one_nand() {
        let library = nand_inverter_library();
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let g = aig.create_and(a, b);
        aig.create_po(g);
        aig.create_po(!g);

        let (cells, stats) = tech_map(&aig, &library, &TechMapParams::default()).unwrap();
        assert_eq!(stats.area, 3.0);
        assert_eq!(cells.cell_counts(), vec![1, 1]);
        assert!(equivalent(&aig, &cells));
    }

    /// Asserts that every cell input is driven by a constant, a CI or
    /// another cell, and that every cell drives something.
    fn assert_no_dangling_cells(cells: &CellNetwork) {
        let mut uses = vec![0usize; cells.size()];
        for co in cells.cos() {
            uses[co.node() as usize] += 1;
        }
        for n in (0..cells.size() as Node).filter(|n| cells.is_gate(*n)) {
            for fanin in cells.fanins(n) {
                let f = fanin.node();
                assert!(
                    cells.is_constant(f) || cells.is_ci(f) || cells.cell(f).is_some(),
                    "cell {} reads node {} which is not driven",
                    n,
                    f
                );
                uses[f as usize] += 1;
            }
        }
        for n in (0..cells.size() as Node).filter(|n| cells.is_gate(*n)) {
            assert!(uses[n as usize] > 0, "cell {} drives nothing", n);
        }
    }

    #[test]
    fn nand_inverter_library_maps_random_networks() {
        let library = nand_inverter_library();
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..20 {
            let aig = random_aig(&mut rng, 8, 80, 4);
            let (cells, _) = match tech_map(&aig, &library, &TechMapParams::default()) {
                Ok(result) => result,
                Err(err) => panic!("mapping failed: {}", err),
            };
            assert!(equivalent(&aig, &cells));
            assert_no_dangling_cells(&cells);
            for n in (0..cells.size() as Node).filter(|n| cells.is_gate(*n)) {
                let name = &cells.cell(n).unwrap().name;
                assert!(name == "inv" || name == "nand2");
            }
        }
    }

    #[test]
    fn nand_inverter_library_with_small_cut_limits() {
        let library = nand_inverter_library();
        let mut rng = SmallRng::seed_from_u64(17);
        for cut_limit in [2, 4] {
            let mut params = TechMapParams::default();
            params.cut_enumeration.cut_limit = cut_limit;
            let aig = random_aig(&mut rng, 8, 80, 4);
            let (cells, _) = tech_map(&aig, &library, &params).unwrap();
            assert!(equivalent(&aig, &cells));
            assert_no_dangling_cells(&cells);
        }
    }

    #[test]
    fn composed_supergates_expand_into_cells() {
        let gates = parse_genlib(
            "GATE inv 1 O=!a; PIN * INV 1 999 1 0 1 0
             GATE nand2 2 O=!(a*b); PIN * INV 1 999 1 0 1 0",
        )
        .unwrap();
        // and3 = inv(nand2(inv(nand2(a, b)), c))
        let and3 = SupergateDefinition {
            num_vars: 3,
            instances: vec![
                GateInstance {
                    gate: 1,
                    fanins: vec![SupergateInput::Pin(0), SupergateInput::Pin(1)],
                },
                GateInstance {
                    gate: 0,
                    fanins: vec![SupergateInput::Instance(0)],
                },
                GateInstance {
                    gate: 1,
                    fanins: vec![SupergateInput::Instance(1), SupergateInput::Pin(2)],
                },
                GateInstance {
                    gate: 0,
                    fanins: vec![SupergateInput::Instance(2)],
                },
            ],
        };
        let library = TechLibrary::with_supergates(gates, &[and3], &TechLibraryParams::default()).unwrap();

        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let c = aig.create_pi();
        let g = aig.create_and(a, b);
        let h = aig.create_and(g, c);
        aig.create_po(h);

        let (cells, stats) = tech_map(&aig, &library, &TechMapParams::default()).unwrap();
        assert!(equivalent(&aig, &cells));
        assert_no_dangling_cells(&cells);
        assert_eq!(cells.cell_counts(), vec![2, 2]);
        assert!((cells.area() - stats.area).abs() < 1e-3);

        let mut rng = SmallRng::seed_from_u64(23);
        for _ in 0..5 {
            let aig = random_aig(&mut rng, 8, 60, 4);
            let (cells, _) = tech_map(&aig, &library, &TechMapParams::default()).unwrap();
            assert!(equivalent(&aig, &cells));
            assert_no_dangling_cells(&cells);
        }
    }

    #[test]
    fn random_networks() {
        let library = library(CELLS);
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..10 {
            let aig = random_aig(&mut rng, 8, 60, 4);
            let (cells, stats) = tech_map(&aig, &library, &TechMapParams::default()).unwrap();
            assert!(equivalent(&aig, &cells));
            assert_no_dangling_cells(&cells);
            assert!((cells.area() - stats.area).abs() < 1e-2);
            assert!(cells.delay() <= stats.delay + 1e-3);
            assert_eq!(stats.rounds.len(), 4);
        }
    }

    #[test]
    fn mapping_meets_required_times() {
        let library = library(CELLS);
        let params = TechMapParams::default();
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..10 {
            let aig = random_aig(&mut rng, 8, 60, 4);
            let mut mapper = TechMapper::new(&aig, &library, &params).unwrap();
            mapper.map_round(Round::Delay);
            mapper.compute_mapping(Round::Delay);
            let best_delay = mapper.delay;
            mapper.map_round(Round::AreaFlow);
            mapper.compute_mapping(Round::AreaFlow);
            mapper.map_round(Round::ExactArea);
            mapper.compute_mapping(Round::ExactArea);

            assert!(mapper.delay <= best_delay + EPS);
            for n in aig.gates() {
                let node = &mapper.nodes[n as usize];
                for p in 0..2 {
                    if node.map_refs[p] > 0 {
                        assert!(node.arrival[p] <= node.required[p] + EPS, "node {} phase {}", n, p);
                    }
                }
            }
        }
    }

    #[test]
    fn latches_survive_mapping() {
        let library = library(CELLS);
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let q = aig.create_ro(None);
        let g = aig.create_xor(a, q);
        aig.create_po(!g);
        let d = aig.create_and(!b, g);
        aig.create_ri(d);

        let (cells, _) = tech_map(&aig, &library, &TechMapParams::default()).unwrap();
        assert_eq!(cells.num_latches(), 1);
        assert!(equivalent(&aig, &cells));
    }

    #[test]
    fn unusable_libraries() {
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let g = aig.create_and(a, b);
        aig.create_po(g);

        let no_inverter = library("GATE nand2 2 O=!(a*b); PIN * INV 1 999 1 0 1 0");
        assert!(matches!(
            tech_map(&aig, &no_inverter, &TechMapParams::default()),
            Err(Error::InvalidParameter(_))
        ));

        let inverter_only = library("GATE inv 1 O=!a; PIN * INV 1 999 1 0 1 0");
        assert!(matches!(
            tech_map(&aig, &inverter_only, &TechMapParams::default()),
            Err(Error::Unmappable { node }) if node == g.node()
        ));

        let params = TechMapParams {
            cut_enumeration: CutEnumerationParams {
                cut_size: 7,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            tech_map(&aig, &inverter_only, &params),
            Err(Error::CutSizeTooLarge { requested: 7, max: 6 })
        ));
    }
}
