//! Cut based LUT mapping
//!
//! The mapper selects one cut per node in a few rounds over the network in
//! topological order. The first round minimises arrival times, the
//! following ones recover area under the resulting required times, first
//! with area flow estimates and then with exact areas measured by
//! referencing and dereferencing cut cones. The selected cuts of the nodes
//! reachable from the COs become the LUTs of the result.

use crate::cut::{Cut, SortOrder, MAX_CUT_SIZE};
use crate::cut_enumeration::{CutEnumerationParams, NetworkCuts};
use crate::error::{Error, Result};
use crate::klut::KLutNetwork;
use crate::mapping::{blend_references, resolve_required, MappingStats, Round};
use crate::network::{Aig, Network, Node, Signal};
use crate::stopwatch::call_with_stopwatch;
use crate::topo::topological_order;
use log::{debug, info};
use std::cmp::Ordering;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq)]
pub struct LutMapParams {
    /// LUT size and number of cuts kept per node.
    pub cut_enumeration: CutEnumerationParams,
    /// Required depth of the COs; zero asks for the best depth.
    pub required_delay: u32,
    /// Start with an area oriented round.
    pub skip_delay_round: bool,
    pub area_flow_rounds: u32,
    pub ela_rounds: u32,
    pub verbose: bool,
}

impl Default for LutMapParams {
    fn default() -> Self {
        LutMapParams {
            cut_enumeration: CutEnumerationParams {
                cut_size: 6,
                cut_limit: 8,
                minimize_truth_table: true,
            },
            required_delay: 0,
            skip_delay_round: false,
            area_flow_rounds: 1,
            ela_rounds: 2,
            verbose: false,
        }
    }
}

impl LutMapParams {
    pub fn validate(&self) -> Result<()> {
        self.cut_enumeration.validate(MAX_CUT_SIZE as u32)?;
        if self.cut_enumeration.cut_size < 2 {
            return Err(Error::InvalidParameter(
                "LUT mapping needs a cut size of at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct NodeData {
    arrival: u32,
    required: u32,
    map_refs: u32,
    est_refs: f32,
    flow: f32,
    edge_flow: f32,
}

struct LutMapper<'a> {
    aig: &'a Aig,
    params: &'a LutMapParams,
    cuts: NetworkCuts,
    nodes: Vec<NodeData>,
    topo: Vec<Node>,
    target: Option<u32>,
    area: u32,
    edges: u32,
    delay: u32,
    round: u32,
    stats: MappingStats,
}

fn lut_area(cut: &Cut) -> u32 {
    (cut.size() > 0) as u32
}

/// Computes the arrival time and flows of `cut` of node `n` from the
/// current state of its leaves. The unit cut of a gate is left alone.
fn evaluate_cut(nodes: &[NodeData], n: Node, cut: &mut Cut) {
    if cut.is_trivial_of(n) {
        return;
    }

    let mut delay = 0;
    let mut area_flow = lut_area(cut) as f32;
    let mut edge_flow = cut.size() as f32;
    for leaf in cut.leaves() {
        let data = &nodes[*leaf as usize];
        let refs = data.est_refs.max(1.0);
        delay = delay.max(data.arrival);
        area_flow += data.flow / refs;
        edge_flow += data.edge_flow / refs;
    }

    cut.data.delay = if cut.size() > 0 { delay + 1 } else { 0 };
    cut.data.area_flow = area_flow;
    cut.data.edge_flow = edge_flow;
}

impl<'a> LutMapper<'a> {
    fn new(aig: &'a Aig, params: &'a LutMapParams) -> LutMapper<'a> {
        let nodes = (0..aig.size() as Node)
            .map(|n| NodeData {
                arrival: 0,
                required: u32::MAX,
                map_refs: 0,
                est_refs: aig.fanout_size(n) as f32,
                flow: 0.0,
                edge_flow: 0.0,
            })
            .collect();

        LutMapper {
            aig,
            params,
            cuts: NetworkCuts::new(params.cut_enumeration.clone(), SortOrder::Delay),
            nodes,
            topo: topological_order(aig),
            target: None,
            area: 0,
            edges: 0,
            delay: 0,
            round: 0,
            stats: MappingStats::default(),
        }
    }

    fn run(mut self) -> (KLutNetwork, MappingStats) {
        let start = Instant::now();

        let (order, first) = if self.params.skip_delay_round {
            (SortOrder::Area, Round::AreaFlow)
        } else {
            (SortOrder::Delay, Round::Delay)
        };
        let mut time_cuts = Duration::ZERO;
        call_with_stopwatch(&mut time_cuts, || self.compute_cuts(order));
        self.stats.time_cuts = time_cuts;
        self.compute_mapping(first);

        for _ in 0..self.params.area_flow_rounds {
            self.area_flow_round();
            self.compute_mapping(Round::AreaFlow);
        }
        for _ in 0..self.params.ela_rounds {
            self.exact_area_round();
            self.compute_mapping(Round::ExactArea);
        }
        self.stats.time_mapping = start.elapsed();

        let klut = self.derive();
        self.stats.time_total = start.elapsed();
        self.stats.area = self.area as f32;
        self.stats.delay = self.delay as f32;
        self.stats.nodes = klut.num_gates();
        self.stats.inverters = klut.num_gates() - self.area as usize;

        let summary = format!(
            "LUT mapping: {} LUTs, depth {}, {} edges",
            self.area, self.delay, self.edges
        );
        if self.params.verbose {
            info!("{}", summary);
        } else {
            debug!("{}", summary);
        }
        (klut, self.stats)
    }

    /// Enumerates cuts and selects the best cut of every node under
    /// `order` in the same sweep.
    fn compute_cuts(&mut self, order: SortOrder) {
        self.cuts = NetworkCuts::new(self.params.cut_enumeration.clone(), order);
        for i in 0..self.topo.len() {
            let n = self.topo[i];
            let nodes = &self.nodes;
            self.cuts
                .compute_node(self.aig, n, |cut| evaluate_cut(nodes, n, cut));
            if self.aig.is_gate(n) {
                self.set_best(n, 0);
            }
        }
    }

    fn set_best(&mut self, n: Node, i: usize) {
        let set = self.cuts.cuts_mut(n);
        set.update_best(i);
        let data = set.best().data;
        let node = &mut self.nodes[n as usize];
        node.arrival = data.delay;
        node.flow = data.area_flow;
        node.edge_flow = data.edge_flow;
    }

    fn area_flow_round(&mut self) {
        for node in self.nodes.iter_mut() {
            node.est_refs = blend_references(node.est_refs, node.map_refs, self.round);
        }

        for i in 0..self.topo.len() {
            let n = self.topo[i];
            if !self.aig.is_gate(n) {
                continue;
            }

            let required = self.nodes[n as usize].required;
            let set = self.cuts.cuts_mut(n);
            let mut best: Option<usize> = None;
            for c in 0..set.len() {
                evaluate_cut(&self.nodes, n, set.get_mut(c));
                let cut = set.get(c);
                if cut.is_trivial_of(n) || cut.data.delay > required {
                    continue;
                }
                if best.map_or(true, |b| cut.compare(set.get(b), SortOrder::Area) == Ordering::Less) {
                    best = Some(c);
                }
            }

            let best = best.unwrap_or_else(|| self.fastest_cut(n));
            self.set_best(n, best);
        }
        self.round += 1;
    }

    fn fastest_cut(&self, n: Node) -> usize {
        let set = self.cuts.cuts(n);
        let mut best = 0;
        for c in 1..set.len() {
            let cut = set.get(c);
            if !cut.is_trivial_of(n) && cut.compare(set.get(best), SortOrder::Delay) == Ordering::Less {
                best = c;
            }
        }
        best
    }

    fn exact_area_round(&mut self) {
        for i in 0..self.topo.len() {
            let n = self.topo[i];
            if !self.aig.is_gate(n) {
                continue;
            }

            let mapped = self.nodes[n as usize].map_refs > 0;
            if mapped {
                let leaves = self.cuts.cuts(n).best().leaves().to_vec();
                self.dereference(&leaves);
            }

            let required = self.nodes[n as usize].required;
            let mut best: Option<(usize, u32)> = None;
            for c in 0..self.cuts.cuts(n).len() {
                evaluate_cut(&self.nodes, n, self.cuts.cuts_mut(n).get_mut(c));
                let cut = self.cuts.cuts(n).get(c).clone();
                if cut.is_trivial_of(n) || cut.data.delay > required {
                    continue;
                }

                let area = lut_area(&cut) + self.reference(cut.leaves());
                self.dereference(cut.leaves());

                let better = match best {
                    None => true,
                    Some((b, best_area)) => {
                        let other = self.cuts.cuts(n).get(b);
                        area.cmp(&best_area)
                            .then(cut.data.delay.cmp(&other.data.delay))
                            .then(cut.size().cmp(&other.size()))
                            == Ordering::Less
                    }
                };
                if better {
                    best = Some((c, area));
                }
            }

            let best = best.map_or_else(|| self.fastest_cut(n), |(c, _)| c);
            self.set_best(n, best);

            if mapped {
                let leaves = self.cuts.cuts(n).best().leaves().to_vec();
                self.reference(&leaves);
            }
        }
    }

    /// References the leaves of a cut and, recursively, the best cuts of
    /// leaves which were unused. Returns the area of the LUTs which became
    /// used.
    fn reference(&mut self, leaves: &[Node]) -> u32 {
        let mut area = 0;
        let mut stack = leaves.to_vec();
        while let Some(leaf) = stack.pop() {
            if !self.aig.is_gate(leaf) {
                continue;
            }
            let node = &mut self.nodes[leaf as usize];
            node.map_refs += 1;
            if node.map_refs == 1 {
                let best = self.cuts.cuts(leaf).best();
                area += lut_area(best);
                stack.extend_from_slice(best.leaves());
            }
        }
        area
    }

    fn dereference(&mut self, leaves: &[Node]) -> u32 {
        let mut area = 0;
        let mut stack = leaves.to_vec();
        while let Some(leaf) = stack.pop() {
            if !self.aig.is_gate(leaf) {
                continue;
            }
            let node = &mut self.nodes[leaf as usize];
            assert!(node.map_refs > 0, "mapping reference of node {} underflowed", leaf);
            node.map_refs -= 1;
            if node.map_refs == 0 {
                let best = self.cuts.cuts(leaf).best();
                area += lut_area(best);
                stack.extend_from_slice(best.leaves());
            }
        }
        area
    }

    /// Recomputes the references, area and delay of the current selection,
    /// then the required times.
    fn compute_mapping(&mut self, round: Round) {
        for node in self.nodes.iter_mut() {
            node.map_refs = 0;
            node.required = u32::MAX;
        }
        for co in self.aig.cos() {
            self.nodes[co.node() as usize].map_refs += 1;
        }

        self.area = 0;
        self.edges = 0;
        for i in (0..self.topo.len()).rev() {
            let n = self.topo[i];
            if !self.aig.is_gate(n) || self.nodes[n as usize].map_refs == 0 {
                continue;
            }
            let best = self.cuts.cuts(n).best();
            self.area += lut_area(best);
            self.edges += best.size() as u32;
            for leaf in best.leaves() {
                self.nodes[*leaf as usize].map_refs += 1;
            }
        }

        self.delay = self
            .aig
            .cos()
            .iter()
            .map(|co| self.nodes[co.node() as usize].arrival)
            .max()
            .unwrap_or(0);
        let target = *self.target.get_or_insert_with(|| {
            resolve_required(self.params.required_delay as f32, self.delay as f32) as u32
        });

        for co in self.aig.cos() {
            let node = &mut self.nodes[co.node() as usize];
            node.required = node.required.min(target);
        }
        for i in (0..self.topo.len()).rev() {
            let n = self.topo[i];
            if !self.aig.is_gate(n) || self.nodes[n as usize].map_refs == 0 {
                continue;
            }
            let required = self.nodes[n as usize].required.saturating_sub(1);
            for leaf in self.cuts.cuts(n).best().leaves() {
                let node = &mut self.nodes[*leaf as usize];
                node.required = node.required.min(required);
            }
        }

        debug!(
            "{} round: {} LUTs, depth {}",
            round, self.area, self.delay
        );
        self.stats.record(round, self.area as f32, self.delay as f32);
    }

    fn derive(&self) -> KLutNetwork {
        let aig = self.aig;
        let mut klut = KLutNetwork::new();
        let mut signals: Vec<Option<Signal>> = vec![None; aig.size()];
        signals[0] = Some(klut.get_constant(false));

        for (i, ci) in aig.cis().iter().enumerate() {
            let s = if i < aig.num_pis() {
                klut.create_pi()
            } else {
                klut.create_ro(aig.latch_init(i - aig.num_pis()))
            };
            signals[*ci as usize] = Some(s);
        }

        let signal = |signals: &[Option<Signal>], n: Node| match signals[n as usize] {
            Some(s) => s,
            None => panic!("node {} is used before it is mapped", n),
        };

        for n in self.topo.iter().copied() {
            if !aig.is_gate(n) || self.nodes[n as usize].map_refs == 0 {
                continue;
            }
            let best = self.cuts.cuts(n).best();
            let fanins = best
                .leaves()
                .iter()
                .map(|l| signal(&signals, *l))
                .collect::<Vec<_>>();
            let s = klut.create_node(&fanins, self.cuts.truth_table(best));
            signals[n as usize] = Some(s);
        }

        let mut inverters: Vec<Option<Signal>> = vec![None; aig.size()];
        for (i, co) in aig.cos().iter().enumerate() {
            let mut s = signal(&signals, co.node());
            if co.is_complemented() {
                s = match inverters[co.node() as usize] {
                    Some(inverted) => inverted,
                    None => {
                        let inverted = klut.create_not(s);
                        inverters[co.node() as usize] = Some(inverted);
                        inverted
                    }
                };
            }
            if i < aig.num_pos() {
                klut.create_po(s);
            } else {
                klut.create_ri(s);
            }
        }

        klut
    }
}

/// Maps `aig` into LUTs of at most `cut_size` inputs.
pub fn lut_map(aig: &Aig, params: &LutMapParams) -> Result<(KLutNetwork, MappingStats)> {
    params.validate()?;
    Ok(LutMapper::new(aig, params).run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::equivalent;
    use crate::test_utils::random_aig;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn params(cut_size: u32) -> LutMapParams {
        LutMapParams {
            cut_enumeration: CutEnumerationParams {
                cut_size,
                cut_limit: 8,
                minimize_truth_table: true,
            },
            ..Default::default()
        }
    }

    #[test]
    fn and_chain_fits_one_lut() {
        let mut aig = Aig::new();
        let pis = (0..4).map(|_| aig.create_pi()).collect::<Vec<_>>();
        let g0 = aig.create_and(pis[0], pis[1]);
        let g1 = aig.create_and(g0, pis[2]);
        let g2 = aig.create_and(g1, pis[3]);
        aig.create_po(g2);

        let (klut, stats) = lut_map(&aig, &params(4)).unwrap();
        assert_eq!(klut.num_gates(), 1);
        assert_eq!(klut.depth(), 1);
        assert_eq!(stats.area, 1.0);
        assert!(equivalent(&aig, &klut));
    }

    #[test]
    fn random_networks() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..10 {
            let aig = random_aig(&mut rng, 8, 60, 4);
            let (klut, stats) = lut_map(&aig, &params(4)).unwrap();
            assert!(equivalent(&aig, &klut));
            assert!(klut.max_fanin_size() <= 4);
            assert!(klut.depth() <= stats.delay as u32 + 1);
            assert_eq!(stats.rounds.len(), 4);
        }
    }

    #[test]
    fn mapping_is_feasible_and_meets_required_times() {
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..10 {
            let aig = random_aig(&mut rng, 8, 60, 4);
            let params = params(5);
            let mut mapper = LutMapper::new(&aig, &params);
            mapper.compute_cuts(SortOrder::Delay);
            mapper.compute_mapping(Round::Delay);
            let best_delay = mapper.delay;
            mapper.area_flow_round();
            mapper.compute_mapping(Round::AreaFlow);
            mapper.exact_area_round();
            mapper.compute_mapping(Round::ExactArea);

            assert_eq!(mapper.delay, best_delay);
            for n in aig.gates() {
                let data = &mapper.nodes[n as usize];
                if data.map_refs == 0 {
                    continue;
                }
                assert!(data.arrival <= data.required, "node {}", n);
                for leaf in mapper.cuts.cuts(n).best().leaves() {
                    assert!(aig.is_ci(*leaf) || mapper.nodes[*leaf as usize].map_refs > 0);
                }
            }
        }
    }

    #[test]
    fn relaxed_required_delay() {
        let mut rng = SmallRng::seed_from_u64(11);
        let aig = random_aig(&mut rng, 8, 80, 4);
        let (_, fast) = lut_map(&aig, &params(4)).unwrap();
        let relaxed = LutMapParams {
            required_delay: fast.delay as u32 + 2,
            ..params(4)
        };
        let (klut, stats) = lut_map(&aig, &relaxed).unwrap();
        assert!(stats.delay <= fast.delay + 2.0);
        assert!(equivalent(&aig, &klut));
    }

    #[test]
    fn latches_and_complemented_outputs() {
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let g = aig.create_and(a, b);
        aig.create_po(!g);
        aig.create_po(!a);
        let q = aig.create_ro(Some(true));
        let d = aig.create_and(g, !q);
        aig.create_ri(!d);

        let (klut, _) = lut_map(&aig, &params(4)).unwrap();
        assert_eq!(klut.num_pis(), 2);
        assert_eq!(klut.num_latches(), 1);
        assert_eq!(klut.latch_init(0), Some(true));
        assert!(equivalent(&aig, &klut));
    }

    #[test]
    fn invalid_parameters() {
        let aig = Aig::new();
        assert!(matches!(
            lut_map(&aig, &params(9)),
            Err(Error::CutSizeTooLarge { requested: 9, max: 8 })
        ));
        assert!(matches!(lut_map(&aig, &params(1)), Err(Error::InvalidParameter(_))));
    }
}
