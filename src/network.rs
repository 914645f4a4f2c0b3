//! Logic networks
//!
//! The algorithms in this crate only need the small set of capabilities
//! captured by [`Network`]. The And-Inverter Graph [`Aig`] is the network
//! every optimisation engine works on; mapped results are produced as
//! [`crate::klut::KLutNetwork`] or [`crate::cell_network::CellNetwork`].

use crate::truth_table::TruthTable;
use hashbrown::HashMap;
use std::fmt;
use std::ops::{BitXor, Not};

/// Index of a node in a network.
pub type Node = u32;

/// A reference to a node output, possibly complemented.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Signal(u32);

impl Signal {
    pub fn new(node: Node, complemented: bool) -> Signal {
        Signal((node << 1) | complemented as u32)
    }

    pub fn node(self) -> Node {
        self.0 >> 1
    }

    pub fn is_complemented(self) -> bool {
        self.0 & 1 == 1
    }

    /// Complements the signal if `complement` is set.
    pub fn not_if(self, complement: bool) -> Signal {
        Signal(self.0 ^ complement as u32)
    }

    /// Returns the non-complemented signal of the same node.
    pub fn regular(self) -> Signal {
        Signal(self.0 & !1)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl Not for Signal {
    type Output = Signal;

    fn not(self) -> Signal {
        Signal(self.0 ^ 1)
    }
}

impl BitXor<bool> for Signal {
    type Output = Signal;

    fn bitxor(self, complement: bool) -> Signal {
        self.not_if(complement)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_complemented() {
            write!(f, "!{}", self.node())
        } else {
            write!(f, "{}", self.node())
        }
    }
}

/// The capabilities the cut, rewriting and mapping algorithms rely on.
///
/// Node indices range over `0..size()`; index 0 is always the constant-zero
/// node. Nodes may be dead (removed by a substitution) in which case they
/// have no fan-out and must be skipped.
pub trait Network {
    /// Returns the number of node slots, dead nodes included.
    fn size(&self) -> usize;

    /// Returns the number of live gates (neither constant nor CI).
    fn num_gates(&self) -> usize;

    /// Returns the combinational inputs: primary inputs followed by register
    /// outputs.
    fn cis(&self) -> &[Node];

    /// Returns the combinational outputs: primary outputs followed by
    /// register inputs.
    fn cos(&self) -> &[Signal];

    fn is_constant(&self, n: Node) -> bool;

    fn is_ci(&self, n: Node) -> bool;

    fn is_dead(&self, n: Node) -> bool;

    /// Returns the ordered fan-ins of a gate, or an empty slice for
    /// constants and CIs.
    fn fanins(&self, n: Node) -> &[Signal];

    /// Returns the number of references to the node (gate fan-ins and COs).
    fn fanout_size(&self, n: Node) -> u32;

    /// Returns the output value of a constant node.
    fn constant_value(&self, n: Node) -> bool;

    /// Computes the function of gate `n` given the (non-complemented)
    /// functions of its fan-in nodes, in fan-in order.
    fn compute(&self, n: Node, fanin_functions: &[TruthTable]) -> TruthTable;

    fn is_gate(&self, n: Node) -> bool {
        !self.is_constant(n) && !self.is_ci(n) && !self.is_dead(n)
    }

    fn num_cis(&self) -> usize {
        self.cis().len()
    }

    fn num_cos(&self) -> usize {
        self.cos().len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AigNodeKind {
    Constant,
    Ci,
    And,
}

#[derive(Clone, Debug)]
struct AigNode {
    kind: AigNodeKind,
    fanins: [Signal; 2],
    fanout: u32,
    fanouts: Vec<Node>,
    dead: bool,
}

impl AigNode {
    fn new(kind: AigNodeKind, fanins: [Signal; 2]) -> AigNode {
        AigNode {
            kind,
            fanins,
            fanout: 0,
            fanouts: vec![],
            dead: false,
        }
    }
}

/// An And-Inverter Graph with structural hashing.
///
/// Primary inputs must be created before register outputs, and primary
/// outputs before register inputs, so that the CI and CO lists keep the
/// primary interface first.
#[derive(Clone, Debug)]
pub struct Aig {
    nodes: Vec<AigNode>,
    cis: Vec<Node>,
    cos: Vec<Signal>,
    num_pis: usize,
    num_pos: usize,
    latch_init: Vec<Option<bool>>,
    strash: HashMap<(Signal, Signal), Node>,
    num_gates: usize,
}

impl Default for Aig {
    fn default() -> Self {
        Aig::new()
    }
}

impl Aig {
    pub fn new() -> Aig {
        Aig {
            nodes: vec![AigNode::new(AigNodeKind::Constant, [Signal::default(); 2])],
            cis: vec![],
            cos: vec![],
            num_pis: 0,
            num_pos: 0,
            latch_init: vec![],
            strash: HashMap::new(),
            num_gates: 0,
        }
    }

    pub fn get_constant(&self, value: bool) -> Signal {
        Signal::new(0, value)
    }

    pub fn num_pis(&self) -> usize {
        self.num_pis
    }

    pub fn num_pos(&self) -> usize {
        self.num_pos
    }

    pub fn num_latches(&self) -> usize {
        self.latch_init.len()
    }

    pub fn latch_init(&self, index: usize) -> Option<bool> {
        self.latch_init[index]
    }

    pub fn is_and(&self, n: Node) -> bool {
        let node = &self.nodes[n as usize];
        node.kind == AigNodeKind::And && !node.dead
    }

    /// Returns the index of a CI node in the CI list.
    pub fn ci_index(&self, n: Node) -> Option<usize> {
        self.cis.iter().position(|ci| *ci == n)
    }

    fn push_node(&mut self, kind: AigNodeKind, fanins: [Signal; 2]) -> Node {
        let n = self.nodes.len() as Node;
        self.nodes.push(AigNode::new(kind, fanins));
        n
    }

    pub fn create_pi(&mut self) -> Signal {
        assert!(
            self.latch_init.is_empty(),
            "primary inputs must be created before register outputs"
        );

        let n = self.push_node(AigNodeKind::Ci, [Signal::default(); 2]);
        self.cis.push(n);
        self.num_pis += 1;
        Signal::new(n, false)
    }

    pub fn create_po(&mut self, s: Signal) -> usize {
        assert!(
            self.cos.len() == self.num_pos,
            "primary outputs must be created before register inputs"
        );

        self.reference(s.node());
        self.cos.push(s);
        self.num_pos += 1;
        self.num_pos - 1
    }

    /// Creates a register output, which acts as a CI of the combinational
    /// part.
    pub fn create_ro(&mut self, init: Option<bool>) -> Signal {
        let n = self.push_node(AigNodeKind::Ci, [Signal::default(); 2]);
        self.cis.push(n);
        self.latch_init.push(init);
        Signal::new(n, false)
    }

    /// Creates a register input, which acts as a CO of the combinational
    /// part. Register inputs are matched to register outputs by order.
    pub fn create_ri(&mut self, s: Signal) {
        assert!(
            self.cos.len() - self.num_pos < self.latch_init.len(),
            "register input created without a matching register output"
        );

        self.reference(s.node());
        self.cos.push(s);
    }

    fn reference(&mut self, n: Node) {
        self.nodes[n as usize].fanout += 1;
    }

    fn normalize(a: Signal, b: Signal) -> (Signal, Signal) {
        if a > b {
            (b, a)
        } else {
            (a, b)
        }
    }

    /// Resolves trivial AND cases without touching the network.
    fn simplify_and(a: Signal, b: Signal) -> Option<Signal> {
        let (a, b) = Aig::normalize(a, b);
        if a.node() == b.node() {
            Some(if a == b { a } else { Signal::new(0, false) })
        } else if a == Signal::new(0, false) {
            Some(a)
        } else if a == Signal::new(0, true) {
            Some(b)
        } else {
            None
        }
    }

    /// Returns the signal computing `a & b` if it can be obtained without
    /// creating a node.
    pub fn has_and(&self, a: Signal, b: Signal) -> Option<Signal> {
        if let Some(s) = Aig::simplify_and(a, b) {
            return Some(s);
        }

        self.strash
            .get(&Aig::normalize(a, b))
            .map(|n| Signal::new(*n, false))
    }

    pub fn create_and(&mut self, a: Signal, b: Signal) -> Signal {
        if let Some(s) = self.has_and(a, b) {
            return s;
        }

        self.create_and_raw(a, b)
    }

    /// Creates an AND node without trivial simplification or hash lookup.
    /// Used to build structurally redundant networks, e.g. when reading a
    /// netlist verbatim.
    pub fn create_and_raw(&mut self, a: Signal, b: Signal) -> Signal {
        let (a, b) = Aig::normalize(a, b);
        let n = self.push_node(AigNodeKind::And, [a, b]);
        for fanin in [a, b] {
            let child = &mut self.nodes[fanin.node() as usize];
            child.fanout += 1;
            child.fanouts.push(n);
        }
        self.strash.entry((a, b)).or_insert(n);
        self.num_gates += 1;
        Signal::new(n, false)
    }

    pub fn create_nand(&mut self, a: Signal, b: Signal) -> Signal {
        !self.create_and(a, b)
    }

    pub fn create_or(&mut self, a: Signal, b: Signal) -> Signal {
        !self.create_and(!a, !b)
    }

    pub fn create_nor(&mut self, a: Signal, b: Signal) -> Signal {
        self.create_and(!a, !b)
    }

    pub fn create_xor(&mut self, a: Signal, b: Signal) -> Signal {
        let t0 = self.create_and(a, !b);
        let t1 = self.create_and(!a, b);
        self.create_or(t0, t1)
    }

    pub fn create_mux(&mut self, cond: Signal, then: Signal, otherwise: Signal) -> Signal {
        let t0 = self.create_and(cond, then);
        let t1 = self.create_and(!cond, otherwise);
        self.create_or(t0, t1)
    }

    pub fn create_nary_and(&mut self, signals: &[Signal]) -> Signal {
        match signals {
            [] => self.get_constant(true),
            [s] => *s,
            _ => {
                let (left, right) = signals.split_at(signals.len() / 2);
                let left = self.create_nary_and(left);
                let right = self.create_nary_and(right);
                self.create_and(left, right)
            }
        }
    }

    pub fn create_nary_or(&mut self, signals: &[Signal]) -> Signal {
        let inverted = signals.iter().map(|s| !*s).collect::<Vec<_>>();
        !self.create_nary_and(&inverted)
    }

    pub fn incr_fanout_size(&mut self, n: Node) -> u32 {
        let node = &mut self.nodes[n as usize];
        node.fanout += 1;
        node.fanout
    }

    pub fn decr_fanout_size(&mut self, n: Node) -> u32 {
        let node = &mut self.nodes[n as usize];
        assert!(node.fanout > 0, "fan-out count of node {} underflowed", n);
        node.fanout -= 1;
        node.fanout
    }

    /// Returns the gates driven by `n`. A gate appears once per fan-in it
    /// takes from `n`.
    pub fn fanouts(&self, n: Node) -> &[Node] {
        &self.nodes[n as usize].fanouts
    }

    /// Iterates over the live AND gates in index order.
    pub fn gates(&self) -> impl Iterator<Item = Node> + '_ {
        (0..self.nodes.len() as Node).filter(move |n| self.is_and(*n))
    }

    /// Replaces every reference to `old` by `new`, propagating structural
    /// hashing through the fan-out, and removes whatever logic becomes
    /// unreferenced. Returns the live gates whose fan-ins were rewired.
    pub fn substitute_node(&mut self, old: Node, new: Signal) -> Vec<Node> {
        let mut worklist = vec![(old, new)];
        let mut modified = vec![];

        while let Some((old, new)) = worklist.pop() {
            if self.nodes[old as usize].dead || new.node() == old {
                continue;
            }

            let mut parents = std::mem::take(&mut self.nodes[old as usize].fanouts);
            parents.sort_unstable();
            parents.dedup();
            for parent in parents {
                if self.nodes[parent as usize].dead {
                    continue;
                }
                modified.push(parent);
                if let Some(replacement) = self.replace_in_node(parent, old, new) {
                    worklist.push((parent, replacement));
                }
            }

            for i in 0..self.cos.len() {
                let co = self.cos[i];
                if co.node() == old {
                    self.cos[i] = new.not_if(co.is_complemented());
                    self.nodes[old as usize].fanout -= 1;
                    self.nodes[new.node() as usize].fanout += 1;
                }
            }

            if self.nodes[old as usize].fanout == 0 {
                self.take_out_node(old);
            }
        }

        modified.retain(|n| !self.nodes[*n as usize].dead);
        modified.sort_unstable();
        modified.dedup();
        modified
    }

    /// Rewires the fan-ins of `parent` from `old` to `new`. Returns a
    /// replacement signal if `parent` became trivial or structurally equal
    /// to an existing node.
    fn replace_in_node(&mut self, parent: Node, old: Node, new: Signal) -> Option<Signal> {
        let [f0, f1] = self.nodes[parent as usize].fanins;
        if self.strash.get(&(f0, f1)) == Some(&parent) {
            self.strash.remove(&(f0, f1));
        }

        let mut fanins = [f0, f1];
        for fanin in fanins.iter_mut() {
            if fanin.node() == old {
                *fanin = new.not_if(fanin.is_complemented());
                self.nodes[old as usize].fanout -= 1;
                let child = &mut self.nodes[new.node() as usize];
                child.fanout += 1;
                child.fanouts.push(parent);
            }
        }

        let (g0, g1) = Aig::normalize(fanins[0], fanins[1]);
        self.nodes[parent as usize].fanins = [g0, g1];

        if let Some(s) = Aig::simplify_and(g0, g1) {
            return Some(s);
        }

        match self.strash.get(&(g0, g1)) {
            Some(&existing) if existing != parent && !self.nodes[existing as usize].dead => {
                Some(Signal::new(existing, false))
            }
            _ => {
                self.strash.insert((g0, g1), parent);
                None
            }
        }
    }

    /// Removes a gate without fan-out, and recursively every fan-in gate
    /// left without fan-out.
    pub fn take_out_node(&mut self, n: Node) {
        let mut stack = vec![n];

        while let Some(n) = stack.pop() {
            let node = &self.nodes[n as usize];
            if node.kind != AigNodeKind::And || node.dead || node.fanout > 0 {
                continue;
            }

            let [f0, f1] = node.fanins;
            self.nodes[n as usize].dead = true;
            self.num_gates -= 1;
            if self.strash.get(&(f0, f1)) == Some(&n) {
                self.strash.remove(&(f0, f1));
            }

            for fanin in [f0, f1] {
                let child = &mut self.nodes[fanin.node() as usize];
                child.fanout -= 1;
                if let Some(position) = child.fanouts.iter().position(|p| *p == n) {
                    child.fanouts.swap_remove(position);
                }
                if child.fanout == 0 {
                    stack.push(fanin.node());
                }
            }
        }
    }

    /// Removes `s` and its dangling fan-in cone if nothing references it.
    pub fn remove_dangling(&mut self, s: Signal) {
        if self.nodes[s.node() as usize].fanout == 0 {
            self.take_out_node(s.node());
        }
    }

    /// Returns a compacted copy of the network: dead and dangling nodes are
    /// dropped and the remaining gates are renumbered in topological order.
    pub fn cleanup(&self) -> Aig {
        let mut result = Aig::new();
        let mut map: HashMap<Node, Signal> = HashMap::new();
        map.insert(0, result.get_constant(false));

        for (i, ci) in self.cis.iter().enumerate() {
            let s = if i < self.num_pis {
                result.create_pi()
            } else {
                result.create_ro(self.latch_init[i - self.num_pis])
            };
            map.insert(*ci, s);
        }

        let mut reachable = vec![false; self.nodes.len()];
        let mut stack = self.cos.iter().map(|s| s.node()).collect::<Vec<_>>();
        while let Some(n) = stack.pop() {
            if !reachable[n as usize] {
                reachable[n as usize] = true;
                stack.extend(self.fanins(n).iter().map(|f| f.node()));
            }
        }

        for n in crate::topo::topological_order(self) {
            if !self.is_and(n) || !reachable[n as usize] {
                continue;
            }
            let [f0, f1] = self.nodes[n as usize].fanins;
            let a = map[&f0.node()].not_if(f0.is_complemented());
            let b = map[&f1.node()].not_if(f1.is_complemented());
            let s = result.create_and(a, b);
            map.insert(n, s);
        }

        for (i, co) in self.cos.iter().enumerate() {
            let s = map[&co.node()].not_if(co.is_complemented());
            if i < self.num_pos {
                result.create_po(s);
            } else {
                result.create_ri(s);
            }
        }

        result
    }
}

impl Network for Aig {
    fn size(&self) -> usize {
        self.nodes.len()
    }

    fn num_gates(&self) -> usize {
        self.num_gates
    }

    fn cis(&self) -> &[Node] {
        &self.cis
    }

    fn cos(&self) -> &[Signal] {
        &self.cos
    }

    fn is_constant(&self, n: Node) -> bool {
        self.nodes[n as usize].kind == AigNodeKind::Constant
    }

    fn is_ci(&self, n: Node) -> bool {
        self.nodes[n as usize].kind == AigNodeKind::Ci
    }

    fn is_dead(&self, n: Node) -> bool {
        self.nodes[n as usize].dead
    }

    fn fanins(&self, n: Node) -> &[Signal] {
        let node = &self.nodes[n as usize];
        match node.kind {
            AigNodeKind::And => &node.fanins,
            _ => &[],
        }
    }

    fn fanout_size(&self, n: Node) -> u32 {
        self.nodes[n as usize].fanout
    }

    fn constant_value(&self, _n: Node) -> bool {
        false
    }

    fn compute(&self, n: Node, fanin_functions: &[TruthTable]) -> TruthTable {
        let [f0, f1] = self.nodes[n as usize].fanins;
        let a = if f0.is_complemented() { !&fanin_functions[0] } else { fanin_functions[0].clone() };
        let b = if f1.is_complemented() { !&fanin_functions[1] } else { fanin_functions[1].clone() };
        a & b
    }
}

/// Per-node scratch state owned by an algorithm: a generic counter and a
/// generation-stamped mark.
///
/// Marking compares against the current traversal id, so starting a new
/// sweep with [`Workspace::incr_trav_id`] clears every mark in O(1).
#[derive(Clone, Debug, Default)]
pub struct Workspace {
    marks: Vec<u32>,
    values: Vec<u32>,
    trav_id: u32,
}

impl Workspace {
    pub fn new() -> Workspace {
        Workspace {
            marks: vec![],
            values: vec![],
            trav_id: 1,
        }
    }

    pub fn trav_id(&self) -> u32 {
        self.trav_id
    }

    pub fn incr_trav_id(&mut self) -> u32 {
        self.trav_id += 1;
        self.trav_id
    }

    pub fn visited(&self, n: Node) -> u32 {
        self.marks.get(n as usize).copied().unwrap_or(0)
    }

    pub fn set_visited(&mut self, n: Node, id: u32) {
        let n = n as usize;
        if n >= self.marks.len() {
            self.marks.resize(n + 1, 0);
        }
        self.marks[n] = id;
    }

    pub fn is_marked(&self, n: Node) -> bool {
        self.visited(n) == self.trav_id
    }

    pub fn mark(&mut self, n: Node) {
        let id = self.trav_id;
        self.set_visited(n, id);
    }

    pub fn value(&self, n: Node) -> u32 {
        self.values.get(n as usize).copied().unwrap_or(0)
    }

    pub fn set_value(&mut self, n: Node, value: u32) {
        let n = n as usize;
        if n >= self.values.len() {
            self.values.resize(n + 1, 0);
        }
        self.values[n] = value;
    }

    pub fn incr_value(&mut self, n: Node) -> u32 {
        let value = self.value(n) + 1;
        self.set_value(n, value);
        value
    }

    pub fn decr_value(&mut self, n: Node) -> u32 {
        let value = self.value(n);
        assert!(value > 0, "value of node {} underflowed", n);
        self.set_value(n, value - 1);
        value - 1
    }

    pub fn clear_values(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0);
    }
}
