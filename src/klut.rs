//! k-input LUT networks
//!
//! Node 0 is the constant zero and node 1 the constant one. Signals of a LUT
//! network are never complemented; inversion takes a single-input LUT.

use crate::network::{Network, Node, Signal};
use crate::truth_table::TruthTable;

#[derive(Clone, Debug)]
struct LutNode {
    fanins: Vec<Signal>,
    function: Option<TruthTable>,
    fanout: u32,
}

#[derive(Clone, Debug)]
pub struct KLutNetwork {
    nodes: Vec<LutNode>,
    cis: Vec<Node>,
    cos: Vec<Signal>,
    num_pis: usize,
    num_pos: usize,
    latch_init: Vec<Option<bool>>,
    num_gates: usize,
}

impl Default for KLutNetwork {
    fn default() -> Self {
        KLutNetwork::new()
    }
}

impl KLutNetwork {
    pub fn new() -> KLutNetwork {
        let constant = LutNode {
            fanins: vec![],
            function: None,
            fanout: 0,
        };
        KLutNetwork {
            nodes: vec![constant.clone(), constant],
            cis: vec![],
            cos: vec![],
            num_pis: 0,
            num_pos: 0,
            latch_init: vec![],
            num_gates: 0,
        }
    }

    pub fn get_constant(&self, value: bool) -> Signal {
        Signal::new(value as Node, false)
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

    fn push_ci(&mut self) -> Signal {
        let n = self.nodes.len() as Node;
        self.nodes.push(LutNode {
            fanins: vec![],
            function: None,
            fanout: 0,
        });
        self.cis.push(n);
        Signal::new(n, false)
    }

    pub fn create_pi(&mut self) -> Signal {
        assert!(
            self.latch_init.is_empty(),
            "primary inputs must be created before register outputs"
        );
        self.num_pis += 1;
        self.push_ci()
    }

    pub fn create_ro(&mut self, init: Option<bool>) -> Signal {
        self.latch_init.push(init);
        self.push_ci()
    }

    pub fn create_po(&mut self, s: Signal) -> usize {
        assert!(
            self.cos.len() == self.num_pos,
            "primary outputs must be created before register inputs"
        );
        assert!(!s.is_complemented(), "LUT network signals cannot be complemented");

        self.nodes[s.node() as usize].fanout += 1;
        self.cos.push(s);
        self.num_pos += 1;
        self.num_pos - 1
    }

    pub fn create_ri(&mut self, s: Signal) {
        assert!(!s.is_complemented(), "LUT network signals cannot be complemented");
        self.nodes[s.node() as usize].fanout += 1;
        self.cos.push(s);
    }

    /// Creates a LUT computing `function` over `fanins`, fan-in `i` driving
    /// variable `i`.
    pub fn create_node(&mut self, fanins: &[Signal], function: TruthTable) -> Signal {
        assert_eq!(
            fanins.len() as u32,
            function.num_vars(),
            "LUT function arity does not match its fan-in count"
        );

        if fanins.is_empty() {
            return self.get_constant(function.is_const1());
        }

        let n = self.nodes.len() as Node;
        for fanin in fanins {
            assert!(!fanin.is_complemented(), "LUT network signals cannot be complemented");
            self.nodes[fanin.node() as usize].fanout += 1;
        }
        self.nodes.push(LutNode {
            fanins: fanins.to_vec(),
            function: Some(function),
            fanout: 0,
        });
        self.num_gates += 1;
        Signal::new(n, false)
    }

    pub fn create_not(&mut self, s: Signal) -> Signal {
        if s.node() <= 1 {
            return self.get_constant(s.node() == 0);
        }
        self.create_node(&[s], TruthTable::from_u64(1, 0x1))
    }

    /// Returns the function of a LUT node.
    pub fn node_function(&self, n: Node) -> Option<&TruthTable> {
        self.nodes[n as usize].function.as_ref()
    }

    /// Returns the largest LUT fan-in.
    pub fn max_fanin_size(&self) -> usize {
        self.nodes.iter().map(|n| n.fanins.len()).max().unwrap_or(0)
    }

    /// Returns the number of LUTs on the longest CI to CO path.
    pub fn depth(&self) -> u32 {
        let mut levels = vec![0u32; self.nodes.len()];
        // LUTs are always created after their fan-ins
        for (i, node) in self.nodes.iter().enumerate() {
            if node.function.is_some() {
                levels[i] = node
                    .fanins
                    .iter()
                    .map(|f| levels[f.node() as usize] + 1)
                    .max()
                    .unwrap_or(0);
            }
        }
        self.cos
            .iter()
            .map(|s| levels[s.node() as usize])
            .max()
            .unwrap_or(0)
    }
}

impl Network for KLutNetwork {
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
        n <= 1
    }

    fn is_ci(&self, n: Node) -> bool {
        n > 1 && self.nodes[n as usize].function.is_none()
    }

    fn is_dead(&self, _n: Node) -> bool {
        false
    }

    fn fanins(&self, n: Node) -> &[Signal] {
        &self.nodes[n as usize].fanins
    }

    fn fanout_size(&self, n: Node) -> u32 {
        self.nodes[n as usize].fanout
    }

    fn constant_value(&self, n: Node) -> bool {
        n == 1
    }

    fn compute(&self, n: Node, fanin_functions: &[TruthTable]) -> TruthTable {
        match &self.nodes[n as usize].function {
            Some(function) => compose(function, fanin_functions),
            None => panic!("node {} is not a LUT", n),
        }
    }
}

/// Evaluates `function` with variable `i` replaced by `inputs[i]`.
pub fn compose(function: &TruthTable, inputs: &[TruthTable]) -> TruthTable {
    assert_eq!(
        function.num_vars() as usize,
        inputs.len(),
        "composition needs one input function per variable"
    );

    let num_vars = inputs.first().map(|tt| tt.num_vars()).unwrap_or(0);
    let mut result = TruthTable::new(num_vars);
    for row in 0..result.num_bits() {
        let index = inputs
            .iter()
            .enumerate()
            .fold(0, |acc, (i, tt)| acc | ((tt.get_bit(row) as usize) << i));
        if function.get_bit(index) {
            result.set_bit(row, true);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_and_luts() {
        let mut klut = KLutNetwork::new();
        let a = klut.create_pi();
        let b = klut.create_pi();
        let xor = klut.create_node(&[a, b], TruthTable::from_u64(2, 0x6));
        let not = klut.create_not(xor);
        klut.create_po(not);

        assert!(klut.is_constant(0));
        assert!(klut.is_constant(1));
        assert!(klut.constant_value(1));
        assert!(klut.is_ci(a.node()));
        assert!(klut.is_gate(xor.node()));
        assert_eq!(klut.num_gates(), 2);
        assert_eq!(klut.fanout_size(xor.node()), 1);
        assert_eq!(klut.depth(), 2);
        assert_eq!(klut.max_fanin_size(), 2);
        assert_eq!(klut.create_not(klut.get_constant(false)), klut.get_constant(true));
    }

    #[test]
    fn compose_functions() {
        let a = TruthTable::nth_var(3, 0);
        let b = TruthTable::nth_var(3, 1);
        let c = TruthTable::nth_var(3, 2);
        let and = TruthTable::from_u64(2, 0x8);
        let or = TruthTable::from_u64(2, 0xe);

        let inner = compose(&or, &[a.clone(), b.clone()]);
        assert_eq!(compose(&and, &[inner, c.clone()]), (a | b) & c);
    }

    #[test]
    #[should_panic(expected = "LUT network signals cannot be complemented")]
    fn complemented_output() {
        let mut klut = KLutNetwork::new();
        let a = klut.create_pi();
        klut.create_po(!a);
    }
}
