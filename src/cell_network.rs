//! Mapped standard-cell netlists
//!
//! Like a LUT network, node 0 is the constant zero and node 1 the constant
//! one, and signals are never complemented: inversions are explicit
//! inverter cells.

use crate::klut::compose;
use crate::library::Gate;
use crate::network::{Network, Node, Signal};
use crate::truth_table::TruthTable;

#[derive(Clone, Debug)]
struct CellNode {
    fanins: Vec<Signal>,
    gate: Option<u32>,
    fanout: u32,
}

#[derive(Clone, Debug)]
pub struct CellNetwork {
    gates: Vec<Gate>,
    nodes: Vec<CellNode>,
    cis: Vec<Node>,
    cos: Vec<Signal>,
    num_pis: usize,
    num_pos: usize,
    latch_init: Vec<Option<bool>>,
    num_cells: usize,
}

impl CellNetwork {
    /// Creates an empty netlist over the cells `gates`, indexed by gate id.
    pub fn new(gates: &[Gate]) -> CellNetwork {
        let constant = CellNode {
            fanins: vec![],
            gate: None,
            fanout: 0,
        };
        CellNetwork {
            gates: gates.to_vec(),
            nodes: vec![constant.clone(), constant],
            cis: vec![],
            cos: vec![],
            num_pis: 0,
            num_pos: 0,
            latch_init: vec![],
            num_cells: 0,
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
        self.nodes.push(CellNode {
            fanins: vec![],
            gate: None,
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
        assert!(!s.is_complemented(), "cell network signals cannot be complemented");
        self.nodes[s.node() as usize].fanout += 1;
        self.cos.push(s);
        self.num_pos += 1;
        self.num_pos - 1
    }

    pub fn create_ri(&mut self, s: Signal) {
        assert!(
            self.cos.len() - self.num_pos < self.latch_init.len(),
            "register input created without a matching register output"
        );
        assert!(!s.is_complemented(), "cell network signals cannot be complemented");
        self.nodes[s.node() as usize].fanout += 1;
        self.cos.push(s);
    }

    /// Instantiates gate `gate` with fan-in `i` connected to pin `i`.
    pub fn create_cell(&mut self, gate: u32, fanins: &[Signal]) -> Signal {
        let num_pins = self.gates[gate as usize].pins.len();
        assert!(num_pins > 0, "gate {} has no pins", self.gates[gate as usize].name);
        assert_eq!(
            fanins.len(),
            num_pins,
            "gate {} has {} pins but got {} fan-ins",
            self.gates[gate as usize].name,
            num_pins,
            fanins.len()
        );

        let n = self.nodes.len() as Node;
        for fanin in fanins {
            assert!(!fanin.is_complemented(), "cell network signals cannot be complemented");
            self.nodes[fanin.node() as usize].fanout += 1;
        }
        self.nodes.push(CellNode {
            fanins: fanins.to_vec(),
            gate: Some(gate),
            fanout: 0,
        });
        self.num_cells += 1;
        Signal::new(n, false)
    }

    /// Returns the library cell instantiated at `n`.
    pub fn cell(&self, n: Node) -> Option<&Gate> {
        self.nodes[n as usize].gate.map(|g| &self.gates[g as usize])
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Total area of the instantiated cells.
    pub fn area(&self) -> f32 {
        self.nodes
            .iter()
            .filter_map(|n| n.gate)
            .map(|g| self.gates[g as usize].area)
            .sum()
    }

    /// Largest arrival time at a CO, using the pin block delays.
    pub fn delay(&self) -> f32 {
        let mut arrival = vec![0f32; self.nodes.len()];
        // Cells are always created after their fan-ins
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(gate) = node.gate {
                let pins = &self.gates[gate as usize].pins;
                arrival[i] = node
                    .fanins
                    .iter()
                    .zip(pins)
                    .map(|(f, pin)| arrival[f.node() as usize] + pin.delay())
                    .fold(0.0, f32::max);
            }
        }
        self.cos
            .iter()
            .map(|s| arrival[s.node() as usize])
            .fold(0.0, f32::max)
    }

    /// Number of instances of every gate, by gate id.
    pub fn cell_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.gates.len()];
        for gate in self.nodes.iter().filter_map(|n| n.gate) {
            counts[gate as usize] += 1;
        }
        counts
    }
}

impl Network for CellNetwork {
    fn size(&self) -> usize {
        self.nodes.len()
    }

    fn num_gates(&self) -> usize {
        self.num_cells
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
        n > 1 && self.nodes[n as usize].gate.is_none()
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
        match self.nodes[n as usize].gate {
            Some(gate) => compose(&self.gates[gate as usize].function, fanin_functions),
            None => panic!("node {} is not a cell", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genlib::parse_genlib;
    use crate::simulate::simulate_outputs;

    #[test]
    fn cells() {
        let gates = parse_genlib(
            "GATE inv 1 O=!a; PIN * INV 1 999 1 0 1 0
             GATE nand2 2 O=!(a*b); PIN * INV 1 999 1.5 0 2 0",
        )
        .unwrap();
        let mut cells = CellNetwork::new(&gates);
        let a = cells.create_pi();
        let b = cells.create_pi();
        let nand = cells.create_cell(1, &[a, b]);
        let and = cells.create_cell(0, &[nand]);
        cells.create_po(and);
        cells.create_po(cells.get_constant(true));

        assert_eq!(cells.num_gates(), 2);
        assert_eq!(cells.area(), 3.0);
        assert_eq!(cells.delay(), 3.0);
        assert_eq!(cells.cell(nand.node()).map(|g| g.name.as_str()), Some("nand2"));
        assert_eq!(cells.cell_counts(), vec![1, 1]);

        let outputs = simulate_outputs(&cells);
        assert_eq!(outputs[0].as_u64(), 0x8);
        assert!(outputs[1].is_const1());
    }

    #[test]
    #[should_panic(expected = "has 2 pins but got 1 fan-ins")]
    fn pin_count_mismatch() {
        let gates = parse_genlib("GATE nand2 2 O=!(a*b); PIN * INV 1 999 1 0 1 0").unwrap();
        let mut cells = CellNetwork::new(&gates);
        let a = cells.create_pi();
        cells.create_cell(0, &[a]);
    }
}
