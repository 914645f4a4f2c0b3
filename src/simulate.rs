//! Exhaustive simulation
//!
//! Every node is simulated over all assignments of the combinational
//! inputs, so these functions are limited to networks with at most
//! [`MAX_VARS`] CIs.

use crate::network::{Aig, Network, Node, Signal};
use crate::topo::topological_order;
use crate::truth_table::{TruthTable, MAX_VARS};
use hashbrown::HashMap;

/// Returns the function of every node over the CIs. Dead nodes get the
/// constant zero function.
pub fn simulate_nodes<N: Network>(ntk: &N) -> Vec<TruthTable> {
    let num_vars = ntk.num_cis() as u32;
    assert!(
        num_vars <= MAX_VARS,
        "exhaustive simulation supports at most {} inputs but the network has {}",
        MAX_VARS,
        num_vars
    );

    let mut functions = vec![TruthTable::new(num_vars); ntk.size()];
    for (i, ci) in ntk.cis().iter().enumerate() {
        functions[*ci as usize] = TruthTable::nth_var(num_vars, i as u32);
    }

    for n in topological_order(ntk) {
        if ntk.is_constant(n) {
            if ntk.constant_value(n) {
                functions[n as usize] = TruthTable::const1(num_vars);
            }
        } else if ntk.is_gate(n) {
            let fanins = ntk
                .fanins(n)
                .iter()
                .map(|f| functions[f.node() as usize].clone())
                .collect::<Vec<_>>();
            functions[n as usize] = ntk.compute(n, &fanins);
        }
    }

    functions
}

fn signal_function(functions: &[TruthTable], s: Signal) -> TruthTable {
    let tt = &functions[s.node() as usize];
    if s.is_complemented() {
        !tt
    } else {
        tt.clone()
    }
}

/// Returns the function of every CO over the CIs.
pub fn simulate_outputs<N: Network>(ntk: &N) -> Vec<TruthTable> {
    let functions = simulate_nodes(ntk);
    ntk.cos()
        .iter()
        .map(|s| signal_function(&functions, *s))
        .collect()
}

/// Returns true if both networks have the same interface and compute the
/// same CO functions.
pub fn equivalent<A: Network, B: Network>(a: &A, b: &B) -> bool {
    a.num_cis() == b.num_cis()
        && a.num_cos() == b.num_cos()
        && simulate_outputs(a) == simulate_outputs(b)
}

/// Computes the function of `root` over `leaves`, which must separate it
/// from the CIs. Variable `i` is leaf `i`.
pub fn simulate_window(aig: &Aig, root: Node, leaves: &[Node]) -> TruthTable {
    let num_vars = leaves.len() as u32;
    let mut functions: HashMap<Node, TruthTable> = HashMap::new();
    for (i, leaf) in leaves.iter().enumerate() {
        functions.insert(*leaf, TruthTable::nth_var(num_vars, i as u32));
    }
    functions.entry(0).or_insert_with(|| TruthTable::new(num_vars));

    let mut stack = vec![(root, false)];
    while let Some((n, expanded)) = stack.pop() {
        if functions.contains_key(&n) {
            continue;
        }
        assert!(aig.is_and(n), "window leaves do not separate node {} from the inputs", root);

        if expanded {
            let fanins = aig
                .fanins(n)
                .iter()
                .map(|f| functions[&f.node()].clone())
                .collect::<Vec<_>>();
            let tt = aig.compute(n, &fanins);
            functions.insert(n, tt);
        } else {
            stack.push((n, true));
            for fanin in aig.fanins(n) {
                stack.push((fanin.node(), false));
            }
        }
    }

    functions[&root].clone()
}
