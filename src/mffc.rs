//! Maximum fan-out free cones and reconvergence-driven windows
//!
//! Dereferencing walks the fan-in cone of a node and decrements the fan-out
//! counts of the AIG; every gate whose count drops to zero belongs to the
//! MFFC. Referencing undoes it. Callers must always pair the two so that
//! the fan-out counts end up unchanged.

use crate::network::{Aig, Network, Node, Workspace};

/// What a node of a cone costs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CostMetric {
    /// Every AND gate costs one.
    Nodes,
    /// An AND gate costs two literals plus one per complemented fan-in.
    Literals,
}

pub fn gate_cost(aig: &Aig, n: Node, metric: CostMetric) -> u32 {
    match metric {
        CostMetric::Nodes => 1,
        CostMetric::Literals => {
            2 + aig
                .fanins(n)
                .iter()
                .filter(|f| f.is_complemented())
                .count() as u32
        }
    }
}

/// Dereferences the cone of `n` and returns the cost of the gates it
/// frees, `n` included.
pub fn recursive_deref(aig: &mut Aig, n: Node, metric: CostMetric) -> u32 {
    let mut cost = 0;
    let mut stack = vec![n];
    while let Some(n) = stack.pop() {
        cost += gate_cost(aig, n, metric);
        let fanins = aig.fanins(n).to_vec();
        for fanin in fanins {
            let fanin = fanin.node();
            if aig.is_and(fanin) && aig.decr_fanout_size(fanin) == 0 {
                stack.push(fanin);
            }
        }
    }
    cost
}

/// References the cone of `n` and returns the cost of the gates which
/// become used again, `n` included.
pub fn recursive_ref(aig: &mut Aig, n: Node, metric: CostMetric) -> u32 {
    let mut cost = 0;
    let mut stack = vec![n];
    while let Some(n) = stack.pop() {
        cost += gate_cost(aig, n, metric);
        let fanins = aig.fanins(n).to_vec();
        for fanin in fanins {
            let fanin = fanin.node();
            if aig.is_and(fanin) && aig.incr_fanout_size(fanin) == 1 {
                stack.push(fanin);
            }
        }
    }
    cost
}

/// Returns the cost of the MFFC of `n` without changing the network.
pub fn mffc_cost(aig: &mut Aig, n: Node, metric: CostMetric) -> u32 {
    let cost = recursive_deref(aig, n, metric);
    let restored = recursive_ref(aig, n, metric);
    assert_eq!(cost, restored, "dereferencing and referencing node {} disagree", n);
    cost
}

/// The gates of an MFFC and the nodes feeding it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mffc {
    /// Gates in topological order; the root is last.
    pub nodes: Vec<Node>,
    /// Sorted nodes outside the MFFC which drive it.
    pub leaves: Vec<Node>,
}

/// Collects the MFFC of gate `root`. The network is left unchanged.
pub fn collect_mffc(aig: &mut Aig, ws: &mut Workspace, root: Node) -> Mffc {
    assert!(aig.is_and(root), "node {} is not a gate", root);

    ws.incr_trav_id();
    let mut nodes = vec![];
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        ws.mark(n);
        nodes.push(n);
        let fanins = aig.fanins(n).to_vec();
        for fanin in fanins {
            let fanin = fanin.node();
            if aig.is_and(fanin) && aig.decr_fanout_size(fanin) == 0 {
                stack.push(fanin);
            }
        }
    }
    recursive_ref(aig, root, CostMetric::Nodes);

    let mut leaves = vec![];
    for n in &nodes {
        for fanin in aig.fanins(*n) {
            let fanin = fanin.node();
            if !ws.is_marked(fanin) && !aig.is_constant(fanin) {
                leaves.push(fanin);
            }
        }
    }
    leaves.sort_unstable();
    leaves.dedup();

    // A gate is only pushed once all its fan-outs inside the cone have
    // been visited, so the reverse is topological
    nodes.reverse();
    Mffc { nodes, leaves }
}

/// Grows a cut of `root` from its fan-ins by repeatedly expanding the leaf
/// which adds the fewest new leaves, as long as the cut stays within
/// `max_leaves`. Reconvergent paths keep the cut small.
pub fn reconvergence_cut(aig: &Aig, ws: &mut Workspace, root: Node, max_leaves: usize) -> Vec<Node> {
    assert!(max_leaves >= 2, "a reconvergence-driven cut needs at least two leaves");

    ws.incr_trav_id();
    ws.mark(root);
    let mut leaves = vec![];
    for fanin in aig.fanins(root) {
        if !ws.is_marked(fanin.node()) {
            ws.mark(fanin.node());
            leaves.push(fanin.node());
        }
    }

    loop {
        let mut best: Option<(usize, i32)> = None;
        for (i, leaf) in leaves.iter().enumerate() {
            if !aig.is_and(*leaf) {
                continue;
            }
            let new_leaves = aig
                .fanins(*leaf)
                .iter()
                .filter(|f| !ws.is_marked(f.node()))
                .map(|f| f.node())
                .fold(vec![], |mut acc, n| {
                    if !acc.contains(&n) {
                        acc.push(n);
                    }
                    acc
                })
                .len() as i32;
            let cost = new_leaves - 1;
            if leaves.len() as i32 + cost > max_leaves as i32 {
                continue;
            }
            if best.map_or(true, |(_, c)| cost < c) {
                best = Some((i, cost));
            }
        }

        let (i, _) = match best {
            Some(best) => best,
            None => break,
        };
        let leaf = leaves.swap_remove(i);
        for fanin in aig.fanins(leaf) {
            if !ws.is_marked(fanin.node()) {
                ws.mark(fanin.node());
                leaves.push(fanin.node());
            }
        }
    }

    leaves.sort_unstable();
    leaves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Signal;

    /// Two outputs sharing the gate `a & b`.
    fn shared_network() -> (Aig, [Signal; 7]) {
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let c = aig.create_pi();
        let ab = aig.create_and(a, b);
        let g0 = aig.create_and(ab, c);
        let g1 = aig.create_and(g0, !a);
        let g2 = aig.create_and(ab, !c);
        aig.create_po(g1);
        aig.create_po(g2);
        (aig, [a, b, c, ab, g0, g1, g2])
    }

    #[test]
    fn deref_and_ref_restore_counts() {
        let (mut aig, [_, _, _, ab, g0, g1, _]) = shared_network();
        let before = (0..aig.size() as Node).map(|n| aig.fanout_size(n)).collect::<Vec<_>>();

        assert_eq!(recursive_deref(&mut aig, g1.node(), CostMetric::Nodes), 2);
        assert_eq!(aig.fanout_size(g0.node()), 0);
        assert_eq!(aig.fanout_size(ab.node()), 1);
        assert_eq!(recursive_ref(&mut aig, g1.node(), CostMetric::Nodes), 2);

        let after = (0..aig.size() as Node).map(|n| aig.fanout_size(n)).collect::<Vec<_>>();
        assert_eq!(before, after);
    }

    #[test]
    fn literal_cost() {
        let (mut aig, [_, _, _, _, g0, g1, _]) = shared_network();
        // g1 has one complemented fan-in, g0 none
        assert_eq!(gate_cost(&aig, g1.node(), CostMetric::Literals), 3);
        assert_eq!(mffc_cost(&mut aig, g1.node(), CostMetric::Literals), 5);
        assert_eq!(mffc_cost(&mut aig, g0.node(), CostMetric::Nodes), 1);
    }

    #[test]
    fn collect() {
        let (mut aig, [a, _, c, ab, g0, g1, _]) = shared_network();
        let mut ws = Workspace::new();
        let mffc = collect_mffc(&mut aig, &mut ws, g1.node());
        assert_eq!(mffc.nodes, vec![g0.node(), g1.node()]);
        assert_eq!(mffc.leaves, vec![a.node(), c.node(), ab.node()]);
        assert_eq!(aig.fanout_size(g0.node()), 1);
    }

    #[test]
    fn reconvergence() {
        let (aig, [a, b, c, _, _, g1, g2]) = shared_network();
        let mut ws = Workspace::new();

        // g1 = ((a & b) & c) & !a reconverges on a
        let cut = reconvergence_cut(&aig, &mut ws, g1.node(), 3);
        assert_eq!(cut, vec![a.node(), b.node(), c.node()]);

        let cut = reconvergence_cut(&aig, &mut ws, g2.node(), 2);
        assert_eq!(cut.len(), 2);
    }
}
