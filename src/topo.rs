//! Topological ordering of a network's live nodes

use crate::network::{Network, Node};

/// Provides a topological ordering on a network: every node is returned
/// after all of its fan-ins.
pub struct TopologicalOrder {
    s: Vec<Node>,
    remaining: Vec<u32>,
    fanouts: Vec<Vec<Node>>,
}

impl TopologicalOrder {
    /// Creates a new topological ordering over the provided network.
    pub fn new<N: Network>(network: &N) -> TopologicalOrder {
        let size = network.size();
        let mut remaining = vec![0; size];
        let mut fanouts = vec![vec![]; size];

        for n in 0..size as Node {
            if network.is_dead(n) {
                continue;
            }
            for fanin in network.fanins(n) {
                fanouts[fanin.node() as usize].push(n);
                remaining[n as usize] += 1;
            }
        }

        // Seed in reverse so that popping yields the constant and the CIs
        // in index order
        let s = (0..size as Node)
            .rev()
            .filter(|n| !network.is_dead(*n) && remaining[*n as usize] == 0)
            .collect();

        TopologicalOrder {
            s,
            remaining,
            fanouts,
        }
    }

    /// Returns the next node in the topological ordering, or `None` if no
    /// nodes remain.
    pub fn next(&mut self) -> Option<Node> {
        let n = self.s.pop();

        if let Some(n) = n {
            for descendent in std::mem::take(&mut self.fanouts[n as usize]) {
                let remaining = &mut self.remaining[descendent as usize];
                *remaining -= 1;
                if *remaining == 0 {
                    self.s.push(descendent);
                }
            }
        }

        n
    }
}

/// Returns every live node of the network in topological order.
pub fn topological_order<N: Network>(network: &N) -> Vec<Node> {
    let mut topo = TopologicalOrder::new(network);
    let mut order = Vec::with_capacity(network.size());
    while let Some(n) = topo.next() {
        order.push(n);
    }
    order
}
