//! Logic levels and required levels of an AIG
//!
//! A [`DepthView`] is kept up to date by the engine which mutates the
//! network: after every substitution the engine calls
//! [`DepthView::update_after_substitution`].

use crate::network::{Aig, Network, Node};
use crate::topo::topological_order;

pub struct DepthView {
    levels: Vec<u32>,
    required: Vec<u32>,
    depth: u32,
}

impl DepthView {
    pub fn new(aig: &Aig) -> DepthView {
        let mut view = DepthView {
            levels: vec![],
            required: vec![],
            depth: 0,
        };
        view.compute_levels(aig);
        view
    }

    pub fn level(&self, n: Node) -> u32 {
        self.levels.get(n as usize).copied().unwrap_or(0)
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns the latest level at which `n` may be computed without
    /// increasing the depth, or `u32::MAX` for nodes the last call to
    /// [`DepthView::compute_required`] did not see.
    pub fn required(&self, n: Node) -> u32 {
        self.required.get(n as usize).copied().unwrap_or(u32::MAX)
    }

    fn level_of(&self, aig: &Aig, n: Node) -> u32 {
        if !aig.is_and(n) {
            return 0;
        }
        aig.fanins(n)
            .iter()
            .map(|f| self.level(f.node()) + 1)
            .max()
            .unwrap_or(0)
    }

    fn set_level(&mut self, n: Node, level: u32) {
        if n as usize >= self.levels.len() {
            self.levels.resize(n as usize + 1, 0);
        }
        self.levels[n as usize] = level;
    }

    fn update_depth(&mut self, aig: &Aig) {
        self.depth = aig
            .cos()
            .iter()
            .map(|s| self.level(s.node()))
            .max()
            .unwrap_or(0);
    }

    pub fn compute_levels(&mut self, aig: &Aig) {
        self.levels = vec![0; aig.size()];
        for n in topological_order(aig) {
            let level = self.level_of(aig, n);
            self.levels[n as usize] = level;
        }
        self.update_depth(aig);
    }

    /// Computes required levels against the current depth.
    pub fn compute_required(&mut self, aig: &Aig) {
        self.required = vec![u32::MAX; aig.size()];
        for co in aig.cos() {
            self.required[co.node() as usize] = self.depth;
        }

        for n in topological_order(aig).into_iter().rev() {
            let required = self.required[n as usize];
            if !aig.is_and(n) || required == u32::MAX {
                continue;
            }
            for fanin in aig.fanins(n) {
                let slot = &mut self.required[fanin.node() as usize];
                *slot = (*slot).min(required.saturating_sub(1));
            }
        }
    }

    /// Levels the nodes created since the last update, then propagates
    /// level changes from the gates a substitution rewired (as returned by
    /// [`Aig::substitute_node`]) into their transitive fan-out.
    pub fn update_after_substitution(&mut self, aig: &Aig, modified: &[Node]) {
        // Fresh nodes are created after their fan-ins, so index order works
        for n in self.levels.len() as Node..aig.size() as Node {
            let level = self.level_of(aig, n);
            self.set_level(n, level);
        }

        let mut worklist = modified.to_vec();
        while let Some(n) = worklist.pop() {
            if !aig.is_and(n) {
                continue;
            }
            let level = self.level_of(aig, n);
            if level != self.level(n) {
                self.set_level(n, level);
                worklist.extend_from_slice(aig.fanouts(n));
            }
        }

        self.update_depth(aig);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_and_required() {
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let c = aig.create_pi();
        let g0 = aig.create_and(a, b);
        let g1 = aig.create_and(g0, c);
        let g2 = aig.create_and(a, c);
        aig.create_po(g1);
        aig.create_po(g2);

        let mut view = DepthView::new(&aig);
        assert_eq!(view.level(g0.node()), 1);
        assert_eq!(view.level(g1.node()), 2);
        assert_eq!(view.depth(), 2);

        view.compute_required(&aig);
        assert_eq!(view.required(g1.node()), 2);
        assert_eq!(view.required(g2.node()), 2);
        assert_eq!(view.required(g0.node()), 1);
        assert_eq!(view.required(a.node()), 0);
        assert_eq!(view.required(c.node()), 1);
    }

    #[test]
    fn update_after_substitution() {
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let c = aig.create_pi();
        let d = aig.create_pi();
        let g0 = aig.create_and(a, b);
        let g1 = aig.create_and(g0, c);
        let g2 = aig.create_and(g1, d);
        aig.create_po(g2);

        let mut view = DepthView::new(&aig);
        assert_eq!(view.depth(), 3);

        // Rebalance (a & b) & c into a & (b & c) below g2, then flatten g1
        let bc = aig.create_and(b, c);
        let balanced = aig.create_and(a, bc);
        let modified = aig.substitute_node(g1.node(), balanced);
        assert_eq!(modified, vec![g2.node()]);
        view.update_after_substitution(&aig, &modified);
        assert_eq!(view.depth(), 3);

        let modified = aig.substitute_node(balanced.node(), c);
        view.update_after_substitution(&aig, &modified);
        assert_eq!(view.level(g2.node()), 1);
        assert_eq!(view.depth(), 1);
    }
}
