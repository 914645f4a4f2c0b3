//! Database of pre-synthesised AIG structures for every NPN class
//!
//! Every class representative over `num_vars` variables is resynthesised
//! once into a shared database AIG whose primary inputs are the canonical
//! pins. A cut is matched by canonizing its function; the transform tells
//! which leaf drives each pin (see [`crate::npn`]).

use crate::error::{Error, Result};
use crate::mffc::{gate_cost, CostMetric};
use crate::network::{Aig, Network, Node, Signal, Workspace};
use crate::npn::npn_classes;
use crate::resynthesis::Resynthesis;
use crate::truth_table::TruthTable;
use hashbrown::HashMap;
use log::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExactLibraryParams {
    pub num_vars: u32,
    /// Also compute the literal cost of every structure.
    pub compute_literal_cost: bool,
}

impl Default for ExactLibraryParams {
    fn default() -> Self {
        ExactLibraryParams {
            num_vars: 4,
            compute_literal_cost: true,
        }
    }
}

impl ExactLibraryParams {
    pub fn validate(&self) -> Result<()> {
        if !(1..=4).contains(&self.num_vars) {
            return Err(Error::InvalidParameter(format!(
                "exact library supports 1 to 4 variables, got {}",
                self.num_vars
            )));
        }
        Ok(())
    }
}

/// One structure implementing a canonical function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExactSupergate {
    /// Output of the structure in the database.
    pub root: Signal,
    /// Number of AND gates in the structure.
    pub area: u32,
    pub literal_cost: u32,
    /// Longest path in gates from each pin to the output.
    pub delay: Vec<u32>,
}

pub struct ExactLibrary {
    params: ExactLibraryParams,
    database: Aig,
    classes: HashMap<TruthTable, Vec<ExactSupergate>>,
}

impl ExactLibrary {
    pub fn new<R: Resynthesis>(resyn: &mut R, params: &ExactLibraryParams) -> Result<ExactLibrary> {
        params.validate()?;

        let mut database = Aig::new();
        let pins = (0..params.num_vars)
            .map(|_| database.create_pi())
            .collect::<Vec<_>>();
        let mut ws = Workspace::new();
        let mut classes = HashMap::new();

        for class in npn_classes(params.num_vars) {
            let mut roots = vec![];
            resyn.resynthesize(&mut database, &class, &pins, &mut |s| {
                if !roots.contains(&s) {
                    roots.push(s);
                }
                true
            });

            let mut supergates = roots
                .into_iter()
                .map(|root| {
                    database.create_po(root);
                    evaluate_structure(&database, &mut ws, root, params)
                })
                .collect::<Vec<_>>();
            supergates.sort_by_key(|sg| (sg.area, sg.literal_cost));
            classes.insert(class, supergates);
        }

        debug!(
            "exact library: {} classes, {} database gates",
            classes.len(),
            database.num_gates()
        );

        Ok(ExactLibrary {
            params: params.clone(),
            database,
            classes,
        })
    }

    pub fn num_vars(&self) -> u32 {
        self.params.num_vars
    }

    pub fn database(&self) -> &Aig {
        &self.database
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Returns the structures of a canonical function, cheapest first.
    pub fn get_supergates(&self, canonical: &TruthTable) -> Option<&[ExactSupergate]> {
        self.classes
            .get(canonical)
            .map(|v| v.as_slice())
            .filter(|v| !v.is_empty())
    }
}

fn evaluate_structure(
    database: &Aig,
    ws: &mut Workspace,
    root: Signal,
    params: &ExactLibraryParams,
) -> ExactSupergate {
    // Each shared gate is counted once
    ws.incr_trav_id();
    let mut area = 0;
    let mut literal_cost = 0;
    let mut stack = vec![root.node()];
    while let Some(n) = stack.pop() {
        if ws.is_marked(n) || !database.is_and(n) {
            continue;
        }
        ws.mark(n);
        area += 1;
        if params.compute_literal_cost {
            literal_cost += gate_cost(database, n, CostMetric::Literals);
        }
        stack.extend(database.fanins(n).iter().map(|f| f.node()));
    }

    let delay = database
        .cis()
        .iter()
        .map(|pin| longest_path(database, root.node(), *pin, &mut HashMap::new()).unwrap_or(0))
        .collect();

    ExactSupergate {
        root,
        area,
        literal_cost,
        delay,
    }
}

/// Returns the number of gates on the longest path from `from` to `to`.
/// `memo` caches the result of every gate visited for the same `from`.
fn longest_path(aig: &Aig, to: Node, from: Node, memo: &mut HashMap<Node, Option<u32>>) -> Option<u32> {
    if to == from {
        return Some(0);
    }
    if !aig.is_and(to) {
        return None;
    }
    if let Some(depth) = memo.get(&to) {
        return *depth;
    }
    let depth = aig
        .fanins(to)
        .iter()
        .filter_map(|f| longest_path(aig, f.node(), from, memo))
        .max()
        .map(|d| d + 1);
    memo.insert(to, depth);
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npn::{apply_transform, exact_npn_canonization};
    use crate::resynthesis::SopFactoring;
    use crate::simulate::simulate_nodes;

    #[test]
    fn longest_path_through_reconvergence() {
        // Every level doubles the number of paths from `x` to the top
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let b = aig.create_pi();
        let x = aig.create_pi();
        let mut top = x;
        for _ in 0..40 {
            let l = aig.create_and(top, a);
            let r = aig.create_and(top, b);
            top = aig.create_and(l, r);
        }
        aig.create_po(top);

        let mut memo = HashMap::new();
        assert_eq!(longest_path(&aig, top.node(), x.node(), &mut memo), Some(80));
        assert_eq!(longest_path(&aig, top.node(), a.node(), &mut HashMap::new()), Some(80));
        assert_eq!(longest_path(&aig, a.node(), x.node(), &mut HashMap::new()), None);
    }

    #[test]
    fn every_class_is_implemented() {
        let library = ExactLibrary::new(&mut SopFactoring::default(), &ExactLibraryParams::default()).unwrap();
        assert_eq!(library.num_classes(), 222);

        let functions = simulate_nodes(library.database());
        for class in npn_classes(4) {
            let supergates = library.get_supergates(&class).unwrap();
            for sg in supergates {
                let tt = &functions[sg.root.node() as usize];
                let tt = if sg.root.is_complemented() { !tt } else { tt.clone() };
                assert_eq!(tt, class);
            }
            assert!(supergates.windows(2).all(|w| w[0].area <= w[1].area));
        }
    }

    #[test]
    fn matching_through_canonization() {
        let library = ExactLibrary::new(&mut SopFactoring::default(), &ExactLibraryParams::default()).unwrap();

        // a & !b | c & d
        let v = |i| TruthTable::nth_var(4, i);
        let f = (&v(0) & &!v(1)) | (&v(2) & &v(3));
        let canon = exact_npn_canonization(&f);
        assert_eq!(apply_transform(&f, &canon.transform), canon.canonical);

        let sg = &library.get_supergates(&canon.canonical).unwrap()[0];
        assert_eq!(sg.area, 3);
        assert_eq!(sg.delay.iter().max(), Some(&2));
    }

    #[test]
    fn literal_cost() {
        let params = ExactLibraryParams {
            num_vars: 2,
            compute_literal_cost: true,
        };
        let library = ExactLibrary::new(&mut SopFactoring::default(), &params).unwrap();
        assert_eq!(library.num_classes(), 4);

        // AND of two variables: one gate, two literals
        let and = TruthTable::from_u64(2, 0x1);
        let sg = &library.get_supergates(&and).unwrap()[0];
        assert_eq!(sg.area, 1);
        assert_eq!(sg.delay, vec![1, 1]);
    }

    #[test]
    fn too_many_variables() {
        let params = ExactLibraryParams {
            num_vars: 5,
            ..Default::default()
        };
        assert!(matches!(
            ExactLibrary::new(&mut SopFactoring::default(), &params),
            Err(Error::InvalidParameter(_))
        ));
    }
}
