//! Rewriting and refactoring run to a fixed point

use crate::error::Result;
use crate::exact_library::ExactLibrary;
use crate::network::{Aig, Network};
use crate::refactor::{refactor, RefactorParams};
use crate::resynthesis::Resynthesis;
use crate::rewrite::{rewrite, RewriteParams};
use log::{debug, info};
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimizerParams {
    /// Largest number of rounds; zero runs until a round brings no gain.
    pub max_rounds: u32,
    pub rewrite: RewriteParams,
    pub refactor: RefactorParams,
    pub run_refactor: bool,
}

#[derive(Clone, Debug, Default)]
pub struct OptimizerStats {
    /// Gate count before the first round and after every round.
    pub history: Vec<usize>,
    pub time_total: Duration,
}

impl OptimizerStats {
    pub fn rounds(&self) -> usize {
        self.history.len().saturating_sub(1)
    }
}

impl fmt::Display for OptimizerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let history = self
            .history
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        writeln!(f, "[i] gates          = {}", history)?;
        writeln!(f, "[i] rounds         = {}", self.rounds())?;
        write!(f, "[i] total time     = {:>5.2} secs", self.time_total.as_secs_f64())
    }
}

/// Repeats rewriting, followed by refactoring if enabled, until a round no
/// longer reduces the gate count or the round budget is spent. The network
/// is compacted after every round.
pub fn optimize<R: Resynthesis>(
    aig: &mut Aig,
    library: &ExactLibrary,
    resyn: &mut R,
    params: &OptimizerParams,
) -> Result<OptimizerStats> {
    params.rewrite.validate()?;
    if params.run_refactor {
        params.refactor.validate()?;
    }

    let start = Instant::now();
    let mut stats = OptimizerStats {
        history: vec![aig.num_gates()],
        ..Default::default()
    };

    let mut round = 0;
    while params.max_rounds == 0 || round < params.max_rounds {
        let before = aig.num_gates();
        rewrite(aig, library, &params.rewrite)?;
        if params.run_refactor {
            refactor(aig, resyn, &params.refactor)?;
        }
        *aig = aig.cleanup();
        round += 1;

        let after = aig.num_gates();
        stats.history.push(after);
        debug!("optimization round {}: {} -> {} gates", round, before, after);
        if after >= before {
            break;
        }
    }

    stats.time_total = start.elapsed();
    let summary = format!(
        "optimization: {} -> {} gates in {} rounds",
        stats.history[0],
        aig.num_gates(),
        stats.rounds()
    );
    if params.rewrite.verbose {
        info!("{}", summary);
    } else {
        debug!("{}", summary);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact_library::ExactLibraryParams;
    use crate::resynthesis::SopFactoring;
    use crate::simulate::equivalent;
    use crate::test_utils::random_aig;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn library() -> ExactLibrary {
        ExactLibrary::new(&mut SopFactoring::default(), &ExactLibraryParams::default()).unwrap()
    }

    #[test]
    fn until_no_gain() {
        let library = library();
        let mut rng = SmallRng::seed_from_u64(23);
        let mut aig = random_aig(&mut rng, 7, 100, 4);
        let original = aig.clone();

        let params = OptimizerParams {
            run_refactor: true,
            ..Default::default()
        };
        let stats = optimize(&mut aig, &library, &mut SopFactoring::default(), &params).unwrap();

        let history = &stats.history;
        assert_eq!(*history.last().unwrap(), aig.num_gates());
        // Every round but the last one reduced the gate count
        assert!(history[..history.len() - 1].windows(2).all(|w| w[1] < w[0]));
        assert!(history[history.len() - 1] <= history[history.len() - 2]);
        assert!(equivalent(&original, &aig));
    }

    #[test]
    fn round_budget() {
        let library = library();
        let mut rng = SmallRng::seed_from_u64(29);
        let mut aig = random_aig(&mut rng, 6, 80, 3);
        let original = aig.clone();

        let params = OptimizerParams {
            max_rounds: 1,
            ..Default::default()
        };
        let stats = optimize(&mut aig, &library, &mut SopFactoring::default(), &params).unwrap();
        assert_eq!(stats.rounds(), 1);
        assert!(equivalent(&original, &aig));
    }

    #[test]
    fn latches_survive() {
        let library = library();
        let mut aig = Aig::new();
        let a = aig.create_pi();
        let q = aig.create_ro(Some(true));
        let n = aig.create_and_raw(!q, !q);
        let d = aig.create_and(!n, a);
        aig.create_po(d);
        aig.create_ri(d);
        let original = aig.clone();

        optimize(&mut aig, &library, &mut SopFactoring::default(), &OptimizerParams::default()).unwrap();
        assert_eq!(aig.num_latches(), 1);
        assert_eq!(aig.latch_init(0), Some(true));
        assert_eq!(aig.num_gates(), 1);
        assert!(equivalent(&original, &aig));
    }
}
