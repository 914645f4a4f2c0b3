//! Pieces shared by the LUT and the standard-cell mapper

use crate::cut::EPS;
use log::warn;
use std::fmt;
use std::time::Duration;

/// Required time of a node outside the current mapping.
pub const UNCONSTRAINED: f32 = f32::MAX;

/// The three kinds of mapping round, run in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Round {
    /// Best arrival time, area flow breaking ties.
    Delay,
    /// Smallest area flow among the cuts meeting the required time.
    AreaFlow,
    /// Smallest exact area, measured by referencing the cut's cone.
    ExactArea,
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Round::Delay => "delay",
            Round::AreaFlow => "area flow",
            Round::ExactArea => "exact area",
        };
        write!(f, "{}", name)
    }
}

/// Area and delay of the mapping after a round.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundStats {
    pub round: Round,
    pub area: f32,
    pub delay: f32,
}

#[derive(Clone, Debug, Default)]
pub struct MappingStats {
    pub area: f32,
    pub delay: f32,
    /// Mapped nodes (LUTs or cells, inverters included).
    pub nodes: usize,
    pub inverters: usize,
    pub rounds: Vec<RoundStats>,
    pub time_cuts: Duration,
    pub time_mapping: Duration,
    pub time_total: Duration,
}

impl MappingStats {
    pub(crate) fn record(&mut self, round: Round, area: f32, delay: f32) {
        self.rounds.push(RoundStats { round, area, delay });
    }
}

impl fmt::Display for MappingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.rounds.iter().enumerate() {
            writeln!(
                f,
                "[i] round {:>2} ({:<10}) area = {:>10.2}  delay = {:>8.2}",
                i, r.round, r.area, r.delay
            )?;
        }
        writeln!(f, "[i] area           = {:.2}", self.area)?;
        writeln!(f, "[i] delay          = {:.2}", self.delay)?;
        writeln!(f, "[i] nodes          = {}", self.nodes)?;
        writeln!(f, "[i] inverters      = {}", self.inverters)?;
        writeln!(f, "[i] cuts time      = {:>5.2} secs", self.time_cuts.as_secs_f64())?;
        writeln!(f, "[i] mapping time   = {:>5.2} secs", self.time_mapping.as_secs_f64())?;
        write!(f, "[i] total time     = {:>5.2} secs", self.time_total.as_secs_f64())
    }
}

/// Blends the reference estimate of a node with its reference count in the
/// current mapping. Later rounds trust the mapping more.
pub fn blend_references(estimate: f32, map_refs: u32, round: u32) -> f32 {
    let coef = 1.0 / (1.0 + ((round + 1) * (round + 1)) as f32);
    coef * estimate + (1.0 - coef) * (map_refs.max(1) as f32)
}

/// Picks the required time of the COs: `target` if it is set and
/// achievable, the best delay otherwise.
pub fn resolve_required(target: f32, delay: f32) -> f32 {
    if target <= 0.0 {
        return delay;
    }
    if target < delay - EPS {
        warn!(
            "cannot meet the target required time of {:.2}, relaxing it to {:.2}",
            target, delay
        );
        return delay;
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blending() {
        // coef = 1/2 in the first round
        assert_eq!(blend_references(3.0, 1, 0), 2.0);
        // Unreferenced nodes count as one reference
        assert_eq!(blend_references(1.0, 0, 0), 1.0);
        // coef = 1/5 in the second round
        assert!((blend_references(6.0, 1, 1) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn required_time() {
        assert_eq!(resolve_required(0.0, 4.0), 4.0);
        assert_eq!(resolve_required(6.0, 4.0), 6.0);
        assert_eq!(resolve_required(3.0, 4.0), 4.0);
    }
}
