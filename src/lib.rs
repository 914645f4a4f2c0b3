//! Cut-based logic optimisation and technology mapping for And-Inverter
//! Graphs.

pub mod aiger;
pub mod backends;
pub mod cell_network;
pub mod cut;
pub mod cut_enumeration;
pub mod depth;
pub mod error;
pub mod exact_library;
pub mod genlib;
pub mod klut;
pub mod library;
pub mod lut_mapper;
pub mod mapping;
pub mod mffc;
pub mod network;
pub mod npn;
pub mod optimizer;
pub mod refactor;
pub mod resynthesis;
pub mod rewrite;
pub mod simulate;
pub mod stopwatch;
pub mod tech_mapper;
pub mod topo;
pub mod truth_table;
pub mod truth_table_cache;

mod test_utils;

pub use error::{Error, Result};
pub use network::{Aig, Network, Node, Signal, Workspace};
pub use truth_table::TruthTable;
