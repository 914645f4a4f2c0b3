//! Netlist writers for mapped networks

pub mod rtlil;

pub use rtlil::{write_rtlil_cells, write_rtlil_luts};
