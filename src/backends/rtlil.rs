//! RTLIL output for mapped netlists
//!
//! Primary inputs and outputs become the ports `\pi<i>` and `\po<i>`, every
//! other net is named after its node. Latches are written as `$dff` cells
//! clocked by an extra `\clk` input.

use crate::cell_network::CellNetwork;
use crate::klut::KLutNetwork;
use crate::network::{Network, Node, Signal};
use std::io;

/// The sequential interface of a mapped network, which is not part of the
/// [`Network`] trait.
struct Interface {
    num_pis: usize,
    num_pos: usize,
    latch_init: Vec<Option<bool>>,
}

fn net(s: Signal) -> String {
    match s.node() {
        0 => "1'0".to_string(),
        1 => "1'1".to_string(),
        n => format!("$n${}", n),
    }
}

/// Writes the module around the cells produced by `write_cell`, which is
/// called once per gate in index order.
fn write_module<N: Network, W: io::Write>(
    mut writer: W,
    ntk: &N,
    interface: &Interface,
    mut write_cell: impl FnMut(&mut W, Node) -> io::Result<()>,
) -> io::Result<()> {
    let num_latches = interface.latch_init.len();
    writeln!(writer, "module \\top")?;

    let mut port = 1;
    if num_latches > 0 {
        writeln!(writer, "  wire width 1 input {} \\clk", port)?;
        port += 1;
    }
    for i in 0..interface.num_pis {
        writeln!(writer, "  wire width 1 input {} \\pi{}", port, i)?;
        port += 1;
    }
    for i in 0..interface.num_pos {
        writeln!(writer, "  wire width 1 output {} \\po{}", port, i)?;
        port += 1;
    }

    for (i, ci) in ntk.cis().iter().enumerate() {
        if i >= interface.num_pis {
            if let Some(init) = interface.latch_init[i - interface.num_pis] {
                writeln!(writer, "  attribute \\init 1'{}", init as u8)?;
            }
        }
        writeln!(writer, "  wire width 1 $n${}", ci)?;
    }
    let gates = (0..ntk.size() as Node).filter(|n| ntk.is_gate(*n)).collect::<Vec<_>>();
    for n in &gates {
        writeln!(writer, "  wire width 1 $n${}", n)?;
    }

    for (i, ci) in ntk.cis()[..interface.num_pis].iter().enumerate() {
        writeln!(writer, "  connect $n${} \\pi{}", ci, i)?;
    }

    for n in gates {
        write_cell(&mut writer, n)?;
    }

    for (i, (ro, ri)) in ntk.cis()[interface.num_pis..]
        .iter()
        .zip(&ntk.cos()[interface.num_pos..])
        .enumerate()
    {
        writeln!(writer, "  cell $dff $dff${}", i)?;
        writeln!(writer, "    parameter \\WIDTH 1")?;
        writeln!(writer, "    parameter \\CLK_POLARITY 1")?;
        writeln!(writer, "    connect \\CLK \\clk")?;
        writeln!(writer, "    connect \\D {}", net(*ri))?;
        writeln!(writer, "    connect \\Q $n${}", ro)?;
        writeln!(writer, "  end")?;
    }

    for (i, po) in ntk.cos()[..interface.num_pos].iter().enumerate() {
        writeln!(writer, "  connect \\po{} {}", i, net(*po))?;
    }

    writeln!(writer, "end")?;
    Ok(())
}

/// Writes a LUT network as a module of `$lut` cells.
pub fn write_rtlil_luts<W: io::Write>(writer: W, klut: &KLutNetwork) -> io::Result<()> {
    let interface = Interface {
        num_pis: klut.num_pis(),
        num_pos: klut.num_pos(),
        latch_init: (0..klut.num_latches()).map(|i| klut.latch_init(i)).collect(),
    };

    write_module(writer, klut, &interface, |writer, n| {
        let Some(function) = klut.node_function(n) else {
            return Ok(());
        };
        let fanins = klut.fanins(n);
        let k = fanins.len();
        // Both the table and the input concatenation are written MSB first
        let bitstring = (0..function.num_bits())
            .rev()
            .map(|i| if function.get_bit(i) { '1' } else { '0' })
            .collect::<String>();

        writeln!(writer, "  cell $lut $lut${}", n)?;
        writeln!(writer, "    parameter \\WIDTH {}", k)?;
        writeln!(writer, "    parameter \\LUT {}'{}", 1 << k, bitstring)?;
        writeln!(writer, "    connect \\Y $n${}", n)?;
        write!(writer, "    connect \\A {{")?;
        for fanin in fanins.iter().rev() {
            write!(writer, " {}", net(*fanin))?;
        }
        writeln!(writer, " }}")?;
        writeln!(writer, "  end")
    })
}

/// Writes a mapped netlist as a module instantiating the library cells by
/// name.
pub fn write_rtlil_cells<W: io::Write>(writer: W, cells: &CellNetwork) -> io::Result<()> {
    let interface = Interface {
        num_pis: cells.num_pis(),
        num_pos: cells.num_pos(),
        latch_init: (0..cells.num_latches()).map(|i| cells.latch_init(i)).collect(),
    };

    write_module(writer, cells, &interface, |writer, n| {
        let Some(gate) = cells.cell(n) else {
            return Ok(());
        };

        writeln!(writer, "  cell \\{} $cell${}", gate.name, n)?;
        for (pin, fanin) in gate.pins.iter().zip(cells.fanins(n)) {
            writeln!(writer, "    connect \\{} {}", pin.name, net(*fanin))?;
        }
        writeln!(writer, "    connect \\{} $n${}", gate.output_name, n)?;
        writeln!(writer, "  end")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genlib::parse_genlib;
    use crate::truth_table::TruthTable;

    fn to_string(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buffer = vec![];
        write(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn lut_module() {
        let mut klut = KLutNetwork::new();
        let a = klut.create_pi();
        let b = klut.create_pi();
        // a & !b
        let g = klut.create_node(&[a, b], TruthTable::from_u64(2, 0x2));
        klut.create_po(g);
        klut.create_po(klut.get_constant(true));

        let text = to_string(|w| write_rtlil_luts(w, &klut));
        let lines = text.lines().map(str::trim).collect::<Vec<_>>();
        assert_eq!(lines.first(), Some(&"module \\top"));
        assert_eq!(lines.last(), Some(&"end"));
        assert!(lines.contains(&"wire width 1 input 1 \\pi0"));
        assert!(lines.contains(&"wire width 1 output 4 \\po1"));
        assert!(lines.contains(&"connect $n$2 \\pi0"));
        assert!(lines.contains(&"cell $lut $lut$4"));
        assert!(lines.contains(&"parameter \\WIDTH 2"));
        assert!(lines.contains(&"parameter \\LUT 4'0010"));
        assert!(lines.contains(&"connect \\A { $n$3 $n$2 }"));
        assert!(lines.contains(&"connect \\po0 $n$4"));
        assert!(lines.contains(&"connect \\po1 1'1"));
        assert!(!text.contains("$dff"));
    }

    #[test]
    fn latches_become_flip_flops() {
        let mut klut = KLutNetwork::new();
        let a = klut.create_pi();
        let q = klut.create_ro(Some(true));
        let r = klut.create_ro(None);
        let g = klut.create_node(&[a, q], TruthTable::from_u64(2, 0x6));
        klut.create_po(r);
        klut.create_ri(g);
        klut.create_ri(q);

        let text = to_string(|w| write_rtlil_luts(w, &klut));
        let lines = text.lines().map(str::trim).collect::<Vec<_>>();
        assert!(lines.contains(&"wire width 1 input 1 \\clk"));
        assert!(lines.contains(&"wire width 1 input 2 \\pi0"));
        assert!(text.contains("  attribute \\init 1'1\n  wire width 1 $n$3\n"));
        assert!(!text.contains("attribute \\init 1'1\n  wire width 1 $n$4\n"));
        assert!(lines.contains(&"cell $dff $dff$1"));
        assert!(lines.contains(&"connect \\D $n$5"));
        assert!(lines.contains(&"connect \\D $n$3"));
        assert!(lines.contains(&"connect \\Q $n$4"));
        assert!(lines.contains(&"connect \\po0 $n$4"));
    }

    #[test]
    fn cell_module() {
        let gates = parse_genlib(
            "GATE inv 1 Y=!a; PIN * INV 1 999 1 0 1 0
             GATE nand2 2 Y=!(a*b); PIN * INV 1 999 1 0 1 0",
        )
        .unwrap();
        let mut cells = CellNetwork::new(&gates);
        let a = cells.create_pi();
        let b = cells.create_pi();
        let n = cells.create_cell(1, &[a, b]);
        let y = cells.create_cell(0, &[n]);
        cells.create_po(y);

        let text = to_string(|w| write_rtlil_cells(w, &cells));
        let lines = text.lines().map(str::trim).collect::<Vec<_>>();
        assert!(lines.contains(&"cell \\nand2 $cell$4"));
        assert!(lines.contains(&"connect \\a $n$2"));
        assert!(lines.contains(&"connect \\b $n$3"));
        assert!(lines.contains(&"connect \\Y $n$4"));
        assert!(lines.contains(&"cell \\inv $cell$5"));
        assert!(lines.contains(&"connect \\a $n$4"));
        assert!(lines.contains(&"connect \\po0 $n$5"));
    }
}
