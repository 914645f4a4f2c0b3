//! AIGER input and output
//!
//! Parsing and writing of both the ASCII (`aag`) and binary (`aig`) formats is
//! done by `flussab-aiger`. This module only turns its records into an [`Aig`]
//! and back. Latches become register outputs and inputs of the network.

use crate::network::{Aig, Network, Signal};
use flussab::DeferredWriter;
use flussab_aiger::aig::{AndGate, Latch, OrderedAig, OrderedAndGate, OrderedLatch};
use flussab_aiger::ParseError;
use hashbrown::HashMap;
use log::warn;
use std::io::{self, Read, Write};
use std::ops;
use thiserror::Error;

/// An AIGER literal: variable index times two, plus one when inverted.
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone)]
#[repr(transparent)]
pub struct Literal(usize);

impl Literal {
    pub fn from_variable(variable: usize, inverted: bool) -> Literal {
        Literal(variable * 2 + inverted as usize)
    }

    pub fn variable(self) -> usize {
        self.0 / 2
    }

    pub fn is_inverted(self) -> bool {
        (self.0 & 1) == 1
    }
}

impl ops::Not for Literal {
    type Output = Literal;

    fn not(self) -> Literal {
        Literal(self.0 ^ 1)
    }
}

impl From<Signal> for Literal {
    fn from(s: Signal) -> Literal {
        Literal(s.raw() as usize)
    }
}

impl flussab_aiger::Lit for Literal {
    const MAX_CODE: usize = u32::MAX as usize;

    fn from_code(code: usize) -> Self {
        Literal(code)
    }

    fn code(self) -> usize {
        self.0
    }
}

/// An error which occurs while reading an AIGER file.
#[derive(Debug, Error)]
pub enum AigerError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A variable is defined twice, or a definition exceeds the maximum
    /// variable index.
    #[error("variable {0} is defined twice or out of range")]
    InvalidDefinition(usize),
    #[error("variable {0} is used but never defined")]
    UndefinedVariable(usize),
    #[error("AND gates form a cycle through variable {0}")]
    Cycle(usize),
    #[error("I/O error while reading: {0}")]
    Io(#[from] io::Error),
}

/// The records of a file, with AND gates keyed by their output variable.
#[derive(Default)]
struct Records {
    max_variable: usize,
    inputs: Vec<Literal>,
    latches: Vec<(Literal, Literal, Option<bool>)>,
    outputs: Vec<Literal>,
    gates: HashMap<usize, [Literal; 2]>,
}

impl Records {
    fn insert_gate(&mut self, output: Literal, inputs: [Literal; 2]) -> Result<(), AigerError> {
        let variable = output.variable();
        if output.is_inverted()
            || variable == 0
            || variable > self.max_variable
            || self.gates.insert(variable, inputs).is_some()
        {
            return Err(AigerError::InvalidDefinition(variable));
        }
        Ok(())
    }

    fn from_ascii(aig: flussab_aiger::aig::Aig<Literal>) -> Result<Records, AigerError> {
        if !aig.bad_state_properties.is_empty() || !aig.invariant_constraints.is_empty() {
            warn!("AIGER bad state properties and invariant constraints are ignored");
        }
        let mut records = Records {
            max_variable: aig.max_var_index,
            inputs: aig.inputs,
            latches: aig
                .latches
                .iter()
                .map(|latch| (latch.state, latch.next_state, latch.initialization))
                .collect(),
            outputs: aig.outputs,
            ..Default::default()
        };
        for gate in &aig.and_gates {
            records.insert_gate(gate.output, gate.inputs)?;
        }
        Ok(records)
    }

    /// Binary files number inputs, then latches, then AND gates.
    fn from_binary(aig: OrderedAig<Literal>) -> Result<Records, AigerError> {
        if !aig.bad_state_properties.is_empty() || !aig.invariant_constraints.is_empty() {
            warn!("AIGER bad state properties and invariant constraints are ignored");
        }
        let latch_offset = aig.input_count + 1;
        let gate_offset = latch_offset + aig.latches.len();
        let mut records = Records {
            max_variable: aig.max_var_index,
            inputs: (1..latch_offset).map(|v| Literal::from_variable(v, false)).collect(),
            latches: aig
                .latches
                .iter()
                .enumerate()
                .map(|(i, latch)| {
                    let state = Literal::from_variable(latch_offset + i, false);
                    (state, latch.next_state, latch.initialization)
                })
                .collect(),
            outputs: aig.outputs,
            ..Default::default()
        };
        for (i, gate) in aig.and_gates.iter().enumerate() {
            records.insert_gate(Literal::from_variable(gate_offset + i, false), gate.inputs)?;
        }
        Ok(records)
    }
}

/// Reads an AIGER file into a network. The format is taken from the header;
/// ASCII files may list AND gates in any order.
pub fn read_aiger<T: Read>(mut reader: T) -> Result<Aig, AigerError> {
    let mut bytes = vec![];
    reader.read_to_end(&mut bytes)?;

    let records = if bytes.starts_with(b"aag") {
        let parser =
            flussab_aiger::ascii::Parser::<Literal>::from_read(io::Cursor::new(bytes), Default::default())?;
        Records::from_ascii(parser.parse()?)?
    } else {
        let parser =
            flussab_aiger::binary::Parser::<Literal>::from_read(io::Cursor::new(bytes), Default::default())?;
        Records::from_binary(parser.parse()?)?
    };
    build(records)
}

fn build(records: Records) -> Result<Aig, AigerError> {
    let Records {
        max_variable,
        inputs,
        latches,
        outputs,
        gates,
    } = records;

    let mut aig = Aig::new();
    let mut signals: HashMap<usize, Signal> = HashMap::new();
    signals.insert(0, aig.get_constant(false));

    let define = |signals: &mut HashMap<usize, Signal>, literal: Literal, s: Signal| {
        let variable = literal.variable();
        if variable == 0 || variable > max_variable || gates.contains_key(&variable) {
            return Err(AigerError::InvalidDefinition(variable));
        }
        match signals.insert(variable, s) {
            Some(_) => Err(AigerError::InvalidDefinition(variable)),
            None => Ok(()),
        }
    };
    for literal in &inputs {
        let s = aig.create_pi();
        define(&mut signals, *literal, s)?;
    }
    for (state, _, init) in &latches {
        let s = aig.create_ro(*init);
        define(&mut signals, *state, s)?;
    }

    let mut resolve = |aig: &mut Aig, literal: Literal| -> Result<Signal, AigerError> {
        resolve_gate(aig, &gates, &mut signals, literal.variable())
            .map(|s| s ^ literal.is_inverted())
    };
    for literal in &outputs {
        let s = resolve(&mut aig, *literal)?;
        aig.create_po(s);
    }
    for (_, next, _) in &latches {
        let s = resolve(&mut aig, *next)?;
        aig.create_ri(s);
    }

    Ok(aig)
}

/// Returns the signal of `variable`, first building every AND gate in its
/// fan-in cone which has not been built yet.
fn resolve_gate(
    aig: &mut Aig,
    gates: &HashMap<usize, [Literal; 2]>,
    signals: &mut HashMap<usize, Signal>,
    variable: usize,
) -> Result<Signal, AigerError> {
    let mut on_stack = vec![];
    let mut stack = vec![(variable, false)];
    while let Some((v, expanded)) = stack.pop() {
        if signals.contains_key(&v) {
            continue;
        }
        let inputs = gates.get(&v).ok_or(AigerError::UndefinedVariable(v))?;

        if expanded {
            let [a, b] = *inputs;
            let a = signals[&a.variable()] ^ a.is_inverted();
            let b = signals[&b.variable()] ^ b.is_inverted();
            signals.insert(v, aig.create_and(a, b));
            on_stack.retain(|u| *u != v);
            continue;
        }

        if on_stack.contains(&v) {
            return Err(AigerError::Cycle(v));
        }
        on_stack.push(v);
        stack.push((v, true));
        for literal in inputs {
            let u = literal.variable();
            if !signals.contains_key(&u) {
                if on_stack.contains(&u) {
                    return Err(AigerError::Cycle(u));
                }
                stack.push((u, false));
            }
        }
    }
    Ok(signals[&variable])
}

/// Converts `aig` into binary AIGER numbering. Dangling logic is dropped.
fn ordered(aig: &Aig) -> OrderedAig<Literal> {
    // After compaction node indices are AIGER variables: the constant, the
    // CIs, then the gates in topological order
    let aig = aig.cleanup();
    let num_pos = aig.num_pos();

    OrderedAig {
        max_var_index: aig.size() - 1,
        input_count: aig.num_pis(),
        latches: aig.cos()[num_pos..]
            .iter()
            .enumerate()
            .map(|(i, next)| OrderedLatch {
                next_state: Literal::from(*next),
                initialization: aig.latch_init(i),
            })
            .collect(),
        outputs: aig.cos()[..num_pos].iter().map(|s| Literal::from(*s)).collect(),
        and_gates: aig
            .gates()
            .map(|n| {
                let fanins = aig.fanins(n);
                OrderedAndGate {
                    inputs: [Literal::from(fanins[1]), Literal::from(fanins[0])],
                }
            })
            .collect(),
        ..Default::default()
    }
}

/// Writes `aig` in the ASCII AIGER format, with AND gates numbered in
/// topological order.
pub fn write_aiger<W: Write>(aig: &Aig, writer: W) -> io::Result<()> {
    let ordered = ordered(aig);
    let latch_offset = ordered.input_count + 1;
    let gate_offset = latch_offset + ordered.latches.len();

    let aig = flussab_aiger::aig::Aig {
        max_var_index: ordered.max_var_index,
        inputs: (1..latch_offset).map(|v| Literal::from_variable(v, false)).collect(),
        latches: ordered
            .latches
            .iter()
            .enumerate()
            .map(|(i, latch)| Latch {
                state: Literal::from_variable(latch_offset + i, false),
                next_state: latch.next_state,
                initialization: latch.initialization,
            })
            .collect(),
        outputs: ordered.outputs,
        and_gates: ordered
            .and_gates
            .iter()
            .enumerate()
            .map(|(i, gate)| AndGate {
                output: Literal::from_variable(gate_offset + i, false),
                inputs: gate.inputs,
            })
            .collect(),
        ..Default::default()
    };

    let mut writer = DeferredWriter::from_write(writer);
    flussab_aiger::ascii::Writer::<Literal>::new(&mut writer).write_aig(&aig);
    writer.flush()
}

/// Writes `aig` in the binary AIGER format.
pub fn write_aiger_binary<W: Write>(aig: &Aig, writer: W) -> io::Result<()> {
    let mut writer =
        flussab_aiger::binary::Writer::<Literal>::new(DeferredWriter::from_write(writer));
    writer.write_ordered_aig(&ordered(aig));
    writer.flush()
}
