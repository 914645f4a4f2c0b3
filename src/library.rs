//! Technology libraries
//!
//! Every gate is expanded into all of its input permutation and negation
//! variants, each stored under its own truth table. Matching a cut is then
//! a single lookup of the cut function: supergate `sg` implements it by
//! connecting cut leaf `i` to gate pin `sg.permutation[i]`, through an
//! inverter when bit `i` of `sg.polarity` is set.
//!
//! Besides the plain gates, a library may hold supergates composed of several
//! gates, given as [`SupergateDefinition`]s. They are matched the same way
//! and expand into one cell per instance.

use crate::error::{Error, Result};
use crate::klut::compose;
use crate::npn::{apply_transform, np_enumeration, NpnTransform, MAX_NPN_VARS};
use crate::truth_table::TruthTable;
use hashbrown::HashMap;
use log::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinPhase {
    Inverting,
    NonInverting,
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pin {
    pub name: String,
    pub phase: PinPhase,
    pub input_load: f32,
    pub max_load: f32,
    pub rise_block_delay: f32,
    pub rise_fanout_delay: f32,
    pub fall_block_delay: f32,
    pub fall_fanout_delay: f32,
}

impl Pin {
    /// Worst of the rise and fall block delays.
    pub fn delay(&self) -> f32 {
        self.rise_block_delay.max(self.fall_block_delay)
    }
}

/// A single-output cell. Variable `i` of `function` is pin `i`.
#[derive(Clone, Debug, PartialEq)]
pub struct Gate {
    pub id: u32,
    pub name: String,
    pub output_name: String,
    pub expression: String,
    pub function: TruthTable,
    pub area: f32,
    pub pins: Vec<Pin>,
}

impl Gate {
    pub fn num_vars(&self) -> u32 {
        self.function.num_vars()
    }
}

/// Source of an input of a gate instance inside a composed supergate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupergateInput {
    /// Supergate input `i`.
    Pin(u8),
    /// Output of an earlier instance.
    Instance(u8),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GateInstance {
    pub gate: u32,
    /// Source of each pin of the gate.
    pub fanins: Vec<SupergateInput>,
}

/// A composition of library gates over `num_vars` inputs, as listed in a
/// supergate file. Instances are in topological order and the last one
/// drives the output.
#[derive(Clone, Debug, PartialEq)]
pub struct SupergateDefinition {
    pub num_vars: u32,
    pub instances: Vec<GateInstance>,
}

impl SupergateDefinition {
    /// Returns the function, the area and the delay from each input to the
    /// output of the composition.
    pub fn evaluate(&self, gates: &[Gate]) -> Result<(TruthTable, f32, Vec<f32>)> {
        let invalid = |message: String| Err(Error::InvalidParameter(format!("supergate: {}", message)));
        let num_vars = self.num_vars;
        if num_vars == 0 || num_vars > MAX_NPN_VARS {
            return invalid(format!("{} inputs, between 1 and {} are supported", num_vars, MAX_NPN_VARS));
        }
        if self.instances.is_empty() {
            return invalid("no gate instances".to_string());
        }

        let mut functions: Vec<TruthTable> = vec![];
        let mut delays: Vec<Vec<Option<f32>>> = vec![];
        let mut used = vec![false; self.instances.len()];
        let mut area = 0.0;
        for (j, instance) in self.instances.iter().enumerate() {
            let Some(gate) = gates.get(instance.gate as usize) else {
                return invalid(format!("unknown gate {}", instance.gate));
            };
            if gate.num_vars() == 0 || instance.fanins.len() != gate.num_vars() as usize {
                return invalid(format!(
                    "gate {} has {} pins but {} fan-ins are given",
                    gate.name,
                    gate.num_vars(),
                    instance.fanins.len()
                ));
            }

            let mut inputs = Vec::with_capacity(instance.fanins.len());
            let mut delay: Vec<Option<f32>> = vec![None; num_vars as usize];
            for (pin, fanin) in gate.pins.iter().zip(&instance.fanins) {
                match *fanin {
                    SupergateInput::Pin(i) if (i as u32) < num_vars => {
                        inputs.push(TruthTable::nth_var(num_vars, i as u32));
                        let d = &mut delay[i as usize];
                        *d = Some(d.map_or(pin.delay(), |d| d.max(pin.delay())));
                    }
                    SupergateInput::Instance(k) if (k as usize) < j => {
                        used[k as usize] = true;
                        inputs.push(functions[k as usize].clone());
                        for (d, from) in delay.iter_mut().zip(&delays[k as usize]) {
                            if let Some(from) = from {
                                let through = from + pin.delay();
                                *d = Some(d.map_or(through, |d| d.max(through)));
                            }
                        }
                    }
                    _ => return invalid(format!("instance {} has an invalid fan-in {:?}", j, fanin)),
                }
            }

            functions.push(compose(&gate.function, &inputs));
            delays.push(delay);
            area += gate.area;
        }

        if let Some(j) = used[..used.len() - 1].iter().position(|u| !u) {
            return invalid(format!("instance {} drives nothing", j));
        }

        let function = functions.pop().unwrap_or_else(|| TruthTable::new(num_vars));
        let delay = delays
            .pop()
            .unwrap_or_default()
            .into_iter()
            .map(|d| d.unwrap_or(0.0))
            .collect();
        Ok((function, area, delay))
    }
}

/// One way of implementing a function with a gate or a composition of
/// gates.
#[derive(Clone, Debug, PartialEq)]
pub struct Supergate {
    /// Id of the gate in the library. For a composed supergate, the gate
    /// driving the output.
    pub gate: u32,
    pub area: f32,
    /// Delay from each cut leaf to the output.
    pub delay: Vec<f32>,
    /// Gate pin driven by each cut leaf.
    pub permutation: Vec<u8>,
    /// Cut leaves which drive their pin through an inverter.
    pub polarity: u32,
    /// The gates of a composed supergate, whose pins are then the inputs
    /// of the composition. Empty for a single gate.
    pub instances: Vec<GateInstance>,
}

impl Supergate {
    pub fn num_vars(&self) -> usize {
        self.permutation.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TechLibraryParams {
    /// Store input negation variants next to permutation variants. Without
    /// them a cut only matches a gate whose pins it drives uncomplemented.
    pub np_classification: bool,
    pub verbose: bool,
}

impl Default for TechLibraryParams {
    fn default() -> Self {
        TechLibraryParams {
            np_classification: true,
            verbose: false,
        }
    }
}

/// Area, delay and gate id of a single-input cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellInfo {
    pub area: f32,
    pub delay: f32,
    pub gate: u32,
}

/// A cell with two outputs over shared pins.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiOutputGate {
    pub name: String,
    /// Ids of the single-output views of each output.
    pub outputs: [u32; 2],
    pub area: f32,
    /// Share of the area attributed to each output.
    pub output_areas: [f32; 2],
}

/// One way of implementing a pair of functions with a multi-output gate.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiOutputSupergate {
    /// Index into [`TechLibrary::multi_output_gates`].
    pub multi_gate: u32,
    /// Gate output computing each function of the key.
    pub outputs: [u8; 2],
    pub permutation: Vec<u8>,
    pub polarity: u32,
}

pub struct TechLibrary {
    gates: Vec<Gate>,
    super_lib: HashMap<TruthTable, Vec<Supergate>>,
    multi_gates: Vec<MultiOutputGate>,
    multi_lib: HashMap<(TruthTable, TruthTable), Vec<MultiOutputSupergate>>,
    inverter: Option<CellInfo>,
    buffer: Option<CellInfo>,
    max_gate_size: u32,
}

impl TechLibrary {
    pub fn new(gates: Vec<Gate>, params: &TechLibraryParams) -> TechLibrary {
        let mut library = TechLibrary {
            gates,
            super_lib: HashMap::new(),
            multi_gates: vec![],
            multi_lib: HashMap::new(),
            inverter: None,
            buffer: None,
            max_gate_size: 0,
        };
        for (i, gate) in library.gates.iter_mut().enumerate() {
            gate.id = i as u32;
        }

        let multi_members = library.group_multi_output_gates();
        library.generate_library(&multi_members, params);
        library.generate_multi_output_library(params);

        if library.inverter.is_none() {
            warn!("library contains no inverter");
        }
        if library.buffer.is_none() {
            warn!("library contains no buffer");
        }

        let summary = format!(
            "library: {} gates, {} functions, {} multi-output gates",
            library.gates.len(),
            library.super_lib.len(),
            library.multi_gates.len()
        );
        if params.verbose {
            info!("{}", summary);
        } else {
            debug!("{}", summary);
        }

        library
    }

    /// Builds the library of `gates` and adds the composed supergates of
    /// `supergates`, whose instances refer to gates by their index in
    /// `gates`.
    pub fn with_supergates(
        gates: Vec<Gate>,
        supergates: &[SupergateDefinition],
        params: &TechLibraryParams,
    ) -> Result<TechLibrary> {
        let mut library = TechLibrary::new(gates, params);
        for definition in supergates {
            library.add_supergate(definition, params)?;
        }
        debug!("library: {} supergates added", supergates.len());
        Ok(library)
    }

    fn add_supergate(&mut self, definition: &SupergateDefinition, params: &TechLibraryParams) -> Result<()> {
        let (function, area, delays) = definition.evaluate(&self.gates)?;
        let root = definition.instances[definition.instances.len() - 1].gate;
        self.max_gate_size = self.max_gate_size.max(definition.num_vars);

        let super_lib = &mut self.super_lib;
        np_enumeration(&function, |tt, transform| {
            if !params.np_classification && transform.input_negations != 0 {
                return;
            }
            let supergate = Supergate {
                gate: root,
                area,
                delay: transform.perm.iter().map(|p| delays[*p as usize]).collect(),
                permutation: transform.perm.clone(),
                polarity: transform.input_negations,
                instances: definition.instances.clone(),
            };
            insert_supergate(super_lib.entry(tt.clone()).or_default(), supergate);
        });
        Ok(())
    }

    /// Groups gates which share a name into multi-output gates and returns
    /// the ids of their members.
    fn group_multi_output_gates(&mut self) -> Vec<u32> {
        let mut by_name: HashMap<&str, Vec<u32>> = HashMap::new();
        for gate in &self.gates {
            by_name.entry(gate.name.as_str()).or_default().push(gate.id);
        }

        let mut groups = by_name
            .into_values()
            .filter(|ids| ids.len() > 1)
            .collect::<Vec<_>>();
        groups.sort();

        let mut members = vec![];
        for ids in groups {
            members.extend_from_slice(&ids);
            let first = &self.gates[ids[0] as usize];
            let shared_pins = ids
                .iter()
                .all(|id| self.gates[*id as usize].pins == first.pins);
            if ids.len() != 2 || !shared_pins {
                warn!(
                    "skipping multi-output gate {}: only two outputs over shared pins are supported",
                    first.name
                );
                continue;
            }

            self.multi_gates.push(MultiOutputGate {
                name: first.name.clone(),
                outputs: [ids[0], ids[1]],
                area: first.area,
                output_areas: [first.area / 2.0; 2],
            });
        }

        members
    }

    fn generate_library(&mut self, multi_members: &[u32], params: &TechLibraryParams) {
        for gate in &self.gates {
            let num_vars = gate.num_vars();
            if multi_members.contains(&gate.id) || num_vars == 0 {
                continue;
            }
            if num_vars > MAX_NPN_VARS {
                warn!(
                    "skipping gate {}: {} inputs exceed the supported {}",
                    gate.name, num_vars, MAX_NPN_VARS
                );
                continue;
            }

            self.max_gate_size = self.max_gate_size.max(num_vars);

            if num_vars == 1 {
                let info = CellInfo {
                    area: gate.area,
                    delay: gate.pins[0].delay(),
                    gate: gate.id,
                };
                let slot = match gate.function.as_u64() {
                    0x1 => Some(&mut self.inverter),
                    0x2 => Some(&mut self.buffer),
                    _ => None,
                };
                if let Some(slot) = slot {
                    if slot.map_or(true, |current| info.area < current.area) {
                        *slot = Some(info);
                    }
                }
            }

            let super_lib = &mut self.super_lib;
            let mut on_variant = |tt: &TruthTable, transform: &NpnTransform| {
                if !params.np_classification && transform.input_negations != 0 {
                    return;
                }
                let supergate = make_supergate(gate, transform);
                insert_supergate(super_lib.entry(tt.clone()).or_default(), supergate);
            };
            np_enumeration(&gate.function, &mut on_variant);
        }
    }

    fn generate_multi_output_library(&mut self, params: &TechLibraryParams) {
        for i in 0..self.multi_gates.len() {
            let [o0, o1] = self.multi_gates[i].outputs;
            let f0 = self.gates[o0 as usize].function.clone();
            let f1 = self.gates[o1 as usize].function.clone();

            let estimates = [self.single_output_area(&f0), self.single_output_area(&f1)];
            let total = self.multi_gates[i].area;
            self.multi_gates[i].output_areas = redistribute_area(total, &estimates);

            if f0.num_vars() > MAX_NPN_VARS {
                continue;
            }

            let multi_lib = &mut self.multi_lib;
            np_enumeration(&f0, |_, transform| {
                if !params.np_classification && transform.input_negations != 0 {
                    return;
                }
                let g0 = apply_transform(&f0, transform);
                let g1 = apply_transform(&f1, transform);
                let (key, outputs) = if g0 <= g1 {
                    ((g0, g1), [0, 1])
                } else {
                    ((g1, g0), [1, 0])
                };
                let supergate = MultiOutputSupergate {
                    multi_gate: i as u32,
                    outputs,
                    permutation: transform.perm.clone(),
                    polarity: transform.input_negations,
                };
                let entry = multi_lib.entry(key).or_default();
                if !entry.iter().any(|sg| {
                    sg.multi_gate == supergate.multi_gate
                        && sg.polarity == supergate.polarity
                        && sg.outputs == supergate.outputs
                }) {
                    entry.push(supergate);
                }
            });
        }
    }

    /// Area of the cheapest single-output match of `function`, if any.
    fn single_output_area(&self, function: &TruthTable) -> Option<f32> {
        self.get_supergates(function)
            .and_then(|supergates| supergates.first())
            .map(|sg| sg.area)
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    pub fn gate(&self, id: u32) -> &Gate {
        &self.gates[id as usize]
    }

    /// Returns the matches of `function`, cheapest first.
    pub fn get_supergates(&self, function: &TruthTable) -> Option<&[Supergate]> {
        self.super_lib
            .get(function)
            .map(|v| v.as_slice())
            .filter(|v| !v.is_empty())
    }

    /// Returns the multi-output matches of a pair of functions over the
    /// same leaves. The pair may be given in either order; the returned
    /// supergates refer to the functions sorted by their bits.
    pub fn get_multi_supergates(&self, f0: &TruthTable, f1: &TruthTable) -> Option<&[MultiOutputSupergate]> {
        let key = if f0 <= f1 {
            (f0.clone(), f1.clone())
        } else {
            (f1.clone(), f0.clone())
        };
        self.multi_lib.get(&key).map(|v| v.as_slice())
    }

    pub fn multi_output_gates(&self) -> &[MultiOutputGate] {
        &self.multi_gates
    }

    pub fn inverter(&self) -> Option<CellInfo> {
        self.inverter
    }

    pub fn buffer(&self) -> Option<CellInfo> {
        self.buffer
    }

    /// Largest number of inputs of a matchable gate.
    pub fn max_gate_size(&self) -> u32 {
        self.max_gate_size
    }
}

fn make_supergate(gate: &Gate, transform: &NpnTransform) -> Supergate {
    Supergate {
        gate: gate.id,
        area: gate.area,
        delay: transform
            .perm
            .iter()
            .map(|p| gate.pins[*p as usize].delay())
            .collect(),
        permutation: transform.perm.clone(),
        polarity: transform.input_negations,
        instances: vec![],
    }
}

/// Inserts a supergate keeping the list sorted by area, then input count,
/// then gate id. A supergate of the same gates with the same polarity and
/// delays as an existing one is dropped.
fn insert_supergate(list: &mut Vec<Supergate>, supergate: Supergate) {
    if list.iter().any(|sg| {
        sg.gate == supergate.gate
            && sg.polarity == supergate.polarity
            && sg.delay == supergate.delay
            && sg.instances == supergate.instances
    }) {
        return;
    }

    let key = |sg: &Supergate| (sg.area, sg.num_vars(), sg.gate);
    let new_key = key(&supergate);
    let position = list.partition_point(|sg| {
        let k = key(sg);
        k.0 < new_key.0 || (k.0 == new_key.0 && (k.1, k.2) <= (new_key.1, new_key.2))
    });
    list.insert(position, supergate);
}

/// Splits the area of a multi-output gate over its outputs, given the area
/// of the cheapest single-output cell for each output function.
///
/// Estimates are scaled down when they add up to more than the total.
/// Outputs without an estimate share what is left equally. The shares
/// never exceed the total and a matched output never gets a zero share.
pub fn redistribute_area(total: f32, estimates: &[Option<f32>]) -> [f32; 2] {
    assert_eq!(estimates.len(), 2, "multi-output gates have two outputs");

    let estimates = estimates
        .iter()
        .map(|e| e.filter(|area| *area > 0.0))
        .collect::<Vec<_>>();
    let matched_sum = estimates.iter().flatten().sum::<f32>();
    let num_unmatched = estimates.iter().filter(|e| e.is_none()).count();

    let scale = if matched_sum > total { total / matched_sum } else { 1.0 };
    let remainder = (total - matched_sum * scale).max(0.0);

    let mut areas = [0.0; 2];
    for (area, estimate) in areas.iter_mut().zip(estimates.iter()) {
        *area = match estimate {
            Some(e) => e * scale,
            None => remainder / num_unmatched as f32,
        };
    }
    areas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npn::apply_transform;

    fn pin(name: &str, delay: f32) -> Pin {
        Pin {
            name: name.to_string(),
            phase: PinPhase::Unknown,
            input_load: 1.0,
            max_load: 999.0,
            rise_block_delay: delay,
            rise_fanout_delay: 0.0,
            fall_block_delay: delay,
            fall_fanout_delay: 0.0,
        }
    }

    fn gate(name: &str, function: TruthTable, area: f32, delays: &[f32]) -> Gate {
        Gate {
            id: 0,
            name: name.to_string(),
            output_name: "O".to_string(),
            expression: String::new(),
            function,
            area,
            pins: delays
                .iter()
                .enumerate()
                .map(|(i, d)| pin(&format!("{}", (b'a' + i as u8) as char), *d))
                .collect(),
        }
    }

    #[test]
    fn nand_and_inverter() {
        let gates = vec![
            gate("inv", TruthTable::from_u64(1, 0x1), 1.0, &[1.0]),
            gate("nand2", TruthTable::from_u64(2, 0x7), 2.0, &[1.0, 1.0]),
        ];
        let library = TechLibrary::new(gates, &TechLibraryParams::default());

        assert_eq!(library.inverter().map(|i| i.gate), Some(0));
        assert_eq!(library.buffer(), None);
        assert_eq!(library.max_gate_size(), 2);

        // No variant of NAND computes AND
        assert!(library.get_supergates(&TruthTable::from_u64(2, 0x8)).is_none());
        // a | b is NAND with both inputs inverted
        let or = library.get_supergates(&TruthTable::from_u64(2, 0xe)).unwrap();
        assert_eq!(or.len(), 1);
        assert_eq!(or[0].polarity, 0b11);
        // NAND is symmetric, so both permutations collapse
        assert_eq!(library.get_supergates(&TruthTable::from_u64(2, 0x7)).unwrap().len(), 1);
    }

    #[test]
    fn supergates_reproduce_the_matched_function() {
        let gates = vec![
            gate("aoi21", TruthTable::from_u64(3, 0x15), 3.0, &[1.0, 1.2, 0.8]),
            gate("mux2", TruthTable::from_u64(3, 0xd8), 4.0, &[2.0, 1.0, 1.0]),
        ];
        let library = TechLibrary::new(gates, &TechLibraryParams::default());

        for bits in 0..256u64 {
            let tt = TruthTable::from_u64(3, bits);
            for sg in library.get_supergates(&tt).unwrap_or(&[]) {
                let transform = NpnTransform {
                    perm: sg.permutation.clone(),
                    input_negations: sg.polarity,
                    output_negation: false,
                };
                assert_eq!(apply_transform(&library.gate(sg.gate).function, &transform), tt);
                let pins = &library.gate(sg.gate).pins;
                for (leaf, delay) in sg.delay.iter().enumerate() {
                    assert_eq!(*delay, pins[sg.permutation[leaf] as usize].delay());
                }
            }
        }
    }

    #[test]
    fn sorted_by_area_then_size() {
        let gates = vec![
            gate("and3", TruthTable::from_u64(2, 0x8).extend_to(3) & TruthTable::nth_var(3, 2), 3.0, &[1.0; 3]),
            gate("and2_big", TruthTable::from_u64(2, 0x8), 3.0, &[1.0; 2]),
            gate("and2", TruthTable::from_u64(2, 0x8), 2.0, &[1.0; 2]),
            gate("and2_alt", TruthTable::from_u64(2, 0x8), 2.0, &[1.0; 2]),
        ];
        let library = TechLibrary::new(gates, &TechLibraryParams::default());
        let and = library.get_supergates(&TruthTable::from_u64(2, 0x8)).unwrap();
        let ids = and.iter().map(|sg| sg.gate).collect::<Vec<_>>();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn permutation_only() {
        let gates = vec![gate("nand2", TruthTable::from_u64(2, 0x7), 2.0, &[1.0, 1.0])];
        let params = TechLibraryParams {
            np_classification: false,
            verbose: false,
        };
        let library = TechLibrary::new(gates, &params);
        assert!(library.get_supergates(&TruthTable::from_u64(2, 0xe)).is_none());
        assert!(library.get_supergates(&TruthTable::from_u64(2, 0x7)).is_some());
    }

    fn nand_inverter_gates() -> Vec<Gate> {
        vec![
            gate("inv", TruthTable::from_u64(1, 0x1), 1.0, &[1.0]),
            gate("nand2", TruthTable::from_u64(2, 0x7), 2.0, &[1.0, 1.5]),
        ]
    }

    #[test]
    fn composed_supergates() {
        // and2 = inv(nand2(a, b)); nand_nand = nand2(nand2(a, b), c)
        let and2 = SupergateDefinition {
            num_vars: 2,
            instances: vec![
                GateInstance {
                    gate: 1,
                    fanins: vec![SupergateInput::Pin(0), SupergateInput::Pin(1)],
                },
                GateInstance {
                    gate: 0,
                    fanins: vec![SupergateInput::Instance(0)],
                },
            ],
        };
        let nand_nand = SupergateDefinition {
            num_vars: 3,
            instances: vec![
                GateInstance {
                    gate: 1,
                    fanins: vec![SupergateInput::Pin(0), SupergateInput::Pin(1)],
                },
                GateInstance {
                    gate: 1,
                    fanins: vec![SupergateInput::Instance(0), SupergateInput::Pin(2)],
                },
            ],
        };

        // a & b | !c
        let (function, area, delay) = nand_nand.evaluate(&nand_inverter_gates()).unwrap();
        assert_eq!(function.as_u64(), 0x8f);
        assert_eq!(area, 4.0);
        assert_eq!(delay, vec![2.0, 2.5, 1.5]);

        let library = TechLibrary::with_supergates(
            nand_inverter_gates(),
            &[and2.clone(), nand_nand],
            &TechLibraryParams::default(),
        )
        .unwrap();
        assert_eq!(library.max_gate_size(), 3);

        // Both pin orders of the composition, with their own delays
        let and = library.get_supergates(&TruthTable::from_u64(2, 0x8)).unwrap();
        assert_eq!(and.len(), 2);
        assert!(and.iter().all(|sg| sg.gate == 0 && sg.area == 3.0 && sg.polarity == 0));
        assert!(and.iter().all(|sg| sg.instances == and2.instances));
        assert!(and.iter().any(|sg| sg.delay == vec![2.0, 2.5]));
        assert!(and.iter().any(|sg| sg.delay == vec![2.5, 2.0]));

        // NP variants of the composition are matched as well
        let nor = library.get_supergates(&TruthTable::from_u64(2, 0x1)).unwrap();
        assert!(nor.iter().all(|sg| sg.instances == and2.instances && sg.polarity == 0b11));
        let three = library.get_supergates(&TruthTable::from_u64(3, 0x8f)).unwrap();
        assert!(three.iter().all(|sg| sg.instances.len() == 2 && sg.area == 4.0));

        // Plain gates are still there
        let nand = library.get_supergates(&TruthTable::from_u64(2, 0x7)).unwrap();
        assert!(nand.iter().all(|sg| sg.instances.is_empty()));
    }

    #[test]
    fn invalid_supergate_definitions() {
        let params = TechLibraryParams::default();
        let invalid = |instances: Vec<GateInstance>| {
            let definition = SupergateDefinition { num_vars: 2, instances };
            matches!(
                TechLibrary::with_supergates(nand_inverter_gates(), &[definition], &params),
                Err(Error::InvalidParameter(_))
            )
        };

        assert!(invalid(vec![]));
        assert!(invalid(vec![GateInstance {
            gate: 7,
            fanins: vec![SupergateInput::Pin(0)],
        }]));
        // Wrong pin count
        assert!(invalid(vec![GateInstance {
            gate: 1,
            fanins: vec![SupergateInput::Pin(0)],
        }]));
        // Input out of range, and an instance used before it exists
        assert!(invalid(vec![GateInstance {
            gate: 0,
            fanins: vec![SupergateInput::Pin(2)],
        }]));
        assert!(invalid(vec![GateInstance {
            gate: 0,
            fanins: vec![SupergateInput::Instance(0)],
        }]));
        // The first inverter drives nothing
        assert!(invalid(vec![
            GateInstance {
                gate: 0,
                fanins: vec![SupergateInput::Pin(0)],
            },
            GateInstance {
                gate: 1,
                fanins: vec![SupergateInput::Pin(0), SupergateInput::Pin(1)],
            },
        ]));
    }

    #[test]
    fn multi_output_area_redistribution() {
        // Estimates sum to less than the total: they are kept as they are
        let areas = redistribute_area(10.0, &[Some(4.0), Some(4.0)]);
        assert!(areas.iter().sum::<f32>() <= 10.0);
        assert!(areas.iter().all(|a| *a > 0.0));
        assert_eq!(areas, [4.0, 4.0]);

        // Estimates above the total are scaled down
        let areas = redistribute_area(10.0, &[Some(8.0), Some(12.0)]);
        assert!((areas[0] - 4.0).abs() < 1e-6);
        assert!((areas[1] - 6.0).abs() < 1e-6);

        // The unmatched output gets what is left
        assert_eq!(redistribute_area(10.0, &[Some(3.0), None]), [3.0, 7.0]);
        assert_eq!(redistribute_area(10.0, &[None, None]), [5.0, 5.0]);
    }

    #[test]
    fn multi_output_gates() {
        let a = TruthTable::nth_var(2, 0);
        let b = TruthTable::nth_var(2, 1);
        let mut sum = gate("ha", &a ^ &b, 10.0, &[1.0, 1.0]);
        sum.output_name = "S".to_string();
        let mut carry = gate("ha", &a & &b, 10.0, &[1.0, 1.0]);
        carry.output_name = "C".to_string();
        let gates = vec![
            gate("inv", TruthTable::from_u64(1, 0x1), 1.0, &[1.0]),
            sum,
            carry,
            gate("xor2", &a ^ &b, 4.0, &[1.0, 1.0]),
            gate("and2", &a & &b, 4.0, &[1.0, 1.0]),
        ];
        let library = TechLibrary::new(gates, &TechLibraryParams::default());

        let multi = &library.multi_output_gates()[0];
        assert_eq!(multi.outputs, [1, 2]);
        assert_eq!(multi.output_areas, [4.0, 4.0]);

        // Members of multi-output gates are not matched on their own
        let xor = library.get_supergates(&(&a ^ &b)).unwrap();
        assert!(xor.iter().all(|sg| sg.gate == 3));

        // The pair matches in either order
        let forward = library.get_multi_supergates(&(&a ^ &b), &(&a & &b)).unwrap();
        let backward = library.get_multi_supergates(&(&a & &b), &(&a ^ &b)).unwrap();
        assert_eq!(forward, backward);
        // Negating both inputs keeps the sum and turns the carry into a NOR
        assert!(library.get_multi_supergates(&(&!&a & &!&b), &(&a ^ &b)).is_some());
        assert!(library.get_multi_supergates(&(&!&a & &b), &(&a ^ &b)).is_none());
    }
}
