use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use cutmap::aiger::{read_aiger, write_aiger, write_aiger_binary};
use cutmap::backends::{write_rtlil_cells, write_rtlil_luts};
use cutmap::cut_enumeration::CutEnumerationParams;
use cutmap::exact_library::{ExactLibrary, ExactLibraryParams};
use cutmap::genlib::read_genlib;
use cutmap::library::{TechLibrary, TechLibraryParams};
use cutmap::lut_mapper::{lut_map, LutMapParams};
use cutmap::optimizer::{optimize, OptimizerParams};
use cutmap::refactor::{refactor, RefactorParams};
use cutmap::resynthesis::SopFactoring;
use cutmap::rewrite::{rewrite, RewriteParams};
use cutmap::simulate::equivalent;
use cutmap::tech_mapper::{tech_map, TechMapParams};
use cutmap::truth_table::MAX_VARS;
use cutmap::{Aig, Network};
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Cut-based AIG optimisation and technology mapping
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args)]
struct Common {
    /// AIGER input file, ASCII or binary
    input: PathBuf,

    /// Output file; nothing is written if omitted. AIGER results are binary
    /// when the name ends in `.aig`
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Check the result against the input by exhaustive simulation
    #[arg(long)]
    verify: bool,
}

#[derive(Args)]
struct Cuts {
    /// Largest number of leaves in a cut
    #[arg(short = 'k', long)]
    cut_size: Option<u32>,

    /// Largest number of cuts kept per node
    #[arg(short = 'c', long)]
    cut_limit: Option<u32>,
}

impl Cuts {
    fn apply(&self, params: &mut CutEnumerationParams) {
        if let Some(cut_size) = self.cut_size {
            params.cut_size = cut_size;
        }
        if let Some(cut_limit) = self.cut_limit {
            params.cut_limit = cut_limit;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite cuts with pre-computed structures
    Rewrite {
        #[command(flatten)]
        common: Common,
        #[command(flatten)]
        cuts: Cuts,
        /// Rewrite over MFFC leaves instead of enumerated cuts
        #[arg(long)]
        use_mffc: bool,
        /// Minimise literals instead of gates
        #[arg(long)]
        literals: bool,
        #[arg(long)]
        allow_zero_gain: bool,
        #[arg(long)]
        preserve_depth: bool,
    },

    /// Collapse and resynthesise MFFCs
    Refactor {
        #[command(flatten)]
        common: Common,
        /// Largest number of window inputs
        #[arg(long, default_value_t = 6)]
        max_pis: u32,
        #[arg(long)]
        allow_zero_gain: bool,
        #[arg(long)]
        preserve_depth: bool,
    },

    /// Rewrite and refactor until no gain
    Optimize {
        #[command(flatten)]
        common: Common,
        #[command(flatten)]
        cuts: Cuts,
        /// Largest number of rounds, 0 for no limit
        #[arg(short, long, default_value_t = 0)]
        rounds: u32,
        /// Skip refactoring
        #[arg(long)]
        no_refactor: bool,
        #[arg(long)]
        allow_zero_gain: bool,
        #[arg(long)]
        preserve_depth: bool,
    },

    /// Map into k-input LUTs, written as RTLIL
    Lut {
        #[command(flatten)]
        common: Common,
        #[command(flatten)]
        cuts: Cuts,
        /// Required depth, 0 for the best depth
        #[arg(long, default_value_t = 0)]
        required: u32,
        #[arg(long, default_value_t = 1)]
        area_flow_rounds: u32,
        #[arg(long, default_value_t = 2)]
        ela_rounds: u32,
        #[arg(long)]
        skip_delay_round: bool,
    },

    /// Map onto a GENLIB cell library, written as RTLIL
    Map {
        #[command(flatten)]
        common: Common,
        #[command(flatten)]
        cuts: Cuts,
        /// GENLIB library
        #[arg(short, long)]
        genlib: PathBuf,
        /// Required time, 0 for the best delay
        #[arg(long, default_value_t = 0.0)]
        required: f32,
        /// Relative slack on the best delay for area recovery
        #[arg(long, default_value_t = 0.0)]
        area_margin: f32,
        #[arg(long, default_value_t = 1)]
        area_flow_rounds: u32,
        #[arg(long, default_value_t = 2)]
        ela_rounds: u32,
        #[arg(long)]
        skip_delay_round: bool,
    },
}

fn read_input(path: &Path) -> Result<Aig> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let aig = read_aiger(file).with_context(|| format!("failed to read {}", path.display()))?;
    info!(
        "read {}: {} inputs, {} outputs, {} latches, {} gates",
        path.display(),
        aig.num_pis(),
        aig.num_pos(),
        aig.num_latches(),
        aig.num_gates()
    );
    Ok(aig)
}

/// Creates `path`, runs `write` on a buffered writer for it and flushes the
/// buffer.
fn write_output(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)
        .and_then(|_| writer.flush())
        .with_context(|| format!("failed to write {}", path.display()))
}

fn verify<N: Network>(original: &Aig, result: &N) -> Result<()> {
    if original.num_cis() > MAX_VARS as usize {
        warn!(
            "skipping verification: {} inputs exceed the simulation limit of {}",
            original.num_cis(),
            MAX_VARS
        );
        return Ok(());
    }
    if !equivalent(original, result) {
        bail!("result is not equivalent to the input");
    }
    info!("verified by simulation");
    Ok(())
}

/// Runs an AIG to AIG pass and writes the result as AIGER.
fn run_optimization(common: &Common, pass: impl FnOnce(&mut Aig) -> Result<String>) -> Result<()> {
    let original = read_input(&common.input)?;
    let mut aig = original.clone();
    let stats = pass(&mut aig)?;
    let aig = aig.cleanup();
    println!("{}", stats);

    if common.verify {
        verify(&original, &aig)?;
    }
    if let Some(path) = &common.output {
        let binary = path.extension().map_or(false, |extension| extension == "aig");
        write_output(path, |writer| {
            if binary {
                write_aiger_binary(&aig, writer)
            } else {
                write_aiger(&aig, writer)
            }
        })?;
    }
    Ok(())
}

fn exact_library() -> Result<ExactLibrary> {
    Ok(ExactLibrary::new(
        &mut SopFactoring::default(),
        &ExactLibraryParams::default(),
    )?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Rewrite {
            common,
            cuts,
            use_mffc,
            literals,
            allow_zero_gain,
            preserve_depth,
        } => {
            let mut params = RewriteParams {
                use_mffc,
                optimize_literal_cost: literals,
                allow_zero_gain,
                preserve_depth,
                verbose: cli.verbose > 0,
                ..Default::default()
            };
            cuts.apply(&mut params.cut_enumeration);
            params.validate()?;
            let library = exact_library()?;
            run_optimization(&common, |aig| Ok(rewrite(aig, &library, &params)?.to_string()))?;
        }

        Commands::Refactor {
            common,
            max_pis,
            allow_zero_gain,
            preserve_depth,
        } => {
            let params = RefactorParams {
                max_pis,
                allow_zero_gain,
                preserve_depth,
                verbose: cli.verbose > 0,
            };
            run_optimization(&common, |aig| {
                Ok(refactor(aig, &mut SopFactoring::default(), &params)?.to_string())
            })?;
        }

        Commands::Optimize {
            common,
            cuts,
            rounds,
            no_refactor,
            allow_zero_gain,
            preserve_depth,
        } => {
            let mut params = OptimizerParams {
                max_rounds: rounds,
                run_refactor: !no_refactor,
                ..Default::default()
            };
            cuts.apply(&mut params.rewrite.cut_enumeration);
            params.rewrite.allow_zero_gain = allow_zero_gain;
            params.rewrite.preserve_depth = preserve_depth;
            params.refactor.allow_zero_gain = allow_zero_gain;
            params.refactor.preserve_depth = preserve_depth;
            params.rewrite.verbose = cli.verbose > 0;
            params.rewrite.validate()?;
            let library = exact_library()?;
            run_optimization(&common, |aig| {
                Ok(optimize(aig, &library, &mut SopFactoring::default(), &params)?.to_string())
            })?;
        }

        Commands::Lut {
            common,
            cuts,
            required,
            area_flow_rounds,
            ela_rounds,
            skip_delay_round,
        } => {
            let mut params = LutMapParams {
                required_delay: required,
                area_flow_rounds,
                ela_rounds,
                skip_delay_round,
                verbose: cli.verbose > 0,
                ..Default::default()
            };
            cuts.apply(&mut params.cut_enumeration);

            let aig = read_input(&common.input)?;
            let (klut, stats) = lut_map(&aig, &params)?;
            println!("{}", stats);
            println!("[i] LUTs           = {}", klut.num_gates());
            println!("[i] depth          = {}", klut.depth());

            if common.verify {
                verify(&aig, &klut)?;
            }
            if let Some(path) = &common.output {
                write_output(path, |writer| write_rtlil_luts(writer, &klut))?;
            }
        }

        Commands::Map {
            common,
            cuts,
            genlib,
            required,
            area_margin,
            area_flow_rounds,
            ela_rounds,
            skip_delay_round,
        } => {
            let mut params = TechMapParams {
                required_time: required,
                area_margin,
                area_flow_rounds,
                ela_rounds,
                skip_delay_round,
                verbose: cli.verbose > 0,
                ..Default::default()
            };
            cuts.apply(&mut params.cut_enumeration);
            params.validate()?;

            let file = File::open(&genlib).with_context(|| format!("failed to open {}", genlib.display()))?;
            let gates = read_genlib(file).with_context(|| format!("failed to read {}", genlib.display()))?;
            let library = TechLibrary::new(
                gates,
                &TechLibraryParams {
                    verbose: cli.verbose > 0,
                    ..Default::default()
                },
            );

            let aig = read_input(&common.input)?;
            let (cells, stats) = tech_map(&aig, &library, &params)?;
            println!("{}", stats);
            println!("[i] cells          = {}", cells.num_gates());
            for (gate, count) in cells.gates().iter().zip(cells.cell_counts()) {
                if count > 0 {
                    println!("[i]   {:<12} = {}", gate.name, count);
                }
            }

            if common.verify {
                verify(&aig, &cells)?;
            }
            if let Some(path) = &common.output {
                write_output(path, |writer| write_rtlil_cells(writer, &cells))?;
            }
        }
    }

    Ok(())
}
