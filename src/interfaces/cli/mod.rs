//! Command-line driver running the engine's self-consistency checks on a model chain.

use std::fmt;
use std::path::PathBuf;

use anyhow::{self, bail, ensure, format_err};
use clap::Parser;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::EngineConfig;
use crate::engine::{BraKet, OperatorEngine, Rotation};
use crate::io::format::{log_subtitle, log_title, symblock_error, symblock_output, SymblockOutput};
use crate::quantum::{QuantumNumber, SpinSymmetry};
use crate::sparse::SparseMatrix;
use crate::stateinfo::{CompositeStateInfo, StateInfo};


const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

/// Largest elementwise deviation tolerated by a self-consistency check.
pub const SELF_CHECK_THRESHOLD: f64 = 1e-10;

/// Logs a nicely formatted `symblock` heading to the `symblock-output` logger.
pub fn log_heading() {
    let version = if let Some(ver) = VERSION {
        format!("v{ver}")
    } else {
        "v unknown".to_string()
    };
    symblock_output!("╭─────────────────────────────────────────────────────────────────────────────╮");
    symblock_output!("│                                                                             │");
    symblock_output!("│    ▄▄▄ ▄   ▄ ▄▄   ▄▄ ▄▄▄▄  ▄     ▄▄▄   ▄▄▄ ▄  ▄                             │");
    symblock_output!("│   █▄▄   ▀▄▀  █ ▀▄▀ █ █▄▄█  █    █   █ █    █▄▀                              │");
    symblock_output!("│   ▄▄▄█   █   █     █ █▄▄█  █▄▄▄ ▀▄▄▄▀ ▀▄▄▄ █ ▀▄                             │");
    symblock_output!("│                                                                             │");
    symblock_output!("│   Symmetry-resolved block-sparse tensor algebra                 {version:>11} │");
    symblock_output!("╰─────────────────────────────────────────────────────────────────────────────╯");
    symblock_output!("");
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML file with the engine configuration.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// YAML file with the `log4rs` configuration.
    #[arg(short, long)]
    pub log_config: Option<PathBuf>,

    /// Number of sites in the model chain.
    #[arg(short, long, default_value_t = 4)]
    pub sites: usize,

    /// Largest number of states kept per sector when the block is grown.
    #[arg(short, long, default_value_t = 8)]
    pub max_states: usize,

    /// Seed for the random operands.
    #[arg(long, default_value_t = 2718)]
    pub seed: u64,
}

// ==================
// Struct definitions
// ==================

/// A structure recording the outcome of one self-consistency check.
#[derive(Clone, Debug)]
pub struct CheckOutcome {
    /// The name of the check.
    pub name: &'static str,

    /// The largest elementwise deviation between the two sides of the check.
    pub deviation: f64,
}

impl CheckOutcome {
    /// Returns `true` if the deviation is within [`SELF_CHECK_THRESHOLD`].
    pub fn passed(&self) -> bool {
        self.deviation <= SELF_CHECK_THRESHOLD
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<40} {:>12.3e}   {}",
            self.name,
            self.deviation,
            if self.passed() { "pass" } else { "FAIL" }
        )
    }
}

// =========
// Functions
// =========

/// Returns the site space of the Hubbard chain: empty, singly and doubly occupied.
pub fn hubbard_site(mode: SpinSymmetry) -> Result<StateInfo, anyhow::Error> {
    let quanta = match mode {
        SpinSymmetry::SpinAdapted => vec![
            QuantumNumber::new(0, 0, 0),
            QuantumNumber::new(1, 1, 0),
            QuantumNumber::new(2, 0, 0),
        ],
        SpinSymmetry::Sz => vec![
            QuantumNumber::new(0, 0, 0),
            QuantumNumber::new(1, -1, 0),
            QuantumNumber::new(1, 1, 0),
            QuantumNumber::new(2, 0, 0),
        ],
    };
    let n = quanta.len();
    StateInfo::new(quanta, vec![1; n], mode)
}

/// Returns a rotation map keeping the first `max_states` states of every sector.
pub fn truncating_rotation(space: &StateInfo, max_states: usize) -> Vec<Array2<f64>> {
    space
        .all_quanta_states()
        .iter()
        .map(|&dim| {
            let keep = dim.min(max_states);
            Array2::from_shape_fn((dim, keep), |(i, j)| if i == j { 1.0 } else { 0.0 })
        })
        .collect()
}

/// Grows a block by adding one site at a time, truncating every sector to at most `max_states`
/// states after each step.
pub fn grow_block(
    site: &StateInfo,
    sites: usize,
    max_states: usize,
) -> Result<StateInfo, anyhow::Error> {
    ensure!(sites >= 1, "The chain needs at least one site.");
    ensure!(max_states >= 1, "At least one state per sector must be kept.");
    let mut block = site.clone();
    for step in 1..sites {
        let next = {
            let enlarged = CompositeStateInfo::tensor_product(&block, site)?;
            let rotation = truncating_rotation(enlarged.collected(), max_states);
            StateInfo::from_rotation(enlarged.collected(), &rotation)?
        };
        log::debug!(
            "Block grown to {} sites: {} sectors, {} states.",
            step + 1,
            next.n_quanta(),
            next.total_states()
        );
        block = next;
    }
    Ok(block)
}

/// Returns a random orthogonal rotation map, one Householder reflection per sector.
fn householder_rotation<R: Rng>(space: &StateInfo, rng: &mut R) -> Vec<Array2<f64>> {
    space
        .all_quanta_states()
        .iter()
        .map(|&dim| {
            let v = Array1::from_shape_fn(dim, |_| rng.gen_range(-1.0..1.0));
            let norm2 = v.dot(&v);
            Array2::from_shape_fn((dim, dim), |(i, j)| {
                let delta = if i == j { 1.0 } else { 0.0 };
                delta - 2.0 * v[i] * v[j] / norm2
            })
        })
        .collect()
}

fn random_operator<R: Rng>(
    delta: QuantumNumber,
    space: &StateInfo,
    fermion: bool,
    rng: &mut R,
) -> SparseMatrix {
    let mut op = SparseMatrix::operator(delta, space, space, fermion);
    op.randomise(rng);
    op
}

fn max_deviation(a: &SparseMatrix, b: &SparseMatrix) -> f64 {
    a.non_zero_blocks()
        .iter()
        .zip(b.non_zero_blocks().iter())
        .flat_map(|((_, x), (_, y))| x.iter().zip(y.iter()).map(|(p, q)| (p - q).abs()))
        .fold(0.0, f64::max)
}

/// Compares the embedding of single-constituent operators with their tensor product against the
/// identity on the other constituent.
fn check_trace_product<R: Rng>(
    engine: &OperatorEngine,
    block: &StateInfo,
    site: &StateInfo,
    rng: &mut R,
) -> Result<f64, anyhow::Error> {
    let comp = CompositeStateInfo::tensor_product(block, site)?;
    let delta = QuantumNumber::new(1, 1, 0);
    let on_block = random_operator(delta, block, true, rng);
    let on_site = random_operator(delta, site, true, rng);

    let mut traced = SparseMatrix::operator(delta, &comp, &comp, true);
    let mut product = traced.zeros_like();
    engine.tensor_trace(&on_block, &mut traced, &comp, true, 0.5);
    engine.tensor_product(
        &on_block,
        &SparseMatrix::identity(site),
        &mut product,
        BraKet::Same(&comp),
        0.5,
    );
    let right = max_deviation(&traced, &product);

    let mut traced = SparseMatrix::operator(delta, &comp, &comp, true);
    let mut product = traced.zeros_like();
    engine.tensor_trace(&on_site, &mut traced, &comp, false, 0.5);
    engine.tensor_product(
        &SparseMatrix::identity(block),
        &on_site,
        &mut product,
        BraKet::Same(&comp),
        0.5,
    );
    Ok(right.max(max_deviation(&traced, &product)))
}

/// Returns the largest collected sector of `block ⊗ site`, used as the wavefunction target.
fn largest_target(block: &StateInfo, site: &StateInfo) -> Result<QuantumNumber, anyhow::Error> {
    let comp = CompositeStateInfo::tensor_product(block, site)?;
    (0..comp.n_quanta())
        .max_by_key(|&i| comp.quanta_states(i))
        .map(|i| *comp.quantum(i))
        .ok_or_else(|| format_err!("The composite space has no sectors."))
}

/// Applies the identity on both constituents to a random wavefunction.
fn check_identity_application<R: Rng>(
    engine: &OperatorEngine,
    block: &StateInfo,
    site: &StateInfo,
    rng: &mut R,
) -> Result<f64, anyhow::Error> {
    let comp = CompositeStateInfo::tensor_product(block, site)?;
    let mut c = SparseMatrix::wavefunction(largest_target(block, site)?, block, site);
    c.randomise(rng);
    let mut v = c.zeros_like();
    engine.tensor_product_multiply(
        &SparseMatrix::identity(block),
        &SparseMatrix::identity(site),
        &c,
        &mut v,
        BraKet::Same(&comp),
        &QuantumNumber::vacuum(),
        1.0,
    );
    Ok(max_deviation(&v, &c))
}

fn check_dot_symmetry<R: Rng>(
    engine: &OperatorEngine,
    block: &StateInfo,
    site: &StateInfo,
    rng: &mut R,
) -> Result<f64, anyhow::Error> {
    let target = largest_target(block, site)?;
    let mut a = SparseMatrix::wavefunction(target, block, site);
    let mut b = a.zeros_like();
    a.randomise(rng);
    b.randomise(rng);
    Ok((engine.tensor_dot_product(&a, &b) - engine.tensor_dot_product(&b, &a)).abs())
}

fn check_scale_add_round_trip<R: Rng>(
    engine: &OperatorEngine,
    block: &StateInfo,
    site: &StateInfo,
    rng: &mut R,
) -> Result<f64, anyhow::Error> {
    let target = largest_target(block, site)?;
    let mut a = SparseMatrix::wavefunction(target, block, site);
    let mut c = a.zeros_like();
    a.randomise(rng);
    c.randomise(rng);
    let original = c.clone();
    let scale = rng.gen_range(-2.0..2.0);
    engine.tensor_scale_add(
        scale,
        &a,
        &mut c,
        BraKet::Distinct {
            bra: block,
            ket: site,
        },
    );
    engine.tensor_scale_add_canonical(-scale, &a, &mut c);
    Ok(max_deviation(&c, &original))
}

/// Rotates a composition of two operators under an orthogonal rotation map, and compares it with
/// the composition of the rotated operators.
fn check_rotation_commutes<R: Rng>(
    engine: &OperatorEngine,
    block: &StateInfo,
    rng: &mut R,
) -> Result<f64, anyhow::Error> {
    let mode = block.mode();
    let delta = QuantumNumber::new(1, 1, 0);
    let cre = random_operator(delta, block, true, rng);
    let des = random_operator(delta.adjoint(mode), block, true, rng);
    let map = householder_rotation(block, rng);
    let new = StateInfo::from_rotation(block, &map)?;
    let rotation = Rotation::Same {
        old: block,
        new: &new,
        map: &map,
    };

    let mut composed = SparseMatrix::operator(QuantumNumber::vacuum(), block, block, false);
    engine.product(&cre, &des, &mut composed, block, 1.0);
    let mut rotated_composed = SparseMatrix::operator(QuantumNumber::vacuum(), &new, &new, false);
    engine.tensor_rotate(&composed, &mut rotated_composed, rotation, 1.0);

    let mut rotated_cre = SparseMatrix::operator(delta, &new, &new, true);
    let mut rotated_des = SparseMatrix::operator(delta.adjoint(mode), &new, &new, true);
    engine.tensor_rotate(&cre, &mut rotated_cre, rotation, 1.0);
    engine.tensor_rotate(&des, &mut rotated_des, rotation, 1.0);
    let mut composed_rotated = rotated_composed.zeros_like();
    engine.product(&rotated_cre, &rotated_des, &mut composed_rotated, &new, 1.0);

    Ok(max_deviation(&rotated_composed, &composed_rotated))
}

/// Runs every self-consistency check of the engine on the block grown from a Hubbard chain.
///
/// # Arguments
///
/// * `engine` - The engine under test.
/// * `sites` - The number of sites in the chain.
/// * `max_states` - The largest number of states kept per sector.
/// * `seed` - The seed for the random operands.
///
/// # Returns
///
/// The outcome of every check.
pub fn run_self_checks(
    engine: &OperatorEngine,
    sites: usize,
    max_states: usize,
    seed: u64,
) -> Result<Vec<CheckOutcome>, anyhow::Error> {
    let site = hubbard_site(engine.config().mode())?;
    let block = grow_block(&site, sites, max_states)?;
    log_subtitle("Model block");
    symblock_output!("");
    block.log_output_display();
    symblock_output!("");

    let mut rng = StdRng::seed_from_u64(seed);
    Ok(vec![
        CheckOutcome {
            name: "Trace against product with identity",
            deviation: check_trace_product(engine, &block, &site, &mut rng)?,
        },
        CheckOutcome {
            name: "Identity application",
            deviation: check_identity_application(engine, &block, &site, &mut rng)?,
        },
        CheckOutcome {
            name: "Dot product symmetry",
            deviation: check_dot_symmetry(engine, &block, &site, &mut rng)?,
        },
        CheckOutcome {
            name: "Scaled addition round trip",
            deviation: check_scale_add_round_trip(engine, &block, &site, &mut rng)?,
        },
        CheckOutcome {
            name: "Rotation of a composition",
            deviation: check_rotation_commutes(engine, &block, &mut rng)?,
        },
    ])
}

/// Handles a parsed command line: reads the configuration, constructs the engine, and runs and
/// reports the self-consistency checks.
///
/// # Errors
///
/// Errors if the configuration cannot be read, if the engine cannot be constructed, or if any
/// check fails.
pub fn run(cli: &Cli) -> Result<(), anyhow::Error> {
    log_heading();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_yaml(path)?,
        None => EngineConfig::default(),
    };
    log_title("Engine Configuration");
    symblock_output!("");
    config.log_output_display();
    symblock_output!("");

    let engine = OperatorEngine::new(config)?;
    log_title("Self-Consistency Checks");
    symblock_output!("");
    let outcomes = run_self_checks(&engine, cli.sites, cli.max_states, cli.seed)?;

    let heading = format!("{:<40} {:>12}   {}", "Check", "Deviation", "Result");
    let bar = "┈".repeat(heading.chars().count());
    symblock_output!("{bar}");
    symblock_output!("{heading}");
    symblock_output!("{bar}");
    outcomes.iter().for_each(|outcome| {
        symblock_output!("{outcome}");
    });
    symblock_output!("{bar}");
    symblock_output!("");

    let failures = outcomes.iter().filter(|outcome| !outcome.passed()).count();
    if failures > 0 {
        symblock_error!("{failures} self-consistency check(s) failed.");
        bail!("{failures} self-consistency check(s) failed.");
    }
    Ok(())
}
