//! The block-sparse tensor algebra engine.
//!
//! Every operation iterates over the materialised blocks of its destination, in parallel on the
//! engine's own thread pool, and only ever writes into blocks that already exist. Apart from
//! [`OperatorEngine::tensor_rotate`], which overwrites, all operations accumulate into their
//! destinations.

use std::fmt;
use std::sync::Arc;

use anyhow::{self, ensure, format_err};
use ndarray::Array2;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::arena::{Arena, StackArena};
use crate::config::EngineConfig;
use crate::coupling::{CouplingCoefficients, WignerCoupling};
use crate::quantum::QuantumNumber;
use crate::sparse::{Conjugacy, SparseMatrix};
use crate::stateinfo::StateInfo;

mod multiply;
mod product;
mod rotate;
mod trace;
mod vector;


#[cfg(test)]
#[path = "engine_proptests.rs"]
mod engine_proptests;

/// Scale factors of smaller magnitude turn an operation into a no-op.
pub const NEGLIGIBLE_SCALE: f64 = 1e-20;

/// Preconditioning denominators of smaller magnitude are skipped.
pub const PRECONDITION_THRESHOLD: f64 = 1e-12;

// ================
// Enum definitions
// ================

/// An enumerated type for the spaces an operation maps between: either a single space serving as
/// both bra and ket, or two distinct ones.
#[derive(Debug)]
pub enum BraKet<'a, T> {
    /// Variant for operations whose bra and ket spaces coincide.
    Same(&'a T),

    /// Variant for rectangular operations between two different spaces.
    Distinct {
        /// The space of the rows.
        bra: &'a T,

        /// The space of the columns.
        ket: &'a T,
    },
}

impl<'a, T> BraKet<'a, T> {
    /// Returns the bra space.
    pub fn bra(&self) -> &'a T {
        match *self {
            BraKet::Same(s) => s,
            BraKet::Distinct { bra, .. } => bra,
        }
    }

    /// Returns the ket space.
    pub fn ket(&self) -> &'a T {
        match *self {
            BraKet::Same(s) => s,
            BraKet::Distinct { ket, .. } => ket,
        }
    }

    /// Returns `true` if the bra and ket spaces are given as one.
    pub fn is_same(&self) -> bool {
        matches!(self, BraKet::Same(_))
    }
}

impl<T> Clone for BraKet<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BraKet<'_, T> {}

/// An enumerated type for the rotation maps projecting an operator into a renormalised basis.
///
/// Each rotation map holds one matrix per old sector, of shape `(old_dim, new_dim)`, with
/// `new_dim == 0` marking a discarded sector.
#[derive(Clone, Copy, Debug)]
pub enum Rotation<'a> {
    /// Variant for a single rotation applied to both bra and ket.
    Same {
        /// The state space before renormalisation.
        old: &'a StateInfo,

        /// The renormalised state space.
        new: &'a StateInfo,

        /// The rotation map.
        map: &'a [Array2<f64>],
    },

    /// Variant for independent bra and ket rotations.
    Distinct {
        old_bra: &'a StateInfo,
        new_bra: &'a StateInfo,
        bra_map: &'a [Array2<f64>],
        old_ket: &'a StateInfo,
        new_ket: &'a StateInfo,
        ket_map: &'a [Array2<f64>],
    },
}

/// The old space, new space and rotation map on one side of a [`Rotation`].
pub(crate) type RotationSide<'a> = (&'a StateInfo, &'a StateInfo, &'a [Array2<f64>]);

impl<'a> Rotation<'a> {
    /// Returns the old space, new space and rotation map on the bra side.
    pub fn bra(&self) -> RotationSide<'a> {
        match *self {
            Rotation::Same { old, new, map } => (old, new, map),
            Rotation::Distinct {
                old_bra,
                new_bra,
                bra_map,
                ..
            } => (old_bra, new_bra, bra_map),
        }
    }

    /// Returns the old space, new space and rotation map on the ket side.
    pub fn ket(&self) -> RotationSide<'a> {
        match *self {
            Rotation::Same { old, new, map } => (old, new, map),
            Rotation::Distinct {
                old_ket,
                new_ket,
                ket_map,
                ..
            } => (old_ket, new_ket, ket_map),
        }
    }
}

// ==================
// Struct definitions
// ==================

/// A structure performing block-sparse tensor operations.
///
/// The engine owns its configuration, its coupling-coefficient provider, a handle to the scratch
/// arena, and a `rayon` pool of [`EngineConfig::quanta_threads`] workers on which every block loop
/// runs. State spaces, rotation maps and operands are only ever borrowed for the duration of a
/// call.
pub struct OperatorEngine<C: CouplingCoefficients = WignerCoupling> {
    config: EngineConfig,
    coupling: C,
    arena: Arc<dyn Arena>,
    pool: ThreadPool,
}

impl OperatorEngine<WignerCoupling> {
    /// Constructs an engine with exact Wigner coupling coefficients and a fresh
    /// [`StackArena`].
    pub fn new(config: EngineConfig) -> Result<Self, anyhow::Error> {
        let coupling = WignerCoupling::new(config.mode());
        Self::with_parts(config, coupling, Arc::new(StackArena::new()))
    }
}

impl<C: CouplingCoefficients> OperatorEngine<C> {
    /// Constructs an engine from its parts.
    ///
    /// # Arguments
    ///
    /// * `config` - The engine configuration.
    /// * `coupling` - The coupling-coefficient provider. Its spin adaptation must agree with
    /// `config`.
    /// * `arena` - The arena from which scratch buffers are drawn.
    pub fn with_parts(
        config: EngineConfig,
        coupling: C,
        arena: Arc<dyn Arena>,
    ) -> Result<Self, anyhow::Error> {
        ensure!(
            config.quanta_threads >= 1,
            "At least one worker thread is required."
        );
        ensure!(
            coupling.spin_adapted() == config.spin_adapted,
            "The coupling provider and the configuration disagree on spin adaptation."
        );
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.quanta_threads)
            .thread_name(|i| format!("symblock-worker-{i}"))
            .build()
            .map_err(|err| format_err!(err))?;
        log::info!(
            "Operator engine ready: {} worker thread(s), {} coupling.",
            config.quanta_threads,
            config.mode()
        );
        Ok(Self {
            config,
            coupling,
            arena,
            pool,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<C: CouplingCoefficients> fmt::Debug for OperatorEngine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorEngine")
            .field("config", &self.config)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

// =========
// Functions
// =========

/// Returns `true` if an operation with this scale factor is to be skipped.
fn negligible(op: &str, scale: f64) -> bool {
    if scale.abs() < NEGLIGIBLE_SCALE {
        log::trace!("{op}: negligible scale {scale:e}, skipped.");
        true
    } else {
        false
    }
}

/// Returns $`-1`$ if a fermionic operator is moved past a fermionic sector, $`1`$ otherwise.
fn fermion_sign(op: &SparseMatrix, sector: &QuantumNumber) -> f64 {
    if op.fermion() && sector.is_fermion() {
        -1.0
    } else {
        1.0
    }
}

fn assert_initialised(op: &str, matrices: &[&SparseMatrix]) {
    assert!(
        matrices.iter().all(|m| m.initialised()),
        "{op}: every operand must be initialised."
    );
}

fn assert_canonical(op: &str, m: &SparseMatrix) {
    assert_eq!(
        m.conjugacy(),
        Conjugacy::Normal,
        "{op}: the operand must be in its canonical orientation."
    );
}
