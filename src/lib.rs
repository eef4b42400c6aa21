//! # symblock: symmetry-resolved block-sparse tensor algebra
//!
//! `symblock` provides the block-sparse tensor algebra at the heart of a spin-adapted and
//! point-group-adapted density matrix renormalisation group (DMRG) code. Operators and
//! wavefunctions are stored as sparse collections of dense blocks, one per pair of symmetry
//! sectors allowed by the selection rules, and every operation is carried out block by block,
//! in parallel over the destination blocks:
//! - partial traces, which embed an operator acting on one half of a composite space,
//! - tensor products of operators on the two halves of a composite space,
//! - sequential composition of operators on a single space,
//! - rotation of operators into a renormalised basis,
//! - application of composite operators to wavefunctions without forming them, and
//! - vector-space primitives (scaled addition, inner products, scaling and preconditioning).
//!
//! In spin-adapted mode, sector labels carry total spins and the engine applies the recoupling
//! coefficients (Wigner $`6j`$ and normalised $`9j`$ symbols) demanded by the Wigner–Eckart
//! theorem. In $`S_z`$ mode the coefficients reduce to unity. Fermionic signs from reordering
//! second-quantised operators are applied throughout.
//!
//! ## Getting started
//!
//! Construct an [`engine::OperatorEngine`] from an [`config::EngineConfig`], describe the state
//! spaces with [`stateinfo::StateInfo`] and [`stateinfo::CompositeStateInfo`], and create
//! operands with the constructors of [`sparse::SparseMatrix`].
//!
//! ## Examples and usage
//!
//! Usages of most items are illustrated in test functions. The `symblock` binary runs a set of
//! self-consistency checks of the engine on a Hubbard chain; run `symblock --help` for its
//! options.

pub mod arena;
pub mod config;
pub mod coupling;
pub mod dense;
pub mod engine;
pub mod interfaces;
pub mod io;
pub mod quantum;
pub mod sparse;
pub mod stateinfo;
