//! Block-sparse matrices indexed by pairs of symmetry sectors.
//!
//! The same container represents operators (rows and columns indexed by the sectors of a bra and
//! a ket space) and wavefunctions (rows and columns indexed by the sectors of the left and right
//! constituents of a composite space).

use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::coupling::transpose_scaling;
use crate::quantum::{allowed_coupling, QuantumNumber, SpinSymmetry};
use crate::stateinfo::StateInfo;

#[cfg(test)]
#[path = "sparse_tests.rs"]
mod sparse_tests;

// ================
// Enum definitions
// ================

/// An enumerated type for the orientation in which the blocks of a [`SparseMatrix`] are to be
/// read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Conjugacy {
    /// Variant for blocks read as stored.
    #[default]
    Normal,

    /// Variant for blocks read as the transposes of the stored blocks at the mirrored sector
    /// pair.
    Transpose,
}

impl Conjugacy {
    /// Returns the opposite orientation.
    pub fn transposed(self) -> Self {
        match self {
            Conjugacy::Normal => Conjugacy::Transpose,
            Conjugacy::Transpose => Conjugacy::Normal,
        }
    }
}

impl fmt::Display for Conjugacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conjugacy::Normal => write!(f, "n"),
            Conjugacy::Transpose => write!(f, "t"),
        }
    }
}

// ==================
// Struct definitions
// ==================

/// A structure for a block-sparse matrix whose blocks are labelled by pairs of sector indices.
///
/// Only the blocks of allowed sector pairs are materialised, each with the shape given by the
/// dimensions of its row and column sectors. Block storage is always in the canonical
/// orientation; [`Self::conjugacy`] determines whether the logical block `(l, r)` is the stored
/// block `(l, r)` or the transpose of the stored block `(r, l)`. All public accessors except
/// [`Self::non_zero_blocks`] and [`Self::non_zero_blocks_mut`] take logical indices.
#[derive(Clone, Debug, Default)]
pub struct SparseMatrix {
    /// Stored number of row sectors.
    nrows: usize,

    /// Stored number of column sectors.
    ncols: usize,

    /// Stored sparsity pattern, row-major.
    allowed: Vec<bool>,

    /// Materialised blocks in stored orientation, in row-major order of their sector pairs.
    non_zero_blocks: Vec<((usize, usize), Array2<f64>)>,

    /// Position of each stored sector pair in [`Self::non_zero_blocks`].
    block_index: HashMap<(usize, usize), usize>,

    /// The coupling label carried by the operator (or the target label of a wavefunction).
    delta_quantum: QuantumNumber,

    conjugacy: Conjugacy,

    fermion: bool,

    mode: Option<SpinSymmetry>,

    initialised: bool,
}

impl SparseMatrix {
    fn from_pattern<F>(
        delta_quantum: QuantumNumber,
        rows: &StateInfo,
        cols: &StateInfo,
        fermion: bool,
        is_allowed: F,
    ) -> Self
    where
        F: Fn(&QuantumNumber, &QuantumNumber) -> bool,
    {
        assert_eq!(
            rows.mode(),
            cols.mode(),
            "Row and column spaces of a sparse matrix must share their spin symmetry."
        );
        let nrows = rows.n_quanta();
        let ncols = cols.n_quanta();
        let allowed = (0..nrows)
            .cartesian_product(0..ncols)
            .map(|(l, r)| is_allowed(rows.quantum(l), cols.quantum(r)))
            .collect::<Vec<_>>();
        let non_zero_blocks = (0..nrows)
            .cartesian_product(0..ncols)
            .filter(|&(l, r)| allowed[l * ncols + r])
            .map(|(l, r)| {
                (
                    (l, r),
                    Array2::zeros((rows.quanta_states(l), cols.quanta_states(r))),
                )
            })
            .collect::<Vec<_>>();
        let block_index = non_zero_blocks
            .iter()
            .enumerate()
            .map(|(i, (lr, _))| (*lr, i))
            .collect::<HashMap<_, _>>();
        Self {
            nrows,
            ncols,
            allowed,
            non_zero_blocks,
            block_index,
            delta_quantum,
            conjugacy: Conjugacy::Normal,
            fermion,
            mode: Some(rows.mode()),
            initialised: true,
        }
    }

    /// Constructs a zero operator carrying `delta_quantum`, mapping `ket` sectors to `bra`
    /// sectors.
    ///
    /// The block `(l, r)` is allowed if `bra[l]` is contained in `delta_quantum ⊗ ket[r]`.
    pub fn operator(
        delta_quantum: QuantumNumber,
        bra: &StateInfo,
        ket: &StateInfo,
        fermion: bool,
    ) -> Self {
        let mode = bra.mode();
        Self::from_pattern(delta_quantum, bra, ket, fermion, |lq, rq| {
            allowed_coupling(&delta_quantum, rq, lq, mode)
        })
    }

    /// Constructs the identity operator on `state`.
    pub fn identity(state: &StateInfo) -> Self {
        let mut id = Self::operator(QuantumNumber::vacuum(), state, state, false);
        id.non_zero_blocks
            .iter_mut()
            .for_each(|(_, block)| block.diag_mut().fill(1.0));
        id
    }

    /// Constructs a zero wavefunction of total label `target` on the product of `left` and
    /// `right`.
    ///
    /// The block `(l, r)` is allowed if `target` is contained in `left[l] ⊗ right[r]`.
    pub fn wavefunction(target: QuantumNumber, left: &StateInfo, right: &StateInfo) -> Self {
        let mode = left.mode();
        Self::from_pattern(target, left, right, false, |lq, rq| {
            allowed_coupling(lq, rq, &target, mode)
        })
    }

    /// Returns a copy of `self` with every block set to zero.
    pub fn zeros_like(&self) -> Self {
        let mut z = self.clone();
        z.clear();
        z
    }

    /// Returns `self` with its orientation flipped, representing the transpose of the stored
    /// operator.
    pub fn transpose(mut self) -> Self {
        self.conjugacy = self.conjugacy.transposed();
        self
    }

    /// Sets every block to zero.
    pub fn clear(&mut self) {
        self.non_zero_blocks
            .iter_mut()
            .for_each(|(_, block)| block.fill(0.0));
    }

    /// Fills every block with uniformly distributed values in `[-1, 1)`.
    pub fn randomise<R: Rng>(&mut self, rng: &mut R) {
        self.non_zero_blocks.iter_mut().for_each(|(_, block)| {
            block.mapv_inplace(|_| rng.gen_range(-1.0..1.0));
        });
    }

    // ---------
    // Accessors
    // ---------

    /// Returns `true` if the matrix has been constructed with a sparsity pattern.
    pub fn initialised(&self) -> bool {
        self.initialised
    }

    /// Returns the number of logical row sectors.
    pub fn nrows(&self) -> usize {
        match self.conjugacy {
            Conjugacy::Normal => self.nrows,
            Conjugacy::Transpose => self.ncols,
        }
    }

    /// Returns the number of logical column sectors.
    pub fn ncols(&self) -> usize {
        match self.conjugacy {
            Conjugacy::Normal => self.ncols,
            Conjugacy::Transpose => self.nrows,
        }
    }

    fn stored(&self, l: usize, r: usize) -> (usize, usize) {
        match self.conjugacy {
            Conjugacy::Normal => (l, r),
            Conjugacy::Transpose => (r, l),
        }
    }

    /// Returns `true` if the logical block `(l, r)` is materialised.
    pub fn allowed(&self, l: usize, r: usize) -> bool {
        let (sl, sr) = self.stored(l, r);
        sl < self.nrows && sr < self.ncols && self.allowed[sl * self.ncols + sr]
    }

    /// Returns the stored block backing the logical block `(l, r)`.
    ///
    /// For [`Conjugacy::Transpose`], the logical block is the transpose of the returned view;
    /// pass [`Self::conjugacy`] to the dense kernels to orient it.
    ///
    /// # Panics
    ///
    /// Panics if the block is not materialised.
    pub fn operator_element(&self, l: usize, r: usize) -> ArrayView2<'_, f64> {
        let key = self.stored(l, r);
        let idx = self
            .block_index
            .get(&key)
            .unwrap_or_else(|| panic!("Block ({l}, {r}) is not allowed."));
        self.non_zero_blocks[*idx].1.view()
    }

    /// Returns the stored block backing the logical block `(l, r)` mutably.
    ///
    /// # Panics
    ///
    /// Panics if the block is not materialised.
    pub fn operator_element_mut(&mut self, l: usize, r: usize) -> ArrayViewMut2<'_, f64> {
        let key = self.stored(l, r);
        let idx = *self
            .block_index
            .get(&key)
            .unwrap_or_else(|| panic!("Block ({l}, {r}) is not allowed."));
        self.non_zero_blocks[idx].1.view_mut()
    }

    /// Returns the materialised blocks with their stored sector pairs.
    pub fn non_zero_blocks(&self) -> &[((usize, usize), Array2<f64>)] {
        &self.non_zero_blocks
    }

    /// Returns the materialised blocks with their stored sector pairs, mutably. The pattern
    /// itself cannot be altered through this slice.
    pub fn non_zero_blocks_mut(&mut self) -> &mut [((usize, usize), Array2<f64>)] {
        &mut self.non_zero_blocks
    }

    /// Returns the logical column sectors allowed in logical row `l`.
    pub fn active_cols(&self, l: usize) -> Vec<usize> {
        (0..self.ncols()).filter(|&r| self.allowed(l, r)).collect()
    }

    /// Returns the logical row sectors allowed in logical column `r`.
    pub fn active_rows(&self, r: usize) -> Vec<usize> {
        (0..self.nrows()).filter(|&l| self.allowed(l, r)).collect()
    }

    /// Returns the coupling label.
    pub fn delta_quantum(&self) -> &QuantumNumber {
        &self.delta_quantum
    }

    /// Returns the twice-integer spin of the coupling label.
    pub fn spin(&self) -> i32 {
        self.delta_quantum.s
    }

    /// Returns the orientation.
    pub fn conjugacy(&self) -> Conjugacy {
        self.conjugacy
    }

    /// Returns `true` if the operator has odd fermion parity.
    pub fn fermion(&self) -> bool {
        self.fermion
    }

    /// Returns the spin symmetry of the spaces the matrix is defined on.
    pub fn mode(&self) -> Option<SpinSymmetry> {
        self.mode
    }

    /// Returns the factor converting stored elements to logical ones for the sector labels
    /// `left` and `right`: unity in the canonical orientation, the transpose scaling otherwise.
    pub fn get_scaling(&self, left: &QuantumNumber, right: &QuantumNumber) -> f64 {
        match (self.conjugacy, self.mode) {
            (Conjugacy::Transpose, Some(mode)) => {
                transpose_scaling(&self.delta_quantum, left, right, mode)
            }
            _ => 1.0,
        }
    }

    /// Assembles the logical dense matrix, without basis-conjugation scaling.
    ///
    /// # Arguments
    ///
    /// * `bra` - The space of the logical rows.
    /// * `ket` - The space of the logical columns.
    pub fn to_dense(&self, bra: &StateInfo, ket: &StateInfo) -> Array2<f64> {
        assert_eq!(bra.n_quanta(), self.nrows(), "Row space mismatch.");
        assert_eq!(ket.n_quanta(), self.ncols(), "Column space mismatch.");
        let row_offsets = bra.unblocked_index();
        let col_offsets = ket.unblocked_index();
        let mut dense = Array2::zeros((bra.total_states(), ket.total_states()));
        for l in 0..self.nrows() {
            for r in 0..self.ncols() {
                if self.allowed(l, r) {
                    let block = self.operator_element(l, r);
                    let oriented = match self.conjugacy {
                        Conjugacy::Normal => block,
                        Conjugacy::Transpose => block.reversed_axes(),
                    };
                    dense
                        .slice_mut(s![
                            row_offsets[l]..row_offsets[l] + bra.quanta_states(l),
                            col_offsets[r]..col_offsets[r] + ket.quanta_states(r)
                        ])
                        .assign(&oriented);
                }
            }
        }
        dense
    }
}

impl fmt::Display for SparseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Sparse matrix {} [{}] ({} × {} sectors, {} blocks{})",
            self.delta_quantum,
            self.conjugacy,
            self.nrows(),
            self.ncols(),
            self.non_zero_blocks.len(),
            if self.fermion { ", fermionic" } else { "" }
        )?;
        for ((l, r), block) in self.non_zero_blocks.iter() {
            writeln!(f, "  ({l}, {r}): {} × {}", block.nrows(), block.ncols())?;
        }
        Ok(())
    }
}
