use ndarray::Array1;
use rayon::prelude::*;

use crate::coupling::CouplingCoefficients;
use crate::dense::{matrix_dot_product, matrix_scale, matrix_scale_add};
use crate::sparse::{Conjugacy, SparseMatrix};
use crate::stateinfo::StateInfo;

use super::{
    assert_canonical, assert_initialised, negligible, BraKet, OperatorEngine,
    PRECONDITION_THRESHOLD,
};

impl<C: CouplingCoefficients> OperatorEngine<C> {
    /// Multiplies every materialised block of `a` by `scale`.
    ///
    /// A vanishing `scale` yields a valid zero object.
    pub fn tensor_scale(&self, scale: f64, a: &mut SparseMatrix) {
        assert_initialised("tensor_scale", &[&*a]);
        log::debug!(
            "tensor_scale: {} blocks by {scale:e}.",
            a.non_zero_blocks().len()
        );
        self.pool.install(|| {
            a.non_zero_blocks_mut()
                .par_iter_mut()
                .for_each(|(_, block)| matrix_scale(scale, &mut block.view_mut()));
        });
    }

    /// Accumulates $`\mathbf{C} \mathrel{+}= s\, \mathbf{A}`$ over the blocks allowed in both.
    ///
    /// If `a` is not in its canonical orientation, each block is added transposed and multiplied
    /// by the transpose scaling for the sector labels of `spaces`.
    ///
    /// # Panics
    ///
    /// Panics if an operand is uninitialised or if `c` is not in its canonical orientation.
    pub fn tensor_scale_add(
        &self,
        scale: f64,
        a: &SparseMatrix,
        c: &mut SparseMatrix,
        spaces: BraKet<'_, StateInfo>,
    ) {
        if negligible("tensor_scale_add", scale) {
            return;
        }
        assert_initialised("tensor_scale_add", &[a, &*c]);
        assert_canonical("tensor_scale_add", c);
        log::debug!(
            "tensor_scale_add ({}): {} destination blocks.",
            a.conjugacy(),
            c.non_zero_blocks().len()
        );
        let bra = spaces.bra();
        let ket = spaces.ket();

        self.pool.install(|| {
            c.non_zero_blocks_mut()
                .par_iter_mut()
                .filter(|(key, _)| a.allowed(key.0, key.1))
                .for_each(|(key, cel)| {
                    let (lq, rq) = *key;
                    let factor = match a.conjugacy() {
                        Conjugacy::Normal => scale,
                        Conjugacy::Transpose => {
                            scale * a.get_scaling(bra.quantum(lq), ket.quantum(rq))
                        }
                    };
                    matrix_scale_add(
                        factor,
                        a.operator_element(lq, rq),
                        a.conjugacy(),
                        &mut cel.view_mut(),
                    );
                });
        });
    }

    /// Accumulates $`\mathbf{C} \mathrel{+}= s\, \mathbf{A}`$ for two operands in canonical
    /// orientation.
    ///
    /// # Panics
    ///
    /// Panics if an operand is uninitialised or not in its canonical orientation.
    pub fn tensor_scale_add_canonical(&self, scale: f64, a: &SparseMatrix, c: &mut SparseMatrix) {
        if negligible("tensor_scale_add_canonical", scale) {
            return;
        }
        assert_initialised("tensor_scale_add_canonical", &[a, &*c]);
        assert_canonical("tensor_scale_add_canonical", a);
        assert_canonical("tensor_scale_add_canonical", c);
        log::debug!(
            "tensor_scale_add_canonical: {} destination blocks.",
            c.non_zero_blocks().len()
        );

        self.pool.install(|| {
            c.non_zero_blocks_mut()
                .par_iter_mut()
                .filter(|(key, _)| a.allowed(key.0, key.1))
                .for_each(|(key, cel)| {
                    matrix_scale_add(
                        scale,
                        a.operator_element(key.0, key.1),
                        Conjugacy::Normal,
                        &mut cel.view_mut(),
                    );
                });
        });
    }

    /// Returns the sum over the blocks allowed in both operands of their elementwise inner
    /// products.
    ///
    /// Blocks are visited in a fixed order, so the result is reproducible and symmetric in its
    /// arguments.
    ///
    /// # Panics
    ///
    /// Panics if an operand is uninitialised or not in its canonical orientation.
    pub fn tensor_dot_product(&self, a: &SparseMatrix, b: &SparseMatrix) -> f64 {
        assert_initialised("tensor_dot_product", &[a, b]);
        assert_canonical("tensor_dot_product", a);
        assert_canonical("tensor_dot_product", b);
        a.non_zero_blocks()
            .iter()
            .filter(|((lq, rq), _)| b.allowed(*lq, *rq))
            .map(|((lq, rq), block)| matrix_dot_product(block.view(), b.operator_element(*lq, *rq)))
            .sum()
    }

    /// Divides every element of `a` by $`e - d`$, where $`d`$ is the corresponding entry of
    /// `diag`, unless $`|e - d|`$ does not exceed [`PRECONDITION_THRESHOLD`].
    ///
    /// The entries of `diag` run over the elements of `a` block by block, in the order of
    /// [`SparseMatrix::non_zero_blocks`], and row-major within each block.
    ///
    /// # Panics
    ///
    /// Panics if `a` is uninitialised or not in its canonical orientation, or if `diag` is
    /// shorter than the number of elements of `a`.
    pub fn tensor_precondition(&self, a: &mut SparseMatrix, e: f64, diag: &Array1<f64>) {
        assert_initialised("tensor_precondition", &[&*a]);
        assert_canonical("tensor_precondition", a);
        let total = a
            .non_zero_blocks()
            .iter()
            .map(|(_, block)| block.len())
            .sum::<usize>();
        assert!(
            diag.len() >= total,
            "tensor_precondition: diagonal has {} entries but the operand has {total} elements.",
            diag.len()
        );
        log::debug!("tensor_precondition: {total} elements, e = {e:.8}.");

        let mut index = 0;
        for (_, block) in a.non_zero_blocks_mut().iter_mut() {
            for x in block.iter_mut() {
                let denominator = e - diag[index];
                if denominator.abs() > PRECONDITION_THRESHOLD {
                    *x /= denominator;
                }
                index += 1;
            }
        }
    }
}
