use rayon::prelude::*;

use crate::coupling::CouplingCoefficients;
use crate::dense::matrix_rotate;
use crate::sparse::SparseMatrix;
use crate::stateinfo::retained_sectors;

use super::{assert_canonical, assert_initialised, negligible, OperatorEngine, Rotation};

impl<C: CouplingCoefficients> OperatorEngine<C> {
    /// Projects `a` into a renormalised basis and writes the result into `c`.
    ///
    /// Each destination block is overwritten with
    /// $`f\, \mathbf{R}_{\mathrm{bra}}^{\mathsf{T}}\, \mathrm{op}(\mathbf{A})\,
    /// \mathbf{R}_{\mathrm{ket}}`$, where the rotations are those of the old sectors from which
    /// the new bra and ket sectors descend, and $`f`$ is `scale` times the transpose scaling of
    /// `a` for the old sector labels. Destination blocks whose old counterpart is not allowed in
    /// `a` are zeroed.
    ///
    /// # Panics
    ///
    /// Panics if an operand is uninitialised, if `c` is not in its canonical orientation, or if
    /// the number of retained sectors of a rotation map differs from the number of sectors of
    /// the corresponding new state space.
    pub fn tensor_rotate(
        &self,
        a: &SparseMatrix,
        c: &mut SparseMatrix,
        rotation: Rotation<'_>,
        scale: f64,
    ) {
        if negligible("tensor_rotate", scale) {
            return;
        }
        assert_initialised("tensor_rotate", &[a, &*c]);
        assert_canonical("tensor_rotate", c);

        let (old_bras, new_bras, rotate_bra) = rotation.bra();
        let (old_kets, new_kets, rotate_ket) = rotation.ket();
        let new_to_old_bra = retained_sectors(rotate_bra);
        let new_to_old_ket = retained_sectors(rotate_ket);
        assert_eq!(
            new_to_old_bra.len(),
            new_bras.n_quanta(),
            "tensor_rotate: the bra rotation retains {} sectors but the new bra space has {}.",
            new_to_old_bra.len(),
            new_bras.n_quanta()
        );
        assert_eq!(
            new_to_old_ket.len(),
            new_kets.n_quanta(),
            "tensor_rotate: the ket rotation retains {} sectors but the new ket space has {}.",
            new_to_old_ket.len(),
            new_kets.n_quanta()
        );
        assert!(
            a.nrows() == old_bras.n_quanta() && a.ncols() == old_kets.n_quanta(),
            "tensor_rotate: source does not match the old spaces."
        );
        log::debug!(
            "tensor_rotate: {} destination blocks.",
            c.non_zero_blocks().len()
        );

        self.pool.install(|| {
            c.non_zero_blocks_mut()
                .par_iter_mut()
                .for_each(|(key, cel)| {
                    let (cq, cqp) = *key;
                    let q = new_to_old_bra[cq];
                    let qp = new_to_old_ket[cqp];
                    if !a.allowed(q, qp) {
                        cel.fill(0.0);
                        return;
                    }
                    let factor =
                        scale * a.get_scaling(old_bras.quantum(q), old_kets.quantum(qp));
                    matrix_rotate(
                        rotate_bra[q].view(),
                        a.operator_element(q, qp),
                        a.conjugacy(),
                        rotate_ket[qp].view(),
                        &mut cel.view_mut(),
                        factor,
                    );
                });
        });
    }
}
