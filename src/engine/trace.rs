use ndarray::{s, Array1, Array2};
use rayon::prelude::*;

use crate::coupling::CouplingCoefficients;
use crate::dense::{identity_diagonal_scale, matrix_diagonal_scale, matrix_tensor_product};
use crate::quantum::QuantumNumber;
use crate::sparse::{Conjugacy, SparseMatrix};
use crate::stateinfo::CompositeStateInfo;

use super::{assert_canonical, assert_initialised, fermion_sign, negligible, OperatorEngine};

impl<C: CouplingCoefficients> OperatorEngine<C> {
    /// Embeds an operator acting on one constituent of a composite space into the composite
    /// space, with the identity on the other constituent, and accumulates the result into `c`.
    ///
    /// # Arguments
    ///
    /// * `a` - The operator on the left constituent if `trace_right`, on the right one otherwise.
    /// * `c` - The destination operator on the collected composite space.
    /// * `spaces` - The composite space serving as both bra and ket.
    /// * `trace_right` - If `true`, the right constituent carries the identity; otherwise the left
    /// one does.
    /// * `scale` - The overall scale factor.
    ///
    /// # Panics
    ///
    /// Panics if an operand is uninitialised or if `c` is not in its canonical orientation.
    pub fn tensor_trace(
        &self,
        a: &SparseMatrix,
        c: &mut SparseMatrix,
        spaces: &CompositeStateInfo,
        trace_right: bool,
        scale: f64,
    ) {
        if negligible("tensor_trace", scale) {
            return;
        }
        assert_initialised("tensor_trace", &[a, &*c]);
        assert_canonical("tensor_trace", c);
        log::debug!(
            "tensor_trace ({}): {} destination blocks.",
            if trace_right { "right" } else { "left" },
            c.non_zero_blocks().len()
        );

        let ls = spaces.left();
        let rs = spaces.right();
        let a_q = *a.delta_quantum();
        let c_q = *c.delta_quantum();
        let vacuum = QuantumNumber::vacuum();
        let coupling = &self.coupling;

        self.pool.install(|| {
            c.non_zero_blocks_mut()
                .par_iter_mut()
                .for_each(|(key, cel)| {
                    let (cq, cqp) = *key;
                    let mut cel = cel.view_mut();
                    let mut rowstride = 0;
                    for &ui in spaces.old_to_new_state(cq) {
                        let si = spaces.slot(ui);
                        let mut colstride = 0;
                        for &uj in spaces.old_to_new_state(cqp) {
                            let sj = spaces.slot(uj);
                            if trace_right {
                                let (aq, aqp) = (si.left, sj.left);
                                let (bq, bqp) = (si.right, sj.right);
                                if bq == bqp && a.allowed(aq, aqp) {
                                    let factor = coupling.recoupling([
                                        ls.quantum(aqp),
                                        rs.quantum(bqp),
                                        spaces.quantum(cqp),
                                        &a_q,
                                        &vacuum,
                                        &c_q,
                                        ls.quantum(aq),
                                        rs.quantum(bq),
                                        spaces.quantum(cq),
                                    ]) * a.get_scaling(ls.quantum(aq), ls.quantum(aqp));
                                    let unity = Array2::<f64>::eye(rs.quanta_states(bq));
                                    matrix_tensor_product(
                                        a.operator_element(aq, aqp),
                                        a.conjugacy(),
                                        scale,
                                        unity.view(),
                                        Conjugacy::Normal,
                                        factor,
                                        &mut cel,
                                        rowstride,
                                        colstride,
                                    );
                                }
                            } else {
                                let (aq, aqp) = (si.right, sj.right);
                                let (bq, bqp) = (si.left, sj.left);
                                if bq == bqp && a.allowed(aq, aqp) {
                                    let factor = coupling.recoupling([
                                        ls.quantum(bqp),
                                        rs.quantum(aqp),
                                        spaces.quantum(cqp),
                                        &vacuum,
                                        &a_q,
                                        &c_q,
                                        ls.quantum(bq),
                                        rs.quantum(aq),
                                        spaces.quantum(cq),
                                    ]) * a.get_scaling(rs.quantum(aq), rs.quantum(aqp))
                                        * fermion_sign(a, ls.quantum(bqp));
                                    let unity = Array2::<f64>::eye(ls.quanta_states(bq));
                                    matrix_tensor_product(
                                        unity.view(),
                                        Conjugacy::Normal,
                                        factor,
                                        a.operator_element(aq, aqp),
                                        a.conjugacy(),
                                        scale,
                                        &mut cel,
                                        rowstride,
                                        colstride,
                                    );
                                }
                            }
                            colstride += sj.states;
                        }
                        rowstride += si.states;
                    }
                });
        });
    }

    /// Accumulates the diagonal of the embedding of `a` into a composite space, as produced by
    /// [`Self::tensor_trace`] for a scalar destination, into `diag`.
    ///
    /// Only the first collected sector arising from each pair of constituent sectors receives a
    /// contribution. The diagonal is laid out sector by sector as given by
    /// [`crate::stateinfo::StateInfo::unblocked_index`], each sector slot by slot.
    ///
    /// # Panics
    ///
    /// Panics if `a` is uninitialised or if `diag` does not span the composite space.
    pub fn tensor_trace_diagonal(
        &self,
        a: &SparseMatrix,
        diag: &mut Array1<f64>,
        spaces: &CompositeStateInfo,
        trace_right: bool,
        scale: f64,
    ) {
        if negligible("tensor_trace_diagonal", scale) {
            return;
        }
        assert_initialised("tensor_trace_diagonal", &[a]);
        assert_eq!(
            diag.len(),
            spaces.total_states(),
            "tensor_trace_diagonal: diagonal length does not match the composite space."
        );
        log::debug!(
            "tensor_trace_diagonal ({}): {} collected sectors.",
            if trace_right { "right" } else { "left" },
            spaces.n_quanta()
        );

        let ls = spaces.left();
        let rs = spaces.right();
        let a_q = *a.delta_quantum();
        let vacuum = QuantumNumber::vacuum();
        let unblocked = spaces.unblocked_index();

        for aq in 0..ls.n_quanta() {
            if trace_right && !a.allowed(aq, aq) {
                continue;
            }
            for bq in 0..rs.n_quanta() {
                if (!trace_right && !a.allowed(bq, bq)) || !spaces.allowed_quanta(aq, bq) {
                    continue;
                }
                let slot = spaces.slot(spaces.pair_slots(aq, bq)[0]);
                let cq = slot.collected;
                let base = unblocked[cq] + slot.offset;
                let rdim = rs.quanta_states(bq);
                let (op_left, op_right) = if trace_right {
                    (&a_q, &vacuum)
                } else {
                    (&vacuum, &a_q)
                };
                let recoupling = self.coupling.recoupling([
                    ls.quantum(aq),
                    rs.quantum(bq),
                    spaces.quantum(cq),
                    op_left,
                    op_right,
                    &vacuum,
                    ls.quantum(aq),
                    rs.quantum(bq),
                    spaces.quantum(cq),
                ]);
                if trace_right {
                    let factor = recoupling * a.get_scaling(ls.quantum(aq), ls.quantum(aq));
                    let element = a.operator_element(aq, aq);
                    for aq_state in 0..ls.quanta_states(aq) {
                        let start = base + aq_state * rdim;
                        identity_diagonal_scale(
                            element[(aq_state, aq_state)] * scale * factor,
                            &mut diag.slice_mut(s![start..start + rdim]),
                        );
                    }
                } else {
                    // Moving the operator past the left sector.
                    let factor = recoupling
                        * a.get_scaling(rs.quantum(bq), rs.quantum(bq))
                        * fermion_sign(a, ls.quantum(aq));
                    for aq_state in 0..ls.quanta_states(aq) {
                        let start = base + aq_state * rdim;
                        matrix_diagonal_scale(
                            scale * factor,
                            a.operator_element(bq, bq),
                            &mut diag.slice_mut(s![start..start + rdim]),
                        );
                    }
                }
            }
        }
    }
}
