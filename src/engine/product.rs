use ndarray::{s, Array1};
use rayon::prelude::*;

use crate::coupling::CouplingCoefficients;
use crate::dense::{matrix_diagonal_scale, matrix_multiply, matrix_tensor_product};
use crate::quantum::QuantumNumber;
use crate::sparse::SparseMatrix;
use crate::stateinfo::{CompositeStateInfo, StateInfo};

use super::{
    assert_canonical, assert_initialised, fermion_sign, negligible, BraKet, OperatorEngine,
};

impl<C: CouplingCoefficients> OperatorEngine<C> {
    /// Accumulates the tensor product of an operator on the left constituent and an operator on
    /// the right constituent into an operator on the composite space.
    ///
    /// # Arguments
    ///
    /// * `a` - The operator on the left constituent.
    /// * `b` - The operator on the right constituent.
    /// * `c` - The destination operator on the collected composite space(s).
    /// * `spaces` - The composite bra and ket spaces.
    /// * `scale` - The overall scale factor.
    ///
    /// # Panics
    ///
    /// Panics if an operand is uninitialised, if `c` is not in its canonical orientation, or if
    /// the sector counts of the operands do not match `spaces`.
    pub fn tensor_product(
        &self,
        a: &SparseMatrix,
        b: &SparseMatrix,
        c: &mut SparseMatrix,
        spaces: BraKet<'_, CompositeStateInfo>,
        scale: f64,
    ) {
        if negligible("tensor_product", scale) {
            return;
        }
        assert_initialised("tensor_product", &[a, b, &*c]);
        assert_canonical("tensor_product", c);

        let bra = spaces.bra();
        let ket = spaces.ket();
        let (lbra, rbra) = (bra.left(), bra.right());
        let (lket, rket) = (ket.left(), ket.right());
        assert!(
            a.nrows() == lbra.n_quanta() && a.ncols() == lket.n_quanta(),
            "tensor_product: left operator does not match the left constituents."
        );
        assert!(
            b.nrows() == rbra.n_quanta() && b.ncols() == rket.n_quanta(),
            "tensor_product: right operator does not match the right constituents."
        );
        assert!(
            c.nrows() == bra.n_quanta() && c.ncols() == ket.n_quanta(),
            "tensor_product: destination does not match the composite spaces."
        );
        log::debug!(
            "tensor_product ({}): {} destination blocks.",
            if spaces.is_same() { "bra = ket" } else { "bra ≠ ket" },
            c.non_zero_blocks().len()
        );

        let a_q = *a.delta_quantum();
        let b_q = *b.delta_quantum();
        let c_q = *c.delta_quantum();
        let coupling = &self.coupling;

        self.pool.install(|| {
            c.non_zero_blocks_mut()
                .par_iter_mut()
                .for_each(|(key, cel)| {
                    let (cq, cqp) = *key;
                    let mut cel = cel.view_mut();
                    let mut rowstride = 0;
                    for &ui in bra.old_to_new_state(cq) {
                        let si = bra.slot(ui);
                        let mut colstride = 0;
                        for &uj in ket.old_to_new_state(cqp) {
                            let sj = ket.slot(uj);
                            let (aq, aqp) = (si.left, sj.left);
                            let (bq, bqp) = (si.right, sj.right);
                            if a.allowed(aq, aqp) && b.allowed(bq, bqp) {
                                let scale_a =
                                    scale * a.get_scaling(lbra.quantum(aq), lket.quantum(aqp));
                                let scale_b = coupling.recoupling([
                                    lket.quantum(aqp),
                                    rket.quantum(bqp),
                                    ket.quantum(cqp),
                                    &a_q,
                                    &b_q,
                                    &c_q,
                                    lbra.quantum(aq),
                                    rbra.quantum(bq),
                                    bra.quantum(cq),
                                ]) * b.get_scaling(rbra.quantum(bq), rket.quantum(bqp))
                                    * fermion_sign(b, lket.quantum(aqp));
                                matrix_tensor_product(
                                    a.operator_element(aq, aqp),
                                    a.conjugacy(),
                                    scale_a,
                                    b.operator_element(bq, bqp),
                                    b.conjugacy(),
                                    scale_b,
                                    &mut cel,
                                    rowstride,
                                    colstride,
                                );
                            }
                            colstride += sj.states;
                        }
                        rowstride += si.states;
                    }
                });
        });
    }

    /// Accumulates the diagonal of the tensor product of `a` and `b`, as produced by
    /// [`Self::tensor_product`] for a scalar destination, into `diag`.
    ///
    /// The layout of `diag` is the one described for [`Self::tensor_trace_diagonal`].
    ///
    /// # Panics
    ///
    /// Panics if an operand is uninitialised or if `diag` does not span the composite space.
    pub fn tensor_product_diagonal(
        &self,
        a: &SparseMatrix,
        b: &SparseMatrix,
        diag: &mut Array1<f64>,
        spaces: &CompositeStateInfo,
        scale: f64,
    ) {
        if negligible("tensor_product_diagonal", scale) {
            return;
        }
        assert_initialised("tensor_product_diagonal", &[a, b]);
        assert_eq!(
            diag.len(),
            spaces.total_states(),
            "tensor_product_diagonal: diagonal length does not match the composite space."
        );
        log::debug!(
            "tensor_product_diagonal: {} collected sectors.",
            spaces.n_quanta()
        );

        let ls = spaces.left();
        let rs = spaces.right();
        let a_q = *a.delta_quantum();
        let b_q = *b.delta_quantum();
        let vacuum = QuantumNumber::vacuum();
        let unblocked = spaces.unblocked_index();

        for aq in (0..ls.n_quanta()).filter(|&aq| a.allowed(aq, aq)) {
            for bq in (0..rs.n_quanta()).filter(|&bq| b.allowed(bq, bq)) {
                if !spaces.allowed_quanta(aq, bq) {
                    continue;
                }
                // A scalar destination only sees the first coupled sector.
                let slot = spaces.slot(spaces.pair_slots(aq, bq)[0]);
                let cq = slot.collected;
                let base = unblocked[cq] + slot.offset;
                let rdim = rs.quanta_states(bq);

                let factor = scale
                    * self.coupling.recoupling([
                        ls.quantum(aq),
                        rs.quantum(bq),
                        spaces.quantum(cq),
                        &a_q,
                        &b_q,
                        &vacuum,
                        ls.quantum(aq),
                        rs.quantum(bq),
                        spaces.quantum(cq),
                    ])
                    * b.get_scaling(rs.quantum(bq), rs.quantum(bq))
                    * a.get_scaling(ls.quantum(aq), ls.quantum(aq))
                    * fermion_sign(b, ls.quantum(aq));
                let a_el = a.operator_element(aq, aq);
                for aq_state in 0..ls.quanta_states(aq) {
                    let start = base + aq_state * rdim;
                    matrix_diagonal_scale(
                        a_el[(aq_state, aq_state)] * factor,
                        b.operator_element(bq, bq),
                        &mut diag.slice_mut(s![start..start + rdim]),
                    );
                }
            }
        }
    }

    /// Accumulates the composition $`\mathbf{C} \mathrel{+}= s\, \mathbf{A} \mathbf{B}`$ of two
    /// operators on a single state space.
    ///
    /// In spin-adapted mode each contribution through an intermediate sector $`a'`$ is weighted
    /// by
    ///
    /// ```math
    ///     W(c' b c a; a' k_{c}) \sqrt{(k_{c}+1)(a'+1)}\, (-1)^{(k_{b}+k_{a}-k_{c})/2},
    /// ```
    ///
    /// where all labels are twice-integer spins, $`c`$ and $`c'`$ are the row and column sectors
    /// of the destination block, and $`k_{a}`$, $`k_{b}`$, $`k_{c}`$ are the coupling labels of
    /// the operators.
    ///
    /// # Panics
    ///
    /// Panics if an operand is uninitialised, if `c` is not in its canonical orientation, or if
    /// the sector counts of the operands do not match `state`.
    pub fn product(
        &self,
        a: &SparseMatrix,
        b: &SparseMatrix,
        c: &mut SparseMatrix,
        state: &StateInfo,
        scale: f64,
    ) {
        if negligible("product", scale) {
            return;
        }
        assert_initialised("product", &[a, b, &*c]);
        assert_canonical("product", c);
        let n = state.n_quanta();
        assert!(
            [a.nrows(), a.ncols(), b.nrows(), b.ncols(), c.nrows(), c.ncols()]
                .iter()
                .all(|&m| m == n),
            "product: operands do not match the state space."
        );
        log::debug!("product: {} destination blocks.", c.non_zero_blocks().len());

        let (ka, kb, kc) = (a.spin(), b.spin(), c.spin());
        let spin_adapted = self.config.spin_adapted;
        let coupling = &self.coupling;

        self.pool.install(|| {
            c.non_zero_blocks_mut()
                .par_iter_mut()
                .for_each(|(key, cel)| {
                    let (cq, cqp) = *key;
                    let mut cel = cel.view_mut();
                    for ap in (0..n).filter(|&ap| a.allowed(cq, ap) && b.allowed(ap, cqp)) {
                        let mut factor = a.get_scaling(state.quantum(cq), state.quantum(ap))
                            * b.get_scaling(state.quantum(ap), state.quantum(cqp));
                        if spin_adapted {
                            let apj = state.quantum(ap).s;
                            let cqj = state.quantum(cq).s;
                            let cqpj = state.quantum(cqp).s;
                            let sign = if ((kb + ka - kc) / 2).rem_euclid(2) == 0 {
                                1.0
                            } else {
                                -1.0
                            };
                            factor *= coupling.racah(cqpj, kb, cqj, ka, apj, kc)
                                * (f64::from(kc + 1) * f64::from(apj + 1)).sqrt()
                                * sign;
                        }
                        matrix_multiply(
                            a.operator_element(cq, ap),
                            a.conjugacy(),
                            b.operator_element(ap, cqp),
                            b.conjugacy(),
                            &mut cel,
                            scale * factor,
                            1.0,
                        );
                    }
                });
        });
    }
}
