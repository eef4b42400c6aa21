use itertools::Itertools;
use ndarray::ArrayViewMut2;
use rayon::prelude::*;

use crate::arena::ScratchPool;
use crate::coupling::CouplingCoefficients;
use crate::dense::matrix_multiply;
use crate::quantum::QuantumNumber;
use crate::sparse::{Conjugacy, SparseMatrix};
use crate::stateinfo::CompositeStateInfo;

use super::{
    assert_canonical, assert_initialised, fermion_sign, negligible, BraKet, OperatorEngine,
};

impl<C: CouplingCoefficients> OperatorEngine<C> {
    /// Applies the composite operator $`\mathbf{A} \otimes \mathbf{B}`$ to the wavefunction `c`
    /// and accumulates the result into the wavefunction `v`.
    ///
    /// For every destination block $`(l, r)`$, each contribution through a ket block
    /// $`(l', r')`$ is formed as
    ///
    /// ```math
    ///     \mathbf{v}_{lr} \mathrel{+}= f\, \mathrm{op}(\mathbf{A})_{ll'}
    ///     \left[\mathbf{c}_{l'r'}\, \mathrm{op}(\mathbf{B})_{rr'}^{\mathsf{T}}\right],
    /// ```
    ///
    /// with the bracketed intermediate computed in a per-worker scratch buffer drawn from the
    /// engine's arena.
    ///
    /// # Arguments
    ///
    /// * `a` - The operator on the left constituent.
    /// * `b` - The operator on the right constituent.
    /// * `c` - The input wavefunction on the ket composite space.
    /// * `v` - The output wavefunction on the bra composite space.
    /// * `spaces` - The composite bra and ket spaces.
    /// * `op_q` - The total coupling label of $`\mathbf{A} \otimes \mathbf{B}`$.
    /// * `scale` - The overall scale factor.
    ///
    /// # Panics
    ///
    /// Panics if an operand is uninitialised, if `c` or `v` is not in its canonical orientation,
    /// or if the sector counts of the operands do not match `spaces`.
    #[allow(clippy::too_many_arguments)]
    pub fn tensor_product_multiply(
        &self,
        a: &SparseMatrix,
        b: &SparseMatrix,
        c: &SparseMatrix,
        v: &mut SparseMatrix,
        spaces: BraKet<'_, CompositeStateInfo>,
        op_q: &QuantumNumber,
        scale: f64,
    ) {
        if negligible("tensor_product_multiply", scale) {
            return;
        }
        assert_initialised("tensor_product_multiply", &[a, b, c, &*v]);
        assert_canonical("tensor_product_multiply", c);
        assert_canonical("tensor_product_multiply", v);

        let bra = spaces.bra();
        let ket = spaces.ket();
        let (lbra, rbra) = (bra.left(), bra.right());
        let (lket, rket) = (ket.left(), ket.right());
        assert!(
            c.ncols() == b.ncols() && v.ncols() == b.nrows(),
            "tensor_product_multiply: right operator does not match the wavefunctions."
        );
        assert!(
            c.nrows() == a.ncols() && v.nrows() == a.nrows(),
            "tensor_product_multiply: left operator does not match the wavefunctions."
        );
        assert!(
            lbra.n_quanta() == a.nrows() && lket.n_quanta() == a.ncols(),
            "tensor_product_multiply: left operator does not match the left constituents."
        );
        assert!(
            rbra.n_quanta() == b.nrows() && rket.n_quanta() == b.ncols(),
            "tensor_product_multiply: right operator does not match the right constituents."
        );

        // The intermediate for ket-left sector l' and bra-right sector r is l' × r.
        let maxlen = (0..lket.n_quanta())
            .cartesian_product(0..rbra.n_quanta())
            .map(|(lqp, rq)| lket.quanta_states(lqp) * rbra.quanta_states(rq))
            .max()
            .unwrap_or(0);
        log::debug!(
            "tensor_product_multiply: {} destination blocks, scratch of {maxlen} elements per worker.",
            v.non_zero_blocks().len()
        );

        let a_q = *a.delta_quantum();
        let b_q = *b.delta_quantum();
        let c_q = *c.delta_quantum();
        let v_q = *v.delta_quantum();
        let coupling = &self.coupling;
        let scratch = ScratchPool::new(self.arena.as_ref(), self.config.quanta_threads, maxlen);

        self.pool.install(|| {
            v.non_zero_blocks_mut()
                .par_iter_mut()
                .for_each(|(key, vel)| {
                    let (lq, rq) = *key;
                    let mut vel = vel.view_mut();
                    for rqp in b.active_cols(rq) {
                        for lqp in c.active_rows(rqp) {
                            if !a.allowed(lq, lqp) {
                                continue;
                            }
                            let factor = scale
                                * a.get_scaling(lbra.quantum(lq), lket.quantum(lqp))
                                * coupling.recoupling([
                                    lket.quantum(lqp),
                                    rket.quantum(rqp),
                                    &c_q,
                                    &a_q,
                                    &b_q,
                                    op_q,
                                    lbra.quantum(lq),
                                    rbra.quantum(rq),
                                    &v_q,
                                ])
                                * b.get_scaling(rbra.quantum(rq), rket.quantum(rqp))
                                * fermion_sign(b, lket.quantum(lqp));
                            let (m_rows, m_cols) =
                                (lket.quanta_states(lqp), rbra.quanta_states(rq));
                            scratch.with_slot(|slot| {
                                let mut m = ArrayViewMut2::from_shape(
                                    (m_rows, m_cols),
                                    &mut slot[..m_rows * m_cols],
                                )
                                .expect("Scratch slots hold the largest intermediate.");
                                m.fill(0.0);
                                matrix_multiply(
                                    c.operator_element(lqp, rqp),
                                    Conjugacy::Normal,
                                    b.operator_element(rq, rqp),
                                    b.conjugacy().transposed(),
                                    &mut m,
                                    1.0,
                                    0.0,
                                );
                                matrix_multiply(
                                    a.operator_element(lq, lqp),
                                    a.conjugacy(),
                                    m.view(),
                                    Conjugacy::Normal,
                                    &mut vel,
                                    factor,
                                    1.0,
                                );
                            });
                        }
                    }
                });
        });
    }

    /// Applies an operator on one constituent, with the identity on the other, to the
    /// wavefunction `c` and accumulates the result into the wavefunction `v`.
    ///
    /// If `trace_right`, $`\mathbf{v}_{lr} \mathrel{+}= f\, \mathrm{op}(\mathbf{A})_{ll'}\,
    /// \mathbf{c}_{l'r}`$; otherwise $`\mathbf{v}_{lr} \mathrel{+}= f\, \mathbf{c}_{lr'}\,
    /// \mathrm{op}(\mathbf{A})_{rr'}^{\mathsf{T}}`$, where only the latter carries a fermionic
    /// sign.
    ///
    /// # Panics
    ///
    /// Panics if an operand is uninitialised or if `v` is not in its canonical orientation.
    pub fn tensor_trace_multiply(
        &self,
        a: &SparseMatrix,
        c: &SparseMatrix,
        v: &mut SparseMatrix,
        spaces: &CompositeStateInfo,
        trace_right: bool,
        scale: f64,
    ) {
        if negligible("tensor_trace_multiply", scale) {
            return;
        }
        assert_initialised("tensor_trace_multiply", &[a, c, &*v]);
        assert_canonical("tensor_trace_multiply", v);
        log::debug!(
            "tensor_trace_multiply ({}): {} destination blocks.",
            if trace_right { "right" } else { "left" },
            v.non_zero_blocks().len()
        );

        let ls = spaces.left();
        let rs = spaces.right();
        let a_q = *a.delta_quantum();
        let c_q = *c.delta_quantum();
        let v_q = *v.delta_quantum();
        let vacuum = QuantumNumber::vacuum();
        let coupling = &self.coupling;

        self.pool.install(|| {
            v.non_zero_blocks_mut()
                .par_iter_mut()
                .for_each(|(key, vel)| {
                    let (lq, rq) = *key;
                    let mut vel = vel.view_mut();
                    if trace_right {
                        for lqp in (0..ls.n_quanta())
                            .filter(|&lqp| a.allowed(lq, lqp) && c.allowed(lqp, rq))
                        {
                            let factor = scale
                                * coupling.recoupling([
                                    ls.quantum(lqp),
                                    rs.quantum(rq),
                                    &c_q,
                                    &a_q,
                                    &vacuum,
                                    &a_q,
                                    ls.quantum(lq),
                                    rs.quantum(rq),
                                    &v_q,
                                ])
                                * a.get_scaling(ls.quantum(lq), ls.quantum(lqp));
                            matrix_multiply(
                                a.operator_element(lq, lqp),
                                a.conjugacy(),
                                c.operator_element(lqp, rq),
                                c.conjugacy(),
                                &mut vel,
                                factor,
                                1.0,
                            );
                        }
                    } else {
                        for rqp in (0..rs.n_quanta())
                            .filter(|&rqp| a.allowed(rq, rqp) && c.allowed(lq, rqp))
                        {
                            let factor = scale
                                * coupling.recoupling([
                                    ls.quantum(lq),
                                    rs.quantum(rqp),
                                    &c_q,
                                    &vacuum,
                                    &a_q,
                                    &a_q,
                                    ls.quantum(lq),
                                    rs.quantum(rq),
                                    &v_q,
                                ])
                                * a.get_scaling(rs.quantum(rq), rs.quantum(rqp))
                                * fermion_sign(a, ls.quantum(lq));
                            matrix_multiply(
                                c.operator_element(lq, rqp),
                                c.conjugacy(),
                                a.operator_element(rq, rqp),
                                a.conjugacy().transposed(),
                                &mut vel,
                                factor,
                                1.0,
                            );
                        }
                    }
                });
        });
    }
}
