//! Dense kernels acting on individual blocks.
//!
//! Every kernel takes the blocks as they are stored together with an explicit [`Conjugacy`]
//! describing how each is to be read, so that no transposed copies are ever materialised.

use ndarray::linalg::general_mat_mul;
use ndarray::{s, ArrayView2, ArrayViewMut1, ArrayViewMut2, Zip};

use crate::sparse::Conjugacy;


/// Returns the view of a stored block in the orientation given by `conj`.
pub fn oriented(view: ArrayView2<'_, f64>, conj: Conjugacy) -> ArrayView2<'_, f64> {
    match conj {
        Conjugacy::Normal => view,
        Conjugacy::Transpose => view.reversed_axes(),
    }
}

/// Computes $`\mathbf{C} \leftarrow \alpha\, \mathrm{op}(\mathbf{A})\, \mathrm{op}(\mathbf{B})
/// + \beta \mathbf{C}`$.
///
/// # Panics
///
/// Panics if the oriented shapes are incompatible.
pub fn matrix_multiply(
    a: ArrayView2<'_, f64>,
    conj_a: Conjugacy,
    b: ArrayView2<'_, f64>,
    conj_b: Conjugacy,
    c: &mut ArrayViewMut2<'_, f64>,
    alpha: f64,
    beta: f64,
) {
    general_mat_mul(alpha, &oriented(a, conj_a), &oriented(b, conj_b), beta, c);
}

/// Accumulates the Kronecker product $`s_{a} s_{b}\, \mathrm{op}(\mathbf{A}) \otimes
/// \mathrm{op}(\mathbf{B})`$ into the sub-block of `c` whose top-left corner is at
/// `(row_offset, col_offset)`.
///
/// # Arguments
///
/// * `a` - The stored outer factor.
/// * `conj_a` - The orientation of `a`.
/// * `scale_a` - The scale factor for `a`.
/// * `b` - The stored inner factor.
/// * `conj_b` - The orientation of `b`.
/// * `scale_b` - The scale factor for `b`.
/// * `c` - The destination block.
/// * `row_offset` - The row of `c` at which the product starts.
/// * `col_offset` - The column of `c` at which the product starts.
#[allow(clippy::too_many_arguments)]
pub fn matrix_tensor_product(
    a: ArrayView2<'_, f64>,
    conj_a: Conjugacy,
    scale_a: f64,
    b: ArrayView2<'_, f64>,
    conj_b: Conjugacy,
    scale_b: f64,
    c: &mut ArrayViewMut2<'_, f64>,
    row_offset: usize,
    col_offset: usize,
) {
    let a = oriented(a, conj_a);
    let b = oriented(b, conj_b);
    let (bm, bn) = b.dim();
    let factor = scale_a * scale_b;
    for ((i, j), &aij) in a.indexed_iter() {
        let r0 = row_offset + i * bm;
        let c0 = col_offset + j * bn;
        c.slice_mut(s![r0..r0 + bm, c0..c0 + bn])
            .scaled_add(factor * aij, &b);
    }
}

/// Accumulates $`d`$ times the diagonal of the square block `a` into `out`.
pub fn matrix_diagonal_scale(d: f64, a: ArrayView2<'_, f64>, out: &mut ArrayViewMut1<'_, f64>) {
    assert_eq!(a.nrows(), a.ncols(), "Diagonal scaling requires a square block.");
    out.scaled_add(d, &a.diag());
}

/// Accumulates $`\alpha`$ times the diagonal of an identity block into `out`.
pub fn identity_diagonal_scale(alpha: f64, out: &mut ArrayViewMut1<'_, f64>) {
    out.mapv_inplace(|x| x + alpha);
}

/// Overwrites `c` with the similarity transform
/// $`f\, \mathbf{R}_{\mathrm{bra}}^{\mathsf{T}}\, \mathrm{op}(\mathbf{A})\,
/// \mathbf{R}_{\mathrm{ket}}`$.
///
/// # Arguments
///
/// * `rot_bra` - The bra rotation of shape `(old_bra_dim, new_bra_dim)`.
/// * `a` - The stored block in the old basis.
/// * `conj_a` - The orientation of `a`.
/// * `rot_ket` - The ket rotation of shape `(old_ket_dim, new_ket_dim)`.
/// * `c` - The destination block of shape `(new_bra_dim, new_ket_dim)`.
/// * `factor` - The overall scale factor.
pub fn matrix_rotate(
    rot_bra: ArrayView2<'_, f64>,
    a: ArrayView2<'_, f64>,
    conj_a: Conjugacy,
    rot_ket: ArrayView2<'_, f64>,
    c: &mut ArrayViewMut2<'_, f64>,
    factor: f64,
) {
    let work = oriented(a, conj_a).dot(&rot_ket);
    general_mat_mul(factor, &rot_bra.t(), &work, 0.0, c);
}

/// Accumulates $`\alpha\, \mathrm{op}(\mathbf{A})`$ into `c`.
pub fn matrix_scale_add(
    alpha: f64,
    a: ArrayView2<'_, f64>,
    conj_a: Conjugacy,
    c: &mut ArrayViewMut2<'_, f64>,
) {
    c.scaled_add(alpha, &oriented(a, conj_a));
}

/// Returns the elementwise inner product of two blocks of equal shape.
pub fn matrix_dot_product(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> f64 {
    Zip::from(&a)
        .and(&b)
        .fold(0.0, |acc, &x, &y| acc + x * y)
}

/// Scales every element of `a` by `alpha`.
pub fn matrix_scale(alpha: f64, a: &mut ArrayViewMut2<'_, f64>) {
    a.mapv_inplace(|x| x * alpha);
}
