//! Recoupling coefficients for spin and point-group labels.
//!
//! All spin arguments are twice-integer labels, *i.e.* $`2j`$, so that half-integer angular
//! momenta are represented exactly.

use factorial::Factorial;
use num::BigUint;
use num_traits::ToPrimitive;

use crate::quantum::{triangle, QuantumNumber, SpinSymmetry};


/// The largest argument for which factorials are tabulated. $`170!`$ is the largest factorial
/// representable as an `f64`.
const MAX_FACTORIAL: u32 = 170;

// =================
// Trait definitions
// =================

/// Trait for providers of recoupling coefficients.
///
/// Implementors must be pure functions of the integer labels so that repeated calls with identical
/// arguments are bit-reproducible. Argument order is significant: for the nine-label functions,
/// the labels are read row by row as
///
/// ```math
/// \begin{Bmatrix}
///     j_{1}' & j_{2}' & J' \\
///     k_{1} & k_{2} & K \\
///     j_{1} & j_{2} & J
/// \end{Bmatrix},
/// ```
///
/// where the first row holds the ket labels, the second the operator labels, and the third the
/// bra labels.
pub trait CouplingCoefficients: Send + Sync {
    /// Returns the spin recoupling factor for nine twice-integer spin labels.
    fn ninej(&self, labels: [i32; 9]) -> f64;

    /// Returns the spatial-symmetry recoupling factor for nine irrep labels.
    fn spatial_ninej(&self, irreps: [u8; 9]) -> f64;

    /// Returns the Racah $`W(abcd;ef)`$ coefficient for six twice-integer spin labels.
    fn racah(&self, a: i32, b: i32, c: i32, d: i32, e: i32, f: i32) -> f64;

    /// Returns `true` if spin labels are total spins (SU(2) adaptation).
    fn spin_adapted(&self) -> bool;

    /// Returns the full recoupling factor (spin times spatial) for nine quantum numbers.
    fn recoupling(&self, labels: [&QuantumNumber; 9]) -> f64 {
        self.ninej(labels.map(|q| q.s)) * self.spatial_ninej(labels.map(|q| q.irrep))
    }
}

// ==================
// Struct definitions
// ==================

/// A coupling-coefficient provider based on exact Wigner symbols.
///
/// In spin-adapted mode, [`CouplingCoefficients::ninej`] returns the unitary (normalised) $`9j`$
/// coefficient
///
/// ```math
///     \sqrt{(2J'+1)(2K+1)(2j_{1}+1)(2j_{2}+1)}
///     \begin{Bmatrix}
///         j_{1}' & j_{2}' & J' \\
///         k_{1} & k_{2} & K \\
///         j_{1} & j_{2} & J
///     \end{Bmatrix},
/// ```
///
/// which reduces to unity whenever all operator labels vanish. In non-spin-adapted mode every spin
/// coefficient is unity. Point groups are Abelian, so all spatial coefficients are unity.
#[derive(Clone, Debug)]
pub struct WignerCoupling {
    mode: SpinSymmetry,
    factorials: Vec<f64>,
}

impl WignerCoupling {
    /// Constructs a new provider.
    ///
    /// # Arguments
    ///
    /// * `mode` - The interpretation of spin labels.
    pub fn new(mode: SpinSymmetry) -> Self {
        let factorials = (0..=MAX_FACTORIAL)
            .map(|n| {
                BigUint::from(n)
                    .checked_factorial()
                    .unwrap_or_else(|| panic!("Unable to compute the factorial of {n}."))
                    .to_f64()
                    .expect("Unable to convert a `BigUint` value to `f64`.")
            })
            .collect::<Vec<_>>();
        Self { mode, factorials }
    }

    /// Returns the spin mode of this provider.
    pub fn mode(&self) -> SpinSymmetry {
        self.mode
    }

    fn fact(&self, n: i32) -> f64 {
        let nu = usize::try_from(n).expect("Negative argument to factorial.");
        *self
            .factorials
            .get(nu)
            .unwrap_or_else(|| panic!("Factorial of {n} exceeds the tabulated range."))
    }

    /// The triangle coefficient $`\Delta(abc)`$ for twice-integer labels satisfying the triangle
    /// condition.
    fn delta(&self, a: i32, b: i32, c: i32) -> f64 {
        (self.fact((a + b - c) / 2) * self.fact((a - b + c) / 2) * self.fact((-a + b + c) / 2)
            / self.fact((a + b + c) / 2 + 1))
            .sqrt()
    }

    /// Computes the Wigner $`6j`$ symbol
    /// $`\begin{Bmatrix} a & b & c \\ d & e & f \end{Bmatrix}`$ using the Racah single-sum
    /// formula.
    pub fn sixj(&self, a: i32, b: i32, c: i32, d: i32, e: i32, f: i32) -> f64 {
        if !(triangle(a, b, c) && triangle(a, e, f) && triangle(d, b, f) && triangle(d, e, c)) {
            return 0.0;
        }
        let alphas = [
            (a + b + c) / 2,
            (a + e + f) / 2,
            (d + b + f) / 2,
            (d + e + c) / 2,
        ];
        let betas = [
            (a + b + d + e) / 2,
            (a + c + d + f) / 2,
            (b + c + e + f) / 2,
        ];
        let tmin = *alphas.iter().max().expect("Empty alphas.");
        let tmax = *betas.iter().min().expect("Empty betas.");
        let sum = (tmin..=tmax)
            .map(|t| {
                let den = alphas.iter().map(|&al| self.fact(t - al)).product::<f64>()
                    * betas.iter().map(|&be| self.fact(be - t)).product::<f64>();
                let sign = if t.rem_euclid(2) == 0 { 1.0 } else { -1.0 };
                sign * self.fact(t + 1) / den
            })
            .sum::<f64>();
        self.delta(a, b, c) * self.delta(a, e, f) * self.delta(d, b, f) * self.delta(d, e, c) * sum
    }

    /// Computes the Wigner $`9j`$ symbol
    /// $`\begin{Bmatrix} a & b & c \\ d & e & f \\ g & h & i \end{Bmatrix}`$ as a sum over
    /// products of three $`6j`$ symbols.
    #[allow(clippy::too_many_arguments)]
    pub fn ninej_symbol(
        &self,
        a: i32,
        b: i32,
        c: i32,
        d: i32,
        e: i32,
        f: i32,
        g: i32,
        h: i32,
        i: i32,
    ) -> f64 {
        let rows_ok = triangle(a, b, c) && triangle(d, e, f) && triangle(g, h, i);
        let cols_ok = triangle(a, d, g) && triangle(b, e, h) && triangle(c, f, i);
        if !(rows_ok && cols_ok) {
            return 0.0;
        }
        let xmin = (a - i).abs().max((d - h).abs()).max((b - f).abs());
        let xmax = (a + i).min(d + h).min(b + f);
        if xmin > xmax {
            return 0.0;
        }
        (xmin..=xmax)
            .step_by(2)
            .map(|x| {
                let sign = if x.rem_euclid(2) == 0 { 1.0 } else { -1.0 };
                sign * f64::from(x + 1)
                    * self.sixj(a, b, c, f, i, x)
                    * self.sixj(d, e, f, b, x, h)
                    * self.sixj(g, h, i, x, a, d)
            })
            .sum()
    }
}

impl Default for WignerCoupling {
    fn default() -> Self {
        Self::new(SpinSymmetry::SpinAdapted)
    }
}

impl CouplingCoefficients for WignerCoupling {
    fn ninej(&self, labels: [i32; 9]) -> f64 {
        if !self.mode.is_spin_adapted() {
            return 1.0;
        }
        let [a, b, c, d, e, f, g, h, i] = labels;
        let norm = (f64::from(c + 1) * f64::from(f + 1) * f64::from(g + 1) * f64::from(h + 1))
            .sqrt();
        norm * self.ninej_symbol(a, b, c, d, e, f, g, h, i)
    }

    fn spatial_ninej(&self, _irreps: [u8; 9]) -> f64 {
        // Abelian irreps are one-dimensional.
        1.0
    }

    fn racah(&self, a: i32, b: i32, c: i32, d: i32, e: i32, f: i32) -> f64 {
        if !self.mode.is_spin_adapted() {
            return 1.0;
        }
        let sign = if ((a + b + c + d) / 2).rem_euclid(2) == 0 {
            1.0
        } else {
            -1.0
        };
        sign * self.sixj(a, b, e, d, c, f)
    }

    fn spin_adapted(&self) -> bool {
        self.mode.is_spin_adapted()
    }
}

// =========
// Functions
// =========

/// Returns the factor converting a matrix element of an operator stored in its canonical
/// orientation into the corresponding element of its transpose.
///
/// In spin-adapted mode the reduced matrix element of the transpose picks up
///
/// ```math
///     (-1)^{(k + s_{l} - s_{r})/2} \sqrt{\frac{s_{r} + 1}{s_{l} + 1}},
/// ```
///
/// with $`k`$ the twice-integer spin of the operator and $`s_{l}`$, $`s_{r}`$ the twice-integer
/// spins of the row and column sectors. Non-spin-adapted elements need no conversion.
pub fn transpose_scaling(
    op: &QuantumNumber,
    left: &QuantumNumber,
    right: &QuantumNumber,
    mode: SpinSymmetry,
) -> f64 {
    match mode {
        SpinSymmetry::SpinAdapted => {
            let phase = (op.s + left.s - right.s).div_euclid(2);
            let sign = if phase.rem_euclid(2) == 0 { 1.0 } else { -1.0 };
            sign * (f64::from(right.s + 1) / f64::from(left.s + 1)).sqrt()
        }
        SpinSymmetry::Sz => 1.0,
    }
}
