//! Quantum-number labels of symmetry sectors.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};


// =================
// Enum definitions
// =================

/// An enumerated type indicating how the spin label of a [`QuantumNumber`] is to be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpinSymmetry {
    /// Variant for spin-adapted labels: the spin label is twice the total spin $`S`$, and two
    /// labels couple according to the triangle rule.
    SpinAdapted,

    /// Variant for non-spin-adapted labels: the spin label is twice the projection $`S_z`$, and
    /// two labels couple additively.
    Sz,
}

impl SpinSymmetry {
    /// Constructs the spin symmetry from a boolean indicating spin adaptation.
    pub fn from_spin_adapted(spin_adapted: bool) -> Self {
        if spin_adapted {
            SpinSymmetry::SpinAdapted
        } else {
            SpinSymmetry::Sz
        }
    }

    /// Returns `true` if the labels are spin-adapted.
    pub fn is_spin_adapted(&self) -> bool {
        matches!(self, SpinSymmetry::SpinAdapted)
    }
}

impl fmt::Display for SpinSymmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpinSymmetry::SpinAdapted => write!(f, "SU(2)"),
            SpinSymmetry::Sz => write!(f, "U(1) Sz"),
        }
    }
}

// ==================
// Struct definitions
// ==================

/// A structure for the conserved-charge label of a symmetry sector.
///
/// The spin label is stored as twice its physical value so that half-integer spins are exact
/// integers. Point-group irreps are labelled by the index of an Abelian (D2h-subgroup) irrep, so
/// that the direct product of two irreps is the bitwise XOR of their indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantumNumber {
    /// The particle number.
    pub n: i32,

    /// Twice the total spin (spin-adapted) or twice its projection (non-spin-adapted).
    pub s: i32,

    /// The index of the Abelian point-group irrep.
    pub irrep: u8,
}

impl QuantumNumber {
    /// Constructs a new quantum number.
    pub fn new(n: i32, s: i32, irrep: u8) -> Self {
        Self { n, s, irrep }
    }

    /// The totally symmetric, spinless, particle-free label.
    pub fn vacuum() -> Self {
        Self::new(0, 0, 0)
    }

    /// Returns `true` if sectors carrying this label have odd fermion parity.
    pub fn is_fermion(&self) -> bool {
        self.n.rem_euclid(2) == 1
    }

    /// Returns the parity sign $`(-1)^{n}`$.
    pub fn parity(&self) -> f64 {
        if self.is_fermion() {
            -1.0
        } else {
            1.0
        }
    }

    /// Couples two labels.
    ///
    /// # Arguments
    ///
    /// * `other` - The label to be coupled to `self`.
    /// * `mode` - The interpretation of the spin labels.
    ///
    /// # Returns
    ///
    /// All labels arising from the coupling, in increasing order of spin.
    pub fn couple(&self, other: &Self, mode: SpinSymmetry) -> Vec<Self> {
        let n = self.n + other.n;
        let irrep = self.irrep ^ other.irrep;
        match mode {
            SpinSymmetry::SpinAdapted => {
                let smin = (self.s - other.s).abs();
                let smax = self.s + other.s;
                (smin..=smax)
                    .step_by(2)
                    .map(|s| Self::new(n, s, irrep))
                    .collect()
            }
            SpinSymmetry::Sz => vec![Self::new(n, self.s + other.s, irrep)],
        }
    }

    /// Returns the label of the adjoint of an operator carrying this label.
    pub fn adjoint(&self, mode: SpinSymmetry) -> Self {
        match mode {
            SpinSymmetry::SpinAdapted => Self::new(-self.n, self.s, self.irrep),
            SpinSymmetry::Sz => Self::new(-self.n, -self.s, self.irrep),
        }
    }
}

/// Checks whether `total` is contained in the coupling of `a` and `b`.
pub fn allowed_coupling(
    a: &QuantumNumber,
    b: &QuantumNumber,
    total: &QuantumNumber,
    mode: SpinSymmetry,
) -> bool {
    if a.n + b.n != total.n || a.irrep ^ b.irrep != total.irrep {
        return false;
    }
    match mode {
        SpinSymmetry::SpinAdapted => triangle(a.s, b.s, total.s),
        SpinSymmetry::Sz => a.s + b.s == total.s,
    }
}

/// Checks the triangle condition on three twice-integer spin labels, including the requirement
/// that their sum be even.
pub fn triangle(a: i32, b: i32, c: i32) -> bool {
    a >= 0
        && b >= 0
        && c >= 0
        && c >= (a - b).abs()
        && c <= a + b
        && (a + b + c).rem_euclid(2) == 0
}

impl PartialOrd for QuantumNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QuantumNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.n, self.s, self.irrep).cmp(&(other.n, other.s, other.irrep))
    }
}

impl fmt::Display for QuantumNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.s.rem_euclid(2) == 0 {
            write!(f, "<N={}, S={}, Γ{}>", self.n, self.s / 2, self.irrep)
        } else {
            write!(f, "<N={}, S={}/2, Γ{}>", self.n, self.s, self.irrep)
        }
    }
}
