use approx::assert_abs_diff_eq;
use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::quantum::{QuantumNumber, SpinSymmetry};
use crate::sparse::{Conjugacy, SparseMatrix};
use crate::stateinfo::StateInfo;

fn site() -> StateInfo {
    StateInfo::new(
        vec![
            QuantumNumber::new(0, 0, 0),
            QuantumNumber::new(1, 1, 0),
            QuantumNumber::new(2, 0, 0),
        ],
        vec![1, 2, 1],
        SpinSymmetry::SpinAdapted,
    )
    .unwrap()
}

#[test]
fn test_sparse_operator_pattern() {
    let s = site();
    let creator = SparseMatrix::operator(QuantumNumber::new(1, 1, 0), &s, &s, true);
    assert!(creator.initialised());
    assert!(creator.fermion());
    assert!(creator.allowed(1, 0));
    assert!(creator.allowed(2, 1));
    assert!(!creator.allowed(0, 1));
    assert!(!creator.allowed(1, 1));
    assert_eq!(creator.non_zero_blocks().len(), 2);
    assert_eq!(creator.operator_element(1, 0).dim(), (2, 1));
    assert_eq!(creator.active_cols(1), vec![0]);
    assert_eq!(creator.active_rows(1), vec![2]);

    let uninit = SparseMatrix::default();
    assert!(!uninit.initialised());
}

#[test]
fn test_sparse_transpose_logical_indices() {
    let s = site();
    let mut creator = SparseMatrix::operator(QuantumNumber::new(1, 1, 0), &s, &s, true);
    creator
        .operator_element_mut(1, 0)
        .assign(&array![[1.0], [2.0]]);
    let dense = creator.to_dense(&s, &s);

    let destroyer = creator.transpose();
    assert_eq!(destroyer.conjugacy(), Conjugacy::Transpose);
    assert!(destroyer.allowed(0, 1));
    assert!(!destroyer.allowed(1, 0));
    assert_eq!(destroyer.active_cols(0), vec![1]);

    // The backing block is the stored one.
    assert_eq!(destroyer.operator_element(0, 1).dim(), (2, 1));
    assert_eq!(destroyer.to_dense(&s, &s), dense.t());

    let q0 = s.quantum(0);
    let q1 = s.quantum(1);
    assert_abs_diff_eq!(
        destroyer.get_scaling(q0, q1).abs(),
        2.0f64.sqrt(),
        epsilon = 1e-14
    );
    assert_eq!(destroyer.transpose().get_scaling(q1, q0), 1.0);
}

#[test]
fn test_sparse_identity_and_wavefunction() {
    let s = site();
    let id = SparseMatrix::identity(&s);
    assert_eq!(id.to_dense(&s, &s), Array2::<f64>::eye(4));
    assert_eq!(id.spin(), 0);
    assert!(!id.fermion());

    let psi = SparseMatrix::wavefunction(QuantumNumber::new(2, 0, 0), &s, &s);
    let pairs = psi
        .non_zero_blocks()
        .iter()
        .map(|(lr, _)| *lr)
        .collect::<Vec<_>>();
    assert_eq!(pairs, vec![(0, 2), (1, 1), (2, 0)]);
    assert_eq!(psi.operator_element(1, 1).dim(), (2, 2));
}

#[test]
fn test_sparse_randomise_and_clear() {
    let s = site();
    let mut psi = SparseMatrix::wavefunction(QuantumNumber::new(2, 0, 0), &s, &s);
    let mut rng = StdRng::seed_from_u64(7);
    psi.randomise(&mut rng);
    assert!(psi
        .non_zero_blocks()
        .iter()
        .flat_map(|(_, block)| block.iter())
        .all(|&x| (-1.0..1.0).contains(&x)));
    assert!(psi
        .non_zero_blocks()
        .iter()
        .any(|(_, block)| block.iter().any(|&x| x != 0.0)));

    let z = psi.zeros_like();
    assert!(z
        .non_zero_blocks()
        .iter()
        .all(|(_, block)| block.iter().all(|&x| x == 0.0)));
    assert_eq!(z.non_zero_blocks().len(), psi.non_zero_blocks().len());
}
