use approx::{abs_diff_eq, relative_eq};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::EngineConfig;
use crate::engine::{BraKet, OperatorEngine};
use crate::quantum::{QuantumNumber, SpinSymmetry};
use crate::sparse::SparseMatrix;
use crate::stateinfo::{CompositeStateInfo, StateInfo};

fn engine(spin_adapted: bool) -> OperatorEngine {
    let config = EngineConfig::builder()
        .quanta_threads(2)
        .spin_adapted(spin_adapted)
        .build()
        .unwrap();
    OperatorEngine::new(config).unwrap()
}

fn block(spin_adapted: bool) -> StateInfo {
    if spin_adapted {
        StateInfo::new(
            vec![
                QuantumNumber::new(0, 0, 0),
                QuantumNumber::new(1, 1, 0),
                QuantumNumber::new(2, 0, 0),
                QuantumNumber::new(2, 2, 0),
            ],
            vec![2, 3, 2, 1],
            SpinSymmetry::SpinAdapted,
        )
        .unwrap()
    } else {
        StateInfo::new(
            vec![
                QuantumNumber::new(0, 0, 0),
                QuantumNumber::new(1, -1, 0),
                QuantumNumber::new(1, 1, 0),
                QuantumNumber::new(2, 0, 0),
            ],
            vec![2, 3, 3, 2],
            SpinSymmetry::Sz,
        )
        .unwrap()
    }
}

fn random_wavefunction(space: &StateInfo, seed: u64) -> SparseMatrix {
    let mut wf = SparseMatrix::wavefunction(QuantumNumber::new(2, 0, 0), space, space);
    wf.randomise(&mut StdRng::seed_from_u64(seed));
    wf
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_engine_dot_product_is_symmetric(
        spin_adapted in any::<bool>(),
        seed_a in any::<u64>(),
        seed_b in any::<u64>(),
    ) {
        let engine = engine(spin_adapted);
        let space = block(spin_adapted);
        let a = random_wavefunction(&space, seed_a);
        let b = random_wavefunction(&space, seed_b);
        prop_assert_eq!(engine.tensor_dot_product(&a, &b), engine.tensor_dot_product(&b, &a));
        prop_assert!(engine.tensor_dot_product(&a, &a) > 0.0);
    }

    #[test]
    fn test_engine_scale_is_linear_in_dot_product(
        seed_a in any::<u64>(),
        seed_b in any::<u64>(),
        scale in -8.0..8.0f64,
    ) {
        let engine = engine(true);
        let space = block(true);
        let a = random_wavefunction(&space, seed_a);
        let b = random_wavefunction(&space, seed_b);
        let mut sa = a.clone();
        engine.tensor_scale(scale, &mut sa);
        let lhs = engine.tensor_dot_product(&sa, &b);
        let rhs = scale * engine.tensor_dot_product(&a, &b);
        prop_assert!(
            relative_eq!(lhs, rhs, epsilon = 1e-12, max_relative = 1e-12),
            "{lhs} vs {rhs}"
        );
    }

    #[test]
    fn test_engine_scale_add_round_trip(
        spin_adapted in any::<bool>(),
        seed_a in any::<u64>(),
        seed_c in any::<u64>(),
        scale in -4.0..4.0f64,
    ) {
        let engine = engine(spin_adapted);
        let space = block(spin_adapted);
        let a = random_wavefunction(&space, seed_a);
        let mut c = random_wavefunction(&space, seed_c);
        let c0 = c.clone();
        engine.tensor_scale_add(scale, &a, &mut c, BraKet::Same(&space));
        engine.tensor_scale_add_canonical(-scale, &a, &mut c);
        for ((_, x), (_, y)) in c.non_zero_blocks().iter().zip(c0.non_zero_blocks().iter()) {
            prop_assert!(abs_diff_eq!(x, y, epsilon = 1e-12));
        }
    }

    #[test]
    fn test_engine_identity_application_scales_wavefunction(
        spin_adapted in any::<bool>(),
        seed in any::<u64>(),
        scale in -3.0..3.0f64,
    ) {
        let engine = engine(spin_adapted);
        let space = block(spin_adapted);
        let comp = CompositeStateInfo::tensor_product(&space, &space).unwrap();
        let id = SparseMatrix::identity(&space);
        let c = random_wavefunction(&space, seed);
        let mut v = c.zeros_like();
        engine.tensor_product_multiply(
            &id,
            &id,
            &c,
            &mut v,
            BraKet::Same(&comp),
            &QuantumNumber::vacuum(),
            scale,
        );
        for ((_, x), (_, y)) in v.non_zero_blocks().iter().zip(c.non_zero_blocks().iter()) {
            prop_assert!(abs_diff_eq!(x, &(y * scale), epsilon = 1e-12));
        }
    }
}
