use ndarray::Array2;

use crate::quantum::{QuantumNumber, SpinSymmetry};
use crate::stateinfo::{retained_sectors, CompositeStateInfo, StateInfo};

fn hubbard_site(mode: SpinSymmetry) -> StateInfo {
    match mode {
        SpinSymmetry::SpinAdapted => StateInfo::new(
            vec![
                QuantumNumber::new(0, 0, 0),
                QuantumNumber::new(1, 1, 0),
                QuantumNumber::new(2, 0, 0),
            ],
            vec![1, 1, 1],
            mode,
        )
        .unwrap(),
        SpinSymmetry::Sz => StateInfo::new(
            vec![
                QuantumNumber::new(0, 0, 0),
                QuantumNumber::new(1, -1, 0),
                QuantumNumber::new(1, 1, 0),
                QuantumNumber::new(2, 0, 0),
            ],
            vec![1, 1, 1, 1],
            mode,
        )
        .unwrap(),
    }
}

#[test]
fn test_stateinfo_builder_validation() {
    let bad = StateInfo::builder()
        .quanta(vec![QuantumNumber::vacuum()])
        .quanta_states(vec![1, 2])
        .build();
    assert!(bad.is_err());

    let dup = StateInfo::new(
        vec![QuantumNumber::vacuum(), QuantumNumber::vacuum()],
        vec![1, 2],
        SpinSymmetry::SpinAdapted,
    );
    assert!(dup.is_err());

    let good = StateInfo::builder()
        .quanta(vec![QuantumNumber::vacuum(), QuantumNumber::new(1, 1, 0)])
        .quanta_states(vec![1, 2])
        .build()
        .unwrap();
    assert_eq!(good.mode(), SpinSymmetry::SpinAdapted);
    assert_eq!(good.total_states(), 3);
    assert_eq!(good.unblocked_index(), vec![0, 1]);
    assert_eq!(good.find(&QuantumNumber::new(1, 1, 0)), Some(1));
}

#[test]
fn test_stateinfo_composite_spin_adapted() {
    let site = hubbard_site(SpinSymmetry::SpinAdapted);
    let comp = CompositeStateInfo::tensor_product(&site, &site).unwrap();

    // 0x0 -> (0,0); 0x1, 1x0 -> (1,1); 0x2, 2x0, 1x1 -> (2,0); 1x1 -> (2,2);
    // 1x2, 2x1 -> (3,1); 2x2 -> (4,0)
    let expected = vec![
        QuantumNumber::new(0, 0, 0),
        QuantumNumber::new(1, 1, 0),
        QuantumNumber::new(2, 0, 0),
        QuantumNumber::new(2, 2, 0),
        QuantumNumber::new(3, 1, 0),
        QuantumNumber::new(4, 0, 0),
    ];
    assert_eq!(comp.quanta(), expected.as_slice());
    assert_eq!(comp.all_quanta_states(), &[1, 2, 3, 1, 2, 1]);
    assert_eq!(comp.slots().len(), 10);

    // The (1, 1) pair couples to both a singlet and a triplet.
    assert_eq!(comp.quanta_map(1, 1), vec![2, 3]);
    assert!(comp.allowed_quanta(2, 2));

    // Slot offsets inside the singlet N = 2 sector follow the enumeration order.
    let singlet = comp.old_to_new_state(2);
    assert_eq!(singlet.len(), 3);
    let offsets = singlet
        .iter()
        .map(|&u| comp.slot(u).offset)
        .collect::<Vec<_>>();
    assert_eq!(offsets, vec![0, 1, 2]);
    let pairs = singlet
        .iter()
        .map(|&u| (comp.left_unmap_quanta(u), comp.right_unmap_quanta(u)))
        .collect::<Vec<_>>();
    assert_eq!(pairs, vec![(0, 2), (1, 1), (2, 0)]);
}

#[test]
fn test_stateinfo_composite_sz_filtered() {
    let site = hubbard_site(SpinSymmetry::Sz);
    let comp = CompositeStateInfo::tensor_product_filtered(&site, &site, |q| q.n == 2).unwrap();
    assert_eq!(
        comp.quanta(),
        &[
            QuantumNumber::new(2, -2, 0),
            QuantumNumber::new(2, 0, 0),
            QuantumNumber::new(2, 2, 0),
        ]
    );
    assert_eq!(comp.all_quanta_states(), &[1, 4, 1]);
    assert!(!comp.allowed_quanta(0, 0));
    assert!(comp.quanta_map(0, 0).is_empty());
}

#[test]
fn test_stateinfo_composite_mode_mismatch() {
    let a = hubbard_site(SpinSymmetry::Sz);
    let b = hubbard_site(SpinSymmetry::SpinAdapted);
    assert!(CompositeStateInfo::tensor_product(&a, &b).is_err());
}

#[test]
fn test_stateinfo_from_rotation() {
    let old = StateInfo::new(
        vec![
            QuantumNumber::new(0, 0, 0),
            QuantumNumber::new(1, 1, 0),
            QuantumNumber::new(2, 0, 0),
        ],
        vec![2, 3, 1],
        SpinSymmetry::SpinAdapted,
    )
    .unwrap();
    let rotation = vec![
        Array2::<f64>::eye(2),
        Array2::<f64>::zeros((3, 0)),
        Array2::<f64>::ones((1, 1)),
    ];
    let new = StateInfo::from_rotation(&old, &rotation).unwrap();
    assert_eq!(
        new.quanta(),
        &[QuantumNumber::new(0, 0, 0), QuantumNumber::new(2, 0, 0)]
    );
    assert_eq!(new.all_quanta_states(), &[2, 1]);
    assert_eq!(retained_sectors(&rotation), vec![0, 2]);

    let short = vec![Array2::<f64>::eye(2)];
    assert!(StateInfo::from_rotation(&old, &short).is_err());
}
