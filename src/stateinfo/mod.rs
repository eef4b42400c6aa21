//! State spaces: ordered sets of symmetry sectors and their symmetry-respecting products.

use std::fmt;
use std::ops::Deref;

use anyhow::{self, ensure, format_err};
use derive_builder::Builder;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::Array2;

use crate::quantum::{QuantumNumber, SpinSymmetry};

#[cfg(test)]
#[path = "stateinfo_tests.rs"]
mod stateinfo_tests;

// ==================
// Struct definitions
// ==================

// ---------
// StateInfo
// ---------

/// A structure containing an ordered set of quantum numbers, each labelling a sector of basis
/// states of a given dimension.
#[derive(Builder, Clone, Debug, PartialEq)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct StateInfo {
    /// The quantum numbers of the sectors, in order.
    quanta: Vec<QuantumNumber>,

    /// The number of basis states in each sector.
    quanta_states: Vec<usize>,

    /// The interpretation of the spin labels in [`Self::quanta`].
    #[builder(default = "SpinSymmetry::SpinAdapted")]
    mode: SpinSymmetry,
}

impl StateInfoBuilder {
    fn validate(&self) -> Result<(), String> {
        let quanta = self
            .quanta
            .as_ref()
            .ok_or("Quantum numbers not set.".to_string())?;
        let quanta_states = self
            .quanta_states
            .as_ref()
            .ok_or("Sector dimensions not set.".to_string())?;
        if quanta.len() != quanta_states.len() {
            return Err(format!(
                "Inconsistent numbers of quanta ({}) and sector dimensions ({}).",
                quanta.len(),
                quanta_states.len()
            ));
        }
        if !quanta.iter().all_unique() {
            return Err("Duplicate quantum numbers in a state space.".to_string());
        }
        Ok(())
    }
}

impl StateInfo {
    /// Returns a builder to construct a new [`StateInfo`].
    pub fn builder() -> StateInfoBuilder {
        StateInfoBuilder::default()
    }

    /// Constructs a state space from its quanta and sector dimensions.
    pub fn new(
        quanta: Vec<QuantumNumber>,
        quanta_states: Vec<usize>,
        mode: SpinSymmetry,
    ) -> Result<Self, anyhow::Error> {
        Self::builder()
            .quanta(quanta)
            .quanta_states(quanta_states)
            .mode(mode)
            .build()
            .map_err(|err| format_err!(err))
    }

    /// Derives the renormalised state space defined by a rotation map.
    ///
    /// Only the sectors whose rotation matrices retain at least one column survive, in their
    /// original order, with the number of retained columns as their new dimension.
    ///
    /// # Arguments
    ///
    /// * `old` - The state space before renormalisation.
    /// * `rotation` - One matrix per sector of `old`, each of shape `(old_dim, new_dim)`.
    pub fn from_rotation(old: &StateInfo, rotation: &[Array2<f64>]) -> Result<Self, anyhow::Error> {
        ensure!(
            rotation.len() == old.n_quanta(),
            "Rotation map has {} sectors but the state space has {}.",
            rotation.len(),
            old.n_quanta()
        );
        for (i, rot) in rotation.iter().enumerate() {
            ensure!(
                rot.ncols() == 0 || rot.nrows() == old.quanta_states(i),
                "Rotation matrix for sector {i} has {} rows; expected {}.",
                rot.nrows(),
                old.quanta_states(i)
            );
        }
        let (quanta, quanta_states): (Vec<_>, Vec<_>) = old
            .quanta
            .iter()
            .zip(rotation.iter())
            .filter(|(_, rot)| rot.ncols() != 0)
            .map(|(q, rot)| (*q, rot.ncols()))
            .unzip();
        Self::new(quanta, quanta_states, old.mode)
    }

    /// Returns the quantum numbers of all sectors.
    pub fn quanta(&self) -> &[QuantumNumber] {
        &self.quanta
    }

    /// Returns the quantum number of sector `i`.
    pub fn quantum(&self, i: usize) -> &QuantumNumber {
        &self.quanta[i]
    }

    /// Returns the number of sectors.
    pub fn n_quanta(&self) -> usize {
        self.quanta.len()
    }

    /// Returns the dimension of sector `i`.
    pub fn quanta_states(&self, i: usize) -> usize {
        self.quanta_states[i]
    }

    /// Returns the dimensions of all sectors.
    pub fn all_quanta_states(&self) -> &[usize] {
        &self.quanta_states
    }

    /// Returns the total number of basis states.
    pub fn total_states(&self) -> usize {
        self.quanta_states.iter().sum()
    }

    /// Returns the interpretation of the spin labels.
    pub fn mode(&self) -> SpinSymmetry {
        self.mode
    }

    /// Returns the index of the sector labelled by `q`, if any.
    pub fn find(&self, q: &QuantumNumber) -> Option<usize> {
        self.quanta.iter().position(|x| x == q)
    }

    /// Returns the offset of each sector in the full, unblocked list of basis states.
    pub fn unblocked_index(&self) -> Vec<usize> {
        self.quanta_states
            .iter()
            .scan(0, |acc, &dim| {
                let offset = *acc;
                *acc += dim;
                Some(offset)
            })
            .collect()
    }
}

impl fmt::Display for StateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "State space ({}): {} sectors, {} states",
            self.mode,
            self.n_quanta(),
            self.total_states()
        )?;
        for (q, dim) in self.quanta.iter().zip(self.quanta_states.iter()) {
            writeln!(f, "  {q} × {dim}")?;
        }
        Ok(())
    }
}

// ----
// Slot
// ----

/// One uncollected sector of a composite state space, *i.e.* one coupled label arising from a
/// particular pair of left and right sectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    /// The index of the left sector.
    pub left: usize,

    /// The index of the right sector.
    pub right: usize,

    /// The coupled label.
    pub quantum: QuantumNumber,

    /// The number of basis states, the product of the left and right sector dimensions.
    pub states: usize,

    /// The index of the collected sector this slot belongs to.
    pub collected: usize,

    /// The offset of this slot inside its collected sector.
    pub offset: usize,
}

// ------------------
// CompositeStateInfo
// ------------------

/// A structure describing the symmetry-respecting product of two state spaces.
///
/// Sectors of equal coupled label are collected into a single sector, with the collected labels
/// sorted in increasing order. Within a collected sector the constituent slots appear in the
/// order in which the `(left, right)` pairs are enumerated, left index outermost.
///
/// The constituent spaces are borrowed: a composite space cannot outlive them.
#[derive(Clone, Debug)]
pub struct CompositeStateInfo<'a> {
    left: &'a StateInfo,
    right: &'a StateInfo,
    collected: StateInfo,
    slots: Vec<Slot>,
    old_to_new_state: Vec<Vec<usize>>,
    slot_lookup: IndexMap<(usize, usize), Vec<usize>>,
}

impl<'a> CompositeStateInfo<'a> {
    /// Constructs the product of two state spaces, keeping every coupled label.
    pub fn tensor_product(
        left: &'a StateInfo,
        right: &'a StateInfo,
    ) -> Result<Self, anyhow::Error> {
        Self::tensor_product_filtered(left, right, |_| true)
    }

    /// Constructs the product of two state spaces, keeping only coupled labels accepted by
    /// `keep`.
    ///
    /// # Arguments
    ///
    /// * `left` - The left constituent space.
    /// * `right` - The right constituent space.
    /// * `keep` - A predicate on coupled labels.
    pub fn tensor_product_filtered<F>(
        left: &'a StateInfo,
        right: &'a StateInfo,
        keep: F,
    ) -> Result<Self, anyhow::Error>
    where
        F: Fn(&QuantumNumber) -> bool,
    {
        ensure!(
            left.mode() == right.mode(),
            "Cannot combine state spaces with different spin symmetries ({} and {}).",
            left.mode(),
            right.mode()
        );
        let mode = left.mode();

        let raw_slots = (0..left.n_quanta())
            .cartesian_product(0..right.n_quanta())
            .flat_map(|(l, r)| {
                left.quantum(l)
                    .couple(right.quantum(r), mode)
                    .into_iter()
                    .filter(|q| keep(q))
                    .map(|q| (l, r, q))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let collected_quanta = raw_slots
            .iter()
            .map(|(_, _, q)| *q)
            .sorted()
            .dedup()
            .collect::<Vec<_>>();

        let mut old_to_new_state = vec![vec![]; collected_quanta.len()];
        let mut collected_states = vec![0; collected_quanta.len()];
        let mut slots = Vec::with_capacity(raw_slots.len());
        let mut slot_lookup = IndexMap::<(usize, usize), Vec<usize>>::new();
        for (u, (l, r, q)) in raw_slots.into_iter().enumerate() {
            let cq = collected_quanta
                .binary_search(&q)
                .map_err(|_| format_err!("Coupled label {q} missing from collected quanta."))?;
            let states = left.quanta_states(l) * right.quanta_states(r);
            slots.push(Slot {
                left: l,
                right: r,
                quantum: q,
                states,
                collected: cq,
                offset: collected_states[cq],
            });
            collected_states[cq] += states;
            old_to_new_state[cq].push(u);
            slot_lookup.entry((l, r)).or_default().push(u);
        }

        let collected = StateInfo::new(collected_quanta, collected_states, mode)?;
        Ok(Self {
            left,
            right,
            collected,
            slots,
            old_to_new_state,
            slot_lookup,
        })
    }

    /// Returns the left constituent space.
    pub fn left(&self) -> &'a StateInfo {
        self.left
    }

    /// Returns the right constituent space.
    pub fn right(&self) -> &'a StateInfo {
        self.right
    }

    /// Returns the collected state space.
    pub fn collected(&self) -> &StateInfo {
        &self.collected
    }

    /// Returns all uncollected slots.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Returns the uncollected slot `u`.
    pub fn slot(&self, u: usize) -> &Slot {
        &self.slots[u]
    }

    /// Returns the uncollected slots making up collected sector `cq`, in order.
    pub fn old_to_new_state(&self, cq: usize) -> &[usize] {
        &self.old_to_new_state[cq]
    }

    /// Returns the left sector index of uncollected slot `u`.
    pub fn left_unmap_quanta(&self, u: usize) -> usize {
        self.slots[u].left
    }

    /// Returns the right sector index of uncollected slot `u`.
    pub fn right_unmap_quanta(&self, u: usize) -> usize {
        self.slots[u].right
    }

    /// Returns the uncollected slots arising from the pair `(l, r)`.
    pub fn pair_slots(&self, l: usize, r: usize) -> &[usize] {
        self.slot_lookup
            .get(&(l, r))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the collected sectors reachable from the pair `(l, r)`.
    pub fn quanta_map(&self, l: usize, r: usize) -> Vec<usize> {
        self.pair_slots(l, r)
            .iter()
            .map(|&u| self.slots[u].collected)
            .collect()
    }

    /// Returns `true` if the pair `(l, r)` couples to at least one retained collected sector.
    pub fn allowed_quanta(&self, l: usize, r: usize) -> bool {
        !self.pair_slots(l, r).is_empty()
    }
}

impl Deref for CompositeStateInfo<'_> {
    type Target = StateInfo;

    fn deref(&self) -> &Self::Target {
        &self.collected
    }
}

impl fmt::Display for CompositeStateInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Composite state space: {} × {} sectors → {} slots, {} collected sectors",
            self.left.n_quanta(),
            self.right.n_quanta(),
            self.slots.len(),
            self.collected.n_quanta()
        )?;
        for (cq, slots) in self.old_to_new_state.iter().enumerate() {
            writeln!(
                f,
                "  {} × {} ← {}",
                self.collected.quantum(cq),
                self.collected.quanta_states(cq),
                slots
                    .iter()
                    .map(|&u| format!("({}, {})", self.slots[u].left, self.slots[u].right))
                    .join(" ")
            )?;
        }
        Ok(())
    }
}

// =========
// Functions
// =========

/// Returns the indices of the old sectors retained by a rotation map, *i.e.* the new-to-old
/// sector correspondence.
pub fn retained_sectors(rotation: &[Array2<f64>]) -> Vec<usize> {
    rotation
        .iter()
        .enumerate()
        .filter(|(_, rot)| rot.ncols() != 0)
        .map(|(q, _)| q)
        .collect()
}
