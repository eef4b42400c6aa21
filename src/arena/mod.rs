//! Scratch-buffer allocation shared between worker threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use log;

#[cfg(test)]
#[path = "arena_tests.rs"]
mod arena_tests;

// =================
// Trait definitions
// =================

/// Trait for thread-safe providers of dense scratch buffers.
pub trait Arena: Send + Sync {
    /// Acquires a zero-initialised buffer of `len` elements.
    fn acquire(&self, len: usize) -> Vec<f64>;

    /// Returns a buffer previously obtained from [`Self::acquire`].
    fn release(&self, buffer: Vec<f64>);
}

// ==================
// Struct definitions
// ==================

// ----------
// StackArena
// ----------

/// An arena recycling released buffers through a free list.
///
/// The arena keeps count of the buffers currently handed out and of the largest number of
/// elements simultaneously outstanding, so that callers can check that every acquisition has been
/// matched by a release.
#[derive(Debug, Default)]
pub struct StackArena {
    free: Mutex<Vec<Vec<f64>>>,
    outstanding: AtomicUsize,
    outstanding_elements: AtomicUsize,
    peak_elements: AtomicUsize,
}

impl StackArena {
    /// Constructs an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of buffers acquired but not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Returns the largest number of elements that have been outstanding at any one time.
    pub fn peak_elements(&self) -> usize {
        self.peak_elements.load(Ordering::SeqCst)
    }
}

impl Arena for StackArena {
    fn acquire(&self, len: usize) -> Vec<f64> {
        let recycled = {
            let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
            free.iter()
                .position(|buf| buf.capacity() >= len)
                .map(|i| free.swap_remove(i))
        };
        let mut buffer = recycled.unwrap_or_else(|| Vec::with_capacity(len));
        buffer.clear();
        buffer.resize(len, 0.0);

        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let now = self.outstanding_elements.fetch_add(len, Ordering::SeqCst) + len;
        self.peak_elements.fetch_max(now, Ordering::SeqCst);
        buffer
    }

    fn release(&self, buffer: Vec<f64>) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.outstanding_elements
            .fetch_sub(buffer.len(), Ordering::SeqCst);
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(buffer);
    }
}

// ----------
// ScratchPool
// ----------

/// A set of per-worker scratch buffers acquired from an [`Arena`] for the duration of one
/// parallel region.
///
/// Each worker of a `rayon` pool uses the slot indexed by its thread index, so within the
/// engine's own pool slots are never contended. All buffers are returned to the arena when the
/// pool is dropped, on every exit path.
pub struct ScratchPool<'a> {
    arena: &'a dyn Arena,

    // Threads outside any rayon pool, and pools wider than the slot count, map onto shared slots,
    // so each slot keeps its own lock. The lock is uncontended inside the engine's pool.
    slots: Vec<Mutex<Vec<f64>>>,
    len: usize,
}

impl<'a> ScratchPool<'a> {
    /// Acquires `n_slots` buffers of `len` elements each.
    pub fn new(arena: &'a dyn Arena, n_slots: usize, len: usize) -> Self {
        let slots = (0..n_slots.max(1))
            .map(|_| Mutex::new(arena.acquire(len)))
            .collect::<Vec<_>>();
        log::trace!("Acquired {} scratch slots of {len} elements.", slots.len());
        Self { arena, slots, len }
    }

    /// Returns the number of elements in each slot.
    pub fn slot_len(&self) -> usize {
        self.len
    }

    /// Returns the number of slots.
    pub fn n_slots(&self) -> usize {
        self.slots.len()
    }

    /// Runs `f` on the scratch slot of the calling worker.
    ///
    /// Callers that are not rayon workers all use the first slot, one at a time.
    pub fn with_slot<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut [f64]) -> R,
    {
        let index = rayon::current_thread_index().unwrap_or(0) % self.slots.len();
        let mut slot = self.slots[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(slot.as_mut_slice())
    }
}

impl Drop for ScratchPool<'_> {
    fn drop(&mut self) {
        while let Some(slot) = self.slots.pop() {
            self.arena
                .release(slot.into_inner().unwrap_or_else(PoisonError::into_inner));
        }
    }
}
