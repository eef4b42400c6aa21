use std::thread;

use rayon::prelude::*;

use crate::arena::{Arena, ScratchPool, StackArena};

#[test]
fn test_arena_acquire_release_balance() {
    let arena = StackArena::new();
    let a = arena.acquire(10);
    let b = arena.acquire(4);
    assert_eq!(a.len(), 10);
    assert!(b.iter().all(|&x| x == 0.0));
    assert_eq!(arena.outstanding(), 2);
    assert_eq!(arena.peak_elements(), 14);
    arena.release(a);
    arena.release(b);
    assert_eq!(arena.outstanding(), 0);

    // Recycled buffers come back zeroed.
    let mut c = arena.acquire(8);
    c.iter_mut().for_each(|x| *x = 3.0);
    arena.release(c);
    let d = arena.acquire(8);
    assert!(d.iter().all(|&x| x == 0.0));
    arena.release(d);
    assert_eq!(arena.outstanding(), 0);
    assert_eq!(arena.peak_elements(), 14);
}

#[test]
fn test_arena_scratch_pool_released_on_drop() {
    let arena = StackArena::new();
    {
        let pool = ScratchPool::new(&arena, 3, 16);
        assert_eq!(pool.n_slots(), 3);
        assert_eq!(pool.slot_len(), 16);
        assert_eq!(arena.outstanding(), 3);
        let total = (0..64)
            .into_par_iter()
            .map(|i| {
                pool.with_slot(|slot| {
                    slot[0] = i as f64;
                    slot[0]
                })
            })
            .sum::<f64>();
        assert_eq!(total, (0..64).sum::<i32>() as f64);
    }
    assert_eq!(arena.outstanding(), 0);
}

#[test]
fn test_arena_scratch_pool_released_on_unwind() {
    let arena = StackArena::new();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let pool = ScratchPool::new(&arena, 2, 4);
        pool.with_slot(|_| panic!("worker failure"));
    }));
    assert!(result.is_err());
    assert_eq!(arena.outstanding(), 0);
}

#[test]
fn test_arena_scratch_pool_shared_outside_rayon() {
    let arena = StackArena::new();
    let pool = ScratchPool::new(&arena, 2, 1);
    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..250 {
                    pool.with_slot(|slot| slot[0] += 1.0);
                }
            });
        }
    });
    assert_eq!(pool.with_slot(|slot| slot[0]), 1000.0);
    drop(pool);
    assert_eq!(arena.outstanding(), 0);
}
