#![allow(missing_docs)]
#![cfg(feature = "loom")]

use cbr::{Admission, slots::SlotPool};
use core::num::NonZeroUsize;
use loom::{cell::UnsafeCell, sync::Arc, thread};

/// A slot pool plus one plain cell per task, standing in for grid cells that
/// tasks write without any lock.
struct Shared {
    pool: SlotPool,
    cells: Vec<UnsafeCell<u32>>,
}

// SAFETY: Each cell is written by a single task, and read only after the slot
// protocol has published that write.
unsafe impl Sync for Shared {}

impl Shared {
    fn new(capacity: usize, admission: Admission) -> Arc<Self> {
        let cells = (0..capacity).map(|_| UnsafeCell::new(0)).collect();
        Arc::new(Self {
            pool: SlotPool::new(NonZeroUsize::new(capacity).unwrap(), admission),
            cells,
        })
    }

    fn write(&self, idx: usize, value: u32) {
        self.cells[idx].with_mut(|ptr| unsafe { *ptr = value });
    }

    fn read(&self, idx: usize) -> u32 {
        self.cells[idx].with(|ptr| unsafe { *ptr })
    }
}

fn spawn_task(shared: &Arc<Shared>, idx: usize, value: u32) -> thread::JoinHandle<()> {
    let slot = shared.pool.acquire();
    let shared = shared.clone();
    thread::spawn(move || {
        shared.write(idx, value);
        shared.pool.release(slot);
    })
}

#[test]
fn loom_all_free_publishes_task_writes() {
    for admission in [Admission::Spin, Admission::Block] {
        loom::model(move || {
            let shared = Shared::new(1, admission);
            let worker = spawn_task(&shared, 0, 42);

            while !shared.pool.all_free() {
                thread::yield_now();
            }
            assert_eq!(shared.read(0), 42);
            worker.join().unwrap();
        });
    }
}

#[test]
fn loom_reacquired_slot_sees_previous_occupant() {
    for admission in [Admission::Spin, Admission::Block] {
        loom::model(move || {
            let shared = Shared::new(1, admission);
            let first = spawn_task(&shared, 0, 7);

            // Capacity is one, so this waits for the first task to finish.
            let slot = shared.pool.acquire();
            assert_eq!(slot.index(), 0);
            assert_eq!(shared.read(0), 7);
            shared.pool.release(slot);
            first.join().unwrap();
        });
    }
}

#[test]
fn loom_barrier_waits_for_every_task() {
    loom::model(|| {
        let shared = Shared::new(2, Admission::Block);
        let left = spawn_task(&shared, 0, 1);
        let right = spawn_task(&shared, 1, 2);
        assert!(shared.pool.in_flight() <= 2);

        while !shared.pool.all_free() {
            thread::yield_now();
        }
        assert_eq!(shared.read(0) + shared.read(1), 3);
        left.join().unwrap();
        right.join().unwrap();
    });
}
