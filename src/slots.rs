use crate::{
    config::Admission,
    sync::{AtomicBool, AtomicUsize, Condvar, Mutex, Ordering, spin_loop},
    types::SlotId,
};
use core::num::NonZeroUsize;
use std::sync::PoisonError;

/// One admission unit. Busy from the moment a task is admitted into it until
/// that task signals completion.
#[derive(Debug)]
#[repr(align(128))]
struct Slot {
    busy: AtomicBool,
}

/// Fixed table of admission slots bounding the number of in-flight tasks.
///
/// Memory ordering protocol:
/// - The admitter flips a slot from free to busy with an Acquire
///   compare-exchange, so it observes everything the previous occupant did
///   before releasing.
/// - A finishing task frees its slot and decrements `in_flight` with Release
///   stores, publishing every write it made to the grid and to the flags.
/// - [`SlotPool::all_free`] loads `in_flight` with Acquire, so once it returns
///   `true` all released work is visible to the caller.
///
/// `acquire` and `try_acquire` are meant to be called from a single admitting
/// thread; `release` may be called from any thread.
#[derive(Debug)]
pub struct SlotPool {
    slots: Box<[Slot]>,
    in_flight: AtomicUsize,
    admission: Admission,
    parked: Mutex<()>,
    freed: Condvar,
}

impl SlotPool {
    /// Create `capacity` free slots.
    #[must_use]
    pub fn new(capacity: NonZeroUsize, admission: Admission) -> Self {
        let slots = (0..capacity.get())
            .map(|_| Slot {
                busy: AtomicBool::new(false),
            })
            .collect();
        Self {
            slots,
            in_flight: AtomicUsize::new(0),
            admission,
            parked: Mutex::new(()),
            freed: Condvar::new(),
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots currently busy.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether every slot is free, i.e. no admitted task is still running.
    #[must_use]
    pub fn all_free(&self) -> bool {
        self.in_flight() == 0
    }

    /// Whether `slot` is currently free.
    #[must_use]
    pub fn is_free(&self, slot: SlotId) -> bool {
        !self.slots[slot.0].busy.load(Ordering::Acquire)
    }

    /// Claim the first free slot, if any, without waiting.
    ///
    /// The scan takes no global lock. A slot freed while the scan already
    /// passed it is simply missed, and the caller retries.
    pub fn try_acquire(&self) -> Option<SlotId> {
        let idx = self.slots.iter().position(|slot| {
            slot.busy
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        })?;
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        Some(SlotId(idx))
    }

    /// Claim a free slot, waiting according to the admission policy until one
    /// is available.
    pub fn acquire(&self) -> SlotId {
        loop {
            if let Some(slot) = self.try_acquire() {
                return slot;
            }
            match self.admission {
                Admission::Spin => spin_loop(),
                Admission::Block => self.park_until_freed(),
            }
        }
    }

    /// Mark `slot` free again. Called by the task occupying it, as its very
    /// last action.
    ///
    /// # Panics
    /// If `slot` is out of range.
    pub fn release(&self, slot: SlotId) {
        let was_busy = self.slots[slot.0].busy.swap(false, Ordering::Release);
        debug_assert!(was_busy, "SlotPool::release: slot {slot} was already free");
        self.in_flight.fetch_sub(1, Ordering::Release);
        if self.admission == Admission::Block {
            // Taking the lock orders this release after any check made by a
            // parked admitter, so the notification cannot be lost.
            let _guard = self.parked.lock().unwrap_or_else(PoisonError::into_inner);
            self.freed.notify_one();
        }
    }

    fn park_until_freed(&self) {
        let mut guard = self.parked.lock().unwrap_or_else(PoisonError::into_inner);
        while self.in_flight.load(Ordering::Acquire) >= self.slots.len() {
            guard = self
                .freed
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
