// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Bounded lock-free ring queue
//!
//! A ring of `N` slots, each a `(ready, task)` pair, with two monotonic
//! ticket counters. Producers and consumers claim tickets with a relaxed
//! `fetch_add` and rendezvous on the claimed slot's `ready` flag:
//!
//! ```text
//!              produced ──┐                 ┌── consumed
//!                         ▼                 ▼
//!   slots: [ ready=false ][ ready=true ][ ready=true ][ ready=false ]
//!             writable      readable      readable      writable
//! ```
//!
//! `ready == false` means the slot is writable (it holds the invalid
//! sentinel task); `ready == true` means a payload is readable. Writes of
//! the flag release the payload, reads acquire it.
//!
//! # Known limitations
//!
//! Under heavy contention the ticket protocol has two documented races,
//! inherited from the design rather than fixable in place:
//!
//! - a producer preempted between claiming its ticket and publishing the
//!   payload leaves a consumer spin-yielding on that slot until the
//!   producer is rescheduled;
//! - two consumers can both observe `consumed < produced`, claim tickets,
//!   and leave one of them waiting on a slot that has no producer yet.
//!
//! A larger `N` shrinks the window for both; it does not close it. The
//! bus compensates at shutdown by injecting sentinel tasks so a consumer
//! parked on a `ready` flag wakes up and observes the stop flag.

use super::TaskQueue;
use crate::task::Task;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

struct Slot {
    ready: AtomicBool,
    task: UnsafeCell<Task>,
}

impl Default for Slot {
    fn default() -> Self {
        Slot {
            ready: AtomicBool::new(false),
            task: UnsafeCell::new(Task::default()),
        }
    }
}

/// A bounded, lock-free task queue over `N` slots.
///
/// `N` must be a power of two (checked at compile time) so that ticket
/// numbers wrap onto slot indices with a mask instead of a division.
pub struct LockFreeRingQueue<const N: usize> {
    slots: Box<[Slot]>,
    produced: CachePadded<AtomicUsize>,
    consumed: CachePadded<AtomicUsize>,
}

// SAFETY: a slot's payload is only touched by the single thread that
// claimed its ticket, and only on the side of the `ready` handoff that
// the flag currently grants to it; `Task` itself is `Send`.
unsafe impl<const N: usize> Send for LockFreeRingQueue<N> {}
unsafe impl<const N: usize> Sync for LockFreeRingQueue<N> {}

impl<const N: usize> LockFreeRingQueue<N> {
    const MASK: usize = N - 1;

    /// Creates an empty ring of `N` sentinel-filled slots.
    pub fn new() -> Self {
        const {
            assert!(N.is_power_of_two(), "ring capacity must be a power of two");
        }
        LockFreeRingQueue {
            slots: (0..N).map(|_| Slot::default()).collect(),
            produced: CachePadded::new(AtomicUsize::new(0)),
            consumed: CachePadded::new(AtomicUsize::new(0)),
        }
    }
}

impl<const N: usize> Default for LockFreeRingQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TaskQueue for LockFreeRingQueue<N> {
    fn enqueue(&self, task: Task) {
        let ticket = self.produced.fetch_add(1, Ordering::Relaxed);
        let slot = &self.slots[ticket & Self::MASK];
        // Capacity wait: the slot still holds an unconsumed payload from
        // one lap ago.
        while slot.ready.load(Ordering::Acquire) {
            thread::yield_now();
        }
        // SAFETY: holding the ticket for a non-ready slot grants exclusive
        // write access until the release store below.
        unsafe {
            *slot.task.get() = task;
        }
        slot.ready.store(true, Ordering::Release);
    }

    fn try_enqueue(&self, task: Task) -> Result<(), Task> {
        let mut ticket = self.produced.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[ticket & Self::MASK];
            if slot.ready.load(Ordering::Acquire) {
                return Err(task);
            }
            match self.produced.compare_exchange_weak(
                ticket,
                ticket.wrapping_add(1),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    // SAFETY: same exclusive-claim argument as `enqueue`,
                    // with the ticket taken by compare-exchange.
                    unsafe {
                        *slot.task.get() = task;
                    }
                    slot.ready.store(true, Ordering::Release);
                    return Ok(());
                }
                Err(current) => ticket = current,
            }
        }
    }

    fn try_dequeue(&self) -> Option<Task> {
        if self.consumed.load(Ordering::Relaxed) >= self.produced.load(Ordering::Acquire) {
            return None;
        }
        let ticket = self.consumed.fetch_add(1, Ordering::Relaxed);
        let slot = &self.slots[ticket & Self::MASK];
        // The counter comparison above said a payload is pending, so this
        // wait is bounded by its producer finishing the publish.
        while !slot.ready.load(Ordering::Acquire) {
            thread::yield_now();
        }
        // SAFETY: observing `ready == true` with the claimed ticket grants
        // exclusive read access; the sentinel swap restores the slot's
        // writable state before the release store hands it back.
        let task = unsafe { slot.task.get().replace(Task::default()) };
        slot.ready.store(false, Ordering::Release);
        Some(task)
    }

    fn len(&self) -> usize {
        let produced = self.produced.load(Ordering::Relaxed);
        let consumed = self.consumed.load(Ordering::Relaxed);
        produced.saturating_sub(consumed)
    }
}

impl<const N: usize> fmt::Debug for LockFreeRingQueue<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeRingQueue")
            .field("capacity", &N)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, Handler};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Numbered(usize);
    impl Event for Numbered {}

    #[derive(Default)]
    struct Tally {
        sum: AtomicUsize,
        count: AtomicUsize,
    }
    impl Handler<Numbered> for Tally {
        fn handle(&self, event: Numbered, _queue: usize) {
            self.sum.fetch_add(event.0, Ordering::SeqCst);
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn empty_ring_dequeues_none() {
        let queue = LockFreeRingQueue::<8>::new();
        assert!(queue.try_dequeue().is_none());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn roundtrip_wraps_past_capacity() {
        let tally: &'static Tally = Box::leak(Box::default());
        let queue = LockFreeRingQueue::<4>::new();
        // Three laps around a 4-slot ring.
        for i in 0..12 {
            queue.enqueue(Task::new(tally, Numbered(i)));
            queue.try_dequeue().expect("just enqueued").run(0);
        }
        assert_eq!(tally.count.load(Ordering::SeqCst), 12);
        assert_eq!(tally.sum.load(Ordering::SeqCst), (0..12).sum());
    }

    #[test]
    fn try_enqueue_reports_a_full_ring() {
        let tally: &'static Tally = Box::leak(Box::default());
        let queue = LockFreeRingQueue::<2>::new();
        assert!(queue.try_enqueue(Task::new(tally, Numbered(0))).is_ok());
        assert!(queue.try_enqueue(Task::new(tally, Numbered(1))).is_ok());
        let rejected = queue.try_enqueue(Task::new(tally, Numbered(2)));
        assert!(rejected.is_err());
        // The rejected task still owns its event and drops it cleanly.
        drop(rejected);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn spsc_handoff_across_threads() {
        let tally: &'static Tally = Box::leak(Box::default());
        let queue = Arc::new(LockFreeRingQueue::<8>::new());

        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for i in 0..1_000 {
                    queue.enqueue(Task::new(tally, Numbered(i)));
                }
            })
        };
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut received = 0;
                while received < 1_000 {
                    if let Some(task) = queue.try_dequeue() {
                        task.run(0);
                        received += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
            })
        };
        producer.join().unwrap();
        consumer.join().unwrap();
        assert_eq!(tally.count.load(Ordering::SeqCst), 1_000);
        assert_eq!(tally.sum.load(Ordering::SeqCst), (0..1_000).sum());
    }
}
