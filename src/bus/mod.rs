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

//! # Bus and workers
//!
//! The [`Bus`] owns a fixed array of task queues and a fixed pool of
//! worker threads. Both counts are compile-time parameters, as is the
//! queue implementation:
//!
//! ```text
//! Bus<Q, NQ, NW>
//! ├─ queues:  [Q; NQ]         shared, internally synchronized
//! ├─ rotor:   AtomicUsize     round-robin placement counter
//! ├─ stop:    AtomicBool      one-way shutdown flag
//! └─ workers: NW × JoinHandle
//! ```
//!
//! Each worker is bound to a primary queue (`worker index mod NQ`). A
//! worker probes its primary first and, when it comes up empty, steals
//! from the remaining queues in cyclic order, so one slow handler cannot
//! stall tasks sitting on its queue while other workers idle.
//!
//! Workers never park. An all-empty pass costs one cooperative yield and
//! the probing resumes, which keeps dispatch latency flat at the price of
//! busy polling on an idle bus.

use crate::queue::TaskQueue;
use crate::task::Task;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Queue argument requesting rotating placement.
///
/// Any value `>= NQ` has the same meaning; this constant is the
/// conventional spelling.
pub const ROUND_ROBIN: usize = usize::MAX;

/// The bus facet senders hold: enqueue erased tasks without seeing the
/// bus's type parameters.
pub trait TaskSink: Send + Sync {
    /// Enqueues a task on queue `queue`, or round-robin when `queue` is
    /// out of range.
    fn send_task(&self, task: Task, queue: usize);

    /// Number of queues in the bus.
    fn queue_count(&self) -> usize;
}

/// State shared between the bus handle and its workers.
struct Shared<Q, const NQ: usize> {
    queues: [Q; NQ],
    rotor: AtomicUsize,
    stop: AtomicBool,
}

/// A fixed pool of queues and worker threads routing tasks to consumers.
///
/// `Q` selects the queue implementation, `NQ` the queue count, `NW` the
/// worker count; all three are fixed at compile time. Dropping the bus
/// stops it: workers finish their current task and exit, then pending
/// tasks still sitting in the queues are released unrun.
pub struct Bus<Q: TaskQueue, const NQ: usize, const NW: usize> {
    shared: Arc<Shared<Q, NQ>>,
    workers: Vec<JoinHandle<()>>,
}

impl<Q: TaskQueue, const NQ: usize, const NW: usize> Bus<Q, NQ, NW> {
    /// Constructs the queues and spawns the worker pool.
    pub fn new() -> Self {
        const {
            assert!(NQ > 0, "a bus needs at least one queue");
            assert!(NW > 0, "a bus needs at least one worker");
        }
        let shared = Arc::new(Shared {
            queues: std::array::from_fn(|_| Q::default()),
            rotor: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
        });
        let workers = (0..NW)
            .map(|index| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("omnibus-worker-{index}"))
                    .spawn(move || worker_loop(&shared, index))
                    .expect("failed to spawn bus worker thread")
            })
            .collect();
        log::info!("bus started: {NQ} queue(s), {NW} worker(s)");
        Bus { shared, workers }
    }

    /// Enqueues a task.
    ///
    /// `queue < NQ` pins the task to that queue; any other value (use
    /// [`ROUND_ROBIN`]) lets the rotor distribute it. Producers that need
    /// FIFO between their own tasks should pin them to one queue, since
    /// no ordering holds across queues.
    pub fn send(&self, task: Task, queue: usize) {
        if queue < NQ {
            self.shared.queues[queue].enqueue(task);
        } else {
            let turn = self.shared.rotor.fetch_add(1, Ordering::Relaxed);
            self.shared.queues[turn % NQ].enqueue(task);
        }
    }

    /// Signals workers to exit after their current task. Idempotent; the
    /// actual join happens on drop.
    ///
    /// Sentinel tasks are pushed into each queue afterwards so that ring
    /// consumers blocked on a claimed slot wake up and observe the flag.
    pub fn stop(&self) {
        if self.shared.stop.swap(true, Ordering::AcqRel) {
            return;
        }
        log::debug!("bus stopping");
        for (index, queue) in self.shared.queues.iter().enumerate() {
            for _ in 0..NW {
                if queue.try_enqueue(Task::default()).is_err() {
                    // A full queue means no consumer is parked on an
                    // empty slot of this ring; nothing to wake.
                    log::warn!("queue {index} full during shutdown wake-up");
                    break;
                }
            }
        }
    }

    /// Best-effort snapshot of pending tasks per queue.
    pub fn queue_sizes(&self) -> [usize; NQ] {
        std::array::from_fn(|index| self.shared.queues[index].len())
    }
}

impl<Q: TaskQueue, const NQ: usize, const NW: usize> Default for Bus<Q, NQ, NW> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: TaskQueue, const NQ: usize, const NW: usize> TaskSink for Bus<Q, NQ, NW> {
    fn send_task(&self, task: Task, queue: usize) {
        self.send(task, queue);
    }

    fn queue_count(&self) -> usize {
        NQ
    }
}

impl<Q: TaskQueue, const NQ: usize, const NW: usize> Drop for Bus<Q, NQ, NW> {
    fn drop(&mut self) {
        self.stop();
        for handle in self.workers.drain(..) {
            // Nothing actionable remains if a worker thread failed.
            let _ = handle.join();
        }
        log::debug!("bus stopped");
    }
}

/// The per-worker probe loop: primary queue first, then steal cyclically.
fn worker_loop<Q: TaskQueue, const NQ: usize>(shared: &Shared<Q, NQ>, index: usize) {
    let primary = index % NQ;
    log::debug!("worker {index} running, primary queue {primary}");
    'scan: while !shared.stop.load(Ordering::Acquire) {
        for offset in 0..NQ {
            let queue = (primary + offset) % NQ;
            if let Some(task) = shared.queues[queue].try_dequeue() {
                if task.is_valid() {
                    log::trace!("worker {index} runs a task from queue {queue}");
                    task.run(primary);
                }
                continue 'scan;
            }
        }
        thread::yield_now();
    }
    log::debug!("worker {index} exiting");
}
