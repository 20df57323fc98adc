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

//! # Task queues
//!
//! Two interchangeable queue implementations behind one contract:
//!
//! - [`MutexQueue`]: an unbounded FIFO behind a single lock. Simple and
//!   adequate when handlers do real work.
//! - [`LockFreeRingQueue`]: a bounded ring with atomic slot handoff.
//!   Roughly doubles throughput for tiny handlers, at the cost of
//!   sensitivity to thread preemption (see its module docs).
//!
//! The bus is generic over the queue type, so the choice is made once at
//! the bus's type and every queue in the bus uses the same implementation.

mod mutex;
mod ring;

pub use mutex::MutexQueue;
pub use ring::LockFreeRingQueue;

use crate::task::Task;

/// Common contract of the bus's task queues.
///
/// Both mutating operations are internally synchronized; the bus shares
/// queues freely between producers and workers.
pub trait TaskQueue: Default + Send + Sync + 'static {
    /// Adds a task to the queue. Never drops the task; may block briefly
    /// under contention (lock hold or a full ring).
    fn enqueue(&self, task: Task);

    /// Bounded-effort enqueue. Returns the task back instead of waiting
    /// when the queue cannot accept it right now.
    fn try_enqueue(&self, task: Task) -> Result<(), Task>;

    /// Removes one task if one is immediately available. Returns `None`
    /// when the queue is empty or momentarily unavailable; never blocks
    /// beyond a constant-bounded attempt.
    fn try_dequeue(&self) -> Option<Task>;

    /// Best-effort snapshot of the number of pending tasks.
    fn len(&self) -> usize;

    /// Whether the queue currently appears empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
