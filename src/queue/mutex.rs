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

//! Unbounded FIFO task queue behind a single mutex.

use super::TaskQueue;
use crate::task::Task;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, TryLockError};

/// An ordered, unbounded task queue guarded by one lock.
///
/// `enqueue` waits for the lock and cannot fail. `try_dequeue` uses a
/// non-blocking lock attempt: a held lock reads as "momentarily
/// unavailable" and returns `None`, which is what lets workers move on
/// and steal from another queue instead of piling up on one mutex.
#[derive(Default)]
pub struct MutexQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl MutexQueue {
    /// Recovers the guard even if a handler panicked mid-operation.
    /// A poisoned queue must keep serving the remaining workers.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl TaskQueue for MutexQueue {
    fn enqueue(&self, task: Task) {
        self.lock().push_back(task);
    }

    fn try_enqueue(&self, task: Task) -> Result<(), Task> {
        self.lock().push_back(task);
        Ok(())
    }

    fn try_dequeue(&self) -> Option<Task> {
        match self.tasks.try_lock() {
            Ok(mut tasks) => tasks.pop_front(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().pop_front(),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

impl fmt::Debug for MutexQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexQueue").field("len", &self.len()).finish()
    }
}
