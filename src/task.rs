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

//! # Inline-erased one-shot task
//!
//! A [`Task`] is one pending handler invocation: a consumer reference and
//! the event value it will receive, erased behind a two-entry vtable and
//! stored inline in a fixed 64-byte buffer. No heap allocation happens per
//! task, and no general-purpose closure machinery is involved; the erasure
//! is a single monomorphized trampoline per `(consumer, event)` pair.
//!
//! # Architecture
//!
//! ```text
//! Task
//! ├─ buffer: [u8; 64]            Payload { &'static C, E } written in place
//! └─ vtable: Option<&'static _>  run / drop_payload for that (C, E) pair
//!                                None = invalid sentinel
//! ```
//!
//! Ownership is linear: a task owns its embedded event, `run` consumes the
//! task and fires the handler exactly once, and dropping a never-run task
//! releases the event. A default-constructed task is the invalid sentinel;
//! the lock-free queue stores it in empty slots and the bus injects it at
//! shutdown to wake parked workers.

use crate::event::{Event, Handler};
use std::fmt;
use std::mem::{align_of, size_of, MaybeUninit};
use std::ptr;

/// Size of the inline payload buffer in bytes.
pub const INLINE_CAPACITY: usize = 64;

/// Maximum supported payload alignment.
pub const INLINE_ALIGN: usize = 16;

/// What actually lives in the buffer for a given consumer and event type.
struct Payload<C: 'static, E> {
    consumer: &'static C,
    event: E,
}

/// Monomorphized operations on an erased payload.
struct RawVTable {
    run: unsafe fn(*mut u8, usize),
    drop_payload: unsafe fn(*mut u8),
}

/// `run` for a concrete `(C, E)` pair: move the payload out and fire the
/// handler. After this returns the buffer bytes are dead.
unsafe fn run_erased<E: Event, C: Handler<E> + 'static>(payload: *mut u8, queue: usize) {
    let Payload { consumer, event } = payload.cast::<Payload<C, E>>().read();
    consumer.handle(event, queue);
}

/// Drop for a payload that was never run.
unsafe fn drop_erased<E: Event, C: 'static>(payload: *mut u8) {
    ptr::drop_in_place(payload.cast::<Payload<C, E>>());
}

struct VTableFor<C: 'static, E: 'static>(std::marker::PhantomData<fn(&'static C, E)>);

impl<E: Event, C: Handler<E> + Sync + 'static> VTableFor<C, E> {
    const TABLE: RawVTable = RawVTable {
        run: run_erased::<E, C>,
        drop_payload: drop_erased::<E, C>,
    };
}

#[repr(align(16))]
struct Buffer([MaybeUninit<u8>; INLINE_CAPACITY]);

/// One pending handler invocation, stored inline.
///
/// Created by the dispatch layer via [`Task::new`] and consumed by a worker
/// via [`Task::run`]. `Task::default()` is the invalid sentinel recognized
/// by [`is_valid`](Task::is_valid).
pub struct Task {
    buffer: Buffer,
    vtable: Option<&'static RawVTable>,
}

// SAFETY: the only way to construct a valid task is `Task::new`, whose
// bounds require `C: Sync` (so the stored `&'static C` may cross threads)
// and `E: Event` (so the embedded event is `Send`).
unsafe impl Send for Task {}

impl Task {
    /// Packs a handler invocation for `consumer` receiving `event`.
    ///
    /// The pair is written into the inline buffer; a payload whose size or
    /// alignment exceeds the buffer fails to compile.
    pub fn new<E, C>(consumer: &'static C, event: E) -> Self
    where
        E: Event,
        C: Handler<E> + Sync + 'static,
    {
        const {
            assert!(
                size_of::<Payload<C, E>>() <= INLINE_CAPACITY,
                "task payload exceeds the inline buffer"
            );
            assert!(
                align_of::<Payload<C, E>>() <= INLINE_ALIGN,
                "task payload is over-aligned for the inline buffer"
            );
        }
        let mut task = Task {
            buffer: Buffer([MaybeUninit::uninit(); INLINE_CAPACITY]),
            vtable: Some(&VTableFor::<C, E>::TABLE),
        };
        // SAFETY: the const assertions above guarantee the payload fits the
        // buffer and its alignment; the buffer is freshly uninitialized.
        unsafe {
            task.buffer
                .0
                .as_mut_ptr()
                .cast::<Payload<C, E>>()
                .write(Payload { consumer, event });
        }
        task
    }

    /// Whether this task carries a payload (`false` for the sentinel).
    pub fn is_valid(&self) -> bool {
        self.vtable.is_some()
    }

    /// Consumes the task and invokes the handler with the embedded event.
    ///
    /// `queue` is forwarded to the handler as the invoking worker's primary
    /// queue index. Running the sentinel is a no-op.
    pub fn run(mut self, queue: usize) {
        if let Some(vtable) = self.vtable.take() {
            // SAFETY: `vtable` matches the payload written by `new`, and
            // taking it first means `Drop` will not touch the moved-out
            // payload afterwards.
            unsafe { (vtable.run)(self.buffer.0.as_mut_ptr().cast(), queue) }
        }
    }
}

impl Default for Task {
    /// The invalid sentinel task.
    fn default() -> Self {
        Task {
            buffer: Buffer([MaybeUninit::uninit(); INLINE_CAPACITY]),
            vtable: None,
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if let Some(vtable) = self.vtable.take() {
            // SAFETY: a present vtable means the payload written by `new`
            // is still live in the buffer.
            unsafe { (vtable.drop_payload)(self.buffer.0.as_mut_ptr().cast()) }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("valid", &self.is_valid())
            .finish()
    }
}
