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

//! # Omnibus
//!
//! An in-process, multi-threaded event bus routing strongly-typed events
//! to consumer objects over a pool of work-stealing worker threads.
//!
//! Producers stay decoupled from consumers: they hand an event value to a
//! dispatcher, the dispatcher selects a consumer by handler capability
//! (or by runtime identifier for targeted events), and a worker thread
//! executes the handler with the moved event. Events are moved end to
//! end, never cloned, and each pending invocation lives inline in a
//! fixed-size [`Task`] with no per-event allocation.
//!
//! ```no_run
//! use omnibus::{static_dispatch, Bus, Event, Handler, MutexQueue};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Greeting(String);
//! impl Event for Greeting {}
//!
//! #[derive(Default)]
//! struct Greeter {
//!     seen: AtomicUsize,
//! }
//! impl Handler<Greeting> for Greeter {
//!     fn handle(&self, event: Greeting, _queue: usize) {
//!         println!("{}", event.0);
//!         self.seen.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! let greeter: &'static Greeter = Box::leak(Box::default());
//! let bus = Bus::<MutexQueue, 2, 2>::new();
//! static_dispatch!(bus, Greeting("hello".into()) => greeter);
//! ```
//!
//! | Area           | Key items                                            |
//! |----------------|------------------------------------------------------|
//! | Scheduling     | [`Bus`], [`TaskQueue`], [`MutexQueue`], [`LockFreeRingQueue`] |
//! | Dispatch       | [`static_dispatch!`], [`dynamic_dispatch!`], [`route!`] |
//! | Capabilities   | [`Event`], [`Handler`], [`Identified`]               |
//! | Sender wiring  | [`Sender`], [`Consumer`], [`setup_dispatch`]         |
//! | Errors         | [`DispatchError`]                                    |

#![warn(missing_docs)]

pub mod bus;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod queue;
pub mod sender;
pub mod task;

pub use bus::{Bus, TaskSink, ROUND_ROBIN};
pub use dispatch::unique_id;
pub use error::DispatchError;
pub use event::{Event, Handler, Identified};
pub use queue::{LockFreeRingQueue, MutexQueue, TaskQueue};
pub use sender::{setup_dispatch, Consumer, Route, Sender, SenderCore};
pub use task::Task;
