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

//! # Event and consumer capability traits
//!
//! Any value type can travel through the bus once it implements [`Event`].
//! The trait declares the one routing capability an event may carry: a
//! `target` identifier addressing a specific consumer. Consumers declare
//! their capabilities the same way, by implementing [`Handler`] per event
//! type they accept and [`Identified`] if they can be addressed.
//!
//! Events are moved end to end. The bus never clones an event: it is moved
//! into a task at enqueue time and moved into the handler when the task
//! runs, so `Clone` is not required (and its absence is a useful guarantee
//! that no hidden copies happen on the hot path).
//!
//! ```
//! use omnibus::{Event, Handler, Identified};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Tick;
//! impl Event for Tick {}
//!
//! struct Poke { target: usize }
//! impl Event for Poke {
//!     const TARGETED: bool = true;
//!     fn target(&self) -> usize { self.target }
//! }
//!
//! struct Counter { id: usize, seen: AtomicUsize }
//! impl Identified for Counter {
//!     fn id(&self) -> usize { self.id }
//! }
//! impl Handler<Tick> for Counter {
//!     fn handle(&self, _event: Tick, _queue: usize) {
//!         self.seen.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//! ```

/// A value type routable through the bus.
///
/// Implementations are usually empty. An event addressed to a specific
/// consumer overrides both items:
///
/// - [`TARGETED`](Self::TARGETED) set to `true` enables identifier-based
///   dispatch for the type (and is what `dynamic_dispatch!` checks at
///   compile time).
/// - [`target`](Self::target) returns the identifier of the consumer the
///   value is addressed to.
pub trait Event: Send + 'static {
    /// Whether values of this type carry a consumer-addressing target.
    const TARGETED: bool = false;

    /// The identifier of the consumer this event is addressed to.
    ///
    /// Only called when [`TARGETED`](Self::TARGETED) is `true`.
    fn target(&self) -> usize {
        unreachable!("target() called on an event type without a target")
    }
}

/// A consumer operation accepting events of type `E`.
///
/// `queue` is the primary queue index of the worker running the handler.
/// Handlers that emit follow-up work can pass it back to the bus (or a
/// [`Sender`](crate::Sender)) to keep a logical chain on one queue;
/// handlers that do not re-enqueue simply ignore it.
///
/// Handlers take `&self` because workers invoke consumers concurrently
/// from multiple threads; mutable handler state lives behind atomics or
/// locks inside the consumer.
pub trait Handler<E: Event> {
    /// Processes one event. The event value is moved in, never copied.
    fn handle(&self, event: E, queue: usize);
}

/// A consumer addressable by a stable unsigned identifier.
///
/// The returned value must not change for the lifetime of the consumer;
/// identifier-based dispatch uses it both to select the consumer and to
/// derive a deterministic queue placement, which is what serializes the
/// invocations of a single identified consumer.
pub trait Identified {
    /// The consumer's routing identifier.
    fn id(&self) -> usize;
}
