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

//! # Dispatch resolvers
//!
//! The dispatch macros select a consumer for an event out of a candidate
//! list, with the capability checks resolved against the concrete types at
//! the macro's expansion site:
//!
//! - [`static_dispatch!`](crate::static_dispatch) routes to the first
//!   candidate that implements [`Handler`](crate::Handler) for the event
//!   type. Identifiers are not consulted.
//! - [`dynamic_dispatch!`](crate::dynamic_dispatch) requires a targeted
//!   event type and routes to the first candidate whose
//!   [`Identified::id`](crate::Identified::id) equals the event's target,
//!   skipping candidates that lack either capability.
//! - [`route!`](crate::route) picks between the two by the event type's
//!   [`TARGETED`](crate::Event::TARGETED) flag.
//!
//! # How the capability probe works
//!
//! Each candidate is wrapped in a [`Probe`] and the routing method is
//! resolved by ranked method lookup: an impl on `Probe<C>` applies only
//! when `C` has the required capabilities, and an impl on `&Probe<C>`
//! applies to every type as the skip fallback. Method resolution prefers
//! the less-referenced receiver, so a capable candidate takes the event
//! and an incapable one passes it down the chain. Selection happens
//! entirely at compile time per call site; nothing is looked up at
//! runtime except the identifier comparison of dynamic dispatch.

use crate::bus::TaskSink;
use crate::event::{Event, Handler, Identified};
use crate::task::Task;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Wrapper giving each dispatch candidate a probe-able receiver type.
#[doc(hidden)]
pub struct Probe<'a, C: ?Sized>(pub &'a C);

/// Routing for candidates with a handler for `E` (static dispatch).
#[doc(hidden)]
pub trait RouteStatic<B: ?Sized, E> {
    fn route_static(&self, bus: &B, queue: usize, event: E) -> Option<E>;
}

impl<B, E, C> RouteStatic<B, E> for Probe<'static, C>
where
    B: TaskSink + ?Sized,
    E: Event,
    C: Handler<E> + Sync + 'static,
{
    fn route_static(&self, bus: &B, queue: usize, event: E) -> Option<E> {
        bus.send_task(Task::new(self.0, event), queue);
        None
    }
}

/// Skip fallback for candidates without a handler for `E`.
#[doc(hidden)]
pub trait SkipStatic<B: ?Sized, E> {
    fn route_static(&self, bus: &B, queue: usize, event: E) -> Option<E>;
}

impl<'a, 'b, B: ?Sized, E, C: ?Sized> SkipStatic<B, E> for &'b Probe<'a, C> {
    fn route_static(&self, _bus: &B, _queue: usize, event: E) -> Option<E> {
        Some(event)
    }
}

/// Routing for candidates with both a handler and an identifier
/// (dynamic dispatch).
#[doc(hidden)]
pub trait RouteKeyed<B: ?Sized, E> {
    fn route_keyed(&self, bus: &B, queue: usize, event: E) -> Option<E>;
}

impl<B, E, C> RouteKeyed<B, E> for Probe<'static, C>
where
    B: TaskSink + ?Sized,
    E: Event,
    C: Handler<E> + Identified + Sync + 'static,
{
    fn route_keyed(&self, bus: &B, queue: usize, event: E) -> Option<E> {
        let id = self.0.id();
        if id != event.target() {
            return Some(event);
        }
        bus.send_task(Task::new(self.0, event), keyed_queue(queue, id, bus.queue_count()));
        None
    }
}

/// Skip fallback for candidates missing a handler or an identifier.
#[doc(hidden)]
pub trait SkipKeyed<B: ?Sized, E> {
    fn route_keyed(&self, bus: &B, queue: usize, event: E) -> Option<E>;
}

impl<'a, 'b, B: ?Sized, E, C: ?Sized> SkipKeyed<B, E> for &'b Probe<'a, C> {
    fn route_keyed(&self, _bus: &B, _queue: usize, event: E) -> Option<E> {
        Some(event)
    }
}

/// Placement for identifier-matched tasks: an explicit queue index wins;
/// otherwise the identifier pins a deterministic queue, which serializes
/// all tasks addressed to one consumer.
#[doc(hidden)]
pub fn keyed_queue(queue: usize, id: usize, queue_count: usize) -> usize {
    if queue < queue_count {
        queue
    } else {
        id % queue_count
    }
}

/// Compile-time gate: dynamic dispatch only accepts targeted event types.
#[doc(hidden)]
pub fn assert_targeted<E: Event>(_event: &E) {
    const {
        assert!(
            E::TARGETED,
            "dynamic dispatch requires an event type with a target identifier"
        );
    }
}

/// Whether the event's type declares a target (drives `route!`).
#[doc(hidden)]
pub fn is_targeted<E: Event>(_event: &E) -> bool {
    E::TARGETED
}

/// Terminal of a static dispatch chain no candidate could take.
#[doc(hidden)]
pub fn unrouted<E>(event: E) -> ! {
    drop(event);
    panic!(
        "no candidate consumer handles events of type {}",
        std::any::type_name::<E>()
    );
}

/// Allocates a process-wide unique consumer identifier.
///
/// Convenience for embedders that do not manage identifier spaces
/// themselves; identifiers start at zero and never repeat within a
/// process.
pub fn unique_id() -> usize {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Routes an event to the first candidate able to handle its type.
///
/// ```text
/// static_dispatch!(bus, event => c1, c2, …);
/// static_dispatch!(bus, queue, event => c1, c2, …);
/// ```
///
/// Candidates are `&'static` consumer references, probed in argument
/// order; the first one implementing [`Handler`](crate::Handler) for the
/// event type receives the task and the rest are never considered.
/// Consumer identifiers play no role here. Without an explicit queue the
/// task is placed round-robin.
///
/// If no candidate can handle the event type the call panics naming the
/// event type; a candidate list is expected to be written against the
/// events it routes.
#[macro_export]
macro_rules! static_dispatch {
    ($bus:expr, $event:expr => $($consumer:expr),+ $(,)?) => {
        $crate::static_dispatch!($bus, $crate::ROUND_ROBIN, $event => $($consumer),+)
    };
    ($bus:expr, $queue:expr, $event:expr => $($consumer:expr),+ $(,)?) => {{
        #[allow(unused_imports)]
        use $crate::dispatch::{RouteStatic as _, SkipStatic as _};
        let bus = &$bus;
        let queue = $queue;
        let mut event = ::core::option::Option::Some($event);
        $(
            if let ::core::option::Option::Some(taken) = event.take() {
                event = (&$crate::dispatch::Probe($consumer)).route_static(bus, queue, taken);
            }
        )+
        if let ::core::option::Option::Some(leftover) = event {
            $crate::dispatch::unrouted(leftover);
        }
    }};
}

/// Routes a targeted event to the candidate whose identifier matches.
///
/// ```text
/// dynamic_dispatch!(bus, event => c1, c2, …)?;
/// dynamic_dispatch!(bus, queue, event => c1, c2, …)?;
/// ```
///
/// The event type must declare [`TARGETED`](crate::Event::TARGETED)
/// (checked at compile time). Candidates are probed in argument order;
/// one lacking a handler for the event type or an identifier is skipped,
/// and the first whose [`id`](crate::Identified::id) equals the event's
/// target receives the task. Returns `Err(DispatchError)` carrying the
/// target when nothing matched.
///
/// Without an explicit queue, the matched consumer's identifier pins the
/// queue (`id % NQ`), so one consumer's tasks execute in order.
#[macro_export]
macro_rules! dynamic_dispatch {
    ($bus:expr, $event:expr => $($consumer:expr),+ $(,)?) => {
        $crate::dynamic_dispatch!($bus, $crate::ROUND_ROBIN, $event => $($consumer),+)
    };
    ($bus:expr, $queue:expr, $event:expr => $($consumer:expr),+ $(,)?) => {{
        let event = $event;
        $crate::dispatch::assert_targeted(&event);
        $crate::dynamic_dispatch!(@unchecked $bus, $queue, event => $($consumer),+)
    }};
    (@unchecked $bus:expr, $queue:expr, $event:expr => $($consumer:expr),+) => {{
        #[allow(unused_imports)]
        use $crate::dispatch::{RouteKeyed as _, SkipKeyed as _};
        let bus = &$bus;
        let queue = $queue;
        let mut event = ::core::option::Option::Some($event);
        $(
            if let ::core::option::Option::Some(taken) = event.take() {
                event = (&$crate::dispatch::Probe($consumer)).route_keyed(bus, queue, taken);
            }
        )+
        match event {
            ::core::option::Option::None => ::core::result::Result::Ok(()),
            ::core::option::Option::Some(unmatched) => ::core::result::Result::Err(
                $crate::DispatchError::new($crate::Event::target(&unmatched)),
            ),
        }
    }};
}

/// Routes an event with the resolver its type calls for: identifier
/// matching for targeted types, first-capable selection otherwise.
///
/// ```text
/// route!(bus, queue, event => c1, c2, …)?;
/// ```
///
/// Always returns `Result<(), DispatchError>`; the static arm cannot
/// fail at runtime and yields `Ok(())`.
#[macro_export]
macro_rules! route {
    ($bus:expr, $event:expr => $($consumer:expr),+ $(,)?) => {
        $crate::route!($bus, $crate::ROUND_ROBIN, $event => $($consumer),+)
    };
    ($bus:expr, $queue:expr, $event:expr => $($consumer:expr),+ $(,)?) => {{
        let event = $event;
        if $crate::dispatch::is_targeted(&event) {
            $crate::dynamic_dispatch!(@unchecked $bus, $queue, event => $($consumer),+)
        } else {
            $crate::static_dispatch!($bus, $queue, event => $($consumer),+);
            ::core::result::Result::Ok(())
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_ids_never_repeat() {
        let a = unique_id();
        let b = unique_id();
        let c = unique_id();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn explicit_queue_wins_over_identifier() {
        assert_eq!(keyed_queue(1, 7, 4), 1);
        assert_eq!(keyed_queue(crate::ROUND_ROBIN, 7, 4), 3);
        assert_eq!(keyed_queue(4, 7, 4), 3);
    }
}
