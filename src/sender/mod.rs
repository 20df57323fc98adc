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

//! # Embedded senders and dispatch wiring
//!
//! A [`Sender`] is the outbound channel a consumer embeds to emit events
//! without naming the downstream consumer types. The erasure breaks the
//! type cycle that direct references would create between mutually
//! communicating consumers:
//!
//! ```text
//! setup_dispatch(bus, [a, b, c])
//!     │  collects every consumer's Route entries, in argument order
//!     ▼
//! routes: [ (TypeId(E1), id?, &a, make) (TypeId(E2), id?, &b, make) … ]
//!     │  shared by every embedded sender
//!     ▼
//! a.sender_.send(event)  ──►  first / identifier match  ──►  bus
//! ```
//!
//! Each [`Route`] pairs an event `TypeId` with an erased consumer pointer
//! and a task-construction trampoline monomorphized for that
//! `(consumer, event)` pair, so sending stays allocation-free: lookup,
//! one trampoline call, enqueue.
//!
//! Consumers advertise their handler set once through the [`Consumer`]
//! trait; the route constructors are bound-checked, so a listed route
//! without a matching [`Handler`](crate::Handler) impl does not compile.

use crate::bus::{TaskSink, ROUND_ROBIN};
use crate::error::DispatchError;
use crate::event::{Event, Handler, Identified};
use crate::task::Task;
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::sync::{Arc, OnceLock};

/// One erased routing entry: "this consumer handles this event type".
pub struct Route {
    event: TypeId,
    id: Option<usize>,
    consumer: *const (),
    make: unsafe fn(*const (), *mut u8) -> Task,
}

// SAFETY: `consumer` is an erased `&'static C` whose `C: Sync` is
// enforced by both constructors, and `make` is a plain fn pointer.
unsafe impl Send for Route {}
unsafe impl Sync for Route {}

/// Trampoline for a concrete `(C, E)` pair: recover the types, move the
/// event out of the caller's slot, and pack a task.
unsafe fn make_task<E, C>(consumer: *const (), event: *mut u8) -> Task
where
    E: Event,
    C: Handler<E> + Sync + 'static,
{
    let consumer: &'static C = &*consumer.cast::<C>();
    let event = event.cast::<E>().read();
    Task::new(consumer, event)
}

impl Route {
    /// A route to a consumer without an identifier. Selected by event
    /// type only.
    pub fn plain<E, C>(consumer: &'static C) -> Self
    where
        E: Event,
        C: Handler<E> + Sync + 'static,
    {
        Route {
            event: TypeId::of::<E>(),
            id: None,
            consumer: (consumer as *const C).cast(),
            make: make_task::<E, C>,
        }
    }

    /// A route to an identified consumer. Participates in targeted
    /// routing under the consumer's identifier.
    pub fn keyed<E, C>(consumer: &'static C) -> Self
    where
        E: Event,
        C: Handler<E> + Identified + Sync + 'static,
    {
        Route {
            event: TypeId::of::<E>(),
            id: Some(consumer.id()),
            consumer: (consumer as *const C).cast(),
            make: make_task::<E, C>,
        }
    }

    fn build<E: Event>(&self, event: E) -> Task {
        let mut slot = ManuallyDrop::new(event);
        // SAFETY: callers match `self.event` against `TypeId::of::<E>()`
        // before building, so the trampoline reads the type it was
        // monomorphized for; `ManuallyDrop` hands ownership to the read.
        unsafe { (self.make)(self.consumer, (&mut slot as *mut ManuallyDrop<E>).cast()) }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

/// A consumer participating in sender-based wiring.
///
/// Implementations list the routes the consumer serves and, when the
/// consumer embeds a [`Sender`], expose its core so
/// [`setup_dispatch`] can prime it.
pub trait Consumer: Sync {
    /// The routes this consumer serves, one per handled event type.
    fn routes(&'static self) -> Vec<Route>;

    /// The embedded sender's core, for consumers that emit events.
    fn sender_core(&'static self) -> Option<&'static SenderCore> {
        None
    }
}

/// What a primed sender holds: the bus and the shared route table.
struct Wiring {
    bus: &'static dyn TaskSink,
    routes: Arc<[Route]>,
}

/// The type-erased interior of a [`Sender`], written once by
/// [`setup_dispatch`] and read-only afterwards.
pub struct SenderCore {
    wiring: OnceLock<Wiring>,
}

impl SenderCore {
    const fn new() -> Self {
        SenderCore {
            wiring: OnceLock::new(),
        }
    }

    fn init(&self, bus: &'static dyn TaskSink, routes: Arc<[Route]>) {
        if self.wiring.set(Wiring { bus, routes }).is_err() {
            log::warn!("sender already initialized; repeated setup_dispatch ignored");
        }
    }

    fn route_event<E: Event>(&self, event: E, queue: usize) -> Result<(), DispatchError> {
        let wiring = self
            .wiring
            .get()
            .expect("sender used before setup_dispatch()");
        let wanted = TypeId::of::<E>();
        if E::TARGETED {
            let target = event.target();
            let found = wiring
                .routes
                .iter()
                .find(|route| route.event == wanted && route.id == Some(target));
            match found {
                Some(route) => {
                    let task = route.build(event);
                    let queue = crate::dispatch::keyed_queue(queue, target, wiring.bus.queue_count());
                    wiring.bus.send_task(task, queue);
                    Ok(())
                }
                None => Err(DispatchError::new(target)),
            }
        } else {
            match wiring.routes.iter().find(|route| route.event == wanted) {
                Some(route) => {
                    let task = route.build(event);
                    wiring.bus.send_task(task, queue);
                    Ok(())
                }
                None => crate::dispatch::unrouted(event),
            }
        }
    }
}

impl fmt::Debug for SenderCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderCore")
            .field("initialized", &self.wiring.get().is_some())
            .finish()
    }
}

/// Marker: the first element of an event-set tuple.
pub struct Here;

/// Marker: an element past the first of an event-set tuple.
pub struct There<I>(PhantomData<I>);

/// Membership of event type `E` in the event-set tuple `Self`.
///
/// `I` is the inferred position marker; it exists so that the per-position
/// impls do not overlap. Implemented for tuples up to eight event types.
pub trait Contains<E, I> {}

macro_rules! impl_contains {
    ($( ($($event:ident),+) ),+ $(,)?) => {
        $( impl_contains!(@tuple ($($event),+); Here; $($event),+); )+
    };
    (@tuple $tuple:tt; $index:ty; $head:ident $(, $tail:ident)*) => {
        impl_contains!(@impl $tuple; $index; $head);
        impl_contains!(@tuple $tuple; There<$index>; $($tail),*);
    };
    (@tuple $tuple:tt; $index:ty;) => {};
    (@impl ($($event:ident),+); $index:ty; $member:ident) => {
        impl<$($event),+> Contains<$member, $index> for ($($event,)+) {}
    };
}

impl_contains! {
    (E0),
    (E0, E1),
    (E0, E1, E2),
    (E0, E1, E2, E3),
    (E0, E1, E2, E3, E4),
    (E0, E1, E2, E3, E4, E5),
    (E0, E1, E2, E3, E4, E5, E6),
    (E0, E1, E2, E3, E4, E5, E6, E7),
}

/// An embedded emitter for a declared set of event types.
///
/// `Es` is a tuple of the event types this sender may emit, e.g.
/// `Sender<(Request,)>` or `Sender<(Request, Heartbeat)>`. Sending a type
/// outside the set does not compile. `Sender<()>` is the uniform empty
/// placeholder: it compiles, costs one pointer-sized cell, and cannot be
/// sent through.
///
/// A sender starts unprimed; [`setup_dispatch`] fills it in exactly once.
/// After that it is freely usable from any thread without
/// synchronization, including from inside handlers.
pub struct Sender<Es = ()> {
    core: SenderCore,
    events: PhantomData<fn(Es)>,
}

impl<Es> Sender<Es> {
    /// An unprimed sender, ready to be embedded in a consumer.
    pub const fn new() -> Self {
        Sender {
            core: SenderCore::new(),
            events: PhantomData,
        }
    }

    /// The erasure-side core, returned from
    /// [`Consumer::sender_core`] implementations.
    pub fn core(&self) -> &SenderCore {
        &self.core
    }

    /// Emits an event with rotating queue placement.
    ///
    /// Targeted event types resolve by identifier and report a miss as
    /// `Err`; untargeted types go to the first capable consumer
    /// registered by [`setup_dispatch`].
    pub fn send<E, I>(&self, event: E) -> Result<(), DispatchError>
    where
        E: Event,
        Es: Contains<E, I>,
    {
        self.core.route_event(event, ROUND_ROBIN)
    }

    /// Emits an event pinned to queue `queue` (out-of-range values fall
    /// back to the default placement).
    pub fn send_to<E, I>(&self, event: E, queue: usize) -> Result<(), DispatchError>
    where
        E: Event,
        Es: Contains<E, I>,
    {
        self.core.route_event(event, queue)
    }
}

impl<Es> Default for Sender<Es> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Es> fmt::Debug for Sender<Es> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender").field("core", &self.core).finish()
    }
}

/// Wires a consumer set for sender-based communication.
///
/// Collects every consumer's routes in argument order and primes each
/// embedded sender with the bus and the full set, so any consumer can
/// reach any other without naming its type. Call once, after the
/// consumers exist and before events flow; repeated calls are ignored
/// with a warning.
pub fn setup_dispatch(bus: &'static dyn TaskSink, consumers: &[&'static dyn Consumer]) {
    let routes: Arc<[Route]> = consumers
        .iter()
        .flat_map(|consumer| consumer.routes())
        .collect();
    let mut primed = 0;
    for consumer in consumers {
        if let Some(core) = consumer.sender_core() {
            core.init(bus, Arc::clone(&routes));
            primed += 1;
        }
    }
    log::debug!(
        "dispatch wired: {} route(s), {} sender(s) primed",
        routes.len(),
        primed
    );
}
