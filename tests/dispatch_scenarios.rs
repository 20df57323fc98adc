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

//! Integration tests for static and dynamic dispatch resolution.
//!
//! These exercise candidate selection: first-capable ordering for
//! untargeted events, identifier matching and miss reporting for
//! targeted ones, and the value integrity of moved events.

use omnibus::{dynamic_dispatch, route, static_dispatch, Bus, Event, Handler, Identified, MutexQueue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────────────────
// Test events and consumers
// ─────────────────────────────────────────────────────────────────────────────

struct NoTargetEvent;
impl Event for NoTargetEvent {}

struct TargetEvent {
    target: usize,
}
impl Event for TargetEvent {
    const TARGETED: bool = true;
    fn target(&self) -> usize {
        self.target
    }
}

struct Labelled(String);
impl Event for Labelled {}

/// No identifier; handles `NoTargetEvent` only.
#[derive(Default)]
struct PlainConsumer {
    no_target_handled: AtomicUsize,
}
impl Handler<NoTargetEvent> for PlainConsumer {
    fn handle(&self, _event: NoTargetEvent, _queue: usize) {
        self.no_target_handled.fetch_add(1, Ordering::SeqCst);
    }
}

/// No identifier; handles `TargetEvent` only.
#[derive(Default)]
struct TypedConsumer {
    target_handled: AtomicUsize,
}
impl Handler<TargetEvent> for TypedConsumer {
    fn handle(&self, _event: TargetEvent, _queue: usize) {
        self.target_handled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Identified; handles `TargetEvent`.
struct KeyedTarget {
    id: usize,
    target_handled: AtomicUsize,
}
impl KeyedTarget {
    fn create(id: usize) -> &'static Self {
        Box::leak(Box::new(KeyedTarget {
            id,
            target_handled: AtomicUsize::new(0),
        }))
    }
}
impl Identified for KeyedTarget {
    fn id(&self) -> usize {
        self.id
    }
}
impl Handler<TargetEvent> for KeyedTarget {
    fn handle(&self, _event: TargetEvent, _queue: usize) {
        self.target_handled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Identified; handles `NoTargetEvent` only, so targeted dispatch must
/// skip it even when the identifier matches.
struct KeyedPlain {
    id: usize,
    no_target_handled: AtomicUsize,
}
impl KeyedPlain {
    fn create(id: usize) -> &'static Self {
        Box::leak(Box::new(KeyedPlain {
            id,
            no_target_handled: AtomicUsize::new(0),
        }))
    }
}
impl Identified for KeyedPlain {
    fn id(&self) -> usize {
        self.id
    }
}
impl Handler<NoTargetEvent> for KeyedPlain {
    fn handle(&self, _event: NoTargetEvent, _queue: usize) {
        self.no_target_handled.fetch_add(1, Ordering::SeqCst);
    }
}

fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn settle(condition: impl Fn() -> bool) {
    assert!(
        wait_until(Duration::from_secs(2), condition),
        "dispatched event was not handled in time"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Static dispatch
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn static_dispatch_skips_incapable_candidates() {
    let bus = Bus::<MutexQueue, 1, 1>::new();
    let plain: &'static PlainConsumer = Box::leak(Box::default());
    let typed: &'static TypedConsumer = Box::leak(Box::default());

    // `typed` comes first but has no handler for the event type.
    static_dispatch!(bus, NoTargetEvent => typed, plain);

    settle(|| plain.no_target_handled.load(Ordering::SeqCst) == 1);
    assert_eq!(typed.target_handled.load(Ordering::SeqCst), 0);
}

#[test]
fn static_dispatch_selects_first_capable_candidate() {
    let bus = Bus::<MutexQueue, 1, 1>::new();
    let first: &'static PlainConsumer = Box::leak(Box::default());
    let second: &'static PlainConsumer = Box::leak(Box::default());

    static_dispatch!(bus, NoTargetEvent => first, second);

    settle(|| first.no_target_handled.load(Ordering::SeqCst) == 1);
    assert_eq!(second.no_target_handled.load(Ordering::SeqCst), 0);
}

#[test]
fn static_dispatch_ignores_identifiers() {
    let bus = Bus::<MutexQueue, 1, 1>::new();
    let keyed = KeyedPlain::create(17);

    // An identifier far outside the queue range must not affect
    // placement of untargeted events.
    static_dispatch!(bus, NoTargetEvent => keyed);

    settle(|| keyed.no_target_handled.load(Ordering::SeqCst) == 1);
}

#[test]
fn static_dispatch_accepts_an_explicit_queue() {
    let bus = Bus::<MutexQueue, 2, 2>::new();
    let plain: &'static PlainConsumer = Box::leak(Box::default());

    static_dispatch!(bus, 1, NoTargetEvent => plain);

    settle(|| plain.no_target_handled.load(Ordering::SeqCst) == 1);
}

#[test]
fn moved_event_arrives_intact() {
    #[derive(Default)]
    struct Keeper {
        seen: Mutex<Vec<String>>,
    }
    impl Handler<Labelled> for Keeper {
        fn handle(&self, event: Labelled, _queue: usize) {
            self.seen.lock().unwrap().push(event.0);
        }
    }

    let bus = Bus::<MutexQueue, 1, 1>::new();
    let keeper: &'static Keeper = Box::leak(Box::default());

    static_dispatch!(bus, Labelled("payload intact".to_string()) => keeper);

    settle(|| keeper.seen.lock().unwrap().len() == 1);
    assert_eq!(keeper.seen.lock().unwrap()[0], "payload intact");
}

// ─────────────────────────────────────────────────────────────────────────────
// Dynamic dispatch
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn dynamic_dispatch_matches_identifier() {
    let bus = Bus::<MutexQueue, 1, 1>::new();
    let a = KeyedTarget::create(1);
    let b = KeyedPlain::create(2);

    dynamic_dispatch!(bus, TargetEvent { target: 1 } => a, b).unwrap();

    settle(|| a.target_handled.load(Ordering::SeqCst) == 1);
    assert_eq!(b.no_target_handled.load(Ordering::SeqCst), 0);
}

#[test]
fn dynamic_dispatch_misses_when_match_lacks_handler() {
    let bus = Bus::<MutexQueue, 1, 1>::new();
    let a = KeyedTarget::create(1);
    let b = KeyedPlain::create(2);

    // `b` carries the requested identifier but cannot handle the event.
    let err = dynamic_dispatch!(bus, TargetEvent { target: 2 } => a, b).unwrap_err();

    assert_eq!(err.target, 2);
    assert_eq!(a.target_handled.load(Ordering::SeqCst), 0);
    assert_eq!(b.no_target_handled.load(Ordering::SeqCst), 0);
}

#[test]
fn dynamic_dispatch_misses_when_no_identifier_matches() {
    let bus = Bus::<MutexQueue, 1, 1>::new();
    let a = KeyedTarget::create(2);
    let b = KeyedTarget::create(1);

    let err = dynamic_dispatch!(bus, TargetEvent { target: 3 } => a, b).unwrap_err();

    assert_eq!(err.target, 3);
    assert_eq!(a.target_handled.load(Ordering::SeqCst), 0);
    assert_eq!(b.target_handled.load(Ordering::SeqCst), 0);
}

#[test]
fn dynamic_dispatch_selects_first_of_duplicate_identifiers() {
    let bus = Bus::<MutexQueue, 1, 1>::new();
    let first = KeyedTarget::create(5);
    let second = KeyedTarget::create(5);

    dynamic_dispatch!(bus, TargetEvent { target: 5 } => first, second).unwrap();

    settle(|| first.target_handled.load(Ordering::SeqCst) == 1);
    assert_eq!(second.target_handled.load(Ordering::SeqCst), 0);
}

#[test]
fn dynamic_dispatch_serializes_one_identifier_on_one_queue() {
    let bus = Bus::<MutexQueue, 4, 4>::new();
    let a = KeyedTarget::create(6);

    for _ in 0..32 {
        dynamic_dispatch!(bus, TargetEvent { target: 6 } => a).unwrap();
    }

    settle(|| a.target_handled.load(Ordering::SeqCst) == 32);
}

// ─────────────────────────────────────────────────────────────────────────────
// Auto-resolving route!
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn route_picks_static_for_untargeted_events() {
    let bus = Bus::<MutexQueue, 1, 1>::new();
    let plain: &'static PlainConsumer = Box::leak(Box::default());
    let a = KeyedTarget::create(1);

    route!(bus, NoTargetEvent => a, plain).unwrap();

    settle(|| plain.no_target_handled.load(Ordering::SeqCst) == 1);
}

#[test]
fn route_picks_dynamic_for_targeted_events() {
    let bus = Bus::<MutexQueue, 1, 1>::new();
    let plain: &'static PlainConsumer = Box::leak(Box::default());
    let a = KeyedTarget::create(1);

    route!(bus, TargetEvent { target: 1 } => a, plain).unwrap();
    let err = route!(bus, TargetEvent { target: 8 } => a, plain).unwrap_err();

    assert_eq!(err.target, 8);
    settle(|| a.target_handled.load(Ordering::SeqCst) == 1);
}
