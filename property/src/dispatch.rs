//! Dispatch state shared by every dispatcher on a thread.
//!
//! Bindings are mutual listener subscriptions, so a change to one property
//! re-enters the dispatchers of its peers, which in turn re-enter it. The
//! [`DispatchState`] breaks those loops. A change wave starts with the
//! outermost dispatch and lasts until it ends; within a wave each dispatcher
//! may begin at most once, so every member of a bound group is notified
//! exactly once whatever the shape of the group. A suppressed value is
//! dropped on that edge.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::config::DispatchConfig;

/// Identifies a dispatcher within the process.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct DispatcherId(usize);

impl DispatcherId {
    /// A fresh id, for code that drives a [`DispatchState`] by hand
    pub fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for DispatcherId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "dispatcher#{}", self.0) }
}

/// Why a dispatch is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A caller set the value
    Direct,
    /// A bound peer propagated its own change
    Binding,
    /// A source adapter reported a change in the value it wraps
    Source,
}

thread_local! {
    static CURRENT: DispatchState = DispatchState::new(DispatchConfig::default());
}

struct Inner {
    active: RefCell<BTreeSet<DispatcherId>>,
    /// Every dispatcher that began in the current wave
    visited: RefCell<BTreeSet<DispatcherId>>,
    binding: Cell<bool>,
    config: DispatchConfig,
}

/// Tracks which dispatchers are mid-notification and whether the innermost
/// notification came from a binding.
///
/// Cloning yields another handle to the same state. Each thread has a default
/// instance available through [`DispatchState::current`]; independent
/// instances can be created for isolated property graphs.
#[derive(Clone)]
pub struct DispatchState(Rc<Inner>);

impl Default for DispatchState {
    fn default() -> Self { Self::new(DispatchConfig::default()) }
}

impl DispatchState {
    pub fn new(config: DispatchConfig) -> Self {
        Self(Rc::new(Inner {
            active: RefCell::new(BTreeSet::new()),
            visited: RefCell::new(BTreeSet::new()),
            binding: Cell::new(false),
            config,
        }))
    }

    /// The default state for the calling thread
    pub fn current() -> Self { CURRENT.with(|state| state.clone()) }

    pub fn config(&self) -> &DispatchConfig { &self.0.config }

    /// Mark `id` as dispatching. Returns `None` when it is already active or
    /// has already dispatched in the current wave, in which case the caller
    /// must skip its notification rather than recurse.
    ///
    /// The dispatch ends when the returned scope is dropped, on every exit
    /// path including unwinding.
    pub fn begin_dispatch(&self, id: DispatcherId, origin: Origin) -> Option<DispatchScope> {
        if self.0.active.borrow().contains(&id) || !self.0.visited.borrow_mut().insert(id) {
            return None;
        }
        self.0.active.borrow_mut().insert(id);
        let previous_binding = self.0.binding.replace(origin == Origin::Binding);
        trace!("begin {} ({:?})", id, origin);
        Some(DispatchScope { state: self.clone(), id, previous_binding })
    }

    /// Unscoped form of [`begin_dispatch`](Self::begin_dispatch): mark `id`
    /// active until [`end_dispatch`](Self::end_dispatch) is called. Returns
    /// false if it was already active. The binding flag is left untouched.
    pub fn mark_active(&self, id: DispatcherId) -> bool { self.0.active.borrow_mut().insert(id) }

    /// Clear the active mark for `id`. Returns false if it was not active.
    pub fn end_dispatch(&self, id: DispatcherId) -> bool {
        let removed = self.0.active.borrow_mut().remove(&id);
        if removed {
            trace!("end {}", id);
        }
        if self.0.active.borrow().is_empty() {
            self.0.binding.set(false);
            self.0.visited.borrow_mut().clear();
        }
        removed
    }

    /// Whether `id` already began a dispatch in the current wave
    pub fn has_visited(&self, id: DispatcherId) -> bool { self.0.visited.borrow().contains(&id) }

    /// Whether any dispatcher is currently notifying
    pub fn is_dispatching(&self) -> bool { !self.0.active.borrow().is_empty() }

    /// Whether the innermost active notification was triggered by a binding
    pub fn is_dispatching_binding(&self) -> bool { self.0.binding.get() }

    pub fn is_active(&self, id: DispatcherId) -> bool { self.0.active.borrow().contains(&id) }

    /// Capture the current dispatch state and return a task that re-applies
    /// it around `task` when run, restoring whatever state is current at run
    /// time afterwards.
    ///
    /// This lets work posted to a deferred queue observe the same
    /// "mid-dispatch" answers as the code that posted it.
    pub fn wrap_with_current_dispatch_state<F, R>(&self, task: F) -> impl FnOnce() -> R + use<F, R>
    where F: FnOnce() -> R + 'static {
        let snapshot = self.snapshot();
        let state = self.clone();
        move || {
            let _restore = state.install(snapshot);
            task()
        }
    }

    /// Forget all active dispatchers, end the wave and clear the binding flag.
    pub fn reset(&self) {
        self.0.active.borrow_mut().clear();
        self.0.visited.borrow_mut().clear();
        self.0.binding.set(false);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot { active: self.0.active.borrow().clone(), visited: self.0.visited.borrow().clone(), binding: self.0.binding.get() }
    }

    fn install(&self, snapshot: Snapshot) -> RestoreGuard {
        let previous = Snapshot {
            active: std::mem::replace(&mut *self.0.active.borrow_mut(), snapshot.active),
            visited: std::mem::replace(&mut *self.0.visited.borrow_mut(), snapshot.visited),
            binding: self.0.binding.replace(snapshot.binding),
        };
        RestoreGuard { state: self.clone(), previous: Some(previous) }
    }

    fn finish(&self, id: DispatcherId, previous_binding: bool) {
        let idle = {
            let mut active = self.0.active.borrow_mut();
            active.remove(&id);
            active.is_empty()
        };
        self.0.binding.set(previous_binding);
        if idle {
            self.0.visited.borrow_mut().clear();
            trace!("end {}, wave settled", id);
        } else {
            trace!("end {}", id);
        }
    }
}

impl std::fmt::Debug for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchState")
            .field("active", &*self.0.active.borrow())
            .field("visited", &*self.0.visited.borrow())
            .field("binding", &self.0.binding.get())
            .field("config", &self.0.config)
            .finish()
    }
}

/// Ends a dispatch started by [`DispatchState::begin_dispatch`] when dropped.
#[must_use = "the dispatch ends as soon as the scope is dropped"]
pub struct DispatchScope {
    state: DispatchState,
    id: DispatcherId,
    previous_binding: bool,
}

impl DispatchScope {
    pub fn id(&self) -> DispatcherId { self.id }
}

impl Drop for DispatchScope {
    fn drop(&mut self) { self.state.finish(self.id, self.previous_binding); }
}

struct Snapshot {
    active: BTreeSet<DispatcherId>,
    visited: BTreeSet<DispatcherId>,
    binding: bool,
}

struct RestoreGuard {
    state: DispatchState,
    previous: Option<Snapshot>,
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.state.0.active.borrow_mut() = previous.active;
            *self.state.0.visited.borrow_mut() = previous.visited;
            self.state.0.binding.set(previous.binding);
        }
    }
}
