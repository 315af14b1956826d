use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use tracing::{debug, debug_span, error, warn};

use crate::config::FailurePolicy;
use crate::disposable::Subscription;
use crate::dispatch::{DispatchState, DispatcherId, Origin};
use crate::error::{ListenerFailure, ListenerFailures, PropertyError};

/// A change delivered to listeners: the value before and after a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent<T> {
    pub old_value: T,
    pub new_value: T,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
struct ListenerId(usize);

/// Listeners report nested failures (from bound peers) through the result;
/// panics are caught by the dispatcher.
pub(crate) type Callback<T> = Rc<dyn Fn(&ChangeEvent<T>) -> Result<(), PropertyError>>;

struct Entry<T> {
    callback: Callback<T>,
    live: Rc<Cell<bool>>,
}

struct Inner<T> {
    id: DispatcherId,
    state: DispatchState,
    value: RefCell<T>,
    listeners: RefCell<BTreeMap<ListenerId, Entry<T>>>,
    next_listener: Cell<usize>,
    writer: RefCell<Option<Rc<dyn Fn(&T)>>>,
    disposed: Cell<bool>,
}

/// Owns a value and the ordered set of listeners interested in it.
///
/// A dispatcher starts at most one dispatch per change wave. Nested calls
/// are dropped, which stops bound properties from bouncing a change back and
/// forth forever.
pub struct Dispatcher<T>(Rc<Inner<T>>);

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self { Self(Rc::clone(&self.0)) }
}

/// A non-owning reference to a [`Dispatcher`].
pub struct WeakDispatcher<T>(Weak<Inner<T>>);

impl<T> Clone for WeakDispatcher<T> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> WeakDispatcher<T> {
    pub fn upgrade(&self) -> Option<Dispatcher<T>> { self.0.upgrade().map(Dispatcher) }
}

impl<T: Clone + 'static> Dispatcher<T> {
    pub fn new(state: DispatchState, initial: T) -> Self {
        Self(Rc::new(Inner {
            id: DispatcherId::next(),
            state,
            value: RefCell::new(initial),
            listeners: RefCell::new(BTreeMap::new()),
            next_listener: Cell::new(0),
            writer: RefCell::new(None),
            disposed: Cell::new(false),
        }))
    }

    /// Store `value` and notify every listener, unless this dispatcher is
    /// already dispatching or done so earlier in the current wave (the value
    /// is then dropped), or disposed.
    pub fn dispatch(&self, value: T) -> Result<(), PropertyError> { self.dispatch_with(Origin::Direct, value) }

    /// Dispatch a value propagated from a bound peer.
    pub fn dispatch_from_binding(&self, value: T) -> Result<(), PropertyError> { self.dispatch_with(Origin::Binding, value) }

    /// Dispatch a value reported by a source adapter. The writer is skipped
    /// since the source already holds the value.
    pub fn dispatch_from_source(&self, value: T) -> Result<(), PropertyError> { self.dispatch_with(Origin::Source, value) }

    pub fn dispatch_with(&self, origin: Origin, value: T) -> Result<(), PropertyError> {
        let inner = &self.0;
        if inner.disposed.get() {
            debug!("{} is disposed; dropping {:?} value", inner.id, origin);
            return Ok(());
        }
        let Some(scope) = inner.state.begin_dispatch(inner.id, origin) else {
            debug!("{} already dispatched in this wave; suppressed {:?} value", inner.id, origin);
            return Ok(());
        };
        let _span = inner.state.config().trace_dispatch.then(|| debug_span!("dispatch", dispatcher = %inner.id, ?origin).entered());

        let old_value = std::mem::replace(&mut *inner.value.borrow_mut(), value.clone());
        let event = ChangeEvent { old_value, new_value: value };
        let mut failures = Vec::new();

        if origin != Origin::Source {
            let writer = inner.writer.borrow().clone();
            if let Some(writer) = writer {
                if let Err(message) = catch_unwind(AssertUnwindSafe(|| writer(&event.new_value))) {
                    failures.push(ListenerFailure { dispatcher: inner.id, message: panic_message(message) });
                }
            }
        }

        // Listeners may subscribe or unsubscribe while we iterate, so work from
        // a snapshot and re-check liveness right before each call.
        let listeners: Vec<(Callback<T>, Rc<Cell<bool>>)> =
            inner.listeners.borrow().values().map(|entry| (entry.callback.clone(), entry.live.clone())).collect();
        for (callback, live) in listeners {
            if !live.get() {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(PropertyError::ListenerFailed(nested))) => failures.extend(nested.into_vec()),
                Err(message) => failures.push(ListenerFailure { dispatcher: inner.id, message: panic_message(message) }),
            }
        }

        drop(scope);
        self.settle(failures)
    }

    fn settle(&self, failures: Vec<ListenerFailure>) -> Result<(), PropertyError> {
        if failures.is_empty() {
            return Ok(());
        }
        match self.0.state.config().listener_failures {
            FailurePolicy::Propagate => {
                for failure in &failures {
                    warn!("{}", failure);
                }
                Err(PropertyError::ListenerFailed(ListenerFailures(failures)))
            }
            FailurePolicy::Log => {
                for failure in &failures {
                    error!("{}", failure);
                }
                Ok(())
            }
        }
    }

    /// A clone of the current value
    pub fn value(&self) -> T { self.0.value.borrow().clone() }

    /// Register a listener. It starts with the next dispatch; a listener added
    /// while a dispatch is running does not see that dispatch.
    pub fn add_listener<F>(&self, listener: F) -> Subscription
    where F: Fn(&ChangeEvent<T>) + 'static {
        self.add_callback(Rc::new(move |event: &ChangeEvent<T>| -> Result<(), PropertyError> {
            listener(event);
            Ok(())
        }))
    }

    pub(crate) fn add_callback(&self, callback: Callback<T>) -> Subscription {
        if self.0.disposed.get() {
            debug!("{} is disposed; listener not registered", self.0.id);
            return Subscription::disposed();
        }
        let id = ListenerId(self.0.next_listener.get());
        self.0.next_listener.set(id.0 + 1);
        self.0.listeners.borrow_mut().insert(id, Entry { callback, live: Rc::new(Cell::new(true)) });

        let weak = self.downgrade();
        Subscription::new(move || {
            if let Some(dispatcher) = weak.upgrade() {
                dispatcher.remove_listener(id);
            }
        })
    }
}

impl<T> Dispatcher<T> {
    pub fn id(&self) -> DispatcherId { self.0.id }

    pub fn state(&self) -> &DispatchState { &self.0.state }

    pub fn downgrade(&self) -> WeakDispatcher<T> { WeakDispatcher(Rc::downgrade(&self.0)) }

    /// Borrow the current value.
    ///
    /// Calling `dispatch` on this dispatcher from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R { f(&*self.0.value.borrow()) }

    /// Remove a listener. A listener that is running right now finishes its
    /// current call; it is never called again. Returns false if unknown.
    fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = self.0.listeners.borrow_mut().remove(&id);
        match removed {
            Some(entry) => {
                entry.live.set(false);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize { self.0.listeners.borrow().len() }

    /// Whether this dispatcher is marked active in its dispatch state
    pub fn is_dispatching(&self) -> bool { self.0.state.is_active(self.0.id) }

    /// Mark or unmark this dispatcher as dispatching without delivering
    /// anything. While marked, every dispatch to it is suppressed.
    pub fn set_dispatching(&self, dispatching: bool) {
        if dispatching {
            self.0.state.mark_active(self.0.id);
        } else {
            self.0.state.end_dispatch(self.0.id);
        }
    }

    /// Install the hook that writes direct and binding dispatches back to a
    /// source adapter.
    pub fn set_writer<F>(&self, writer: F)
    where F: Fn(&T) + 'static {
        *self.0.writer.borrow_mut() = Some(Rc::new(writer));
    }

    /// Drop every listener and the writer. Later dispatches are no-ops.
    pub fn dispose(&self) {
        if self.0.disposed.replace(true) {
            return;
        }
        let listeners = std::mem::take(&mut *self.0.listeners.borrow_mut());
        for entry in listeners.values() {
            entry.live.set(false);
        }
        self.0.writer.borrow_mut().take();
        debug!("{} disposed ({} listeners released)", self.0.id, listeners.len());
    }

    pub fn is_disposed(&self) -> bool { self.0.disposed.get() }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("id", &self.0.id)
            .field("value", &*self.0.value.borrow())
            .field("listeners", &self.0.listeners.borrow().len())
            .field("disposed", &self.0.disposed.get())
            .finish()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "listener panicked".to_string(),
        },
    }
}
