//! Bridges between properties and foreign value holders.
//!
//! A [`Source`] is whatever owns the "real" value outside the property graph:
//! a widget model, a network-backed cell, a plain variable. The property
//! only needs three capabilities from it, so any foreign system can be
//! adapted without the dispatcher knowing about it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::affinity::ThreadAffinity;
use crate::disposable::Subscription;

/// A foreign value holder a property can mirror.
pub trait Source<T> {
    /// The value the foreign system currently holds
    fn get(&self) -> T;

    /// Write a value into the foreign system. Implementations may report the
    /// write back through their change listeners; the echo is suppressed.
    fn set(&self, value: &T);

    /// Forward native change notifications to `on_change` until the returned
    /// subscription is released.
    fn subscribe(&self, on_change: Box<dyn Fn(T)>) -> Subscription;
}

struct CellInner<T> {
    value: RefCell<T>,
    listeners: RefCell<Vec<(usize, Rc<dyn Fn(T)>)>>,
    next_listener: Cell<usize>,
}

/// An in-memory foreign value holder with its own change listeners, the
/// shape a widget model has.
pub struct SourceCell<T>(Rc<CellInner<T>>);

impl<T> Clone for SourceCell<T> {
    fn clone(&self) -> Self { Self(Rc::clone(&self.0)) }
}

impl<T: Clone + 'static> SourceCell<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(CellInner { value: RefCell::new(value), listeners: RefCell::new(Vec::new()), next_listener: Cell::new(0) }))
    }

    /// Change the value from the foreign side (a user edit, say) and notify
    /// native listeners.
    pub fn set_native(&self, value: T) {
        *self.0.value.borrow_mut() = value.clone();
        let listeners: Vec<_> = self.0.listeners.borrow().iter().map(|(_, listener)| listener.clone()).collect();
        for listener in listeners {
            listener(value.clone());
        }
    }

    pub fn value(&self) -> T { self.0.value.borrow().clone() }

    pub fn listener_count(&self) -> usize { self.0.listeners.borrow().len() }
}

impl<T: Clone + 'static> Source<T> for SourceCell<T> {
    fn get(&self) -> T { self.value() }

    fn set(&self, value: &T) { self.set_native(value.clone()) }

    fn subscribe(&self, on_change: Box<dyn Fn(T)>) -> Subscription {
        let id = self.0.next_listener.get();
        self.0.next_listener.set(id + 1);
        self.0.listeners.borrow_mut().push((id, Rc::from(on_change)));

        let inner = Rc::downgrade(&self.0);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.borrow_mut().retain(|(listener, _)| *listener != id);
            }
        })
    }
}

/// A source that may only be used from the thread it was bound to.
///
/// Affinity is verified when the wrapper is created and on every call; a
/// call from another thread panics.
pub struct ThreadAffine<S> {
    inner: S,
    affinity: ThreadAffinity,
}

impl<S> ThreadAffine<S> {
    /// Bind to the calling thread
    pub fn new(inner: S) -> Self { Self::bound_to(inner, ThreadAffinity::current()) }

    /// Bind to an existing affinity, e.g. an event queue's thread.
    #[track_caller]
    pub fn bound_to(inner: S, affinity: ThreadAffinity) -> Self {
        affinity.check();
        Self { inner, affinity }
    }

    pub fn affinity(&self) -> ThreadAffinity { self.affinity }
}

impl<T, S: Source<T>> Source<T> for ThreadAffine<S> {
    fn get(&self) -> T {
        self.affinity.check();
        self.inner.get()
    }

    fn set(&self, value: &T) {
        self.affinity.check();
        self.inner.set(value)
    }

    fn subscribe(&self, on_change: Box<dyn Fn(T)>) -> Subscription {
        self.affinity.check();
        self.inner.subscribe(on_change)
    }
}
