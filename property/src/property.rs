use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::disposable::{CompositeDisposable, Disposable, Subscription};
use crate::dispatch::DispatchState;
use crate::dispatcher::{ChangeEvent, Dispatcher};
use crate::error::PropertyError;
use crate::source::Source;

struct Shared<T> {
    dispatcher: Dispatcher<T>,
    /// Native hookups (source adapters) torn down with the property
    owned: CompositeDisposable,
    /// Bindings this property established, in the order they were made
    links: RefCell<Vec<Subscription>>,
    /// Bindings other properties established to this one
    peers: RefCell<Vec<Subscription>>,
}

impl<T> Shared<T> {
    fn teardown(&self) {
        let links = std::mem::take(&mut *self.links.borrow_mut());
        let peers = std::mem::take(&mut *self.peers.borrow_mut());
        for link in links.iter().chain(&peers) {
            link.dispose();
        }
        self.owned.dispose();
        self.dispatcher.dispose();
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) { self.teardown(); }
}

/// An observable value.
///
/// Cloning a `Property` yields another handle to the same value, listeners
/// and bindings. The property is torn down by [`Property::dispose`] or when
/// the last handle is dropped; afterwards `set` is a no-op and `on_changed`
/// hands back an already-disposed subscription.
///
/// # Example
/// ```
/// use tether_property::Property;
///
/// let a = Property::new(1);
/// let b = Property::new(0);
/// let _link = a.synchronize(&b).unwrap();
/// assert_eq!(a.get(), 0);
///
/// a.set(7).unwrap();
/// assert_eq!(b.get(), 7);
/// b.set(9).unwrap();
/// assert_eq!(a.get(), 9);
/// ```
pub struct Property<T>(Rc<Shared<T>>);

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self { Self(Rc::clone(&self.0)) }
}

impl<T: Clone + 'static> Property<T> {
    /// A property attached to the calling thread's dispatch state
    pub fn new(initial: T) -> Self { Self::new_in(DispatchState::current(), initial) }

    pub fn new_in(state: DispatchState, initial: T) -> Self {
        Self(Rc::new(Shared {
            dispatcher: Dispatcher::new(state, initial),
            owned: CompositeDisposable::new(),
            links: RefCell::new(Vec::new()),
            peers: RefCell::new(Vec::new()),
        }))
    }

    /// A property whose dispatcher is wired to something external by
    /// `factory`. The returned subscription undoes that wiring and is released
    /// when the property is disposed.
    pub fn from_factory<F>(initial: T, factory: F) -> Self
    where F: FnOnce(&Dispatcher<T>) -> Subscription {
        Self::from_factory_in(DispatchState::current(), initial, factory)
    }

    pub fn from_factory_in<F>(state: DispatchState, initial: T, factory: F) -> Self
    where F: FnOnce(&Dispatcher<T>) -> Subscription {
        let property = Self::new_in(state, initial);
        let hookup = factory(&property.0.dispatcher);
        property.0.owned.add(hookup);
        property
    }

    /// A property mirroring a foreign value holder. Values set on the property
    /// are written to the source; changes the source reports are dispatched.
    pub fn from_source<S>(source: S) -> Self
    where S: Source<T> + 'static {
        Self::from_source_in(DispatchState::current(), source)
    }

    pub fn from_source_in<S>(state: DispatchState, source: S) -> Self
    where S: Source<T> + 'static {
        let source = Rc::new(source);
        let initial = source.get();
        Self::from_factory_in(state, initial, move |dispatcher| {
            let writer = source.clone();
            dispatcher.set_writer(move |value: &T| writer.set(value));

            let target = dispatcher.downgrade();
            source.subscribe(Box::new(move |value: T| {
                if let Some(dispatcher) = target.upgrade() {
                    if let Err(err) = dispatcher.dispatch_from_source(value) {
                        warn!("source change on {}: {}", dispatcher.id(), err);
                    }
                }
            }))
        })
    }

    /// A clone of the current value
    pub fn get(&self) -> T { self.0.dispatcher.value() }

    /// Replace the value and notify listeners. Ignored after disposal, and
    /// while this property is dispatching or has already been notified in the
    /// current change wave.
    pub fn set(&self, value: T) -> Result<(), PropertyError> { self.0.dispatcher.dispatch(value) }

    /// Register a listener for future changes
    pub fn on_changed<F>(&self, listener: F) -> Subscription
    where F: Fn(&ChangeEvent<T>) + 'static {
        self.0.dispatcher.add_listener(listener)
    }

    /// Mirror `other`: adopt its current value now, then follow its changes.
    ///
    /// The binding belongs to this property and is released when either side
    /// is disposed; disposing the returned subscription releases it earlier.
    /// If adopting the current value fails, nothing is bound.
    pub fn bind(&self, other: &Property<T>) -> Result<Subscription, PropertyError> { self.bind_map(other, T::clone) }

    /// Like [`bind`](Self::bind), converting each of `other`'s values with `map`.
    pub fn bind_map<S, F>(&self, other: &Property<S>, map: F) -> Result<Subscription, PropertyError>
    where
        S: Clone + 'static,
        F: Fn(&S) -> T + 'static,
    {
        if self.is_disposed() || other.is_disposed() {
            debug!("bind involving a disposed property ignored");
            return Ok(Subscription::disposed());
        }
        let map = Rc::new(map);
        self.adopt(other, &*map)?;
        Ok(self.own(other, self.follow(other, move |value| map(value))))
    }

    /// Bind both ways: this property adopts `other`'s value, after which a
    /// change to either one is mirrored by the other. Each side notifies its
    /// listeners once per change, however the pair is wired into larger
    /// graphs.
    pub fn synchronize(&self, other: &Property<T>) -> Result<Subscription, PropertyError> {
        if self.is_disposed() || other.is_disposed() {
            debug!("synchronize involving a disposed property ignored");
            return Ok(Subscription::disposed());
        }
        self.adopt(other, &T::clone)?;
        let forward = self.follow(other, T::clone);
        let backward = other.follow(self, T::clone);
        Ok(self.own(other, Subscription::new(move || {
            forward.dispose();
            backward.dispose();
        })))
    }

    fn adopt<S: Clone + 'static>(&self, other: &Property<S>, map: &dyn Fn(&S) -> T) -> Result<(), PropertyError> {
        let value = other.0.dispatcher.with(map);
        self.0.dispatcher.dispatch_from_binding(value)
    }

    /// Listen on `other` and push its converted values into this property.
    fn follow<S, F>(&self, other: &Property<S>, map: F) -> Subscription
    where
        S: Clone + 'static,
        F: Fn(&S) -> T + 'static,
    {
        let target = self.0.dispatcher.downgrade();
        other.0.dispatcher.add_callback(Rc::new(move |event: &ChangeEvent<S>| -> Result<(), PropertyError> {
            match target.upgrade() {
                Some(dispatcher) => dispatcher.dispatch_from_binding(map(&event.new_value)),
                None => Ok(()),
            }
        }))
    }

    /// Record `link` here and with `other`, so tearing down either side
    /// releases it.
    fn own<S>(&self, other: &Property<S>, link: Subscription) -> Subscription {
        for list in [&self.0.links, &other.0.peers] {
            let mut list = list.borrow_mut();
            list.retain(|link| !link.is_disposed());
            list.push(link.clone());
        }
        link
    }
}

impl<T> Property<T> {
    /// Borrow the current value
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R { self.0.dispatcher.with(f) }

    pub fn dispatcher(&self) -> &Dispatcher<T> { &self.0.dispatcher }

    pub fn state(&self) -> &DispatchState { self.0.dispatcher.state() }

    /// Whether any binding established by this property is still live
    pub fn is_bound(&self) -> bool { self.0.links.borrow().iter().any(|link| !link.is_disposed()) }

    /// Release every binding this property made, its source hookup and all of
    /// its listeners. Idempotent.
    pub fn dispose(&self) { self.0.teardown(); }

    pub fn is_disposed(&self) -> bool { self.0.dispatcher.is_disposed() }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.0.dispatcher.id())
            .field("value", &self.with(|value| format!("{:?}", value)))
            .field("bound", &self.is_bound())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl<T: Default + Clone + 'static> Default for Property<T> {
    fn default() -> Self { Self::new(T::default()) }
}
