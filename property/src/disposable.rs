use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A handle on something that stays acquired until released.
///
/// Releasing is idempotent: every call after the first is a no-op.
pub trait Disposable {
    /// Release the underlying resource.
    fn dispose(&self);

    /// Whether `dispose` has already run.
    fn is_disposed(&self) -> bool;
}

impl Disposable for Box<dyn Disposable> {
    fn dispose(&self) { (**self).dispose() }

    fn is_disposed(&self) -> bool { (**self).is_disposed() }
}

type Release = Box<dyn FnOnce()>;

struct SubscriptionInner {
    release: RefCell<Option<Release>>,
    disposed: Cell<bool>,
}

impl SubscriptionInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        // Taken before running so a release that re-enters sees us as disposed.
        let release = self.release.borrow_mut().take();
        if let Some(release) = release {
            release();
        }
    }
}

impl Drop for SubscriptionInner {
    fn drop(&mut self) { self.dispose(); }
}

/// A shared, idempotent release handle.
///
/// Clones refer to the same subscription. It is released by an explicit
/// [`Disposable::dispose`] on any clone, or when the last clone is dropped.
#[derive(Clone)]
#[must_use = "dropping the last handle to a Subscription releases it"]
pub struct Subscription(Rc<SubscriptionInner>);

impl Subscription {
    /// Wrap a release action.
    pub fn new<F>(release: F) -> Self
    where F: FnOnce() + 'static {
        Self(Rc::new(SubscriptionInner { release: RefCell::new(Some(Box::new(release))), disposed: Cell::new(false) }))
    }

    /// A subscription that is already released. Handed out for operations on
    /// disposed properties so callers never have to special-case teardown.
    pub fn disposed() -> Self { Self(Rc::new(SubscriptionInner { release: RefCell::new(None), disposed: Cell::new(true) })) }

    /// Keep a disposable alive until this subscription is released.
    pub fn from_disposable<D>(disposable: D) -> Self
    where D: Disposable + 'static {
        Self::new(move || disposable.dispose())
    }

    /// True if both handles refer to the same subscription
    pub fn ptr_eq(&self, other: &Subscription) -> bool { Rc::ptr_eq(&self.0, &other.0) }
}

impl Disposable for Subscription {
    fn dispose(&self) { self.0.dispose() }

    fn is_disposed(&self) -> bool { self.0.disposed.get() }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("disposed", &self.is_disposed()).finish()
    }
}

/// Identifies a child of a [`CompositeDisposable`] for later removal.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct DisposableKey(usize);

#[derive(Default)]
struct CompositeInner {
    children: RefCell<Vec<(DisposableKey, Box<dyn Disposable>)>>,
    next_key: Cell<usize>,
    disposed: Cell<bool>,
}

impl CompositeInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        // Children may add to or remove from this composite while releasing,
        // so the list is detached before any of them run.
        let children = std::mem::take(&mut *self.children.borrow_mut());
        for (_, child) in children {
            child.dispose();
        }
    }
}

impl Drop for CompositeInner {
    fn drop(&mut self) { self.dispose(); }
}

/// An ordered group of disposables released together.
///
/// Children are released exactly once, in the order they were added. Once
/// the composite is disposed, anything added to it is released on the spot
/// instead of being stored.
#[derive(Clone, Default)]
pub struct CompositeDisposable(Rc<CompositeInner>);

impl CompositeDisposable {
    pub fn new() -> Self { Self::default() }

    /// Build a composite that owns the given children.
    pub fn create<I>(children: I) -> Self
    where I: IntoIterator<Item = Box<dyn Disposable>> {
        let composite = Self::new();
        for child in children {
            composite.add(child);
        }
        composite
    }

    /// Take ownership of `child`. Returns `None` (after releasing the child)
    /// if this composite was already disposed.
    pub fn add<D>(&self, child: D) -> Option<DisposableKey>
    where D: Disposable + 'static {
        if self.0.disposed.get() {
            child.dispose();
            return None;
        }
        let key = DisposableKey(self.0.next_key.get());
        self.0.next_key.set(key.0 + 1);
        self.0.children.borrow_mut().push((key, Box::new(child)));
        Some(key)
    }

    /// Release and forget one child. Returns false if the key is unknown.
    pub fn remove(&self, key: DisposableKey) -> bool {
        let removed = {
            let mut children = self.0.children.borrow_mut();
            children.iter().position(|(k, _)| *k == key).map(|index| children.remove(index))
        };
        match removed {
            Some((_, child)) => {
                child.dispose();
                true
            }
            None => false,
        }
    }

    /// Number of children currently held
    pub fn len(&self) -> usize { self.0.children.borrow().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Disposable for CompositeDisposable {
    fn dispose(&self) { self.0.dispose() }

    fn is_disposed(&self) -> bool { self.0.disposed.get() }
}

impl std::fmt::Debug for CompositeDisposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeDisposable").field("children", &self.len()).field("disposed", &self.is_disposed()).finish()
    }
}

#[derive(Default)]
struct RollingInner {
    current: RefCell<Option<Box<dyn Disposable>>>,
    disposed: Cell<bool>,
}

impl RollingInner {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let current = self.current.borrow_mut().take();
        if let Some(current) = current {
            current.dispose();
        }
    }
}

impl Drop for RollingInner {
    fn drop(&mut self) { self.dispose(); }
}

/// Holds at most one live disposable, releasing the previous one whenever a
/// new one is assigned.
#[derive(Clone, Default)]
pub struct RollingHandle(Rc<RollingInner>);

impl RollingHandle {
    pub fn new() -> Self { Self::default() }

    /// Make `next` current. The previous value is released first; if the
    /// handle itself is already disposed, `next` is released immediately.
    pub fn set<D>(&self, next: D)
    where D: Disposable + 'static {
        if self.0.disposed.get() {
            next.dispose();
            return;
        }
        let previous = self.0.current.borrow_mut().take();
        if let Some(previous) = previous {
            previous.dispose();
        }
        // Releasing the previous value may have disposed us.
        if self.0.disposed.get() {
            next.dispose();
            return;
        }
        let displaced = self.0.current.borrow_mut().replace(Box::new(next));
        if let Some(displaced) = displaced {
            displaced.dispose();
        }
    }

    /// Release the current value, leaving the handle empty but usable.
    pub fn clear(&self) {
        let current = self.0.current.borrow_mut().take();
        if let Some(current) = current {
            current.dispose();
        }
    }

    /// Whether a value is currently held
    pub fn is_set(&self) -> bool { self.0.current.borrow().is_some() }
}

impl Disposable for RollingHandle {
    fn dispose(&self) { self.0.dispose() }

    fn is_disposed(&self) -> bool { self.0.disposed.get() }
}
