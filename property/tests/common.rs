use std::cell::RefCell;
use std::rc::Rc;

use tether_property::{ChangeEvent, DispatchState};
use tracing::Level;

#[ctor::ctor]
fn init_tracing() { let _ = tracing_subscriber::fmt().with_max_level(Level::DEBUG).with_test_writer().try_init(); }

/// Returns an accumulator and a function that drains what it has seen so far.
#[allow(unused)]
pub fn watcher<T: 'static>() -> (Rc<dyn Fn(T)>, Box<dyn Fn() -> Vec<T>>) {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let watcher = {
        let changes = changes.clone();
        Rc::new(move |value: T| changes.borrow_mut().push(value))
    };
    let check: Box<dyn Fn() -> Vec<T>> = Box::new(move || changes.borrow_mut().drain(..).collect());
    (watcher, check)
}

/// A listener that records the new value of every change, plus the drain.
#[allow(unused)]
pub fn change_watcher<T: Clone + 'static>() -> (impl Fn(&ChangeEvent<T>) + 'static, Box<dyn Fn() -> Vec<T>>) {
    let (accumulate, check) = watcher();
    (move |event: &ChangeEvent<T>| accumulate(event.new_value.clone()), check)
}

/// Records what the dispatch state says each time a listener runs:
/// `(is_dispatching, is_dispatching_binding)`.
#[allow(unused)]
pub fn state_watcher<T: 'static>(state: DispatchState) -> (impl Fn(&ChangeEvent<T>) + 'static, Box<dyn Fn() -> Vec<(bool, bool)>>) {
    let (accumulate, check) = watcher();
    (move |_: &ChangeEvent<T>| accumulate((state.is_dispatching(), state.is_dispatching_binding())), check)
}
