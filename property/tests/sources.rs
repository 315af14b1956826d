mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::change_watcher;
use tether_property::*;

#[test]
fn native_change_reaches_property_and_bound_peers() {
    let state = DispatchState::default();
    let widget = SourceCell::new(String::from("initial"));
    let text = Property::from_source_in(state.clone(), widget.clone());
    let model = Property::new_in(state.clone(), String::new());
    let _link = model.synchronize(&text).unwrap();
    assert_eq!(model.get(), "initial");

    let (listener, changes) = change_watcher();
    let _sub = text.on_changed(listener);

    widget.set_native("typed".into());
    assert_eq!(text.get(), "typed");
    assert_eq!(model.get(), "typed");
    assert_eq!(changes(), ["typed"]);
}

#[test]
fn property_write_reaches_source_without_echo() {
    let widget = SourceCell::new(0);
    let property = Property::from_source_in(DispatchState::default(), widget.clone());
    let (listener, changes) = change_watcher();
    let _sub = property.on_changed(listener);

    // the cell reports the write back through its listeners; that echo is
    // suppressed since the property is still dispatching
    property.set(4).unwrap();
    assert_eq!(widget.value(), 4);
    assert_eq!(changes(), [4]);
}

#[test]
fn bound_peer_drives_source() {
    let state = DispatchState::default();
    let widget = SourceCell::new(0);
    let shown = Property::from_source_in(state.clone(), widget.clone());
    let model = Property::new_in(state.clone(), 12);
    let _link = shown.bind(&model).unwrap();
    assert_eq!(widget.value(), 12);

    model.set(13).unwrap();
    assert_eq!(widget.value(), 13);
}

#[test]
fn dispose_releases_native_subscription() {
    let widget = SourceCell::new(1);
    let property = Property::from_source_in(DispatchState::default(), widget.clone());
    assert_eq!(widget.listener_count(), 1);

    property.dispose();
    assert_eq!(widget.listener_count(), 0);
    widget.set_native(2);
    assert_eq!(property.get(), 1);
}

/// A source whose writes do not notify its own listeners, and which counts
/// how often it is written.
struct CountingSource {
    cell: SourceCell<i32>,
    writes: Rc<Cell<usize>>,
}

impl Source<i32> for CountingSource {
    fn get(&self) -> i32 { self.cell.value() }

    fn set(&self, _value: &i32) { self.writes.set(self.writes.get() + 1); }

    fn subscribe(&self, on_change: Box<dyn Fn(i32)>) -> Subscription { self.cell.subscribe(on_change) }
}

#[test]
fn source_reported_values_are_not_written_back() {
    let cell = SourceCell::new(0);
    let writes = Rc::new(Cell::new(0));
    let property = Property::from_source_in(DispatchState::default(), CountingSource { cell: cell.clone(), writes: writes.clone() });

    cell.set_native(3);
    assert_eq!(property.get(), 3);
    assert_eq!(writes.get(), 0);

    property.set(4).unwrap();
    assert_eq!(writes.get(), 1);
}

#[test]
fn thread_affine_source_works_on_its_thread() {
    let widget = SourceCell::new(7);
    let affine = ThreadAffine::new(widget.clone());
    assert!(affine.affinity().is_current());

    let property = Property::from_source_in(DispatchState::default(), affine);
    assert_eq!(property.get(), 7);
    property.set(8).unwrap();
    assert_eq!(widget.value(), 8);
}

#[test]
fn thread_affinity_verify_reports_foreign_thread() {
    let here = ThreadAffinity::current();
    let verdict = std::thread::spawn(move || here.verify()).join().unwrap();
    let violation = verdict.unwrap_err();
    assert_eq!(violation.owner, here.owner());
    assert_ne!(violation.current, violation.owner);
    assert!(here.verify().is_ok());
}
