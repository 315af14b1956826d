mod common;

use common::{change_watcher, state_watcher};
use tether_property::*;

#[test]
fn synchronized_pair_notifies_each_side_once() {
    let state = DispatchState::default();
    let a = Property::new_in(state.clone(), String::from("a"));
    let b = Property::new_in(state.clone(), String::from("b"));
    let _link = a.synchronize(&b).unwrap();
    assert_eq!(a.get(), "b");

    let (a_listener, a_changes) = change_watcher();
    let (b_listener, b_changes) = change_watcher();
    let _a_sub = a.on_changed(a_listener);
    let _b_sub = b.on_changed(b_listener);

    a.set("x".into()).unwrap();
    assert_eq!(b.get(), "x");
    assert_eq!(a_changes(), ["x"]);
    assert_eq!(b_changes(), ["x"]);

    b.set("y".into()).unwrap();
    assert_eq!(a.get(), "y");
    assert_eq!(a_changes(), ["y"]);
    assert_eq!(b_changes(), ["y"]);
    assert!(!state.is_dispatching());
}

#[test]
fn chain_of_three_converges_from_any_member() {
    let state = DispatchState::default();
    let a = Property::new_in(state.clone(), 1);
    let b = Property::new_in(state.clone(), 2);
    let c = Property::new_in(state.clone(), 3);
    let _ab = a.synchronize(&b).unwrap();
    let _bc = b.synchronize(&c).unwrap();
    // b adopted c's value, which flowed on to a
    assert_eq!((a.get(), b.get(), c.get()), (3, 3, 3));

    let watchers: Vec<_> = [&a, &b, &c]
        .into_iter()
        .map(|property| {
            let (listener, changes) = change_watcher();
            (property.on_changed(listener), changes)
        })
        .collect();

    for (source, value) in [(&a, 10), (&c, 20), (&b, 30)] {
        source.set(value).unwrap();
        assert_eq!((a.get(), b.get(), c.get()), (value, value, value));
        for (_, changes) in &watchers {
            assert_eq!(changes(), [value]);
        }
    }
}

#[test]
fn one_way_ring_notifies_each_member_once() {
    let state = DispatchState::default();
    let a = Property::new_in(state.clone(), 0);
    let b = Property::new_in(state.clone(), 0);
    let c = Property::new_in(state.clone(), 0);
    let _b_follows_a = b.bind(&a).unwrap();
    let _c_follows_b = c.bind(&b).unwrap();
    let _a_follows_c = a.bind(&c).unwrap();

    let (a_listener, a_changes) = change_watcher();
    let (b_listener, b_changes) = change_watcher();
    let (c_listener, c_changes) = change_watcher();
    let _subs = [a.on_changed(a_listener), b.on_changed(b_listener), c.on_changed(c_listener)];

    a.set(5).unwrap();
    assert_eq!((a.get(), b.get(), c.get()), (5, 5, 5));
    assert_eq!((a_changes(), b_changes(), c_changes()), (vec![5], vec![5], vec![5]));

    c.set(8).unwrap();
    assert_eq!((a.get(), b.get(), c.get()), (8, 8, 8));
    assert_eq!((a_changes(), b_changes(), c_changes()), (vec![8], vec![8], vec![8]));
}

#[test]
fn synchronized_ring_notifies_each_member_once() {
    let state = DispatchState::default();
    let a = Property::new_in(state.clone(), 0);
    let b = Property::new_in(state.clone(), 0);
    let c = Property::new_in(state.clone(), 0);
    let _ab = a.synchronize(&b).unwrap();
    let _bc = b.synchronize(&c).unwrap();
    let _ca = c.synchronize(&a).unwrap();

    let (a_listener, a_changes) = change_watcher();
    let (b_listener, b_changes) = change_watcher();
    let (c_listener, c_changes) = change_watcher();
    let _subs = [a.on_changed(a_listener), b.on_changed(b_listener), c.on_changed(c_listener)];

    for (source, value) in [(&a, 5), (&b, 6), (&c, 7)] {
        source.set(value).unwrap();
        assert_eq!((a.get(), b.get(), c.get()), (value, value, value));
        assert_eq!((a_changes(), b_changes(), c_changes()), (vec![value], vec![value], vec![value]));
    }
    assert!(!state.is_dispatching());
}

#[test]
fn dispatch_state_distinguishes_direct_from_binding() {
    let state = DispatchState::default();
    let a = Property::new_in(state.clone(), 0);
    let b = Property::new_in(state.clone(), 0);
    let _link = a.synchronize(&b).unwrap();

    let (a_listener, a_seen) = state_watcher(state.clone());
    let (b_listener, b_seen) = state_watcher(state.clone());
    let _a_sub = a.on_changed(a_listener);
    let _b_sub = b.on_changed(b_listener);

    a.set(1).unwrap();
    // a's own listener runs after the binding into b has unwound
    assert_eq!(a_seen(), [(true, false)]);
    assert_eq!(b_seen(), [(true, true)]);

    b.set(2).unwrap();
    assert_eq!(a_seen(), [(true, true)]);
    assert_eq!(b_seen(), [(true, false)]);

    assert!(!state.is_dispatching());
    assert!(!state.is_dispatching_binding());
}

#[test]
fn unsynchronizing_detaches_both_directions() {
    let a = Property::new_in(DispatchState::default(), 0);
    let b = Property::new_in(a.state().clone(), 0);
    let link = a.synchronize(&b).unwrap();
    assert!(a.is_bound());

    link.dispose();
    assert!(!a.is_bound());
    assert_eq!(a.dispatcher().listener_count(), 0);
    assert_eq!(b.dispatcher().listener_count(), 0);

    a.set(1).unwrap();
    b.set(2).unwrap();
    assert_eq!((a.get(), b.get()), (1, 2));
}

#[test]
fn disposing_a_member_leaves_the_rest_synchronized() {
    let state = DispatchState::default();
    let a = Property::new_in(state.clone(), 0);
    let b = Property::new_in(state.clone(), 0);
    let c = Property::new_in(state.clone(), 0);
    let _ab = a.synchronize(&b).unwrap();
    let _ac = a.synchronize(&c).unwrap();

    b.dispose();
    assert!(a.is_bound());
    c.set(4).unwrap();
    assert_eq!(a.get(), 4);
    assert_eq!(b.get(), 0);

    // binding to a disposed property does nothing
    let link = a.synchronize(&b).unwrap();
    assert!(link.is_disposed());
    assert_eq!(a.get(), 4);

    // the link to b went with it; the one to c is still live
    assert_eq!(a.dispatcher().listener_count(), 1);
    c.dispose();
    assert!(!a.is_bound());
    assert_eq!(a.dispatcher().listener_count(), 0);
}

#[test]
fn dropping_the_last_handle_releases_bindings() {
    let state = DispatchState::default();
    let a = Property::new_in(state.clone(), 0);
    {
        let b = Property::new_in(state.clone(), 0);
        let _link = b.bind(&a).unwrap();
        assert_eq!(a.dispatcher().listener_count(), 1);
    }
    assert_eq!(a.dispatcher().listener_count(), 0);
    a.set(1).unwrap();
}
