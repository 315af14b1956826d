use std::cell::Cell;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tether_property::{ChangeEvent, CompositeDisposable, Disposable, Property, WeakDispatcher};
use tracing::{debug, trace, warn};

use crate::bus::Bus;
use crate::envelope::{Envelope, NodeId};
use crate::error::BusError;

struct Link {
    node: NodeId,
    channel: String,
    bus: Rc<dyn Bus>,
    /// Set while a received value is being applied, so that it is not
    /// published straight back.
    applying: Cell<bool>,
}

impl Link {
    fn publish<T: Serialize>(&self, value: &T) -> Result<(), BusError> {
        let payload = Envelope::wrap(self.node, self.channel.as_str(), value)?.encode()?;
        self.bus.publish(&self.channel, &payload);
        Ok(())
    }

    fn receive<T>(&self, target: &WeakDispatcher<T>, payload: &str) -> Result<(), BusError>
    where T: DeserializeOwned + Clone + 'static {
        let envelope = Envelope::decode(payload)?;
        if envelope.origin == self.node {
            trace!("BusSync({:#}) ignoring own envelope on {}", self.node, self.channel);
            return Ok(());
        }
        let value: T = envelope.unwrap_value()?;
        let Some(dispatcher) = target.upgrade() else { return Ok(()) };
        debug!("BusSync({:#}) applying value from {:#} on {}", self.node, envelope.origin, self.channel);

        self.applying.set(true);
        let applied = dispatcher.dispatch(value);
        self.applying.set(false);
        applied?;
        Ok(())
    }
}

/// Ties a property to a bus channel: local changes are published, values
/// published by other nodes are set on the property.
///
/// Dropping or disposing the `BusSync` detaches it.
#[must_use = "dropping a BusSync detaches it"]
pub struct BusSync<T> {
    link: Rc<Link>,
    target: WeakDispatcher<T>,
    hookups: CompositeDisposable,
}

impl<T> BusSync<T>
where T: Serialize + DeserializeOwned + Clone + 'static
{
    /// Attach under a fresh node id.
    pub fn attach<B>(property: &Property<T>, bus: &B, channel: impl Into<String>) -> Self
    where B: Bus + Clone + 'static {
        Self::attach_as(NodeId::new(), property, bus, channel)
    }

    pub fn attach_as<B>(node: NodeId, property: &Property<T>, bus: &B, channel: impl Into<String>) -> Self
    where B: Bus + Clone + 'static {
        let link = Rc::new(Link { node, channel: channel.into(), bus: Rc::new(bus.clone()), applying: Cell::new(false) });
        let target = property.dispatcher().downgrade();
        let hookups = CompositeDisposable::new();

        let outgoing = {
            let link = link.clone();
            property.on_changed(move |event: &ChangeEvent<T>| {
                if link.applying.get() {
                    return;
                }
                if let Err(err) = link.publish(&event.new_value) {
                    warn!("BusSync({:#}) could not publish on {}: {}", link.node, link.channel, err);
                }
            })
        };
        hookups.add(outgoing);

        let incoming = {
            let (receiver, target) = (link.clone(), target.clone());
            bus.subscribe(
                &link.channel,
                Box::new(move |payload: &str| {
                    if let Err(err) = receiver.receive(&target, payload) {
                        warn!("BusSync({:#}) dropped envelope on {}: {}", receiver.node, receiver.channel, err);
                    }
                }),
            )
        };
        hookups.add(incoming);

        debug!("BusSync({:#}) attached to {}", link.node, link.channel);
        Self { link, target, hookups }
    }

    /// Publish the property's current value, e.g. to bring late joiners up to
    /// date. Does nothing once the property is gone.
    pub fn publish_current(&self) -> Result<(), BusError> {
        match self.target.upgrade() {
            Some(dispatcher) if !dispatcher.is_disposed() => dispatcher.with(|value| self.link.publish(value)),
            _ => Ok(()),
        }
    }
}

impl<T> BusSync<T> {
    pub fn node(&self) -> NodeId { self.link.node }

    pub fn channel(&self) -> &str { &self.link.channel }
}

impl<T> Disposable for BusSync<T> {
    fn dispose(&self) { self.hookups.dispose() }

    fn is_disposed(&self) -> bool { self.hookups.is_disposed() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalBus;
    use std::cell::RefCell;

    fn tap(bus: &LocalBus, channel: &str) -> (tether_property::Subscription, Rc<RefCell<Vec<Envelope>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sub = {
            let seen = seen.clone();
            bus.subscribe(channel, Box::new(move |payload| seen.borrow_mut().push(Envelope::decode(payload).unwrap())))
        };
        (sub, seen)
    }

    #[test]
    fn local_change_is_published_with_own_origin() {
        let bus = LocalBus::new();
        let (_tap, seen) = tap(&bus, "count");
        let property = Property::new(0);
        let sync = BusSync::attach(&property, &bus, "count");

        property.set(3).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].origin, sync.node());
        assert_eq!(seen[0].value, serde_json::json!(3));
    }

    #[test]
    fn applied_value_is_not_republished() {
        let bus = LocalBus::new();
        let property = Property::new(String::new());
        let _sync = BusSync::attach(&property, &bus, "title");
        let (_tap, seen) = tap(&bus, "title");

        let remote = Envelope::wrap(NodeId::new(), "title", &"hello").unwrap();
        bus.publish("title", &remote.encode().unwrap());

        assert_eq!(property.get(), "hello");
        assert_eq!(*seen.borrow(), [remote]);
    }

    #[test]
    fn own_envelopes_are_ignored() {
        let bus = LocalBus::new();
        let property = Property::new(1);
        let sync = BusSync::attach(&property, &bus, "n");

        let echo = Envelope::wrap(sync.node(), "n", &99).unwrap();
        bus.publish("n", &echo.encode().unwrap());
        assert_eq!(property.get(), 1);
    }

    #[test]
    fn undecodable_envelopes_are_dropped() {
        let bus = LocalBus::new();
        let property = Property::new(1);
        let _sync = BusSync::attach(&property, &bus, "n");

        bus.publish("n", "{broken");
        let wrong_type = Envelope::wrap(NodeId::new(), "n", &"seven").unwrap();
        bus.publish("n", &wrong_type.encode().unwrap());
        assert_eq!(property.get(), 1);
    }

    #[test]
    fn dispose_detaches_both_directions() {
        let bus = LocalBus::new();
        let property = Property::new(0);
        let sync = BusSync::attach(&property, &bus, "n");
        assert_eq!(bus.subscriber_count("n"), 1);
        assert_eq!(property.dispatcher().listener_count(), 1);

        sync.dispose();
        assert!(sync.is_disposed());
        assert_eq!(bus.subscriber_count("n"), 0);
        assert_eq!(property.dispatcher().listener_count(), 0);
    }

    #[test]
    fn publish_current_announces_value() {
        let bus = LocalBus::new();
        let (_tap, seen) = tap(&bus, "n");
        let property = Property::new(5);
        let sync = BusSync::attach(&property, &bus, "n");

        sync.publish_current().unwrap();
        assert_eq!(seen.borrow()[0].value, serde_json::json!(5));

        property.dispose();
        sync.publish_current().unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }
}
