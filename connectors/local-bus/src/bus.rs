use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tether_property::Subscription;
use tracing::trace;

/// Receives encoded envelopes published on a channel
pub type Handler = Box<dyn Fn(&str)>;

/// A named-channel message transport.
pub trait Bus {
    /// Deliver `payload` to every subscriber of `channel`, the publisher's
    /// own subscriptions included.
    fn publish(&self, channel: &str, payload: &str);

    /// Receive payloads published on `channel` until the returned
    /// subscription is released.
    fn subscribe(&self, channel: &str, handler: Handler) -> Subscription;
}

#[derive(Default)]
struct Inner {
    channels: RefCell<HashMap<String, Vec<(usize, Rc<dyn Fn(&str)>)>>>,
    next_handler: Cell<usize>,
}

/// An in-process bus. Publishing delivers synchronously, to the channel's
/// subscribers in the order they subscribed.
#[derive(Clone, Default)]
pub struct LocalBus(Rc<Inner>);

impl LocalBus {
    pub fn new() -> Self { Self::default() }

    pub fn subscriber_count(&self, channel: &str) -> usize { self.0.channels.borrow().get(channel).map_or(0, Vec::len) }
}

impl Bus for LocalBus {
    fn publish(&self, channel: &str, payload: &str) {
        // snapshot: handlers may publish or (un)subscribe while we deliver
        let handlers: Vec<_> = match self.0.channels.borrow().get(channel) {
            Some(handlers) => handlers.iter().map(|(_, handler)| handler.clone()).collect(),
            None => Vec::new(),
        };
        trace!("LocalBus.publish({}) to {} subscriber(s)", channel, handlers.len());
        for handler in handlers {
            handler(payload);
        }
    }

    fn subscribe(&self, channel: &str, handler: Handler) -> Subscription {
        let id = self.0.next_handler.get();
        self.0.next_handler.set(id + 1);
        self.0.channels.borrow_mut().entry(channel.to_owned()).or_default().push((id, Rc::from(handler)));

        let inner = Rc::downgrade(&self.0);
        let channel = channel.to_owned();
        Subscription::new(move || {
            let Some(inner) = inner.upgrade() else { return };
            let mut channels = inner.channels.borrow_mut();
            if let Some(handlers) = channels.get_mut(&channel) {
                handlers.retain(|(handler, _)| *handler != id);
                if handlers.is_empty() {
                    channels.remove(&channel);
                }
            }
        })
    }
}
