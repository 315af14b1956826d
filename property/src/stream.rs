use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::disposable::Subscription;
use crate::dispatcher::{ChangeEvent, Dispatcher, WeakDispatcher};
use crate::property::Property;

/// A stream of a property's change events.
///
/// Nothing is registered until the stream is first polled, so events from
/// before that point are not seen. The stream ends once the property is
/// disposed. Dropping it unregisters its listener.
pub struct ChangeEvents<T> {
    dispatcher: WeakDispatcher<T>,
    connection: Option<(mpsc::UnboundedReceiver<ChangeEvent<T>>, Subscription)>,
}

impl<T: Clone + 'static> Property<T> {
    /// A fresh stream of this property's changes. Each call returns an
    /// independent stream.
    pub fn change_events(&self) -> ChangeEvents<T> { ChangeEvents { dispatcher: self.dispatcher().downgrade(), connection: None } }
}

impl<T: Clone + 'static> ChangeEvents<T> {
    /// Register the listener if that has not happened yet. Returns the live
    /// dispatcher, or `None` once the property is gone.
    fn connect(&mut self) -> Option<Dispatcher<T>> {
        let dispatcher = self.dispatcher.upgrade().filter(|dispatcher| !dispatcher.is_disposed())?;
        if self.connection.is_none() {
            let (sender, receiver) = mpsc::unbounded_channel();
            let subscription = dispatcher.add_listener(move |event: &ChangeEvent<T>| {
                // receiver gone means the stream was dropped mid-dispatch
                let _ = sender.send(event.clone());
            });
            self.connection = Some((receiver, subscription));
        }
        Some(dispatcher)
    }

    /// Start listening, then read the current value. Every change after the
    /// read is delivered by the stream. `None` once the property is gone.
    pub(crate) fn connect_and_peek<R>(&mut self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let dispatcher = self.connect()?;
        Some(dispatcher.with(f))
    }
}

impl<T: Clone + 'static> Stream for ChangeEvents<T> {
    type Item = ChangeEvent<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.connection.is_none() && this.connect().is_none() {
            return Poll::Ready(None);
        }
        match this.connection.as_mut() {
            Some((receiver, _)) => receiver.poll_recv(cx),
            None => Poll::Ready(None),
        }
    }
}
