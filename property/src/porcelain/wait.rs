use futures::StreamExt;

use crate::property::Property;

/// Waiting on property values asynchronously
pub trait Wait<T: 'static> {
    /// Wait until the property holds `target_value`. Resolves to false if the
    /// property is disposed first.
    fn wait_value(&self, target_value: T) -> impl Future<Output = bool>
    where T: PartialEq;

    /// Wait until `predicate` accepts the current value. Resolves to `None`
    /// if the property is disposed first.
    fn wait_for<F, R>(&self, predicate: F) -> impl Future<Output = Option<R::Output>>
    where
        F: Fn(&T) -> R,
        R: WaitResult;
}

/// What a `wait_for` predicate hands back for each value it inspects.
///
/// A `Some` resolves the wait with that output. A `None` lets the next
/// change event through to the predicate.
pub trait WaitResult {
    type Output;
    fn result(self) -> Option<Self::Output>;
}

impl WaitResult for bool {
    type Output = ();
    fn result(self) -> Option<Self::Output> { self.then_some(()) }
}

/// Resolves with the carried value
impl<T> WaitResult for Option<T> {
    type Output = T;
    fn result(self) -> Option<Self::Output> { self }
}

impl<T: Clone + 'static> Wait<T> for Property<T> {
    fn wait_value(&self, target_value: T) -> impl Future<Output = bool>
    where T: PartialEq {
        let waiting = self.wait_for(move |value| *value == target_value);
        async move { waiting.await.is_some() }
    }

    fn wait_for<F, R>(&self, predicate: F) -> impl Future<Output = Option<R::Output>>
    where
        F: Fn(&T) -> R,
        R: WaitResult,
    {
        let mut events = self.change_events();
        async move {
            // listen before reading, so nothing set after the read is missed
            let Some(current) = events.connect_and_peek(|value| predicate(value).result()) else { return None };
            if current.is_some() {
                return current;
            }
            while let Some(event) = events.next().await {
                if let Some(output) = predicate(&event.new_value).result() {
                    return Some(output);
                }
            }
            None
        }
    }
}
