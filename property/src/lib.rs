/*!
Observable properties with cycle-safe bindings.

A [`Property`] holds a value, notifies listeners when it changes, and can be
bound to other properties one way ([`Property::bind`]) or both ways
([`Property::synchronize`]). Bindings are plain listener subscriptions, so a
pair of synchronized properties is a cycle; the [`DispatchState`] shared by
their dispatchers breaks it by letting each dispatcher notify at most once
per change wave.

# Guarantees
- Listeners on a property fire in registration order.
- A change to one member of a synchronized group notifies each member
  exactly once, whatever the shape of the group (chains, rings).
- A panicking listener never stops the others; failures are collected and
  handled by the [`FailurePolicy`] once every listener has run.
- Everything is single-threaded: properties are `!Send`, and source adapters
  for thread-bound foreign systems verify their [`ThreadAffinity`].

# Basic usage

```rust
use tether_property::*;

let celsius = Property::new(20.0_f64);
let fahrenheit = Property::new(0.0_f64);
let _link = fahrenheit.bind_map(&celsius, |c| c * 9.0 / 5.0 + 32.0).unwrap();
assert_eq!(fahrenheit.get(), 68.0);

let _watch = celsius.on_changed(|event| println!("{} -> {}", event.old_value, event.new_value));
celsius.set(100.0).unwrap();
assert_eq!(fahrenheit.get(), 212.0);
```

# Source adapters

```rust
use tether_property::*;

// stands in for a widget model
let slider = SourceCell::new(5);
let volume = Property::from_source(slider.clone());

slider.set_native(7); // the user drags the slider
assert_eq!(volume.get(), 7);

volume.set(3).unwrap(); // written back to the widget
assert_eq!(slider.value(), 3);
```
*/

mod affinity;
mod config;
mod disposable;
mod dispatch;
mod dispatcher;
mod error;
mod property;
mod queue;
mod source;

#[cfg(feature = "stream")]
mod porcelain;
#[cfg(feature = "stream")]
mod stream;

pub use affinity::*;
pub use config::*;
pub use disposable::*;
pub use dispatch::*;
pub use dispatcher::*;
pub use error::*;
pub use property::*;
pub use queue::*;
pub use source::*;

#[cfg(feature = "stream")]
pub use porcelain::*;
#[cfg(feature = "stream")]
pub use stream::*;
