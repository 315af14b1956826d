//! Keeps properties in different nodes in step by exchanging their values as
//! JSON envelopes over a named-channel bus.
//!
//! The transport is abstracted by [`Bus`]; [`LocalBus`] is an in-process
//! implementation that delivers synchronously, which is what tests and
//! single-process setups use. [`BusSync`] is the adapter that ties one
//! property to one channel.

mod bus;
mod envelope;
mod error;
mod sync;

pub use bus::*;
pub use envelope::*;
pub use error::*;
pub use sync::*;
