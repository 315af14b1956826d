use std::thread::ThreadId;

use thiserror::Error;

use crate::dispatch::DispatcherId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("{0}")]
    ListenerFailed(ListenerFailures),
}

/// A single listener that failed while a dispatcher was notifying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// The dispatcher whose listener failed
    pub dispatcher: DispatcherId,
    pub message: String,
}

impl std::fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "listener on {} failed: {}", self.dispatcher, self.message) }
}

/// Every listener failure collected during one dispatch, including failures
/// raised further down a chain of bound properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailures(pub(crate) Vec<ListenerFailure>);

impl ListenerFailures {
    pub fn iter(&self) -> impl Iterator<Item = &ListenerFailure> { self.0.iter() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn into_vec(self) -> Vec<ListenerFailure> { self.0 }
}

impl std::fmt::Display for ListenerFailures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} listener(s) failed", self.0.len())?;
        for failure in &self.0 {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

/// A single-threaded collaborator was touched from a thread other than the
/// one it is bound to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("thread affinity violated: bound to {owner:?}, called from {current:?}")]
pub struct ThreadAffinityViolation {
    pub owner: ThreadId,
    pub current: ThreadId,
}
