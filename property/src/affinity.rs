use std::thread::ThreadId;

use tracing::error;

use crate::error::ThreadAffinityViolation;

/// Records the thread a single-threaded collaborator belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    owner: ThreadId,
}

impl ThreadAffinity {
    /// Bind to the calling thread
    pub fn current() -> Self { Self { owner: std::thread::current().id() } }

    pub fn owner(&self) -> ThreadId { self.owner }

    pub fn is_current(&self) -> bool { std::thread::current().id() == self.owner }

    pub fn verify(&self) -> Result<(), ThreadAffinityViolation> {
        let current = std::thread::current().id();
        if current == self.owner { Ok(()) } else { Err(ThreadAffinityViolation { owner: self.owner, current }) }
    }

    /// Verify and panic on violation. Touching a single-threaded collaborator
    /// from the wrong thread is a programming error with no recovery.
    #[track_caller]
    pub fn check(&self) {
        if let Err(violation) = self.verify() {
            error!("{}", violation);
            panic!("{}", violation);
        }
    }
}
