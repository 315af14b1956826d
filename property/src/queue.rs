use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::trace;

use crate::affinity::ThreadAffinity;
use crate::dispatch::DispatchState;

type Task = Box<dyn FnOnce()>;

struct Inner {
    tasks: RefCell<VecDeque<Task>>,
    affinity: ThreadAffinity,
}

/// A single-threaded FIFO of deferred work, the way a UI toolkit's event
/// loop defers callbacks posted to it.
#[derive(Clone)]
pub struct EventQueue(Rc<Inner>);

impl Default for EventQueue {
    fn default() -> Self { Self::new() }
}

impl EventQueue {
    pub fn new() -> Self { Self(Rc::new(Inner { tasks: RefCell::new(VecDeque::new()), affinity: ThreadAffinity::current() })) }

    /// The thread this queue runs on
    pub fn affinity(&self) -> ThreadAffinity { self.0.affinity }

    pub fn post<F>(&self, task: F)
    where F: FnOnce() + 'static {
        self.0.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Post `task` so that it runs under the dispatch state that is current
    /// right now, rather than whatever state is current when the queue drains.
    pub fn post_in_dispatch_state<F>(&self, state: &DispatchState, task: F)
    where F: FnOnce() + 'static {
        self.post(state.wrap_with_current_dispatch_state(task));
    }

    /// Run queued tasks until the queue is empty, including tasks posted by
    /// the tasks being run. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.0.tasks.borrow_mut().pop_front();
            let Some(task) = task else { break };
            task();
            ran += 1;
        }
        if ran > 0 {
            trace!("event queue ran {} task(s)", ran);
        }
        ran
    }

    pub fn len(&self) -> usize { self.0.tasks.borrow().len() }

    pub fn is_empty(&self) -> bool { self.0.tasks.borrow().is_empty() }
}
