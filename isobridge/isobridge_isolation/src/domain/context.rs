//! The domain a thread is currently executing in.
//!
//! Code runs "inside" a domain for the duration of [`Domain::enter`]. Entries
//! nest; leaving restores whatever domain was current before, including when
//! the entered closure unwinds.

use std::cell::RefCell;
use std::sync::Arc;

use super::Domain;

thread_local! {
    static CURRENT: RefCell<Option<Arc<Domain>>> = const { RefCell::new(None) };
}

/// The domain entered on this thread, if any.
///
/// A thread that has not entered any domain is executing in the root domain
/// of whichever runtime it calls into.
pub fn entered() -> Option<Arc<Domain>> {
    CURRENT.with(|current| current.borrow().clone())
}

struct EnterGuard {
    previous: Option<Arc<Domain>>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

impl Domain {
    /// Run `f` with this domain as the current domain of the calling thread.
    pub fn enter<R>(self: &Arc<Self>, f: impl FnOnce() -> R) -> R {
        let previous = CURRENT.with(|current| current.borrow_mut().replace(Arc::clone(self)));
        let _guard = EnterGuard { previous };
        f()
    }
}
