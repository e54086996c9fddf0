//! A cooperative cancellation flag, checked between records rather than
//! preempting a read mid-flight.
//!
//! The crate's readers are single-threaded and do no I/O multiplexing of
//! their own; a [`CancellationToken`] lets a caller ask a long streaming
//! read to stop early (e.g. from a signal handler or a UI "cancel"
//! button) without needing `async` or a second thread.

use std::cell::Cell;
use std::rc::Rc;

/// A shared, settable cancellation flag.
///
/// Cloning shares the same underlying flag; setting it through any clone
/// is visible through all of them.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancellationToken {
    /// Creates a token that starts out not cancelled.
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    /// Marks the token cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    /// Whether [`CancellationToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}
