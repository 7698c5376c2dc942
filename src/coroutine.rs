// The MIT License (MIT)

// Copyright (c) 2026 Strand Developers

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Coroutine records, handles and groups.

/* Lifecycle of a coroutine under the scheduler:
 *
 *   spawn ──▶ Ready ──dispatch──▶ Running
 *               ▲                    │
 *               │        yield / sleep / channel op / poll
 *     timer / readiness /            │
 *     rendezvous / cancel            ▼
 *               └───────────── Suspended
 *
 *                    Running ──body returns or panics──▶ Finished
 *                                  (Cancelled when the cancel flag was set)
 *
 * Every suspension hands control to the dispatch loop running on the
 * suspending stack; the loop picks the next ready coroutine and switches to
 * it, or blocks in the reactor until a timer or a descriptor wakes someone.
 * A Handle outlives the record: once the coroutine is Finished or Cancelled
 * the record and its stack are reclaimed, and the handle keeps only the
 * terminal state, on which cancel() is a no-op.
 */

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use log::error;

use crate::context::Context;
use crate::error::Result;
use crate::scheduler::{Scheduler, Wait, Wake};
use crate::stack::Stack;

/// Unique within the process; never reused, so a stale handle can never
/// reach somebody else's coroutine.
pub type CoroId = u64;

/// State of a coroutine
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    /// Queued for dispatch
    Ready,

    /// Currently executing on this thread
    Running,

    /// Parked on a timer, channel or descriptor
    Suspended,

    /// Body ended after a cancel request was observed
    Cancelled,

    /// Body returned or panicked
    Finished,
}

impl State {
    /// Whether the coroutine can never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Cancelled | State::Finished)
    }
}

/// The cell a `Handle` shares with the scheduler's record. It survives the
/// record, so handles stay safe after the coroutine is gone.
pub(crate) struct Shared {
    pub id: CoroId,
    pub state: Cell<State>,
    pub cancel: Cell<bool>,
}

impl Shared {
    pub(crate) fn new(id: CoroId) -> Shared {
        Shared {
            id,
            state: Cell::new(State::Ready),
            cancel: Cell::new(false),
        }
    }
}

/// A schedulable unit with its own stack.
pub(crate) struct Coroutine {
    pub shared: Rc<Shared>,

    /// Always valid while the coroutine is alive and not running.
    pub ctx: Context,

    /// Released to the stack pool once the coroutine ends.
    pub stack: Option<Stack>,

    /// The user body; taken exactly once when first dispatched.
    pub body: Option<Box<dyn FnOnce()>>,

    /// What the coroutine is parked on, if suspended.
    pub wait: Wait,

    /// Why the coroutine was last moved back to the ready queue.
    pub wake: Wake,

    /// Tie-break token of the currently armed timer entry, if any.
    pub timer_seq: Option<u64>,

    pub name: Option<String>,
}

impl Coroutine {
    pub(crate) fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// First function that runs on a fresh coroutine stack.
///
/// `arg` is the address of the boxed record, stable for the coroutine's
/// lifetime. A panic escaping the body terminates only this coroutine.
pub(crate) extern "C" fn coroutine_entry(arg: usize) -> ! {
    Scheduler::current().reap_zombie();

    let coro = arg as *mut Coroutine;
    let body = unsafe { (*coro).body.take().expect("coroutine dispatched twice") };

    if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(body)) {
        let msg = match cause.downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match cause.downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<dyn Any>",
            },
        };
        let name = unsafe { (*coro).name().to_string() };
        error!("coroutine '{}' panicked: {}", name, msg);
    }

    Scheduler::current().finish_current()
}

/// Shared reference to a spawned coroutine.
///
/// Cloneable; stays valid after the coroutine ends, at which point it is an
/// inert reference on which `cancel` is a no-op.
#[derive(Clone)]
pub struct Handle {
    shared: Rc<Shared>,
}

impl Handle {
    pub(crate) fn new(shared: Rc<Shared>) -> Handle {
        Handle { shared }
    }

    /// Request cancellation. Asynchronous and idempotent: sets the flag,
    /// unparks the target if it is suspended, and returns without waiting
    /// for the target to observe anything. The target's current (or next)
    /// blocking operation fails with `Error::Canceled`.
    pub fn cancel(&self) {
        if self.shared.state.get().is_terminal() {
            return;
        }
        self.shared.cancel.set(true);
        Scheduler::current().unpark_cancelled(self.shared.id);
    }

    pub fn state(&self) -> State {
        self.shared.state.get()
    }

    pub fn id(&self) -> CoroId {
        self.shared.id
    }

    /// Whether the coroutine has ended, in either terminal state.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.shared.id)
            .field("state", &self.shared.state.get())
            .finish()
    }
}

/// An unordered collection of coroutines cancelled as one.
///
/// ```
/// let group = strand::Group::new();
/// group.spawn(|| loop {
///     if strand::yield_now().is_err() {
///         break;
///     }
/// }).unwrap();
/// group.cancel();
/// ```
pub struct Group {
    children: RefCell<Vec<Handle>>,
}

impl Group {
    pub fn new() -> Group {
        Group {
            children: RefCell::new(Vec::new()),
        }
    }

    /// Spawn a coroutine owned by this group. The handle is retained by the
    /// group and also returned.
    pub fn spawn<F>(&self, f: F) -> Result<Handle>
    where
        F: FnOnce() + 'static,
    {
        let handle = crate::spawn(f)?;
        self.children.borrow_mut().push(handle.clone());
        Ok(handle)
    }

    /// Cancel every child and clear the collection.
    pub fn cancel(&self) {
        for handle in self.children.borrow_mut().drain(..) {
            handle.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.children.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.borrow().is_empty()
    }
}

impl Default for Group {
    fn default() -> Group {
        Group::new()
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("children", &self.children.borrow().len())
            .finish()
    }
}
