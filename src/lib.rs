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

//! Stackful coroutines with rendezvous channels and descriptor polling.
//!
//! One scheduler per OS thread drives cooperatively scheduled coroutines:
//! they run until they voluntarily suspend on a `yield`, a sleep, a channel
//! operation or a descriptor poll, and the scheduler then picks the next
//! runnable one. The thread's own stack takes part as the root coroutine, so
//! ordinary code can block on runtime primitives directly.
//!
//! ```
//! use strand::{Channel, Deadline};
//!
//! let ch = Channel::<&'static str>::new();
//! let tx = ch.clone();
//!
//! strand::spawn(move || {
//!     strand::sleep(std::time::Duration::from_millis(5)).unwrap();
//!     tx.send("pong", Deadline::NEVER).unwrap();
//! })
//! .unwrap();
//!
//! assert_eq!(ch.receive(Deadline::NEVER).unwrap(), "pong");
//! ```
//!
//! Every blocking operation takes a [`Deadline`] and fails with
//! [`Error::Timeout`] when it elapses, or with [`Error::Canceled`] when the
//! coroutine's [`Handle::cancel`] was called. Cancellation is cooperative:
//! it is observed at the target's next suspension point and never preempts
//! running code.

#![cfg(unix)]

pub use crate::builder::Builder;
pub use crate::channel::Channel;
pub use crate::coroutine::{Group, Handle, State};
pub use crate::deadline::Deadline;
pub use crate::error::{BoxedError, Error, Result};
pub use crate::fd::{Direction, FileDesc};
pub use crate::options::Options;

mod builder;
mod channel;
mod context;
mod coroutine;
mod deadline;
mod error;
mod fd;
mod options;
mod reactor;
mod scheduler;
mod stack;
mod timer;

#[cfg(test)]
mod tests;

use std::time::Duration;

use crate::scheduler::Scheduler;

/// Spawn a coroutine with default options.
///
/// The coroutine is enqueued ready; the caller keeps running until its own
/// next suspension point. Fails with `Error::Canceled` from inside a
/// cancelled coroutine.
pub fn spawn<F>(f: F) -> Result<Handle>
where
    F: FnOnce() + 'static,
{
    Builder::new().spawn(f)
}

/// Move the current coroutine to the tail of the ready queue and let every
/// other runnable coroutine go first.
///
/// Fails with `Error::Canceled` if the coroutine has been cancelled, so
/// cooperative loops terminate promptly.
pub fn yield_now() -> Result<()> {
    Scheduler::current().yield_now()
}

/// Sleep for `dur`. Equivalent to `sleep_until(Deadline::after(dur))`.
pub fn sleep(dur: Duration) -> Result<()> {
    Scheduler::current().sleep_until(Deadline::after(dur).instant())
}

/// Sleep until `deadline`. Always performs at least one scheduling round
/// trip, even for a deadline already in the past; `Deadline::NEVER` sleeps
/// until cancelled.
pub fn sleep_until(deadline: Deadline) -> Result<()> {
    Scheduler::current().sleep_until(deadline.instant())
}
