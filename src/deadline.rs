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

//! Absolute points in monotonic time after which a blocking operation gives up.

use std::time::{Duration, Instant};

/// An absolute monotonic point in time bounding a blocking operation.
///
/// `Deadline::NEVER` arms no timer at all; `Deadline::immediate()` expires
/// right away but still performs one scheduling round trip, so an operation
/// called with it yields at least once before reporting `Timeout`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No effective timeout: wait until the operation completes or the
    /// coroutine is cancelled.
    pub const NEVER: Deadline = Deadline(None);

    /// A deadline that has already arrived; poll without waiting.
    pub fn immediate() -> Deadline {
        Deadline(Some(Instant::now()))
    }

    /// The point `dur` from now.
    pub fn after(dur: Duration) -> Deadline {
        Deadline(Some(Instant::now() + dur))
    }

    /// A deadline at an explicit instant.
    pub fn at(when: Instant) -> Deadline {
        Deadline(Some(when))
    }

    /// The underlying instant, or `None` for `NEVER`.
    pub fn instant(&self) -> Option<Instant> {
        self.0
    }

    pub fn is_never(&self) -> bool {
        self.0.is_none()
    }

    /// Whether the deadline lies in the past. `NEVER` never elapses.
    pub fn has_elapsed(&self) -> bool {
        match self.0 {
            Some(when) => when <= Instant::now(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_has_no_instant() {
        assert!(Deadline::NEVER.is_never());
        assert!(Deadline::NEVER.instant().is_none());
        assert!(!Deadline::NEVER.has_elapsed());
    }

    #[test]
    fn immediate_elapses_at_once() {
        assert!(Deadline::immediate().has_elapsed());
    }

    #[test]
    fn after_orders_with_now() {
        let d = Deadline::after(Duration::from_secs(60));
        assert!(!d.has_elapsed());
        assert!(d.instant().unwrap() > Instant::now());
    }
}
