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

//! Errors surfaced by blocking runtime operations.

use thiserror::Error;

/// An error value transported through a channel.
pub type BoxedError = Box<dyn std::error::Error + 'static>;

/// Every way a blocking runtime operation can fail.
///
/// Errors are always reported to the caller of the failing operation; the
/// runtime never swallows them. An error escaping a coroutine body terminates
/// only that coroutine.
#[derive(Debug, Error)]
pub enum Error {
    /// The coroutine was cancelled; observed at a suspension point.
    #[error("coroutine was cancelled")]
    Canceled,

    /// The deadline elapsed before the operation could complete.
    #[error("operation timed out")]
    Timeout,

    /// The channel was marked done; no further sends or receives succeed.
    #[error("channel is done")]
    ChannelDone,

    /// The descriptor is negative or could not be registered with the
    /// readiness multiplexer.
    #[error("invalid file descriptor")]
    InvalidFd,

    /// Another coroutine is already waiting for the same descriptor in the
    /// same direction.
    #[error("file descriptor already polled by another coroutine")]
    FdBlocked,

    /// Stack or reactor bookkeeping allocation failed.
    #[error("out of memory")]
    OutOfMemory,

    /// An error sent by the peer through a channel, re-surfaced unchanged
    /// on the receiving side.
    #[error("{0}")]
    Carried(BoxedError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carried_preserves_message() {
        let inner: BoxedError = "wire snapped".into();
        let err = Error::Carried(inner);
        assert_eq!(err.to_string(), "wire snapped");
    }

    #[test]
    fn carried_downcasts_to_original() {
        #[derive(Debug)]
        struct Original(u32);
        impl std::fmt::Display for Original {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "original {}", self.0)
            }
        }
        impl std::error::Error for Original {}

        let err = Error::Carried(Box::new(Original(7)));
        match err {
            Error::Carried(inner) => {
                let back = inner.downcast::<Original>().expect("downcast failed");
                assert_eq!(back.0, 7);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
