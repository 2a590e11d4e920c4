// The MIT License (MIT)

// Copyright (c) 2015 Rustcc developers

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

//! The error taxonomy from the error handling design (§7): domain failures are not
//! represented here (they are [`crate::effect::ErrEffect`], recoverable by name), only
//! the classes that the source design calls "programmer error" or "host exception."

use thiserror::Error;

/// Everything that can go wrong while interpreting, running, scheduling, or
/// rendezvous-ing a computation, other than a domain-level `Err` effect (which is
/// recovered by name, never converted into this type, unless it escapes unhandled
/// all the way to a runner).
#[derive(Debug, Clone, Error)]
pub enum EffectualError {
    /// An `Err` effect reached a runner boundary without being matched by any
    /// enclosing handler. Always a programmer error (§7: "Missing capability").
    ///
    /// The original (type-erased) error payload cannot be carried here without a
    /// `Debug`/`Clone` bound this crate does not impose on domain error types, so
    /// only the discriminating `name` survives into the diagnostic.
    #[error("unhandled error effect '{name}'")]
    UnhandledError { name: String },

    /// A `Ctx` effect (mandatory context) reached a runner boundary unhandled.
    #[error("missing context '{name}'")]
    MissingContext { name: String },

    /// `run_sync` observed an `Async` effect. Synchronous runners have no
    /// suspension point for it (§4.3, §5).
    #[error("unexpected asynchronous suspension '{name}' in a synchronous run")]
    UnexpectedSuspension { name: &'static str },

    /// A descriptor reached a runner or interpreter that isn't responsible for it
    /// (e.g. a bare `Msg` outside `communicate`).
    #[error("unexpected effect '{name}' outside its owning interpreter")]
    UnexpectedEffect { name: &'static str },

    /// `concurrent`/`series`/`parallel` were configured with `maxConcurrency <= 0`.
    #[error("maxConcurrency must be a positive integer, got {requested}")]
    InvalidConcurrency { requested: i64 },

    /// A coroutine yielded a new descriptor while being cleaned up by the
    /// early-termination primitive. `finally` blocks must not yield (§4.1, §5).
    #[error("a computation yielded during cleanup; cleanup must not suspend")]
    CleanupYielded,

    /// The asynchronous host future backing an `Async` effect rejected.
    #[error("asynchronous suspension rejected: {0}")]
    AsyncRejected(String),

    /// A rendezvous-specific failure; see [`RendezvousError`].
    #[error(transparent)]
    Rendezvous(#[from] RendezvousError),
}

/// The two diagnostic shapes `communicate` throws into a stranded participant, plus
/// the fatal case raised when participants are still stranded after drain (§4.5, §7).
#[derive(Debug, Clone, Error)]
pub enum RendezvousError {
    /// Thrown into the sender of an unmatched send.
    #[error("Message '{name}' sent by '{key}' was not received")]
    NotReceived { name: String, key: String },

    /// Thrown into the waiter of an unmatched wait.
    #[error("Message '{name}' waited by '{key}' was not sent")]
    NotSent { name: String, key: String },

    /// Raised (not thrown into any one participant) when, after a full drain pass,
    /// one or more participants still have not returned.
    #[error("communicate: participants did not complete: {}", .stranded.join(", "))]
    Stranded { stranded: Vec<String> },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EffectualError>;
