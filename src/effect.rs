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

//! The descriptors a running [`Computation`](crate::coroutine::Computation) yields to
//! request a capability from whatever is driving it.
//!
//! A descriptor is a plain value; it carries a `name` used for handler-map dispatch
//! plus a type-erased payload. The payload is type-erased (`Box<dyn Any + Send>`)
//! because the handler map is keyed dynamically by name, the same way the source
//! system dispatches untyped descriptors -- the smart constructors in
//! [`crate::coroutine`] are what re-establish a static type at the call site.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// A name used to key a handler map. Cheap to clone; usually `'static`.
pub type Name = Cow<'static, str>;

/// A type-erased payload moving across a suspension point.
pub type Payload = Box<dyn Any + Send>;

/// A boxed, pinned future backing an [`Effect::Async`] suspension.
pub type BoxFuture = Pin<Box<dyn Future<Output = Payload> + Send>>;

/// A single capability request yielded by a [`Computation`](crate::coroutine::Computation).
///
/// This is the Rust rendering of the four (five, counting `Msg`) descriptor kinds in
/// the data model: `Err`, `Ctx`/`Opt` (distinguished by `CtxEffect::optional`),
/// `Async`, and `Msg`. There is no catch-all variant -- Rust's exhaustive `match`
/// makes the "unexpected descriptor" error class from the source design unrepresentable
/// rather than merely checked at runtime.
pub enum Effect {
    /// A typed failure. See [`ErrEffect`].
    Err(ErrEffect),
    /// A mandatory or optional context lookup. See [`CtxEffect`].
    Ctx(CtxEffect),
    /// An asynchronous suspension. See [`AsyncEffect`].
    Async(AsyncEffect),
    /// A rendezvous send or wait. See [`MsgEffect`].
    Msg(MsgEffect),
}

impl Effect {
    /// The discriminator used for handler-map dispatch, where applicable.
    ///
    /// `Async` has no name: it is never matched by a handler map, only by a runner
    /// or the scheduler.
    pub fn name(&self) -> Option<&Name> {
        match self {
            Effect::Err(e) => Some(&e.name),
            Effect::Ctx(c) => Some(&c.name),
            Effect::Async(_) => None,
            Effect::Msg(m) => Some(&m.name),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Effect::Err(_) => "err",
            Effect::Ctx(c) if c.optional => "opt",
            Effect::Ctx(_) => "ctx",
            Effect::Async(_) => "async",
            Effect::Msg(_) => "msg",
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Effect::{}({name:?})", self.kind()),
            None => write!(f, "Effect::{}", self.kind()),
        }
    }
}

/// A typed failure: `{type: "err", name, error}` in the data model.
pub struct ErrEffect {
    pub name: Name,
    pub error: Payload,
}

/// A context lookup: `{type: "ctx"|"opt", name, context}` in the data model.
///
/// `optional` distinguishes `Ctx` (mandatory; unhandled is a programmer error) from
/// `Opt` (the only descriptor a runner may resolve silently, with "no value").
pub struct CtxEffect {
    pub name: Name,
    pub optional: bool,
}

/// An asynchronous suspension: `{type: "async", promise}` in the data model.
pub struct AsyncEffect {
    pub future: BoxFuture,
}

/// A rendezvous operation: `{type: "msg", name, message}` in the data model.
///
/// `message = Some(_)` is a send; `message = None` is a wait, matching `message=⊥`.
pub struct MsgEffect {
    pub name: Name,
    pub message: Option<Payload>,
}

/// The value fed back into a suspended [`Computation`](crate::coroutine::Computation)
/// to resume it.
///
/// `Ok`/`Err` here mirror "resumed normally" vs. "thrown into" from the coroutine
/// protocol -- a rejected `Async` promise, or a stranded rendezvous diagnostic, is
/// delivered as `Resume::Thrown` and surfaces to the user's `async` body as a
/// `Result::Err` at the `.await` point, which is the idiomatic Rust reading of
/// "resume with an exception" (see SPEC_FULL.md §10.1).
pub enum Resume {
    /// Ordinary resumption with a value.
    Value(Payload),
    /// Resumption carrying no payload (e.g. after a rendezvous send is delivered).
    Unit,
    /// "Throw into" the coroutine: the next `.await` observes this as an error.
    Thrown(crate::error::EffectualError),
}

impl Resume {
    pub(crate) fn into_value(self) -> Result<Payload, crate::error::EffectualError> {
        match self {
            Resume::Value(v) => Ok(v),
            Resume::Unit => Ok(Box::new(())),
            Resume::Thrown(e) => Err(e),
        }
    }
}

/// Downcast a [`Payload`] to `T`, panicking with a descriptive message on mismatch.
///
/// Every smart constructor in [`crate::coroutine`] is the single writer and single
/// reader of the payload for a given call site, so a mismatch here means a handler
/// supplied a value of the wrong type for a given `name` -- a programmer error, not
/// a recoverable one, exactly like a wrongly-typed `context` in the source design.
pub(crate) fn downcast<T: 'static>(payload: Payload) -> T {
    match payload.downcast::<T>() {
        Ok(boxed) => *boxed,
        Err(_) => panic!(
            "effectual: payload type mismatch; a handler or resumption supplied a \
             value whose type does not match what the suspension point expected"
        ),
    }
}
