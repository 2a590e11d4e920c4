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

//! `try … handle`: given a computation and a handler map keyed by descriptor name,
//! produce a new computation in which matched descriptors are intercepted locally
//! and everything else is re-yielded unchanged (§4.1).

use std::collections::HashMap;

use log::trace;

use crate::coroutine::{Computation, Step, Suspend};
use crate::effect::{downcast, Effect, Name, Payload, Resume};

/// One entry in a [`HandlerMap`]: either a constant value resumed directly into a
/// matched `Ctx`/`Opt`, or a recovery closure invoked on a matched `Err`.
enum HandlerEntry {
    /// Produces a fresh payload on every matching `Ctx`/`Opt` yield -- a context
    /// value may be read more than once by the computation it's installed for, so
    /// the map stores a thunk that clones it rather than the value itself.
    Context(Box<dyn Fn() -> Payload + Send + Sync>),
    Recover(Box<dyn Fn(Payload) -> Payload + Send + Sync>),
}

/// A name-keyed table of handlers, built with the chained-method style the rest of
/// this crate's configuration surfaces use (compare
/// [`crate::scheduler::ConcurrencyOptions`]).
#[derive(Default)]
pub struct HandlerMap {
    entries: HashMap<Name, HandlerEntry>,
}

impl HandlerMap {
    pub fn new() -> Self {
        HandlerMap::default()
    }

    /// Recover from a matched `Err` effect named `name` by calling `recover` with the
    /// error payload; its return value becomes the outer computation's return value.
    pub fn err<T, E, F>(mut self, name: impl Into<Name>, recover: F) -> Self
    where
        T: Send + 'static,
        E: Send + 'static,
        F: Fn(E) -> T + Send + Sync + 'static,
    {
        self.entries.insert(
            name.into(),
            HandlerEntry::Recover(Box::new(move |payload| {
                let value = recover(downcast::<E>(payload));
                Box::new(value)
            })),
        );
        self
    }

    /// Supply a mandatory or optional context value for matched `Ctx`/`Opt` effects
    /// named `name`. Context values are read-only capabilities (§5) that may be
    /// requested more than once, hence the `Clone` bound.
    pub fn ctx<T: Clone + Send + 'static>(mut self, name: impl Into<Name>, value: T) -> Self {
        self.entries.insert(
            name.into(),
            HandlerEntry::Context(Box::new(move || Box::new(value.clone()))),
        );
        self
    }
}

/// Wrap `input` so that descriptors named in `handlers` are intercepted locally and
/// everything else is re-yielded unchanged (§4.1, §6: "`try(input).handle(handlerMap)`").
///
/// The result is itself a [`Computation<R>`] -- the same step/resume/forward loop
/// [`crate::outcome::wrap`] and [`crate::scheduler::drive`] use, driving `input` and
/// forwarding unmatched effects through its own [`Suspend`] -- so it plugs directly
/// into `run_sync`/`run_async`, and two handler maps stack by calling `try_` twice:
/// `try_(try_(g, h1), h2)` observes exactly the same effects as `try_(g, h1 ∪ h2)`
/// would (§8 property 5), since the inner `try_`'s forwarded effects are simply what
/// the outer `try_` dispatches against next.
pub fn try_<R: Send + 'static>(input: Computation<R>, handlers: HandlerMap) -> Computation<R> {
    Computation::new(move |suspend| async move {
        let mut inner = input;
        let mut step = inner.start().await;
        loop {
            match step {
                Step::Done(value) => return value,
                Step::Yielded(effect) => match dispatch::<R>(&handlers, effect) {
                    Dispatch::Return(value) => {
                        inner.terminate();
                        return value;
                    }
                    Dispatch::Resume(resume) => {
                        step = inner.resume(resume).await;
                    }
                    Dispatch::Forward(effect) => {
                        let resume = suspend.perform(effect).await;
                        step = inner.resume(resume).await;
                    }
                },
            }
        }
    })
}

fn dispatch<R: 'static>(handlers: &HandlerMap, effect: Effect) -> Dispatch<R> {
    match effect {
        Effect::Err(err) => match handlers.entries.get(&err.name) {
            Some(HandlerEntry::Recover(recover)) => {
                trace!("effectual: recovering '{}' locally", err.name);
                Dispatch::Return(downcast(recover(err.error)))
            }
            Some(HandlerEntry::Context(_)) => {
                panic!(
                    "effectual: '{}' is registered as a context handler but was yielded as Err",
                    err.name
                )
            }
            None => Dispatch::Forward(Effect::Err(err)),
        },
        Effect::Ctx(ctx) => match handlers.entries.get(&ctx.name) {
            Some(HandlerEntry::Context(make)) => {
                trace!("effectual: resolving '{}' locally", ctx.name);
                Dispatch::Resume(Resume::Value(make()))
            }
            Some(HandlerEntry::Recover(_)) => {
                panic!(
                    "effectual: '{}' is registered as an error handler but was yielded as Ctx/Opt",
                    ctx.name
                )
            }
            None => Dispatch::Forward(Effect::Ctx(ctx)),
        },
        other @ (Effect::Async(_) | Effect::Msg(_)) => Dispatch::Forward(other),
    }
}

enum Dispatch<R> {
    Return(R),
    Resume(Resume),
    Forward(Effect),
}

/// Run `body`, providing `suspend` for use by smart constructors, immediately
/// wrapped with `handlers` via [`try_`] -- the common case of `try(() => { ... })
/// .handle({ ... })` where the body is written inline rather than built ahead of
/// time as a standalone [`Computation`].
pub fn try_with<R, F, Fut>(handlers: HandlerMap, body: F) -> Computation<R>
where
    R: Send + 'static,
    F: FnOnce(Suspend) -> Fut,
    Fut: std::future::Future<Output = R> + Send + 'static,
{
    try_(Computation::new(body), handlers)
}
