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

//! The coroutine protocol: a lazy, resumable, finite sequence of [`Effect`] yields
//! terminating in a return value (§3, "Coroutine `Actor<Y,R>`").
//!
//! Rust has no stable native generator, so a [`Computation`] is an ordinary `async`
//! block driven through a `Suspend`/`Mailbox` handshake: one slot for the value being
//! yielded out, one for the value being resumed in, with the invariant that exactly
//! one side is ever polling at a time. This lets user code read like a generator
//! function (`fib.perform(effect).await`) without requiring unstable language
//! features. See SPEC_FULL.md §10.1 for the full rationale, including why early
//! termination is realized as `Drop` rather than an explicit protocol message.

use std::cell::UnsafeCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::effect::{downcast, AsyncEffect, CtxEffect, Effect, ErrEffect, MsgEffect, Payload, Resume};
use crate::error::EffectualError;

/// Shared between a [`Computation`] and the [`Suspend`] handle passed into its body.
///
/// Exactly two references to a given `Mailbox` ever exist: the `Computation` that
/// polls it, and the `Suspend` moved into the `async` body it drives. Both are only
/// ever touched while the `Computation` is being polled (never from two threads at
/// once, since polling is exclusive), which is what makes the `UnsafeCell` accesses
/// below sound -- the same argument used by generator-on-stable-futures crates in
/// the wider ecosystem.
struct Mailbox {
    yielded: UnsafeCell<Option<Effect>>,
    resumed: UnsafeCell<Option<Resume>>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Mailbox {
            yielded: UnsafeCell::new(None),
            resumed: UnsafeCell::new(None),
        }
    }
}

// Safety: see the `Mailbox` doc comment -- access is always serialized by the
// exclusive poll of the owning `Computation`.
unsafe impl Sync for Mailbox {}

/// The handle through which a running computation requests capabilities.
///
/// Moved by value into the `async` block passed to [`Computation::new`]; a user
/// program calls [`Suspend::perform`] (or one of the smart constructors in this
/// module that wrap it) at every point it needs to yield an [`Effect`].
pub struct Suspend {
    mailbox: Arc<Mailbox>,
}

impl Suspend {
    /// Yield `effect` to whatever is driving this computation and wait for the
    /// resumption value.
    pub async fn perform(&self, effect: Effect) -> Resume {
        {
            let cell = unsafe { &mut *self.mailbox.yielded.get() };
            assert!(
                cell.is_none(),
                "effectual: perform() called again before the previous yield was resumed"
            );
            *cell = Some(effect);
        }

        std::future::poll_fn(|_cx| {
            let slot = unsafe { &mut *self.mailbox.resumed.get() };
            match slot.take() {
                Some(resume) => Poll::Ready(resume),
                None => Poll::Pending,
            }
        })
        .await
    }
}

/// The outcome of stepping a [`Computation`] once: either it produced another
/// [`Effect`] to hand to whatever is driving it, or it has returned.
pub enum Step<R> {
    Yielded(Effect),
    Done(R),
}

/// A lazy, resumable, finite computation yielding [`Effect`]s and returning `R`.
///
/// This is the Rust rendering of the spec's `Actor<Y,R>`, specialized so `Y` is
/// always [`Effect`]: every interpreter, runner, and scheduler in this crate speaks
/// the same yield type, so they compose freely.
pub struct Computation<R> {
    mailbox: Arc<Mailbox>,
    body: Pin<Box<dyn Future<Output = R> + Send>>,
}

impl<R: Send + 'static> Computation<R> {
    /// Build a computation from a closure that receives a [`Suspend`] handle and
    /// returns the `async` body that will use it.
    ///
    /// Nothing runs until the computation is first stepped (`start`/`resume`) --
    /// this is the "lazy" half of the protocol.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Suspend) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let mailbox = Arc::new(Mailbox::default());
        let body = f(Suspend {
            mailbox: mailbox.clone(),
        });
        Computation {
            mailbox,
            body: Box::pin(body),
        }
    }

    /// Lift an already-final value into a computation that yields nothing.
    ///
    /// This is `result` from the source design (§4.2, §6: "`result(gen)`"): it
    /// lifts a plain value into the coroutine world.
    pub fn result(value: R) -> Self {
        Computation::new(move |_suspend| async move { value })
    }

    fn poll_step(&mut self, cx: &mut Context<'_>) -> Poll<Step<R>> {
        match self.body.as_mut().poll(cx) {
            Poll::Pending => {
                let slot = unsafe { &mut *self.mailbox.yielded.get() };
                match slot.take() {
                    Some(effect) => Poll::Ready(Step::Yielded(effect)),
                    None => Poll::Pending,
                }
            }
            Poll::Ready(value) => Poll::Ready(Step::Done(value)),
        }
    }

    /// Start (or continue running toward) the first yield or completion.
    ///
    /// Calling this more than once without an intervening `resume` simply polls the
    /// same suspension point again; it is how runners implement a tight "step until
    /// something interesting happens" loop.
    pub async fn start(&mut self) -> Step<R> {
        std::future::poll_fn(|cx| self.poll_step(cx)).await
    }

    /// Deliver `value` to the most recent suspension and drive to the next yield or
    /// completion.
    pub async fn resume(&mut self, value: Resume) -> Step<R> {
        {
            let slot = unsafe { &mut *self.mailbox.resumed.get() };
            *slot = Some(value);
        }
        self.start().await
    }

    /// Explicit early-termination primitive (§3, §5, §8 property 8).
    ///
    /// Implemented purely as `drop`: dropping the boxed `async` body runs the
    /// destructors of whatever it was holding at its suspension point, which is the
    /// Rust analogue of running outstanding `finally` blocks. Exposed as a named
    /// method so call sites can document *why* they are discarding a computation
    /// early, even though `drop(computation)` would do exactly the same thing.
    pub fn terminate(self) {
        drop(self)
    }
}

// --- Smart constructors (§6) -------------------------------------------------
//
// Each of these performs exactly one effect and downcasts the resumption value
// back to the caller's expected type. They are the coroutine-returning primitives
// the spec lists (`throw`, `get`, `await`, `send`, `wait`); user programs call them
// from within the `async` body passed to `Computation::new`.

/// Yield a named, typed failure and return whatever value resumes it.
///
/// In the usual case the resumption never arrives because the nearest matching
/// handler recovers by returning a value from the *outer* computation instead (see
/// [`crate::interpreter`]); if an outer handler instead chooses to resume with a
/// substitute, that value is downcast to `T` here.
pub async fn throw<T: Send + 'static>(
    suspend: &Suspend,
    name: impl Into<crate::effect::Name>,
    error: impl std::any::Any + Send + 'static,
) -> T {
    let resume = suspend
        .perform(Effect::Err(ErrEffect {
            name: name.into(),
            error: Box::new(error),
        }))
        .await;
    match resume.into_value() {
        Ok(payload) => downcast(payload),
        Err(e) => panic!("effectual: throw() resumed with a thrown error: {e}"),
    }
}

/// Request a mandatory context value by name.
pub async fn get<T: Send + 'static>(suspend: &Suspend, name: impl Into<crate::effect::Name>) -> T {
    let resume = suspend
        .perform(Effect::Ctx(CtxEffect {
            name: name.into(),
            optional: false,
        }))
        .await;
    match resume.into_value() {
        Ok(payload) => downcast(payload),
        Err(e) => panic!("effectual: get() resumed with a thrown error: {e}"),
    }
}

/// Request an optional context value by name; `None` if nothing supplies it by the
/// time a runner is reached (§3: "`Opt` is the only descriptor the outer runner is
/// allowed to resolve silently").
pub async fn get_opt<T: Send + 'static>(
    suspend: &Suspend,
    name: impl Into<crate::effect::Name>,
) -> Option<T> {
    let resume = suspend
        .perform(Effect::Ctx(CtxEffect {
            name: name.into(),
            optional: true,
        }))
        .await;
    match resume {
        Resume::Unit => None,
        other => match other.into_value() {
            Ok(payload) => Some(downcast(payload)),
            Err(e) => panic!("effectual: get_opt() resumed with a thrown error: {e}"),
        },
    }
}

/// Suspend until `future` settles, resuming with its output or propagating a
/// rejection as an `Err` delivered at this `.await` point.
pub async fn await_effect<T: Send + 'static>(
    suspend: &Suspend,
    future: impl Future<Output = T> + Send + 'static,
) -> Result<T, EffectualError> {
    let boxed_future: crate::effect::BoxFuture = Box::pin(async move {
        let value: Payload = Box::new(future.await);
        value
    });
    let resume = suspend
        .perform(Effect::Async(AsyncEffect {
            future: boxed_future,
        }))
        .await;
    resume.into_value().map(downcast)
}

/// Send `message` on mailbox `name` (rendezvous-only; see [`crate::rendezvous`]).
pub async fn send<T: Send + 'static>(
    suspend: &Suspend,
    name: impl Into<crate::effect::Name>,
    message: T,
) -> Result<(), EffectualError> {
    let resume = suspend
        .perform(Effect::Msg(MsgEffect {
            name: name.into(),
            message: Some(Box::new(message)),
        }))
        .await;
    match resume {
        Resume::Thrown(e) => Err(e),
        _ => Ok(()),
    }
}

/// Wait for a message on mailbox `name` (rendezvous-only; see [`crate::rendezvous`]).
pub async fn wait<T: Send + 'static>(
    suspend: &Suspend,
    name: impl Into<crate::effect::Name>,
) -> Result<T, EffectualError> {
    let resume = suspend
        .perform(Effect::Msg(MsgEffect {
            name: name.into(),
            message: None,
        }))
        .await;
    resume.into_value().map(downcast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::Resume;

    #[tokio::test]
    async fn result_yields_nothing_and_returns_immediately() {
        let mut c = Computation::result(42);
        match c.start().await {
            Step::Done(v) => assert_eq!(v, 42),
            Step::Yielded(_) => panic!("result() must not yield"),
        }
    }

    #[tokio::test]
    async fn perform_round_trips_a_value() {
        let mut c = Computation::new(|suspend| async move {
            let x: i32 = get(&suspend, "N").await;
            let y: i32 = get(&suspend, "M").await;
            x * y
        });

        match c.start().await {
            Step::Yielded(Effect::Ctx(ctx)) => assert_eq!(ctx.name, "N"),
            _ => panic!("expected a Ctx yield for N"),
        }
        match c.resume(Resume::Value(Box::new(6i32))).await {
            Step::Yielded(Effect::Ctx(ctx)) => assert_eq!(ctx.name, "M"),
            _ => panic!("expected a Ctx yield for M"),
        }
        match c.resume(Resume::Value(Box::new(7i32))).await {
            Step::Done(v) => assert_eq!(v, 42),
            Step::Yielded(_) => panic!("expected completion"),
        }
    }

    #[tokio::test]
    async fn early_termination_runs_destructors() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        struct Guard(Arc<AtomicBool>);
        impl Drop for Guard {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let ran = Arc::new(AtomicBool::new(false));
        let guard_ran = ran.clone();

        let mut c = Computation::new(move |suspend| async move {
            let _guard = Guard(guard_ran);
            let _: i32 = get(&suspend, "never-supplied").await;
            unreachable!("must not resume past termination")
        });

        match c.start().await {
            Step::Yielded(Effect::Ctx(_)) => {}
            _ => panic!("expected a Ctx yield"),
        }

        c.terminate();
        assert!(ran.load(Ordering::SeqCst), "dropping mid-suspension must run the guard");
    }
}
