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

//! Result transformers (§4.2): turning an `Err` effect from a thrown failure into an
//! ordinary returned value, and back again.

use crate::coroutine::Computation;
use crate::effect::{downcast, Effect, ErrEffect, Name, Payload};

/// The result of running a computation whose `Err` effects have been reified into
/// this type by [`wrap`], rather than left to propagate as a thrown failure.
pub enum Outcome<R> {
    /// The computation returned normally.
    Ok(R),
    /// The computation threw a named `Err` effect that `wrap` intercepted.
    Err { name: Name, error: Payload },
}

impl<R> Outcome<R> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_err(&self) -> bool {
        matches!(self, Outcome::Err { .. })
    }
}

/// Turn `input` into a computation that never yields `Err` and instead returns
/// [`Outcome::Err`] the first time one would have been thrown (§4.2: "`wrap(gen)`").
///
/// Every other effect `input` yields (`Ctx`, `Opt`, `Async`, `Msg`) passes through
/// unchanged -- the returned computation re-yields them itself, so it composes with
/// [`crate::interpreter::try_`] and the scheduler exactly like any other
/// [`Computation`]. `input` is driven, not consumed eagerly: nothing runs until the
/// wrapping computation is first stepped, preserving the "lazy" half of the protocol.
pub fn wrap<R: Send + 'static>(mut input: Computation<R>) -> Computation<Outcome<R>> {
    Computation::new(move |suspend| async move {
        let mut step = input.start().await;
        loop {
            match step {
                crate::coroutine::Step::Done(value) => return Outcome::Ok(value),
                crate::coroutine::Step::Yielded(Effect::Err(ErrEffect { name, error })) => {
                    input.terminate();
                    return Outcome::Err { name, error };
                }
                crate::coroutine::Step::Yielded(other) => {
                    let resume = suspend.perform(other).await;
                    step = input.resume(resume).await;
                }
            }
        }
    })
}

/// The inverse of [`wrap`]: given a computation that returns an [`Outcome`], produce
/// one that returns the plain value on [`Outcome::Ok`] and re-yields an `Err` effect
/// on [`Outcome::Err`], moving the failure back into the yield position (§4.2:
/// "`unwrap(gen)`").
pub fn unwrap<R: Send + 'static>(mut input: Computation<Outcome<R>>) -> Computation<R> {
    Computation::new(move |suspend| async move {
        let mut step = input.start().await;
        loop {
            match step {
                crate::coroutine::Step::Done(Outcome::Ok(value)) => return value,
                crate::coroutine::Step::Done(Outcome::Err { name, error }) => {
                    let resume = suspend.perform(Effect::Err(ErrEffect { name, error })).await;
                    return match resume.into_value() {
                        Ok(payload) => downcast(payload),
                        Err(e) => panic!("effectual: unwrap() resumed with a thrown error: {e}"),
                    };
                }
                crate::coroutine::Step::Yielded(other) => {
                    let resume = suspend.perform(other).await;
                    step = input.resume(resume).await;
                }
            }
        }
    })
}

/// Run `input` to completion, converting an intercepted `Err` into
/// [`crate::error::EffectualError::UnhandledError`] rather than letting it escape as a
/// thrown failure (§4.2, §6: "`runResult(input) = run(wrap(input))`" -- the
/// degenerate case where the caller wants a plain `Result` and no handler will ever
/// see the error).
pub async fn run_result<R: Send + 'static>(input: Computation<R>) -> crate::error::Result<R> {
    match crate::runner::run_async(wrap(input)).await? {
        Outcome::Ok(value) => Ok(value),
        Outcome::Err { name, .. } => Err(crate::error::EffectualError::UnhandledError {
            name: name.into_owned(),
        }),
    }
}
