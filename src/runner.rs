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

//! Runners: the only places a computation is driven without an enclosing handler
//! map (§4.3). A runner is the bottom of the stack -- whatever it doesn't resolve
//! itself is a fatal [`EffectualError`].

use log::debug;

use crate::coroutine::{Computation, Step};
use crate::effect::{Effect, Resume};
use crate::error::EffectualError;

/// Drive `computation` to completion, resolving `Opt` with "no value" and treating
/// every other yield as fatal (§4.3: "`runSync(G)`").
///
/// This is the runner with no suspension point: an `Async` yield here means the
/// caller built a computation that needs an executor it didn't get one from, which
/// is always a programmer error, never a recoverable one.
pub fn run_sync<R: Send + 'static>(mut computation: Computation<R>) -> Result<R, EffectualError> {
    futures::executor::block_on(async {
        let mut step = computation.start().await;
        loop {
            step = match step {
                Step::Done(value) => {
                    return Ok(value);
                }
                Step::Yielded(Effect::Ctx(ctx)) if ctx.optional => {
                    debug!("run_sync: resolving optional context '{}' with no value", ctx.name);
                    computation.resume(Resume::Unit).await
                }
                Step::Yielded(effect) => {
                    let name = effect.name().map(|n| n.clone().into_owned());
                    computation.terminate();
                    return Err(fatal_for(effect.kind(), name));
                }
            };
        }
    })
}

/// Drive `computation` to completion, additionally honouring `Async` yields by
/// awaiting their future on the ambient async executor (§4.3: "`runAsync(G)`").
///
/// A rejected future is thrown back into the computation rather than failing the
/// runner outright, matching the source design's "on rejection it throws-into `G`
/// with the reason" -- in this crate an `Async` future never rejects at the type
/// level (its output is a plain value), so the throwing path is reserved for
/// failures a caller encodes explicitly inside the future itself (e.g. by yielding
/// an `Err` once control returns to the computation).
pub async fn run_async<R: Send + 'static>(mut computation: Computation<R>) -> Result<R, EffectualError> {
    let mut step = computation.start().await;
    loop {
        step = match step {
            Step::Done(value) => return Ok(value),
            Step::Yielded(Effect::Ctx(ctx)) if ctx.optional => {
                debug!("run_async: resolving optional context '{}' with no value", ctx.name);
                computation.resume(Resume::Unit).await
            }
            Step::Yielded(Effect::Async(async_effect)) => {
                let value = async_effect.future.await;
                computation.resume(Resume::Value(value)).await
            }
            Step::Yielded(effect) => {
                let name = effect.name().map(|n| n.clone().into_owned());
                computation.terminate();
                return Err(fatal_for(effect.kind(), name));
            }
        };
    }
}

fn fatal_for(kind: &'static str, name: Option<String>) -> EffectualError {
    match (kind, name) {
        ("err", Some(name)) => EffectualError::UnhandledError { name },
        ("ctx", Some(name)) => EffectualError::MissingContext { name },
        ("msg", _) => EffectualError::UnexpectedEffect { name: "msg" },
        (kind, _) => EffectualError::UnexpectedSuspension { name: kind },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::{get_opt, throw};

    #[test]
    fn run_sync_resolves_opt_as_no_value() {
        let computation = Computation::new(|suspend| async move {
            let v: Option<i32> = get_opt(&suspend, "maybe").await;
            v.is_none()
        });
        assert!(run_sync(computation).unwrap());
    }

    #[test]
    fn run_sync_fails_fatally_on_unhandled_err() {
        let computation: Computation<i32> = Computation::new(|suspend| async move {
            throw(&suspend, "boom", 1i32).await
        });
        match run_sync(computation) {
            Err(EffectualError::UnhandledError { name }) => assert_eq!(name, "boom"),
            other => panic!("expected UnhandledError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_async_honours_async_yields() {
        let computation = Computation::new(|suspend| async move {
            crate::coroutine::await_effect(&suspend, async { 1 + 1 })
                .await
                .unwrap()
        });
        assert_eq!(run_async(computation).await.unwrap(), 2);
    }
}
