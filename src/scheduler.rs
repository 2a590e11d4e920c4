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

//! The task scheduler (§4.4): run up to `max_concurrency` admitted tasks at a time,
//! feed each completed result to a handler in completion order, and return the
//! handler's outcome.
//!
//! Only `Async` yields ever run concurrently -- every other effect an admitted task
//! yields is forwarded through the scheduler's own [`Suspend`], one at a time, which
//! both matches the single-threaded cooperative model (§5) and means an enclosing
//! `try`/`handle` can recover a task's `Err` the same way it recovers any other
//! coroutine's: by dropping this call's local state (every not-yet-finished task)
//! on the way out, which is exactly the cleanup §4.4 calls for.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use log::trace;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::coroutine::{Computation, Step, Suspend};
use crate::effect::{BoxFuture, Effect, Payload, Resume};
use crate::error::EffectualError;

/// One completed task's result, tagged with its admission index (§4.4: `{index,
/// value}`).
pub struct Indexed<R> {
    pub index: usize,
    pub value: R,
}

/// The stream a `concurrent`/`series`/`parallel` handler reads completed tasks from.
pub type ResultStream<R> = UnboundedReceiverStream<Indexed<R>>;

/// Scheduler configuration. `max_concurrency` is, per §4.4, "the only recognised
/// option"; unset means unbounded.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConcurrencyOptions {
    max_concurrency: Option<usize>,
}

impl ConcurrencyOptions {
    pub fn new() -> Self {
        ConcurrencyOptions::default()
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    fn resolve(self) -> Result<usize, EffectualError> {
        match self.max_concurrency {
            None => Ok(usize::MAX),
            Some(0) => Err(EffectualError::InvalidConcurrency { requested: 0 }),
            Some(n) => Ok(n),
        }
    }
}

/// Lifts a plain value, a thunk, or an already-built coroutine into a
/// [`Computation`] (§4.4: `fromTuple`/`fromObject`).
pub enum Lift<R> {
    Value(R),
    Thunk(Box<dyn FnOnce() -> Computation<R> + Send>),
    Computation(Computation<R>),
}

impl<R: Send + 'static> Lift<R> {
    fn into_computation(self) -> Computation<R> {
        match self {
            Lift::Value(value) => Computation::result(value),
            Lift::Thunk(thunk) => thunk(),
            Lift::Computation(computation) => computation,
        }
    }
}

type Settlement = Pin<Box<dyn Future<Output = (usize, Payload)> + Send>>;

enum TaskStep<R> {
    Finished(R),
    Awaiting(Computation<R>, BoxFuture),
}

/// Step `computation` until it yields `Async` or returns, forwarding every other
/// effect through `suspend` one at a time (§4.4 step 3).
async fn drive<R: Send + 'static>(
    suspend: &Suspend,
    mut computation: Computation<R>,
    mut pending_resume: Option<Resume>,
) -> TaskStep<R> {
    loop {
        let step = match pending_resume.take() {
            Some(resume) => computation.resume(resume).await,
            None => computation.start().await,
        };
        match step {
            Step::Done(value) => return TaskStep::Finished(value),
            Step::Yielded(Effect::Async(ae)) => return TaskStep::Awaiting(computation, ae.future),
            Step::Yielded(other) => {
                trace!("scheduler: forwarding a '{}' effect from an admitted task", other.kind());
                pending_resume = Some(suspend.perform(other).await);
            }
        }
    }
}

async fn admit<R: Send + 'static>(
    suspend: &Suspend,
    index: usize,
    computation: Computation<R>,
    active: &mut HashMap<usize, Computation<R>>,
    outstanding: &mut FuturesUnordered<Settlement>,
    result_tx: &mpsc::UnboundedSender<Indexed<R>>,
) {
    match drive(suspend, computation, None).await {
        TaskStep::Finished(value) => {
            let _ = result_tx.send(Indexed { index, value });
        }
        TaskStep::Awaiting(computation, future) => {
            active.insert(index, computation);
            outstanding.push(Box::pin(async move { (index, future.await) }));
        }
    }
}

async fn settle<R: Send + 'static>(
    suspend: &Suspend,
    index: usize,
    payload: Payload,
    active: &mut HashMap<usize, Computation<R>>,
    outstanding: &mut FuturesUnordered<Settlement>,
    result_tx: &mpsc::UnboundedSender<Indexed<R>>,
) {
    let computation = active
        .remove(&index)
        .expect("scheduler: settled an Async future for an index with no active task");
    match drive(suspend, computation, Some(Resume::Value(payload))).await {
        TaskStep::Finished(value) => {
            let _ = result_tx.send(Indexed { index, value });
        }
        TaskStep::Awaiting(computation, future) => {
            active.insert(index, computation);
            outstanding.push(Box::pin(async move { (index, future.await) }));
        }
    }
}

async fn refill<R, P>(
    suspend: &Suspend,
    producer: &mut P,
    next_index: &mut usize,
    max_concurrency: usize,
    active: &mut HashMap<usize, Computation<R>>,
    outstanding: &mut FuturesUnordered<Settlement>,
    result_tx: &mpsc::UnboundedSender<Indexed<R>>,
) where
    R: Send + 'static,
    P: Iterator<Item = Computation<R>>,
{
    while active.len() < max_concurrency {
        match producer.next() {
            Some(computation) => {
                let index = *next_index;
                *next_index += 1;
                admit(suspend, index, computation, active, outstanding, result_tx).await;
            }
            None => break,
        }
    }
}

/// Run up to `options.max_concurrency` tasks from `source` at a time, feeding each
/// completed result into `handler`'s stream in completion order, and return the
/// handler's outcome (§4.4, §6: `concurrent(source, handler, opts?)`).
///
/// `suspend` must belong to the computation this call runs inside of -- every
/// non-`Async` effect an admitted task yields is forwarded through it exactly as if
/// this call's own body had yielded it, so an enclosing `try`/`handle` sees through
/// the scheduler as if it weren't there.
pub async fn concurrent<R, H, Fut, HR>(
    suspend: &Suspend,
    source: impl IntoIterator<Item = Computation<R>>,
    options: ConcurrencyOptions,
    handler: H,
) -> Result<HR, EffectualError>
where
    R: Send + 'static,
    H: FnOnce(ResultStream<R>) -> Fut,
    Fut: Future<Output = HR>,
{
    let max_concurrency = options.resolve()?;
    let mut producer = source.into_iter();
    let mut next_index = 0usize;
    let mut active: HashMap<usize, Computation<R>> = HashMap::new();
    let mut outstanding: FuturesUnordered<Settlement> = FuturesUnordered::new();
    let (result_tx, result_rx) = mpsc::unbounded_channel();
    let stream = UnboundedReceiverStream::new(result_rx);

    refill(
        suspend,
        &mut producer,
        &mut next_index,
        max_concurrency,
        &mut active,
        &mut outstanding,
        &result_tx,
    )
    .await;

    let handler_fut = handler(stream);
    tokio::pin!(handler_fut);

    let outcome = loop {
        if active.is_empty() {
            // No admitted task remains and the producer is exhausted (the only way
            // `refill` leaves `active` empty), so no further result will ever be
            // sent. Drop the sender now or a handler draining the stream to
            // closation (`all`, `series`) would await a channel that never closes.
            drop(result_tx);
            break (&mut handler_fut).await;
        }
        tokio::select! {
            biased;
            output = &mut handler_fut => break output,
            Some((index, payload)) = outstanding.next() => {
                settle(suspend, index, payload, &mut active, &mut outstanding, &result_tx).await;
                refill(
                    suspend,
                    &mut producer,
                    &mut next_index,
                    max_concurrency,
                    &mut active,
                    &mut outstanding,
                    &result_tx,
                )
                .await;
            }
        }
    };

    // Any task still in `active` (the handler returned early, e.g. `race`) drops
    // here, which is this scheduler's early-termination primitive: Drop runs every
    // in-flight task's outstanding cleanup (§4.4 step 6, §5 "resource discipline").
    Ok(outcome)
}

/// `concurrent` with `max_concurrency = 1`: tasks execute strictly in source order
/// (§4.4: `series`).
pub async fn series<R, H, Fut, HR>(
    suspend: &Suspend,
    source: impl IntoIterator<Item = Computation<R>>,
    handler: H,
) -> Result<HR, EffectualError>
where
    R: Send + 'static,
    H: FnOnce(ResultStream<R>) -> Fut,
    Fut: Future<Output = HR>,
{
    concurrent(suspend, source, ConcurrencyOptions::new().max_concurrency(1), handler).await
}

/// `concurrent` with unbounded concurrency (§4.4: `parallel`).
pub async fn parallel<R, H, Fut, HR>(
    suspend: &Suspend,
    source: impl IntoIterator<Item = Computation<R>>,
    handler: H,
) -> Result<HR, EffectualError>
where
    R: Send + 'static,
    H: FnOnce(ResultStream<R>) -> Fut,
    Fut: Future<Output = HR>,
{
    concurrent(suspend, source, ConcurrencyOptions::new(), handler).await
}

/// Drain the stream into an index-aligned output vector, restoring source order
/// (§4.4: `all(source, opts?)`).
pub async fn all<R: Send + 'static>(
    suspend: &Suspend,
    source: impl IntoIterator<Item = Computation<R>>,
    options: ConcurrencyOptions,
) -> Result<Vec<R>, EffectualError> {
    concurrent(suspend, source, options, |mut stream| async move {
        let mut slots: Vec<Option<R>> = Vec::new();
        while let Some(Indexed { index, value }) = stream.next().await {
            if index >= slots.len() {
                slots.resize_with(index + 1, || None);
            }
            slots[index] = Some(value);
        }
        slots
            .into_iter()
            .map(|slot| slot.expect("all: an admitted index never produced a result"))
            .collect::<Vec<R>>()
    })
    .await
}

/// Return the first observed value and discard the rest; remaining tasks are
/// terminated as soon as this call returns (§4.4: `race(source, opts?)`).
pub async fn race<R: Send + 'static>(
    suspend: &Suspend,
    source: impl IntoIterator<Item = Computation<R>>,
    options: ConcurrencyOptions,
) -> Result<R, EffectualError> {
    concurrent(suspend, source, options, |mut stream| async move {
        stream
            .next()
            .await
            .expect("race: source produced no tasks")
            .value
    })
    .await
}

/// Lift a homogeneous sequence of values/thunks/coroutines into [`all`], preserving
/// position (§4.4, §6: `fromTuple`; Rust has no heterogeneous tuple analogue of the
/// source language's, so this operates on same-typed items -- see DESIGN.md).
pub async fn from_tuple<R: Send + 'static>(
    suspend: &Suspend,
    items: Vec<Lift<R>>,
    options: ConcurrencyOptions,
) -> Result<Vec<R>, EffectualError> {
    let source = items.into_iter().map(Lift::into_computation);
    all(suspend, source, options).await
}

/// Lift a keyed bag of values/thunks/coroutines into an equally-keyed result map
/// (§4.4, §6: `fromObject`).
pub async fn from_object<K, R>(
    suspend: &Suspend,
    items: HashMap<K, Lift<R>>,
    options: ConcurrencyOptions,
) -> Result<HashMap<K, R>, EffectualError>
where
    K: Eq + Hash + Clone + Send + 'static,
    R: Send + 'static,
{
    let mut keys = Vec::with_capacity(items.len());
    let mut source = Vec::with_capacity(items.len());
    for (key, lift) in items {
        keys.push(key);
        source.push(lift.into_computation());
    }
    let values = all(suspend, source, options).await?;
    Ok(keys.into_iter().zip(values).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::{await_effect, throw};

    fn unit(value: i32) -> Computation<i32> {
        Computation::result(value)
    }

    #[tokio::test]
    async fn all_restores_source_order() {
        let outer = Computation::new(|suspend| async move {
            all(&suspend, vec![unit(1), unit(2), unit(3)], ConcurrencyOptions::new())
                .await
                .unwrap()
        });
        let mut outer = outer;
        match outer.start().await {
            Step::Done(values) => assert_eq!(values, vec![1, 2, 3]),
            Step::Yielded(_) => panic!("no effects expected"),
        }
    }

    #[tokio::test]
    async fn all_awaits_async_tasks_concurrently() {
        let tasks = vec![
            Computation::new(|suspend| async move {
                await_effect(&suspend, async { 10 }).await.unwrap()
            }),
            Computation::new(|suspend| async move {
                await_effect(&suspend, async { 20 }).await.unwrap()
            }),
        ];
        let outer = Computation::new(move |suspend| async move {
            all(&suspend, tasks, ConcurrencyOptions::new()).await.unwrap()
        });
        let mut outer = outer;
        match outer.start().await {
            Step::Done(values) => assert_eq!(values, vec![10, 20]),
            Step::Yielded(_) => panic!("no effects expected"),
        }
    }

    #[tokio::test]
    async fn series_caps_concurrency_at_one() {
        let outer = Computation::new(|suspend| async move {
            series(&suspend, vec![unit(1), unit(2)], |mut stream| async move {
                let mut out = Vec::new();
                while let Some(item) = stream.next().await {
                    out.push(item.value);
                }
                out
            })
            .await
            .unwrap()
        });
        let mut outer = outer;
        match outer.start().await {
            Step::Done(values) => assert_eq!(values.len(), 2),
            Step::Yielded(_) => panic!("no effects expected"),
        }
    }

    #[tokio::test]
    async fn an_unmatched_err_from_a_task_is_forwarded_to_the_enclosing_handler() {
        let handlers = crate::interpreter::HandlerMap::new().err("boom", |_e: i32| 7i32);
        let mut handled = crate::interpreter::try_with(handlers, |suspend| async move {
            let failing: Computation<i32> = Computation::new(|suspend| async move {
                throw(&suspend, "boom", 1i32).await
            });
            all(&suspend, vec![failing], ConcurrencyOptions::new())
                .await
                .map(|v| v.into_iter().sum())
                .unwrap_or(-1)
        });

        match handled.start().await {
            Step::Done(value) => assert_eq!(value, 7),
            Step::Yielded(_) => panic!("the handler map above should recover locally"),
        }
    }

    #[tokio::test]
    async fn race_returns_first_and_drops_the_rest() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        struct Guard(Arc<AtomicBool>);
        impl Drop for Guard {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let cleaned_up = Arc::new(AtomicBool::new(false));
        let guard_flag = cleaned_up.clone();

        let outer = Computation::new(move |suspend| async move {
            let fast = Computation::new(|suspend| async move {
                await_effect(&suspend, async { 1 }).await.unwrap()
            });
            // Never settles; only its `Guard` proves the scheduler dropped it.
            let slow: Computation<i32> = Computation::new(move |suspend| async move {
                let _guard = Guard(guard_flag);
                await_effect(&suspend, futures::future::pending::<i32>())
                    .await
                    .unwrap()
            });

            race(&suspend, vec![fast, slow], ConcurrencyOptions::new())
                .await
                .unwrap()
        });
        let mut outer = outer;
        match outer.start().await {
            Step::Done(value) => assert_eq!(value, 1),
            Step::Yielded(_) => panic!("no effects expected"),
        }
        assert!(cleaned_up.load(Ordering::SeqCst), "race must terminate the losing task");
    }
}
