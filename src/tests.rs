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

//! End-to-end scenarios (E1-E7). Unit tests for a single module's own internals
//! live beside that module instead; this file is for behavior that only shows up
//! once several modules are wired together.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::coroutine::{get, get_opt, throw, Computation};
use crate::error::{EffectualError, RendezvousError};
use crate::interpreter::{try_, HandlerMap};
use crate::rendezvous::communicate;
use crate::runner::run_sync;
use crate::scheduler::{race, ConcurrencyOptions};

#[test]
fn e1_error_recovery() {
    let computation: Computation<String> = Computation::new(|suspend| async move {
        let _: String = throw(&suspend, "V", "need id".to_string()).await;
        unreachable!("recovery short-circuits before this runs")
    });
    let handled = try_(
        computation,
        HandlerMap::new().err("V", |e: String| format!("caught:{e}")),
    );
    let result = run_sync(handled).unwrap();
    assert_eq!(result, "caught:need id");
}

#[test]
fn e2_context() {
    let computation = Computation::new(|suspend| async move {
        let a: i32 = get(&suspend, "N").await;
        let b: i32 = get(&suspend, "M").await;
        a * b
    });
    let handled = try_(computation, HandlerMap::new().ctx("N", 6i32).ctx("M", 7i32));
    let result = run_sync(handled).unwrap();
    assert_eq!(result, 42);
}

#[test]
fn e3_optional_absent() {
    let computation = Computation::new(|suspend| async move {
        let x: Option<String> = get_opt(&suspend, "T").await;
        x.unwrap_or_else(|| "d".to_string())
    });
    assert_eq!(run_sync(computation).unwrap(), "d");
}

#[tokio::test]
async fn e4_race_cleanup() {
    let cleaned_up = Arc::new(AtomicUsize::new(0));
    let guard_flag = cleaned_up.clone();

    let outer = Computation::new(move |suspend| async move {
        let fast = Computation::new(|suspend| async move {
            crate::coroutine::await_effect(&suspend, async { "fast" })
                .await
                .unwrap()
        });
        let slow: Computation<&'static str> = Computation::new(move |suspend| async move {
            struct Guard(Arc<AtomicUsize>);
            impl Drop for Guard {
                fn drop(&mut self) {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
            let _guard = Guard(guard_flag);
            crate::coroutine::await_effect(&suspend, async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                "slow"
            })
            .await
            .unwrap()
        });

        race(&suspend, vec![fast, slow], ConcurrencyOptions::new())
            .await
            .unwrap()
    });
    let mut outer = outer;
    match outer.start().await {
        crate::coroutine::Step::Done(value) => assert_eq!(value, "fast"),
        crate::coroutine::Step::Yielded(_) => panic!("no effects expected at this level"),
    }
    assert_eq!(cleaned_up.load(Ordering::SeqCst), 1, "the slow task's finally must run");
}

#[tokio::test]
async fn e5_bounded_concurrency() {
    let _ = env_logger::try_init();

    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<Computation<usize>> = (0..4)
        .map(|i| {
            let in_flight = in_flight.clone();
            let max_observed = max_observed.clone();
            Computation::new(move |suspend| async move {
                crate::coroutine::await_effect(&suspend, async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    i
                })
                .await
                .unwrap()
            })
        })
        .collect();

    let outer = Computation::new(move |suspend| async move {
        crate::scheduler::all(&suspend, tasks, ConcurrencyOptions::new().max_concurrency(2))
            .await
            .unwrap()
    });
    let mut outer = outer;
    match outer.start().await {
        crate::coroutine::Step::Done(mut results) => {
            results.sort_unstable();
            assert_eq!(results, vec![0, 1, 2, 3]);
        }
        crate::coroutine::Step::Yielded(_) => panic!("no effects expected at this level"),
    }
    assert!(max_observed.load(Ordering::SeqCst) <= 2, "max_concurrency must cap in-flight tasks");
}

#[tokio::test]
async fn e6_rendezvous() {
    let mut participants: HashMap<&'static str, Computation<String>> = HashMap::new();
    participants.insert(
        "sender",
        Computation::new(|suspend| async move {
            crate::coroutine::send(&suspend, "Greeting", "hi".to_string())
                .await
                .unwrap();
            "s".to_string()
        }),
    );
    participants.insert(
        "receiver",
        Computation::new(|suspend| async move {
            let m: String = crate::coroutine::wait(&suspend, "Greeting").await.unwrap();
            format!("r:{m}")
        }),
    );

    let results = communicate(participants).await.unwrap();
    assert_eq!(results["sender"], "s");
    assert_eq!(results["receiver"], "r:hi");
}

#[tokio::test]
async fn e7_rendezvous_diagnostic() {
    let mut participants: HashMap<&'static str, Computation<String>> = HashMap::new();
    participants.insert(
        "sender",
        Computation::new(|suspend| async move {
            match crate::coroutine::send(&suspend, "Greeting", "hi".to_string()).await {
                Ok(()) => "s".to_string(),
                Err(e) => e.to_string(),
            }
        }),
    );

    let results = communicate(participants).await.unwrap();
    assert_eq!(
        results["sender"],
        "Message 'Greeting' sent by 'sender' was not received"
    );
}

#[test]
fn unwrap_of_wrap_observes_the_same_outcome_as_the_original() {
    use crate::outcome::{unwrap, wrap};

    // Recovering: wrap/unwrap round-trips a computation that returns normally.
    let recovering = Computation::new(|suspend| async move {
        let a: i32 = get(&suspend, "N").await;
        a + 1
    });
    let roundtripped = unwrap(wrap(recovering));
    let handled = try_(roundtripped, HandlerMap::new().ctx("N", 41i32));
    let value = run_sync(handled).unwrap();
    assert_eq!(value, 42);

    // Failing: the re-yielded Err is still observable by an enclosing handler,
    // exactly as if wrap/unwrap had never been in the chain.
    let failing: Computation<String> = Computation::new(|suspend| async move {
        throw(&suspend, "V", "boom".to_string()).await
    });
    let roundtripped = unwrap(wrap(failing));
    let handled = try_(roundtripped, HandlerMap::new().err("V", |e: String| format!("caught:{e}")));
    let value = run_sync(handled).unwrap();
    assert_eq!(value, "caught:boom");
}

#[test]
fn unhandled_context_is_a_fatal_missing_context_error() {
    let computation = Computation::new(|suspend| async move {
        let _: i32 = get(&suspend, "absent").await;
        0i32
    });
    match run_sync(computation) {
        Err(EffectualError::MissingContext { name }) => assert_eq!(name, "absent"),
        other => panic!("expected MissingContext, got {other:?}"),
    }
}

#[test]
fn stranded_mailbox_is_reported_with_its_name_and_key() {
    let error = RendezvousError::NotSent {
        name: "Greeting".to_string(),
        key: "receiver".to_string(),
    };
    assert_eq!(error.to_string(), "Message 'Greeting' waited by 'receiver' was not sent");
}
