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

//! A small, composable effect runtime for coroutine-style computations.
//!
//! A [`Computation`](coroutine::Computation) is an `async` body that requests
//! capabilities by yielding an [`Effect`](effect::Effect) -- a typed failure
//! (`Err`), a context lookup (`Ctx`/`Opt`), an asynchronous suspension (`Async`), or
//! a rendezvous message (`Msg`) -- instead of calling the capability directly.
//! [`interpreter::try_`] intercepts named effects locally; [`runner::run_sync`] and
//! [`runner::run_async`] sit at the bottom of the stack and turn whatever is left
//! into a concrete value or a fatal [`error::EffectualError`];
//! [`scheduler::concurrent`] and friends run many computations at once;
//! [`rendezvous::communicate`] runs a named bag of them under a synchronous
//! send/wait protocol.
//!
//! ```
//! use effectual::prelude::*;
//!
//! let computation = Computation::new(|suspend| async move {
//!     let limit: i32 = get(&suspend, "limit").await;
//!     limit * 2
//! });
//!
//! let handled = try_(computation, HandlerMap::new().ctx("limit", 21i32));
//! let result = run_sync(handled);
//! # assert_eq!(result.unwrap(), 42);
//! ```

pub mod coroutine;
pub mod effect;
pub mod error;
pub mod interpreter;
pub mod outcome;
pub mod prelude;
pub mod rendezvous;
pub mod runner;
pub mod scheduler;

pub use coroutine::Computation;
pub use effect::Effect;
pub use error::EffectualError;
pub use interpreter::{try_, try_with, HandlerMap};
pub use outcome::Outcome;
pub use rendezvous::communicate;
pub use runner::{run_async, run_sync};
pub use scheduler::{all, concurrent, parallel, race, series, ConcurrencyOptions};

#[cfg(test)]
mod tests;
