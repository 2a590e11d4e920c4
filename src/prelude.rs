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

//! Everything a typical caller needs in scope: `use effectual::prelude::*;`.

pub use crate::coroutine::{await_effect, get, get_opt, send, throw, wait, Computation, Suspend};
pub use crate::effect::{Effect, Name, Resume};
pub use crate::error::{EffectualError, Result};
pub use crate::interpreter::{try_, try_with, HandlerMap};
pub use crate::outcome::{run_result, unwrap, wrap, Outcome};
pub use crate::rendezvous::communicate;
pub use crate::runner::{run_async, run_sync};
pub use crate::scheduler::{
    all, concurrent, from_object, from_tuple, parallel, race, series, ConcurrencyOptions, Indexed,
    Lift, ResultStream,
};
