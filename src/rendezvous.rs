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

//! `communicate`: run a named bag of coroutines to completion under a synchronous
//! send/wait protocol on named mailboxes (§4.5).

use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::hash::Hash;

use log::{debug, warn};

use crate::coroutine::{Computation, Step};
use crate::effect::{Effect, Name, Payload, Resume};
use crate::error::{EffectualError, RendezvousError};

/// A participant parked on a `Msg` yield: `message = Some(_)` is a pending send,
/// `None` a pending wait.
struct Suspended<R> {
    message: Option<Payload>,
    computation: Computation<R>,
}

/// Run every participant in `participants` to completion under the send/wait
/// protocol and return each one's value, keyed by participant name (§4.5, §6:
/// `communicate(map)`).
pub async fn communicate<K, R>(
    participants: HashMap<K, Computation<R>>,
) -> Result<HashMap<K, R>, EffectualError>
where
    K: Eq + Hash + Clone + Display + Send + 'static,
    R: Send + 'static,
{
    let mut queue: VecDeque<(K, Computation<R>, Option<Resume>)> = participants
        .into_iter()
        .map(|(key, computation)| (key, computation, None))
        .collect();
    let mut suspended: HashMap<K, Suspended<R>> = HashMap::new();
    let mut send_index: HashMap<Name, K> = HashMap::new();
    let mut wait_index: HashMap<Name, K> = HashMap::new();
    let mut results: HashMap<K, R> = HashMap::new();

    loop {
        // Advance every queued participant until it is suspended on send/wait or
        // has returned (§4.5 "Drain": the priming half of each pass).
        while let Some((key, mut computation, resume)) = queue.pop_front() {
            let step = match resume {
                Some(resume) => computation.resume(resume).await,
                None => computation.start().await,
            };
            match step {
                Step::Done(value) => {
                    results.insert(key, value);
                }
                Step::Yielded(Effect::Msg(msg)) => suspend_and_match(
                    key,
                    computation,
                    msg.name,
                    msg.message,
                    &mut suspended,
                    &mut send_index,
                    &mut wait_index,
                    &mut queue,
                ),
                Step::Yielded(other) => panic!(
                    "communicate: participant '{key}' yielded a non-Msg effect ('{}'); \
                     participants must resolve their other effects before being handed to communicate",
                    other.kind()
                ),
            }
        }

        // Every participant is now done or suspended. Walk what's left unmatched
        // and throw a diagnostic into each (§4.5 "Drain").
        let mut stranded_sends: Vec<Name> = send_index.keys().cloned().collect();
        let stranded_waits: Vec<Name> = wait_index.keys().cloned().collect();
        if stranded_sends.is_empty() && stranded_waits.is_empty() {
            break;
        }

        for name in stranded_sends.drain(..) {
            let key = send_index.remove(&name).expect("send index entry must still be present");
            let Suspended { computation, .. } =
                suspended.remove(&key).expect("a pending sender must be suspended");
            let error = RendezvousError::NotReceived {
                name: name.into_owned(),
                key: key.to_string(),
            };
            debug!("communicate: throwing NotReceived into '{key}'");
            queue.push_back((key, computation, Some(Resume::Thrown(EffectualError::Rendezvous(error)))));
        }
        for name in stranded_waits {
            let key = wait_index.remove(&name).expect("wait index entry must still be present");
            let Suspended { computation, .. } =
                suspended.remove(&key).expect("a pending waiter must be suspended");
            let error = RendezvousError::NotSent {
                name: name.into_owned(),
                key: key.to_string(),
            };
            debug!("communicate: throwing NotSent into '{key}'");
            queue.push_back((key, computation, Some(Resume::Thrown(EffectualError::Rendezvous(error)))));
        }
    }

    if !suspended.is_empty() {
        let stranded: Vec<String> = suspended.keys().map(|key| key.to_string()).collect();
        warn!("communicate: {} participant(s) never completed", stranded.len());
        for (_, Suspended { computation, .. }) in suspended {
            computation.terminate();
        }
        return Err(EffectualError::Rendezvous(RendezvousError::Stranded { stranded }));
    }

    Ok(results)
}

/// Record a participant's `Msg` yield and, if it matches an existing pending
/// operation on the same mailbox, resolve both sides immediately (§4.5
/// "Protocol").
fn suspend_and_match<K, R>(
    key: K,
    computation: Computation<R>,
    name: Name,
    message: Option<Payload>,
    suspended: &mut HashMap<K, Suspended<R>>,
    send_index: &mut HashMap<Name, K>,
    wait_index: &mut HashMap<Name, K>,
    queue: &mut VecDeque<(K, Computation<R>, Option<Resume>)>,
) where
    K: Eq + Hash + Clone,
    R: Send + 'static,
{
    match message {
        Some(message) => match wait_index.remove(&name) {
            Some(waiter_key) => {
                let Suspended { computation: waiter, .. } =
                    suspended.remove(&waiter_key).expect("waiter must be suspended");
                queue.push_back((waiter_key, waiter, Some(Resume::Value(message))));
                queue.push_back((key, computation, Some(Resume::Unit)));
            }
            None => {
                send_index.insert(name, key.clone());
                suspended.insert(key, Suspended { message: Some(message), computation });
            }
        },
        None => match send_index.remove(&name) {
            Some(sender_key) => {
                let Suspended { computation: sender, message, .. } =
                    suspended.remove(&sender_key).expect("sender must be suspended");
                let message = message.expect("a send entry always carries a message");
                queue.push_back((key, computation, Some(Resume::Value(message))));
                queue.push_back((sender_key, sender, Some(Resume::Unit)));
            }
            None => {
                wait_index.insert(name, key.clone());
                suspended.insert(key, Suspended { message: None, computation });
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::{send, wait};

    #[tokio::test]
    async fn a_matched_send_and_wait_exchange_a_message() {
        let mut participants: HashMap<&'static str, Computation<i32>> = HashMap::new();
        participants.insert(
            "producer",
            Computation::new(|suspend| async move {
                send(&suspend, "ping", 42i32).await.unwrap();
                1
            }),
        );
        participants.insert(
            "consumer",
            Computation::new(|suspend| async move {
                wait::<i32>(&suspend, "ping").await.unwrap()
            }),
        );

        let results = communicate(participants).await.unwrap();
        assert_eq!(results["producer"], 1);
        assert_eq!(results["consumer"], 42);
    }

    #[tokio::test]
    async fn an_unmatched_wait_is_thrown_a_diagnostic() {
        let mut participants: HashMap<&'static str, Computation<bool>> = HashMap::new();
        participants.insert(
            "lonely",
            Computation::new(|suspend| async move {
                match wait::<i32>(&suspend, "never-sent").await {
                    Ok(_) => false,
                    Err(EffectualError::Rendezvous(RendezvousError::NotSent { name, .. })) => {
                        name == "never-sent"
                    }
                    Err(_) => false,
                }
            }),
        );

        let results = communicate(participants).await.unwrap();
        assert!(results["lonely"], "the diagnostic should let the participant recover");
    }
}
