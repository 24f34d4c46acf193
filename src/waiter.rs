//! Awaiting a deferred from async code.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::deferred::{Deferred, SharedOutcome};

/// A [`Future`] over a [`Deferred`]'s outcome.
///
/// Any number of waiters may observe the same deferred; each completes with
/// the shared outcome once it settles. The waiter is plain protocol glue: it
/// brings no executor and the deferred's callbacks still run synchronously
/// wherever the producer settles it.
///
/// # Examples
///
/// ```
/// use deferred::Deferred;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let d: Deferred<String, String> = Deferred::new();
/// let waiter = d.waiter();
/// let producer = thread::spawn(move || {
///     d.resolve("ready".into());
/// });
/// let outcome = block_on(waiter);
/// producer.join().expect("producer thread panicked");
/// assert!(matches!(&*outcome, Ok(value) if value == "ready"));
/// ```
pub struct Waiter<T, E> {
    deferred: Deferred<T, E>,
    waker: Arc<Mutex<Option<Waker>>>,
    armed: bool,
}

impl<T, E> Deferred<T, E> {
    /// Returns a future that completes with this deferred's outcome.
    pub fn waiter(&self) -> Waiter<T, E> {
        Waiter {
            deferred: self.clone(),
            waker: Arc::new(Mutex::new(None)),
            armed: false,
        }
    }
}

impl<T, E> Future for Waiter<T, E> {
    type Output = SharedOutcome<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.deferred.outcome() {
            return Poll::Ready(outcome);
        }
        *this.waker.lock().unwrap() = Some(cx.waker().clone());
        if !this.armed {
            this.armed = true;
            let slot = this.waker.clone();
            this.deferred.always(move |_| {
                if let Some(waker) = slot.lock().unwrap().take() {
                    waker.wake();
                }
            });
        }
        // The deferred may have settled between the first check and arming.
        if let Some(outcome) = this.deferred.outcome() {
            return Poll::Ready(outcome);
        }
        Poll::Pending
    }
}
