//! Deadline-bound deferreds backed by a disarmable one-shot timer thread.

use std::sync::mpsc::{channel, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::deferred::Deferred;
use crate::Rejection;

/// Creates a deferred that rejects itself with [`Rejection::Timeout`] once
/// `interval` has elapsed, unless it settles first.
///
/// The timer is a thread parked on a channel. Settling the deferred by any
/// means disarms it, so no rejection can fire after the deferred is disposed
/// of. Calling [`cancel`](Deferred::cancel) disarms the timer through the
/// pre-wired canceller and rejects with [`Rejection::Cancel`] instead.
pub fn timeout<T, E>(interval: Duration) -> Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    let deferred = Deferred::new();

    let (disarm, armed) = channel::<()>();
    let pending = deferred.clone();
    thread::spawn(move || {
        // Any message (or a settled deferred dropping its senders) wakes the
        // timer early and skips the rejection.
        if let Err(RecvTimeoutError::Timeout) = armed.recv_timeout(interval) {
            pending.reject_with(Rejection::Timeout(interval));
        }
    });

    let on_settle = disarm.clone();
    deferred.always(move |_| {
        let _ = on_settle.send(());
    });
    deferred.canceller(move || {
        let _ = disarm.send(());
    });
    deferred
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_with_timeout_once_the_interval_passes() {
        let d: Deferred<i32, String> = timeout(Duration::from_millis(30));
        assert!(d.is_unresolved());
        thread::sleep(Duration::from_millis(120));
        assert!(matches!(
            &*d.outcome().unwrap(),
            Err(Rejection::Timeout(interval)) if *interval == Duration::from_millis(30)
        ));
    }

    #[test]
    fn settling_first_disarms_the_timer() {
        let d: Deferred<i32, String> = timeout(Duration::from_millis(30));
        d.resolve(7);
        thread::sleep(Duration::from_millis(120));
        assert!(matches!(&*d.outcome().unwrap(), Ok(7)));
    }

    #[test]
    fn cancelling_disarms_the_timer() {
        let d: Deferred<i32, String> = timeout(Duration::from_millis(30));
        d.cancel();
        assert!(matches!(&*d.outcome().unwrap(), Err(Rejection::Cancel)));
        thread::sleep(Duration::from_millis(120));
        assert!(matches!(&*d.outcome().unwrap(), Err(Rejection::Cancel)));
    }
}
