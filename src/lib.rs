//! One-shot deferred values.
//!
//! A [`Deferred`] stands for a value that will resolve or reject exactly once.
//! Observers register reactions with [`Deferred::then`], [`Deferred::fail`]
//! and [`Deferred::always`] without caring whether the outcome has already
//! happened: callbacks queued on an unresolved deferred run synchronously the
//! moment it settles, in registration order, and callbacks registered after
//! the fact run immediately.
//!
//! The crate defines only the protocol by which results are published and
//! consumed. It schedules nothing itself; whoever eventually calls
//! [`Deferred::resolve`] or [`Deferred::reject`] does so from their own
//! execution context, and the callbacks run right there.
//!
//! ```
//! use deferred::Deferred;
//!
//! let d: Deferred<i32, String> = Deferred::new();
//! d.then(|n| println!("got {n}"))
//!     .fail(|rejection| println!("lost: {rejection}"))
//!     .resolve(7);
//! assert!(d.is_resolved());
//! ```
//!
//! Derived deferreds are built with [`Deferred::pipe`], [`Deferred::next`],
//! [`Deferred::rescue`] and [`Deferred::mirror`]; a transform may hand back a
//! plain value or another deferred to chain onto ([`Chain`]). [`when`]
//! aggregates many deferreds into one, [`timeout`] builds a deferred that
//! rejects itself once a deadline passes, and [`Deferred::waiter`] adapts a
//! deferred into a [`Future`](std::future::Future) for async callers.

pub mod deferred;
pub mod timeout;
pub mod waiter;
pub mod when;

pub use crate::deferred::{Chain, Deferred, Outcome, SharedOutcome};
pub use crate::timeout::timeout;
pub use crate::waiter::Waiter;
pub use crate::when::{when, when2, when3};

use std::time::Duration;
use thiserror::Error;

/// Why a deferred ended up rejected.
///
/// The failure payload `E` belongs to the producer; the remaining variants are
/// produced by this crate itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection<E> {
    /// A failure value supplied by producer code or by a transform.
    #[error("rejected by producer")]
    Exception(E),
    /// The deadline given to [`timeout`] passed before the deferred settled.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The deferred was cancelled before it settled.
    #[error("cancelled")]
    Cancel,
}

impl<E> Rejection<E> {
    pub fn is_cancel(&self) -> bool {
        matches!(self, Rejection::Cancel)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Rejection::Timeout(_))
    }
}
