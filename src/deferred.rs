//! The deferred core: one-shot state machine, callback queues and chaining.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::Rejection;

/// The settled result of a deferred: the success value or the rejection.
pub type Outcome<T, E> = Result<T, Rejection<E>>;

/// A settled outcome, shared between every observer of a deferred.
pub type SharedOutcome<T, E> = Arc<Outcome<T, E>>;

type DoneCallback<T> = Box<dyn FnOnce(&T) + Send>;
type FailCallback<E> = Box<dyn FnOnce(&Rejection<E>) + Send>;
type SettleCallback<T, E> = Box<dyn FnOnce(&SharedOutcome<T, E>) + Send>;
type CancelHook = Box<dyn FnOnce() + Send>;

/// A value that will resolve or reject exactly once.
///
/// `Deferred` is a cheap handle over shared state; clones observe and settle
/// the same underlying deferred. The producer keeps one handle and calls
/// [`resolve`](Deferred::resolve) or [`reject`](Deferred::reject); consumers
/// register callbacks through theirs. Settling is first-wins: once a deferred
/// is settled, every later `resolve`/`reject`/`cancel` is a silent no-op.
///
/// # Examples
///
/// ```
/// use deferred::Deferred;
/// use std::thread;
///
/// let d: Deferred<String, String> = Deferred::new();
/// let held = d.clone();
/// let producer = thread::spawn(move || {
///     held.resolve("done".into());
/// });
/// producer.join().expect("producer thread panicked");
/// assert!(matches!(&*d.outcome().unwrap(), Ok(value) if value == "done"));
/// ```
pub struct Deferred<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

enum State<T, E> {
    Unresolved,
    Settled(SharedOutcome<T, E>),
}

struct Inner<T, E> {
    state: State<T, E>,
    done: Vec<DoneCallback<T>>,
    fail: Vec<FailCallback<E>>,
    always: Vec<SettleCallback<T, E>>,
    canceller: Option<CancelHook>,
}

/// What a transform hands back for the downstream deferred of a
/// [`pipe`](Deferred::pipe)/[`next`](Deferred::next)/[`rescue`](Deferred::rescue).
pub enum Chain<T, E> {
    /// Resolve the downstream deferred immediately with a plain value.
    Value(T),
    /// The downstream deferred follows this deferred's eventual outcome, and
    /// cancelling the downstream cancels it.
    Deferred(Deferred<T, E>),
    /// Reject the downstream deferred immediately.
    Reject(Rejection<E>),
}

impl<T, E> Deferred<T, E> {
    /// Creates a fresh unresolved deferred.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Unresolved,
                done: Vec::new(),
                fail: Vec::new(),
                always: Vec::new(),
                canceller: None,
            })),
        }
    }

    /// Creates a deferred that is already resolved with `value`.
    pub fn resolved(value: T) -> Self {
        let deferred = Self::new();
        deferred.resolve(value);
        deferred
    }

    /// Creates a deferred that is already rejected with `error`.
    pub fn rejected(error: E) -> Self {
        let deferred = Self::new();
        deferred.reject(error);
        deferred
    }

    /// Settles the deferred with a success value.
    ///
    /// Runs every queued `then` callback in registration order, then every
    /// `always` callback, synchronously. No-op if already settled.
    pub fn resolve(&self, value: T) -> &Self {
        self.settle(Arc::new(Ok(value)));
        self
    }

    /// Settles the deferred with a producer failure value.
    ///
    /// Runs every queued `fail` callback in registration order, then every
    /// `always` callback, synchronously. No-op if already settled.
    pub fn reject(&self, error: E) -> &Self {
        self.settle(Arc::new(Err(Rejection::Exception(error))));
        self
    }

    pub(crate) fn reject_with(&self, rejection: Rejection<E>) {
        self.settle(Arc::new(Err(rejection)));
    }

    pub(crate) fn settle(&self, outcome: SharedOutcome<T, E>) {
        let (done, fail, always) = {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            if let State::Settled(_) = inner.state {
                return;
            }
            inner.state = State::Settled(outcome.clone());
            inner.canceller = None;
            (
                std::mem::take(&mut inner.done),
                std::mem::take(&mut inner.fail),
                std::mem::take(&mut inner.always),
            )
        };
        // The lock is released before any callback runs, so callbacks may
        // freely register on or settle this same deferred.
        match &*outcome {
            Ok(value) => {
                for callback in done {
                    callback(value);
                }
            }
            Err(rejection) => {
                for callback in fail {
                    callback(rejection);
                }
            }
        }
        for callback in always {
            callback(&outcome);
        }
    }

    /// Registers a success callback; fires immediately if already resolved.
    pub fn then(&self, callback: impl FnOnce(&T) + Send + 'static) -> &Self {
        let outcome = {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            match &inner.state {
                State::Unresolved => {
                    inner.done.push(Box::new(callback));
                    return self;
                }
                State::Settled(outcome) => outcome.clone(),
            }
        };
        if let Ok(value) = &*outcome {
            callback(value);
        }
        self
    }

    /// Registers a failure callback; fires immediately if already rejected.
    pub fn fail(&self, callback: impl FnOnce(&Rejection<E>) + Send + 'static) -> &Self {
        let outcome = {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            match &inner.state {
                State::Unresolved => {
                    inner.fail.push(Box::new(callback));
                    return self;
                }
                State::Settled(outcome) => outcome.clone(),
            }
        };
        if let Err(rejection) = &*outcome {
            callback(rejection);
        }
        self
    }

    /// Registers a callback for either terminal transition.
    ///
    /// Always-callbacks run after the `then`/`fail` callbacks of the same
    /// transition; on an already-settled deferred the callback fires
    /// immediately.
    pub fn always(&self, callback: impl FnOnce(&Outcome<T, E>) + Send + 'static) -> &Self {
        self.on_settled(move |outcome| callback(outcome));
        self
    }

    pub(crate) fn on_settled(&self, callback: impl FnOnce(&SharedOutcome<T, E>) + Send + 'static) {
        let outcome = {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            match &inner.state {
                State::Unresolved => {
                    inner.always.push(Box::new(callback));
                    return;
                }
                State::Settled(outcome) => outcome.clone(),
            }
        };
        callback(&outcome);
    }

    /// Stores the cancellation hook invoked by [`cancel`](Deferred::cancel).
    ///
    /// The hook slot holds one closure; a later registration replaces the
    /// earlier one. Registration on a settled deferred drops the hook.
    pub fn canceller(&self, hook: impl FnOnce() + Send + 'static) -> &Self {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        if let State::Unresolved = inner.state {
            inner.canceller = Some(Box::new(hook));
        }
        self
    }

    /// Cancels an unresolved deferred.
    ///
    /// Invokes the stored canceller hook, if any, then rejects with
    /// [`Rejection::Cancel`]. Cancellation is cooperative: the hook is the
    /// only thing that can stop external work. No-op on a settled deferred.
    pub fn cancel(&self) -> &Self {
        let hook = {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            match inner.state {
                State::Unresolved => inner.canceller.take(),
                State::Settled(_) => return self,
            }
        };
        if let Some(hook) = hook {
            hook();
        }
        // The hook may already have settled this deferred; settle absorbs it.
        self.reject_with(Rejection::Cancel);
        self
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, State::Unresolved)
    }

    /// True once the deferred has settled successfully.
    pub fn is_resolved(&self) -> bool {
        match &self.inner.lock().unwrap().state {
            State::Settled(outcome) => outcome.is_ok(),
            State::Unresolved => false,
        }
    }

    /// True once the deferred has settled with a rejection (including
    /// cancellation and timeout).
    pub fn is_rejected(&self) -> bool {
        match &self.inner.lock().unwrap().state {
            State::Settled(outcome) => outcome.is_err(),
            State::Unresolved => false,
        }
    }

    /// The settled outcome, or `None` while unresolved.
    pub fn outcome(&self) -> Option<SharedOutcome<T, E>> {
        match &self.inner.lock().unwrap().state {
            State::Settled(outcome) => Some(outcome.clone()),
            State::Unresolved => None,
        }
    }

    pub(crate) fn downgrade(&self) -> WeakDeferred<T, E> {
        WeakDeferred(Arc::downgrade(&self.inner))
    }
}

impl<T, E> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.lock().unwrap().state {
            State::Unresolved => f.write_str("Deferred(unresolved)"),
            State::Settled(outcome) => write!(f, "Deferred({:?})", outcome),
        }
    }
}

/// Cancellation forwarding holds weak handles so that a chain of deferreds
/// never forms a reference cycle: downstream queues own their targets, the
/// reverse cancel edges do not.
pub(crate) struct WeakDeferred<T, E>(Weak<Mutex<Inner<T, E>>>);

impl<T, E> WeakDeferred<T, E> {
    pub(crate) fn upgrade(&self) -> Option<Deferred<T, E>> {
        self.0.upgrade().map(|inner| Deferred { inner })
    }
}

impl<T, E> Deferred<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Derives a new deferred from transforms over both outcomes.
    ///
    /// When this deferred settles, the matching transform runs and its
    /// [`Chain`] drives the returned deferred: a plain value resolves it, a
    /// rejection rejects it, and another deferred chains it (flattening).
    /// Cancelling the returned deferred cancels this one while it is still
    /// pending, or the chained inner deferred afterwards.
    pub fn pipe<U, S, F>(&self, on_resolve: S, on_reject: F) -> Deferred<U, E>
    where
        U: Send + Sync + 'static,
        S: FnOnce(&T) -> Chain<U, E> + Send + 'static,
        F: FnOnce(&Rejection<E>) -> Chain<U, E> + Send + 'static,
    {
        let target = Deferred::new();
        let upstream = self.downgrade();
        target.canceller(move || {
            if let Some(source) = upstream.upgrade() {
                source.cancel();
            }
        });
        let downstream = target.clone();
        self.on_settled(move |outcome| {
            let step = match &**outcome {
                Ok(value) => on_resolve(value),
                Err(rejection) => on_reject(rejection),
            };
            downstream.follow(step);
        });
        target
    }

    /// Derives a new deferred from a success transform; rejections pass
    /// through unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use deferred::{Chain, Deferred};
    ///
    /// let d: Deferred<i32, String> = Deferred::new();
    /// let doubled = d.next(|n| Chain::Value(n * 2));
    /// d.resolve(21);
    /// assert!(matches!(&*doubled.outcome().unwrap(), Ok(42)));
    /// ```
    pub fn next<U, S>(&self, on_resolve: S) -> Deferred<U, E>
    where
        U: Send + Sync + 'static,
        E: Clone,
        S: FnOnce(&T) -> Chain<U, E> + Send + 'static,
    {
        self.pipe(on_resolve, |rejection| Chain::Reject(rejection.clone()))
    }

    /// Derives a new deferred from a rejection transform; success passes
    /// through unchanged. The transform may recover by returning
    /// [`Chain::Value`] or another deferred.
    pub fn rescue<F>(&self, on_reject: F) -> Deferred<T, E>
    where
        F: FnOnce(&Rejection<E>) -> Chain<T, E> + Send + 'static,
    {
        let target = Deferred::new();
        let upstream = self.downgrade();
        target.canceller(move || {
            if let Some(source) = upstream.upgrade() {
                source.cancel();
            }
        });
        let downstream = target.clone();
        self.on_settled(move |outcome| match &**outcome {
            Ok(_) => downstream.settle(outcome.clone()),
            Err(rejection) => downstream.follow(on_reject(rejection)),
        });
        target
    }

    /// Derives a new deferred that mirrors this one's eventual outcome.
    /// Cancelling the mirror cancels the source.
    pub fn mirror(&self) -> Deferred<T, E> {
        let target = Deferred::new();
        let upstream = self.downgrade();
        target.canceller(move || {
            if let Some(source) = upstream.upgrade() {
                source.cancel();
            }
        });
        let downstream = target.clone();
        self.on_settled(move |outcome| downstream.settle(outcome.clone()));
        target
    }

    pub(crate) fn follow(&self, step: Chain<T, E>) {
        match step {
            Chain::Value(value) => {
                self.resolve(value);
            }
            Chain::Reject(rejection) => self.reject_with(rejection),
            Chain::Deferred(source) => {
                // From here on, cancelling this deferred aborts the inner
                // stage instead of the (already settled) upstream.
                let forward = source.downgrade();
                self.canceller(move || {
                    if let Some(source) = forward.upgrade() {
                        source.cancel();
                    }
                });
                let target = self.clone();
                source.on_settled(move |outcome| target.settle(outcome.clone()));
            }
        }
    }
}
