//! Fan-in aggregation: one deferred from many.

use std::sync::{Arc, Mutex};

use crate::deferred::Deferred;

struct Gathered<T> {
    slots: Vec<Option<T>>,
    pending: usize,
}

/// Aggregates `sources` into a single deferred.
///
/// The aggregate resolves with the source values in input order, once every
/// source has resolved, regardless of completion order. The first rejection
/// from any source rejects the aggregate immediately; whatever the remaining
/// sources do afterwards is ignored. An empty input resolves immediately with
/// an empty vec. Cancelling the aggregate cancels every still-pending source.
///
/// # Examples
///
/// ```
/// use deferred::{when, Deferred};
///
/// let a: Deferred<i32, String> = Deferred::new();
/// let b: Deferred<i32, String> = Deferred::new();
/// let all = when(vec![a.clone(), b.clone()]);
/// b.resolve(2);
/// a.resolve(1);
/// assert!(matches!(&*all.outcome().unwrap(), Ok(values) if *values == vec![1, 2]));
/// ```
pub fn when<T, E, I>(sources: I) -> Deferred<Vec<T>, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = Deferred<T, E>>,
{
    let sources: Vec<Deferred<T, E>> = sources.into_iter().collect();
    let aggregate = Deferred::new();
    if sources.is_empty() {
        aggregate.resolve(Vec::new());
        return aggregate;
    }

    let gathered = Arc::new(Mutex::new(Gathered {
        slots: vec![None; sources.len()],
        pending: sources.len(),
    }));
    for (index, source) in sources.iter().enumerate() {
        let gathered = gathered.clone();
        let aggregate = aggregate.clone();
        source.always(move |outcome| match outcome {
            Ok(value) => {
                let complete = {
                    let mut gathered = gathered.lock().unwrap();
                    gathered.slots[index] = Some(value.clone());
                    gathered.pending -= 1;
                    gathered.pending == 0
                };
                if complete {
                    let values: Option<Vec<T>> = gathered
                        .lock()
                        .unwrap()
                        .slots
                        .iter_mut()
                        .map(Option::take)
                        .collect();
                    if let Some(values) = values {
                        aggregate.resolve(values);
                    }
                }
            }
            Err(rejection) => {
                aggregate.reject_with(rejection.clone());
            }
        });
    }

    let pending: Vec<_> = sources.iter().map(Deferred::downgrade).collect();
    aggregate.canceller(move || {
        for source in &pending {
            if let Some(source) = source.upgrade() {
                source.cancel();
            }
        }
    });
    aggregate
}

/// Two-source aggregation over differently typed payloads.
///
/// Same contract as [`when`]: resolves with the pair once both sources
/// resolve, rejects with the first rejection, and cancelling the pair cancels
/// both sources.
pub fn when2<A, B, E>(left: &Deferred<A, E>, right: &Deferred<B, E>) -> Deferred<(A, B), E>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let aggregate = Deferred::new();
    let slots = Arc::new(Mutex::new((None::<A>, None::<B>)));
    {
        let slots = slots.clone();
        let aggregate = aggregate.clone();
        left.always(move |outcome| match outcome {
            Ok(value) => {
                let pair = {
                    let mut slots = slots.lock().unwrap();
                    slots.0 = Some(value.clone());
                    take_pair(&mut slots)
                };
                if let Some(pair) = pair {
                    aggregate.resolve(pair);
                }
            }
            Err(rejection) => aggregate.reject_with(rejection.clone()),
        });
    }
    {
        let slots = slots.clone();
        let aggregate = aggregate.clone();
        right.always(move |outcome| match outcome {
            Ok(value) => {
                let pair = {
                    let mut slots = slots.lock().unwrap();
                    slots.1 = Some(value.clone());
                    take_pair(&mut slots)
                };
                if let Some(pair) = pair {
                    aggregate.resolve(pair);
                }
            }
            Err(rejection) => aggregate.reject_with(rejection.clone()),
        });
    }
    let (left, right) = (left.downgrade(), right.downgrade());
    aggregate.canceller(move || {
        if let Some(source) = left.upgrade() {
            source.cancel();
        }
        if let Some(source) = right.upgrade() {
            source.cancel();
        }
    });
    aggregate
}

fn take_pair<A, B>(slots: &mut (Option<A>, Option<B>)) -> Option<(A, B)> {
    if slots.0.is_some() && slots.1.is_some() {
        Some((slots.0.take()?, slots.1.take()?))
    } else {
        None
    }
}

/// Three-source aggregation over differently typed payloads.
pub fn when3<A, B, C, E>(
    first: &Deferred<A, E>,
    second: &Deferred<B, E>,
    third: &Deferred<C, E>,
) -> Deferred<(A, B, C), E>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let pair = when2(first, second);
    let aggregate = when2(&pair, third);
    let flattened = Deferred::new();
    {
        let flattened = flattened.clone();
        aggregate.always(move |outcome| match outcome {
            Ok(((a, b), c)) => {
                flattened.resolve((a.clone(), b.clone(), c.clone()));
            }
            Err(rejection) => flattened.reject_with(rejection.clone()),
        });
    }
    let upstream = aggregate.downgrade();
    flattened.canceller(move || {
        if let Some(source) = upstream.upgrade() {
            source.cancel();
        }
    });
    flattened
}
