#[cfg(test)]
mod tests {
    use deferred::{timeout, when, Chain, Deferred, Rejection};
    use futures::executor::block_on;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(events: &Log, entry: &'static str) {
        events.lock().unwrap().push(entry);
    }

    #[test]
    fn fluent_registration_then_resolve() {
        let events = log();
        let d: Deferred<String, String> = Deferred::new();
        let (first, second, after) = (events.clone(), events.clone(), events.clone());
        d.then(move |value| {
            assert_eq!(value, "success");
            push(&first, "first");
        })
        .then(move |value| {
            assert_eq!(value, "success");
            push(&second, "second");
        })
        .fail(|_| panic!("must not reject"))
        .always(move |_| push(&after, "always"))
        .resolve("success".into());
        assert_eq!(*events.lock().unwrap(), ["first", "second", "always"]);
    }

    #[test]
    fn next_chains_map_values_across_types() {
        let events = log();
        let d: Deferred<String, String> = Deferred::new();
        let seen = events.clone();
        let length = d.next(move |value| {
            push(&seen, "first");
            Chain::Value(value.len())
        });
        let described = length.next(|n| Chain::Value(format!("len={n}")));
        let seen = events.clone();
        described.then(move |value| {
            assert_eq!(value, "len=5");
            push(&seen, "done");
        });
        d.resolve("start".into());
        assert_eq!(*events.lock().unwrap(), ["first", "done"]);
    }

    #[test]
    fn next_passes_rejections_through() {
        let d: Deferred<i32, String> = Deferred::new();
        let mapped: Deferred<i32, String> = d.next(|_| unreachable!("must not resolve"));
        d.reject("broken".into());
        assert!(matches!(
            &*mapped.outcome().unwrap(),
            Err(Rejection::Exception(e)) if e == "broken"
        ));
    }

    #[test]
    fn mirror_follows_the_source_exactly() {
        let d: Deferred<i32, String> = Deferred::new();
        let twin = d.mirror();
        d.resolve(3);
        assert!(matches!(&*twin.outcome().unwrap(), Ok(3)));

        let r: Deferred<i32, String> = Deferred::new();
        let twin = r.mirror();
        r.reject("nope".into());
        assert!(matches!(
            &*twin.outcome().unwrap(),
            Err(Rejection::Exception(e)) if e == "nope"
        ));
    }

    #[test]
    fn pipe_flattens_an_inner_deferred_settling_later() {
        let d: Deferred<String, String> = Deferred::new();
        let inner: Deferred<i32, String> = Deferred::new();
        let stage = inner.clone();
        let piped = d.next(move |value| {
            assert_eq!(value, "start");
            Chain::Deferred(stage)
        });
        let described = piped.next(|n| Chain::Value(format!("got {n}")));
        d.resolve("start".into());
        // The chain tail stays open until the inner deferred settles.
        assert!(piped.is_unresolved());
        assert!(described.is_unresolved());
        inner.resolve(12345);
        assert!(matches!(&*described.outcome().unwrap(), Ok(v) if v == "got 12345"));
    }

    #[test]
    fn pipe_reject_transform_can_replace_the_failure() {
        let d: Deferred<i32, String> = Deferred::new();
        let step: Deferred<i32, String> = d.pipe(
            |_| unreachable!("success path must not run"),
            |rejection| {
                assert!(matches!(rejection, Rejection::Exception(e) if e == "first"));
                Chain::Reject(Rejection::Exception("second".into()))
            },
        );
        d.reject("first".into());
        assert!(matches!(
            &*step.outcome().unwrap(),
            Err(Rejection::Exception(e)) if e == "second"
        ));
    }

    #[test]
    fn rescue_recovers_a_rejection_into_a_value() {
        let d: Deferred<i32, String> = Deferred::rejected("broken".into());
        let recovered = d.rescue(|rejection| {
            assert!(matches!(rejection, Rejection::Exception(e) if e == "broken"));
            Chain::Value(0)
        });
        assert!(matches!(&*recovered.outcome().unwrap(), Ok(0)));
    }

    #[test]
    fn rescue_passes_success_through_untouched() {
        let d: Deferred<i32, String> = Deferred::new();
        let guarded = d.rescue(|_| unreachable!("failure path must not run"));
        d.resolve(8);
        assert!(matches!(&*guarded.outcome().unwrap(), Ok(8)));
    }

    #[test]
    fn cancelling_the_tail_cancels_the_whole_chain() {
        let events = log();
        let head: Deferred<String, String> = Deferred::new();
        let hook = events.clone();
        head.canceller(move || push(&hook, "head hook"));
        let middle = head.mirror();
        let tail = middle.mirror();
        let failed = events.clone();
        tail.fail(move |rejection| {
            assert!(rejection.is_cancel());
            push(&failed, "tail fail");
        });
        tail.cancel();
        assert_eq!(*events.lock().unwrap(), ["head hook", "tail fail"]);
        assert!(head.is_rejected());
        assert!(middle.is_rejected());
        assert!(tail.is_rejected());
    }

    #[test]
    fn cancelling_downstream_cancels_the_inner_stage() {
        let events = log();
        let inner: Deferred<String, String> = Deferred::new();
        let hook = events.clone();
        inner.canceller(move || push(&hook, "inner hook"));
        let failed = events.clone();
        inner.fail(move |rejection| {
            assert!(rejection.is_cancel());
            push(&failed, "inner fail");
        });
        let stage = inner.clone();
        let chained = Deferred::<String, String>::resolved("start".into())
            .next(move |_| Chain::Deferred(stage));
        // The upstream already settled, so cancellation targets the inner stage.
        chained.cancel();
        assert_eq!(*events.lock().unwrap(), ["inner hook", "inner fail"]);
        assert!(matches!(&*chained.outcome().unwrap(), Err(Rejection::Cancel)));
    }

    #[test]
    fn cancelling_an_aggregate_fans_out_to_its_sources() {
        let events = log();
        let d1: Deferred<i32, String> = Deferred::new();
        let d2: Deferred<i32, String> = Deferred::new();
        let hook = events.clone();
        d1.canceller(move || push(&hook, "d1 hook"));
        let hook = events.clone();
        d2.canceller(move || push(&hook, "d2 hook"));
        let aggregate = when(vec![d1.clone(), d2.clone()]);
        let failed = events.clone();
        aggregate.fail(move |rejection| {
            assert!(rejection.is_cancel());
            push(&failed, "aggregate fail");
        });
        aggregate.cancel();
        // The first cancelled source rejects the aggregate before the second
        // source's hook runs.
        assert_eq!(
            *events.lock().unwrap(),
            ["d1 hook", "aggregate fail", "d2 hook"]
        );
    }

    #[test]
    fn when_settles_positionally_regardless_of_completion_order() {
        let a: Deferred<i32, String> = Deferred::new();
        let b: Deferred<i32, String> = Deferred::new();
        let c: Deferred<i32, String> = Deferred::new();
        let aggregate = when(vec![a.clone(), b.clone(), c.clone()]);
        let settled = thread::spawn(move || {
            b.resolve(2);
            c.resolve(3);
            a.resolve(1);
        });
        settled.join().expect("producer thread panicked");
        assert!(matches!(
            &*aggregate.outcome().unwrap(),
            Ok(values) if *values == vec![1, 2, 3]
        ));
    }

    #[test]
    fn timeout_rejects_at_the_deadline_and_not_before() {
        let d: Deferred<i32, String> = timeout(Duration::from_millis(300));
        assert!(d.is_unresolved());
        thread::sleep(Duration::from_millis(900));
        assert!(matches!(
            &*d.outcome().unwrap(),
            Err(Rejection::Timeout(interval)) if *interval == Duration::from_millis(300)
        ));
    }

    #[test]
    fn awaiting_a_timeout_observes_the_rejection() {
        let d: Deferred<i32, String> = timeout(Duration::from_millis(20));
        let outcome = block_on(d.waiter());
        assert!(matches!(&*outcome, Err(Rejection::Timeout(_))));
    }

    #[test]
    fn waiter_resolved_from_another_thread() {
        let d: Deferred<String, String> = Deferred::new();
        let waiter = d.waiter();
        let held = d.clone();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            held.resolve("over there".into());
        });
        let outcome = block_on(waiter);
        producer.join().expect("producer thread panicked");
        assert!(matches!(&*outcome, Ok(value) if value == "over there"));
        assert!(d.is_resolved());
    }
}
