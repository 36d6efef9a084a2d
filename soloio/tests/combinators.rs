//! Combinator semantics through the full event loop: aggregation,
//! first-wins, error propagation, and loser teardown.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use soloio::{Either, Either3, Runtime, sleep_for, try_when_all, when_all, when_any, when_any3};

#[derive(Debug, PartialEq, Eq)]
struct Wow(&'static str);

#[test]
fn when_all_yields_positional_tuple() {
    let rt = Runtime::new().unwrap();
    let timer = rt.timer();

    let start = Instant::now();
    let t1 = {
        let timer = timer.clone();
        async move {
            sleep_for(&timer, Duration::from_millis(50)).await;
            1
        }
    };
    let t2 = {
        let timer = timer.clone();
        async move {
            sleep_for(&timer, Duration::from_millis(70)).await;
            2
        }
    };

    let out = rt.block_on(when_all(t1, t2)).unwrap();
    assert_eq!(out, (1, 2));
    // The parent completes no earlier than the slowest child.
    assert!(start.elapsed() >= Duration::from_millis(70));
}

#[test]
fn try_when_all_propagates_early_error() {
    let rt = Runtime::new().unwrap();
    let timer = rt.timer();
    let spawner = rt.spawner();
    let sibling_finished = Rc::new(Cell::new(false));

    let start = Instant::now();
    // t1 fails before its first suspension point.
    let t1 = async move { Err::<i32, _>(Wow("wow")) };
    let t2 = {
        let timer = timer.clone();
        let finished = sibling_finished.clone();
        async move {
            sleep_for(&timer, Duration::from_millis(70)).await;
            finished.set(true);
            Ok::<_, Wow>(2)
        }
    };

    let timer2 = timer.clone();
    let spawner2 = spawner.clone();
    let finished2 = sibling_finished.clone();
    rt.block_on(async move {
        let out = try_when_all(&spawner2, t1, t2).await;
        assert_eq!(out, Err(Wow("wow")));
        // Fail-fast on observation: the error arrived without waiting
        // out t2's sleep...
        assert!(start.elapsed() < Duration::from_millis(70));
        assert!(!finished2.get());
        // ...but t2 lives on in the background set.
        assert_eq!(spawner2.live_tasks(), 1);

        // It runs to completion on its own; its Ok(2) goes nowhere.
        sleep_for(&timer2, Duration::from_millis(100)).await;
        assert!(finished2.get());
        assert_eq!(spawner2.live_tasks(), 0);
    })
    .unwrap();

    assert!(sibling_finished.get());
    assert_eq!(timer.pending(), 0);
}

#[test]
fn try_when_all_collects_both_on_success() {
    let rt = Runtime::new().unwrap();
    let timer = rt.timer();
    let spawner = rt.spawner();

    let t1 = {
        let timer = timer.clone();
        async move {
            sleep_for(&timer, Duration::from_millis(10)).await;
            Ok::<_, Wow>("a")
        }
    };
    let t2 = async move { Ok::<_, Wow>("b") };

    let out = rt.block_on(try_when_all(&spawner, t1, t2)).unwrap();
    assert_eq!(out, Ok(("a", "b")));
    assert_eq!(spawner.live_tasks(), 0);
}

#[test]
fn when_any_first_wins_and_losers_die() {
    let rt = Runtime::new().unwrap();
    let timer = rt.timer();

    let t1 = {
        let timer = timer.clone();
        async move {
            sleep_for(&timer, Duration::from_millis(50)).await;
            1
        }
    };
    let t2 = {
        let timer = timer.clone();
        async move {
            sleep_for(&timer, Duration::from_millis(70)).await;
            2
        }
    };

    let start = Instant::now();
    let out = rt.block_on(async { when_any(t1, t2).await }).unwrap();
    assert_eq!(out, Either::Left(1));
    // The loser's timer entry went with it — nothing fires at 70ms.
    assert_eq!(timer.pending(), 0);
    assert!(start.elapsed() < Duration::from_millis(70));
}

#[test]
fn when_any_carries_a_losing_error_only_if_first() {
    let rt = Runtime::new().unwrap();
    let timer = rt.timer();

    // The failing child resolves first; the variant carries its error.
    let t1 = async { Err::<i32, Wow>(Wow("boom")) };
    let t2 = {
        let timer = timer.clone();
        async move {
            sleep_for(&timer, Duration::from_millis(30)).await;
            Ok::<i32, Wow>(2)
        }
    };

    let out = rt.block_on(async { when_any(t1, t2).await }).unwrap();
    assert_eq!(out, Either::Left(Err(Wow("boom"))));
    assert_eq!(timer.pending(), 0);
}

#[test]
fn when_any3_picks_the_earliest_deadline() {
    let rt = Runtime::new().unwrap();
    let timer = rt.timer();

    let sleeper = |ms: u64, tag: &'static str| {
        let timer = timer.clone();
        async move {
            sleep_for(&timer, Duration::from_millis(ms)).await;
            tag
        }
    };

    let out = rt
        .block_on(when_any3(
            sleeper(40, "a"),
            sleeper(10, "b"),
            sleeper(25, "c"),
        ))
        .unwrap();
    assert_eq!(out, Either3::Second("b"));
    assert_eq!(timer.pending(), 0);
}

#[test]
fn nested_combinators() {
    let rt = Runtime::new().unwrap();
    let timer = rt.timer();

    let fast = {
        let timer = timer.clone();
        async move {
            sleep_for(&timer, Duration::from_millis(5)).await;
            "fast"
        }
    };
    let slow = {
        let timer = timer.clone();
        async move {
            sleep_for(&timer, Duration::from_millis(500)).await;
            "slow"
        }
    };
    let steady = async { "steady" };

    let out = rt
        .block_on(when_all(when_any(fast, slow), steady))
        .unwrap();
    assert_eq!(out, (Either::Left("fast"), "steady"));
    assert_eq!(timer.pending(), 0);
}
