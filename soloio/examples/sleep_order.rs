//! Three sleepers with shuffled deadlines wake in deadline order.
//!
//! Run with: cargo run --example sleep_order

use std::time::Duration;

use soloio::{Runtime, sleep_for, timeout, when_all3};

fn main() -> Result<(), soloio::Error> {
    let rt = Runtime::new()?;
    let timer = rt.timer();
    let spawner = rt.spawner();

    for (name, ms) in [("slow", 300u64), ("quick", 100), ("middle", 200)] {
        let timer = timer.clone();
        spawner.spawn(async move {
            sleep_for(&timer, Duration::from_millis(ms)).await;
            println!("{name} woke after {ms}ms");
        });
    }

    let timer2 = timer.clone();
    rt.block_on(async move {
        // Three more sleeps, joined: resolves with the slowest.
        let t = &timer2;
        when_all3(
            sleep_for(t, Duration::from_millis(350)),
            sleep_for(t, Duration::from_millis(50)),
            sleep_for(t, Duration::from_millis(150)),
        )
        .await;
        println!("all joined sleeps done");

        // And a timeout that loses its race.
        let outcome = timeout(
            t,
            Duration::from_millis(20),
            sleep_for(t, Duration::from_secs(60)),
        )
        .await;
        println!("one-minute sleep under a 20ms deadline: {outcome:?}");
    })?;

    Ok(())
}
