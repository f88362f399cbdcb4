//! Startup seeding and the periodic staleness sweep.
//!
//! The sweep repeats the startup seed on a recurring interval of half the
//! staleness window, so anything that aged out (or failed and was left
//! alone) gets re-enqueued on the next pass.

use std::time::Duration;

use tracing::{error, info};

use crate::scheduler::Scheduler;

pub(crate) fn spawn(scheduler: Scheduler, stale: Duration) {
    tokio::spawn(run(scheduler, stale));
}

async fn run(scheduler: Scheduler, stale: Duration) {
    let mut stop = scheduler.stop_receiver();

    seed_once(&scheduler).await;

    let period = (stale / 2).max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);
    // The first tick fires immediately; the startup seed already ran
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => seed_once(&scheduler).await,
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    info!("seeder stopping");
                    return;
                }
            }
        }
    }
}

async fn seed_once(scheduler: &Scheduler) {
    match scheduler.seed().await {
        Ok(enqueued) => info!("seeded {} fetches", enqueued),
        Err(e) => error!("seeding failed: {}", e),
    }
}
