//! Periodic driver for the reconciliation cycle.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval, MissedTickBehavior};

/// Unit of work run on every tick.
#[async_trait]
pub trait Job: Send {
    type Error;

    async fn run_once(&mut self) -> Result<(), Self::Error>;
}

/// Run `job` immediately, then once per `period`, until it fails.
///
/// Runs never overlap.  A run that takes longer than `period` is followed
/// immediately by the next one; further missed ticks are skipped rather
/// than fired in a burst.
pub async fn run<J: Job>(period: Duration, job: &mut J) -> Result<(), J::Error> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        job.run_once().await?;
    }
}
