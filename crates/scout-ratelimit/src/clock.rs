//! Time source and suspend primitive.
//!
//! Everything in the admission path reads time through [`Clock`] so tests
//! can drive window rollovers and pacing delays without real waiting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

use crate::window::add_duration;

/// Wall-clock abstraction.
///
/// `sleep` is the only suspension point of the admission path. Dropping the
/// returned future cancels the wait.
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the calling task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real time: `chrono::Utc::now` and `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Synthetic clock for tests.
///
/// In auto-advance mode (the default) `sleep` moves the clock forward by the
/// requested duration and returns at once. In manual mode `sleep` parks until
/// [`ManualClock::advance`] or [`ManualClock::set`] moves time past the
/// deadline.
#[derive(Debug)]
pub struct ManualClock {
    now: watch::Sender<DateTime<Utc>>,
    auto_advance: bool,
}

impl ManualClock {
    /// Clock starting at `start` whose sleeps advance time.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        let (now, _) = watch::channel(start);
        Self {
            now,
            auto_advance: true,
        }
    }

    /// Clock starting at `start` whose sleeps wait for explicit advances.
    #[must_use]
    pub fn manual(start: DateTime<Utc>) -> Self {
        Self {
            auto_advance: false,
            ..Self::new(start)
        }
    }

    /// Move time forward.
    pub fn advance(&self, duration: Duration) {
        self.now.send_modify(|now| *now = add_duration(*now, duration));
    }

    /// Jump to an absolute time, backwards included.
    pub fn set(&self, time: DateTime<Utc>) {
        self.now.send_replace(time);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.borrow()
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        if self.auto_advance {
            self.advance(duration);
            tokio::task::yield_now().await;
        } else {
            let deadline = add_duration(self.now(), duration);
            let mut rx = self.now.subscribe();
            // The sender lives in `self`, so the channel cannot close while we wait
            let _ = rx.wait_for(|now| *now >= deadline).await;
        }
    }
}
