//! Fixed-interval background jobs.

use crate::log_internal;
use std::{sync::Arc, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

/// Work fired by a [`Scheduler`].  Must contain its own errors; a job never fails.
#[serenity::async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    async fn run(&self);
}

/// Runs a job immediately and then once per period until stopped.
///
/// Each run is spawned separately, so a slow run does not hold up the timer.  Jobs that must
/// not overlap guard themselves.
pub struct Scheduler {
    name: &'static str,
    timer: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(job: Arc<dyn Job>, period: Duration) -> Self {
        let name = job.name();
        log_internal!(
            "Starting {} loop every {} second(s)",
            name,
            period.as_secs()
        );

        let timer = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let job = Arc::clone(&job);
                tokio::spawn(async move { job.run().await });
            }
        });

        Self {
            name,
            timer: Some(timer),
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Cancel the timer.  Runs already in flight finish on their own.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            log_internal!("Stopped {} loop", self.name);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    #[serenity::async_trait]
    impl Job for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        async fn run(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Let spawned tasks run without moving the paused clock.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_immediately_then_every_period() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let mut scheduler = Scheduler::start(counter.clone(), Duration::from_secs(60));

        settle().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert!(counter.0.load(Ordering::SeqCst) >= 3);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_and_is_idempotent() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let mut scheduler = Scheduler::start(counter.clone(), Duration::from_secs(60));
        settle().await;
        assert!(scheduler.is_running());

        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());

        let before = counter.0.load(Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(counter.0.load(Ordering::SeqCst), before);
    }
}
