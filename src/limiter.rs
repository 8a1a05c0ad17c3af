//! Windowed rate limiter shared by a distribution worker pool.
//!
//! The budget for one window is `grants_per_minute / thread_share`: each
//! worker in a pool of N admits at most a 1/N share of the configured rate,
//! so the pool as a whole stays under the ceiling. Count and window start
//! are read and advanced under one lock, so concurrent admits can never
//! both observe a stale count and overshoot the budget.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::DistributionConfig;

/// Time source abstraction so limiter tests can run on paused time.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
struct Window {
    count: u32,
    started: Instant,
}

/// Rate limiter enforcing a per-window admission budget.
///
/// One instance is shared by every worker of a run. The mutex is held
/// across the stall sleep on purpose: when the window budget is exhausted,
/// every caller queues behind the sleeper and resumes in the fresh window,
/// which is exactly the pool-wide backpressure the run wants.
pub struct RateLimiter<C: Clock = TokioClock> {
    ceiling: u32,
    window: Duration,
    state: Mutex<Window>,
    clock: C,
}

impl RateLimiter<TokioClock> {
    pub fn new(config: &DistributionConfig) -> Self {
        Self::with_clock(config, TokioClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(config: &DistributionConfig, clock: C) -> Self {
        let now = clock.now();
        Self {
            ceiling: config.grants_per_minute,
            window: Duration::from_millis(config.window_ms),
            state: Mutex::new(Window {
                count: 0,
                started: now,
            }),
            clock,
        }
    }

    /// Admit one grant cycle, stalling if this caller's share of the window
    /// budget is exhausted.
    ///
    /// `thread_share` is the number of workers splitting the ceiling; the
    /// sequential remainder pass admits with a share of 1 and gets the full
    /// budget to itself.
    pub async fn admit(&self, thread_share: u32) {
        let budget = (self.ceiling / thread_share.max(1)).max(1);

        let mut window = self.state.lock().await;
        if window.count >= budget {
            let elapsed = self.clock.now().duration_since(window.started);
            if elapsed < self.window {
                let stall = self.window - elapsed;
                tracing::trace!(stall_ms = stall.as_millis() as u64, "limiter window exhausted");
                self.clock.sleep(stall).await;
            }
            window.count = 0;
            window.started = self.clock.now();
        }
        window.count += 1;
    }
}
