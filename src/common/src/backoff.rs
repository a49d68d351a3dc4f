// Copyright 2026 The Exporter Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A single exponential-backoff-with-ceiling-and-deadline shape, shared by
//! every polling loop in the exporter: the upload completion marker, the
//! transfer-job status, and the data-transfer-complete flag all retry the
//! same way, just with different constants.

use std::time::Duration;

use rand::Rng;

use crate::error::TimeoutError;

/// Parameters for one polling loop.
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Per-step delay never exceeds this, no matter how long the loop has
    /// been running. Keeps us under external rate quotas.
    pub max_step: Duration,
    /// Total wall-clock budget for the loop. Exceeding it is a timeout, not
    /// a silent give-up.
    pub deadline: Duration,
}

impl BackoffConfig {
    pub const fn new(initial: Duration, max_step: Duration, deadline: Duration) -> Self {
        Self { initial, max_step, deadline }
    }
}

/// Stateful iterator over backoff delays. Doubles each step, clamps to
/// `max_step`, and reports exhaustion once `deadline` has been spent.
pub struct Backoff {
    cfg: BackoffConfig,
    next: Duration,
    elapsed: Duration,
}

impl Backoff {
    pub fn new(cfg: BackoffConfig) -> Self {
        Self { cfg, next: cfg.initial, elapsed: Duration::ZERO }
    }

    /// Returns the delay to sleep before the next attempt, or `None` once
    /// the deadline is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.elapsed >= self.cfg.deadline {
            return None;
        }
        let base = self.next.min(self.cfg.max_step);
        let jittered = jitter(base);
        self.elapsed += jittered;
        self.next = self.next.saturating_mul(2);
        Some(jittered)
    }
}

fn jitter(d: Duration) -> Duration {
    let millis = d.as_millis().max(1) as u64;
    let jittered = rand::thread_rng().gen_range((millis / 2)..=millis);
    Duration::from_millis(jittered)
}

/// Polls `check` until it returns `Some(value)`, sleeping with backoff
/// between attempts, and fails with [`TimeoutError`] once `cfg.deadline`
/// elapses without success.
pub async fn poll_until<F, Fut, T>(
    what: &str,
    cfg: BackoffConfig,
    mut check: F,
) -> Result<T, TimeoutError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    if let Some(v) = check().await {
        return Ok(v);
    }

    let mut backoff = Backoff::new(cfg);
    loop {
        let Some(delay) = backoff.next_delay() else {
            return Err(TimeoutError { what: what.to_string(), deadline: cfg.deadline });
        };
        tokio::time::sleep(delay).await;
        if let Some(v) = check().await {
            return Ok(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_clamps() {
        let cfg = BackoffConfig::new(
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::from_secs(10),
        );
        let mut b = Backoff::new(cfg);
        // Jitter halves at most, so each step stays within [step/2, step].
        let d1 = b.next_delay().unwrap();
        assert!(d1 <= Duration::from_millis(100));
        let d2 = b.next_delay().unwrap();
        assert!(d2 <= Duration::from_millis(200));
        let d3 = b.next_delay().unwrap();
        assert!(d3 <= Duration::from_millis(300));
        let d4 = b.next_delay().unwrap();
        // Clamped to max_step forever after.
        assert!(d4 <= Duration::from_millis(300));
    }

    #[test]
    fn backoff_exhausts_at_deadline() {
        let cfg = BackoffConfig::new(
            Duration::from_millis(50),
            Duration::from_millis(50),
            Duration::from_millis(120),
        );
        let mut b = Backoff::new(cfg);
        let mut count = 0;
        while b.next_delay().is_some() {
            count += 1;
            assert!(count < 100, "backoff never terminated");
        }
        assert!(count >= 2);
    }

    #[tokio::test]
    async fn poll_until_succeeds_immediately() {
        let cfg = BackoffConfig::new(
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::from_millis(100),
        );
        let result = poll_until("immediate", cfg, || async { Some(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn poll_until_times_out() {
        let cfg = BackoffConfig::new(
            Duration::from_millis(5),
            Duration::from_millis(5),
            Duration::from_millis(30),
        );
        let result: Result<(), _> = poll_until("never", cfg, || async { None }).await;
        assert!(result.is_err());
    }
}
