use std::time::Duration;

use tokio::time::Instant;

use crate::config::PollPolicy;

/// Attempt counter and sleep schedule for one polling loop.
///
/// Call [`Backoff::wait`] after every unsuccessful attempt; it sleeps for the
/// next delay and returns `false` once either the attempt cap or the deadline
/// is reached.
#[derive(Debug)]
pub struct Backoff {
    policy: PollPolicy,
    deadline: Instant,
    next_delay: Duration,
    attempts: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            deadline: Instant::now() + policy.timeout(),
            next_delay: policy.initial_delay(),
            attempts: 0,
        }
    }

    /// Attempts made so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub async fn wait(&mut self) -> bool {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= self.policy.max_attempts {
            return false;
        }
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let delay = self.next_delay.min(self.deadline - now);
        tokio::time::sleep(delay).await;
        self.next_delay = self
            .next_delay
            .saturating_mul(self.policy.multiplier)
            .min(self.policy.max_delay());
        true
    }
}

/// Human-friendly rendering of an execution time.
#[must_use]
pub fn format_execution_time(millis: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let value = millis as f64;
    if millis < 1_000 {
        format!("{millis} milliseconds")
    } else if millis < 60_000 {
        format!("{:.2} seconds", value / 1_000.0)
    } else {
        format!("{:.2} minutes", value / 60_000.0)
    }
}
