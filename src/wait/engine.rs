//! Drives conditions to satisfaction within a deadline.

use std::time::Duration;

use tokio::time::Instant;

use crate::error::WaitError;
use crate::wait::condition::{Condition, StartCondition};

/// Default pause between two checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Calls `after()` when dropped, so cleanup also runs when the waiting
/// future is cancelled.
struct AfterGuard<'a>(&'a dyn Condition);

impl Drop for AfterGuard<'_> {
    fn drop(&mut self) {
        self.0.after();
    }
}

/// Polls a condition until it holds or its timeout passes.
#[derive(Debug, Clone)]
pub struct WaitEngine {
    poll_interval: Duration,
}

impl Default for WaitEngine {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait for `condition`, giving up after `timeout`.
    ///
    /// `description` names what is being waited on and ends up in the
    /// timeout error. `condition.after()` runs exactly once before this
    /// returns, and also if the returned future is dropped early.
    pub async fn run(
        &self,
        condition: &dyn Condition,
        timeout: Duration,
        description: &str,
    ) -> Result<(), WaitError> {
        let _after = AfterGuard(condition);
        let start = Instant::now();

        loop {
            if condition.check().await? {
                tracing::debug!(
                    "{}: {} satisfied after {:?}",
                    description,
                    condition.describe(),
                    start.elapsed()
                );
                return Ok(());
            }

            if start.elapsed() >= timeout {
                return Err(WaitError::Timeout {
                    description: description.to_string(),
                    condition: condition.describe(),
                    timeout,
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Wait for each condition in turn, each with its own full `timeout`.
    ///
    /// The worst case is therefore `conditions.len() * timeout`. Stops at the
    /// first failure.
    pub async fn run_all(
        &self,
        conditions: &[StartCondition],
        timeout: Duration,
        description: &str,
    ) -> Result<(), WaitError> {
        for condition in conditions {
            self.run(condition, timeout, description).await?;
        }
        Ok(())
    }
}
