use std::time::Duration;
use tokio::time::sleep;

/// Doubling delay between reconnect attempts, capped at `max_delay`
#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug)]
pub struct MaxRetriesExceeded;

impl std::fmt::Display for MaxRetriesExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxRetriesExceeded {}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, retries: u32) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max,
            max_retries: retries,
            current_attempt: 0,
        }
    }

    /// Delay for the next attempt, consuming one retry
    pub fn next_delay(&mut self) -> Result<Duration, MaxRetriesExceeded> {
        if self.current_attempt >= self.max_retries {
            return Err(MaxRetriesExceeded);
        }

        let factor = 2_u32.saturating_pow(self.current_attempt);
        let delay = std::cmp::min(self.initial_delay.saturating_mul(factor), self.max_delay);
        self.current_attempt += 1;
        Ok(delay)
    }

    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        let delay = self.next_delay()?;

        log::warn!(
            "⏳ Reconnect attempt {} of {} in {}ms",
            self.current_attempt,
            self.max_retries,
            delay.as_millis()
        );

        sleep(delay).await;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}
