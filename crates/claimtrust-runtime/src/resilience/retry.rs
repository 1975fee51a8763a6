//! Linear backoff for provider retries.
//!
//! The n-th retry waits `step × n`. Plugged into `backon` as a
//! [`BackoffBuilder`].

use backon::BackoffBuilder;
use std::time::Duration;

/// Builds a [`LinearBackoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoffBuilder {
    step: Duration,
    max_retries: usize,
}

impl LinearBackoffBuilder {
    pub fn new(step: Duration, max_retries: usize) -> Self {
        Self { step, max_retries }
    }
}

impl BackoffBuilder for LinearBackoffBuilder {
    type Backoff = LinearBackoff;

    fn build(self) -> Self::Backoff {
        LinearBackoff {
            step: self.step,
            max_retries: self.max_retries,
            attempt: 0,
        }
    }
}

/// Delays `step, 2·step, 3·step, ...` for at most `max_retries` retries.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    step: Duration,
    max_retries: usize,
    attempt: usize,
}

impl Iterator for LinearBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_retries {
            return None;
        }
        self.attempt += 1;
        Some(self.step.saturating_mul(self.attempt as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_linear_delays() {
        let delays: Vec<Duration> = LinearBackoffBuilder::new(Duration::from_millis(300), 3)
            .build()
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(300),
                Duration::from_millis(600),
                Duration::from_millis(900)
            ]
        );
    }

    #[test]
    fn test_no_retries() {
        let mut backoff = LinearBackoffBuilder::new(Duration::from_secs(1), 0).build();
        assert_eq!(backoff.next(), None);
    }

    proptest! {
        #[test]
        fn prop_yields_max_retries_linear_delays(step_ms in 0u64..10_000, max_retries in 0usize..20) {
            let step = Duration::from_millis(step_ms);
            let delays: Vec<Duration> = LinearBackoffBuilder::new(step, max_retries).build().collect();

            prop_assert_eq!(delays.len(), max_retries);
            for (i, delay) in delays.iter().enumerate() {
                prop_assert_eq!(*delay, step * (i as u32 + 1));
            }
        }
    }
}
