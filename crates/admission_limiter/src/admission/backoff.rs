use std::time::Duration;

use rand::Rng;

/// The jitter mode to use between polls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterMode {
    /// No jitter; always wait the lower bound.
    None,

    /// Uniform jitter.
    ///
    /// The delay is drawn uniformly from `[min_delay, max_delay)`. Spreading polls out
    /// keeps many clients waiting on the same service from polling in lockstep.
    #[default]
    Uniform,
}

/// Delay source for a poll loop.
///
/// Unlike a retry backoff the delay does not grow: a result that is not ready yet is
/// not a failure, so every wait is drawn from the same window.
#[derive(Clone, Copy, Debug)]
pub struct PollBackoff {
    min_delay: Duration,
    max_delay: Duration,
    jitter_mode: JitterMode,
}

impl PollBackoff {
    pub const fn new(min_delay: Duration, max_delay: Duration, jitter_mode: JitterMode) -> Self {
        Self {
            min_delay,
            max_delay,
            jitter_mode,
        }
    }

    pub const fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub const fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn next_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        match self.jitter_mode {
            JitterMode::None => self.min_delay,
            JitterMode::Uniform if max <= min => self.min_delay,
            JitterMode::Uniform => Duration::from_millis(rand::rng().random_range(min..max)),
        }
    }
}

impl Default for PollBackoff {
    /// One to five seconds, uniformly jittered.
    fn default() -> Self {
        Self::new(
            Duration::from_millis(1000),
            Duration::from_millis(5000),
            JitterMode::Uniform,
        )
    }
}

impl Iterator for PollBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}
