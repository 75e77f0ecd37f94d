use crate::constants::DEFAULT_RECONNECT_DELAY;
use std::time::Duration;

/// Describes how the live update channel is re-established after it closes.
///
/// The default is [`ReconnectPolicy::FixedDelay`] with a `5` seconds delay and no attempt limit.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use flagsync::ReconnectPolicy;
///
/// let policy = ReconnectPolicy::ExponentialBackoff {
///     initial: Duration::from_millis(500),
///     max: Duration::from_secs(30),
///     max_attempts: Some(10),
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// The channel stays closed once the connection is lost.
    Disabled,
    /// Reconnects after the same `delay` every time.
    FixedDelay {
        /// Wait time before each reconnect attempt.
        delay: Duration,
        /// Maximum number of consecutive attempts, [`None`] means unlimited.
        max_attempts: Option<u32>,
    },
    /// Doubles the wait time after each failed attempt, starting at `initial` and capped at `max`.
    ExponentialBackoff {
        /// Wait time before the first reconnect attempt.
        initial: Duration,
        /// Upper bound of the wait time.
        max: Duration,
        /// Maximum number of consecutive attempts, [`None`] means unlimited.
        max_attempts: Option<u32>,
    },
}

impl ReconnectPolicy {
    /// Creates a [`ReconnectPolicy::FixedDelay`] without an attempt limit.
    pub fn fixed(delay: Duration) -> Self {
        Self::FixedDelay {
            delay,
            max_attempts: None,
        }
    }

    /// Returns the wait time before the reconnect attempt numbered `attempt` (starting at `0`),
    /// or [`None`] when no further attempt should be made.
    pub(crate) fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match self {
            ReconnectPolicy::Disabled => None,
            ReconnectPolicy::FixedDelay {
                delay,
                max_attempts,
            } => within_limit(attempt, max_attempts).then_some(*delay),
            ReconnectPolicy::ExponentialBackoff {
                initial,
                max,
                max_attempts,
            } => {
                if !within_limit(attempt, max_attempts) {
                    return None;
                }
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                Some(initial.checked_mul(factor).map_or(*max, |d| d.min(*max)))
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

fn within_limit(attempt: u32, max_attempts: &Option<u32>) -> bool {
    max_attempts.map_or(true, |max| attempt < max)
}
