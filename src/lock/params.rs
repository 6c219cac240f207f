use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// What to do when the lock file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryStrategy {
    /// Fail on the first collision.
    None,
    /// Keep retrying until the lock is acquired or a non-collision error occurs.
    Indefinite,
    /// Retry this many more times after the first failed attempt.
    NumberOfTimes(u64),
}

impl RetryStrategy {
    /// `NumberOfTimes(0)` means the same thing as `None`.
    pub fn normalized(self) -> Self {
        match self {
            RetryStrategy::NumberOfTimes(0) => RetryStrategy::None,
            other => other,
        }
    }

    /// Strategy to carry into the next attempt after a collision, or `None`
    /// when the retry budget is spent.
    pub fn after_collision(self) -> Option<Self> {
        match self {
            RetryStrategy::None | RetryStrategy::NumberOfTimes(0) => None,
            RetryStrategy::Indefinite => Some(RetryStrategy::Indefinite),
            RetryStrategy::NumberOfTimes(n) => Some(RetryStrategy::NumberOfTimes(n - 1)),
        }
    }
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryStrategy::None => write!(f, "none"),
            RetryStrategy::Indefinite => write!(f, "indefinite"),
            RetryStrategy::NumberOfTimes(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid retry strategy '{0}': expected 'none', 'indefinite' (or 'forever') or a retry count")]
pub struct ParseRetryStrategyError(String);

impl FromStr for RetryStrategy {
    type Err = ParseRetryStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "none" => Ok(RetryStrategy::None),
            "indefinite" | "forever" => Ok(RetryStrategy::Indefinite),
            other => other
                .parse::<u64>()
                .map(RetryStrategy::NumberOfTimes)
                .map_err(|_| ParseRetryStrategyError(trimmed.to_string())),
        }
    }
}

/// How hard `acquire` tries before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockingParameters {
    pub retry_strategy: RetryStrategy,
    /// Pause between attempts, in microseconds.
    pub sleep_between_retries: u64,
}

impl LockingParameters {
    /// Retry forever, sleeping 8 seconds between attempts, the same as
    /// lockfile(1).
    pub const DEFAULT: LockingParameters = LockingParameters {
        retry_strategy: RetryStrategy::Indefinite,
        sleep_between_retries: 8_000_000,
    };

    pub const fn new(retry_strategy: RetryStrategy, sleep_between_retries: u64) -> Self {
        Self {
            retry_strategy,
            sleep_between_retries,
        }
    }

    /// Single attempt, no waiting.
    pub const fn no_retry() -> Self {
        Self::new(RetryStrategy::None, 0)
    }

    pub fn sleep_duration(&self) -> Duration {
        Duration::from_micros(self.sleep_between_retries)
    }
}

impl Default for LockingParameters {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let params = LockingParameters::default();
        assert_eq!(params.retry_strategy, RetryStrategy::Indefinite);
        assert_eq!(params.sleep_between_retries, 8_000_000);
        assert_eq!(params.sleep_duration(), Duration::from_secs(8));
    }

    #[test]
    fn test_zero_retries_normalizes_to_none() {
        assert_eq!(
            RetryStrategy::NumberOfTimes(0).normalized(),
            RetryStrategy::None
        );
        assert_eq!(
            RetryStrategy::NumberOfTimes(3).normalized(),
            RetryStrategy::NumberOfTimes(3)
        );
        assert_eq!(
            RetryStrategy::Indefinite.normalized(),
            RetryStrategy::Indefinite
        );
    }

    #[test]
    fn test_after_collision() {
        assert_eq!(RetryStrategy::None.after_collision(), None);
        assert_eq!(RetryStrategy::NumberOfTimes(0).after_collision(), None);
        assert_eq!(
            RetryStrategy::NumberOfTimes(1).after_collision(),
            Some(RetryStrategy::NumberOfTimes(0))
        );
        assert_eq!(
            RetryStrategy::Indefinite.after_collision(),
            Some(RetryStrategy::Indefinite)
        );
        assert_eq!(
            RetryStrategy::NumberOfTimes(u64::MAX).after_collision(),
            Some(RetryStrategy::NumberOfTimes(u64::MAX - 1))
        );
    }

    #[test]
    fn test_parse_retry_strategy() {
        assert_eq!("none".parse(), Ok(RetryStrategy::None));
        assert_eq!("Indefinite".parse(), Ok(RetryStrategy::Indefinite));
        assert_eq!("forever".parse(), Ok(RetryStrategy::Indefinite));
        assert_eq!(" 5 ".parse(), Ok(RetryStrategy::NumberOfTimes(5)));
        assert_eq!("0".parse(), Ok(RetryStrategy::NumberOfTimes(0)));
        assert!("-1".parse::<RetryStrategy>().is_err());
        assert!("sometimes".parse::<RetryStrategy>().is_err());
        assert!("never".parse::<RetryStrategy>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for strategy in [
            RetryStrategy::None,
            RetryStrategy::Indefinite,
            RetryStrategy::NumberOfTimes(42),
        ] {
            assert_eq!(strategy.to_string().parse(), Ok(strategy));
        }
    }
}
