use anyhow::{Context, Result};
use serde::Deserialize;

use crate::lock::{LockingParameters, RetryStrategy};

/// On-disk form of `LockingParameters`. Missing keys fall back to
/// `LockingParameters::DEFAULT`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    #[serde(default)]
    pub retry: Option<RetrySetting>,
    /// Microseconds.
    #[serde(default)]
    pub sleep_between_retries: Option<u64>,
}

/// `retry: 3` and `retry: indefinite` are both accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RetrySetting {
    Count(u64),
    Named(String),
}

impl RetrySetting {
    pub fn to_strategy(&self) -> Result<RetryStrategy> {
        match self {
            RetrySetting::Count(n) => Ok(RetryStrategy::NumberOfTimes(*n)),
            RetrySetting::Named(name) => name
                .parse()
                .with_context(|| format!("Invalid 'retry' setting: {}", name)),
        }
    }
}

impl LockConfig {
    pub fn to_parameters(&self) -> Result<LockingParameters> {
        self.apply_to(LockingParameters::DEFAULT)
    }

    /// Overlay the keys present in this config onto `base`.
    pub fn apply_to(&self, base: LockingParameters) -> Result<LockingParameters> {
        let mut params = base;
        if let Some(retry) = &self.retry {
            params.retry_strategy = retry.to_strategy()?;
        }
        if let Some(sleep) = self.sleep_between_retries {
            params.sleep_between_retries = sleep;
        }
        Ok(params)
    }
}
