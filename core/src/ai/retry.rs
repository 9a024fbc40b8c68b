//! Bounded retry with pluggable backoff.

use rand::Rng;
use reqwest::StatusCode;
use std::time::{Duration, SystemTime};

use super::ProviderError;

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Doubles the base delay per attempt, capped at the policy maximum.
    Exponential,
    /// The base delay every time.
    Fixed,
}

/// Policy parameters for retry decisions.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay used for the first retry attempt.
    pub base_delay: Duration,
    /// Maximum delay regardless of exponentiation or server hints.
    pub max_delay: Duration,
    /// Maximum number of retry attempts allowed.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn new(base_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_retries,
            backoff: Backoff::Exponential,
        }
    }

    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// The delay before the retry following `previous_attempts` failures.
    pub fn delay_for(&self, previous_attempts: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay.min(self.max_delay),
            Backoff::Exponential => {
                let base_ms = self.base_delay.as_millis();
                let max_ms = self.max_delay.as_millis();
                let mut multiplier: u128 = 1;
                for _ in 0..previous_attempts {
                    multiplier = multiplier.saturating_mul(2);
                }
                let delay_ms = base_ms.saturating_mul(multiplier).min(max_ms);
                Duration::from_millis(delay_ms as u64)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), 3)
    }
}

/// Decision made by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub delay: Duration,
    pub used_hint: bool,
}

impl RetryDecision {
    const fn no_retry() -> Self {
        Self {
            should_retry: false,
            delay: Duration::ZERO,
            used_hint: false,
        }
    }

    fn retry_with(delay: Duration, used_hint: bool, max_delay: Duration) -> Self {
        Self {
            should_retry: true,
            delay: delay.min(max_delay),
            used_hint,
        }
    }
}

/// Calculates the next retry decision for a provider error.
///
/// `previous_attempts` counts the retries already made.
pub fn evaluate_retry(
    error: &ProviderError,
    policy: &RetryPolicy,
    previous_attempts: u32,
) -> RetryDecision {
    if previous_attempts >= policy.max_retries {
        return RetryDecision::no_retry();
    }

    match error {
        ProviderError::Http {
            status, retry_after, ..
        } => {
            if !is_retryable_status(*status) {
                return RetryDecision::no_retry();
            }
            if let Some(hint) = retry_after {
                return RetryDecision::retry_with(*hint, true, policy.max_delay);
            }
            RetryDecision::retry_with(policy.delay_for(previous_attempts), false, policy.max_delay)
        }
        // transport failures and garbled bodies are worth another attempt
        ProviderError::Network(_) | ProviderError::Malformed(_) => {
            RetryDecision::retry_with(policy.delay_for(previous_attempts), false, policy.max_delay)
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Adds up to 25% random jitter so concurrent workers do not retry in
/// lockstep.
pub fn with_jitter(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let ms = delay.as_millis().min(u64::MAX as u128) as u64;
    let jitter = rand::rng().random_range(0..=ms / 4);
    Duration::from_millis(ms.saturating_add(jitter))
}

/// Parses the value of an HTTP `Retry-After` header (seconds or HTTP-date).
///
/// Returns `None` when parsing fails.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(instant) = httpdate::parse_http_date(trimmed) {
        if let Ok(duration) = instant.duration_since(now) {
            return Some(duration);
        }
        return Some(Duration::from_secs(0));
    }

    None
}
