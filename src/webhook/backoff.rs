//! Backoff strategies for delivery retries.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use super::ConfigurationError;

/// Computes how long to wait before the next delivery attempt.
///
/// Implementations are pure functions of the attempt number and their own
/// immutable parameters, and are shared across concurrently running jobs.
pub trait BackoffStrategy: Send + Sync + Debug {
    /// Returns the delay to wait after `attempt` failed.
    ///
    /// `attempt` is 1-based: `1` is the delay between the first and the
    /// second attempt.
    fn delay_after_attempt(&self, attempt: u32) -> Duration;
}

/// Exponential backoff with a delay cap.
///
/// `delay(n) = base_delay * multiplier^(n - 1)`, capped at `max_delay`.
///
/// # Defaults
///
/// - `base_delay`: 10 seconds
/// - `max_delay`: 1 hour
/// - `multiplier`: 2.0
///
/// # Example
///
/// ```
/// use webhook_call::webhook::{BackoffStrategy, ExponentialBackoff};
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::new()
///     .with_base_delay(Duration::from_secs(1))
///     .with_max_delay(Duration::from_secs(30));
///
/// assert_eq!(backoff.delay_after_attempt(1), Duration::from_secs(1));
/// assert_eq!(backoff.delay_after_attempt(3), Duration::from_secs(4));
/// assert_eq!(backoff.delay_after_attempt(10), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay after the first failed attempt.
    pub base_delay: Duration,

    /// Maximum delay between attempts.
    ///
    /// The computed delay is capped at this value to prevent
    /// excessively long waits.
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each attempt.
    ///
    /// A value of 2.0 doubles the delay each time.
    pub multiplier: f64,
}

impl ExponentialBackoff {
    /// Default base delay (10 seconds).
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(10);

    /// Default maximum delay (1 hour).
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(3600);

    /// Default multiplier (2.0).
    pub const DEFAULT_MULTIPLIER: f64 = 2.0;

    /// Creates a new strategy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            base_delay: Self::DEFAULT_BASE_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
            multiplier: Self::DEFAULT_MULTIPLIER,
        }
    }

    /// Sets the delay after the first failed attempt.
    ///
    /// Zero delay is supported (useful for testing) but not recommended for
    /// production as it creates a tight retry loop.
    #[must_use]
    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay between attempts.
    ///
    /// A cap below the base delay is raised to the base delay, so the first
    /// delay is always the base delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the delay multiplier.
    ///
    /// # Panics
    ///
    /// Panics if `multiplier` is less than 1.0 or not finite, since the
    /// delays would then shrink between attempts.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        assert!(
            multiplier.is_finite() && multiplier >= 1.0,
            "multiplier must be a finite number >= 1.0"
        );
        self.multiplier = multiplier;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32);
        // Safe cast: clamped to i32::MAX above
        #[allow(clippy::cast_possible_wrap)]
        let factor = self.multiplier.powi(exponent as i32);
        let delay_secs = self.base_delay.as_secs_f64() * factor;
        let cap = self.max_delay.max(self.base_delay);
        let capped = delay_secs.min(cap.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(cap)
    }
}

/// The same delay after every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBackoff {
    /// Delay between attempts.
    pub delay: Duration,
}

impl ConstantBackoff {
    /// Creates a strategy that always waits `delay`.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffStrategy for ConstantBackoff {
    fn delay_after_attempt(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Looks up a built-in backoff strategy by its configuration name.
///
/// `exponential` builds an [`ExponentialBackoff`] from the given parameters;
/// `constant` builds a [`ConstantBackoff`] that waits `base_delay`.
/// Matching ignores ASCII case.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidBackoffStrategy`] for any other name.
pub fn backoff_by_name(
    name: &str,
    params: &ExponentialBackoff,
) -> Result<Arc<dyn BackoffStrategy>, ConfigurationError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "exponential" | "exponential_backoff" => Ok(Arc::new(params.clone())),
        "constant" | "constant_backoff" => Ok(Arc::new(ConstantBackoff::new(params.base_delay))),
        _ => Err(ConfigurationError::InvalidBackoffStrategy(name.to_string())),
    }
}
