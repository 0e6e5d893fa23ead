//! Tests for backoff strategies.

use super::{
    BackoffStrategy, ConfigurationError, ConstantBackoff, ExponentialBackoff, backoff_by_name,
};
use std::time::Duration;

mod exponential_defaults {
    use super::*;

    #[test]
    fn new_creates_strategy_with_defaults() {
        let backoff = ExponentialBackoff::new();

        assert_eq!(backoff.base_delay, ExponentialBackoff::DEFAULT_BASE_DELAY);
        assert_eq!(backoff.max_delay, ExponentialBackoff::DEFAULT_MAX_DELAY);
        assert!((backoff.multiplier - ExponentialBackoff::DEFAULT_MULTIPLIER).abs() < f64::EPSILON);
    }

    #[test]
    fn default_trait_matches_new() {
        assert_eq!(ExponentialBackoff::new(), ExponentialBackoff::default());
    }

    #[test]
    fn default_base_delay_is_10_seconds() {
        assert_eq!(ExponentialBackoff::DEFAULT_BASE_DELAY, Duration::from_secs(10));
    }

    #[test]
    fn default_multiplier_is_2() {
        assert!((ExponentialBackoff::DEFAULT_MULTIPLIER - 2.0).abs() < f64::EPSILON);
    }
}

mod exponential_builder {
    use super::*;

    #[test]
    fn with_base_delay_sets_value() {
        let delay = Duration::from_millis(100);
        let backoff = ExponentialBackoff::new().with_base_delay(delay);
        assert_eq!(backoff.base_delay, delay);
    }

    #[test]
    fn with_max_delay_sets_value() {
        let delay = Duration::from_secs(120);
        let backoff = ExponentialBackoff::new().with_max_delay(delay);
        assert_eq!(backoff.max_delay, delay);
    }

    #[test]
    fn with_multiplier_sets_value() {
        let backoff = ExponentialBackoff::new().with_multiplier(1.5);
        assert!((backoff.multiplier - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    #[should_panic(expected = "multiplier must be a finite number >= 1.0")]
    fn with_multiplier_below_one_panics() {
        let _ = ExponentialBackoff::new().with_multiplier(0.5);
    }

    #[test]
    #[should_panic(expected = "multiplier must be a finite number >= 1.0")]
    fn with_multiplier_infinite_panics() {
        let _ = ExponentialBackoff::new().with_multiplier(f64::INFINITY);
    }
}

mod exponential_delays {
    use super::*;

    fn backoff() -> ExponentialBackoff {
        ExponentialBackoff::new()
            .with_base_delay(Duration::from_secs(5))
            .with_max_delay(Duration::from_secs(60))
    }

    #[test]
    fn first_attempt_returns_base_delay() {
        assert_eq!(backoff().delay_after_attempt(1), Duration::from_secs(5));
    }

    #[test]
    fn attempt_zero_is_treated_as_first() {
        assert_eq!(backoff().delay_after_attempt(0), Duration::from_secs(5));
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let backoff = backoff();
        assert_eq!(backoff.delay_after_attempt(2), Duration::from_secs(10));
        assert_eq!(backoff.delay_after_attempt(3), Duration::from_secs(20));
        assert_eq!(backoff.delay_after_attempt(4), Duration::from_secs(40));
    }

    #[test]
    fn delay_is_capped_at_max() {
        // 5 * 2^4 = 80 -> capped at 60
        assert_eq!(backoff().delay_after_attempt(5), Duration::from_secs(60));
    }

    #[test]
    fn huge_attempt_number_caps_at_max() {
        assert_eq!(backoff().delay_after_attempt(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn cap_below_base_keeps_base_delay() {
        let backoff = ExponentialBackoff::new()
            .with_base_delay(Duration::from_secs(30))
            .with_max_delay(Duration::from_secs(5));

        assert_eq!(backoff.delay_after_attempt(1), Duration::from_secs(30));
        assert_eq!(backoff.delay_after_attempt(4), Duration::from_secs(30));
    }

    #[test]
    fn delays_never_decrease() {
        let backoff = ExponentialBackoff::new()
            .with_base_delay(Duration::from_millis(250))
            .with_max_delay(Duration::from_secs(3600))
            .with_multiplier(1.7);

        let mut previous = backoff.delay_after_attempt(1);
        for attempt in 2..200 {
            let current = backoff.delay_after_attempt(attempt);
            assert!(current >= previous, "attempt {attempt}: {current:?} < {previous:?}");
            previous = current;
        }
    }

    #[test]
    fn fractional_multiplier_works() {
        let backoff = ExponentialBackoff::new()
            .with_base_delay(Duration::from_secs(4))
            .with_multiplier(1.5);

        assert_eq!(backoff.delay_after_attempt(1), Duration::from_secs(4));
        assert_eq!(backoff.delay_after_attempt(2), Duration::from_secs(6));
        assert_eq!(backoff.delay_after_attempt(3), Duration::from_secs(9));
    }

    #[test]
    fn multiplier_of_one_keeps_constant_delay() {
        let backoff = backoff().with_multiplier(1.0);

        for attempt in 1..6 {
            assert_eq!(backoff.delay_after_attempt(attempt), Duration::from_secs(5));
        }
    }
}

mod constant {
    use super::*;

    #[test]
    fn returns_same_delay_for_every_attempt() {
        let backoff = ConstantBackoff::new(Duration::from_secs(3));

        for attempt in [1, 2, 10, u32::MAX] {
            assert_eq!(backoff.delay_after_attempt(attempt), Duration::from_secs(3));
        }
    }
}

mod lookup_by_name {
    use super::*;

    #[test]
    fn exponential_uses_given_parameters() {
        let params = ExponentialBackoff::new().with_base_delay(Duration::from_secs(2));
        let backoff = backoff_by_name("exponential", &params).unwrap();

        assert_eq!(backoff.delay_after_attempt(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_after_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn constant_uses_base_delay() {
        let params = ExponentialBackoff::new().with_base_delay(Duration::from_secs(7));
        let backoff = backoff_by_name("Constant", &params).unwrap();

        assert_eq!(backoff.delay_after_attempt(5), Duration::from_secs(7));
    }

    #[test]
    fn unknown_name_is_configuration_error() {
        let err = backoff_by_name("fibonacci", &ExponentialBackoff::new()).unwrap_err();

        assert_eq!(
            err,
            ConfigurationError::InvalidBackoffStrategy("fibonacci".to_string())
        );
    }
}

mod traits {
    use super::*;

    #[test]
    fn strategies_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExponentialBackoff>();
        assert_send_sync::<ConstantBackoff>();
    }

    #[test]
    fn debug_format_is_readable() {
        let debug = format!("{:?}", ExponentialBackoff::new());

        assert!(debug.contains("ExponentialBackoff"));
        assert!(debug.contains("base_delay"));
    }
}
