//! Per-step retry rules, backed by `backon` backoff builders.

use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder};

#[derive(Debug, Clone)]
enum Policy {
    Never,
    Exponential(ExponentialBuilder),
    Constant(ConstantBuilder),
}

/// How often, and how far apart, a step that asked for a retry is re-run.
#[derive(Debug, Clone)]
pub struct RetryRule {
    name: &'static str,
    policy: Policy,
}

impl RetryRule {
    /// Ordinary cloud calls
    pub fn cloud() -> Self {
        Self::exponential("cloud", Duration::from_secs(2), Duration::from_secs(60), 5)
    }

    /// Cloud operations that take minutes to settle
    pub fn cloud_long_running() -> Self {
        Self::exponential(
            "cloud_long_running",
            Duration::from_secs(10),
            Duration::from_secs(300),
            10,
        )
    }

    /// Local bookkeeping that only fails on contention
    pub fn short_exponential() -> Self {
        Self::exponential(
            "short_exponential",
            Duration::from_secs(1),
            Duration::from_secs(8),
            4,
        )
    }

    pub fn none() -> Self {
        Self {
            name: "none",
            policy: Policy::Never,
        }
    }

    pub fn fixed(delay: Duration, times: usize) -> Self {
        Self {
            name: "fixed",
            policy: Policy::Constant(
                ConstantBuilder::default()
                    .with_delay(delay)
                    .with_max_times(times),
            ),
        }
    }

    fn exponential(name: &'static str, min: Duration, max: Duration, times: usize) -> Self {
        Self {
            name,
            policy: Policy::Exponential(
                ExponentialBuilder::default()
                    .with_min_delay(min)
                    .with_max_delay(max)
                    .with_max_times(times),
            ),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Delays before each retry; exhausted means give up.
    pub fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        match &self.policy {
            Policy::Never => Box::new(std::iter::empty()),
            Policy::Exponential(builder) => Box::new(builder.clone().build()),
            Policy::Constant(builder) => Box::new(builder.clone().build()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_retries() {
        assert_eq!(RetryRule::none().delays().count(), 0);
    }

    #[test]
    fn test_cloud_rule_is_bounded_and_growing() {
        let delays: Vec<_> = RetryRule::cloud().delays().collect();
        assert_eq!(delays.len(), 5);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(60)));
    }

    #[test]
    fn test_fixed_rule() {
        let delays: Vec<_> = RetryRule::fixed(Duration::from_millis(10), 3).delays().collect();
        assert_eq!(delays, vec![Duration::from_millis(10); 3]);
    }
}
