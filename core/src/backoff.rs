//! Exponential backoff with jitter.
//!
//! One policy object is shared by the session's connect retry loop and the
//! transport monitor's reconnect loop; the attempt counter lives in
//! [`Backoff`] so a success can reset it.

use std::time::Duration;

/// Backoff curve parameters
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// First delay
    pub base: Duration,
    /// Multiplier applied per attempt
    pub factor: f64,
    /// Fractional jitter applied symmetrically (0.2 = +/-20%)
    pub jitter: f64,
    /// Upper bound on any delay
    pub cap: Duration,
}

impl BackoffPolicy {
    /// Transport reconnect curve: base 2s, factor 2.0, jitter 0.2, cap 60s.
    pub fn transport() -> Self {
        Self {
            base: Duration::from_secs(2),
            factor: 2.0,
            jitter: 0.2,
            cap: Duration::from_secs(60),
        }
    }

    /// Session connect retry curve: base 1s, doubling, cap 30s, no jitter.
    pub fn session() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2.0,
            jitter: 0.0,
            cap: Duration::from_secs(30),
        }
    }

    /// Delay for the given zero-based attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let raw = self.base.as_secs_f64() * self.factor.powi(attempt.min(32) as i32);
        let capped = raw.min(self.cap.as_secs_f64());

        let jittered = if self.jitter > 0.0 {
            let spread = capped * self.jitter;
            capped - spread + rand::random::<f64>() * 2.0 * spread
        } else {
            capped
        };

        Duration::from_secs_f64(jittered.min(self.cap.as_secs_f64()))
    }
}

/// Attempt counter over a [`BackoffPolicy`].
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay for the current attempt, advancing the counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Attempts consumed since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Called on success so the next failure starts from the base delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_curve_doubles_and_caps() {
        let policy = BackoffPolicy::session();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(10), Duration::from_secs(30));
    }

    #[test]
    fn test_transport_jitter_stays_in_band() {
        let policy = BackoffPolicy::transport();
        for attempt in 0..8 {
            let d = policy.delay(attempt).as_secs_f64();
            let nominal = (2.0_f64 * 2.0_f64.powi(attempt as i32)).min(60.0);
            assert!(d >= nominal * 0.8 - 1e-6, "attempt {attempt}: {d} too small");
            assert!(d <= 60.0 + 1e-6, "attempt {attempt}: {d} above cap");
        }
    }

    #[test]
    fn test_counter_advances_and_resets() {
        let mut backoff = Backoff::new(BackoffPolicy::session());
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.attempt(), 2);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
