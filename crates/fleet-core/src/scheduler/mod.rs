//! Interval-with-jitter timing for the autonomy and swing loops.
//!
//! The one piece both loops need: "next tick is roughly `interval` away,
//! with a little random spread so two loops don't fire in lockstep."

use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Computes jittered tick intervals for a periodic loop.
#[derive(Debug)]
pub struct Scheduler {
    rng: StdRng,
}

impl Scheduler {
    /// Create a new scheduler seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Create a scheduler with a specific seed (for reproducible testing).
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Compute the next tick interval: `base` with up to `jitter_frac` of
    /// `base` added or subtracted at random.
    ///
    /// `jitter_frac` is clamped to `[0.0, 1.0]`. With `jitter_frac == 0.0`
    /// this returns `base` unchanged.
    #[must_use]
    pub fn jittered_interval(&mut self, base: Duration, jitter_frac: f64) -> Duration {
        let jitter_frac = jitter_frac.clamp(0.0, 1.0);
        if jitter_frac == 0.0 {
            return base;
        }
        let base_secs = base.as_secs_f64();
        let spread = base_secs * jitter_frac;
        let delta = self.rng.random_range(-spread..=spread);
        Duration::from_secs_f64((base_secs + delta).max(0.0))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_jitter_is_exact() {
        let mut scheduler = Scheduler::with_seed(1);
        let interval = scheduler.jittered_interval(Duration::from_secs(30), 0.0);
        assert_eq!(interval, Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let mut scheduler = Scheduler::with_seed(7);
        for _ in 0..1_000 {
            let interval = scheduler.jittered_interval(Duration::from_secs(60), 0.1);
            assert!(interval.as_secs_f64() >= 54.0);
            assert!(interval.as_secs_f64() <= 66.0);
        }
    }

    #[test]
    fn seeded_scheduler_is_reproducible() {
        let mut s1 = Scheduler::with_seed(42);
        let mut s2 = Scheduler::with_seed(42);
        for _ in 0..5 {
            assert_eq!(
                s1.jittered_interval(Duration::from_secs(10), 0.2),
                s2.jittered_interval(Duration::from_secs(10), 0.2)
            );
        }
    }
}
