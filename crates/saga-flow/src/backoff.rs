use std::time::Duration;

/// Exponential delay schedule used between retries.
///
/// Yields the initial interval first, then multiplies it on every step.
/// There is no jitter, so the schedule is fully determined by its inputs.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    multiplier: f64,
}

impl Backoff {
    #[must_use]
    pub fn new(initial: Duration, multiplier: f64) -> Self {
        Self {
            current: initial,
            multiplier: multiplier.max(1.0),
        }
    }

    /// Schedule for `attempts` retries whose growth stays within 2x.
    ///
    /// The multiplier is `2^(1 / (attempts - 1))`, so applying it
    /// `attempts - 1` times doubles the initial interval and no delay handed
    /// out during those retries exceeds twice the initial one.
    #[must_use]
    pub fn bounded(initial: Duration, attempts: u32) -> Self {
        let steps = attempts.saturating_sub(1).max(1);
        Self::new(initial, 2f64.powf(1.0 / f64::from(steps)))
    }

    #[must_use]
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current;
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(Duration::MAX);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delay_is_the_initial_interval() {
        let mut backoff = Backoff::bounded(Duration::from_millis(100), 5);
        assert_eq!(backoff.next(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn bounded_growth_doubles_after_attempts_minus_one_steps() {
        let initial = Duration::from_millis(100);
        let delays: Vec<Duration> = Backoff::bounded(initial, 5).take(5).collect();

        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
        let last = delays[4].as_secs_f64();
        assert!((last - 0.2).abs() < 1e-6, "got {last}");
    }

    #[test]
    fn multiplier_for_three_attempts_is_square_root_of_two() {
        let backoff = Backoff::bounded(Duration::from_millis(10), 3);
        assert!((backoff.multiplier() - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn single_step_schedule_doubles() {
        let backoff = Backoff::bounded(Duration::from_millis(10), 1);
        assert!((backoff.multiplier() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn multiplier_below_one_is_clamped() {
        let mut backoff = Backoff::new(Duration::from_secs(1), 0.5);
        backoff.next();
        assert_eq!(backoff.next(), Some(Duration::from_secs(1)));
    }
}
