use crate::types::constants::DEFAULT_RECONNECT_DELAY_MS;
use std::time::Duration;

/// How long to wait before each reconnect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrySchedule {
    /// The same delay for every attempt.
    Fixed(Duration),
    /// A ladder of delays; once exhausted the last rung repeats.
    Intervals(Vec<Duration>),
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::Fixed(Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS))
    }
}

impl RetrySchedule {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Intervals(ladder) => ladder
                .get(attempt as usize)
                .or_else(|| ladder.last())
                .copied()
                .unwrap_or(Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS)),
        }
    }
}

/// Attempt bookkeeping for one session. The session resets it on every
/// successful authentication, so the cap applies per outage, not per
/// session lifetime.
#[derive(Debug)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    schedule: RetrySchedule,
    exhaustion_reported: bool,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, schedule: RetrySchedule) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            schedule,
            exhaustion_reported: false,
        }
    }

    /// Books one more attempt and returns its delay, or `None` once the
    /// cap is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        let delay = self.schedule.delay_for(self.attempts);
        self.attempts += 1;
        Some(delay)
    }

    /// Forgets past attempts. Called on every successful authentication
    /// and on a manual reopen.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.exhaustion_reported = false;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// True exactly once per exhaustion, so the cap is announced a
    /// single time however often the watcher wakes up.
    pub fn report_exhaustion(&mut self) -> bool {
        if self.exhaustion_reported {
            return false;
        }
        self.exhaustion_reported = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_schedule_caps_at_max_attempts() {
        let mut policy = ReconnectPolicy::new(3, RetrySchedule::Fixed(Duration::from_secs(5)));

        assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_delay(), None);
        assert!(policy.is_exhausted());
        assert_eq!(policy.attempts(), 3);
    }

    #[test]
    fn reset_rearms_the_policy() {
        let mut policy = ReconnectPolicy::new(1, RetrySchedule::default());
        policy.next_delay();
        assert!(policy.is_exhausted());

        policy.reset();
        assert!(!policy.is_exhausted());
        assert!(policy.next_delay().is_some());
    }

    #[test]
    fn interval_ladder_repeats_its_last_rung() {
        let ladder = RetrySchedule::Intervals(vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(5),
        ]);
        let mut policy = ReconnectPolicy::new(5, ladder);

        assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_delay(), None);
    }

    #[test]
    fn empty_ladder_falls_back_to_the_default_delay() {
        let mut policy = ReconnectPolicy::new(1, RetrySchedule::Intervals(Vec::new()));
        assert_eq!(
            policy.next_delay(),
            Some(Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS))
        );
    }

    #[test]
    fn exhaustion_is_reported_once() {
        let mut policy = ReconnectPolicy::new(0, RetrySchedule::default());
        assert_eq!(policy.next_delay(), None);
        assert!(policy.report_exhaustion());
        assert!(!policy.report_exhaustion());

        policy.reset();
        policy.next_delay();
        assert!(policy.report_exhaustion());
    }
}
