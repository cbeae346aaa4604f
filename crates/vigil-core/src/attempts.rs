//! Consecutive PIN failure tracking
//!
//! A run of wrong PINs reaching the threshold trips a lockout. The lockout
//! itself resets the counter, so the subject starts over from a clean slate
//! while the trusted contact is alerted.

/// Default number of consecutive failures before lockout
pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 3;

/// Result of recording a failed PIN check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockoutOutcome {
    /// Retry allowed, with this many attempts left
    Continue(u32),
    /// Threshold reached; caller must alert and reset the flow
    Lockout,
}

/// Tracks consecutive PIN failures for the current subject
#[derive(Clone, Debug)]
pub struct AttemptGuard {
    threshold: u32,
    failure_count: u32,
}

impl Default for AttemptGuard {
    fn default() -> Self {
        Self::new(DEFAULT_LOCKOUT_THRESHOLD)
    }
}

impl AttemptGuard {
    /// Create a guard with the given threshold (at least 1)
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            failure_count: 0,
        }
    }

    /// Rebuild a guard from a persisted count
    ///
    /// The count is clamped below the threshold.
    pub fn restore(threshold: u32, failure_count: u32) -> Self {
        let mut guard = Self::new(threshold);
        guard.failure_count = failure_count.min(guard.threshold - 1);
        guard
    }

    /// Record a failed PIN check
    pub fn record_failure(&mut self) -> LockoutOutcome {
        self.failure_count += 1;
        if self.failure_count >= self.threshold {
            self.failure_count = 0;
            LockoutOutcome::Lockout
        } else {
            LockoutOutcome::Continue(self.threshold - self.failure_count)
        }
    }

    /// Record a successful PIN check
    pub fn record_success(&mut self) {
        self.failure_count = 0;
    }

    /// Current consecutive failure count
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Attempts left before lockout
    pub fn remaining(&self) -> u32 {
        self.threshold - self.failure_count
    }

    /// Configured lockout threshold
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
