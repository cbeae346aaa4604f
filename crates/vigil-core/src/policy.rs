//! Amount-tiered authorization policy

use serde::{Deserialize, Serialize};

/// Default soft threshold: amounts at or below are approved outright
pub const DEFAULT_LOW_THRESHOLD: u64 = 5_000;
/// Default hard threshold: amounts above also raise a security alert
pub const DEFAULT_HIGH_THRESHOLD: u64 = 50_000;

/// Verification strength required for an amount
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    /// PIN alone is enough
    AutoApprove,
    /// PIN plus spoken one-time code
    RequireOtp,
    /// One-time code, and owner plus trusted contact are alerted at once
    RequireOtpWithAlert,
}

impl Tier {
    /// Whether this tier alerts both channels at classification time
    pub fn alerts(self) -> bool {
        matches!(self, Tier::RequireOtpWithAlert)
    }
}

/// Map an amount to its tier
pub fn classify(amount: u64, low_threshold: u64, high_threshold: u64) -> Tier {
    if amount <= low_threshold {
        Tier::AutoApprove
    } else if amount <= high_threshold {
        Tier::RequireOtp
    } else {
        Tier::RequireOtpWithAlert
    }
}

/// Threshold pair plus the high-tier OTP switch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPolicy {
    /// Amounts at or below are auto-approved
    #[serde(default = "default_low")]
    pub low_threshold: u64,
    /// Amounts above trigger the alert tier
    #[serde(default = "default_high")]
    pub high_threshold: u64,
    /// Whether the alert tier still requires the one-time code
    ///
    /// When `false`, alert-tier transactions are approved right after the
    /// alerts are sent.
    #[serde(default = "default_true")]
    pub high_value_requires_otp: bool,
}

fn default_low() -> u64 {
    DEFAULT_LOW_THRESHOLD
}

fn default_high() -> u64 {
    DEFAULT_HIGH_THRESHOLD
}

fn default_true() -> bool {
    true
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self {
            low_threshold: DEFAULT_LOW_THRESHOLD,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
            high_value_requires_otp: true,
        }
    }
}

impl AuthorizationPolicy {
    /// Classify an amount under this policy's thresholds
    pub fn classify(&self, amount: u64) -> Tier {
        classify(amount, self.low_threshold, self.high_threshold)
    }

    /// Whether a tier must pass the one-time-code step
    pub fn requires_otp(&self, tier: Tier) -> bool {
        match tier {
            Tier::AutoApprove => false,
            Tier::RequireOtp => true,
            Tier::RequireOtpWithAlert => self.high_value_requires_otp,
        }
    }
}
