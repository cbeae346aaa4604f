//! User-facing messages for session results

use vigil_core::session::{SessionOutcome, SessionState, SessionStatus};
use vigil_core::{Error, Tier};

/// Message printed after a successful setup
pub const SETUP_OK: &str = "✅ PIN setup successful!";

/// Message printed after cancelling
pub const CANCELLED: &str = "Pending transaction cancelled.";

/// Which command produced an outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Submit,
    Code,
    Resend,
}

/// Render a successful outcome
pub fn outcome(outcome: &SessionOutcome, currency: &str, step: Step) -> String {
    match outcome {
        SessionOutcome::Approved { amount, tier } => match (step, tier) {
            (Step::Code, _) => format!(
                "✅ Transaction of {}{} Approved with Audio OTP!",
                currency, amount
            ),
            (_, Tier::RequireOtpWithAlert) => format!(
                "✅ Transaction of {}{} Approved! SMS alert sent.",
                currency, amount
            ),
            _ => format!("✅ Transaction of {}{} Approved!", currency, amount),
        },
        SessionOutcome::OtpIssued { tier, artifact, .. } => {
            let mut message = if step == Step::Resend {
                "🔊 A new OTP has been generated. Please listen to the audio.".to_string()
            } else {
                "🔊 Please listen to the audio and enter the code.".to_string()
            };
            if tier.alerts() && step == Step::Submit {
                message.push_str(
                    "\n⚠️  High-value attempt: SMS alert sent to you and your trusted contact.",
                );
            }
            message.push_str(&format!("\nAudio: {}", artifact));
            message
        }
        SessionOutcome::OtpRejectedRetry { artifact } => format!(
            "❌ Wrong OTP. New OTP generated. Listen to audio.\nAudio: {}",
            artifact
        ),
    }
}

/// Render a user-correctable error; `None` for failures that are not the user's
pub fn error(err: &Error) -> Option<String> {
    let message = match err {
        Error::InvalidInput(m) => format!("❌ {}", m),
        Error::InvalidAmount(_) => "❌ Please enter a valid amount.".to_string(),
        Error::NotConfigured => {
            "No PIN found! Please set up a PIN first with 'vigil setup'.".to_string()
        }
        Error::WrongPin(remaining) => format!("❌ Invalid PIN. {} attempts left.", remaining),
        Error::LockedOut => {
            "❌ Too many wrong attempts. Your trusted contact has been alerted.".to_string()
        }
        Error::InvalidState(_) => "No OTP is pending. Start with 'vigil pay'.".to_string(),
        Error::ArtifactUnavailable(m) => format!("❌ Could not produce the audio code: {}", m),
        Error::Storage(_) | Error::Crypto(_) | Error::Config(_) => return None,
    };
    Some(message)
}

/// Render a status snapshot
pub fn status(status: &SessionStatus, currency: &str) -> String {
    let mut lines = vec!["\n=== Vigil Status ===\n".to_string()];
    lines.push(format!(
        "Configured: {}",
        if status.configured { "yes" } else { "no" }
    ));
    lines.push(format!(
        "State: {}",
        match status.state {
            SessionState::Idle => "Idle",
            SessionState::OtpPending => "Awaiting OTP",
        }
    ));
    lines.push(format!(
        "Failed PIN attempts: {} ({} remaining)",
        status.failure_count, status.attempts_remaining
    ));

    if let Some(pending) = &status.pending {
        lines.push(format!(
            "Pending: {}{} ({:?}, {}) issued {}",
            currency,
            pending.amount,
            pending.tier,
            pending.language,
            pending.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        lines.push(format!("Audio: {}", pending.artifact));
    }

    lines.join("\n")
}
