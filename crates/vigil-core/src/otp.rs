//! Spoken one-time codes for second-factor approval
//!
//! A pending challenge is a 4-digit code tied to the transaction amount and
//! the language it is spoken in. Exactly one rendered artifact is retained at
//! a time: every issue and resend releases the previous artifact.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};
use crate::policy::Tier;
use crate::speech::{ArtifactRef, SpeechRenderer};

/// Lowest issued code
pub const OTP_MIN: u32 = 1000;
/// Highest issued code
pub const OTP_MAX: u32 = 9999;

/// Language a code is spoken in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Hindi,
    Tamil,
    Telugu,
}

impl Language {
    /// All supported languages
    pub const ALL: [Language; 4] = [
        Language::English,
        Language::Hindi,
        Language::Tamil,
        Language::Telugu,
    ];

    /// Two-letter language code
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Tamil => "ta",
            Language::Telugu => "te",
        }
    }

    /// Prompt asking the listener to enter `code`
    pub fn prompt(self, code: &str) -> String {
        match self {
            Language::English => format!("Please enter this number {}", code),
            Language::Hindi => format!("कृपया यह संख्या दर्ज करें {}", code),
            Language::Tamil => format!("இந்த எண்ணை உள்ளிடவும் {}", code),
            Language::Telugu => format!("దయచేసి ఈ సంఖ్యను నమోదు చేయండి {}", code),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "en" | "english" => Ok(Language::English),
            "hi" | "hindi" => Ok(Language::Hindi),
            "ta" | "tamil" => Ok(Language::Tamil),
            "te" | "telugu" => Ok(Language::Telugu),
            other => Err(Error::InvalidInput(format!("unsupported language '{}'", other))),
        }
    }
}

/// A live second-factor challenge
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct PendingOtp {
    code: String,
    amount: u64,
    #[zeroize(skip)]
    tier: Tier,
    #[zeroize(skip)]
    language: Language,
    #[zeroize(skip)]
    artifact: ArtifactRef,
    #[zeroize(skip)]
    created_at: DateTime<Utc>,
}

impl PendingOtp {
    /// The expected code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Transaction amount awaiting approval
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Tier the amount was classified into
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Requested language
    pub fn language(&self) -> Language {
        self.language
    }

    /// The rendered artifact
    pub fn artifact(&self) -> &ArtifactRef {
        &self.artifact
    }

    /// When the code was issued
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Check a restored challenge holds a code this module could have issued
    pub(crate) fn check(&self) -> std::result::Result<(), String> {
        let issued = self.code.len() == 4
            && self.code.bytes().all(|b| b.is_ascii_digit())
            && self
                .code
                .parse::<u32>()
                .map_or(false, |n| (OTP_MIN..=OTP_MAX).contains(&n));
        if !issued {
            return Err("pending OTP code is malformed".to_string());
        }
        if self.amount == 0 {
            return Err("pending OTP has no amount".to_string());
        }
        Ok(())
    }
}

impl fmt::Debug for PendingOtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOtp")
            .field("code", &"****")
            .field("amount", &self.amount)
            .field("tier", &self.tier)
            .field("language", &self.language)
            .field("artifact", &self.artifact)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Result of checking a code candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Approved,
    Rejected,
}

/// Issues, verifies and re-rolls one-time codes
///
/// Holds no challenge itself; the single pending slot is owned by the
/// session and passed in by reference.
#[derive(Clone)]
pub struct OtpChallenge {
    renderer: Arc<dyn SpeechRenderer>,
    ttl: Option<Duration>,
}

impl OtpChallenge {
    /// Create a challenge driver without expiry
    pub fn new(renderer: Arc<dyn SpeechRenderer>) -> Self {
        Self { renderer, ttl: None }
    }

    /// Expire codes older than `ttl`
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Draw a uniformly random code in `OTP_MIN..=OTP_MAX`
    pub fn generate_code() -> String {
        rand::thread_rng().gen_range(OTP_MIN..=OTP_MAX).to_string()
    }

    /// Issue a new challenge into `slot`, replacing and releasing any previous one
    ///
    /// The new artifact is rendered before anything is released, so a total
    /// rendering failure leaves `slot` untouched.
    pub fn issue<'a>(
        &self,
        slot: &'a mut Option<PendingOtp>,
        amount: u64,
        tier: Tier,
        language: Language,
    ) -> Result<&'a PendingOtp> {
        let previous = slot.as_ref().map(|p| p.code.as_str());
        let mut code = Self::generate_code();
        while Some(code.as_str()) == previous {
            code = Self::generate_code();
        }

        let artifact = self.render_with_fallback(&code, language)?;

        self.discard(slot);
        info!("Issued OTP for amount {} ({})", amount, language);

        let pending: &'a PendingOtp = slot.insert(PendingOtp {
            code,
            amount,
            tier,
            language,
            artifact,
            created_at: Utc::now(),
        });
        Ok(pending)
    }

    /// Re-roll the pending challenge with the same amount and language
    pub fn resend<'a>(&self, slot: &'a mut Option<PendingOtp>) -> Result<&'a PendingOtp> {
        let (amount, tier, language) = match slot.as_ref() {
            Some(p) => (p.amount, p.tier, p.language),
            None => return Err(Error::InvalidState("no pending OTP to resend".to_string())),
        };
        self.issue(slot, amount, tier, language)
    }

    /// Check a candidate against the pending code
    ///
    /// Exact string match. Expired codes never match.
    pub fn verify(&self, candidate: &str, pending: &PendingOtp) -> VerifyOutcome {
        self.verify_at(candidate, pending, Utc::now())
    }

    /// [`verify`](Self::verify) as of `now`
    pub fn verify_at(
        &self,
        candidate: &str,
        pending: &PendingOtp,
        now: DateTime<Utc>,
    ) -> VerifyOutcome {
        if self.is_expired(pending, now) {
            warn!("OTP for amount {} expired", pending.amount);
            return VerifyOutcome::Rejected;
        }

        if candidate == pending.code {
            VerifyOutcome::Approved
        } else {
            VerifyOutcome::Rejected
        }
    }

    /// Whether `pending` has outlived the configured TTL at `now`
    pub fn is_expired(&self, pending: &PendingOtp, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => (now - pending.created_at)
                .to_std()
                .map(|age| age > ttl)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Drop the pending challenge and release its artifact
    pub fn discard(&self, slot: &mut Option<PendingOtp>) {
        if let Some(old) = slot.take() {
            if let Err(e) = self.renderer.release(&old.artifact) {
                warn!("Failed to release OTP artifact {}: {}", old.artifact, e);
            } else {
                debug!("Released OTP artifact {}", old.artifact);
            }
        }
    }

    fn render_with_fallback(&self, code: &str, language: Language) -> Result<ArtifactRef> {
        match self.renderer.render(&language.prompt(code), language) {
            Ok(artifact) => return Ok(artifact),
            Err(e) if language != Language::default() => {
                warn!("Rendering OTP in {} failed, falling back: {}", language, e);
            }
            Err(e) => return Err(Error::ArtifactUnavailable(e.to_string())),
        }

        let fallback = Language::default();
        self.renderer
            .render(&fallback.prompt(code), fallback)
            .map_err(|e| Error::ArtifactUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::MemoryRenderer;

    fn challenge() -> (Arc<MemoryRenderer>, OtpChallenge) {
        let renderer = Arc::new(MemoryRenderer::new());
        (renderer.clone(), OtpChallenge::new(renderer))
    }

    #[test]
    fn test_code_range() {
        for _ in 0..1000 {
            let code = OtpChallenge::generate_code();
            assert_eq!(code.len(), 4);
            let n: u32 = code.parse().unwrap();
            assert!((OTP_MIN..=OTP_MAX).contains(&n));
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let (renderer, otp) = challenge();
        let mut slot = None;
        let pending = otp.issue(&mut slot, 20_000, Tier::RequireOtp, Language::Hindi).unwrap();
        let code = pending.code().to_string();

        let (language, text) = renderer.get(pending.artifact()).unwrap();
        assert_eq!(language, Language::Hindi);
        assert!(text.ends_with(&code));

        let pending = slot.as_ref().unwrap();
        assert_eq!(otp.verify(&code, pending), VerifyOutcome::Approved);
        assert_eq!(otp.verify(&format!("{} ", code), pending), VerifyOutcome::Rejected);
        assert_eq!(otp.verify("", pending), VerifyOutcome::Rejected);
    }

    #[test]
    fn test_reissue_releases_previous_artifact() {
        let (renderer, otp) = challenge();
        let mut slot = None;
        let first = otp
            .issue(&mut slot, 9_000, Tier::RequireOtp, Language::English)
            .unwrap()
            .clone();

        let second = otp.resend(&mut slot).unwrap().clone();
        assert_ne!(first.code(), second.code());
        assert_eq!(second.amount(), 9_000);
        assert_eq!(second.language(), Language::English);
        assert!(!renderer.is_live(first.artifact()));
        assert!(renderer.is_live(second.artifact()));
        assert_eq!(renderer.live_count(), 1);
    }

    #[test]
    fn test_fallback_language() {
        let (renderer, otp) = challenge();
        renderer.fail_language(Language::Telugu);

        let mut slot = None;
        let pending = otp.issue(&mut slot, 6_000, Tier::RequireOtp, Language::Telugu).unwrap();
        assert_eq!(pending.language(), Language::Telugu);

        let (rendered_in, text) = renderer.get(pending.artifact()).unwrap();
        assert_eq!(rendered_in, Language::English);
        assert!(text.starts_with("Please enter this number"));
    }

    #[test]
    fn test_total_render_failure_keeps_previous() {
        let (renderer, otp) = challenge();
        let mut slot = None;
        let first = otp
            .issue(&mut slot, 6_000, Tier::RequireOtp, Language::English)
            .unwrap()
            .clone();

        renderer.fail_language(Language::English);
        assert!(matches!(
            otp.resend(&mut slot),
            Err(Error::ArtifactUnavailable(_))
        ));

        let kept = slot.as_ref().unwrap();
        assert_eq!(kept.code(), first.code());
        assert!(renderer.is_live(kept.artifact()));
    }

    #[test]
    fn test_resend_without_pending() {
        let (_, otp) = challenge();
        let mut slot = None;
        assert!(matches!(otp.resend(&mut slot), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_discard_releases() {
        let (renderer, otp) = challenge();
        let mut slot = None;
        otp.issue(&mut slot, 6_000, Tier::RequireOtp, Language::English).unwrap();
        otp.discard(&mut slot);
        assert!(slot.is_none());
        assert_eq!(renderer.live_count(), 0);
    }

    #[test]
    fn test_expiry() {
        let (_, otp) = challenge();
        let otp = otp.with_ttl(Some(Duration::from_secs(60)));
        let mut slot = None;
        let pending = otp.issue(&mut slot, 6_000, Tier::RequireOtp, Language::English).unwrap();

        assert!(!otp.is_expired(pending, Utc::now()));
        let later = pending.created_at() + chrono::Duration::seconds(61);
        assert!(otp.is_expired(pending, later));
    }

    #[test]
    fn test_expired_code_rejected() {
        let (_, otp) = challenge();
        let otp = otp.with_ttl(Some(Duration::from_secs(60)));
        let mut slot = None;
        let pending = otp.issue(&mut slot, 6_000, Tier::RequireOtp, Language::English).unwrap();
        let code = pending.code().to_string();

        let soon = pending.created_at() + chrono::Duration::seconds(30);
        assert_eq!(otp.verify_at(&code, pending, soon), VerifyOutcome::Approved);

        let late = pending.created_at() + chrono::Duration::seconds(61);
        assert_eq!(otp.verify_at(&code, pending, late), VerifyOutcome::Rejected);
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let (_, otp) = challenge();
        let mut slot = None;
        let pending = otp.issue(&mut slot, 6_000, Tier::RequireOtp, Language::English).unwrap();
        let code = pending.code().to_string();

        let much_later = pending.created_at() + chrono::Duration::days(365);
        assert_eq!(otp.verify_at(&code, pending, much_later), VerifyOutcome::Approved);
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("hi".parse::<Language>().unwrap(), Language::Hindi);
        assert_eq!("TA".parse::<Language>().unwrap(), Language::Tamil);
        assert_eq!("".parse::<Language>().unwrap(), Language::English);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_debug_redacts_code() {
        let (_, otp) = challenge();
        let mut slot = None;
        let pending = otp.issue(&mut slot, 6_000, Tier::RequireOtp, Language::English).unwrap();
        let printed = format!("{:?}", pending);
        assert!(!printed.contains(pending.code()));
    }
}
