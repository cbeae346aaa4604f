//! Transaction authorization state machine
//!
//! ```text
//! Idle --submit--> PinCheck --+--> Approved --> Idle
//!                             +--> OtpPending --submit_otp ok--> Approved --> Idle
//!                             |        ^  |
//!                             |        +--+ submit_otp mismatch / resend_otp
//!                             +--> Locked (alert trusted contact) --> Idle
//! ```
//!
//! Every mutating operation persists the resulting state before returning.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::attempts::{AttemptGuard, LockoutOutcome};
use crate::config::{AlertConfig, VigilConfig};
use crate::credential::CredentialStore;
use crate::error::{Error, Result};
use crate::notify::{dispatch, high_value_message, lockout_message, NotificationChannel};
use crate::otp::{Language, OtpChallenge, PendingOtp, VerifyOutcome};
use crate::policy::{AuthorizationPolicy, Tier};
use crate::speech::{ArtifactRef, SpeechRenderer};
use crate::store::{StateStore, StoreError, StoredState};

/// Observable session state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No challenge outstanding
    Idle,
    /// Waiting for the spoken code
    OtpPending,
}

/// Non-error results of session operations
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Transaction authorized
    Approved { amount: u64, tier: Tier },
    /// A code was issued (or re-issued on request)
    OtpIssued {
        amount: u64,
        tier: Tier,
        artifact: ArtifactRef,
    },
    /// Wrong code; a fresh one was issued
    OtpRejectedRetry { artifact: ArtifactRef },
}

/// Result of a session operation
pub type SessionResult = Result<SessionOutcome>;

/// Summary of an outstanding challenge, without the code
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSummary {
    pub amount: u64,
    pub tier: Tier,
    pub language: Language,
    pub artifact: ArtifactRef,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time view of a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    pub configured: bool,
    pub state: SessionState,
    pub failure_count: u32,
    pub attempts_remaining: u32,
    pub pending: Option<PendingSummary>,
}

/// Parse a user-entered amount
///
/// Only plain ASCII digits are accepted and the value must be positive.
pub fn parse_amount(input: &str) -> Result<u64> {
    let input = input.trim();
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidAmount(format!("'{}' is not a whole number", input)));
    }

    let amount: u64 = input
        .parse()
        .map_err(|_| Error::InvalidAmount(format!("'{}' is too large", input)))?;
    if amount == 0 {
        return Err(Error::InvalidAmount("amount must be positive".to_string()));
    }
    Ok(amount)
}

/// Per-subject authorization context
///
/// Owns the attempt counter and the single pending-challenge slot; the
/// credential lives in its [`CredentialStore`].
pub struct TransactionSession {
    policy: AuthorizationPolicy,
    alerts: AlertConfig,
    credentials: CredentialStore,
    attempts: AttemptGuard,
    pending: Option<PendingOtp>,
    challenge: OtpChallenge,
    notifier: Arc<dyn NotificationChannel>,
    store: Box<dyn StateStore>,
}

impl TransactionSession {
    /// Open a session, restoring whatever the store holds
    ///
    /// A missing or corrupt record yields an unconfigured session.
    pub fn open(
        config: &VigilConfig,
        store: Box<dyn StateStore>,
        notifier: Arc<dyn NotificationChannel>,
        renderer: Arc<dyn SpeechRenderer>,
    ) -> Result<Self> {
        config.validate()?;

        let state = match store.load() {
            Ok(Some(state)) => state,
            Ok(None) => StoredState::default(),
            Err(StoreError::Corrupt(e)) => {
                warn!("Discarding unreadable session state: {}", e);
                StoredState::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            policy: config.policy.clone(),
            alerts: config.alerts.clone(),
            credentials: CredentialStore::restore(state.credential.clone()),
            attempts: AttemptGuard::restore(config.lockout.threshold, state.failure_count),
            pending: state.pending.clone(),
            challenge: OtpChallenge::new(renderer).with_ttl(config.otp.ttl()),
            notifier,
            store,
        })
    }

    /// Set up or replace the credential
    ///
    /// Resets the failure count and drops any pending challenge.
    pub fn setup(&mut self, pin: &str, owner_channel: &str, trusted_channel: &str) -> Result<()> {
        self.credentials.setup(pin, owner_channel, trusted_channel)?;
        self.attempts.record_success();
        self.challenge.discard(&mut self.pending);
        self.persist()?;
        info!("Credential set up");
        Ok(())
    }

    /// Submit a transaction amount with the PIN
    ///
    /// A new submission supersedes any outstanding challenge.
    pub fn submit(&mut self, amount: u64, pin: &str, language: Language) -> SessionResult {
        if amount == 0 {
            return Err(Error::InvalidAmount("amount must be positive".to_string()));
        }

        let matched = self.credentials.verify_pin(pin)?;

        if self.pending.is_some() {
            info!("New submission supersedes pending OTP");
            self.challenge.discard(&mut self.pending);
        }

        if !matched {
            return match self.attempts.record_failure() {
                LockoutOutcome::Continue(remaining) => {
                    warn!("Incorrect PIN, {} attempts remaining", remaining);
                    self.persist()?;
                    Err(Error::WrongPin(remaining))
                }
                LockoutOutcome::Lockout => {
                    warn!(
                        "PIN lockout after {} failed attempts",
                        self.attempts.threshold()
                    );
                    self.alert_lockout();
                    self.persist()?;
                    Err(Error::LockedOut)
                }
            };
        }

        self.attempts.record_success();
        let tier = self.policy.classify(amount);

        if tier.alerts() {
            self.alert_high_value(amount);
        }

        if !self.policy.requires_otp(tier) {
            self.persist()?;
            info!("Transaction of {} approved ({:?})", amount, tier);
            return Ok(SessionOutcome::Approved { amount, tier });
        }

        let artifact = match self
            .challenge
            .issue(&mut self.pending, amount, tier, language)
        {
            Ok(p) => p.artifact().clone(),
            Err(e) => {
                self.persist()?;
                return Err(e);
            }
        };
        self.persist_challenge()?;

        Ok(SessionOutcome::OtpIssued {
            amount,
            tier,
            artifact,
        })
    }

    /// Submit the spoken code for the pending transaction
    pub fn submit_otp(&mut self, code: &str) -> SessionResult {
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no OTP challenge pending".to_string()))?;

        let verdict = self.challenge.verify(code, pending);
        let (amount, tier) = (pending.amount(), pending.tier());

        match verdict {
            VerifyOutcome::Approved => {
                self.challenge.discard(&mut self.pending);
                self.persist()?;
                info!("Transaction of {} approved with OTP", amount);
                Ok(SessionOutcome::Approved { amount, tier })
            }
            VerifyOutcome::Rejected => {
                warn!("OTP mismatch for transaction of {}, re-issuing", amount);
                match self.challenge.resend(&mut self.pending) {
                    Ok(p) => {
                        let artifact = p.artifact().clone();
                        self.persist_challenge()?;
                        Ok(SessionOutcome::OtpRejectedRetry { artifact })
                    }
                    Err(e) => {
                        // The rejected code must not stay valid
                        self.challenge.discard(&mut self.pending);
                        self.persist()?;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Re-issue the pending code with the same amount and language
    pub fn resend_otp(&mut self) -> SessionResult {
        if self.pending.is_none() {
            return Err(Error::InvalidState("no OTP challenge pending".to_string()));
        }

        let (amount, tier, artifact) = {
            let p = self.challenge.resend(&mut self.pending)?;
            (p.amount(), p.tier(), p.artifact().clone())
        };
        self.persist_challenge()?;
        info!("OTP re-sent for transaction of {}", amount);

        Ok(SessionOutcome::OtpIssued {
            amount,
            tier,
            artifact,
        })
    }

    /// Abandon the pending transaction, releasing its artifact
    pub fn abandon(&mut self) -> Result<()> {
        if self.pending.is_some() {
            self.challenge.discard(&mut self.pending);
            info!("Pending transaction abandoned");
        }
        self.persist()
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        if self.pending.is_some() {
            SessionState::OtpPending
        } else {
            SessionState::Idle
        }
    }

    /// The outstanding challenge, if any
    pub fn pending(&self) -> Option<&PendingOtp> {
        self.pending.as_ref()
    }

    /// Whether a credential exists
    pub fn is_configured(&self) -> bool {
        self.credentials.is_configured()
    }

    /// Consecutive PIN failures so far
    pub fn failure_count(&self) -> u32 {
        self.attempts.failure_count()
    }

    /// Snapshot for display
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            configured: self.is_configured(),
            state: self.state(),
            failure_count: self.attempts.failure_count(),
            attempts_remaining: self.attempts.remaining(),
            pending: self.pending.as_ref().map(|p| PendingSummary {
                amount: p.amount(),
                tier: p.tier(),
                language: p.language(),
                artifact: p.artifact().clone(),
                created_at: p.created_at(),
            }),
        }
    }

    fn alert_lockout(&self) {
        if let Some(credential) = self.credentials.credential() {
            let message = lockout_message(&self.alerts.subject_name, self.attempts.threshold());
            dispatch(self.notifier.as_ref(), credential.trusted_channel(), &message);
        }
    }

    fn alert_high_value(&self, amount: u64) {
        if let Some(credential) = self.credentials.credential() {
            warn!("High-value transaction of {} attempted", amount);
            let message = high_value_message(&self.alerts.currency, amount);
            dispatch(self.notifier.as_ref(), credential.owner_channel(), &message);
            dispatch(self.notifier.as_ref(), credential.trusted_channel(), &message);
        }
    }

    /// Save after issuing a challenge; an unsaved challenge is released
    fn persist_challenge(&mut self) -> Result<()> {
        if let Err(e) = self.persist() {
            warn!("Releasing OTP challenge that could not be saved");
            self.challenge.discard(&mut self.pending);
            return Err(e);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let state = StoredState {
            credential: self.credentials.credential().cloned(),
            failure_count: self.attempts.failure_count(),
            pending: self.pending.clone(),
            ..Default::default()
        };
        self.store.save(&state)?;
        Ok(())
    }
}
