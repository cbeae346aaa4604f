//! Vigil Core - PIN-gated transaction authorization
//!
//! This crate provides the authorization state machine:
//! - PIN setup and Argon2id verification
//! - Consecutive-failure lockout with a trusted-contact alert
//! - Amount-tiered policy (auto-approve, one-time code, code plus alert)
//! - Spoken one-time codes with re-roll on mismatch
//!
//! # Security Model
//!
//! - The PIN is never stored or compared in plaintext
//! - At most one challenge, and one rendered artifact, is live per subject
//! - Alerts and rendering degrade gracefully and never decide an outcome

pub mod attempts;
pub mod config;
pub mod credential;
pub mod error;
pub mod notify;
pub mod otp;
pub mod policy;
pub mod registry;
pub mod session;
pub mod speech;
pub mod store;

pub use attempts::{AttemptGuard, LockoutOutcome, DEFAULT_LOCKOUT_THRESHOLD};
pub use config::{ConfigError, VigilConfig};
pub use credential::{Credential, CredentialStore, MAX_PIN_LENGTH, MIN_PIN_LENGTH};
pub use error::{Error, Result};
pub use notify::{
    DeliveryError, LogNotifier, NotificationChannel, OutboxNotifier, RecordingNotifier,
};
pub use otp::{Language, OtpChallenge, PendingOtp, VerifyOutcome};
pub use policy::{classify, AuthorizationPolicy, Tier};
pub use registry::{SubjectId, SubjectRegistry};
pub use session::{
    parse_amount, SessionOutcome, SessionResult, SessionState, SessionStatus,
    TransactionSession,
};
pub use speech::{ArtifactRef, MemoryRenderer, RenderError, SpeechRenderer, TranscriptRenderer};
pub use store::{JsonFileStore, MemoryStore, StateStore, StoreError, StoredState};
