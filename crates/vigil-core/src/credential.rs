//! Credential storage with secure PIN hashing
//!
//! The PIN gates every transaction. It is hashed with Argon2id and only the
//! PHC string is ever kept, alongside the two alert destinations.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Minimum PIN length
pub const MIN_PIN_LENGTH: usize = 4;
/// Maximum PIN length
pub const MAX_PIN_LENGTH: usize = 12;

/// Stored credential: hashed PIN plus notification endpoints
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    /// Argon2id hash of the PIN (PHC string format)
    pin_hash: String,
    /// The subject's own alert destination
    owner_channel: String,
    /// The trusted contact's alert destination
    trusted_channel: String,
}

impl Credential {
    /// Alert destination of the subject
    pub fn owner_channel(&self) -> &str {
        &self.owner_channel
    }

    /// Alert destination of the trusted contact
    pub fn trusted_channel(&self) -> &str {
        &self.trusted_channel
    }

    /// Check a restored record: the hash must parse and both channels exist
    pub(crate) fn check(&self) -> std::result::Result<(), String> {
        PasswordHash::new(&self.pin_hash).map_err(|e| format!("unreadable PIN hash: {}", e))?;
        if self.owner_channel.trim().is_empty() || self.trusted_channel.trim().is_empty() {
            return Err("credential is missing an alert channel".to_string());
        }
        Ok(())
    }
}

/// Holds at most one credential and verifies PIN candidates against it
#[derive(Clone, Debug, Default)]
pub struct CredentialStore {
    credential: Option<Credential>,
}

impl CredentialStore {
    /// Create an empty, unconfigured store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a persisted credential
    pub fn restore(credential: Option<Credential>) -> Self {
        Self { credential }
    }

    /// Check if a credential has been set up
    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }

    /// The current credential, if any
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Set up (or overwrite) the credential
    ///
    /// Resetting the attempt counter is the caller's job; see
    /// [`crate::session::TransactionSession::setup`].
    pub fn setup(&mut self, pin: &str, owner_channel: &str, trusted_channel: &str) -> Result<()> {
        Self::validate_pin(pin)?;
        let owner_channel = Self::validate_channel("owner", owner_channel)?;
        let trusted_channel = Self::validate_channel("trusted", trusted_channel)?;

        let salt = SaltString::generate(&mut OsRng);
        let pin_bytes = Zeroizing::new(pin.as_bytes().to_vec());
        let pin_hash = Argon2::default()
            .hash_password(&pin_bytes, &salt)
            .map_err(|e| Error::Crypto(format!("Failed to hash PIN: {}", e)))?
            .to_string();

        self.credential = Some(Credential {
            pin_hash,
            owner_channel,
            trusted_channel,
        });

        Ok(())
    }

    /// Verify a PIN candidate against the stored hash
    ///
    /// Comparison goes through Argon2 verification, never raw string equality.
    pub fn verify_pin(&self, candidate: &str) -> Result<bool> {
        let credential = self.credential.as_ref().ok_or(Error::NotConfigured)?;

        let parsed_hash = PasswordHash::new(&credential.pin_hash)
            .map_err(|e| Error::Crypto(format!("Invalid stored hash: {}", e)))?;

        let pin_bytes = Zeroizing::new(candidate.as_bytes().to_vec());
        Ok(Argon2::default()
            .verify_password(&pin_bytes, &parsed_hash)
            .is_ok())
    }

    fn validate_pin(pin: &str) -> Result<()> {
        if pin.len() < MIN_PIN_LENGTH || pin.len() > MAX_PIN_LENGTH {
            return Err(Error::InvalidInput(format!(
                "PIN must be {}-{} digits",
                MIN_PIN_LENGTH, MAX_PIN_LENGTH
            )));
        }

        if !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidInput("PIN must contain only digits".to_string()));
        }

        Ok(())
    }

    fn validate_channel(which: &str, channel: &str) -> Result<String> {
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(Error::InvalidInput(format!("{} channel is required", which)));
        }
        Ok(channel.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> CredentialStore {
        let mut store = CredentialStore::new();
        store.setup("1234", "+15550001", "+15550002").unwrap();
        store
    }

    #[test]
    fn test_setup_and_verify() {
        let store = configured();
        assert!(store.is_configured());
        assert!(store.verify_pin("1234").unwrap());
        assert!(!store.verify_pin("4321").unwrap());
        assert!(!store.verify_pin("").unwrap());
    }

    #[test]
    fn test_verify_without_setup() {
        let store = CredentialStore::new();
        assert!(matches!(store.verify_pin("1234"), Err(Error::NotConfigured)));
    }

    #[test]
    fn test_pin_validation() {
        let mut store = CredentialStore::new();

        // Too short
        assert!(matches!(
            store.setup("123", "a", "b"),
            Err(Error::InvalidInput(_))
        ));

        // Too long
        assert!(store.setup("1234567890123", "a", "b").is_err());

        // Non-digits
        assert!(store.setup("12a4", "a", "b").is_err());

        assert!(!store.is_configured());
    }

    #[test]
    fn test_empty_channels_rejected() {
        let mut store = CredentialStore::new();
        assert!(matches!(
            store.setup("1234", "", "b"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            store.setup("1234", "a", "   "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_plaintext_never_stored() {
        let store = configured();
        let credential = store.credential().unwrap();
        assert!(!credential.pin_hash.contains("1234"));
        assert!(credential.pin_hash.starts_with("$argon2id$"));
        assert_eq!(credential.owner_channel(), "+15550001");
        assert_eq!(credential.trusted_channel(), "+15550002");
    }

    #[test]
    fn test_resetup_overwrites() {
        let mut store = configured();
        store.setup("9876", "owner", "trusted").unwrap();
        assert!(!store.verify_pin("1234").unwrap());
        assert!(store.verify_pin("9876").unwrap());
    }
}
