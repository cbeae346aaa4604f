//! Alert delivery to the owner and trusted contact
//!
//! Delivery is best effort. A failed alert is logged and never changes an
//! authorization decision.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Delivery failures
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Destination unreachable: {0}")]
    Unreachable(String),

    #[error("Delivery IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Delivery serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Sends a text message to an address
pub trait NotificationChannel: Send + Sync {
    /// Deliver `message` to `destination`
    fn send(&self, destination: &str, message: &str) -> Result<(), DeliveryError>;
}

/// Send and log on failure
pub(crate) fn dispatch(channel: &dyn NotificationChannel, destination: &str, message: &str) {
    match channel.send(destination, message) {
        Ok(()) => info!("Alert dispatched to {}", destination),
        Err(e) => warn!("Alert to {} not delivered: {}", destination, e),
    }
}

/// Lockout alert sent to the trusted contact
pub fn lockout_message(subject_name: &str, attempts: u32) -> String {
    format!("Alert: {} entered wrong PIN {} times!", subject_name, attempts)
}

/// High-value alert sent to both channels
pub fn high_value_message(currency: &str, amount: u64) -> String {
    format!(
        "Alert: High-value transaction of {}{} attempted.",
        currency, amount
    )
}

/// Channel that only writes the alert to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationChannel for LogNotifier {
    fn send(&self, destination: &str, message: &str) -> Result<(), DeliveryError> {
        info!(to = destination, "{}", message);
        Ok(())
    }
}

/// One alert as recorded in an outbox
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// When the alert was queued
    pub at: DateTime<Utc>,
    /// Destination address
    pub to: String,
    /// Message body
    pub message: String,
}

/// Channel appending alerts as JSON lines to a file
///
/// A gateway process picks entries up from the outbox and delivers them.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    path: PathBuf,
}

impl OutboxNotifier {
    /// Append to the outbox at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read every queued entry
    pub fn entries(&self) -> Result<Vec<OutboxEntry>, DeliveryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(DeliveryError::from))
            .collect()
    }
}

impl NotificationChannel for OutboxNotifier {
    fn send(&self, destination: &str, message: &str) -> Result<(), DeliveryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entry = OutboxEntry {
            at: Utc::now(),
            to: destination.to_string(),
            message: message.to_string(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Channel that keeps sent messages in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    inner: Mutex<RecordingState>,
}

#[derive(Debug, Default)]
struct RecordingState {
    sent: Vec<(String, String)>,
    unreachable: HashSet<String>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to `destination` fail
    pub fn fail_destination(&self, destination: &str) {
        self.lock().unreachable.insert(destination.to_string());
    }

    /// All delivered `(destination, message)` pairs, in order
    pub fn sent(&self) -> Vec<(String, String)> {
        self.lock().sent.clone()
    }

    /// Messages delivered to one destination
    pub fn sent_to(&self, destination: &str) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|(to, _)| to == destination)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl NotificationChannel for RecordingNotifier {
    fn send(&self, destination: &str, message: &str) -> Result<(), DeliveryError> {
        let mut state = self.lock();
        if state.unreachable.contains(destination) {
            return Err(DeliveryError::Unreachable(destination.to_string()));
        }
        state.sent.push((destination.to_string(), message.to_string()));
        Ok(())
    }
}
