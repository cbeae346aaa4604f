//! Per-subject session isolation
//!
//! Each subject gets its own [`TransactionSession`] behind its own lock, so
//! mutations to one subject are serialized while different subjects proceed
//! independently and never share state.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{Error, Result};
use crate::session::TransactionSession;

/// Maximum subject identifier length
pub const MAX_SUBJECT_ID_LENGTH: usize = 64;

/// Validated subject identifier, safe to use as a path component
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId(String);

impl SubjectId {
    /// Validate and wrap an identifier
    pub fn new(id: &str) -> Result<Self> {
        if id.is_empty() || id.len() > MAX_SUBJECT_ID_LENGTH {
            return Err(Error::InvalidInput(format!(
                "subject id must be 1-{} characters",
                MAX_SUBJECT_ID_LENGTH
            )));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidInput(
                "subject id may only contain letters, digits, '-' and '_'".to_string(),
            ));
        }

        Ok(Self(id.to_string()))
    }

    /// The identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SubjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type SessionFactory = Box<dyn Fn(&SubjectId) -> Result<TransactionSession> + Send + Sync>;

/// Lazily opened sessions keyed by subject
pub struct SubjectRegistry {
    factory: SessionFactory,
    sessions: Mutex<HashMap<SubjectId, Arc<Mutex<TransactionSession>>>>,
}

impl SubjectRegistry {
    /// Create a registry that opens sessions with `factory`
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&SubjectId) -> Result<TransactionSession> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Get the session for `id`, opening it on first use
    pub fn session(&self, id: &SubjectId) -> Result<Arc<Mutex<TransactionSession>>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(session) = sessions.get(id) {
            return Ok(session.clone());
        }

        debug!("Opening session for subject {}", id);
        let session = Arc::new(Mutex::new((self.factory)(id)?));
        sessions.insert(id.clone(), session.clone());
        Ok(session)
    }

    /// Run `f` with exclusive access to one subject's session
    pub fn with_subject<R>(
        &self,
        id: &SubjectId,
        f: impl FnOnce(&mut TransactionSession) -> R,
    ) -> Result<R> {
        let session = self.session(id)?;
        let mut guard = session
            .lock()
            .map_err(|_| Error::InvalidState(format!("session for {} is poisoned", id)))?;
        Ok(f(&mut *guard))
    }

    /// Drop a subject's in-memory session; persisted state is untouched
    pub fn evict(&self, id: &SubjectId) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some()
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no session is open
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
