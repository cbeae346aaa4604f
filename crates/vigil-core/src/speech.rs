//! Spoken rendering of one-time codes
//!
//! The renderer turns a prompt into a playable artifact. How the audio is
//! produced is the renderer's business; the core only needs a handle it can
//! hand to the presentation layer and later release.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::otp::Language;

/// Handle to a rendered artifact
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Wrap a renderer-specific handle
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The raw handle (a file path for file-backed renderers)
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rendering failures
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No voice available for language '{0}'")]
    UnsupportedLanguage(Language),

    #[error("Render IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render failed: {0}")]
    Failed(String),
}

/// Produces and releases spoken artifacts
pub trait SpeechRenderer: Send + Sync {
    /// Render `text` spoken in `language`
    fn render(&self, text: &str, language: Language) -> Result<ArtifactRef, RenderError>;

    /// Release a previously rendered artifact
    ///
    /// Releasing an artifact that no longer exists is not an error.
    fn release(&self, artifact: &ArtifactRef) -> Result<(), RenderError>;
}

/// File-backed renderer writing one transcript file per artifact
///
/// Each file holds the language code and the prompt text a speech engine
/// would read out. Voices can be limited to exercise the fallback path.
#[derive(Debug, Clone)]
pub struct TranscriptRenderer {
    dir: PathBuf,
    voices: Option<HashSet<Language>>,
}

impl TranscriptRenderer {
    /// Render into `dir`, supporting every language
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            voices: None,
        }
    }

    /// Limit the languages this renderer can speak
    pub fn with_voices(mut self, voices: impl IntoIterator<Item = Language>) -> Self {
        self.voices = Some(voices.into_iter().collect());
        self
    }

    /// Directory artifacts are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read back the transcript of an artifact
    pub fn read(artifact: &ArtifactRef) -> Result<String, RenderError> {
        Ok(fs::read_to_string(artifact.as_str())?)
    }
}

impl SpeechRenderer for TranscriptRenderer {
    fn render(&self, text: &str, language: Language) -> Result<ArtifactRef, RenderError> {
        if let Some(voices) = &self.voices {
            if !voices.contains(&language) {
                return Err(RenderError::UnsupportedLanguage(language));
            }
        }

        fs::create_dir_all(&self.dir)?;

        let filename = format!(
            "otp_{}_{}.txt",
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4().simple()
        );
        let path = self.dir.join(filename);
        fs::write(&path, format!("lang: {}\n{}\n", language.code(), text))?;

        debug!("Rendered OTP artifact {:?}", path);
        Ok(ArtifactRef::new(path.to_string_lossy()))
    }

    fn release(&self, artifact: &ArtifactRef) -> Result<(), RenderError> {
        match fs::remove_file(artifact.as_str()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory renderer that keeps live artifacts in a map
#[derive(Debug, Default)]
pub struct MemoryRenderer {
    inner: Mutex<MemoryRendererState>,
}

#[derive(Debug, Default)]
struct MemoryRendererState {
    live: HashMap<ArtifactRef, (Language, String)>,
    failing: HashSet<Language>,
    rendered: u64,
}

impl MemoryRenderer {
    /// Create a renderer that speaks every language
    pub fn new() -> Self {
        Self::default()
    }

    /// Make rendering in `language` fail
    pub fn fail_language(&self, language: Language) {
        self.lock().failing.insert(language);
    }

    /// Number of artifacts currently retained
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// Whether an artifact is still retained
    pub fn is_live(&self, artifact: &ArtifactRef) -> bool {
        self.lock().live.contains_key(artifact)
    }

    /// Language and text of a live artifact
    pub fn get(&self, artifact: &ArtifactRef) -> Option<(Language, String)> {
        self.lock().live.get(artifact).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryRendererState> {
        // A poisoned map is still structurally valid
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SpeechRenderer for MemoryRenderer {
    fn render(&self, text: &str, language: Language) -> Result<ArtifactRef, RenderError> {
        let mut state = self.lock();
        if state.failing.contains(&language) {
            return Err(RenderError::UnsupportedLanguage(language));
        }
        state.rendered += 1;
        let artifact = ArtifactRef::new(format!("mem://otp/{}", state.rendered));
        state.live.insert(artifact.clone(), (language, text.to_string()));
        Ok(artifact)
    }

    fn release(&self, artifact: &ArtifactRef) -> Result<(), RenderError> {
        self.lock().live.remove(artifact);
        Ok(())
    }
}
