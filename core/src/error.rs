use std::path::PathBuf;
use thiserror::Error;

/// Failures reading or writing the persisted index artifact.
#[derive(Debug, Error)]
pub enum PersistError {
    /// No artifact at the expected location; build one with the indexer.
    #[error("index artifact not found at {path}")]
    Missing { path: PathBuf },
    /// The artifact exists but cannot be trusted and must be rebuilt.
    #[error("index artifact at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("index i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersistError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt { path: path.into(), reason: reason.into() }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Failures loading the record snapshot.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to read records from {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse records from {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

/// Failures of an external collaborator (semantic search, query expansion, narration).
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("collaborator not configured: {0}")]
    NotConfigured(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("invalid collaborator response: {0}")]
    InvalidResponse(String),
}

/// Soft failure reported alongside results instead of aborting the query.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SearchWarning {
    /// Semantic search failed or is not configured; results are lexical only.
    LexicalOnly(String),
    /// Query expansion failed; the rule-based approximation was used.
    ExpansionFallback(String),
    /// Narrative generation failed; the stored summary was used.
    NarrationFallback(String),
}

impl std::fmt::Display for SearchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchWarning::LexicalOnly(m) => write!(f, "semantic search skipped, lexical results only: {m}"),
            SearchWarning::ExpansionFallback(m) => write!(f, "query expansion failed, using rule-based fallback: {m}"),
            SearchWarning::NarrationFallback(m) => write!(f, "narration failed, using stored summary: {m}"),
        }
    }
}
