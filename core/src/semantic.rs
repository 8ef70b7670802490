use crate::error::CollaboratorError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticHit {
    /// Record id as stored alongside the embedding; may be missing.
    pub id: Option<String>,
    pub score: f64,
}

/// Embedding-store search returning at most `k` best-first hits.
///
/// Identifiers must be the same record ids the lexical index uses.
pub trait SemanticSearch: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Result<Vec<SemanticHit>, CollaboratorError>;
}
