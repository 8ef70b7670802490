use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use skylore_core::expand::{expand_with_fallback, QueryExpander};
use skylore_core::lexical::LexicalIndex;
use skylore_core::narrate::{narrate_or_summary, NarrativeGenerator};
use skylore_core::persist::{load_index, save_index, IndexPaths, MetaFile};
use skylore_core::retrieve::{AttributeRetriever, HybridConfig, HybridRetriever, LexicalRetriever, Retriever};
use skylore_core::semantic::SemanticSearch;
use skylore_core::{Constellation, ExpandedQuery, IndexHandle, PersistError, QueryInput, RankedRecord, RecordStore, SearchIndex, SearchWarning, Searcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod openai;

pub use config::ServerConfig;
use openai::{ChatNarrator, ChatQueryExpander, OpenAiClient, OpenAiConfig, VectorStoreSearch};

type ApiError = (StatusCode, String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Lexical,
    Attribute,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub k: Option<usize>,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default = "default_expand")]
    pub expand: bool,
}
fn default_expand() -> bool { true }

#[derive(Deserialize)]
pub struct RelatedParams {
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub expanded: Option<ExpandedQuery>,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
    pub warnings: Vec<SearchWarning>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub id: String,
    pub jp_name: String,
    pub score: f64,
    pub snippet: String,
    /// Snippet with query terms wrapped in `<em>`.
    pub highlight: String,
    pub record: Constellation,
}

#[derive(Serialize)]
pub struct RelatedResponse {
    pub id: String,
    pub results: Vec<SearchHit>,
    pub warnings: Vec<SearchWarning>,
}

#[derive(Serialize)]
pub struct StoryResponse {
    pub id: String,
    pub jp_name: String,
    pub story: String,
    pub related: Vec<String>,
    pub warnings: Vec<SearchWarning>,
}

/// Optional external services. Any of them may be absent; queries then fall
/// back to the local strategies.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub semantic: Option<Arc<dyn SemanticSearch>>,
    pub expander: Option<Arc<dyn QueryExpander>>,
    pub narrator: Option<Arc<dyn NarrativeGenerator>>,
}

impl Collaborators {
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let Some(api_key) = config.api_key() else {
            tracing::warn!("no OpenAI API key; semantic search, query expansion and narration disabled");
            return Ok(Self::default());
        };
        let client = Arc::new(OpenAiClient::new(OpenAiConfig {
            api_key,
            base_url: config.openai_base_url.clone(),
            model: config.llm.clone(),
            timeout: config.collaborator_timeout(),
        })?);
        let semantic: Option<Arc<dyn SemanticSearch>> = match &config.vector_store_id {
            Some(id) => Some(Arc::new(VectorStoreSearch::new(Arc::clone(&client), id.clone()))),
            None => {
                tracing::warn!("VECTOR_STORE_ID not set; hybrid search runs lexical only");
                None
            }
        };
        Ok(Self {
            semantic,
            expander: Some(Arc::new(ChatQueryExpander::new(Arc::clone(&client)))),
            narrator: Some(Arc::new(ChatNarrator::new(client))),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<IndexHandle<SearchIndex>>,
    pub collaborators: Collaborators,
    pub hybrid: HybridConfig,
    pub index_dir: PathBuf,
    pub data_path: PathBuf,
    pub default_k: usize,
    pub admin_token: Option<String>,
    rebuild_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn load(config: &ServerConfig, collaborators: Collaborators) -> Result<Self> {
        let index = open_search_index(&config.index, &config.data)
            .with_context(|| format!("opening index at {}", config.index.display()))?;
        Ok(Self {
            index: Arc::new(IndexHandle::new(index)),
            collaborators,
            hybrid: config.hybrid(),
            index_dir: config.index.clone(),
            data_path: config.data.clone(),
            default_k: config.top_k.max(1),
            admin_token: config.admin_token.clone().filter(|t| !t.is_empty()),
            rebuild_lock: Arc::new(Mutex::new(())),
        })
    }
}

/// Load the persisted artifact alongside the record snapshot. A missing
/// artifact is built in memory from the records; a corrupt one is an error.
pub fn open_search_index(index_dir: &std::path::Path, data: &std::path::Path) -> Result<SearchIndex, PersistError> {
    let store = RecordStore::load_or_empty(data);
    match load_index(&IndexPaths::new(index_dir)) {
        Ok((lexical, _meta)) => {
            tracing::info!(num_records = store.len(), "serving persisted index");
            Ok(SearchIndex::with_lexical(store, lexical))
        }
        Err(PersistError::Missing { path }) => {
            tracing::warn!(path = %path.display(), num_records = store.len(), "no index artifact; building in memory");
            Ok(SearchIndex::build(store))
        }
        Err(e) => Err(e),
    }
}

pub fn build_app(config: &ServerConfig) -> Result<Router> {
    let collaborators = Collaborators::from_config(config)?;
    let state = AppState::load(config, collaborators)?;
    Ok(router(state, config.cors_allow_origin.as_deref()))
}

pub fn router(state: AppState, cors_allow_origin: Option<&str>) -> Router {
    // comma-separated origins, or Any when unset or unparsable
    let origins: Vec<_> = cors_allow_origin
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/constellations/:id", get(doc_handler))
        .route("/constellations/:id/related", get(related_handler))
        .route("/constellations/:id/story", get(story_handler))
        .route("/months/:month", get(month_handler))
        .route("/index/rebuild", post(rebuild_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "blocking task failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
    })
}

fn not_found(id: &str) -> ApiError {
    (StatusCode::NOT_FOUND, format!("constellation {id} not found"))
}

fn lexical_searcher(state: &AppState, snapshot: Arc<SearchIndex>) -> Searcher {
    let retriever = Arc::new(LexicalRetriever::new(Arc::clone(&snapshot), state.hybrid));
    Searcher::new(snapshot, retriever)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let k = params.k.unwrap_or(state.default_k).clamp(1, 100);
    let mut resp = blocking(move || run_search(&state, params, k)).await?;
    resp.took_s = start.elapsed().as_secs_f64();
    Ok(Json(resp))
}

fn run_search(state: &AppState, params: SearchParams, k: usize) -> SearchResponse {
    if params.q.trim().is_empty() {
        return SearchResponse { query: params.q, expanded: None, took_s: 0.0, total_hits: 0, results: vec![], warnings: vec![] };
    }
    let snapshot = state.index.current();
    let mut warnings = Vec::new();
    let (input, expanded) = if params.expand {
        let (q, warning) = expand_with_fallback(state.collaborators.expander.as_deref(), &params.q);
        warnings.extend(warning);
        (QueryInput::Expanded(q.clone()), Some(q))
    } else {
        (QueryInput::Text(params.q.clone()), None)
    };

    let retriever: Arc<dyn Retriever> = match params.mode {
        SearchMode::Hybrid => Arc::new(HybridRetriever::new(Arc::clone(&snapshot), state.collaborators.semantic.clone(), state.hybrid)),
        SearchMode::Lexical => Arc::new(LexicalRetriever::new(Arc::clone(&snapshot), state.hybrid)),
        SearchMode::Attribute => Arc::new(AttributeRetriever::new(Arc::clone(&snapshot))),
    };
    let terms = snapshot.lexical.tokenizer().tokenize(&input.query_text(state.hybrid.query_text));
    let outcome = Searcher::new(snapshot, retriever).search(&input, k);
    warnings.extend(outcome.warnings);

    let results: Vec<SearchHit> = outcome.results.into_iter().map(|r| to_hit(r, &terms)).collect();
    tracing::debug!(query = %params.q, mode = ?params.mode, hits = results.len(), "search");
    SearchResponse { query: params.q, expanded, took_s: 0.0, total_hits: results.len(), results, warnings }
}

fn to_hit(ranked: RankedRecord, terms: &[String]) -> SearchHit {
    SearchHit {
        id: ranked.record.id.clone(),
        jp_name: ranked.record.display_name().to_string(),
        score: ranked.score,
        highlight: highlight_terms(&ranked.snippet, terms),
        snippet: ranked.snippet,
        record: ranked.record,
    }
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut terms: Vec<&str> = terms.iter().map(String::as_str).filter(|t| !t.trim().is_empty()).collect();
    if terms.is_empty() || snippet.is_empty() {
        return snippet.to_string();
    }
    // longest first so a term never splits a longer overlapping one
    terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));
    terms.dedup();
    let pattern = terms.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    match regex::Regex::new(&pattern) {
        Ok(re) => re.replace_all(snippet, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string(),
        Err(_) => snippet.to_string(),
    }
}

pub async fn doc_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Constellation>, ApiError> {
    let snapshot = state.index.current();
    snapshot.store.get(&id).cloned().map(Json).ok_or_else(|| not_found(&id))
}

pub async fn related_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RelatedParams>,
) -> Result<Json<RelatedResponse>, ApiError> {
    let k = params.k.unwrap_or(state.default_k).clamp(1, 100);
    blocking(move || {
        let snapshot = state.index.current();
        if !snapshot.store.contains(&id) {
            return Err(not_found(&id));
        }
        let retriever = Arc::new(HybridRetriever::new(Arc::clone(&snapshot), state.collaborators.semantic.clone(), state.hybrid));
        let outcome = Searcher::new(snapshot, retriever).related(&id, k);
        let results = outcome.results.into_iter().map(|r| to_hit(r, &[])).collect();
        Ok(Json(RelatedResponse { id, results, warnings: outcome.warnings }))
    })
    .await?
}

pub async fn story_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<StoryResponse>, ApiError> {
    blocking(move || {
        let searcher = lexical_searcher(&state, state.index.current());
        let record = searcher.get(&id).ok_or_else(|| not_found(&id))?;
        let linked = searcher.linked(&id);
        let (story, warning) = narrate_or_summary(state.collaborators.narrator.as_deref(), record, &linked);
        Ok(Json(StoryResponse {
            id: record.id.clone(),
            jp_name: record.display_name().to_string(),
            story,
            related: linked.iter().map(|c| c.id.clone()).collect(),
            warnings: warning.into_iter().collect(),
        }))
    })
    .await?
}

pub async fn month_handler(State(state): State<AppState>, Path(month): Path<u8>) -> Result<Json<Vec<Constellation>>, ApiError> {
    if !(1..=12).contains(&month) {
        return Err((StatusCode::BAD_REQUEST, format!("month must be 1-12, got {month}")));
    }
    let searcher = lexical_searcher(&state, state.index.current());
    Ok(Json(searcher.by_month(month).into_iter().cloned().collect()))
}

/// Reload records, rebuild, persist, then publish the new index. Readers keep
/// the previous snapshot until the swap; a failed rebuild leaves it live.
async fn rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<MetaFile>, ApiError> {
    authorize(&state, &headers)?;
    blocking(move || {
        let _guard = state.rebuild_lock.lock();
        let store = RecordStore::load(&state.data_path).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        let lexical = LexicalIndex::build(&store);
        let meta = save_index(&IndexPaths::new(&state.index_dir), &lexical).map_err(|e| {
            tracing::error!(error = %e, "failed to persist rebuilt index");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
        state.index.replace(SearchIndex::with_lexical(store, lexical));
        tracing::info!(num_docs = meta.num_docs, num_terms = meta.num_terms, "index rebuilt and swapped");
        Ok(Json(meta))
    })
    .await?
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlight_prefers_longer_terms() {
        let terms = vec!["オリオン".to_string(), "オリオン座".to_string(), "狩人".to_string()];
        assert_eq!(highlight_terms("オリオン座の狩人", &terms), "<em>オリオン座</em>の<em>狩人</em>");
        assert_eq!(highlight_terms("竪琴", &terms), "竪琴");
        assert_eq!(highlight_terms("竪琴", &[]), "竪琴");
    }
}
