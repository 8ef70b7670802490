use clap::Parser;
use skylore_core::bm25::Bm25Params;
use skylore_core::fusion::RrfParams;
use skylore_core::query::QueryTextConfig;
use skylore_core::retrieve::HybridConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "skylore-server", about = "Constellation search over HTTP")]
pub struct ServerConfig {
    /// Index directory path
    #[arg(long, env = "SKYLORE_INDEX", default_value = "./index")]
    pub index: PathBuf,
    /// Constellation record snapshot (JSON array)
    #[arg(long, env = "SKYLORE_DATA", default_value = "./data/constellations.json")]
    pub data: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    /// Results returned when a request does not ask for a count
    #[arg(long, env = "SKYLORE_TOP_K", default_value_t = 5)]
    pub top_k: usize,

    /// API key for the OpenAI-compatible collaborators; OPENAI_KEY is also read
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,
    /// Vector store holding one file per constellation, tagged with its id
    #[arg(long, env = "VECTOR_STORE_ID")]
    pub vector_store_id: Option<String>,
    /// Chat model used for query expansion and narration
    #[arg(long, env = "SKYLORE_LLM", default_value = "gpt-4o-mini")]
    pub llm: String,
    /// Timeout applied to every collaborator call
    #[arg(long, env = "SKYLORE_COLLABORATOR_TIMEOUT_SECS", default_value_t = 10)]
    pub collaborator_timeout_secs: u64,

    #[arg(long, default_value_t = 1.5)]
    pub bm25_k1: f64,
    #[arg(long, default_value_t = 0.75)]
    pub bm25_b: f64,
    #[arg(long, default_value_t = 60.0)]
    pub rrf_k: f64,
    /// BM25 candidates fused per query
    #[arg(long, default_value_t = 20)]
    pub k_lexical: usize,
    /// Semantic candidates fused per query
    #[arg(long, default_value_t = 20)]
    pub k_semantic: usize,
    /// Cap on expanded keywords joined into the lexical query
    #[arg(long, default_value_t = 10)]
    pub max_query_tokens: usize,

    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,
    /// Comma-separated allowed origins; any origin when unset
    #[arg(long, env = "CORS_ALLOW_ORIGIN")]
    pub cors_allow_origin: Option<String>,
}

impl ServerConfig {
    pub fn hybrid(&self) -> HybridConfig {
        HybridConfig {
            k_lexical: self.k_lexical,
            k_semantic: self.k_semantic,
            bm25: Bm25Params { k1: self.bm25_k1, b: self.bm25_b },
            rrf: RrfParams { k: self.rrf_k },
            query_text: QueryTextConfig { max_tokens: self.max_query_tokens },
        }
    }

    pub fn api_key(&self) -> Option<String> {
        self.openai_api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs.max(1))
    }
}
