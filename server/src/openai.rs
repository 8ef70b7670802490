//! Collaborators backed by an OpenAI-compatible HTTP API.
//!
//! All calls are blocking and bounded by one client-wide timeout; handlers
//! run them on the blocking pool.

use reqwest::blocking::Client;
use serde_json::{json, Value};
use skylore_core::narrate::NarrativeGenerator;
use skylore_core::semantic::{SemanticHit, SemanticSearch};
use skylore_core::{CollaboratorError, Constellation, ExpandedQuery};
use skylore_core::expand::QueryExpander;
use std::sync::Arc;
use std::time::Duration;

const EXPANSION_SYSTEM: &str = "あなたは星座検索のクエリ拡張を行います。JSONオブジェクトのみを出力してください。";

const EXPANSION_INSTRUCTIONS: &str = "\
入力から星座検索に使う情報を推測し、次のキーを持つJSONで答えてください。
season: 春/夏/秋/冬/春秋 のいずれか、または null
months: 見頃と思われる月 (1-12) の配列
keywords: 検索語の配列
constellation_hints: 入力で言及された星座名の配列
気温は 10度以下を冬、20度以下を春秋、それ以上を夏とみなします。

入力: ";

const STORY_SYSTEM: &str = "あなたは星座の語り部です。200文字程度の親しみやすい紹介文を書いてください。";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

pub struct OpenAiClient {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, CollaboratorError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Value, CollaboratorError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CollaboratorError::Unavailable(format!("{path}: HTTP {status}")));
        }
        resp.json::<Value>().map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, e: reqwest::Error) -> CollaboratorError {
        if e.is_timeout() {
            CollaboratorError::Timeout(self.config.timeout)
        } else if e.is_decode() {
            CollaboratorError::InvalidResponse(e.to_string())
        } else {
            CollaboratorError::Unavailable(e.to_string())
        }
    }

    fn chat(&self, system: &str, user: &str, temperature: f64, json_mode: bool) -> Result<String, CollaboratorError> {
        let mut body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": temperature,
        });
        if json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        let resp = self.post_json("chat/completions", &body)?;
        chat_content(&resp)
    }
}

/// First choice's message content from a chat completion response.
pub fn chat_content(resp: &Value) -> Result<String, CollaboratorError> {
    resp.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CollaboratorError::InvalidResponse("chat completion without message content".into()))
}

/// Vector store search results. Each stored file carries the constellation id
/// in `attributes.filename`, falling back to the file's own `filename`.
pub fn vector_hits(resp: &Value) -> Result<Vec<SemanticHit>, CollaboratorError> {
    let data = resp
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| CollaboratorError::InvalidResponse("vector store search without data".into()))?;
    Ok(data
        .iter()
        .map(|item| {
            let id = item
                .pointer("/attributes/filename")
                .and_then(Value::as_str)
                .or_else(|| item.get("filename").and_then(Value::as_str))
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let score = item.get("score").and_then(Value::as_f64).unwrap_or(0.0);
            SemanticHit { id, score }
        })
        .collect())
}

pub fn parse_expansion(content: &str) -> Result<ExpandedQuery, CollaboratorError> {
    serde_json::from_str(content).map_err(|e| CollaboratorError::InvalidResponse(format!("expanded query: {e}")))
}

pub struct VectorStoreSearch {
    client: Arc<OpenAiClient>,
    vector_store_id: String,
}

impl VectorStoreSearch {
    pub fn new(client: Arc<OpenAiClient>, vector_store_id: String) -> Self {
        Self { client, vector_store_id }
    }
}

impl SemanticSearch for VectorStoreSearch {
    fn search(&self, query: &str, k: usize) -> Result<Vec<SemanticHit>, CollaboratorError> {
        let body = json!({ "query": query, "max_num_results": k.clamp(1, 50) });
        let resp = self.client.post_json(&format!("vector_stores/{}/search", self.vector_store_id), &body)?;
        let mut hits = vector_hits(&resp)?;
        hits.truncate(k);
        Ok(hits)
    }
}

pub struct ChatQueryExpander {
    client: Arc<OpenAiClient>,
}

impl ChatQueryExpander {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }
}

impl QueryExpander for ChatQueryExpander {
    fn expand(&self, text: &str) -> Result<ExpandedQuery, CollaboratorError> {
        let content = self.client.chat(EXPANSION_SYSTEM, &format!("{EXPANSION_INSTRUCTIONS}{text}"), 0.3, true)?;
        parse_expansion(&content)
    }
}

pub struct ChatNarrator {
    client: Arc<OpenAiClient>,
}

impl ChatNarrator {
    pub fn new(client: Arc<OpenAiClient>) -> Self {
        Self { client }
    }
}

impl NarrativeGenerator for ChatNarrator {
    fn narrate(&self, record: &Constellation, related: &[&Constellation]) -> Result<String, CollaboratorError> {
        let mut prompt = format!(
            "星座: {}\n神話: {}\nキーワード: {}\n",
            record.display_name(),
            record.myth_summary,
            record.keywords.join("、")
        );
        if !related.is_empty() {
            let names: Vec<&str> = related.iter().map(|c| c.display_name()).collect();
            prompt.push_str(&format!("関連する星座: {}\n", names.join("、")));
        }
        let story = self.client.chat(STORY_SYSTEM, &prompt, 0.7, false)?;
        let story = story.trim();
        if story.is_empty() {
            return Err(CollaboratorError::InvalidResponse("empty story".into()));
        }
        Ok(story.to_string())
    }
}
