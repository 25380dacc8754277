use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub retrieval: Retrieval,
	#[serde(default)]
	pub extractor: Extractor,
	#[serde(default)]
	pub jobs: Jobs,
	#[serde(default)]
	pub document: Document,
	pub topics: Vec<Topic>,
}
impl Config {
	pub fn topic(&self, id: &str) -> Option<&Topic> {
		self.topics.iter().find(|topic| topic.id == id)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm_extractor: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	/// Topic used when a request names no known topic.
	pub default_topic: String,
	pub top_k: u32,
	/// Global cap on aggregated facts. Zero or absent means uncapped.
	pub max_facts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Extractor {
	pub max_input_chars: usize,
	pub max_facts: usize,
	pub max_fact_chars: usize,
}
impl Default for Extractor {
	fn default() -> Self {
		Self { max_input_chars: 6_000, max_facts: 12, max_fact_chars: 280 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Jobs {
	pub workers: usize,
	pub queue_capacity: usize,
	/// Upper bound on job records held by the in-memory cache.
	pub max_records: u64,
	pub max_error_chars: usize,
}
impl Default for Jobs {
	fn default() -> Self {
		Self { workers: 8, queue_capacity: 256, max_records: 100_000, max_error_chars: 1_024 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Document {
	pub timeout_ms: u64,
	pub user_agent: String,
}
impl Default for Document {
	fn default() -> Self {
		Self {
			timeout_ms: 15_000,
			user_agent: concat!(
				"Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
				"(KHTML, like Gecko) Chrome/124.0 Safari/537.36"
			)
			.to_string(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Topic {
	pub id: String,
	pub label: Option<String>,
	pub index_path: PathBuf,
	pub chunks_path: PathBuf,
	/// Retrieval query used when the caller supplies none.
	pub seed: String,
}
