mod error;

pub use error::{Error, Result};

use std::{
	fs,
	path::Path,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use tempfile::TempDir;
use tokio::sync::Semaphore;

use quarry_config::{
	Config, Document, EmbeddingProviderConfig, Extractor, Jobs, LlmProviderConfig, Retrieval,
	Service, Topic,
};
use quarry_providers::completion::{ChatReply, ChatRequest, ResponseMode};
use quarry_service::{
	BoxFuture, CompletionProvider, DocumentProvider, EmbeddingProvider, Providers, QuarryService,
};
use quarry_storage::{
	cache::{JobCache, MemoryCache},
	index::TopicCatalog,
};

type CompletionHandler =
	dyn Fn(&ChatRequest) -> quarry_providers::Result<ChatReply> + Send + Sync + 'static;

/// Embeds every text as the same vector, except queries listed as failing.
pub struct FakeEmbedding {
	vector: Vec<f32>,
	failing: Vec<String>,
}
impl FakeEmbedding {
	pub fn constant(vector: Vec<f32>) -> Self {
		Self { vector, failing: Vec::new() }
	}

	/// Makes `query` fail with a `503` transport error.
	pub fn failing_on(mut self, query: impl Into<String>) -> Self {
		self.failing.push(query.into());

		self
	}
}
impl EmbeddingProvider for FakeEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, quarry_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			if let Some(text) = texts.iter().find(|text| self.failing.contains(text)) {
				return Err(unavailable(&format!("embedding failed for {text:?}")));
			}

			Ok(vec![self.vector.clone(); texts.len()])
		})
	}
}

/// Embedding provider that parks every call until [`GatedEmbedding::open`] is called.
pub struct GatedEmbedding {
	vector: Vec<f32>,
	gate: Semaphore,
	started: AtomicUsize,
}
impl GatedEmbedding {
	pub fn new(vector: Vec<f32>) -> Self {
		Self { vector, gate: Semaphore::new(0), started: AtomicUsize::new(0) }
	}

	/// Number of calls that reached the gate.
	pub fn started(&self) -> usize {
		self.started.load(Ordering::SeqCst)
	}

	/// Releases every parked and future call.
	pub fn open(&self) {
		// A closed semaphore fails every acquire immediately, which is what lets callers through.
		self.gate.close();
	}
}
impl EmbeddingProvider for GatedEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, quarry_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			self.started.fetch_add(1, Ordering::SeqCst);

			let _ = self.gate.acquire().await;

			Ok(vec![self.vector.clone(); texts.len()])
		})
	}
}

pub struct PanickingEmbedding;
impl EmbeddingProvider for PanickingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, quarry_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { corrupted_index() })
	}
}

/// Completion provider driven by a closure, recording the mode of every request.
pub struct ScriptedCompletion {
	handler: Box<CompletionHandler>,
	modes: Mutex<Vec<&'static str>>,
}
impl ScriptedCompletion {
	pub fn new<F>(handler: F) -> Self
	where
		F: Fn(&ChatRequest) -> quarry_providers::Result<ChatReply> + Send + Sync + 'static,
	{
		Self { handler: Box::new(handler), modes: Mutex::new(Vec::new()) }
	}

	/// Answers every request with the same message content.
	pub fn content(text: &str) -> Self {
		let text = text.to_string();

		Self::new(move |_| Ok(reply(&text)))
	}

	/// Answers with the content paired to the first needle found in the user message.
	///
	/// Requests matching no needle get an empty facts object.
	pub fn matching(pairs: &[(&str, &str)]) -> Self {
		let pairs: Vec<(String, String)> =
			pairs.iter().map(|(needle, text)| (needle.to_string(), text.to_string())).collect();

		Self::new(move |request| {
			let user = user_message(request);
			let text = pairs
				.iter()
				.find(|(needle, _)| user.contains(needle.as_str()))
				.map(|(_, text)| text.as_str())
				.unwrap_or(r#"{"facts": []}"#);

			Ok(reply(text))
		})
	}

	/// Modes requested so far, in call order.
	pub fn modes(&self) -> Vec<&'static str> {
		self.modes.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl CompletionProvider for ScriptedCompletion {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, quarry_providers::Result<ChatReply>> {
		self.modes.lock().unwrap_or_else(|err| err.into_inner()).push(mode_name(&request.mode));

		let result = (self.handler)(request);

		Box::pin(async move { result })
	}
}

/// Document provider returning a fixed page text or a fixed failure.
pub struct StaticDocument {
	text: Option<String>,
}
impl StaticDocument {
	pub fn text(text: &str) -> Self {
		Self { text: Some(text.to_string()) }
	}

	pub fn failing() -> Self {
		Self { text: None }
	}
}
impl DocumentProvider for StaticDocument {
	fn fetch_text<'a>(
		&'a self,
		_cfg: &'a Document,
		_url: &'a str,
	) -> BoxFuture<'a, quarry_providers::Result<String>> {
		Box::pin(async move {
			self.text.clone().ok_or_else(|| unavailable("document host unreachable"))
		})
	}
}

pub fn reply(content: &str) -> ChatReply {
	ChatReply { content: Some(content.to_string()), tool_arguments: None }
}

pub fn tool_reply(arguments: &str) -> ChatReply {
	ChatReply { content: None, tool_arguments: Some(arguments.to_string()) }
}

/// The error a provider returns when it refuses the request shape.
pub fn rejected() -> quarry_providers::Error {
	quarry_providers::Error::Rejected { status: 400, message: "unsupported parameter".to_string() }
}

/// A transport-level failure that the extractor must not swallow.
pub fn unavailable(message: &str) -> quarry_providers::Error {
	quarry_providers::Error::Status { status: 503, message: message.to_string() }
}

pub fn user_message(request: &ChatRequest) -> String {
	request
		.messages
		.iter()
		.rev()
		.find(|message| message.get("role").and_then(|role| role.as_str()) == Some("user"))
		.and_then(|message| message.get("content"))
		.and_then(|content| content.as_str())
		.unwrap_or_default()
		.to_string()
}

/// Temporary directory holding the on-disk topic indexes of one test.
pub struct TopicFixture {
	dir: TempDir,
	topics: Vec<Topic>,
}
impl TopicFixture {
	pub fn new() -> Result<Self> {
		Ok(Self { dir: tempfile::tempdir()?, topics: Vec::new() })
	}

	pub fn with_topic(mut self, id: &str, vectors: &[Vec<f32>], texts: &[&str]) -> Result<Self> {
		let topic = write_topic(self.dir.path(), id, vectors, texts)?;

		self.topics.push(topic);

		Ok(self)
	}

	pub fn topics(&self) -> Vec<Topic> {
		self.topics.clone()
	}
}

/// Writes a topic index and its chunk records under `dir` and returns the matching topic.
pub fn write_topic(dir: &Path, id: &str, vectors: &[Vec<f32>], texts: &[&str]) -> Result<Topic> {
	let Some(first) = vectors.first() else {
		return Err(Error::Message(format!("Topic {id} needs at least one vector.")));
	};
	let index_path = dir.join(format!("{id}.index.json"));
	let chunks_path = dir.join(format!("{id}.chunks.json"));
	let index = serde_json::json!({ "dimensions": first.len(), "vectors": vectors });
	let chunks: Vec<serde_json::Value> =
		texts.iter().map(|text| serde_json::json!({ "text": text })).collect();

	fs::write(&index_path, serde_json::to_vec(&index)?)?;
	fs::write(&chunks_path, serde_json::to_vec(&chunks)?)?;

	Ok(Topic {
		id: id.to_string(),
		label: None,
		index_path,
		chunks_path,
		seed: format!("{id} overview"),
	})
}

/// A valid configuration over `topics`; the first topic is the default.
pub fn test_config(topics: Vec<Topic>) -> Config {
	let default_topic = topics.first().map(|topic| topic.id.clone()).unwrap_or_default();

	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		providers: quarry_config::Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "test-embedding".to_string(),
				dimensions: 2,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
			llm_extractor: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "test-chat".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
		},
		retrieval: Retrieval { default_topic, top_k: 3, max_facts: None },
		extractor: Extractor::default(),
		jobs: Jobs::default(),
		document: Document::default(),
		topics,
	}
}

/// Builds a service over an in-memory cache, loading every topic in `cfg`.
pub fn build_service(cfg: Config, providers: Providers) -> Result<Arc<QuarryService>> {
	build_service_with_cache(cfg, providers, Arc::new(MemoryCache::default()))
}

pub fn build_service_with_cache(
	cfg: Config,
	providers: Providers,
	cache: Arc<dyn JobCache>,
) -> Result<Arc<QuarryService>> {
	let catalog = TopicCatalog::load(&cfg.topics)?;

	Ok(Arc::new(QuarryService::with_providers(cfg, catalog, cache, providers)?))
}

fn corrupted_index() -> quarry_providers::Result<Vec<Vec<f32>>> {
	panic!("embedding index corrupted")
}

fn mode_name(mode: &ResponseMode) -> &'static str {
	match mode {
		ResponseMode::Text => "text",
		ResponseMode::JsonObject => "json_object",
		ResponseMode::Tool(_) => "tool",
	}
}
