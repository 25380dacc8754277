pub mod aggregate;
pub mod document;
pub mod extract;
pub mod jobs;
pub mod retrieval;
pub mod runner;

mod error;

pub use aggregate::RetrievalRequest;
pub use error::{Error, Result};
pub use jobs::{JOB_KEY_PREFIX, JOB_TTL, JobRegistry, TransitionOutcome};
pub use runner::{JobRunner, format_error_chain};

use std::{future::Future, pin::Pin, sync::Arc};

use quarry_config::{Config, Document, EmbeddingProviderConfig, LlmProviderConfig};
use quarry_providers::{
	completion::{self, ChatReply, ChatRequest},
	document as document_provider, embedding,
};
use quarry_storage::{cache::JobCache, index::TopicCatalog};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, quarry_providers::Result<Vec<Vec<f32>>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, quarry_providers::Result<ChatReply>>;
}

pub trait DocumentProvider
where
	Self: Send + Sync,
{
	fn fetch_text<'a>(
		&'a self,
		cfg: &'a Document,
		url: &'a str,
	) -> BoxFuture<'a, quarry_providers::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub completion: Arc<dyn CompletionProvider>,
	pub document: Arc<dyn DocumentProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		completion: Arc<dyn CompletionProvider>,
		document: Arc<dyn DocumentProvider>,
	) -> Self {
		Self { embedding, completion, document }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), completion: provider.clone(), document: provider }
	}
}

/// Shared state behind every retrieval operation: configuration, loaded topic indexes, the job
/// registry and the injected providers.
pub struct QuarryService {
	pub cfg: Config,
	pub catalog: TopicCatalog,
	pub jobs: JobRegistry,
	pub providers: Providers,
}
impl QuarryService {
	/// Loads every configured topic index and wires the default HTTP providers.
	pub fn new(cfg: Config, cache: Arc<dyn JobCache>) -> Result<Self> {
		let catalog = TopicCatalog::load(&cfg.topics)?;

		Self::with_providers(cfg, catalog, cache, Providers::default())
	}

	/// Fails when a topic index was built for a different embedding size than the provider's.
	pub fn with_providers(
		cfg: Config,
		catalog: TopicCatalog,
		cache: Arc<dyn JobCache>,
		providers: Providers,
	) -> Result<Self> {
		catalog.ensure_dimensions(cfg.providers.embedding.dimensions as usize)?;

		Ok(Self { cfg, catalog, jobs: JobRegistry::new(cache), providers })
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, quarry_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, quarry_providers::Result<ChatReply>> {
		Box::pin(completion::complete(cfg, request))
	}
}
impl DocumentProvider for DefaultProviders {
	fn fetch_text<'a>(
		&'a self,
		cfg: &'a Document,
		url: &'a str,
	) -> BoxFuture<'a, quarry_providers::Result<String>> {
		Box::pin(document_provider::fetch_document_text(cfg, url))
	}
}
