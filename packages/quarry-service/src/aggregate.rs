use serde::{Deserialize, Serialize};

use quarry_domain::{Aggregate, TopicFacts, facts};
use quarry_storage::models::ChunkFacts;

use crate::{Error, QuarryService, Result};

/// Parameters of one multi-topic retrieval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalRequest {
	#[serde(default)]
	pub topics: Vec<String>,
	/// Query used for every topic. Falls back to each topic's seed when absent or blank.
	#[serde(alias = "query")]
	pub seed_query: Option<String>,
	pub top_k: Option<u32>,
	/// Cap on the flattened fact list. Zero means uncapped.
	pub max_facts: Option<u32>,
}
impl RetrievalRequest {
	pub fn validate(&self) -> Result<()> {
		if self.top_k == Some(0) {
			return Err(Error::InvalidRequest {
				message: "top_k must be greater than zero.".to_string(),
			});
		}

		Ok(())
	}
}

impl QuarryService {
	/// Trims and lowercases topic ids, drops unknown and repeated ones, and falls back to the
	/// default topic when nothing usable remains.
	pub fn normalize_topics<S>(&self, raw: &[S]) -> Vec<String>
	where
		S: AsRef<str>,
	{
		let known = raw
			.iter()
			.map(|topic| topic.as_ref().trim().to_lowercase())
			.filter(|topic| {
				let found = self.catalog.contains(topic);

				if !found && !topic.is_empty() {
					tracing::debug!(topic = %topic, "Ignoring unknown topic.");
				}

				found
			});
		let topics = facts::dedupe_preserve_order(known);

		if topics.is_empty() { vec![self.cfg.retrieval.default_topic.clone()] } else { topics }
	}

	/// Retrieves and extracts facts for every requested topic, then merges them.
	///
	/// A topic that fails contributes an empty bucket; the remaining topics still run.
	pub async fn aggregate_sync(&self, request: &RetrievalRequest) -> Result<ChunkFacts> {
		request.validate()?;

		let topics = self.normalize_topics(&request.topics);
		let top_k = request.top_k.unwrap_or(self.cfg.retrieval.top_k);
		let mut per_topic = TopicFacts::new();

		for topic in &topics {
			let found = match self.topic_facts(topic, request.seed_query.as_deref(), top_k).await {
				Ok(found) => found,
				Err(err) => {
					tracing::warn!(topic = %topic, error = %err, "Topic retrieval failed.");

					Vec::new()
				},
			};

			per_topic.insert(topic.clone(), found);
		}

		let max_facts = request.max_facts.or(self.cfg.retrieval.max_facts).map(|max| max as usize);
		let Aggregate { facts, by_topic } = quarry_domain::aggregate(per_topic, max_facts);

		Ok(ChunkFacts { facts, by_topic, topics, top_k })
	}

	async fn topic_facts(
		&self,
		topic: &str,
		seed_query: Option<&str>,
		top_k: u32,
	) -> Result<Vec<String>> {
		let cfg = self
			.cfg
			.topic(topic)
			.ok_or_else(|| Error::UnknownTopic { topic: topic.to_string() })?;
		let query = seed_query
			.map(str::trim)
			.filter(|query| !query.is_empty())
			.unwrap_or_else(|| cfg.seed.trim());
		let chunks = self.retrieve(topic, query, top_k).await?;
		let block = facts::join_chunk_texts(chunks.iter().map(|chunk| chunk.text.as_str()));

		if block.is_empty() {
			return Ok(Vec::new());
		}

		let label = cfg.label.as_deref().unwrap_or(topic);

		self.extract_facts(&block, label).await
	}
}
