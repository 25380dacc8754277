use std::{collections::HashMap, fs, path::Path, sync::Arc};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{Error, Result};

/// One retrievable unit of topical text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
	pub text: String,
	/// Position of the chunk in its topic's index.
	pub position: usize,
}

#[derive(Debug, Deserialize)]
struct IndexFile {
	dimensions: usize,
	vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ChunkRecord {
	#[serde(default)]
	text: Value,
}

/// Read-only flat vector index for one topic plus its parallel chunk metadata.
#[derive(Debug)]
pub struct TopicIndex {
	topic: String,
	dimensions: usize,
	vectors: Vec<Vec<f32>>,
	chunks: Vec<Chunk>,
}
impl TopicIndex {
	pub fn load(topic: &quarry_config::Topic) -> Result<Self> {
		let index: IndexFile = read_json(&topic.index_path)?;
		let records: Vec<ChunkRecord> = read_json(&topic.chunks_path)?;
		let texts = records
			.into_iter()
			.map(|record| record.text.as_str().map(str::to_string).unwrap_or_default())
			.collect();

		Self::from_parts(&topic.id, index.dimensions, index.vectors, texts)
	}

	pub fn from_parts(
		topic: &str,
		dimensions: usize,
		vectors: Vec<Vec<f32>>,
		texts: Vec<String>,
	) -> Result<Self> {
		let invalid = |message: String| Error::InvalidIndex { topic: topic.to_string(), message };

		if dimensions == 0 {
			return Err(invalid("dimensions must be greater than zero.".to_string()));
		}
		if vectors.len() != texts.len() {
			return Err(invalid(format!(
				"{} vectors but {} chunk records.",
				vectors.len(),
				texts.len()
			)));
		}
		if let Some(position) = vectors.iter().position(|vec| vec.len() != dimensions) {
			return Err(invalid(format!(
				"vector {position} has {} dimensions, expected {dimensions}.",
				vectors[position].len()
			)));
		}

		let chunks = texts
			.into_iter()
			.enumerate()
			.map(|(position, text)| Chunk { text, position })
			.collect();

		Ok(Self { topic: topic.to_string(), dimensions, vectors, chunks })
	}

	pub fn topic(&self) -> &str {
		&self.topic
	}

	pub fn dimensions(&self) -> usize {
		self.dimensions
	}

	pub fn len(&self) -> usize {
		self.vectors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.vectors.is_empty()
	}

	/// Exact nearest-neighbor search by squared L2 distance.
	///
	/// Returns at most `top_k` chunks, closest first; equal distances keep index order.
	pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Chunk>> {
		if query.len() != self.dimensions {
			return Err(Error::DimensionMismatch {
				topic: self.topic.clone(),
				expected: self.dimensions,
				actual: query.len(),
			});
		}

		let mut scored: Vec<(f32, usize)> = self
			.vectors
			.iter()
			.enumerate()
			.map(|(position, vec)| (squared_l2(query, vec), position))
			.collect();

		scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

		Ok(scored
			.into_iter()
			.take(top_k)
			.map(|(_, position)| self.chunks[position].clone())
			.collect())
	}
}

/// Every configured topic index, loaded once at start-up.
#[derive(Debug, Default)]
pub struct TopicCatalog {
	indexes: HashMap<String, Arc<TopicIndex>>,
}
impl TopicCatalog {
	pub fn load(topics: &[quarry_config::Topic]) -> Result<Self> {
		let mut indexes = Vec::with_capacity(topics.len());

		for topic in topics {
			let index = TopicIndex::load(topic)?;

			tracing::info!(topic = %topic.id, chunks = index.len(), "Loaded topic index.");

			indexes.push(index);
		}

		Ok(Self::from_indexes(indexes))
	}

	pub fn from_indexes(indexes: impl IntoIterator<Item = TopicIndex>) -> Self {
		Self {
			indexes: indexes
				.into_iter()
				.map(|index| (index.topic.clone(), Arc::new(index)))
				.collect(),
		}
	}

	pub fn get(&self, topic: &str) -> Option<Arc<TopicIndex>> {
		self.indexes.get(topic).cloned()
	}

	pub fn contains(&self, topic: &str) -> bool {
		self.indexes.contains_key(topic)
	}

	/// Fails on the first index whose vectors do not have `dimensions` components.
	pub fn ensure_dimensions(&self, dimensions: usize) -> Result<()> {
		match self.indexes.values().find(|index| index.dimensions != dimensions) {
			Some(index) => Err(Error::InvalidIndex {
				topic: index.topic.clone(),
				message: format!(
					"indexed with {} dimensions but the embedding provider returns {dimensions}.",
					index.dimensions
				),
			}),
			None => Ok(()),
		}
	}
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn read_json<T>(path: &Path) -> Result<T>
where
	T: DeserializeOwned,
{
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadFile { path: path.to_path_buf(), source: err })?;

	serde_json::from_str(&raw)
		.map_err(|err| Error::DecodeFile { path: path.to_path_buf(), source: err })
}
