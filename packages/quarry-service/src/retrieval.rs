use quarry_storage::index::Chunk;

use crate::{Error, QuarryService, Result};

impl QuarryService {
	/// Embeds `query` and returns the `top_k` nearest chunks of `topic`, closest first.
	///
	/// The scan runs on the blocking pool since it touches every vector of the topic.
	pub async fn retrieve(&self, topic: &str, query: &str, top_k: u32) -> Result<Vec<Chunk>> {
		if top_k == 0 {
			return Err(Error::InvalidRequest {
				message: "top_k must be greater than zero.".to_string(),
			});
		}

		let index = self
			.catalog
			.get(topic)
			.ok_or_else(|| Error::UnknownTopic { topic: topic.to_string() })?;
		let texts = [query.to_string()];
		let vectors = self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;
		let [vector] = vectors.as_slice() else {
			return Err(quarry_providers::Error::InvalidResponse {
				message: format!("Expected one query vector, got {}.", vectors.len()),
			}
			.into());
		};
		let vector = vector.clone();
		let chunks =
			tokio::task::spawn_blocking(move || index.search(&vector, top_k as usize)).await??;

		tracing::debug!(topic, hits = chunks.len(), "Retrieved topic chunks.");

		Ok(chunks)
	}
}
