use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
	index: Option<usize>,
	embedding: Vec<f32>,
}

/// Embeds `texts` in one request and returns one vector per input, in input order.
pub async fn embed(
	cfg: &quarry_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(format!("{}{}", cfg.api_base, cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let vectors = vectors_in_input_order(crate::read_json(res).await?)?;

	if vectors.len() == texts.len() {
		Ok(vectors)
	} else {
		Err(Error::InvalidResponse {
			message: format!("Expected {} embeddings, got {}.", texts.len(), vectors.len()),
		})
	}
}

fn vectors_in_input_order(json: Value) -> Result<Vec<Vec<f32>>> {
	let response: EmbeddingResponse = serde_json::from_value(json).map_err(|err| {
		Error::InvalidResponse { message: format!("Embedding response does not parse: {err}") }
	})?;
	let mut items: Vec<(usize, Vec<f32>)> = response
		.data
		.into_iter()
		.enumerate()
		.map(|(position, item)| (item.index.unwrap_or(position), item.embedding))
		.collect();

	items.sort_by_key(|(index, _)| *index);

	Ok(items.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn vectors_follow_the_reported_index() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let vectors = vectors_in_input_order(json).expect("parse failed");

		assert_eq!(vectors, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
	}

	#[test]
	fn missing_index_keeps_response_order() {
		let json = serde_json::json!({ "data": [{ "embedding": [1.0] }, { "embedding": [2.0] }] });

		assert_eq!(vectors_in_input_order(json).expect("parse failed"), vec![vec![1.0], vec![2.0]]);
	}

	#[test]
	fn non_numeric_values_are_invalid() {
		let json = serde_json::json!({ "data": [{ "index": 0, "embedding": [0.5, "x"] }] });
		let err = vectors_in_input_order(json).expect_err("expected invalid response");

		assert!(err.is_recoverable());
	}
}
