use quarry_providers::document;

use crate::{Error, QuarryService, Result};

impl QuarryService {
	/// Fetches one article and extracts its facts.
	///
	/// A malformed or internal URL is an invalid request. Fetch and extraction failures are
	/// logged and yield no facts so job creation can proceed.
	pub async fn document_facts(&self, url: &str) -> Result<Vec<String>> {
		document::validate_article_url(url).map_err(|err| Error::InvalidRequest {
			message: err.to_string(),
		})?;

		let text = match self.providers.document.fetch_text(&self.cfg.document, url).await {
			Ok(text) => text,
			Err(err) => {
				tracing::warn!(url, error = %err, "Document fetch failed.");

				return Ok(Vec::new());
			},
		};

		match self.extract_facts(&text, "the article").await {
			Ok(found) => Ok(found),
			Err(err) => {
				tracing::warn!(url, error = %err, "Document fact extraction failed.");

				Ok(Vec::new())
			},
		}
	}
}
