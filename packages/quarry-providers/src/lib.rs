pub mod completion;
pub mod document;
pub mod embedding;

mod error;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

const MAX_ERROR_BODY_CHARS: usize = 512;

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};
		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}
	Ok(headers)
}

/// Turns a provider reply into JSON, separating refused requests from transport failures.
///
/// `400` and `422` mean the provider understood the call but refused its shape (for example an
/// unsupported `response_format`), so they surface as [`Error::Rejected`]. Every other non-success
/// status is a transport failure reported as [`Error::Status`].
pub(crate) async fn read_json(res: reqwest::Response) -> Result<Value> {
	let status = res.status();

	if status.is_success() {
		return Ok(res.json().await?);
	}

	let body = res.text().await.unwrap_or_default();
	let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();

	match status.as_u16() {
		400 | 422 => Err(Error::Rejected { status: status.as_u16(), message }),
		code => Err(Error::Status { status: code, message }),
	}
}
