use std::{net::IpAddr, time::Duration};

use reqwest::{Client, Url};
use scraper::{Html, Selector};

use crate::{Error, Result};

/// Parses a caller-supplied article URL, refusing anything that is not plain http(s) or that
/// points at a literal private, loopback or link-local address.
///
/// Host names are not resolved here.
pub fn validate_article_url(raw: &str) -> Result<Url> {
	let url = Url::parse(raw.trim())
		.map_err(|err| Error::InvalidUrl { message: format!("{raw:?} does not parse: {err}") })?;

	if !matches!(url.scheme(), "http" | "https") {
		return Err(Error::InvalidUrl {
			message: format!("Scheme {:?} is not allowed.", url.scheme()),
		});
	}

	let Some(host) = url.host_str() else {
		return Err(Error::InvalidUrl { message: "URL has no host.".to_string() });
	};

	if let Ok(ip) = host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>()
		&& is_internal_ip(&ip)
	{
		return Err(Error::InvalidUrl { message: format!("Host {host} is not reachable.") });
	}

	Ok(url)
}

/// Fetches a single page and returns the text of its `<p>` elements, one paragraph per line.
pub async fn fetch_document_text(cfg: &quarry_config::Document, raw_url: &str) -> Result<String> {
	let url = validate_article_url(raw_url)?;
	let client = Client::builder()
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.user_agent(cfg.user_agent.as_str())
		.build()?;
	let html = client.get(url).send().await?.error_for_status()?.text().await?;
	let text = paragraph_text(&html)?;

	tracing::debug!(chars = text.len(), "Fetched document text.");

	Ok(text)
}

pub fn paragraph_text(html: &str) -> Result<String> {
	let document = Html::parse_document(html);
	let selector = Selector::parse("p").map_err(|err| Error::InvalidConfig {
		message: format!("Paragraph selector does not parse: {err}"),
	})?;
	let paragraphs: Vec<String> = document
		.select(&selector)
		.map(|p| p.text().map(str::trim).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" "))
		.filter(|p| !p.is_empty())
		.collect();

	Ok(paragraphs.join("\n"))
}

fn is_internal_ip(ip: &IpAddr) -> bool {
	match ip {
		IpAddr::V4(v4) =>
			v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
		IpAddr::V6(v6) =>
			v6.is_loopback()
				|| v6.is_unspecified()
				|| v6.is_unique_local()
				|| v6.is_unicast_link_local(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_public_http_urls() {
		assert!(validate_article_url("https://example.com/news/1").is_ok());
		assert!(validate_article_url("http://93.184.216.34/story").is_ok());
	}

	#[test]
	fn rejects_non_http_schemes() {
		let err = validate_article_url("file:///etc/passwd").expect_err("expected rejection");
		assert!(matches!(err, Error::InvalidUrl { .. }));
		assert!(validate_article_url("not a url").is_err());
	}

	#[test]
	fn rejects_internal_literal_addresses() {
		for raw in [
			"http://127.0.0.1/admin",
			"http://10.0.0.8/",
			"http://192.168.1.1/",
			"http://169.254.169.254/latest/meta-data",
			"http://[::1]:8080/",
			"http://[fd00::1]/",
		] {
			assert!(validate_article_url(raw).is_err(), "{raw} should be rejected");
		}
	}

	#[test]
	fn extracts_paragraph_text_only() {
		let html = r#"
			<html><head><title>Ignored</title></head>
			<body>
				<nav>Menu</nav>
				<p>First <b>bold</b> paragraph.</p>
				<p>   </p>
				<div><p>Second paragraph.</p></div>
			</body></html>
		"#;
		let text = paragraph_text(html).expect("parse failed");
		assert_eq!(text, "First bold paragraph.\nSecond paragraph.");
	}
}
