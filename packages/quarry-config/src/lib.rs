mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Document, EmbeddingProviderConfig, Extractor, Jobs, LlmProviderConfig, Providers,
	Retrieval, Service, Topic,
};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if !cfg.providers.llm_extractor.temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.llm_extractor.temperature must be a finite number.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("llm_extractor", &cfg.providers.llm_extractor.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}
	for (label, timeout_ms) in [
		("providers.embedding.timeout_ms", cfg.providers.embedding.timeout_ms),
		("providers.llm_extractor.timeout_ms", cfg.providers.llm_extractor.timeout_ms),
		("document.timeout_ms", cfg.document.timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.extractor.max_input_chars == 0 {
		return Err(Error::Validation {
			message: "extractor.max_input_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.extractor.max_facts == 0 {
		return Err(Error::Validation {
			message: "extractor.max_facts must be greater than zero.".to_string(),
		});
	}
	if cfg.extractor.max_fact_chars == 0 {
		return Err(Error::Validation {
			message: "extractor.max_fact_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.jobs.workers == 0 {
		return Err(Error::Validation {
			message: "jobs.workers must be greater than zero.".to_string(),
		});
	}
	if cfg.jobs.queue_capacity == 0 {
		return Err(Error::Validation {
			message: "jobs.queue_capacity must be greater than zero.".to_string(),
		});
	}
	if cfg.jobs.max_records == 0 {
		return Err(Error::Validation {
			message: "jobs.max_records must be greater than zero.".to_string(),
		});
	}
	if cfg.topics.is_empty() {
		return Err(Error::Validation {
			message: "topics must contain at least one topic.".to_string(),
		});
	}

	let mut seen = HashSet::new();

	for topic in &cfg.topics {
		if topic.id.trim().is_empty() {
			return Err(Error::Validation { message: "topics.id must be non-empty.".to_string() });
		}
		if topic.id != topic.id.to_lowercase() {
			return Err(Error::Validation {
				message: format!("topics.id {:?} must be lowercase.", topic.id),
			});
		}
		if !seen.insert(topic.id.as_str()) {
			return Err(Error::Validation {
				message: format!("topics.id {:?} is declared more than once.", topic.id),
			});
		}
		if topic.seed.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("topics.seed must be non-empty for topic {:?}.", topic.id),
			});
		}
	}

	if cfg.topic(&cfg.retrieval.default_topic).is_none() {
		return Err(Error::Validation {
			message: "retrieval.default_topic must name a configured topic.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.retrieval.max_facts == Some(0) {
		cfg.retrieval.max_facts = None;
	}

	cfg.retrieval.default_topic = cfg.retrieval.default_topic.trim().to_lowercase();

	for topic in &mut cfg.topics {
		topic.id = topic.id.trim().to_string();

		if topic.label.as_deref().map(|label| label.trim().is_empty()).unwrap_or(false) {
			topic.label = None;
		}
	}
}
