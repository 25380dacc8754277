use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use quarry_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(edit: impl FnOnce(&mut toml::Table)) -> String {
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let root = value.as_table_mut().expect("Template config must be a table.");

	edit(root);

	toml::to_string(&value).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("quarry_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse test config.")
}

#[test]
fn sample_config_loads() {
	let path = write_temp_config(SAMPLE_CONFIG_TEMPLATE_TOML.to_string());
	let result = quarry_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Sample config must load.");

	assert_eq!(cfg.topics.len(), 2);
	assert_eq!(cfg.retrieval.top_k, 3);
	assert_eq!(cfg.retrieval.max_facts, Some(30));
	assert_eq!(cfg.extractor.max_input_chars, 6_000);
	assert!(cfg.topic("economy").is_some());
}

#[test]
fn optional_sections_fall_back_to_defaults() {
	let payload = sample_toml_with(|root| {
		root.remove("extractor");
		root.remove("jobs");
		root.remove("document");
	});
	let cfg: Config = toml::from_str(&payload).expect("Failed to parse test config.");

	assert_eq!(cfg.extractor.max_input_chars, 6_000);
	assert_eq!(cfg.extractor.max_facts, 12);
	assert_eq!(cfg.extractor.max_fact_chars, 280);
	assert_eq!(cfg.jobs.workers, 8);
	assert_eq!(cfg.document.timeout_ms, 15_000);
	assert!(quarry_config::validate(&cfg).is_ok());
}

#[test]
fn zero_max_facts_means_uncapped() {
	let payload = sample_toml_with(|root| {
		let retrieval = root
			.get_mut("retrieval")
			.and_then(Value::as_table_mut)
			.expect("Template config must include [retrieval].");

		retrieval.insert("max_facts".to_string(), Value::Integer(0));
	});
	let path = write_temp_config(payload);
	let result = quarry_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	assert_eq!(result.expect("Config must load.").retrieval.max_facts, None);
}

#[test]
fn missing_file_reports_read_error() {
	let mut path = env::temp_dir();

	path.push("quarry_config_test_missing_file.toml");

	let err = quarry_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error: {err}");
}

#[test]
fn malformed_toml_reports_parse_error() {
	let path = write_temp_config("[service\nhttp_bind = ".to_string());
	let result = quarry_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected parse error.");

	assert!(matches!(err, Error::ParseConfig { .. }), "Unexpected error: {err}");
}

#[test]
fn top_k_must_be_positive() {
	let mut cfg = base_config();

	cfg.retrieval.top_k = 0;

	let err = quarry_config::validate(&cfg).expect_err("Expected top_k validation error.");

	assert!(
		err.to_string().contains("retrieval.top_k must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn worker_pool_must_be_bounded_and_non_empty() {
	let mut cfg = base_config();

	cfg.jobs.workers = 0;

	let err = quarry_config::validate(&cfg).expect_err("Expected workers validation error.");

	assert!(
		err.to_string().contains("jobs.workers must be greater than zero."),
		"Unexpected error: {err}"
	);

	cfg = base_config();
	cfg.jobs.queue_capacity = 0;

	let err = quarry_config::validate(&cfg).expect_err("Expected queue validation error.");

	assert!(
		err.to_string().contains("jobs.queue_capacity must be greater than zero."),
		"Unexpected error: {err}"
	);

	cfg = base_config();
	cfg.jobs.max_records = 0;

	let err = quarry_config::validate(&cfg).expect_err("Expected record cap validation error.");

	assert!(
		err.to_string().contains("jobs.max_records must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn api_keys_must_be_non_empty() {
	let mut cfg = base_config();

	cfg.providers.llm_extractor.api_key = "   ".to_string();

	let err = quarry_config::validate(&cfg).expect_err("Expected api_key validation error.");

	assert!(
		err.to_string().contains("Provider llm_extractor api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn topics_must_be_present_and_unique() {
	let mut cfg = base_config();

	cfg.topics.clear();

	let err = quarry_config::validate(&cfg).expect_err("Expected empty topics error.");

	assert!(
		err.to_string().contains("topics must contain at least one topic."),
		"Unexpected error: {err}"
	);

	cfg = base_config();

	let duplicate = cfg.topics[0].clone();

	cfg.topics.push(duplicate);

	let err = quarry_config::validate(&cfg).expect_err("Expected duplicate topic error.");

	assert!(err.to_string().contains("is declared more than once."), "Unexpected error: {err}");
}

#[test]
fn default_topic_must_be_configured() {
	let mut cfg = base_config();

	cfg.retrieval.default_topic = "immigration".to_string();

	let err = quarry_config::validate(&cfg).expect_err("Expected default topic error.");

	assert!(
		err.to_string().contains("retrieval.default_topic must name a configured topic."),
		"Unexpected error: {err}"
	);
}

#[test]
fn topic_ids_must_be_lowercase() {
	let mut cfg = base_config();

	cfg.topics[1].id = "Economy".to_string();

	let err = quarry_config::validate(&cfg).expect_err("Expected lowercase topic error.");

	assert!(err.to_string().contains("must be lowercase."), "Unexpected error: {err}");
}
