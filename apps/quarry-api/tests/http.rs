use std::{sync::Arc, time::Duration};

use axum::{
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::Value;
use tower::util::ServiceExt;

use quarry_api::{routes, state::AppState};
use quarry_service::{EmbeddingProvider, Providers, QuarryService};
use quarry_storage::{cache::MemoryCache, index::TopicCatalog};
use quarry_testkit::{
	FakeEmbedding, GatedEmbedding, ScriptedCompletion, StaticDocument, TopicFixture, test_config,
};

fn fixture() -> TopicFixture {
	TopicFixture::new()
		.expect("Failed to create fixture.")
		.with_topic(
			"economy",
			&[vec![0.0, 0.0], vec![1.0, 0.0]],
			&["Inflation reached 4%.", "Wages were flat."],
		)
		.expect("Failed to write economy topic.")
		.with_topic("democracy", &[vec![0.0, 0.0]], &["Turnout fell sharply."])
		.expect("Failed to write democracy topic.")
}

fn service_with(
	fixture: &TopicFixture,
	embedding: Arc<dyn EmbeddingProvider>,
	cache: Arc<MemoryCache>,
	queue_capacity: usize,
) -> Arc<QuarryService> {
	let mut cfg = test_config(fixture.topics());

	cfg.jobs.workers = 1;
	cfg.jobs.queue_capacity = queue_capacity;

	let catalog = TopicCatalog::load(&cfg.topics).expect("Failed to load topics.");
	let providers = Providers::new(
		embedding,
		Arc::new(ScriptedCompletion::matching(&[
			("Inflation", r#"{"facts": ["Prices rose 4%", "Tariffs raise prices"]}"#),
			("Turnout", r#"{"facts": ["Turnout fell", "Tariffs raise prices"]}"#),
			("Parliament", r#"{"facts": ["Budget passed"]}"#),
		])),
		Arc::new(StaticDocument::text("Parliament passed the budget.")),
	);

	let service = QuarryService::with_providers(cfg, catalog, cache, providers)
		.expect("Failed to build service.");

	Arc::new(service)
}

fn state(fixture: &TopicFixture) -> AppState {
	let service = service_with(
		fixture,
		Arc::new(FakeEmbedding::constant(vec![0.0, 0.0])),
		Arc::new(MemoryCache::default()),
		8,
	);

	AppState::from_service(service)
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
	let response =
		routes::router(state.clone()).oneshot(request).await.expect("Failed to call router.");
	let status = response.status();
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body.");
	let json = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).expect("Body must be JSON.")
	};

	(status, json)
}

fn post(uri: &str, payload: Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header("content-type", "application/json")
		.body(Body::from(payload.to_string()))
		.expect("Failed to build request.")
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("Failed to build request.")
}

async fn wait_for_terminal(state: &AppState, job_id: &str) -> Value {
	for _ in 0..500 {
		let (status, body) = send(state, get(&format!("/v1/jobs/{job_id}"))).await;

		assert_eq!(status, StatusCode::OK);

		if body["status"] != "pending" {
			return body;
		}

		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	panic!("Job {job_id} never left pending.");
}

#[tokio::test]
async fn health_is_ok() {
	let fixture = fixture();
	let state = state(&fixture);
	let (status, _) = send(&state, get("/health")).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn job_lifecycle_over_http() {
	let fixture = fixture();
	let state = state(&fixture);
	let payload = serde_json::json!({
		"url_facts": ["The article says rates rose."],
		"meta": { "campaign": "spring" },
		"topics": ["Economy", "democracy"],
		"seed_query": "trade",
		"top_k": 2,
	});
	let (status, created) = send(&state, post("/v1/jobs", payload)).await;

	assert_eq!(status, StatusCode::ACCEPTED);
	assert_eq!(created["status"], "pending");
	assert_eq!(created["url_facts"], serde_json::json!(["The article says rates rose."]));

	let job_id = created["job_id"].as_str().expect("job_id must be a string.").to_string();
	let done = wait_for_terminal(&state, &job_id).await;

	assert_eq!(done["status"], "done");
	assert_eq!(done["meta"], serde_json::json!({ "campaign": "spring" }));
	assert_eq!(done["url_facts"], serde_json::json!(["The article says rates rose."]));
	assert_eq!(
		done["chunk_facts"]["facts"],
		serde_json::json!(["Prices rose 4%", "Tariffs raise prices", "Turnout fell"])
	);
	assert_eq!(done["chunk_facts"]["topics"], serde_json::json!(["economy", "democracy"]));
	assert_eq!(done["chunk_facts"]["top_k"], 2);
	assert!(done["error"].is_null());
}

#[tokio::test]
async fn url_facts_come_from_the_document_when_absent() {
	let fixture = fixture();
	let state = state(&fixture);
	let payload = serde_json::json!({ "url": "https://news.example.com/budget" });
	let (status, created) = send(&state, post("/v1/jobs", payload)).await;

	assert_eq!(status, StatusCode::ACCEPTED);
	assert_eq!(created["url_facts"], serde_json::json!(["Budget passed"]));
}

#[tokio::test]
async fn internal_document_urls_are_rejected() {
	let fixture = fixture();
	let state = state(&fixture);
	let payload = serde_json::json!({ "url": "http://127.0.0.1/admin" });
	let (status, body) = send(&state, post("/v1/jobs", payload)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_request");
}

#[tokio::test]
async fn unknown_jobs_are_not_found() {
	let fixture = fixture();
	let state = state(&fixture);
	let (status, body) = send(&state, get("/v1/jobs/doesnotexist")).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error_code"], "job_not_found");
}

#[tokio::test]
async fn aggregate_returns_facts_synchronously() {
	let fixture = fixture();
	let state = state(&fixture);
	let payload = serde_json::json!({
		"topics": ["democracy", "economy"],
		"query": "trade",
		"max_facts": 2,
	});
	let (status, body) = send(&state, post("/v1/facts/aggregate", payload)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["facts"], serde_json::json!(["Turnout fell", "Tariffs raise prices"]));
	assert_eq!(
		body["by_topic"]["economy"],
		serde_json::json!(["Prices rose 4%", "Tariffs raise prices"])
	);
	assert_eq!(body["topics"], serde_json::json!(["democracy", "economy"]));
}

#[tokio::test]
async fn zero_top_k_is_a_bad_request() {
	let fixture = fixture();
	let state = state(&fixture);
	let (status, body) =
		send(&state, post("/v1/facts/aggregate", serde_json::json!({ "top_k": 0 }))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "invalid_request");

	let (status, _) =
		send(&state, post("/v1/jobs", serde_json::json!({ "url_facts": [], "top_k": 0 }))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_queue_is_service_unavailable() {
	let fixture = fixture();
	let embedding = Arc::new(GatedEmbedding::new(vec![0.0, 0.0]));
	let service = service_with(&fixture, embedding.clone(), Arc::new(MemoryCache::default()), 1);
	let state = AppState::from_service(service);
	let payload = serde_json::json!({ "url_facts": [] });
	let (first, _) = send(&state, post("/v1/jobs", payload.clone())).await;

	while embedding.started() == 0 {
		tokio::time::sleep(Duration::from_millis(5)).await;
	}

	let (second, _) = send(&state, post("/v1/jobs", payload.clone())).await;
	let (third, body) = send(&state, post("/v1/jobs", payload)).await;

	assert_eq!(first, StatusCode::ACCEPTED);
	assert_eq!(second, StatusCode::ACCEPTED);
	assert_eq!(third, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(body["error_code"], "queue_full");

	embedding.open();
}

#[tokio::test]
async fn expired_jobs_poll_as_not_found() {
	let fixture = fixture();
	let service = service_with(
		&fixture,
		Arc::new(FakeEmbedding::constant(vec![0.0, 0.0])),
		Arc::new(MemoryCache::with_ttl(Duration::from_millis(400), 1_000)),
		8,
	);
	let state = AppState::from_service(service);
	let (_, created) =
		send(&state, post("/v1/jobs", serde_json::json!({ "url_facts": ["Known fact"] }))).await;
	let job_id = created["job_id"].as_str().expect("job_id must be a string.").to_string();

	assert_eq!(wait_for_terminal(&state, &job_id).await["status"], "done");

	tokio::time::sleep(Duration::from_millis(600)).await;

	let (status, body) = send(&state, get(&format!("/v1/jobs/{job_id}"))).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(body["error_code"], "job_not_found");
}
