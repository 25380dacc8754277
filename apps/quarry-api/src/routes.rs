use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use quarry_service::{Error, RetrievalRequest, format_error_chain};
use quarry_storage::models::{ChunkFacts, JobRecord, JobStatus};

use crate::state::AppState;

const MAX_ERROR_MESSAGE_CHARS: usize = 1_024;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
	/// Facts the caller already holds. When absent they are extracted from `url`.
	pub url_facts: Option<Vec<String>>,
	pub url: Option<String>,
	#[serde(default)]
	pub meta: Map<String, Value>,
	#[serde(flatten)]
	pub retrieval: RetrievalRequest,
}

#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
	pub job_id: String,
	pub status: JobStatus,
	pub url_facts: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}

	pub fn status(&self) -> StatusCode {
		self.status
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let message = format_error_chain(&err, MAX_ERROR_MESSAGE_CHARS);

		match err {
			Error::InvalidRequest { .. } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::UnknownTopic { .. } =>
				json_error(StatusCode::BAD_REQUEST, "unknown_topic", message),
			Error::QueueFull => json_error(StatusCode::SERVICE_UNAVAILABLE, "queue_full", message),
			Error::RunnerClosed =>
				json_error(StatusCode::SERVICE_UNAVAILABLE, "runner_closed", message),
			Error::Provider(_) => json_error(StatusCode::BAD_GATEWAY, "provider_error", message),
			Error::Storage(_) | Error::Record(_) => {
				tracing::error!(error = %message, "Request failed on job storage.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message)
			},
			Error::Search(_) => {
				tracing::error!(error = %message, "Request failed while searching an index.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/jobs", post(create_job))
		.route("/v1/jobs/{job_id}", get(get_job))
		.route("/v1/facts/aggregate", post(aggregate))
		.with_state(state)
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn create_job(
	State(state): State<AppState>,
	Json(payload): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<CreateJobResponse>), ApiError> {
	let CreateJobRequest { url_facts, url, meta, retrieval } = payload;

	retrieval.validate()?;

	let url_facts = match (url_facts, url.as_deref()) {
		(Some(url_facts), _) => url_facts,
		(None, Some(url)) => state.service.document_facts(url).await?,
		(None, None) => Vec::new(),
	};
	let job_id = state.service.create_job(url_facts.clone(), meta).await?;

	state.runner.submit(&job_id, retrieval).await?;

	tracing::info!(job_id = %job_id, "Accepted retrieval job.");

	let response = CreateJobResponse { job_id, status: JobStatus::Pending, url_facts };

	Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn get_job(
	State(state): State<AppState>,
	Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
	match state.service.poll_job(&job_id).await? {
		Some(record) => Ok(Json(record)),
		None => Err(json_error(
			StatusCode::NOT_FOUND,
			"job_not_found",
			format!("Job {job_id} does not exist or has expired."),
		)),
	}
}

async fn aggregate(
	State(state): State<AppState>,
	Json(payload): Json<RetrievalRequest>,
) -> Result<Json<ChunkFacts>, ApiError> {
	let response = state.service.aggregate_sync(&payload).await?;

	Ok(Json(response))
}
