use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use quarry_domain::TopicFacts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Pending,
	Done,
	Error,
}
impl JobStatus {
	pub fn is_terminal(self) -> bool {
		!matches!(self, Self::Pending)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Done => "done",
			Self::Error => "error",
		}
	}
}

/// Result payload of a finished retrieval job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFacts {
	pub facts: Vec<String>,
	pub by_topic: TopicFacts,
	pub topics: Vec<String>,
	pub top_k: u32,
}

/// Lifecycle record of one asynchronous retrieval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
	pub job_id: String,
	pub status: JobStatus,
	pub url_facts: Vec<String>,
	pub chunk_facts: Option<ChunkFacts>,
	pub error: Option<String>,
	#[serde(default)]
	pub meta: Map<String, Value>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl JobRecord {
	pub fn pending(
		job_id: impl Into<String>,
		url_facts: Vec<String>,
		meta: Map<String, Value>,
		now: OffsetDateTime,
	) -> Self {
		Self {
			job_id: job_id.into(),
			status: JobStatus::Pending,
			url_facts,
			chunk_facts: None,
			error: None,
			meta,
			created_at: now,
			updated_at: now,
		}
	}
}
