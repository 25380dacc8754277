use std::sync::Arc;

use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use quarry_storage::{
	cache::JobCache,
	models::{ChunkFacts, JobRecord, JobStatus},
};

use crate::{QuarryService, Result};

pub use quarry_storage::cache::JOB_TTL;

pub const JOB_KEY_PREFIX: &str = "factsjob:";

/// What happened to a requested terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
	Applied,
	/// The record had already left `pending`; nothing was written.
	AlreadyTerminal,
	/// The record never existed or has expired.
	Missing,
}

/// Job state stored as JSON records in the shared expiring cache.
///
/// Every write restarts the record's lifetime; the cache drops records nobody writes again.
#[derive(Clone)]
pub struct JobRegistry {
	cache: Arc<dyn JobCache>,
}
impl JobRegistry {
	pub fn new(cache: Arc<dyn JobCache>) -> Self {
		Self { cache }
	}

	pub fn cache(&self) -> &Arc<dyn JobCache> {
		&self.cache
	}

	/// Writes a fresh `pending` record, replacing anything stored under the same id.
	pub async fn create(
		&self,
		job_id: &str,
		url_facts: Vec<String>,
		meta: Map<String, Value>,
	) -> Result<JobRecord> {
		let record = JobRecord::pending(job_id, url_facts, meta, OffsetDateTime::now_utc());
		let raw = serde_json::to_string(&record)?;

		self.cache.set(&job_key(job_id), raw).await?;

		tracing::debug!(job_id, "Created pending job.");

		Ok(record)
	}

	pub async fn read(&self, job_id: &str) -> Result<Option<JobRecord>> {
		let Some(raw) = self.cache.get(&job_key(job_id)).await? else {
			return Ok(None);
		};

		Ok(Some(serde_json::from_str(&raw)?))
	}

	pub async fn mark_done(
		&self,
		job_id: &str,
		chunk_facts: ChunkFacts,
	) -> Result<TransitionOutcome> {
		self.finish(job_id, JobStatus::Done, |record| {
			record.chunk_facts = Some(chunk_facts);
			record.error = None;
		})
		.await
	}

	pub async fn mark_error(&self, job_id: &str, message: &str) -> Result<TransitionOutcome> {
		self.finish(job_id, JobStatus::Error, |record| {
			record.error = Some(message.to_string());
		})
		.await
	}

	/// Moves a `pending` record to `status` with a compare-and-set against the stored bytes.
	async fn finish<F>(
		&self,
		job_id: &str,
		status: JobStatus,
		apply: F,
	) -> Result<TransitionOutcome>
	where
		F: FnOnce(&mut JobRecord),
	{
		let key = job_key(job_id);
		let Some(current) = self.cache.get(&key).await? else {
			tracing::warn!(job_id, status = status.as_str(), "Job record is missing or expired.");

			return Ok(TransitionOutcome::Missing);
		};
		let mut record: JobRecord = serde_json::from_str(&current)?;

		if record.status.is_terminal() {
			return Ok(reject_transition(job_id, record.status, status));
		}

		record.status = status;
		record.updated_at = OffsetDateTime::now_utc();

		apply(&mut record);

		let next = serde_json::to_string(&record)?;

		if self.cache.compare_and_set(&key, &current, next).await? {
			tracing::debug!(job_id, status = status.as_str(), "Job reached a terminal state.");

			return Ok(TransitionOutcome::Applied);
		}

		// Lost the race: report whatever the winner left behind.
		match self.read(job_id).await? {
			Some(winner) => Ok(reject_transition(job_id, winner.status, status)),
			None => Ok(TransitionOutcome::Missing),
		}
	}
}

impl QuarryService {
	/// Registers a new `pending` job seeded with facts already known to the caller.
	pub async fn create_job(
		&self,
		url_facts: Vec<String>,
		meta: Map<String, Value>,
	) -> Result<String> {
		let job_id = new_job_id();

		self.jobs.create(&job_id, url_facts, meta).await?;

		Ok(job_id)
	}

	/// Current record of a job, or `None` when it never existed or has expired.
	pub async fn poll_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
		self.jobs.read(job_id).await
	}
}

pub fn new_job_id() -> String {
	Uuid::new_v4().simple().to_string()
}

fn reject_transition(job_id: &str, current: JobStatus, requested: JobStatus) -> TransitionOutcome {
	tracing::warn!(
		job_id,
		current = current.as_str(),
		requested = requested.as_str(),
		"Rejected a second terminal transition."
	);

	TransitionOutcome::AlreadyTerminal
}

fn job_key(job_id: &str) -> String {
	format!("{JOB_KEY_PREFIX}{job_id}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn job_ids_are_hex_tokens() {
		let id = new_job_id();

		assert_eq!(id.len(), 32);
		assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
		assert_ne!(id, new_job_id());
	}

	#[test]
	fn keys_carry_the_job_prefix() {
		assert_eq!(job_key("abc"), "factsjob:abc");
		assert_eq!(JOB_TTL.as_secs(), 30 * 60);
	}
}
