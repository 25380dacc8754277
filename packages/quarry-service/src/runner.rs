use std::{any::Any, error::Error as StdError, sync::Arc};

use tokio::{
	sync::{
		Mutex,
		mpsc::{self, Receiver, Sender, error::TrySendError},
	},
	task::JoinHandle,
};

use crate::{Error, QuarryService, Result, RetrievalRequest};

struct QueuedJob {
	job_id: String,
	request: RetrievalRequest,
}

/// Bounded pool of background workers that finish retrieval jobs.
///
/// `submit` only enqueues; results reach pollers through the job registry.
pub struct JobRunner {
	service: Arc<QuarryService>,
	sender: Sender<QueuedJob>,
	workers: Vec<JoinHandle<()>>,
}
impl JobRunner {
	/// Spawns `jobs.workers` tasks draining a queue of `jobs.queue_capacity` slots.
	///
	/// Must be called from within a tokio runtime.
	pub fn start(service: Arc<QuarryService>) -> Self {
		let worker_count = service.cfg.jobs.workers.max(1);
		let queue_capacity = service.cfg.jobs.queue_capacity.max(1);
		let (sender, receiver) = mpsc::channel(queue_capacity);
		let receiver = Arc::new(Mutex::new(receiver));
		let workers = (0..worker_count)
			.map(|worker| tokio::spawn(run_worker(worker, service.clone(), receiver.clone())))
			.collect();

		tracing::info!(workers = worker_count, queue_capacity, "Job runner started.");

		Self { service, sender, workers }
	}

	pub fn service(&self) -> &Arc<QuarryService> {
		&self.service
	}

	/// Hands a job created with [`QuarryService::create_job`] to the pool.
	///
	/// Returns as soon as the job is queued. When the queue is full or the pool has stopped the
	/// job is marked `error` and the rejection is returned.
	pub async fn submit(&self, job_id: &str, request: RetrievalRequest) -> Result<()> {
		let queued = QueuedJob { job_id: job_id.to_string(), request };
		let rejection = match self.sender.try_send(queued) {
			Ok(()) => {
				tracing::debug!(job_id, "Queued retrieval job.");

				return Ok(());
			},
			Err(TrySendError::Full(_)) => Error::QueueFull,
			Err(TrySendError::Closed(_)) => Error::RunnerClosed,
		};

		tracing::warn!(job_id, error = %rejection, "Rejected retrieval job.");

		self.service.jobs.mark_error(job_id, &rejection.to_string()).await?;

		Err(rejection)
	}

	/// Stops accepting jobs and waits for queued ones to finish.
	pub async fn shutdown(self) {
		let Self { sender, workers, .. } = self;

		drop(sender);

		for worker in workers {
			if let Err(err) = worker.await {
				tracing::error!(error = %err, "Job worker ended abnormally.");
			}
		}
	}
}

/// Renders an error and its sources as `outer: inner: root`, clipped to `max_chars`.
pub fn format_error_chain(err: &(dyn StdError + 'static), max_chars: usize) -> String {
	let mut parts = vec![err.to_string()];
	let mut source = err.source();

	while let Some(inner) = source {
		parts.push(inner.to_string());

		source = inner.source();
	}

	clip(parts.join(": "), max_chars)
}

async fn run_worker(
	worker: usize,
	service: Arc<QuarryService>,
	receiver: Arc<Mutex<Receiver<QueuedJob>>>,
) {
	loop {
		let next = receiver.lock().await.recv().await;
		let Some(job) = next else {
			break;
		};

		run_job(&service, job).await;
	}

	tracing::debug!(worker, "Job worker stopped.");
}

async fn run_job(service: &Arc<QuarryService>, job: QueuedJob) {
	let QueuedJob { job_id, request } = job;
	let max_chars = service.cfg.jobs.max_error_chars;
	let task = {
		let service = service.clone();

		tokio::spawn(async move { service.aggregate_sync(&request).await })
	};
	let recorded = match task.await {
		Ok(Ok(chunk_facts)) => service.jobs.mark_done(&job_id, chunk_facts).await,
		Ok(Err(err)) => {
			let message = format_error_chain(&err, max_chars);

			tracing::warn!(job_id = %job_id, error = %message, "Retrieval job failed.");

			service.jobs.mark_error(&job_id, &message).await
		},
		Err(err) => {
			let message = if err.is_panic() {
				clip(format!("Job panicked: {}", panic_message(err.into_panic())), max_chars)
			} else {
				"Job task was cancelled.".to_string()
			};

			tracing::error!(job_id = %job_id, error = %message, "Retrieval job aborted.");

			service.jobs.mark_error(&job_id, &message).await
		},
	};

	if let Err(err) = recorded {
		tracing::error!(job_id = %job_id, error = %err, "Failed to record job outcome.");
	}
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		return message.to_string();
	}
	if let Some(message) = payload.downcast_ref::<String>() {
		return message.clone();
	}

	"non-string panic payload".to_string()
}

fn clip(mut text: String, max_chars: usize) -> String {
	if let Some((cut, _)) = text.char_indices().nth(max_chars) {
		text.truncate(cut);
		text.push_str("...");
	}

	text
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn error_chain_lists_every_source() {
		let err = Error::Provider(quarry_providers::Error::Status {
			status: 503,
			message: "upstream down".to_string(),
		});
		let rendered = format_error_chain(&err, 1_024);

		assert_eq!(
			rendered,
			"Provider call failed: Provider failed with status 503: upstream down"
		);
	}

	#[test]
	fn error_chain_is_clipped() {
		let err = Error::InvalidRequest { message: "x".repeat(50) };
		let rendered = format_error_chain(&err, 10);

		assert_eq!(rendered, "Invalid re...");
	}

	#[test]
	fn panic_payloads_are_readable() {
		assert_eq!(panic_message(Box::new("boom")), "boom");
		assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
		assert_eq!(panic_message(Box::new(7_u8)), "non-string panic payload");
	}
}
